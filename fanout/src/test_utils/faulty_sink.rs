use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::audit::{AuditReader, Auditable};
use crate::bail;
use crate::error::{ErrorKind, FanoutResult};
use crate::sink::Sink;
use crate::sink::memory::MemorySink;
use crate::types::{Record, RecordBatch};

/// A fault injected by [`FaultySink`].
#[derive(Debug, Clone)]
pub enum SinkFault {
    /// The nth call to `apply_batch`, counting from 1, fails without writing anything.
    FailApplyAt(u64),
    /// Every call to `current_position` fails as if the store were unreachable.
    Unreachable,
    /// The nth call to `apply_batch`, counting from 1, panics.
    PanicApplyAt(u64),
    /// Every call to `apply_batch` sleeps before writing.
    SlowApply(Duration),
}

/// A [`MemorySink`] that misbehaves on demand.
#[derive(Debug, Clone)]
pub struct FaultySink<R: Record> {
    inner: MemorySink<R>,
    fault: SinkFault,
    apply_calls: Arc<AtomicU64>,
}

impl<R: Record> FaultySink<R> {
    pub fn new(inner: MemorySink<R>, fault: SinkFault) -> Self {
        Self {
            inner,
            fault,
            apply_calls: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Returns the wrapped sink.
    pub fn inner(&self) -> &MemorySink<R> {
        &self.inner
    }

    pub fn apply_calls(&self) -> u64 {
        self.apply_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<R: Record> Sink<R> for FaultySink<R> {
    fn name(&self) -> &str {
        Sink::name(&self.inner)
    }

    async fn current_position(&self) -> FanoutResult<R::Position> {
        if let SinkFault::Unreachable = self.fault {
            bail!(
                ErrorKind::ConnectivityError,
                "Sink is unreachable",
                "injected connection failure"
            );
        }

        self.inner.current_position().await
    }

    async fn apply_batch(&self, batch: &RecordBatch<R>) -> FanoutResult<()> {
        let call = self.apply_calls.fetch_add(1, Ordering::SeqCst) + 1;

        match self.fault {
            SinkFault::FailApplyAt(n) if n == call => bail!(
                ErrorKind::ApplyError,
                "Sink rejected batch",
                format!("injected failure on apply call {call}")
            ),
            SinkFault::PanicApplyAt(n) if n == call => {
                panic!("injected panic on apply call {call}")
            }
            SinkFault::SlowApply(delay) => tokio::time::sleep(delay).await,
            _ => {}
        }

        self.inner.apply_batch(batch).await
    }
}

#[async_trait]
impl<R: Auditable> AuditReader<R> for FaultySink<R> {
    fn name(&self) -> &str {
        AuditReader::name(&self.inner)
    }

    async fn read_records(&self, keys: &[R::Position]) -> FanoutResult<BTreeMap<R::Position, R>> {
        self.inner.read_records(keys).await
    }
}
