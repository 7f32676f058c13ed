use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::audit::{AuditReader, Auditable};
use crate::error::FanoutResult;
use crate::sink::Sink;
use crate::types::{Position, Record, RecordBatch};

#[derive(Debug)]
struct Inner<R: Record> {
    records: BTreeMap<R::Position, R>,
    applied_batches: u64,
}

/// In-memory sink for tests and dry runs.
///
/// Records are upserted by position, so the resume position is the greatest stored key.
/// Clones share the same state.
#[derive(Debug, Clone)]
pub struct MemorySink<R: Record> {
    name: String,
    inner: Arc<Mutex<Inner<R>>>,
}

impl<R: Record> MemorySink<R> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inner: Arc::new(Mutex::new(Inner {
                records: BTreeMap::new(),
                applied_batches: 0,
            })),
        }
    }

    /// Returns a copy of the stored records, ascending by position.
    pub async fn records(&self) -> Vec<R> {
        let inner = self.inner.lock().await;
        inner.records.values().cloned().collect()
    }

    /// Returns how many batches have been applied, repeated ones included.
    pub async fn applied_batches(&self) -> u64 {
        self.inner.lock().await.applied_batches
    }

    /// Removes every stored record.
    pub async fn clear(&self) {
        let mut inner = self.inner.lock().await;
        inner.records.clear();
    }
}

#[async_trait]
impl<R: Record> Sink<R> for MemorySink<R> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn current_position(&self) -> FanoutResult<R::Position> {
        let inner = self.inner.lock().await;

        Ok(inner
            .records
            .last_key_value()
            .map(|(position, _)| position.clone())
            .unwrap_or_else(R::Position::zero))
    }

    async fn apply_batch(&self, batch: &RecordBatch<R>) -> FanoutResult<()> {
        let mut inner = self.inner.lock().await;

        debug!(sink = %self.name, records = batch.len(), "applying batch to memory sink");

        for record in batch.records() {
            inner.records.insert(record.position(), record.clone());
        }
        inner.applied_batches += 1;

        Ok(())
    }
}

#[async_trait]
impl<R: Auditable> AuditReader<R> for MemorySink<R> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read_records(&self, keys: &[R::Position]) -> FanoutResult<BTreeMap<R::Position, R>> {
        let inner = self.inner.lock().await;

        Ok(keys
            .iter()
            .filter_map(|key| {
                inner
                    .records
                    .get(key)
                    .map(|record| (key.clone(), record.clone()))
            })
            .collect())
    }
}
