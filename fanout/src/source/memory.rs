use async_trait::async_trait;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::audit::{AuditReader, AuditSource, Auditable};
use crate::error::FanoutResult;
use crate::source::Source;
use crate::types::{Record, RecordBatch};

#[derive(Debug)]
struct Inner<R: Record> {
    records: BTreeMap<R::Position, R>,
    reads: u64,
}

/// In-memory source for tests and dry runs.
///
/// Records are kept ordered by position. Clones share the same records, so a test can keep
/// a handle and insert records while a conductor reads from another clone.
#[derive(Debug, Clone)]
pub struct MemorySource<R: Record> {
    name: String,
    inner: Arc<Mutex<Inner<R>>>,
}

impl<R: Record> MemorySource<R> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            inner: Arc::new(Mutex::new(Inner {
                records: BTreeMap::new(),
                reads: 0,
            })),
        }
    }

    /// Creates a source holding `records`.
    pub fn with_records(name: impl Into<String>, records: impl IntoIterator<Item = R>) -> Self {
        let records = records
            .into_iter()
            .map(|record| (record.position(), record))
            .collect();

        Self {
            name: name.into(),
            inner: Arc::new(Mutex::new(Inner { records, reads: 0 })),
        }
    }

    /// Inserts or replaces a record.
    pub async fn insert(&self, record: R) {
        let mut inner = self.inner.lock().await;
        inner.records.insert(record.position(), record);
    }

    pub async fn remove(&self, position: &R::Position) -> Option<R> {
        let mut inner = self.inner.lock().await;
        inner.records.remove(position)
    }

    /// Returns how many batches have been read from this source.
    pub async fn reads(&self) -> u64 {
        self.inner.lock().await.reads
    }
}

impl<R: Record> Source<R> for MemorySource<R> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read_batch(
        &self,
        limit: usize,
        after_position: &R::Position,
    ) -> FanoutResult<RecordBatch<R>> {
        let mut inner = self.inner.lock().await;
        inner.reads += 1;

        let records = inner
            .records
            .range((Bound::Excluded(after_position), Bound::Unbounded))
            .take(limit)
            .map(|(_, record)| record.clone())
            .collect();

        RecordBatch::new(records)
    }
}

#[async_trait]
impl<R: Auditable> AuditReader<R> for MemorySource<R> {
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

#[async_trait]
impl<R: Auditable> AuditSource<R> for MemorySource<R> {
    async fn all_keys(&self) -> FanoutResult<Vec<R::Position>> {
        let inner = self.inner.lock().await;

        Ok(inner.records.keys().cloned().collect())
    }
}
