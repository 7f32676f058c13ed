use crate::bail;
use crate::error::{ErrorKind, FanoutResult};
use crate::types::{Position, Record};

/// Ordered batch of records read from a source.
///
/// Records are sorted strictly ascending by position. An empty batch signals that the
/// source has nothing beyond the position it was read at.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordBatch<R> {
    records: Vec<R>,
}

impl<R: Record> RecordBatch<R> {
    /// Creates a batch, rejecting records that are not strictly ascending by position.
    pub fn new(records: Vec<R>) -> FanoutResult<Self> {
        if let Some(index) = records
            .windows(2)
            .position(|pair| pair[0].position() >= pair[1].position())
        {
            bail!(
                ErrorKind::InvalidBatch,
                "Batch records are not strictly ascending",
                format!(
                    "record at index {} has position {:?} which is not greater than {:?}",
                    index + 1,
                    records[index + 1].position(),
                    records[index].position()
                )
            );
        }

        Ok(Self { records })
    }

    /// Creates an empty batch.
    pub fn empty() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns the position of the first record, if any.
    pub fn first_position(&self) -> Option<R::Position> {
        self.records.first().map(Record::position)
    }

    /// Returns the position of the last record, if any.
    pub fn last_position(&self) -> Option<R::Position> {
        self.records.last().map(Record::position)
    }

    /// Returns the position a reader resumes from after this batch.
    ///
    /// This is the last record's position, or the zero position for an empty batch.
    pub fn next_position(&self) -> R::Position {
        self.last_position().unwrap_or_else(R::Position::zero)
    }

    pub fn records(&self) -> &[R] {
        &self.records
    }

    pub fn into_records(self) -> Vec<R> {
        self.records
    }
}

impl<R: Record> Default for RecordBatch<R> {
    fn default() -> Self {
        Self::empty()
    }
}
