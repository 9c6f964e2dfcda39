//! Load statistics.

use super::resolve::SkipReason;
use super::schema::EntityKind;

/// Outcome of one loader run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadReport {
    pub kind: EntityKind,
    /// Data rows decoded from the file
    pub rows: usize,
    /// Rows accepted into the batch
    pub pending: usize,
    /// Rows the store reported as written (0 when the batch was rejected)
    pub inserted: u64,
    pub skipped_existing: usize,
    pub skipped_missing_reference: usize,
    pub skipped_invalid: usize,
    /// Integrity violation that rejected the batch, if any
    pub batch_warning: Option<String>,
}

impl LoadReport {
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            rows: 0,
            pending: 0,
            inserted: 0,
            skipped_existing: 0,
            skipped_missing_reference: 0,
            skipped_invalid: 0,
            batch_warning: None,
        }
    }

    pub fn record_skip(&mut self, reason: &SkipReason) {
        match reason {
            SkipReason::AlreadyExists { .. } => self.skipped_existing += 1,
            SkipReason::MissingReference { .. } => self.skipped_missing_reference += 1,
            SkipReason::InvalidValue { .. } => self.skipped_invalid += 1,
        }
    }

    pub fn skipped(&self) -> usize {
        self.skipped_existing + self.skipped_missing_reference + self.skipped_invalid
    }
}
