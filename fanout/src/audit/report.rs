use std::fmt::Debug;

/// A difference found by an audit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mismatch<K> {
    /// The target has no record for a sampled key.
    Missing { target: String, key: K },
    /// The target's record differs from the expected one.
    Differs {
        target: String,
        key: K,
        expected: String,
        actual: String,
    },
    /// The expected value could not be computed, e.g. because a raw fact is malformed.
    Unverifiable {
        target: String,
        key: K,
        reason: String,
    },
}

impl<K> Mismatch<K> {
    pub fn target(&self) -> &str {
        match self {
            Mismatch::Missing { target, .. }
            | Mismatch::Differs { target, .. }
            | Mismatch::Unverifiable { target, .. } => target,
        }
    }

    pub fn key(&self) -> &K {
        match self {
            Mismatch::Missing { key, .. }
            | Mismatch::Differs { key, .. }
            | Mismatch::Unverifiable { key, .. } => key,
        }
    }
}

/// Result of an audit run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditReport<K> {
    /// Number of sampled keys.
    pub sampled: usize,
    pub mismatches: Vec<Mismatch<K>>,
}

impl<K> AuditReport<K> {
    /// Returns `true` when no sampled record differs in any target.
    pub fn is_consistent(&self) -> bool {
        self.mismatches.is_empty()
    }

    /// Returns the mismatches found in `target`.
    pub fn mismatches_in<'a>(&'a self, target: &'a str) -> impl Iterator<Item = &'a Mismatch<K>> {
        self.mismatches
            .iter()
            .filter(move |mismatch| mismatch.target() == target)
    }
}
