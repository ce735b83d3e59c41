//! Write-once result stores and the failure ledger of an extraction run.

use crate::store::types::Namespace;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::trace;

pub use self::error::{ErrorKind, ExtractionError};
mod error {
    use super::*;
    use thiserror::Error;

    #[derive(Error, Debug, Clone, PartialEq)]
    pub enum ExtractionError {
        #[error("'{name}' needs a sampling interval of at most {required} min, series has {actual} min")]
        Granularity { name: String, required: f64, actual: f64 },
        #[error("'{name}' needs data '{missing}', which is not defined")]
        MissingData { name: String, missing: String },
        #[error("'{name}' is not a known feature")]
        UnknownComputation { name: String },
        #[error("'{name}' failed: {cause}")]
        ComputationBody { name: String, cause: String },
        #[error("'{name}' needs '{dependency}': {source}")]
        DependencyFailed { name: String, dependency: String, source: Box<ExtractionError> },
        #[error("'{name}' depends on itself through {}", .path.join(" -> "))]
        DependencyCycle { name: String, path: Vec<String> },
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub enum ErrorKind {
        Granularity,
        MissingData,
        UnknownComputation,
        ComputationBody,
        DependencyCycle,
    }

    impl ExtractionError {
        /// The kind of the innermost failure of a dependency chain.
        pub fn kind(&self) -> ErrorKind {
            match self {
                ExtractionError::Granularity { .. } => ErrorKind::Granularity,
                ExtractionError::MissingData { .. } => ErrorKind::MissingData,
                ExtractionError::UnknownComputation { .. } => ErrorKind::UnknownComputation,
                ExtractionError::ComputationBody { .. } => ErrorKind::ComputationBody,
                ExtractionError::DependencyFailed { source, .. } => source.kind(),
                ExtractionError::DependencyCycle { .. } => ErrorKind::DependencyCycle,
            }
        }

        /// The computation this error was raised for.
        pub fn name(&self) -> &str {
            match self {
                ExtractionError::Granularity { name, .. }
                | ExtractionError::MissingData { name, .. }
                | ExtractionError::UnknownComputation { name }
                | ExtractionError::ComputationBody { name, .. }
                | ExtractionError::DependencyFailed { name, .. }
                | ExtractionError::DependencyCycle { name, .. } => name,
            }
        }

        /// The innermost failure of a dependency chain.
        pub fn root(&self) -> &ExtractionError {
            match self {
                ExtractionError::DependencyFailed { source, .. } => source.root(),
                other => other,
            }
        }
    }

    impl fmt::Display for ErrorKind {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            let s = match self {
                ErrorKind::Granularity => "GranularityError",
                ErrorKind::MissingData => "MissingDataError",
                ErrorKind::UnknownComputation => "UnknownComputationError",
                ErrorKind::ComputationBody => "ComputationBodyError",
                ErrorKind::DependencyCycle => "DependencyCycleError",
            };
            f.write_str(s)
        }
    }
}

/// A write-once name -> value store for one namespace.
#[derive(Debug, Clone)]
pub struct MemoStore<V> {
    namespace: Namespace,
    entries: BTreeMap<String, V>,
}

impl<V> MemoStore<V> {
    pub fn new(namespace: Namespace) -> Self {
        Self { namespace, entries: BTreeMap::new() }
    }

    pub fn namespace(&self) -> Namespace { self.namespace }

    pub fn get(&self, name: &str) -> Option<&V> { self.entries.get(name) }

    pub fn contains(&self, name: &str) -> bool { self.entries.contains_key(name) }

    /// Stores `value` unless `name` is already present. A repeated write is a no-op.
    pub fn insert(&mut self, name: &str, value: V) -> bool {
        if self.entries.contains_key(name) {
            trace!("{} '{}' already stored, ignoring write", self.namespace, name);
            return false;
        }
        self.entries.insert(name.to_string(), value);
        true
    }

    pub fn len(&self) -> usize { self.entries.len() }
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn into_inner(self) -> BTreeMap<String, V> { self.entries }
}

/// A requested name that could not be produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub name: String,
    pub kind: ErrorKind,
    pub reason: String,
}

/// Failures in the order they were first observed, at most one per name.
#[derive(Debug, Clone, Default)]
pub struct FailureLedger {
    records: Vec<FailureRecord>,
}

impl FailureLedger {
    pub fn new() -> Self { Self::default() }

    pub fn record(&mut self, name: &str, error: &ExtractionError) -> bool {
        if self.contains(name) {
            return false;
        }
        self.records.push(FailureRecord {
            name: name.to_string(),
            kind: error.kind(),
            reason: error.to_string(),
        });
        true
    }

    pub fn contains(&self, name: &str) -> bool {
        self.records.iter().any(|r| r.name == name)
    }

    pub fn len(&self) -> usize { self.records.len() }
    pub fn is_empty(&self) -> bool { self.records.is_empty() }
    pub fn iter(&self) -> impl Iterator<Item = &FailureRecord> { self.records.iter() }
    pub fn into_records(self) -> Vec<FailureRecord> { self.records }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_write_is_ignored() {
        let mut store = MemoStore::new(Namespace::Feature);
        assert!(store.insert("c_min", 1.0));
        assert!(!store.insert("c_min", 2.0));
        assert_eq!(store.get("c_min"), Some(&1.0));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_kind_follows_dependency_chain() {
        let root = ExtractionError::MissingData { name: "mornings".into(), missing: "morning_start".into() };
        let wrapped = ExtractionError::DependencyFailed {
            name: "r_morning_noon".into(),
            dependency: "c_morning".into(),
            source: Box::new(ExtractionError::DependencyFailed {
                name: "c_morning".into(),
                dependency: "mornings".into(),
                source: Box::new(root.clone()),
            }),
        };
        assert_eq!(wrapped.kind(), ErrorKind::MissingData);
        assert_eq!(wrapped.root(), &root);
        assert_eq!(wrapped.name(), "r_morning_noon");
        assert!(wrapped.to_string().contains("morning_start"));
    }

    #[test]
    fn test_ledger_keeps_first_failure_per_name() {
        let mut ledger = FailureLedger::new();
        let unknown = ExtractionError::UnknownComputation { name: "x".into() };
        assert!(ledger.record("x", &unknown));
        assert!(!ledger.record("x", &unknown));
        let records = ledger.into_records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, ErrorKind::UnknownComputation);
    }
}
