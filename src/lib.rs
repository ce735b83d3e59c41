//! Lazy, memoized feature extraction from load profiles.
//!
//! A [`Catalog`] names every data derivation and feature along with what each one needs.
//! Extraction evaluates requested features against an [`InputContext`], generating missing
//! dependencies on demand, computing each name at most once and recording failures per
//! feature instead of aborting the run.

pub mod analysis;
pub mod batch;
pub mod bindings;
pub mod compute;
pub mod config;
pub mod display;
pub mod features;
pub mod solver;
pub mod store;

pub use batch::{extract_many, EntityInput, FeatureTable, Request};
pub use compute::engine::{extract_all, extract_named, Engine, Extraction};
pub use compute::ledger::{ErrorKind, ExtractionError, FailureRecord};
pub use config::{ConfigError, EntityConfig};
pub use features::standard_catalog;
pub use store::{Catalog, CatalogError, Computation, Data, FeatureValue, InputContext, TimeSeries};

#[cfg(feature = "python")]
use pyo3::prelude::*;

/// The `_core` Python module.
#[cfg(feature = "python")]
#[pymodule]
fn _core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    bindings::python::register(m)
}
