//! Inputs and definitions: time series, the per-entity context and the computation catalog.
pub mod context;
pub mod registry;
pub mod series;
pub mod types;

pub use context::{ContextError, InputContext, CONSUMPTION, TEMPERATURE};
pub use registry::{Catalog, CatalogError, Computation};
pub use series::TimeSeries;
pub use types::{Data, FeatureValue, Namespace};
