//! The per-entity input context: primary series, auxiliary series, configuration
//! scalars and everything derived from them during extraction.

use super::series::TimeSeries;
use super::types::{Data, Namespace};
use crate::compute::ledger::MemoStore;
use crate::config::EntityConfig;
use thiserror::Error;

/// Name under which the primary series is stored.
pub const CONSUMPTION: &str = "consumption";
/// Name under which the auxiliary temperature series is stored.
pub const TEMPERATURE: &str = "temperature";

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ContextError {
    #[error("primary series needs at least two samples, got {0}")]
    TooShort(usize),
    #[error("series has {timestamps} timestamps but {values} values")]
    LengthMismatch { timestamps: usize, values: usize },
    #[error("timestamps must be strictly increasing (sample {index})")]
    Unordered { index: usize },
}

#[derive(Debug, Clone)]
pub struct InputContext {
    entity_id: Option<String>,
    interval_minutes: f64,
    data: MemoStore<Data>,
}

impl InputContext {
    pub fn new(consumption: TimeSeries) -> Result<Self, ContextError> {
        let interval_minutes = consumption
            .interval_minutes()
            .ok_or(ContextError::TooShort(consumption.len()))?;
        if interval_minutes <= 0.0 {
            return Err(ContextError::Unordered { index: 1 });
        }
        let mut data = MemoStore::new(Namespace::Data);
        data.insert(CONSUMPTION, consumption.into());
        Ok(Self { entity_id: None, interval_minutes, data })
    }

    pub fn with_temperature(mut self, temperature: TimeSeries) -> Self {
        self.data.insert(TEMPERATURE, temperature.into());
        self
    }

    pub fn with_scalar(mut self, name: &str, value: f64) -> Self {
        self.data.insert(name, Data::Scalar(value));
        self
    }

    pub fn with_entity_id(mut self, id: impl Into<String>) -> Self {
        self.entity_id = Some(id.into());
        self
    }

    /// Copies every configured value into the context.
    pub fn with_config(mut self, config: &EntityConfig) -> Self {
        if let Some(id) = config.id.as_ref().or(config.name.as_ref()) {
            self.entity_id = Some(id.clone());
        }
        for (name, value) in config.entries() {
            self.data.insert(&name, value);
        }
        self
    }

    pub fn entity_id(&self) -> Option<&str> { self.entity_id.as_deref() }

    /// Sampling interval of the primary series in minutes.
    pub fn interval_minutes(&self) -> f64 { self.interval_minutes }

    pub fn get(&self, name: &str) -> Option<&Data> { self.data.get(name) }

    pub fn contains(&self, name: &str) -> bool { self.data.contains(name) }

    /// Adds a derived entry. Existing entries are kept; returns whether the write happened.
    pub fn insert(&mut self, name: &str, value: Data) -> bool {
        self.data.insert(name, value)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> { self.data.names() }
}
