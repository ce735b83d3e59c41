//! Call-scoped dependency bindings handed to a computation body.
//!
//! Every evaluation builds its own `Bindings` from the values it resolved, so nested
//! evaluations never see each other's inputs.

use crate::solver::FitError;
use crate::store::context::{CONSUMPTION, TEMPERATURE};
use crate::store::series::TimeSeries;
use crate::store::types::{Data, FeatureValue};
use std::collections::HashMap;
use thiserror::Error;

/// Why a computation body could not produce its value.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BodyError {
    #[error("selection is empty")]
    EmptySelection,
    #[error("division by zero: {0}")]
    DivisionByZero(String),
    #[error("needs at least {needed} samples, got {got}")]
    InsufficientSamples { needed: usize, got: usize },
    #[error("curve fit did not converge: {0}")]
    NotConverged(String),
    #[error("'{name}' is not bound as {expected}")]
    Binding { name: String, expected: &'static str },
    #[error("{0}")]
    Domain(String),
    #[error("panicked: {0}")]
    Panicked(String),
}

impl From<FitError> for BodyError {
    fn from(e: FitError) -> Self {
        match e {
            FitError::TooFewPoints { needed, got } => BodyError::InsufficientSamples { needed, got },
            other => BodyError::NotConverged(other.to_string()),
        }
    }
}

/// `num / den`, failing on a zero denominator.
pub fn ratio(num: f64, den: f64, what: &str) -> Result<f64, BodyError> {
    if den == 0.0 {
        return Err(BodyError::DivisionByZero(what.to_string()));
    }
    Ok(num / den)
}

#[derive(Debug)]
pub struct Bindings<'a> {
    owner: &'a str,
    interval_minutes: f64,
    data: HashMap<&'a str, Data>,
    features: HashMap<&'a str, FeatureValue>,
}

impl<'a> Bindings<'a> {
    pub fn new(owner: &'a str, interval_minutes: f64) -> Self {
        Self { owner, interval_minutes, data: HashMap::new(), features: HashMap::new() }
    }

    pub fn bind_data(&mut self, name: &'a str, value: Data) {
        self.data.insert(name, value);
    }

    pub fn bind_feature(&mut self, name: &'a str, value: FeatureValue) {
        self.features.insert(name, value);
    }

    /// The computation these bindings were built for.
    pub fn owner(&self) -> &str { self.owner }

    /// Sampling interval of the primary series, in minutes.
    pub fn interval_minutes(&self) -> f64 { self.interval_minutes }

    fn unbound(name: &str, expected: &'static str) -> BodyError {
        BodyError::Binding { name: name.to_string(), expected }
    }

    pub fn data(&self, name: &str) -> Result<&Data, BodyError> {
        self.data.get(name).ok_or_else(|| Self::unbound(name, "data"))
    }

    pub fn series(&self, name: &str) -> Result<&TimeSeries, BodyError> {
        match self.data(name)? {
            Data::Series(s) => Ok(&**s),
            _ => Err(Self::unbound(name, "series")),
        }
    }

    pub fn consumption(&self) -> Result<&TimeSeries, BodyError> { self.series(CONSUMPTION) }
    pub fn temperature(&self) -> Result<&TimeSeries, BodyError> { self.series(TEMPERATURE) }

    pub fn mask(&self, name: &str) -> Result<&[bool], BodyError> {
        match self.data(name)? {
            Data::Mask(m) => Ok(&**m),
            _ => Err(Self::unbound(name, "mask")),
        }
    }

    pub fn labels(&self, name: &str) -> Result<&[u32], BodyError> {
        match self.data(name)? {
            Data::Labels(l) => Ok(&**l),
            _ => Err(Self::unbound(name, "labels")),
        }
    }

    pub fn scalar(&self, name: &str) -> Result<f64, BodyError> {
        match self.data(name)? {
            Data::Scalar(v) => Ok(*v),
            Data::Count(c) => Ok(*c as f64),
            _ => Err(Self::unbound(name, "scalar")),
        }
    }

    pub fn count(&self, name: &str) -> Result<usize, BodyError> {
        match self.data(name)? {
            Data::Count(c) => Ok(*c),
            Data::Scalar(v) if *v >= 0.0 && v.fract() == 0.0 => Ok(*v as usize),
            _ => Err(Self::unbound(name, "count")),
        }
    }

    pub fn feature(&self, name: &str) -> Result<f64, BodyError> {
        self.features
            .get(name)
            .map(FeatureValue::as_f64)
            .ok_or_else(|| Self::unbound(name, "feature"))
    }
}

/// Collects the secondary results a body writes besides its own value.
#[derive(Debug, Default)]
pub struct Emitter {
    values: Vec<(String, FeatureValue)>,
}

impl Emitter {
    pub fn new() -> Self { Self::default() }

    pub fn emit(&mut self, name: &str, value: impl Into<FeatureValue>) {
        self.values.push((name.to_string(), value.into()));
    }

    pub fn into_values(self) -> Vec<(String, FeatureValue)> { self.values }
}
