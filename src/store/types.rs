//! Namespaces, computation kinds and the values stored in the context and the feature map.

use super::series::TimeSeries;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Coarsest sampling intervals used as preconditions, in minutes.
pub const HOUR: f64 = 60.0;
pub const DAY: f64 = 24.0 * 60.0;
pub const WEEK: f64 = 7.0 * 24.0 * 60.0;

/// The two result namespaces: derived inputs live in the context, outputs in the feature map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Namespace {
    Data,
    Feature,
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Namespace::Data => f.write_str("data"),
            Namespace::Feature => f.write_str("feature"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComputationKind {
    DataDerivation,
    FeatureComputation,
}

impl ComputationKind {
    pub fn namespace(&self) -> Namespace {
        match self {
            ComputationKind::DataDerivation => Namespace::Data,
            ComputationKind::FeatureComputation => Namespace::Feature,
        }
    }
}

/// A value stored in the input context.
/// Vectors are shared so binding them into a computation never copies samples.
#[derive(Debug, Clone)]
pub enum Data {
    Series(Arc<TimeSeries>),
    /// One flag per sample of the primary series.
    Mask(Arc<[bool]>),
    /// One label per sample (hour of day, day of week).
    Labels(Arc<[u32]>),
    Scalar(f64),
    Count(usize),
}

impl Data {
    pub fn type_name(&self) -> &'static str {
        match self {
            Data::Series(_) => "series",
            Data::Mask(_) => "mask",
            Data::Labels(_) => "labels",
            Data::Scalar(_) => "scalar",
            Data::Count(_) => "count",
        }
    }
}

impl From<TimeSeries> for Data {
    fn from(series: TimeSeries) -> Self {
        Data::Series(Arc::new(series))
    }
}

impl From<Vec<bool>> for Data {
    fn from(mask: Vec<bool>) -> Self {
        Data::Mask(mask.into())
    }
}

impl From<Vec<u32>> for Data {
    fn from(labels: Vec<u32>) -> Self {
        Data::Labels(labels.into())
    }
}

/// A single extracted feature.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Count(i64),
    Float(f64),
}

impl FeatureValue {
    pub fn as_f64(&self) -> f64 {
        match self {
            FeatureValue::Count(c) => *c as f64,
            FeatureValue::Float(v) => *v,
        }
    }

    pub fn is_finite(&self) -> bool {
        match self {
            FeatureValue::Count(_) => true,
            FeatureValue::Float(v) => v.is_finite(),
        }
    }
}

impl From<f64> for FeatureValue {
    fn from(v: f64) -> Self {
        FeatureValue::Float(v)
    }
}

impl From<usize> for FeatureValue {
    fn from(c: usize) -> Self {
        FeatureValue::Count(c as i64)
    }
}

impl fmt::Display for FeatureValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureValue::Count(c) => write!(f, "{}", c),
            FeatureValue::Float(v) => write!(f, "{:.4}", v),
        }
    }
}
