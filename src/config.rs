//! Per-entity configuration: time-of-day boundaries, smoothing width and any further
//! numeric settings, loaded from the entity's JSON metadata.

use crate::store::types::Data;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;
use tracing::warn;

/// Keys with a dedicated field, in the order their entries are produced.
pub const SETTINGS: [&str; 15] = [
    "morning_start",
    "morning_end",
    "noon_start",
    "noon_end",
    "afternoon_start",
    "afternoon_end",
    "evening_start",
    "evening_end",
    "night_start",
    "night_end",
    "ht_start",
    "ht_end",
    "nt_start",
    "nt_end",
    "neighborhood_width",
];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io { path: String, source: std::io::Error },
    #[error("failed to parse config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub morning_start: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub morning_end: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub noon_start: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub noon_end: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub afternoon_start: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub afternoon_end: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evening_start: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evening_end: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub night_start: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub night_end: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ht_start: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ht_end: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nt_start: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nt_end: Option<f64>,
    /// Samples on each side considered when looking for peaks and when smoothing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub neighborhood_width: Option<usize>,
    /// Any other setting. Numeric values are exposed to computations under their key.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl EntityConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: EntityConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.display().to_string(), source })?;
        Self::from_json_str(&content)
    }

    fn boundaries(&self) -> impl Iterator<Item = (&'static str, Option<f64>)> {
        let hours = [
            self.morning_start,
            self.morning_end,
            self.noon_start,
            self.noon_end,
            self.afternoon_start,
            self.afternoon_end,
            self.evening_start,
            self.evening_end,
            self.night_start,
            self.night_end,
            self.ht_start,
            self.ht_end,
            self.nt_start,
            self.nt_end,
        ];
        SETTINGS.into_iter().zip(hours)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, hour) in self.boundaries() {
            if let Some(h) = hour {
                if !(0.0..=24.0).contains(&h) {
                    return Err(ConfigError::Invalid(format!("{} must be an hour in [0, 24], got {}", name, h)));
                }
            }
        }
        if self.neighborhood_width == Some(0) {
            return Err(ConfigError::Invalid("neighborhood_width must be at least 1".into()));
        }
        Ok(())
    }

    /// Every configured value as a context entry.
    pub fn entries(&self) -> Vec<(String, Data)> {
        let mut entries: Vec<(String, Data)> = self
            .boundaries()
            .filter_map(|(name, hour)| hour.map(|h| (name.to_string(), Data::Scalar(h))))
            .collect();
        if let Some(width) = self.neighborhood_width {
            entries.push(("neighborhood_width".to_string(), Data::Count(width)));
        }
        for (key, value) in &self.extra {
            match value.as_f64() {
                Some(v) => entries.push((key.clone(), Data::Scalar(v))),
                None => warn!("config entry '{}' is not numeric, ignoring", key),
            }
        }
        entries
    }
}
