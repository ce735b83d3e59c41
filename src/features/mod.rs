//! The standard load-profile catalog.
//!
//! Time-of-day masks come from the configured boundary hours, so a context built from an
//! entity's configuration carries everything the hourly features need.
pub mod consumption;
pub mod derived;
pub mod ratios;
pub mod statistics;
pub mod timing;
pub mod weather;

use crate::compute::bindings::{ratio, Bindings, BodyError};
use crate::store::context::CONSUMPTION;
use crate::store::registry::{Catalog, CatalogError, Computation};

/// Every derivation and feature this crate knows how to compute.
pub fn standard_catalog() -> Result<Catalog, CatalogError> {
    let mut catalog = Catalog::new();
    derived::register(&mut catalog)?;
    consumption::register(&mut catalog)?;
    ratios::register(&mut catalog)?;
    statistics::register(&mut catalog)?;
    timing::register(&mut catalog)?;
    weather::register(&mut catalog)?;
    Ok(catalog)
}

pub(crate) fn register_all(
    catalog: &mut Catalog,
    entries: impl IntoIterator<Item = Computation>,
) -> Result<(), CatalogError> {
    for computation in entries {
        catalog.register(computation)?;
    }
    Ok(())
}

/// Consumption readings at the positions where every mask in `masks` is set.
pub(crate) fn selected(b: &Bindings<'_>, masks: &[&str]) -> Result<Vec<f64>, BodyError> {
    let series = b.consumption()?;
    let mut keep = vec![true; series.len()];
    for name in masks {
        let mask = b.mask(name)?;
        if mask.len() != keep.len() {
            return Err(BodyError::Domain(format!(
                "mask '{}' has {} entries, series has {}",
                name,
                mask.len(),
                keep.len()
            )));
        }
        keep.iter_mut().zip(mask).for_each(|(k, m)| *k &= *m);
    }
    Ok(series.masked(&keep))
}

/// A reduction of the consumption readings selected by `masks`.
pub(crate) fn masked(
    name: &str,
    masks: &'static [&'static str],
    reduce: fn(&[f64]) -> Result<f64, BodyError>,
) -> Computation {
    let mut deps = vec![CONSUMPTION];
    deps.extend_from_slice(masks);
    Computation::feature(name, move |b| reduce(&selected(b, masks)?)).needs_data(&deps)
}

/// `num / den` of two other features.
pub(crate) fn quotient(name: &str, num: &'static str, den: &'static str) -> Computation {
    Computation::feature(name, move |b| ratio(b.feature(num)?, b.feature(den)?, den))
        .needs_features(&[num, den])
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::config::EntityConfig;
    use crate::store::context::InputContext;
    use crate::store::series::TimeSeries;
    use chrono::{NaiveDate, NaiveDateTime};

    pub fn monday() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2018, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap()
    }

    pub fn config() -> EntityConfig {
        EntityConfig::from_json_str(
            r#"{
                "id": "test-entity",
                "morning_start": 6, "morning_end": 10,
                "noon_start": 10, "noon_end": 14,
                "afternoon_start": 14, "afternoon_end": 18,
                "evening_start": 18, "evening_end": 22,
                "night_start": 0, "night_end": 6,
                "nt_start": 0, "nt_end": 6,
                "ht_start": 6, "ht_end": 24,
                "neighborhood_width": 3
            }"#,
        )
        .unwrap()
    }

    /// `days` days of 15-minute readings from `load(sample_index)`.
    pub fn context(days: usize, load: impl Fn(usize) -> f64) -> InputContext {
        let values = (0..days * 96).map(load).collect();
        InputContext::new(TimeSeries::regular(monday(), 15, values)).unwrap().with_config(&config())
    }

    /// A context with a temperature series of the same timestamps.
    pub fn context_with_temperature(
        days: usize,
        load: impl Fn(usize) -> f64,
        temperature: impl Fn(usize) -> f64,
    ) -> InputContext {
        let temps = (0..days * 96).map(temperature).collect();
        context(days, load).with_temperature(TimeSeries::regular(monday(), 15, temps))
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures;
    use super::*;
    use crate::analysis::topology;
    use crate::compute::engine::{extract_all, extract_named};
    use crate::compute::ledger::ErrorKind;

    #[test]
    fn test_standard_catalog_is_consistent() {
        let catalog = standard_catalog().unwrap();
        assert!(catalog.len() > 100);
        assert_eq!(topology::validate(&catalog), Ok(()));
        assert!(catalog.feature_names().all(|n| !catalog.describe(n).unwrap_or("").is_empty()));
    }

    #[test]
    fn test_morning_mean_end_to_end() {
        // One day at 15 minutes; the reading is the hour of day, so 6..10 averages to 7.5.
        let catalog = standard_catalog().unwrap();
        let mut ctx = fixtures::context(1, |i| (i / 4) as f64);
        let out = extract_named(&catalog, &mut ctx, ["c_morning"]);
        assert!(out.failures.is_empty(), "{:?}", out.failures);
        assert!((out.get("c_morning").unwrap() - 7.5).abs() < 1e-12);
        assert!(ctx.contains("mornings"));
        assert!(ctx.contains("hours"));
    }

    #[test]
    fn test_daily_series_gates_hourly_features() {
        let catalog = standard_catalog().unwrap();
        let start = fixtures::monday();
        let series = crate::store::series::TimeSeries::regular(start, 1440, vec![1.0; 21]);
        let mut ctx = crate::store::context::InputContext::new(series).unwrap().with_config(&fixtures::config());
        let out = extract_named(&catalog, &mut ctx, ["c_morning", "c_weekday", "c_max"]);
        assert_eq!(out.failures.len(), 1);
        assert_eq!(out.failure("c_morning").unwrap().kind, ErrorKind::Granularity);
        assert_eq!(out.get("c_weekday"), Some(1.0));
        assert!(!ctx.contains("mornings"));
    }

    #[test]
    fn test_extract_all_is_deterministic() {
        let catalog = standard_catalog().unwrap();
        let load = |i: usize| 1.0 + ((i % 96) as f64 / 8.0).sin().abs() + (i % 7) as f64 * 0.1;
        let temp = |i: usize| 10.0 + ((i % 96) as f64 / 15.0).cos() * 5.0;
        let first = extract_all(&catalog, &mut fixtures::context_with_temperature(14, load, temp));
        let second = extract_all(&catalog, &mut fixtures::context_with_temperature(14, load, temp));
        assert_eq!(first, second);
        assert_eq!(first.entity_id.as_deref(), Some("test-entity"));
        assert!(first.features.len() > 60);
        for record in &first.failures {
            assert!(!first.features.contains_key(&record.name));
        }
    }
}
