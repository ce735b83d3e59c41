//! Data derivations: calendar labels, time-of-day masks, sample counts and the average week.
use super::register_all;
use crate::compute::bindings::{Bindings, BodyError};
use crate::store::context::CONSUMPTION;
use crate::store::registry::{Catalog, CatalogError, Computation};
use crate::store::series::TimeSeries;
use crate::store::types::{Data, DAY, HOUR, WEEK};

/// Samples per `span` minutes at the binding's interval.
fn per_span(b: &Bindings<'_>, span: f64) -> Result<f64, BodyError> {
    let interval = b.interval_minutes();
    if interval <= 0.0 {
        return Err(BodyError::Domain(format!("sampling interval is {} min", interval)));
    }
    Ok(span / interval)
}

/// Samples whose hour falls in `[start, end)`.
fn hour_window(name: &str, start: &'static str, end: &'static str) -> Computation {
    Computation::data(name, move |b| {
        let (lo, hi) = (b.scalar(start)?, b.scalar(end)?);
        let hours = b.labels("hours")?;
        // A window whose start lies after its end spans midnight.
        let inside = |h: f64| if lo <= hi { h >= lo && h < hi } else { h >= lo || h < hi };
        Ok(hours.iter().map(|&h| inside(f64::from(h))).collect::<Vec<bool>>())
    })
    .needs_data(&["hours", start, end])
    .max_interval(HOUR)
}

fn average_week(b: &Bindings<'_>) -> Result<Data, BodyError> {
    let series = b.consumption()?;
    let weeks = b.count("n_weeks")?;
    let width = b.count("samples_in_week")?;
    if weeks == 0 || width == 0 {
        return Err(BodyError::InsufficientSamples { needed: width.max(1), got: series.len() });
    }

    let mut totals = vec![0.0; width];
    for week in series.values()[..weeks * width].chunks_exact(width) {
        for (t, v) in totals.iter_mut().zip(week) {
            *t += if v.is_nan() { 0.0 } else { *v };
        }
    }
    let values = totals.into_iter().map(|t| t / weeks as f64).collect();
    let timestamps = series.timestamps()[..width].to_vec();
    TimeSeries::new(timestamps, values)
        .map(Data::from)
        .map_err(|e| BodyError::Domain(e.to_string()))
}

pub(crate) fn register(catalog: &mut Catalog) -> Result<(), CatalogError> {
    register_all(
        catalog,
        [
            Computation::data("days", |b| Ok(b.consumption()?.weekdays()))
                .needs_data(&[CONSUMPTION])
                .max_interval(DAY)
                .doc("day of week per sample, Monday = 0"),
            Computation::data("weekdays", |b| {
                Ok(b.labels("days")?.iter().map(|&d| d < 5).collect::<Vec<bool>>())
            })
            .needs_data(&[CONSUMPTION, "days"])
            .max_interval(DAY)
            .doc("samples falling on Monday to Friday"),
            Computation::data("weekends", |b| {
                Ok(b.labels("days")?.iter().map(|&d| d >= 5).collect::<Vec<bool>>())
            })
            .needs_data(&[CONSUMPTION, "days"])
            .max_interval(DAY)
            .doc("samples falling on Saturday or Sunday"),
            Computation::data("samples_in_day", |b| Ok(Data::Count(per_span(b, DAY)? as usize)))
                .max_interval(DAY)
                .doc("number of samples in one day"),
            Computation::data("samples_in_week", |b| Ok(Data::Count(per_span(b, WEEK)? as usize)))
                .needs_data(&[CONSUMPTION])
                .max_interval(WEEK)
                .doc("number of samples in one week"),
            Computation::data("n_days", |b| {
                let len = b.consumption()?.len() as f64;
                Ok(Data::Count((len / per_span(b, DAY)?) as usize))
            })
            .needs_data(&[CONSUMPTION])
            .doc("number of whole days covered by the series"),
            Computation::data("n_weeks", |b| {
                let len = b.consumption()?.len() as f64;
                Ok(Data::Count((len / per_span(b, WEEK)?) as usize))
            })
            .needs_data(&[CONSUMPTION])
            .doc("number of whole weeks covered by the series"),
            Computation::data("average_week", average_week)
                .needs_data(&[CONSUMPTION, "n_weeks", "samples_in_week"])
                .max_interval(DAY)
                .doc("sample-wise mean over all whole weeks, stamped with the first week's times"),
            Computation::data("hours", |b| Ok(b.consumption()?.hours()))
                .needs_data(&[CONSUMPTION])
                .max_interval(DAY)
                .doc("hour of day per sample"),
            hour_window("mornings", "morning_start", "morning_end").doc("morning samples"),
            hour_window("noons", "noon_start", "noon_end").doc("lunchtime samples"),
            hour_window("afternoons", "afternoon_start", "afternoon_end").doc("afternoon samples"),
            hour_window("evenings", "evening_start", "evening_end").doc("evening samples"),
            hour_window("nights", "night_start", "night_end").doc("night samples"),
            hour_window("nts", "nt_start", "nt_end").doc("low-tariff samples"),
            hour_window("hts", "ht_start", "ht_end").doc("high-tariff samples"),
        ],
    )
}

#[cfg(test)]
mod tests {
    use crate::compute::engine::extract_named;
    use crate::features::{fixtures, standard_catalog};
    use crate::store::types::Data;

    #[test]
    fn test_derivations_are_written_to_the_context() {
        let catalog = standard_catalog().unwrap();
        let mut ctx = fixtures::context(14, |i| (i % 672) as f64);
        let out = extract_named(&catalog, &mut ctx, ["s_max"]);
        assert!(out.failures.is_empty(), "{:?}", out.failures);

        assert!(matches!(ctx.get("n_weeks"), Some(Data::Count(2))));
        assert!(matches!(ctx.get("samples_in_week"), Some(Data::Count(672))));
        match ctx.get("average_week") {
            Some(Data::Series(week)) => {
                assert_eq!(week.len(), 672);
                assert_eq!(week.values()[10], 10.0);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_weekend_mask_follows_calendar() {
        let catalog = standard_catalog().unwrap();
        let mut ctx = fixtures::context(7, |_| 1.0);
        extract_named(&catalog, &mut ctx, ["c_weekend"]);
        match ctx.get("weekends") {
            Some(Data::Mask(mask)) => {
                assert_eq!(mask.iter().filter(|m| **m).count(), 2 * 96);
                assert!(!mask[0]);
                assert!(mask[5 * 96]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_window_across_midnight_wraps() {
        let catalog = standard_catalog().unwrap();
        let series = crate::store::series::TimeSeries::regular(fixtures::monday(), 15, vec![1.0; 96]);
        let mut ctx = crate::store::context::InputContext::new(series)
            .unwrap()
            .with_scalar("nt_start", 22.0)
            .with_scalar("nt_end", 6.0);
        extract_named(&catalog, &mut ctx, ["c_nt"]);
        match ctx.get("nts") {
            Some(Data::Mask(mask)) => {
                assert_eq!(mask.iter().filter(|m| **m).count(), 8 * 4);
                assert!(mask[0] && mask[23 * 4] && !mask[12 * 4]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_missing_boundary_is_missing_data() {
        let catalog = standard_catalog().unwrap();
        let start = fixtures::monday();
        let series = crate::store::series::TimeSeries::regular(start, 15, vec![1.0; 96]);
        let mut ctx = crate::store::context::InputContext::new(series).unwrap();
        let out = extract_named(&catalog, &mut ctx, ["c_morning"]);
        assert_eq!(out.failures.len(), 1);
        assert_eq!(out.failures[0].kind, crate::compute::ledger::ErrorKind::MissingData);
        assert!(out.failures[0].reason.contains("morning_start"));
    }
}
