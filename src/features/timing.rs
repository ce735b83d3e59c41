//! Timing markers: when the load peaks and how long it stays above the base load.
use super::register_all;
use crate::compute::bindings::{ratio, Bindings, BodyError};
use crate::compute::kernel;
use crate::store::context::CONSUMPTION;
use crate::store::registry::{Catalog, CatalogError, Computation};
use crate::store::types::DAY;

/// The average week's first day.
fn first_day(b: &Bindings<'_>) -> Result<Vec<f64>, BodyError> {
    let week = b.series("average_week")?.values();
    let day = b.count("samples_in_day")?;
    week.get(..day)
        .map(<[f64]>::to_vec)
        .ok_or(BodyError::InsufficientSamples { needed: day, got: week.len() })
}

fn width_of_peaks(b: &Bindings<'_>) -> Result<f64, BodyError> {
    let values = b.consumption()?.values();
    let peaks = kernel::find_peaks(values);
    let widths: Vec<f64> = peaks.iter().map(|&p| kernel::peak_width(values, p)).collect();
    kernel::mean(&widths)
}

fn above_base(b: &Bindings<'_>) -> Result<(Vec<f64>, f64), BodyError> {
    let base = b.feature("c_base_guess")?;
    let values = b.consumption()?.values();
    Ok((values.iter().copied().filter(|v| *v > base).collect(), base))
}

pub(crate) fn register(catalog: &mut Catalog) -> Result<(), CatalogError> {
    register_all(
        catalog,
        [
            Computation::feature("t_above_mean", |b| {
                let week = b.series("average_week")?.values();
                let mean = kernel::mean(week)?;
                Ok(week.iter().filter(|v| **v > mean).count())
            })
            .needs_data(&[CONSUMPTION, "average_week"])
            .max_interval(DAY)
            .doc("number of samples of the average week above its mean"),
            Computation::feature("t_daily_max", |b| kernel::argmax(&first_day(b)?))
                .needs_data(&[CONSUMPTION, "average_week", "samples_in_day"])
                .max_interval(DAY)
                .doc("sample index of the first day's maximum in the average week"),
            Computation::feature("t_daily_min", |b| kernel::argmin(&first_day(b)?))
                .needs_data(&[CONSUMPTION, "average_week", "samples_in_day"])
                .max_interval(DAY)
                .doc("sample index of the first day's minimum in the average week"),
            Computation::feature("t_width_peaks", width_of_peaks)
                .needs_data(&[CONSUMPTION])
                .doc("average width of the peaks at half prominence"),
            Computation::feature("c_base_guess", |b| {
                let minima: Vec<f64> = b.consumption()?.daily(|d| kernel::min(d).unwrap_or(f64::NAN)).into_iter().map(|(_, v)| v).collect();
                kernel::median(&minima)
            })
            .needs_data(&[CONSUMPTION])
            .max_interval(DAY)
            .doc("estimated base load"),
            Computation::feature("t_const_time", |b| {
                let base = b.feature("c_base_guess")?;
                Ok(b.consumption()?.values().iter().filter(|v| **v <= base).count())
            })
            .needs_data(&[CONSUMPTION])
            .needs_features(&["c_base_guess"])
            .max_interval(DAY)
            .doc("estimated time of base load"),
            Computation::feature("t_first_above_base", |b| {
                let base = b.feature("c_base_guess")?;
                b.consumption()?.values().iter().position(|v| *v > base).ok_or(BodyError::EmptySelection)
            })
            .needs_data(&[CONSUMPTION])
            .needs_features(&["c_base_guess"])
            .max_interval(DAY)
            .doc("first crossing of a threshold assumed as a base load"),
            Computation::feature("t_above_base", |b| Ok(above_base(b)?.0.len()))
                .needs_data(&[CONSUMPTION])
                .needs_features(&["c_base_guess"])
                .max_interval(DAY)
                .doc("number of measuring points above the base load limit"),
            Computation::feature("t_percent_above_base", |b| {
                let len = b.consumption()?.len() as f64;
                ratio(b.feature("t_above_base")?, len, "series length")
            })
            .needs_data(&[CONSUMPTION])
            .needs_features(&["t_above_base"])
            .max_interval(DAY)
            .doc("proportion of the measuring points above the base load limit"),
            Computation::feature("t_value_above_base", |b| Ok(kernel::sum(&above_base(b)?.0)))
                .needs_data(&[CONSUMPTION])
                .needs_features(&["c_base_guess"])
                .max_interval(DAY)
                .doc("sum of the measuring points above the base load limit"),
        ],
    )
}

#[cfg(test)]
mod tests {
    use crate::compute::engine::extract_named;
    use crate::features::{fixtures, standard_catalog};
    use crate::store::types::FeatureValue;

    #[test]
    fn test_base_load_markers() {
        let catalog = standard_catalog().unwrap();
        // Base load 1, with a 2-hour block of 5 starting at 08:00 every day.
        let mut ctx = fixtures::context(7, |i| if (32..40).contains(&(i % 96)) { 5.0 } else { 1.0 });
        let out = extract_named(
            &catalog,
            &mut ctx,
            ["t_percent_above_base", "t_first_above_base", "t_value_above_base", "t_daily_max", "t_const_time"],
        );
        assert!(out.failures.is_empty(), "{:?}", out.failures);
        assert_eq!(out.get("c_base_guess"), Some(1.0));
        assert_eq!(out.features["t_first_above_base"], FeatureValue::Count(32));
        assert_eq!(out.get("t_above_base"), Some(56.0));
        assert_eq!(out.get("t_percent_above_base"), Some(56.0 / 672.0));
        assert_eq!(out.get("t_value_above_base"), Some(280.0));
        assert_eq!(out.get("t_daily_max"), Some(32.0));
        assert_eq!(out.get("t_const_time"), Some(616.0));
    }

    #[test]
    fn test_peak_width() {
        let catalog = standard_catalog().unwrap();
        let mut ctx = fixtures::context(1, |i| match i % 8 {
            3 => 2.0,
            2 | 4 => 1.0,
            _ => 0.0,
        });
        let out = extract_named(&catalog, &mut ctx, ["t_width_peaks"]);
        assert!((out.get("t_width_peaks").unwrap() - 2.0).abs() < 1e-12);
    }
}
