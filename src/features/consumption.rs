//! Consumption levels: period means, extremes and their distance from the overall minimum.
use super::{masked, register_all};
use crate::compute::bindings::BodyError;
use crate::compute::kernel;
use crate::store::context::CONSUMPTION;
use crate::store::registry::{Catalog, CatalogError, Computation};
use crate::store::types::{DAY, HOUR, WEEK};

fn mean(name: &str, masks: &'static [&'static str]) -> Computation {
    masked(name, masks, kernel::mean)
}

/// `feature - c_min`.
fn above_min(name: &str, feature: &'static str) -> Computation {
    Computation::feature(name, move |b| Ok(b.feature(feature)? - b.feature("c_min")?))
        .needs_features(&["c_min", feature])
        .max_interval(HOUR)
}

/// Mean over days of a per-day reduction of the readings.
fn daily_mean(name: &str, reduce: fn(&[f64]) -> Result<f64, BodyError>) -> Computation {
    Computation::feature(name, move |b| {
        let days = b.consumption()?.daily(|day| reduce(day).unwrap_or(f64::NAN));
        let per_day: Vec<f64> = days.into_iter().map(|(_, v)| v).collect();
        kernel::mean(&per_day)
    })
    .needs_data(&[CONSUMPTION])
    .max_interval(DAY)
}

pub(crate) fn register(catalog: &mut Catalog) -> Result<(), CatalogError> {
    register_all(
        catalog,
        [
            Computation::feature("c_week", |b| kernel::mean(&b.consumption()?.weekly_sums()))
                .needs_data(&[CONSUMPTION])
                .max_interval(WEEK)
                .doc("average consumption throughout the week"),
            mean("c_morning", &["mornings"]).max_interval(HOUR).doc("average morning consumption"),
            mean("c_noon", &["noons"]).max_interval(HOUR).doc("average lunchtime consumption"),
            mean("c_afternoon", &["afternoons"]).max_interval(HOUR).doc("average afternoon consumption"),
            mean("c_evening", &["evenings"]).max_interval(HOUR).doc("average evening consumption"),
            mean("c_night", &["nights"]).max_interval(HOUR).doc("average night consumption"),
            mean("c_weekday", &["weekdays"]).max_interval(DAY).doc("average weekday consumption"),
            mean("c_wd_morning", &["weekdays", "mornings"]).max_interval(HOUR).doc("average weekday morning consumption"),
            mean("c_wd_noon", &["weekdays", "noons"]).max_interval(HOUR).doc("average weekday lunchtime consumption"),
            mean("c_wd_afternoon", &["weekdays", "afternoons"]).max_interval(HOUR).doc("average weekday afternoon consumption"),
            mean("c_wd_evening", &["weekdays", "evenings"]).max_interval(HOUR).doc("average weekday evening consumption"),
            mean("c_wd_night", &["weekdays", "nights"]).max_interval(HOUR).doc("average weekday night consumption"),
            mean("c_weekend", &["weekends"]).max_interval(DAY).doc("average weekend consumption"),
            mean("c_we_morning", &["weekends", "mornings"]).max_interval(HOUR).doc("average weekend morning consumption"),
            mean("c_we_noon", &["weekends", "noons"]).max_interval(HOUR).doc("average weekend lunchtime consumption"),
            mean("c_we_afternoon", &["weekends", "afternoons"]).max_interval(HOUR).doc("average weekend afternoon consumption"),
            mean("c_we_evening", &["weekends", "evenings"]).max_interval(HOUR).doc("average weekend evening consumption"),
            mean("c_we_night", &["weekends", "nights"]).max_interval(HOUR).doc("average weekend night consumption"),
            above_min("c_morning_no_min", "c_morning").doc("c_morning with the minimum deducted"),
            above_min("c_noon_no_min", "c_noon").doc("c_noon with the minimum deducted"),
            above_min("c_afternoon_no_min", "c_afternoon").doc("c_afternoon with the minimum deducted"),
            above_min("c_evening_no_min", "c_evening").doc("c_evening with the minimum deducted"),
            above_min("c_night_no_min", "c_night").doc("c_night with the minimum deducted"),
            masked("c_max", &[], kernel::max).doc("maximum consumption"),
            masked("c_min", &[], kernel::min).doc("minimum consumption"),
            mean("c_ht", &["hts"]).max_interval(HOUR).doc("average high-tariff consumption"),
            mean("c_nt", &["nts"]).max_interval(HOUR).doc("average low-tariff consumption"),
            mean("c_wd_ht", &["weekdays", "hts"]).max_interval(HOUR).doc("average consumption on weekdays during hts"),
            mean("c_wd_nt", &["weekdays", "nts"]).max_interval(HOUR).doc("average consumption on weekdays during nts"),
            mean("c_we_ht", &["weekends", "hts"]).max_interval(HOUR).doc("average consumption on weekends during hts"),
            mean("c_we_nt", &["weekends", "nts"]).max_interval(HOUR).doc("average consumption on weekends during nts"),
            masked("c_ht_max", &["hts"], kernel::max).max_interval(HOUR).doc("maximum of ht consumption"),
            masked("c_nt_max", &["nts"], kernel::max).max_interval(HOUR).doc("maximum of nt consumption"),
            masked("c_ht_min", &["hts"], kernel::min).max_interval(HOUR).doc("minimum of ht consumption"),
            masked("c_nt_min", &["nts"], kernel::min).max_interval(HOUR).doc("minimum of nt consumption"),
            daily_mean("c_max_avg", kernel::max).doc("average daily maximum"),
            daily_mean("c_min_avg", kernel::min).doc("average daily minimum"),
            Computation::feature("c_sm_max", |b| {
                let width = b.count("neighborhood_width")?;
                kernel::max(&kernel::uniform_filter(b.consumption()?.values(), width))
            })
            .needs_data(&[CONSUMPTION, "neighborhood_width"])
            .doc("maximum with simple smoothing"),
        ],
    )
}

#[cfg(test)]
mod tests {
    use crate::compute::engine::extract_named;
    use crate::features::{fixtures, standard_catalog};

    #[test]
    fn test_period_means_and_deducted_minimum() {
        let catalog = standard_catalog().unwrap();
        // Reading equals the hour of day, plus 100 on weekends.
        let mut ctx = fixtures::context(7, |i| (i % 96 / 4) as f64 + if i >= 5 * 96 { 100.0 } else { 0.0 });
        let out = extract_named(
            &catalog,
            &mut ctx,
            ["c_evening", "c_wd_evening", "c_we_evening", "c_evening_no_min", "c_min", "c_max"],
        );
        assert!(out.failures.is_empty(), "{:?}", out.failures);

        let wd = (18.0 + 19.0 + 20.0 + 21.0) / 4.0;
        assert_eq!(out.get("c_wd_evening"), Some(wd));
        assert_eq!(out.get("c_we_evening"), Some(wd + 100.0));
        assert!((out.get("c_evening").unwrap() - (wd + 200.0 / 7.0)).abs() < 1e-9);
        assert_eq!(out.get("c_min"), Some(0.0));
        assert_eq!(out.get("c_max"), Some(123.0));
        assert_eq!(out.get("c_evening_no_min"), out.get("c_evening"));
    }

    #[test]
    fn test_weekly_sum_mean() {
        let catalog = standard_catalog().unwrap();
        let mut ctx = fixtures::context(14, |_| 0.5);
        let out = extract_named(&catalog, &mut ctx, ["c_week", "c_max_avg", "c_sm_max"]);
        assert_eq!(out.get("c_week"), Some(0.5 * 672.0));
        assert_eq!(out.get("c_max_avg"), Some(0.5));
        assert!((out.get("c_sm_max").unwrap() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_empty_selection_fails_instead_of_nan() {
        let catalog = standard_catalog().unwrap();
        // Two weekdays only: no weekend samples.
        let mut ctx = fixtures::context(2, |_| 1.0);
        let out = extract_named(&catalog, &mut ctx, ["c_weekend", "c_weekday"]);
        assert_eq!(out.failures.len(), 1);
        assert!(out.failure("c_weekend").unwrap().reason.contains("empty"));
        assert_eq!(out.get("c_weekday"), Some(1.0));
    }
}
