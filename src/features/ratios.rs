//! Ratios between consumption levels.
use super::{quotient, register_all};
use crate::compute::bindings::ratio;
use crate::store::registry::{Catalog, CatalogError, Computation};
use crate::store::types::{DAY, HOUR, WEEK};

/// `(num - c_min) / (den - c_min)`.
fn quotient_above_min(name: &str, num: &'static str, den: &'static str) -> Computation {
    Computation::feature(name, move |b| {
        let base = b.feature("c_min")?;
        ratio(b.feature(num)? - base, b.feature(den)? - base, den)
    })
    .needs_features(&[num, den, "c_min"])
}

pub(crate) fn register(catalog: &mut Catalog) -> Result<(), CatalogError> {
    register_all(
        catalog,
        [
            quotient("r_mean_max", "c_week", "c_max").max_interval(WEEK).doc("ratio c_week/c_max"),
            quotient("r_min_mean", "c_min", "c_week").max_interval(WEEK).doc("ratio c_min/c_week"),
            quotient("r_night_day", "c_night", "c_week").max_interval(HOUR).doc("ratio c_night/c_week"),
            quotient("r_morning_noon", "c_morning", "c_noon").max_interval(HOUR).doc("ratio c_morning/c_noon"),
            quotient("r_evening_noon", "c_evening", "c_noon").max_interval(HOUR).doc("ratio c_evening/c_noon"),
            quotient_above_min("r_mean_max_no_min", "c_week", "c_max")
                .max_interval(WEEK)
                .doc("r_mean_max (minimum is deducted in each case)"),
            quotient_above_min("r_evening_noon_no_min", "c_evening", "c_noon")
                .max_interval(HOUR)
                .doc("r_evening_noon (minimum is deducted)"),
            quotient_above_min("r_morning_noon_no_min", "c_morning", "c_noon")
                .max_interval(HOUR)
                .doc("r_morning_noon (minimum is deducted)"),
            quotient_above_min("r_day_night_no_min", "c_night", "c_week")
                .max_interval(HOUR)
                .doc("r_night_day (minimum is deducted)"),
            quotient("r_var_wd_we", "wd_var", "we_var").max_interval(DAY).doc("ratio of variance weekday/weekend"),
            quotient("r_min_wd_we", "wd_min", "we_min").max_interval(DAY).doc("ratio of the minimum weekday/weekend day"),
            quotient("r_max_wd_we", "wd_max", "we_max").max_interval(DAY).doc("ratio of the maximum weekday/weekend day"),
            quotient("r_evening_wd_we", "c_wd_evening", "c_we_evening")
                .max_interval(HOUR)
                .doc("ratio of consumption during evening, weekday/weekend day"),
            quotient("r_night_wd_we", "c_wd_night", "c_we_night")
                .max_interval(HOUR)
                .doc("ratio of consumption at night, weekday/weekend"),
            quotient("r_noon_wd_we", "c_wd_noon", "c_we_noon")
                .max_interval(HOUR)
                .doc("ratio of consumption during lunchtime, weekday/weekend"),
            quotient("r_morning_wd_we", "c_wd_morning", "c_we_morning")
                .max_interval(HOUR)
                .doc("ratio of consumption in the morning, weekday/weekend day"),
            quotient("r_afternoon_wd_we", "c_wd_afternoon", "c_we_afternoon")
                .max_interval(HOUR)
                .doc("ratio of consumption in the afternoon, weekday/weekend day"),
            quotient("r_we_night_day", "c_we_night", "c_weekend").max_interval(HOUR).doc("ratio c_we_night/c_weekend"),
            quotient("r_we_morning_noon", "c_we_morning", "c_we_noon").max_interval(HOUR).doc("ratio c_we_morning/c_we_noon"),
            quotient("r_we_evening_noon", "c_we_evening", "c_we_noon").max_interval(HOUR).doc("ratio c_we_evening/c_we_noon"),
            quotient("r_wd_night_day", "c_wd_night", "c_weekday").max_interval(HOUR).doc("ratio c_wd_night/c_weekday"),
            quotient("r_wd_morning_noon", "c_wd_morning", "c_wd_noon").max_interval(HOUR).doc("ratio c_wd_morning/c_wd_noon"),
            quotient("r_wd_evening_noon", "c_wd_evening", "c_wd_noon").max_interval(HOUR).doc("ratio c_wd_evening/c_wd_noon"),
            quotient("r_nt_wd_we", "c_wd_nt", "c_we_nt").max_interval(HOUR).doc("ratio of nt consumption weekday/weekend days"),
            quotient("r_ht_wd_we", "c_wd_ht", "c_we_ht").max_interval(HOUR).doc("ratio of ht consumption weekday/weekend days"),
            quotient("r_nt_ht", "c_ht", "c_nt").max_interval(HOUR).doc("ratio of ht/nt consumption"),
            quotient("r_we_nt_ht", "c_we_ht", "c_we_nt").max_interval(HOUR).doc("ratio of ht/nt consumption during weekends"),
            quotient("r_wd_nt_ht", "c_wd_ht", "c_wd_nt").max_interval(HOUR).doc("ratio of ht/nt consumption during weekdays"),
            quotient("r_ht_mean_max", "c_ht", "c_ht_max").max_interval(HOUR).doc("ratio of mean to maximum ht consumption"),
            quotient("r_nt_mean_max", "c_nt", "c_nt_max").max_interval(HOUR).doc("ratio of mean to maximum nt consumption"),
            quotient("r_ht_min_mean", "c_ht_min", "c_ht").max_interval(HOUR).doc("ratio of minimum to mean ht consumption"),
            quotient("r_nt_min_mean", "c_nt_min", "c_nt").max_interval(HOUR).doc("ratio of minimum to mean nt consumption"),
        ],
    )
}

#[cfg(test)]
mod tests {
    use crate::compute::engine::extract_named;
    use crate::compute::ledger::ErrorKind;
    use crate::features::{fixtures, standard_catalog};

    #[test]
    fn test_ratio_of_period_means() {
        let catalog = standard_catalog().unwrap();
        let load = |i: usize| match i {
            24..=39 => 3.0,
            40..=55 => 2.0,
            _ => 1.0,
        };
        let mut ctx = fixtures::context(1, load);
        let out = extract_named(&catalog, &mut ctx, ["r_morning_noon", "r_morning_noon_no_min"]);
        assert!(out.failures.is_empty(), "{:?}", out.failures);
        assert_eq!(out.get("r_morning_noon"), Some(1.5));
        assert_eq!(out.get("r_morning_noon_no_min"), Some(2.0));
    }

    #[test]
    fn test_zero_denominator_is_a_body_failure() {
        let catalog = standard_catalog().unwrap();
        let mut ctx = fixtures::context(1, |i| if (24..40).contains(&i) { 3.0 } else { 0.0 });
        let out = extract_named(&catalog, &mut ctx, ["r_morning_noon", "c_morning"]);
        assert_eq!(out.failures.len(), 1);
        assert_eq!(out.failures[0].kind, ErrorKind::ComputationBody);
        assert!(out.failures[0].reason.contains("division by zero"));
        assert_eq!(out.get("c_morning"), Some(3.0));
    }
}
