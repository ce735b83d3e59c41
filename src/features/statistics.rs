//! Distribution statistics of the series and of its average week.
use super::{masked, register_all};
use crate::compute::bindings::{Bindings, BodyError};
use crate::compute::kernel;
use crate::store::context::CONSUMPTION;
use crate::store::registry::{Catalog, CatalogError, Computation};
use crate::store::types::{DAY, HOUR};

type Reduce = fn(&[f64]) -> Result<f64, BodyError>;

/// Average-week values, limited to the first week's positions of `mask` when given.
fn week_values(b: &Bindings<'_>, mask: Option<&str>) -> Result<Vec<f64>, BodyError> {
    let week = b.series("average_week")?;
    let Some(mask) = mask else {
        return Ok(week.values().to_vec());
    };
    let first_week = b.mask(mask)?.get(..week.len()).ok_or_else(|| {
        BodyError::Domain(format!("mask '{}' is shorter than the average week", mask))
    })?;
    Ok(week.masked(first_week))
}

fn week_profile(name: &str, mask: Option<&'static str>, reduce: Reduce) -> Computation {
    let mut deps = vec![CONSUMPTION, "average_week"];
    if let Some(m) = mask {
        deps.extend(["samples_in_week", m]);
    }
    Computation::feature(name, move |b| reduce(&week_values(b, mask)?))
        .needs_data(&deps)
        .max_interval(DAY)
}

fn diff_quantile(name: &str, q: f64) -> Computation {
    Computation::feature(name, move |b| kernel::quantile(&kernel::abs_diff(b.consumption()?.values()), q))
        .needs_data(&[CONSUMPTION])
}

fn quantile(name: &str, q: f64) -> Computation {
    Computation::feature(name, move |b| kernel::quantile(b.consumption()?.values(), q)).needs_data(&[CONSUMPTION])
}

fn num_peaks(b: &Bindings<'_>) -> Result<usize, BodyError> {
    let order = b.count("neighborhood_width")?;
    if order == 0 {
        return Err(BodyError::Domain("neighborhood_width must be at least 1".into()));
    }
    Ok(kernel::relative_maxima(b.consumption()?.values(), order).len())
}

pub(crate) fn register(catalog: &mut Catalog) -> Result<(), CatalogError> {
    register_all(
        catalog,
        [
            masked("wd_var", &["weekdays"], kernel::variance).max_interval(DAY).doc("weekday variance"),
            masked("we_var", &["weekends"], kernel::variance).max_interval(DAY).doc("weekend variance"),
            masked("wd_min", &["weekdays"], kernel::min).max_interval(DAY).doc("minimum of weekdays consumption"),
            masked("wd_max", &["weekdays"], kernel::max).max_interval(DAY).doc("maximum of weekdays consumption"),
            masked("we_min", &["weekends"], kernel::min).max_interval(DAY).doc("minimum of weekends consumption"),
            masked("we_max", &["weekends"], kernel::max).max_interval(DAY).doc("maximum of weekends consumption"),
            week_profile("s_max", None, kernel::max).doc("maximum in the average week"),
            week_profile("s_min", None, kernel::min).doc("minimum in the average week"),
            week_profile("s_wd_min", Some("weekdays"), kernel::min)
                .doc("minimum in the average week, limited to weekdays (Mon-Fri)"),
            week_profile("s_wd_max", Some("weekdays"), kernel::max)
                .doc("maximum in the average week, limited to weekdays (Mon-Fri)"),
            week_profile("s_we_min", Some("weekends"), kernel::min).doc("minimum in the average week, limited to weekends"),
            week_profile("s_we_max", Some("weekends"), kernel::max).doc("maximum in the average week, limited to weekends"),
            diff_quantile("s_sm_variety", 0.2).doc("20% quantile of the deviation from the previous measured value"),
            diff_quantile("s_bg_variety", 0.6).doc("60% quantile of the deviation from the previous measured value"),
            masked("s_variance", &[], kernel::variance).doc("consumption variance"),
            masked("s_var_wd", &["weekdays"], kernel::variance).max_interval(DAY).doc("variance on weekdays"),
            masked("s_var_we", &["weekends"], kernel::variance).max_interval(DAY).doc("variance on weekends"),
            Computation::feature("s_diff", |b| Ok(kernel::sum(&kernel::abs_diff(b.consumption()?.values()))))
                .needs_data(&[CONSUMPTION])
                .doc("total of differences from predecessor (absolute value)"),
            Computation::feature("s_num_peaks", num_peaks)
                .needs_data(&[CONSUMPTION, "neighborhood_width"])
                .doc("number of local maxima within neighborhood_width samples"),
            quantile("s_q1", 0.25).doc("lower quartile of consumption"),
            quantile("s_q2", 0.5).doc("second quartile (median)"),
            quantile("s_q3", 0.75).doc("upper quartile"),
            Computation::feature("s_number_zeros", |b| {
                Ok(b.consumption()?.values().iter().filter(|v| **v == 0.0).count())
            })
            .needs_data(&[CONSUMPTION])
            .doc("number of zero values"),
            masked("s_nt_variance", &["nts"], kernel::variance).max_interval(HOUR).doc("variance of nt consumption"),
            masked("s_ht_variance", &["hts"], kernel::variance).max_interval(HOUR).doc("variance of ht consumption"),
            masked("s_nt_var_wd", &["nts", "weekdays"], kernel::variance)
                .max_interval(HOUR)
                .doc("variance of nt consumption on weekdays"),
            masked("s_ht_var_wd", &["hts", "weekdays"], kernel::variance)
                .max_interval(HOUR)
                .doc("variance of ht consumption on weekdays"),
        ],
    )
}

#[cfg(test)]
mod tests {
    use crate::compute::engine::extract_named;
    use crate::features::{fixtures, standard_catalog};
    use crate::store::types::FeatureValue;

    #[test]
    fn test_series_statistics() {
        let catalog = standard_catalog().unwrap();
        // 0, 1, 0, 1, ... with every tenth reading missing.
        let mut ctx = fixtures::context(1, |i| if i % 10 == 9 { f64::NAN } else { (i % 2) as f64 });
        let out = extract_named(
            &catalog,
            &mut ctx,
            ["s_q2", "s_number_zeros", "s_num_peaks", "s_variance", "s_diff"],
        );
        assert!(out.failures.is_empty(), "{:?}", out.failures);
        assert_eq!(out.get("s_q2"), Some(0.0));
        assert_eq!(out.features["s_number_zeros"], FeatureValue::Count(48));
        assert!(out.get("s_variance").unwrap() > 0.2);
        assert!(out.get("s_diff").unwrap() > 0.0);
    }

    #[test]
    fn test_average_week_profile() {
        let catalog = standard_catalog().unwrap();
        // Weekdays read their day index, weekends read 10 and 11.
        let mut ctx = fixtures::context(14, |i| {
            let day = (i / 96) % 7;
            if day >= 5 { day as f64 + 5.0 } else { day as f64 }
        });
        let out = extract_named(&catalog, &mut ctx, ["s_max", "s_min", "s_wd_max", "s_we_min"]);
        assert!(out.failures.is_empty(), "{:?}", out.failures);
        assert_eq!(out.get("s_max"), Some(11.0));
        assert_eq!(out.get("s_min"), Some(0.0));
        assert_eq!(out.get("s_wd_max"), Some(4.0));
        assert_eq!(out.get("s_we_min"), Some(10.0));
    }
}
