//! Temperature dependence of the load: linear and hockey-stick fits and the daily lag.
use super::register_all;
use crate::compute::bindings::{ratio, Bindings, BodyError, Emitter};
use crate::compute::kernel;
use crate::solver::{fit_hockey_stick, fit_line, HockeyStickFit, LineFit};
use crate::store::context::{CONSUMPTION, TEMPERATURE};
use crate::store::registry::{Catalog, CatalogError, Computation};
use crate::store::series::align_days;
use crate::store::types::{FeatureValue, DAY, HOUR};

/// `(temperature, consumption)` pairs sharing a timestamp, optionally only where `mask` is set.
fn pairs(b: &Bindings<'_>, mask: Option<&[bool]>) -> Result<(Vec<f64>, Vec<f64>), BodyError> {
    let (load, temp) = b.consumption()?.aligned_with(b.temperature()?, mask);
    Ok((temp, load))
}

/// Slope of consumption against temperature over the samples selected by `mask`.
fn slope_over(name: &str, mask: &'static str, invert: bool) -> Computation {
    Computation::feature(name, move |b| {
        let selected: Vec<bool> = b.mask(mask)?.iter().map(|m| *m != invert).collect();
        let (x, y) = pairs(b, Some(&selected))?;
        Ok(fit_line(&x, &y)?.k)
    })
    .needs_data(&[CONSUMPTION, mask, TEMPERATURE])
    .max_interval(HOUR)
}

/// Slope of a daily reduction of consumption against daily minimum temperature.
fn daily_slope(name: &str, load: fn(&[f64]) -> Result<f64, BodyError>) -> Computation {
    Computation::feature(name, move |b| {
        let temp = b.temperature()?.daily(|d| kernel::min(d).unwrap_or(f64::NAN));
        let cons = b.consumption()?.daily(|d| load(d).unwrap_or(f64::NAN));
        let (x, y) = align_days(&temp, &cons);
        Ok(fit_line(&x, &y)?.k)
    })
    .needs_data(&[CONSUMPTION, TEMPERATURE])
    .max_interval(DAY)
}

/// Mean of `|(predicted - y) / predicted|`.
fn mean_relative_error(x: &[f64], y: &[f64], predict: impl Fn(f64) -> f64) -> Result<f64, BodyError> {
    let errors = x
        .iter()
        .zip(y)
        .map(|(&xi, &yi)| {
            let p = predict(xi);
            ratio(p - yi, p, "predicted consumption").map(f64::abs)
        })
        .collect::<Result<Vec<f64>, BodyError>>()?;
    kernel::mean(&errors)
}

fn linear(b: &Bindings<'_>, out: &mut Emitter) -> Result<FeatureValue, BodyError> {
    let (x, y) = pairs(b, None)?;
    let fit = fit_line(&x, &y)?;
    out.emit("n", fit.n);
    Ok(fit.k.into())
}

fn hockey_stick(b: &Bindings<'_>, out: &mut Emitter) -> Result<FeatureValue, BodyError> {
    let (x, y) = pairs(b, None)?;
    let fit = fit_hockey_stick(&x, &y)?;
    let lowpoint = fit.lowpoint();
    out.emit("n1", fit.n1);
    out.emit("k2", fit.k2);
    out.emit("n2", fit.n2);
    out.emit("lowpoint", lowpoint);
    out.emit("consumptionAtLowpoint", fit.at(lowpoint));
    Ok(fit.k1.into())
}

fn temperature_lag(b: &Bindings<'_>) -> Result<f64, BodyError> {
    let (t, c) = pairs(b, None)?;
    let day = b.count("samples_in_day")?;
    if day == 0 {
        return Err(BodyError::Domain("a day holds no samples".into()));
    }
    let lags: Vec<f64> = t
        .chunks_exact(day)
        .zip(c.chunks_exact(day))
        .map(|(td, cd)| -> Result<f64, BodyError> {
            let day = day as isize;
            // Index day - 1 of the full correlation is zero shift.
            let shift = kernel::argmax(&kernel::correlate_full(td, cd))? as isize - (day - 1);
            Ok(shift.rem_euclid(day).min((-shift).rem_euclid(day)) as f64)
        })
        .collect::<Result<_, BodyError>>()?;
    kernel::mean(&lags)
}

pub(crate) fn register(catalog: &mut Catalog) -> Result<(), CatalogError> {
    register_all(
        catalog,
        [
            slope_over("w_temp_cor_nighttime", "nights", false)
                .doc("linear relationship between temperature and consumption in the night"),
            slope_over("w_temp_cor_daytime", "nights", true)
                .doc("linear relationship between temperature and consumption outside the night"),
            slope_over("w_temp_cor_evening", "evenings", false)
                .doc("linear relationship between temperature and consumption in the evening"),
            daily_slope("w_temp_cor_minima", kernel::min)
                .doc("linear relationship between the daily minima of temperature and consumption"),
            daily_slope("w_temp_cor_maxmin", kernel::max)
                .doc("linear relationship between the daily maxima of consumption and minima of temperature"),
            Computation::multi("k1", &["n1", "k2", "n2", "lowpoint", "consumptionAtLowpoint"], hockey_stick)
                .needs_data(&[CONSUMPTION, TEMPERATURE])
                .doc("hockey-stick fit of consumption against temperature: slope below the low point"),
            Computation::secondary("n1", "k1").doc("hockey-stick fit: intercept below the low point"),
            Computation::secondary("k2", "k1").doc("hockey-stick fit: slope above the low point"),
            Computation::secondary("n2", "k1").doc("hockey-stick fit: intercept above the low point"),
            Computation::secondary("lowpoint", "k1").doc("temperature where the hockey-stick segments meet"),
            Computation::secondary("consumptionAtLowpoint", "k1").doc("hockey-stick consumption at the low point"),
            Computation::feature("hockeyStickErrRel", |b| {
                let fit = HockeyStickFit {
                    k1: b.feature("k1")?,
                    n1: b.feature("n1")?,
                    k2: b.feature("k2")?,
                    n2: b.feature("n2")?,
                };
                let (x, y) = pairs(b, None)?;
                mean_relative_error(&x, &y, |t| fit.at(t))
            })
            .needs_features(&["k1", "n1", "k2", "n2"])
            .needs_data(&[CONSUMPTION, TEMPERATURE])
            .doc("mean relative error of the hockey-stick fit"),
            Computation::feature("hockeyStickThermalEfficiency", |b| {
                let values = b.consumption()?.values();
                let at_low = b.feature("consumptionAtLowpoint")?;
                ratio(at_low * kernel::count(values) as f64, kernel::sum(values), "total consumption")
            })
            .needs_data(&[CONSUMPTION])
            .needs_features(&["consumptionAtLowpoint"])
            .doc("consumption at the low point relative to the mean consumption"),
            Computation::multi("k", &["n"], linear)
                .needs_data(&[CONSUMPTION, TEMPERATURE])
                .doc("slope of the linear fit of consumption against temperature"),
            Computation::secondary("n", "k").doc("intercept of the linear fit of consumption against temperature"),
            Computation::feature("linearErrRel", |b| {
                let fit = LineFit { k: b.feature("k")?, n: b.feature("n")? };
                let (x, y) = pairs(b, None)?;
                mean_relative_error(&x, &y, |t| fit.at(t))
            })
            .needs_features(&["k", "n"])
            .needs_data(&[CONSUMPTION, TEMPERATURE])
            .doc("mean relative error of the linear fit"),
            Computation::feature("hockeyStickDependency", |b| {
                Ok(1.0 - ratio(b.feature("hockeyStickErrRel")?, b.feature("linearErrRel")?, "linearErrRel")?)
            })
            .needs_features(&["linearErrRel", "hockeyStickErrRel"])
            .doc("improvement of the hockey-stick fit over the linear fit"),
            Computation::feature("consumption_temperature_lag", temperature_lag)
                .needs_data(&[CONSUMPTION, TEMPERATURE, "samples_in_day"])
                .max_interval(HOUR)
                .doc("mean daily lag, in samples, between temperature and consumption"),
        ],
    )
}

#[cfg(test)]
mod tests {
    use crate::compute::engine::extract_named;
    use crate::compute::ledger::ErrorKind;
    use crate::features::{fixtures, standard_catalog};

    fn temp(i: usize) -> f64 {
        // Triangle wave between -10 and 20 degrees.
        let phase = (i % 60) as f64;
        if phase < 30.0 { -10.0 + phase } else { 50.0 - phase }
    }

    #[test]
    fn test_linear_fit_with_fan_out() {
        let catalog = standard_catalog().unwrap();
        let mut ctx = fixtures::context_with_temperature(2, |i| 100.0 - 2.0 * temp(i), temp);
        let out = extract_named(&catalog, &mut ctx, ["n", "linearErrRel"]);
        assert!(out.failures.is_empty(), "{:?}", out.failures);
        assert!((out.get("k").unwrap() + 2.0).abs() < 1e-9);
        assert!((out.get("n").unwrap() - 100.0).abs() < 1e-9);
        assert!(out.get("linearErrRel").unwrap() < 1e-9);
    }

    #[test]
    fn test_hockey_stick_features() {
        let catalog = standard_catalog().unwrap();
        let load = |i: usize| {
            let t = temp(i);
            if t < 5.0 { -2.0 * t + 20.0 } else { 0.5 * t + 7.5 }
        };
        let mut ctx = fixtures::context_with_temperature(2, load, temp);
        let out = extract_named(&catalog, &mut ctx, ["lowpoint", "consumptionAtLowpoint", "hockeyStickErrRel"]);
        assert!(out.failures.is_empty(), "{:?}", out.failures);
        assert!((out.get("lowpoint").unwrap() - 5.0).abs() < 1e-6);
        assert!((out.get("consumptionAtLowpoint").unwrap() - 10.0).abs() < 1e-6);
        assert!(out.get("hockeyStickErrRel").unwrap() < 1e-6);
        for name in ["k1", "n1", "k2", "n2"] {
            assert!(out.features.contains_key(name), "{} missing", name);
        }
    }

    #[test]
    fn test_without_temperature_fits_fail_with_missing_data() {
        let catalog = standard_catalog().unwrap();
        let mut ctx = fixtures::context(2, |i| i as f64);
        let out = extract_named(&catalog, &mut ctx, ["k", "n", "w_temp_cor_evening"]);
        assert_eq!(out.failures.len(), 3);
        assert!(out.failures.iter().all(|f| f.kind == ErrorKind::MissingData));
    }

    #[test]
    fn test_lag_of_aligned_profiles_is_zero() {
        let catalog = standard_catalog().unwrap();
        let shape = |i: usize| ((i % 96) as f64 / 96.0 * std::f64::consts::TAU).sin() + 2.0;
        let mut ctx = fixtures::context_with_temperature(3, shape, shape);
        let out = extract_named(&catalog, &mut ctx, ["consumption_temperature_lag"]);
        assert!(out.failures.is_empty(), "{:?}", out.failures);
        assert_eq!(out.get("consumption_temperature_lag"), Some(0.0));
    }
}
