//! The granularity precondition, checked before any dependency is resolved.

use crate::compute::ledger::ExtractionError;
use crate::store::registry::Computation;

/// Rejects a computation whose declared maximum interval is finer than the series'.
pub fn check(computation: &Computation, interval_minutes: f64) -> Result<(), ExtractionError> {
    match computation.max_interval_minutes() {
        Some(required) if interval_minutes > required => Err(ExtractionError::Granularity {
            name: computation.name().to_string(),
            required,
            actual: interval_minutes,
        }),
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::types::HOUR;
    use rstest::rstest;

    #[rstest]
    #[case(15.0, true)]
    #[case(30.0, true)]
    #[case(60.0, true)]
    #[case(1440.0, false)]
    fn test_hourly_precondition(#[case] interval: f64, #[case] allowed: bool) {
        let c = Computation::feature("c_morning", |_| Ok(0.0)).max_interval(HOUR);
        assert_eq!(check(&c, interval).is_ok(), allowed);
    }

    #[test]
    fn test_no_precondition_accepts_any_interval() {
        let c = Computation::feature("c_max", |_| Ok(0.0));
        assert!(check(&c, 7.0 * 1440.0).is_ok());
    }

    #[test]
    fn test_error_reports_both_intervals() {
        let c = Computation::feature("c_week", |_| Ok(0.0)).max_interval(HOUR);
        let err = check(&c, 1440.0).unwrap_err();
        assert_eq!(
            err,
            ExtractionError::Granularity { name: "c_week".into(), required: 60.0, actual: 1440.0 }
        );
    }
}
