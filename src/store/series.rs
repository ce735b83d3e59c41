//! Timestamp-indexed numeric samples.

use super::context::ContextError;
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, Timelike};
use std::collections::BTreeMap;

/// An ordered series of readings. `NaN` marks a missing reading.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
    timestamps: Vec<NaiveDateTime>,
    values: Vec<f64>,
}

impl TimeSeries {
    pub fn new(timestamps: Vec<NaiveDateTime>, values: Vec<f64>) -> Result<Self, ContextError> {
        if timestamps.len() != values.len() {
            return Err(ContextError::LengthMismatch {
                timestamps: timestamps.len(),
                values: values.len(),
            });
        }
        if let Some(i) = timestamps.windows(2).position(|w| w[1] <= w[0]) {
            return Err(ContextError::Unordered { index: i + 1 });
        }
        Ok(Self { timestamps, values })
    }

    /// Builds a uniformly sampled series starting at `start`.
    pub fn regular(start: NaiveDateTime, step_minutes: i64, values: Vec<f64>) -> Self {
        let timestamps = (0..values.len() as i64)
            .map(|i| start + Duration::minutes(i * step_minutes))
            .collect();
        Self { timestamps, values }
    }

    pub fn len(&self) -> usize { self.values.len() }
    pub fn is_empty(&self) -> bool { self.values.is_empty() }
    pub fn values(&self) -> &[f64] { &self.values }
    pub fn timestamps(&self) -> &[NaiveDateTime] { &self.timestamps }

    /// Minutes between the first two samples.
    pub fn interval_minutes(&self) -> Option<f64> {
        match self.timestamps.as_slice() {
            [first, second, ..] => Some((*second - *first).num_seconds() as f64 / 60.0),
            _ => None,
        }
    }

    pub fn hours(&self) -> Vec<u32> {
        self.timestamps.iter().map(|t| t.hour()).collect()
    }

    /// Day of week per sample, Monday = 0.
    pub fn weekdays(&self) -> Vec<u32> {
        self.timestamps.iter().map(|t| t.weekday().num_days_from_monday()).collect()
    }

    /// Values where `mask` is set. Missing readings are kept; statistics skip them.
    pub fn masked(&self, mask: &[bool]) -> Vec<f64> {
        self.values
            .iter()
            .zip(mask)
            .filter_map(|(&v, &keep)| keep.then_some(v))
            .collect()
    }

    /// Reduces each calendar day with `reduce`, skipping missing readings.
    /// Days without any reading are omitted.
    pub fn daily(&self, reduce: impl Fn(&[f64]) -> f64) -> Vec<(NaiveDate, f64)> {
        let mut days: BTreeMap<NaiveDate, Vec<f64>> = BTreeMap::new();
        for (t, &v) in self.timestamps.iter().zip(&self.values) {
            let bucket = days.entry(t.date()).or_default();
            if !v.is_nan() {
                bucket.push(v);
            }
        }
        days.into_iter()
            .filter(|(_, vals)| !vals.is_empty())
            .map(|(day, vals)| (day, reduce(&vals)))
            .collect()
    }

    /// Sum per calendar week (Monday to Sunday). A week of missing readings sums to zero.
    pub fn weekly_sums(&self) -> Vec<f64> {
        let mut weeks: BTreeMap<(i32, u32), f64> = BTreeMap::new();
        for (t, &v) in self.timestamps.iter().zip(&self.values) {
            let week = t.iso_week();
            let sum = weeks.entry((week.year(), week.week())).or_insert(0.0);
            if !v.is_nan() {
                *sum += v;
            }
        }
        weeks.into_values().collect()
    }

    /// Pairs samples of `self` and `other` sharing a timestamp, optionally restricted to the
    /// positions of `self` where `mask` is set. Pairs with a missing side are dropped.
    pub fn aligned_with(&self, other: &TimeSeries, mask: Option<&[bool]>) -> (Vec<f64>, Vec<f64>) {
        let mut xs = Vec::new();
        let mut ys = Vec::new();
        let mut j = 0;
        for (i, t) in self.timestamps.iter().enumerate() {
            if let Some(mask) = mask {
                if !mask.get(i).copied().unwrap_or(false) {
                    continue;
                }
            }
            while j < other.timestamps.len() && other.timestamps[j] < *t {
                j += 1;
            }
            if j == other.timestamps.len() {
                break;
            }
            if other.timestamps[j] == *t {
                let (a, b) = (self.values[i], other.values[j]);
                if !a.is_nan() && !b.is_nan() {
                    xs.push(a);
                    ys.push(b);
                }
            }
        }
        (xs, ys)
    }
}

/// Pairs two daily reductions on matching dates.
pub fn align_days(a: &[(NaiveDate, f64)], b: &[(NaiveDate, f64)]) -> (Vec<f64>, Vec<f64>) {
    let lookup: BTreeMap<NaiveDate, f64> = b.iter().copied().collect();
    a.iter()
        .filter_map(|(day, x)| lookup.get(day).map(|y| (*x, *y)))
        .unzip()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start() -> NaiveDateTime {
        // A Monday.
        NaiveDate::from_ymd_opt(2018, 1, 1).unwrap().and_hms_opt(0, 0, 0).unwrap()
    }

    #[test]
    fn test_interval_from_first_two_samples() {
        let s = TimeSeries::regular(start(), 15, vec![1.0, 2.0, 3.0]);
        assert_eq!(s.interval_minutes(), Some(15.0));
        let single = TimeSeries::regular(start(), 15, vec![1.0]);
        assert_eq!(single.interval_minutes(), None);
    }

    #[test]
    fn test_rejects_unordered_timestamps() {
        let t = start();
        let err = TimeSeries::new(vec![t, t], vec![1.0, 2.0]).unwrap_err();
        assert_eq!(err, ContextError::Unordered { index: 1 });
    }

    #[test]
    fn test_daily_skips_missing_readings() {
        let s = TimeSeries::regular(start(), 12 * 60, vec![1.0, f64::NAN, 4.0, 2.0]);
        let mins = s.daily(|v| v.iter().cloned().fold(f64::INFINITY, f64::min));
        assert_eq!(mins.len(), 2);
        assert_eq!(mins[0].1, 1.0);
        assert_eq!(mins[1].1, 2.0);
    }

    #[test]
    fn test_weekly_sums_split_on_monday() {
        // Saturday, Sunday, Monday
        let sat = start() + Duration::days(5);
        let s = TimeSeries::regular(sat, 24 * 60, vec![1.0, 2.0, 5.0]);
        assert_eq!(s.weekly_sums(), vec![3.0, 5.0]);
    }

    #[test]
    fn test_aligned_with_drops_missing_and_unmatched() {
        let a = TimeSeries::regular(start(), 60, vec![1.0, 2.0, f64::NAN, 4.0]);
        let b = TimeSeries::regular(start() + Duration::hours(1), 60, vec![20.0, 30.0, 40.0]);
        let (x, y) = a.aligned_with(&b, None);
        assert_eq!(x, vec![2.0, 4.0]);
        assert_eq!(y, vec![20.0, 40.0]);

        let mask = [true, false, true, true];
        let (x, _) = a.aligned_with(&b, Some(&mask));
        assert_eq!(x, vec![4.0]);
    }
}
