//! Numeric kernels shared by the feature bodies.
//!
//! Reductions skip `NaN` readings, matching how missing meter samples are treated
//! everywhere else, and fail with `EmptySelection` when nothing is left.
use crate::compute::bindings::BodyError;
use wide::f64x4;

fn present(values: &[f64]) -> impl Iterator<Item = f64> + '_ {
    values.iter().copied().filter(|v| !v.is_nan())
}

fn present_sorted(values: &[f64]) -> Result<Vec<f64>, BodyError> {
    let mut v: Vec<f64> = present(values).collect();
    if v.is_empty() {
        return Err(BodyError::EmptySelection);
    }
    v.sort_by(f64::total_cmp);
    Ok(v)
}

/// Sum of all non-`NaN` values. An empty input sums to zero.
pub fn sum(values: &[f64]) -> f64 {
    let chunks = values.chunks_exact(4);
    let tail: f64 = present(chunks.remainder()).sum();
    let mut acc = f64x4::splat(0.0);
    for c in chunks {
        let lane = [c[0], c[1], c[2], c[3]].map(|v| if v.is_nan() { 0.0 } else { v });
        acc += f64x4::from(lane);
    }
    acc.to_array().iter().sum::<f64>() + tail
}

pub fn count(values: &[f64]) -> usize {
    present(values).count()
}

pub fn mean(values: &[f64]) -> Result<f64, BodyError> {
    match count(values) {
        0 => Err(BodyError::EmptySelection),
        n => Ok(sum(values) / n as f64),
    }
}

pub fn min(values: &[f64]) -> Result<f64, BodyError> {
    present(values).reduce(f64::min).ok_or(BodyError::EmptySelection)
}

pub fn max(values: &[f64]) -> Result<f64, BodyError> {
    present(values).reduce(f64::max).ok_or(BodyError::EmptySelection)
}

/// Sample variance (one delta degree of freedom).
pub fn variance(values: &[f64]) -> Result<f64, BodyError> {
    let n = count(values);
    if n < 2 {
        return Err(BodyError::InsufficientSamples { needed: 2, got: n });
    }
    let m = sum(values) / n as f64;
    let ss: f64 = present(values).map(|v| (v - m) * (v - m)).sum();
    Ok(ss / (n - 1) as f64)
}

/// Quantile with linear interpolation between the closest ranks.
pub fn quantile(values: &[f64], q: f64) -> Result<f64, BodyError> {
    if !(0.0..=1.0).contains(&q) {
        return Err(BodyError::Domain(format!("quantile {} outside [0, 1]", q)));
    }
    let sorted = present_sorted(values)?;
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    Ok(sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64))
}

pub fn median(values: &[f64]) -> Result<f64, BodyError> {
    quantile(values, 0.5)
}

/// Absolute first differences. The result is one shorter than the input.
pub fn abs_diff(values: &[f64]) -> Vec<f64> {
    values.windows(2).map(|w| (w[1] - w[0]).abs()).collect()
}

/// Index of the first maximum, ignoring `NaN`.
pub fn argmax(values: &[f64]) -> Result<usize, BodyError> {
    first_extreme(values, |a, b| a > b)
}

/// Index of the first minimum, ignoring `NaN`.
pub fn argmin(values: &[f64]) -> Result<usize, BodyError> {
    first_extreme(values, |a, b| a < b)
}

fn first_extreme(values: &[f64], better: impl Fn(f64, f64) -> bool) -> Result<usize, BodyError> {
    let mut best: Option<(usize, f64)> = None;
    for (i, &v) in values.iter().enumerate() {
        if v.is_nan() {
            continue;
        }
        match best {
            Some((_, b)) if !better(v, b) => {}
            _ => best = Some((i, v)),
        }
    }
    best.map(|(i, _)| i).ok_or(BodyError::EmptySelection)
}

/// Indices whose value is >= every neighbour within `order` samples.
/// Out-of-range neighbours are clipped to the nearest edge.
pub fn relative_maxima(values: &[f64], order: usize) -> Vec<usize> {
    let n = values.len();
    if n == 0 {
        return Vec::new();
    }
    (0..n)
        .filter(|&i| {
            (1..=order).all(|shift| {
                let left = i.saturating_sub(shift);
                let right = (i + shift).min(n - 1);
                values[i] >= values[left] && values[i] >= values[right]
            })
        })
        .collect()
}

/// Moving average of width `size`, mirroring the series at both edges.
pub fn uniform_filter(values: &[f64], size: usize) -> Vec<f64> {
    let n = values.len() as isize;
    if n == 0 || size == 0 {
        return values.to_vec();
    }
    let reflect = |mut i: isize| -> usize {
        // Half-sample symmetric: d c b a | a b c d | d c b a
        let period = 2 * n;
        i = i.rem_euclid(period);
        if i >= n {
            i = period - 1 - i;
        }
        i as usize
    };
    let half = (size / 2) as isize;
    (0..n)
        .map(|i| {
            let start = i - half;
            let total: f64 = (start..start + size as isize).map(|j| values[reflect(j)]).sum();
            total / size as f64
        })
        .collect()
}

/// Local maxima; a flat top reports its middle sample.
pub fn find_peaks(values: &[f64]) -> Vec<usize> {
    let n = values.len();
    let mut peaks = Vec::new();
    if n < 3 {
        return peaks;
    }
    let last = n - 1;
    let mut i = 1;
    while i < last {
        if values[i - 1] < values[i] {
            let mut ahead = i + 1;
            while ahead < last && values[ahead] == values[i] {
                ahead += 1;
            }
            if values[ahead] < values[i] {
                peaks.push((i + ahead - 1) / 2);
                i = ahead;
            }
        }
        i += 1;
    }
    peaks
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prominence {
    pub prominence: f64,
    pub left_base: usize,
    pub right_base: usize,
}

pub fn prominence(values: &[f64], peak: usize) -> Prominence {
    let top = values[peak];

    let (mut left_min, mut left_base) = (top, peak);
    let mut i = peak as isize;
    while i >= 0 && values[i as usize] <= top {
        if values[i as usize] < left_min {
            left_min = values[i as usize];
            left_base = i as usize;
        }
        i -= 1;
    }

    let (mut right_min, mut right_base) = (top, peak);
    let mut j = peak;
    while j < values.len() && values[j] <= top {
        if values[j] < right_min {
            right_min = values[j];
            right_base = j;
        }
        j += 1;
    }

    Prominence { prominence: top - left_min.max(right_min), left_base, right_base }
}

/// Width of a peak at half its prominence, interpolated between samples.
pub fn peak_width(values: &[f64], peak: usize) -> f64 {
    let p = prominence(values, peak);
    let height = values[peak] - p.prominence * 0.5;

    let mut i = peak;
    while p.left_base < i && height < values[i] {
        i -= 1;
    }
    let mut left = i as f64;
    if values[i] < height {
        left += (height - values[i]) / (values[i + 1] - values[i]);
    }

    let mut j = peak;
    while j < p.right_base && height < values[j] {
        j += 1;
    }
    let mut right = j as f64;
    if values[j] < height {
        right -= (height - values[j]) / (values[j - 1] - values[j]);
    }

    right - left
}

/// Full cross-correlation: `out[k] = sum_n a[n + k - (b.len() - 1)] * b[n]`.
pub fn correlate_full(a: &[f64], b: &[f64]) -> Vec<f64> {
    if a.is_empty() || b.is_empty() {
        return Vec::new();
    }
    let offset = b.len() as isize - 1;
    (0..a.len() + b.len() - 1)
        .map(|k| {
            let shift = k as isize - offset;
            b.iter()
                .enumerate()
                .filter_map(|(n, &bv)| {
                    let idx = n as isize + shift;
                    (0..a.len() as isize).contains(&idx).then(|| a[idx as usize] * bv)
                })
                .sum()
        })
        .collect()
}
