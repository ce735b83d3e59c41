//! Line and hockey-stick fits of consumption against temperature.
use super::problem::{FitProblem, Model};
use super::simplex::{self, Options};
use super::FitError;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineFit {
    pub k: f64,
    pub n: f64,
}

impl LineFit {
    pub fn at(&self, x: f64) -> f64 { self.k * x + self.n }
}

/// Two lines joined where they intersect: `k1 x + n1` left of the low point,
/// `k2 x + n2` from it onwards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HockeyStickFit {
    pub k1: f64,
    pub n1: f64,
    pub k2: f64,
    pub n2: f64,
}

impl HockeyStickFit {
    fn from_params(p: &[f64]) -> Self {
        Self { k1: p[0], n1: p[1], k2: p[2], n2: p[3] }
    }

    pub fn lowpoint(&self) -> f64 { (self.n2 - self.n1) / (self.k1 - self.k2) }

    pub fn at(&self, x: f64) -> f64 {
        if x < self.lowpoint() {
            self.k1 * x + self.n1
        } else {
            self.k2 * x + self.n2
        }
    }
}

struct HockeyStick;

impl Model for HockeyStick {
    fn n_params(&self) -> usize { 4 }
    fn eval(&self, p: &[f64], x: f64) -> f64 { HockeyStickFit::from_params(p).at(x) }
}

/// Running sums over a prefix of the points.
#[derive(Debug, Clone, Copy, Default)]
struct Moments {
    n: f64,
    sx: f64,
    sy: f64,
    sxx: f64,
    sxy: f64,
    syy: f64,
}

impl Moments {
    fn push(mut self, x: f64, y: f64) -> Self {
        self.n += 1.0;
        self.sx += x;
        self.sy += y;
        self.sxx += x * x;
        self.sxy += x * y;
        self.syy += y * y;
        self
    }

    fn minus(&self, o: &Moments) -> Moments {
        Moments {
            n: self.n - o.n,
            sx: self.sx - o.sx,
            sy: self.sy - o.sy,
            sxx: self.sxx - o.sxx,
            sxy: self.sxy - o.sxy,
            syy: self.syy - o.syy,
        }
    }

    /// Least-squares line and its residual sum of squares.
    fn line(&self) -> Option<(LineFit, f64)> {
        let cxx = self.sxx - self.sx * self.sx / self.n;
        if !(cxx > 1e-12 * self.sxx.abs().max(1.0)) {
            return None;
        }
        let cxy = self.sxy - self.sx * self.sy / self.n;
        let cyy = self.syy - self.sy * self.sy / self.n;
        let k = cxy / cxx;
        let n = (self.sy - k * self.sx) / self.n;
        Some((LineFit { k, n }, (cyy - k * cxy).max(0.0)))
    }
}

fn check_points(xs: &[f64], ys: &[f64], needed: usize) -> Result<(), FitError> {
    if xs.len() != ys.len() {
        return Err(FitError::Degenerate(format!("{} x values but {} y values", xs.len(), ys.len())));
    }
    if xs.len() < needed {
        return Err(FitError::TooFewPoints { needed, got: xs.len() });
    }
    Ok(())
}

/// Ordinary least-squares line through the points.
pub fn fit_line(xs: &[f64], ys: &[f64]) -> Result<LineFit, FitError> {
    check_points(xs, ys, 2)?;
    let m = xs.iter().zip(ys).fold(Moments::default(), |m, (&x, &y)| m.push(x, y));
    m.line()
        .map(|(fit, _)| fit)
        .ok_or_else(|| FitError::Degenerate("all x values are equal".into()))
}

/// Fits a hockey stick: the best two-segment split seeds a Nelder-Mead refinement.
pub fn fit_hockey_stick(xs: &[f64], ys: &[f64]) -> Result<HockeyStickFit, FitError> {
    check_points(xs, ys, 4)?;
    let mut points: Vec<(f64, f64)> = xs.iter().copied().zip(ys.iter().copied()).collect();
    points.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut prefix = Vec::with_capacity(points.len() + 1);
    prefix.push(Moments::default());
    for &(x, y) in &points {
        let last = prefix[prefix.len() - 1];
        prefix.push(last.push(x, y));
    }
    let total = prefix[points.len()];

    let mut best: Option<(HockeyStickFit, f64)> = None;
    for split in 2..=points.len() - 2 {
        if points[split - 1].0 == points[split].0 {
            continue;
        }
        let (Some((left, sl)), Some((right, sr))) =
            (prefix[split].line(), total.minus(&prefix[split]).line())
        else {
            continue;
        };
        if left.k == right.k {
            continue;
        }
        let sse = sl + sr;
        if best.map_or(true, |(_, b)| sse < b) {
            best = Some((HockeyStickFit { k1: left.k, n1: left.n, k2: right.k, n2: right.n }, sse));
        }
    }
    let (seed, seed_sse) =
        best.ok_or_else(|| FitError::Degenerate("no split separates two distinct segments".into()))?;

    let (sx, sy): (Vec<f64>, Vec<f64>) = points.into_iter().unzip();
    let problem = FitProblem::new(HockeyStick, &sx, &sy);
    let init = vec![seed.k1, seed.n1, seed.k2, seed.n2];
    let solution = simplex::minimize(problem, init, &Options::default())?;
    debug!(
        "hockey stick: split sse {:.6e}, refined sse {:.6e} after {} iterations",
        seed_sse, solution.cost, solution.iterations
    );

    let fit = HockeyStickFit::from_params(&solution.params);
    if !fit.lowpoint().is_finite() {
        return Err(FitError::NotConverged("segments are parallel".into()));
    }
    Ok(fit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_is_exact_on_a_line() {
        let xs = [0.0, 1.0, 2.0, 3.0];
        let ys = [1.0, 3.0, 5.0, 7.0];
        let fit = fit_line(&xs, &ys).unwrap();
        assert!((fit.k - 2.0).abs() < 1e-12);
        assert!((fit.n - 1.0).abs() < 1e-12);
        assert!((fit.at(10.0) - 21.0).abs() < 1e-9);
    }

    #[test]
    fn test_line_rejects_constant_x() {
        assert!(matches!(fit_line(&[2.0, 2.0, 2.0], &[1.0, 2.0, 3.0]), Err(FitError::Degenerate(_))));
        assert_eq!(fit_line(&[1.0], &[1.0]), Err(FitError::TooFewPoints { needed: 2, got: 1 }));
    }

    #[test]
    fn test_hockey_stick_recovers_heating_curve() {
        // Heating load falls with temperature until 5 degrees, then a slow rise.
        let xs: Vec<f64> = (-10..=20).rev().map(|t| t as f64).collect();
        let ys: Vec<f64> =
            xs.iter().map(|&t| if t < 5.0 { -2.0 * t + 20.0 } else { 0.5 * t + 7.5 }).collect();
        let fit = fit_hockey_stick(&xs, &ys).unwrap();
        assert!((fit.k1 + 2.0).abs() < 1e-6);
        assert!((fit.k2 - 0.5).abs() < 1e-6);
        assert!((fit.lowpoint() - 5.0).abs() < 1e-6);
        assert!((fit.at(fit.lowpoint()) - 10.0).abs() < 1e-6);
    }

    #[test]
    fn test_hockey_stick_needs_four_points() {
        let err = fit_hockey_stick(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0]).unwrap_err();
        assert_eq!(err, FitError::TooFewPoints { needed: 4, got: 3 });
    }
}
