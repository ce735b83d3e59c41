//! A nonlinear least-squares problem: a parametric model and the points it is fitted to.

pub trait Model {
    fn n_params(&self) -> usize;
    fn eval(&self, params: &[f64], x: f64) -> f64;
}

pub struct FitProblem<'a, M: Model> {
    pub model: M,
    pub xs: &'a [f64],
    pub ys: &'a [f64],
}

impl<'a, M: Model> FitProblem<'a, M> {
    pub fn new(model: M, xs: &'a [f64], ys: &'a [f64]) -> Self {
        Self { model, xs, ys }
    }

    pub fn len(&self) -> usize { self.xs.len().min(self.ys.len()) }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    /// `model(x_i) - y_i` for every point.
    pub fn residuals(&self, params: &[f64]) -> Vec<f64> {
        self.xs
            .iter()
            .zip(self.ys)
            .map(|(&x, &y)| self.model.eval(params, x) - y)
            .collect()
    }

    pub fn sum_of_squares(&self, params: &[f64]) -> f64 {
        sum_sq(&self.residuals(params))
    }
}

pub fn sum_sq(residuals: &[f64]) -> f64 {
    residuals.iter().map(|r| r * r).sum()
}
