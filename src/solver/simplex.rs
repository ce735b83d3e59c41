//! Implements `argmin::core::CostFunction` for a fit problem and refines parameters with
//! Nelder-Mead. The hockey-stick residuals have a kink at the low point, so the refinement
//! uses a derivative-free method.
use super::problem::{FitProblem, Model};
use super::FitError;
use argmin::core::{CostFunction, Error, Executor, State};
use argmin::solver::neldermead::NelderMead;

impl<M: Model> CostFunction for FitProblem<'_, M> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, p: &Self::Param) -> Result<Self::Output, Error> {
        if p.len() != self.model.n_params() {
            return Err(Error::msg(format!("model takes {} parameters, got {}", self.model.n_params(), p.len())));
        }
        Ok(self.sum_of_squares(p))
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Options {
    pub max_iters: u64,
    /// Stop once the costs at the simplex vertices spread less than this.
    pub sd_tolerance: f64,
    /// Initial simplex edge relative to each parameter, never shorter than `min_step`.
    pub relative_step: f64,
    pub min_step: f64,
}

impl Default for Options {
    fn default() -> Self {
        Self { max_iters: 2000, sd_tolerance: 1e-14, relative_step: 0.05, min_step: 0.1 }
    }
}

#[derive(Debug, Clone)]
pub struct Solution {
    pub params: Vec<f64>,
    pub cost: f64,
    pub iterations: u64,
}

/// `init` plus one vertex per parameter, each shifted along its own axis.
fn initial_simplex(init: &[f64], options: &Options) -> Vec<Vec<f64>> {
    let mut vertices = vec![init.to_vec()];
    for i in 0..init.len() {
        let mut v = init.to_vec();
        v[i] += (init[i].abs() * options.relative_step).max(options.min_step);
        vertices.push(v);
    }
    vertices
}

/// Refines `init`. The returned cost is never worse than the cost at `init`.
pub fn minimize<M: Model>(problem: FitProblem<'_, M>, init: Vec<f64>, options: &Options) -> Result<Solution, FitError> {
    if init.len() != problem.model.n_params() {
        return Err(FitError::Degenerate(format!(
            "model takes {} parameters, got {}",
            problem.model.n_params(),
            init.len()
        )));
    }
    let start_cost = problem.sum_of_squares(&init);
    if !start_cost.is_finite() {
        return Err(FitError::NotConverged("initial guess has a non-finite cost".into()));
    }

    let solver = NelderMead::new(initial_simplex(&init, options))
        .with_sd_tolerance(options.sd_tolerance)
        .map_err(|e| FitError::NotConverged(e.to_string()))?;
    let res = Executor::new(problem, solver)
        .configure(|state| state.max_iters(options.max_iters))
        .run()
        .map_err(|e| FitError::NotConverged(e.to_string()))?;

    let iterations = res.state().get_iter();
    let cost = res.state().get_best_cost();
    match res.state().get_best_param() {
        Some(best) if cost.is_finite() && cost <= start_cost => {
            Ok(Solution { params: best.clone(), cost, iterations })
        }
        _ => Ok(Solution { params: init, cost: start_cost, iterations }),
    }
}
