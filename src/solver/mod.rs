//! Least-squares curve fitting for the temperature-dependence features.
pub mod fit;
pub mod problem;
pub mod simplex;

pub use fit::{fit_hockey_stick, fit_line, HockeyStickFit, LineFit};

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FitError {
    #[error("fit needs at least {needed} points, got {got}")]
    TooFewPoints { needed: usize, got: usize },
    #[error("degenerate input: {0}")]
    Degenerate(String),
    #[error("{0}")]
    NotConverged(String),
}
