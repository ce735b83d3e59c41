//! Evaluation: bindings handed to bodies, the lazy engine, precondition checks, numeric
//! kernels and the stores that hold results and failures.
pub mod bindings;
pub mod engine;
pub mod guard;
pub mod kernel;
pub mod ledger;
