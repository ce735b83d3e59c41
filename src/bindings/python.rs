use crate::analysis::topology;
use crate::compute::engine::{extract_all, extract_named, Extraction};
use crate::config::EntityConfig;
use crate::display::trace;
use crate::features::standard_catalog;
use crate::store::context::InputContext;
use crate::store::registry::{Catalog, CatalogError};
use crate::store::series::TimeSeries;
use chrono::NaiveDateTime;
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use std::sync::OnceLock;

fn catalog() -> PyResult<&'static Catalog> {
    static CATALOG: OnceLock<Result<Catalog, CatalogError>> = OnceLock::new();
    CATALOG
        .get_or_init(standard_catalog)
        .as_ref()
        .map_err(|e| PyRuntimeError::new_err(e.to_string()))
}

/// Builds a context from regularly spaced readings starting at `start` (ISO 8601).
/// `temperature`, when given, shares the consumption timestamps.
fn build_context(
    values: Vec<f64>,
    start: &str,
    step_minutes: i64,
    temperature: Option<Vec<f64>>,
    meta_json: Option<&str>,
) -> PyResult<InputContext> {
    let start: NaiveDateTime = start
        .parse()
        .map_err(|e| PyValueError::new_err(format!("Invalid start timestamp '{}': {}", start, e)))?;
    if step_minutes <= 0 {
        return Err(PyValueError::new_err("step_minutes must be positive"));
    }
    let mut context = InputContext::new(TimeSeries::regular(start, step_minutes, values))
        .map_err(|e| PyValueError::new_err(e.to_string()))?;
    if let Some(temps) = temperature {
        context = context.with_temperature(TimeSeries::regular(start, step_minutes, temps));
    }
    if let Some(json) = meta_json {
        let config = EntityConfig::from_json_str(json).map_err(|e| PyValueError::new_err(e.to_string()))?;
        context = context.with_config(&config);
    }
    Ok(context)
}

fn run(catalog: &Catalog, context: &mut InputContext, features: Option<Vec<String>>) -> Extraction {
    match features {
        Some(names) => extract_named(catalog, context, &names),
        None => extract_all(catalog, context),
    }
}

/// Extracts `features` (all implemented features when omitted) and returns the result as JSON.
#[pyfunction]
#[pyo3(signature = (values, start, step_minutes, temperature=None, meta_json=None, features=None))]
fn extract(
    values: Vec<f64>,
    start: &str,
    step_minutes: i64,
    temperature: Option<Vec<f64>>,
    meta_json: Option<&str>,
    features: Option<Vec<String>>,
) -> PyResult<String> {
    let catalog = catalog()?;
    let mut context = build_context(values, start, step_minutes, temperature, meta_json)?;
    run(catalog, &mut context, features)
        .to_json()
        .map_err(|e| PyRuntimeError::new_err(e.to_string()))
}

/// Extracts `target` and returns its annotated dependency tree.
#[pyfunction]
#[pyo3(signature = (target, values, start, step_minutes, temperature=None, meta_json=None))]
fn trace_feature(
    target: &str,
    values: Vec<f64>,
    start: &str,
    step_minutes: i64,
    temperature: Option<Vec<f64>>,
    meta_json: Option<&str>,
) -> PyResult<String> {
    let catalog = catalog()?;
    let mut context = build_context(values, start, step_minutes, temperature, meta_json)?;
    let extraction = run(catalog, &mut context, Some(vec![target.to_string()]));
    Ok(trace::format_trace(catalog, &context, &extraction, target))
}

#[pyfunction]
fn list_features() -> PyResult<Vec<String>> {
    Ok(catalog()?.feature_names().map(String::from).collect())
}

#[pyfunction]
fn describe(name: &str) -> PyResult<String> {
    catalog()?
        .describe(name)
        .map(String::from)
        .ok_or_else(|| PyValueError::new_err(format!("No computation named '{}'", name)))
}

/// Raises if the standard catalog has unresolved dependencies or cycles.
#[pyfunction]
fn validate() -> PyResult<()> {
    topology::validate(catalog()?).map_err(|issues| {
        let msg = issues.iter().map(ToString::to_string).collect::<Vec<_>>().join("\n");
        PyValueError::new_err(msg)
    })
}

/// Every catalog entry, dependencies first.
#[pyfunction]
fn evaluation_order() -> PyResult<Vec<String>> {
    topology::evaluation_order(catalog()?)
        .map(|order| order.into_iter().map(String::from).collect())
        .map_err(|e| PyValueError::new_err(e.to_string()))
}

pub fn register(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(extract, m)?)?;
    m.add_function(wrap_pyfunction!(trace_feature, m)?)?;
    m.add_function(wrap_pyfunction!(list_features, m)?)?;
    m.add_function(wrap_pyfunction!(describe, m)?)?;
    m.add_function(wrap_pyfunction!(validate, m)?)?;
    m.add_function(wrap_pyfunction!(evaluation_order, m)?)?;
    Ok(())
}
