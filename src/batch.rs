//! Extraction over many entities at once.
//!
//! Entities are independent: each builds its own context and engine, and the shared catalog is
//! only read, so the entities are processed on rayon's thread pool.

use crate::compute::engine::{extract_all, extract_named, Extraction};
use crate::config::EntityConfig;
use crate::store::context::{ContextError, InputContext};
use crate::store::registry::Catalog;
use crate::store::series::TimeSeries;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt::Write;
use tracing::{info, warn};

/// Marker line selecting every feature the catalog implements.
pub const ALL_AVAILABLE: &str = "all_available";

/// Which features to extract for every entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    AllAvailable,
    Named(Vec<String>),
}

impl Request {
    /// One feature name per line. Blank lines are skipped. A first line of
    /// `all_available` selects every feature, whatever follows it.
    pub fn from_lines(text: &str) -> Self {
        let names: Vec<String> = text.lines().map(str::trim).filter(|l| !l.is_empty()).map(String::from).collect();
        match names.first() {
            Some(first) if first == ALL_AVAILABLE => Request::AllAvailable,
            _ => Request::Named(names),
        }
    }
}

/// Everything known about one entity.
#[derive(Debug, Clone)]
pub struct EntityInput {
    pub id: String,
    pub consumption: TimeSeries,
    pub temperature: Option<TimeSeries>,
    pub config: EntityConfig,
}

impl EntityInput {
    fn into_context(self) -> Result<InputContext, ContextError> {
        let mut context = InputContext::new(self.consumption)?.with_config(&self.config).with_entity_id(self.id);
        if let Some(temperature) = self.temperature {
            context = context.with_temperature(temperature);
        }
        Ok(context)
    }
}

/// An entity whose inputs could not form a context.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Rejected {
    pub id: String,
    pub reason: String,
}

/// One row per entity, in input order.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FeatureTable {
    /// Sorted union of the feature names of all rows.
    pub columns: Vec<String>,
    pub rows: Vec<Extraction>,
    pub rejected: Vec<Rejected>,
}

impl FeatureTable {
    fn assemble(results: Vec<Result<Extraction, Rejected>>) -> Self {
        let mut table = FeatureTable::default();
        let mut columns = BTreeSet::new();
        for result in results {
            match result {
                Ok(row) => {
                    columns.extend(row.features.keys().cloned());
                    table.rows.push(row);
                }
                Err(rejected) => table.rejected.push(rejected),
            }
        }
        table.columns = columns.into_iter().collect();
        table
    }

    pub fn row(&self, id: &str) -> Option<&Extraction> {
        self.rows.iter().find(|r| r.entity_id.as_deref() == Some(id))
    }

    /// Value of `column` for every row, `None` where the row has no such feature.
    pub fn column(&self, column: &str) -> Vec<Option<f64>> {
        self.rows.iter().map(|r| r.get(column)).collect()
    }

    /// Comma-separated table with an `id` column first. Missing values are left empty.
    pub fn to_csv(&self) -> String {
        let mut out = String::from("id");
        for column in &self.columns {
            let _ = write!(out, ",{}", quoted(column));
        }
        out.push('\n');
        for row in &self.rows {
            out.push_str(&quoted(row.entity_id.as_deref().unwrap_or("")));
            for column in &self.columns {
                out.push(',');
                if let Some(value) = row.features.get(column) {
                    let _ = write!(out, "{}", value.as_f64());
                }
            }
            out.push('\n');
        }
        out
    }
}

fn quoted(field: &str) -> String {
    if field.contains(|c: char| matches!(c, ',' | '"' | '\n')) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Extracts `request` for every entity in parallel.
pub fn extract_many(catalog: &Catalog, entities: Vec<EntityInput>, request: &Request) -> FeatureTable {
    let results: Vec<Result<Extraction, Rejected>> = entities
        .into_par_iter()
        .map(|entity| {
            let id = entity.id.clone();
            let mut context = entity.into_context().map_err(|err| {
                warn!("skipping entity '{}': {}", id, err);
                Rejected { id, reason: err.to_string() }
            })?;
            Ok(match request {
                Request::AllAvailable => extract_all(catalog, &mut context),
                Request::Named(names) => extract_named(catalog, &mut context, names),
            })
        })
        .collect();

    let table = FeatureTable::assemble(results);
    info!(
        "extracted {} entities ({} rejected), {} columns",
        table.rows.len(),
        table.rejected.len(),
        table.columns.len()
    );
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{fixtures, standard_catalog};
    use rstest::rstest;

    fn entity(id: &str, level: f64) -> EntityInput {
        let values = (0..96).map(|i| if (24..40).contains(&i) { level } else { 1.0 }).collect();
        EntityInput {
            id: id.to_string(),
            consumption: TimeSeries::regular(fixtures::monday(), 15, values),
            temperature: None,
            config: fixtures::config(),
        }
    }

    #[rstest]
    #[case("all_available\nc_morning\n", Request::AllAvailable)]
    #[case("c_morning\n\n r_morning_noon \n", Request::Named(vec!["c_morning".into(), "r_morning_noon".into()]))]
    #[case("", Request::Named(vec![]))]
    fn test_request_from_lines(#[case] text: &str, #[case] expected: Request) {
        assert_eq!(Request::from_lines(text), expected);
    }

    #[test]
    fn test_rows_keep_input_order_and_ids() {
        let catalog = standard_catalog().unwrap();
        let entities = (0..8).map(|i| entity(&format!("e{}", i), i as f64 + 2.0)).collect();
        let request = Request::Named(vec!["c_morning".into(), "k".into()]);
        let table = extract_many(&catalog, entities, &request);

        assert_eq!(table.rows.len(), 8);
        for (i, row) in table.rows.iter().enumerate() {
            assert_eq!(row.entity_id.as_deref(), Some(format!("e{}", i).as_str()));
            assert_eq!(row.get("c_morning"), Some(i as f64 + 2.0));
            assert_eq!(row.failures.len(), 1);
        }
        assert_eq!(table.columns, vec!["c_morning".to_string()]);
        assert_eq!(table.row("e3").and_then(|r| r.get("c_morning")), Some(5.0));
    }

    #[test]
    fn test_unusable_entity_is_rejected_without_stopping_the_batch() {
        let catalog = standard_catalog().unwrap();
        let mut short = entity("short", 2.0);
        short.consumption = TimeSeries::regular(fixtures::monday(), 15, vec![1.0]);
        let table = extract_many(&catalog, vec![entity("ok", 2.0), short], &Request::from_lines("c_morning"));

        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rejected.len(), 1);
        assert_eq!(table.rejected[0].id, "short");
    }

    #[test]
    fn test_csv_has_union_of_columns() {
        let catalog = standard_catalog().unwrap();
        let mut with_temperature = entity("b,2", 3.0);
        with_temperature.temperature = Some(TimeSeries::regular(
            fixtures::monday(),
            15,
            (0..96).map(|i| (i % 20) as f64).collect(),
        ));
        let table = extract_many(&catalog, vec![entity("a", 2.0), with_temperature], &Request::from_lines("c_morning\nk"));

        assert_eq!(table.columns, vec!["c_morning".to_string(), "k".to_string(), "n".to_string()]);
        assert_eq!(table.column("k")[0], None);
        let csv = table.to_csv();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "id,c_morning,k,n");
        assert_eq!(lines[1], "a,2,,");
        assert!(lines[2].starts_with("\"b,2\",3,"));
    }
}
