//! Plain-text renderings of an extraction: a result table and a per-feature dependency tree.

use crate::analysis::topology;
use crate::compute::engine::Extraction;
use crate::store::context::InputContext;
use crate::store::registry::{Body, Catalog};
use crate::store::types::Data;
use std::collections::HashMap;
use std::fmt::Write;

/// Plain-text table of every extracted feature followed by the recorded failures.
pub fn format_report(extraction: &Extraction) -> String {
    let mut out = String::new();
    let entity = extraction.entity_id.as_deref().unwrap_or("<unnamed>");
    let _ = writeln!(out, "FEATURES for entity '{}' ({} min samples):", entity, extraction.interval_minutes);
    let _ = writeln!(out, "--------------------------------------------------");

    let width = extraction.features.keys().map(String::len).max().unwrap_or(0);
    for (name, value) in &extraction.features {
        let _ = writeln!(out, "  {:<width$}  {}", name, value, width = width);
    }

    if !extraction.failures.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "FAILURES ({}):", extraction.failures.len());
        for record in &extraction.failures {
            let _ = writeln!(out, "  {} [{}] {}", record.name, record.kind, record.reason);
        }
    }
    out
}

/// Dependency tree of `target`, annotated with what the extraction produced for each node.
pub fn format_trace(catalog: &Catalog, context: &InputContext, extraction: &Extraction, target: &str) -> String {
    let mut tracer = Tracer { catalog, context, extraction, visited_at_level: HashMap::new(), output: String::new() };

    if catalog.get(target).is_some() {
        let _ = writeln!(tracer.output, "TRACE for '{}':", target);
        let _ = writeln!(tracer.output, "Depends on {} catalog entries", topology::upstream(catalog, target).len());
        let _ = writeln!(tracer.output, "--------------------------------------------------");
        tracer.trace_node(target, 1, "");
    } else {
        let _ = writeln!(tracer.output, "Error: no computation named '{}'", target);
    }
    tracer.output
}

struct Tracer<'a> {
    catalog: &'a Catalog,
    context: &'a InputContext,
    extraction: &'a Extraction,
    visited_at_level: HashMap<String, usize>,
    output: String,
}

impl Tracer<'_> {
    fn trace_node(&mut self, name: &str, level: usize, prefix: &str) {
        if let Some(&first_seen) = self.visited_at_level.get(name) {
            let _ = writeln!(self.output, "{}{} -> (Ref to L{})", prefix, name, first_seen);
            return;
        }
        self.visited_at_level.insert(name.to_string(), level);

        let header = format!("[L{}] {}{}", level, name, self.format_value(name));
        let Some(computation) = self.catalog.get(name) else {
            let _ = writeln!(self.output, "{}{} -> Input", prefix, header);
            return;
        };

        match computation.body() {
            Body::Secondary { primary } => {
                let _ = writeln!(self.output, "{}{} <- emitted by {}", prefix, header, primary);
            }
            Body::Data(_) | Body::Feature(_) => {
                let _ = writeln!(self.output, "{}{}", prefix, header);
            }
        }
        if let Some(limit) = computation.max_interval_minutes() {
            let stem = self.build_child_stem(prefix);
            let _ = writeln!(self.output, "{}|  requires samples of at most {} min", stem, limit);
        }

        let children: Vec<String> = computation
            .data_deps()
            .iter()
            .chain(computation.feature_deps())
            .cloned()
            .collect();
        self.recurse_children(prefix, &children, level);
    }

    fn recurse_children(&mut self, prefix: &str, children: &[String], level: usize) {
        let stem = self.build_child_stem(prefix);
        for (i, child) in children.iter().enumerate() {
            let connector = if i == children.len() - 1 { "`--" } else { "|--" };
            let full_prefix = format!("{}{}", stem, connector);
            self.trace_node(child, level + 1, &full_prefix);
        }
    }

    fn format_value(&self, name: &str) -> String {
        if let Some(value) = self.extraction.features.get(name) {
            return format!(" [{}]", value);
        }
        if let Some(record) = self.extraction.failure(name) {
            return format!(" [Err: {}]", record.kind);
        }
        match self.context.get(name) {
            Some(Data::Series(s)) => format!(" [len={}]", s.len()),
            Some(Data::Mask(m)) => format!(" [{} of {} set]", m.iter().filter(|b| **b).count(), m.len()),
            Some(Data::Labels(l)) => format!(" [len={}]", l.len()),
            Some(Data::Scalar(v)) => format!(" [{:.3}]", v),
            Some(Data::Count(n)) => format!(" [{}]", n),
            None => " [?]".to_string(),
        }
    }

    fn build_child_stem(&self, current_prefix: &str) -> String {
        current_prefix.replace("`--", "   ").replace("|--", "|  ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compute::engine::extract_named;
    use crate::features::{fixtures, standard_catalog};

    #[test]
    fn test_trace_shows_values_and_shared_dependencies() {
        let catalog = standard_catalog().unwrap();
        let mut ctx = fixtures::context(1, |i| match i {
            24..=39 => 3.0,
            40..=55 => 2.0,
            _ => 1.0,
        });
        let out = extract_named(&catalog, &mut ctx, ["r_morning_noon"]);
        let trace = format_trace(&catalog, &ctx, &out, "r_morning_noon");

        assert!(trace.starts_with("TRACE for 'r_morning_noon':"));
        assert!(trace.contains("[L1] r_morning_noon [1.5000]"));
        assert!(trace.contains("[L2] c_morning [3.0000]"));
        assert!(trace.contains("mornings [16 of 96 set]"));
        assert!(trace.contains("consumption -> (Ref to L"));
        assert!(trace.contains("morning_start [6.000] -> Input"));
    }

    #[test]
    fn test_trace_marks_failures_and_unknown_targets() {
        let catalog = standard_catalog().unwrap();
        let mut ctx = fixtures::context(1, |_| 1.0);
        let out = extract_named(&catalog, &mut ctx, ["k"]);
        let trace = format_trace(&catalog, &ctx, &out, "n");
        assert!(trace.contains("n [?] <- emitted by k"));
        assert!(trace.contains("[L2] k [Err: MissingDataError]"));
        assert!(format_trace(&catalog, &ctx, &out, "nope").starts_with("Error: no computation named 'nope'"));
    }

    #[test]
    fn test_report_lists_features_then_failures() {
        let catalog = standard_catalog().unwrap();
        let mut ctx = fixtures::context(1, |_| 2.0);
        let out = extract_named(&catalog, &mut ctx, ["c_morning", "k"]);
        let report = format_report(&out);
        assert!(report.starts_with("FEATURES for entity 'test-entity' (15 min samples):"));
        assert!(report.contains("c_morning  2.0000"));
        assert!(report.contains("FAILURES (1):"));
        assert!(report.contains("k [MissingDataError]"));
    }
}
