//! Static analysis of a catalog's dependency structure.
//!
//! The engine resolves dependencies lazily and detects cycles at run time, so nothing here is
//! needed to evaluate a feature. These checks let a catalog be verified once, up front, and give
//! reports an evaluation order to present dependencies in.

use crate::config::SETTINGS;
use crate::store::context::{CONSUMPTION, TEMPERATURE};
use crate::store::registry::{Body, Catalog};
use crate::store::types::Namespace;
use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Dfs, Reversed};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogIssue {
    /// Computations that depend on each other in a loop, in registration order.
    Cycle(Vec<String>),
    /// A dependency that neither the catalog nor an entity can supply.
    Unresolved { name: String, dependency: String },
    /// A dependency listed under the wrong namespace.
    WrongNamespace { name: String, dependency: String, expected: Namespace },
    /// A secondary result whose primary does not declare it.
    NotEmitted { name: String, primary: String },
    /// A declared secondary result with no catalog entry attributing it to its primary.
    Unregistered { name: String, primary: String },
}

impl fmt::Display for CatalogIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogIssue::Cycle(names) => write!(f, "dependency cycle among {}", names.join(", ")),
            CatalogIssue::Unresolved { name, dependency } => {
                write!(f, "'{}' depends on '{}', which nothing provides", name, dependency)
            }
            CatalogIssue::WrongNamespace { name, dependency, expected } => {
                write!(f, "'{}' lists '{}' as {} but it is not", name, dependency, expected)
            }
            CatalogIssue::NotEmitted { name, primary } => {
                write!(f, "'{}' is attributed to '{}', which does not emit it", name, primary)
            }
            CatalogIssue::Unregistered { name, primary } => {
                write!(f, "'{}' emits '{}', which has no secondary entry", primary, name)
            }
        }
    }
}

/// Names an entity supplies itself rather than the catalog.
pub fn is_external_input(name: &str) -> bool {
    name == CONSUMPTION || name == TEMPERATURE || SETTINGS.contains(&name)
}

/// Edges point from a dependency to the computation that needs it.
struct DependencyGraph<'c> {
    graph: DiGraph<&'c str, ()>,
    nodes: HashMap<&'c str, NodeIndex>,
}

impl<'c> DependencyGraph<'c> {
    fn build(catalog: &'c Catalog) -> Self {
        let mut graph = DiGraph::with_capacity(catalog.len(), catalog.len() * 2);
        let nodes: HashMap<&str, NodeIndex> = catalog.iter().map(|c| (c.name(), graph.add_node(c.name()))).collect();
        for c in catalog.iter() {
            let to = nodes[c.name()];
            for dep in c.data_deps().iter().chain(c.feature_deps()) {
                if let Some(&from) = nodes.get(dep.as_str()) {
                    graph.update_edge(from, to, ());
                }
            }
        }
        Self { graph, nodes }
    }
}

/// Checks that every dependency resolves, namespaces match and no loops exist.
/// Returns every issue found, not only the first.
pub fn validate(catalog: &Catalog) -> Result<(), Vec<CatalogIssue>> {
    let mut issues = Vec::new();

    for c in catalog.iter() {
        let deps = c.data_deps().iter().map(|d| (d, Namespace::Data));
        for (dep, expected) in deps.chain(c.feature_deps().iter().map(|d| (d, Namespace::Feature))) {
            match catalog.get(dep) {
                Some(target) if target.kind().namespace() != expected => issues.push(CatalogIssue::WrongNamespace {
                    name: c.name().to_string(),
                    dependency: dep.clone(),
                    expected,
                }),
                Some(_) => {}
                None if expected == Namespace::Data && is_external_input(dep) => {}
                None => issues.push(CatalogIssue::Unresolved { name: c.name().to_string(), dependency: dep.clone() }),
            }
        }

        if let Body::Secondary { primary } = c.body() {
            let emitted = catalog.get(primary).map_or(false, |p| p.emits().iter().any(|e| e == c.name()));
            if !emitted {
                issues.push(CatalogIssue::NotEmitted { name: c.name().to_string(), primary: primary.clone() });
            }
        }
        for emitted in c.emits() {
            let attributed = catalog
                .get(emitted)
                .map_or(false, |e| matches!(e.body(), Body::Secondary { primary } if primary == c.name()));
            if !attributed {
                issues.push(CatalogIssue::Unregistered { name: emitted.clone(), primary: c.name().to_string() });
            }
        }
    }

    let deps = DependencyGraph::build(catalog);
    for component in tarjan_scc(&deps.graph) {
        if component.len() > 1 {
            let mut members: Vec<NodeIndex> = component;
            members.sort();
            issues.push(CatalogIssue::Cycle(members.iter().map(|&i| deps.graph[i].to_string()).collect()));
        }
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(issues)
    }
}

/// Every computation, dependencies first.
pub fn evaluation_order(catalog: &Catalog) -> Result<Vec<&str>, CatalogIssue> {
    let deps = DependencyGraph::build(catalog);
    toposort(&deps.graph, None)
        .map(|order| order.into_iter().map(|i| deps.graph[i]).collect())
        .map_err(|cycle| CatalogIssue::Cycle(vec![deps.graph[cycle.node_id()].to_string()]))
}

/// Everything `name` transitively depends on within the catalog, excluding `name` itself,
/// in registration order.
pub fn upstream<'c>(catalog: &'c Catalog, name: &str) -> Vec<&'c str> {
    let deps = DependencyGraph::build(catalog);
    let Some(&start) = deps.nodes.get(name) else {
        return Vec::new();
    };
    let reversed = Reversed(&deps.graph);
    let mut dfs = Dfs::new(reversed, start);
    let mut found = Vec::new();
    while let Some(i) = dfs.next(reversed) {
        if i != start {
            found.push(i);
        }
    }
    found.sort();
    found.into_iter().map(|i| deps.graph[i]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::registry::Computation;
    use crate::store::types::FeatureValue;

    fn feature(name: &str, deps: &[&str]) -> Computation {
        Computation::feature(name, |_| Ok(1.0)).needs_features(deps)
    }

    #[test]
    fn test_cycle_is_reported_with_all_members() {
        let mut catalog = Catalog::new();
        catalog.register(feature("a", &["b"])).unwrap();
        catalog.register(feature("b", &["c"])).unwrap();
        catalog.register(feature("c", &["a"])).unwrap();
        catalog.register(feature("d", &[])).unwrap();

        let issues = validate(&catalog).unwrap_err();
        assert_eq!(issues, vec![CatalogIssue::Cycle(vec!["a".into(), "b".into(), "c".into()])]);
        assert!(evaluation_order(&catalog).is_err());
    }

    #[test]
    fn test_unresolved_and_misplaced_dependencies() {
        let mut catalog = Catalog::new();
        catalog.register(Computation::data("hours", |_| Ok(vec![0u32])).needs_data(&[CONSUMPTION])).unwrap();
        catalog.register(feature("x", &["hours"])).unwrap();
        catalog.register(Computation::feature("y", |_| Ok(1.0)).needs_data(&["no_such_input", "morning_start"])).unwrap();

        let issues = validate(&catalog).unwrap_err();
        assert_eq!(
            issues,
            vec![
                CatalogIssue::WrongNamespace { name: "x".into(), dependency: "hours".into(), expected: Namespace::Feature },
                CatalogIssue::Unresolved { name: "y".into(), dependency: "no_such_input".into() },
            ]
        );
    }

    #[test]
    fn test_secondary_must_be_emitted() {
        let mut catalog = Catalog::new();
        catalog.register(Computation::multi("k", &["n"], |_, out| {
            out.emit("n", 0.0);
            Ok(FeatureValue::Float(1.0))
        })).unwrap();
        catalog.register(Computation::secondary("n", "k")).unwrap();
        catalog.register(Computation::secondary("m", "k")).unwrap();

        let issues = validate(&catalog).unwrap_err();
        assert_eq!(issues, vec![CatalogIssue::NotEmitted { name: "m".into(), primary: "k".into() }]);
    }

    #[test]
    fn test_emitted_result_needs_an_entry() {
        let mut catalog = Catalog::new();
        catalog.register(Computation::multi("a", &["z"], |_, out| {
            out.emit("z", 2.0);
            Ok(FeatureValue::Float(1.0))
        })).unwrap();

        let issues = validate(&catalog).unwrap_err();
        assert_eq!(issues, vec![CatalogIssue::Unregistered { name: "z".into(), primary: "a".into() }]);
        assert!(issues[0].to_string().contains("'a' emits 'z'"));
    }

    #[test]
    fn test_order_and_upstream() {
        let mut catalog = Catalog::new();
        catalog.register(feature("top", &["mid"])).unwrap();
        catalog.register(feature("mid", &["base"])).unwrap();
        catalog.register(feature("base", &[])).unwrap();
        catalog.register(feature("other", &[])).unwrap();

        let order = evaluation_order(&catalog).unwrap();
        let pos = |n: &str| order.iter().position(|x| *x == n).unwrap();
        assert!(pos("base") < pos("mid") && pos("mid") < pos("top"));
        assert_eq!(upstream(&catalog, "top"), vec!["mid", "base"]);
        assert!(upstream(&catalog, "unknown").is_empty());
    }
}
