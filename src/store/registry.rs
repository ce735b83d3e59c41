//! The computation catalog: an explicit registration table of named computations.

use super::types::{ComputationKind, Data, FeatureValue};
use crate::compute::bindings::{Bindings, BodyError, Emitter};
use smallvec::SmallVec;
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

pub type Names = SmallVec<[String; 4]>;
pub type DataFn = Box<dyn Fn(&Bindings<'_>) -> Result<Data, BodyError> + Send + Sync>;
pub type FeatureFn =
    Box<dyn Fn(&Bindings<'_>, &mut Emitter) -> Result<FeatureValue, BodyError> + Send + Sync>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("computation name cannot be empty")]
    EmptyName,
    #[error("computation '{0}' is already registered")]
    DuplicateName(String),
    #[error("computation '{0}' depends on itself")]
    SelfDependency(String),
}

pub enum Body {
    /// Produces a context entry under the computation's name.
    Data(DataFn),
    /// Produces a feature, plus any declared secondary results.
    Feature(FeatureFn),
    /// A result written by the fan-out of `primary`.
    Secondary { primary: String },
}

pub struct Computation {
    name: String,
    doc: String,
    max_interval: Option<f64>,
    data_deps: Names,
    feature_deps: Names,
    emits: Names,
    body: Body,
}

fn to_names(names: &[&str]) -> Names {
    names.iter().map(|n| n.to_string()).collect()
}

impl Computation {
    fn with_body(name: &str, body: Body) -> Self {
        Self {
            name: name.to_string(),
            doc: String::new(),
            max_interval: None,
            data_deps: Names::new(),
            feature_deps: Names::new(),
            emits: Names::new(),
            body,
        }
    }

    /// A data derivation.
    pub fn data<F, V>(name: &str, body: F) -> Self
    where
        F: Fn(&Bindings<'_>) -> Result<V, BodyError> + Send + Sync + 'static,
        V: Into<Data>,
    {
        Self::with_body(name, Body::Data(Box::new(move |b: &Bindings<'_>| body(b).map(Into::into))))
    }

    /// A feature computation with a single result.
    pub fn feature<F, V>(name: &str, body: F) -> Self
    where
        F: Fn(&Bindings<'_>) -> Result<V, BodyError> + Send + Sync + 'static,
        V: Into<FeatureValue>,
    {
        Self::with_body(name, Body::Feature(Box::new(move |b: &Bindings<'_>, _: &mut Emitter| {
            body(b).map(Into::into)
        })))
    }

    /// A feature computation that also populates each name in `emits`.
    pub fn multi<F>(name: &str, emits: &[&str], body: F) -> Self
    where
        F: Fn(&Bindings<'_>, &mut Emitter) -> Result<FeatureValue, BodyError> + Send + Sync + 'static,
    {
        let mut c = Self::with_body(name, Body::Feature(Box::new(body)));
        c.emits = to_names(emits);
        c
    }

    /// A catalog entry for a result emitted by `primary`.
    pub fn secondary(name: &str, primary: &str) -> Self {
        let mut c = Self::with_body(name, Body::Secondary { primary: primary.to_string() });
        c.feature_deps.push(primary.to_string());
        c
    }

    pub fn doc(mut self, doc: &str) -> Self {
        self.doc = doc.to_string();
        self
    }

    /// Coarsest sampling interval, in minutes, this computation accepts.
    pub fn max_interval(mut self, minutes: f64) -> Self {
        self.max_interval = Some(minutes);
        self
    }

    pub fn needs_data(mut self, names: &[&str]) -> Self {
        self.data_deps.extend(names.iter().map(|n| n.to_string()));
        self
    }

    pub fn needs_features(mut self, names: &[&str]) -> Self {
        self.feature_deps.extend(names.iter().map(|n| n.to_string()));
        self
    }

    pub fn name(&self) -> &str { &self.name }
    pub fn description(&self) -> &str { &self.doc }
    pub fn max_interval_minutes(&self) -> Option<f64> { self.max_interval }
    pub fn data_deps(&self) -> &[String] { &self.data_deps }
    pub fn feature_deps(&self) -> &[String] { &self.feature_deps }
    pub fn emits(&self) -> &[String] { &self.emits }
    pub fn body(&self) -> &Body { &self.body }

    pub fn kind(&self) -> ComputationKind {
        match self.body {
            Body::Data(_) => ComputationKind::DataDerivation,
            Body::Feature(_) | Body::Secondary { .. } => ComputationKind::FeatureComputation,
        }
    }
}

impl fmt::Debug for Computation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computation")
            .field("name", &self.name)
            .field("kind", &self.kind())
            .field("max_interval", &self.max_interval)
            .field("data_deps", &self.data_deps)
            .field("feature_deps", &self.feature_deps)
            .field("emits", &self.emits)
            .finish()
    }
}

/// Registered computations in registration order, indexed by name.
#[derive(Debug, Default)]
pub struct Catalog {
    entries: Vec<Computation>,
    index: HashMap<String, usize>,
}

impl Catalog {
    pub fn new() -> Self { Self::default() }
    pub fn len(&self) -> usize { self.entries.len() }
    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    pub fn register(&mut self, computation: Computation) -> Result<(), CatalogError> {
        let name = computation.name.clone();
        if name.is_empty() {
            return Err(CatalogError::EmptyName);
        }
        if self.index.contains_key(&name) {
            return Err(CatalogError::DuplicateName(name));
        }
        let deps_on_self = computation.data_deps.contains(&name) || computation.feature_deps.contains(&name);
        if deps_on_self {
            return Err(CatalogError::SelfDependency(name));
        }
        self.index.insert(name, self.entries.len());
        self.entries.push(computation);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Computation> {
        self.index.get(name).map(|&i| &self.entries[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Computation> {
        self.entries.iter()
    }

    /// Names of all feature computations, in registration order.
    pub fn feature_names(&self) -> impl Iterator<Item = &str> {
        self.entries
            .iter()
            .filter(|c| c.kind() == ComputationKind::FeatureComputation)
            .map(|c| c.name.as_str())
    }

    pub fn describe(&self, name: &str) -> Option<&str> {
        self.get(name).map(|c| c.doc.as_str())
    }
}
