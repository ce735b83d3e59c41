//! A synchronous, single-threaded extraction engine.
//!
//! `Engine::evaluate` resolves one feature by walking its declared dependencies on demand:
//! guard, context dependencies, feature dependencies, body, memo write. Results land in two
//! write-once stores (the context for derived data, the feature map for features) and every
//! failure is cached for the rest of the run.
use crate::compute::bindings::{BodyError, Bindings, Emitter};
use crate::compute::guard;
use crate::compute::ledger::{ExtractionError, FailureLedger, FailureRecord, MemoStore};
use crate::store::context::InputContext;
use crate::store::registry::{Body, Catalog, Computation};
use crate::store::types::{ComputationKind, Data, FeatureValue, Namespace};
use serde::Serialize;
use std::any::Any;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::panic::{self, AssertUnwindSafe};
use tracing::{debug, info, trace};

/// The outcome of one extraction run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Extraction {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
    pub interval_minutes: f64,
    pub features: BTreeMap<String, FeatureValue>,
    pub failures: Vec<FailureRecord>,
}

impl Extraction {
    pub fn get(&self, name: &str) -> Option<f64> {
        self.features.get(name).map(FeatureValue::as_f64)
    }

    pub fn failure(&self, name: &str) -> Option<&FailureRecord> {
        self.failures.iter().find(|r| r.name == name)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

pub struct Engine<'a> {
    catalog: &'a Catalog,
    context: &'a mut InputContext,
    features: MemoStore<FeatureValue>,
    failed: HashMap<String, ExtractionError>,
    // Names asked for in this run that are not features of the catalog.
    unknown: HashSet<String>,
    // Names currently being evaluated, outermost first.
    stack: Vec<&'a str>,
}

impl<'a> Engine<'a> {
    pub fn new(catalog: &'a Catalog, context: &'a mut InputContext) -> Self {
        Self {
            catalog,
            context,
            features: MemoStore::new(Namespace::Feature),
            failed: HashMap::new(),
            unknown: HashSet::new(),
            stack: Vec::new(),
        }
    }

    pub fn features(&self) -> &MemoStore<FeatureValue> { &self.features }

    pub fn context(&self) -> &InputContext { self.context }

    /// Produces the feature `name`, evaluating whatever it depends on first.
    pub fn evaluate(&mut self, name: &str) -> Result<FeatureValue, ExtractionError> {
        if let Some(value) = self.features.get(name) {
            trace!("'{}' is memoized", name);
            return Ok(*value);
        }
        let computation = match self.catalog.get(name) {
            Some(c) if c.kind() == ComputationKind::FeatureComputation => c,
            _ => {
                self.unknown.insert(name.to_string());
                return Err(ExtractionError::UnknownComputation { name: name.to_string() });
            }
        };
        self.produce(computation)?;
        self.features.get(name).copied().ok_or_else(|| ExtractionError::ComputationBody {
            name: name.to_string(),
            cause: "no value was stored".to_string(),
        })
    }

    /// Binds the context entry `dep` for `owner`, generating it if a derivation exists.
    fn require_data(&mut self, owner: &str, dep: &str) -> Result<Data, ExtractionError> {
        if let Some(value) = self.context.get(dep) {
            return Ok(value.clone());
        }
        let derivation = match self.catalog.get(dep) {
            Some(c) if c.kind() == ComputationKind::DataDerivation => c,
            _ => {
                return Err(ExtractionError::MissingData {
                    name: owner.to_string(),
                    missing: dep.to_string(),
                })
            }
        };
        debug!("{} needs data {}. generating.", owner, dep);
        self.produce(derivation).map_err(|e| depends(owner, dep, e))?;
        self.context.get(dep).cloned().ok_or_else(|| ExtractionError::MissingData {
            name: owner.to_string(),
            missing: dep.to_string(),
        })
    }

    fn produce(&mut self, computation: &'a Computation) -> Result<(), ExtractionError> {
        let name = computation.name();
        if let Some(pos) = self.stack.iter().position(|n| *n == name) {
            let mut path: Vec<String> = self.stack[pos..].iter().map(|n| n.to_string()).collect();
            path.push(name.to_string());
            return Err(ExtractionError::DependencyCycle { name: name.to_string(), path });
        }
        if let Some(err) = self.failed.get(name) {
            trace!("'{}' already failed in this run", name);
            return Err(err.clone());
        }

        self.stack.push(name);
        let result = self.run(computation);
        self.stack.pop();

        if let Err(err) = &result {
            debug!("{} '{}' failed: {}", computation.kind().namespace(), name, err);
            self.failed.insert(name.to_string(), err.clone());
        }
        result
    }

    fn run(&mut self, computation: &'a Computation) -> Result<(), ExtractionError> {
        let name = computation.name();
        guard::check(computation, self.context.interval_minutes())?;

        let mut bindings = Bindings::new(name, self.context.interval_minutes());
        for dep in computation.data_deps() {
            let value = self.require_data(name, dep)?;
            bindings.bind_data(dep, value);
        }
        for dep in computation.feature_deps() {
            let value = self.evaluate(dep).map_err(|e| depends(name, dep, e))?;
            bindings.bind_feature(dep, value);
        }

        match computation.body() {
            Body::Data(body) => {
                let value = guarded(name, || body(&bindings))?;
                self.context.insert(name, value);
            }
            Body::Feature(body) => {
                let mut emitter = Emitter::new();
                let value = guarded(name, || body(&bindings, &mut emitter))?;
                let emitted = emitter.into_values();
                check_results(computation, value, &emitted)?;
                self.features.insert(name, value);
                for (secondary, v) in emitted {
                    if !self.failed.contains_key(&secondary) && !self.unknown.contains(&secondary) {
                        self.features.insert(&secondary, v);
                    }
                }
            }
            Body::Secondary { primary } => {
                if !self.features.contains(name) {
                    return Err(ExtractionError::ComputationBody {
                        name: name.to_string(),
                        cause: format!("'{}' did not produce '{}'", primary, name),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn finish(self, ledger: FailureLedger) -> Extraction {
        let features = self.features.into_inner();
        info!(
            "extraction {}: {} features, {} failures",
            self.context.entity_id().unwrap_or("<anonymous>"),
            features.len(),
            ledger.len()
        );
        Extraction {
            entity_id: self.context.entity_id().map(str::to_string),
            interval_minutes: self.context.interval_minutes(),
            features,
            failures: ledger.into_records(),
        }
    }
}

fn depends(name: &str, dependency: &str, source: ExtractionError) -> ExtractionError {
    ExtractionError::DependencyFailed {
        name: name.to_string(),
        dependency: dependency.to_string(),
        source: Box::new(source),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Runs a body, turning its error or panic into a `ComputationBody` failure.
fn guarded<T>(
    name: &str,
    body: impl FnOnce() -> Result<T, BodyError>,
) -> Result<T, ExtractionError> {
    panic::catch_unwind(AssertUnwindSafe(body))
        .unwrap_or_else(|payload| Err(BodyError::Panicked(panic_message(payload))))
        .map_err(|cause| ExtractionError::ComputationBody {
            name: name.to_string(),
            cause: cause.to_string(),
        })
}

fn check_results(
    computation: &Computation,
    value: FeatureValue,
    emitted: &[(String, FeatureValue)],
) -> Result<(), ExtractionError> {
    let fail = |cause: String| ExtractionError::ComputationBody {
        name: computation.name().to_string(),
        cause,
    };
    if !value.is_finite() {
        return Err(fail(format!("result is not finite ({})", value)));
    }
    for (secondary, v) in emitted {
        if !computation.emits().contains(secondary) {
            return Err(fail(format!("emitted undeclared result '{}'", secondary)));
        }
        if !v.is_finite() {
            return Err(fail(format!("secondary '{}' is not finite ({})", secondary, v)));
        }
    }
    for declared in computation.emits() {
        if !emitted.iter().any(|(n, _)| n == declared) {
            return Err(fail(format!("did not emit declared result '{}'", declared)));
        }
    }
    Ok(())
}

/// Evaluates every feature in the catalog, in registration order.
pub fn extract_all(catalog: &Catalog, context: &mut InputContext) -> Extraction {
    let names: Vec<&str> = catalog.feature_names().collect();
    extract_named(catalog, context, &names)
}

/// Evaluates exactly `names`, in order. A run never fails as a whole.
pub fn extract_named<I, S>(catalog: &Catalog, context: &mut InputContext, names: I) -> Extraction
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut engine = Engine::new(catalog, context);
    let mut ledger = FailureLedger::new();
    for name in names {
        let name = name.as_ref();
        if let Err(err) = engine.evaluate(name) {
            if ledger.record(name, &err) {
                debug!("could not extract '{}': {}", name, err);
            }
        }
    }
    engine.finish(ledger)
}
