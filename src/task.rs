//! Task orchestration: forward prediction or inverse optimization.
//!
//! [`Engine::run_task`] is the single error boundary of the core. Every
//! failure inside feature building, prediction or search, including a
//! panic raised by a model implementation, comes back as a failure
//! [`TaskEnvelope`] instead of an `Err` or an unwind.

use crate::config::Root;
use crate::error::{CoreError, CoreResult};
use crate::features::FeatureBuilder;
use crate::logic::enforce_activation;
use crate::model::{RegressionModel, Scaler};
use crate::objective::{Goal, Objective, Predictor};
use crate::optimizer::{minimize, validate_bounds, SearchResult, SearchSettings, Strategy};
use crate::schema::keys::{CARBON, OXYGEN};
use crate::schema::{FeatureSchema, Limits, ParamStats, ParamValue, Params};
use crate::verification::{verify, VerificationMetrics};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use tracing::{info, warn};

/// One entry of the task input mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InputEntry {
    Spec {
        #[serde(default)]
        value: Option<ParamValue>,
        #[serde(default)]
        is_predict: bool,
    },
    Literal(ParamValue),
}

impl InputEntry {
    pub fn fixed(value: impl Into<ParamValue>) -> Self {
        InputEntry::Literal(value.into())
    }

    pub fn free() -> Self {
        InputEntry::Spec {
            value: None,
            is_predict: true,
        }
    }

    pub fn is_free(&self) -> bool {
        matches!(self, InputEntry::Spec { is_predict: true, .. })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ChannelTarget {
    #[serde(default)]
    pub value: Option<f64>,
    #[serde(default)]
    pub is_constraint: bool,
}

impl ChannelTarget {
    pub fn constrained(value: f64) -> Self {
        Self {
            value: Some(value),
            is_constraint: true,
        }
    }

    /// The target, if the channel is constrained and carries a value.
    /// A constrained zero is still a target.
    pub fn active(&self) -> Option<f64> {
        if self.is_constraint {
            self.value
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetSpec {
    #[serde(default)]
    pub ads: ChannelTarget,
    #[serde(default)]
    pub rem: ChannelTarget,
}

impl TargetSpec {
    pub fn goal(&self) -> Goal {
        Goal {
            ads: self.ads.active(),
            rem: self.rem.active(),
        }
    }
}

/// Request-scoped task description.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskInput {
    #[serde(default)]
    pub inputs: BTreeMap<String, InputEntry>,
    #[serde(default)]
    pub targets: TargetSpec,
}

impl TaskInput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_input(mut self, name: &str, entry: InputEntry) -> Self {
        self.inputs.insert(name.to_string(), entry);
        self
    }

    pub fn with_targets(mut self, targets: TargetSpec) -> Self {
        self.targets = targets;
        self
    }

    pub fn free_variables(&self) -> Vec<String> {
        self.inputs
            .iter()
            .filter(|(_, e)| e.is_free())
            .map(|(k, _)| k.clone())
            .collect()
    }

    /// Literal values only; free variables are left out.
    pub fn fixed_params(&self) -> CoreResult<Params> {
        let mut params = Params::new();
        for (name, entry) in &self.inputs {
            match entry {
                InputEntry::Literal(v) => params.insert(name.as_str(), v.clone()),
                InputEntry::Spec { is_predict: true, .. } => {}
                InputEntry::Spec { value: Some(v), .. } => params.insert(name.as_str(), v.clone()),
                InputEntry::Spec { value: None, .. } => {
                    return Err(CoreError::InvalidInput {
                        key: name.clone(),
                        message: "fixed parameter has no value".into(),
                    })
                }
            }
        }
        Ok(params)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Forward,
    Reverse,
}

/// How the reverse-mode answer was found.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchSummary {
    pub strategy: Strategy,
    pub best_loss: f64,
    pub evaluations: usize,
    pub history: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
}

impl From<SearchResult> for SearchSummary {
    fn from(r: SearchResult) -> Self {
        Self {
            strategy: r.strategy,
            best_loss: r.best_score,
            evaluations: r.evaluations,
            history: r.history,
            fallback_reason: r.fallback_reason,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskReport {
    pub mode: Mode,
    pub ads: f64,
    pub rem: f64,
    pub verification: VerificationMetrics,
    /// Free variables plus any carbon/oxygen present in the final mapping
    #[serde(skip_serializing_if = "Option::is_none")]
    pub optimized_params: Option<BTreeMap<String, f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<SearchSummary>,
    /// Final normalized parameter mapping, back-derived values included
    pub params: Params,
}

/// Uniform success/failure result of [`Engine::run_task`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskEnvelope {
    pub success: bool,
    #[serde(flatten)]
    pub report: Option<TaskReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TaskEnvelope {
    fn succeeded(report: TaskReport) -> Self {
        Self {
            success: true,
            report: Some(report),
            error: None,
        }
    }

    fn failed(error: &CoreError) -> Self {
        Self {
            success: false,
            report: None,
            error: Some(format!("Task failed: {}", error_chain(error))),
        }
    }
}

/// Error message followed by each distinct source in the chain.
pub fn error_chain(err: &dyn std::error::Error) -> String {
    let mut msg = err.to_string();
    let mut source = err.source();
    while let Some(s) = source {
        let text = s.to_string();
        if !msg.contains(&text) {
            msg.push_str(": ");
            msg.push_str(&text);
        }
        source = s.source();
    }
    msg
}

/// Result of [`Engine::load`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoadStatus {
    pub ok: bool,
    pub message: String,
}

/// Loaded model package plus everything a task needs. Immutable once
/// built; tasks borrow it read-only.
pub struct Engine {
    builder: FeatureBuilder,
    model: Box<dyn RegressionModel>,
    scaler: Option<Box<dyn Scaler>>,
    stats: BTreeMap<String, ParamStats>,
    limits: Limits,
    search: SearchSettings,
}

impl Engine {
    /// The model's own feature order, when declared, replaces the schema's.
    pub fn new(
        schema: FeatureSchema,
        model: Box<dyn RegressionModel>,
        scaler: Option<Box<dyn Scaler>>,
    ) -> Self {
        let schema = schema.with_model_features(model.feature_names());
        Self {
            builder: FeatureBuilder::new(schema),
            model,
            scaler,
            stats: BTreeMap::new(),
            limits: Limits::builtin(),
            search: SearchSettings::default(),
        }
    }

    pub fn with_stats(mut self, stats: BTreeMap<String, ParamStats>) -> Self {
        self.stats = stats;
        self
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_search(mut self, search: SearchSettings) -> Self {
        self.search = search;
        self
    }

    pub fn from_config(cfg: &Root) -> Self {
        let scaler = cfg
            .scaler
            .clone()
            .map(|s| Box::new(s) as Box<dyn Scaler>);
        Engine::new(cfg.schema.clone(), Box::new(cfg.model.clone()), scaler)
            .with_stats(cfg.stats.clone())
            .with_limits(Limits::with_overrides(&cfg.limits))
            .with_search(cfg.search_settings())
    }

    /// Loads a model package, reporting failure as a status instead of an
    /// error.
    pub fn load(path: impl AsRef<Path>) -> (Option<Engine>, LoadStatus) {
        let path = path.as_ref();
        if !path.exists() {
            let status = LoadStatus {
                ok: false,
                message: format!("Model file not found: {}", path.display()),
            };
            return (None, status);
        }
        match Root::from_file(path) {
            Ok(cfg) => {
                info!(
                    package = %path.display(),
                    version = %cfg.package.version,
                    "model package loaded"
                );
                let status = LoadStatus {
                    ok: true,
                    message: "Loaded successfully".to_string(),
                };
                (Some(Engine::from_config(&cfg)), status)
            }
            Err(e) => {
                let status = LoadStatus {
                    ok: false,
                    message: format!("Load failed: {:#}", e),
                };
                (None, status)
            }
        }
    }

    pub fn schema(&self) -> &FeatureSchema {
        self.builder.schema()
    }

    pub fn search_settings_mut(&mut self) -> &mut SearchSettings {
        &mut self.search
    }

    pub fn predictor(&self) -> Predictor<'_> {
        Predictor {
            builder: &self.builder,
            model: self.model.as_ref(),
            scaler: self.scaler.as_deref(),
        }
    }

    /// Ordered (and scaled) model input for `params` as given.
    pub fn feature_vector(&self, params: &Params) -> Vec<f64> {
        self.predictor().features(params)
    }

    /// Search bounds for each free variable, in order.
    pub fn bounds_for(&self, free: &[String]) -> Vec<(f64, f64)> {
        free.iter()
            .map(|name| self.limits.resolve(name, &self.stats).as_tuple())
            .collect()
    }

    /// Runs one task. Never returns an error and never unwinds.
    pub fn run_task(&self, task: &TaskInput) -> TaskEnvelope {
        match panic::catch_unwind(AssertUnwindSafe(|| self.execute(task))) {
            Ok(Ok(report)) => TaskEnvelope::succeeded(report),
            Ok(Err(e)) => {
                warn!(error = %e, "task failed");
                TaskEnvelope::failed(&e)
            }
            Err(payload) => {
                let e = CoreError::from_panic(payload);
                warn!(error = %e, "task panicked");
                TaskEnvelope::failed(&e)
            }
        }
    }

    fn execute(&self, task: &TaskInput) -> CoreResult<TaskReport> {
        let fixed = task.fixed_params()?;
        let free = task.free_variables();
        if free.is_empty() {
            return self.forward(fixed);
        }
        self.reverse(fixed, free, task.targets.goal())
    }

    fn forward(&self, fixed: Params) -> CoreResult<TaskReport> {
        info!(params = fixed.len(), "forward prediction");
        let mut params = enforce_activation(fixed);
        let [ads, rem] = self.predictor().predict(&params)?;
        let verification = verify(&params, ads, rem);
        verification.derived.apply(&mut params);

        Ok(TaskReport {
            mode: Mode::Forward,
            ads,
            rem,
            verification: verification.metrics(),
            optimized_params: None,
            search: None,
            params,
        })
    }

    fn reverse(&self, mut fixed: Params, free: Vec<String>, goal: Goal) -> CoreResult<TaskReport> {
        for name in &free {
            if self.schema().ui_cat_cols.contains(name) {
                return Err(CoreError::InvalidInput {
                    key: name.clone(),
                    message: "categorical parameters cannot be optimized".into(),
                });
            }
        }

        let bounds = self.bounds_for(&free);
        validate_bounds(&bounds)?;
        for (name, &(lo, hi)) in free.iter().zip(&bounds) {
            fixed.set_number(name, (lo + hi) / 2.0);
        }

        info!(
            free = ?free,
            strategy = %self.search.strategy,
            ads_target = ?goal.ads,
            rem_target = ?goal.rem,
            "reverse optimization"
        );

        let objective = Objective::new(self.predictor(), &fixed, &free, goal);
        let result = minimize(&|x: &[f64]| objective.evaluate(x), &bounds, &self.search);

        let mut params = objective.merge(&result.best);
        let [ads, rem] = self.predictor().predict(&params)?;
        let verification = verify(&params, ads, rem);
        verification.derived.apply(&mut params);

        let mut optimized = BTreeMap::new();
        for name in free.iter().map(String::as_str).chain([CARBON, OXYGEN]) {
            if let Some(v) = params.number(name) {
                optimized.insert(name.to_string(), v);
            }
        }

        info!(ads, rem, best_loss = result.best_score, "reverse optimization finished");

        Ok(TaskReport {
            mode: Mode::Reverse,
            ads,
            rem,
            verification: verification.metrics(),
            optimized_params: Some(optimized),
            search: Some(result.into()),
            params,
        })
    }
}
