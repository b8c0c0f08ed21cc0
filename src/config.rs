use crate::model::{LinearSurrogate, StandardScaler};
use crate::optimizer::{SearchSettings, Strategy};
use crate::schema::{FeatureSchema, ParamStats, Range};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Model package: schema, statistics, limits, search settings and the
/// regression artifacts, loaded once per process.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Root {
    pub package: Package,
    pub schema: FeatureSchema,
    #[serde(default)]
    pub stats: BTreeMap<String, ParamStats>,
    /// Overrides and extensions to the built-in hard limits
    #[serde(default)]
    pub limits: BTreeMap<String, Range>,
    pub optimizer: Option<Optimizer>,
    pub model: LinearSurrogate,
    pub scaler: Option<StandardScaler>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Package {
    pub program: String,
    pub module: String,
    pub version: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Optimizer {
    /// Primary strategy: "genetic" or "differential"
    #[serde(default)]
    pub strategy: Strategy,
    #[serde(default = "default_pop_size")]
    pub pop_size: usize,
    #[serde(default = "default_generations")]
    pub generations: usize,
    #[serde(default = "default_mutation_rate")]
    pub mutation_rate: f64,
    /// Random-search samples used when the primary strategy faults
    #[serde(default = "default_fallback_samples")]
    pub fallback_samples: usize,
    pub seed: Option<u64>,
    /// Differential evolution population multiplier per free variable
    #[serde(default = "default_de_popsize")]
    pub de_popsize: usize,
    #[serde(default = "default_de_maxiter")]
    pub de_maxiter: usize,
    #[serde(default = "default_de_recombination")]
    pub de_recombination: f64,
    /// Dither range of the differential weight
    #[serde(default = "default_de_mutation")]
    pub de_mutation: [f64; 2],
}

fn default_pop_size() -> usize { 50 }
fn default_generations() -> usize { 40 }
fn default_mutation_rate() -> f64 { 0.1 }
fn default_fallback_samples() -> usize { 500 }
fn default_de_popsize() -> usize { 10 }
fn default_de_maxiter() -> usize { 20 }
fn default_de_recombination() -> f64 { 0.7 }
fn default_de_mutation() -> [f64; 2] { [0.5, 1.0] }

impl Default for Optimizer {
    fn default() -> Self {
        Self {
            strategy: Strategy::Genetic,
            pop_size: 50,
            generations: 40,
            mutation_rate: 0.1,
            fallback_samples: 500,
            seed: None,
            de_popsize: 10,
            de_maxiter: 20,
            de_recombination: 0.7,
            de_mutation: [0.5, 1.0],
        }
    }
}

impl Optimizer {
    pub fn settings(&self) -> SearchSettings {
        SearchSettings {
            strategy: self.strategy,
            pop_size: self.pop_size,
            generations: self.generations,
            mutation_rate: self.mutation_rate,
            fallback_samples: self.fallback_samples,
            de_popsize: self.de_popsize,
            de_maxiter: self.de_maxiter,
            de_recombination: self.de_recombination,
            de_mutation: (self.de_mutation[0], self.de_mutation[1]),
            seed: self.seed,
        }
    }
}

fn check_range(section: &str, name: &str, min: f64, max: f64) -> Result<()> {
    if !(min.is_finite() && max.is_finite()) {
        bail!("{}.{}: min and max must be finite", section, name);
    }
    if min > max {
        bail!("{}.{}: min must be <= max (got {} > {})", section, name, min, max);
    }
    Ok(())
}

impl Root {
    pub fn from_toml(text: &str) -> Result<Self> {
        let cfg: Root = toml::from_str(text).context("failed to parse model package")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read model package: {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("invalid model package: {}", path.display()))
    }

    pub fn validate(&self) -> Result<()> {
        if self.package.program != "hydrochar" {
            bail!("package.program must be hydrochar");
        }

        if self.model.feature_names.is_empty() {
            bail!("model.feature_names must be non-empty");
        }
        for name in self.model.weights.keys() {
            if !self.model.feature_names.contains(name) {
                bail!("model.weights.{} is not listed in model.feature_names", name);
            }
        }
        if !self.model.intercept.iter().all(|v| v.is_finite()) {
            bail!("model.intercept must be finite");
        }

        for cat in &self.schema.ui_cat_cols {
            if self.schema.options(cat).is_empty() {
                bail!("schema.cat_options.{} must list at least one option", cat);
            }
        }

        for (name, s) in &self.stats {
            check_range("stats", name, s.min, s.max)?;
        }
        for (name, r) in &self.limits {
            check_range("limits", name, r.min, r.max)?;
        }

        if let Some(ref opt) = self.optimizer {
            if opt.pop_size < 2 {
                bail!("optimizer.pop_size must be >= 2");
            }
            if opt.generations == 0 {
                bail!("optimizer.generations must be >= 1");
            }
            if !(0.0..=1.0).contains(&opt.mutation_rate) {
                bail!("optimizer.mutation_rate must be in [0, 1]");
            }
            if opt.fallback_samples == 0 {
                bail!("optimizer.fallback_samples must be >= 1");
            }
            if opt.de_popsize == 0 || opt.de_maxiter == 0 {
                bail!("optimizer.de_popsize and optimizer.de_maxiter must be >= 1");
            }
            if !(0.0..=1.0).contains(&opt.de_recombination) {
                bail!("optimizer.de_recombination must be in [0, 1]");
            }
            let [lo, hi] = opt.de_mutation;
            if !(0.0 < lo && lo <= hi && hi <= 2.0) {
                bail!("optimizer.de_mutation must satisfy 0 < lo <= hi <= 2");
            }
        }

        if let Some(ref scaler) = self.scaler {
            if scaler.columns.len() != scaler.mean.len()
                || scaler.columns.len() != scaler.scale.len()
            {
                bail!("scaler.columns, scaler.mean and scaler.scale must have equal length");
            }
        }

        Ok(())
    }

    pub fn search_settings(&self) -> SearchSettings {
        self.optimizer.clone().unwrap_or_default().settings()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) const PACKAGE: &str = r#"
[package]
program = "hydrochar"
module = "ammonium-adsorption"
version = "0.3.0"

[schema]
model_features = ["pH", "adsorption-SLR(g/L)", "initial-NH4+-N(mg/L)", "KOH"]
ui_numeric_cols = ["pH", "adsorption-SLR(g/L)", "initial-NH4+-N(mg/L)"]
ui_cat_cols = ["activation-method"]

[schema.cat_options]
"activation-method" = ["0 (基准)", "KOH"]

[stats.pH]
min = 3.0
max = 11.0
mean = 7.0

[optimizer]
strategy = "differential"
seed = 7

[model]
feature_names = ["pH", "adsorption-SLR(g/L)", "initial-NH4+-N(mg/L)", "KOH"]
intercept = [1.0, 2.0]

[model.weights]
pH = [2.0, 3.0]
KOH = [5.0, 1.0]
"#;

    #[test]
    fn test_parse_and_defaults() {
        let cfg = Root::from_toml(PACKAGE).unwrap();
        let settings = cfg.search_settings();
        assert_eq!(settings.strategy, Strategy::Differential);
        assert_eq!(settings.pop_size, 50);
        assert_eq!(settings.generations, 40);
        assert_eq!(settings.de_mutation, (0.5, 1.0));
        assert_eq!(settings.seed, Some(7));
        assert_eq!(cfg.stats["pH"].mean, Some(7.0));
    }

    #[test]
    fn test_rejects_wrong_program() {
        let text = PACKAGE.replace("program = \"hydrochar\"", "program = \"other\"");
        assert!(Root::from_toml(&text).is_err());
    }

    #[test]
    fn test_rejects_bad_optimizer() {
        let text = PACKAGE.replace("seed = 7", "seed = 7\npop_size = 1");
        assert!(Root::from_toml(&text).is_err());

        let text = PACKAGE.replace("seed = 7", "seed = 7\nmutation_rate = 1.5");
        assert!(Root::from_toml(&text).is_err());
    }

    #[test]
    fn test_rejects_inverted_stats_and_orphan_weight() {
        let text = PACKAGE.replace("min = 3.0\nmax = 11.0", "min = 11.0\nmax = 3.0");
        assert!(Root::from_toml(&text).is_err());

        let text = PACKAGE.replace("KOH = [5.0, 1.0]", "NaOH = [5.0, 1.0]");
        assert!(Root::from_toml(&text).is_err());
    }

    #[test]
    fn test_rejects_empty_model_features() {
        let text = PACKAGE
            .replace(
                "feature_names = [\"pH\", \"adsorption-SLR(g/L)\", \"initial-NH4+-N(mg/L)\", \"KOH\"]",
                "feature_names = []",
            )
            .replace("pH = [2.0, 3.0]\nKOH = [5.0, 1.0]", "");
        let err = Root::from_toml(&text).unwrap_err();
        assert!(format!("{:#}", err).contains("model.feature_names"));
    }

    #[test]
    fn test_missing_category_options() {
        let text = PACKAGE.replace("\"activation-method\" = [\"0 (基准)\", \"KOH\"]", "");
        assert!(Root::from_toml(&text).is_err());
    }
}
