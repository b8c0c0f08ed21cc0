//! Parameter model shared by every stage of the pipeline.
//!
//! A task works on a flat mapping from feature name to [`ParamValue`]. The
//! [`FeatureSchema`] describes how that mapping is laid out for the model,
//! while [`Limits`] and [`ParamStats`] decide the search range of a free
//! variable.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Well-known parameter names used by the physical logic and verification.
pub mod keys {
    pub const ACTIVATION_METHOD: &str = "activation-method";
    pub const ACTIVATION_RATIO: &str = "activation-SLR(g/L)";
    pub const ACTIVATOR_CONCENTRATION: &str = "activator-concentration(mol/L)";
    pub const ACTIVATION_TIME: &str = "activation-time(h)";
    pub const ACTIVATION_TEMPERATURE: &str = "activation-T(℃)";

    pub const INITIAL_CONCENTRATION: &str = "initial-NH4+-N(mg/L)";
    pub const ADSORPTION_RATIO: &str = "adsorption-SLR(g/L)";

    pub const CARBON: &str = "C(%)";
    pub const HYDROGEN: &str = "H(%)";
    pub const NITROGEN: &str = "N(%)";
    pub const SULFUR: &str = "S(%)";
    pub const OXYGEN: &str = "O(%)";
    pub const H_TO_C: &str = "H/C";
    pub const ON_TO_C: &str = "(O+N)/C";
}

/// Marker carried by the "no effect" option of a categorical selector.
pub const BASELINE_MARKER: &str = "(基准)";

/// Bounds used when a free variable is unknown to both limit tables.
pub const DEFAULT_RANGE: Range = Range { min: 0.0, max: 100.0 };

/// Physical limits applied to free variables ahead of historical statistics.
pub const HARD_LIMITS: [(&str, f64, f64); 18] = [
    (keys::ACTIVATION_RATIO, 0.0, 100.0),
    (keys::ACTIVATOR_CONCENTRATION, 0.0, 12.0),
    (keys::ACTIVATION_TIME, 0.0, 55.0),
    ("hydrothermal-T(℃)", 180.0, 300.0),
    ("hydrothermal-time(h)", 0.5, 6.0),
    ("hydrothermal-SLR(g/ml)", 0.001, 0.2),
    (keys::ADSORPTION_RATIO, 0.0, 50.0),
    ("adsorption-time(h)", 0.0, 24.0),
    ("pH", 5.0, 9.0),
    ("RPM(r/min)", 100.0, 300.0),
    ("adsorption-T(℃)", 20.0, 50.0),
    (keys::SULFUR, 0.0, 3.0),
    (keys::NITROGEN, 0.0, 28.0),
    (keys::HYDROGEN, 3.0, 10.0),
    (keys::CARBON, 20.0, 80.0),
    (keys::OXYGEN, 5.0, 60.0),
    (keys::H_TO_C, 0.0, 4.0),
    (keys::ON_TO_C, 0.0, 4.0),
];

/// A single parameter value: numeric quantity or categorical selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Number(f64),
    Text(String),
}

impl ParamValue {
    /// Numeric view. Text is parsed leniently, so `"7.5"` reads as `7.5`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Number(v) => Some(*v),
            ParamValue::Text(s) => s.trim().parse::<f64>().ok(),
        }
    }

    /// Textual view, used for categorical selectors.
    pub fn as_text(&self) -> String {
        match self {
            ParamValue::Number(v) => v.to_string(),
            ParamValue::Text(s) => s.clone(),
        }
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Number(v)
    }
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::Text(s.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        ParamValue::Text(s)
    }
}

/// Request-scoped parameter mapping. Never shared between tasks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Params(BTreeMap<String, ParamValue>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.0.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Numeric value of `key`, if present and readable as a number.
    pub fn number(&self, key: &str) -> Option<f64> {
        self.0.get(key).and_then(ParamValue::as_f64)
    }

    /// Numeric value of `key`, or `default` when missing or non-numeric.
    pub fn number_or(&self, key: &str, default: f64) -> f64 {
        self.number(key).unwrap_or(default)
    }

    pub fn text(&self, key: &str) -> Option<String> {
        self.0.get(key).map(ParamValue::as_text)
    }

    pub fn set_number(&mut self, key: &str, value: f64) {
        self.0.insert(key.to_string(), ParamValue::Number(value));
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<ParamValue>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Closed interval `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub min: f64,
    pub max: f64,
}

impl Range {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn midpoint(&self) -> f64 {
        (self.min + self.max) / 2.0
    }

    pub fn as_tuple(&self) -> (f64, f64) {
        (self.min, self.max)
    }
}

/// Historical statistics of a numeric feature. Read-only after load.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParamStats {
    pub min: f64,
    pub max: f64,
    #[serde(default)]
    pub mean: Option<f64>,
}

/// Ordered feature layout expected by the regression model.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeatureSchema {
    pub model_features: Vec<String>,
    #[serde(default)]
    pub ui_numeric_cols: Vec<String>,
    #[serde(default)]
    pub ui_cat_cols: Vec<String>,
    #[serde(default)]
    pub cat_options: BTreeMap<String, Vec<String>>,
}

impl FeatureSchema {
    /// Position of `name` in the model feature order.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.model_features.iter().position(|f| f == name)
    }

    pub fn options(&self, cat: &str) -> &[String] {
        self.cat_options.get(cat).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Replace the feature order with the one declared by the model, if any.
    /// An empty list counts as undeclared.
    pub fn with_model_features(mut self, names: Option<&[String]>) -> Self {
        if let Some(names) = names.filter(|n| !n.is_empty()) {
            self.model_features = names.to_vec();
        }
        self
    }
}

/// Baseline ("no effect") test for a categorical selection.
///
/// Three independent rules, any of which marks the selection as baseline:
/// it is the first listed option, it carries [`BASELINE_MARKER`], or it is
/// the literal `"0"`.
pub fn is_baseline_option(selected: &str, options: &[String]) -> bool {
    let first = options.first().is_some_and(|first| first == selected);
    first || selected.contains(BASELINE_MARKER) || selected == "0"
}

/// Hard physical limits, consulted before historical statistics.
#[derive(Debug, Clone, PartialEq)]
pub struct Limits {
    table: BTreeMap<String, Range>,
}

impl Default for Limits {
    fn default() -> Self {
        Self::builtin()
    }
}

impl Limits {
    pub fn builtin() -> Self {
        let table = HARD_LIMITS
            .iter()
            .map(|&(name, min, max)| (name.to_string(), Range::new(min, max)))
            .collect();
        Self { table }
    }

    /// Built-in table with `overrides` layered on top.
    pub fn with_overrides(overrides: &BTreeMap<String, Range>) -> Self {
        let mut limits = Self::builtin();
        for (name, range) in overrides {
            limits.table.insert(name.clone(), *range);
        }
        limits
    }

    pub fn get(&self, name: &str) -> Option<Range> {
        self.table.get(name).copied()
    }

    /// Search bounds for a free variable: hard limit, then statistics,
    /// then [`DEFAULT_RANGE`].
    pub fn resolve(&self, name: &str, stats: &BTreeMap<String, ParamStats>) -> Range {
        if let Some(range) = self.get(name) {
            return range;
        }
        stats
            .get(name)
            .map(|s| Range::new(s.min, s.max))
            .unwrap_or(DEFAULT_RANGE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opts(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_baseline_rules() {
        let options = opts(&["none", "KOH", "ZnCl2 (基准)"]);
        assert!(is_baseline_option("none", &options));
        assert!(is_baseline_option("ZnCl2 (基准)", &options));
        assert!(is_baseline_option("0", &options));
        assert!(!is_baseline_option("KOH", &options));
        // Without options only the marker and "0" rules apply
        assert!(!is_baseline_option("KOH", &[]));
        assert!(!is_baseline_option("00", &[]));
    }

    #[test]
    fn test_bound_resolution_order() {
        let mut stats = BTreeMap::new();
        stats.insert("pH".to_string(), ParamStats { min: 2.0, max: 12.0, mean: None });
        stats.insert("custom".to_string(), ParamStats { min: 1.0, max: 3.0, mean: Some(2.0) });

        let limits = Limits::builtin();
        assert_eq!(limits.resolve("pH", &stats), Range::new(5.0, 9.0));
        assert_eq!(limits.resolve("custom", &stats), Range::new(1.0, 3.0));
        assert_eq!(limits.resolve("unknown", &stats), DEFAULT_RANGE);
    }

    #[test]
    fn test_limit_overrides() {
        let mut overrides = BTreeMap::new();
        overrides.insert("pH".to_string(), Range::new(6.0, 8.0));
        let limits = Limits::with_overrides(&overrides);
        assert_eq!(limits.get("pH"), Some(Range::new(6.0, 8.0)));
        assert_eq!(limits.get(keys::CARBON), Some(Range::new(20.0, 80.0)));
    }

    #[test]
    fn test_model_feature_override() {
        let schema = FeatureSchema {
            model_features: opts(&["pH"]),
            ..Default::default()
        };
        let declared = opts(&["pH", "KOH"]);
        assert_eq!(
            schema.clone().with_model_features(Some(&declared)).model_features,
            declared
        );
        assert_eq!(schema.clone().with_model_features(Some(&[][..])).model_features, opts(&["pH"]));
        assert_eq!(schema.with_model_features(None).model_features, opts(&["pH"]));
    }

    #[test]
    fn test_param_value_views() {
        let mut p = Params::new();
        p.insert("a", 1.5);
        p.insert("b", " 2.5 ");
        p.insert("c", "KOH");
        assert_eq!(p.number("a"), Some(1.5));
        assert_eq!(p.number("b"), Some(2.5));
        assert_eq!(p.number("c"), None);
        assert_eq!(p.number_or("missing", 7.0), 7.0);
        assert_eq!(ParamValue::Number(0.0).as_text(), "0");
    }
}
