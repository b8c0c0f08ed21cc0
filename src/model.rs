//! Seams to the external regression model and feature scaler.
//!
//! Both are loaded once and shared read-only across tasks, hence the
//! `Send + Sync` bounds. [`LinearSurrogate`] and [`StandardScaler`] are
//! small reference implementations that can be described in a model
//! package file.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Black-box mapping from the ordered feature vector to `[ads, rem]`.
pub trait RegressionModel: Send + Sync {
    fn predict(&self, features: &[f64]) -> CoreResult<[f64; 2]>;

    /// Feature order declared by the model itself. Takes priority over the
    /// schema's `model_features` when present.
    fn feature_names(&self) -> Option<&[String]> {
        None
    }
}

/// Column transform applied to a named subset of the feature vector.
pub trait Scaler: Send + Sync {
    fn columns(&self) -> Option<&[String]>;
    fn transform(&self, values: &[f64]) -> CoreResult<Vec<f64>>;
}

/// Two-output linear model: `y = intercept + sum(w_i * x_i)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearSurrogate {
    pub feature_names: Vec<String>,
    pub intercept: [f64; 2],
    #[serde(default)]
    pub weights: BTreeMap<String, [f64; 2]>,
}

impl LinearSurrogate {
    pub fn new(feature_names: Vec<String>, intercept: [f64; 2]) -> Self {
        Self {
            feature_names,
            intercept,
            weights: BTreeMap::new(),
        }
    }

    pub fn with_weight(mut self, name: &str, weight: [f64; 2]) -> Self {
        self.weights.insert(name.to_string(), weight);
        self
    }
}

impl RegressionModel for LinearSurrogate {
    fn predict(&self, features: &[f64]) -> CoreResult<[f64; 2]> {
        if features.len() != self.feature_names.len() {
            return Err(CoreError::FeatureMismatch {
                expected: self.feature_names.len(),
                got: features.len(),
            });
        }
        let mut out = self.intercept;
        for (name, &x) in self.feature_names.iter().zip(features) {
            if let Some(w) = self.weights.get(name) {
                out[0] += w[0] * x;
                out[1] += w[1] * x;
            }
        }
        if !(out[0].is_finite() && out[1].is_finite()) {
            return Err(CoreError::Prediction(format!(
                "non-finite output [{}, {}]",
                out[0], out[1]
            )));
        }
        Ok(out)
    }

    fn feature_names(&self) -> Option<&[String]> {
        Some(&self.feature_names)
    }
}

/// Standardization `(x - mean) / scale` over a fixed column list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardScaler {
    pub columns: Vec<String>,
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl Scaler for StandardScaler {
    fn columns(&self) -> Option<&[String]> {
        Some(&self.columns)
    }

    fn transform(&self, values: &[f64]) -> CoreResult<Vec<f64>> {
        if values.len() != self.mean.len() || values.len() != self.scale.len() {
            return Err(CoreError::FeatureMismatch {
                expected: self.mean.len(),
                got: values.len(),
            });
        }
        Ok(values
            .iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(&x, (&m, &s))| {
                // Zero variance columns pass through centred only
                let s = if s.abs() < f64::EPSILON { 1.0 } else { s };
                (x - m) / s
            })
            .collect())
    }
}
