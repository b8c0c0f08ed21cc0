//! Loss function minimized by the inverse search.

use crate::error::{CoreError, CoreResult};
use crate::features::FeatureBuilder;
use crate::logic::enforce_activation;
use crate::model::{RegressionModel, Scaler};
use crate::schema::Params;
use crate::verification::{verify, Verification};

/// Guards the relative error against a zero target.
pub const RELATIVE_EPS: f64 = 1e-6;

/// Mass-balance error (%) tolerated before a penalty applies.
pub const MASS_BALANCE_TOLERANCE: f64 = 5.0;

/// Elemental-closure error (%) tolerated before a penalty applies.
pub const ELEMENTAL_TOLERANCE: f64 = 2.0;

/// Weight of each verification penalty.
pub const PENALTY_WEIGHT: f64 = 0.1;

/// Feature building plus model call, shared by every prediction path.
#[derive(Clone, Copy)]
pub struct Predictor<'a> {
    pub builder: &'a FeatureBuilder,
    pub model: &'a dyn RegressionModel,
    pub scaler: Option<&'a dyn Scaler>,
}

impl<'a> Predictor<'a> {
    pub fn features(&self, params: &Params) -> Vec<f64> {
        self.builder.build(params, self.scaler)
    }

    /// `[ads, rem]` for `params`.
    pub fn predict(&self, params: &Params) -> CoreResult<[f64; 2]> {
        let x = self.features(params);
        let y = self.model.predict(&x)?;
        if !(y[0].is_finite() && y[1].is_finite()) {
            return Err(CoreError::Prediction(format!(
                "model returned non-finite output [{}, {}]",
                y[0], y[1]
            )));
        }
        Ok(y)
    }
}

/// Constrained output targets. `None` means the channel is unconstrained.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Goal {
    pub ads: Option<f64>,
    pub rem: Option<f64>,
}

impl Goal {
    pub fn is_unconstrained(&self) -> bool {
        self.ads.is_none() && self.rem.is_none()
    }

    /// Relative target error, or `-(ads + rem)` when nothing is constrained.
    pub fn base_loss(&self, ads: f64, rem: f64) -> f64 {
        if self.is_unconstrained() {
            return -(ads + rem);
        }
        let mut loss = 0.0;
        if let Some(t) = self.ads {
            loss += (ads - t).abs() / (t + RELATIVE_EPS);
        }
        if let Some(t) = self.rem {
            loss += (rem - t).abs() / (t + RELATIVE_EPS);
        }
        loss
    }
}

/// Soft-constraint penalty derived from verification errors.
pub fn verification_penalty(v: &Verification) -> f64 {
    let mut penalty = 0.0;
    let mb = v.mass_balance.error();
    if mb > MASS_BALANCE_TOLERANCE {
        penalty += PENALTY_WEIGHT * mb;
    }
    let el = v.elemental.error();
    if el > ELEMENTAL_TOLERANCE {
        penalty += PENALTY_WEIGHT * el;
    }
    penalty
}

/// Loss over the free-variable subspace.
///
/// Evaluation reads only the fixed mapping and the model, so repeated
/// calls with the same point return the same value.
pub struct Objective<'a> {
    predictor: Predictor<'a>,
    fixed: &'a Params,
    free: &'a [String],
    goal: Goal,
}

impl<'a> Objective<'a> {
    pub fn new(
        predictor: Predictor<'a>,
        fixed: &'a Params,
        free: &'a [String],
        goal: Goal,
    ) -> Self {
        Self {
            predictor,
            fixed,
            free,
            goal,
        }
    }

    /// Copy of the fixed mapping with `x` written into the free variables,
    /// normalized by the activation logic.
    pub fn merge(&self, x: &[f64]) -> Params {
        let mut current = self.fixed.clone();
        for (name, &v) in self.free.iter().zip(x) {
            current.set_number(name, v);
        }
        enforce_activation(current)
    }

    pub fn evaluate(&self, x: &[f64]) -> CoreResult<f64> {
        if x.len() != self.free.len() {
            return Err(CoreError::FeatureMismatch {
                expected: self.free.len(),
                got: x.len(),
            });
        }
        let current = self.merge(x);
        let [ads, rem] = self.predictor.predict(&current)?;
        let verification = verify(&current, ads, rem);
        Ok(self.goal.base_loss(ads, rem) + verification_penalty(&verification))
    }
}
