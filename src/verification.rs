//! Soft physical verification of a prediction.
//!
//! Two independent checks are computed after every prediction:
//!
//! - **Mass balance**: the removal rate implied by the predicted adsorption
//!   capacity, the adsorbent dose and the initial concentration, compared
//!   with the predicted removal rate.
//! - **Elemental closure**: C + H + O + N + S should approximate 100 %.
//!   Missing carbon and oxygen are back-derived from the H/C and (O+N)/C
//!   ratio features first.
//!
//! Neither check can fail. Missing or unusable inputs yield a
//! "not applicable" variant that contributes no error. Back-derived values
//! are returned in [`DerivedComposition`] instead of being written into the
//! caller's mapping.

use crate::logic::NEAR_ZERO;
use crate::schema::keys::{
    ADSORPTION_RATIO, CARBON, HYDROGEN, H_TO_C, INITIAL_CONCENTRATION, NITROGEN, ON_TO_C, OXYGEN,
    SULFUR,
};
use crate::schema::Params;
use serde::{Deserialize, Serialize};

/// Initial concentration (mg/L) at or below which mass balance is skipped.
pub const MIN_INITIAL_CONCENTRATION: f64 = 1.0;

/// Elemental sum (%) at or below which closure is not meaningful.
pub const MIN_ELEMENTAL_TOTAL: f64 = 5.0;

const NOT_APPLICABLE: &str = "N/A";
const INSUFFICIENT_DATA: &str = "Insufficient Data";

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MassBalance {
    NotApplicable,
    Checked { theoretical_removal: f64, error: f64 },
}

impl MassBalance {
    pub fn error(&self) -> f64 {
        match self {
            MassBalance::NotApplicable => 0.0,
            MassBalance::Checked { error, .. } => *error,
        }
    }

    pub fn message(&self) -> String {
        match self {
            MassBalance::NotApplicable => NOT_APPLICABLE.to_string(),
            MassBalance::Checked { error, .. } => format!("{:.2}%", error),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ElementalClosure {
    NotApplicable,
    InsufficientData { total: f64 },
    Checked { total: f64, error: f64 },
}

impl ElementalClosure {
    pub fn error(&self) -> f64 {
        match self {
            ElementalClosure::Checked { error, .. } => *error,
            _ => 0.0,
        }
    }

    pub fn message(&self) -> String {
        match self {
            ElementalClosure::NotApplicable => NOT_APPLICABLE.to_string(),
            ElementalClosure::InsufficientData { .. } => INSUFFICIENT_DATA.to_string(),
            ElementalClosure::Checked { total, error } => {
                format!("{:.2}% (Err: {:.2}%)", total, error)
            }
        }
    }
}

/// Composition values filled in by back-derivation.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DerivedComposition {
    pub carbon: Option<f64>,
    pub oxygen: Option<f64>,
}

impl DerivedComposition {
    pub fn is_empty(&self) -> bool {
        self.carbon.is_none() && self.oxygen.is_none()
    }

    /// Writes the derived values into `params`.
    pub fn apply(&self, params: &mut Params) {
        if let Some(c) = self.carbon {
            params.set_number(CARBON, c);
        }
        if let Some(o) = self.oxygen {
            params.set_number(OXYGEN, o);
        }
    }
}

/// Full verification outcome for one prediction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Verification {
    pub mass_balance: MassBalance,
    pub elemental: ElementalClosure,
    pub derived: DerivedComposition,
}

impl Verification {
    /// Flat record reported back to callers.
    pub fn metrics(&self) -> VerificationMetrics {
        VerificationMetrics {
            mass_balance_error: self.mass_balance.error(),
            mass_balance_msg: self.mass_balance.message(),
            elemental_error: self.elemental.error(),
            elemental_msg: self.elemental.message(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationMetrics {
    pub mass_balance_error: f64,
    pub mass_balance_msg: String,
    pub elemental_error: f64,
    pub elemental_msg: String,
}

/// Runs both checks against a prediction `(ads, rem)`.
pub fn verify(params: &Params, ads: f64, rem: f64) -> Verification {
    let (elemental, derived) = elemental_closure(params);
    Verification {
        mass_balance: mass_balance(params, ads, rem),
        elemental,
        derived,
    }
}

/// Removal-rate consistency: `|rem - ads * ratio * 100 / c0|`.
pub fn mass_balance(params: &Params, ads: f64, rem: f64) -> MassBalance {
    let c0 = params.number_or(INITIAL_CONCENTRATION, 0.0);
    let ratio = params.number_or(ADSORPTION_RATIO, 0.0);
    if !(c0 > MIN_INITIAL_CONCENTRATION && ratio > 0.0) {
        return MassBalance::NotApplicable;
    }

    let theoretical_removal = ads * ratio * 100.0 / c0;
    let error = (rem - theoretical_removal).abs();
    if !error.is_finite() {
        return MassBalance::NotApplicable;
    }
    MassBalance::Checked {
        theoretical_removal,
        error,
    }
}

/// Elemental closure with carbon/oxygen back-derivation.
pub fn elemental_closure(params: &Params) -> (ElementalClosure, DerivedComposition) {
    let h = params.number_or(HYDROGEN, 0.0);
    let n = params.number_or(NITROGEN, 0.0);
    let s = params.number_or(SULFUR, 0.0);
    let mut c = params.number_or(CARBON, 0.0);
    let mut o = params.number_or(OXYGEN, 0.0);
    let mut derived = DerivedComposition::default();

    if c <= NEAR_ZERO {
        let h_to_c = params.number_or(H_TO_C, 0.0);
        if h_to_c > 0.0 && h > 0.0 {
            c = h / h_to_c;
            derived.carbon = Some(c);
        }
    }

    if o <= NEAR_ZERO {
        let on_to_c = params.number_or(ON_TO_C, 0.0);
        if on_to_c > 0.0 && c > 0.0 {
            o = on_to_c * c - n;
            if o < 0.0 {
                o = 0.0;
            }
            derived.oxygen = Some(o);
        }
    }

    let total = c + h + o + n + s;
    if !total.is_finite() {
        return (ElementalClosure::NotApplicable, DerivedComposition::default());
    }

    let closure = if total > MIN_ELEMENTAL_TOTAL {
        ElementalClosure::Checked {
            total,
            error: (total - 100.0).abs(),
        }
    } else {
        ElementalClosure::InsufficientData { total }
    };
    (closure, derived)
}
