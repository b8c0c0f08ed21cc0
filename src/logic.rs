//! Cross-parameter physical logic for the activation sub-process.
//!
//! The activation step is all-or-nothing: either a real activation method
//! is selected and every dose quantity is physically meaningful, or the
//! step is skipped and ratio, concentration and duration are exactly zero.

use crate::schema::keys::{
    ACTIVATION_METHOD, ACTIVATION_RATIO, ACTIVATION_TEMPERATURE, ACTIVATION_TIME,
    ACTIVATOR_CONCENTRATION,
};
use crate::schema::Params;

/// Values below this are treated as "not applied".
pub const NEAR_ZERO: f64 = 0.001;

/// Smallest meaningful activation ratio and activator concentration.
pub const MIN_ACTIVATION_DOSE: f64 = 0.1;

/// Smallest meaningful activation duration in hours.
pub const MIN_ACTIVATION_HOURS: f64 = 1.0;

const METHOD_BASELINE_MARKER: &str = "基准";
const LOCK_MARKERS: [&str; 2] = ["(基准)", "Base"];

/// True when the method string selects "no activation".
pub fn is_method_baseline(method: &str) -> bool {
    let method = method.trim();
    method == "0" || method.contains(METHOD_BASELINE_MARKER) || method.is_empty()
}

/// Normalizes the activation quantities against the method selection.
///
/// Idempotent: a second application leaves the mapping unchanged.
/// Temperature is left untouched.
pub fn enforce_activation(mut params: Params) -> Params {
    let method = params.text(ACTIVATION_METHOD).unwrap_or_default();
    let ratio = params.number_or(ACTIVATION_RATIO, 0.0);
    let conc = params.number_or(ACTIVATOR_CONCENTRATION, 0.0);
    let time = params.number_or(ACTIVATION_TIME, 0.0);

    let any_near_zero = ratio < NEAR_ZERO || conc < NEAR_ZERO || time < NEAR_ZERO;

    if is_method_baseline(&method) || any_near_zero {
        params.set_number(ACTIVATION_RATIO, 0.0);
        params.set_number(ACTIVATOR_CONCENTRATION, 0.0);
        params.set_number(ACTIVATION_TIME, 0.0);
    } else {
        params.set_number(ACTIVATION_RATIO, floor_at(ratio, MIN_ACTIVATION_DOSE));
        params.set_number(ACTIVATOR_CONCENTRATION, floor_at(conc, MIN_ACTIVATION_DOSE));
        params.set_number(ACTIVATION_TIME, floor_at(time, MIN_ACTIVATION_HOURS));
    }
    params
}

fn floor_at(value: f64, floor: f64) -> f64 {
    if value < floor {
        floor
    } else {
        value
    }
}

/// Whether the selected method locks the activation quantities at zero.
pub fn is_activation_locked(method: &str) -> bool {
    method == "0" || method.is_empty() || LOCK_MARKERS.iter().any(|m| method.contains(m))
}

/// The option that stands for "no activation" in `options`, or `"0"`.
pub fn baseline_method_option(options: &[String]) -> String {
    options
        .iter()
        .find(|opt| {
            opt.as_str() == "0" || opt.contains(METHOD_BASELINE_MARKER) || opt.contains("Base")
        })
        .cloned()
        .unwrap_or_else(|| "0".to_string())
}

/// Reverse-direction normalization used on raw user input.
///
/// When any activation quantity is at or below [`NEAR_ZERO`] the method is
/// reset to its baseline option and all four activation quantities,
/// temperature included, are zeroed.
pub fn sync_method_selection(mut params: Params, method_options: &[String]) -> Params {
    let ratio = params.number_or(ACTIVATION_RATIO, 0.0);
    let conc = params.number_or(ACTIVATOR_CONCENTRATION, 0.0);
    let time = params.number_or(ACTIVATION_TIME, 0.0);

    if ratio <= NEAR_ZERO || conc <= NEAR_ZERO || time <= NEAR_ZERO {
        let target = baseline_method_option(method_options);
        let current = params.text(ACTIVATION_METHOD).unwrap_or_default();
        if current != target {
            params.insert(ACTIVATION_METHOD, target);
            params.set_number(ACTIVATION_RATIO, 0.0);
            params.set_number(ACTIVATOR_CONCENTRATION, 0.0);
            params.set_number(ACTIVATION_TIME, 0.0);
            params.set_number(ACTIVATION_TEMPERATURE, 0.0);
        }
    }
    params
}
