//! Property-based tests for the prediction and search core.
//!
//! Covers: activation normalization idempotence, baseline one-hot
//! suppression, optimizer bound respect, elitism monotonicity and the
//! random-search fallback contract.

use hydrochar::features::FeatureBuilder;
use hydrochar::logic::enforce_activation;
use hydrochar::optimizer::{random_search, GeneticAlgorithm, GeneticConfig};
use hydrochar::schema::keys::{
    ACTIVATION_METHOD, ACTIVATION_RATIO, ACTIVATION_TIME, ACTIVATOR_CONCENTRATION,
};
use hydrochar::{CoreError, CoreResult, FeatureSchema, Params};
use proptest::prelude::*;
use std::cell::RefCell;
use std::collections::BTreeMap;

fn method() -> impl Strategy<Value = String> {
    prop::sample::select(vec!["0", "", "KOH", "ZnCl2", "none (基准)", "H3PO4"])
        .prop_map(str::to_string)
}

/// Activation quantities that often straddle the thresholds.
fn quantity() -> impl Strategy<Value = f64> {
    prop_oneof![0.0f64..0.002, 0.0f64..1.5, 0.0f64..60.0]
}

fn bounds() -> impl Strategy<Value = Vec<(f64, f64)>> {
    prop::collection::vec((-100.0f64..100.0, 0.0f64..50.0), 1..5)
        .prop_map(|v| v.into_iter().map(|(lo, w)| (lo, lo + w)).collect())
}

// ── Physical Logic ───────────────────────────────────────────────────

proptest! {
    /// Normalizing twice equals normalizing once.
    #[test]
    fn activation_enforcement_idempotent(
        m in method(),
        ratio in quantity(),
        conc in quantity(),
        time in quantity(),
    ) {
        let mut p = Params::new();
        p.insert(ACTIVATION_METHOD, m);
        p.set_number(ACTIVATION_RATIO, ratio);
        p.set_number(ACTIVATOR_CONCENTRATION, conc);
        p.set_number(ACTIVATION_TIME, time);

        let once = enforce_activation(p);
        let twice = enforce_activation(once.clone());
        prop_assert_eq!(once, twice);
    }

    /// Output is either all zero or every quantity is at its floor or above.
    #[test]
    fn activation_all_or_nothing(
        m in method(),
        ratio in quantity(),
        conc in quantity(),
        time in quantity(),
    ) {
        let mut p = Params::new();
        p.insert(ACTIVATION_METHOD, m);
        p.set_number(ACTIVATION_RATIO, ratio);
        p.set_number(ACTIVATOR_CONCENTRATION, conc);
        p.set_number(ACTIVATION_TIME, time);

        let out = enforce_activation(p);
        let r = out.number_or(ACTIVATION_RATIO, f64::NAN);
        let c = out.number_or(ACTIVATOR_CONCENTRATION, f64::NAN);
        let t = out.number_or(ACTIVATION_TIME, f64::NAN);
        let zeroed = r == 0.0 && c == 0.0 && t == 0.0;
        let active = r >= 0.1 && c >= 0.1 && t >= 1.0;
        prop_assert!(zeroed || active, "ratio={} conc={} time={}", r, c, t);
    }
}

// ── Feature Vector Builder ───────────────────────────────────────────

proptest! {
    /// Baseline selections never light a one-hot slot.
    #[test]
    fn baseline_selection_sets_no_one_hot(
        options in prop::collection::vec("[A-Za-z]{1,6}", 1..5),
        pick in 0usize..3,
    ) {
        let mut cat_options = BTreeMap::new();
        cat_options.insert("method".to_string(), options.clone());

        let mut model_features = options.clone();
        model_features.push("0".to_string());
        model_features.push("X (基准)".to_string());
        let builder = FeatureBuilder::new(FeatureSchema {
            model_features,
            ui_numeric_cols: vec![],
            ui_cat_cols: vec!["method".to_string()],
            cat_options,
        });

        let selected = match pick {
            0 => options[0].clone(),
            1 => "0".to_string(),
            _ => "X (基准)".to_string(),
        };
        let mut p = Params::new();
        p.insert("method", selected);

        let x = builder.build(&p, None);
        prop_assert!(x.iter().all(|&v| v == 0.0), "{:?}", x);
    }
}

// ── Global Optimizer ─────────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    /// Every evaluated candidate lies inside its bounds, inclusive.
    #[test]
    fn candidates_respect_bounds(
        b in bounds(),
        seed in any::<u64>(),
        rate in 0.0f64..1.0,
    ) {
        let seen = RefCell::new(Vec::new());
        let objective = |x: &[f64]| -> CoreResult<f64> {
            seen.borrow_mut().push(x.to_vec());
            Ok(x.iter().map(|v| (v * 0.37).sin()).sum())
        };
        let config = GeneticConfig {
            pop_size: 12,
            generations: 8,
            mutation_rate: rate,
            bounds: b.clone(),
            seed: Some(seed),
        };
        GeneticAlgorithm::new(config).optimize(&objective).unwrap();

        for x in seen.borrow().iter() {
            for (v, &(lo, hi)) in x.iter().zip(&b) {
                prop_assert!(*v >= lo && *v <= hi, "{} outside [{}, {}]", v, lo, hi);
            }
        }
    }

    /// The recorded best score never increases.
    #[test]
    fn best_score_non_increasing(
        b in bounds(),
        seed in any::<u64>(),
        pop in 2usize..20,
    ) {
        let objective = |x: &[f64]| -> CoreResult<f64> {
            Ok(x.iter().map(|v| v.cos() * v.abs().sqrt()).sum())
        };
        let config = GeneticConfig {
            pop_size: pop,
            generations: 10,
            bounds: b,
            seed: Some(seed),
            ..Default::default()
        };
        let result = GeneticAlgorithm::new(config).optimize(&objective).unwrap();

        prop_assert_eq!(result.history.len(), 10);
        for w in result.history.windows(2) {
            prop_assert!(w[1] <= w[0]);
        }
        prop_assert_eq!(result.history.last().copied(), Some(result.best_score));
    }

    /// Random search stays in bounds and never fails, even when most
    /// evaluations do.
    #[test]
    fn random_search_never_fails(
        b in bounds(),
        seed in any::<u64>(),
        fail_every in 1usize..4,
    ) {
        let calls = RefCell::new(0usize);
        let objective = |x: &[f64]| -> CoreResult<f64> {
            let mut n = calls.borrow_mut();
            *n += 1;
            if *n % fail_every == 0 {
                return Err(CoreError::Prediction("unavailable".into()));
            }
            Ok(x.iter().sum())
        };
        let result = random_search(&objective, &b, 50, Some(seed));

        prop_assert_eq!(result.best.len(), b.len());
        for (v, &(lo, hi)) in result.best.iter().zip(&b) {
            prop_assert!(*v >= lo && *v <= hi);
        }
        if fail_every > 1 {
            prop_assert!(result.best_score.is_finite());
        }
    }
}
