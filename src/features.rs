//! Feature vector construction.
//!
//! Turns a named parameter mapping into the ordered numeric vector the
//! model consumes. Construction is fail-soft: anything that cannot be placed
//! leaves its slot at the neutral `0.0`.

use crate::model::Scaler;
use crate::schema::{is_baseline_option, FeatureSchema, Params};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Builds model input vectors for one fixed schema.
#[derive(Debug, Clone)]
pub struct FeatureBuilder {
    schema: FeatureSchema,
    index: HashMap<String, usize>,
}

impl FeatureBuilder {
    pub fn new(schema: FeatureSchema) -> Self {
        let index = schema
            .model_features
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
        Self { schema, index }
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn width(&self) -> usize {
        self.schema.model_features.len()
    }

    /// Ordered feature vector for `params`, optionally scaled.
    pub fn build(&self, params: &Params, scaler: Option<&dyn Scaler>) -> Vec<f64> {
        let mut x = vec![0.0; self.width()];

        for col in &self.schema.ui_numeric_cols {
            let (Some(value), Some(&slot)) = (params.get(col), self.index.get(col)) else {
                continue;
            };
            match value.as_f64() {
                Some(v) => x[slot] = v,
                None => warn!(feature = %col, "non-numeric value ignored"),
            }
        }

        for cat in &self.schema.ui_cat_cols {
            let Some(selected) = params.text(cat) else {
                continue;
            };
            if selected.is_empty() || is_baseline_option(&selected, self.schema.options(cat)) {
                continue;
            }
            if let Some(&slot) = self.index.get(&selected) {
                x[slot] = 1.0;
            }
        }

        if let Some(scaler) = scaler {
            self.apply_scaler(&mut x, scaler);
        }
        x
    }

    fn apply_scaler(&self, x: &mut [f64], scaler: &dyn Scaler) {
        let Some(columns) = scaler.columns() else {
            return;
        };
        let slots: Option<Vec<usize>> =
            columns.iter().map(|c| self.index.get(c).copied()).collect();
        let Some(slots) = slots else {
            debug!("scaler columns not all present, scaling skipped");
            return;
        };

        let sub: Vec<f64> = slots.iter().map(|&i| x[i]).collect();
        match scaler.transform(&sub) {
            Ok(scaled) if scaled.len() == slots.len() => {
                for (&i, v) in slots.iter().zip(scaled) {
                    x[i] = v;
                }
            }
            Ok(scaled) => {
                debug!(got = scaled.len(), "scaler returned wrong width, scaling skipped")
            }
            Err(e) => debug!(error = %e, "scaler failed, scaling skipped"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::StandardScaler;
    use std::collections::BTreeMap;

    fn schema() -> FeatureSchema {
        let mut cat_options = BTreeMap::new();
        cat_options.insert(
            "activation-method".to_string(),
            vec!["None".to_string(), "KOH".to_string(), "H3PO4 (基准)".to_string()],
        );
        FeatureSchema {
            model_features: vec![
                "pH".into(),
                "H(%)".into(),
                "KOH".into(),
                "None".into(),
                "H3PO4 (基准)".into(),
            ],
            ui_numeric_cols: vec!["pH".into(), "H(%)".into(), "not-in-model".into()],
            ui_cat_cols: vec!["activation-method".into()],
            cat_options,
        }
    }

    #[test]
    fn test_numeric_and_one_hot() {
        let builder = FeatureBuilder::new(schema());
        let mut params = Params::new();
        params.insert("pH", "7");
        params.insert("activation-method", "KOH");
        let x = builder.build(&params, None);
        assert_eq!(x, vec![7.0, 0.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_baseline_selection_sets_nothing() {
        let builder = FeatureBuilder::new(schema());
        for sel in ["None", "H3PO4 (基准)", "0"] {
            let mut params = Params::new();
            params.insert("activation-method", sel);
            let x = builder.build(&params, None);
            assert!(x.iter().all(|&v| v == 0.0), "baseline '{}' produced {:?}", sel, x);
        }
    }

    #[test]
    fn test_unknown_names_ignored() {
        let builder = FeatureBuilder::new(schema());
        let mut params = Params::new();
        params.insert("not-in-model", 3.0);
        params.insert("activation-method", "NaOH");
        params.insert("H(%)", "abc");
        assert_eq!(builder.build(&params, None), vec![0.0; 5]);
    }

    #[test]
    fn test_scaling_applied_and_skipped() {
        let builder = FeatureBuilder::new(schema());
        let mut params = Params::new();
        params.insert("pH", 8.0);
        params.insert("H(%)", 6.0);

        let scaler = StandardScaler {
            columns: vec!["pH".into()],
            mean: vec![7.0],
            scale: vec![0.5],
        };
        let x = builder.build(&params, Some(&scaler));
        assert_eq!(x[0], 2.0);
        assert_eq!(x[1], 6.0);

        let partial = StandardScaler {
            columns: vec!["pH".into(), "missing".into()],
            mean: vec![7.0, 0.0],
            scale: vec![0.5, 1.0],
        };
        let x = builder.build(&params, Some(&partial));
        assert_eq!(x[0], 8.0);
    }
}
