use hydrochar::logic::{enforce_activation, is_activation_locked, sync_method_selection};
use hydrochar::schema::keys::ACTIVATION_METHOD;
use hydrochar::task::InputEntry;
use hydrochar::{Engine, Params, TaskInput, TargetSpec};
use numpy::PyArray1;
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;

const SCHEMA_VERSION: &str = "1.0.0";

fn parse_json<T: serde::de::DeserializeOwned>(what: &str, text: &str) -> PyResult<T> {
    serde_json::from_str(text)
        .map_err(|e| PyValueError::new_err(format!("invalid {} JSON: {}", what, e)))
}

fn to_json<T: Serialize>(value: &T) -> PyResult<String> {
    serde_json::to_string(value).map_err(|e| PyRuntimeError::new_err(e.to_string()))
}

#[derive(Serialize)]
struct NotLoaded {
    success: bool,
    error: String,
}

/// Model package wrapper. Load once, then run any number of tasks.
#[pyclass]
struct Backend {
    #[pyo3(get)]
    path: String,
    engine: Option<Engine>,
}

#[pymethods]
impl Backend {
    #[new]
    #[pyo3(signature = (path = "model_package.toml".to_string()))]
    fn new(path: String) -> Self {
        Self { path, engine: None }
    }

    /// Load the package; returns (ok, message) and never raises
    fn load(&mut self) -> (bool, String) {
        let (engine, status) = Engine::load(&self.path);
        self.engine = engine;
        (status.ok, status.message)
    }

    #[getter]
    fn loaded(&self) -> bool {
        self.engine.is_some()
    }

    /// Run a task; `inputs` maps names to a literal or {value, is_predict},
    /// `targets` is {ads: {value, is_constraint}, rem: {...}}. Returns the
    /// result envelope as JSON.
    #[pyo3(signature = (inputs_json, targets_json = "{}"))]
    fn run_task(&self, py: Python<'_>, inputs_json: &str, targets_json: &str) -> PyResult<String> {
        let Some(engine) = self.engine.as_ref() else {
            return to_json(&NotLoaded {
                success: false,
                error: format!("Model not loaded: {}", self.path),
            });
        };
        let inputs: BTreeMap<String, InputEntry> = parse_json("inputs", inputs_json)?;
        let targets: TargetSpec = parse_json("targets", targets_json)?;
        let task = TaskInput { inputs, targets };

        let envelope = py.allow_threads(|| engine.run_task(&task));
        to_json(&envelope)
    }

    /// Ordered model feature vector for a flat parameter mapping
    fn feature_vector<'py>(
        &self,
        py: Python<'py>,
        params_json: &str,
    ) -> PyResult<&'py PyArray1<f64>> {
        let engine = self
            .engine
            .as_ref()
            .ok_or_else(|| PyRuntimeError::new_err("model not loaded"))?;
        let params: Params = parse_json("params", params_json)?;
        Ok(PyArray1::from_vec(py, engine.feature_vector(&params)))
    }

    /// Feature names in model order
    fn feature_names(&self) -> PyResult<Vec<String>> {
        let engine = self
            .engine
            .as_ref()
            .ok_or_else(|| PyRuntimeError::new_err("model not loaded"))?;
        Ok(engine.schema().model_features.clone())
    }

    /// Activation normalization of raw form input, returned as JSON
    fn normalize(&self, params_json: &str) -> PyResult<String> {
        let params: Params = parse_json("params", params_json)?;
        let options = self
            .engine
            .as_ref()
            .map(|e| e.schema().options(ACTIVATION_METHOD).to_vec())
            .unwrap_or_default();
        to_json(&enforce_activation(sync_method_selection(params, &options)))
    }

    fn __repr__(&self) -> String {
        format!("Backend(path={:?}, loaded={})", self.path, self.engine.is_some())
    }
}

/// Whether a method selection locks the activation quantities at zero
#[pyfunction]
fn activation_locked(method: &str) -> bool {
    is_activation_locked(method)
}

/// Get version information
#[pyfunction]
fn version() -> PyResult<(String, String)> {
    Ok((hydrochar::VERSION.to_string(), SCHEMA_VERSION.to_string()))
}

/// hydrochar Python module
#[pymodule]
fn hydrochar_python(_py: Python<'_>, m: &PyModule) -> PyResult<()> {
    m.add_class::<Backend>()?;
    m.add_function(wrap_pyfunction!(activation_locked, m)?)?;
    m.add_function(wrap_pyfunction!(version, m)?)?;

    m.add("__version__", hydrochar::VERSION)?;
    m.add("SCHEMA_VERSION", SCHEMA_VERSION)?;

    Ok(())
}
