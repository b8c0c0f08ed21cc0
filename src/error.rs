use std::any::Any;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Prediction failed: {0}")]
    Prediction(String),

    #[error("Feature vector has {got} columns, model expects {expected}")]
    FeatureMismatch { expected: usize, got: usize },

    #[error("Invalid bounds for variable {index}: [{lower}, {upper}]")]
    InvalidBounds { index: usize, lower: f64, upper: f64 },

    #[error("Optimizer fault: {0}")]
    Optimizer(String),

    #[error("Invalid task input '{key}': {message}")]
    InvalidInput { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Panic inside pipeline: {0}")]
    Panic(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}

pub type CoreResult<T> = Result<T, CoreError>;

impl CoreError {
    /// Wraps a caught unwind payload.
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "unknown panic payload".to_string()
        };
        CoreError::Panic(message)
    }
}
