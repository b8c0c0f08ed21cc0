//! Hydrochar process prediction and inverse optimization.
//!
//! Predicts ammonium adsorption capacity and removal rate from process
//! parameters through a pre-trained regression model, and searches the
//! free parameters of a task for values that meet output targets while
//! respecting the activation logic and the mass/elemental balance checks.

pub mod config;
pub mod error;
pub mod features;
pub mod io;
pub mod logic;
pub mod model;
pub mod objective;
pub mod optimizer;
pub mod schema;
pub mod task;
pub mod verification;


pub use error::{CoreError, CoreResult};
pub use model::{LinearSurrogate, RegressionModel, Scaler, StandardScaler};
pub use optimizer::{SearchResult, SearchSettings, Strategy};
pub use schema::{FeatureSchema, ParamValue, Params};
pub use task::{Engine, InputEntry, TaskEnvelope, TaskInput, TargetSpec};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
