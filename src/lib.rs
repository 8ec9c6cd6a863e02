//! ImmuneScore - On-device wellness score engine
//!
//! Turns daily wellness metrics (sleep, steps, energy, stress, screen time)
//! into an integer ImmuneScore through a deterministic pipeline:
//! raw metrics → normalization → linear model → clamped score.
//!
//! The model is a five-weight linear predictor trained online by stochastic
//! gradient descent over the user's scored days.
//!
//! ## Modules
//!
//! - **Scoring**: [`ScorePredictor`] owns the parameters, predicts, fits, resets
//! - **History**: [`DailyHistory`] holds date-keyed daily records for training and rescoring
//! - **Coaching**: [`pipeline::coach_report`] forecasts tomorrow's score and picks nudges
//! - **Persistence**: [`ParameterStore`] implementations keep parameters across restarts

pub mod coach;
pub mod config;
pub mod error;
pub mod history;
pub mod model;
pub mod normalizer;
pub mod pipeline;
pub mod predictor;
pub mod store;
pub mod training;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use coach::Recommendation;
pub use config::{SampleOrder, TrainingConfig};
pub use error::ScoreError;
pub use history::{DailyHistory, DailyRecord};
pub use model::ModelParameters;
pub use normalizer::Normalizer;
pub use pipeline::{coach_report, forecast, retrain_from_history, score_history, CoachReport};
pub use predictor::ScorePredictor;
pub use store::{JsonFileStore, MemoryStore, ParameterStore};
pub use training::FitReport;
pub use types::{FeatureVector, ModelState, RawMetrics, TrainingSample};

/// Engine version
pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name reported by the CLI
pub const PRODUCER_NAME: &str = "immune-score";
