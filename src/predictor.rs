//! Score predictor
//!
//! [`ScorePredictor`] owns the live model parameters. Construct one at
//! startup and hand out references (or an `Arc`) to whatever needs scores.
//!
//! Prediction reads a copied snapshot under a short read lock. `fit` and
//! `reset` are serialized by a writer lock; `fit` trains on a private copy and
//! swaps the result in with a single assignment, so readers only ever observe
//! whole parameter sets. Persistence happens after the swap and is
//! best-effort.

use crate::config::TrainingConfig;
use crate::error::ScoreError;
use crate::model::ModelParameters;
use crate::normalizer::Normalizer;
use crate::store::{load_parameters, save_parameters, MemoryStore, ParameterStore};
use crate::training::{self, FitReport};
use crate::types::{FeatureVector, ModelState, RawMetrics, TrainingSample, FEATURE_COUNT};
use std::sync::{Mutex, PoisonError, RwLock};

#[derive(Debug, Clone, Copy)]
struct Snapshot {
    params: ModelParameters,
    state: ModelState,
}

/// Linear ImmuneScore model with persisted parameters
pub struct ScorePredictor {
    live: RwLock<Snapshot>,
    writer: Mutex<()>,
    store: Box<dyn ParameterStore>,
    config: TrainingConfig,
}

impl ScorePredictor {
    /// Create a predictor, loading parameters from `store`.
    ///
    /// Missing or malformed stored parameters fall back to the defaults.
    pub fn new(store: Box<dyn ParameterStore>) -> Self {
        Self::load(store, TrainingConfig::default())
    }

    /// Create a predictor with a non-default training configuration.
    ///
    /// Fails with [`ScoreError::InvalidConfig`] before touching `store` when
    /// `config` would not train (zero epochs, non-positive or non-finite rate).
    pub fn with_config(
        store: Box<dyn ParameterStore>,
        config: TrainingConfig,
    ) -> Result<Self, ScoreError> {
        config.validate()?;
        Ok(Self::load(store, config))
    }

    fn load(store: Box<dyn ParameterStore>, config: TrainingConfig) -> Self {
        let params = load_parameters(store.as_ref());
        let state = if params.is_default() {
            ModelState::Default
        } else {
            ModelState::Trained
        };
        tracing::debug!(state = state.as_str(), ?params, "score predictor loaded");

        Self {
            live: RwLock::new(Snapshot { params, state }),
            writer: Mutex::new(()),
            store,
            config,
        }
    }

    /// Predictor backed by an in-memory store
    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryStore::new()))
    }

    /// Normalize raw metrics into model features
    pub fn normalize(&self, metrics: &RawMetrics) -> FeatureVector {
        Normalizer::normalize(metrics)
    }

    /// Score raw metrics. Always in 1..=100.
    pub fn predict(&self, metrics: &RawMetrics) -> u32 {
        self.parameters().score(&Normalizer::normalize(metrics))
    }

    /// Fit with the predictor's configured epochs, learning rate and order
    pub fn fit(&self, samples: &[TrainingSample]) -> Result<Option<FitReport>, ScoreError> {
        self.fit_with(samples, &self.config)
    }

    /// Fit with an explicit configuration.
    ///
    /// Continues from the current parameters. Returns `Ok(None)` without
    /// touching parameters or storage when `samples` is empty. An invalid
    /// `config` fails with [`ScoreError::InvalidConfig`], also without changes.
    pub fn fit_with(
        &self,
        samples: &[TrainingSample],
        config: &TrainingConfig,
    ) -> Result<Option<FitReport>, ScoreError> {
        config.validate()?;
        if samples.is_empty() {
            return Ok(None);
        }

        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let start = self.parameters();
        let (params, report) = training::train(start, samples, config);

        self.swap(Snapshot {
            params,
            state: ModelState::Trained,
        });
        tracing::info!(
            samples = report.samples,
            epochs = report.epochs,
            initial_loss = report.initial_loss,
            final_loss = report.final_loss(),
            "score model fit"
        );
        self.persist(&params);

        Ok(Some(report))
    }

    /// Restore default parameters and persist them
    pub fn reset(&self) {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let params = ModelParameters::default();
        self.swap(Snapshot {
            params,
            state: ModelState::Default,
        });
        tracing::info!("score model reset to defaults");
        self.persist(&params);
    }

    /// Copy of the current parameters
    pub fn parameters(&self) -> ModelParameters {
        self.snapshot().params
    }

    pub fn weights(&self) -> [f64; FEATURE_COUNT] {
        self.parameters().weights
    }

    pub fn bias(&self) -> f64 {
        self.parameters().bias
    }

    pub fn state(&self) -> ModelState {
        self.snapshot().state
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    fn snapshot(&self) -> Snapshot {
        *self.live.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn swap(&self, next: Snapshot) {
        *self.live.write().unwrap_or_else(PoisonError::into_inner) = next;
    }

    fn persist(&self, params: &ModelParameters) {
        if let Err(e) = save_parameters(self.store.as_ref(), params) {
            tracing::warn!(error = %e, "failed to persist score model parameters");
        }
    }
}

impl Default for ScorePredictor {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl std::fmt::Debug for ScorePredictor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let snapshot = self.snapshot();
        f.debug_struct("ScorePredictor")
            .field("params", &snapshot.params)
            .field("state", &snapshot.state)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
