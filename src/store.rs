//! Parameter persistence
//!
//! Model parameters are kept under two independently keyed values so that
//! stored shapes can be versioned and rejected on mismatch. Any durable
//! key-value store can back the predictor by implementing [`ParameterStore`].

use crate::error::ScoreError;
use crate::model::ModelParameters;
use crate::types::FEATURE_COUNT;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

/// Key holding the weight list (JSON array of numbers)
pub const WEIGHTS_KEY: &str = "immune_score.weights.v1";

/// Key holding the bias (JSON number)
pub const BIAS_KEY: &str = "immune_score.bias.v1";

/// Durable key-value storage for model parameters
pub trait ParameterStore: Send + Sync {
    /// Read a value; `Ok(None)` when the key was never written
    fn read(&self, key: &str) -> Result<Option<Value>, ScoreError>;

    /// Write all entries in one operation
    fn write(&self, entries: &[(&str, Value)]) -> Result<(), ScoreError>;

    /// Read several keys from one consistent view of the store.
    ///
    /// The default reads each key in turn; stores that can see a concurrent
    /// writer between reads should override it.
    fn read_many(&self, keys: &[&str]) -> Result<Vec<Option<Value>>, ScoreError> {
        keys.iter().map(|key| self.read(key)).collect()
    }
}

/// Raw parameter values as found in a store, before validation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoredParameters {
    pub weights: Option<Value>,
    pub bias: Option<Value>,
}

/// How stored parameter values will be treated on load
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoredShape {
    /// Five numeric weights and a numeric bias
    Valid,
    /// Nothing stored under the weights key
    MissingWeights,
    /// Weights stored but not an array of numbers
    MalformedWeights,
    /// Numeric weights with the wrong count
    WrongLength(usize),
    /// Valid weights; bias missing or not a number, so the default bias applies
    MissingBias,
}

impl StoredParameters {
    /// Read both parameter keys in one operation
    pub fn read(store: &dyn ParameterStore) -> Result<Self, ScoreError> {
        let mut values = store.read_many(&[WEIGHTS_KEY, BIAS_KEY])?.into_iter();
        Ok(Self {
            weights: values.next().flatten(),
            bias: values.next().flatten(),
        })
    }

    /// Weights as numbers, if stored as an array of numbers
    pub fn weight_list(&self) -> Option<Vec<f64>> {
        self.weights.as_ref().and_then(as_number_list)
    }

    pub fn bias_value(&self) -> Option<f64> {
        self.bias.as_ref().and_then(Value::as_f64)
    }

    pub fn shape(&self) -> StoredShape {
        if self.weights.is_none() {
            return StoredShape::MissingWeights;
        }
        match self.weight_list() {
            None => StoredShape::MalformedWeights,
            Some(list) if list.len() != FEATURE_COUNT => StoredShape::WrongLength(list.len()),
            Some(_) if self.bias_value().is_none() => StoredShape::MissingBias,
            Some(_) => StoredShape::Valid,
        }
    }

    /// Parameters these values load as, or `None` when defaults apply
    pub fn decode(&self) -> Option<ModelParameters> {
        ModelParameters::from_stored(self.weight_list().as_deref(), self.bias_value())
    }
}

/// Load parameters from a store.
///
/// Missing, malformed, or wrongly sized weights yield the defaults. Read
/// failures are logged and also yield the defaults.
pub fn load_parameters(store: &dyn ParameterStore) -> ModelParameters {
    let stored = match StoredParameters::read(store) {
        Ok(stored) => stored,
        Err(e) => {
            tracing::warn!(error = %e, "failed to read stored parameters, using defaults");
            return ModelParameters::default();
        }
    };

    match stored.decode() {
        Some(params) => params,
        None => {
            if stored.weights.is_some() {
                tracing::warn!(
                    shape = ?stored.shape(),
                    "stored weights have the wrong shape, using defaults"
                );
            }
            ModelParameters::default()
        }
    }
}

/// Write parameters to a store
pub fn save_parameters(
    store: &dyn ParameterStore,
    params: &ModelParameters,
) -> Result<(), ScoreError> {
    let weights = Value::Array(params.weights.iter().map(|&w| Value::from(w)).collect());
    store.write(&[(WEIGHTS_KEY, weights), (BIAS_KEY, Value::from(params.bias))])
}

fn as_number_list(value: &Value) -> Option<Vec<f64>> {
    value.as_array()?.iter().map(Value::as_f64).collect()
}

/// In-process store; contents are lost with the process
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store with raw values (e.g. a legacy layout)
    pub fn with_values<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let values = entries.into_iter().map(|(k, v)| (k.into(), v)).collect();
        Self {
            values: Mutex::new(values),
        }
    }
}

impl ParameterStore for MemoryStore {
    fn read(&self, key: &str) -> Result<Option<Value>, ScoreError> {
        let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(values.get(key).cloned())
    }

    fn write(&self, entries: &[(&str, Value)]) -> Result<(), ScoreError> {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        for (key, value) in entries {
            values.insert((*key).to_string(), value.clone());
        }
        Ok(())
    }

    fn read_many(&self, keys: &[&str]) -> Result<Vec<Option<Value>>, ScoreError> {
        let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(keys.iter().map(|key| values.get(*key).cloned()).collect())
    }
}

/// Store backed by a single JSON object file.
///
/// Writes go to a sibling temp file that is renamed over the target. A missing
/// file reads as empty.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process
    guard: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_object(&self) -> Result<Map<String, Value>, ScoreError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(e.into()),
        };
        if content.trim().is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str(&content)? {
            Value::Object(map) => Ok(map),
            other => Err(ScoreError::Store(format!(
                "{} does not contain a JSON object (found {})",
                self.path.display(),
                json_kind(&other)
            ))),
        }
    }
}

impl ParameterStore for JsonFileStore {
    fn read(&self, key: &str) -> Result<Option<Value>, ScoreError> {
        let _guard = self.guard.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(self.read_object()?.remove(key))
    }

    fn read_many(&self, keys: &[&str]) -> Result<Vec<Option<Value>>, ScoreError> {
        let _guard = self.guard.lock().unwrap_or_else(PoisonError::into_inner);
        let mut object = self.read_object()?;
        Ok(keys.iter().map(|key| object.remove(*key)).collect())
    }

    fn write(&self, entries: &[(&str, Value)]) -> Result<(), ScoreError> {
        let _guard = self.guard.lock().unwrap_or_else(PoisonError::into_inner);

        // Unreadable or corrupt content is replaced rather than blocking the write
        let mut object = match self.read_object() {
            Ok(object) => object,
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "replacing unreadable parameter file"
                );
                Map::new()
            }
        };
        for (key, value) in entries {
            object.insert((*key).to_string(), value.clone());
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, serde_json::to_vec_pretty(&Value::Object(object))?)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
