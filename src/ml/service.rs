use crate::error::{AppError, Result};
use crate::ml::dataset::DataSource;
use crate::ml::models::{MLConfig, ModelMetadata, PredictionResult, TrainingReport, MODEL_USED};
use crate::ml::persistence::ModelStore;
use crate::ml::pipeline::{TrainedModel, TrainingPipeline};
use parking_lot::{Mutex, RwLock};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Lifecycle of the served artifact
#[derive(Debug, Clone)]
pub enum ModelState {
    /// Nothing loaded; the next prediction trains lazily
    Uninitialized,

    /// A training run is in progress and no model is being served
    Training,

    /// Serving this artifact
    Ready(Arc<TrainedModel>),
}

impl ModelState {
    pub fn status(&self) -> ModelStatus {
        match self {
            ModelState::Uninitialized => ModelStatus::Uninitialized,
            ModelState::Training => ModelStatus::Training,
            ModelState::Ready(_) => ModelStatus::Ready,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelStatus {
    Uninitialized,
    Training,
    Ready,
}

/// Liveness check payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub service: String,
    pub model_state: ModelStatus,
}

/// Detector service statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorStats {
    pub model_state: ModelStatus,
    pub predictions_served: u64,
    pub training_runs: u64,
    pub failed_training_runs: u64,
    pub vocabulary_size: Option<usize>,
}

#[derive(Default)]
struct ServiceCounters {
    predictions: AtomicU64,
    training_runs: AtomicU64,
    failed_training_runs: AtomicU64,
}

/// Owns the served model and drives the
/// `Uninitialized -> Training -> Ready` lifecycle.
///
/// Readers clone the `Arc` under a read lock; a training run swaps the
/// whole artifact in a single write. Training runs are serialized.
pub struct DetectorService {
    config: MLConfig,
    store: ModelStore,
    state: RwLock<ModelState>,
    training: Mutex<()>,
    service_name: String,
    counters: ServiceCounters,
}

impl DetectorService {
    pub fn new(config: MLConfig) -> Self {
        let store = ModelStore::from_config(&config);
        Self {
            config,
            store,
            state: RwLock::new(ModelState::Uninitialized),
            training: Mutex::new(()),
            service_name: crate::config::default_service_name(),
            counters: ServiceCounters::default(),
        }
    }

    /// Name reported by the health check
    pub fn with_service_name(mut self, name: impl Into<String>) -> Self {
        self.service_name = name.into();
        self
    }

    /// Load a saved artifact, or train one when configured to
    pub fn initialize(&self) -> Result<ModelStatus> {
        if let Some(model) = self.store.load() {
            *self.state.write() = ModelState::Ready(Arc::new(model));
        } else if self.config.train_on_startup {
            info!("No saved model, training at startup");
            self.train(self.config.dataset_path.as_deref())?;
        } else {
            info!("No saved model, training deferred to first prediction");
        }
        Ok(self.status())
    }

    pub fn status(&self) -> ModelStatus {
        self.state.read().status()
    }

    /// Classify one article
    pub fn predict(&self, text: &str) -> Result<PredictionResult> {
        let started = Instant::now();
        validate_text(text)?;

        let model = self.ensure_model()?;
        let probabilities = model.classify(text)?;
        self.counters.predictions.fetch_add(1, Ordering::Relaxed);

        Ok(PredictionResult {
            prediction: probabilities.label(),
            confidence: probabilities.confidence(),
            model_used: MODEL_USED.to_string(),
            processing_time: started.elapsed().as_secs_f64(),
        })
    }

    /// Classify several articles; any empty text rejects the whole batch
    pub fn predict_batch(&self, texts: &[String]) -> Result<Vec<PredictionResult>> {
        for (i, text) in texts.iter().enumerate() {
            validate_text(text).map_err(|_| {
                AppError::InvalidInput(format!("Empty text provided at index {}", i))
            })?;
        }

        self.ensure_model()?;
        texts.par_iter().map(|text| self.predict(text)).collect()
    }

    /// Run the training pipeline and swap in the result.
    ///
    /// The previous model keeps serving while training runs and is restored
    /// if the run fails.
    pub fn train(&self, dataset_path: Option<&Path>) -> Result<TrainingReport> {
        let _guard = self.training.lock();
        self.train_locked(dataset_path)
    }

    pub fn model_info(&self) -> Option<ModelMetadata> {
        match &*self.state.read() {
            ModelState::Ready(model) => Some(model.metadata.clone()),
            _ => None,
        }
    }

    pub fn health(&self) -> HealthStatus {
        HealthStatus {
            status: "healthy".to_string(),
            service: self.service_name.clone(),
            model_state: self.status(),
        }
    }

    pub fn stats(&self) -> DetectorStats {
        let state = self.state.read();
        DetectorStats {
            model_state: state.status(),
            predictions_served: self.counters.predictions.load(Ordering::Relaxed),
            training_runs: self.counters.training_runs.load(Ordering::Relaxed),
            failed_training_runs: self.counters.failed_training_runs.load(Ordering::Relaxed),
            vocabulary_size: match &*state {
                ModelState::Ready(model) => Some(model.n_features()),
                _ => None,
            },
        }
    }

    pub fn store(&self) -> &ModelStore {
        &self.store
    }

    fn current(&self) -> Option<Arc<TrainedModel>> {
        match &*self.state.read() {
            ModelState::Ready(model) => Some(Arc::clone(model)),
            _ => None,
        }
    }

    /// Return the served model, training one first if there is none
    fn ensure_model(&self) -> Result<Arc<TrainedModel>> {
        if let Some(model) = self.current() {
            return Ok(model);
        }

        let _guard = self.training.lock();
        // Another caller may have finished training while we waited
        if let Some(model) = self.current() {
            return Ok(model);
        }

        info!("No model loaded, training lazily");
        self.train_locked(self.config.dataset_path.as_deref())
            .map_err(|e| AppError::ModelUnavailable(format!("Lazy training failed: {}", e)))?;

        self.current().ok_or_else(|| {
            AppError::ModelUnavailable("Training finished without a model".to_string())
        })
    }

    /// Caller must hold `self.training`
    fn train_locked(&self, dataset_path: Option<&Path>) -> Result<TrainingReport> {
        let previous = {
            let mut state = self.state.write();
            match &*state {
                ModelState::Ready(model) => Some(Arc::clone(model)),
                _ => {
                    *state = ModelState::Training;
                    None
                }
            }
        };

        self.counters.training_runs.fetch_add(1, Ordering::Relaxed);
        let source = DataSource::from_path(dataset_path);
        let pipeline = TrainingPipeline::new(self.config.clone());

        match pipeline.run(&source) {
            Ok((model, report)) => {
                if let Err(e) = self.store.save(&model) {
                    warn!(error = %e, "Failed to persist model; it will be retrained after restart");
                }
                *self.state.write() = ModelState::Ready(Arc::new(model));
                Ok(report)
            }
            Err(e) => {
                self.counters
                    .failed_training_runs
                    .fetch_add(1, Ordering::Relaxed);
                error!(error = %e, source = %source.describe(), "Training failed");
                *self.state.write() = match previous {
                    Some(model) => ModelState::Ready(model),
                    None => ModelState::Uninitialized,
                };
                Err(e)
            }
        }
    }
}

fn validate_text(text: &str) -> Result<()> {
    if text.trim().is_empty() {
        return Err(AppError::InvalidInput("Empty text provided".to_string()));
    }
    Ok(())
}
