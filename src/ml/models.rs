use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Identifier reported in every prediction
pub const MODEL_USED: &str = "ensemble_classifier";

/// Classification pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MLConfig {
    /// Directory holding the serialized vectorizer/model pair
    #[serde(default = "default_model_dir")]
    pub model_dir: PathBuf,

    /// Vectorizer file name inside `model_dir`
    #[serde(default = "default_vectorizer_file")]
    pub vectorizer_file: String,

    /// Ensemble file name inside `model_dir`
    #[serde(default = "default_model_file")]
    pub model_file: String,

    /// CSV dataset used for lazy training; the built-in sample when unset
    #[serde(default)]
    pub dataset_path: Option<PathBuf>,

    /// Train at startup when no artifact could be loaded
    #[serde(default)]
    pub train_on_startup: bool,

    /// Data preparation settings
    #[serde(default)]
    pub training: TrainingConfig,

    /// TF-IDF settings
    #[serde(default)]
    pub vectorizer: VectorizerConfig,

    /// Base learner hyperparameters
    #[serde(default)]
    pub ensemble: EnsembleConfig,
}

impl Default for MLConfig {
    fn default() -> Self {
        Self {
            model_dir: default_model_dir(),
            vectorizer_file: default_vectorizer_file(),
            model_file: default_model_file(),
            dataset_path: None,
            train_on_startup: false,
            training: TrainingConfig::default(),
            vectorizer: VectorizerConfig::default(),
            ensemble: EnsembleConfig::default(),
        }
    }
}

impl MLConfig {
    /// Use a different artifact directory
    pub fn with_model_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.model_dir = dir.into();
        self
    }

    /// Train lazily from a CSV dataset instead of the built-in sample
    pub fn with_dataset(mut self, path: impl Into<PathBuf>) -> Self {
        self.dataset_path = Some(path.into());
        self
    }
}

/// Data preparation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Rows kept after downsampling an external dataset
    #[serde(default = "default_max_rows")]
    pub max_rows: usize,

    /// Fraction of rows held out for evaluation
    #[serde(default = "default_test_size")]
    pub test_size: f64,

    /// Seed for downsampling and the train/test shuffle
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            max_rows: default_max_rows(),
            test_size: default_test_size(),
            seed: default_seed(),
        }
    }
}

/// TF-IDF vectorizer configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VectorizerConfig {
    /// Maximum vocabulary size
    #[serde(default = "default_max_features")]
    pub max_features: usize,

    /// N-gram range (min, max)
    #[serde(default = "default_ngram_range")]
    pub ngram_range: (usize, usize),

    /// Drop the English stop-word list before building n-grams
    #[serde(default = "default_true")]
    pub english_stop_words: bool,
}

impl Default for VectorizerConfig {
    fn default() -> Self {
        Self {
            max_features: default_max_features(),
            ngram_range: default_ngram_range(),
            english_stop_words: true,
        }
    }
}

/// Hyperparameters of the three voting members
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EnsembleConfig {
    #[serde(default)]
    pub logistic: LogisticConfig,

    #[serde(default)]
    pub svm: SvmConfig,

    #[serde(default)]
    pub knn: KnnConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LogisticConfig {
    /// Inverse regularization strength
    #[serde(default = "default_c")]
    pub c: f64,

    /// Optimizer iteration cap
    #[serde(default = "default_lr_max_iter")]
    pub max_iter: u64,

    /// Stop once the gradient norm falls below this value
    #[serde(default = "default_lr_tol")]
    pub tol: f64,
}

impl Default for LogisticConfig {
    fn default() -> Self {
        Self {
            c: default_c(),
            max_iter: default_lr_max_iter(),
            tol: default_lr_tol(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SvmConfig {
    /// Box constraint
    #[serde(default = "default_c")]
    pub c: f64,

    /// RBF width; `None` derives it from the data as `1 / (n_features * var(X))`
    #[serde(default)]
    pub gamma: Option<f64>,

    /// Solver stopping tolerance
    #[serde(default = "default_svm_tol")]
    pub tol: f64,
}

impl Default for SvmConfig {
    fn default() -> Self {
        Self {
            c: default_c(),
            gamma: None,
            tol: default_svm_tol(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct KnnConfig {
    /// Number of neighbours consulted
    #[serde(default = "default_k")]
    pub k: usize,
}

impl Default for KnnConfig {
    fn default() -> Self {
        Self { k: default_k() }
    }
}

/// Binary class label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Label {
    Real,
    Fake,
}

impl Label {
    /// Numeric class index (0 = real, 1 = fake)
    pub fn index(self) -> usize {
        match self {
            Label::Real => 0,
            Label::Fake => 1,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Label::Real),
            1 => Some(Label::Fake),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Label::Real => "real",
            Label::Fake => "fake",
        }
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Label {
    type Err = String;

    /// Accepts `0`/`1`, `real`/`fake` and `true`/`false` (true = real)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "0" | "0.0" | "real" | "true" => Ok(Label::Real),
            "1" | "1.0" | "fake" | "false" => Ok(Label::Fake),
            other => Err(format!("unrecognized label '{}'", other)),
        }
    }
}

/// Probability assigned to each class
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassProbabilities {
    pub real: f64,
    pub fake: f64,
}

impl ClassProbabilities {
    pub fn new(real: f64, fake: f64) -> Self {
        Self { real, fake }
    }

    /// Build from P(fake), clamped into [0, 1]
    pub fn from_fake(p_fake: f64) -> Self {
        let fake = if p_fake.is_finite() {
            p_fake.clamp(0.0, 1.0)
        } else {
            0.5
        };
        Self::new(1.0 - fake, fake)
    }

    pub fn get(&self, label: Label) -> f64 {
        match label {
            Label::Real => self.real,
            Label::Fake => self.fake,
        }
    }

    /// Winning label; ties go to the first class
    pub fn label(&self) -> Label {
        if self.fake > self.real {
            Label::Fake
        } else {
            Label::Real
        }
    }

    /// Probability of the winning label
    pub fn confidence(&self) -> f64 {
        self.get(self.label())
    }

    /// Element-wise mean
    pub fn mean(all: &[ClassProbabilities]) -> Self {
        if all.is_empty() {
            return Self::new(0.5, 0.5);
        }
        let n = all.len() as f64;
        let real = all.iter().map(|p| p.real).sum::<f64>() / n;
        let fake = all.iter().map(|p| p.fake).sum::<f64>() / n;
        Self::new(real, fake)
    }
}

/// One training row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledExample {
    pub text: String,
    pub label: Label,
}

impl LabeledExample {
    pub fn new(text: impl Into<String>, label: Label) -> Self {
        Self {
            text: text.into(),
            label,
        }
    }
}

/// Result of classifying one article
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Predicted label
    pub prediction: Label,

    /// Averaged probability of the predicted label (0.0 - 1.0)
    pub confidence: f64,

    /// Model identifier
    pub model_used: String,

    /// Wall-clock seconds spent on this request, lazy training included
    pub processing_time: f64,
}

/// Accuracy figures produced by a training run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    pub train_accuracy: f64,
    pub test_accuracy: f64,
    pub n_train: usize,
    pub n_test: usize,
    pub vocabulary_size: usize,
    pub trained_at: chrono::DateTime<chrono::Utc>,
}

/// Descriptive data stored alongside a fitted artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Shared by the vectorizer and ensemble files of one artifact
    pub artifact_id: uuid::Uuid,

    /// Model type
    pub model_type: ModelType,

    /// Members of the vote
    pub members: Vec<ModelType>,

    /// Training timestamp
    pub trained_at: chrono::DateTime<chrono::Utc>,

    /// Number of training samples
    pub n_training_samples: usize,

    /// Number of features
    pub n_features: usize,

    /// Accuracy on the training split
    pub train_accuracy: f64,

    /// Accuracy on the held-out split
    pub test_accuracy: f64,

    /// Where the training data came from
    pub data_source: String,
}

/// Model type enumeration
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    /// Logistic regression
    LogisticRegression,

    /// Support vector machine
    SVM,

    /// K-Nearest Neighbors
    KNN,

    /// Soft-voting ensemble
    Ensemble,
}

impl std::fmt::Display for ModelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelType::LogisticRegression => write!(f, "Logistic Regression"),
            ModelType::SVM => write!(f, "Support Vector Machine"),
            ModelType::KNN => write!(f, "K-Nearest Neighbors"),
            ModelType::Ensemble => write!(f, "Ensemble"),
        }
    }
}

fn default_model_dir() -> PathBuf {
    PathBuf::from("models")
}

fn default_vectorizer_file() -> String {
    "vectorizer.bin".to_string()
}

fn default_model_file() -> String {
    "trained_model.bin".to_string()
}

fn default_max_rows() -> usize {
    10_000
}

fn default_test_size() -> f64 {
    0.2
}

fn default_seed() -> u64 {
    42
}

fn default_max_features() -> usize {
    5000
}

fn default_ngram_range() -> (usize, usize) {
    (1, 2)
}

fn default_true() -> bool {
    true
}

fn default_c() -> f64 {
    1.0
}

fn default_lr_max_iter() -> u64 {
    100
}

fn default_lr_tol() -> f64 {
    1e-4
}

fn default_svm_tol() -> f64 {
    1e-3
}

fn default_k() -> usize {
    5
}
