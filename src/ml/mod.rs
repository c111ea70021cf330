/// Fake news classification pipeline
///
/// This module provides:
/// - Text cleaning ahead of vectorization
/// - TF-IDF features over unigrams and bigrams
/// - A soft-voting ensemble of logistic regression, an RBF SVM and kNN
/// - Training from the built-in sample or a CSV dataset
/// - Persistence of the vectorizer/ensemble pair
/// - A detector service that trains lazily on first use

pub mod classifier;
pub mod dataset;
pub mod models;
pub mod persistence;
pub mod pipeline;
pub mod preprocess;
pub mod service;
pub mod vectorizer;

pub use classifier::{
    accuracy, Classifier, KnnClassifier, LogisticRegressionClassifier, SoftVotingEnsemble,
    SvmClassifier,
};
pub use dataset::{builtin_sample, load_csv, split_indices, DataSource};
pub use models::{
    ClassProbabilities, EnsembleConfig, KnnConfig, Label, LabeledExample, LogisticConfig,
    MLConfig, ModelMetadata, ModelType, PredictionResult, SvmConfig, TrainingConfig,
    TrainingReport, VectorizerConfig, MODEL_USED,
};
pub use persistence::ModelStore;
pub use pipeline::{TrainedModel, TrainingPipeline};
pub use preprocess::TextPreprocessor;
pub use service::{DetectorService, DetectorStats, HealthStatus, ModelState, ModelStatus};
pub use vectorizer::{SparseVector, TfidfVectorizer};
