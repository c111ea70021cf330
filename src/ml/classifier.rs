use crate::error::{AppError, Result};
use crate::ml::models::{
    ClassProbabilities, EnsembleConfig, KnnConfig, Label, LogisticConfig, ModelType, SvmConfig,
};
use crate::ml::vectorizer::SparseVector;
use linfa::dataset::Pr;
use linfa::traits::{Fit, Predict};
use linfa::DatasetBase;
use linfa_logistic::{FittedLogisticRegression, LogisticRegression};
use linfa_nn::{distance::L2Dist, LinearSearch, NearestNeighbour};
use linfa_svm::Svm;
use ndarray::{Array1, Array2, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Trait for classifiers
pub trait Classifier: Send + Sync {
    /// Train the classifier from scratch
    fn train(&mut self, x: &[SparseVector], y: &[Label]) -> Result<()>;

    /// Predict class probabilities for one vector
    fn predict_proba(&self, x: &SparseVector) -> Result<ClassProbabilities>;

    /// Predict the class label for one vector
    fn predict(&self, x: &SparseVector) -> Result<Label> {
        Ok(self.predict_proba(x)?.label())
    }

    /// Get model type
    fn model_type(&self) -> ModelType;

    /// Check if model is trained
    fn is_trained(&self) -> bool;

    /// Dimensionality the model was trained on
    fn n_features(&self) -> usize;
}

/// Check a training set and return its dimensionality
pub(crate) fn validate_training_set(x: &[SparseVector], y: &[Label]) -> Result<usize> {
    if x.is_empty() {
        return Err(AppError::Training("Training set is empty".to_string()));
    }
    if x.len() != y.len() {
        return Err(AppError::Training(format!(
            "Got {} vectors but {} labels",
            x.len(),
            y.len()
        )));
    }

    let dim = x[0].dim();
    if x.iter().any(|v| v.dim() != dim) {
        return Err(AppError::Training(
            "Training vectors have inconsistent dimensions".to_string(),
        ));
    }

    let n_fake = y.iter().filter(|l| **l == Label::Fake).count();
    if n_fake == 0 || n_fake == y.len() {
        return Err(AppError::Training(
            "Training data must contain both real and fake examples".to_string(),
        ));
    }

    Ok(dim)
}

/// Reject vectors built against a different vocabulary
pub(crate) fn check_dimension(expected: usize, x: &SparseVector) -> Result<()> {
    if x.dim() != expected {
        return Err(AppError::Internal(format!(
            "Feature dimension mismatch: model expects {}, got {}",
            expected,
            x.dim()
        )));
    }
    Ok(())
}

/// Fraction of vectors whose predicted label matches
pub fn accuracy(model: &dyn Classifier, x: &[SparseVector], y: &[Label]) -> Result<f64> {
    if x.is_empty() {
        return Ok(0.0);
    }
    let correct = x
        .par_iter()
        .zip(y.par_iter())
        .map(|(v, label)| model.predict(v).map(|p| usize::from(p == *label)))
        .collect::<Result<Vec<_>>>()?
        .into_iter()
        .sum::<usize>();
    Ok(correct as f64 / x.len() as f64)
}

/// Stack sparse rows into the dense matrix the linfa learners take
pub(crate) fn to_records(x: &[SparseVector], n_features: usize) -> Array2<f64> {
    let mut records = Array2::zeros((x.len(), n_features));
    for (mut row, v) in records.outer_iter_mut().zip(x) {
        for (i, value) in v.iter() {
            row[i] = value;
        }
    }
    records
}

/// Binary targets with `true` for fake
pub(crate) fn to_targets(y: &[Label]) -> Array1<bool> {
    y.iter().map(|l| *l == Label::Fake).collect()
}

fn single_record(x: &SparseVector) -> Array2<f64> {
    x.to_dense().insert_axis(Axis(0))
}

fn training_error(model: ModelType, e: impl std::fmt::Display) -> AppError {
    AppError::Training(format!("{} failed to fit: {}", model, e))
}

/// L2-regularized logistic regression backed by `linfa-logistic`
#[derive(Debug, Serialize, Deserialize)]
pub struct LogisticRegressionClassifier {
    config: LogisticConfig,

    /// Fitted model, probabilities refer to the fake class
    model: Option<FittedLogisticRegression<f64, bool>>,

    n_features: usize,
}

impl LogisticRegressionClassifier {
    pub fn new(config: LogisticConfig) -> Self {
        Self {
            config,
            model: None,
            n_features: 0,
        }
    }

    fn fit_records(&mut self, records: &Array2<f64>, targets: &Array1<bool>) -> Result<()> {
        let dataset = DatasetBase::new(records.view(), targets.view());
        let model = LogisticRegression::default()
            .alpha(1.0 / self.config.c)
            .max_iterations(self.config.max_iter)
            .gradient_tolerance(self.config.tol)
            .fit(&dataset)
            .map_err(|e| training_error(ModelType::LogisticRegression, e))?;

        self.model = Some(model);
        self.n_features = records.ncols();
        Ok(())
    }
}

impl Classifier for LogisticRegressionClassifier {
    fn train(&mut self, x: &[SparseVector], y: &[Label]) -> Result<()> {
        let n_features = validate_training_set(x, y)?;
        self.fit_records(&to_records(x, n_features), &to_targets(y))
    }

    fn predict_proba(&self, x: &SparseVector) -> Result<ClassProbabilities> {
        let model = self.model.as_ref().ok_or_else(|| {
            AppError::ModelUnavailable("Logistic regression is not trained".to_string())
        })?;
        check_dimension(self.n_features, x)?;

        let p_fake = model.predict_probabilities(&single_record(x))[0];
        Ok(ClassProbabilities::from_fake(p_fake))
    }

    fn model_type(&self) -> ModelType {
        ModelType::LogisticRegression
    }

    fn is_trained(&self) -> bool {
        self.model.is_some()
    }

    fn n_features(&self) -> usize {
        self.n_features
    }
}

/// RBF support vector classifier with Platt-scaled output, backed by `linfa-svm`
#[derive(Debug, Serialize, Deserialize)]
pub struct SvmClassifier {
    config: SvmConfig,
    model: Option<Svm<f64, Pr>>,
    n_features: usize,
}

impl SvmClassifier {
    pub fn new(config: SvmConfig) -> Self {
        Self {
            config,
            model: None,
            n_features: 0,
        }
    }

    /// Kernel width; unset gamma becomes `1 / (n_features * var(X))`
    fn gamma(&self, records: &Array2<f64>) -> f64 {
        if let Some(gamma) = self.config.gamma {
            return gamma;
        }
        let variance = records.var(0.0);
        if variance > 0.0 {
            1.0 / (records.ncols() as f64 * variance)
        } else {
            1.0
        }
    }

    fn fit_records(&mut self, records: &Array2<f64>, targets: &Array1<bool>) -> Result<()> {
        let gamma = self.gamma(records);
        let dataset = DatasetBase::new(records.view(), targets.view());
        let model = Svm::<f64, Pr>::params()
            .pos_neg_weights(self.config.c, self.config.c)
            .gaussian_kernel(1.0 / gamma)
            .eps(self.config.tol)
            .fit(&dataset)
            .map_err(|e| training_error(ModelType::SVM, e))?;

        tracing::debug!(gamma, "SVM trained");
        self.model = Some(model);
        self.n_features = records.ncols();
        Ok(())
    }
}

impl Classifier for SvmClassifier {
    fn train(&mut self, x: &[SparseVector], y: &[Label]) -> Result<()> {
        let n_features = validate_training_set(x, y)?;
        self.fit_records(&to_records(x, n_features), &to_targets(y))
    }

    fn predict_proba(&self, x: &SparseVector) -> Result<ClassProbabilities> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| AppError::ModelUnavailable("SVM is not trained".to_string()))?;
        check_dimension(self.n_features, x)?;

        let probabilities: Array1<Pr> = model.predict(&single_record(x));
        Ok(ClassProbabilities::from_fake(f64::from(*probabilities[0])))
    }

    fn model_type(&self) -> ModelType {
        ModelType::SVM
    }

    fn is_trained(&self) -> bool {
        self.model.is_some()
    }

    fn n_features(&self) -> usize {
        self.n_features
    }
}

/// Uniform-weight k-nearest-neighbours over Euclidean distance, queried through `linfa-nn`
#[derive(Debug, Serialize, Deserialize)]
pub struct KnnClassifier {
    config: KnnConfig,
    samples: Array2<f64>,
    labels: Vec<Label>,
}

impl KnnClassifier {
    pub fn new(config: KnnConfig) -> Self {
        Self {
            config,
            samples: Array2::zeros((0, 0)),
            labels: Vec::new(),
        }
    }

    fn fit_records(&mut self, records: Array2<f64>, labels: &[Label]) {
        self.samples = records;
        self.labels = labels.to_vec();
    }

    /// Indices of the nearest stored samples, closest first
    pub fn neighbors(&self, x: &SparseVector) -> Result<Vec<usize>> {
        let k = self.config.k.max(1).min(self.labels.len());
        let index = LinearSearch::new()
            .from_batch(&self.samples, L2Dist)
            .map_err(|e| AppError::Internal(format!("Neighbour index: {}", e)))?;
        let query = x.to_dense();
        let nearest = index
            .k_nearest(query.view(), k)
            .map_err(|e| AppError::Internal(format!("Neighbour query: {}", e)))?;
        Ok(nearest.into_iter().map(|(_, idx)| idx).collect())
    }
}

impl Classifier for KnnClassifier {
    fn train(&mut self, x: &[SparseVector], y: &[Label]) -> Result<()> {
        let n_features = validate_training_set(x, y)?;
        self.fit_records(to_records(x, n_features), y);
        Ok(())
    }

    fn predict_proba(&self, x: &SparseVector) -> Result<ClassProbabilities> {
        if self.labels.is_empty() {
            return Err(AppError::ModelUnavailable(
                "k-nearest-neighbours has no stored samples".to_string(),
            ));
        }
        check_dimension(self.n_features(), x)?;

        let neighbors = self.neighbors(x)?;
        let fake = neighbors
            .iter()
            .filter(|&&idx| self.labels[idx] == Label::Fake)
            .count();
        Ok(ClassProbabilities::from_fake(
            fake as f64 / neighbors.len() as f64,
        ))
    }

    fn model_type(&self) -> ModelType {
        ModelType::KNN
    }

    fn is_trained(&self) -> bool {
        !self.labels.is_empty()
    }

    fn n_features(&self) -> usize {
        self.samples.ncols()
    }
}

/// Soft-voting ensemble over logistic regression, an SVM and kNN
#[derive(Debug, Serialize, Deserialize)]
pub struct SoftVotingEnsemble {
    logistic: LogisticRegressionClassifier,
    svm: SvmClassifier,
    knn: KnnClassifier,
    n_features: usize,
    trained: bool,
}

impl SoftVotingEnsemble {
    pub fn new(config: &EnsembleConfig) -> Self {
        Self {
            logistic: LogisticRegressionClassifier::new(config.logistic.clone()),
            svm: SvmClassifier::new(config.svm.clone()),
            knn: KnnClassifier::new(config.knn.clone()),
            n_features: 0,
            trained: false,
        }
    }

    pub fn members(&self) -> Vec<ModelType> {
        vec![
            self.logistic.model_type(),
            self.svm.model_type(),
            self.knn.model_type(),
        ]
    }

    /// Each member's probabilities, in voting order
    pub fn member_probabilities(
        &self,
        x: &SparseVector,
    ) -> Result<Vec<(ModelType, ClassProbabilities)>> {
        let members: [&dyn Classifier; 3] = [&self.logistic, &self.svm, &self.knn];
        members
            .iter()
            .map(|m| Ok((m.model_type(), m.predict_proba(x)?)))
            .collect()
    }
}

impl Classifier for SoftVotingEnsemble {
    fn train(&mut self, x: &[SparseVector], y: &[Label]) -> Result<()> {
        let n_features = validate_training_set(x, y)?;
        self.trained = false;

        let records = to_records(x, n_features);
        let targets = to_targets(y);
        let (logistic, svm, knn) = (&mut self.logistic, &mut self.svm, &mut self.knn);
        let (lr_result, svm_result) = rayon::join(
            || logistic.fit_records(&records, &targets),
            || svm.fit_records(&records, &targets),
        );
        lr_result?;
        svm_result?;
        knn.fit_records(records, y);

        self.n_features = n_features;
        self.trained = true;
        Ok(())
    }

    fn predict_proba(&self, x: &SparseVector) -> Result<ClassProbabilities> {
        if !self.trained {
            return Err(AppError::ModelUnavailable(
                "Ensemble is not trained".to_string(),
            ));
        }
        check_dimension(self.n_features, x)?;

        let votes: Vec<ClassProbabilities> = self
            .member_probabilities(x)?
            .into_iter()
            .map(|(_, p)| p)
            .collect();
        Ok(ClassProbabilities::mean(&votes))
    }

    fn model_type(&self) -> ModelType {
        ModelType::Ensemble
    }

    fn is_trained(&self) -> bool {
        self.trained
    }

    fn n_features(&self) -> usize {
        self.n_features
    }
}
