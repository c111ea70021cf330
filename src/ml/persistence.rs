use crate::error::{AppError, Result};
use crate::ml::classifier::{Classifier, SoftVotingEnsemble};
use crate::ml::models::{MLConfig, ModelMetadata};
use crate::ml::pipeline::TrainedModel;
use crate::ml::vectorizer::TfidfVectorizer;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Deserialize)]
struct VectorizerArtifact {
    artifact_id: uuid::Uuid,
    vectorizer: TfidfVectorizer,
}

#[derive(Deserialize)]
struct ModelArtifact {
    artifact_id: uuid::Uuid,
    ensemble: SoftVotingEnsemble,
    metadata: ModelMetadata,
}

/// Borrowed write-side layouts, field-for-field identical to the owned ones
#[derive(Serialize)]
struct VectorizerArtifactRef<'a> {
    artifact_id: uuid::Uuid,
    vectorizer: &'a TfidfVectorizer,
}

#[derive(Serialize)]
struct ModelArtifactRef<'a> {
    artifact_id: uuid::Uuid,
    ensemble: &'a SoftVotingEnsemble,
    metadata: &'a ModelMetadata,
}

/// On-disk home of the vectorizer/ensemble pair
#[derive(Debug, Clone)]
pub struct ModelStore {
    vectorizer_path: PathBuf,
    model_path: PathBuf,
}

impl ModelStore {
    pub fn new(dir: impl AsRef<Path>, vectorizer_file: &str, model_file: &str) -> Self {
        let dir = dir.as_ref();
        Self {
            vectorizer_path: dir.join(vectorizer_file),
            model_path: dir.join(model_file),
        }
    }

    pub fn from_config(config: &MLConfig) -> Self {
        Self::new(&config.model_dir, &config.vectorizer_file, &config.model_file)
    }

    pub fn vectorizer_path(&self) -> &Path {
        &self.vectorizer_path
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    /// Both files present on disk
    pub fn exists(&self) -> bool {
        self.vectorizer_path.is_file() && self.model_path.is_file()
    }

    /// Write both halves of the artifact
    pub fn save(&self, model: &TrainedModel) -> Result<()> {
        let artifact_id = model.metadata.artifact_id;

        write_atomic(
            &self.vectorizer_path,
            &VectorizerArtifactRef {
                artifact_id,
                vectorizer: &model.vectorizer,
            },
        )?;
        write_atomic(
            &self.model_path,
            &ModelArtifactRef {
                artifact_id,
                ensemble: &model.ensemble,
                metadata: &model.metadata,
            },
        )?;

        info!(
            artifact_id = %artifact_id,
            path = %self.model_path.display(),
            "Model artifact saved"
        );
        Ok(())
    }

    /// Load the matched pair; anything unusable is reported as absent
    pub fn load(&self) -> Option<TrainedModel> {
        if !self.exists() {
            info!(
                dir = %self.model_path.parent().unwrap_or(Path::new(".")).display(),
                "No saved model artifact found"
            );
            return None;
        }

        match self.try_load() {
            Ok(model) => {
                info!(
                    artifact_id = %model.metadata.artifact_id,
                    n_features = model.n_features(),
                    "Loaded model artifact"
                );
                Some(model)
            }
            Err(e) => {
                warn!(error = %e, "Ignoring unusable model artifact");
                None
            }
        }
    }

    fn try_load(&self) -> Result<TrainedModel> {
        let vectorizer: VectorizerArtifact = read_artifact(&self.vectorizer_path)?;
        let model: ModelArtifact = read_artifact(&self.model_path)?;

        if vectorizer.artifact_id != model.artifact_id {
            return Err(AppError::Persistence(format!(
                "Vectorizer {} does not belong to model {}",
                vectorizer.artifact_id, model.artifact_id
            )));
        }
        if !vectorizer.vectorizer.is_fitted() || !model.ensemble.is_trained() {
            return Err(AppError::Persistence(
                "Artifact holds an unfitted component".to_string(),
            ));
        }
        if vectorizer.vectorizer.vocabulary_size() != model.ensemble.n_features() {
            return Err(AppError::Persistence(format!(
                "Vocabulary size {} does not match model dimension {}",
                vectorizer.vectorizer.vocabulary_size(),
                model.ensemble.n_features()
            )));
        }

        Ok(TrainedModel {
            vectorizer: vectorizer.vectorizer,
            ensemble: model.ensemble,
            metadata: model.metadata,
        })
    }
}

fn write_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let tmp = path.with_extension("tmp");
    {
        let mut writer = BufWriter::new(File::create(&tmp)?);
        bincode::serialize_into(&mut writer, value)?;
        writer.flush()?;
    }
    std::fs::rename(&tmp, path)?;
    Ok(())
}

fn read_artifact<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let reader = BufReader::new(File::open(path)?);
    Ok(bincode::deserialize_from(reader)?)
}
