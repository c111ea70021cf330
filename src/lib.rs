//! Fake news detection service.
//!
//! Articles are cleaned, turned into TF-IDF vectors and scored by a
//! soft-voting ensemble of logistic regression, an RBF support-vector
//! classifier and k-nearest-neighbours. [`ml::DetectorService`] owns the
//! served model and trains one lazily when none has been saved;
//! [`api::build_router`] exposes it over HTTP.

pub mod api;
pub mod config;
pub mod error;
pub mod ml;

pub use config::Config;
pub use error::{AppError, Result};
pub use ml::{DetectorService, Label, PredictionResult, TrainingReport};
