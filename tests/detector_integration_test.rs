/// Integration tests for the detection pipeline
///
/// These tests verify the complete flow:
/// - Lazy training on first prediction
/// - Training from a CSV dataset
/// - Persistence across service instances
/// - Concurrent predictions while a retrain runs
use fake_news_detector::{
    error::AppError,
    ml::{DetectorService, Label, MLConfig, ModelStatus, ModelStore, MODEL_USED},
};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn setup_service(dir: &TempDir) -> Arc<DetectorService> {
    let config = MLConfig::default().with_model_dir(dir.path().join("models"));
    Arc::new(DetectorService::new(config))
}

fn write_dataset(dir: &TempDir) -> std::path::PathBuf {
    let path = dir.path().join("news.csv");
    let mut file = std::fs::File::create(&path).unwrap();
    writeln!(file, "title,text,label").unwrap();

    let fake = [
        "Aliens secretly run the city council and demand pizza tributes",
        "Miracle fruit cures every disease overnight doctors furious",
        "Moon landing staged by lizard people says anonymous insider",
        "Drinking bleach makes you immortal claims viral post",
        "Gravity will be switched off next week government admits",
        "Celebrity clone replaces president shocking footage reveals",
    ];
    let real = [
        "Central bank holds interest rates steady amid slowing inflation",
        "City council approves budget for road maintenance program",
        "University researchers publish study on coastal erosion",
        "Local hospital opens new pediatric wing after renovation",
        "Quarterly earnings show modest growth for technology firms",
        "Weather service forecasts mild temperatures through weekend",
    ];
    for (i, text) in fake.iter().enumerate() {
        writeln!(file, "f{},\"{}\",1", i, text).unwrap();
    }
    for (i, text) in real.iter().enumerate() {
        writeln!(file, "r{},\"{}\",0", i, text).unwrap();
    }
    // Unusable rows are dropped, not fatal
    writeln!(file, "bad1,,1").unwrap();
    writeln!(file, "bad2,\"No label at all\",").unwrap();
    path
}

#[tokio::test]
async fn test_predict_trains_lazily() {
    let dir = TempDir::new().unwrap();
    let service = setup_service(&dir);
    assert_eq!(service.status(), ModelStatus::Uninitialized);

    let result = service
        .predict("Aliens have landed and want pizza")
        .unwrap();

    assert!(matches!(result.prediction, Label::Fake | Label::Real));
    assert!((0.0..=1.0).contains(&result.confidence));
    assert_eq!(result.model_used, MODEL_USED);
    assert!(result.processing_time < Duration::from_secs(60).as_secs_f64());
    assert_eq!(service.status(), ModelStatus::Ready);
}

#[tokio::test]
async fn test_empty_text_is_invalid_input() {
    let dir = TempDir::new().unwrap();
    let service = setup_service(&dir);

    for text in ["", "   ", "\n\t"] {
        assert!(matches!(
            service.predict(text),
            Err(AppError::InvalidInput(_))
        ));
    }
}

#[tokio::test]
async fn test_train_reports_accuracy() {
    let dir = TempDir::new().unwrap();
    let service = setup_service(&dir);

    let report = service.train(None).unwrap();
    assert!((0.0..=1.0).contains(&report.train_accuracy));
    assert!((0.0..=1.0).contains(&report.test_accuracy));
    assert_eq!(report.n_train + report.n_test, 10);
    assert!(report.vocabulary_size > 0);
}

#[tokio::test]
async fn test_train_from_csv_dataset() {
    let dir = TempDir::new().unwrap();
    let data = write_dataset(&dir);
    let service = setup_service(&dir);

    let report = service.train(Some(&data)).unwrap();
    assert_eq!(report.n_train + report.n_test, 12);
    assert_eq!(report.n_test, 3);

    let metadata = service.model_info().unwrap();
    assert_eq!(metadata.data_source, data.display().to_string());
    assert_eq!(metadata.members.len(), 3);
}

#[tokio::test]
async fn test_missing_dataset_is_data_load_error() {
    let dir = TempDir::new().unwrap();
    let service = setup_service(&dir);

    let result = service.train(Some(&dir.path().join("nope.csv")));
    assert!(matches!(result, Err(AppError::DataLoad(_))));
    assert_eq!(service.status(), ModelStatus::Uninitialized);
}

#[tokio::test]
async fn test_saved_model_survives_restart() {
    let dir = TempDir::new().unwrap();
    let text = "Government announces that gravity will be turned off";

    let first = setup_service(&dir);
    first.train(None).unwrap();
    let before = first.predict(text).unwrap();

    let second = setup_service(&dir);
    assert_eq!(second.initialize().unwrap(), ModelStatus::Ready);
    let after = second.predict(text).unwrap();

    assert_eq!(before.prediction, after.prediction);
    assert_eq!(before.confidence, after.confidence);
    assert_eq!(second.stats().training_runs, 0);
}

#[tokio::test]
async fn test_corrupt_artifact_falls_back_to_training() {
    let dir = TempDir::new().unwrap();
    let service = setup_service(&dir);
    service.train(None).unwrap();

    let store = ModelStore::new(dir.path().join("models"), "vectorizer.bin", "trained_model.bin");
    std::fs::write(store.vectorizer_path(), b"garbage").unwrap();

    let restarted = setup_service(&dir);
    assert_eq!(restarted.initialize().unwrap(), ModelStatus::Uninitialized);
    assert!(restarted.predict("Markets rally on earnings").is_ok());
    assert_eq!(restarted.stats().training_runs, 1);
}

#[tokio::test]
async fn test_predictions_continue_during_retrain() {
    let dir = TempDir::new().unwrap();
    let service = setup_service(&dir);
    service.train(None).unwrap();

    let trainer = service.clone();
    let retrain = tokio::task::spawn_blocking(move || trainer.train(None));

    let mut handles = Vec::new();
    for i in 0..8 {
        let service = service.clone();
        handles.push(tokio::task::spawn_blocking(move || {
            service.predict(&format!("Headline number {} about the economy", i))
        }));
    }

    for handle in handles {
        let result = handle.await.unwrap().unwrap();
        assert!((0.0..=1.0).contains(&result.confidence));
    }
    retrain.await.unwrap().unwrap();
    assert_eq!(service.status(), ModelStatus::Ready);
}

#[tokio::test]
async fn test_concurrent_first_predictions_train_once() {
    let dir = TempDir::new().unwrap();
    let service = setup_service(&dir);

    let mut handles = Vec::new();
    for _ in 0..4 {
        let service = service.clone();
        handles.push(tokio::task::spawn_blocking(move || {
            service.predict("Study shows reading news makes you smarter")
        }));
    }
    for handle in handles {
        assert!(handle.await.unwrap().is_ok());
    }

    assert_eq!(service.stats().training_runs, 1);
}
