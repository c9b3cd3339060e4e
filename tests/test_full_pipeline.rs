//! Integration test: Full pipeline (CSV → split → encode → train → persist → predict)

mod common;

use mathscore::error::MathScoreError;
use mathscore::inference::{PredictPipeline, PredictionRequest, StudentRecord};
use mathscore::preprocessing::FeatureSchema;
use mathscore::training::{
    Candidate, CandidateRegistry, Hyperparameters, ModelTrainer, ModelType, TrainerConfig,
};
use mathscore::utils::{load_dataset, SplitConfig};
use polars::prelude::*;
use std::sync::Arc;

fn linear_roster() -> CandidateRegistry {
    CandidateRegistry::new(vec![
        Candidate::new("Linear Regression", ModelType::LinearRegression, Hyperparameters::new()),
        Candidate::new(
            "K-Neighbors Regressor",
            ModelType::KNeighbors,
            Hyperparameters::new().with("n_neighbors", 5usize),
        ),
    ])
    .unwrap()
}

fn request() -> PredictionRequest {
    PredictionRequest::new()
        .with_gender("male")
        .with_race_ethnicity("group C")
        .with_parental_level_of_education("some college")
        .with_lunch("standard")
        .with_test_preparation_course("completed")
        .with_reading_score("80")
        .with_writing_score("78")
}

#[test]
fn test_csv_to_prediction() {
    let dir = tempfile::tempdir().unwrap();
    let csv = dir.path().join("stud.csv");
    common::write_csv(&common::student_frame(200, 3, true), &csv);

    let (dataset, encoder) = load_dataset(&csv, &FeatureSchema::default(), &SplitConfig::default()).unwrap();
    assert_eq!(dataset.n_train(), 160);
    assert_eq!(dataset.n_test(), 40);

    let artifact = dir.path().join("artifacts").join("model.bin");
    let outcome = ModelTrainer::new(TrainerConfig::new(&artifact), linear_roster())
        .train(&dataset, &encoder)
        .unwrap();
    assert_eq!(outcome.best_name, "Linear Regression");
    assert!(artifact.exists());

    let pipeline = PredictPipeline::load(&artifact).unwrap();
    assert_eq!(pipeline.metadata().candidate_name, "Linear Regression");

    // 0.9 * 80 + 6 for a male student on standard lunch
    let score = pipeline.predict_request(request()).unwrap();
    assert!((score - 78.0).abs() < 3.0, "predicted {score}");
}

#[test]
fn test_prediction_tracks_linear_target() {
    let dir = tempfile::tempdir().unwrap();
    let csv = dir.path().join("linear.csv");
    let x1: Vec<f64> = (0..60).map(|i| i as f64).collect();
    let y: Vec<f64> = x1.iter().map(|x| 2.0 * x).collect();
    common::write_csv(&df!("x1" => x1, "y" => y).unwrap(), &csv);

    let schema = FeatureSchema::new().with_numeric(["x1"]);
    let split = SplitConfig::default().with_target_column("y");
    let (dataset, encoder) = load_dataset(&csv, &schema, &split).unwrap();

    let artifact = dir.path().join("model.bin");
    let ols_only = CandidateRegistry::new(vec![Candidate::new(
        "Linear Regression",
        ModelType::LinearRegression,
        Hyperparameters::new(),
    )])
    .unwrap();
    ModelTrainer::new(TrainerConfig::new(&artifact), ols_only)
        .train(&dataset, &encoder)
        .unwrap();

    let pipeline = PredictPipeline::load(&artifact).unwrap();
    let predictions = pipeline.predict(&df!("x1" => [7.0, 30.5, 100.0]).unwrap()).unwrap();
    for (x, p) in [7.0, 30.5, 100.0].iter().zip(predictions.iter()) {
        assert!((p - 2.0 * x).abs() < 1e-6, "x = {x}, predicted {p}");
    }
}

#[test]
fn test_unseen_category_at_inference() {
    let dir = tempfile::tempdir().unwrap();
    let csv = dir.path().join("stud.csv");
    common::write_csv(&common::student_frame(150, 5, true), &csv);
    let (dataset, encoder) = load_dataset(&csv, &FeatureSchema::default(), &SplitConfig::default()).unwrap();

    let artifact = dir.path().join("model.bin");
    ModelTrainer::new(TrainerConfig::new(&artifact), linear_roster())
        .train(&dataset, &encoder)
        .unwrap();

    let pipeline = PredictPipeline::load(&artifact).unwrap();
    let err = pipeline
        .predict_request(request().with_race_ethnicity("group F"))
        .unwrap_err();
    match err {
        MathScoreError::FeatureEncodingError { column, value } => {
            assert_eq!(column, "race_ethnicity");
            assert_eq!(value, "group F");
        }
        other => panic!("expected FeatureEncodingError, got {other}"),
    }
}

#[test]
fn test_predict_without_training() {
    let dir = tempfile::tempdir().unwrap();
    let err = PredictPipeline::load(dir.path().join("artifacts").join("model.bin")).unwrap_err();
    assert!(matches!(err, MathScoreError::ArtifactNotFound(_)));
}

#[test]
fn test_rejected_run_keeps_previous_model() {
    let dir = tempfile::tempdir().unwrap();
    let artifact = dir.path().join("model.bin");

    let good = dir.path().join("good.csv");
    common::write_csv(&common::student_frame(150, 8, true), &good);
    let (dataset, encoder) = load_dataset(&good, &FeatureSchema::default(), &SplitConfig::default()).unwrap();
    ModelTrainer::new(TrainerConfig::new(&artifact), linear_roster())
        .train(&dataset, &encoder)
        .unwrap();
    let before = PredictPipeline::load(&artifact).unwrap().predict_request(request()).unwrap();

    let noisy = dir.path().join("noisy.csv");
    common::write_csv(&common::student_frame(150, 8, false), &noisy);
    let (dataset, encoder) = load_dataset(&noisy, &FeatureSchema::default(), &SplitConfig::default()).unwrap();
    let err = ModelTrainer::new(TrainerConfig::new(&artifact), linear_roster())
        .train(&dataset, &encoder)
        .unwrap_err();
    assert!(matches!(err, MathScoreError::NoAcceptableModel { .. }));

    let after = PredictPipeline::load(&artifact).unwrap().predict_request(request()).unwrap();
    assert_eq!(before, after);
}

#[test]
fn test_pipeline_shared_across_threads() {
    let dir = tempfile::tempdir().unwrap();
    let csv = dir.path().join("stud.csv");
    common::write_csv(&common::student_frame(150, 21, true), &csv);
    let (dataset, encoder) = load_dataset(&csv, &FeatureSchema::default(), &SplitConfig::default()).unwrap();
    let artifact = dir.path().join("model.bin");
    ModelTrainer::new(TrainerConfig::new(&artifact), linear_roster())
        .train(&dataset, &encoder)
        .unwrap();

    let pipeline = Arc::new(PredictPipeline::load(&artifact).unwrap());
    let record: StudentRecord = request().into_record().unwrap();
    let expected = pipeline.predict_record(&record).unwrap();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let pipeline = Arc::clone(&pipeline);
            let record = record.clone();
            std::thread::spawn(move || pipeline.predict_record(&record).unwrap())
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap(), expected);
    }
}
