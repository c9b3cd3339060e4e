//! mathscore CLI Module
//!
//! Command-line interface for training the model roster, predicting a
//! student's math score and listing the candidates.

use clap::{Parser, Subcommand};
use colored::*;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::error::MathScoreError;
use crate::inference::{PredictPipeline, PredictionRequest};
use crate::preprocessing::FeatureSchema;
use crate::training::{
    CandidateRegistry, ModelTrainer, TrainerConfig, TrainingOutcome, DEFAULT_ACCEPTANCE_THRESHOLD,
    DEFAULT_ARTIFACT_PATH,
};
use crate::utils::{load_dataset, SplitConfig};

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString    { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn step_ok(msg: &str) {
    println!("  {} {}", ok("✓"), msg);
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "mathscore")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Predict student math scores from demographics and reading/writing scores")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Evaluate every candidate and persist the best model
    Train {
        /// Student performance CSV
        #[arg(short, long)]
        data: PathBuf,

        /// Where to write the model artifact
        #[arg(short, long, default_value = DEFAULT_ARTIFACT_PATH)]
        artifact: PathBuf,

        /// JSON file with a custom candidate roster
        #[arg(short, long)]
        registry: Option<PathBuf>,

        /// Minimum test R² required to keep the winner
        #[arg(long, default_value_t = DEFAULT_ACCEPTANCE_THRESHOLD)]
        threshold: f64,

        /// Fraction of rows held out for evaluation
        #[arg(long, default_value_t = 0.2)]
        test_size: f64,

        /// Shuffle seed for the train/test split
        #[arg(long, default_value_t = 42)]
        seed: u64,

        /// Write the evaluation report as JSON
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Predict the math score of one student
    Predict {
        /// Model artifact written by `train`
        #[arg(short, long, default_value = DEFAULT_ARTIFACT_PATH)]
        artifact: PathBuf,

        #[arg(long)]
        gender: Option<String>,

        #[arg(long)]
        race_ethnicity: Option<String>,

        #[arg(long)]
        parental_education: Option<String>,

        #[arg(long)]
        lunch: Option<String>,

        #[arg(long)]
        test_preparation: Option<String>,

        #[arg(long)]
        reading_score: Option<String>,

        #[arg(long)]
        writing_score: Option<String>,
    },

    /// List the candidate roster
    Candidates {
        /// JSON file with a custom candidate roster
        #[arg(short, long)]
        registry: Option<PathBuf>,
    },
}

/// Dispatch a parsed command
pub fn run(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Train { data, artifact, registry, threshold, test_size, seed, report } => {
            let split = SplitConfig::default().with_test_size(test_size).with_seed(seed);
            let config = TrainerConfig::new(artifact).with_acceptance_threshold(threshold);
            cmd_train(&data, config, registry.as_deref(), &split, report.as_deref())
        }
        Commands::Predict {
            artifact,
            gender,
            race_ethnicity,
            parental_education,
            lunch,
            test_preparation,
            reading_score,
            writing_score,
        } => {
            let request = PredictionRequest {
                gender,
                race_ethnicity,
                parental_level_of_education: parental_education,
                lunch,
                test_preparation_course: test_preparation,
                reading_score,
                writing_score,
            };
            cmd_predict(&artifact, request)
        }
        Commands::Candidates { registry } => cmd_candidates(registry.as_deref()),
    }
}

/// One-line, user-facing description of a failure
pub fn render_error(err: &anyhow::Error) -> String {
    match err.downcast_ref::<MathScoreError>() {
        Some(e) => e.user_message(),
        None => err.to_string(),
    }
}

fn load_registry(path: Option<&Path>) -> anyhow::Result<CandidateRegistry> {
    Ok(match path {
        Some(path) => CandidateRegistry::from_json_file(path)?,
        None => CandidateRegistry::default_roster(),
    })
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_train(
    data_path: &Path,
    config: TrainerConfig,
    registry_path: Option<&Path>,
    split: &SplitConfig,
    report_path: Option<&Path>,
) -> anyhow::Result<()> {
    section("Train");
    let registry = load_registry(registry_path)?;

    step_run("Loading data");
    let start = Instant::now();
    let (dataset, encoder) = load_dataset(data_path, &FeatureSchema::default(), split)?;
    step_done(&format!(
        "{} train / {} test rows, {} features in {:?}",
        dataset.n_train(),
        dataset.n_test(),
        dataset.n_features(),
        start.elapsed()
    ));

    step_run(&format!("Evaluating {} candidates", registry.len()));
    let start = Instant::now();
    let trainer = ModelTrainer::new(config, registry);
    let outcome = trainer.train(&dataset, &encoder)?;
    step_done(&format!("{:?}", start.elapsed()));

    print_report(&outcome);

    if let Some(path) = report_path {
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, &outcome)?;
        step_ok(&format!("Report written to {}", path.display()));
    }
    step_ok(&format!("Artifact saved to {}", outcome.artifact_path.display()));
    println!();
    Ok(())
}

fn print_report(outcome: &TrainingOutcome) {
    println!();
    println!("  {:<26} {:<20} {:>8}", muted("Candidate"), muted("Type"), muted("R²"));
    for entry in outcome.report.entries() {
        let marker = if entry.name == outcome.best_name { ok("●") } else { dim("·") };
        println!(
            "  {} {:<24} {:<20} {:>8}",
            marker,
            entry.name,
            dim(entry.model_type.as_str()),
            format!("{:.4}", entry.r2)
        );
    }
    println!();
    println!("  {:<16} {}", muted("Best model"), outcome.best_name.white().bold());
    println!("  {:<16} {}", muted("R²"), format!("{:.4}", outcome.best_score).white().bold());
    println!("  {:<16} {}", muted("RMSE"), format!("{:.3}", outcome.metrics.rmse).white());
    println!("  {:<16} {}", muted("MAE"), format!("{:.3}", outcome.metrics.mae).white());
    println!();
}

pub fn cmd_predict(artifact: &Path, request: PredictionRequest) -> anyhow::Result<()> {
    section("Predict");
    // Input problems are reported before the artifact is opened
    let record = request.into_record()?;

    step_run("Loading model");
    let pipeline = PredictPipeline::load(artifact)?;
    step_done(&pipeline.metadata().candidate_name);

    let score = pipeline.predict_record(&record)?;
    println!();
    println!("  {:<16} {}", muted("Math score"), format!("{:.2}", score).white().bold());
    println!();
    Ok(())
}

pub fn cmd_candidates(registry_path: Option<&Path>) -> anyhow::Result<()> {
    section("Candidates");
    let registry = load_registry(registry_path)?;
    for (idx, candidate) in registry.iter().enumerate() {
        let params: Vec<String> = candidate
            .hyperparameters
            .iter()
            .map(|(name, value)| format!("{}={}", name, value))
            .collect();
        println!(
            "  {:>2}. {:<24} {:<20} {}",
            idx + 1,
            candidate.name.white(),
            accent(candidate.model_type.as_str()),
            dim(&params.join(", "))
        );
    }
    println!();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_predict_command() {
        let cli = Cli::try_parse_from([
            "mathscore",
            "predict",
            "--gender",
            "female",
            "--reading-score",
            "72",
        ])
        .unwrap();
        match cli.command {
            Commands::Predict { artifact, gender, reading_score, lunch, .. } => {
                assert_eq!(artifact, PathBuf::from(DEFAULT_ARTIFACT_PATH));
                assert_eq!(gender.as_deref(), Some("female"));
                assert_eq!(reading_score.as_deref(), Some("72"));
                assert!(lunch.is_none());
            }
            _ => panic!("expected predict"),
        }
    }

    #[test]
    fn test_parse_train_defaults() {
        let cli = Cli::try_parse_from(["mathscore", "train", "--data", "students.csv"]).unwrap();
        match cli.command {
            Commands::Train { threshold, test_size, seed, registry, .. } => {
                assert_eq!(threshold, 0.6);
                assert_eq!(test_size, 0.2);
                assert_eq!(seed, 42);
                assert!(registry.is_none());
            }
            _ => panic!("expected train"),
        }
    }

    #[test]
    fn test_render_error_uses_user_message() {
        let err: anyhow::Error = MathScoreError::ArtifactNotFound("/tmp/x/model.bin".into()).into();
        assert!(render_error(&err).contains("run training first"));

        let err = anyhow::anyhow!("plain failure");
        assert_eq!(render_error(&err), "plain failure");
    }

    #[test]
    fn test_predict_reports_invalid_input_before_loading() {
        let err = cmd_predict(Path::new("/nonexistent/model.bin"), PredictionRequest::new()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MathScoreError>(),
            Some(MathScoreError::InvalidInput { .. })
        ));
    }
}
