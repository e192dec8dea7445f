mod config;
mod error;
mod extract;
mod grader;
mod loader;
mod models;
mod ollama;
mod prompts;
mod report;
mod results;
mod runner;
mod stats;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand, ValueEnum};

use crate::config::{GeminiConfig, GradingConfig, OllamaConfig};
use crate::grader::{Backend, GeminiGrader};
use crate::loader::SubmissionLoader;
use crate::ollama::OllamaGrader;
use crate::results::read_results;
use crate::runner::Runner;

const BANNER_RULE: &str = "============================================================";

/// SQL Autograder - grade SQL submissions with an LLM and compare against
/// human grader scores
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum BackendKind {
    Gemini,
    Ollama,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Grade student submissions and write a results file
    Grade {
        /// Input CSV file with submissions
        input_csv: PathBuf,
        /// Output CSV file for results
        #[arg(long, default_value = "output/grading_results.csv")]
        output: PathBuf,
        /// Maximum number of students to grade (default: all)
        #[arg(long)]
        max_students: Option<usize>,
        /// Delay between API calls in seconds
        #[arg(long, default_value_t = 1.0)]
        rate_limit: f64,
        /// Which model backend grades the submissions
        #[arg(long, value_enum, default_value_t = BackendKind::Gemini)]
        backend: BackendKind,
        /// Override the backend's default model name
        #[arg(long)]
        model: Option<String>,
        /// Override the Ollama server URL
        #[arg(long)]
        base_url: Option<String>,
        /// Grading configuration TOML (defaults apply when omitted)
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Generate the overall statistics report from a results file
    Stats {
        /// Input CSV file with grading results
        results_csv: PathBuf,
        /// Output text file for the report
        #[arg(long, default_value = "output/statistics_report.txt")]
        output: PathBuf,
        /// Grading configuration TOML (defaults apply when omitted)
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Generate the per-grader statistics report from a results file
    GraderStats {
        /// Input CSV file with grading results
        results_csv: PathBuf,
        /// Output text file for the report
        #[arg(long, default_value = "output/per_grader_statistics.txt")]
        output: PathBuf,
        /// Grading configuration TOML (defaults apply when omitted)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn load_grading_config(path: Option<&Path>) -> anyhow::Result<GradingConfig> {
    match path {
        Some(path) => GradingConfig::from_file(path)
            .with_context(|| format!("failed to load grading config from {}", path.display())),
        None => Ok(GradingConfig::default()),
    }
}

fn build_backend(
    kind: BackendKind,
    model: Option<String>,
    base_url: Option<String>,
    grading: &GradingConfig,
) -> anyhow::Result<Backend> {
    let questions = grading.questions.clone();
    match kind {
        BackendKind::Gemini => {
            let mut config = GeminiConfig::from_env()?;
            if let Some(model) = model {
                config.model_name = model;
            }
            Ok(Backend::Gemini(GeminiGrader::new(config, questions)?))
        }
        BackendKind::Ollama => {
            let mut config = OllamaConfig::default();
            if let Some(model) = model {
                config.model_name = model;
            }
            if let Some(base_url) = base_url {
                config.base_url = base_url;
            }
            Ok(Backend::Ollama(OllamaGrader::new(config, questions)?))
        }
    }
}

async fn grade_submissions(
    input_csv: &Path,
    output: &Path,
    max_students: Option<usize>,
    rate_limit: f64,
    backend_kind: BackendKind,
    model: Option<String>,
    base_url: Option<String>,
    config_path: Option<&Path>,
) -> anyhow::Result<()> {
    println!("{BANNER_RULE}");
    println!("SQL AUTOGRADER");
    println!("{BANNER_RULE}");
    println!();

    println!("1. Loading configuration...");
    let grading = load_grading_config(config_path)?;
    let backend = build_backend(backend_kind, model, base_url, &grading)?;
    println!("   ✓ Using model: {}", backend.model_name());
    println!();

    println!("2. Loading submissions...");
    let loader = SubmissionLoader::load(input_csv, &grading)?;
    println!("   ✓ Loaded {} submissions", loader.count());

    let missing = loader.validate_schema();
    if !missing.is_empty() {
        bail!("missing columns: {}", missing.join(", "));
    }
    println!("   ✓ All required columns present");
    println!();

    let submissions = loader.submissions(max_students);
    println!("3. Grading {} submissions...", submissions.len());
    println!();

    let runner = Runner::new(backend, grading, Duration::from_secs_f64(rate_limit));
    let summary = runner.run(&submissions, output).await?;

    println!("{BANNER_RULE}");
    println!("GRADING SUMMARY");
    println!("{BANNER_RULE}");
    println!("Total students: {}", summary.total);
    println!("Successfully graded: {}", summary.success_count);
    println!("Failed: {}", summary.fail_count);
    println!();
    println!("✓ Results saved to: {}", summary.output_path.display());
    Ok(())
}

fn generate_statistics(
    results_csv: &Path,
    output: &Path,
    config_path: Option<&Path>,
    per_grader: bool,
) -> anyhow::Result<()> {
    println!("{BANNER_RULE}");
    if per_grader {
        println!("GENERATING PER-GRADER STATISTICS");
    } else {
        println!("GENERATING STATISTICS");
    }
    println!("{BANNER_RULE}");
    println!();

    let grading = load_grading_config(config_path)?;
    let rows = read_results(results_csv, &grading.questions)
        .with_context(|| format!("failed to load results from {}", results_csv.display()))?;
    println!("✓ Loaded {} result rows for analysis", rows.len());
    println!();

    let rendered = if per_grader {
        report::per_grader_report(&rows, &grading.questions, grading.points_per_question)
    } else {
        report::summary_report(&rows, &grading.questions, grading.points_per_question)
    };

    report::write_report(output, &rendered)
        .with_context(|| format!("failed to write report to {}", output.display()))?;
    println!("✓ Statistics saved to: {}", output.display());
    println!();
    println!("{rendered}");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Grade {
            input_csv,
            output,
            max_students,
            rate_limit,
            backend,
            model,
            base_url,
            config,
        } => {
            grade_submissions(
                &input_csv,
                &output,
                max_students,
                rate_limit,
                backend,
                model,
                base_url,
                config.as_deref(),
            )
            .await
        }
        Command::Stats {
            results_csv,
            output,
            config,
        } => generate_statistics(&results_csv, &output, config.as_deref(), false),
        Command::GraderStats {
            results_csv,
            output,
            config,
        } => generate_statistics(&results_csv, &output, config.as_deref(), true),
    }
}
