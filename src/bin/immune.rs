//! immune CLI - Command-line interface for the ImmuneScore engine
//!
//! Commands:
//! - predict: Score one day of raw metrics
//! - train: Fit the model on scored daily records
//! - rescore: Recompute scores for daily records
//! - coach: Forecast tomorrow's score and suggest improvements
//! - reset: Restore default model parameters
//! - show: Print current model parameters
//! - doctor: Diagnose the parameter file and environment

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use immune_score::coach::FORECAST_WINDOW_DAYS;
use immune_score::config::TrainingConfig;
use immune_score::pipeline::{coach_report, records_from_json, retrain_from_history, score_history};
use immune_score::store::{JsonFileStore, StoredParameters, StoredShape};
use immune_score::{
    RawMetrics, SampleOrder, ScoreError, ScorePredictor, ENGINE_VERSION, PRODUCER_NAME,
};

const DEFAULT_PARAMS_PATH: &str = "immune_params.json";

/// immune - On-device ImmuneScore engine
#[derive(Parser)]
#[command(name = "immune")]
#[command(version = ENGINE_VERSION)]
#[command(about = "Score and train the ImmuneScore wellness model", long_about = None)]
struct Cli {
    /// Parameter file (JSON key-value store)
    #[arg(long, global = true, default_value = DEFAULT_PARAMS_PATH)]
    params: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score one day of raw metrics
    Predict {
        /// Minutes asleep
        #[arg(long, default_value = "0")]
        sleep: u32,

        /// Step count
        #[arg(long, default_value = "0")]
        steps: u32,

        /// Active energy (kcal)
        #[arg(long, default_value = "0")]
        kcal: u32,

        /// Stress level (0-10)
        #[arg(long, default_value = "0")]
        stress: u32,

        /// Screen time (minutes)
        #[arg(long, default_value = "0")]
        screen: u32,

        /// Output as JSON (includes normalized features)
        #[arg(long)]
        json: bool,
    },

    /// Fit the model on scored daily records
    Train {
        /// Input file path (use - for stdin); NDJSON or JSON array
        #[arg(short, long)]
        input: PathBuf,

        /// Number of epochs
        #[arg(long)]
        epochs: Option<usize>,

        /// SGD learning rate
        #[arg(long)]
        learning_rate: Option<f64>,

        /// Shuffle with a fixed seed
        #[arg(long, conflicts_with = "fixed_order")]
        seed: Option<u64>,

        /// Visit samples in input order
        #[arg(long)]
        fixed_order: bool,

        /// Use the history retrain preset (250 epochs)
        #[arg(long)]
        history: bool,

        /// Output the fit report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Recompute scores for daily records
    Rescore {
        /// Input file path (use - for stdin); NDJSON or JSON array
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Output format
        #[arg(long, default_value = "ndjson")]
        output_format: OutputFormat,
    },

    /// Forecast tomorrow's score and suggest improvements
    Coach {
        /// Input file path (use - for stdin); NDJSON or JSON array
        #[arg(short, long)]
        input: PathBuf,

        /// Number of recent days to average for the forecast
        #[arg(long, default_value_t = FORECAST_WINDOW_DAYS)]
        days: usize,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Restore default model parameters
    Reset,

    /// Print current model parameters
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose the parameter file and environment
    Doctor {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Newline-delimited JSON (one record per line)
    Ndjson,
    /// JSON array of records
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!(
                "{}",
                serde_json::to_string(&CliError::from(e))
                    .unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .compact()
        .init();
}

fn run(cli: Cli) -> Result<(), ImmuneCliError> {
    let params = cli.params;

    match cli.command {
        Commands::Predict {
            sleep,
            steps,
            kcal,
            stress,
            screen,
            json,
        } => cmd_predict(&params, RawMetrics::new(sleep, steps, kcal, stress, screen), json),

        Commands::Train {
            input,
            epochs,
            learning_rate,
            seed,
            fixed_order,
            history,
            json,
        } => {
            let base = if history {
                TrainingConfig::history_retrain()
            } else {
                TrainingConfig::default()
            };
            let mut config = base.with_env_overrides()?;
            if let Some(epochs) = epochs {
                config = config.with_epochs(epochs);
            }
            if let Some(learning_rate) = learning_rate {
                config = config.with_learning_rate(learning_rate);
            }
            if let Some(seed) = seed {
                config = config.with_order(SampleOrder::Seeded(seed));
            }
            if fixed_order {
                config = config.with_order(SampleOrder::Fixed);
            }
            config.validate()?;
            cmd_train(&params, &input, &config, json)
        }

        Commands::Rescore {
            input,
            output,
            output_format,
        } => cmd_rescore(&params, &input, &output, output_format),

        Commands::Coach { input, days, json } => cmd_coach(&params, &input, days, json),

        Commands::Reset => cmd_reset(&params),

        Commands::Show { json } => cmd_show(&params, json),

        Commands::Doctor { json } => cmd_doctor(&params, json),
    }
}

fn open_predictor(params: &Path) -> ScorePredictor {
    ScorePredictor::new(Box::new(JsonFileStore::new(params)))
}

fn read_input(input: &Path) -> Result<String, ImmuneCliError> {
    if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn cmd_predict(params: &Path, metrics: RawMetrics, json: bool) -> Result<(), ImmuneCliError> {
    let predictor = open_predictor(params);
    let score = predictor.predict(&metrics);

    if json {
        let report = serde_json::json!({
            "metrics": metrics,
            "features": predictor.normalize(&metrics).as_array(),
            "score": score,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", score);
    }
    Ok(())
}

fn cmd_train(
    params: &Path,
    input: &Path,
    config: &TrainingConfig,
    json: bool,
) -> Result<(), ImmuneCliError> {
    let history = records_from_json(&read_input(input)?)?;
    if history.is_empty() {
        return Err(ImmuneCliError::NoRecords);
    }

    let predictor = open_predictor(params);
    let report = retrain_from_history(&predictor, &history, config)?
        .ok_or(ImmuneCliError::NoScoredRecords)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Trained on {} samples", report.samples);
        println!("Epochs:        {}", report.epochs);
        println!("Learning rate: {}", report.learning_rate);
        println!("Loss:          {:.6} -> {:.6}", report.initial_loss, report.final_loss());
        print_parameters(&predictor);
    }
    Ok(())
}

fn cmd_rescore(
    params: &Path,
    input: &Path,
    output: &Path,
    format: OutputFormat,
) -> Result<(), ImmuneCliError> {
    let mut history = records_from_json(&read_input(input)?)?;
    if history.is_empty() {
        return Err(ImmuneCliError::NoRecords);
    }

    let predictor = open_predictor(params);
    score_history(&predictor, &mut history);

    let output_data = match format {
        OutputFormat::Ndjson => history.to_ndjson()?,
        OutputFormat::Json => history.to_json()?,
        OutputFormat::JsonPretty => serde_json::to_string_pretty(&history)?,
    };

    if output.to_string_lossy() == "-" {
        print!("{}", output_data);
    } else {
        fs::write(output, output_data)?;
    }
    Ok(())
}

fn cmd_coach(params: &Path, input: &Path, days: usize, json: bool) -> Result<(), ImmuneCliError> {
    let history = records_from_json(&read_input(input)?)?;
    if history.is_empty() {
        return Err(ImmuneCliError::NoRecords);
    }

    let predictor = open_predictor(params);
    let report = coach_report(&predictor, &history, days);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if let Some(avg) = report.averages {
        println!("Averages (last {} days)", report.window_days);
        println!("  sleep   {}h {:02}min", avg.sleep_minutes / 60, avg.sleep_minutes % 60);
        println!("  steps   {}", avg.steps);
        println!("  kcal    {}", avg.kcal);
        println!("  stress  {}", avg.stress_level);
        println!("  screen  {}h {:02}min", avg.screen_minutes / 60, avg.screen_minutes % 60);
    }
    if let Some(forecast) = report.forecast {
        println!("Forecast: {} / 100", forecast);
    }
    if let Some(date) = report.date {
        println!("Recommendations for {}:", date);
    }
    for tip in &report.recommendations {
        println!("  - {}", tip.message());
    }
    Ok(())
}

fn cmd_reset(params: &Path) -> Result<(), ImmuneCliError> {
    let predictor = open_predictor(params);
    predictor.reset();
    print_parameters(&predictor);
    Ok(())
}

fn cmd_show(params: &Path, json: bool) -> Result<(), ImmuneCliError> {
    let predictor = open_predictor(params);

    if json {
        let report = serde_json::json!({
            "weights": predictor.weights(),
            "bias": predictor.bias(),
            "state": predictor.state(),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_parameters(&predictor);
    }
    Ok(())
}

fn print_parameters(predictor: &ScorePredictor) {
    const NAMES: [&str; 5] = ["sleep", "steps", "energy", "stress", "screen"];

    println!("State: {}", predictor.state().as_str());
    for (name, weight) in NAMES.iter().zip(predictor.weights()) {
        println!("  {:<7} {:+.4}", name, weight);
    }
    println!("  {:<7} {:+.4}", "bias", predictor.bias());
}

fn cmd_doctor(params: &Path, json: bool) -> Result<(), ImmuneCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "engine_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("ImmuneScore engine {}", ENGINE_VERSION),
    });

    if params.exists() {
        let store = JsonFileStore::new(params);
        let check = match StoredParameters::read(&store) {
            Ok(stored) => {
                let (status, message) = match stored.shape() {
                    StoredShape::Valid => (CheckStatus::Ok, "Stored parameters valid".to_string()),
                    StoredShape::MissingBias => (
                        CheckStatus::Warning,
                        "Stored bias missing or not a number; default bias will be used"
                            .to_string(),
                    ),
                    StoredShape::WrongLength(n) => (
                        CheckStatus::Warning,
                        format!("Stored weights have {} entries; defaults will be used", n),
                    ),
                    StoredShape::MalformedWeights => (
                        CheckStatus::Warning,
                        "Stored weights are not a list of numbers; defaults will be used"
                            .to_string(),
                    ),
                    StoredShape::MissingWeights => (
                        CheckStatus::Warning,
                        "No stored weights; defaults will be used".to_string(),
                    ),
                };
                DoctorCheck {
                    name: "parameters".to_string(),
                    status,
                    message,
                }
            }
            Err(e) => DoctorCheck {
                name: "parameters".to_string(),
                status: CheckStatus::Error,
                message: format!("Cannot read parameter file: {}", e),
            },
        };
        checks.push(check);
    } else {
        checks.push(DoctorCheck {
            name: "parameters".to_string(),
            status: CheckStatus::Warning,
            message: format!(
                "{} does not exist; defaults will be used",
                params.display()
            ),
        });
    }

    match TrainingConfig::default().with_env_overrides() {
        Ok(config) => checks.push(DoctorCheck {
            name: "training_config".to_string(),
            status: CheckStatus::Ok,
            message: format!(
                "epochs={} learning_rate={} order={:?}",
                config.epochs, config.learning_rate, config.order
            ),
        }),
        Err(e) => checks.push(DoctorCheck {
            name: "training_config".to_string(),
            status: CheckStatus::Error,
            message: e.to_string(),
        }),
    }

    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (interactive mode)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (records can be piped with --input -)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: ENGINE_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("ImmuneScore Doctor Report");
        println!("=========================");
        println!("Producer: {}", report.producer);
        println!("Version:  {}", report.version);
        println!("\nChecks:");

        for check in &report.checks {
            let status_icon = match check.status {
                CheckStatus::Ok => "[OK]",
                CheckStatus::Warning => "[WARN]",
                CheckStatus::Error => "[ERR]",
            };
            println!("  {} {}: {}", status_icon, check.name, check.message);
        }
    }

    let has_errors = report
        .checks
        .iter()
        .any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(ImmuneCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

// Error types

#[derive(Debug)]
enum ImmuneCliError {
    Io(io::Error),
    Score(ScoreError),
    Json(serde_json::Error),
    NoRecords,
    NoScoredRecords,
    DoctorFailed,
}

impl From<io::Error> for ImmuneCliError {
    fn from(e: io::Error) -> Self {
        ImmuneCliError::Io(e)
    }
}

impl From<ScoreError> for ImmuneCliError {
    fn from(e: ScoreError) -> Self {
        ImmuneCliError::Score(e)
    }
}

impl From<serde_json::Error> for ImmuneCliError {
    fn from(e: serde_json::Error) -> Self {
        ImmuneCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<ImmuneCliError> for CliError {
    fn from(e: ImmuneCliError) -> Self {
        match e {
            ImmuneCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            ImmuneCliError::Score(ScoreError::InvalidConfig(msg)) => CliError {
                code: "CONFIG_ERROR".to_string(),
                message: msg,
                hint: Some("Check --epochs, --learning-rate and IMMUNE_SCORE_* variables".to_string()),
            },
            ImmuneCliError::Score(e) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: e.to_string(),
                hint: Some(
                    "Records need a YYYY-MM-DD date and non-negative metrics".to_string(),
                ),
            },
            ImmuneCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            ImmuneCliError::NoRecords => CliError {
                code: "NO_RECORDS".to_string(),
                message: "No daily records found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            ImmuneCliError::NoScoredRecords => CliError {
                code: "NO_SCORED_RECORDS".to_string(),
                message: "No records carry an immune_score to train on".to_string(),
                hint: Some("Run 'immune rescore' or add immune_score values".to_string()),
            },
            ImmuneCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(serde::Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(serde::Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
