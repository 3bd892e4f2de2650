//! Pulse CLI - Command-line interface for Habit Pulse
//!
//! Commands:
//! - score / average / calendar: daily scores and period averages
//! - streaks / habit / summary: user and per-habit streaks
//! - due: habits due on a date
//! - validate: validate a habit.snapshot.v1 document
//! - doctor: diagnose configuration and input health

use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use habit_pulse::store::parse_progress_ndjson;
use habit_pulse::{
    format_day, parse_day, DailyScore, EngineConfig, EngineError, HabitEngine, HabitId,
    HabitStreak, HabitSummary, InMemoryStore, PeriodAverage, Snapshot, StreakResult,
    PRODUCER_NAME, PULSE_VERSION, SCHEMA_VERSION,
};

/// Pulse - habit recurrence, progress and streak engine
#[derive(Parser)]
#[command(name = "pulse")]
#[command(version = PULSE_VERSION)]
#[command(about = "Compute habit scores and streaks from a snapshot", long_about = None)]
struct Cli {
    /// Engine configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, global = true, default_value = "json")]
    output_format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct SnapshotArgs {
    /// Snapshot file path (use - for stdin)
    #[arg(short, long)]
    input: PathBuf,

    /// Additional progress records as NDJSON
    #[arg(long)]
    progress: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Daily completion score of an owner
    Score {
        #[command(flatten)]
        snapshot: SnapshotArgs,

        #[arg(long)]
        owner: String,

        /// Calendar day (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date: Option<String>,
    },

    /// Average completion over an inclusive date range
    Average {
        #[command(flatten)]
        snapshot: SnapshotArgs,

        #[arg(long)]
        owner: String,

        #[arg(long)]
        start: String,

        #[arg(long)]
        end: String,
    },

    /// Daily scores for every date of a range
    Calendar {
        #[command(flatten)]
        snapshot: SnapshotArgs,

        #[arg(long)]
        owner: String,

        #[arg(long)]
        start: String,

        #[arg(long)]
        end: String,
    },

    /// Current and longest streak across all of an owner's habits
    Streaks {
        #[command(flatten)]
        snapshot: SnapshotArgs,

        #[arg(long)]
        owner: String,

        /// Calendar day (YYYY-MM-DD), defaults to today
        #[arg(long)]
        today: Option<String>,
    },

    /// Streak shown for one habit
    Habit {
        #[command(flatten)]
        snapshot: SnapshotArgs,

        #[arg(long)]
        owner: String,

        /// Habit name
        #[arg(long)]
        name: String,

        /// Calendar day (YYYY-MM-DD), defaults to today
        #[arg(long)]
        today: Option<String>,

        /// Raw value about to be logged for today
        #[arg(long)]
        log: Option<f64>,
    },

    /// Completion statistics of one habit over a range
    Summary {
        #[command(flatten)]
        snapshot: SnapshotArgs,

        #[arg(long)]
        owner: String,

        /// Habit name
        #[arg(long)]
        name: String,

        #[arg(long)]
        start: String,

        #[arg(long)]
        end: String,

        /// Calendar day (YYYY-MM-DD), defaults to today
        #[arg(long)]
        today: Option<String>,
    },

    /// Habits due on a date
    Due {
        #[command(flatten)]
        snapshot: SnapshotArgs,

        #[arg(long)]
        owner: String,

        /// Calendar day (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date: Option<String>,
    },

    /// Validate a snapshot
    Validate {
        #[command(flatten)]
        snapshot: SnapshotArgs,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose configuration and input health
    Doctor {
        /// Check a snapshot file
        #[arg(long)]
        snapshot: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Compact JSON
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
            let error = CliError::from(e);
            eprintln!(
                "{}",
                serde_json::to_string(&error).unwrap_or_else(|_| "Unknown error".to_string())
            );
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("habit_pulse=warn")),
        )
        .with_writer(io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<(), PulseCliError> {
    let format = cli.output_format;
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Score {
            snapshot,
            owner,
            date,
        } => {
            let engine = open_engine(&snapshot, config)?;
            let score: DailyScore = engine.daily_score(&owner, day_or_today(date.as_deref())?)?;
            emit(&score, &format)
        }
        Commands::Average {
            snapshot,
            owner,
            start,
            end,
        } => {
            let engine = open_engine(&snapshot, config)?;
            let (start, end) = (parse_day(&start)?, parse_day(&end)?);
            let average = engine.period_average(&owner, start, end)?;
            emit(
                &PeriodAverage {
                    owner_id: owner,
                    start,
                    end,
                    average,
                },
                &format,
            )
        }
        Commands::Calendar {
            snapshot,
            owner,
            start,
            end,
        } => {
            let engine = open_engine(&snapshot, config)?;
            let scores = engine.period_scores(&owner, parse_day(&start)?, parse_day(&end)?)?;
            emit(&scores, &format)
        }
        Commands::Streaks {
            snapshot,
            owner,
            today,
        } => {
            let engine = open_engine(&snapshot, config)?;
            let today = day_or_today(today.as_deref())?;
            let result: StreakResult = engine.user_streaks(&owner, today)?;
            emit(&result, &format)
        }
        Commands::Habit {
            snapshot,
            owner,
            name,
            today,
            log,
        } => {
            let engine = open_engine(&snapshot, config)?;
            let habit_id = HabitId::new(owner, name);
            let date = day_or_today(today.as_deref())?;
            let streak = match log {
                Some(raw) => engine.habit_streak_after_update(&habit_id, date, raw)?,
                None => engine.habit_streak(&habit_id, date)?,
            };
            emit(
                &HabitStreak {
                    habit_id,
                    date,
                    streak,
                },
                &format,
            )
        }
        Commands::Summary {
            snapshot,
            owner,
            name,
            start,
            end,
            today,
        } => {
            let engine = open_engine(&snapshot, config)?;
            let summary: HabitSummary = engine.habit_summary(
                &HabitId::new(owner, name),
                parse_day(&start)?,
                parse_day(&end)?,
                day_or_today(today.as_deref())?,
            )?;
            emit(&summary, &format)
        }
        Commands::Due {
            snapshot,
            owner,
            date,
        } => {
            let engine = open_engine(&snapshot, config)?;
            let habits = engine.due_habits(&owner, day_or_today(date.as_deref())?)?;
            emit(&habits, &format)
        }
        Commands::Validate { snapshot, json } => cmd_validate(&snapshot, json),
        Commands::Doctor { snapshot, json } => {
            cmd_doctor(cli.config.as_deref(), snapshot.as_deref(), json)
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig, PulseCliError> {
    match path {
        Some(path) => Ok(EngineConfig::load(path)?),
        None => Ok(EngineConfig::default()),
    }
}

fn day_or_today(input: Option<&str>) -> Result<NaiveDate, PulseCliError> {
    match input {
        Some(day) => Ok(parse_day(day)?),
        None => Ok(Local::now().date_naive()),
    }
}

fn read_input(path: &Path) -> Result<String, PulseCliError> {
    if path.to_string_lossy() == "-" {
        if atty::is(atty::Stream::Stdin) {
            return Err(PulseCliError::StdinIsTty);
        }
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(path)?)
    }
}

/// Parse the snapshot and any extra NDJSON progress, without validating
fn read_snapshot(args: &SnapshotArgs) -> Result<Snapshot, PulseCliError> {
    let mut snapshot: Snapshot = serde_json::from_str(&read_input(&args.input)?)?;
    if let Some(progress) = &args.progress {
        snapshot
            .progress
            .extend(parse_progress_ndjson(&read_input(progress)?)?);
    }
    Ok(snapshot)
}

fn open_engine(
    args: &SnapshotArgs,
    config: EngineConfig,
) -> Result<HabitEngine<InMemoryStore>, PulseCliError> {
    let store = InMemoryStore::from_snapshot(read_snapshot(args)?)?;
    Ok(HabitEngine::with_config(store, config))
}

fn emit<T: Serialize>(value: &T, format: &OutputFormat) -> Result<(), PulseCliError> {
    let output = match format {
        OutputFormat::Json => serde_json::to_string(value)?,
        OutputFormat::JsonPretty => serde_json::to_string_pretty(value)?,
    };
    println!("{}", output);
    Ok(())
}

fn cmd_validate(args: &SnapshotArgs, json: bool) -> Result<(), PulseCliError> {
    let snapshot = read_snapshot(args)?;
    let error = snapshot.validate().err().map(|e| e.to_string());

    let report = ValidationReport {
        schema_version: snapshot.schema_version.clone(),
        habits: snapshot.habits.len(),
        progress_records: snapshot.progress.len(),
        first_date: snapshot.progress.iter().map(|r| r.date).min().map(format_day),
        last_date: snapshot.progress.iter().map(|r| r.date).max().map(format_day),
        valid: error.is_none(),
        error,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Schema:           {}", report.schema_version);
        println!("Habits:           {}", report.habits);
        println!("Progress records: {}", report.progress_records);
        if let (Some(first), Some(last)) = (&report.first_date, &report.last_date) {
            println!("Dates:            {} .. {}", first, last);
        }
        if let Some(error) = &report.error {
            println!("\nError:\n  - {}", error);
        }
    }

    match report.error {
        Some(message) => Err(PulseCliError::ValidationFailed(message)),
        None => Ok(()),
    }
}

fn cmd_doctor(
    config: Option<&Path>,
    snapshot: Option<&Path>,
    json: bool,
) -> Result<(), PulseCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "pulse_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Pulse version {}", PULSE_VERSION),
    });

    checks.push(DoctorCheck {
        name: "schema_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Snapshot schema: {}", SCHEMA_VERSION),
    });

    checks.push(match config {
        None => DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Ok,
            message: "No config file given, using defaults".to_string(),
        },
        Some(path) if !path.exists() => DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Warning,
            message: format!("{} does not exist, using defaults", path.display()),
        },
        Some(path) => match EngineConfig::load(path) {
            Ok(cfg) => DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Ok,
                message: format!(
                    "lookback_days = {}, max_period_days = {}",
                    cfg.lookback_days, cfg.max_period_days
                ),
            },
            Err(e) => DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Error,
                message: e.to_string(),
            },
        },
    });

    if let Some(path) = snapshot {
        let check = match fs::read_to_string(path) {
            Ok(content) => match Snapshot::from_json(&content) {
                Ok(snapshot) => DoctorCheck {
                    name: "snapshot".to_string(),
                    status: CheckStatus::Ok,
                    message: format!(
                        "Snapshot valid ({} habits, {} progress records)",
                        snapshot.habits.len(),
                        snapshot.progress.len()
                    ),
                },
                Err(e) => DoctorCheck {
                    name: "snapshot".to_string(),
                    status: CheckStatus::Error,
                    message: e.to_string(),
                },
            },
            Err(e) => DoctorCheck {
                name: "snapshot".to_string(),
                status: CheckStatus::Error,
                message: format!("Cannot read snapshot file: {}", e),
            },
        };
        checks.push(check);
    }

    let stdin_check = if atty::is(atty::Stream::Stdin) {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a TTY (pass snapshots with --input <file>)".to_string(),
        }
    } else {
        DoctorCheck {
            name: "stdin".to_string(),
            status: CheckStatus::Ok,
            message: "stdin is a pipe (--input - ready)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: PULSE_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Pulse Doctor Report");
        println!("===================");
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

    let has_errors = report.checks.iter().any(|c| matches!(c.status, CheckStatus::Error));
    if has_errors {
        Err(PulseCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

// Error types

#[derive(Debug)]
enum PulseCliError {
    Io(io::Error),
    Engine(EngineError),
    Json(serde_json::Error),
    StdinIsTty,
    ValidationFailed(String),
    DoctorFailed,
}

impl From<io::Error> for PulseCliError {
    fn from(e: io::Error) -> Self {
        PulseCliError::Io(e)
    }
}

impl From<EngineError> for PulseCliError {
    fn from(e: EngineError) -> Self {
        PulseCliError::Engine(e)
    }
}

impl From<serde_json::Error> for PulseCliError {
    fn from(e: serde_json::Error) -> Self {
        PulseCliError::Json(e)
    }
}

#[derive(Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<PulseCliError> for CliError {
    fn from(e: PulseCliError) -> Self {
        match e {
            PulseCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            PulseCliError::Engine(e) => {
                let (code, hint) = match &e {
                    EngineError::InvalidDate(_) => {
                        ("INVALID_DATE", "Dates use the YYYY-MM-DD format")
                    }
                    EngineError::InvalidDateRange { .. } | EngineError::DateRangeTooLong { .. } => {
                        ("INVALID_RANGE", "Check --start and --end, or raise max_period_days")
                    }
                    EngineError::HabitNotFound(_) => {
                        ("HABIT_NOT_FOUND", "Run 'pulse due' to list habits")
                    }
                    EngineError::Config(_) => {
                        ("CONFIG_ERROR", "Run 'pulse doctor --config <file>'")
                    }
                    EngineError::JsonError(_) => ("JSON_ERROR", "Check JSON syntax"),
                    e if e.is_contract_violation() => {
                        ("CONTRACT_VIOLATION", "Run 'pulse validate' for details")
                    }
                    _ => ("ENGINE_ERROR", "Ensure input matches the habit.snapshot.v1 schema"),
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            PulseCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            PulseCliError::StdinIsTty => CliError {
                code: "STDIN_IS_TTY".to_string(),
                message: "Refusing to read a snapshot from an interactive terminal".to_string(),
                hint: Some("Pipe the snapshot in or pass --input <file>".to_string()),
            },
            PulseCliError::ValidationFailed(message) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message,
                hint: Some("Fix the snapshot and retry".to_string()),
            },
            PulseCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
        }
    }
}

// Report types

#[derive(Serialize)]
struct ValidationReport {
    schema_version: String,
    habits: usize,
    progress_records: usize,
    first_date: Option<String>,
    last_date: Option<String>,
    valid: bool,
    error: Option<String>,
}

#[derive(Serialize)]
struct DoctorReport {
    producer: String,
    version: String,
    checks: Vec<DoctorCheck>,
}

#[derive(Serialize)]
struct DoctorCheck {
    name: String,
    status: CheckStatus,
    message: String,
}

#[derive(Serialize)]
enum CheckStatus {
    Ok,
    Warning,
    Error,
}
