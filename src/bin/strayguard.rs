//! Strayguard CLI - Command-line interface for the severity engine
//!
//! Commands:
//! - score: Score a batch of detection records (batch mode)
//! - run: Score NDJSON records from stdin as they arrive (streaming mode)
//! - validate: Report records the normalizer would repair or drop
//! - doctor: Diagnose configuration and environment
//! - schema: Print input and output schemas

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, BufRead, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use strayguard::config::ENV_PREFIX;
use strayguard::filter::{tail, EventFilter};
use strayguard::schema::{RecordAdapter, SCHEMA_VERSION};
use strayguard::{
    events_to_csv, events_to_ndjson, DetectionEvent, EngineConfig, EngineError, ReportEncoder,
    Severity, SeverityEngine, StreamingEngine, PRODUCER_NAME, REPORT_VERSION, STRAYGUARD_VERSION,
};

/// Environment variable holding the log filter directive
const LOG_ENV: &str = "STRAYGUARD_LOG";

/// Strayguard - Severity scoring for stray-animal detection events
#[derive(Parser)]
#[command(name = "strayguard")]
#[command(version = STRAYGUARD_VERSION)]
#[command(about = "Score camera detections by operational urgency", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Score a batch of detection records (batch mode)
    Score {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Input format
        #[arg(long, default_value = "csv")]
        input_format: InputFormat,

        /// Output format
        #[arg(long, default_value = "ndjson")]
        output_format: OutputFormat,

        #[command(flatten)]
        engine: EngineArgs,

        /// Only keep events from this camera
        #[arg(long)]
        camera: Option<String>,

        /// Only keep events from this location
        #[arg(long)]
        location: Option<String>,

        /// Only keep events with this severity
        #[arg(long)]
        severity: Option<SeverityArg>,

        /// Only keep the last N events after filtering
        #[arg(long)]
        tail: Option<usize>,
    },

    /// Score NDJSON records from stdin as they arrive (streaming mode)
    Run {
        #[command(flatten)]
        engine: EngineArgs,

        /// Buffer output instead of flushing after each record
        #[arg(long)]
        no_flush: bool,
    },

    /// Report records the normalizer would repair or drop
    Validate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "csv")]
        input_format: InputFormat,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose configuration and environment
    Doctor {
        /// Configuration file to check
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print schema information
    Schema {
        /// Schema to print (input or output)
        #[arg(value_enum)]
        schema_type: SchemaType,

        /// Output as JSON schema
        #[arg(long)]
        json_schema: bool,
    },
}

/// Engine configuration flags shared by scoring commands
#[derive(clap::Args)]
struct EngineArgs {
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Rolling window length in seconds
    #[arg(long)]
    window_sec: Option<f64>,

    /// Event count at which the rate saturates
    #[arg(long)]
    saturation_count: Option<u32>,
}

impl EngineArgs {
    fn load(&self) -> Result<EngineConfig, StrayguardCliError> {
        let mut config = EngineConfig::load(self.config.as_deref())?;
        if let Some(window_sec) = self.window_sec {
            config.window.window_sec = window_sec;
        }
        if let Some(saturation_count) = self.saturation_count {
            config.window.saturation_count = saturation_count;
        }
        Ok(config)
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum InputFormat {
    /// Comma-separated values with a header row
    Csv,
    /// JSON array of records
    Json,
    /// Newline-delimited JSON (one record per line)
    Ndjson,
}

impl From<InputFormat> for strayguard::InputFormat {
    fn from(format: InputFormat) -> Self {
        match format {
            InputFormat::Csv => strayguard::InputFormat::Csv,
            InputFormat::Json => strayguard::InputFormat::Json,
            InputFormat::Ndjson => strayguard::InputFormat::Ndjson,
        }
    }
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Newline-delimited JSON (one event per line)
    Ndjson,
    /// JSON array of events
    Json,
    /// Pretty-printed JSON array of events
    JsonPretty,
    /// CSV with a header row
    Csv,
    /// Report envelope with summary and latest alert
    Report,
}

#[derive(Clone, Copy, ValueEnum)]
enum SeverityArg {
    High,
    Med,
    Low,
}

impl From<SeverityArg> for Severity {
    fn from(severity: SeverityArg) -> Self {
        match severity {
            SeverityArg::High => Severity::High,
            SeverityArg::Med => Severity::Med,
            SeverityArg::Low => Severity::Low,
        }
    }
}

#[derive(Clone, ValueEnum)]
enum SchemaType {
    /// Input schema (detection.raw_record.v1)
    Input,
    /// Output schema (scored detection event)
    Output,
}

fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let body = serde_json::to_string(&CliError::from(e))
                .unwrap_or_else(|_| "Unknown error".to_string());
            eprintln!("{body}");
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr so stdout stays machine-readable
fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<(), StrayguardCliError> {
    match cli.command {
        Commands::Score {
            input,
            output,
            input_format,
            output_format,
            engine,
            camera,
            location,
            severity,
            tail,
        } => {
            let filter = EventFilter {
                camera_id: camera,
                location,
                severity: severity.map(Severity::from),
            };
            cmd_score(
                &input,
                &output,
                input_format,
                output_format,
                &engine,
                &filter,
                tail,
            )
        }

        Commands::Run { engine, no_flush } => cmd_run(&engine, !no_flush),

        Commands::Validate {
            input,
            input_format,
            json,
        } => cmd_validate(&input, input_format, json),

        Commands::Doctor { config, json } => cmd_doctor(config.as_deref(), json),

        Commands::Schema {
            schema_type,
            json_schema,
        } => cmd_schema(schema_type, json_schema),
    }
}

fn cmd_score(
    input: &Path,
    output: &Path,
    input_format: InputFormat,
    output_format: OutputFormat,
    engine_args: &EngineArgs,
    filter: &EventFilter,
    tail_count: Option<usize>,
) -> Result<(), StrayguardCliError> {
    let config = engine_args.load()?;
    let engine = SeverityEngine::new(config)?;

    let input_data = read_input(input)?;
    let records = RecordAdapter::parse(&input_data, input_format.into())?;
    if records.is_empty() {
        return Err(StrayguardCliError::NoRecords);
    }

    // Rates use every camera event; filters only narrow what is written
    let scored = engine.score(&records);
    let mut events = filter.apply(scored);
    if let Some(n) = tail_count {
        events = tail(&events, n).to_vec();
    }
    if events.is_empty() {
        warn!("no events to write");
    }

    let output_data = format_output(&events, &output_format, engine.config())?;
    write_output(output, &output_data)
}

fn cmd_run(engine_args: &EngineArgs, flush: bool) -> Result<(), StrayguardCliError> {
    let config = engine_args.load()?;
    let mut engine = StreamingEngine::new(&config)?;

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut scored = 0usize;
    let mut skipped = 0usize;

    for line in stdin.lock().lines() {
        let line = line?;
        let trimmed = line.trim();

        if trimmed.is_empty() {
            continue;
        }

        let record = RecordAdapter::parse_line(trimmed).map_err(|e| {
            StrayguardCliError::ParseError(format!("Failed to parse record: {}", e))
        })?;

        let event = match engine.push(&record) {
            Ok(Some(event)) => event,
            Ok(None) => {
                skipped += 1;
                continue;
            }
            Err(EngineError::OutOfOrder { camera_id, detail }) => {
                warn!(camera_id = %camera_id, %detail, "skipping out-of-order record");
                skipped += 1;
                continue;
            }
            Err(e) => return Err(e.into()),
        };

        writeln!(stdout, "{}", serde_json::to_string(&event)?)?;
        if flush {
            stdout.flush()?;
        }
        scored += 1;
    }

    stdout.flush()?;
    info!(scored, skipped, "stream closed");
    Ok(())
}

fn cmd_validate(
    input: &Path,
    input_format: InputFormat,
    json: bool,
) -> Result<(), StrayguardCliError> {
    let input_data = read_input(input)?;
    let records = RecordAdapter::parse(&input_data, input_format.into())?;
    let results = RecordAdapter::validate_records(&records);

    let dropped = results.iter().filter(|r| r.dropped()).count();
    let report = ValidationReport {
        schema_version: SCHEMA_VERSION.to_string(),
        total_records: records.len(),
        retained_records: records.len() - dropped,
        dropped_records: dropped,
        records_with_issues: results.len(),
        issues: results
            .iter()
            .map(|r| ValidationIssueDetail {
                index: r.index,
                camera_id: r.camera_id.clone(),
                dropped: r.dropped(),
                issues: r.issues.iter().map(|i| i.to_string()).collect(),
            })
            .collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Total records:    {}", report.total_records);
        println!("Retained records: {}", report.retained_records);
        println!("Dropped records:  {}", report.dropped_records);

        if !report.issues.is_empty() {
            println!("\nIssues:");
            for detail in &report.issues {
                let marker = if detail.dropped { "[DROP]" } else { "[FIX]" };
                println!(
                    "  {} Record {} (camera {}): {}",
                    marker,
                    detail.index,
                    detail.camera_id.as_deref().unwrap_or("unknown"),
                    detail.issues.join("; ")
                );
            }
        }
    }

    if report.dropped_records > 0 {
        Err(StrayguardCliError::ValidationFailed(report.dropped_records))
    } else {
        Ok(())
    }
}

fn cmd_doctor(config_path: Option<&Path>, json: bool) -> Result<(), StrayguardCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "strayguard_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Strayguard version {}", STRAYGUARD_VERSION),
    });

    checks.push(DoctorCheck {
        name: "schema_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Input schema: {}", SCHEMA_VERSION),
    });

    // Loading covers defaults, the file, and STRAYGUARD_* overrides
    let config_check = match EngineConfig::load(config_path) {
        Ok(config) => match SeverityEngine::new(config) {
            Ok(engine) => {
                let window = &engine.config().window;
                let thresholds = &engine.config().thresholds;
                DoctorCheck {
                    name: "config".to_string(),
                    status: CheckStatus::Ok,
                    message: format!(
                        "window {}s, saturation {}, thresholds HIGH >= {} MED >= {}",
                        window.window_sec, window.saturation_count, thresholds.high, thresholds.med
                    ),
                }
            }
            Err(e) => DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Error,
                message: e.to_string(),
            },
        },
        Err(e) => DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Error,
            message: e.to_string(),
        },
    };
    checks.push(config_check);

    let overrides: Vec<String> = std::env::vars()
        .map(|(key, _)| key)
        .filter(|key| key.starts_with(ENV_PREFIX) && key != LOG_ENV)
        .collect();
    checks.push(DoctorCheck {
        name: "env_overrides".to_string(),
        status: CheckStatus::Ok,
        message: if overrides.is_empty() {
            "No environment overrides".to_string()
        } else {
            format!("Environment overrides: {}", overrides.join(", "))
        },
    });

    let log_check = match std::env::var(LOG_ENV) {
        Ok(directive) => match EnvFilter::try_new(&directive) {
            Ok(_) => DoctorCheck {
                name: "log_filter".to_string(),
                status: CheckStatus::Ok,
                message: format!("{} = {}", LOG_ENV, directive),
            },
            Err(e) => DoctorCheck {
                name: "log_filter".to_string(),
                status: CheckStatus::Warning,
                message: format!("Invalid {} directive, using warn: {}", LOG_ENV, e),
            },
        },
        Err(_) => DoctorCheck {
            name: "log_filter".to_string(),
            status: CheckStatus::Ok,
            message: format!("{} unset, logging warnings only", LOG_ENV),
        },
    };
    checks.push(log_check);

    // Check stdin is available (for streaming mode)
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
            message: "stdin is a pipe (streaming mode ready)".to_string(),
        }
    };
    checks.push(stdin_check);

    let report = DoctorReport {
        producer: PRODUCER_NAME.to_string(),
        version: STRAYGUARD_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Strayguard Doctor Report");
        println!("========================");
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
        Err(StrayguardCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn cmd_schema(schema_type: SchemaType, json_schema: bool) -> Result<(), StrayguardCliError> {
    match schema_type {
        SchemaType::Input => {
            if json_schema {
                println!("{}", input_json_schema());
            } else {
                println!("Input Schema: {}", SCHEMA_VERSION);
                println!();
                println!("One record per detection, as CSV rows, a JSON array, or NDJSON lines:");
                println!();
                println!("- timestamp: required; records without a parseable one are dropped");
                println!("  (RFC 3339, YYYY-MM-DD HH:MM:SS, YYYY/MM/DD HH:MM:SS, YYYY-MM-DD,");
                println!("  or Unix epoch seconds; naive times are UTC)");
                println!("- camera_id: text, default \"unknown\"");
                println!("- location: text, default \"unknown\"");
                println!("- class: text, default \"dog\"");
                println!("- confidence: number in [0, 1], default 0.0, clamped");
                println!("- dog_count: non-negative integer, default 1");
                println!("- image_url, image_path: optional, passed through");
                println!();
                println!("Other columns are ignored.");
            }
        }
        SchemaType::Output => {
            if json_schema {
                println!("{}", output_json_schema());
            } else {
                println!("Output Schema: scored detection event");
                println!();
                println!("Every input field (normalized), plus:");
                println!();
                println!("- event_rate: recent per-camera event rate in [0, 1]");
                println!("- severity: HIGH, MED, or LOW");
                println!("- risk_score: continuous score behind the label");
                println!();
                println!("The report format ({}) wraps events with:", REPORT_VERSION);
                println!("- producer: {{ name, version, instance_id }}");
                println!("- window: {{ window_sec, saturation_count }}");
                println!(
                    "- summary: {{ totals, unique cameras and locations, \
                     hourly counts, severity counts }}"
                );
                println!("- alert: latest scored event with a display message");
            }
        }
    }

    Ok(())
}

// Helper functions

fn read_input(input: &Path) -> Result<String, StrayguardCliError> {
    if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn write_output(output: &Path, data: &str) -> Result<(), StrayguardCliError> {
    if output.to_string_lossy() == "-" {
        print!("{}", data);
        io::stdout().flush()?;
    } else {
        fs::write(output, data)?;
    }
    Ok(())
}

fn format_output(
    events: &[DetectionEvent],
    format: &OutputFormat,
    config: &EngineConfig,
) -> Result<String, StrayguardCliError> {
    match format {
        OutputFormat::Ndjson => Ok(events_to_ndjson(events)?),
        OutputFormat::Json => Ok(serde_json::to_string(events)? + "\n"),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(events)? + "\n"),
        OutputFormat::Csv => Ok(events_to_csv(events)?),
        OutputFormat::Report => Ok(ReportEncoder::new().encode_to_json(events, config)? + "\n"),
    }
}

fn input_json_schema() -> String {
    serde_json::json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": SCHEMA_VERSION,
        "description": "Raw camera detection record",
        "type": "object",
        "required": ["timestamp"],
        "properties": {
            "timestamp": { "type": ["string", "number"] },
            "camera_id": { "type": "string" },
            "location": { "type": "string" },
            "class": { "type": "string" },
            "confidence": { "type": ["number", "string"], "minimum": 0, "maximum": 1 },
            "dog_count": { "type": ["integer", "string"], "minimum": 0 },
            "image_url": { "type": "string" },
            "image_path": { "type": "string" }
        }
    })
    .to_string()
}

fn output_json_schema() -> String {
    serde_json::json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "title": "scored detection event",
        "description": "Detection event annotated with rate, severity, and risk score",
        "type": "object",
        "required": [
            "timestamp", "camera_id", "location", "class", "confidence", "dog_count",
            "event_rate", "severity", "risk_score"
        ],
        "properties": {
            "timestamp": { "type": "string", "format": "date-time" },
            "camera_id": { "type": "string" },
            "location": { "type": "string" },
            "class": { "type": "string" },
            "confidence": { "type": "number", "minimum": 0, "maximum": 1 },
            "dog_count": { "type": "integer", "minimum": 0 },
            "image_url": { "type": ["string", "null"] },
            "image_path": { "type": ["string", "null"] },
            "event_rate": { "type": "number", "minimum": 0, "maximum": 1 },
            "severity": { "type": "string", "enum": ["HIGH", "MED", "LOW"] },
            "risk_score": { "type": "number", "minimum": 0, "maximum": 1 }
        }
    })
    .to_string()
}

// Error types

#[derive(Debug)]
enum StrayguardCliError {
    Io(io::Error),
    Engine(EngineError),
    Json(serde_json::Error),
    NoRecords,
    ValidationFailed(usize),
    DoctorFailed,
    ParseError(String),
}

impl From<io::Error> for StrayguardCliError {
    fn from(e: io::Error) -> Self {
        StrayguardCliError::Io(e)
    }
}

impl From<EngineError> for StrayguardCliError {
    fn from(e: EngineError) -> Self {
        StrayguardCliError::Engine(e)
    }
}

impl From<serde_json::Error> for StrayguardCliError {
    fn from(e: serde_json::Error) -> Self {
        StrayguardCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<StrayguardCliError> for CliError {
    fn from(e: StrayguardCliError) -> Self {
        match e {
            StrayguardCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            StrayguardCliError::Engine(EngineError::InvalidConfig(msg)) => CliError {
                code: "CONFIG_ERROR".to_string(),
                message: msg,
                hint: Some("Run 'strayguard doctor --config <file>' for details".to_string()),
            },
            StrayguardCliError::Engine(e) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: e.to_string(),
                hint: Some(format!("Ensure input matches the {} schema", SCHEMA_VERSION)),
            },
            StrayguardCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            StrayguardCliError::NoRecords => CliError {
                code: "NO_RECORDS".to_string(),
                message: "No records found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            StrayguardCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} records would be dropped", count),
                hint: Some("Fix the timestamps of dropped records and retry".to_string()),
            },
            StrayguardCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
            StrayguardCliError::ParseError(msg) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: msg,
                hint: Some("Each line must be one JSON object".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct ValidationReport {
    schema_version: String,
    total_records: usize,
    retained_records: usize,
    dropped_records: usize,
    records_with_issues: usize,
    issues: Vec<ValidationIssueDetail>,
}

#[derive(serde::Serialize)]
struct ValidationIssueDetail {
    index: usize,
    camera_id: Option<String>,
    dropped: bool,
    issues: Vec<String>,
}

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
