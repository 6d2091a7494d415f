//! Edit Flux CLI - Command-line interface for Edit Flux
//!
//! Commands:
//! - replay: Replay recorded edit events into a session report (batch mode)
//! - run: Consume edit events from stdin (streaming mode)
//! - validate: Validate an edit event stream
//! - doctor: Diagnose configuration and environment

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, BufRead, Read, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

use edit_flux::adapter::EventStreamAdapter;
use edit_flux::encoder::REPORT_VERSION;
use edit_flux::types::{EditEventRecord, SessionReport};
use edit_flux::{EditSession, LedgerConfig, LedgerError, FLUX_VERSION, PRODUCER_NAME};

/// Edit Flux - typed vs. assisted provenance and editing rhythm metrics
#[derive(Parser)]
#[command(name = "edit-flux")]
#[command(author = "Synheart AI Inc")]
#[command(version = FLUX_VERSION)]
#[command(about = "Turn line-level edit events into session reports", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay recorded events into a session report (batch mode)
    Replay {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file path (use - for stdout)
        #[arg(short, long, default_value = "-")]
        output: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output format
        #[arg(long, default_value = "json")]
        output_format: OutputFormat,

        /// Ledger configuration file (JSON)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Consume events from stdin (streaming mode)
    Run {
        /// Print the current metrics after every event
        #[arg(long)]
        emit_every: bool,

        /// Ledger configuration file (JSON)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Validate an event stream
    Validate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Diagnose configuration and environment
    Doctor {
        /// Check a ledger configuration file
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

#[derive(Clone, ValueEnum)]
enum InputFormat {
    /// Newline-delimited JSON (one event per line)
    Ndjson,
    /// JSON array of events
    Json,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// Compact JSON
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

#[derive(Clone, ValueEnum)]
enum SchemaType {
    /// Input schema (edit event record)
    Input,
    /// Output schema (session report)
    Output,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

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

fn run(cli: Cli) -> Result<(), FluxCliError> {
    match cli.command {
        Commands::Replay {
            input,
            output,
            input_format,
            output_format,
            config,
        } => cmd_replay(
            &input,
            &output,
            input_format,
            output_format,
            config.as_deref(),
        ),

        Commands::Run { emit_every, config } => cmd_run(emit_every, config.as_deref()),

        Commands::Validate { input, json } => cmd_validate(&input, json),

        Commands::Doctor { config, json } => cmd_doctor(config.as_deref(), json),

        Commands::Schema {
            schema_type,
            json_schema,
        } => cmd_schema(schema_type, json_schema),
    }
}

fn cmd_replay(
    input: &Path,
    output: &Path,
    input_format: InputFormat,
    output_format: OutputFormat,
    config: Option<&Path>,
) -> Result<(), FluxCliError> {
    let config = load_config(config)?;
    let input_data = read_input(input)?;

    let records = match input_format {
        InputFormat::Ndjson => EventStreamAdapter::parse_ndjson(&input_data)?,
        InputFormat::Json => EventStreamAdapter::parse_array(&input_data)?,
    };

    if records.is_empty() {
        return Err(FluxCliError::NoEvents);
    }

    let mut session = EditSession::with_config(config)?;
    for record in records {
        session.consume_record(record)?;
    }

    let output_data = format_output(&session.finish(), &output_format)?;

    if output.to_string_lossy() == "-" {
        println!("{}", output_data);
    } else {
        fs::write(output, output_data)?;
    }

    Ok(())
}

fn cmd_run(emit_every: bool, config: Option<&Path>) -> Result<(), FluxCliError> {
    let mut session = EditSession::with_config(load_config(config)?)?;

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for (line_num, line) in stdin.lock().lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();

        if trimmed.is_empty() {
            continue;
        }

        let record: EditEventRecord = serde_json::from_str(trimmed).map_err(|e| {
            FluxCliError::ParseError(format!("Failed to parse line {}: {}", line_num + 1, e))
        })?;

        session.consume_record(record)?;

        if emit_every {
            writeln!(stdout, "{}", serde_json::to_string(&session.metrics())?)?;
            stdout.flush()?;
        }
    }

    writeln!(stdout, "{}", serde_json::to_string(&session.finish())?)?;
    stdout.flush()?;

    Ok(())
}

fn cmd_validate(input: &Path, json: bool) -> Result<(), FluxCliError> {
    let input_data = read_input(input)?;
    let records = EventStreamAdapter::parse(&input_data)?;

    let results = EventStreamAdapter::validate_records(&records);

    let mut invalid_indices: Vec<usize> = results.iter().map(|r| r.index).collect();
    invalid_indices.dedup();

    let report = ValidationReport {
        total_events: records.len(),
        valid_events: records.len() - invalid_indices.len(),
        invalid_events: invalid_indices.len(),
        errors: results
            .iter()
            .map(|r| ValidationErrorDetail {
                index: r.index,
                line: r.line,
                error: r.error.to_string(),
            })
            .collect(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Validation Report");
        println!("=================");
        println!("Total events:   {}", report.total_events);
        println!("Valid events:   {}", report.valid_events);
        println!("Invalid events: {}", report.invalid_events);

        if !report.errors.is_empty() {
            println!("\nErrors:");
            for err in &report.errors {
                println!(
                    "  - Event {} (line {}): {}",
                    err.index, err.line, err.error
                );
            }
        }
    }

    if report.invalid_events > 0 {
        Err(FluxCliError::ValidationFailed(report.invalid_events))
    } else {
        Ok(())
    }
}

fn cmd_doctor(config: Option<&Path>, json: bool) -> Result<(), FluxCliError> {
    let mut checks: Vec<DoctorCheck> = Vec::new();

    checks.push(DoctorCheck {
        name: "flux_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Edit Flux version {}", FLUX_VERSION),
    });

    checks.push(DoctorCheck {
        name: "report_version".to_string(),
        status: CheckStatus::Ok,
        message: format!("Report schema: {}", REPORT_VERSION),
    });

    let config_check = match config {
        Some(path) if !path.exists() => DoctorCheck {
            name: "config".to_string(),
            status: CheckStatus::Warning,
            message: "Config file does not exist".to_string(),
        },
        Some(path) => match LedgerConfig::load(path) {
            Ok(loaded) => DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Ok,
                message: describe_config("Config file valid", &loaded),
            },
            Err(e) => DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Error,
                message: e.to_string(),
            },
        },
        None => match LedgerConfig::from_env() {
            Ok(loaded) => DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Ok,
                message: describe_config("Using defaults", &loaded),
            },
            Err(e) => DoctorCheck {
                name: "config".to_string(),
                status: CheckStatus::Error,
                message: e.to_string(),
            },
        },
    };
    checks.push(config_check);

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
        version: FLUX_VERSION.to_string(),
        checks,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("Edit Flux Doctor Report");
        println!("=======================");
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
        Err(FluxCliError::DoctorFailed)
    } else {
        Ok(())
    }
}

fn cmd_schema(schema_type: SchemaType, json_schema: bool) -> Result<(), FluxCliError> {
    match schema_type {
        SchemaType::Input => {
            if json_schema {
                println!("{}", get_input_json_schema());
            } else {
                println!("Input Schema: edit event record");
                println!();
                println!("One JSON object per event (NDJSON) or a JSON array of them:");
                println!();
                println!("- line: Zero-based line position the event targets");
                println!("- kind: add | delete | modify | initialise");
                println!("- timestamp: RFC 3339 time the event was observed");
                println!("- content: New line content (full document for initialise)");
                println!("- assisted: true when the text was pasted or completed");
            }
        }
        SchemaType::Output => {
            if json_schema {
                println!("{}", get_output_json_schema());
            } else {
                println!("Output Schema: session report {}", REPORT_VERSION);
                println!();
                println!("- report_version: Schema version");
                println!("- producer: {{ name, version, instance_id }}");
                println!("- session_id, started_at_utc, computed_at_utc");
                println!("- snapshot:");
                println!("  - content: Current document text");
                println!("  - lines: [{{ content, single_characters_entered, number_of_assisted_characters, event_count }}]");
                println!("  - events: Every consumed event, in order");
                println!("  - assisted_insertions: Sizes of assisted insertions");
                println!("  - metrics: {{ assisted_text_percentage, time_distribution, time_breakdown,");
                println!("               coefficient_of_variation, fano_factor, events_per_bucket }}");
            }
        }
    }

    Ok(())
}

// Helper functions

fn read_input(input: &Path) -> Result<String, FluxCliError> {
    if input.to_string_lossy() == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        Ok(buffer)
    } else {
        Ok(fs::read_to_string(input)?)
    }
}

fn load_config(path: Option<&Path>) -> Result<LedgerConfig, FluxCliError> {
    let config = match path {
        Some(path) => LedgerConfig::load(path)?,
        None => LedgerConfig::from_env()?,
    };
    tracing::debug!(?config, "ledger config loaded");
    Ok(config)
}

fn describe_config(prefix: &str, config: &LedgerConfig) -> String {
    format!(
        "{} (cache > {} chars, thinking {} ms, idle {} ms, bucket {} ms)",
        prefix,
        config.cache_min_content_length,
        config.thinking_threshold_ms,
        config.idle_threshold_ms,
        config.bucket_width_ms
    )
}

fn format_output(report: &SessionReport, format: &OutputFormat) -> Result<String, FluxCliError> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string(report)?),
        OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(report)?),
    }
}

fn get_input_json_schema() -> String {
    serde_json::json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "$id": "https://synheart.ai/schemas/edit.event.v1.json",
        "title": "edit.event.v1",
        "description": "Line-level edit event",
        "type": "object",
        "required": ["line", "kind", "timestamp"],
        "properties": {
            "line": { "type": "integer", "minimum": 0 },
            "kind": {
                "type": "string",
                "enum": ["add", "delete", "modify", "initialise"]
            },
            "timestamp": { "type": "string", "format": "date-time" },
            "content": { "type": "string", "default": "" },
            "assisted": { "type": "boolean", "default": false }
        }
    })
    .to_string()
}

fn get_output_json_schema() -> String {
    serde_json::json!({
        "$schema": "https://json-schema.org/draft/2020-12/schema",
        "$id": "https://synheart.ai/schemas/edit.session_report.v1.json",
        "title": "edit.session_report.v1",
        "description": "Edit session report",
        "type": "object",
        "required": ["report_version", "producer", "session_id", "snapshot"],
        "properties": {
            "report_version": { "type": "string" },
            "producer": {
                "type": "object",
                "properties": {
                    "name": { "type": "string" },
                    "version": { "type": "string" },
                    "instance_id": { "type": "string" }
                }
            },
            "session_id": { "type": "string" },
            "started_at_utc": { "type": "string" },
            "computed_at_utc": { "type": "string" },
            "snapshot": {
                "type": "object",
                "properties": {
                    "content": { "type": "string" },
                    "lines": { "type": "array", "items": { "type": "object" } },
                    "events": { "type": "array", "items": { "type": "object" } },
                    "assisted_insertions": { "type": "array", "items": { "type": "integer" } },
                    "metrics": {
                        "type": "object",
                        "properties": {
                            "assisted_text_percentage": { "type": "number" },
                            "time_distribution": { "type": "object" },
                            "time_breakdown": { "type": "object" },
                            "coefficient_of_variation": { "type": "number" },
                            "fano_factor": { "type": ["number", "null"] },
                            "events_per_bucket": { "type": "array", "items": { "type": "integer" } }
                        }
                    }
                }
            }
        }
    })
    .to_string()
}

// Error types

#[derive(Debug)]
enum FluxCliError {
    Io(io::Error),
    Ledger(LedgerError),
    Json(serde_json::Error),
    NoEvents,
    ValidationFailed(usize),
    DoctorFailed,
    ParseError(String),
}

impl From<io::Error> for FluxCliError {
    fn from(e: io::Error) -> Self {
        FluxCliError::Io(e)
    }
}

impl From<LedgerError> for FluxCliError {
    fn from(e: LedgerError) -> Self {
        FluxCliError::Ledger(e)
    }
}

impl From<serde_json::Error> for FluxCliError {
    fn from(e: serde_json::Error) -> Self {
        FluxCliError::Json(e)
    }
}

#[derive(serde::Serialize)]
struct CliError {
    code: String,
    message: String,
    hint: Option<String>,
}

impl From<FluxCliError> for CliError {
    fn from(e: FluxCliError) -> Self {
        match e {
            FluxCliError::Io(e) => CliError {
                code: "IO_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check file paths and permissions".to_string()),
            },
            FluxCliError::Ledger(e) => {
                let (code, hint) = match &e {
                    LedgerError::LineNotFound { .. } => (
                        "LINE_NOT_FOUND",
                        "The stream modifies a line that does not exist; is an initialise event missing?",
                    ),
                    LedgerError::InvalidEventKind(_) => (
                        "INVALID_EVENT_KIND",
                        "Run 'edit-flux validate' for details",
                    ),
                    LedgerError::InvalidConfig(_) => (
                        "INVALID_CONFIG",
                        "Run 'edit-flux doctor --config <path>' for details",
                    ),
                    _ => ("PARSE_ERROR", "Ensure input matches 'edit-flux schema input'"),
                };
                CliError {
                    code: code.to_string(),
                    message: e.to_string(),
                    hint: Some(hint.to_string()),
                }
            }
            FluxCliError::Json(e) => CliError {
                code: "JSON_ERROR".to_string(),
                message: e.to_string(),
                hint: Some("Check JSON syntax".to_string()),
            },
            FluxCliError::NoEvents => CliError {
                code: "NO_EVENTS".to_string(),
                message: "No events found in input".to_string(),
                hint: Some("Ensure input file is not empty".to_string()),
            },
            FluxCliError::ValidationFailed(count) => CliError {
                code: "VALIDATION_FAILED".to_string(),
                message: format!("{} events failed validation", count),
                hint: Some("Fix validation errors and retry".to_string()),
            },
            FluxCliError::DoctorFailed => CliError {
                code: "DOCTOR_FAILED".to_string(),
                message: "One or more health checks failed".to_string(),
                hint: Some("Review the doctor report for details".to_string()),
            },
            FluxCliError::ParseError(msg) => CliError {
                code: "PARSE_ERROR".to_string(),
                message: msg,
                hint: Some("Check input format".to_string()),
            },
        }
    }
}

// Report types

#[derive(serde::Serialize)]
struct ValidationReport {
    total_events: usize,
    valid_events: usize,
    invalid_events: usize,
    errors: Vec<ValidationErrorDetail>,
}

#[derive(serde::Serialize)]
struct ValidationErrorDetail {
    index: usize,
    line: usize,
    error: String,
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
