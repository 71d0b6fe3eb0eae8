//! Pulse CLI - command-line interface for the Pulse venue engine
//!
//! Commands:
//! - transform: compute a venue state from publisher messages
//! - validate: schema-check publisher messages
//! - schema: print schema identifiers

use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use pulse_core::adapters::{PulseMessageAdapter, ReadingAdapter};
use pulse_core::pipeline::{EngineConfig, MemoryReadingStore, PulseEngine};
use pulse_core::schema::SensorMessage;
use pulse_core::types::STATE_VERSION;
use pulse_core::{EngineError, Reading, ENGINE_VERSION, SCHEMA_VERSION};

/// Pulse - venue analytics engine
#[derive(Parser)]
#[command(name = "pulse")]
#[command(author = "Pulse Dashboard")]
#[command(version = ENGINE_VERSION)]
#[command(about = "Compute venue occupancy, dwell, and quality scores", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute a venue state from publisher messages
    Transform {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Venue to compute (defaults to the venue of the last message)
        #[arg(long)]
        venue: Option<String>,

        /// Evaluation instant, RFC 3339 (defaults to the latest reading timestamp)
        #[arg(long)]
        now: Option<String>,

        /// Hour (0-23) at which the venue's operational day begins
        #[arg(long, default_value_t = 3)]
        bar_day_start_hour: u32,

        /// Fold the evaluated bar day into the learning store before scoring
        #[arg(long)]
        record_session: bool,

        /// Load learning state from file
        #[arg(long)]
        load_learning: Option<PathBuf>,

        /// Save learning state to file after processing
        #[arg(long)]
        save_learning: Option<PathBuf>,
    },

    /// Validate publisher messages against the wire schema
    Validate {
        /// Input file path (use - for stdin)
        #[arg(short, long)]
        input: PathBuf,

        /// Input format
        #[arg(long, default_value = "ndjson")]
        input_format: InputFormat,

        /// Output validation report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print schema identifiers
    Schema {
        #[arg(value_enum)]
        schema_type: SchemaType,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum InputFormat {
    /// One JSON message per line
    Ndjson,
    /// A single JSON message or array of messages
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
enum SchemaType {
    /// Wire schema accepted by transform/validate
    Input,
    /// Venue-state schema produced by transform
    Output,
}

struct TransformArgs {
    input: PathBuf,
    input_format: InputFormat,
    venue: Option<String>,
    now: Option<String>,
    bar_day_start_hour: u32,
    record_session: bool,
    load_learning: Option<PathBuf>,
    save_learning: Option<PathBuf>,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Transform {
            input,
            input_format,
            venue,
            now,
            bar_day_start_hour,
            record_session,
            load_learning,
            save_learning,
        } => run_transform(TransformArgs {
            input,
            input_format,
            venue,
            now,
            bar_day_start_hour,
            record_session,
            load_learning,
            save_learning,
        }),
        Commands::Validate {
            input,
            input_format,
            json,
        } => run_validate(&input, input_format, json),
        Commands::Schema { schema_type } => run_schema(schema_type),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run_transform(args: TransformArgs) -> Result<(), EngineError> {
    let readings = read_readings(&args.input, args.input_format)?;

    let venue_id = match args
        .venue
        .or_else(|| readings.last().map(|r| r.venue_id.clone()))
    {
        Some(v) => v,
        None => return Err(EngineError::MissingVenueId),
    };

    let now = match args.now {
        Some(raw) => chrono::DateTime::parse_from_rfc3339(&raw)
            .map_err(|e| EngineError::TimestampError(format!("{raw}: {e}")))?
            .with_timezone(&chrono::Utc),
        None => readings
            .iter()
            .map(|r| r.timestamp)
            .max()
            .ok_or_else(|| EngineError::ParseError("no readings in input".to_string()))?,
    };

    let config = EngineConfig {
        bar_day_start_hour: args.bar_day_start_hour,
        ..EngineConfig::default()
    };

    let mut store = MemoryReadingStore::new();
    store.extend(readings);
    let mut engine = PulseEngine::new(store, config)?;

    if let Some(path) = &args.load_learning {
        let json = fs::read_to_string(path)
            .map_err(|e| EngineError::StoreError(format!("{}: {e}", path.display())))?;
        engine.load_learning(&json)?;
    }

    if args.record_session {
        let day = pulse_core::bar_day::BarDayClock::new(args.bar_day_start_hour)?.current(now);
        engine.record_session(&venue_id, day)?;
    }

    let state = engine.compute_venue_state(&venue_id, now)?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let rendered = if atty::is(atty::Stream::Stdout) {
        serde_json::to_string_pretty(&state)?
    } else {
        serde_json::to_string(&state)?
    };
    writeln!(out, "{rendered}").map_err(|e| EngineError::EncodingError(e.to_string()))?;

    if let Some(path) = &args.save_learning {
        let json = engine.save_learning()?;
        fs::write(path, json)
            .map_err(|e| EngineError::StoreError(format!("{}: {e}", path.display())))?;
    }

    Ok(())
}

fn run_validate(input: &PathBuf, input_format: InputFormat, json: bool) -> Result<(), EngineError> {
    let documents = read_documents(input, input_format)?;

    let mut valid = 0usize;
    let mut failures: Vec<(usize, String)> = Vec::new();

    for (index, doc) in documents.iter().enumerate() {
        match serde_json::from_str::<SensorMessage>(doc) {
            Ok(_) => valid += 1,
            Err(e) => failures.push((index + 1, e.to_string())),
        }
    }

    if json {
        let report = serde_json::json!({
            "schema": SCHEMA_VERSION,
            "valid": valid,
            "invalid": failures.len(),
            "failures": failures
                .iter()
                .map(|(line, error)| serde_json::json!({ "line": line, "error": error }))
                .collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{valid} valid, {} invalid ({SCHEMA_VERSION})", failures.len());
        for (line, error) in &failures {
            println!("  line {line}: {error}");
        }
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(EngineError::ParseError(format!(
            "{} message(s) failed validation",
            failures.len()
        )))
    }
}

fn run_schema(schema_type: SchemaType) -> Result<(), EngineError> {
    match schema_type {
        SchemaType::Input => println!("{SCHEMA_VERSION}"),
        SchemaType::Output => println!("{STATE_VERSION}"),
    }
    Ok(())
}

fn read_raw(input: &PathBuf) -> Result<String, EngineError> {
    if input.as_os_str() == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .map_err(|e| EngineError::StoreError(e.to_string()))?;
        Ok(buf)
    } else {
        fs::read_to_string(input)
            .map_err(|e| EngineError::StoreError(format!("{}: {e}", input.display())))
    }
}

/// Split the input into one JSON document per message
fn read_documents(input: &PathBuf, format: InputFormat) -> Result<Vec<String>, EngineError> {
    let raw = read_raw(input)?;
    match format {
        InputFormat::Ndjson => Ok(raw
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect()),
        InputFormat::Json => Ok(vec![raw]),
    }
}

fn read_readings(input: &PathBuf, format: InputFormat) -> Result<Vec<Reading>, EngineError> {
    let adapter = PulseMessageAdapter;
    let mut readings = Vec::new();
    for doc in read_documents(input, format)? {
        readings.extend(adapter.parse(&doc)?);
    }
    readings.sort_by_key(|r| r.timestamp);
    Ok(readings)
}
