//! recordkit CLI
//!
//! - `populate`: marshal a JSON file of raw items into an in-memory store and
//!   print the resulting records
//! - `schema`: summarize a schema document

use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use colored::Colorize;
use recordkit_marshal::{MarshalConfig, MarshalReport, Marshaler, Resolver};
use recordkit_schema::{Cardinality, DeleteRule, Schema};
use recordkit_store::{MemoryStore, RecordView};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::Level;

#[derive(Parser)]
#[command(name = "recordkit")]
#[command(author, version, about = "Populate schema-typed records from raw JSON")]
struct Cli {
    /// More log output on stderr (`-v` debug, `-vv` trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Marshal raw items of one entity and print the populated records.
    Populate(PopulateArgs),

    /// Print the entities, attributes and relationships of a schema document.
    Schema {
        #[arg(long)]
        schema: PathBuf,
    },
}

#[derive(Args)]
struct PopulateArgs {
    /// Schema document (`{"entities": [...]}`).
    #[arg(long)]
    schema: PathBuf,

    /// Entity of the top-level input items.
    #[arg(long)]
    entity: String,

    /// JSON file holding one object or an array of objects.
    #[arg(long)]
    input: PathBuf,

    /// Marshal configuration (JSON).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Default date pattern, overriding the configuration (e.g. `yyyy-MM-dd`).
    #[arg(long)]
    date_format: Option<String>,

    /// Populate records on the current thread only.
    #[arg(long)]
    sequential: bool,

    /// Print records as JSON instead of the human-readable listing.
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Populate(args) => cmd_populate(&args),
        Commands::Schema { schema } => cmd_schema(&schema),
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn load_schema(path: &Path) -> Result<Schema> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read schema {}", path.display()))?;
    Schema::from_json_str(&text).with_context(|| format!("invalid schema {}", path.display()))
}

fn load_config(args: &PopulateArgs) -> Result<MarshalConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            MarshalConfig::from_json_str(&text)
                .with_context(|| format!("invalid config {}", path.display()))?
        }
        None => MarshalConfig::default(),
    };
    if let Some(pattern) = &args.date_format {
        config.date_format = Some(pattern.clone());
    }
    if args.sequential {
        config.parallel = false;
    }
    Ok(config)
}

fn load_items(path: &Path) -> Result<Vec<Value>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read input {}", path.display()))?;
    let value: Value = serde_json::from_str(&text)
        .with_context(|| format!("input {} is not valid JSON", path.display()))?;
    Ok(match value {
        Value::Array(items) => items,
        other => vec![other],
    })
}

fn cmd_populate(args: &PopulateArgs) -> Result<()> {
    let schema = load_schema(&args.schema)?;
    let config = load_config(args)?;
    let items = load_items(&args.input)?;

    let store = MemoryStore::new();
    let marshaler = Marshaler::from_config(&config);
    let report = Resolver::new(&schema, &store, &marshaler)
        .parallel(config.parallel)
        .marshal(&args.entity, &items)?;

    let views: Vec<RecordView> = report
        .records
        .iter()
        .filter_map(|record| store.view(*record))
        .collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&views)?);
    } else {
        eprintln!(
            "{} {} {} item(s) into {} record(s)",
            "Populated".green().bold(),
            args.entity.bold(),
            report.roots.len(),
            views.len()
        );
        for view in &views {
            print_view(view);
        }
    }

    report_failures(&report)
}

fn print_view(view: &RecordView) {
    println!("{} {}", view.entity.bold(), view.id.to_string().dimmed());
    for (name, value) in &view.attributes {
        println!("  {} = {}", name.cyan(), value);
    }
    for (name, target) in &view.to_one {
        println!("  {} {} {}", name.cyan(), "→".cyan(), target);
    }
    for (name, targets) in &view.to_many {
        let targets: Vec<String> = targets.iter().map(ToString::to_string).collect();
        println!("  {} {} [{}]", name.cyan(), "→".cyan(), targets.join(", "));
    }
}

fn report_failures(report: &MarshalReport) -> Result<()> {
    if report.is_clean() {
        return Ok(());
    }
    for failure in &report.failures {
        eprintln!(
            "{} {} {}: {}",
            "error:".red().bold(),
            failure.entity,
            failure.record,
            failure.error
        );
    }
    Err(anyhow!("{} record(s) failed to marshal", report.failures.len()))
}

fn cmd_schema(path: &Path) -> Result<()> {
    let schema = load_schema(path)?;
    for entity in schema.entities() {
        match &entity.primary_key {
            Some(key) => println!("{} (key: {})", entity.name.bold(), key),
            None => println!("{}", entity.name.bold()),
        }
        for attribute in &entity.attributes {
            let mut line = format!("  {}: {}", attribute.name.cyan(), attribute.attribute_type);
            if !attribute.key_paths.is_empty() {
                line.push_str(&format!(" [{}]", attribute.key_paths.join(", ")));
            }
            if let Some(format) = &attribute.date_format {
                line.push_str(&format!(" date_format={format}"));
            }
            if let Some(transformer) = &attribute.transformer {
                line.push_str(&format!(" transformer={transformer}"));
            }
            println!("{line}");
        }
        for relationship in &entity.relationships {
            let cardinality = match relationship.cardinality {
                Cardinality::ToOne => "to_one",
                Cardinality::ToMany => "to_many",
            };
            let mut line = format!(
                "  {} {} {} ({cardinality}",
                relationship.name.cyan(),
                "→".cyan(),
                relationship.destination
            );
            if relationship.delete_rule == DeleteRule::Cascade {
                line.push_str(", cascade");
            }
            if let Some(inverse) = &relationship.inverse {
                line.push_str(&format!(", inverse {inverse}"));
            }
            if relationship.primary_key {
                line.push_str(", primary key");
            }
            line.push(')');
            println!("{line}");
        }
    }
    Ok(())
}
