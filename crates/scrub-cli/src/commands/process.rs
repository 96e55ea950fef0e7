//! Process command - extract fields from a single PDF.

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use clap::Args;
use console::style;
use tracing::{debug, info};

use scrub_core::export::Exporter;
use scrub_core::{Batch, BatchProcessor, ExtractedRecord, InputDocument};

use super::{load_config, StrategyArg};

/// Arguments for the process command.
#[derive(Args)]
pub struct ProcessArgs {
    /// Input PDF file
    #[arg(required = true)]
    input: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Unlock strategy (overrides config)
    #[arg(short, long, value_enum)]
    strategy: Option<StrategyArg>,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// CSV output
    Csv,
    /// Plain text summary
    Text,
}

pub async fn run(args: ProcessArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let mut config = load_config(config_path)?;
    if let Some(strategy) = args.strategy {
        config.unlock.strategy = strategy.into();
    }

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    info!("Processing file: {}", args.input.display());

    let processor = BatchProcessor::from_config(&config)?;
    let name = args
        .input
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("document.pdf")
        .to_string();
    let document = InputDocument::new(name, fs::read(&args.input)?);

    let record = processor
        .process_document(&document)
        .map_err(|failure| anyhow::anyhow!("[{}] {}", failure.stage, failure))?;

    let output = match args.format {
        OutputFormat::Json => serde_json::to_string_pretty(&record)?,
        OutputFormat::Csv => {
            let exporter = Exporter::new(&config.export, processor.rules())?;
            let bytes = exporter.to_table_bytes(&Batch::from(vec![record]))?;
            String::from_utf8(bytes)?
        }
        OutputFormat::Text => format_fields_text(&record),
    };

    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        eprintln!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", output.trim_end());
    }

    debug!("Total processing time: {:?}", start.elapsed());

    Ok(())
}

/// One `name: value` line per field, `-` for absent values.
pub fn format_fields_text(record: &ExtractedRecord) -> String {
    let width = record.field_names().map(str::len).max().unwrap_or(0);
    let mut output = String::new();

    for field in &record.fields {
        let value = field
            .value
            .as_ref()
            .map(|v| v.to_string())
            .unwrap_or_else(|| "-".to_string());
        output.push_str(&format!("  {:width$}  {}\n", field.name, value, width = width));
    }

    output
}
