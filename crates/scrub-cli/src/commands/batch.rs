//! Batch command - extract fields from many PDFs into one table.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Args;
use console::style;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, warn};

use scrub_core::export::Exporter;
use scrub_core::{BatchObserver, BatchProcessor, BatchReport, DocumentFailure, InputDocument, Progress};

use super::{load_config, StrategyArg};

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Input files or glob patterns
    #[arg(required = true)]
    inputs: Vec<String>,

    /// Output file (default: export file name from config; "-" for stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "csv")]
    format: super::process::OutputFormat,

    /// Unlock strategy (overrides config)
    #[arg(short, long, value_enum)]
    strategy: Option<StrategyArg>,

    /// Add a leading column with the source file name
    #[arg(long)]
    include_source: bool,

    /// Exit with an error if any document failed
    #[arg(long)]
    strict: bool,

    /// Hide the progress bar
    #[arg(short, long)]
    quiet: bool,
}

/// Renders batch events on a progress bar and stops on Ctrl-C.
struct CliObserver {
    pb: ProgressBar,
    interrupted: Arc<AtomicBool>,
}

impl BatchObserver for CliObserver {
    fn on_start(&mut self, name: &str, _index: usize, _total: usize) {
        self.pb.set_message(format!("Processing {}...", name));
    }

    fn on_progress(&mut self, progress: Progress) {
        self.pb.set_position(progress.completed as u64);
    }

    fn on_failure(&mut self, failure: &DocumentFailure) {
        self.pb.println(format!(
            "{} Failed to process {}",
            style("✗").red(),
            failure
        ));
    }

    fn should_continue(&self) -> bool {
        !self.interrupted.load(Ordering::SeqCst)
    }
}

pub async fn run(args: BatchArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(strategy) = args.strategy {
        config.unlock.strategy = strategy.into();
    }
    if args.include_source {
        config.export.include_source = true;
    }

    let processor = BatchProcessor::from_config(&config)?;
    let exporter = Exporter::new(&config.export, processor.rules())?;

    let files = expand_inputs(&args.inputs)?;
    if files.is_empty() {
        anyhow::bail!("No matching files found for: {}", args.inputs.join(" "));
    }

    if !args.quiet {
        eprintln!("{} Found {} files to process", style("ℹ").blue(), files.len());
    }

    let mut read_failures = Vec::new();
    let mut documents = Vec::with_capacity(files.len());
    for path in files {
        let name = path
            .file_name()
            .and_then(|s| s.to_str())
            .map(str::to_string)
            .unwrap_or_else(|| path.display().to_string());
        match fs::read(&path) {
            Ok(bytes) => documents.push(InputDocument::new(name, bytes)),
            Err(e) => {
                warn!("Failed to read {}: {}", path.display(), e);
                read_failures.push(format!("{}: {}", name, e));
            }
        }
    }

    let interrupted = Arc::new(AtomicBool::new(false));
    let flag = interrupted.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            flag.store(true, Ordering::SeqCst);
        }
    });

    let pb = if args.quiet {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(documents.len() as u64)
    };
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("=>-"),
    );

    let mut observer = CliObserver { pb, interrupted };
    let report = processor.process(documents, &mut observer);
    observer.pb.finish_and_clear();

    write_output(&args, &exporter, &report)?;
    print_summary(&args, &report, &read_failures);

    let failed = report.failures.len() + read_failures.len();
    if report.cancelled {
        anyhow::bail!("Interrupted after {} of {} documents", report.attempted, report.total);
    }
    if args.strict && failed > 0 {
        anyhow::bail!("{} documents failed", failed);
    }

    Ok(())
}

/// Expand glob patterns, keeping literal paths that match nothing so they are
/// reported as unreadable rather than silently dropped.
fn expand_inputs(inputs: &[String]) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for input in inputs {
        let matches: Vec<PathBuf> = glob(input)?
            .filter_map(|r| r.ok())
            .filter(|p| p.is_file())
            .collect();

        if matches.is_empty() && !input.contains(['*', '?', '[']) {
            files.push(PathBuf::from(input));
        } else {
            files.extend(matches);
        }
    }
    Ok(files)
}

fn write_output(args: &BatchArgs, exporter: &Exporter, report: &BatchReport) -> anyhow::Result<()> {
    use super::process::OutputFormat;

    let (content, default_name) = match args.format {
        OutputFormat::Csv => {
            let file = exporter.export(&report.batch)?;
            (file.bytes, Some(file.file_name))
        }
        OutputFormat::Json => (serde_json::to_vec_pretty(report)?, None),
        OutputFormat::Text => (format_report_text(report).into_bytes(), None),
    };

    let target = args.output.clone().or_else(|| default_name.map(PathBuf::from));
    match target {
        Some(path) if path.as_os_str() != "-" => {
            fs::write(&path, &content)?;
            debug!("Wrote {} bytes to {}", content.len(), path.display());
            if !args.quiet {
                eprintln!("{} Output written to {}", style("✓").green(), path.display());
            }
        }
        _ => {
            use std::io::Write;
            std::io::stdout().write_all(&content)?;
        }
    }

    Ok(())
}

fn format_report_text(report: &BatchReport) -> String {
    let mut output = String::new();

    for record in &report.batch {
        output.push_str(&format!("{}\n", record.source));
        output.push_str(&super::process::format_fields_text(record));
        output.push('\n');
    }

    output
}

fn print_summary(args: &BatchArgs, report: &BatchReport, read_failures: &[String]) {
    if args.quiet {
        return;
    }

    eprintln!();
    eprintln!(
        "{} Processed {} of {} files in {}ms",
        style("✓").green(),
        report.attempted,
        report.total,
        report.processing_time_ms
    );
    eprintln!(
        "   {} successful, {} failed",
        style(report.succeeded()).green(),
        style(report.failures.len() + read_failures.len()).red()
    );

    if !report.failures.is_empty() || !read_failures.is_empty() {
        eprintln!();
        eprintln!("{}", style("Failed files:").red());
        for failure in read_failures {
            eprintln!("  - {}", failure);
        }
        for failure in &report.failures {
            eprintln!("  - [{}] {}", failure.stage, failure);
        }
    }
}
