//! skinoval CLI: fit face ovals to skin masks over a dataset range.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use skinoval::{ChainApprox, ItemEvent, Overrides, ProgressSink, Settings};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

/// Failed identifiers listed after a run.
const MAX_LISTED_FAILURES: usize = 10;

#[derive(Parser)]
#[command(name = "skinoval")]
#[command(about = "Fit rotated ellipses to face-skin segmentation masks")]
#[command(version)]
struct Cli {
    /// TOML config file (default: ./skinoval.toml if present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Worker threads (default: all CPUs).
    #[arg(long, global = true)]
    workers: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract ellipse annotations for an index range.
    Extract(CliExtractArgs),

    /// Print a stored `.bin` record as JSON.
    Inspect {
        /// Path to a 20-byte record file.
        file: PathBuf,
    },
}

#[derive(Debug, Clone, Args)]
struct CliExtractArgs {
    /// First index (inclusive).
    #[arg(long)]
    start: Option<u32>,

    /// Last index (exclusive).
    #[arg(long)]
    end: Option<u32>,

    /// Also write binary oval masks (PNG).
    #[arg(long)]
    save_masks: bool,

    /// Also write ellipse overlays on the photos (JPEG).
    #[arg(long)]
    save_overlays: bool,

    #[arg(long)]
    image_dir: Option<PathBuf>,

    #[arg(long)]
    mask_dir: Option<PathBuf>,

    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Fit at mask resolution instead of rescaling masks to the photo size.
    #[arg(long)]
    no_resize: bool,

    /// Boundary point storage: none | simple.
    #[arg(long)]
    chain_approx: Option<ChainApprox>,
}

impl CliExtractArgs {
    fn overrides(&self, workers: Option<usize>) -> Overrides {
        Overrides {
            image_dir: self.image_dir.clone(),
            mask_dir: self.mask_dir.clone(),
            output_dir: self.output_dir.clone(),
            start: self.start,
            end: self.end,
            save_masks: self.save_masks.then_some(true),
            save_overlays: self.save_overlays.then_some(true),
            resize_to_image: self.no_resize.then_some(false),
            chain_approx: self.chain_approx,
            workers,
        }
    }
}

fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Extract(args) => run_extract(&cli, args),
        Commands::Inspect { file } => run_inspect(file),
    }
}

// ── extract ────────────────────────────────────────────────────────────

/// Drives the progress bar. Per-item warnings are printed with the bar
/// suspended so log lines and redraws do not interleave on stderr.
struct BarSink(ProgressBar);

impl ProgressSink for BarSink {
    fn start(&self, total: usize) {
        self.0.set_length(total as u64);
    }

    fn item(&self, event: ItemEvent<'_>) {
        if let ItemEvent::Failed(f) = event {
            self.0
                .suspend(|| tracing::warn!(id = f.identifier, "{}", f.reason));
            self.0.set_message(format!("last failure: {}", f.identifier));
        }
        self.0.inc(1);
    }

    fn finish(&self) {
        self.0.finish_and_clear();
    }
}

fn progress_bar() -> ProgressBar {
    let bar = ProgressBar::new(0);
    if let Ok(style) = ProgressStyle::with_template(
        "{spinner} [{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta}) {msg}",
    ) {
        bar.set_style(style);
    }
    bar
}

fn run_extract(cli: &Cli, args: &CliExtractArgs) -> CliResult<()> {
    let cfg = Settings::load(cli.config.as_deref())?
        .with_overrides(&args.overrides(cli.workers))
        .resolve()?;
    tracing::info!(
        "Masks: {}, output: {}",
        cfg.layout.mask_dir.display(),
        cfg.output.root().display()
    );

    let sink = BarSink(progress_bar());
    let summary = skinoval::run(&cfg, &sink)?;

    tracing::info!(
        "Processed {} images in {:.1}s: {} succeeded, {} failed",
        summary.range.id_count(),
        summary.elapsed.as_secs_f64(),
        summary.succeeded,
        summary.failed()
    );
    if summary.succeeded > 0 {
        tracing::info!(
            "Mean oval size: {:.0} px",
            summary.oval_pixels as f64 / summary.succeeded as f64
        );
    }
    if let Some(report) = &summary.report_path {
        tracing::info!("Failure report: {}", report.display());
    }
    if !summary.failures.is_empty() {
        let listed: Vec<String> = summary
            .failures
            .iter()
            .take(MAX_LISTED_FAILURES)
            .map(|f| f.identifier.to_string())
            .collect();
        let more = summary.failed().saturating_sub(MAX_LISTED_FAILURES);
        if more > 0 {
            println!("Failed ids: {} (+{more} more)", listed.join(", "));
        } else {
            println!("Failed ids: {}", listed.join(", "));
        }
    }
    Ok(())
}

// ── inspect ────────────────────────────────────────────────────────────

fn run_inspect(file: &std::path::Path) -> CliResult<()> {
    let record = skinoval::read_annotation(file)?;
    if !record.is_canonical() {
        tracing::warn!("{} holds a non-canonical record", file.display());
    }
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use skinoval::FailureEntry;

    #[test]
    fn failures_advance_the_bar_and_name_the_id() {
        let sink = BarSink(ProgressBar::hidden());
        sink.start(3);
        let entry = FailureEntry {
            identifier: 17,
            reason: "file not found: 00017.png".into(),
        };
        sink.item(ItemEvent::Failed(&entry));

        assert_eq!(sink.0.position(), 1);
        assert_eq!(sink.0.length(), Some(3));
        assert_eq!(sink.0.message(), "last failure: 17");
        sink.finish();
        assert!(sink.0.is_finished());
    }

    #[test]
    fn no_resize_flag_overrides_config() {
        let cli = Cli::parse_from(["skinoval", "extract", "--no-resize", "--start", "2"]);
        let Commands::Extract(args) = &cli.command else {
            panic!("expected extract");
        };
        let o = args.overrides(Some(4));
        assert_eq!(o.resize_to_image, Some(false));
        assert_eq!(o.start, Some(2));
        assert_eq!(o.save_masks, None);
        assert_eq!(o.workers, Some(4));
    }
}
