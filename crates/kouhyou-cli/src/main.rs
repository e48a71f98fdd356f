mod display;

use std::path::{Path, PathBuf};

use anyhow::{Context, bail, ensure};
use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};
use kouhyou_core::config::PipelineConfig;
use kouhyou_core::extract::TextExtractor;
use kouhyou_core::key::Identified;
use kouhyou_core::record::TableRow;
use kouhyou_store as store;
use kouhyou_timeline::{AuditReport, Auditor, Reconciler, Statistics, apply_gap_flags};
use tracing::{Level, info, warn};

const STATISTICS_PATH: &str = "docs/data/statistics.json";

#[derive(Parser)]
#[command(
    name = "kouhyou",
    version,
    about = "Timeline of published labor-law violation cases"
)]
struct Cli {
    /// Pipeline configuration (JSON; any subset of keys)
    #[arg(long, global = true, env = "KOUHYOU_CONFIG")]
    config: Option<PathBuf>,

    /// Log debug detail
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Log warnings and errors only
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Parse text copied from a publication into a snapshot table
    Extract {
        /// Text file with bureau headers and table rows
        input: PathBuf,
        #[arg(short, long, default_value = store::SNAPSHOT_PATH)]
        output: PathBuf,
    },
    /// Fold a snapshot into the timeline and append to the change log
    Diff {
        /// Observation date (defaults to today)
        #[arg(short, long)]
        date: Option<NaiveDate>,
        #[arg(long, default_value = store::SNAPSHOT_PATH)]
        snapshot: PathBuf,
        #[arg(long, default_value = store::TIMELINE_PATH)]
        timeline: PathBuf,
        #[arg(long, default_value = store::CHANGE_LOG_PATH)]
        changes: PathBuf,
        /// Report the changes without writing anything
        #[arg(long)]
        dry_run: bool,
        #[command(flatten)]
        gap: GapArgs,
    },
    /// Recompute the data-gap flag on every timeline entry
    GapFlag {
        #[arg(default_value = store::TIMELINE_PATH)]
        timeline: PathBuf,
        #[command(flatten)]
        gap: GapArgs,
    },
    /// Detect data-quality issues, optionally fixing them
    Audit {
        #[arg(default_value = store::TIMELINE_PATH)]
        input: PathBuf,
        /// Treat the input as a snapshot table instead of a timeline
        #[arg(long)]
        snapshot: bool,
        /// Apply corrections and delete unrecoverable rows
        #[arg(long)]
        fix: bool,
        /// Copy the input aside before overwriting it
        #[arg(long, requires = "fix")]
        backup: bool,
        /// Write fixed rows here instead of over the input
        #[arg(short, long, requires = "fix")]
        output: Option<PathBuf>,
    },
    /// Write summary statistics as JSON
    Stats {
        #[arg(long, default_value = store::TIMELINE_PATH)]
        timeline: PathBuf,
        #[arg(long, default_value = store::CHANGE_LOG_PATH)]
        changes: PathBuf,
        #[arg(short, long, default_value = STATISTICS_PATH)]
        output: PathBuf,
    },
    /// Print the canonical form of date tokens (empty when unrecoverable)
    NormalizeDate {
        #[arg(required = true)]
        tokens: Vec<String>,
    },
}

/// Overrides for the configured data-collection gap.
#[derive(Args)]
struct GapArgs {
    #[arg(long)]
    gap_start: Option<NaiveDate>,
    #[arg(long)]
    gap_end: Option<NaiveDate>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else if cli.quiet {
        Level::WARN
    } else {
        Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
    info!("kouhyou v{}", env!("CARGO_PKG_VERSION"));

    let mut config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Extract { input, output } => run_extract(&config, &input, &output),
        Command::Diff {
            date,
            snapshot,
            timeline,
            changes,
            dry_run,
            gap,
        } => {
            gap.apply(&mut config)?;
            let date = date.unwrap_or_else(|| Local::now().date_naive());
            run_diff(&config, date, &snapshot, &timeline, &changes, dry_run)
        }
        Command::GapFlag { timeline, gap } => {
            gap.apply(&mut config)?;
            run_gap_flag(&config, &timeline)
        }
        Command::Audit {
            input,
            snapshot,
            fix,
            backup,
            output,
        } => {
            let target = if fix {
                Some(output.unwrap_or_else(|| input.clone()))
            } else {
                None
            };
            let opts = AuditOpts {
                target: target.as_deref(),
                backup,
            };
            if snapshot {
                run_audit(
                    &config,
                    &input,
                    &opts,
                    store::load_snapshot,
                    store::save_snapshot,
                )
            } else {
                run_audit(
                    &config,
                    &input,
                    &opts,
                    store::load_timeline,
                    store::save_timeline,
                )
            }
        }
        Command::Stats {
            timeline,
            changes,
            output,
        } => run_stats(&timeline, &changes, &output),
        Command::NormalizeDate { tokens } => {
            let normalizer = config.normalizer();
            for token in tokens {
                println!("{token}\t{}", normalizer.normalize(&token));
            }
            Ok(())
        }
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<PipelineConfig> {
    match path {
        Some(path) => {
            let config = PipelineConfig::from_path(path)
                .with_context(|| format!("loading config {}", path.display()))?;
            info!(path = %path.display(), "loaded config");
            Ok(config)
        }
        None => Ok(PipelineConfig::default()),
    }
}

impl GapArgs {
    fn apply(&self, config: &mut PipelineConfig) -> anyhow::Result<()> {
        if let Some(start) = self.gap_start {
            config.data_gap.start = start;
        }
        if let Some(end) = self.gap_end {
            config.data_gap.end = end;
        }
        config.validate().context("invalid data gap override")?;
        Ok(())
    }
}

// ── extract ──

fn run_extract(config: &PipelineConfig, input: &Path, output: &Path) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(input)
        .with_context(|| format!("reading {}", input.display()))?;
    let extraction = TextExtractor::new(config).extract(&text);
    if extraction.records.is_empty() {
        warn!(path = %input.display(), "no records extracted");
    }
    store::save_snapshot(output, &extraction.records)
        .with_context(|| format!("writing snapshot {}", output.display()))?;
    display::print_extraction(&extraction, output);
    Ok(())
}

// ── diff ──

fn run_diff(
    config: &PipelineConfig,
    date: NaiveDate,
    snapshot: &Path,
    timeline_path: &Path,
    changes: &Path,
    dry_run: bool,
) -> anyhow::Result<()> {
    let mut timeline = store::load_timeline(timeline_path)
        .with_context(|| format!("loading timeline {}", timeline_path.display()))?;
    let records = store::load_snapshot(snapshot)
        .with_context(|| format!("loading snapshot {}", snapshot.display()))?;
    let mut log = store::load_change_log(changes)
        .with_context(|| format!("loading change log {}", changes.display()))?;

    let outcome = Reconciler::from_config(config).reconcile(&mut timeline, &records, date)?;
    display::print_reconcile(&outcome, date);

    if dry_run {
        info!("dry run; nothing written");
        return Ok(());
    }
    // Every table is read before either is written.
    log.push(outcome.change_log_entry(date));
    store::save_timeline(timeline_path, &timeline)
        .with_context(|| format!("writing timeline {}", timeline_path.display()))?;
    store::save_change_log(changes, &log)
        .with_context(|| format!("writing change log {}", changes.display()))?;
    info!(
        path = %changes.display(),
        added = outcome.added,
        removed = outcome.removed,
        total_active = outcome.total_active,
        "appended change log"
    );
    Ok(())
}

// ── gap-flag ──

fn run_gap_flag(config: &PipelineConfig, timeline_path: &Path) -> anyhow::Result<()> {
    ensure!(
        timeline_path.exists(),
        "timeline not found: {}",
        timeline_path.display()
    );
    let mut timeline = store::load_timeline(timeline_path)?;
    let flagged = apply_gap_flags(&mut timeline, &config.data_gap);
    store::save_timeline(timeline_path, &timeline)?;
    println!(
        "Flagged {flagged} of {} entries crossing {} .. {}",
        timeline.len(),
        config.data_gap.start,
        config.data_gap.end
    );
    Ok(())
}

// ── audit ──

struct AuditOpts<'a> {
    /// Where to write fixed rows; `None` for detection only.
    target: Option<&'a Path>,
    backup: bool,
}

fn run_audit<R, L, S>(
    config: &PipelineConfig,
    input: &Path,
    opts: &AuditOpts<'_>,
    load: L,
    save: S,
) -> anyhow::Result<()>
where
    R: TableRow + Identified,
    L: Fn(&Path) -> Result<Vec<R>, store::StoreError>,
    S: Fn(&Path, &[R]) -> Result<(), store::StoreError>,
{
    if !input.exists() {
        bail!("file not found: {}", input.display());
    }
    let rows = load(input).with_context(|| format!("loading {}", input.display()))?;
    println!("File: {}", input.display());
    println!("Records: {}", rows.len());
    println!();

    let auditor = Auditor::new(config);
    let issues = auditor.detect(&rows);
    display::print_issues(&issues);

    let Some(target) = opts.target else {
        let report = AuditReport::detected(&issues);
        display::print_report(&report);
        if report.remaining_errors > 0 {
            println!("Re-run with --fix to correct or remove them.");
        }
        return Ok(());
    };

    if opts.backup {
        let at = Local::now().naive_local();
        let path = store::backup(input, at).context("writing backup")?;
        println!("Backup: {}", path.display());
    }

    let outcome = auditor.fix(rows, &issues);
    display::print_fix_outcome(&outcome);
    save(target, &outcome.rows).with_context(|| format!("writing {}", target.display()))?;
    println!("Saved: {} ({} records)", target.display(), outcome.rows.len());

    display::print_report(&AuditReport::fixed(&issues, &outcome));
    Ok(())
}

// ── stats ──

fn run_stats(timeline_path: &Path, changes: &Path, output: &Path) -> anyhow::Result<()> {
    let timeline = store::load_timeline(timeline_path)
        .with_context(|| format!("loading timeline {}", timeline_path.display()))?;
    let log = store::load_change_log(changes)
        .with_context(|| format!("loading change log {}", changes.display()))?;

    let stats = Statistics::compute(&timeline, &log, Local::now().naive_local());
    let json = serde_json::to_string_pretty(&stats)?;
    store::write_text(output, &json).with_context(|| format!("writing {}", output.display()))?;
    info!(
        path = %output.display(),
        total = stats.total_records,
        active = stats.active_count,
        "wrote statistics"
    );
    Ok(())
}
