//! txfeed CLI: replay simulated transactions into an HTTP message bridge.
//!
//! Commands:
//! - `upload`: publish daily transaction snapshots or fraud labels for a date range
//! - `replay`: publish archived simulator output, optionally cut off or windowed
//! - `inspect`: print the first records of a source as JSON lines

use anyhow::{bail, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::io::Write;
use std::path::PathBuf;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use txfeed_core::data::SourceKind;
use txfeed_core::publish::{HttpBridge, LogProgress, ThreadSleeper};
use txfeed_runner::{inspect, run_upload, ConfigOverrides, ReplayConfig, RunError, RunReport};

#[derive(Parser)]
#[command(
    name = "txfeed",
    version,
    about = "Replay simulated card transactions into a Kafka HTTP bridge"
)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Emit logs as JSON lines.
    #[arg(long, global = true, default_value_t = false)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Publish daily snapshots or fraud labels whose file date is in [start, end].
    Upload {
        /// Which daily feed to publish. Required unless --config is given.
        #[arg(long, value_enum)]
        source: Option<DailySource>,

        /// Start date (YYYY-MM-DD), inclusive.
        #[arg(long)]
        start: Option<String>,

        /// End date (YYYY-MM-DD), inclusive. Defaults to the start date.
        #[arg(long)]
        end: Option<String>,

        #[command(flatten)]
        common: CommonArgs,
    },
    /// Publish archived transactions ordered by TX_DATETIME.
    Replay {
        #[command(flatten)]
        filter: FilterArgs,

        #[command(flatten)]
        common: CommonArgs,
    },
    /// Print the first records of a source without publishing.
    Inspect {
        /// Source to read. Defaults to the archive.
        #[arg(long, value_enum)]
        source: Option<InspectSource>,

        /// Start date for daily sources (YYYY-MM-DD).
        #[arg(long)]
        start: Option<String>,

        /// End date for daily sources (YYYY-MM-DD).
        #[arg(long)]
        end: Option<String>,

        #[command(flatten)]
        filter: FilterArgs,

        /// Path to a TOML config file.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Source directory, or a single archive CSV file.
        #[arg(long)]
        loc: Option<PathBuf>,

        /// Number of records to print.
        #[arg(long, default_value_t = 1)]
        limit: usize,
    },
}

#[derive(Args)]
struct CommonArgs {
    /// Path to a TOML config file. Flags override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Bridge base URL, e.g. http://localhost:8080.
    #[arg(long)]
    bridge: Option<String>,

    /// Destination topic.
    #[arg(long)]
    topic: Option<String>,

    /// Source directory, or a single archive CSV file.
    #[arg(long)]
    loc: Option<PathBuf>,

    /// Records per POST.
    #[arg(long)]
    batch_size: Option<usize>,

    /// Stop after this many records.
    #[arg(long)]
    limit: Option<usize>,
}

#[derive(Args)]
struct FilterArgs {
    /// Keep transactions after this date (YYYY-MM-DD).
    #[arg(long)]
    cutoff: Option<NaiveDate>,

    /// Keep the trailing N days relative to the newest transaction.
    #[arg(long)]
    window_days: Option<u32>,
}

#[derive(Clone, Copy, ValueEnum)]
enum DailySource {
    Transactions,
    Fraud,
}

impl From<DailySource> for SourceKind {
    fn from(source: DailySource) -> Self {
        match source {
            DailySource::Transactions => SourceKind::Transactions,
            DailySource::Fraud => SourceKind::Fraud,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum InspectSource {
    Transactions,
    Fraud,
    Archive,
}

impl From<InspectSource> for SourceKind {
    fn from(source: InspectSource) -> Self {
        match source {
            InspectSource::Transactions => SourceKind::Transactions,
            InspectSource::Fraud => SourceKind::Fraud,
            InspectSource::Archive => SourceKind::Archive,
        }
    }
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.log_json);

    if let Err(e) = execute(cli.command) {
        let code = e.downcast_ref::<RunError>().map_or(1, RunError::exit_code);
        tracing::error!(error = %e, code, "command failed");
        eprintln!("Error: {e:#}");
        std::process::exit(code);
    }
}

/// Logs go to stderr so `inspect` output on stdout stays machine-readable.
fn init_tracing(verbose: u8, json: bool) {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    if json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(filter)
            .init();
    }
}

fn execute(command: Commands) -> Result<()> {
    match command {
        Commands::Upload {
            source,
            start,
            end,
            common,
        } => {
            let config = resolve_config(
                common.config.as_ref(),
                source.map(SourceKind::from),
                &[SourceKind::Transactions, SourceKind::Fraud],
            )?;
            run_upload_cmd(config, common.overrides(start, end, None))
        }
        Commands::Replay { filter, common } => {
            let config = resolve_config(
                common.config.as_ref(),
                Some(SourceKind::Archive),
                &[SourceKind::Archive],
            )?;
            run_upload_cmd(config, common.overrides(None, None, Some(filter)))
        }
        Commands::Inspect {
            source,
            start,
            end,
            filter,
            config,
            loc,
            limit,
        } => {
            let kind = source.map(SourceKind::from).or_else(|| {
                config.is_none().then_some(SourceKind::Archive)
            });
            let mut config = resolve_config(
                config.as_ref(),
                kind,
                &[SourceKind::Transactions, SourceKind::Fraud, SourceKind::Archive],
            )?;
            ConfigOverrides {
                loc,
                start,
                end,
                cutoff: filter.cutoff,
                window_days: filter.window_days,
                ..ConfigOverrides::default()
            }
            .apply(&mut config);

            let stdout = std::io::stdout();
            let mut out = stdout.lock();
            inspect(&config, limit, &mut out)?;
            out.flush()?;
            Ok(())
        }
    }
}

impl CommonArgs {
    fn overrides(
        self,
        start: Option<String>,
        end: Option<String>,
        filter: Option<FilterArgs>,
    ) -> ConfigOverrides {
        let (cutoff, window_days) = filter.map_or((None, None), |f| (f.cutoff, f.window_days));
        ConfigOverrides {
            bridge: self.bridge,
            topic: self.topic,
            loc: self.loc,
            start,
            end,
            cutoff,
            window_days,
            batch_size: self.batch_size,
            limit: self.limit,
        }
    }
}

/// Load `--config` if given, otherwise start from the defaults for `kind`.
fn resolve_config(
    path: Option<&PathBuf>,
    kind: Option<SourceKind>,
    allowed: &[SourceKind],
) -> Result<ReplayConfig> {
    let config = match (path, kind) {
        (Some(path), kind) => {
            let config = ReplayConfig::from_file(path).map_err(RunError::from)?;
            if let Some(kind) = kind {
                if kind != config.kind() {
                    bail!(
                        "--source {kind} does not match the config file's source '{}'",
                        config.kind()
                    );
                }
            }
            config
        }
        (None, Some(kind)) => ReplayConfig::for_source(kind),
        (None, None) => bail!("one of --config or --source is required"),
    };

    if !allowed.contains(&config.kind()) {
        bail!("source '{}' is not valid for this command", config.kind());
    }
    Ok(config)
}

fn run_upload_cmd(mut config: ReplayConfig, overrides: ConfigOverrides) -> Result<()> {
    overrides.apply(&mut config);
    config.validate().map_err(RunError::from)?;

    let bridge = HttpBridge::new(&config.bridge.url, config.topic(), config.timeout())
        .map_err(RunError::from)?;
    let report = run_upload(&config, &bridge, &ThreadSleeper, &LogProgress)?;

    print_summary(&report);
    Ok(())
}

fn print_summary(report: &RunReport) {
    println!("=== Upload Summary ===");
    println!("Source:      {}", report.source);
    println!("Endpoint:    {}", report.endpoint);
    println!("Rows:        {}", report.rows);
    println!("Files:       {}", report.files);
    println!("Batches:     {}", report.delivered.batches);
    println!("Delivered:   {}", report.delivered.records);
    println!("Retries:     {}", report.delivered.retries);
    println!("Fingerprint: {}", report.fingerprint);
    if !report.skipped.is_empty() {
        println!("Skipped {} file(s):", report.skipped.len());
        for skipped in &report.skipped {
            println!("  {}: {}", skipped.path.display(), skipped.reason);
        }
    }
}
