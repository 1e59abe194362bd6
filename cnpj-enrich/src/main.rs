//! cnpj-enrich - CNPJ batch enrichment CLI
//!
//! `cnpj-enrich run <INPUT>` enriches one CNPJ per line against the CNPJá
//! public API and writes `resultado_final.csv` into the data folder.
//! `cnpj-enrich init-config` writes a config file holding the defaults.

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use cnpj_common::config::{load_toml_config, resolve_config_path, write_toml_config, TomlConfig};
use cnpj_common::events::{EnrichEvent, EventBus};
use cnpj_enrich::config::{CliOverrides, EnrichSettings};
use cnpj_enrich::progress::ProgressTracker;
use cnpj_enrich::services::CnpjaClient;
use cnpj_enrich::{run_enrichment, RunSummary};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{
    fmt, layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter,
};

/// Command-line arguments for cnpj-enrich
#[derive(Parser, Debug)]
#[command(name = "cnpj-enrich")]
#[command(about = "Enrich a list of CNPJs with contact data and business category")]
#[command(version)]
struct Cli {
    /// TOML config file (default: CNPJ_ENRICH_CONFIG, then the platform config dir)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Enrich the CNPJs listed in INPUT (one per line)
    Run(RunArgs),

    /// Write a config file with every default spelled out
    InitConfig {
        /// Where to write (default: the resolved config path)
        #[arg(long, value_name = "FILE")]
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Text file with one CNPJ per line
    input: PathBuf,

    /// Folder for the already-queried list and the report
    #[arg(long, value_name = "DIR")]
    data_folder: Option<PathBuf>,

    /// Seconds between live lookups (0 disables pacing)
    #[arg(long, env = "CNPJ_RATE_DELAY_SECS")]
    delay_secs: Option<u64>,

    /// Lookup endpoint, e.g. a local mirror
    #[arg(long, env = "CNPJ_LOOKUP_BASE_URL")]
    base_url: Option<String>,
}

type FilterHandle = reload::Handle<EnvFilter, tracing_subscriber::Registry>;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let log_filter = init_tracing();

    let config_path = resolve_config_path(cli.config.as_deref());

    match cli.command {
        Command::InitConfig { path, force } => {
            let target = path
                .or(config_path)
                .context("No config location available, pass --path")?;
            init_config(target, force)
        }
        Command::Run(args) => {
            let toml = match &config_path {
                Some(path) => load_toml_config(path)?,
                None => None,
            };
            if let Some(level) = toml.as_ref().map(|t| t.logging.level.as_str()) {
                log_filter
                    .reload(build_filter(level))
                    .context("Failed to apply configured log level")?;
            }
            run(args, toml.as_ref()).await
        }
    }
}

/// Install the subscriber; the filter can be swapped once the config is read
fn init_tracing() -> FilterHandle {
    let (filter, handle) = reload::Layer::new(build_filter("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .init();
    handle
}

/// `RUST_LOG` wins; otherwise `level` applies to the workspace crates
fn build_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("cnpj_enrich={0},cnpj_common={0}", level))
    })
}

async fn run(args: RunArgs, toml: Option<&TomlConfig>) -> Result<()> {
    info!("Starting cnpj-enrich {}", env!("CARGO_PKG_VERSION"));

    let overrides = CliOverrides {
        data_folder: args.data_folder,
        delay_secs: args.delay_secs,
        base_url: args.base_url,
    };
    let settings = EnrichSettings::resolve(&overrides, toml)?;

    let client = CnpjaClient::new(&settings.lookup)
        .map_err(|e| anyhow::anyhow!("Failed to build HTTP client: {}", e))?;

    let event_bus = EventBus::new(256);
    let printer = spawn_progress_printer(&event_bus);

    let cancel = CancellationToken::new();
    spawn_ctrl_c_handler(cancel.clone());

    let result = run_enrichment(
        &settings,
        &args.input,
        Arc::new(client),
        Some(event_bus.clone()),
        cancel,
    )
    .await;

    drop(event_bus);
    let _ = printer.await;

    match result {
        Ok(summary) => {
            print_summary(&summary);
            Ok(())
        }
        Err(e) => {
            let message = e.user_message();
            Err(anyhow::Error::new(e).context(message))
        }
    }
}

fn spawn_progress_printer(event_bus: &EventBus) -> JoinHandle<()> {
    let mut rx = event_bus.subscribe();
    tokio::spawn(async move {
        let mut tracker = ProgressTracker::start();
        loop {
            match rx.recv().await {
                Ok(EnrichEvent::RunStarted { total, .. }) => {
                    tracker = ProgressTracker::start();
                    println!("Processing {} CNPJs", total);
                }
                Ok(EnrichEvent::Progress {
                    index,
                    total,
                    message,
                    counters,
                    ..
                }) => {
                    println!("{} {}", tracker.render(index, total, &counters), message);
                }
                Ok(EnrichEvent::RunCancelled { processed, total, .. }) => {
                    println!("Cancelled after {} of {} CNPJs", processed, total);
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Progress display skipped {} events", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

fn spawn_ctrl_c_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Ctrl+C received, stopping after the current CNPJ");
                cancel.cancel();
            }
            Err(e) => warn!("Failed to install Ctrl+C handler: {}", e),
        }
    });
}

fn print_summary(summary: &RunSummary) {
    let status = if summary.cancelled {
        "cancelled"
    } else {
        "complete"
    };
    println!(
        "Run {}: {} of {} CNPJs, {} lookups",
        status, summary.processed, summary.total, summary.live_calls
    );
    for (category, count) in summary.counters.iter() {
        println!("  {:<15} {}", category.as_str(), count);
    }
    match &summary.report_path {
        Some(path) => println!("Report: {}", path.display()),
        None => println!("No rows to report"),
    }
}

fn init_config(target: PathBuf, force: bool) -> Result<()> {
    if target.exists() && !force {
        bail!(
            "{} already exists (use --force to overwrite)",
            target.display()
        );
    }
    write_toml_config(&TomlConfig::with_compiled_defaults(), &target)?;
    info!("Wrote default config to {}", target.display());
    println!("{}", target.display());
    Ok(())
}
