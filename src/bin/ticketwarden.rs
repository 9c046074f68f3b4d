use std::io::IsTerminal as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use ticketwarden::cache::file::DEFAULT_NAMESPACE;
use ticketwarden::meter::usage::UsageMeter;
use ticketwarden::report::LicenseReport;
use ticketwarden::{spawn_revalidation, Clock, LicenseConfig, LicenseManager, SystemClock};
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Bot configuration file (JSON)
    ///
    /// `LICENSE_KEY`, `LICENSE_SERVER_URL` and `GUILD_ID` override the
    /// matching fields when set.
    #[arg(short, long, env = "TICKETWARDEN_CONFIG", default_value = "config.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Show license status
    Status {
        /// Print the status as JSON
        #[arg(long)]
        json: bool,
    },

    /// Validate the license against the server now
    Validate,

    /// Show limits and premium features
    Features,

    /// Keep the license validated until interrupted
    Run,
}

fn setup_logging() {
    use tracing_subscriber::{
        filter::{EnvFilter, LevelFilter},
        fmt,
    };

    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_file(false)
        .with_line_number(false)
        .init();
}

fn load_config(path: &Path) -> anyhow::Result<LicenseConfig> {
    let config = if path.exists() {
        LicenseConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?
    } else {
        warn!(path = %path.display(), "Config file not found, using environment only");
        LicenseConfig::from_json("{}")?
    };
    Ok(config.with_env_overrides())
}

fn tickets_this_month(config: &LicenseConfig) -> Option<u64> {
    let meter = match &config.usage_file {
        Some(path) => UsageMeter::open(path.clone()),
        None => UsageMeter::with_namespace(DEFAULT_NAMESPACE),
    };
    match meter {
        Ok(meter) => Some(meter.monthly_total(&SystemClock)),
        Err(e) => {
            warn!(error = %e, "Usage meter unavailable");
            None
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    setup_logging();

    let config = load_config(&cli.config)?;
    let manager = Arc::new(LicenseManager::new(config)?);

    match cli.command {
        Commands::Status { json } => {
            manager.initialize().await;
            if json {
                println!("{}", serde_json::to_string_pretty(&manager.current_status())?);
            } else {
                let entitlement = manager.entitlement();
                let mut report =
                    LicenseReport::new(&entitlement, manager.config().key_preview(), SystemClock.now_utc());
                if let Some(used) = tickets_this_month(manager.config()) {
                    report = report.with_usage(used);
                }
                println!("{report}");
            }
        }
        Commands::Validate => {
            let response = manager
                .force_validation()
                .await
                .context("License validation failed")?;
            println!(
                "License validated: {}",
                response.tier.as_deref().unwrap_or("unknown")
            );
            if let Some(expires) = response.expires_at {
                let days_left = expires.signed_duration_since(SystemClock.now_utc()).num_days();
                println!("Expires in {days_left} days");
            }
        }
        Commands::Features => {
            manager.initialize().await;
            let entitlement = manager.entitlement();
            let report =
                LicenseReport::new(&entitlement, manager.config().key_preview(), SystemClock.now_utc());
            println!("{}", report.features());
        }
        Commands::Run => {
            let status = manager.initialize().await;
            info!(valid = status.valid, tier = %status.tier, "License initialized");

            let handle = spawn_revalidation(Arc::clone(&manager));
            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for Ctrl-C")?;
            info!("Shutting down");
            handle.shutdown().await;
        }
    }

    Ok(())
}
