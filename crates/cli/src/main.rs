use std::path::PathBuf;

use clap::{Parser, Subcommand};
use regime_engine_cli::replay;
use regime_engine_core::config_loader::DEFAULT_CONFIG_PATH;
use regime_engine_core::{ConfigLoader, EngineConfig};
use regime_engine_orchestrator::Orchestrator;
use rust_decimal::Decimal;

#[derive(Parser)]
#[command(name = "regime-engine")]
#[command(about = "Regime-gated multi-strategy options decision engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay recorded bars and option chains, printing intents as JSON lines
    Replay {
        /// Bars CSV (timestamp,symbol,open,high,low,close,volume)
        #[arg(long)]
        bars: PathBuf,
        /// Option chain CSV (timestamp,underlying,expiry,strike,right,bid,ask,open_interest,volume,delta,implied_volatility)
        #[arg(long)]
        chains: PathBuf,
        /// Completed daily closes used to warm the regime history (date,symbol,close)
        #[arg(long)]
        seed: Option<PathBuf>,
        /// Config file path
        #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
        config: String,
        /// Profile overlay read from next to the config file (e.g. `paper`)
        #[arg(long, env = "REGIME_PROFILE")]
        profile: Option<String>,
        /// Cash in the flat replay portfolio
        #[arg(long, default_value = "100000")]
        equity: Decimal,
    },
    /// Print the merged configuration as JSON
    ShowConfig {
        /// Config file path
        #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
        config: String,
        /// Profile overlay read from next to the config file (e.g. `paper`)
        #[arg(long, env = "REGIME_PROFILE")]
        profile: Option<String>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Intents go to stdout, so logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Replay {
            bars,
            chains,
            seed,
            config,
            profile,
            equity,
        } => {
            let config = load_config(&config, profile.as_deref())?;
            run_replay(&bars, &chains, seed.as_deref(), config, equity)?;
        }
        Commands::ShowConfig { config, profile } => {
            let config = load_config(&config, profile.as_deref())?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

fn load_config(path: &str, profile: Option<&str>) -> anyhow::Result<EngineConfig> {
    tracing::info!(config = path, profile, "Loading configuration");
    match profile {
        Some(profile) => ConfigLoader::load_with_profile(path, profile),
        None => ConfigLoader::load_from(path),
    }
}

fn run_replay(
    bars: &std::path::Path,
    chains: &std::path::Path,
    seed: Option<&std::path::Path>,
    config: EngineConfig,
    equity: Decimal,
) -> anyhow::Result<()> {
    tracing::info!(equity = %equity, "Starting replay");
    let symbols = config.symbols.clone();
    let mut engine = Orchestrator::new(config);

    if let Some(path) = seed {
        let rows = replay::load_seed(path)?;
        let (index, volatility) = replay::split_seed(&rows, &symbols);
        tracing::info!(
            index = index.len(),
            volatility = volatility.len(),
            "Seeding regime history"
        );
        engine.seed_history(&index, &volatility);
    }

    let ticks = replay::build_ticks(replay::load_bars(bars)?, replay::load_chains(chains)?, equity);
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    replay::run(&mut engine, &ticks, &mut out)?;
    Ok(())
}
