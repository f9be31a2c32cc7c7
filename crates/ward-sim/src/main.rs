//! ward-sim - run a closed hospital economy and audit its books.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use ward_agents::{Economy, EconomyAudit, PacingConfig, SimConfig, TracingReporter};

#[derive(Parser)]
#[command(name = "ward-sim")]
#[command(about = "Concurrent closed-economy simulator")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the economy for a while, then print the audit
    Run {
        /// Path to a JSON config file (built-in defaults when omitted)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// How long to let the agents trade
        #[arg(short, long, default_value_t = 10)]
        duration_secs: u64,

        /// Seed for reproducible agent decisions
        #[arg(long)]
        seed: Option<u64>,

        /// Disable simulated work delays
        #[arg(long)]
        no_delay: bool,

        /// Print the audit as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write the default config file
    InitConfig {
        /// Path to write config
        #[arg(short, long, default_value = "ward.json")]
        output: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            duration_secs,
            seed,
            no_delay,
            json,
        } => {
            let config = load_config(config, seed, no_delay)?;
            let audit = run(&config, Duration::from_secs(duration_secs))?;
            print_audit(&audit, json)?;
            if !audit.is_conserved() {
                anyhow::bail!("money was not conserved (off by {})", audit.discrepancy());
            }
        }

        Commands::InitConfig { output } => {
            SimConfig::default()
                .save(&output)
                .with_context(|| format!("writing {}", output.display()))?;
            println!("Config written to {}", output.display());
            println!();
            println!("Edit the file, then run:");
            println!("  ward-sim run --config {}", output.display());
        }
    }

    Ok(())
}

fn load_config(path: Option<PathBuf>, seed: Option<u64>, no_delay: bool) -> anyhow::Result<SimConfig> {
    let mut config = match path {
        Some(path) => SimConfig::from_file(&path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => SimConfig::default(),
    };
    if seed.is_some() {
        config.seed = seed;
    }
    if no_delay {
        config.pacing = PacingConfig::disabled();
    }
    config.validate()?;
    Ok(config)
}

fn run(config: &SimConfig, duration: Duration) -> anyhow::Result<EconomyAudit> {
    let pacer = config.pacing.build(config.seed);
    let economy = Economy::build(config, Arc::new(TracingReporter), pacer)?;
    info!(
        agents = economy.agents().len(),
        seed = ?config.seed,
        secs = duration.as_secs(),
        "Starting simulation"
    );

    let audit = economy.run_for(duration)?;

    if audit.is_conserved() {
        info!(total = audit.initial_total(), "Books balance");
    } else {
        warn!(discrepancy = audit.discrepancy(), "Books do not balance");
    }
    Ok(audit)
}

fn print_audit(audit: &EconomyAudit, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(audit)?);
    } else {
        println!("{audit}");
    }
    Ok(())
}
