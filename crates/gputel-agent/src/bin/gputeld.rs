//! Main binary for the GPU telemetry agent daemon (gputeld)

use clap::{Parser, Subcommand};
use gputel_agent::{init_logging, Agent, AgentConfig, AgentError, Result};
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "gputeld")]
#[command(about = "GPU telemetry agent for gputel")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level
    #[arg(long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Collector endpoint override, host:port
    #[arg(long, value_name = "HOST:PORT")]
    endpoint: Option<String>,

    /// Scrape interval override, seconds
    #[arg(long, value_name = "SECONDS")]
    interval: Option<u64>,

    /// Driver backend override (nvml, mock)
    #[arg(long, value_name = "BACKEND")]
    backend: Option<String>,

    /// Emission model override (observer, direct)
    #[arg(long, value_name = "MODEL")]
    emission: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate default configuration
    Config {
        /// Output file path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate configuration
    Validate {
        /// Configuration file to validate
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Config { ref output }) => generate_config(output.clone()),
        Some(Commands::Validate { ref config }) => validate_config(config.clone()),
        None => run_agent(cli).await,
    }
}

async fn run_agent(cli: Cli) -> Result<()> {
    let mut config = if let Some(ref config_path) = cli.config {
        AgentConfig::from_file(config_path)?
    } else {
        AgentConfig::default()
    };

    apply_overrides(&mut config, &cli)?;

    init_logging(&config.logging)?;

    if cli.config.is_some() {
        info!("loaded configuration from {}", cli.config.as_ref().unwrap().display());
    } else {
        info!("using default configuration");
    }

    let mut agent = Agent::new(config);
    if let Err(e) = agent.run().await {
        error!("agent failed: {e}");
        std::process::exit(1);
    }

    Ok(())
}

fn apply_overrides(config: &mut AgentConfig, cli: &Cli) -> Result<()> {
    if let Some(ref level) = cli.log_level {
        config.logging.level = level.clone();
    }

    if let Some(ref endpoint) = cli.endpoint {
        config.export.endpoint = endpoint.clone();
    }

    if let Some(seconds) = cli.interval {
        config.scrape.interval = std::time::Duration::from_secs(seconds);
    }

    if let Some(ref backend) = cli.backend {
        config.scrape.backend = backend.parse().map_err(AgentError::Config)?;
    }

    if let Some(ref emission) = cli.emission {
        config.scrape.emission = emission.parse().map_err(AgentError::Config)?;
    }

    Ok(())
}

fn generate_config(output: Option<PathBuf>) -> Result<()> {
    let config = AgentConfig::default();

    if let Some(output_path) = output {
        config.to_file(&output_path)?;
        println!("generated configuration file: {}", output_path.display());
    } else {
        let yaml = serde_yaml::to_string(&config)
            .map_err(AgentError::Serialization)?;
        println!("{}", yaml);
    }

    Ok(())
}

fn validate_config(config_path: PathBuf) -> Result<()> {
    println!("validating configuration: {}", config_path.display());

    let config = AgentConfig::from_file(&config_path)?;
    config.validate()?;

    println!("configuration is valid");
    println!("driver backend:  {}", config.scrape.backend);
    println!("emission model:  {}", config.scrape.emission);
    println!("scrape interval: {:?}", config.scrape.interval);
    println!("export endpoint: {}", config.export.endpoint);

    Ok(())
}
