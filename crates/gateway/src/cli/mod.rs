pub mod config;
pub mod doctor;

use clap::{Parser, Subcommand};

/// conductor — a resilient voice-conversation gateway.
#[derive(Debug, Parser)]
#[command(name = "conductor-gateway", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the gateway server (default when no subcommand is given).
    Serve,
    /// Run the startup health-check battery against the current configuration.
    Doctor,
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
    /// Chaos-experiment control (talks to a locally running gateway's HTTP surface).
    #[command(subcommand)]
    Chaos(ChaosCommand),
    /// Print version information.
    Version,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any errors.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}

#[derive(Debug, Subcommand)]
pub enum ChaosCommand {
    /// Enable chaos faults on a running gateway.
    Enable {
        /// Gateway base URL (e.g. http://127.0.0.1:3210).
        #[arg(long, default_value = "http://127.0.0.1:3210")]
        url: String,
        #[arg(long, default_value_t = 1.0)]
        llm_latency_multiplier: f64,
        #[arg(long, default_value_t = 0.0)]
        rate_limit_probability: f64,
        #[arg(long, default_value_t = 0.0)]
        tool_failure_rate: f64,
        #[arg(long, default_value_t = 0.0)]
        persistence_failure_rate: f64,
        #[arg(long, default_value_t = 1.0)]
        memory_inflation_factor: f64,
    },
    /// Disable chaos faults on a running gateway.
    Disable {
        #[arg(long, default_value = "http://127.0.0.1:3210")]
        url: String,
    },
}

// ── Config loading helper ─────────────────────────────────────────────

/// Load the configuration from the path specified by `CONDUCTOR_CONFIG` (or
/// `config.toml` by default). Returns the parsed [`Config`] and the path
/// that was used.
///
/// This is shared by `serve`, `doctor`, and `config` subcommands so the
/// logic lives in one place.
pub fn load_config() -> anyhow::Result<(conductor_domain::config::Config, String)> {
    let config_path = std::env::var("CONDUCTOR_CONFIG").unwrap_or_else(|_| "config.toml".into());

    let config = if std::path::Path::new(&config_path).exists() {
        let raw = std::fs::read_to_string(&config_path).map_err(|e| anyhow::anyhow!("reading {config_path}: {e}"))?;
        toml::from_str(&raw).map_err(|e| anyhow::anyhow!("parsing {config_path}: {e}"))?
    } else {
        conductor_domain::config::Config::default()
    };

    Ok((config, config_path))
}

/// Posts a chaos config to a running gateway's `/chaos/enable` endpoint.
pub async fn chaos_enable(
    url: &str,
    llm_latency_multiplier: f64,
    rate_limit_probability: f64,
    tool_failure_rate: f64,
    persistence_failure_rate: f64,
    memory_inflation_factor: f64,
) -> anyhow::Result<()> {
    let config = conductor_domain::config::ChaosConfig {
        enabled: true,
        llm_latency_multiplier,
        rate_limit_probability,
        tool_failure_rate,
        persistence_failure_rate,
        memory_inflation_factor,
        ..conductor_domain::config::ChaosConfig::default()
    };
    let client = reqwest::Client::new();
    let resp = client.post(format!("{url}/chaos/enable")).json(&config).send().await?;
    println!("{}", resp.text().await?);
    Ok(())
}

/// Posts to a running gateway's `/chaos/disable` endpoint.
pub async fn chaos_disable(url: &str) -> anyhow::Result<()> {
    let client = reqwest::Client::new();
    let resp = client.post(format!("{url}/chaos/disable")).send().await?;
    println!("{}", resp.text().await?);
    Ok(())
}
