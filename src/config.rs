use clap::{Parser, ValueEnum};
use config::{Config as ConfigLoader, Environment, File};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::error::{AppError, AppResult};

/// Deployment environment, selects the config file and the log format
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Env {
    Dev,
    Prod,
}

impl Env {
    pub fn as_str(&self) -> &'static str {
        match self {
            Env::Dev => "dev",
            Env::Prod => "prod",
        }
    }
}

/// Command line arguments
#[derive(Debug, Clone, Parser)]
#[command(name = "server", about = "Submits transfers to the ledger and reconciles their outcome")]
pub struct Args {
    /// Folder holding the configuration files
    #[arg(long, short = 'c', default_value = "./config")]
    pub config_path: String,

    /// Prefix of the configuration file name, `<prefix>_<env>`
    #[arg(long, short = 'n', default_value = "config")]
    pub config_prefix: String,

    /// Environment alias
    #[arg(long, short = 'e', value_enum, default_value_t = Env::Dev)]
    pub env: Env,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub blockchain: BlockchainConfig,
    pub storage: StorageConfig,
    pub handler: HandlerConfig,
    pub confirmation: ConfirmationConfig,
    pub logger: LoggerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind_address: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BlockchainConfig {
    pub rpc_url: String,
    /// Upper bound for a single ledger call
    pub request_timeout_ms: u64,
}

impl BlockchainConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub database_url: String,
    pub max_connections: u32,
    /// Ids per batched "mark as shown" update
    pub page_size: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct HandlerConfig {
    pub transaction_interval_ms: u64,
    pub cur_block_interval_ms: u64,
}

impl HandlerConfig {
    pub fn transaction_interval(&self) -> Duration {
        Duration::from_millis(self.transaction_interval_ms)
    }

    pub fn cur_block_interval(&self) -> Duration {
        Duration::from_millis(self.cur_block_interval_ms)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ConfirmationConfig {
    /// A transaction succeeds once its confirmations are strictly above this
    pub success_confirmations_amount: u64,
    /// Recent-transactions query keeps rows below this many confirmations
    pub for_last_confirmations_amount: u64,
    pub reconcile_balances_on_submit: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggerConfig {
    pub level: String,
}

impl Config {
    /// Defaults, then `<config_path>/<prefix>_<env>.*` if present, then
    /// `ETH_CLIENT__SECTION__KEY` variables, then `DATABASE_URL`.
    pub fn load(args: &Args) -> AppResult<Self> {
        let file = Path::new(&args.config_path)
            .join(format!("{}_{}", args.config_prefix, args.env.as_str()));

        let config: Config = ConfigLoader::builder()
            .set_default("server.bind_address", "0.0.0.0:8080")?
            .set_default("blockchain.rpc_url", "http://127.0.0.1:8545")?
            .set_default("blockchain.request_timeout_ms", 10_000_i64)?
            .set_default("storage.database_url", "postgresql://localhost/eth_client")?
            .set_default("storage.max_connections", 10_i64)?
            .set_default("storage.page_size", 100_i64)?
            .set_default("handler.transaction_interval_ms", 5_000_i64)?
            .set_default("handler.cur_block_interval_ms", 3_000_i64)?
            .set_default("confirmation.success_confirmations_amount", 6_i64)?
            .set_default("confirmation.for_last_confirmations_amount", 3_i64)?
            .set_default("confirmation.reconcile_balances_on_submit", true)?
            .set_default("logger.level", "info")?
            .add_source(File::with_name(&file.to_string_lossy()).required(false))
            .add_source(
                Environment::with_prefix("ETH_CLIENT")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("storage.database_url", std::env::var("DATABASE_URL").ok())?
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> AppResult<()> {
        if self.handler.transaction_interval_ms == 0 || self.handler.cur_block_interval_ms == 0 {
            return Err(AppError::Config("handler intervals must be positive".to_string()));
        }
        if self.storage.page_size == 0 {
            return Err(AppError::Config("storage.page_size must be positive".to_string()));
        }
        if self.blockchain.request_timeout_ms == 0 {
            return Err(AppError::Config(
                "blockchain.request_timeout_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
