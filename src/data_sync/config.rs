use crate::utils::address::Pubkey;
use crate::utils::config_loader::{LoadConfigError, load_from_file_sync};
use crate::utils::constants::{BALANSOL_PROGRAM_ID, Endpoints, SPL_TOKEN_PROGRAM_ID};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use url::Url;

/// Configuration for the data synchronization layer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// HTTP JSON-RPC URL used for bulk reads
    pub rpc_http_url: String,
    /// WebSocket JSON-RPC URL used for account/program subscriptions
    pub rpc_wss_url: String,
    /// Host serving `/price/{mint}` and `/metadata/{mint}`
    pub stat_host: String,
    /// Host serving `/stat/...` TVL and volume aggregates
    pub stat_rpc: String,
    /// Bulk token list
    pub token_list_url: String,
    /// Swap aggregator quote endpoint base
    pub quote_api_url: String,
    pub token_program_id: String,
    pub pool_program_id: String,
    /// Timeout for HTTP requests in seconds
    pub http_timeout_secs: u64,
    /// WebSocket connection timeout in seconds
    pub ws_connection_timeout_secs: u64,
    /// Maximum number of reconnection attempts
    pub max_reconnect_attempts: u32,
    /// Delay between reconnection attempts in seconds
    pub reconnect_delay_secs: u64,
    /// Buffer size for each subscription's event channel
    pub channel_buffer_size: usize,
    /// Quiet period before a swap quote request is issued
    pub quote_debounce_ms: u64,
    /// How long a fetched price stays fresh
    pub price_ttl_secs: u64,
    /// Directory for durable local storage
    pub storage_dir: PathBuf,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            rpc_http_url: Endpoints::RPC_HTTP.to_string(),
            rpc_wss_url: Endpoints::RPC_WS.to_string(),
            stat_host: Endpoints::STAT_HOST.to_string(),
            stat_rpc: Endpoints::STAT_RPC.to_string(),
            token_list_url: Endpoints::TOKEN_LIST.to_string(),
            quote_api_url: Endpoints::QUOTE_API.to_string(),
            token_program_id: SPL_TOKEN_PROGRAM_ID.to_string(),
            pool_program_id: BALANSOL_PROGRAM_ID.to_string(),
            http_timeout_secs: 10,
            ws_connection_timeout_secs: 30,
            max_reconnect_attempts: 5,
            reconnect_delay_secs: 2,
            channel_buffer_size: 256,
            quote_debounce_ms: 500,
            price_ttl_secs: 60,
            storage_dir: PathBuf::from(".dex-sync"),
        }
    }
}

fn env_parse<T: FromStr>(name: &str, target: &mut T) -> eyre::Result<()>
where
    T::Err: std::fmt::Display,
{
    if let Ok(raw) = std::env::var(name) {
        *target = raw.parse().map_err(|e| eyre::eyre!("Invalid {}: {}", name, e))?;
    }
    Ok(())
}

fn env_url(name: &str, target: &mut String) -> eyre::Result<()> {
    if let Ok(raw) = std::env::var(name) {
        Url::parse(&raw).map_err(|e| eyre::eyre!("Invalid {}: {}", name, e))?;
        *target = raw;
    }
    Ok(())
}

impl SyncConfig {
    /// Load configuration from environment variables on top of the defaults
    pub fn from_env() -> eyre::Result<Self> {
        let mut config = Self::default();

        env_url("RPC_HTTP_URL", &mut config.rpc_http_url)?;
        env_url("RPC_WSS_URL", &mut config.rpc_wss_url)?;
        env_url("STAT_HOST", &mut config.stat_host)?;
        env_url("STAT_RPC", &mut config.stat_rpc)?;
        env_url("TOKEN_LIST_URL", &mut config.token_list_url)?;
        env_url("QUOTE_API_URL", &mut config.quote_api_url)?;

        if let Ok(program_id) = std::env::var("POOL_PROGRAM_ID") {
            program_id.parse::<Pubkey>().map_err(|e| eyre::eyre!("Invalid POOL_PROGRAM_ID: {}", e))?;
            config.pool_program_id = program_id;
        }

        env_parse("HTTP_TIMEOUT_SECS", &mut config.http_timeout_secs)?;
        env_parse("WS_CONNECTION_TIMEOUT_SECS", &mut config.ws_connection_timeout_secs)?;
        env_parse("MAX_RECONNECT_ATTEMPTS", &mut config.max_reconnect_attempts)?;
        env_parse("RECONNECT_DELAY_SECS", &mut config.reconnect_delay_secs)?;
        env_parse("CHANNEL_BUFFER_SIZE", &mut config.channel_buffer_size)?;
        env_parse("QUOTE_DEBOUNCE_MS", &mut config.quote_debounce_ms)?;
        env_parse("PRICE_TTL_SECS", &mut config.price_ttl_secs)?;

        if let Ok(dir) = std::env::var("STORAGE_DIR") {
            config.storage_dir = PathBuf::from(dir);
        }

        Ok(config)
    }

    /// Load configuration from a TOML file. Missing fields take defaults;
    /// `${VAR}` references are expanded from the environment.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, LoadConfigError> {
        let config: Self = load_from_file_sync(path)?;
        config.validate().map_err(|e| LoadConfigError::ConfigError(e.to_string()))?;
        Ok(config)
    }

    pub fn validate(&self) -> eyre::Result<()> {
        for (name, url) in [
            ("rpc_http_url", &self.rpc_http_url),
            ("rpc_wss_url", &self.rpc_wss_url),
            ("stat_host", &self.stat_host),
            ("stat_rpc", &self.stat_rpc),
            ("token_list_url", &self.token_list_url),
            ("quote_api_url", &self.quote_api_url),
        ] {
            Url::parse(url).map_err(|e| eyre::eyre!("Invalid {}: {}", name, e))?;
        }
        self.token_program()?;
        self.pool_program()?;
        if self.channel_buffer_size == 0 {
            return Err(eyre::eyre!("channel_buffer_size must be positive"));
        }
        Ok(())
    }

    pub fn token_program(&self) -> eyre::Result<Pubkey> {
        self.token_program_id.parse().map_err(|e| eyre::eyre!("Invalid token_program_id: {}", e))
    }

    pub fn pool_program(&self) -> eyre::Result<Pubkey> {
        self.pool_program_id.parse().map_err(|e| eyre::eyre!("Invalid pool_program_id: {}", e))
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn ws_connection_timeout(&self) -> Duration {
        Duration::from_secs(self.ws_connection_timeout_secs)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.reconnect_delay_secs)
    }

    pub fn quote_debounce(&self) -> Duration {
        Duration::from_millis(self.quote_debounce_ms)
    }

    pub fn price_ttl(&self) -> Duration {
        Duration::from_secs(self.price_ttl_secs)
    }
}
