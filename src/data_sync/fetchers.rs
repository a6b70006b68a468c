use crate::data_sync::config::SyncConfig;
use crate::utils::address::Pubkey;
use crate::utils::token::MintMetadata;
use eyre::{Result, eyre};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

/// 24h/7d traded volume across all pools.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VolumeStat {
    pub total_vol24h: f64,
    pub total_vol7d: f64,
}

/// Stateless HTTP reads of prices, token metadata and statistics.
///
/// Every public method degrades to a default value on failure (`0`, an empty
/// list, `None`) and logs the cause; nothing here returns an error.
#[derive(Debug, Clone)]
pub struct RemoteFetchers {
    http_client: reqwest::Client,
    stat_host: String,
    stat_rpc: String,
    token_list_url: String,
}

impl RemoteFetchers {
    pub fn new(config: &SyncConfig) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.http_timeout())
            .build()
            .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

        Ok(Self {
            http_client,
            stat_host: config.stat_host.trim_end_matches('/').to_string(),
            stat_rpc: config.stat_rpc.trim_end_matches('/').to_string(),
            token_list_url: config.token_list_url.clone(),
        })
    }

    /// `GET {stat_host}/price/{mint}`; 0 on any failure.
    pub async fn fetch_price(&self, mint: &Pubkey) -> f64 {
        let url = format!("{}/price/{}", self.stat_host, mint);
        match self.get_json::<Value>(&url).await.and_then(|v| price_from_value(&v)) {
            Ok(price) => price,
            Err(e) => {
                warn!("Price fetch for {} failed: {}", mint, e);
                0.0
            }
        }
    }

    /// Bulk token list; empty on any failure.
    pub async fn fetch_token_list(&self) -> Vec<MintMetadata> {
        match self.get_json::<Vec<MintMetadata>>(&self.token_list_url).await {
            Ok(list) => {
                debug!("Fetched {} token list entries", list.len());
                list
            }
            Err(e) => {
                warn!("Token list fetch failed: {}", e);
                Vec::new()
            }
        }
    }

    /// `GET {stat_host}/metadata/{mint}`; `None` on any failure.
    pub async fn fetch_metadata(&self, mint: &Pubkey) -> Option<MintMetadata> {
        let url = format!("{}/metadata/{}", self.stat_host, mint);
        match self.get_json::<MintMetadata>(&url).await {
            Ok(metadata) if metadata.address == *mint => Some(metadata),
            Ok(metadata) => {
                warn!("Metadata for {} came back for {}", mint, metadata.address);
                None
            }
            Err(e) => {
                warn!("Metadata fetch for {} failed: {}", mint, e);
                None
            }
        }
    }

    /// `GET {stat_rpc}/stat/balansol/all-tvl`; 0 on failure.
    pub async fn fetch_all_tvl(&self) -> f64 {
        let url = format!("{}/stat/balansol/all-tvl", self.stat_rpc);
        self.fetch_number(&url).await
    }

    /// `GET {stat_rpc}/stat/total-tvl/{address}`; 0 on failure.
    pub async fn fetch_total_tvl(&self, address: &Pubkey) -> f64 {
        let url = format!("{}/stat/total-tvl/{}", self.stat_rpc, address);
        self.fetch_number(&url).await
    }

    /// `GET {stat_rpc}/stat/balansol/all-volume`; zeroes on failure.
    pub async fn fetch_all_volume(&self) -> VolumeStat {
        let url = format!("{}/stat/balansol/all-volume", self.stat_rpc);
        match self.get_json::<VolumeStat>(&url).await {
            Ok(stat) => stat,
            Err(e) => {
                warn!("Volume fetch failed: {}", e);
                VolumeStat::default()
            }
        }
    }

    async fn fetch_number(&self, url: &str) -> f64 {
        match self.get_json::<Value>(url).await.and_then(|v| number_from_value(&v)) {
            Ok(n) => n,
            Err(e) => {
                warn!("Stat fetch {} failed: {}", url, e);
                0.0
            }
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self.http_client.get(url).header("Accept", "application/json").send().await?;
        if !response.status().is_success() {
            return Err(eyre!("HTTP {}", response.status()));
        }
        Ok(response.json().await?)
    }
}

fn number_from_value(value: &Value) -> Result<f64> {
    match value {
        Value::Number(n) => n.as_f64().ok_or_else(|| eyre!("not a finite number")),
        Value::String(s) => s.parse().map_err(|e| eyre!("bad number {:?}: {}", s, e)),
        other => Err(eyre!("unexpected payload {}", other)),
    }
}

// accepts a bare number or `{ "price": n }`
fn price_from_value(value: &Value) -> Result<f64> {
    match value.get("price") {
        Some(inner) => number_from_value(inner),
        None => number_from_value(value),
    }
}
