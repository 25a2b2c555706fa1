//! CoinGecko, Etherscan and Google Custom Search clients

use std::time::Duration;

use async_trait::async_trait;
use ethers::types::Address;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::{Oracle, SearchHit, Verification};
use crate::config::OracleConfig;
use crate::error::{Error, Result};

/// HTTP-backed [`Oracle`]
pub struct HttpOracle {
    client: Client,
    coingecko_url: String,
    etherscan_url: String,
    etherscan_api_key: String,
    search_url: String,
    google_api_key: String,
    google_cx: String,
}

impl HttpOracle {
    pub fn new(config: &OracleConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            coingecko_url: config.coingecko_url.trim_end_matches('/').to_string(),
            etherscan_url: config.etherscan_url.clone(),
            etherscan_api_key: config.etherscan_api_key.clone(),
            search_url: config.search_url.clone(),
            google_api_key: config.google_api_key.clone(),
            google_cx: config.google_cx.clone(),
        })
    }

    async fn get_json(&self, service: &str, url: &str, query: &[(&str, &str)]) -> Result<Value> {
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| Error::Oracle(format!("{} request failed: {}", service, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Oracle(format!("{} API error {}: {}", service, status, body)));
        }

        response
            .json()
            .await
            .map_err(|e| Error::Deserialization(format!("Failed to parse {} response: {}", service, e)))
    }
}

#[async_trait]
impl Oracle for HttpOracle {
    async fn price(&self, token: Address) -> Result<Option<f64>> {
        let address = format!("{:?}", token);
        let url = format!("{}/simple/token_price/ethereum", self.coingecko_url);
        let body = self
            .get_json(
                "CoinGecko",
                &url,
                &[("contract_addresses", address.as_str()), ("vs_currencies", "usd")],
            )
            .await?;

        let price = parse_token_price(&body, token);
        debug!(token = ?token, ?price, "Fetched token price");
        Ok(price)
    }

    async fn verification(&self, token: Address) -> Result<Verification> {
        if self.etherscan_api_key.is_empty() {
            return Err(Error::MissingEnvVar("ETHERSCAN_API_KEY".into()));
        }

        let address = format!("{:?}", token);
        let body: EtherscanResponse = serde_json::from_value(
            self.get_json(
                "Etherscan",
                &self.etherscan_url,
                &[
                    ("module", "contract"),
                    ("action", "getsourcecode"),
                    ("address", address.as_str()),
                    ("apikey", self.etherscan_api_key.as_str()),
                ],
            )
            .await?,
        )
        .map_err(|e| Error::Deserialization(format!("Etherscan response: {}", e)))?;

        Ok(body.into_verification())
    }

    async fn sentiment(&self, query: &str) -> Result<Vec<SearchHit>> {
        if self.google_api_key.is_empty() || self.google_cx.is_empty() {
            return Err(Error::MissingEnvVar("GOOGLE_API_KEY / GOOGLE_CX".into()));
        }

        let body: SearchResponse = serde_json::from_value(
            self.get_json(
                "Google search",
                &self.search_url,
                &[
                    ("key", self.google_api_key.as_str()),
                    ("cx", self.google_cx.as_str()),
                    ("q", query),
                ],
            )
            .await?,
        )
        .map_err(|e| Error::Deserialization(format!("Search response: {}", e)))?;

        Ok(body
            .items
            .into_iter()
            .map(|item| SearchHit {
                title: item.title,
                snippet: item.snippet,
            })
            .collect())
    }
}

/// CoinGecko keys the response by lowercase contract address
fn parse_token_price(body: &Value, token: Address) -> Option<f64> {
    let key = format!("{:?}", token).to_lowercase();
    body.get(&key)?.get("usd")?.as_f64()
}

#[derive(Debug, Deserialize)]
struct EtherscanResponse {
    status: String,
    #[serde(default)]
    result: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct EtherscanSource {
    #[serde(default)]
    source_code: String,
    #[serde(default)]
    contract_name: String,
}

impl EtherscanResponse {
    fn into_verification(self) -> Verification {
        if self.status != "1" {
            return Verification::default();
        }

        // On error Etherscan puts a plain string in `result`
        let first = serde_json::from_value::<Vec<EtherscanSource>>(self.result)
            .ok()
            .and_then(|sources| sources.into_iter().next());

        match first {
            Some(source) if !source.source_code.is_empty() => Verification {
                verified: true,
                contract_name: Some(source.contract_name).filter(|n| !n.is_empty()),
            },
            _ => Verification::default(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    snippet: String,
}
