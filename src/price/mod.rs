use std::collections::HashMap;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tracing::debug;

use crate::config::PriceConfig;

/// Asset identifier on the price reference API.
const ASSET_ID: &str = "helium";

/// Reference price of the asset in the configured currencies.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceQuote {
    pub usd: f64,
    pub eur: f64,
}

/// Price reference client trait.
pub trait PriceApi: Send + Sync {
    /// Fetch the current reference price.
    fn fetch_price(&self) -> impl std::future::Future<Output = Result<PriceQuote>> + Send;
}

/// HTTP-based CoinGecko price client.
pub struct Client {
    http: reqwest::Client,
    endpoint: String,
}

impl Client {
    /// Create a new price reference client.
    pub fn new(cfg: &PriceConfig) -> Result<Self> {
        let timeout = if cfg.timeout.is_zero() {
            Duration::from_secs(10)
        } else {
            cfg.timeout
        };

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("building HTTP client")?;

        Ok(Self {
            http,
            endpoint: cfg.api_url.trim_end_matches('/').to_string(),
        })
    }
}

#[derive(Deserialize)]
struct SimplePriceResponse(HashMap<String, CurrencyQuotes>);

#[derive(Deserialize)]
struct CurrencyQuotes {
    usd: f64,
    eur: f64,
}

impl PriceApi for Client {
    async fn fetch_price(&self) -> Result<PriceQuote> {
        debug!(asset = ASSET_ID, "fetching reference price");

        let url = format!(
            "{}/api/v3/simple/price?ids={ASSET_ID}&vs_currencies=USD,EUR",
            self.endpoint
        );

        let response = self
            .http
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await
            .context("requesting reference price")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("unexpected status {} from price API: {}", status, body);
        }

        let resp: SimplePriceResponse = response
            .json()
            .await
            .context("decoding price response")?;

        let quotes = resp
            .0
            .get(ASSET_ID)
            .with_context(|| format!("price response missing asset {ASSET_ID:?}"))?;

        Ok(PriceQuote {
            usd: quotes.usd,
            eur: quotes.eur,
        })
    }
}
