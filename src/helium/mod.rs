pub mod activity;

use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::config::HeliumConfig;

use activity::{decode_activity, ActivityRecord};

/// Bones per HNT/HST; account balances come over the wire as integers.
const BONES_PER_UNIT: f64 = 100_000_000.0;

/// Read-only snapshot of a monitored hotspot, fetched once per run.
#[derive(Debug, Clone)]
pub struct Hotspot {
    pub id: String,
    /// Human-readable name derived from the raw three-word name.
    pub name: String,
    /// Short city + short street, as shown by the explorer.
    pub geotext: String,
    pub lat: f64,
    pub lng: f64,
    pub reward_scale: Option<f64>,
    pub last_change_block: u64,
}

/// One page of a hotspot's activity feed, newest first. A present cursor
/// means the source has more pages.
#[derive(Debug, Clone)]
pub struct ActivityPage {
    pub records: Vec<ActivityRecord>,
    pub cursor: Option<String>,
}

impl ActivityPage {
    pub fn has_more(&self) -> bool {
        self.cursor.is_some()
    }
}

/// Network-wide counters from the stats endpoint.
#[derive(Debug, Clone, Copy, Default)]
pub struct NetworkStats {
    pub transactions: u64,
    pub challenges: u64,
    pub blocks: u64,
    pub challenges_active: u64,
    pub hotspots_registered: u64,
    pub hotspots_online: u64,
    pub hotspots_dataonly: u64,
    pub block_time_avg: f64,
}

/// Balances of the monitored account, unit-scaled to floats.
#[derive(Debug, Clone)]
pub struct Account {
    pub address: String,
    pub balance_hnt: f64,
    pub balance_staked_hnt: f64,
    pub balance_sec_hst: f64,
    pub balance_dc: f64,
}

/// Helium API client trait. Implemented by the HTTP [`Client`] and by
/// in-memory fakes in tests.
pub trait HeliumApi: Send + Sync {
    /// Fetch one hotspot's descriptive snapshot.
    fn fetch_hotspot(&self, id: &str) -> impl std::future::Future<Output = Result<Hotspot>> + Send;

    /// Fetch one page of a hotspot's activity feed. `cursor` of `None`
    /// requests the most recent page.
    fn fetch_activity_page(
        &self,
        id: &str,
        cursor: Option<&str>,
    ) -> impl std::future::Future<Output = Result<ActivityPage>> + Send;

    /// Fetch network-wide statistics.
    fn fetch_stats(&self) -> impl std::future::Future<Output = Result<NetworkStats>> + Send;

    /// Fetch one account's balances.
    fn fetch_account(
        &self,
        address: &str,
    ) -> impl std::future::Future<Output = Result<Account>> + Send;
}

/// HTTP-based Helium API client.
pub struct Client {
    http: reqwest::Client,
    endpoint: String,
}

impl Client {
    /// Create a new Helium API client.
    pub fn new(cfg: &HeliumConfig) -> Result<Self> {
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

    /// Perform a GET request and deserialize the JSON response.
    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{}", self.endpoint, path);

        let response = self
            .http
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await
            .with_context(|| format!("requesting {path}"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("unexpected status {} from {}: {}", status, path, body);
        }

        response
            .json()
            .await
            .with_context(|| format!("decoding response from {path}"))
    }
}

impl HeliumApi for Client {
    async fn fetch_hotspot(&self, id: &str) -> Result<Hotspot> {
        debug!(hotspot = id, "fetching hotspot snapshot");

        let resp: HotspotApiResponse = self
            .get_json(&format!("/v1/hotspots/{id}"))
            .await
            .with_context(|| format!("fetching hotspot {id}"))?;

        Ok(resp.data.into_hotspot())
    }

    async fn fetch_activity_page(&self, id: &str, cursor: Option<&str>) -> Result<ActivityPage> {
        debug!(hotspot = id, cursor, "fetching activity page");

        let path = match cursor {
            Some(cursor) => format!("/v1/hotspots/{id}/activity?cursor={cursor}"),
            None => format!("/v1/hotspots/{id}/activity"),
        };

        let resp: ActivityApiResponse = self
            .get_json(&path)
            .await
            .with_context(|| format!("fetching activity for {id}"))?;

        let records = resp
            .data
            .iter()
            .map(decode_activity)
            .collect::<Result<Vec<_>>>()
            .with_context(|| format!("decoding activity page for {id}"))?;

        Ok(ActivityPage {
            records,
            cursor: resp.cursor,
        })
    }

    async fn fetch_stats(&self) -> Result<NetworkStats> {
        debug!("fetching network stats");

        let resp: StatsApiResponse = self
            .get_json("/v1/stats")
            .await
            .context("fetching network stats")?;

        Ok(NetworkStats {
            transactions: resp.data.counts.transactions,
            challenges: resp.data.counts.challenges,
            blocks: resp.data.counts.blocks,
            challenges_active: resp.data.challenge_counts.active,
            hotspots_registered: resp.data.counts.hotspots,
            hotspots_online: resp.data.counts.hotspots_online,
            hotspots_dataonly: resp.data.counts.hotspots_dataonly,
            block_time_avg: resp.data.block_times.last_hour.avg,
        })
    }

    async fn fetch_account(&self, address: &str) -> Result<Account> {
        debug!(account = address, "fetching account balances");

        let resp: AccountApiResponse = self
            .get_json(&format!("/v1/accounts/{address}"))
            .await
            .with_context(|| format!("fetching account {address}"))?;

        Ok(Account {
            address: resp.data.address,
            balance_hnt: resp.data.balance as f64 / BONES_PER_UNIT,
            balance_staked_hnt: resp.data.staked_balance as f64 / BONES_PER_UNIT,
            balance_sec_hst: resp.data.sec_balance as f64 / BONES_PER_UNIT,
            // Data credits are not divisible; the API value is the count.
            balance_dc: resp.data.dc_balance as f64,
        })
    }
}

/// Derives the explorer-style display name from a raw hotspot name:
/// de-hyphenate and title-case ("rare-amber-fox" -> "Rare Amber Fox").
pub fn display_name(raw: &str) -> String {
    raw.split('-')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

// --- JSON response structures ---

#[derive(Deserialize)]
struct HotspotApiResponse {
    data: HotspotData,
}

#[derive(Deserialize)]
struct HotspotData {
    address: String,
    name: String,
    geocode: GeocodeData,
    lat: f64,
    lng: f64,
    reward_scale: Option<f64>,
    #[serde(default)]
    last_change_block: u64,
}

impl HotspotData {
    fn into_hotspot(self) -> Hotspot {
        let name = display_name(&self.name);
        let geotext = format!("{}, {}", self.geocode.short_city, self.geocode.short_street);
        Hotspot {
            id: self.address,
            name,
            geotext,
            lat: self.lat,
            lng: self.lng,
            reward_scale: self.reward_scale,
            last_change_block: self.last_change_block,
        }
    }
}

#[derive(Deserialize)]
struct GeocodeData {
    #[serde(default)]
    short_city: String,
    #[serde(default)]
    short_street: String,
}

#[derive(Deserialize)]
struct ActivityApiResponse {
    data: Vec<Value>,
    #[serde(default)]
    cursor: Option<String>,
}

#[derive(Deserialize)]
struct StatsApiResponse {
    data: StatsData,
}

#[derive(Deserialize)]
struct StatsData {
    counts: StatsCounts,
    challenge_counts: ChallengeCounts,
    block_times: BlockTimes,
}

#[derive(Deserialize)]
struct StatsCounts {
    transactions: u64,
    challenges: u64,
    blocks: u64,
    hotspots: u64,
    #[serde(default)]
    hotspots_online: u64,
    #[serde(default)]
    hotspots_dataonly: u64,
}

#[derive(Deserialize)]
struct ChallengeCounts {
    active: u64,
}

#[derive(Deserialize)]
struct BlockTimes {
    last_hour: BlockTimeWindow,
}

#[derive(Deserialize)]
struct BlockTimeWindow {
    avg: f64,
}

#[derive(Deserialize)]
struct AccountApiResponse {
    data: AccountData,
}

#[derive(Deserialize)]
struct AccountData {
    address: String,
    #[serde(default)]
    balance: u64,
    #[serde(default)]
    staked_balance: u64,
    #[serde(default)]
    sec_balance: u64,
    #[serde(default)]
    dc_balance: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_display_name() {
        assert_eq!(display_name("rare-amber-fox"), "Rare Amber Fox");
        assert_eq!(display_name("tall-fox"), "Tall Fox");
        assert_eq!(display_name(""), "");
    }

    #[test]
    fn test_hotspot_decoding() {
        let resp: HotspotApiResponse = serde_json::from_value(json!({
            "data": {
                "address": "abc",
                "name": "rare-amber-fox",
                "geocode": {"short_city": "Berlin", "short_street": "Unter den Linden"},
                "lat": 52.5,
                "lng": 13.4,
                "reward_scale": 0.8,
                "last_change_block": 1_234_567u64,
            }
        }))
        .expect("should decode");

        let hotspot = resp.data.into_hotspot();
        assert_eq!(hotspot.id, "abc");
        assert_eq!(hotspot.name, "Rare Amber Fox");
        assert_eq!(hotspot.geotext, "Berlin, Unter den Linden");
        assert_eq!(hotspot.reward_scale, Some(0.8));
        assert_eq!(hotspot.last_change_block, 1_234_567);
    }

    #[test]
    fn test_stats_decoding() {
        let resp: StatsApiResponse = serde_json::from_value(json!({
            "data": {
                "counts": {
                    "transactions": 100u64,
                    "challenges": 50u64,
                    "blocks": 900u64,
                    "hotspots": 30_000u64,
                    "hotspots_online": 25_000u64,
                    "hotspots_dataonly": 1_000u64,
                },
                "challenge_counts": {"active": 12u64},
                "block_times": {"last_hour": {"avg": 61.5}},
            }
        }))
        .expect("should decode");

        assert_eq!(resp.data.counts.blocks, 900);
        assert_eq!(resp.data.challenge_counts.active, 12);
        assert!((resp.data.block_times.last_hour.avg - 61.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_account_balance_scaling() {
        let data = AccountData {
            address: "wal".to_string(),
            balance: 250_000_000,
            staked_balance: 100_000_000,
            sec_balance: 0,
            dc_balance: 42,
        };

        assert!((data.balance as f64 / BONES_PER_UNIT - 2.5).abs() < f64::EPSILON);
        assert!((data.staked_balance as f64 / BONES_PER_UNIT - 1.0).abs() < f64::EPSILON);
        assert_eq!(data.dc_balance, 42);
    }

    #[test]
    fn test_activity_page_has_more() {
        let page = ActivityPage {
            records: Vec::new(),
            cursor: Some("next".to_string()),
        };
        assert!(page.has_more());

        let last = ActivityPage {
            records: Vec::new(),
            cursor: None,
        };
        assert!(!last.has_more());
    }
}
