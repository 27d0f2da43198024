use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;

/// Top-level configuration for the exporter.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// Comma-separated identifiers of the monitored hotspots.
    #[serde(default)]
    pub hotspots: String,

    /// Address of the monitored account.
    #[serde(default)]
    pub wallet: String,

    /// How far back to fetch hotspot activity. Default: 4h.
    #[serde(default = "default_lookback", with = "humantime_serde")]
    pub lookback: Duration,

    /// Print points to the console instead of writing to InfluxDB.
    #[serde(default)]
    pub debug_to_console: bool,

    /// Helium API connection configuration.
    #[serde(default)]
    pub helium: HeliumConfig,

    /// Price reference API configuration.
    #[serde(default)]
    pub price: PriceConfig,

    /// InfluxDB sink configuration.
    #[serde(default)]
    pub influx: InfluxConfig,
}

/// Helium API connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct HeliumConfig {
    /// Helium API base URL.
    #[serde(default = "default_helium_api_url")]
    pub api_url: String,

    /// Request timeout. Default: 10s.
    #[serde(default = "default_api_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

/// Price reference API configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct PriceConfig {
    /// CoinGecko API base URL.
    #[serde(default = "default_price_api_url")]
    pub api_url: String,

    /// Request timeout. Default: 10s.
    #[serde(default = "default_api_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

/// InfluxDB sink configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct InfluxConfig {
    /// InfluxDB base URL (e.g., "https://influx.example.com:8086").
    #[serde(default)]
    pub url: String,

    /// Organization name.
    #[serde(default)]
    pub org: String,

    /// Target bucket.
    #[serde(default)]
    pub bucket: String,

    /// API token.
    #[serde(default)]
    pub token: String,

    /// Write timeout. Default: 10s.
    #[serde(default = "default_api_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

fn default_lookback() -> Duration {
    Duration::from_secs(4 * 3600)
}

fn default_api_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_helium_api_url() -> String {
    "https://api.helium.io".to_string()
}

fn default_price_api_url() -> String {
    "https://api.coingecko.com".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            hotspots: String::new(),
            wallet: String::new(),
            lookback: default_lookback(),
            debug_to_console: false,
            helium: HeliumConfig::default(),
            price: PriceConfig::default(),
            influx: InfluxConfig::default(),
        }
    }
}

impl Default for HeliumConfig {
    fn default() -> Self {
        Self {
            api_url: default_helium_api_url(),
            timeout: default_api_timeout(),
        }
    }
}

impl Default for PriceConfig {
    fn default() -> Self {
        Self {
            api_url: default_price_api_url(),
            timeout: default_api_timeout(),
        }
    }
}

impl Default for InfluxConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            org: String::new(),
            bucket: String::new(),
            token: String::new(),
            timeout: default_api_timeout(),
        }
    }
}

impl Config {
    /// Load configuration from a YAML file and validate it.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;

        let cfg: Config = serde_yaml::from_str(&data)
            .with_context(|| format!("parsing {}", path.display()))?;

        cfg.validate()?;
        Ok(cfg)
    }

    /// Cross-field validation of sink settings. The monitored hotspot and
    /// wallet identifiers are checked by the collector at run entry.
    pub fn validate(&self) -> Result<()> {
        if self.debug_to_console {
            return Ok(());
        }

        if self.influx.url.is_empty() {
            bail!("influx.url is required unless debug_to_console is set");
        }
        if self.influx.org.is_empty() {
            bail!("influx.org is required unless debug_to_console is set");
        }
        if self.influx.bucket.is_empty() {
            bail!("influx.bucket is required unless debug_to_console is set");
        }
        if self.influx.token.is_empty() {
            bail!("influx.token is required unless debug_to_console is set");
        }

        Ok(())
    }

    /// Monitored hotspot identifiers, trimmed, empty entries removed.
    pub fn hotspot_ids(&self) -> Vec<String> {
        self.hotspots
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_owned)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_values() {
        let cfg = Config::default();
        assert_eq!(cfg.lookback, Duration::from_secs(4 * 3600));
        assert!(!cfg.debug_to_console);
        assert_eq!(cfg.helium.api_url, "https://api.helium.io");
        assert_eq!(cfg.helium.timeout, Duration::from_secs(10));
        assert_eq!(cfg.price.api_url, "https://api.coingecko.com");
    }

    #[test]
    fn test_parse_minimal_yaml() {
        let cfg: Config = serde_yaml::from_str(
            r#"
hotspots: "abc,def"
wallet: "wal"
debug_to_console: true
"#,
        )
        .expect("should parse");

        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.hotspot_ids(), vec!["abc", "def"]);
        assert_eq!(cfg.wallet, "wal");
    }

    #[test]
    fn test_parse_lookback_humantime() {
        let cfg: Config = serde_yaml::from_str("lookback: 12h").expect("should parse");
        assert_eq!(cfg.lookback, Duration::from_secs(12 * 3600));
    }

    #[test]
    fn test_hotspot_ids_trims_and_skips_empty() {
        let cfg = Config {
            hotspots: " abc , ,def,".to_string(),
            ..Config::default()
        };
        assert_eq!(cfg.hotspot_ids(), vec!["abc", "def"]);

        let empty = Config::default();
        assert!(empty.hotspot_ids().is_empty());
    }

    #[test]
    fn test_validation_requires_influx_unless_debug() {
        let cfg = Config {
            hotspots: "abc".to_string(),
            wallet: "wal".to_string(),
            ..Config::default()
        };
        let err = cfg.validate().expect_err("should fail");
        assert!(err.to_string().contains("influx.url"));

        let debug = Config {
            debug_to_console: true,
            ..Config::default()
        };
        assert!(debug.validate().is_ok());
    }

    #[test]
    fn test_validation_names_missing_key() {
        let cfg = Config {
            influx: InfluxConfig {
                url: "http://localhost:8086".to_string(),
                org: "org".to_string(),
                bucket: "bucket".to_string(),
                ..InfluxConfig::default()
            },
            ..Config::default()
        };
        let err = cfg.validate().expect_err("should fail");
        assert!(err.to_string().contains("influx.token"));
    }
}
