pub mod classify;
pub mod snapshot;
pub mod window;

use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{bail, Context, Result};
use futures::future::try_join_all;
use tracing::{debug, info};

use crate::config::Config;
use crate::helium::HeliumApi;
use crate::point::{Point, PointBuilder};
use crate::price::PriceApi;
use crate::sink::Sink;

use classify::{classify, HotspotMeta};
use window::fetch_window;

pub const MEASUREMENT_JOB: &str = "helium_job";

/// Coordinates one collection run.
///
/// A run fixes a single timestamp shared by every non-activity point,
/// validates the required configuration before any I/O, brackets the
/// concurrent batch with start/completion marker points, and flushes the
/// sink once everything has settled. The per-hotspot pipelines and the
/// three snapshot fetches form one fail-fast group: the first failure
/// rejects the whole run.
pub struct Collector<'a, A, P, S> {
    cfg: &'a Config,
    api: &'a A,
    price: &'a P,
    sink: &'a S,
}

impl<'a, A: HeliumApi, P: PriceApi, S: Sink> Collector<'a, A, P, S> {
    pub fn new(cfg: &'a Config, api: &'a A, price: &'a P, sink: &'a S) -> Self {
        Self {
            cfg,
            api,
            price,
            sink,
        }
    }

    /// Run the collection with the current wall clock as run timestamp.
    pub async fn run(&self) -> Result<String> {
        self.run_at(SystemTime::now()).await
    }

    /// Run the collection with an explicit run timestamp.
    pub async fn run_at(&self, run_timestamp: SystemTime) -> Result<String> {
        let hotspots = self.cfg.hotspot_ids();
        if hotspots.is_empty() {
            bail!("no hotspots configured (hotspots)");
        }
        if self.cfg.wallet.trim().is_empty() {
            bail!("no wallet configured (wallet)");
        }

        let since = window_start(run_timestamp, self.cfg.lookback.as_secs())?;
        debug!(hotspots = hotspots.len(), since, "collection running");

        let debug_mode = self.cfg.debug_to_console;
        if !debug_mode {
            // Flushed before the batch so operators can detect a run that
            // started but never finished.
            self.sink.write_point(marker(run_timestamp, "started"));
            self.sink
                .flush()
                .await
                .context("flushing start marker")?;
        }

        let hotspot_tasks = hotspots
            .iter()
            .map(|id| self.process_hotspot(id, since, run_timestamp));

        let (activity_counts, _, _, _) = tokio::try_join!(
            try_join_all(hotspot_tasks),
            self.collect_stats(run_timestamp),
            self.collect_account(run_timestamp),
            self.collect_price(run_timestamp),
        )?;

        if !debug_mode {
            debug!("collection flushing");
            self.sink.write_point(marker(run_timestamp, "completed"));
            self.sink
                .flush()
                .await
                .context("flushing collected points")?;
        }

        let activity_points: usize = activity_counts.iter().sum();
        debug!(activity_points, "collection done");

        Ok(format!(
            "collected {activity_points} activity points from {} hotspots",
            hotspots.len()
        ))
    }

    /// One hotspot's pipeline: snapshot point, windowed fetch, classify.
    async fn process_hotspot(
        &self,
        hotspot_id: &str,
        since: u64,
        run_timestamp: SystemTime,
    ) -> Result<usize> {
        let hotspot = self
            .api
            .fetch_hotspot(hotspot_id)
            .await
            .with_context(|| format!("fetching hotspot {hotspot_id}"))?;

        info!(hotspot = %hotspot.name, since, "fetching activity window");
        self.sink
            .write_point(snapshot::hotspot_point(&hotspot, run_timestamp));

        let records = fetch_window(self.api, hotspot_id, since).await?;
        if records.is_empty() {
            info!(hotspot = %hotspot.name, since, "no activity in window");
            return Ok(0);
        }

        let meta = HotspotMeta::from_hotspot(&hotspot);
        let points: Vec<Point> = records
            .iter()
            .filter_map(|record| classify(&meta, record))
            .collect();

        info!(
            hotspot = %hotspot.name,
            records = records.len(),
            points = points.len(),
            "classified activity"
        );

        let count = points.len();
        self.sink.write_points(points);
        Ok(count)
    }

    async fn collect_stats(&self, run_timestamp: SystemTime) -> Result<()> {
        let stats = self
            .api
            .fetch_stats()
            .await
            .context("collecting network stats")?;

        info!(blocks = stats.blocks, "collected network stats");
        self.sink
            .write_point(snapshot::network_stats_point(&stats, run_timestamp));
        Ok(())
    }

    async fn collect_account(&self, run_timestamp: SystemTime) -> Result<()> {
        let account = self
            .api
            .fetch_account(&self.cfg.wallet)
            .await
            .context("collecting account stats")?;

        info!(account = %account.address, "collected account balances");
        self.sink
            .write_point(snapshot::account_point(&account, run_timestamp));
        Ok(())
    }

    async fn collect_price(&self, run_timestamp: SystemTime) -> Result<()> {
        let quote = self
            .price
            .fetch_price()
            .await
            .context("collecting reference price")?;

        info!(usd = quote.usd, eur = quote.eur, "collected reference price");
        self.sink
            .write_point(snapshot::price_point(&quote, run_timestamp));
        Ok(())
    }
}

/// Start/completion marker point bracketing one run.
fn marker(run_timestamp: SystemTime, field: &str) -> Point {
    PointBuilder::new(MEASUREMENT_JOB, run_timestamp)
        .tag("job", "helium")
        .bool_field(field, true)
        .build()
}

/// Lower window boundary in epoch seconds.
fn window_start(run_timestamp: SystemTime, lookback_secs: u64) -> Result<u64> {
    let now = run_timestamp
        .duration_since(UNIX_EPOCH)
        .context("run timestamp before epoch")?
        .as_secs();
    Ok(now.saturating_sub(lookback_secs))
}
