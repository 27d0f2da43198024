use std::time::SystemTime;

use crate::helium::{Account, Hotspot, NetworkStats};
use crate::point::{Point, PointBuilder};
use crate::price::PriceQuote;

pub const MEASUREMENT_STATS: &str = "helium_stats";
pub const MEASUREMENT_ACCOUNT: &str = "helium_account";
pub const MEASUREMENT_PRICE: &str = "helium_price";
pub const MEASUREMENT_HOTSPOT: &str = "helium_hotspot";

/// Network-wide counters, stamped with the run timestamp.
pub fn network_stats_point(stats: &NetworkStats, run_timestamp: SystemTime) -> Point {
    PointBuilder::new(MEASUREMENT_STATS, run_timestamp)
        .int_field("transactions", clamp_u64(stats.transactions))
        .int_field("challenges", clamp_u64(stats.challenges))
        .int_field("blocks", clamp_u64(stats.blocks))
        .int_field("challenges_active", clamp_u64(stats.challenges_active))
        .int_field("hotspots", clamp_u64(stats.hotspots_registered))
        .int_field("hotspots_online", clamp_u64(stats.hotspots_online))
        .int_field("hotspots_dataonly", clamp_u64(stats.hotspots_dataonly))
        .float_field("block_time_avg", stats.block_time_avg)
        .build()
}

/// Monitored account balances, stamped with the run timestamp.
pub fn account_point(account: &Account, run_timestamp: SystemTime) -> Point {
    PointBuilder::new(MEASUREMENT_ACCOUNT, run_timestamp)
        .tag("account", &account.address)
        .float_field("balance_hnt", account.balance_hnt)
        .float_field("balance_staked_hnt", account.balance_staked_hnt)
        .float_field("balance_sec_hst", account.balance_sec_hst)
        .float_field("balance_dc_dc", account.balance_dc)
        .build()
}

/// Reference price, stamped with the run timestamp.
pub fn price_point(quote: &PriceQuote, run_timestamp: SystemTime) -> Point {
    PointBuilder::new(MEASUREMENT_PRICE, run_timestamp)
        .tag("source", "CoinGecko")
        .float_field("usd", quote.usd)
        .float_field("eur", quote.eur)
        .build()
}

/// Per-run descriptive snapshot of one monitored hotspot. Coordinates are
/// tags (and therefore strings) so they can be used for grouping.
pub fn hotspot_point(hotspot: &Hotspot, run_timestamp: SystemTime) -> Point {
    let mut point = PointBuilder::new(MEASUREMENT_HOTSPOT, run_timestamp)
        .tag("hotspot_id", &hotspot.id)
        .tag("hotspot_name", &hotspot.name)
        .tag("geotext", &hotspot.geotext)
        .tag("latitude", hotspot.lat.to_string())
        .tag("longitude", hotspot.lng.to_string())
        .int_field("last_change_block", clamp_u64(hotspot.last_change_block));

    if let Some(reward_scale) = hotspot.reward_scale {
        point = point.float_field("reward_scale", reward_scale);
    }

    point.build()
}

fn clamp_u64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
