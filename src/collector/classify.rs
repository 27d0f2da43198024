use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::warn;

use crate::helium::activity::{ActivityRecord, DataTransfer, PocReceipt, Rewards};
use crate::helium::Hotspot;
use crate::point::{Point, PointBuilder};

pub const MEASUREMENT_POC_ACTIVITY: &str = "helium_poc_activity";
pub const MEASUREMENT_REWARD: &str = "helium_reward";
pub const MEASUREMENT_DATA_TRANSFER: &str = "helium_data_transfer";
pub const MEASUREMENT_UNKNOWN_ACTIVITY: &str = "helium_unknown_activity";

/// Identity of the hotspot a record is being classified for. Name and
/// geotext come from the per-run snapshot when it is available.
#[derive(Debug, Clone)]
pub struct HotspotMeta {
    pub id: String,
    pub name: Option<String>,
    pub geotext: Option<String>,
}

impl HotspotMeta {
    /// Meta with only the identifier, for when no snapshot was fetched.
    pub fn bare(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            geotext: None,
        }
    }

    pub fn from_hotspot(hotspot: &Hotspot) -> Self {
        Self {
            id: hotspot.id.clone(),
            name: Some(hotspot.name.clone()),
            geotext: Some(hotspot.geotext.clone()),
        }
    }
}

/// Classifies one activity record into at most one point.
///
/// Pure and total: well-formed records never produce an error. Reward
/// batches with an unrecognized category classify to `None` (the record
/// is dropped); records of an unknown variant down-classify to the
/// generic unknown-activity measurement. The returned point is stamped
/// with the record's own event time, never the run timestamp.
pub fn classify(meta: &HotspotMeta, record: &ActivityRecord) -> Option<Point> {
    let event_time = UNIX_EPOCH + Duration::from_secs(record.time());

    match record {
        ActivityRecord::PocReceipt(receipt) => classify_receipt(meta, receipt, event_time),
        ActivityRecord::PocRequest(request) if request.challenger == meta.id => Some(
            event_point(meta, MEASUREMENT_POC_ACTIVITY, event_time)
                .tag("poc_role", "constructed_challenge")
                .build(),
        ),
        ActivityRecord::Rewards(rewards) => aggregate_rewards(meta, rewards, event_time),
        ActivityRecord::DataTransfer(transfer) => {
            Some(classify_data_transfer(meta, transfer, event_time))
        }
        ActivityRecord::Unknown(unknown) => {
            warn!(
                hotspot = %meta.id,
                activity_type = %unknown.type_name,
                "unknown activity variant"
            );
            Some(event_point(meta, MEASUREMENT_UNKNOWN_ACTIVITY, event_time).build())
        }
        ActivityRecord::PocRequest(request) => {
            warn!(
                hotspot = %meta.id,
                challenger = %request.challenger,
                "poc request does not involve this hotspot"
            );
            Some(event_point(meta, MEASUREMENT_UNKNOWN_ACTIVITY, event_time).build())
        }
    }
}

/// Resolves the hotspot's role in a PoC receipt.
///
/// The disambiguation predicates overlap on malformed records, so they
/// are evaluated in a fixed order: challenger, then first-hop challengee,
/// then first-hop witness. First match wins.
fn classify_receipt(meta: &HotspotMeta, receipt: &PocReceipt, event_time: SystemTime) -> Option<Point> {
    let first_hop = receipt.path.first();

    let role = if receipt.challenger == meta.id {
        "challenged_beaconer"
    } else if first_hop.is_some_and(|hop| hop.challengee == meta.id) {
        "broadcast_beacon"
    } else if first_hop.is_some_and(|hop| hop.witnesses.iter().any(|w| w.gateway == meta.id)) {
        "witnessed_beacon"
    } else {
        warn!(
            hotspot = %meta.id,
            challenger = %receipt.challenger,
            "poc receipt does not involve this hotspot"
        );
        return Some(event_point(meta, MEASUREMENT_UNKNOWN_ACTIVITY, event_time).build());
    };

    let mut point =
        event_point(meta, MEASUREMENT_POC_ACTIVITY, event_time).tag("poc_role", role);

    if let Some(hop) = first_hop {
        point = point.tag("poc_result", &hop.result);
        if role == "witnessed_beacon" {
            point = point.tag("beaconer", &hop.challengee);
        }
        point = point.int_field(
            "witnesses",
            i64::try_from(hop.witnesses.len()).unwrap_or(i64::MAX),
        );
    }

    Some(point.build())
}

/// Collapses a reward batch into a single point.
///
/// A single-component batch maps its category through the fixed explorer
/// table; an unrecognized category drops the whole record. Multi-component
/// batches are tagged `mixed` on both category keys. The amount field
/// always carries the batch total.
fn aggregate_rewards(meta: &HotspotMeta, rewards: &Rewards, event_time: SystemTime) -> Option<Point> {
    let (raw_category, explorer_category) = match rewards.rewards.as_slice() {
        [] => {
            warn!(hotspot = %meta.id, "reward batch without components, dropping record");
            return None;
        }
        [single] => match explorer_reward_category(&single.category) {
            Some(explorer) => (single.category.as_str(), explorer),
            None => {
                warn!(
                    hotspot = %meta.id,
                    category = %single.category,
                    "unrecognized reward category, dropping record"
                );
                return None;
            }
        },
        _ => ("mixed", "mixed"),
    };

    Some(
        event_point(meta, MEASUREMENT_REWARD, event_time)
            .tag("reward_type_poc", raw_category)
            .tag("reward_type_explorer", explorer_category)
            .float_field("reward_amount", rewards.total_amount())
            .build(),
    )
}

fn classify_data_transfer(
    meta: &HotspotMeta,
    transfer: &DataTransfer,
    event_time: SystemTime,
) -> Point {
    let first = transfer.summaries.first();
    let packets = first.map_or(0, |s| s.packets);
    let data_credits = first.map_or(0, |s| s.data_credits);

    event_point(meta, MEASUREMENT_DATA_TRANSFER, event_time)
        .int_field("packets", i64::try_from(packets).unwrap_or(i64::MAX))
        .int_field("data_credits", i64::try_from(data_credits).unwrap_or(i64::MAX))
        .build()
}

/// Maps a raw reward category code to its explorer-facing name.
fn explorer_reward_category(category: &str) -> Option<&'static str> {
    match category {
        "poc_witnesses" => Some("witness"),
        "poc_challengers" => Some("challenger"),
        "poc_challengees" => Some("beacon"),
        _ => None,
    }
}

/// Base builder shared by every activity point: hotspot identity tags and
/// the `event` marker field, stamped with the record's event time.
fn event_point(meta: &HotspotMeta, measurement: &str, event_time: SystemTime) -> PointBuilder {
    let mut point = PointBuilder::new(measurement, event_time).tag("hotspot_id", &meta.id);
    if let Some(name) = &meta.name {
        point = point.tag("hotspot_name", name);
    }
    if let Some(geotext) = &meta.geotext {
        point = point.tag("geotext", geotext);
    }
    point.bool_field("event", true)
}
