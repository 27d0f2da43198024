use anyhow::{Context, Result};
use serde_json::Value;

/// Bones per HNT; reward amounts come over the wire as integer bones.
const BONES_PER_HNT: f64 = 100_000_000.0;

/// One witness of a PoC beacon.
#[derive(Debug, Clone, PartialEq)]
pub struct Witness {
    pub gateway: String,
}

/// One hop of a PoC receipt path.
#[derive(Debug, Clone, PartialEq)]
pub struct PathElement {
    pub challengee: String,
    pub result: String,
    pub witnesses: Vec<Witness>,
}

/// A constructed PoC challenge (`poc_request_v1`).
#[derive(Debug, Clone, PartialEq)]
pub struct PocRequest {
    pub time: u64,
    pub challenger: String,
}

/// A completed PoC receipt (`poc_receipts_v1`).
#[derive(Debug, Clone, PartialEq)]
pub struct PocReceipt {
    pub time: u64,
    pub challenger: String,
    pub path: Vec<PathElement>,
}

/// One component of a reward batch.
#[derive(Debug, Clone, PartialEq)]
pub struct RewardEntry {
    pub category: String,
    pub amount_bones: u64,
}

/// A reward settlement (`rewards_v1` / `rewards_v2`).
#[derive(Debug, Clone, PartialEq)]
pub struct Rewards {
    pub time: u64,
    pub rewards: Vec<RewardEntry>,
}

impl Rewards {
    /// Batch total in HNT.
    pub fn total_amount(&self) -> f64 {
        let bones: u64 = self.rewards.iter().map(|r| r.amount_bones).sum();
        bones as f64 / BONES_PER_HNT
    }
}

/// One summary entry of a data-transfer settlement.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferSummary {
    pub packets: u64,
    pub data_credits: u64,
}

/// A data-transfer settlement (`state_channel_close_v1`).
#[derive(Debug, Clone, PartialEq)]
pub struct DataTransfer {
    pub time: u64,
    pub summaries: Vec<TransferSummary>,
}

/// An activity variant this exporter does not know about. Retained so the
/// run degrades gracefully when the chain introduces new transaction
/// types.
#[derive(Debug, Clone, PartialEq)]
pub struct UnknownActivity {
    pub time: u64,
    pub type_name: String,
}

/// One entry of a hotspot's activity feed, keyed by its `type` tag.
#[derive(Debug, Clone, PartialEq)]
pub enum ActivityRecord {
    PocRequest(PocRequest),
    PocReceipt(PocReceipt),
    Rewards(Rewards),
    DataTransfer(DataTransfer),
    Unknown(UnknownActivity),
}

impl ActivityRecord {
    /// Event time as epoch seconds, as recorded on chain.
    pub fn time(&self) -> u64 {
        match self {
            Self::PocRequest(r) => r.time,
            Self::PocReceipt(r) => r.time,
            Self::Rewards(r) => r.time,
            Self::DataTransfer(r) => r.time,
            Self::Unknown(r) => r.time,
        }
    }
}

/// Decodes one activity feed entry.
///
/// Records with an unrecognized `type` decode to [`ActivityRecord::Unknown`];
/// only a missing `time` or `type`, or a known variant with a malformed
/// body, is an error.
pub fn decode_activity(value: &Value) -> Result<ActivityRecord> {
    let type_name = obj_str(value, "type")?;
    let time = obj_u64(value, "time")?;

    match type_name.as_str() {
        "poc_request_v1" => Ok(ActivityRecord::PocRequest(PocRequest {
            time,
            challenger: obj_str(value, "challenger")?,
        })),
        "poc_receipts_v1" => Ok(ActivityRecord::PocReceipt(PocReceipt {
            time,
            challenger: obj_str(value, "challenger")?,
            path: decode_path(value)?,
        })),
        "rewards_v1" | "rewards_v2" => Ok(ActivityRecord::Rewards(Rewards {
            time,
            rewards: decode_rewards(value)?,
        })),
        "state_channel_close_v1" => Ok(ActivityRecord::DataTransfer(DataTransfer {
            time,
            summaries: decode_summaries(value)?,
        })),
        _ => Ok(ActivityRecord::Unknown(UnknownActivity { time, type_name })),
    }
}

fn decode_path(value: &Value) -> Result<Vec<PathElement>> {
    let hops = obj_array(value, "path")?;
    let mut path = Vec::with_capacity(hops.len());

    for hop in hops {
        let witnesses = obj_array(hop, "witnesses")?
            .iter()
            .map(|w| {
                Ok(Witness {
                    gateway: obj_str(w, "gateway")?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        path.push(PathElement {
            challengee: obj_str(hop, "challengee")?,
            result: obj_str(hop, "result")?,
            witnesses,
        });
    }

    Ok(path)
}

fn decode_rewards(value: &Value) -> Result<Vec<RewardEntry>> {
    obj_array(value, "rewards")?
        .iter()
        .map(|r| {
            Ok(RewardEntry {
                category: obj_str(r, "type")?,
                amount_bones: obj_u64(r, "amount")?,
            })
        })
        .collect()
}

fn decode_summaries(value: &Value) -> Result<Vec<TransferSummary>> {
    let channel = value
        .get("state_channel")
        .context("state_channel_close_v1 missing state_channel")?;

    obj_array(channel, "summaries")?
        .iter()
        .map(|s| {
            Ok(TransferSummary {
                packets: obj_u64(s, "num_packets")?,
                data_credits: obj_u64(s, "num_dcs")?,
            })
        })
        .collect()
}

fn obj_str(value: &Value, key: &str) -> Result<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_owned)
        .with_context(|| format!("activity record missing string {key:?}"))
}

fn obj_u64(value: &Value, key: &str) -> Result<u64> {
    value
        .get(key)
        .and_then(Value::as_u64)
        .with_context(|| format!("activity record missing integer {key:?}"))
}

fn obj_array<'a>(value: &'a Value, key: &str) -> Result<&'a Vec<Value>> {
    value
        .get(key)
        .and_then(Value::as_array)
        .with_context(|| format!("activity record missing array {key:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_poc_request() {
        let value = json!({
            "type": "poc_request_v1",
            "time": 1_650_000_000u64,
            "challenger": "abc",
        });

        let record = decode_activity(&value).expect("should decode");
        let ActivityRecord::PocRequest(request) = record else {
            panic!("wrong variant");
        };
        assert_eq!(request.time, 1_650_000_000);
        assert_eq!(request.challenger, "abc");
    }

    #[test]
    fn test_decode_poc_receipt_with_witnesses() {
        let value = json!({
            "type": "poc_receipts_v1",
            "time": 1u64,
            "challenger": "chg",
            "path": [{
                "challengee": "bcn",
                "result": "success",
                "witnesses": [{"gateway": "w1"}, {"gateway": "w2"}],
            }],
        });

        let record = decode_activity(&value).expect("should decode");
        let ActivityRecord::PocReceipt(receipt) = record else {
            panic!("wrong variant");
        };
        assert_eq!(receipt.path.len(), 1);
        assert_eq!(receipt.path[0].challengee, "bcn");
        assert_eq!(receipt.path[0].result, "success");
        assert_eq!(receipt.path[0].witnesses.len(), 2);
        assert_eq!(receipt.path[0].witnesses[1].gateway, "w2");
    }

    #[test]
    fn test_decode_rewards_total() {
        let value = json!({
            "type": "rewards_v2",
            "time": 2u64,
            "rewards": [
                {"type": "poc_witnesses", "amount": 100_000_000u64},
                {"type": "poc_challengers", "amount": 50_000_000u64},
            ],
        });

        let record = decode_activity(&value).expect("should decode");
        let ActivityRecord::Rewards(rewards) = record else {
            panic!("wrong variant");
        };
        assert_eq!(rewards.rewards.len(), 2);
        assert!((rewards.total_amount() - 1.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_decode_data_transfer() {
        let value = json!({
            "type": "state_channel_close_v1",
            "time": 3u64,
            "state_channel": {
                "summaries": [{"num_packets": 12u64, "num_dcs": 420u64}],
            },
        });

        let record = decode_activity(&value).expect("should decode");
        let ActivityRecord::DataTransfer(transfer) = record else {
            panic!("wrong variant");
        };
        assert_eq!(transfer.summaries[0].packets, 12);
        assert_eq!(transfer.summaries[0].data_credits, 420);
    }

    #[test]
    fn test_decode_unknown_type_is_not_an_error() {
        let value = json!({
            "type": "assert_location_v2",
            "time": 4u64,
            "gateway": "abc",
        });

        let record = decode_activity(&value).expect("should decode");
        let ActivityRecord::Unknown(unknown) = record else {
            panic!("wrong variant");
        };
        assert_eq!(unknown.type_name, "assert_location_v2");
        assert_eq!(unknown.time, 4);
    }

    #[test]
    fn test_decode_missing_time_fails() {
        let value = json!({"type": "poc_request_v1", "challenger": "abc"});
        assert!(decode_activity(&value).is_err());
    }

    #[test]
    fn test_decode_missing_type_fails() {
        let value = json!({"time": 5u64});
        assert!(decode_activity(&value).is_err());
    }
}
