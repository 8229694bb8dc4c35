//! Typed views over node payloads.
//!
//! The node's block and transaction records are not versioned, so every
//! struct keeps unknown fields in `extra` and tolerates missing optional
//! ones.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::node::NodeError;

/// Block header. Only the timestamp is interpreted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Milliseconds since the Unix epoch.
    #[serde(with = "timestamp_ms")]
    pub timestamp: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl BlockHeader {
    pub fn time(&self) -> Option<DateTime<Utc>> {
        DateTime::<Utc>::from_timestamp_millis(self.timestamp)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(default)]
    pub transactions: Vec<Transaction>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(default)]
    pub hash: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Block {
    /// Parse a `get_blocks` payload, newest block first.
    ///
    /// The node returns the chain oldest first.
    pub fn list_newest_first(payload: Value) -> Result<Vec<Block>, NodeError> {
        let mut blocks: Vec<Block> = from_payload(payload)?;
        blocks.reverse();
        Ok(blocks)
    }
}

/// Deserialize a payload into a typed view.
pub fn from_payload<T: serde::de::DeserializeOwned>(payload: Value) -> Result<T, NodeError> {
    serde_json::from_value(payload).map_err(|e| NodeError::Decode(e.to_string()))
}

/// Whole seconds between consecutive blocks, newest first.
///
/// Each timestamp is truncated to seconds before subtracting, so the
/// result for `[t0, t1, ...]` is `t0/1000 - t1/1000, t1/1000 - t2/1000, ...`.
pub fn block_intervals(blocks: &[Block]) -> Vec<i64> {
    blocks
        .windows(2)
        .map(|pair| pair[0].header.timestamp / 1000 - pair[1].header.timestamp / 1000)
        .collect()
}

/// Accepts epoch milliseconds as a JSON number or a numeric string.
mod timestamp_ms {
    use serde::de::{self, Deserializer, Visitor};
    use serde::Serializer;
    use std::fmt;

    pub fn serialize<S>(value: &i64, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_i64(*value)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<i64, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct MillisVisitor;

        impl<'de> Visitor<'de> for MillisVisitor {
            type Value = i64;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("milliseconds as an integer or numeric string")
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> Result<i64, E> {
                Ok(v)
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> Result<i64, E> {
                i64::try_from(v).map_err(|_| E::custom(format!("Invalid timestamp: {}", v)))
            }

            fn visit_f64<E: de::Error>(self, v: f64) -> Result<i64, E> {
                Ok(v as i64)
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<i64, E> {
                v.trim()
                    .parse::<i64>()
                    .map_err(|_| E::custom(format!("Invalid timestamp: {}", v)))
            }
        }

        deserializer.deserialize_any(MillisVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn block_at(timestamp: Value) -> Value {
        json!({"header": {"timestamp": timestamp, "parent_hash": "00"}, "transactions": []})
    }

    #[test]
    fn test_block_parses_numeric_and_string_timestamps() {
        let a: Block = from_payload(block_at(json!(1_500_000_000_123i64))).unwrap();
        let b: Block = from_payload(block_at(json!("1500000000123"))).unwrap();

        assert_eq!(a.header.timestamp, 1_500_000_000_123);
        assert_eq!(a.header, b.header);
        assert_eq!(a.header.extra.get("parent_hash"), Some(&json!("00")));
        assert_eq!(a.header.time().unwrap().timestamp(), 1_500_000_000);
    }

    #[test]
    fn test_block_rejects_bad_timestamp() {
        let result: Result<Block, _> = from_payload(block_at(json!("yesterday")));
        assert!(matches!(result, Err(NodeError::Decode(_))));
    }

    #[test]
    fn test_transaction_keeps_unknown_fields() {
        let txn: Transaction =
            from_payload(json!({"hash": "ab", "inputs": [], "outputs": [{"amount": 4}]})).unwrap();

        assert_eq!(txn.hash.as_deref(), Some("ab"));
        assert_eq!(txn.extra.get("outputs"), Some(&json!([{"amount": 4}])));
    }

    #[test]
    fn test_list_newest_first_reverses_chain() {
        let payload = json!([
            block_at(json!(1000)),
            block_at(json!(5000)),
            block_at(json!(12500)),
        ]);
        let blocks = Block::list_newest_first(payload).unwrap();
        let stamps: Vec<i64> = blocks.iter().map(|b| b.header.timestamp).collect();

        assert_eq!(stamps, vec![12500, 5000, 1000]);
        assert_eq!(block_intervals(&blocks), vec![7, 4]);
    }

    #[test]
    fn test_block_intervals_truncates_to_seconds() {
        let blocks: Vec<Block> =
            from_payload(json!([block_at(json!(2999)), block_at(json!(1001))])).unwrap();
        // 2999/1000 - 1001/1000 = 2 - 1
        assert_eq!(block_intervals(&blocks), vec![1]);
    }

    #[test]
    fn test_block_intervals_short_chains() {
        assert!(block_intervals(&[]).is_empty());

        let one: Vec<Block> = from_payload(json!([block_at(json!(1))])).unwrap();
        assert!(block_intervals(&one).is_empty());
    }

    #[test]
    fn test_empty_block_list() {
        let blocks = Block::list_newest_first(json!([])).unwrap();
        assert!(blocks.is_empty());
    }
}
