//! `ReportUpdated` ledger event
//!
//! Emitted by the oracle contract when a report is accepted. The log carries
//! two topics (event signature hash, indexed timestamp) and the full encoded
//! report as data.

use serde::{Deserialize, Serialize};

use crate::crypto::{from_hex_prefixed, sha256, to_hex_prefixed};
use crate::error::{GuardError, GuardResult};

use super::codec::{self, TUPLE_TYPE, WORD};
use super::types::ComplianceReport;

/// Event name
pub const EVENT_NAME: &str = "ReportUpdated";

/// Full event signature: `ReportUpdated(uint256,(...))`
pub fn event_signature() -> String {
    format!("{}(uint256,{})", EVENT_NAME, TUPLE_TYPE)
}

/// topic0 of every `ReportUpdated` log
pub fn report_updated_topic() -> [u8; 32] {
    sha256(event_signature().as_bytes())
}

/// Raw log as delivered by a log relay; all fields `0x` hex
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerLog {
    pub topics: Vec<String>,
    pub data: String,
    pub tx_hash: String,
}

/// Decoded `ReportUpdated` event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportUpdated {
    pub report: ComplianceReport,
    pub tx_hash: String,
}

impl ReportUpdated {
    pub fn to_log(&self) -> LedgerLog {
        LedgerLog {
            topics: vec![
                to_hex_prefixed(&report_updated_topic()),
                to_hex_prefixed(&codec::uint_word(self.report.timestamp as u128)),
            ],
            data: to_hex_prefixed(&codec::encode(&self.report)),
            tx_hash: self.tx_hash.clone(),
        }
    }

    /// Decode a raw log, rejecting anything that is not a well-formed
    /// `ReportUpdated` with a consistent indexed timestamp
    pub fn from_log(log: &LedgerLog) -> GuardResult<Self> {
        if log.topics.len() != 2 {
            return Err(GuardError::schema(format!(
                "ReportUpdated expects 2 topics, got {}",
                log.topics.len()
            )));
        }

        let topic0 = decode_word(&log.topics[0], "topic0")?;
        if topic0 != report_updated_topic() {
            return Err(GuardError::schema("topic0 is not ReportUpdated"));
        }

        let data = from_hex_prefixed(&log.data)
            .map_err(|e| GuardError::schema(format!("event data is not hex: {}", e)))?;
        let report = codec::decode(&data)?;

        let topic1 = decode_word(&log.topics[1], "topic1")?;
        let indexed = codec::read_uint(&topic1, 8, 0)? as u64;
        if indexed != report.timestamp {
            return Err(GuardError::schema(format!(
                "indexed timestamp {} disagrees with report timestamp {}",
                indexed, report.timestamp
            )));
        }

        let tx_hash = decode_word(&log.tx_hash, "txHash")?;

        Ok(Self {
            report,
            tx_hash: to_hex_prefixed(&tx_hash),
        })
    }
}

fn decode_word(text: &str, what: &str) -> GuardResult<[u8; WORD]> {
    let bytes = from_hex_prefixed(text)
        .map_err(|e| GuardError::schema(format!("{} is not hex: {}", what, e)))?;
    bytes
        .try_into()
        .map_err(|_| GuardError::schema(format!("{} must be {} bytes", what, WORD)))
}
