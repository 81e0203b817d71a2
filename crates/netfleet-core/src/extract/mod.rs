//! Pure, line-oriented extraction of typed records from device CLI text.
//!
//! Extraction never fails: unmatched lines are skipped and malformed input
//! simply yields fewer records.

pub mod addresses;
pub mod bgp;
pub mod interfaces;
pub mod prompt;
pub mod version;

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{ExtractedRecord, InterfaceDescription, PeerAddressList};

pub use addresses::harvest_addresses;
pub use bgp::{parse_summary, UptimeClass, DEFAULT_INACTIVE_AFTER_DAYS};
pub use interfaces::{InterfaceRow, InterfaceTable, StatusRow, DEFAULT_INTERFACE_PREFIX};
pub use prompt::find_hostname;
pub use version::parse_versions;

/// Which record shape to look for in a piece of output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "grammar", rename_all = "snake_case")]
pub enum Grammar {
    BgpSummary,
    InterfaceDescriptions { interface_prefix: String },
    PeerAddresses,
    SoftwareVersion,
}

impl Grammar {
    pub fn interfaces(prefix: impl Into<String>) -> Self {
        Grammar::InterfaceDescriptions {
            interface_prefix: prefix.into(),
        }
    }
}

/// Records matching `grammar` in `text`, in order of appearance.
pub fn extract(text: &str, grammar: &Grammar) -> Vec<ExtractedRecord> {
    match grammar {
        Grammar::BgpSummary => parse_summary(text)
            .into_iter()
            .map(ExtractedRecord::BgpPeerSummary)
            .collect(),
        Grammar::InterfaceDescriptions { interface_prefix } => {
            let table = InterfaceTable::parse(text, interface_prefix);
            if !table.is_aligned() {
                debug!(
                    unpaired_interfaces = table.unpaired_interfaces.len(),
                    unpaired_rows = table.unpaired_rows.len(),
                    "interface table did not pair cleanly"
                );
            }
            dedupe_interfaces(table.descriptions())
                .into_iter()
                .map(ExtractedRecord::InterfaceDescription)
                .collect()
        }
        Grammar::PeerAddresses => {
            let addresses = harvest_addresses(text);
            if addresses.is_empty() {
                return Vec::new();
            }
            vec![ExtractedRecord::PeerAddressList(PeerAddressList {
                hostname: find_hostname(text).unwrap_or_default(),
                addresses,
            })]
        }
        Grammar::SoftwareVersion => parse_versions(text)
            .into_iter()
            .map(ExtractedRecord::SoftwareVersion)
            .collect(),
    }
}

/// Keep the first occurrence of each interface id.
fn dedupe_interfaces(descriptions: Vec<InterfaceDescription>) -> Vec<InterfaceDescription> {
    let mut seen = HashSet::new();
    descriptions
        .into_iter()
        .filter(|d| seen.insert(d.interface_id.clone()))
        .collect()
}
