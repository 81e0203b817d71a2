//! Typed records extracted from device CLI text.

use serde::{Deserialize, Serialize};

use crate::domain::device::DeviceDescriptor;
use crate::extract::bgp::UptimeClass;

/// One row of a BGP summary table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BgpPeerSummary {
    pub description: String,
    pub peer_ip: String,
    pub as_number: String,
    pub uptime: String,
    pub state: String,
}

impl BgpPeerSummary {
    pub fn uptime_class(&self) -> UptimeClass {
        UptimeClass::parse(&self.uptime)
    }

    /// True when the session has been down for at least `threshold_days`.
    pub fn is_long_inactive(&self, threshold_days: u32) -> bool {
        self.uptime_class().is_long_inactive(threshold_days)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceDescription {
    pub interface_id: String,
    pub description: String,
}

/// All peer addresses found in one device's output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerAddressList {
    /// Hostname from the prompt; empty when the text carried no prompt.
    pub hostname: String,
    pub addresses: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoftwareVersion {
    pub version: String,
}

/// Tagged union of everything the extractor can produce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExtractedRecord {
    BgpPeerSummary(BgpPeerSummary),
    InterfaceDescription(InterfaceDescription),
    PeerAddressList(PeerAddressList),
    SoftwareVersion(SoftwareVersion),
}

/// Records collected from a single device, with the descriptor they came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceRecords {
    pub hostname: String,
    pub device: DeviceDescriptor,
    pub records: Vec<ExtractedRecord>,
}

impl DeviceRecords {
    pub fn interface_descriptions(&self) -> impl Iterator<Item = &InterfaceDescription> {
        self.records.iter().filter_map(|r| match r {
            ExtractedRecord::InterfaceDescription(d) => Some(d),
            _ => None,
        })
    }

    pub fn bgp_peers(&self) -> impl Iterator<Item = &BgpPeerSummary> {
        self.records.iter().filter_map(|r| match r {
            ExtractedRecord::BgpPeerSummary(p) => Some(p),
            _ => None,
        })
    }
}

/// Per-device record sequences keyed by hostname, in collection order.
///
/// Entries are never merged: inserting a hostname that is already present is
/// refused and the rejected entry handed back to the caller.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DeviceRecordSet {
    entries: Vec<DeviceRecords>,
}

impl DeviceRecordSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        hostname: impl Into<String>,
        device: DeviceDescriptor,
        records: Vec<ExtractedRecord>,
    ) -> std::result::Result<(), DeviceRecords> {
        let entry = DeviceRecords {
            hostname: hostname.into(),
            device,
            records,
        };
        if self.get(&entry.hostname).is_some() {
            return Err(entry);
        }
        self.entries.push(entry);
        Ok(())
    }

    pub fn get(&self, hostname: &str) -> Option<&DeviceRecords> {
        self.entries.iter().find(|e| e.hostname == hostname)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DeviceRecords> {
        self.entries.iter()
    }

    pub fn hostnames(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.hostname.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
