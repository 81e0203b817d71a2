//! Fleet-level operations built from dispatch and extraction.

use std::sync::Arc;

use serde::Serialize;
use tracing::warn;

use crate::dispatch::{run_command_set, CommandResult, DeviceOutcome, Dispatcher};
use crate::domain::{
    BgpPeerSummary, DeviceDescriptor, DeviceError, DeviceRecordSet, DispatchError,
    ExtractedRecord, PeerAddressList, SoftwareVersion,
};
use crate::extract::{extract, find_hostname, parse_summary, Grammar};

/// BGP summary with established sessions filtered out.
pub const BGP_SUMMARY_COMMAND: &str = "show ip bgp summary | exclude Estab";
/// Port-channel description table used for uplink remediation.
pub const INTERFACE_DESCRIPTION_COMMAND: &str = "show interfaces Port-Channel 1-4 description";

/// A device that produced no records because its task failed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceFailure {
    pub device: DeviceDescriptor,
    pub kind: &'static str,
    pub error: String,
}

impl DeviceFailure {
    fn new(device: DeviceDescriptor, error: &DeviceError) -> Self {
        Self {
            device,
            kind: error.kind(),
            error: error.to_string(),
        }
    }
}

/// Records from every reachable device plus the devices that failed.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanReport {
    pub records: DeviceRecordSet,
    pub failures: Vec<DeviceFailure>,
}

/// Fold prompt-captured outputs into a record set.
///
/// Each device is keyed by the hostname in its prompt, falling back to the
/// descriptor name when the prompt is missing or already taken.
pub fn collect_records(results: Vec<CommandResult>, grammar: &Grammar) -> ScanReport {
    let mut report = ScanReport::default();
    for result in results {
        let text = match result.outcome {
            Ok(text) => text,
            Err(e) => {
                report.failures.push(DeviceFailure::new(result.device, &e));
                continue;
            }
        };
        let records = extract(&text, grammar);
        let hostname = find_hostname(&text).unwrap_or_else(|| result.device.name.clone());
        if let Err(rejected) = report.records.insert(hostname, result.device, records) {
            warn!(
                hostname = %rejected.hostname,
                device = %rejected.device.name,
                "hostname already collected, keying by device name"
            );
            let fallback = rejected.device.name.clone();
            if let Err(again) = report.records.insert(fallback, rejected.device, rejected.records) {
                warn!(device = %again.device.name, "device name also collected, dropping records");
            }
        }
    }
    report
}

/// Long-inactive BGP peers found on one device.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InactivePeers {
    pub hostname: String,
    pub device: DeviceDescriptor,
    pub peers: Vec<BgpPeerSummary>,
}

/// Per device, the BGP sessions down for at least `threshold_days`.
///
/// Devices with no such peer are omitted.
pub fn long_inactive_peers(records: &DeviceRecordSet, threshold_days: u32) -> Vec<InactivePeers> {
    records
        .iter()
        .filter_map(|entry| {
            let peers: Vec<BgpPeerSummary> = entry
                .bgp_peers()
                .filter(|p| p.is_long_inactive(threshold_days))
                .cloned()
                .collect();
            (!peers.is_empty()).then(|| InactivePeers {
                hostname: entry.hostname.clone(),
                device: entry.device.clone(),
                peers,
            })
        })
        .collect()
}

/// Everything gathered while troubleshooting one BGP neighbor.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeerReport {
    pub peer: String,
    /// Parsed summary row for the peer, when the device reported one.
    pub summary: Option<BgpPeerSummary>,
    pub raw_summary: String,
    pub log: String,
    pub ping: String,
    pub capture: String,
}

/// Commands run by [`Dispatcher::troubleshoot_peer`], in order.
pub fn troubleshoot_commands(peer: &str) -> Vec<String> {
    vec![
        format!("show ip bgp summary | include {peer}"),
        format!("show logging | include {peer}"),
        format!("ping {peer}"),
        format!("tcpdump packet-count 20 filter port 179 and host {peer}"),
    ]
}

impl Dispatcher {
    /// Prompt-captured dispatch followed by extraction with `grammar`.
    pub async fn scan(
        &self,
        devices: &[DeviceDescriptor],
        command: &str,
        grammar: &Grammar,
        concurrency: usize,
    ) -> std::result::Result<ScanReport, DispatchError> {
        let results = self.dispatch_with_prompt(devices, command, concurrency).await?;
        Ok(collect_records(results, grammar))
    }

    /// Peer addresses per device, keyed by prompt hostname.
    pub async fn peer_addresses(
        &self,
        devices: &[DeviceDescriptor],
        command: &str,
        concurrency: usize,
    ) -> std::result::Result<(Vec<PeerAddressList>, Vec<DeviceFailure>), DispatchError> {
        let report = self
            .scan(devices, command, &Grammar::PeerAddresses, concurrency)
            .await?;
        let lists = report
            .records
            .iter()
            .map(|entry| {
                let addresses = entry
                    .records
                    .iter()
                    .filter_map(|r| match r {
                        ExtractedRecord::PeerAddressList(list) => Some(list.addresses.clone()),
                        _ => None,
                    })
                    .flatten()
                    .collect();
                PeerAddressList {
                    hostname: entry.hostname.clone(),
                    addresses,
                }
            })
            .collect();
        Ok((lists, report.failures))
    }

    /// First `VERSION=` token reported by each device, in input order.
    pub async fn software_versions(
        &self,
        devices: &[DeviceDescriptor],
        command: &str,
        concurrency: usize,
    ) -> std::result::Result<Vec<DeviceOutcome<Option<SoftwareVersion>>>, DispatchError> {
        let results = self.dispatch(devices, command, concurrency).await?;
        Ok(results
            .into_iter()
            .map(|r| DeviceOutcome {
                device: r.device,
                outcome: r.outcome.map(|text| {
                    extract(&text, &Grammar::SoftwareVersion)
                        .into_iter()
                        .find_map(|rec| match rec {
                            ExtractedRecord::SoftwareVersion(v) => Some(v),
                            _ => None,
                        })
                }),
                elapsed_ms: r.elapsed_ms,
            })
            .collect())
    }

    /// Gather a peer's summary, log lines, ping and a BGP packet capture in
    /// one session on `device`.
    pub async fn troubleshoot_peer(
        &self,
        device: &DeviceDescriptor,
        peer: &str,
    ) -> std::result::Result<PeerReport, DeviceError> {
        let connector = self.connector();
        let outputs =
            run_command_set(Arc::as_ref(&connector), device, &troubleshoot_commands(peer)).await?;
        let mut sections = outputs.into_iter().map(|o| o.text);
        let raw_summary = sections.next().unwrap_or_default();
        let summary = parse_summary(&raw_summary)
            .into_iter()
            .find(|row| row.peer_ip == peer);
        Ok(PeerReport {
            peer: peer.to_string(),
            summary,
            raw_summary,
            log: sections.next().unwrap_or_default(),
            ping: sections.next().unwrap_or_default(),
            capture: sections.next().unwrap_or_default(),
        })
    }
}
