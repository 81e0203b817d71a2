//! Text and JSON rendering of batch results.

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::Serialize;

use netfleet_core::{
    ApplyResult, CommandResult, DeviceFailure, DeviceOutcome, InactivePeers, MutationBatch,
    PeerAddressList, PeerReport, SoftwareVersion,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

const RULE: &str = "---------------------------------------------";

/// JSON document wrapping every command's payload.
#[derive(Debug, Serialize)]
pub struct Envelope<'a, T: Serialize> {
    pub operation: &'a str,
    pub generated_at: DateTime<Utc>,
    pub data: T,
}

pub fn to_json<T: Serialize>(operation: &str, data: T) -> anyhow::Result<String> {
    let envelope = Envelope {
        operation,
        generated_at: Utc::now(),
        data,
    };
    Ok(serde_json::to_string_pretty(&envelope)?)
}

fn outcome_line<T>(outcome: &DeviceOutcome<T>, ok: impl FnOnce(&T) -> String) -> String {
    match &outcome.outcome {
        Ok(value) => ok(value),
        Err(e) => format!("ERROR [{}] {e}", e.kind()),
    }
}

pub fn command_results(results: &[CommandResult]) -> String {
    let mut out = String::new();
    for r in results {
        out.push_str(&format!("{RULE}\n{}\n", r.device));
        out.push_str(&outcome_line(r, |text| text.trim_end().to_string()));
        out.push('\n');
    }
    out
}

pub fn failures(failures: &[DeviceFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{}: ERROR [{}] {}\n", f.device, f.kind, f.error))
        .collect()
}

pub fn inactive_peers(report: &[InactivePeers], failed: &[DeviceFailure], threshold: u32) -> String {
    let mut out = String::new();
    if report.is_empty() {
        out.push_str(&format!("no BGP peers down for {threshold} days or more\n"));
    }
    for device in report {
        out.push_str(&format!("{RULE}\n{}\n", device.hostname));
        for p in &device.peers {
            out.push_str(&format!(
                "  {:<20} {:<16} AS{:<10} {:<8} {}\n",
                p.description, p.peer_ip, p.as_number, p.uptime, p.state
            ));
        }
    }
    out.push_str(&failures(failed));
    out
}

pub fn peer_addresses(lists: &[PeerAddressList], failed: &[DeviceFailure]) -> String {
    let mut out: String = lists
        .iter()
        .map(|l| format!("{}: {}\n", l.hostname, l.addresses.join(", ")))
        .collect();
    out.push_str(&failures(failed));
    out
}

pub fn versions(results: &[DeviceOutcome<Option<SoftwareVersion>>]) -> String {
    results
        .iter()
        .map(|r| {
            let line = outcome_line(r, |v| match v {
                Some(v) => v.version.clone(),
                None => "no VERSION line".to_string(),
            });
            format!("{}: {line}\n", r.device.name)
        })
        .collect()
}

pub fn plan(batch: &MutationBatch) -> String {
    let mut out = String::new();
    for m in batch.iter() {
        match &m.directives {
            Ok(d) if d.is_empty() => out.push_str(&format!("{}: up to date\n", m.hostname)),
            Ok(d) => {
                out.push_str(&format!("{}:\n", m.hostname));
                for directive in d {
                    out.push_str(&format!("  {}\n    {}\n", directive.context, directive.value));
                }
            }
            Err(e) => out.push_str(&format!("{}: SKIPPED {e}\n", m.hostname)),
        }
    }
    out
}

pub fn applied(results: &[ApplyResult]) -> String {
    results
        .iter()
        .map(|r| {
            let line = outcome_line(r, |t| {
                if t.is_empty() {
                    "nothing to apply".to_string()
                } else {
                    "applied".to_string()
                }
            });
            format!("{}: {line}\n", r.device)
        })
        .collect()
}

/// Plan, apply outcome, then the devices the scan never reached.
pub fn applied_plan(
    batch: &MutationBatch,
    results: &[ApplyResult],
    failed: &[DeviceFailure],
) -> String {
    let mut out = plan(batch);
    if results.is_empty() && failed.is_empty() {
        out.push_str("nothing to apply\n");
    }
    out.push_str(&applied(results));
    out.push_str(&failures(failed));
    out
}

pub fn peer_report(report: &PeerReport) -> String {
    let summary = match &report.summary {
        Some(s) => format!(
            "description: {}\npeer: {}\nAS: {}\nuptime: {}\nstate: {}",
            s.description, s.peer_ip, s.as_number, s.uptime, s.state
        ),
        None => format!("{} not found in BGP summary", report.peer),
    };
    [
        summary.as_str(),
        report.log.trim_end(),
        report.ping.trim_end(),
        report.capture.trim_end(),
    ]
    .iter()
    .map(|section| format!("{RULE}\n{section}\n"))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use netfleet_core::{
        BgpPeerSummary, DeviceDescriptor, DeviceError, DeviceRecordSet, ExtractedRecord,
        InterfaceDescription, RemediationPolicy, TransportError,
    };

    #[test]
    fn test_command_results_show_errors_inline() {
        let results = vec![
            DeviceOutcome {
                device: DeviceDescriptor::new("a"),
                outcome: Ok("uptime 3 days\n".to_string()),
                elapsed_ms: 1,
            },
            DeviceOutcome {
                device: DeviceDescriptor::new("b"),
                outcome: Err(DeviceError::Transport(TransportError::Timeout { after_ms: 10 })),
                elapsed_ms: 10,
            },
        ];
        let text = command_results(&results);
        assert!(text.contains("a\nuptime 3 days\n"));
        assert!(text.contains("ERROR [timeout]"));
    }

    #[test]
    fn test_plan_rendering() {
        let mut set = DeviceRecordSet::new();
        set.insert(
            "edge-1",
            DeviceDescriptor::new("edge-1"),
            vec![ExtractedRecord::InterfaceDescription(InterfaceDescription {
                interface_id: "Po1".to_string(),
                description: "ISP1".to_string(),
            })],
        )
        .unwrap();
        let policy = RemediationPolicy::new().with_role("uplink", "UPLINK-");
        let batch = netfleet_core::plan(&set, &policy, "uplink");
        assert_eq!(
            plan(&batch),
            "edge-1:\n  interface Po1\n    description UPLINK-ISP1\n"
        );
    }

    #[test]
    fn test_peer_report_sections() {
        let report = PeerReport {
            peer: "12.34.56.78".to_string(),
            summary: Some(BgpPeerSummary {
                description: "BGP-PEER".to_string(),
                peer_ip: "12.34.56.78".to_string(),
                as_number: "12345".to_string(),
                uptime: "10d00h".to_string(),
                state: "Active".to_string(),
            }),
            raw_summary: String::new(),
            log: "PEER_CLEAR\n".to_string(),
            ping: "5 received".to_string(),
            capture: "listening".to_string(),
        };
        let text = peer_report(&report);
        assert_eq!(text.matches(RULE).count(), 4);
        assert!(text.contains("state: Active"));
    }

    #[test]
    fn test_json_envelope() {
        let json = to_json("versions", vec!["x"]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["operation"], "versions");
        assert_eq!(value["data"][0], "x");
        assert!(value["generated_at"].is_string());
    }
}
