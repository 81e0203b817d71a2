//! Description remediation planning.
//!
//! Turns extracted interface descriptions into per-device directive lists
//! that prepend the role's prefix. Interfaces whose description already
//! carries the prefix are left alone, so planning against remediated state
//! yields an empty batch.

use serde::Serialize;

use crate::domain::{
    ConfigDirective, DeviceDescriptor, DeviceRecordSet, DeviceRecords, PlanError,
    RemediationPolicy,
};
use crate::obs;

/// Planned directives for one device, or the reason none could be planned.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceMutation {
    pub hostname: String,
    pub device: DeviceDescriptor,
    #[serde(serialize_with = "serialize_plan")]
    pub directives: std::result::Result<Vec<ConfigDirective>, PlanError>,
}

fn serialize_plan<S: serde::Serializer>(
    plan: &std::result::Result<Vec<ConfigDirective>, PlanError>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    use serde::ser::SerializeMap;
    let mut map = serializer.serialize_map(Some(2))?;
    match plan {
        Ok(directives) => {
            map.serialize_entry("status", "ready")?;
            map.serialize_entry("directives", directives)?;
        }
        Err(e) => {
            map.serialize_entry("status", "policy_gap")?;
            map.serialize_entry("error", &e.to_string())?;
        }
    }
    map.end()
}

/// Ordered per-device plan, one entry per device in the record set.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct MutationBatch {
    entries: Vec<DeviceMutation>,
}

impl MutationBatch {
    pub fn iter(&self) -> impl Iterator<Item = &DeviceMutation> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True when no device has anything to change and no device hit a gap.
    pub fn is_noop(&self) -> bool {
        self.entries
            .iter()
            .all(|m| matches!(&m.directives, Ok(d) if d.is_empty()))
    }

    /// Devices with at least one directive to apply.
    pub fn ready(&self) -> impl Iterator<Item = (&DeviceDescriptor, &[ConfigDirective])> {
        self.entries.iter().filter_map(|m| match &m.directives {
            Ok(d) if !d.is_empty() => Some((&m.device, d.as_slice())),
            _ => None,
        })
    }

    pub fn gaps(&self) -> impl Iterator<Item = (&DeviceDescriptor, &PlanError)> {
        self.entries.iter().filter_map(|m| match &m.directives {
            Err(e) => Some((&m.device, e)),
            Ok(_) => None,
        })
    }

    pub fn directive_count(&self) -> usize {
        self.entries
            .iter()
            .filter_map(|m| m.directives.as_ref().ok())
            .map(Vec::len)
            .sum()
    }

    pub fn into_entries(self) -> Vec<DeviceMutation> {
        self.entries
    }
}

/// Plan every device in `records` against the prefix for `role`.
pub fn plan(records: &DeviceRecordSet, policy: &RemediationPolicy, role: &str) -> MutationBatch {
    build(records, role, |_| policy_prefix(policy, role))
}

/// Like [`plan`], with each device's own `role` taking precedence over
/// `default_role`.
pub fn plan_by_device_role(
    records: &DeviceRecordSet,
    policy: &RemediationPolicy,
    default_role: &str,
) -> MutationBatch {
    build(records, default_role, |entry| {
        let role = entry.device.role.as_deref().unwrap_or(default_role);
        policy_prefix(policy, role)
    })
}

fn policy_prefix<'a>(
    policy: &'a RemediationPolicy,
    role: &str,
) -> std::result::Result<&'a str, PlanError> {
    policy.prefix_for(role).ok_or_else(|| PlanError::PolicyGap {
        role: role.to_string(),
    })
}

fn build<'p, F>(records: &DeviceRecordSet, role_label: &str, prefix_for: F) -> MutationBatch
where
    F: Fn(&DeviceRecords) -> std::result::Result<&'p str, PlanError>,
{
    let entries: Vec<DeviceMutation> = records
        .iter()
        .map(|entry| DeviceMutation {
            hostname: entry.hostname.clone(),
            device: entry.device.clone(),
            directives: prefix_for(entry).map(|prefix| plan_device(entry, prefix)),
        })
        .collect();
    let batch = MutationBatch { entries };
    obs::emit_plan_computed(
        role_label,
        batch.len(),
        batch.directive_count(),
        batch.gaps().count(),
    );
    batch
}

fn plan_device(entry: &DeviceRecords, prefix: &str) -> Vec<ConfigDirective> {
    entry
        .interface_descriptions()
        .filter(|d| !d.description.starts_with(prefix))
        .map(|d| {
            ConfigDirective::interface_description(
                &d.interface_id,
                &format!("{prefix}{}", d.description),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ExtractedRecord, InterfaceDescription};

    fn iface(id: &str, descr: &str) -> ExtractedRecord {
        ExtractedRecord::InterfaceDescription(InterfaceDescription {
            interface_id: id.to_string(),
            description: descr.to_string(),
        })
    }

    fn records(devices: &[(&str, Option<&str>, Vec<ExtractedRecord>)]) -> DeviceRecordSet {
        let mut set = DeviceRecordSet::new();
        for (name, role, recs) in devices {
            let mut device = DeviceDescriptor::new(*name);
            if let Some(role) = role {
                device = device.with_role(*role);
            }
            set.insert(*name, device, recs.clone()).unwrap();
        }
        set
    }

    fn uplink() -> RemediationPolicy {
        RemediationPolicy::new().with_role("uplink", "UPLINK-")
    }

    #[test]
    fn test_plan_prefixes_in_discovery_order() {
        let set = records(&[("edge-1", None, vec![iface("Po2", "ISP2"), iface("Po1", "ISP1")])]);
        let batch = plan(&set, &uplink(), "uplink");

        let (device, directives) = batch.ready().next().unwrap();
        assert_eq!(device.name, "edge-1");
        assert_eq!(
            directives,
            &[
                ConfigDirective::interface_description("Po2", "UPLINK-ISP2"),
                ConfigDirective::interface_description("Po1", "UPLINK-ISP1"),
            ]
        );
    }

    #[test]
    fn test_already_prefixed_is_noop() {
        let set = records(&[
            ("edge-1", None, vec![iface("Po1", "UPLINK-ISP1")]),
            ("edge-2", None, vec![iface("Po1", "UPLINK-ISP1"), iface("Po2", "UPLINK-")]),
        ]);
        let batch = plan(&set, &uplink(), "uplink");
        assert_eq!(batch.len(), 2);
        assert!(batch.is_noop());
        assert_eq!(batch.ready().count(), 0);
    }

    #[test]
    fn test_replanning_remediated_state_is_noop() {
        let set = records(&[("edge-1", None, vec![iface("Po1", "ISP1"), iface("Po3", "")])]);
        let first = plan(&set, &uplink(), "uplink");
        assert_eq!(first.directive_count(), 2);

        let remediated: Vec<ExtractedRecord> = first
            .ready()
            .flat_map(|(_, d)| d.iter())
            .map(|d| {
                let id = d.context.trim_start_matches("interface ");
                let descr = d.value.trim_start_matches("description ");
                iface(id, descr)
            })
            .collect();
        let again = plan(&records(&[("edge-1", None, remediated)]), &uplink(), "uplink");
        assert!(again.is_noop());
    }

    #[test]
    fn test_missing_role_is_policy_gap_per_device() {
        let set = records(&[("edge-1", None, vec![iface("Po1", "ISP1")])]);
        let batch = plan(&set, &uplink(), "spine");
        let gaps: Vec<_> = batch.gaps().collect();
        assert_eq!(gaps.len(), 1);
        assert_eq!(
            gaps[0].1,
            &PlanError::PolicyGap {
                role: "spine".to_string()
            }
        );
        assert!(!batch.is_noop());
    }

    #[test]
    fn test_device_role_overrides_default() {
        let policy = uplink().with_role("spine", "TO-SPINE-");
        let set = records(&[
            ("leaf-1", Some("spine"), vec![iface("Po1", "S1")]),
            ("edge-1", None, vec![iface("Po1", "ISP1")]),
            ("odd-1", Some("storage"), vec![iface("Po1", "NAS")]),
        ]);
        let batch = plan_by_device_role(&set, &policy, "uplink");

        let values: Vec<String> = batch
            .ready()
            .map(|(_, d)| d[0].value.clone())
            .collect();
        assert_eq!(values, vec!["description TO-SPINE-S1", "description UPLINK-ISP1"]);
        assert_eq!(batch.gaps().next().unwrap().0.name, "odd-1");
    }

    #[test]
    fn test_batch_serializes_status() {
        let set = records(&[("edge-1", None, vec![iface("Po1", "ISP1")])]);
        let json = serde_json::to_value(plan(&set, &uplink(), "spine")).unwrap();
        assert_eq!(json[0]["directives"]["status"], "policy_gap");
    }
}
