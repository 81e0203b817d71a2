//! Pushing planned configuration to devices.
//!
//! Each device gets one session: privileged mode, then the directive lines as
//! a single configuration set. The transcript is returned as-is unless the
//! device answered a line with its CLI error marker (`%`), in which case the
//! device's result is [`DeviceError::ConfigRejected`].

use std::sync::Arc;

use tracing::{debug, info};

use crate::dispatch::{run_batch, validate_batch, DeviceOutcome, Dispatcher};
use crate::domain::{
    directive_lines, ConfigDirective, DeviceDescriptor, DeviceError, DispatchError,
};
use crate::planner::MutationBatch;
use crate::session::{DeviceSession, SessionConnector, SessionScope};

/// Transcript (or error) of one device's configuration push.
pub type ApplyResult = DeviceOutcome<String>;

impl Dispatcher {
    /// Apply each device's directives, at most `concurrency` devices at once.
    ///
    /// A device with no directives is reported as an empty transcript and no
    /// session is opened for it.
    pub async fn apply_batches(
        &self,
        batches: Vec<(DeviceDescriptor, Vec<ConfigDirective>)>,
        concurrency: usize,
    ) -> std::result::Result<Vec<ApplyResult>, DispatchError> {
        let connector = self.connector();
        run_batch("apply_batches", batches, concurrency, move |device, directives| {
            let connector = Arc::clone(&connector);
            async move { apply_directives(connector.as_ref(), &device, &directives).await }
        })
        .await
    }

    /// Apply a planned batch.
    ///
    /// Output has one entry per planned device, in plan order. Devices whose
    /// role had no policy prefix carry their `PolicyGap` as the error; they
    /// are never contacted.
    pub async fn remediate(
        &self,
        batch: &MutationBatch,
        concurrency: usize,
    ) -> std::result::Result<Vec<ApplyResult>, DispatchError> {
        validate_batch(batch.len(), concurrency)?;

        let jobs: Vec<(DeviceDescriptor, Vec<ConfigDirective>)> = batch
            .iter()
            .filter_map(|m| {
                m.directives
                    .as_ref()
                    .ok()
                    .map(|d| (m.device.clone(), d.clone()))
            })
            .collect();

        let mut applied = if jobs.is_empty() {
            Vec::new()
        } else {
            self.apply_batches(jobs, concurrency).await?
        }
        .into_iter();

        let results = batch
            .iter()
            .filter_map(|m| match &m.directives {
                Ok(_) => applied.next(),
                Err(gap) => Some(DeviceOutcome {
                    device: m.device.clone(),
                    outcome: Err(DeviceError::from(gap.clone())),
                    elapsed_ms: 0,
                }),
            })
            .collect();
        Ok(results)
    }
}

/// Push `directives` to one device inside a single session.
pub async fn apply_directives(
    connector: &dyn SessionConnector,
    device: &DeviceDescriptor,
    directives: &[ConfigDirective],
) -> std::result::Result<String, DeviceError> {
    if directives.is_empty() {
        debug!(device = %device.name, "nothing to apply");
        return Ok(String::new());
    }

    let lines = directive_lines(directives);
    let mut scope = SessionScope::open(connector, device).await?;
    let outcome = push_config(scope.session(), &lines).await;
    if outcome.is_ok() {
        info!(device = %device.name, lines = lines.len(), "configuration applied");
    }
    scope.finish(outcome).await
}

async fn push_config(
    session: &mut dyn DeviceSession,
    lines: &[String],
) -> std::result::Result<String, DeviceError> {
    session.enable().await?;
    let transcript = session.send_config_set(lines).await?;
    match find_rejection(&transcript) {
        Some(err) => Err(err),
        None => Ok(transcript),
    }
}

/// First line of `transcript` carrying the `%` error marker, paired with the
/// command that provoked it.
pub fn find_rejection(transcript: &str) -> Option<DeviceError> {
    let mut previous = "";
    for line in transcript.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with('%') {
            let offending = previous
                .split_once('#')
                .map_or(previous, |(_, command)| command)
                .trim();
            return Some(DeviceError::ConfigRejected {
                line: offending.to_string(),
                message: trimmed.to_string(),
            });
        }
        if !trimmed.is_empty() {
            previous = trimmed;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{PlanError, TransportError};
    use crate::fakes::{ScriptedConnector, ScriptedDevice};

    fn descr(id: &str, text: &str) -> ConfigDirective {
        ConfigDirective::interface_description(id, text)
    }

    #[test]
    fn test_find_rejection_names_offending_line() {
        let transcript = "config term\n\
                          sw1(config)#interface Po1\n\
                          sw1(config-if-Po1)#descripton X\n\
                          % Invalid input\n\
                          sw1(config-if-Po1)#end\n\
                          sw1#";
        assert_eq!(
            find_rejection(transcript),
            Some(DeviceError::ConfigRejected {
                line: "descripton X".to_string(),
                message: "% Invalid input".to_string(),
            })
        );
        assert_eq!(find_rejection("config term\nsw1(config)#end\nsw1#"), None);
    }

    #[tokio::test]
    async fn test_apply_enters_enable_and_returns_transcript() {
        let connector = Arc::new(ScriptedConnector::new().with_device("sw1", ScriptedDevice::new("sw1#")));
        let dispatcher = Dispatcher::new(connector.clone());

        let results = dispatcher
            .apply_batches(
                vec![(DeviceDescriptor::new("sw1"), vec![descr("Po1", "UPLINK-ISP1")])],
                4,
            )
            .await
            .unwrap();

        let transcript = results[0].value().unwrap();
        assert!(transcript.contains("sw1(config-if-Po1)#description UPLINK-ISP1"));
        let stats = connector.stats();
        assert_eq!(
            stats.config_sets,
            vec![(
                "sw1".to_string(),
                vec![
                    "interface Po1".to_string(),
                    "description UPLINK-ISP1".to_string()
                ]
            )]
        );
        assert_eq!(stats.closed, 1);
    }

    #[tokio::test]
    async fn test_rejected_line_fails_only_that_device() {
        let connector = ScriptedConnector::new()
            .with_device("sw1", ScriptedDevice::new("sw1#"))
            .with_device(
                "sw2",
                ScriptedDevice::new("sw2#").rejecting("description UPLINK-ISP2"),
            );
        let dispatcher = Dispatcher::new(Arc::new(connector));

        let results = dispatcher
            .apply_batches(
                vec![
                    (DeviceDescriptor::new("sw1"), vec![descr("Po1", "UPLINK-ISP1")]),
                    (DeviceDescriptor::new("sw2"), vec![descr("Po2", "UPLINK-ISP2")]),
                ],
                2,
            )
            .await
            .unwrap();

        assert!(results[0].is_ok());
        match results[1].error() {
            Some(DeviceError::ConfigRejected { line, .. }) => {
                assert_eq!(line, "description UPLINK-ISP2")
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unreachable_device_is_reported_in_place() {
        let connector = ScriptedConnector::new().with_device(
            "sw1",
            ScriptedDevice::new("sw1#")
                .failing_open(TransportError::AuthFailed("bad key".to_string())),
        );
        let dispatcher = Dispatcher::new(Arc::new(connector));
        let results = dispatcher
            .apply_batches(
                vec![(DeviceDescriptor::new("sw1"), vec![descr("Po1", "X")])],
                1,
            )
            .await
            .unwrap();
        assert_eq!(results[0].error().map(DeviceError::kind), Some("auth_failed"));
    }

    #[tokio::test]
    async fn test_empty_directives_open_no_session() {
        let connector = Arc::new(ScriptedConnector::new().with_device("sw1", ScriptedDevice::new("sw1#")));
        let dispatcher = Dispatcher::new(connector.clone());
        let results = dispatcher
            .apply_batches(vec![(DeviceDescriptor::new("sw1"), vec![])], 1)
            .await
            .unwrap();
        assert_eq!(results[0].value().map(String::as_str), Some(""));
        assert_eq!(connector.stats().opened, 0);
    }

    #[tokio::test]
    async fn test_empty_batch_is_rejected() {
        let dispatcher = Dispatcher::new(Arc::new(ScriptedConnector::new()));
        let err = dispatcher.apply_batches(vec![], 1).await.unwrap_err();
        assert_eq!(err, DispatchError::EmptyInventory);
    }

    #[tokio::test]
    async fn test_remediate_keeps_gaps_in_plan_order() {
        use crate::domain::{
            DeviceRecordSet, ExtractedRecord, InterfaceDescription, RemediationPolicy,
        };
        use crate::planner::plan_by_device_role;

        let iface = |id: &str, d: &str| {
            ExtractedRecord::InterfaceDescription(InterfaceDescription {
                interface_id: id.to_string(),
                description: d.to_string(),
            })
        };
        let mut set = DeviceRecordSet::new();
        set.insert("a", DeviceDescriptor::new("a").with_role("storage"), vec![iface("Po1", "NAS")])
            .unwrap();
        set.insert("b", DeviceDescriptor::new("b"), vec![iface("Po1", "ISP1")])
            .unwrap();
        set.insert("c", DeviceDescriptor::new("c"), vec![iface("Po1", "UPLINK-ISP1")])
            .unwrap();
        let policy = RemediationPolicy::new().with_role("uplink", "UPLINK-");
        let batch = plan_by_device_role(&set, &policy, "uplink");

        let connector = Arc::new(
            ScriptedConnector::new()
                .with_device("a", ScriptedDevice::new("a#"))
                .with_device("b", ScriptedDevice::new("b#"))
                .with_device("c", ScriptedDevice::new("c#")),
        );
        let dispatcher = Dispatcher::new(connector.clone());
        let results = dispatcher.remediate(&batch, 3).await.unwrap();

        let names: Vec<&str> = results.iter().map(|r| r.device.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(
            results[0].error(),
            Some(&DeviceError::Plan(PlanError::PolicyGap {
                role: "storage".to_string()
            }))
        );
        assert!(results[1].value().unwrap().contains("UPLINK-ISP1"));
        assert_eq!(results[2].value().map(String::as_str), Some(""));
        assert_eq!(connector.stats().opened, 1);
    }
}
