//! Bounded-concurrency fan-out of commands to a device fleet.
//!
//! Every batch call spawns one task per device, gated by a semaphore sized to
//! the caller's `concurrency`. Each task owns its device and its session; the
//! only join point is the final collection, where task handles are awaited in
//! input order so slot `i` always holds device `i`'s outcome.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{debug, Instrument};

use crate::domain::{DeviceDescriptor, DeviceError, DispatchError};
use crate::obs;
use crate::session::{capture_with_prompt, SessionConnector, SessionScope};

/// Outcome of one device task, tagged with the device it belongs to.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(bound(serialize = "T: Serialize"))]
pub struct DeviceOutcome<T> {
    pub device: DeviceDescriptor,
    #[serde(serialize_with = "serialize_outcome")]
    pub outcome: std::result::Result<T, DeviceError>,
    /// Wall-clock time of the device task, excluding time queued for a permit.
    pub elapsed_ms: u64,
}

impl<T> DeviceOutcome<T> {
    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn value(&self) -> Option<&T> {
        self.outcome.as_ref().ok()
    }

    pub fn error(&self) -> Option<&DeviceError> {
        self.outcome.as_ref().err()
    }
}

fn serialize_outcome<T: Serialize, S: serde::Serializer>(
    outcome: &std::result::Result<T, DeviceError>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    use serde::ser::SerializeMap;
    let mut map = serializer.serialize_map(Some(2))?;
    match outcome {
        Ok(value) => {
            map.serialize_entry("status", "ok")?;
            map.serialize_entry("value", value)?;
        }
        Err(e) => {
            map.serialize_entry("status", e.kind())?;
            map.serialize_entry("error", &e.to_string())?;
        }
    }
    map.end()
}

/// Raw text (or error) produced by one device for one command.
pub type CommandResult = DeviceOutcome<String>;

/// One command and its output within a command set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandOutput {
    pub command: String,
    pub text: String,
}

/// How command output is returned to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CaptureMode {
    /// Output exactly as the device printed it.
    #[default]
    Raw,
    /// `{prompt}{command}\n{output}`, so the text identifies its device.
    WithPrompt,
}

/// Reject malformed batch calls before any device is contacted.
pub fn validate_batch(devices: usize, concurrency: usize) -> std::result::Result<(), DispatchError> {
    if devices == 0 {
        return Err(DispatchError::EmptyInventory);
    }
    if concurrency == 0 {
        return Err(DispatchError::InvalidConcurrency(concurrency));
    }
    Ok(())
}

/// Pair every device with a unit job, for tasks that need nothing but the
/// device itself.
pub(crate) fn device_jobs(devices: &[DeviceDescriptor]) -> Vec<(DeviceDescriptor, ())> {
    devices.iter().cloned().map(|d| (d, ())).collect()
}

/// Run `task` once per `(device, job)` with at most `concurrency` tasks in
/// flight.
///
/// Results come back in the order of `jobs`. A task that panics is reported
/// as [`DeviceError::TaskAborted`] for its own slot only.
pub(crate) async fn fan_out<J, T, F, Fut>(
    batch_id: &str,
    jobs: Vec<(DeviceDescriptor, J)>,
    concurrency: usize,
    task: F,
) -> Vec<DeviceOutcome<T>>
where
    J: Send + 'static,
    T: Send + 'static,
    F: Fn(DeviceDescriptor, J) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = std::result::Result<T, DeviceError>> + Send + 'static,
{
    let permits = concurrency.clamp(1, jobs.len().max(1));
    let sem = Arc::new(Semaphore::new(permits));
    let task = Arc::new(task);
    let devices: Vec<DeviceDescriptor> = jobs.iter().map(|(d, _)| d.clone()).collect();

    let handles: Vec<_> = jobs
        .into_iter()
        .map(|(device, job)| {
            let sem = Arc::clone(&sem);
            let task = Arc::clone(&task);
            let batch_id = batch_id.to_string();
            tokio::spawn(
                async move {
                    let _permit = sem.acquire_owned().await.ok();
                    let name = device.name.clone();
                    let start = Instant::now();
                    let outcome = (*task)(device, job).await;
                    let elapsed_ms = start.elapsed().as_millis() as u64;
                    match &outcome {
                        Ok(_) => obs::emit_device_finished(&batch_id, &name, elapsed_ms),
                        Err(e) => obs::emit_device_failed(&batch_id, &name, e.kind(), e),
                    }
                    (outcome, elapsed_ms)
                }
                .in_current_span(),
            )
        })
        .collect();

    let joined = futures::future::join_all(handles).await;

    devices
        .into_iter()
        .zip(joined)
        .map(|(device, joined)| match joined {
            Ok((outcome, elapsed_ms)) => DeviceOutcome {
                device,
                outcome,
                elapsed_ms,
            },
            Err(e) => {
                obs::emit_device_failed(batch_id, &device.name, "task_aborted", &e);
                DeviceOutcome {
                    device,
                    outcome: Err(DeviceError::TaskAborted(e.to_string())),
                    elapsed_ms: 0,
                }
            }
        })
        .collect()
}

/// Wraps `fan_out` with validation, a batch span and start/finish events.
pub(crate) async fn run_batch<J, T, F, Fut>(
    operation: &str,
    jobs: Vec<(DeviceDescriptor, J)>,
    concurrency: usize,
    task: F,
) -> std::result::Result<Vec<DeviceOutcome<T>>, DispatchError>
where
    J: Send + 'static,
    T: Send + 'static,
    F: Fn(DeviceDescriptor, J) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = std::result::Result<T, DeviceError>> + Send + 'static,
{
    validate_batch(jobs.len(), concurrency)?;

    let batch_id = obs::new_batch_id();
    let span = obs::batch_span(&batch_id, operation);
    let devices = jobs.len();
    async {
        obs::emit_batch_started(&batch_id, operation, devices, concurrency);
        let start = Instant::now();
        let results = fan_out(&batch_id, jobs, concurrency, task).await;
        let failed = results.iter().filter(|r| !r.is_ok()).count();
        obs::emit_batch_finished(
            &batch_id,
            results.len() - failed,
            failed,
            start.elapsed().as_millis() as u64,
        );
        Ok(results)
    }
    .instrument(span)
    .await
}

/// Fans commands out to devices through a [`SessionConnector`].
#[derive(Clone)]
pub struct Dispatcher {
    connector: Arc<dyn SessionConnector>,
}

impl Dispatcher {
    pub fn new(connector: Arc<dyn SessionConnector>) -> Self {
        Self { connector }
    }

    pub fn connector(&self) -> Arc<dyn SessionConnector> {
        Arc::clone(&self.connector)
    }

    /// Run `command` on every device; one result per device, in input order.
    pub async fn dispatch(
        &self,
        devices: &[DeviceDescriptor],
        command: &str,
        concurrency: usize,
    ) -> std::result::Result<Vec<CommandResult>, DispatchError> {
        self.dispatch_with(devices, command, concurrency, CaptureMode::Raw)
            .await
    }

    /// Like [`Dispatcher::dispatch`], with each text prefixed by the device
    /// prompt and the command echo.
    pub async fn dispatch_with_prompt(
        &self,
        devices: &[DeviceDescriptor],
        command: &str,
        concurrency: usize,
    ) -> std::result::Result<Vec<CommandResult>, DispatchError> {
        self.dispatch_with(devices, command, concurrency, CaptureMode::WithPrompt)
            .await
    }

    pub async fn dispatch_with(
        &self,
        devices: &[DeviceDescriptor],
        command: &str,
        concurrency: usize,
        mode: CaptureMode,
    ) -> std::result::Result<Vec<CommandResult>, DispatchError> {
        let connector = Arc::clone(&self.connector);
        let command = command.to_string();
        run_batch("dispatch", device_jobs(devices), concurrency, move |device, ()| {
            let connector = Arc::clone(&connector);
            let command = command.clone();
            async move { run_command(connector.as_ref(), &device, &command, mode).await }
        })
        .await
    }

    /// Run `commands` in order on every device, one session per device.
    ///
    /// A device stops at its first failing command; its result is that error.
    pub async fn dispatch_command_set(
        &self,
        devices: &[DeviceDescriptor],
        commands: &[String],
        concurrency: usize,
    ) -> std::result::Result<Vec<DeviceOutcome<Vec<CommandOutput>>>, DispatchError> {
        let connector = Arc::clone(&self.connector);
        let commands: Arc<[String]> = commands.into();
        run_batch("dispatch_command_set", device_jobs(devices), concurrency, move |device, ()| {
            let connector = Arc::clone(&connector);
            let commands = Arc::clone(&commands);
            async move { run_command_set(connector.as_ref(), &device, &commands).await }
        })
        .await
    }
}

async fn run_command(
    connector: &dyn SessionConnector,
    device: &DeviceDescriptor,
    command: &str,
    mode: CaptureMode,
) -> std::result::Result<String, DeviceError> {
    let mut scope = SessionScope::open(connector, device).await?;
    let outcome = match mode {
        CaptureMode::Raw => scope.session().send_command(command).await,
        CaptureMode::WithPrompt => capture_with_prompt(scope.session(), command).await,
    }
    .map_err(DeviceError::from);
    scope.finish(outcome).await
}

/// Run `commands` on one device inside a single session.
pub async fn run_command_set(
    connector: &dyn SessionConnector,
    device: &DeviceDescriptor,
    commands: &[String],
) -> std::result::Result<Vec<CommandOutput>, DeviceError> {
    let mut scope = SessionScope::open(connector, device).await?;
    let mut outputs = Vec::with_capacity(commands.len());
    let mut outcome = Ok(());
    for command in commands {
        debug!(device = %device.name, command = %command, "sending command");
        match scope.session().send_command(command).await {
            Ok(text) => outputs.push(CommandOutput {
                command: command.clone(),
                text,
            }),
            Err(e) => {
                outcome = Err(DeviceError::from(e));
                break;
            }
        }
    }
    scope.finish(outcome.map(|_| outputs)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TransportError;
    use crate::fakes::{ScriptedConnector, ScriptedDevice};
    use std::time::Duration;

    fn fleet(n: usize) -> (Vec<DeviceDescriptor>, ScriptedConnector) {
        let mut connector = ScriptedConnector::new();
        let mut devices = Vec::new();
        for i in 0..n {
            let name = format!("sw{i}");
            // Later devices answer faster, so completion order is reversed.
            let latency = Duration::from_millis(((n - i) * 10) as u64);
            connector = connector.with_device(
                &name,
                ScriptedDevice::new(format!("{name}#"))
                    .with_output("show clock", format!("clock of {name}"))
                    .with_latency(latency),
            );
            devices.push(DeviceDescriptor::new(name));
        }
        (devices, connector)
    }

    #[test]
    fn test_validate_batch() {
        assert_eq!(validate_batch(0, 4), Err(DispatchError::EmptyInventory));
        assert_eq!(
            validate_batch(3, 0),
            Err(DispatchError::InvalidConcurrency(0))
        );
        assert!(validate_batch(3, 100).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_results_follow_input_order_not_completion_order() {
        let (devices, connector) = fleet(5);
        let dispatcher = Dispatcher::new(Arc::new(connector));

        let results = dispatcher.dispatch(&devices, "show clock", 5).await.unwrap();

        let names: Vec<&str> = results.iter().map(|r| r.device.name.as_str()).collect();
        assert_eq!(names, vec!["sw0", "sw1", "sw2", "sw3", "sw4"]);
        for r in &results {
            assert_eq!(r.value().unwrap(), &format!("clock of {}", r.device.name));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrency_bound_is_respected() {
        let (devices, connector) = fleet(6);
        let connector = Arc::new(connector);
        let dispatcher = Dispatcher::new(connector.clone());

        dispatcher.dispatch(&devices, "show clock", 2).await.unwrap();

        let stats = connector.stats();
        assert_eq!(stats.opened, 6);
        assert_eq!(stats.closed, 6);
        assert!(stats.peak_in_flight <= 2, "peak was {}", stats.peak_in_flight);
    }

    #[tokio::test]
    async fn test_zero_concurrency_fails_before_contacting_devices() {
        let (devices, connector) = fleet(2);
        let connector = Arc::new(connector);
        let dispatcher = Dispatcher::new(connector.clone());

        let err = dispatcher.dispatch(&devices, "show clock", 0).await.unwrap_err();
        assert_eq!(err, DispatchError::InvalidConcurrency(0));
        assert_eq!(connector.stats().opened, 0);
    }

    #[tokio::test]
    async fn test_prompt_capture_mode() {
        let connector = ScriptedConnector::new().with_device(
            "edge-1",
            ScriptedDevice::new("edge-switch-1#").with_output("show hostname", "ok"),
        );
        let dispatcher = Dispatcher::new(Arc::new(connector));
        let results = dispatcher
            .dispatch_with_prompt(&[DeviceDescriptor::new("edge-1")], "show hostname", 1)
            .await
            .unwrap();
        assert_eq!(results[0].value().unwrap(), "edge-switch-1#show hostname\nok");
    }

    #[tokio::test]
    async fn test_command_set_stops_at_first_failure_and_releases_session() {
        let connector = Arc::new(
            ScriptedConnector::new().with_device(
                "r1",
                ScriptedDevice::new("r1#")
                    .with_output("show a", "A")
                    .failing_command("show b", TransportError::Timeout { after_ms: 5000 })
                    .with_output("show c", "C"),
            ),
        );
        let commands: Vec<String> = ["show a", "show b", "show c"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let err = run_command_set(connector.as_ref(), &DeviceDescriptor::new("r1"), &commands)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            DeviceError::Transport(TransportError::Timeout { after_ms: 5000 })
        );

        let stats = connector.stats();
        assert_eq!(stats.commands.len(), 2);
        assert_eq!(stats.closed, 1);
    }

    #[test]
    fn test_outcome_serializes_status_and_error() {
        let ok: CommandResult = DeviceOutcome {
            device: DeviceDescriptor::new("a"),
            outcome: Ok("text".to_string()),
            elapsed_ms: 3,
        };
        let json = serde_json::to_value(&ok).unwrap();
        assert_eq!(json["outcome"]["status"], "ok");
        assert_eq!(json["outcome"]["value"], "text");

        let failed: CommandResult = DeviceOutcome {
            device: DeviceDescriptor::new("b"),
            outcome: Err(TransportError::AuthFailed("denied".to_string()).into()),
            elapsed_ms: 0,
        };
        let json = serde_json::to_value(&failed).unwrap();
        assert_eq!(json["outcome"]["status"], "auth_failed");
    }
}
