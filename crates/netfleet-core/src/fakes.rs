//! In-memory session adapter (testing and offline replay).
//!
//! [`ScriptedConnector`] answers commands from canned outputs, can delay or
//! fail individual devices, and keeps counters that let tests assert on
//! concurrency and session release.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::{DeviceDescriptor, TransportError};
use crate::session::{DeviceSession, SessionConnector};

/// Canned behaviour for one device.
#[derive(Debug, Clone, Default)]
pub struct ScriptedDevice {
    pub prompt: String,
    pub outputs: HashMap<String, String>,
    pub latency: Duration,
    /// Returned from `open` instead of a session.
    pub open_failure: Option<TransportError>,
    /// Per-command failures, checked before `outputs`.
    pub command_failures: HashMap<String, TransportError>,
    /// Config lines the device answers with `% Invalid input`.
    pub rejected_lines: Vec<String>,
}

impl ScriptedDevice {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    pub fn with_output(mut self, command: impl Into<String>, output: impl Into<String>) -> Self {
        self.outputs.insert(command.into(), output.into());
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn failing_open(mut self, error: TransportError) -> Self {
        self.open_failure = Some(error);
        self
    }

    pub fn failing_command(mut self, command: impl Into<String>, error: TransportError) -> Self {
        self.command_failures.insert(command.into(), error);
        self
    }

    pub fn rejecting(mut self, line: impl Into<String>) -> Self {
        self.rejected_lines.push(line.into());
        self
    }

    fn hostname(&self) -> &str {
        self.prompt.trim_end_matches(['#', '>'])
    }
}

/// Snapshot of connector activity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScriptStats {
    pub opened: usize,
    pub closed: usize,
    pub peak_in_flight: usize,
    /// `(device, command)` in the order they were received.
    pub commands: Vec<(String, String)>,
    /// `(device, lines)` for every config set received.
    pub config_sets: Vec<(String, Vec<String>)>,
}

#[derive(Debug, Default)]
struct Activity {
    opened: AtomicUsize,
    closed: AtomicUsize,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
    commands: Mutex<Vec<(String, String)>>,
    config_sets: Mutex<Vec<(String, Vec<String>)>>,
}

/// Connector backed by a `HashMap<device name, ScriptedDevice>`.
#[derive(Debug, Default)]
pub struct ScriptedConnector {
    devices: HashMap<String, ScriptedDevice>,
    activity: Arc<Activity>,
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_device(mut self, name: impl Into<String>, device: ScriptedDevice) -> Self {
        self.devices.insert(name.into(), device);
        self
    }

    pub fn stats(&self) -> ScriptStats {
        ScriptStats {
            opened: self.activity.opened.load(Ordering::SeqCst),
            closed: self.activity.closed.load(Ordering::SeqCst),
            peak_in_flight: self.activity.peak_in_flight.load(Ordering::SeqCst),
            commands: self.activity.commands.lock().unwrap().clone(),
            config_sets: self.activity.config_sets.lock().unwrap().clone(),
        }
    }
}

#[async_trait]
impl SessionConnector for ScriptedConnector {
    async fn open(
        &self,
        device: &DeviceDescriptor,
    ) -> Result<Box<dyn DeviceSession>, TransportError> {
        let script = self
            .devices
            .get(&device.name)
            .ok_or_else(|| TransportError::Unreachable(device.host.clone()))?;
        if let Some(err) = &script.open_failure {
            if !script.latency.is_zero() {
                tokio::time::sleep(script.latency).await;
            }
            return Err(err.clone());
        }

        let activity = Arc::clone(&self.activity);
        activity.opened.fetch_add(1, Ordering::SeqCst);
        let now = activity.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        activity.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        Ok(Box::new(ScriptedSession {
            name: device.name.clone(),
            script: script.clone(),
            activity,
            enabled: false,
            closed: false,
        }))
    }
}

struct ScriptedSession {
    name: String,
    script: ScriptedDevice,
    activity: Arc<Activity>,
    enabled: bool,
    closed: bool,
}

impl ScriptedSession {
    fn ensure_open(&self) -> Result<(), TransportError> {
        if self.closed {
            return Err(TransportError::SessionClosed);
        }
        Ok(())
    }

    async fn delay(&self) {
        if !self.script.latency.is_zero() {
            tokio::time::sleep(self.script.latency).await;
        }
    }
}

#[async_trait]
impl DeviceSession for ScriptedSession {
    async fn send_command(&mut self, command: &str) -> Result<String, TransportError> {
        self.ensure_open()?;
        self.activity
            .commands
            .lock()
            .unwrap()
            .push((self.name.clone(), command.to_string()));
        self.delay().await;

        if let Some(err) = self.script.command_failures.get(command) {
            return Err(err.clone());
        }
        Ok(self
            .script
            .outputs
            .get(command)
            .cloned()
            .unwrap_or_else(|| "% Invalid input".to_string()))
    }

    async fn find_prompt(&mut self) -> Result<String, TransportError> {
        self.ensure_open()?;
        Ok(self.script.prompt.clone())
    }

    async fn enable(&mut self) -> Result<(), TransportError> {
        self.ensure_open()?;
        self.enabled = true;
        Ok(())
    }

    async fn send_config_set(&mut self, lines: &[String]) -> Result<String, TransportError> {
        self.ensure_open()?;
        self.activity
            .config_sets
            .lock()
            .unwrap()
            .push((self.name.clone(), lines.to_vec()));
        self.delay().await;

        let host = self.script.hostname().to_string();
        let mut transcript = String::from("config term\n");
        if !self.enabled {
            transcript.push_str("% Invalid input (privileged mode required)\n");
            transcript.push_str(&format!("{host}>"));
            return Ok(transcript);
        }

        let mut mode = "config".to_string();
        for line in lines {
            transcript.push_str(&format!("{host}({mode})#{line}\n"));
            if self.script.rejected_lines.iter().any(|r| r == line) {
                transcript.push_str("% Invalid input\n");
                continue;
            }
            if let Some(id) = line.strip_prefix("interface ") {
                mode = format!("config-if-{}", id.trim());
            }
        }
        transcript.push_str(&format!("{host}({mode})#end\n{host}#"));
        Ok(transcript)
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.activity.closed.fetch_add(1, Ordering::SeqCst);
        self.activity.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}
