//! Session adapter that drives the system OpenSSH client.
//!
//! No connection is held open between commands: each command is its own
//! `ssh` process in batch mode, so authentication must be key based. A
//! configuration set is piped through a single `ssh -T` invocation.
//!
//! Without an interactive shell there is no prompt to read, so the session
//! reports `<inventory name>#`. Scans over this adapter therefore key records
//! by inventory name rather than by the hostname the device prints.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use netfleet_core::{DeviceDescriptor, DeviceSession, SessionConnector, TransportError};

/// Exit status OpenSSH reserves for its own failures.
const SSH_FAILURE_EXIT: i32 = 255;

/// OpenSSH adapter settings.
///
/// The adapter never sees a device prompt; see the module docs for how
/// hostnames are derived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SshConfig {
    /// Client binary.
    pub program: String,
    /// Login used when the device descriptor carries none.
    pub username: Option<String>,
    pub identity_file: Option<PathBuf>,
    pub connect_timeout_secs: u64,
    /// Upper bound for one command, connection included.
    pub command_timeout_secs: u64,
    /// Extra client options, passed before the destination.
    pub extra_args: Vec<String>,
}

impl Default for SshConfig {
    fn default() -> Self {
        SshConfig {
            program: std::env::var("NETFLEET_SSH_PROGRAM").unwrap_or_else(|_| "ssh".to_string()),
            username: std::env::var("NETFLEET_SSH_USER").ok(),
            identity_file: std::env::var("NETFLEET_SSH_IDENTITY").ok().map(PathBuf::from),
            connect_timeout_secs: 10,
            command_timeout_secs: 30,
            extra_args: Vec::new(),
        }
    }
}

impl SshConfig {
    /// Defaults, with program, user and identity taken from the environment.
    pub fn from_env() -> Self {
        Self::default()
    }

    pub fn with_program(mut self, program: &str) -> Self {
        self.program = program.to_string();
        self
    }

    pub fn with_command_timeout(mut self, secs: u64) -> Self {
        self.command_timeout_secs = secs;
        self
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.program.trim().is_empty() {
            anyhow::bail!("ssh program must not be empty");
        }
        if self.command_timeout_secs == 0 {
            anyhow::bail!("ssh command_timeout_secs must be at least 1");
        }
        Ok(())
    }

    /// Client arguments up to and including the destination host.
    fn destination_args(&self, device: &DeviceDescriptor) -> Vec<String> {
        let mut args = vec![
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={}", self.connect_timeout_secs),
        ];
        if let Some(port) = device.port {
            args.push("-p".to_string());
            args.push(port.to_string());
        }
        if let Some(user) = device.username.as_ref().or(self.username.as_ref()) {
            args.push("-l".to_string());
            args.push(user.clone());
        }
        if let Some(identity) = &self.identity_file {
            args.push("-i".to_string());
            args.push(identity.display().to_string());
        }
        args.extend(self.extra_args.iter().cloned());
        args.push(device.host.clone());
        args
    }
}

/// Map an OpenSSH failure (exit 255) to a transport error from its stderr.
pub fn classify_ssh_failure(stderr: &str, host: &str, connect_timeout_secs: u64) -> TransportError {
    let detail = stderr
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("ssh exited with status 255")
        .to_string();
    let lower = stderr.to_ascii_lowercase();
    if lower.contains("permission denied")
        || lower.contains("authentication failed")
        || lower.contains("too many authentication failures")
        || lower.contains("host key verification failed")
    {
        TransportError::AuthFailed(detail)
    } else if lower.contains("connection refused") {
        TransportError::ConnectionRefused(host.to_string())
    } else if lower.contains("timed out") {
        TransportError::Timeout {
            after_ms: connect_timeout_secs * 1000,
        }
    } else if lower.contains("could not resolve hostname")
        || lower.contains("no route to host")
        || lower.contains("network is unreachable")
    {
        TransportError::Unreachable(host.to_string())
    } else {
        TransportError::Disconnected(detail)
    }
}

/// Connector for the system OpenSSH client.
#[derive(Debug, Clone)]
pub struct OpenSshConnector {
    config: SshConfig,
}

impl OpenSshConnector {
    pub fn new(config: SshConfig) -> Self {
        OpenSshConnector { config }
    }

    pub fn from_env() -> Self {
        Self::new(SshConfig::from_env())
    }

    pub fn config(&self) -> &SshConfig {
        &self.config
    }
}

#[async_trait]
impl SessionConnector for OpenSshConnector {
    async fn open(
        &self,
        device: &DeviceDescriptor,
    ) -> Result<Box<dyn DeviceSession>, TransportError> {
        Ok(Box::new(OpenSshSession {
            config: self.config.clone(),
            device: device.clone(),
            enabled: false,
            closed: false,
        }))
    }
}

struct OpenSshSession {
    config: SshConfig,
    device: DeviceDescriptor,
    enabled: bool,
    closed: bool,
}

impl OpenSshSession {
    async fn run(&self, extra: &[&str], stdin: Option<String>) -> Result<String, TransportError> {
        if self.closed {
            return Err(TransportError::SessionClosed);
        }

        let mut args = self.config.destination_args(&self.device);
        if stdin.is_some() {
            args.insert(0, "-T".to_string());
        }
        args.extend(extra.iter().map(|s| s.to_string()));
        debug!(device = %self.device.name, program = %self.config.program, "spawning ssh");

        let mut child = Command::new(&self.config.program)
            .args(&args)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                TransportError::Disconnected(format!(
                    "failed to launch {}: {e}",
                    self.config.program
                ))
            })?;

        if let (Some(payload), Some(mut pipe)) = (stdin, child.stdin.take()) {
            pipe.write_all(payload.as_bytes())
                .await
                .map_err(|e| TransportError::Disconnected(format!("writing to ssh: {e}")))?;
        }

        let timeout = Duration::from_secs(self.config.command_timeout_secs);
        let output = tokio::time::timeout(timeout, child.wait_with_output())
            .await
            .map_err(|_| TransportError::Timeout {
                after_ms: timeout.as_millis() as u64,
            })?
            .map_err(|e| TransportError::Disconnected(e.to_string()))?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        if output.status.code() == Some(SSH_FAILURE_EXIT) {
            return Err(classify_ssh_failure(
                &stderr,
                &self.device.host,
                self.config.connect_timeout_secs,
            ));
        }
        if stderr.trim().is_empty() {
            Ok(stdout)
        } else {
            Ok(format!("{stdout}{stderr}"))
        }
    }
}

/// Lines piped into the remote CLI for one configuration set.
fn config_script(lines: &[String], enable: bool) -> String {
    let mut script = String::new();
    if enable {
        script.push_str("enable\n");
    }
    script.push_str("configure terminal\n");
    for line in lines {
        script.push_str(line);
        script.push('\n');
    }
    script.push_str("end\n");
    script
}

#[async_trait]
impl DeviceSession for OpenSshSession {
    async fn send_command(&mut self, command: &str) -> Result<String, TransportError> {
        self.run(&[command], None).await
    }

    async fn find_prompt(&mut self) -> Result<String, TransportError> {
        if self.closed {
            return Err(TransportError::SessionClosed);
        }
        // Non-interactive: no prompt on the wire.
        Ok(format!("{}#", self.device.name))
    }

    async fn enable(&mut self) -> Result<(), TransportError> {
        self.enabled = true;
        Ok(())
    }

    async fn send_config_set(&mut self, lines: &[String]) -> Result<String, TransportError> {
        self.run(&[], Some(config_script(lines, self.enabled))).await
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        self.closed = true;
        Ok(())
    }
}
