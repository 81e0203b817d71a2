//! Session adapter boundary.
//!
//! The core never talks to a device directly. It asks a [`SessionConnector`]
//! for a [`DeviceSession`], runs one device's commands through that handle,
//! and releases it through [`SessionScope::finish`] whatever the outcome.
//! Nothing is shared between devices: every task opens its own session.

use async_trait::async_trait;
use tracing::warn;

use crate::domain::{DeviceDescriptor, DeviceError, TransportError};

/// Opens sessions to devices.
///
/// Inject a real implementation (SSH, replay fixtures) in production or
/// [`crate::fakes::ScriptedConnector`] in tests.
#[async_trait]
pub trait SessionConnector: Send + Sync {
    async fn open(
        &self,
        device: &DeviceDescriptor,
    ) -> std::result::Result<Box<dyn DeviceSession>, TransportError>;
}

/// A live session to one device.
///
/// Timeouts are the implementation's responsibility and must surface as
/// [`TransportError::Timeout`].
#[async_trait]
pub trait DeviceSession: Send {
    /// Execute one exec-mode command and return its raw output.
    async fn send_command(&mut self, command: &str) -> std::result::Result<String, TransportError>;

    /// Current CLI prompt, e.g. `edge-switch-1#`.
    async fn find_prompt(&mut self) -> std::result::Result<String, TransportError>;

    /// Enter privileged mode.
    async fn enable(&mut self) -> std::result::Result<(), TransportError>;

    /// Enter configuration mode, send `lines` in order, leave configuration
    /// mode, and return the full transcript.
    async fn send_config_set(
        &mut self,
        lines: &[String],
    ) -> std::result::Result<String, TransportError>;

    async fn close(&mut self) -> std::result::Result<(), TransportError>;
}

/// A session bound to the lifetime of one device's batch of commands.
pub struct SessionScope {
    device: String,
    session: Box<dyn DeviceSession>,
}

impl SessionScope {
    pub async fn open(
        connector: &dyn SessionConnector,
        device: &DeviceDescriptor,
    ) -> std::result::Result<Self, TransportError> {
        let session = connector.open(device).await?;
        Ok(Self {
            device: device.name.clone(),
            session,
        })
    }

    pub fn session(&mut self) -> &mut dyn DeviceSession {
        self.session.as_mut()
    }

    /// Close the session and hand back `outcome` unchanged.
    ///
    /// A failed close is logged, never allowed to mask the work result.
    pub async fn finish<T>(
        mut self,
        outcome: std::result::Result<T, DeviceError>,
    ) -> std::result::Result<T, DeviceError> {
        if let Err(e) = self.session.close().await {
            warn!(device = %self.device, error = %e, "failed to close session");
        }
        outcome
    }
}

/// Run `command` and prefix the output with the prompt and the command echo,
/// so the hostname can be recovered from the text alone.
pub async fn capture_with_prompt(
    session: &mut dyn DeviceSession,
    command: &str,
) -> std::result::Result<String, TransportError> {
    let output = session.send_command(command).await?;
    let prompt = session.find_prompt().await?;
    Ok(format!("{prompt}{command}\n{output}"))
}
