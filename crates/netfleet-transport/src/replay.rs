//! Offline adapter that answers from a JSON fixture.
//!
//! ```json
//! {
//!   "devices": {
//!     "edge-1": {
//!       "prompt": "edge-switch-1#",
//!       "outputs": { "show version": "VERSION=4.28.3M" },
//!       "rejected_lines": ["description BAD"],
//!       "unreachable": false,
//!       "latency_ms": 0
//!     }
//!   }
//! }
//! ```

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use netfleet_core::fakes::{ScriptedConnector, ScriptedDevice};
use netfleet_core::{DeviceDescriptor, DeviceSession, SessionConnector, TransportError};

/// One device's canned behaviour.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceFixture {
    /// Defaults to `<name>#`.
    pub prompt: Option<String>,
    pub outputs: HashMap<String, String>,
    pub rejected_lines: Vec<String>,
    pub unreachable: bool,
    pub latency_ms: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayFixture {
    pub devices: BTreeMap<String, DeviceFixture>,
}

/// [`SessionConnector`] backed by a [`ReplayFixture`].
#[derive(Debug)]
pub struct ReplayConnector {
    names: Vec<String>,
    inner: ScriptedConnector,
}

impl ReplayConnector {
    pub fn from_fixture(fixture: ReplayFixture) -> Self {
        let names: Vec<String> = fixture.devices.keys().cloned().collect();
        let inner = fixture
            .devices
            .into_iter()
            .fold(ScriptedConnector::new(), |connector, (name, dev)| {
                let mut script = ScriptedDevice::new(
                    dev.prompt.unwrap_or_else(|| format!("{name}#")),
                )
                .with_latency(Duration::from_millis(dev.latency_ms));
                script.outputs = dev.outputs;
                script.rejected_lines = dev.rejected_lines;
                if dev.unreachable {
                    script = script.failing_open(TransportError::Unreachable(name.clone()));
                }
                connector.with_device(name, script)
            });
        ReplayConnector { names, inner }
    }

    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let fixture: ReplayFixture =
            serde_json::from_str(json).context("failed to parse replay fixture")?;
        Ok(Self::from_fixture(fixture))
    }

    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read replay fixture {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("in {}", path.display()))
    }

    /// A descriptor for every device in the fixture, sorted by name.
    pub fn devices(&self) -> Vec<DeviceDescriptor> {
        self.names.iter().map(DeviceDescriptor::new).collect()
    }
}

#[async_trait]
impl SessionConnector for ReplayConnector {
    async fn open(
        &self,
        device: &DeviceDescriptor,
    ) -> Result<Box<dyn DeviceSession>, TransportError> {
        self.inner.open(device).await
    }
}
