//! Device identity as supplied by the inventory.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity and connection parameters for one network device.
///
/// Owned by the inventory; the core only reads it and clones it into
/// results so every outcome can be traced back to its device.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    /// Inventory label, unique within one inventory.
    pub name: String,

    /// Address or resolvable hostname used to connect.
    pub host: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Platform hint for the adapter, e.g. `arista_eos`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,

    /// Remediation role label, looked up in a `RemediationPolicy`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl DeviceDescriptor {
    /// Descriptor whose name doubles as its connection host.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            host: name.clone(),
            name,
            port: None,
            username: None,
            platform: None,
            role: None,
        }
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }
}

impl fmt::Display for DeviceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name == self.host {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{} ({})", self.name, self.host)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_uses_name_as_host() {
        let d = DeviceDescriptor::new("edge-switch-1");
        assert_eq!(d.host, "edge-switch-1");
        assert_eq!(d.to_string(), "edge-switch-1");
    }

    #[test]
    fn test_display_with_distinct_host() {
        let d = DeviceDescriptor::new("leaf-1").with_host("10.0.0.11");
        assert_eq!(d.to_string(), "leaf-1 (10.0.0.11)");
    }

    #[test]
    fn test_deserialize_minimal() {
        let d: DeviceDescriptor =
            serde_json::from_str(r#"{"name":"edge-1","host":"192.168.111.111"}"#)
                .expect("deserialize");
        assert_eq!(d.port, None);
        assert_eq!(d.role, None);
        assert_eq!(d.host, "192.168.111.111");
    }
}
