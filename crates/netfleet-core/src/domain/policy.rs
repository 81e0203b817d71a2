//! Remediation policy and configuration directives.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Role label to description prefix, e.g. `uplink -> UPLINK-`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemediationPolicy {
    prefixes: BTreeMap<String, String>,
}

impl RemediationPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_role(mut self, role: impl Into<String>, prefix: impl Into<String>) -> Self {
        self.prefixes.insert(role.into(), prefix.into());
        self
    }

    pub fn prefix_for(&self, role: &str) -> Option<&str> {
        self.prefixes.get(role).map(String::as_str)
    }

    pub fn roles(&self) -> impl Iterator<Item = &str> {
        self.prefixes.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.prefixes.is_empty()
    }
}

impl FromIterator<(String, String)> for RemediationPolicy {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            prefixes: iter.into_iter().collect(),
        }
    }
}

/// A configuration-mode step: enter a context, then set a value inside it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigDirective {
    pub context: String,
    pub value: String,
}

impl ConfigDirective {
    pub fn new(context: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            value: value.into(),
        }
    }

    /// `interface <id>` followed by `description <text>`.
    pub fn interface_description(interface_id: &str, description: &str) -> Self {
        Self::new(
            format!("interface {interface_id}"),
            format!("description {description}"),
        )
    }
}

/// Flatten directives into the line sequence sent to a device.
pub fn directive_lines(directives: &[ConfigDirective]) -> Vec<String> {
    directives
        .iter()
        .flat_map(|d| [d.context.clone(), d.value.clone()])
        .collect()
}
