//! Interface description tables.
//!
//! ```text
//! Interface                      Status         Protocol           Description
//! Po1                            up             up                 ISP1-<channel-id>
//! Po2                            admin down     down               ISP2
//! ```
//!
//! Each line is tokenized on its own into `(interface, status, protocol,
//! description)`. Output that splits a row (interface token on one line, its
//! status row later) is still paired, first-in first-out, and anything left
//! without a partner is reported instead of silently shifted onto a
//! neighbouring interface.

use std::collections::VecDeque;

use serde::Serialize;

use crate::domain::InterfaceDescription;

/// Interface-name prefix used when the caller does not pick one.
pub const DEFAULT_INTERFACE_PREFIX: &str = "Po";

const PROTOCOL_STATES: &[&str] = &[
    "up",
    "down",
    "lowerlayerdown",
    "notpresent",
    "dormant",
    "testing",
    "unknown",
];

/// One fully parsed table row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InterfaceRow {
    pub interface_id: String,
    pub status: String,
    pub protocol: String,
    pub description: String,
}

/// A status row that arrived without its interface token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusRow {
    pub status: String,
    pub protocol: String,
    pub description: String,
}

/// Parsed interface table plus whatever could not be paired.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InterfaceTable {
    pub rows: Vec<InterfaceRow>,
    pub unpaired_interfaces: Vec<String>,
    pub unpaired_rows: Vec<StatusRow>,
}

impl InterfaceTable {
    pub fn parse(text: &str, interface_prefix: &str) -> Self {
        let mut table = InterfaceTable::default();
        let mut pending_ids: VecDeque<String> = VecDeque::new();
        let mut pending_rows: VecDeque<StatusRow> = VecDeque::new();

        for line in text.lines() {
            let Some((first, rest)) = next_token(line) else {
                continue;
            };

            if is_interface_token(first, interface_prefix) {
                if let Some(row) = parse_status(rest) {
                    table.rows.push(row.with_interface(first));
                } else if rest.trim().is_empty() {
                    match pending_rows.pop_front() {
                        Some(row) => table.rows.push(row.with_interface(first)),
                        None => pending_ids.push_back(first.to_string()),
                    }
                }
                continue;
            }

            if let Some(row) = parse_status(line) {
                match pending_ids.pop_front() {
                    Some(id) => table.rows.push(row.with_interface(&id)),
                    None => pending_rows.push_back(row),
                }
            }
        }

        table.unpaired_interfaces = pending_ids.into();
        table.unpaired_rows = pending_rows.into();
        table
    }

    /// True when every interface found a row and every row an interface.
    pub fn is_aligned(&self) -> bool {
        self.unpaired_interfaces.is_empty() && self.unpaired_rows.is_empty()
    }

    pub fn descriptions(&self) -> Vec<InterfaceDescription> {
        self.rows
            .iter()
            .map(|r| InterfaceDescription {
                interface_id: r.interface_id.clone(),
                description: r.description.clone(),
            })
            .collect()
    }
}

impl StatusRow {
    fn with_interface(self, interface_id: &str) -> InterfaceRow {
        InterfaceRow {
            interface_id: interface_id.to_string(),
            status: self.status,
            protocol: self.protocol,
            description: self.description,
        }
    }
}

/// Split off the first whitespace-delimited token; the remainder keeps its
/// inner spacing.
fn next_token(s: &str) -> Option<(&str, &str)> {
    let s = s.trim_start();
    if s.is_empty() {
        return None;
    }
    let end = s.find(char::is_whitespace).unwrap_or(s.len());
    Some((&s[..end], &s[end..]))
}

/// `Po1`, `Po12`, ... for prefix `Po`; the prefix must be followed by a digit.
fn is_interface_token(token: &str, prefix: &str) -> bool {
    token
        .strip_prefix(prefix)
        .and_then(|rest| rest.chars().next())
        .is_some_and(|c| c.is_ascii_digit())
}

/// `<status> <protocol> [description...]`, status possibly `admin down`.
fn parse_status(s: &str) -> Option<StatusRow> {
    let (status, rest) = next_token(s)?;
    let (status, rest) = match status {
        "up" | "down" => (status.to_string(), rest),
        "admin" => match next_token(rest)? {
            ("down", rest) => ("admin down".to_string(), rest),
            _ => return None,
        },
        _ => return None,
    };
    let (protocol, rest) = next_token(rest)?;
    if !PROTOCOL_STATES.contains(&protocol) {
        return None;
    }
    Some(StatusRow {
        status,
        protocol: protocol.to_string(),
        description: rest.trim().to_string(),
    })
}
