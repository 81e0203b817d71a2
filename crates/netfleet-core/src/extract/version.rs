//! Firmware lines of the form `VERSION=<token>` at the start of a line.

use std::sync::OnceLock;

use regex::Regex;

use crate::domain::SoftwareVersion;

fn version_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\s*VERSION=(?P<version>\S+)").expect("version pattern is valid"))
}

pub fn parse_versions(text: &str) -> Vec<SoftwareVersion> {
    text.lines()
        .filter_map(|line| version_pattern().captures(line))
        .map(|caps| SoftwareVersion {
            version: caps["version"].to_string(),
        })
        .collect()
}
