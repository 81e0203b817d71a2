//! Dotted-quad harvesting.

use std::net::Ipv4Addr;
use std::sync::OnceLock;

use regex::Regex;

fn address_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)(?:^|\s)(?P<ip>(?:\d+\.){3}\d+)").expect("address pattern is valid")
    })
}

/// Every IPv4 address that starts a line or follows whitespace, in order of
/// appearance. Trailing punctuation (`,`, `:179`, `(vrf)`) is allowed.
/// Duplicates are kept; out-of-range quads are not.
pub fn harvest_addresses(text: &str) -> Vec<String> {
    address_pattern()
        .captures_iter(text)
        .filter_map(|caps| caps.name("ip"))
        .map(|m| m.as_str())
        .filter(|ip| ip.parse::<Ipv4Addr>().is_ok())
        .map(str::to_string)
        .collect()
}
