//! BGP summary rows and session-uptime classification.
//!
//! Expected row shape (Arista `show ip bgp summary`):
//!
//! ```text
//! Description              Neighbor         V  AS           MsgRcvd   MsgSent  InQ OutQ  Up/Down State   PfxRcd PfxAcc
//! BGP-PEER                 12.34.56.78      4  12345              0         0    0    0   10d00h Idle(Admin)
//! ```

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::domain::BgpPeerSummary;

/// Sessions down at least this many days count as long-inactive.
pub const DEFAULT_INACTIVE_AFTER_DAYS: u32 = 7;

fn row_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^\s*(?:(?P<description>.*?)\s+)?(?P<peer_ip>\S+)\s+\d+\s+(?P<as_number>\S+)(?:\s+\d+){4}\s+(?P<uptime>\S+)\s+(?P<state>\S+)",
        )
        .expect("BGP summary pattern is valid")
    })
}

/// Parse one summary row; `None` for headers and anything else.
pub fn parse_row(line: &str) -> Option<BgpPeerSummary> {
    let caps = row_pattern().captures(line)?;
    Some(BgpPeerSummary {
        description: caps
            .name("description")
            .map_or("", |m| m.as_str().trim())
            .to_string(),
        peer_ip: caps["peer_ip"].to_string(),
        as_number: caps["as_number"].to_string(),
        uptime: caps["uptime"].to_string(),
        state: caps["state"].to_string(),
    })
}

/// Every summary row in `text`, in order of appearance.
pub fn parse_summary(text: &str) -> Vec<BgpPeerSummary> {
    text.lines().filter_map(parse_row).collect()
}

/// Bucket for the Up/Down column of a BGP summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "class", rename_all = "snake_case")]
pub enum UptimeClass {
    /// `HH:MM:SS`: state changed less than a day ago.
    Recent,
    /// `<days>d<hours>h`.
    Days { days: u32, hours: Option<u32> },
    Unrecognized,
}

impl UptimeClass {
    pub fn parse(token: &str) -> Self {
        let token = token.trim();
        if token.contains(':') {
            return UptimeClass::Recent;
        }
        let Some((days, rest)) = token.split_once('d') else {
            return UptimeClass::Unrecognized;
        };
        let Ok(days) = days.parse::<u32>() else {
            return UptimeClass::Unrecognized;
        };
        let hours = rest.strip_suffix('h').and_then(|h| h.parse().ok());
        UptimeClass::Days { days, hours }
    }

    pub fn is_long_inactive(&self, threshold_days: u32) -> bool {
        matches!(self, UptimeClass::Days { days, .. } if *days >= threshold_days)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SUMMARY: &str = "\
BGP summary information for VRF default
Router identifier 10.0.0.1, local AS number 65000
Neighbor Status Codes: m - Under maintenance
  Description              Neighbor         V  AS           MsgRcvd   MsgSent  InQ OutQ  Up/Down State   PfxRcd PfxAcc
  BGP-PEER                 12.34.56.78      4  12345              0         0    0    0   10d00h Idle(Admin)
  BGP-PEERt                87.65.43.21      4  54321              0         0    0    0   10d10h Active
  ISP TRANSIT              203.0.113.9      4  64496              0         0    0    0  3:12:45 Connect
";

    #[test]
    fn test_parse_single_row() {
        let row = parse_row("BGP-PEER  12.34.56.78  4  12345  0  0  0  0  10d00h  Active")
            .expect("row must match");
        assert_eq!(
            row,
            BgpPeerSummary {
                description: "BGP-PEER".to_string(),
                peer_ip: "12.34.56.78".to_string(),
                as_number: "12345".to_string(),
                uptime: "10d00h".to_string(),
                state: "Active".to_string(),
            }
        );
    }

    #[test]
    fn test_parse_summary_skips_headers() {
        let rows = parse_summary(SUMMARY);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].state, "Idle(Admin)");
        assert_eq!(rows[1].description, "BGP-PEERt");
        assert_eq!(rows[2].description, "ISP TRANSIT");
        assert_eq!(rows[2].peer_ip, "203.0.113.9");
        assert_eq!(rows[2].uptime, "3:12:45");
    }

    #[test]
    fn test_row_without_description() {
        let row = parse_row("  12.34.56.78  4  12345  0  0  0  0  1d02h  Active").unwrap();
        assert_eq!(row.description, "");
        assert_eq!(row.peer_ip, "12.34.56.78");
    }

    #[test]
    fn test_row_without_description_at_column_zero() {
        let text = "Neighbor  V  AS  MsgRcvd  MsgSent  InQ  OutQ  Up/Down  State\n\
12.34.56.78  4  12345  0  0  0  0  10d00h  Active\n";
        let rows = parse_summary(text);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].description, "");
        assert_eq!(rows[0].peer_ip, "12.34.56.78");
        assert_eq!(rows[0].as_number, "12345");
        assert_eq!(rows[0].uptime, "10d00h");
        assert!(UptimeClass::parse(&rows[0].uptime).is_long_inactive(7));
    }

    #[test]
    fn test_no_match_yields_empty() {
        assert!(parse_summary("").is_empty());
        assert!(parse_summary("% Invalid input\nedge#").is_empty());
    }

    #[test]
    fn test_uptime_classification() {
        assert!(UptimeClass::parse("10d00h").is_long_inactive(7));
        assert!(!UptimeClass::parse("6d23h").is_long_inactive(7));
        assert!(UptimeClass::parse("7d00h").is_long_inactive(7));
        assert_eq!(UptimeClass::parse("9:59:59"), UptimeClass::Recent);
        assert!(!UptimeClass::parse("99:59:59").is_long_inactive(7));
        assert_eq!(
            UptimeClass::parse("6d23h"),
            UptimeClass::Days {
                days: 6,
                hours: Some(23)
            }
        );
    }

    #[test]
    fn test_unrecognized_uptime_is_never_long_inactive() {
        assert_eq!(UptimeClass::parse("never"), UptimeClass::Unrecognized);
        assert_eq!(UptimeClass::parse("xd00h"), UptimeClass::Unrecognized);
        assert!(!UptimeClass::parse("never").is_long_inactive(0));
    }
}
