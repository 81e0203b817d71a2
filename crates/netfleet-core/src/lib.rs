//! netfleet core library
//!
//! Bounded-concurrency command fan-out across network devices, typed
//! extraction from their CLI text, and planning and pushing of description
//! remediation.

pub mod dispatch;
pub mod domain;
pub mod extract;
pub mod fakes;
pub mod mutation;
pub mod obs;
pub mod planner;
pub mod session;
pub mod telemetry;
pub mod workflows;

pub use dispatch::{
    run_command_set, validate_batch, CaptureMode, CommandOutput, CommandResult, DeviceOutcome,
    Dispatcher,
};

pub use domain::{
    directive_lines, BgpPeerSummary, ConfigDirective, DeviceDescriptor, DeviceError,
    DeviceRecordSet, DeviceRecords, DispatchError, ExtractedRecord, InterfaceDescription,
    PeerAddressList, PlanError, RemediationPolicy, SoftwareVersion, TransportError,
};

pub use extract::{
    extract, find_hostname, Grammar, InterfaceTable, UptimeClass, DEFAULT_INACTIVE_AFTER_DAYS,
    DEFAULT_INTERFACE_PREFIX,
};

pub use mutation::{apply_directives, find_rejection, ApplyResult};
pub use planner::{plan, plan_by_device_role, DeviceMutation, MutationBatch};
pub use session::{capture_with_prompt, DeviceSession, SessionConnector, SessionScope};
pub use workflows::{
    collect_records, long_inactive_peers, troubleshoot_commands, DeviceFailure, InactivePeers,
    PeerReport, ScanReport, BGP_SUMMARY_COMMAND, INTERFACE_DESCRIPTION_COMMAND,
};

/// netfleet version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
