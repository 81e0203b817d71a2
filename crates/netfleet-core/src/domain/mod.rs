//! Domain models for netfleet.
//!
//! - `DeviceDescriptor`: inventory identity of one device
//! - `ExtractedRecord` / `DeviceRecordSet`: facts parsed from CLI output
//! - `RemediationPolicy` / `ConfigDirective`: desired-state inputs and outputs
//! - error taxonomy shared by every layer

pub mod device;
pub mod error;
pub mod policy;
pub mod record;

pub use device::DeviceDescriptor;
pub use error::{DeviceError, DispatchError, PlanError, TransportError};
pub use policy::{directive_lines, ConfigDirective, RemediationPolicy};
pub use record::{
    BgpPeerSummary, DeviceRecordSet, DeviceRecords, ExtractedRecord, InterfaceDescription,
    PeerAddressList, SoftwareVersion,
};
