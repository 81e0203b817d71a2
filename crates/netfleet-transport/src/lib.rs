//! Concrete session adapters for netfleet.
//!
//! - [`OpenSshConnector`]: one system `ssh` process per command
//! - [`ReplayConnector`]: canned device outputs loaded from a JSON fixture

pub mod replay;
pub mod ssh;

pub use replay::{DeviceFixture, ReplayConnector, ReplayFixture};
pub use ssh::{classify_ssh_failure, OpenSshConnector, SshConfig};
