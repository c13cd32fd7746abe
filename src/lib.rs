//! Machine driver for PhoenixNAP Bare Metal Cloud instances.
//!
//! The crate exposes a machine-driver contract an orchestration host consumes
//! (create → poll to running → start/stop/restart → delete) and the PNAP
//! implementation that powers it, including credential-tier selection against
//! the BMC authentication service.

pub mod cloud_init;
pub mod config;
pub mod driver;
pub mod pnap;
pub mod ssh;

pub use cloud_init::UserDataError;
pub use config::{ConfigDefaults, ConfigError, DriverConfig};
pub use driver::{DriverFuture, DriverOptions, FlagDescriptor, MachineDriver, MachineState};
pub use pnap::{ApiEndpoints, ApiError, InstanceRecord, PnapDriver, PnapDriverError};
pub use ssh::{ProcessKeyGenerator, SshKeyError, SshKeyGenerator};
