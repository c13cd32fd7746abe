//! Error types for the PNAP driver.

use thiserror::Error;

use crate::cloud_init::UserDataError;
use crate::config::ConfigError;
use crate::driver::MachineState;
use crate::pnap::api::ApiError;
use crate::ssh::SshKeyError;

/// Errors raised by the PNAP driver.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum PnapDriverError {
    /// Raised when no viable credential path yields an API client.
    #[error("PNAP API client can not be created: {message}")]
    ClientConstruction {
        /// Description of the underlying cause.
        message: String,
    },
    /// Raised when the machine SSH keypair cannot be generated.
    #[error("SSH key generation failed: {0}")]
    SshKeyGeneration(#[from] SshKeyError),
    /// Raised when the configured cloud-init user-data file is unreadable.
    #[error(transparent)]
    UserDataRead(#[from] UserDataError),
    /// Wrapper for a failed remote command, propagated without retry.
    #[error("{operation} command failed: {source}")]
    RemoteCommand {
        /// Remote command that failed.
        operation: &'static str,
        /// Error returned by the remote API.
        #[source]
        source: ApiError,
    },
    /// Raised when a status fetch fails during a wait loop; fatal for the
    /// enclosing operation.
    #[error("could not get server state: {source}")]
    PollFetch {
        /// Underlying fetch error.
        #[source]
        source: Box<PnapDriverError>,
    },
    /// Raised when a configured wait deadline elapses before the machine
    /// reaches the target state. Unreachable with the default unbounded wait.
    #[error("timeout waiting for machine to reach the {target} state")]
    Timeout {
        /// State being waited on.
        target: MachineState,
    },
    /// Raised when private networking is enabled but the server reports no
    /// private address.
    #[error("private ip address not found on server, please check configuration")]
    NoPrivateAddress,
    /// Raised when the server reports no public address.
    #[error("public ip address not found on server, please check configuration")]
    NoPublicAddress,
    /// Raised when the precheck finds no capacity for the requested type and
    /// location.
    #[error("no servers of type {server_type} available in location {location}")]
    NoAvailability {
        /// Requested server type.
        server_type: String,
        /// Requested location.
        location: String,
    },
    /// Raised when an operation requires a remote identifier but none is
    /// recorded.
    #[error("no server is recorded for this machine")]
    MissingInstanceId,
    /// Raised when the configuration is incomplete.
    #[error(transparent)]
    Config(#[from] ConfigError),
}
