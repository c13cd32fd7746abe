//! Machine-driver abstraction consumed by the orchestration host.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

/// Canonical machine state used for poll-loop convergence, independent of the
/// provider's status vocabulary.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MachineState {
    /// The machine is powered on and reachable.
    Running,
    /// The machine is being created or transitioning towards running.
    Starting,
    /// The machine is powered off.
    Stopped,
    /// The machine state could not be retrieved.
    Error,
    /// The provider reported a status outside the recognised vocabulary.
    /// This is a valid unknown/transitional outcome, not a failure.
    None,
}

impl fmt::Display for MachineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Running => "running",
            Self::Starting => "starting",
            Self::Stopped => "stopped",
            Self::Error => "error",
            Self::None => "none",
        };
        write!(f, "{label}")
    }
}

/// Typed option registry the host exposes to drivers at configuration time.
///
/// Options are looked up by the names a driver advertises through its flag
/// descriptors; the host owns flag parsing and environment binding.
pub trait DriverOptions {
    /// Returns the string option registered under `name`, if set.
    fn string_option(&self, name: &str) -> Option<String>;

    /// Returns the boolean option registered under `name`, defaulting to
    /// `false` when unset.
    fn bool_option(&self, name: &str) -> bool;
}

/// Describes one configuration flag a driver advertises to the host.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FlagDescriptor {
    /// Option name used for registry lookups (for example `pnap-server-os`).
    pub name: &'static str,
    /// Environment variable the host binds to the option.
    pub env_var: &'static str,
    /// Human-readable usage text.
    pub usage: &'static str,
}

impl FlagDescriptor {
    /// Creates a descriptor from its three static parts.
    #[must_use]
    pub const fn new(name: &'static str, env_var: &'static str, usage: &'static str) -> Self {
        Self {
            name,
            env_var,
            usage,
        }
    }
}

/// Future returned by driver operations.
pub type DriverFuture<'a, T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send + 'a>>;

/// Interface implemented by machine drivers.
///
/// Every operation runs to completion on the calling task, including the
/// embedded poll loops; a driver issues at most one remote operation at a
/// time.
pub trait MachineDriver {
    /// Driver specific error type surfaced to the host.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Returns the stable driver identifier.
    fn driver_name(&self) -> &'static str;

    /// Verifies the driver is ready for creation, applying configuration
    /// defaults and checking remote capacity.
    fn precreate_check(&mut self) -> DriverFuture<'_, (), Self::Error>;

    /// Provisions the machine and blocks until it reaches [`MachineState::Running`].
    fn create(&mut self) -> DriverFuture<'_, (), Self::Error>;

    /// Powers the machine on and blocks until it is running.
    fn start(&mut self) -> DriverFuture<'_, (), Self::Error>;

    /// Shuts the machine down gracefully and blocks until it is stopped.
    fn stop(&mut self) -> DriverFuture<'_, (), Self::Error>;

    /// Reboots the machine and blocks until it is running again.
    fn restart(&mut self) -> DriverFuture<'_, (), Self::Error>;

    /// Forcefully stops the machine by deleting it, blocking until the
    /// provider reports it stopped.
    fn kill(&mut self) -> DriverFuture<'_, (), Self::Error>;

    /// Deletes the machine. A driver with no recorded remote identifier
    /// reports success without issuing any remote call.
    fn remove(&mut self) -> DriverFuture<'_, (), Self::Error>;

    /// Fetches the current canonical state from the provider.
    fn state(&mut self) -> DriverFuture<'_, MachineState, Self::Error>;

    /// Returns the externally usable IP address, resolving and caching it on
    /// first use.
    ///
    /// # Errors
    ///
    /// Returns the driver error when no suitable address is recorded.
    fn ip(&mut self) -> Result<String, Self::Error>;

    /// Returns the hostname to use for SSH connections.
    ///
    /// # Errors
    ///
    /// Returns the driver error when the address cannot be resolved.
    fn ssh_hostname(&mut self) -> Result<String, Self::Error>;

    /// Returns the username to use for SSH connections.
    fn ssh_username(&self) -> String;

    /// Returns the connection URL for the container engine on the machine.
    ///
    /// # Errors
    ///
    /// Returns the driver error when the address cannot be resolved.
    fn url(&mut self) -> Result<String, Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::MachineState;

    #[test]
    fn machine_state_displays_lowercase_labels() {
        let cases = [
            (MachineState::Running, "running"),
            (MachineState::Starting, "starting"),
            (MachineState::Stopped, "stopped"),
            (MachineState::Error, "error"),
            (MachineState::None, "none"),
        ];
        for (state, label) in cases {
            assert_eq!(state.to_string(), label);
        }
    }
}
