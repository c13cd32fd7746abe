//! Mapping from provider status strings to canonical machine states.

use crate::driver::MachineState;

/// Translates a provider status string into the canonical state.
///
/// Unrecognised statuses map to [`MachineState::None`]: an unknown status is
/// a valid transitional outcome, distinct from a fetch failure.
pub(crate) fn state_for_status(status: &str) -> MachineState {
    match status {
        "powered-on" => MachineState::Running,
        "creating" | "resetting" | "rebooting" => MachineState::Starting,
        "powered-off" => MachineState::Stopped,
        _ => MachineState::None,
    }
}
