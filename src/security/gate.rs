//! Command execution gating.
//!
//! Turns a policy decision into what the engine should do next. The
//! confirmation gate lives with the caller; this only records whether the
//! caller has already passed it.

use super::{PolicyDecision, PolicyOutcome};

/// What the engine does with a classified command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateAction {
    /// Spawn the process.
    Execute,
    /// Hand the command back; the caller must confirm and resubmit.
    AwaitConfirmation,
    /// Never spawn.
    Deny,
}

/// Single decision point between classification and execution.
///
/// # Examples
/// ```
/// use rusty_gate::security::{gate_command, GateAction, PolicyDecision};
///
/// let decision = PolicyDecision::pending("Command requires user confirmation");
/// assert_eq!(gate_command(&decision, false), GateAction::AwaitConfirmation);
/// assert_eq!(gate_command(&decision, true), GateAction::Execute);
///
/// // confirmation never unlocks a blocked command
/// let decision = PolicyDecision::blocked("Command 'rm' is blocked for security");
/// assert_eq!(gate_command(&decision, true), GateAction::Deny);
/// ```
pub fn gate_command(decision: &PolicyDecision, confirmed: bool) -> GateAction {
    match decision.outcome() {
        PolicyOutcome::Blocked => GateAction::Deny,
        PolicyOutcome::Allowed => GateAction::Execute,
        PolicyOutcome::AllowedPendingConfirmation if confirmed => GateAction::Execute,
        PolicyOutcome::AllowedPendingConfirmation => GateAction::AwaitConfirmation,
    }
}
