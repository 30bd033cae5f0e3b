//! Per-node provisioning state.

mod record;
pub use self::record::{NodeId, NodeProvisioningRecord, ProvisioningState};

mod tracker;
pub use self::tracker::NodeProvisioningTracker;

//------------ TransitionPolicy ----------------------------------------------

/// Decides which state changes the tracker accepts.
///
/// `from` is `None` when the node has no record yet. Staying in the same
/// state is always accepted.
pub trait TransitionPolicy: Send + Sync {
    fn allows(&self, from: Option<ProvisioningState>, to: ProvisioningState) -> bool;
}

/// Accepts every transition. This is the default.
#[derive(Clone, Copy, Debug, Default)]
pub struct PermissiveTransitions;

impl TransitionPolicy for PermissiveTransitions {
    fn allows(&self, _from: Option<ProvisioningState>, _to: ProvisioningState) -> bool {
        true
    }
}

/// Only accepts moves along `NEW → [CSR →] SIGNED → CONFIGURED`.
///
/// Records can only be created in `NEW`. `ERROR` can be entered from any
/// state but `CONFIGURED`, and left only by starting over at `NEW`.
#[derive(Clone, Copy, Debug, Default)]
pub struct StateMachineTransitions;

impl TransitionPolicy for StateMachineTransitions {
    fn allows(&self, from: Option<ProvisioningState>, to: ProvisioningState) -> bool {
        use ProvisioningState::*;

        match (from, to) {
            (None, New) => true,
            (None, _) => false,
            (Some(from), Error) => !from.is_terminal(),
            (Some(New), Csr) | (Some(New), Signed) | (Some(Csr), Signed) | (Some(Signed), Configured) => true,
            (Some(Error), New) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_machine_transitions() {
        use ProvisioningState::*;
        let policy = StateMachineTransitions;

        assert!(policy.allows(None, New));
        assert!(!policy.allows(None, Signed));
        assert!(policy.allows(Some(New), Csr));
        assert!(policy.allows(Some(Csr), Signed));
        assert!(policy.allows(Some(Signed), Configured));
        assert!(policy.allows(Some(Signed), Error));
        assert!(!policy.allows(Some(Configured), Error));
        assert!(!policy.allows(Some(Configured), New));
        assert!(policy.allows(Some(Error), New));
        assert!(!policy.allows(Some(Error), Configured));
    }
}
