//! Error types for path and rule synthesis.

use osprey_common::SwitchId;
use thiserror::Error;

/// Error type for routing operations.
///
/// These are inconsistency errors: the topology and a previously computed
/// path have diverged. They abort the current synthesis attempt for one
/// host pair and are never silently defaulted.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RoutingError {
    /// The port map has no entry for an adjacent pair on a computed path
    #[error("no connecting ports between switch {from} and switch {to}")]
    PortLookup { from: SwitchId, to: SwitchId },

    /// A host-facing hop slot was still unresolved at rule-build time
    #[error("unresolved host-facing port on switch {switch}")]
    UnresolvedHop { switch: SwitchId },
}

/// Result type for routing operations.
pub type Result<T> = std::result::Result<T, RoutingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RoutingError::PortLookup { from: 1, to: 3 };
        assert_eq!(
            err.to_string(),
            "no connecting ports between switch 1 and switch 3"
        );

        let err = RoutingError::UnresolvedHop { switch: 2 };
        assert_eq!(err.to_string(), "unresolved host-facing port on switch 2");
    }
}
