/*!
Miscellaneous items related to [logging](log).

Calls to the log macro are made throughout the library.
These are intended to provide useful information for extending the library and/or fixing issues.

Note, no log implementation is provided.
For more details, see [log].
*/

/// Targets to be used within a [log]! macro.
pub mod targets {
    /// Logs related to the outer solve loop
    pub const CONTEXT: &str = "context";

    /// Logs related to the [bridge](crate::bridge)
    pub const BRIDGE: &str = "bridge";

    /// Logs related to the boolean [backend](crate::sat)
    pub const BACKEND: &str = "backend";

    /// Logs related to branch-and-prune search
    pub const ICP: &str = "icp";

    /// Logs related to the Monte-Carlo tree search
    pub const MCTS: &str = "mcts";

    /// Logs related to individual [contractor](crate::contractor) applications
    pub const PRUNE: &str = "prune";

    /// Logs related to fixpoint and worklist scheduling
    pub const FIXPOINT: &str = "fixpoint";
}
