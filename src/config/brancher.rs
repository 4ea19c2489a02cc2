//! Which branching heuristic the icp engines use.

/// The configured branching heuristic.
///
/// The strategies themselves live with the [brancher](crate::icp::brancher);
/// [PreferredFirst](BrancherKind::PreferredFirst) reads the preferred variables
/// and their threshold from the configuration.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BrancherKind {
    /// Split the widest active dimension.
    LargestFirst,

    /// Split preferred variables first, while any remains wide.
    PreferredFirst,
}
