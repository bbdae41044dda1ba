use serde::Serialize;

/// Where the boundary sits in the prune/rehydrate cycle.
///
/// The cycle is `Active → Pruned → Rehydrating → Active`; there is no
/// terminal state, the machine lives as long as its boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecyclePhase {
    /// The heavy subtree is mounted and in use.
    Active,
    /// The subtree has been torn down; its memory is reclaimed.
    Pruned,
    /// The subtree is being rebuilt; bound values are about to restore.
    Rehydrating,
}

/// What the host should render for the boundary right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderState {
    /// Render the full subtree.
    Mounted,
    /// Render nothing; the subtree is detached.
    Detached,
    /// Render the configured placeholder while rehydration completes.
    Placeholder,
}
