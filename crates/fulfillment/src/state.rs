//! Order placement state machine.

use serde::{Deserialize, Serialize};

/// The step an order placement is in.
///
/// State transitions:
/// ```text
/// Validating ──► Reserving ──► Assembling ──► Committing ──► Auditing ──► Done
///      │             │                            │
///      └─────────────┴──► Rejected                └──► CommitFailed ──► RolledBack
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PlacementState {
    /// Request shape and customer are being checked.
    #[default]
    Validating,

    /// Stock is being checked and decremented.
    Reserving,

    /// Line and order totals are being computed.
    Assembling,

    /// The order is being persisted.
    Committing,

    /// The audit entry is being appended.
    Auditing,

    /// The order is committed (terminal state).
    Done,

    /// Stock could not be reserved; nothing was persisted (terminal state).
    Rejected,

    /// Persisting the order failed.
    CommitFailed,

    /// Reserved stock was restored after a commit failure (terminal state).
    RolledBack,
}

impl PlacementState {
    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            PlacementState::Validating => "Validating",
            PlacementState::Reserving => "Reserving",
            PlacementState::Assembling => "Assembling",
            PlacementState::Committing => "Committing",
            PlacementState::Auditing => "Auditing",
            PlacementState::Done => "Done",
            PlacementState::Rejected => "Rejected",
            PlacementState::CommitFailed => "CommitFailed",
            PlacementState::RolledBack => "RolledBack",
        }
    }
}

impl std::fmt::Display for PlacementState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
