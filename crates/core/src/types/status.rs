//! Status enums for session identity and guest cart migration.

use serde::{Deserialize, Serialize};

/// Whether the visitor currently has an authenticated session.
///
/// Supplied by the authentication collaborator; the cart subsystem only reads it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Anonymous,
    Authenticated,
}

impl SessionStatus {
    /// Returns `true` for [`SessionStatus::Authenticated`].
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated)
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Anonymous => write!(f, "anonymous"),
            Self::Authenticated => write!(f, "authenticated"),
        }
    }
}

/// Per-tenant state of the guest-to-account cart migration.
///
/// `Anonymous` -> `Syncing` -> `Synced` | `PartiallySynced`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum SyncState {
    /// No migration has run for this tenant yet.
    #[default]
    Anonymous,
    /// A migration is in flight.
    Syncing,
    /// Every guest item was migrated.
    Synced,
    /// Some guest items failed to migrate and remain in the guest cart.
    PartiallySynced {
        /// Number of items that failed.
        failed: usize,
    },
}

impl SyncState {
    /// Returns `true` once a migration has finished, successfully or not.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Synced | Self::PartiallySynced { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_status_default_is_anonymous() {
        assert_eq!(SessionStatus::default(), SessionStatus::Anonymous);
        assert!(!SessionStatus::Anonymous.is_authenticated());
        assert!(SessionStatus::Authenticated.is_authenticated());
    }

    #[test]
    fn test_sync_state_terminal() {
        assert!(!SyncState::Anonymous.is_terminal());
        assert!(!SyncState::Syncing.is_terminal());
        assert!(SyncState::Synced.is_terminal());
        assert!(SyncState::PartiallySynced { failed: 1 }.is_terminal());
    }
}
