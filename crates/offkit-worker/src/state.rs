//! Worker lifecycle state.

use serde::{Deserialize, Serialize};

/// Lifecycle state of the offline cache manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum WorkerState {
    /// Initial state, nothing installed yet.
    #[default]
    Parsed,
    /// Install in progress (precaching).
    Installing,
    /// Installed, eligible for activation.
    Installed,
    /// Activation in progress (garbage collection, client claim).
    Activating,
    /// Active and controlling clients.
    Activated,
    /// Replaced or install failed.
    Redundant,
}

impl WorkerState {
    /// Check if the worker is active.
    pub fn is_active(&self) -> bool {
        *self == WorkerState::Activated
    }

    /// Check if the worker is redundant.
    pub fn is_redundant(&self) -> bool {
        *self == WorkerState::Redundant
    }

    /// Check if the worker has completed install.
    pub fn is_installed(&self) -> bool {
        matches!(
            self,
            WorkerState::Installed | WorkerState::Activating | WorkerState::Activated
        )
    }
}
