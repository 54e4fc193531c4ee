//! Session lifecycle states shared by the framework and package sessions.

use std::sync::atomic::{AtomicU8, Ordering};

use serde::{Serialize, Serializer};

/// Lifecycle state of an install session.
///
/// Serialized as its wire integer code. Package sessions never enter
/// [`SessionState::Extracting`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Downloading,
    Extracting,
    Finished,
    Error,
    /// Stopped by the caller. Distinct from `Error`.
    Cancelled,
}

impl SessionState {
    /// Wire-level integer code.
    pub fn code(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Downloading => 1,
            Self::Extracting => 2,
            Self::Finished => 3,
            Self::Error => 4,
            Self::Cancelled => 5,
        }
    }

    /// Parse a wire-level integer code.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Idle),
            1 => Some(Self::Downloading),
            2 => Some(Self::Extracting),
            3 => Some(Self::Finished),
            4 => Some(Self::Error),
            5 => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Whether the session has stopped for good.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Error | Self::Cancelled)
    }

    /// Position in the forward-only lifecycle; terminal states share a rank.
    fn rank(self) -> u8 {
        match self {
            Self::Idle => 0,
            Self::Downloading => 1,
            Self::Extracting => 2,
            Self::Finished | Self::Error | Self::Cancelled => 3,
        }
    }

    /// Human-readable name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Downloading => "Downloading",
            Self::Extracting => "Extracting",
            Self::Finished => "Finished",
            Self::Error => "Error",
            Self::Cancelled => "Cancelled",
        }
    }
}

impl Serialize for SessionState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

/// Lock-free holder of a [`SessionState`] that only moves forward.
#[derive(Debug, Default)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) fn get(&self) -> SessionState {
        SessionState::from_code(self.0.load(Ordering::Acquire)).unwrap_or_default()
    }

    /// Move to `next`.
    ///
    /// Refused (returns `false`) once a terminal state is reached or when
    /// `next` would step backwards.
    pub(crate) fn advance(&self, next: SessionState) -> bool {
        let mut current = self.0.load(Ordering::Acquire);
        loop {
            let state = SessionState::from_code(current).unwrap_or_default();
            if state.is_terminal() || next.rank() < state.rank() {
                return false;
            }
            match self.0.compare_exchange_weak(
                current,
                next.code(),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }
}
