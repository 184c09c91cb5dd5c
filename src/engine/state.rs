use serde::Serialize;
use std::time::Instant;

use crate::error::HardwareError;

/// Acquisition run states
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum AcquisitionState {
    Idle,
    Running {
        #[serde(skip)]
        started_at: Instant,
    },
    /// Stopped on a bus fault. Stays here until the operator acknowledges it.
    Faulted {
        #[serde(serialize_with = "serialize_error")]
        error: HardwareError,
    },
}

fn serialize_error<S: serde::Serializer>(
    error: &HardwareError,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_str(error)
}

impl AcquisitionState {
    pub fn running() -> Self {
        Self::Running {
            started_at: Instant::now(),
        }
    }

    /// When the current run began. Samples older than this belong to an
    /// earlier run.
    pub fn started_at(&self) -> Option<Instant> {
        match self {
            Self::Running { started_at } => Some(*started_at),
            _ => None,
        }
    }

    /// Check if transition from current state to target state is valid
    pub fn can_transition_to(&self, target: &AcquisitionState) -> bool {
        use AcquisitionState::*;

        matches!(
            (self, target),
            (Idle, Running { .. })
                | (Running { .. }, Idle)
                | (Running { .. }, Faulted { .. })
                // Only by acknowledgement
                | (Faulted { .. }, Idle)
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Running { .. } => "Running",
            Self::Faulted { .. } => "Faulted",
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running { .. })
    }

    pub fn fault(&self) -> Option<&HardwareError> {
        match self {
            Self::Faulted { error } => Some(error),
            _ => None,
        }
    }
}

impl Default for AcquisitionState {
    fn default() -> Self {
        Self::Idle
    }
}
