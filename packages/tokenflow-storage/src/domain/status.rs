use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::StorageError;

/// Lifecycle status of a token deployment
///
/// ```text
/// Queued ─► Submitted ─► Pending ─► Confirmed ─► Indexed ─► Completed
///   │           │           │           │  └──────────────────▲
///   │           └───────────┴───────────┴──► Failed ◄── (any non-terminal)
///   └──► Cancelled                             │
///   ▲                                          │
///   └──────────────── retry ───────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DeploymentStatus {
    Queued,
    Submitted,
    Pending,
    Confirmed,
    Indexed,
    Completed,
    Failed,
    Cancelled,
}

impl DeploymentStatus {
    pub const ALL: [DeploymentStatus; 8] = [
        DeploymentStatus::Queued,
        DeploymentStatus::Submitted,
        DeploymentStatus::Pending,
        DeploymentStatus::Confirmed,
        DeploymentStatus::Indexed,
        DeploymentStatus::Completed,
        DeploymentStatus::Failed,
        DeploymentStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DeploymentStatus::Queued => "Queued",
            DeploymentStatus::Submitted => "Submitted",
            DeploymentStatus::Pending => "Pending",
            DeploymentStatus::Confirmed => "Confirmed",
            DeploymentStatus::Indexed => "Indexed",
            DeploymentStatus::Completed => "Completed",
            DeploymentStatus::Failed => "Failed",
            DeploymentStatus::Cancelled => "Cancelled",
        }
    }

    /// Statuses with no outgoing transition
    pub fn is_terminal(&self) -> bool {
        matches!(self, DeploymentStatus::Completed | DeploymentStatus::Cancelled)
    }

    /// Queued through Indexed: work is outstanding on the deployment
    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            DeploymentStatus::Queued
                | DeploymentStatus::Submitted
                | DeploymentStatus::Pending
                | DeploymentStatus::Confirmed
                | DeploymentStatus::Indexed
        )
    }

    /// Valid targets from this status.
    ///
    /// `Indexed` is optional: `Confirmed -> Completed` is accepted directly.
    /// Whether a given network requires indexing is decided by the caller.
    pub fn allowed_transitions(&self) -> &'static [DeploymentStatus] {
        use DeploymentStatus::*;
        match self {
            Queued => &[Submitted, Cancelled, Failed],
            Submitted => &[Pending, Failed],
            Pending => &[Confirmed, Failed],
            Confirmed => &[Indexed, Completed, Failed],
            Indexed => &[Completed, Failed],
            Failed => &[Queued],
            Completed | Cancelled => &[],
        }
    }

    pub fn can_transition_to(&self, target: DeploymentStatus) -> bool {
        self.allowed_transitions().contains(&target)
    }
}

impl fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DeploymentStatus {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DeploymentStatus::ALL
            .iter()
            .copied()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| {
                StorageError::serialization(format!("Invalid deployment status: {}", s))
            })
    }
}
