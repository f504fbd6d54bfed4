//! Domain layer for the deployment record store
//!
//! # Domain Models
//!
//! - `TokenDeployment`: persistent deployment aggregate with append-only history
//! - `DeploymentStatusEntry`: one immutable audit record
//! - `DeploymentStatus`: lifecycle states and the transition table
//! - `DeploymentError`: structured failure descriptor
//!
//! # Port Trait
//!
//! - `DeploymentStore`: primary storage abstraction
//!
//! # Examples
//!
//! ```rust,ignore
//! use tokenflow_storage::domain::{DeploymentStore, NewDeployment, TokenDeployment};
//!
//! async fn example(store: impl DeploymentStore) -> Result<()> {
//!     let deployment = TokenDeployment::new(NewDeployment { .. });
//!     store.insert(deployment.clone()).await?;
//!
//!     let request = TransitionRequest::new(DeploymentStatus::Submitted, "sent");
//!     let outcome = store.apply_transition(&deployment.deployment_id, request).await?;
//!     assert!(outcome.is_accepted());
//!     Ok(())
//! }
//! ```

mod deployment;
mod failure;
mod status;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::Result;

pub use deployment::{
    DeploymentStatusEntry, NewDeployment, StatusMetadata, TokenDeployment, TransitionOutcome,
    TransitionRequest,
};
pub use failure::{DeploymentError, DeploymentErrorCategory};
pub use status::DeploymentStatus;

// ═══════════════════════════════════════════════════════════════════════════
// Queries
// ═══════════════════════════════════════════════════════════════════════════

/// Criteria for listing deployments. Empty criteria match everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentFilter {
    pub deployed_by: Option<String>,
    pub network: Option<String>,
    pub token_type: Option<String>,
    pub status: Option<DeploymentStatus>,
    /// Inclusive lower bound on `created_at`
    pub from_date: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `created_at`
    pub to_date: Option<DateTime<Utc>>,
}

impl DeploymentFilter {
    pub fn matches(&self, deployment: &TokenDeployment) -> bool {
        fn eq_opt(criterion: &Option<String>, value: &str) -> bool {
            criterion.as_deref().map_or(true, |c| c == value)
        }

        eq_opt(&self.deployed_by, &deployment.deployed_by)
            && eq_opt(&self.network, &deployment.network)
            && eq_opt(&self.token_type, &deployment.token_type)
            && self.status.map_or(true, |s| s == deployment.current_status)
            && self.from_date.map_or(true, |from| deployment.created_at >= from)
            && self.to_date.map_or(true, |to| deployment.created_at <= to)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Port Trait
// ═══════════════════════════════════════════════════════════════════════════

/// Deployment record store.
///
/// # Concurrency
///
/// Mutations of one deployment are serialized: `apply_transition` reads the
/// current status, validates, appends history and writes the new status as
/// one atomic step. Different deployments never block each other.
/// Reads return a consistent snapshot.
///
/// # Errors
///
/// Operations addressing a single deployment return
/// `StorageError::DeploymentNotFound` for unknown ids. Invalid transitions
/// are not errors; they come back as `TransitionOutcome::Rejected`.
#[async_trait]
pub trait DeploymentStore: Send + Sync {
    /// Save a new deployment
    ///
    /// # Errors
    ///
    /// `DuplicateDeployment` if the id is already taken
    async fn insert(&self, deployment: TokenDeployment) -> Result<()>;

    /// Snapshot of a deployment, `None` if unknown
    async fn get(&self, deployment_id: &str) -> Result<Option<TokenDeployment>>;

    /// Snapshots of matching deployments, newest first
    async fn list(&self, filter: &DeploymentFilter) -> Result<Vec<TokenDeployment>>;

    /// Apply a status change atomically
    async fn apply_transition(
        &self,
        deployment_id: &str,
        request: TransitionRequest,
    ) -> Result<TransitionOutcome>;

    /// Record the final on-chain identifier (not a status transition)
    async fn set_asset_identifier(
        &self,
        deployment_id: &str,
        identifier: &str,
    ) -> Result<TokenDeployment>;

    /// Status history in chronological order
    async fn history(&self, deployment_id: &str) -> Result<Vec<DeploymentStatusEntry>>;
}
