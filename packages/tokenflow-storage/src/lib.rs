//! Tokenflow Storage - Deployment Record Store
//!
//! > Every deployment is traceable; history is append-only and never deleted.
//!
//! ## Core Principles
//!
//! 1. **Append-only history**: status entries are never edited or removed
//! 2. **Guarded transitions**: illegal transitions return `Rejected`, never mutate
//! 3. **Per-record exclusivity**: updates to one deployment are serialized,
//!    different deployments proceed in parallel
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tokenflow_storage::{DeploymentStore, InMemoryDeploymentStore, NewDeployment, TokenDeployment};
//!
//! let store = InMemoryDeploymentStore::new();
//! let deployment = TokenDeployment::new(NewDeployment { .. });
//! store.insert(deployment.clone()).await?;
//!
//! let outcome = store
//!     .apply_transition(&deployment.deployment_id, TransitionRequest::new(DeploymentStatus::Submitted, "sent"))
//!     .await?;
//! ```

pub mod domain;
pub mod error;
pub mod infrastructure;

pub use error::{ErrorKind, Result, StorageError};

pub use domain::{
    DeploymentError, DeploymentErrorCategory, DeploymentFilter, DeploymentStatus,
    DeploymentStatusEntry, DeploymentStore, NewDeployment, StatusMetadata, TokenDeployment,
    TransitionOutcome, TransitionRequest,
};
pub use infrastructure::InMemoryDeploymentStore;
