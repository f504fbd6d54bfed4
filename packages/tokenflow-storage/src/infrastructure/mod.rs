//! Infrastructure layer - Storage adapters
//!
//! In-memory adapter. A durable backend implements the same `DeploymentStore`
//! contract.

pub mod memory;

pub use memory::InMemoryDeploymentStore;
