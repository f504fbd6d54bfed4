//! In-memory adapter for DeploymentStore
//!
//! One `parking_lot::Mutex` per deployment, held only for the synchronous
//! read-validate-append-write step (never across an await). The outer
//! `DashMap` is sharded, so lookups of different ids do not contend.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

use crate::domain::{
    DeploymentFilter, DeploymentStatusEntry, DeploymentStore, TokenDeployment, TransitionOutcome,
    TransitionRequest,
};
use crate::error::{Result, StorageError};

type Record = Arc<Mutex<TokenDeployment>>;

#[derive(Default)]
pub struct InMemoryDeploymentStore {
    records: DashMap<String, Record>,
}

impl InMemoryDeploymentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Clone the record handle out so the shard guard is released before locking
    fn record(&self, deployment_id: &str) -> Result<Record> {
        self.records
            .get(deployment_id)
            .map(|r| Arc::clone(r.value()))
            .ok_or_else(|| StorageError::deployment_not_found(deployment_id))
    }
}

#[async_trait]
impl DeploymentStore for InMemoryDeploymentStore {
    async fn insert(&self, deployment: TokenDeployment) -> Result<()> {
        match self.records.entry(deployment.deployment_id.clone()) {
            Entry::Occupied(occupied) => Err(StorageError::duplicate_deployment(occupied.key())),
            Entry::Vacant(vacant) => {
                debug!(deployment_id = %deployment.deployment_id, "Deployment stored");
                vacant.insert(Arc::new(Mutex::new(deployment)));
                Ok(())
            }
        }
    }

    async fn get(&self, deployment_id: &str) -> Result<Option<TokenDeployment>> {
        match self.record(deployment_id) {
            Ok(record) => {
                let snapshot = record.lock().clone();
                Ok(Some(snapshot))
            }
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn list(&self, filter: &DeploymentFilter) -> Result<Vec<TokenDeployment>> {
        let records: Vec<Record> = self
            .records
            .iter()
            .map(|r| Arc::clone(r.value()))
            .collect();

        let mut deployments: Vec<TokenDeployment> = records
            .iter()
            .filter_map(|record| {
                let deployment = record.lock();
                if filter.matches(&deployment) {
                    Some(deployment.clone())
                } else {
                    None
                }
            })
            .collect();

        deployments.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.deployment_id.cmp(&b.deployment_id))
        });
        Ok(deployments)
    }

    async fn apply_transition(
        &self,
        deployment_id: &str,
        request: TransitionRequest,
    ) -> Result<TransitionOutcome> {
        let record = self.record(deployment_id)?;
        let mut deployment = record.lock();
        Ok(deployment.apply_transition(request, Utc::now()))
    }

    async fn set_asset_identifier(
        &self,
        deployment_id: &str,
        identifier: &str,
    ) -> Result<TokenDeployment> {
        let record = self.record(deployment_id)?;
        let mut deployment = record.lock();
        deployment.set_asset_identifier(identifier, Utc::now());
        Ok(deployment.clone())
    }

    async fn history(&self, deployment_id: &str) -> Result<Vec<DeploymentStatusEntry>> {
        let record = self.record(deployment_id)?;
        let deployment = record.lock();
        Ok(deployment.status_history.clone())
    }
}
