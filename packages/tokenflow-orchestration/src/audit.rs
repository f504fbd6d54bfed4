//! Deployment audit trail export
//!
//! Read-only projections of a deployment's history for compliance
//! extraction. Output depends only on stored data, so exporting the same
//! history twice yields identical bytes.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

use tokenflow_storage::{
    DeploymentFilter, DeploymentStatus, DeploymentStatusEntry, DeploymentStore, TokenDeployment,
};

use crate::error::{OrchestratorError, Result};

const CSV_HEADER: [&str; 15] = [
    "DeploymentId",
    "TokenType",
    "Network",
    "DeployedBy",
    "TokenName",
    "TokenSymbol",
    "CorrelationId",
    "AssetIdentifier",
    "EntryId",
    "Status",
    "Timestamp",
    "Message",
    "TransactionHash",
    "ConfirmedRound",
    "Metadata",
];

/// Deployment identity plus its full chronological history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentAuditTrail {
    pub deployment_id: String,
    pub token_type: String,
    pub network: String,
    pub deployed_by: String,
    pub token_name: String,
    pub token_symbol: String,
    pub correlation_id: String,
    pub current_status: DeploymentStatus,
    pub asset_identifier: Option<String>,
    pub transaction_hash: Option<String>,
    pub confirmed_round: Option<u64>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub status_history: Vec<DeploymentStatusEntry>,
}

impl From<TokenDeployment> for DeploymentAuditTrail {
    fn from(d: TokenDeployment) -> Self {
        Self {
            deployment_id: d.deployment_id,
            token_type: d.token_type,
            network: d.network,
            deployed_by: d.deployed_by,
            token_name: d.token_name,
            token_symbol: d.token_symbol,
            correlation_id: d.correlation_id,
            current_status: d.current_status,
            asset_identifier: d.asset_identifier,
            transaction_hash: d.transaction_hash,
            confirmed_round: d.confirmed_round,
            error_message: d.error_message,
            created_at: d.created_at,
            updated_at: d.updated_at,
            status_history: d.status_history,
        }
    }
}

pub struct DeploymentAuditService {
    store: Arc<dyn DeploymentStore>,
}

impl DeploymentAuditService {
    pub fn new(store: Arc<dyn DeploymentStore>) -> Self {
        Self { store }
    }

    pub async fn audit_trail(&self, deployment_id: &str) -> Result<Option<DeploymentAuditTrail>> {
        let deployment = self.store.get(deployment_id).await?;
        if deployment.is_none() {
            warn!(deployment_id = %deployment_id, "Audit export for unknown deployment");
        }
        Ok(deployment.map(DeploymentAuditTrail::from))
    }

    /// Pretty-printed JSON; `None` for unknown ids
    pub async fn export_audit_trail_json(&self, deployment_id: &str) -> Result<Option<String>> {
        match self.audit_trail(deployment_id).await? {
            Some(trail) => Ok(Some(to_json(&trail)?)),
            None => Ok(None),
        }
    }

    /// Header plus one row per history entry; `None` for unknown ids
    pub async fn export_audit_trail_csv(&self, deployment_id: &str) -> Result<Option<String>> {
        Ok(self
            .audit_trail(deployment_id)
            .await?
            .map(|trail| render_csv(std::slice::from_ref(&trail))))
    }

    /// JSON array of every matching deployment's trail, newest deployment first
    pub async fn export_audit_trails_json(&self, filter: &DeploymentFilter) -> Result<String> {
        let trails = self.audit_trails(filter).await?;
        to_json(&trails)
    }

    pub async fn export_audit_trails_csv(&self, filter: &DeploymentFilter) -> Result<String> {
        let trails = self.audit_trails(filter).await?;
        Ok(render_csv(&trails))
    }

    async fn audit_trails(&self, filter: &DeploymentFilter) -> Result<Vec<DeploymentAuditTrail>> {
        let trails: Vec<DeploymentAuditTrail> = self
            .store
            .list(filter)
            .await?
            .into_iter()
            .map(DeploymentAuditTrail::from)
            .collect();
        debug!(count = trails.len(), "Audit trails collected");
        Ok(trails)
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(OrchestratorError::serialization)
}

fn render_csv(trails: &[DeploymentAuditTrail]) -> String {
    let mut out = String::new();
    push_row(&mut out, CSV_HEADER.iter().map(|h| h.to_string()));

    for trail in trails {
        for entry in &trail.status_history {
            let metadata = entry
                .metadata
                .pairs()
                .into_iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect::<Vec<_>>()
                .join(";");

            push_row(
                &mut out,
                [
                    trail.deployment_id.clone(),
                    trail.token_type.clone(),
                    trail.network.clone(),
                    trail.deployed_by.clone(),
                    trail.token_name.clone(),
                    trail.token_symbol.clone(),
                    trail.correlation_id.clone(),
                    trail.asset_identifier.clone().unwrap_or_default(),
                    entry.id.clone(),
                    entry.status.to_string(),
                    entry.timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true),
                    entry.message.clone(),
                    entry.transaction_hash.clone().unwrap_or_default(),
                    entry
                        .confirmed_round
                        .map(|r| r.to_string())
                        .unwrap_or_default(),
                    metadata,
                ],
            );
        }
    }
    out
}

fn push_row(out: &mut String, fields: impl IntoIterator<Item = String>) {
    let row = fields
        .into_iter()
        .map(|f| csv_escape(&f))
        .collect::<Vec<_>>()
        .join(",");
    out.push_str(&row);
    out.push('\n');
}

/// RFC 4180 field quoting
pub fn csv_escape(field: &str) -> String {
    if field.contains([',', '"', '\r', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
