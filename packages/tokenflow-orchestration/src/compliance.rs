//! Enterprise audit aggregation
//!
//! Unions audit entries from heterogeneous producers (deployments,
//! orchestration runs, compliance and whitelist services) under one
//! retention policy.
//!
//! ## Principles
//!
//! 1. **Immutable entries**: producers hand out copies; nothing is edited
//! 2. **Fail-open reads**: a producer that errors is logged and reported in
//!    `unavailable_sources`, the rest of the log is still returned
//! 3. **Newest first**: aggregated entries are ordered by `performed_at` desc

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use tokenflow_storage::{DeploymentFilter, DeploymentStatus, DeploymentStore};

use crate::config::{AuditConfig, MIN_RETENTION_YEARS};
use crate::error::Result;
use crate::result::{AuditOutcome, OrchestrationResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AuditSource {
    Deployment,
    Orchestration,
    Compliance,
    Whitelist,
}

impl AuditSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditSource::Deployment => "Deployment",
            AuditSource::Orchestration => "Orchestration",
            AuditSource::Compliance => "Compliance",
            AuditSource::Whitelist => "Whitelist",
        }
    }
}

impl std::fmt::Display for AuditSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Common shape shared by every audit producer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceAuditEntry {
    pub source: AuditSource,
    pub asset_id: Option<String>,
    pub network: Option<String>,
    pub action_type: String,
    pub performed_by: String,
    pub performed_at: DateTime<Utc>,
    pub success: bool,
    pub details: Option<String>,
    pub correlation_id: Option<String>,
}

/// Retention contract stamped on every aggregated log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetentionPolicy {
    pub minimum_retention_years: u32,
    pub immutable_entries: bool,
    pub regulatory_framework: String,
    pub description: String,
}

impl RetentionPolicy {
    /// Retention below the seven-year floor is raised to the floor
    pub fn new(retention_years: u32, regulatory_framework: impl Into<String>) -> Self {
        let years = retention_years.max(MIN_RETENTION_YEARS);
        let framework = regulatory_framework.into();
        Self {
            minimum_retention_years: years,
            immutable_entries: true,
            description: format!(
                "Audit entries are immutable and retained for at least {years} years ({framework})."
            ),
            regulatory_framework: framework,
        }
    }

    pub fn from_config(config: &AuditConfig) -> Self {
        Self::new(config.retention_years, config.regulatory_framework.clone())
    }
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self::from_config(&AuditConfig::default())
    }
}

/// Aggregation criteria. Time bounds are inclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditQuery {
    pub asset_id: Option<String>,
    pub network: Option<String>,
    pub from_date: Option<DateTime<Utc>>,
    pub to_date: Option<DateTime<Utc>>,
    /// Restrict to these producers; empty means all
    pub sources: Vec<AuditSource>,
    pub limit: Option<usize>,
}

impl AuditQuery {
    pub fn includes_source(&self, source: AuditSource) -> bool {
        self.sources.is_empty() || self.sources.contains(&source)
    }

    pub fn matches(&self, entry: &ComplianceAuditEntry) -> bool {
        fn eq_opt(criterion: &Option<String>, value: &Option<String>) -> bool {
            match criterion {
                None => true,
                Some(c) => value.as_deref() == Some(c.as_str()),
            }
        }

        self.includes_source(entry.source)
            && eq_opt(&self.asset_id, &entry.asset_id)
            && eq_opt(&self.network, &entry.network)
            && self.from_date.map_or(true, |from| entry.performed_at >= from)
            && self.to_date.map_or(true, |to| entry.performed_at <= to)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedAuditLog {
    pub entries: Vec<ComplianceAuditEntry>,
    /// Matches before `limit` was applied
    pub total_count: usize,
    pub retention_policy: RetentionPolicy,
    pub unavailable_sources: Vec<AuditSource>,
}

/// Source of audit entries
#[async_trait]
pub trait AuditLogProducer: Send + Sync {
    fn source(&self) -> AuditSource;

    /// Entries relevant to `query`; may over-approximate, the aggregator
    /// filters again.
    async fn audit_entries(&self, query: &AuditQuery) -> Result<Vec<ComplianceAuditEntry>>;
}

// ═══════════════════════════════════════════════════════════════════════════
// Producers
// ═══════════════════════════════════════════════════════════════════════════

/// One entry per deployment status history entry
pub struct DeploymentAuditProducer {
    store: Arc<dyn DeploymentStore>,
}

impl DeploymentAuditProducer {
    pub fn new(store: Arc<dyn DeploymentStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl AuditLogProducer for DeploymentAuditProducer {
    fn source(&self) -> AuditSource {
        AuditSource::Deployment
    }

    async fn audit_entries(&self, query: &AuditQuery) -> Result<Vec<ComplianceAuditEntry>> {
        let filter = DeploymentFilter {
            network: query.network.clone(),
            ..Default::default()
        };
        let deployments = self.store.list(&filter).await?;

        let entries = deployments
            .into_iter()
            .flat_map(|d| {
                let asset_id = d.asset_identifier.clone();
                let network = d.network.clone();
                let deployed_by = d.deployed_by.clone();
                let correlation_id = d.correlation_id.clone();
                d.status_history.into_iter().map(move |entry| ComplianceAuditEntry {
                    source: AuditSource::Deployment,
                    asset_id: asset_id.clone(),
                    network: Some(network.clone()),
                    action_type: format!("DEPLOYMENT_{}", entry.status.as_str().to_uppercase()),
                    performed_by: deployed_by.clone(),
                    performed_at: entry.timestamp,
                    success: entry.status != DeploymentStatus::Failed,
                    details: Some(entry.message),
                    correlation_id: Some(correlation_id.clone()),
                })
            })
            .collect();
        Ok(entries)
    }
}

/// Append-only log of orchestration run summaries
#[derive(Default)]
pub struct OrchestrationAuditLog {
    entries: RwLock<Vec<ComplianceAuditEntry>>,
}

impl OrchestrationAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a finished run, stamped with its last stage marker's time
    pub async fn record<T>(&self, result: &OrchestrationResult<T>) {
        let summary = &result.audit_summary;
        let performed_at = result
            .stage_markers
            .last()
            .map_or_else(Utc::now, |m| m.entered_at);

        let entry = ComplianceAuditEntry {
            source: AuditSource::Orchestration,
            asset_id: None,
            network: None,
            action_type: summary.operation_type.clone(),
            performed_by: summary
                .initiated_by
                .clone()
                .unwrap_or_else(|| "system".to_string()),
            performed_at,
            success: summary.outcome == AuditOutcome::Success,
            details: summary.failure_code.clone(),
            correlation_id: Some(summary.correlation_id.clone()),
        };
        self.entries.write().await.push(entry);
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl AuditLogProducer for OrchestrationAuditLog {
    fn source(&self) -> AuditSource {
        AuditSource::Orchestration
    }

    async fn audit_entries(&self, _query: &AuditQuery) -> Result<Vec<ComplianceAuditEntry>> {
        Ok(self.entries.read().await.clone())
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Aggregator
// ═══════════════════════════════════════════════════════════════════════════

pub struct EnterpriseAuditAggregator {
    producers: Vec<Arc<dyn AuditLogProducer>>,
    retention_policy: RetentionPolicy,
}

impl EnterpriseAuditAggregator {
    pub fn new(retention_policy: RetentionPolicy) -> Self {
        Self {
            producers: Vec::new(),
            retention_policy,
        }
    }

    pub fn with_producer(mut self, producer: Arc<dyn AuditLogProducer>) -> Self {
        self.producers.push(producer);
        self
    }

    pub fn retention_policy(&self) -> &RetentionPolicy {
        &self.retention_policy
    }

    pub async fn aggregate(&self, query: &AuditQuery) -> AggregatedAuditLog {
        let mut entries = Vec::new();
        let mut unavailable_sources = Vec::new();

        for producer in &self.producers {
            let source = producer.source();
            if !query.includes_source(source) {
                continue;
            }
            match producer.audit_entries(query).await {
                Ok(produced) => entries.extend(produced.into_iter().filter(|e| query.matches(e))),
                Err(e) => {
                    warn!(source = %source, error = %e, "Audit producer unavailable");
                    unavailable_sources.push(source);
                }
            }
        }

        entries.sort_by(|a, b| {
            b.performed_at
                .cmp(&a.performed_at)
                .then_with(|| a.source.cmp(&b.source))
        });
        let total_count = entries.len();
        if let Some(limit) = query.limit {
            entries.truncate(limit);
        }

        debug!(
            total = total_count,
            returned = entries.len(),
            unavailable = unavailable_sources.len(),
            "Audit log aggregated"
        );

        AggregatedAuditLog {
            entries,
            total_count,
            retention_policy: self.retention_policy.clone(),
            unavailable_sources,
        }
    }
}
