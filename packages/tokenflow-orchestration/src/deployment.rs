//! Deployment status service
//!
//! State machine surface over a [`DeploymentStore`]: create, transition,
//! fail, retry, cancel, query, aggregate.
//!
//! # Return conventions
//!
//! - `Ok(true)`: transition applied, or the deployment was already in the
//!   requested status (idempotent no-op, nothing written, no event)
//! - `Ok(false)`: invalid transition or unknown deployment id (logged)
//! - `Err(_)`: unexpected storage failure
//!
//! Each applied transition queues one [`WebhookEvent`] after the record lock
//! is released. Delivery happens in the background, in commit order; a slow or
//! failing notifier is logged and never delays or undoes the change.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use tokenflow_storage::{
    DeploymentError, DeploymentErrorCategory, DeploymentFilter, DeploymentStatus,
    DeploymentStatusEntry, DeploymentStore, NewDeployment, StatusMetadata, TokenDeployment,
    TransitionOutcome, TransitionRequest,
};

use crate::config::DeploymentConfig;
use crate::error::Result;
use crate::webhook::{LoggingNotifier, WebhookDispatcher, WebhookEvent, WebhookNotifier};

/// Error code recorded for failures reported as a plain message
pub const GENERIC_FAILURE_CODE: &str = "DEPLOYMENT_FAILED";

// ═══════════════════════════════════════════════════════════════════════════
// Requests and views
// ═══════════════════════════════════════════════════════════════════════════

/// Requested status change with its optional on-chain details
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusUpdate {
    pub status: DeploymentStatus,
    pub message: String,
    pub transaction_hash: Option<String>,
    pub confirmed_round: Option<u64>,
    pub metadata: StatusMetadata,
}

impl StatusUpdate {
    pub fn new(status: DeploymentStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            transaction_hash: None,
            confirmed_round: None,
            metadata: StatusMetadata::default(),
        }
    }

    pub fn with_transaction_hash(mut self, hash: impl Into<String>) -> Self {
        self.transaction_hash = Some(hash.into());
        self
    }

    pub fn with_confirmed_round(mut self, round: u64) -> Self {
        self.confirmed_round = Some(round);
        self
    }

    pub fn with_metadata(mut self, metadata: StatusMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    fn into_request(self) -> TransitionRequest {
        TransitionRequest {
            target: self.status,
            message: self.message,
            metadata: self.metadata,
            transaction_hash: self.transaction_hash,
            confirmed_round: self.confirmed_round,
        }
    }
}

/// Paged listing request. `page` is 1-based.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentQuery {
    #[serde(flatten)]
    pub filter: DeploymentFilter,
    pub page: usize,
    pub page_size: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentPage {
    pub deployments: Vec<TokenDeployment>,
    pub total_count: usize,
    pub page: usize,
    pub page_size: usize,
    pub total_pages: usize,
}

/// Window and scope for metrics. Bounds are inclusive on `created_at`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsFilter {
    pub from_date: Option<DateTime<Utc>>,
    pub to_date: Option<DateTime<Utc>>,
    pub network: Option<String>,
    pub deployed_by: Option<String>,
}

impl From<&MetricsFilter> for DeploymentFilter {
    fn from(filter: &MetricsFilter) -> Self {
        DeploymentFilter {
            deployed_by: filter.deployed_by.clone(),
            network: filter.network.clone(),
            from_date: filter.from_date,
            to_date: filter.to_date,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentMetrics {
    pub total_deployments: usize,
    pub successful_deployments: usize,
    pub failed_deployments: usize,
    pub cancelled_deployments: usize,
    /// Queued through Indexed
    pub pending_deployments: usize,
    /// Percentage of completed deployments, 0 when there are none
    pub success_rate: f64,
    /// First history entry to the Completed entry, over completed deployments
    pub average_duration_seconds: Option<f64>,
    pub failures_by_category: BTreeMap<DeploymentErrorCategory, usize>,
    pub deployments_by_network: BTreeMap<String, usize>,
    pub from_date: Option<DateTime<Utc>>,
    pub to_date: Option<DateTime<Utc>>,
}

impl DeploymentMetrics {
    fn compute(deployments: &[TokenDeployment], filter: &MetricsFilter) -> Self {
        let mut metrics = DeploymentMetrics {
            total_deployments: deployments.len(),
            successful_deployments: 0,
            failed_deployments: 0,
            cancelled_deployments: 0,
            pending_deployments: 0,
            success_rate: 0.0,
            average_duration_seconds: None,
            failures_by_category: BTreeMap::new(),
            deployments_by_network: BTreeMap::new(),
            from_date: filter.from_date,
            to_date: filter.to_date,
        };

        let mut durations_ms: Vec<i64> = Vec::new();
        for deployment in deployments {
            *metrics
                .deployments_by_network
                .entry(deployment.network.clone())
                .or_default() += 1;

            match deployment.current_status {
                DeploymentStatus::Completed => {
                    metrics.successful_deployments += 1;
                    if let Some(duration) = deployment.duration() {
                        durations_ms.push(duration.num_milliseconds());
                    }
                }
                DeploymentStatus::Failed => {
                    metrics.failed_deployments += 1;
                    let category = deployment
                        .last_failure_category()
                        .unwrap_or(DeploymentErrorCategory::Unknown);
                    *metrics.failures_by_category.entry(category).or_default() += 1;
                }
                DeploymentStatus::Cancelled => metrics.cancelled_deployments += 1,
                status if status.is_in_flight() => metrics.pending_deployments += 1,
                _ => {}
            }
        }

        if metrics.total_deployments > 0 {
            metrics.success_rate =
                metrics.successful_deployments as f64 / metrics.total_deployments as f64 * 100.0;
        }
        if !durations_ms.is_empty() {
            let total: i64 = durations_ms.iter().sum();
            metrics.average_duration_seconds =
                Some(total as f64 / durations_ms.len() as f64 / 1000.0);
        }
        metrics
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Service
// ═══════════════════════════════════════════════════════════════════════════

pub struct DeploymentStatusService {
    store: Arc<dyn DeploymentStore>,
    webhooks: WebhookDispatcher,
    config: DeploymentConfig,
}

impl DeploymentStatusService {
    pub fn new(
        store: Arc<dyn DeploymentStore>,
        notifier: Arc<dyn WebhookNotifier>,
        config: DeploymentConfig,
    ) -> Self {
        let timeout = Duration::from_secs(config.webhook_timeout_secs);
        Self {
            store,
            webhooks: WebhookDispatcher::new(notifier, timeout),
            config,
        }
    }

    /// Logging notifier and default paging
    pub fn with_defaults(store: Arc<dyn DeploymentStore>) -> Self {
        Self::new(store, Arc::new(LoggingNotifier), DeploymentConfig::default())
    }

    pub fn store(&self) -> &Arc<dyn DeploymentStore> {
        &self.store
    }

    pub fn is_valid_status_transition(from: DeploymentStatus, to: DeploymentStatus) -> bool {
        from.can_transition_to(to)
    }

    /// Create a deployment in `Queued`. Returns the new deployment id.
    pub async fn create_deployment(&self, input: NewDeployment) -> Result<String> {
        let deployment = TokenDeployment::new(input);
        let deployment_id = deployment.deployment_id.clone();

        info!(
            deployment_id = %deployment_id,
            correlation_id = ?deployment.correlation_id,
            network = %deployment.network,
            token_type = %deployment.token_type,
            "Deployment created"
        );
        self.store.insert(deployment).await?;
        Ok(deployment_id)
    }

    pub async fn update_deployment_status(
        &self,
        deployment_id: &str,
        update: StatusUpdate,
    ) -> Result<bool> {
        self.transition(deployment_id, update.into_request()).await
    }

    /// Fail with a plain message; category is recorded as `Unknown`
    pub async fn mark_deployment_failed(
        &self,
        deployment_id: &str,
        message: &str,
        is_retryable: bool,
    ) -> Result<bool> {
        let metadata = StatusMetadata::failure(
            DeploymentErrorCategory::Unknown,
            GENERIC_FAILURE_CODE,
            is_retryable,
        );
        let update = StatusUpdate::new(DeploymentStatus::Failed, message).with_metadata(metadata);
        self.update_deployment_status(deployment_id, update).await
    }

    /// Fail with a structured error; the entry message is the user-facing text
    pub async fn mark_deployment_failed_with_error(
        &self,
        deployment_id: &str,
        error: &DeploymentError,
    ) -> Result<bool> {
        let update = StatusUpdate::new(DeploymentStatus::Failed, error.user_message.clone())
            .with_metadata(StatusMetadata::from(error));
        self.update_deployment_status(deployment_id, update).await
    }

    /// Failed -> Queued
    pub async fn retry_deployment(&self, deployment_id: &str) -> Result<bool> {
        let update = StatusUpdate::new(DeploymentStatus::Queued, "Deployment re-queued for retry");
        self.update_deployment_status(deployment_id, update).await
    }

    pub async fn cancel_deployment(&self, deployment_id: &str, reason: &str) -> Result<bool> {
        let update = StatusUpdate::new(
            DeploymentStatus::Cancelled,
            format!("Deployment cancelled: {reason}"),
        )
        .with_metadata(StatusMetadata::cancellation(reason));
        self.update_deployment_status(deployment_id, update).await
    }

    /// Record the on-chain identifier. Not a transition: no history, no event.
    pub async fn update_asset_identifier(
        &self,
        deployment_id: &str,
        identifier: &str,
    ) -> Result<bool> {
        match self.store.set_asset_identifier(deployment_id, identifier).await {
            Ok(deployment) => {
                info!(
                    deployment_id = %deployment_id,
                    correlation_id = ?deployment.correlation_id,
                    asset_identifier = %identifier,
                    "Asset identifier recorded"
                );
                Ok(true)
            }
            Err(e) if e.is_not_found() => {
                warn!(deployment_id = %deployment_id, "Asset identifier for unknown deployment");
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get_deployment(&self, deployment_id: &str) -> Result<Option<TokenDeployment>> {
        Ok(self.store.get(deployment_id).await?)
    }

    /// Newest first, paged with the configured bounds
    pub async fn get_deployments(&self, query: DeploymentQuery) -> Result<DeploymentPage> {
        let page_size = query
            .page_size
            .unwrap_or(self.config.default_page_size)
            .clamp(1, self.config.max_page_size.max(1));
        let page = query.page.max(1);

        let all = self.store.list(&query.filter).await?;
        let total_count = all.len();
        let total_pages = total_count.div_ceil(page_size);
        let deployments = all
            .into_iter()
            .skip((page - 1).saturating_mul(page_size))
            .take(page_size)
            .collect();

        Ok(DeploymentPage {
            deployments,
            total_count,
            page,
            page_size,
            total_pages,
        })
    }

    /// Chronological history; empty for unknown ids
    pub async fn get_status_history(
        &self,
        deployment_id: &str,
    ) -> Result<Vec<DeploymentStatusEntry>> {
        match self.store.history(deployment_id).await {
            Ok(history) => Ok(history),
            Err(e) if e.is_not_found() => {
                warn!(deployment_id = %deployment_id, "History requested for unknown deployment");
                Ok(Vec::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get_deployment_metrics(&self, filter: MetricsFilter) -> Result<DeploymentMetrics> {
        let deployments = self.store.list(&DeploymentFilter::from(&filter)).await?;
        let metrics = DeploymentMetrics::compute(&deployments, &filter);

        debug!(
            total = metrics.total_deployments,
            successful = metrics.successful_deployments,
            failed = metrics.failed_deployments,
            "Deployment metrics computed"
        );
        Ok(metrics)
    }

    async fn transition(&self, deployment_id: &str, request: TransitionRequest) -> Result<bool> {
        let requested = request.target;
        let outcome = match self.store.apply_transition(deployment_id, request).await {
            Ok(outcome) => outcome,
            Err(e) if e.is_not_found() => {
                warn!(
                    deployment_id = %deployment_id,
                    requested = %requested,
                    "Status update for unknown deployment"
                );
                return Ok(false);
            }
            Err(e) => return Err(e.into()),
        };

        match outcome {
            TransitionOutcome::Applied {
                previous,
                deployment,
            } => {
                info!(
                    deployment_id = %deployment_id,
                    correlation_id = ?deployment.correlation_id,
                    from = %previous,
                    to = %deployment.current_status,
                    "Deployment status updated"
                );
                if self.config.emit_webhooks {
                    let event = WebhookEvent::for_transition(previous, &deployment);
                    self.webhooks.dispatch(event);
                }
                Ok(true)
            }
            TransitionOutcome::Unchanged { status } => {
                debug!(
                    deployment_id = %deployment_id,
                    status = %status,
                    "Deployment already in requested status"
                );
                Ok(true)
            }
            TransitionOutcome::Rejected { current, requested } => {
                warn!(
                    deployment_id = %deployment_id,
                    from = %current,
                    to = %requested,
                    "Invalid status transition rejected"
                );
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tokenflow_storage::InMemoryDeploymentStore;
    use tokio::sync::mpsc;

    struct RecordingNotifier {
        events: mpsc::UnboundedSender<WebhookEvent>,
    }

    #[async_trait]
    impl WebhookNotifier for RecordingNotifier {
        async fn emit_event(&self, event: WebhookEvent) -> anyhow::Result<()> {
            self.events.send(event)?;
            Ok(())
        }
    }

    fn recording() -> (Arc<RecordingNotifier>, mpsc::UnboundedReceiver<WebhookEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        (Arc::new(RecordingNotifier { events }), rx)
    }

    async fn next_event(rx: &mut mpsc::UnboundedReceiver<WebhookEvent>) -> WebhookEvent {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("webhook delivered")
            .expect("notifier alive")
    }

    struct HangingNotifier;

    #[async_trait]
    impl WebhookNotifier for HangingNotifier {
        async fn emit_event(&self, _event: WebhookEvent) -> anyhow::Result<()> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }
    }

    struct BrokenNotifier;

    #[async_trait]
    impl WebhookNotifier for BrokenNotifier {
        async fn emit_event(&self, _event: WebhookEvent) -> anyhow::Result<()> {
            anyhow::bail!("webhook endpoint unreachable")
        }
    }

    fn input(network: &str) -> NewDeployment {
        NewDeployment {
            token_type: "ARC200".to_string(),
            network: network.to_string(),
            deployed_by: "DEPLOYER".to_string(),
            token_name: "Service Token".to_string(),
            token_symbol: "SVC".to_string(),
            correlation_id: None,
        }
    }

    fn service_with(notifier: Arc<dyn WebhookNotifier>) -> DeploymentStatusService {
        DeploymentStatusService::new(
            Arc::new(InMemoryDeploymentStore::new()),
            notifier,
            DeploymentConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_create_starts_queued_with_correlation_id() {
        let service = DeploymentStatusService::with_defaults(Arc::new(InMemoryDeploymentStore::new()));
        let id = service.create_deployment(input("testnet")).await.unwrap();

        let deployment = service.get_deployment(&id).await.unwrap().unwrap();
        assert_eq!(deployment.current_status, DeploymentStatus::Queued);
        assert_eq!(deployment.status_history.len(), 1);
        assert!(!deployment.correlation_id.is_empty());
    }

    #[tokio::test]
    async fn test_same_status_is_noop_without_event() {
        let (notifier, mut events) = recording();
        let service = service_with(notifier);
        let id = service.create_deployment(input("testnet")).await.unwrap();

        let update = StatusUpdate::new(DeploymentStatus::Submitted, "sent");
        assert!(service.update_deployment_status(&id, update.clone()).await.unwrap());
        assert!(service.update_deployment_status(&id, update.clone()).await.unwrap());
        assert!(service.update_deployment_status(&id, update).await.unwrap());

        let history = service.get_status_history(&id).await.unwrap();
        assert_eq!(history.len(), 2);

        // the next delivered event follows the first with nothing in between
        service
            .update_deployment_status(&id, StatusUpdate::new(DeploymentStatus::Pending, "waiting"))
            .await
            .unwrap();
        assert_eq!(next_event(&mut events).await.new_status, DeploymentStatus::Submitted);
        assert_eq!(next_event(&mut events).await.new_status, DeploymentStatus::Pending);
    }

    #[tokio::test]
    async fn test_invalid_transition_returns_false_without_mutation() {
        let (notifier, mut events) = recording();
        let service = service_with(notifier);
        let id = service.create_deployment(input("testnet")).await.unwrap();

        let skipped = StatusUpdate::new(DeploymentStatus::Confirmed, "too early");
        assert!(!service.update_deployment_status(&id, skipped).await.unwrap());

        let deployment = service.get_deployment(&id).await.unwrap().unwrap();
        assert_eq!(deployment.current_status, DeploymentStatus::Queued);
        assert_eq!(deployment.status_history.len(), 1);

        service
            .update_deployment_status(&id, StatusUpdate::new(DeploymentStatus::Submitted, "sent"))
            .await
            .unwrap();
        let event = next_event(&mut events).await;
        assert_eq!(event.previous_status, DeploymentStatus::Queued);
        assert_eq!(event.new_status, DeploymentStatus::Submitted);
    }

    #[tokio::test]
    async fn test_unknown_deployment() {
        let service = DeploymentStatusService::with_defaults(Arc::new(InMemoryDeploymentStore::new()));

        let update = StatusUpdate::new(DeploymentStatus::Submitted, "sent");
        assert!(!service.update_deployment_status("nope", update).await.unwrap());
        assert!(!service.cancel_deployment("nope", "user").await.unwrap());
        assert!(!service.update_asset_identifier("nope", "123").await.unwrap());
        assert_eq!(service.get_deployment("nope").await.unwrap(), None);
        assert!(service.get_status_history("nope").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_mark_failed_records_metadata() {
        let service = DeploymentStatusService::with_defaults(Arc::new(InMemoryDeploymentStore::new()));
        let id = service.create_deployment(input("testnet")).await.unwrap();
        service
            .update_deployment_status(&id, StatusUpdate::new(DeploymentStatus::Submitted, "sent"))
            .await
            .unwrap();

        let error = DeploymentError::insufficient_funds("1000000", "5000");
        assert!(service.mark_deployment_failed_with_error(&id, &error).await.unwrap());

        let deployment = service.get_deployment(&id).await.unwrap().unwrap();
        let last = deployment.status_history.last().unwrap();
        assert_eq!(deployment.current_status, DeploymentStatus::Failed);
        assert_eq!(deployment.error_message.as_deref(), Some(error.user_message.as_str()));
        assert_eq!(
            last.metadata.error_category,
            Some(DeploymentErrorCategory::InsufficientFunds)
        );
        assert_eq!(last.metadata.error_code.as_deref(), Some(error.error_code.as_str()));
        assert_eq!(last.metadata.is_retryable, Some(error.is_retryable));
        assert_eq!(
            last.metadata.technical_message.as_deref(),
            Some(error.technical_message.as_str())
        );
    }

    #[tokio::test]
    async fn test_mark_failed_plain_message() {
        let service = DeploymentStatusService::with_defaults(Arc::new(InMemoryDeploymentStore::new()));
        let id = service.create_deployment(input("testnet")).await.unwrap();

        assert!(service.mark_deployment_failed(&id, "node unreachable", true).await.unwrap());

        let history = service.get_status_history(&id).await.unwrap();
        let metadata = &history[1].metadata;
        assert_eq!(metadata.error_category, Some(DeploymentErrorCategory::Unknown));
        assert_eq!(metadata.error_code.as_deref(), Some(GENERIC_FAILURE_CODE));
        assert_eq!(metadata.is_retryable, Some(true));
        assert_eq!(history[1].message, "node unreachable");
    }

    #[tokio::test]
    async fn test_mark_failed_on_terminal_is_rejected() {
        let service = DeploymentStatusService::with_defaults(Arc::new(InMemoryDeploymentStore::new()));
        let id = service.create_deployment(input("testnet")).await.unwrap();
        assert!(service.cancel_deployment(&id, "user request").await.unwrap());

        assert!(!service.mark_deployment_failed(&id, "late failure", false).await.unwrap());
        assert_eq!(service.get_status_history(&id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_retry_clears_error() {
        let service = DeploymentStatusService::with_defaults(Arc::new(InMemoryDeploymentStore::new()));
        let id = service.create_deployment(input("testnet")).await.unwrap();
        service.mark_deployment_failed(&id, "timeout", true).await.unwrap();

        assert!(service.retry_deployment(&id).await.unwrap());

        let deployment = service.get_deployment(&id).await.unwrap().unwrap();
        assert_eq!(deployment.current_status, DeploymentStatus::Queued);
        assert_eq!(deployment.error_message, None);
        assert_eq!(deployment.status_history.len(), 3);
    }

    #[tokio::test]
    async fn test_cancel_only_from_queued() {
        let service = DeploymentStatusService::with_defaults(Arc::new(InMemoryDeploymentStore::new()));
        let queued = service.create_deployment(input("testnet")).await.unwrap();
        let submitted = service.create_deployment(input("testnet")).await.unwrap();
        service
            .update_deployment_status(
                &submitted,
                StatusUpdate::new(DeploymentStatus::Submitted, "sent"),
            )
            .await
            .unwrap();

        assert!(service.cancel_deployment(&queued, "changed mind").await.unwrap());
        assert!(!service.cancel_deployment(&submitted, "too late").await.unwrap());

        let history = service.get_status_history(&queued).await.unwrap();
        assert_eq!(history[1].metadata.reason.as_deref(), Some("changed mind"));
    }

    #[tokio::test]
    async fn test_asset_identifier_is_not_a_transition() {
        let (notifier, mut events) = recording();
        let service = service_with(notifier);
        let id = service.create_deployment(input("testnet")).await.unwrap();

        assert!(service.update_asset_identifier(&id, "123456").await.unwrap());

        let deployment = service.get_deployment(&id).await.unwrap().unwrap();
        assert_eq!(deployment.asset_identifier.as_deref(), Some("123456"));
        assert_eq!(deployment.status_history.len(), 1);

        service.cancel_deployment(&id, "done").await.unwrap();
        let event = next_event(&mut events).await;
        assert_eq!(event.new_status, DeploymentStatus::Cancelled);
        assert_eq!(event.asset_identifier.as_deref(), Some("123456"));
    }

    #[tokio::test]
    async fn test_notifier_failure_does_not_roll_back() {
        let service = service_with(Arc::new(BrokenNotifier));
        let id = service.create_deployment(input("testnet")).await.unwrap();

        let update = StatusUpdate::new(DeploymentStatus::Submitted, "sent");
        assert!(service.update_deployment_status(&id, update).await.unwrap());

        let deployment = service.get_deployment(&id).await.unwrap().unwrap();
        assert_eq!(deployment.current_status, DeploymentStatus::Submitted);
    }

    #[tokio::test]
    async fn test_webhooks_can_be_disabled() {
        let (notifier, mut events) = recording();
        let service = DeploymentStatusService::new(
            Arc::new(InMemoryDeploymentStore::new()),
            notifier,
            DeploymentConfig {
                emit_webhooks: false,
                ..Default::default()
            },
        );
        let id = service.create_deployment(input("testnet")).await.unwrap();

        service
            .update_deployment_status(&id, StatusUpdate::new(DeploymentStatus::Submitted, "sent"))
            .await
            .unwrap();
        tokio::task::yield_now().await;

        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_stalled_notifier_does_not_block_transitions() {
        let service = service_with(Arc::new(HangingNotifier));
        let id = service.create_deployment(input("testnet")).await.unwrap();

        for status in [DeploymentStatus::Submitted, DeploymentStatus::Pending, DeploymentStatus::Confirmed] {
            let applied = tokio::time::timeout(
                Duration::from_secs(2),
                service.update_deployment_status(&id, StatusUpdate::new(status, "step")),
            )
            .await
            .expect("transition returns without waiting for delivery")
            .unwrap();
            assert!(applied);
        }
        let failed = tokio::time::timeout(
            Duration::from_secs(2),
            service.mark_deployment_failed(&id, "node lost", true),
        )
        .await
        .expect("failure returns without waiting for delivery")
        .unwrap();
        assert!(failed);

        let deployment = service.get_deployment(&id).await.unwrap().unwrap();
        assert_eq!(deployment.current_status, DeploymentStatus::Failed);
    }

    #[tokio::test]
    async fn test_pagination_clamps_page_size() {
        let service = DeploymentStatusService::new(
            Arc::new(InMemoryDeploymentStore::new()),
            Arc::new(LoggingNotifier),
            DeploymentConfig {
                default_page_size: 2,
                max_page_size: 3,
                emit_webhooks: false,
                ..Default::default()
            },
        );
        for _ in 0..5 {
            service.create_deployment(input("testnet")).await.unwrap();
        }

        let first = service
            .get_deployments(DeploymentQuery::default())
            .await
            .unwrap();
        assert_eq!(first.page, 1);
        assert_eq!(first.page_size, 2);
        assert_eq!(first.total_count, 5);
        assert_eq!(first.total_pages, 3);
        assert_eq!(first.deployments.len(), 2);

        let big = service
            .get_deployments(DeploymentQuery {
                page: 2,
                page_size: Some(50),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(big.page_size, 3);
        assert_eq!(big.deployments.len(), 2);

        let beyond = service
            .get_deployments(DeploymentQuery {
                page: 9,
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(beyond.deployments.is_empty());
        assert_eq!(beyond.total_count, 5);
    }

    #[tokio::test]
    async fn test_metrics() {
        let service = DeploymentStatusService::with_defaults(Arc::new(InMemoryDeploymentStore::new()));

        let completed = service.create_deployment(input("mainnet")).await.unwrap();
        for status in [
            DeploymentStatus::Submitted,
            DeploymentStatus::Pending,
            DeploymentStatus::Confirmed,
            DeploymentStatus::Completed,
        ] {
            service
                .update_deployment_status(&completed, StatusUpdate::new(status, status.as_str()))
                .await
                .unwrap();
        }

        let failed = service.create_deployment(input("testnet")).await.unwrap();
        service
            .mark_deployment_failed_with_error(&failed, &DeploymentError::network("rpc down"))
            .await
            .unwrap();

        let cancelled = service.create_deployment(input("testnet")).await.unwrap();
        service.cancel_deployment(&cancelled, "user").await.unwrap();

        service.create_deployment(input("testnet")).await.unwrap();

        let metrics = service
            .get_deployment_metrics(MetricsFilter::default())
            .await
            .unwrap();

        assert_eq!(metrics.total_deployments, 4);
        assert_eq!(metrics.successful_deployments, 1);
        assert_eq!(metrics.failed_deployments, 1);
        assert_eq!(metrics.cancelled_deployments, 1);
        assert_eq!(metrics.pending_deployments, 1);
        assert!((metrics.success_rate - 25.0).abs() < f64::EPSILON);
        assert!(metrics.average_duration_seconds.unwrap() >= 0.0);
        assert_eq!(
            metrics.failures_by_category.get(&DeploymentErrorCategory::NetworkError),
            Some(&1)
        );
        assert_eq!(metrics.deployments_by_network.get("testnet"), Some(&3));

        let mainnet = service
            .get_deployment_metrics(MetricsFilter {
                network: Some("mainnet".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(mainnet.total_deployments, 1);
        assert!((mainnet.success_rate - 100.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_metrics_empty_window() {
        let service = DeploymentStatusService::with_defaults(Arc::new(InMemoryDeploymentStore::new()));
        let metrics = service
            .get_deployment_metrics(MetricsFilter::default())
            .await
            .unwrap();

        assert_eq!(metrics.total_deployments, 0);
        assert_eq!(metrics.success_rate, 0.0);
        assert_eq!(metrics.average_duration_seconds, None);
    }
}
