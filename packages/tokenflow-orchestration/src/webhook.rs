//! Webhook notifier seam
//!
//! Deployment transitions are published after they are committed. Delivery is
//! best-effort: a failing or stalled notifier is logged and never rolls back
//! or blocks the transition that produced the event.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};

use tokenflow_storage::{DeploymentStatus, TokenDeployment};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WebhookEventType {
    DeploymentQueued,
    DeploymentStarted,
    DeploymentConfirming,
    DeploymentCompleted,
    DeploymentFailed,
    DeploymentCancelled,
}

impl WebhookEventType {
    /// Event published when a deployment enters `status`
    pub fn for_status(status: DeploymentStatus) -> Self {
        match status {
            DeploymentStatus::Queued => WebhookEventType::DeploymentQueued,
            DeploymentStatus::Submitted => WebhookEventType::DeploymentStarted,
            DeploymentStatus::Pending
            | DeploymentStatus::Confirmed
            | DeploymentStatus::Indexed => WebhookEventType::DeploymentConfirming,
            DeploymentStatus::Completed => WebhookEventType::DeploymentCompleted,
            DeploymentStatus::Failed => WebhookEventType::DeploymentFailed,
            DeploymentStatus::Cancelled => WebhookEventType::DeploymentCancelled,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookEventType::DeploymentQueued => "DeploymentQueued",
            WebhookEventType::DeploymentStarted => "DeploymentStarted",
            WebhookEventType::DeploymentConfirming => "DeploymentConfirming",
            WebhookEventType::DeploymentCompleted => "DeploymentCompleted",
            WebhookEventType::DeploymentFailed => "DeploymentFailed",
            WebhookEventType::DeploymentCancelled => "DeploymentCancelled",
        }
    }
}

impl std::fmt::Display for WebhookEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Committed deployment transition, as published to subscribers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookEvent {
    pub event_type: WebhookEventType,
    pub deployment_id: String,
    pub correlation_id: String,
    /// Deployer address
    pub actor: String,
    pub network: String,
    pub previous_status: DeploymentStatus,
    pub new_status: DeploymentStatus,
    pub message: String,
    pub transaction_hash: Option<String>,
    pub asset_identifier: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl WebhookEvent {
    /// Event for the transition that produced `deployment`
    pub fn for_transition(previous: DeploymentStatus, deployment: &TokenDeployment) -> Self {
        let last = deployment.status_history.last();
        Self {
            event_type: WebhookEventType::for_status(deployment.current_status),
            deployment_id: deployment.deployment_id.clone(),
            correlation_id: deployment.correlation_id.clone(),
            actor: deployment.deployed_by.clone(),
            network: deployment.network.clone(),
            previous_status: previous,
            new_status: deployment.current_status,
            message: last.map(|e| e.message.clone()).unwrap_or_default(),
            transaction_hash: deployment.transaction_hash.clone(),
            asset_identifier: deployment.asset_identifier.clone(),
            timestamp: last.map_or(deployment.updated_at, |e| e.timestamp),
        }
    }
}

/// Outbound event sink.
///
/// Errors are reported to the caller for logging only; they never affect the
/// state change that produced the event.
#[async_trait]
pub trait WebhookNotifier: Send + Sync {
    async fn emit_event(&self, event: WebhookEvent) -> anyhow::Result<()>;
}

/// Default notifier: records each event in the log
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingNotifier;

#[async_trait]
impl WebhookNotifier for LoggingNotifier {
    async fn emit_event(&self, event: WebhookEvent) -> anyhow::Result<()> {
        info!(
            event_type = %event.event_type,
            deployment_id = %event.deployment_id,
            correlation_id = ?event.correlation_id,
            from = %event.previous_status,
            to = %event.new_status,
            "Webhook event"
        );
        Ok(())
    }
}

/// Emit and swallow: failures and timeouts are logged with the event's
/// identifiers
pub(crate) async fn emit_best_effort(
    notifier: &Arc<dyn WebhookNotifier>,
    event: WebhookEvent,
    timeout: Duration,
) {
    let event_type = event.event_type;
    let deployment_id = event.deployment_id.clone();
    let correlation_id = event.correlation_id.clone();

    match tokio::time::timeout(timeout, notifier.emit_event(event)).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(
            event_type = %event_type,
            deployment_id = %deployment_id,
            correlation_id = ?correlation_id,
            error = %e,
            "Webhook emission failed"
        ),
        Err(_) => warn!(
            event_type = %event_type,
            deployment_id = %deployment_id,
            correlation_id = ?correlation_id,
            timeout_ms = timeout.as_millis() as u64,
            "Webhook emission timed out"
        ),
    }
}

/// Fire-and-forget event hand-off.
///
/// Events are queued and delivered by one background task per dispatcher, so
/// callers never wait on the notifier and subscribers see events in the order
/// they were dispatched. The task is spawned on the runtime of the first
/// `dispatch` call and exits once the dispatcher is dropped and the queue is
/// drained.
pub(crate) struct WebhookDispatcher {
    notifier: Arc<dyn WebhookNotifier>,
    timeout: Duration,
    queue: OnceLock<mpsc::UnboundedSender<WebhookEvent>>,
}

impl WebhookDispatcher {
    pub(crate) fn new(notifier: Arc<dyn WebhookNotifier>, timeout: Duration) -> Self {
        Self {
            notifier,
            timeout,
            queue: OnceLock::new(),
        }
    }

    /// Queue `event` for delivery. Must be called from within a Tokio runtime.
    pub(crate) fn dispatch(&self, event: WebhookEvent) {
        let queue = self.queue.get_or_init(|| {
            let (tx, mut rx) = mpsc::unbounded_channel::<WebhookEvent>();
            let notifier = Arc::clone(&self.notifier);
            let timeout = self.timeout;
            tokio::spawn(async move {
                while let Some(event) = rx.recv().await {
                    let deployment_id = event.deployment_id.clone();
                    let delivery = AssertUnwindSafe(emit_best_effort(&notifier, event, timeout));
                    if delivery.catch_unwind().await.is_err() {
                        warn!(deployment_id = %deployment_id, "Webhook notifier panicked");
                    }
                }
            });
            tx
        });

        if let Err(mpsc::error::SendError(event)) = queue.send(event) {
            // Delivery task is gone with the runtime that spawned it
            warn!(
                event_type = %event.event_type,
                deployment_id = %event.deployment_id,
                correlation_id = ?event.correlation_id,
                "Webhook event dropped, delivery task stopped"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tokenflow_storage::{NewDeployment, TransitionOutcome, TransitionRequest};

    #[test]
    fn test_event_type_per_status() {
        assert_eq!(
            WebhookEventType::for_status(DeploymentStatus::Submitted),
            WebhookEventType::DeploymentStarted
        );
        assert_eq!(
            WebhookEventType::for_status(DeploymentStatus::Indexed),
            WebhookEventType::DeploymentConfirming
        );
        assert_eq!(
            WebhookEventType::for_status(DeploymentStatus::Queued),
            WebhookEventType::DeploymentQueued
        );
        assert_eq!(
            WebhookEventType::for_status(DeploymentStatus::Cancelled).as_str(),
            "DeploymentCancelled"
        );
    }

    #[test]
    fn test_event_from_transition() {
        let mut deployment = TokenDeployment::new(NewDeployment {
            token_type: "ASA".to_string(),
            network: "testnet".to_string(),
            deployed_by: "ALGOADDR".to_string(),
            token_name: "Token".to_string(),
            token_symbol: "TOK".to_string(),
            correlation_id: Some("corr-1".to_string()),
        });
        let mut request = TransitionRequest::new(DeploymentStatus::Submitted, "Submitted to algod");
        request.transaction_hash = Some("TXHASH".to_string());

        let TransitionOutcome::Applied { previous, deployment: updated } =
            deployment.apply_transition(request, Utc::now())
        else {
            panic!("transition should apply");
        };
        let event = WebhookEvent::for_transition(previous, &updated);

        assert_eq!(event.event_type, WebhookEventType::DeploymentStarted);
        assert_eq!(event.previous_status, DeploymentStatus::Queued);
        assert_eq!(event.new_status, DeploymentStatus::Submitted);
        assert_eq!(event.correlation_id, "corr-1");
        assert_eq!(event.actor, "ALGOADDR");
        assert_eq!(event.message, "Submitted to algod");
        assert_eq!(event.transaction_hash.as_deref(), Some("TXHASH"));

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["eventType"], "DeploymentStarted");
        assert_eq!(json["deploymentId"], updated.deployment_id.as_str());
    }

    struct FailingNotifier;

    #[async_trait]
    impl WebhookNotifier for FailingNotifier {
        async fn emit_event(&self, _event: WebhookEvent) -> anyhow::Result<()> {
            anyhow::bail!("endpoint returned 503")
        }
    }

    #[tokio::test]
    async fn test_failed_emission_is_swallowed() {
        let deployment = TokenDeployment::new(NewDeployment {
            token_type: "ASA".to_string(),
            network: "testnet".to_string(),
            deployed_by: "ALGOADDR".to_string(),
            token_name: "Token".to_string(),
            token_symbol: "TOK".to_string(),
            correlation_id: None,
        });
        let notifier: Arc<dyn WebhookNotifier> = Arc::new(FailingNotifier);

        emit_best_effort(
            &notifier,
            WebhookEvent::for_transition(DeploymentStatus::Queued, &deployment),
            Duration::from_secs(1),
        )
        .await;
    }

    /// Stalls on the first event, forwards every later one
    struct StallFirstNotifier {
        stalled: AtomicBool,
        delivered: mpsc::UnboundedSender<WebhookEvent>,
    }

    #[async_trait]
    impl WebhookNotifier for StallFirstNotifier {
        async fn emit_event(&self, event: WebhookEvent) -> anyhow::Result<()> {
            if !self.stalled.swap(true, Ordering::SeqCst) {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            self.delivered.send(event)?;
            Ok(())
        }
    }

    fn event_with_message(message: &str) -> WebhookEvent {
        let deployment = TokenDeployment::new(NewDeployment {
            token_type: "ASA".to_string(),
            network: "testnet".to_string(),
            deployed_by: "ALGOADDR".to_string(),
            token_name: "Token".to_string(),
            token_symbol: "TOK".to_string(),
            correlation_id: None,
        });
        let mut event = WebhookEvent::for_transition(DeploymentStatus::Queued, &deployment);
        event.message = message.to_string();
        event
    }

    #[tokio::test]
    async fn test_dispatch_preserves_order_past_stalled_delivery() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let notifier: Arc<dyn WebhookNotifier> = Arc::new(StallFirstNotifier {
            stalled: AtomicBool::new(false),
            delivered: tx,
        });
        let dispatcher = WebhookDispatcher::new(notifier, Duration::from_millis(100));

        let started = std::time::Instant::now();
        for message in ["first", "second", "third"] {
            dispatcher.dispatch(event_with_message(message));
        }
        assert!(started.elapsed() < Duration::from_millis(100));

        let mut messages = Vec::new();
        for _ in 0..2 {
            let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
                .await
                .unwrap()
                .unwrap();
            messages.push(event.message);
        }
        assert_eq!(messages, vec!["second", "third"]);
    }

    struct PanicFirstNotifier {
        panicked: AtomicBool,
        delivered: mpsc::UnboundedSender<WebhookEvent>,
    }

    #[async_trait]
    impl WebhookNotifier for PanicFirstNotifier {
        async fn emit_event(&self, event: WebhookEvent) -> anyhow::Result<()> {
            if !self.panicked.swap(true, Ordering::SeqCst) {
                panic!("notifier bug");
            }
            self.delivered.send(event)?;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_notifier_panic_keeps_delivery_running() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let notifier: Arc<dyn WebhookNotifier> = Arc::new(PanicFirstNotifier {
            panicked: AtomicBool::new(false),
            delivered: tx,
        });
        let dispatcher = WebhookDispatcher::new(notifier, Duration::from_secs(1));

        dispatcher.dispatch(event_with_message("boom"));
        dispatcher.dispatch(event_with_message("after"));

        let event = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(event.message, "after");
    }
}
