use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::failure::{DeploymentError, DeploymentErrorCategory};
use super::status::DeploymentStatus;

// ═══════════════════════════════════════════════════════════════════════════
// History
// ═══════════════════════════════════════════════════════════════════════════

/// Documented metadata keys carried on a history entry.
///
/// Serialized as `errorCategory`, `errorCode`, `isRetryable`,
/// `technicalMessage`, `userMessage`, `suggestedRetryDelaySeconds`, `reason`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_category: Option<DeploymentErrorCategory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_retryable: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub technical_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_retry_delay_seconds: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl StatusMetadata {
    /// Metadata for a plain-message failure
    pub fn failure(category: DeploymentErrorCategory, error_code: &str, is_retryable: bool) -> Self {
        Self {
            error_category: Some(category),
            error_code: Some(error_code.to_string()),
            is_retryable: Some(is_retryable),
            ..Default::default()
        }
    }

    pub fn cancellation(reason: impl Into<String>) -> Self {
        Self {
            reason: Some(reason.into()),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Present keys in a fixed order, values rendered as text
    pub fn pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(category) = self.error_category {
            pairs.push(("errorCategory", category.to_string()));
        }
        if let Some(code) = &self.error_code {
            pairs.push(("errorCode", code.clone()));
        }
        if let Some(retryable) = self.is_retryable {
            pairs.push(("isRetryable", retryable.to_string()));
        }
        if let Some(message) = &self.technical_message {
            pairs.push(("technicalMessage", message.clone()));
        }
        if let Some(message) = &self.user_message {
            pairs.push(("userMessage", message.clone()));
        }
        if let Some(delay) = self.suggested_retry_delay_seconds {
            pairs.push(("suggestedRetryDelaySeconds", delay.to_string()));
        }
        if let Some(reason) = &self.reason {
            pairs.push(("reason", reason.clone()));
        }
        pairs
    }
}

impl From<&DeploymentError> for StatusMetadata {
    fn from(error: &DeploymentError) -> Self {
        Self {
            error_category: Some(error.category),
            error_code: Some(error.error_code.clone()),
            is_retryable: Some(error.is_retryable),
            technical_message: Some(error.technical_message.clone()),
            user_message: Some(error.user_message.clone()),
            suggested_retry_delay_seconds: error.suggested_retry_delay_seconds,
            reason: None,
        }
    }
}

/// One immutable audit record in a deployment's status history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentStatusEntry {
    pub id: String,
    pub deployment_id: String,
    pub status: DeploymentStatus,
    pub timestamp: DateTime<Utc>,
    pub message: String,
    #[serde(default)]
    pub metadata: StatusMetadata,
    pub transaction_hash: Option<String>,
    pub confirmed_round: Option<u64>,
}

// ═══════════════════════════════════════════════════════════════════════════
// Deployment aggregate
// ═══════════════════════════════════════════════════════════════════════════

/// Input for creating a deployment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewDeployment {
    pub token_type: String,
    pub network: String,
    pub deployed_by: String,
    pub token_name: String,
    pub token_symbol: String,
    /// Generated when absent
    pub correlation_id: Option<String>,
}

/// Persistent record of a token deployment.
///
/// Mutated only through [`TokenDeployment::apply_transition`] and the asset
/// identifier setter; the history is append-only and never pruned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenDeployment {
    pub deployment_id: String,
    pub token_type: String,
    pub network: String,
    pub deployed_by: String,
    pub token_name: String,
    pub token_symbol: String,
    pub correlation_id: String,
    pub current_status: DeploymentStatus,
    pub error_message: Option<String>,
    pub transaction_hash: Option<String>,
    pub confirmed_round: Option<u64>,
    pub asset_identifier: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub status_history: Vec<DeploymentStatusEntry>,
}

/// Requested status change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionRequest {
    pub target: DeploymentStatus,
    pub message: String,
    pub metadata: StatusMetadata,
    pub transaction_hash: Option<String>,
    pub confirmed_round: Option<u64>,
}

impl TransitionRequest {
    pub fn new(target: DeploymentStatus, message: impl Into<String>) -> Self {
        Self {
            target,
            message: message.into(),
            metadata: StatusMetadata::default(),
            transaction_hash: None,
            confirmed_round: None,
        }
    }
}

/// Result of applying a [`TransitionRequest`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// State changed and one history entry was appended
    Applied {
        previous: DeploymentStatus,
        deployment: Box<TokenDeployment>,
    },
    /// Target equals the current status; nothing was written
    Unchanged { status: DeploymentStatus },
    /// Target is not reachable from the current status; nothing was written
    Rejected {
        current: DeploymentStatus,
        requested: DeploymentStatus,
    },
}

impl TransitionOutcome {
    /// Applied or idempotent no-op
    pub fn is_accepted(&self) -> bool {
        !matches!(self, TransitionOutcome::Rejected { .. })
    }
}

impl TokenDeployment {
    /// Create a deployment in `Queued` with its first history entry
    pub fn new(input: NewDeployment) -> Self {
        Self::new_at(input, Utc::now())
    }

    pub fn new_at(input: NewDeployment, now: DateTime<Utc>) -> Self {
        let deployment_id = Uuid::new_v4().to_string();
        let correlation_id = input
            .correlation_id
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        let first_entry = DeploymentStatusEntry {
            id: Uuid::new_v4().to_string(),
            deployment_id: deployment_id.clone(),
            status: DeploymentStatus::Queued,
            timestamp: now,
            message: "Deployment queued".to_string(),
            metadata: StatusMetadata::default(),
            transaction_hash: None,
            confirmed_round: None,
        };

        Self {
            deployment_id,
            token_type: input.token_type,
            network: input.network,
            deployed_by: input.deployed_by,
            token_name: input.token_name,
            token_symbol: input.token_symbol,
            correlation_id,
            current_status: DeploymentStatus::Queued,
            error_message: None,
            transaction_hash: None,
            confirmed_round: None,
            asset_identifier: None,
            created_at: now,
            updated_at: now,
            status_history: vec![first_entry],
        }
    }

    /// Validate and apply a status change.
    ///
    /// Entry timestamps never go backwards: a `now` earlier than the last
    /// entry is clamped to the last entry's timestamp.
    pub fn apply_transition(
        &mut self,
        request: TransitionRequest,
        now: DateTime<Utc>,
    ) -> TransitionOutcome {
        let current = self.current_status;

        if request.target == current {
            return TransitionOutcome::Unchanged { status: current };
        }
        if !current.can_transition_to(request.target) {
            return TransitionOutcome::Rejected {
                current,
                requested: request.target,
            };
        }

        let timestamp = match self.status_history.last() {
            Some(last) if last.timestamp > now => last.timestamp,
            _ => now,
        };

        match request.target {
            DeploymentStatus::Failed => self.error_message = Some(request.message.clone()),
            DeploymentStatus::Queued => self.error_message = None,
            _ => {}
        }
        if let Some(hash) = &request.transaction_hash {
            self.transaction_hash = Some(hash.clone());
        }
        if let Some(round) = request.confirmed_round {
            self.confirmed_round = Some(round);
        }

        self.status_history.push(DeploymentStatusEntry {
            id: Uuid::new_v4().to_string(),
            deployment_id: self.deployment_id.clone(),
            status: request.target,
            timestamp,
            message: request.message,
            metadata: request.metadata,
            transaction_hash: request.transaction_hash,
            confirmed_round: request.confirmed_round,
        });
        self.current_status = request.target;
        self.updated_at = timestamp;

        TransitionOutcome::Applied {
            previous: current,
            deployment: Box::new(self.clone()),
        }
    }

    pub fn set_asset_identifier(&mut self, identifier: impl Into<String>, now: DateTime<Utc>) {
        self.asset_identifier = Some(identifier.into());
        if now > self.updated_at {
            self.updated_at = now;
        }
    }

    pub fn first_entry_at(&self) -> Option<DateTime<Utc>> {
        self.status_history.first().map(|e| e.timestamp)
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.status_history
            .iter()
            .find(|e| e.status == DeploymentStatus::Completed)
            .map(|e| e.timestamp)
    }

    /// First entry to the `Completed` entry, if completed
    pub fn duration(&self) -> Option<Duration> {
        Some(self.completed_at()? - self.first_entry_at()?)
    }

    /// Category recorded on the most recent `Failed` entry
    pub fn last_failure_category(&self) -> Option<DeploymentErrorCategory> {
        self.status_history
            .iter()
            .rev()
            .find(|e| e.status == DeploymentStatus::Failed)
            .and_then(|e| e.metadata.error_category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_input(correlation_id: Option<&str>) -> NewDeployment {
        NewDeployment {
            token_type: "ARC3".to_string(),
            network: "testnet".to_string(),
            deployed_by: "ALGOADDR".to_string(),
            token_name: "Test Token".to_string(),
            token_symbol: "TST".to_string(),
            correlation_id: correlation_id.map(str::to_string),
        }
    }

    #[test]
    fn test_new_deployment_is_queued_with_one_entry() {
        let deployment = TokenDeployment::new(new_input(Some("corr-1")));

        assert_eq!(deployment.current_status, DeploymentStatus::Queued);
        assert_eq!(deployment.correlation_id, "corr-1");
        assert_eq!(deployment.status_history.len(), 1);
        assert_eq!(deployment.status_history[0].status, DeploymentStatus::Queued);
        assert_eq!(
            deployment.status_history[0].deployment_id,
            deployment.deployment_id
        );
    }

    #[test]
    fn test_correlation_id_generated_when_missing() {
        let a = TokenDeployment::new(new_input(None));
        let b = TokenDeployment::new(new_input(None));

        assert!(!a.correlation_id.is_empty());
        assert_ne!(a.correlation_id, b.correlation_id);
        assert_ne!(a.deployment_id, b.deployment_id);
    }

    #[test]
    fn test_same_status_is_unchanged() {
        let mut deployment = TokenDeployment::new(new_input(None));
        let outcome = deployment.apply_transition(
            TransitionRequest::new(DeploymentStatus::Queued, "again"),
            Utc::now(),
        );

        assert_eq!(
            outcome,
            TransitionOutcome::Unchanged {
                status: DeploymentStatus::Queued
            }
        );
        assert!(outcome.is_accepted());
        assert_eq!(deployment.status_history.len(), 1);
    }

    #[test]
    fn test_rejected_transition_does_not_mutate() {
        let mut deployment = TokenDeployment::new(new_input(None));
        let before = deployment.clone();

        let outcome = deployment.apply_transition(
            TransitionRequest::new(DeploymentStatus::Completed, "skip ahead"),
            Utc::now(),
        );

        assert!(!outcome.is_accepted());
        assert_eq!(deployment, before);
    }

    #[test]
    fn test_out_of_order_clock_is_clamped() {
        let start = Utc::now();
        let mut deployment = TokenDeployment::new_at(new_input(None), start);

        let earlier = start - Duration::seconds(30);
        deployment.apply_transition(
            TransitionRequest::new(DeploymentStatus::Submitted, "submitted"),
            earlier,
        );

        assert_eq!(deployment.status_history[1].timestamp, start);
        assert_eq!(deployment.updated_at, start);
    }

    #[test]
    fn test_failed_then_retry_clears_error_message() {
        let mut deployment = TokenDeployment::new(new_input(None));
        let mut failed = TransitionRequest::new(DeploymentStatus::Failed, "node unreachable");
        failed.metadata = StatusMetadata::failure(
            DeploymentErrorCategory::NetworkError,
            "NETWORK_ERROR",
            true,
        );

        deployment.apply_transition(failed, Utc::now());
        assert_eq!(deployment.error_message.as_deref(), Some("node unreachable"));
        assert_eq!(
            deployment.last_failure_category(),
            Some(DeploymentErrorCategory::NetworkError)
        );

        deployment.apply_transition(
            TransitionRequest::new(DeploymentStatus::Queued, "retry"),
            Utc::now(),
        );
        assert_eq!(deployment.current_status, DeploymentStatus::Queued);
        assert_eq!(deployment.error_message, None);
        assert_eq!(deployment.status_history.len(), 3);
    }

    #[test]
    fn test_transaction_fields_are_kept() {
        let mut deployment = TokenDeployment::new(new_input(None));
        let mut submitted = TransitionRequest::new(DeploymentStatus::Submitted, "sent");
        submitted.transaction_hash = Some("TXHASH".to_string());
        deployment.apply_transition(submitted, Utc::now());

        let mut pending = TransitionRequest::new(DeploymentStatus::Pending, "in pool");
        pending.confirmed_round = None;
        deployment.apply_transition(pending, Utc::now());

        let mut confirmed = TransitionRequest::new(DeploymentStatus::Confirmed, "confirmed");
        confirmed.confirmed_round = Some(4242);
        deployment.apply_transition(confirmed, Utc::now());

        assert_eq!(deployment.transaction_hash.as_deref(), Some("TXHASH"));
        assert_eq!(deployment.confirmed_round, Some(4242));
        assert_eq!(deployment.status_history[3].confirmed_round, Some(4242));
    }

    #[test]
    fn test_duration_requires_completion() {
        let start = Utc::now();
        let mut deployment = TokenDeployment::new_at(new_input(None), start);
        assert_eq!(deployment.duration(), None);

        for (i, status) in [
            DeploymentStatus::Submitted,
            DeploymentStatus::Pending,
            DeploymentStatus::Confirmed,
            DeploymentStatus::Completed,
        ]
        .into_iter()
        .enumerate()
        {
            deployment.apply_transition(
                TransitionRequest::new(status, status.as_str()),
                start + Duration::seconds(10 * (i as i64 + 1)),
            );
        }

        assert_eq!(deployment.duration(), Some(Duration::seconds(40)));
    }

    #[test]
    fn test_metadata_pairs_order() {
        let error = DeploymentError::network("timeout talking to algod");
        let metadata = StatusMetadata::from(&error);
        let keys: Vec<_> = metadata.pairs().into_iter().map(|(k, _)| k).collect();

        assert_eq!(
            keys,
            vec![
                "errorCategory",
                "errorCode",
                "isRetryable",
                "technicalMessage",
                "userMessage",
                "suggestedRetryDelaySeconds"
            ]
        );
        assert!(StatusMetadata::default().is_empty());
        assert!(!metadata.is_empty());
    }
}
