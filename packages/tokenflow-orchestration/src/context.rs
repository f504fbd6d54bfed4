use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::result::OrchestrationStage;

/// Operation tags used across the platform's write paths
pub mod operation {
    pub const REGISTRATION: &str = "REGISTRATION";
    pub const TOKEN_DEPLOY: &str = "TOKEN_DEPLOY";
    pub const TOKEN_MINT: &str = "TOKEN_MINT";
    pub const METADATA_UPLOAD: &str = "METADATA_UPLOAD";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PolicyOutcome {
    Passed,
    Rejected,
}

/// One policy evaluation, in the order it happened
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyDecision {
    pub policy: String,
    pub stage: Option<OrchestrationStage>,
    pub outcome: PolicyOutcome,
    pub reason: Option<String>,
    pub decided_at: DateTime<Utc>,
}

impl PolicyDecision {
    pub fn passed(policy: impl Into<String>) -> Self {
        Self {
            policy: policy.into(),
            stage: None,
            outcome: PolicyOutcome::Passed,
            reason: None,
            decided_at: Utc::now(),
        }
    }

    pub fn rejected(policy: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            policy: policy.into(),
            stage: None,
            outcome: PolicyOutcome::Rejected,
            reason: Some(reason.into()),
            decided_at: Utc::now(),
        }
    }

    pub fn at_stage(mut self, stage: OrchestrationStage) -> Self {
        self.stage = Some(stage);
        self
    }
}

/// Per-call orchestration context.
///
/// Owned by exactly one pipeline run. The correlation id is carried verbatim:
/// it is never validated, trimmed or truncated, whatever it contains.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestrationContext {
    pub operation_type: String,
    pub correlation_id: String,
    /// `None` is a normal state, not an error
    pub idempotency_key: Option<String>,
    pub initiated_by: Option<String>,
    pub metadata: HashMap<String, String>,
    pub policy_decisions: Vec<PolicyDecision>,
}

impl OrchestrationContext {
    pub fn new(operation_type: impl Into<String>, correlation_id: impl Into<String>) -> Self {
        Self {
            operation_type: operation_type.into(),
            correlation_id: correlation_id.into(),
            idempotency_key: None,
            initiated_by: None,
            metadata: HashMap::new(),
            policy_decisions: Vec::new(),
        }
    }

    /// Context with a fresh system-generated correlation id
    pub fn generated(operation_type: impl Into<String>) -> Self {
        Self::new(operation_type, Uuid::new_v4().to_string())
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    pub fn with_initiator(mut self, initiated_by: impl Into<String>) -> Self {
        self.initiated_by = Some(initiated_by.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn record_decision(&mut self, decision: PolicyDecision) {
        self.policy_decisions.push(decision);
    }
}
