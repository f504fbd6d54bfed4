use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::context::{OrchestrationContext, PolicyDecision};
use crate::error::{ErrorCode, FailureCategory};

/// Orchestration stage identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OrchestrationStage {
    Validate,
    Precondition,
    Execute,
    VerifyPostCommit,
    Completed,
}

impl OrchestrationStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrchestrationStage::Validate => "Validate",
            OrchestrationStage::Precondition => "Precondition",
            OrchestrationStage::Execute => "Execute",
            OrchestrationStage::VerifyPostCommit => "VerifyPostCommit",
            OrchestrationStage::Completed => "Completed",
        }
    }
}

impl std::fmt::Display for OrchestrationStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Timestamped record that a stage was entered
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageMarker {
    pub stage: OrchestrationStage,
    pub entered_at: DateTime<Utc>,
}

impl StageMarker {
    pub fn enter(stage: OrchestrationStage) -> Self {
        Self {
            stage,
            entered_at: Utc::now(),
        }
    }
}

/// Structured failure: code, category, message and hint, never raw error text
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestrationFailure {
    pub error_code: ErrorCode,
    pub error_message: String,
    pub remediation_hint: String,
    pub failure_category: FailureCategory,
}

impl OrchestrationFailure {
    pub fn new(
        error_code: ErrorCode,
        failure_category: FailureCategory,
        error_message: impl Into<String>,
    ) -> Self {
        Self {
            error_code,
            error_message: error_message.into(),
            remediation_hint: failure_category.remediation_hint().to_string(),
            failure_category,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum OrchestrationOutcome<T> {
    Succeeded { payload: T },
    Failed(OrchestrationFailure),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditOutcome {
    Success,
    Failure,
}

/// Denormalized projection of a run for logging and compliance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditSummary {
    pub correlation_id: String,
    pub operation_type: String,
    pub initiated_by: Option<String>,
    pub outcome: AuditOutcome,
    pub completed_at_stage: String,
    pub stages_completed: usize,
    pub has_idempotency_key: bool,
    pub policy_decision_count: usize,
    pub failure_code: Option<String>,
}

/// Immutable outcome of one pipeline run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestrationResult<T> {
    pub outcome: OrchestrationOutcome<T>,
    pub correlation_id: String,
    pub idempotency_key: Option<String>,
    pub completed_at_stage: OrchestrationStage,
    pub stage_markers: Vec<StageMarker>,
    pub policy_decisions: Vec<PolicyDecision>,
    pub audit_summary: AuditSummary,
}

impl<T> OrchestrationResult<T> {
    pub(crate) fn from_run(
        ctx: OrchestrationContext,
        stage_markers: Vec<StageMarker>,
        completed_at_stage: OrchestrationStage,
        outcome: OrchestrationOutcome<T>,
    ) -> Self {
        let (audit_outcome, failure_code) = match &outcome {
            OrchestrationOutcome::Succeeded { .. } => (AuditOutcome::Success, None),
            OrchestrationOutcome::Failed(failure) => (
                AuditOutcome::Failure,
                Some(failure.error_code.as_str().to_string()),
            ),
        };

        let audit_summary = AuditSummary {
            correlation_id: ctx.correlation_id.clone(),
            operation_type: ctx.operation_type,
            initiated_by: ctx.initiated_by,
            outcome: audit_outcome,
            completed_at_stage: completed_at_stage.as_str().to_string(),
            stages_completed: stage_markers.len(),
            has_idempotency_key: ctx.idempotency_key.is_some(),
            policy_decision_count: ctx.policy_decisions.len(),
            failure_code,
        };

        Self {
            outcome,
            correlation_id: ctx.correlation_id,
            idempotency_key: ctx.idempotency_key,
            completed_at_stage,
            stage_markers,
            policy_decisions: ctx.policy_decisions,
            audit_summary,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.outcome, OrchestrationOutcome::Succeeded { .. })
    }

    pub fn payload(&self) -> Option<&T> {
        match &self.outcome {
            OrchestrationOutcome::Succeeded { payload } => Some(payload),
            OrchestrationOutcome::Failed(_) => None,
        }
    }

    pub fn into_payload(self) -> Option<T> {
        match self.outcome {
            OrchestrationOutcome::Succeeded { payload } => Some(payload),
            OrchestrationOutcome::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&OrchestrationFailure> {
        match &self.outcome {
            OrchestrationOutcome::Succeeded { .. } => None,
            OrchestrationOutcome::Failed(failure) => Some(failure),
        }
    }

    pub fn error_code(&self) -> Option<ErrorCode> {
        self.failure().map(|f| f.error_code)
    }

    pub fn error_message(&self) -> Option<&str> {
        self.failure().map(|f| f.error_message.as_str())
    }

    pub fn remediation_hint(&self) -> Option<&str> {
        self.failure().map(|f| f.remediation_hint.as_str())
    }

    pub fn failure_category(&self) -> Option<FailureCategory> {
        self.failure().map(|f| f.failure_category)
    }

    /// Stages in the order they were entered
    pub fn stages(&self) -> Vec<OrchestrationStage> {
        self.stage_markers.iter().map(|m| m.stage).collect()
    }
}
