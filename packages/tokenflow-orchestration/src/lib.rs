/*
 * Tokenflow Orchestration - Write-Path Orchestration and Deployment Lifecycle
 *
 * Shared execution contract for the platform's write operations
 * (registration, token deployment, minting, metadata upload).
 *
 * Architecture:
 * - Orchestration Pipeline (Validate -> Precondition -> Execute -> Verify -> Completed)
 * - Error Taxonomy (fixed codes, six failure categories, stable hints)
 * - Deployment Status Service (state machine over the deployment store)
 * - Audit Export (JSON/CSV) and Enterprise Audit Aggregation
 * - Webhook notification (best-effort)
 */

// Public modules
pub mod audit;
pub mod compliance;
pub mod config;
pub mod context;
pub mod deployment;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod result;
pub mod webhook;

// Re-exports
pub use audit::{csv_escape, DeploymentAuditService, DeploymentAuditTrail};
pub use compliance::{
    AggregatedAuditLog, AuditLogProducer, AuditQuery, AuditSource, ComplianceAuditEntry,
    DeploymentAuditProducer, EnterpriseAuditAggregator, OrchestrationAuditLog, RetentionPolicy,
};
pub use config::{
    AuditConfig, ConfigError, DeploymentConfig, LoggingConfig, PlatformConfig,
    MIN_RETENTION_YEARS,
};
pub use context::{operation, OrchestrationContext, PolicyDecision, PolicyOutcome};
pub use deployment::{
    DeploymentMetrics, DeploymentPage, DeploymentQuery, DeploymentStatusService, MetricsFilter,
    StatusUpdate,
};
pub use error::{ErrorCode, ExecutionFailure, FailureCategory, OrchestratorError, Result};
pub use pipeline::{
    executor_fn, named_policy, verifier_fn, Executor, NamedPolicy, OrchestrationPipeline,
    PostCommitVerifier, RequestPolicy,
};
pub use result::{
    AuditOutcome, AuditSummary, OrchestrationFailure, OrchestrationOutcome, OrchestrationResult,
    OrchestrationStage, StageMarker,
};
pub use webhook::{LoggingNotifier, WebhookEvent, WebhookEventType, WebhookNotifier};
