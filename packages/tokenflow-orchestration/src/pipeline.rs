//! Orchestration pipeline
//!
//! Runs one write operation through
//! `Validate -> Precondition -> Execute -> [VerifyPostCommit] -> Completed`,
//! fail-fast, one `StageMarker` per stage entered.
//!
//! The pipeline holds no state between calls; a single instance can be shared
//! by any number of concurrent runs.

use async_trait::async_trait;
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Instant;
use tracing::{info, warn};

use crate::context::{OrchestrationContext, PolicyDecision};
use crate::error::{ErrorCode, ExecutionFailure, FailureCategory};
use crate::result::{
    OrchestrationFailure, OrchestrationOutcome, OrchestrationResult, OrchestrationStage,
    StageMarker,
};

// ═══════════════════════════════════════════════════════════════════════════
// Stage seams
// ═══════════════════════════════════════════════════════════════════════════

/// Synchronous request check. `Some(message)` rejects the request.
pub trait RequestPolicy<R>: Send + Sync {
    fn evaluate(&self, request: &R) -> Option<String>;

    /// Name recorded in the policy decision; defaults to the stage's name
    fn name(&self) -> Option<&str> {
        None
    }
}

impl<R, F> RequestPolicy<R> for F
where
    F: Fn(&R) -> Option<String> + Send + Sync,
{
    fn evaluate(&self, request: &R) -> Option<String> {
        self(request)
    }
}

/// Policy with an explicit name for the audit trail
pub struct NamedPolicy<F> {
    name: String,
    policy: F,
}

pub fn named_policy<F>(name: impl Into<String>, policy: F) -> NamedPolicy<F> {
    NamedPolicy {
        name: name.into(),
        policy,
    }
}

impl<R, F> RequestPolicy<R> for NamedPolicy<F>
where
    F: Fn(&R) -> Option<String> + Send + Sync,
{
    fn evaluate(&self, request: &R) -> Option<String> {
        (self.policy)(request)
    }

    fn name(&self) -> Option<&str> {
        Some(&self.name)
    }
}

/// Performs the operation. Failures are reported as `ExecutionFailure`.
#[async_trait]
pub trait Executor<R: Sync, T>: Send + Sync {
    async fn execute(&self, request: &R) -> Result<T, ExecutionFailure>;
}

/// Confirms a committed payload is durable/observable.
/// `Ok(Some(message))` means verification failed.
#[async_trait]
pub trait PostCommitVerifier<T: Sync>: Send + Sync {
    async fn verify(&self, payload: &T) -> Result<Option<String>, ExecutionFailure>;
}

/// Adapter for async closures taking the request by value
pub struct FnExecutor<F>(F);

pub fn executor_fn<F>(f: F) -> FnExecutor<F> {
    FnExecutor(f)
}

#[async_trait]
impl<R, T, F, Fut> Executor<R, T> for FnExecutor<F>
where
    R: Clone + Send + Sync + 'static,
    T: Send + 'static,
    F: Fn(R) -> Fut + Send + Sync,
    Fut: Future<Output = Result<T, ExecutionFailure>> + Send + 'static,
{
    async fn execute(&self, request: &R) -> Result<T, ExecutionFailure> {
        (self.0)(request.clone()).await
    }
}

/// Adapter for async closures taking the payload by value
pub struct FnVerifier<F>(F);

pub fn verifier_fn<F>(f: F) -> FnVerifier<F> {
    FnVerifier(f)
}

#[async_trait]
impl<T, F, Fut> PostCommitVerifier<T> for FnVerifier<F>
where
    T: Clone + Send + Sync + 'static,
    F: Fn(T) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Option<String>, ExecutionFailure>> + Send + 'static,
{
    async fn verify(&self, payload: &T) -> Result<Option<String>, ExecutionFailure> {
        (self.0)(payload.clone()).await
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Pipeline
// ═══════════════════════════════════════════════════════════════════════════

/// Stateless stage runner
#[derive(Debug, Clone, Copy, Default)]
pub struct OrchestrationPipeline;

impl OrchestrationPipeline {
    pub fn new() -> Self {
        Self
    }

    /// Run one operation through the stages.
    ///
    /// Never returns an error and never panics on behalf of the executor or
    /// verifier: every failure comes back as a classified
    /// `OrchestrationResult`. Identical inputs produce identical error code,
    /// category and hint regardless of correlation id.
    pub async fn execute<R, T, V, P, E>(
        &self,
        mut ctx: OrchestrationContext,
        request: R,
        validation: V,
        precondition: P,
        executor: E,
        verifier: Option<&dyn PostCommitVerifier<T>>,
    ) -> OrchestrationResult<T>
    where
        R: Send + Sync,
        T: Send + Sync,
        V: RequestPolicy<R>,
        P: RequestPolicy<R>,
        E: Executor<R, T>,
    {
        let started = Instant::now();
        let mut markers = Vec::with_capacity(5);

        // Stage 1: validate
        markers.push(StageMarker::enter(OrchestrationStage::Validate));
        if let Err(failure) = Self::run_policy(
            &mut ctx,
            &validation,
            &request,
            OrchestrationStage::Validate,
            ErrorCode::InvalidRequest,
            FailureCategory::ValidationFailure,
        ) {
            return Self::finish_failed(ctx, markers, OrchestrationStage::Validate, failure, started);
        }

        // Stage 2: preconditions
        markers.push(StageMarker::enter(OrchestrationStage::Precondition));
        if let Err(failure) = Self::run_policy(
            &mut ctx,
            &precondition,
            &request,
            OrchestrationStage::Precondition,
            ErrorCode::PreconditionFailed,
            FailureCategory::PreconditionFailure,
        ) {
            return Self::finish_failed(
                ctx,
                markers,
                OrchestrationStage::Precondition,
                failure,
                started,
            );
        }

        // Stage 3: execute
        markers.push(StageMarker::enter(OrchestrationStage::Execute));
        let payload = match AssertUnwindSafe(executor.execute(&request))
            .catch_unwind()
            .await
        {
            Ok(Ok(payload)) => payload,
            Ok(Err(error)) => {
                let (code, category) = error.classify();
                warn!(
                    correlation_id = ?ctx.correlation_id,
                    operation = %ctx.operation_type,
                    error_code = %code,
                    error = %error,
                    "Executor failed"
                );
                let failure = OrchestrationFailure::new(code, category, code.public_message());
                return Self::finish_failed(ctx, markers, OrchestrationStage::Execute, failure, started);
            }
            Err(panic) => {
                warn!(
                    correlation_id = ?ctx.correlation_id,
                    operation = %ctx.operation_type,
                    panic = %panic_message(&*panic),
                    "Executor panicked"
                );
                let failure = internal_failure();
                return Self::finish_failed(ctx, markers, OrchestrationStage::Execute, failure, started);
            }
        };

        // Stage 4: post-commit verification (optional)
        if let Some(verifier) = verifier {
            markers.push(StageMarker::enter(OrchestrationStage::VerifyPostCommit));
            let code = ErrorCode::PostCommitVerificationFailed;
            let rejection = match AssertUnwindSafe(verifier.verify(&payload))
                .catch_unwind()
                .await
            {
                Ok(Ok(None)) => None,
                Ok(Ok(Some(reason))) => Some(reason),
                Ok(Err(error)) => {
                    warn!(
                        correlation_id = ?ctx.correlation_id,
                        operation = %ctx.operation_type,
                        error = %error,
                        "Post-commit verifier failed"
                    );
                    Some(code.public_message().to_string())
                }
                Err(panic) => {
                    warn!(
                        correlation_id = ?ctx.correlation_id,
                        operation = %ctx.operation_type,
                        panic = %panic_message(&*panic),
                        "Post-commit verifier panicked"
                    );
                    Some(code.public_message().to_string())
                }
            };

            if let Some(message) = rejection {
                let failure = OrchestrationFailure::new(
                    code,
                    FailureCategory::PostCommitVerificationFailure,
                    message,
                );
                return Self::finish_failed(
                    ctx,
                    markers,
                    OrchestrationStage::VerifyPostCommit,
                    failure,
                    started,
                );
            }
        }

        // Stage 5: completed
        markers.push(StageMarker::enter(OrchestrationStage::Completed));
        let result = OrchestrationResult::from_run(
            ctx,
            markers,
            OrchestrationStage::Completed,
            OrchestrationOutcome::Succeeded { payload },
        );

        info!(
            correlation_id = ?result.correlation_id,
            operation = %result.audit_summary.operation_type,
            stages = result.audit_summary.stages_completed,
            has_idempotency_key = result.audit_summary.has_idempotency_key,
            duration_ms = started.elapsed().as_millis() as u64,
            "Orchestration completed"
        );
        result
    }

    /// Evaluate a policy, append its decision, map a rejection to a failure
    fn run_policy<R, Pol>(
        ctx: &mut OrchestrationContext,
        policy: &Pol,
        request: &R,
        stage: OrchestrationStage,
        code: ErrorCode,
        category: FailureCategory,
    ) -> Result<(), OrchestrationFailure>
    where
        Pol: RequestPolicy<R>,
    {
        let name = policy
            .name()
            .map(str::to_string)
            .unwrap_or_else(|| stage.as_str().to_lowercase());

        let verdict = match std::panic::catch_unwind(AssertUnwindSafe(|| policy.evaluate(request)))
        {
            Ok(verdict) => verdict,
            Err(panic) => {
                warn!(
                    correlation_id = ?ctx.correlation_id,
                    policy = %name,
                    panic = %panic_message(&*panic),
                    "Policy panicked"
                );
                let reason = ErrorCode::InternalServerError.public_message();
                ctx.record_decision(PolicyDecision::rejected(name, reason).at_stage(stage));
                return Err(internal_failure());
            }
        };

        match verdict {
            None => {
                ctx.record_decision(PolicyDecision::passed(name).at_stage(stage));
                Ok(())
            }
            Some(reason) => {
                ctx.record_decision(PolicyDecision::rejected(name, reason.clone()).at_stage(stage));
                Err(OrchestrationFailure::new(code, category, reason))
            }
        }
    }

    fn finish_failed<T>(
        ctx: OrchestrationContext,
        markers: Vec<StageMarker>,
        stage: OrchestrationStage,
        failure: OrchestrationFailure,
        started: Instant,
    ) -> OrchestrationResult<T> {
        let result =
            OrchestrationResult::from_run(ctx, markers, stage, OrchestrationOutcome::Failed(failure));

        warn!(
            correlation_id = ?result.correlation_id,
            operation = %result.audit_summary.operation_type,
            stage = %stage,
            error_code = ?result.audit_summary.failure_code,
            category = ?result.failure_category(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Orchestration failed"
        );
        result
    }
}

fn internal_failure() -> OrchestrationFailure {
    let code = ErrorCode::InternalServerError;
    OrchestrationFailure::new(
        code,
        FailureCategory::TerminalExecutionFailure,
        code.public_message(),
    )
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
