//! Stage actors.
//!
//! Each actor turns the pipeline state into one more stage output. The
//! shared machinery here builds the request, bounds the model call with a
//! timeout, sanitizes and parses the reply, records metrics and retries
//! through the [`RetryPolicy`]. Actors only supply the payload and the
//! stage-specific parse-and-validate step.

mod auditor;
mod discoverer;
mod modifier;

pub use auditor::Auditor;
pub use discoverer::Discoverer;
pub use modifier::Modifier;

use crate::{
    Attempt, MetricsCollector, PipelineStage, PipelineState, RetryPolicy, TraceEntry, sanitize,
};
use async_trait::async_trait;
use derive_getters::Getters;
use dramaturg_core::{GenerateRequest, Message, Role, Stage, Thresholds};
use dramaturg_error::{
    AttemptError, AttemptErrorKind, DramaturgError, DramaturgErrorKind, ProviderErrorKind,
    StageError, StageErrorKind,
};
use dramaturg_interface::{DramaturgDriver, PromptLibrary};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument};

/// Request and retry settings shared by the three stages.
#[derive(Debug, Clone, PartialEq, Getters)]
pub struct StageSettings {
    retry: RetryPolicy,
    request_timeout: Duration,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    model: Option<String>,
    thresholds: Thresholds,
}

impl Default for StageSettings {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            request_timeout: Duration::from_secs(120),
            temperature: Some(0.0),
            max_tokens: Some(4096),
            model: None,
            thresholds: Thresholds::default(),
        }
    }
}

impl StageSettings {
    /// Replaces the retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Replaces the per-call timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Replaces the sampling temperature.
    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    /// Replaces the completion token limit.
    pub fn with_max_tokens(mut self, max_tokens: Option<u32>) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Replaces the model override.
    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    /// Replaces the heuristic thresholds.
    pub fn with_thresholds(mut self, thresholds: Thresholds) -> Self {
        self.thresholds = thresholds;
        self
    }
}

/// Everything a stage needs besides the state itself.
///
/// One context belongs to one run; its collector is never shared.
#[derive(Clone, Getters)]
pub struct StageContext {
    driver: Arc<dyn DramaturgDriver>,
    prompts: Arc<dyn PromptLibrary>,
    metrics: Arc<MetricsCollector>,
    settings: StageSettings,
    cancel: CancellationToken,
}

impl StageContext {
    /// Context with a fresh collector and cancellation token.
    pub fn new(
        driver: Arc<dyn DramaturgDriver>,
        prompts: Arc<dyn PromptLibrary>,
        settings: StageSettings,
    ) -> Self {
        Self {
            driver,
            prompts,
            metrics: Arc::new(MetricsCollector::new()),
            settings,
            cancel: CancellationToken::new(),
        }
    }

    /// Uses an external cancellation token.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

/// A stage's validated output plus what it learned along the way.
#[derive(Debug, Clone, PartialEq)]
pub struct StageRun<T> {
    /// Validated output
    pub output: T,
    /// Model calls made, zero when the stage short-circuits
    pub attempts: usize,
    /// Heuristic warnings and correction notes
    pub warnings: Vec<String>,
    /// The successful exchange with the model
    pub trace: Vec<TraceEntry>,
}

/// One model-calling stage of the pipeline.
#[async_trait]
pub trait StageActor: Send + Sync {
    /// Validated stage output
    type Output: Send;

    /// Which stage this actor implements.
    fn stage(&self) -> Stage;

    /// Fails fast when required upstream output is missing.
    fn check_ready(&self, state: &PipelineState) -> Result<(), StageError> {
        match self.stage().upstream() {
            Some(upstream) if !state.has_output(upstream) => Err(StageError::new(
                self.stage().to_string(),
                0,
                StageErrorKind::MissingUpstream(upstream.to_string()),
            )),
            _ => Ok(()),
        }
    }

    /// Produces the stage output without touching the state.
    async fn run(
        &self,
        state: &PipelineState,
        ctx: &StageContext,
    ) -> Result<StageRun<Self::Output>, StageError>;

    /// Stores the output in the state.
    fn store(&self, state: &mut PipelineState, output: Self::Output);
}

/// Runs one actor against the state, recording its output or its failure.
///
/// On failure the state moves to [`PipelineStage::Failed`] and keeps every
/// output produced so far.
///
/// # Errors
///
/// Returns the stage-fatal error after recording it in the state.
#[instrument(skip_all, fields(stage = %actor.stage(), run_id = %state.run_id))]
pub async fn advance<A: StageActor>(
    actor: &A,
    state: &mut PipelineState,
    ctx: &StageContext,
) -> Result<(), StageError> {
    let stage = actor.stage();
    state.transition_to(PipelineStage::running(stage));

    let result = match actor.check_ready(state) {
        Ok(()) => {
            info!("Stage started");
            actor.run(state, ctx).await
        }
        Err(e) => Err(e),
    };

    match result {
        Ok(run) => {
            state
                .retry_counts
                .insert(stage, run.attempts.saturating_sub(1));
            state.warnings.extend(run.warnings);
            state.trace.extend(run.trace);
            actor.store(state, run.output);
            info!(attempts = run.attempts, "Stage complete");
            Ok(())
        }
        Err(e) => {
            state.retry_counts.insert(stage, e.attempts);
            error!(attempts = e.attempts, error = %e.kind, "Stage failed");
            state.errors.push(format!(
                "{} failed after {} attempts: {}",
                e.stage, e.attempts, e.kind
            ));
            state.transition_to(PipelineStage::Failed);
            Err(e)
        }
    }
}

/// Result of one successful model exchange.
pub(crate) struct Exchange<T> {
    pub value: T,
    pub attempts: usize,
    pub trace: Vec<TraceEntry>,
}

/// Calls the model until `parse` accepts a reply or the retry budget runs out.
pub(crate) async fn call_with_retry<T, F>(
    ctx: &StageContext,
    stage: Stage,
    payload: &str,
    parse: F,
) -> Result<Exchange<T>, StageError>
where
    F: Fn(&str) -> Result<T, AttemptErrorKind>,
{
    let parse = &parse;
    let stage_name = stage.to_string();
    let outcome = ctx
        .settings
        .retry
        .run(&stage_name, &ctx.cancel, move |attempt| {
            attempt_once(ctx, stage, payload, attempt, parse)
        })
        .await?;

    let (value, user, response) = outcome.value;
    let trace = vec![
        TraceEntry {
            stage,
            role: Role::System,
            content: ctx.prompts.prompt(stage).to_string(),
        },
        TraceEntry {
            stage,
            role: Role::User,
            content: user,
        },
        TraceEntry {
            stage,
            role: Role::Assistant,
            content: response,
        },
    ];
    Ok(Exchange {
        value,
        attempts: outcome.attempts,
        trace,
    })
}

#[instrument(skip_all, fields(stage = %stage, attempt = attempt.number))]
async fn attempt_once<T, F>(
    ctx: &StageContext,
    stage: Stage,
    payload: &str,
    attempt: Attempt,
    parse: &F,
) -> Result<(T, String, String), AttemptError>
where
    F: Fn(&str) -> Result<T, AttemptErrorKind>,
{
    let user = match &attempt.previous_error {
        Some(reason) => format!(
            "{}\n\nYour previous response was rejected: {}\nReturn only the corrected JSON object.",
            payload, reason
        ),
        None => payload.to_string(),
    };
    let request = GenerateRequest {
        messages: vec![
            Message::system(ctx.prompts.prompt(stage)),
            Message::user(user.clone()),
        ],
        max_tokens: ctx.settings.max_tokens,
        temperature: ctx.settings.temperature,
        model: ctx.settings.model.clone(),
    };

    let started = Instant::now();
    let timeout = ctx.settings.request_timeout;
    let response = match tokio::time::timeout(timeout, ctx.driver.generate(&request)).await {
        Ok(Ok(response)) => response,
        Ok(Err(e)) => {
            ctx.metrics
                .record_attempt(stage, started.elapsed(), None, false);
            return Err(AttemptError::new(AttemptErrorKind::Provider(provider_kind(
                &e,
            ))));
        }
        Err(_) => {
            ctx.metrics
                .record_attempt(stage, started.elapsed(), None, false);
            return Err(AttemptError::new(AttemptErrorKind::Timeout(
                timeout.as_secs(),
            )));
        }
    };

    let tokens = response.usage.map(|u| u.total_tokens);
    let parsed = sanitize(&response.text)
        .map_err(|e| AttemptErrorKind::Sanitize(e.kind))
        .and_then(|json| parse(&json));

    match parsed {
        Ok(value) => {
            ctx.metrics
                .record_attempt(stage, started.elapsed(), tokens, true);
            Ok((value, user, response.text))
        }
        Err(kind) => {
            ctx.metrics
                .record_attempt(stage, started.elapsed(), tokens, false);
            if !matches!(kind, AttemptErrorKind::Rejected(_)) {
                ctx.metrics.record_validation_error(stage);
            }
            Err(AttemptError::new(kind))
        }
    }
}

fn provider_kind(err: &DramaturgError) -> ProviderErrorKind {
    match err.kind() {
        DramaturgErrorKind::Provider(e) => e.kind.clone(),
        other => ProviderErrorKind::InvalidResponse(other.to_string()),
    }
}

/// Serializes a stage payload, mapping failure to a stage error.
pub(crate) fn to_payload<T: serde::Serialize>(
    stage: Stage,
    heading: &str,
    value: &T,
) -> Result<String, StageError> {
    serde_json::to_string_pretty(value)
        .map(|json| format!("{}\n\n{}", heading, json))
        .map_err(|e| {
            StageError::new(
                stage.to_string(),
                0,
                StageErrorKind::Permanent(AttemptErrorKind::Parse(e.to_string())),
            )
        })
}

/// Maps a JSON error to an attempt error.
pub(crate) fn parse_error(err: serde_json::Error) -> AttemptErrorKind {
    AttemptErrorKind::Parse(err.to_string())
}
