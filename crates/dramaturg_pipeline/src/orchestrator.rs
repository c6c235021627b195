//! Pipeline orchestration.

use crate::{
    Auditor, Discoverer, DramaturgConfig, MetricsSnapshot, Modifier, PipelineStage, PipelineState,
    StageActor, StageContext, StageRun, StageSettings, advance,
};
use dramaturg_core::{AuditorOutput, DiscovererOutput, ModifierOutput, Script, Stage};
use dramaturg_error::{DramaturgResult, StageError, StageErrorKind};
use dramaturg_interface::{DramaturgDriver, PromptLibrary};
use dramaturg_models::create_driver;
use std::sync::Arc;
use std::time::Duration;
use strum::IntoEnumIterator;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument};

/// Label used for failures detected before any stage runs.
pub const INPUT_STAGE: &str = "input";

/// Outcome of a pipeline run.
///
/// A failed run keeps every stage output produced before the failure.
#[derive(Debug, Clone)]
pub struct PipelineResult {
    /// Final state
    pub state: PipelineState,
    /// Metrics for this run
    pub metrics: MetricsSnapshot,
    /// The error that halted the run, if any
    pub failure: Option<StageError>,
}

impl PipelineResult {
    /// Whether all three stages completed.
    pub fn is_success(&self) -> bool {
        self.failure.is_none()
            && self.state.current_stage == PipelineStage::Completed
            && self.state.is_complete()
    }
}

/// Outcome of running one stage on its own.
#[derive(Debug, Clone, PartialEq)]
pub struct StageResult<T> {
    /// Output, attempts, warnings and trace of the stage
    pub run: StageRun<T>,
    /// Model calls made by this stage alone
    pub metrics: MetricsSnapshot,
}

/// Runs the three stages in order against one driver.
///
/// The pipeline itself holds no per-run state, so one value can serve many
/// concurrent runs; each run gets its own state and metrics collector.
#[derive(Clone)]
pub struct Pipeline {
    driver: Arc<dyn DramaturgDriver>,
    prompts: Arc<dyn PromptLibrary>,
    settings: StageSettings,
}

impl Pipeline {
    /// Pipeline over an existing driver and prompt source.
    pub fn new(
        driver: Arc<dyn DramaturgDriver>,
        prompts: Arc<dyn PromptLibrary>,
        settings: StageSettings,
    ) -> Self {
        Self {
            driver,
            prompts,
            settings,
        }
    }

    /// Pipeline built from configuration, reading the API key from the environment.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver or prompt library cannot be created.
    pub fn from_config(config: &DramaturgConfig) -> DramaturgResult<Self> {
        let driver = create_driver(
            *config.llm.provider(),
            config.llm.model().as_deref(),
            Duration::from_secs(*config.llm.request_timeout_secs()),
        )?;
        let prompts = config.prompt_library()?;
        Ok(Self::new(driver, prompts, config.stage_settings()))
    }

    /// Stage settings in use.
    pub fn settings(&self) -> &StageSettings {
        &self.settings
    }

    fn context(&self, cancel: CancellationToken) -> StageContext {
        StageContext::new(
            Arc::clone(&self.driver),
            Arc::clone(&self.prompts),
            self.settings.clone(),
        )
        .with_cancel(cancel)
    }

    /// Runs all three stages.
    pub async fn run(&self, script: Script) -> PipelineResult {
        self.run_with_cancel(script, CancellationToken::new()).await
    }

    /// Runs all three stages, stopping early when `cancel` fires.
    ///
    /// An invalid script fails before any model call. Cancellation is checked
    /// between stages and interrupts retries in progress.
    #[instrument(skip_all, fields(scenes = script.len(), provider = self.driver.provider_name()))]
    pub async fn run_with_cancel(&self, script: Script, cancel: CancellationToken) -> PipelineResult {
        let ctx = self.context(cancel.clone());
        let mut state = PipelineState::new(script);
        info!(run_id = %state.run_id, "Pipeline started");

        if let Err(e) = state.script.validate() {
            let failure = StageError::new(INPUT_STAGE, 0, StageErrorKind::InvalidScript(e.kind));
            return finish(state, &ctx, Some(failure));
        }

        for stage in Stage::iter() {
            if cancel.is_cancelled() {
                let failure = StageError::new(stage.to_string(), 0, StageErrorKind::Cancelled);
                return finish(state, &ctx, Some(failure));
            }
            let result = match stage {
                Stage::Discoverer => advance(&Discoverer, &mut state, &ctx).await,
                Stage::Auditor => advance(&Auditor, &mut state, &ctx).await,
                Stage::Modifier => advance(&Modifier, &mut state, &ctx).await,
            };
            if let Err(failure) = result {
                return finish(state, &ctx, Some(failure));
            }
        }

        state.transition_to(PipelineStage::Completed);
        finish(state, &ctx, None)
    }

    /// Runs only the discoverer.
    ///
    /// Single-stage runs report their own attempts, warnings and metrics.
    ///
    /// # Errors
    ///
    /// Returns an error if the script is invalid or the stage fails.
    pub async fn discover(
        &self,
        script: &Script,
    ) -> Result<StageResult<DiscovererOutput>, StageError> {
        let state = checked_state(script)?;
        self.run_single(&Discoverer, state).await
    }

    /// Runs only the auditor over a discoverer output.
    ///
    /// # Errors
    ///
    /// Returns an error if the script is invalid or the stage fails.
    pub async fn audit(
        &self,
        script: &Script,
        discovered: &DiscovererOutput,
    ) -> Result<StageResult<AuditorOutput>, StageError> {
        let mut state = checked_state(script)?;
        state.discoverer_output = Some(discovered.clone());
        self.run_single(&Auditor, state).await
    }

    /// Runs only the modifier over an auditor output.
    ///
    /// # Errors
    ///
    /// Returns an error if the script is invalid or the stage fails.
    pub async fn modify(
        &self,
        script: &Script,
        audited: &AuditorOutput,
    ) -> Result<StageResult<ModifierOutput>, StageError> {
        let mut state = checked_state(script)?;
        state.auditor_output = Some(audited.clone());
        self.run_single(&Modifier, state).await
    }

    async fn run_single<A: StageActor>(
        &self,
        actor: &A,
        state: PipelineState,
    ) -> Result<StageResult<A::Output>, StageError> {
        let ctx = self.context(CancellationToken::new());
        actor.check_ready(&state)?;
        let run = actor.run(&state, &ctx).await?;
        Ok(StageResult {
            run,
            metrics: ctx.metrics().snapshot(),
        })
    }
}

fn checked_state(script: &Script) -> Result<PipelineState, StageError> {
    script
        .validate()
        .map_err(|e| StageError::new(INPUT_STAGE, 0, StageErrorKind::InvalidScript(e.kind)))?;
    Ok(PipelineState::new(script.clone()))
}

fn finish(
    mut state: PipelineState,
    ctx: &StageContext,
    failure: Option<StageError>,
) -> PipelineResult {
    let metrics = ctx.metrics().snapshot();
    match &failure {
        Some(e) => {
            // Stage failures were already recorded by `advance`.
            if state.current_stage != PipelineStage::Failed {
                state.errors.push(format!("{}: {}", e.stage, e.kind));
                state.transition_to(PipelineStage::Failed);
            }
            error!(
                run_id = %state.run_id,
                stage = %e.stage,
                attempts = e.attempts,
                error = %e.kind,
                "Pipeline failed"
            );
        }
        None => info!(
            run_id = %state.run_id,
            duration_secs = metrics.total_duration_secs,
            llm_calls = metrics.total_calls(),
            retries = metrics.total_retries(),
            tokens = metrics.total_tokens(),
            "Pipeline completed"
        ),
    }
    PipelineResult {
        state,
        metrics,
        failure,
    }
}
