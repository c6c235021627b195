//! Stage 1: conflict chain discovery.

use super::{StageActor, StageContext, StageRun, call_with_retry, parse_error, to_payload};
use crate::PipelineState;
use async_trait::async_trait;
use dramaturg_core::{
    DiscovererOutput, Script, Stage, merge_mirror_tccs, validate_tcc_independence,
};
use dramaturg_error::{AttemptErrorKind, StageError};
use serde::Serialize;
use tracing::{info, instrument, warn};

/// Finds the script's independent conflict chains.
#[derive(Debug, Clone, Copy, Default)]
pub struct Discoverer;

#[derive(Serialize)]
struct DiscovererPayload<'a> {
    script: &'a Script,
    fallback_mode: bool,
}

impl Discoverer {
    /// Whether too few scenes carry setup/payoff data to use it as evidence.
    pub fn fallback_mode(script: &Script, threshold: f64) -> bool {
        !script.is_empty() && script.missing_setup_payoff_ratio() >= threshold
    }

    /// Parses and validates one reply.
    ///
    /// An empty chain list explained by `metadata.error` is the model saying
    /// it found nothing; that is reported as a rejection, not retried.
    pub fn parse(
        json: &str,
        script: &Script,
        fallback_mode: bool,
    ) -> Result<DiscovererOutput, AttemptErrorKind> {
        let mut output: DiscovererOutput = serde_json::from_str(json).map_err(parse_error)?;
        if output.tccs.is_empty() {
            if let Some(reason) = output.metadata.error.as_ref() {
                return Err(AttemptErrorKind::Rejected(reason.clone()));
            }
        }
        output
            .validate(script)
            .map_err(|e| AttemptErrorKind::Schema(e.kind))?;

        let ratio = script.missing_setup_payoff_ratio();
        output.metadata.total_scenes_analyzed = script.len();
        output.metadata.fallback_mode = fallback_mode;
        output.metadata.primary_evidence_available = !fallback_mode;
        if fallback_mode && output.metadata.fallback_reason.is_none() {
            output.metadata.fallback_reason = Some(format!(
                "{:.0}% of scenes lack setup_payoff data",
                ratio * 100.0
            ));
        }
        Ok(output)
    }
}

#[async_trait]
impl StageActor for Discoverer {
    type Output = DiscovererOutput;

    fn stage(&self) -> Stage {
        Stage::Discoverer
    }

    #[instrument(skip_all, fields(scenes = state.script.len()))]
    async fn run(
        &self,
        state: &PipelineState,
        ctx: &StageContext,
    ) -> Result<StageRun<DiscovererOutput>, StageError> {
        let script = &state.script;
        let thresholds = ctx.settings().thresholds();
        let fallback_mode = Self::fallback_mode(script, *thresholds.fallback_missing_ratio());
        if fallback_mode {
            warn!(
                missing_ratio = script.missing_setup_payoff_ratio(),
                "Most scenes lack setup/payoff data, using fallback mode"
            );
        }

        let payload = to_payload(
            Stage::Discoverer,
            "Analyze this script:",
            &DiscovererPayload {
                script,
                fallback_mode,
            },
        )?;
        let exchange = call_with_retry(ctx, Stage::Discoverer, &payload, |json| {
            Self::parse(json, script, fallback_mode)
        })
        .await?;

        let mut output = exchange.value;
        let (tccs, mut warnings) =
            merge_mirror_tccs(std::mem::take(&mut output.tccs), *thresholds.mirror_merge());
        output.tccs = tccs;
        warnings.extend(validate_tcc_independence(
            &output.tccs,
            *thresholds.mirror_overlap(),
        ));
        for warning in &warnings {
            warn!(warning = %warning, "Conflict chain independence");
        }

        info!(
            tccs = output.tccs.len(),
            mean_confidence = output.mean_confidence(),
            fallback_mode,
            "Discovered conflict chains"
        );
        Ok(StageRun {
            output,
            attempts: exchange.attempts,
            warnings,
            trace: exchange.trace,
        })
    }

    fn store(&self, state: &mut PipelineState, output: DiscovererOutput) {
        state.discoverer_output = Some(output);
    }
}
