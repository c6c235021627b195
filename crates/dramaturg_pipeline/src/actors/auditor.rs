//! Stage 2: A/B/C-line ranking.

use super::{StageActor, StageContext, StageRun, call_with_retry, parse_error, to_payload};
use crate::PipelineState;
use async_trait::async_trait;
use dramaturg_core::{
    AuditorMetrics, AuditorOutput, DiscovererOutput, RawAuditorResponse, Script, Stage, Tcc,
};
use dramaturg_error::{AttemptErrorKind, StageError, StageErrorKind};
use serde::Serialize;
use tracing::{info, instrument};

/// Ranks discovered chains into one A-line, B-lines and C-lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct Auditor;

#[derive(Serialize)]
struct AuditorPayload<'a> {
    script: &'a Script,
    tccs: &'a [Tcc],
}

impl Auditor {
    /// Parses one reply and applies the ranking rules.
    ///
    /// Returns the output and a note for every correction made to the
    /// model's ranking.
    pub fn parse(
        json: &str,
        discovered: &DiscovererOutput,
        script: &Script,
        b_line_threshold: f64,
    ) -> Result<(AuditorOutput, Vec<String>), AttemptErrorKind> {
        let raw: RawAuditorResponse = serde_json::from_str(json).map_err(parse_error)?;
        let (rankings, notes) = raw
            .rankings
            .resolve(discovered, script, b_line_threshold)
            .map_err(|e| AttemptErrorKind::Schema(e.kind))?;
        let metrics = AuditorMetrics::compute(&rankings, discovered, script);
        Ok((AuditorOutput { rankings, metrics }, notes))
    }
}

#[async_trait]
impl StageActor for Auditor {
    type Output = AuditorOutput;

    fn stage(&self) -> Stage {
        Stage::Auditor
    }

    #[instrument(skip_all)]
    async fn run(
        &self,
        state: &PipelineState,
        ctx: &StageContext,
    ) -> Result<StageRun<AuditorOutput>, StageError> {
        let Some(discovered) = state.discoverer_output.as_ref() else {
            return Err(StageError::new(
                Stage::Auditor.to_string(),
                0,
                StageErrorKind::MissingUpstream(Stage::Discoverer.to_string()),
            ));
        };
        let script = &state.script;
        let threshold = *ctx.settings().thresholds().b_line_interaction();

        let payload = to_payload(
            Stage::Auditor,
            "Rank these TCCs:",
            &AuditorPayload {
                script,
                tccs: &discovered.tccs,
            },
        )?;
        let exchange = call_with_retry(ctx, Stage::Auditor, &payload, |json| {
            Self::parse(json, discovered, script, threshold)
        })
        .await?;

        let (output, warnings) = exchange.value;
        let rankings = &output.rankings;
        info!(
            a_line = %rankings.a_line.tcc_id,
            spine_score = rankings.a_line.spine_score,
            b_lines = rankings.b_lines.len(),
            c_lines = rankings.c_lines.len(),
            "Ranked conflict chains"
        );
        Ok(StageRun {
            output,
            attempts: exchange.attempts,
            warnings,
            trace: exchange.trace,
        })
    }

    fn store(&self, state: &mut PipelineState, output: AuditorOutput) {
        state.auditor_output = Some(output);
    }
}
