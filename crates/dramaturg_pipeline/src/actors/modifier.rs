//! Stage 3: structural repair.

use super::{StageActor, StageContext, StageRun, call_with_retry, parse_error, to_payload};
use crate::PipelineState;
use async_trait::async_trait;
use dramaturg_core::{
    AuditReport, IntegrityViolation, ModificationLogEntry, ModificationValidation, ModifierOutput,
    RawModifierResponse, Rankings, Script, Stage, apply_modifications, integrity_violations,
};
use dramaturg_error::{AttemptErrorKind, SchemaErrorKind, StageError, StageErrorKind};
use serde::Serialize;
use std::collections::HashSet;
use tracing::{info, instrument};

/// Repairs setup/payoff problems with minimal edits.
#[derive(Debug, Clone, Copy, Default)]
pub struct Modifier;

#[derive(Serialize)]
struct ModifierPayload<'a> {
    script: &'a Script,
    rankings: &'a Rankings,
    audit_report: &'a AuditReport,
}

impl Modifier {
    /// Parses one reply, applies its log to a copy of the script and
    /// recounts new integrity problems.
    ///
    /// `before` holds the violations present in `script`; anything found
    /// afterwards that is not in it counts as introduced by the edits.
    pub fn parse(
        json: &str,
        script: &Script,
        before: &HashSet<IntegrityViolation>,
    ) -> Result<ModifierOutput, AttemptErrorKind> {
        let raw: RawModifierResponse = serde_json::from_str(json).map_err(parse_error)?;
        let schema = |e: dramaturg_error::SchemaError| AttemptErrorKind::Schema(e.kind);

        let modification_log = raw
            .modification_log
            .into_iter()
            .map(|entry| entry.normalize())
            .collect::<Result<Vec<ModificationLogEntry>, _>>()
            .map_err(schema)?;
        raw.validation.check_counts().map_err(schema)?;
        let modified_script = apply_modifications(script, &modification_log).map_err(schema)?;
        modified_script
            .validate()
            .map_err(|e| AttemptErrorKind::Schema(SchemaErrorKind::InvalidModifiedScript(e.kind)))?;

        let new_issues_introduced = integrity_violations(&modified_script)
            .into_iter()
            .filter(|violation| !before.contains(violation))
            .count();
        Ok(ModifierOutput {
            modified_script,
            modification_log,
            validation: ModificationValidation {
                new_issues_introduced,
                ..raw.validation
            },
        })
    }

    /// Output for a script with nothing to fix.
    fn unchanged(script: &Script) -> ModifierOutput {
        ModifierOutput {
            modified_script: script.clone(),
            modification_log: Vec::new(),
            validation: ModificationValidation::default(),
        }
    }
}

#[async_trait]
impl StageActor for Modifier {
    type Output = ModifierOutput;

    fn stage(&self) -> Stage {
        Stage::Modifier
    }

    #[instrument(skip_all)]
    async fn run(
        &self,
        state: &PipelineState,
        ctx: &StageContext,
    ) -> Result<StageRun<ModifierOutput>, StageError> {
        let Some(audited) = state.auditor_output.as_ref() else {
            return Err(StageError::new(
                Stage::Modifier.to_string(),
                0,
                StageErrorKind::MissingUpstream(Stage::Auditor.to_string()),
            ));
        };
        let script = &state.script;
        let violations = integrity_violations(script);
        let report = AuditReport::from_violations(&violations);

        if report.is_empty() {
            info!("No structural issues found, skipping model call");
            return Ok(StageRun {
                output: Self::unchanged(script),
                attempts: 0,
                warnings: Vec::new(),
                trace: Vec::new(),
            });
        }

        let before: HashSet<IntegrityViolation> = violations.into_iter().collect();
        let payload = to_payload(
            Stage::Modifier,
            "Fix these issues:",
            &ModifierPayload {
                script,
                rankings: &audited.rankings,
                audit_report: &report,
            },
        )?;
        let exchange = call_with_retry(ctx, Stage::Modifier, &payload, |json| {
            Self::parse(json, script, &before)
        })
        .await?;

        let output = exchange.value;
        let validation = output.validation;
        info!(
            issues = report.issues.len(),
            fixed = validation.fixed,
            skipped = validation.skipped,
            new_issues = validation.new_issues_introduced,
            "Applied structural fixes"
        );
        let warnings = if validation.new_issues_introduced > 0 {
            vec![format!(
                "Modifications introduced {} new setup/payoff issues",
                validation.new_issues_introduced
            )]
        } else {
            Vec::new()
        };
        Ok(StageRun {
            output,
            attempts: exchange.attempts,
            warnings,
            trace: exchange.trace,
        })
    }

    fn store(&self, state: &mut PipelineState, output: ModifierOutput) {
        state.modifier_output = Some(output);
    }
}
