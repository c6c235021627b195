//! Full pipeline command handler.

use super::{OutputFormat, load_config, read_script, script_name, to_json};
use dramaturg::{
    DramaturgResult, MetricsSnapshot, MetricsStore, Pipeline, PipelineResult, PipelineState,
    Provider, RunRecord,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

/// Options for the `analyze` command.
#[derive(Debug, Clone)]
pub struct AnalyzeOptions {
    /// Provider override
    pub provider: Option<Provider>,
    /// Model override
    pub model: Option<String>,
    /// Write the report here instead of stdout
    pub output: Option<PathBuf>,
    /// Append the run to the history file
    pub record_history: bool,
    /// Report format
    pub format: OutputFormat,
}

#[derive(Serialize)]
struct AnalysisReport<'a> {
    success: bool,
    failure: Option<String>,
    state: &'a PipelineState,
    metrics: &'a MetricsSnapshot,
}

/// Runs the pipeline on one script. Returns whether every stage completed.
#[instrument(skip(options), fields(script = %script_path.display()))]
pub async fn analyze_script(
    config_path: Option<&Path>,
    script_path: &Path,
    options: AnalyzeOptions,
) -> DramaturgResult<bool> {
    let mut config = load_config(config_path)?;
    if options.provider.is_some() || options.model.is_some() {
        let llm = config.llm.clone();
        config.llm = match options.provider {
            Some(provider) => llm.with_provider(provider, options.model.clone()),
            None => {
                let provider = *llm.provider();
                let model = options.model.clone().or_else(|| llm.model().clone());
                llm.with_provider(provider, model)
            }
        };
    }

    let script = read_script(script_path)?;
    let pipeline = Pipeline::from_config(&config)?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, cancelling run");
            on_interrupt.cancel();
        }
    });

    let result = pipeline.run_with_cancel(script, cancel).await;

    if options.record_history {
        let store = MetricsStore::new(config.history.path());
        let record = RunRecord::from_result(script_name(script_path), &result);
        match store.append(&record).await {
            Ok(()) => info!(path = %store.path().display(), "Recorded run"),
            Err(e) => warn!(error = %e, "Could not record run history"),
        }
    }

    let rendered = match options.format {
        OutputFormat::Json => to_json(&AnalysisReport {
            success: result.is_success(),
            failure: result.failure.as_ref().map(ToString::to_string),
            state: &result.state,
            metrics: &result.metrics,
        })?,
        OutputFormat::Human => render_summary(&result),
    };
    match &options.output {
        Some(path) => {
            std::fs::write(path, rendered).map_err(|e| {
                dramaturg::StorageError::new(dramaturg::StorageErrorKind::FileWrite(format!(
                    "{}: {}",
                    path.display(),
                    e
                )))
            })?;
            info!(path = %path.display(), "Wrote report");
        }
        None => println!("{}", rendered),
    }

    Ok(result.is_success())
}

fn render_summary(result: &PipelineResult) -> String {
    let state = &result.state;
    let mut out = Vec::new();
    out.push(format!("Run {}: {}", state.run_id, state.current_stage));

    if let Some(discovered) = &state.discoverer_output {
        out.push(format!(
            "\nConflict chains ({}{}):",
            discovered.tccs.len(),
            if discovered.metadata.fallback_mode {
                ", fallback mode"
            } else {
                ""
            }
        ));
        for tcc in &discovered.tccs {
            out.push(format!(
                "  {} [{}] {} (confidence {:.2}, scenes {})",
                tcc.tcc_id(),
                tcc.core_conflict_type(),
                tcc.super_objective(),
                tcc.confidence(),
                tcc.evidence_scenes().join(", ")
            ));
        }
    }

    if let Some(audited) = &state.auditor_output {
        let rankings = &audited.rankings;
        out.push("\nRankings:".to_string());
        out.push(format!(
            "  A-line: {} (spine {:.1})",
            rankings.a_line.tcc_id, rankings.a_line.spine_score
        ));
        for b in &rankings.b_lines {
            out.push(format!("  B-line: {} (heart {:.1})", b.tcc_id, b.heart_score));
        }
        for c in &rankings.c_lines {
            out.push(format!("  C-line: {} (flavor {:.1})", c.tcc_id, c.flavor_score));
        }
        out.push(format!(
            "  Coverage: A {:.0}%, B {:.0}%, C {:.0}% of {} scenes",
            audited.metrics.a_line_coverage * 100.0,
            audited.metrics.b_line_coverage * 100.0,
            audited.metrics.c_line_coverage * 100.0,
            audited.metrics.total_scenes
        ));
    }

    if let Some(modified) = &state.modifier_output {
        let v = modified.validation;
        out.push(format!(
            "\nModifications: {} fixed, {} skipped of {} issues, {} new",
            v.fixed, v.skipped, v.total_issues, v.new_issues_introduced
        ));
        for entry in modified.modification_log.iter().filter(|e| e.applied) {
            out.push(format!(
                "  {} {} {}",
                entry.issue_id,
                entry.scene_id.as_deref().unwrap_or("-"),
                entry.field.as_deref().unwrap_or("-")
            ));
        }
    }

    if !state.warnings.is_empty() {
        out.push("\nWarnings:".to_string());
        out.extend(state.warnings.iter().map(|w| format!("  {}", w)));
    }
    if !state.errors.is_empty() {
        out.push("\nErrors:".to_string());
        out.extend(state.errors.iter().map(|e| format!("  {}", e)));
    }

    let metrics = &result.metrics;
    out.push(format!(
        "\n{:.1}s, {} LLM calls, {} retries, {} tokens",
        metrics.total_duration_secs,
        metrics.total_calls(),
        metrics.total_retries(),
        metrics.total_tokens()
    ));
    out.join("\n")
}
