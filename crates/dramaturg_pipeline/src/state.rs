//! Pipeline state threaded through the stage actors.

use dramaturg_core::{AuditorOutput, DiscovererOutput, ModifierOutput, Role, Script, Stage};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;
use uuid::Uuid;

/// Where a run is in its lifecycle.
///
/// `Initialized -> Discovering -> Auditing -> Modifying -> Completed`, with
/// `Failed` reachable from every non-terminal state.
///
/// # Examples
///
/// ```
/// use dramaturg_pipeline::PipelineStage;
///
/// assert!(PipelineStage::Initialized.can_transition_to(PipelineStage::Discovering));
/// assert!(PipelineStage::Auditing.can_transition_to(PipelineStage::Failed));
/// assert!(!PipelineStage::Discovering.can_transition_to(PipelineStage::Modifying));
/// assert!(!PipelineStage::Completed.can_transition_to(PipelineStage::Failed));
/// ```
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PipelineStage {
    /// Created, nothing run yet
    #[default]
    Initialized,
    /// Discoverer running
    Discovering,
    /// Auditor running
    Auditing,
    /// Modifier running
    Modifying,
    /// All three outputs present
    Completed,
    /// Halted by a stage failure or cancellation
    Failed,
}

impl PipelineStage {
    /// Whether the run has stopped.
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineStage::Completed | PipelineStage::Failed)
    }

    /// The successor on the happy path.
    pub fn next(&self) -> Option<PipelineStage> {
        match self {
            PipelineStage::Initialized => Some(PipelineStage::Discovering),
            PipelineStage::Discovering => Some(PipelineStage::Auditing),
            PipelineStage::Auditing => Some(PipelineStage::Modifying),
            PipelineStage::Modifying => Some(PipelineStage::Completed),
            PipelineStage::Completed | PipelineStage::Failed => None,
        }
    }

    /// Whether `to` is a legal successor.
    pub fn can_transition_to(&self, to: PipelineStage) -> bool {
        if self.is_terminal() {
            return false;
        }
        to == PipelineStage::Failed || self.next() == Some(to)
    }

    /// Running state for a model stage.
    pub fn running(stage: Stage) -> PipelineStage {
        match stage {
            Stage::Discoverer => PipelineStage::Discovering,
            Stage::Auditor => PipelineStage::Auditing,
            Stage::Modifier => PipelineStage::Modifying,
        }
    }
}

/// One message exchanged with the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEntry {
    /// Stage that sent or received it
    pub stage: Stage,
    /// Message author
    pub role: Role,
    /// Message text
    pub content: String,
}

/// Working value of one pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineState {
    /// Identifies the run in logs and history
    pub run_id: Uuid,
    /// Input script, never modified
    pub script: Script,
    /// Stage 1 output
    pub discoverer_output: Option<DiscovererOutput>,
    /// Stage 2 output
    pub auditor_output: Option<AuditorOutput>,
    /// Stage 3 output
    pub modifier_output: Option<ModifierOutput>,
    /// Lifecycle marker
    pub current_stage: PipelineStage,
    /// Stage-fatal errors
    pub errors: Vec<String>,
    /// Heuristic warnings and notes about corrected model output
    pub warnings: Vec<String>,
    /// Failed attempts per stage
    pub retry_counts: BTreeMap<Stage, usize>,
    /// Messages exchanged with the model
    pub trace: Vec<TraceEntry>,
}

impl PipelineState {
    /// Fresh state for a script.
    pub fn new(script: Script) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            script,
            discoverer_output: None,
            auditor_output: None,
            modifier_output: None,
            current_stage: PipelineStage::Initialized,
            errors: Vec::new(),
            warnings: Vec::new(),
            retry_counts: BTreeMap::new(),
            trace: Vec::new(),
        }
    }

    /// Moves to `to` if the transition is legal. Returns whether it moved.
    pub fn transition_to(&mut self, to: PipelineStage) -> bool {
        if !self.current_stage.can_transition_to(to) {
            debug!(
                run_id = %self.run_id,
                from = %self.current_stage,
                to = %to,
                "Ignoring illegal stage transition"
            );
            return false;
        }
        debug!(run_id = %self.run_id, from = %self.current_stage, to = %to, "Stage transition");
        self.current_stage = to;
        true
    }

    /// Whether the given stage's output is present.
    pub fn has_output(&self, stage: Stage) -> bool {
        match stage {
            Stage::Discoverer => self.discoverer_output.is_some(),
            Stage::Auditor => self.auditor_output.is_some(),
            Stage::Modifier => self.modifier_output.is_some(),
        }
    }

    /// Whether every stage produced output.
    pub fn is_complete(&self) -> bool {
        self.discoverer_output.is_some()
            && self.auditor_output.is_some()
            && self.modifier_output.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_walks_every_stage() {
        let mut state = PipelineState::new(Script::default());
        let mut stage = PipelineStage::Initialized;
        while let Some(next) = stage.next() {
            assert!(state.transition_to(next));
            stage = next;
        }
        assert_eq!(state.current_stage, PipelineStage::Completed);
        assert!(!state.transition_to(PipelineStage::Failed));
    }

    #[test]
    fn skipping_a_stage_is_refused() {
        let mut state = PipelineState::new(Script::default());
        assert!(!state.transition_to(PipelineStage::Auditing));
        assert_eq!(state.current_stage, PipelineStage::Initialized);
    }

    #[test]
    fn running_maps_model_stages() {
        assert_eq!(PipelineStage::running(Stage::Auditor), PipelineStage::Auditing);
        assert_eq!(PipelineStage::Modifying.to_string(), "modifying");
    }
}
