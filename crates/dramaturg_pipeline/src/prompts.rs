//! Stage instruction prompts.

use dramaturg_core::Stage;
use dramaturg_error::ConfigError;
use dramaturg_interface::PromptLibrary;
use std::collections::HashMap;
use std::path::Path;
use strum::IntoEnumIterator;
use tracing::{debug, instrument};

const DISCOVERER_PROMPT: &str = "\
You are a dramaturg. Identify the independent Theatrical Conflict Chains (TCCs) in the script.
Return one JSON object: {\"tccs\": [{\"tcc_id\": \"TCC_01\", \"super_objective\": \"10-50 characters\", \
\"core_conflict_type\": \"interpersonal|internal|ideological\", \"evidence_scenes\": [\"S01\", \"S02\"], \
\"confidence\": 0.0-1.0}], \"metadata\": {\"total_scenes_analyzed\": 0, \"fallback_mode\": false}}.
Report 1 to 5 chains, each with at least two evidence scenes taken from the script. Never report the \
antagonist's side of a conflict as a separate chain. When fallback_mode is true, rely on scene_mission \
and key_events instead of setup_payoff. If no chain exists, return {\"tccs\": [], \"metadata\": {\"error\": \"why\"}}.
Output only the JSON object.";

const AUDITOR_PROMPT: &str = "\
You are a dramaturg. Rank the given TCCs into exactly one A-line, zero or more B-lines and C-lines.
Return one JSON object: {\"rankings\": {\"a_line\": {\"tcc_id\", \"super_objective\", \"spine_score\", \
\"reasoning\": {\"scene_count\", \"setup_payoff_density\", \"drives_climax\"}, \"forces\": {\"protagonist\", \
\"primary_antagonist\", \"dynamic_antagonist\"}}, \"b_lines\": [{\"tcc_id\", \"heart_score\", \"reasoning\": \
{\"relation_change_count\", \"a_line_interaction\", \"theme_depth\"}, \"forces\"}], \"c_lines\": [{\"tcc_id\", \
\"flavor_score\", \"reasoning\": {\"thematic_relevance\", \"removable\"}, \"forces\"}]}}.
spine_score = scene_count * 2 + setup_payoff_density * 1.5 + (2 if drives_climax). \
heart_score = relation_change_count * 1.5 + a_line_interaction * 2 + theme_depth. \
A B-line must share more than 30% of its scenes with the A-line. All scores are non-negative.
Output only the JSON object.";

const MODIFIER_PROMPT: &str = "\
You are a script doctor. Fix the issues in the audit report with the smallest possible edits.
Return one JSON object: {\"modification_log\": [{\"issue_id\": \"ISS_001\", \"applied\": true, \
\"scene_id\": \"S01\", \"field\": \"setup_payoff.setup_for\", \"change_type\": \"add|modify|delete\", \
\"old_value\": null, \"new_value\": \"S03\", \"reason\": \"...\"}], \"validation\": {\"total_issues\": 1, \
\"fixed\": 1, \"skipped\": 0, \"new_issues_introduced\": 0}}.
Only reference scenes that exist. fixed + skipped must equal total_issues.
Output only the JSON object.";

/// Prompts compiled into the binary, or supplied directly.
///
/// # Examples
///
/// ```
/// use dramaturg_core::Stage;
/// use dramaturg_interface::PromptLibrary;
/// use dramaturg_pipeline::InMemoryPromptLibrary;
///
/// let prompts = InMemoryPromptLibrary::default().with_prompt(Stage::Auditor, "rank them");
/// assert_eq!(prompts.prompt(Stage::Auditor), "rank them");
/// assert!(prompts.prompt(Stage::Discoverer).contains("TCC"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InMemoryPromptLibrary {
    prompts: HashMap<Stage, String>,
}

impl Default for InMemoryPromptLibrary {
    fn default() -> Self {
        let prompts = Stage::iter()
            .map(|stage| (stage, default_prompt(stage).to_string()))
            .collect();
        Self { prompts }
    }
}

impl InMemoryPromptLibrary {
    /// Replaces one stage's prompt.
    pub fn with_prompt(mut self, stage: Stage, prompt: impl Into<String>) -> Self {
        self.prompts.insert(stage, prompt.into());
        self
    }
}

impl PromptLibrary for InMemoryPromptLibrary {
    fn prompt(&self, stage: Stage) -> &str {
        self.prompts
            .get(&stage)
            .map(String::as_str)
            .unwrap_or_else(|| default_prompt(stage))
    }
}

/// Prompts read from `<dir>/<prompt_name>.md`, e.g. `stage1_discoverer.md`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePromptLibrary {
    inner: InMemoryPromptLibrary,
}

impl FilePromptLibrary {
    /// Loads every stage prompt from a directory.
    ///
    /// # Errors
    ///
    /// Returns an error if any prompt file is missing or unreadable.
    #[instrument(skip(dir), fields(dir = %dir.as_ref().display()))]
    pub fn load(dir: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let mut inner = InMemoryPromptLibrary::default();
        for stage in Stage::iter() {
            let path = dir.as_ref().join(format!("{}.md", stage.prompt_name()));
            let text = std::fs::read_to_string(&path).map_err(|e| {
                ConfigError::new(format!(
                    "Failed to read prompt {}: {}",
                    path.display(),
                    e
                ))
            })?;
            debug!(stage = %stage, chars = text.len(), "Loaded prompt");
            inner = inner.with_prompt(stage, text);
        }
        Ok(Self { inner })
    }
}

impl PromptLibrary for FilePromptLibrary {
    fn prompt(&self, stage: Stage) -> &str {
        self.inner.prompt(stage)
    }
}

fn default_prompt(stage: Stage) -> &'static str {
    match stage {
        Stage::Discoverer => DISCOVERER_PROMPT,
        Stage::Auditor => AUDITOR_PROMPT,
        Stage::Modifier => MODIFIER_PROMPT,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_prompts_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        for stage in Stage::iter() {
            std::fs::write(
                dir.path().join(format!("{}.md", stage.prompt_name())),
                format!("prompt for {}", stage),
            )
            .unwrap();
        }
        let prompts = FilePromptLibrary::load(dir.path()).unwrap();
        assert_eq!(prompts.prompt(Stage::Modifier), "prompt for modifier");
    }

    #[test]
    fn missing_prompt_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = FilePromptLibrary::load(dir.path()).unwrap_err();
        assert!(err.message.contains("stage1_discoverer.md"));
    }
}
