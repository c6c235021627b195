//! Pipeline stage names.

use serde::{Deserialize, Serialize};

/// One of the three model-calling stages.
///
/// # Examples
///
/// ```
/// use dramaturg_core::Stage;
///
/// assert_eq!(Stage::Auditor.to_string(), "auditor");
/// assert_eq!(Stage::Auditor.prompt_name(), "stage2_auditor");
/// assert_eq!(Stage::Discoverer.upstream(), None);
/// ```
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Stage {
    /// Stage 1: finds conflict chains
    Discoverer,
    /// Stage 2: ranks chains into A/B/C lines
    Auditor,
    /// Stage 3: repairs setup/payoff structure
    Modifier,
}

impl Stage {
    /// Name of the stage's instruction prompt resource.
    pub fn prompt_name(&self) -> &'static str {
        match self {
            Stage::Discoverer => "stage1_discoverer",
            Stage::Auditor => "stage2_auditor",
            Stage::Modifier => "stage3_modifier",
        }
    }

    /// Stage whose output this stage consumes.
    pub fn upstream(&self) -> Option<Stage> {
        match self {
            Stage::Discoverer => None,
            Stage::Auditor => Some(Stage::Discoverer),
            Stage::Modifier => Some(Stage::Auditor),
        }
    }
}
