//! Scenes and scripts.

use dramaturg_error::{ScriptError, ScriptErrorKind};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Maximum number of key events a scene may carry.
pub const MAX_KEY_EVENTS: usize = 7;

/// Returns true for ids of the form `S` + digits, with an optional lowercase suffix (`S05b`).
///
/// # Examples
///
/// ```
/// use dramaturg_core::is_scene_id;
///
/// assert!(is_scene_id("S01"));
/// assert!(is_scene_id("S105b"));
/// assert!(!is_scene_id("Scene1"));
/// ```
pub fn is_scene_id(id: &str) -> bool {
    let Some(rest) = id.strip_prefix('S') else {
        return false;
    };
    let rest = rest
        .strip_suffix(|c: char| c.is_ascii_lowercase())
        .unwrap_or(rest);
    !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit())
}

/// Something a character learns in a scene.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfoChange {
    /// Who learns it
    pub character: String,
    /// What they learn
    pub learned: String,
}

/// A shift in the relationship between two characters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationChange {
    /// The character pair
    pub chars: [String; 2],
    /// State before the scene
    pub from: String,
    /// State after the scene
    pub to: String,
}

/// A prop whose status matters to the plot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyObject {
    /// The object
    pub object: String,
    /// Its status at the end of the scene
    pub status: String,
}

/// A parenthetical acting note attached to a line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerformanceNote {
    /// Character the note applies to
    pub character: String,
    /// The note itself
    pub note: String,
    /// Line the note was attached to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_context: Option<String>,
}

/// Causal links between scenes.
///
/// `setup_for` lists later scenes that pay off what this scene sets up;
/// `payoff_from` lists earlier scenes whose setup this scene pays off.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SetupPayoff {
    /// Later scenes this scene sets up
    #[serde(default)]
    pub setup_for: Vec<String>,
    /// Earlier scenes this scene pays off
    #[serde(default)]
    pub payoff_from: Vec<String>,
}

impl SetupPayoff {
    /// True when neither direction carries a link.
    pub fn is_empty(&self) -> bool {
        self.setup_for.is_empty() && self.payoff_from.is_empty()
    }
}

/// One screenplay unit.
///
/// # Examples
///
/// ```
/// use dramaturg_core::Scene;
///
/// let scene = Scene::builder()
///     .scene_id("S01")
///     .setting("Kitchen, night")
///     .characters(vec!["Ann".to_string(), "Ben".to_string()])
///     .key_events(vec!["Ann finds the letter".to_string()])
///     .build()
///     .unwrap();
///
/// assert_eq!(scene.scene_id, "S01");
/// assert!(scene.setup_payoff.is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, derive_builder::Builder)]
#[builder(setter(into), default)]
pub struct Scene {
    /// Unique id, `S\d+`
    pub scene_id: String,
    /// Where and when
    pub setting: String,
    /// Characters present
    #[serde(default)]
    pub characters: Vec<String>,
    /// What the scene is for
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scene_mission: Option<String>,
    /// Ordered beats, 1-7 short strings
    #[serde(default)]
    pub key_events: Vec<String>,
    /// Information revealed
    #[serde(default)]
    pub info_change: Vec<InfoChange>,
    /// Relationship shifts
    #[serde(default)]
    pub relation_change: Vec<RelationChange>,
    /// Plot-relevant props
    #[serde(default)]
    pub key_object: Vec<KeyObject>,
    /// Causal links
    #[serde(default)]
    pub setup_payoff: SetupPayoff,
    /// Acting notes
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub performance_notes: Vec<PerformanceNote>,
    /// Visual action lines
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub visual_actions: Vec<String>,
}

impl Scene {
    /// Creates a new scene builder.
    pub fn builder() -> SceneBuilder {
        SceneBuilder::default()
    }
}

/// An ordered sequence of scenes. Later scenes are downstream.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Script {
    /// Scenes in narrative order
    pub scenes: Vec<Scene>,
}

impl Script {
    /// Wraps a list of scenes.
    pub fn new(scenes: Vec<Scene>) -> Self {
        Self { scenes }
    }

    /// Decodes a script document of the form `{"scenes": [...]}`.
    ///
    /// Only structure is checked here; call [`Script::validate`] for the invariants.
    pub fn from_json(text: &str) -> Result<Self, ScriptError> {
        serde_json::from_str(text).map_err(|e| ScriptError::new(ScriptErrorKind::Parse(e.to_string())))
    }

    /// Number of scenes.
    pub fn len(&self) -> usize {
        self.scenes.len()
    }

    /// True when the script has no scenes.
    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    /// Looks up a scene by id.
    pub fn scene(&self, scene_id: &str) -> Option<&Scene> {
        self.scenes.iter().find(|s| s.scene_id == scene_id)
    }

    /// Mutable lookup by id.
    pub fn scene_mut(&mut self, scene_id: &str) -> Option<&mut Scene> {
        self.scenes.iter_mut().find(|s| s.scene_id == scene_id)
    }

    /// True if a scene with this id exists.
    pub fn contains(&self, scene_id: &str) -> bool {
        self.scene(scene_id).is_some()
    }

    /// All scene ids.
    pub fn scene_ids(&self) -> HashSet<&str> {
        self.scenes.iter().map(|s| s.scene_id.as_str()).collect()
    }

    /// Fraction of scenes with no setup/payoff links at all.
    pub fn missing_setup_payoff_ratio(&self) -> f64 {
        if self.scenes.is_empty() {
            return 0.0;
        }
        let missing = self
            .scenes
            .iter()
            .filter(|s| s.setup_payoff.is_empty())
            .count();
        missing as f64 / self.scenes.len() as f64
    }

    /// Checks the invariants a script must satisfy before any stage runs.
    ///
    /// Rejects duplicate or malformed scene ids, key event lists outside 1-7,
    /// and setup/payoff links to scenes that do not exist. Temporal ordering and
    /// reciprocity are not checked here; the modifier repairs those.
    ///
    /// # Errors
    ///
    /// Returns the first violation found, in scene order.
    pub fn validate(&self) -> Result<(), ScriptError> {
        let mut seen = HashSet::new();
        for scene in &self.scenes {
            if !is_scene_id(&scene.scene_id) {
                return Err(ScriptError::new(ScriptErrorKind::InvalidSceneId(
                    scene.scene_id.clone(),
                )));
            }
            if !seen.insert(scene.scene_id.as_str()) {
                return Err(ScriptError::new(ScriptErrorKind::DuplicateSceneId(
                    scene.scene_id.clone(),
                )));
            }
            let count = scene.key_events.len();
            if count == 0 || count > MAX_KEY_EVENTS {
                return Err(ScriptError::new(ScriptErrorKind::KeyEventCount {
                    scene_id: scene.scene_id.clone(),
                    count,
                }));
            }
        }

        for scene in &self.scenes {
            let links = [
                ("setup_for", &scene.setup_payoff.setup_for),
                ("payoff_from", &scene.setup_payoff.payoff_from),
            ];
            for (field, targets) in links {
                if let Some(target) = targets.iter().find(|t| !seen.contains(t.as_str())) {
                    return Err(ScriptError::new(ScriptErrorKind::DanglingReference {
                        scene_id: scene.scene_id.clone(),
                        field: field.to_string(),
                        target: target.clone(),
                    }));
                }
            }
        }
        Ok(())
    }
}
