//! Cross-field checks over scripts and chains.
//!
//! None of these functions fail: they return (possibly empty) lists of
//! findings and leave the decision to the caller.

use crate::{ConflictType, Script, Tcc, jaccard, overlap_ratio};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Word pairs whose split across two objectives suggests one chain opposes the other.
const OPPOSITION_MARKERS: &[(&str, &str)] = &[
    ("block", "get"),
    ("stop", "achieve"),
    ("prevent", "want"),
    ("against", "for"),
    ("阻止", "寻求"),
    ("阻止", "获取"),
    ("阻止", "想要"),
    ("反对", "支持"),
    ("破坏", "建立"),
];

/// A single broken setup/payoff link.
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, derive_more::Display,
)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IntegrityViolation {
    /// `setup_for` names a scene that does not exist
    #[display("Scene {} references non-existent scene {} in setup_for", scene_id, target)]
    DanglingSetup {
        /// Scene holding the link
        scene_id: String,
        /// Missing target
        target: String,
    },
    /// `payoff_from` names a scene that does not exist
    #[display("Scene {} references non-existent scene {} in payoff_from", scene_id, source)]
    DanglingPayoff {
        /// Scene holding the link
        scene_id: String,
        /// Missing source
        source: String,
    },
    /// `setup_for` points at a scene that is not later in the script
    #[display("Scene {} sets up {} but {} is not downstream", scene_id, target, target)]
    SetupNotDownstream {
        /// Scene holding the link
        scene_id: String,
        /// Target that should come later
        target: String,
    },
    /// `payoff_from` points at a scene that is not earlier in the script
    #[display("Scene {} is paid off by {} but {} is not upstream", scene_id, source, source)]
    PayoffNotUpstream {
        /// Scene holding the link
        scene_id: String,
        /// Source that should come earlier
        source: String,
    },
    /// `setup_for` target does not list the setting scene in its `payoff_from`
    #[display(
        "Scene {} sets up for {}, but {} doesn't have {} in payoff_from",
        scene_id,
        target,
        target,
        scene_id
    )]
    MissingReciprocal {
        /// Scene holding the link
        scene_id: String,
        /// Target missing the back-link
        target: String,
    },
}

impl IntegrityViolation {
    /// Scene whose own data holds the broken link.
    pub fn scene_id(&self) -> &str {
        match self {
            IntegrityViolation::DanglingSetup { scene_id, .. }
            | IntegrityViolation::DanglingPayoff { scene_id, .. }
            | IntegrityViolation::SetupNotDownstream { scene_id, .. }
            | IntegrityViolation::PayoffNotUpstream { scene_id, .. }
            | IntegrityViolation::MissingReciprocal { scene_id, .. } => scene_id,
        }
    }

    /// Scene on the other end of the link.
    pub fn other_scene(&self) -> &str {
        match self {
            IntegrityViolation::DanglingSetup { target, .. }
            | IntegrityViolation::SetupNotDownstream { target, .. }
            | IntegrityViolation::MissingReciprocal { target, .. } => target,
            IntegrityViolation::DanglingPayoff { source, .. }
            | IntegrityViolation::PayoffNotUpstream { source, .. } => source,
        }
    }
}

/// Collects every broken setup/payoff link in scene order.
///
/// Each link is checked for existence first; a link to a missing scene is not
/// also reported for ordering or reciprocity.
pub fn integrity_violations(script: &Script) -> Vec<IntegrityViolation> {
    let positions: HashMap<&str, usize> = script
        .scenes
        .iter()
        .enumerate()
        .map(|(i, s)| (s.scene_id.as_str(), i))
        .collect();

    let mut violations = Vec::new();
    for (position, scene) in script.scenes.iter().enumerate() {
        for target in &scene.setup_payoff.setup_for {
            let Some(&target_position) = positions.get(target.as_str()) else {
                violations.push(IntegrityViolation::DanglingSetup {
                    scene_id: scene.scene_id.clone(),
                    target: target.clone(),
                });
                continue;
            };
            if target_position <= position {
                violations.push(IntegrityViolation::SetupNotDownstream {
                    scene_id: scene.scene_id.clone(),
                    target: target.clone(),
                });
            }
            let target_scene = &script.scenes[target_position];
            if !target_scene
                .setup_payoff
                .payoff_from
                .iter()
                .any(|s| *s == scene.scene_id)
            {
                violations.push(IntegrityViolation::MissingReciprocal {
                    scene_id: scene.scene_id.clone(),
                    target: target.clone(),
                });
            }
        }
        for source in &scene.setup_payoff.payoff_from {
            match positions.get(source.as_str()) {
                None => violations.push(IntegrityViolation::DanglingPayoff {
                    scene_id: scene.scene_id.clone(),
                    source: source.clone(),
                }),
                Some(&source_position) if source_position >= position => {
                    violations.push(IntegrityViolation::PayoffNotUpstream {
                        scene_id: scene.scene_id.clone(),
                        source: source.clone(),
                    })
                }
                Some(_) => {}
            }
        }
    }
    violations
}

/// Describes every broken setup/payoff link; empty means the script is consistent.
///
/// # Examples
///
/// ```
/// use dramaturg_core::{Scene, Script, validate_setup_payoff_integrity};
///
/// let mut first = Scene::builder().scene_id("S01").build().unwrap();
/// first.setup_payoff.setup_for.push("S09".to_string());
/// let script = Script::new(vec![first]);
///
/// let errors = validate_setup_payoff_integrity(&script);
/// assert_eq!(errors.len(), 1);
/// assert!(errors[0].contains("S01"));
/// ```
pub fn validate_setup_payoff_integrity(script: &Script) -> Vec<String> {
    integrity_violations(script)
        .iter()
        .map(ToString::to_string)
        .collect()
}

/// Reports scene ids mentioned in links or chain evidence that the script lacks.
pub fn validate_scene_references(script: &Script, tccs: &[Tcc]) -> Vec<String> {
    let known = script.scene_ids();
    let mut errors = Vec::new();
    for scene in &script.scenes {
        let links = [
            ("setup_for", &scene.setup_payoff.setup_for),
            ("payoff_from", &scene.setup_payoff.payoff_from),
        ];
        for (field, targets) in links {
            for target in targets.iter().filter(|t| !known.contains(t.as_str())) {
                errors.push(format!(
                    "Scene {} references unknown scene {} in {}",
                    scene.scene_id, target, field
                ));
            }
        }
    }
    for tcc in tccs {
        for scene_id in tcc
            .evidence_scenes()
            .iter()
            .filter(|s| !known.contains(s.as_str()))
        {
            errors.push(format!(
                "{} evidence references unknown scene {}",
                tcc.tcc_id(),
                scene_id
            ));
        }
    }
    errors
}

/// Warns about chain pairs that may be one conflict seen from both sides.
///
/// A pair is flagged when the Jaccard overlap of their evidence exceeds
/// `overlap_threshold`. Interpersonal pairs whose objectives read as opposing
/// each other get a stronger warning.
///
/// # Examples
///
/// ```
/// use dramaturg_core::{ConflictType, Tcc, validate_tcc_independence};
///
/// let scenes = |ids: &[&str]| ids.iter().map(|s| s.to_string()).collect::<Vec<_>>();
/// let hero = Tcc::new("TCC_01", "Mara wants to get the deed", ConflictType::Interpersonal,
///     scenes(&["S01", "S02", "S03", "S04"]), 0.9).unwrap();
/// let rival = Tcc::new("TCC_02", "Jon tries to block the deed", ConflictType::Interpersonal,
///     scenes(&["S01", "S02", "S03", "S04"]), 0.6).unwrap();
///
/// let warnings = validate_tcc_independence(&[hero, rival], 0.7);
/// assert_eq!(warnings.len(), 1);
/// assert!(warnings[0].contains("TCC_01") && warnings[0].contains("TCC_02"));
/// ```
pub fn validate_tcc_independence(tccs: &[Tcc], overlap_threshold: f64) -> Vec<String> {
    let mut warnings = Vec::new();
    for (i, first) in tccs.iter().enumerate() {
        for second in &tccs[i + 1..] {
            let overlap = jaccard(first.evidence_scenes(), second.evidence_scenes());
            if overlap <= overlap_threshold {
                continue;
            }
            let mirrored = *first.core_conflict_type() == ConflictType::Interpersonal
                && *second.core_conflict_type() == ConflictType::Interpersonal
                && objectives_oppose(first.super_objective(), second.super_objective());
            let warning = if mirrored {
                format!(
                    "{} and {} look like mirror chains: {:.0}% shared evidence with opposing objectives ('{}' vs '{}')",
                    first.tcc_id(),
                    second.tcc_id(),
                    overlap * 100.0,
                    first.super_objective(),
                    second.super_objective()
                )
            } else {
                format!(
                    "High overlap between {} and {} ({:.0}% shared evidence), may be mirror conflicts",
                    first.tcc_id(),
                    second.tcc_id(),
                    overlap * 100.0
                )
            };
            tracing::debug!(first = %first.tcc_id(), second = %second.tcc_id(), overlap, "Possible mirror chains");
            warnings.push(warning);
        }
    }
    warnings
}

/// Merges chains whose min-normalised overlap reaches `threshold`.
///
/// Within each merged group the highest-confidence chain survives. Returns the
/// surviving chains in their original order plus one note per merge.
pub fn merge_mirror_tccs(tccs: Vec<Tcc>, threshold: f64) -> (Vec<Tcc>, Vec<String>) {
    if tccs.len() <= 1 {
        return (tccs, Vec::new());
    }

    let mut absorbed = vec![false; tccs.len()];
    let mut keep = Vec::new();
    let mut notes = Vec::new();

    for i in 0..tccs.len() {
        if absorbed[i] {
            continue;
        }
        let mut best = i;
        for j in i + 1..tccs.len() {
            if absorbed[j] {
                continue;
            }
            let overlap = overlap_ratio(tccs[i].evidence_scenes(), tccs[j].evidence_scenes());
            if overlap >= threshold {
                absorbed[j] = true;
                notes.push(format!(
                    "Merged {} into {} ({:.0}% overlap)",
                    tccs[j].tcc_id(),
                    tccs[i].tcc_id(),
                    overlap * 100.0
                ));
                if tccs[j].confidence() > tccs[best].confidence() {
                    best = j;
                }
            }
        }
        if best != i {
            notes.push(format!(
                "Kept {} as representative (confidence {:.2})",
                tccs[best].tcc_id(),
                tccs[best].confidence()
            ));
        }
        keep.push(best);
    }

    let merged = tccs
        .into_iter()
        .enumerate()
        .filter(|(i, _)| keep.contains(i))
        .map(|(_, tcc)| tcc)
        .collect();
    (merged, notes)
}

fn objectives_oppose(first: &str, second: &str) -> bool {
    let first = first.to_lowercase();
    let second = second.to_lowercase();
    OPPOSITION_MARKERS.iter().any(|(block, achieve)| {
        (first.contains(block) && second.contains(achieve))
            || (first.contains(achieve) && second.contains(block))
    })
}
