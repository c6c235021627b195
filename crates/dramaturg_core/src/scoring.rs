//! Ranking score formulas and evidence overlap measures.
//!
//! All functions here are total: no inputs produce errors.

use crate::{Script, Tcc};
use std::collections::BTreeSet;

/// Spine score for an A-line candidate.
///
/// `scene_count * 2 + setup_payoff_density * 1.5 + (2 if drives_climax)`.
///
/// # Examples
///
/// ```
/// use dramaturg_core::calculate_spine_score;
///
/// assert_eq!(calculate_spine_score(5, 0.5, true), 12.75);
/// assert_eq!(calculate_spine_score(5, 0.5, false), 10.75);
/// ```
pub fn calculate_spine_score(scene_count: usize, setup_payoff_density: f64, drives_climax: bool) -> f64 {
    let climax_bonus = if drives_climax { 2.0 } else { 0.0 };
    scene_count as f64 * 2.0 + setup_payoff_density * 1.5 + climax_bonus
}

/// Heart score for a B-line candidate.
///
/// `relation_change_count * 1.5 + a_line_interaction * 2.0 + theme_depth * 1.0`.
///
/// # Examples
///
/// ```
/// use dramaturg_core::calculate_heart_score;
///
/// assert_eq!(calculate_heart_score(2, 0.5, 0.5), 4.5);
/// ```
pub fn calculate_heart_score(relation_change_count: usize, a_line_interaction: f64, theme_depth: f64) -> f64 {
    relation_change_count as f64 * 1.5 + a_line_interaction * 2.0 + theme_depth
}

/// Fraction of a chain's distinct evidence scenes that carry setup/payoff links.
///
/// Evidence scenes missing from the script count as carrying none.
pub fn calculate_setup_payoff_density(tcc: &Tcc, script: &Script) -> f64 {
    let evidence = tcc.evidence_set();
    if evidence.is_empty() {
        return 0.0;
    }
    let linked = evidence
        .iter()
        .filter_map(|id| script.scene(id))
        .filter(|scene| !scene.setup_payoff.is_empty())
        .count();
    linked as f64 / evidence.len() as f64
}

/// Shared evidence scenes divided by the size of the smaller set.
///
/// # Examples
///
/// ```
/// use dramaturg_core::overlap_ratio;
///
/// let a = ["S01", "S02", "S03", "S04"];
/// let b = ["S03", "S04"];
/// assert_eq!(overlap_ratio(&a, &b), 1.0);
/// assert_eq!(overlap_ratio(&a, &[]), 0.0);
/// ```
pub fn overlap_ratio<S: AsRef<str>>(a: &[S], b: &[S]) -> f64 {
    let a = to_set(a);
    let b = to_set(b);
    let smaller = a.len().min(b.len());
    if smaller == 0 {
        return 0.0;
    }
    a.intersection(&b).count() as f64 / smaller as f64
}

/// Interaction between a candidate chain and the A-line, in [0, 1].
///
/// Same measure as [`overlap_ratio`]: shared scenes over the smaller chain's scene count.
pub fn calculate_a_line_interaction<S: AsRef<str>>(candidate: &[S], a_line: &[S]) -> f64 {
    overlap_ratio(candidate, a_line)
}

/// Jaccard index of two evidence sets.
///
/// # Examples
///
/// ```
/// use dramaturg_core::jaccard;
///
/// assert_eq!(jaccard(&["S01", "S02"], &["S02", "S03"]), 1.0 / 3.0);
/// ```
pub fn jaccard<S: AsRef<str>>(a: &[S], b: &[S]) -> f64 {
    let a = to_set(a);
    let b = to_set(b);
    let union = a.union(&b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(&b).count() as f64 / union as f64
}

fn to_set<S: AsRef<str>>(ids: &[S]) -> BTreeSet<&str> {
    ids.iter().map(AsRef::as_ref).collect()
}
