//! A/B/C-line rankings produced by the auditor.

use crate::{
    DiscovererOutput, Script, Tcc, calculate_a_line_interaction, calculate_heart_score,
    calculate_setup_payoff_density, calculate_spine_score,
};
use dramaturg_error::{SchemaError, SchemaErrorKind};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::{BTreeSet, HashSet};

/// A value the model may send either bare or wrapped in a list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    /// A single value
    One(T),
    /// A list of values
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    /// Flattens into a list.
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(value) => vec![value],
            OneOrMany::Many(values) => values,
        }
    }
}

fn string_or_list<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<OneOrMany<String>>::deserialize(deserializer)?;
    Ok(value.map(OneOrMany::into_vec))
}

/// Who pushes and who pushes back in a chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Forces {
    /// The driving character
    pub protagonist: String,
    /// The main opposing force
    pub primary_antagonist: String,
    /// Situational or shifting opposition; a bare string is read as one entry
    #[serde(default, deserialize_with = "string_or_list")]
    pub dynamic_antagonist: Option<Vec<String>>,
}

/// Sub-metrics behind a spine score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ALineReasoning {
    /// Scenes the chain appears in
    pub scene_count: usize,
    /// Share of evidence scenes with setup/payoff links
    pub setup_payoff_density: f64,
    /// Whether the chain drives the climax
    pub drives_climax: bool,
}

/// The main plot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ALineRanking {
    /// Ranked chain
    pub tcc_id: String,
    /// Chain objective
    #[serde(default)]
    pub super_objective: String,
    /// Importance score
    pub spine_score: f64,
    /// Score breakdown
    pub reasoning: ALineReasoning,
    /// Force analysis
    pub forces: Forces,
}

/// Sub-metrics behind a heart score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BLineReasoning {
    /// Relationship shifts along the chain
    #[serde(default)]
    pub relation_change_count: usize,
    /// Evidence overlap with the A-line
    pub a_line_interaction: f64,
    /// Thematic depth in [0, 1]
    #[serde(default)]
    pub theme_depth: f64,
    /// Emotional intensity in [0, 1]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emotional_intensity: Option<f64>,
    /// Whether the chain carries internal conflict
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal_conflict: Option<bool>,
}

/// An emotional subplot that feeds the main plot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BLineRanking {
    /// Ranked chain
    pub tcc_id: String,
    /// Chain objective
    #[serde(default)]
    pub super_objective: String,
    /// Importance score
    pub heart_score: f64,
    /// Score breakdown
    pub reasoning: BLineReasoning,
    /// Force analysis
    pub forces: Forces,
}

/// Sub-metrics behind a flavor score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CLineReasoning {
    /// Thematic relevance in [0, 1]
    pub thematic_relevance: f64,
    /// Whether the chain could be cut without harm
    pub removable: bool,
}

/// A colour thread.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CLineRanking {
    /// Ranked chain
    pub tcc_id: String,
    /// Chain objective
    #[serde(default)]
    pub super_objective: String,
    /// Importance score
    pub flavor_score: f64,
    /// Score breakdown
    pub reasoning: CLineReasoning,
    /// Force analysis
    pub forces: Forces,
}

/// Validated rankings: exactly one A-line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rankings {
    /// The main plot
    pub a_line: ALineRanking,
    /// Subplots
    #[serde(default)]
    pub b_lines: Vec<BLineRanking>,
    /// Colour threads
    #[serde(default)]
    pub c_lines: Vec<CLineRanking>,
}

impl Rankings {
    /// Every ranked chain id, A-line first.
    pub fn tcc_ids(&self) -> Vec<&str> {
        std::iter::once(self.a_line.tcc_id.as_str())
            .chain(self.b_lines.iter().map(|b| b.tcc_id.as_str()))
            .chain(self.c_lines.iter().map(|c| c.tcc_id.as_str()))
            .collect()
    }
}

/// Scene coverage of each line, computed from the rankings and chains.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AuditorMetrics {
    /// Scenes in the script
    pub total_scenes: usize,
    /// Share of scenes the A-line appears in
    pub a_line_coverage: f64,
    /// Share of scenes any B-line appears in
    pub b_line_coverage: f64,
    /// Share of scenes any C-line appears in
    pub c_line_coverage: f64,
}

impl AuditorMetrics {
    /// Computes coverage from the chains' evidence.
    pub fn compute(rankings: &Rankings, discovered: &DiscovererOutput, script: &Script) -> Self {
        let total_scenes = script.len();
        let coverage = |ids: &[&str]| -> f64 {
            if total_scenes == 0 {
                return 0.0;
            }
            let covered: BTreeSet<&str> = ids
                .iter()
                .filter_map(|id| discovered.tcc(id))
                .flat_map(|tcc| tcc.evidence_scenes().iter().map(String::as_str))
                .filter(|id| script.contains(id))
                .collect();
            covered.len() as f64 / total_scenes as f64
        };
        let b_ids: Vec<&str> = rankings.b_lines.iter().map(|b| b.tcc_id.as_str()).collect();
        let c_ids: Vec<&str> = rankings.c_lines.iter().map(|c| c.tcc_id.as_str()).collect();
        Self {
            total_scenes,
            a_line_coverage: coverage(&[rankings.a_line.tcc_id.as_str()]),
            b_line_coverage: coverage(&b_ids),
            c_line_coverage: coverage(&c_ids),
        }
    }
}

/// Stage 2 output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditorOutput {
    /// Validated rankings
    pub rankings: Rankings,
    /// Computed coverage
    pub metrics: AuditorMetrics,
}

/// Rankings as the model sent them, before any rule is applied.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawRankings {
    /// Should hold exactly one entry
    pub a_line: OneOrMany<ALineRanking>,
    /// Candidate subplots
    #[serde(default)]
    pub b_lines: Vec<BLineRanking>,
    /// Colour threads
    #[serde(default)]
    pub c_lines: Vec<CLineRanking>,
}

/// The auditor's response envelope.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawAuditorResponse {
    /// Unvalidated rankings
    pub rankings: RawRankings,
}

impl RawRankings {
    /// Applies the auditor rules and produces consistent rankings.
    ///
    /// Checks for exactly one A-line, known and unique chain ids, named forces
    /// and non-negative scores. The A-line's setup/payoff density and every
    /// B-line's interaction with the A-line are recomputed from the evidence,
    /// and scores are recomputed from the breakdowns. B-line candidates whose
    /// interaction is at or below `b_line_threshold` are moved to the C-lines.
    ///
    /// Returns the rankings and a note per reclassification.
    ///
    /// # Errors
    ///
    /// Returns the first broken rule.
    #[track_caller]
    pub fn resolve(
        self,
        discovered: &DiscovererOutput,
        script: &Script,
        b_line_threshold: f64,
    ) -> Result<(Rankings, Vec<String>), SchemaError> {
        let mut a_lines = self.a_line.into_vec();
        if a_lines.len() != 1 {
            return Err(SchemaError::new(SchemaErrorKind::ALineCount(a_lines.len())));
        }
        let mut a_line = a_lines.remove(0);

        let mut seen = HashSet::new();
        let entries = std::iter::once((&a_line.tcc_id, &a_line.forces))
            .chain(self.b_lines.iter().map(|b| (&b.tcc_id, &b.forces)))
            .chain(self.c_lines.iter().map(|c| (&c.tcc_id, &c.forces)));
        for (tcc_id, forces) in entries {
            if discovered.tcc(tcc_id).is_none() {
                return Err(SchemaError::new(SchemaErrorKind::UnknownTcc(tcc_id.clone())));
            }
            if !seen.insert(tcc_id.clone()) {
                return Err(SchemaError::new(SchemaErrorKind::DuplicateRanking(
                    tcc_id.clone(),
                )));
            }
            check_forces(tcc_id, forces)?;
        }

        check_non_negative(&a_line.tcc_id, "spine_score", a_line.spine_score)?;
        check_non_negative(
            &a_line.tcc_id,
            "setup_payoff_density",
            a_line.reasoning.setup_payoff_density,
        )?;
        for b in &self.b_lines {
            check_non_negative(&b.tcc_id, "heart_score", b.heart_score)?;
            check_non_negative(&b.tcc_id, "a_line_interaction", b.reasoning.a_line_interaction)?;
            check_non_negative(&b.tcc_id, "theme_depth", b.reasoning.theme_depth)?;
        }
        for c in &self.c_lines {
            check_non_negative(&c.tcc_id, "flavor_score", c.flavor_score)?;
            check_non_negative(&c.tcc_id, "thematic_relevance", c.reasoning.thematic_relevance)?;
        }

        let a_tcc = lookup(discovered, &a_line.tcc_id)?;
        a_line.reasoning.setup_payoff_density = calculate_setup_payoff_density(a_tcc, script);
        a_line.spine_score = calculate_spine_score(
            a_line.reasoning.scene_count,
            a_line.reasoning.setup_payoff_density,
            a_line.reasoning.drives_climax,
        );
        fill_objective(&mut a_line.super_objective, a_tcc);

        let mut notes = Vec::new();
        let mut b_lines = Vec::new();
        let mut c_lines = Vec::new();
        for mut b in self.b_lines {
            let tcc = lookup(discovered, &b.tcc_id)?;
            fill_objective(&mut b.super_objective, tcc);
            let interaction =
                calculate_a_line_interaction(tcc.evidence_scenes(), a_tcc.evidence_scenes());
            if interaction > b_line_threshold {
                b.reasoning.a_line_interaction = interaction;
                b.heart_score = calculate_heart_score(
                    b.reasoning.relation_change_count,
                    interaction,
                    b.reasoning.theme_depth,
                );
                b_lines.push(b);
            } else {
                notes.push(format!(
                    "{} moved from B-line to C-line: A-line interaction {:.2} <= {:.2}",
                    b.tcc_id, interaction, b_line_threshold
                ));
                c_lines.push(CLineRanking {
                    tcc_id: b.tcc_id,
                    super_objective: b.super_objective,
                    flavor_score: b.heart_score,
                    reasoning: CLineReasoning {
                        thematic_relevance: b.reasoning.theme_depth.clamp(0.0, 1.0),
                        removable: true,
                    },
                    forces: b.forces,
                });
            }
        }
        for mut c in self.c_lines {
            fill_objective(&mut c.super_objective, lookup(discovered, &c.tcc_id)?);
            c_lines.push(c);
        }

        for tcc in &discovered.tccs {
            if !seen.contains(tcc.tcc_id()) {
                notes.push(format!("{} was not ranked", tcc.tcc_id()));
            }
        }

        Ok((
            Rankings {
                a_line,
                b_lines,
                c_lines,
            },
            notes,
        ))
    }
}

fn lookup<'a>(discovered: &'a DiscovererOutput, tcc_id: &str) -> Result<&'a Tcc, SchemaError> {
    discovered
        .tcc(tcc_id)
        .ok_or_else(|| SchemaError::new(SchemaErrorKind::UnknownTcc(tcc_id.to_string())))
}

fn fill_objective(objective: &mut String, tcc: &Tcc) {
    if objective.trim().is_empty() {
        *objective = tcc.super_objective().clone();
    }
}

fn check_forces(tcc_id: &str, forces: &Forces) -> Result<(), SchemaError> {
    let fields = [
        ("protagonist", &forces.protagonist),
        ("primary_antagonist", &forces.primary_antagonist),
    ];
    for (field, value) in fields {
        if value.trim().is_empty() {
            return Err(SchemaError::new(SchemaErrorKind::EmptyForce {
                tcc_id: tcc_id.to_string(),
                field: field.to_string(),
            }));
        }
    }
    Ok(())
}

fn check_non_negative(tcc_id: &str, field: &str, value: f64) -> Result<(), SchemaError> {
    if value < 0.0 || value.is_nan() {
        return Err(SchemaError::new(SchemaErrorKind::NegativeScore {
            tcc_id: tcc_id.to_string(),
            field: field.to_string(),
            value,
        }));
    }
    Ok(())
}
