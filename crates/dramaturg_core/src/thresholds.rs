//! Heuristic thresholds used by validation and ranking.

use derive_getters::Getters;
use dramaturg_error::ConfigError;
use serde::{Deserialize, Serialize};

/// Tunable cut-offs for the heuristic checks.
///
/// # Examples
///
/// ```
/// use dramaturg_core::Thresholds;
///
/// let thresholds = Thresholds::default();
/// assert_eq!(*thresholds.mirror_overlap(), 0.7);
/// assert_eq!(*thresholds.b_line_interaction(), 0.3);
///
/// let strict = Thresholds::builder().b_line_interaction(0.5).build();
/// assert!(strict.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Getters)]
#[serde(deny_unknown_fields)]
pub struct Thresholds {
    /// Jaccard overlap above which two chains are flagged as possible mirrors.
    #[serde(default = "default_mirror_overlap")]
    mirror_overlap: f64,

    /// Min-normalised overlap at or above which two chains are merged.
    #[serde(default = "default_mirror_merge")]
    mirror_merge: f64,

    /// A B-line must interact with the A-line strictly above this.
    #[serde(default = "default_b_line_interaction")]
    b_line_interaction: f64,

    /// Share of scenes without setup/payoff data that triggers fallback mode.
    #[serde(default = "default_fallback_missing_ratio")]
    fallback_missing_ratio: f64,
}

fn default_mirror_overlap() -> f64 {
    0.7
}

fn default_mirror_merge() -> f64 {
    0.9
}

fn default_b_line_interaction() -> f64 {
    0.3
}

fn default_fallback_missing_ratio() -> f64 {
    0.5
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            mirror_overlap: default_mirror_overlap(),
            mirror_merge: default_mirror_merge(),
            b_line_interaction: default_b_line_interaction(),
            fallback_missing_ratio: default_fallback_missing_ratio(),
        }
    }
}

impl Thresholds {
    /// Creates a new thresholds builder.
    pub fn builder() -> ThresholdsBuilder {
        ThresholdsBuilder::default()
    }

    /// Checks that every threshold is a ratio in [0, 1].
    ///
    /// # Errors
    ///
    /// Returns an error naming the first out-of-range threshold.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fields = [
            ("mirror_overlap", self.mirror_overlap),
            ("mirror_merge", self.mirror_merge),
            ("b_line_interaction", self.b_line_interaction),
            ("fallback_missing_ratio", self.fallback_missing_ratio),
        ];
        for (name, value) in fields {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::new(format!(
                    "thresholds.{} must be in [0, 1], got {}",
                    name, value
                )));
            }
        }
        Ok(())
    }
}

/// Builder for [`Thresholds`]; unset fields keep their defaults.
#[derive(Debug, Default)]
pub struct ThresholdsBuilder {
    mirror_overlap: Option<f64>,
    mirror_merge: Option<f64>,
    b_line_interaction: Option<f64>,
    fallback_missing_ratio: Option<f64>,
}

impl ThresholdsBuilder {
    /// Sets the mirror warning threshold.
    pub fn mirror_overlap(mut self, value: f64) -> Self {
        self.mirror_overlap = Some(value);
        self
    }

    /// Sets the mirror merge threshold.
    pub fn mirror_merge(mut self, value: f64) -> Self {
        self.mirror_merge = Some(value);
        self
    }

    /// Sets the B-line interaction threshold.
    pub fn b_line_interaction(mut self, value: f64) -> Self {
        self.b_line_interaction = Some(value);
        self
    }

    /// Sets the fallback-mode trigger ratio.
    pub fn fallback_missing_ratio(mut self, value: f64) -> Self {
        self.fallback_missing_ratio = Some(value);
        self
    }

    /// Builds the thresholds.
    pub fn build(self) -> Thresholds {
        let defaults = Thresholds::default();
        Thresholds {
            mirror_overlap: self.mirror_overlap.unwrap_or(defaults.mirror_overlap),
            mirror_merge: self.mirror_merge.unwrap_or(defaults.mirror_merge),
            b_line_interaction: self
                .b_line_interaction
                .unwrap_or(defaults.b_line_interaction),
            fallback_missing_ratio: self
                .fallback_missing_ratio
                .unwrap_or(defaults.fallback_missing_ratio),
        }
    }
}
