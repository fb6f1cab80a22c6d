use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::super::domain::Category;

/// How answers are folded into category scores.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScoringMode {
    /// Σ(answer × weight) over Σ(5 × weight), as a percentage capped at 100.
    #[default]
    WeightedNormalized,
    /// Starts at 1 and multiplies by every contributing answer. Unbounded.
    Multiplicative,
}

impl ScoringMode {
    pub const fn label(self) -> &'static str {
        match self {
            ScoringMode::WeightedNormalized => "weighted-normalized",
            ScoringMode::Multiplicative => "multiplicative",
        }
    }
}

impl fmt::Display for ScoringMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ScoringMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "weighted" | "weighted-normalized" | "weighted_normalized" | "normalized" => {
                Ok(ScoringMode::WeightedNormalized)
            }
            "multiplicative" | "legacy" => Ok(ScoringMode::Multiplicative),
            other => Err(format!("unknown scoring mode '{other}'")),
        }
    }
}

/// Rubric settings for the scoring engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoringConfig {
    pub mode: ScoringMode,
    /// Categories reported even when no question weights them.
    pub baseline: BTreeSet<Category>,
}

impl ScoringConfig {
    pub fn new(mode: ScoringMode) -> Self {
        Self {
            mode,
            baseline: Category::CORE.into_iter().collect(),
        }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self::new(ScoringMode::default())
    }
}
