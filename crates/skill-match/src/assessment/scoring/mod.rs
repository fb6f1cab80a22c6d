mod config;
mod rules;

pub use config::{ScoringConfig, ScoringMode};

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::answers::AnswerStore;
use super::domain::{Category, LikertLevel, Question, QuestionId, QuestionSet};

/// Stateless scorer that folds a complete answer set into a skill profile.
#[derive(Debug, Clone, Default)]
pub struct ScoringEngine {
    config: ScoringConfig,
}

impl ScoringEngine {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn with_mode(mode: ScoringMode) -> Self {
        Self::new(ScoringConfig::new(mode))
    }

    pub fn mode(&self) -> ScoringMode {
        self.config.mode
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Score the answers; refuses to run on a partial answer set.
    ///
    /// Questions are folded in id order so the result does not depend on presentation order,
    /// including the last bits of floating point sums.
    pub fn compute_profile(
        &self,
        questions: &QuestionSet,
        answers: &AnswerStore,
    ) -> Result<SkillProfile, ScoringError> {
        let missing = answers.missing(questions);
        if !missing.is_empty() {
            return Err(ScoringError::IncompleteAssessment { missing });
        }

        let mut answered: Vec<(&Question, LikertLevel)> = questions
            .iter()
            .filter_map(|question| {
                answers
                    .get_answer(&question.id)
                    .map(|answer| (question, answer))
            })
            .collect();
        answered.sort_by(|left, right| left.0.id.cmp(&right.0.id));

        let categories: BTreeSet<Category> = self
            .config
            .baseline
            .iter()
            .copied()
            .chain(questions.categories())
            .collect();

        let scores = match self.config.mode {
            ScoringMode::WeightedNormalized => rules::weighted_normalized(&answered, &categories),
            ScoringMode::Multiplicative => rules::multiplicative(&answered, &categories),
        };

        Ok(SkillProfile {
            mode: self.config.mode,
            scores,
        })
    }
}

/// Convenience entry point mirroring `ScoringEngine::compute_profile` with the default baseline.
pub fn compute_profile(
    questions: &QuestionSet,
    answers: &AnswerStore,
    mode: ScoringMode,
) -> Result<SkillProfile, ScoringError> {
    ScoringEngine::with_mode(mode).compute_profile(questions, answers)
}

/// Per-category outcome, keeping the totals behind the score for audits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryScore {
    /// Unrounded score; persisted as-is.
    pub score: f64,
    pub raw_total: f64,
    /// All-expert total; absent in multiplicative mode.
    pub max_total: Option<f64>,
    pub contributing_questions: usize,
}

impl CategoryScore {
    pub(crate) fn zeroed() -> Self {
        Self {
            score: 0.0,
            raw_total: 0.0,
            max_total: Some(0.0),
            contributing_questions: 0,
        }
    }

    pub(crate) fn unit() -> Self {
        Self {
            score: 1.0,
            raw_total: 1.0,
            max_total: None,
            contributing_questions: 0,
        }
    }

    /// False for baseline categories that no question weighted.
    pub fn is_measured(&self) -> bool {
        self.contributing_questions > 0
    }

    pub fn rounded(&self) -> i64 {
        self.score.round() as i64
    }
}

/// Computed skill scores for one completed assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillProfile {
    pub mode: ScoringMode,
    pub scores: BTreeMap<Category, CategoryScore>,
}

impl SkillProfile {
    pub fn score(&self, category: Category) -> Option<f64> {
        self.scores.get(&category).map(|entry| entry.score)
    }

    /// Scores rounded to whole numbers for display.
    pub fn display_scores(&self) -> BTreeMap<Category, i64> {
        self.scores
            .iter()
            .map(|(category, entry)| (*category, entry.rounded()))
            .collect()
    }

    pub fn categories(&self) -> impl Iterator<Item = Category> + '_ {
        self.scores.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }
}

/// Error raised when scoring preconditions do not hold.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScoringError {
    #[error("assessment incomplete: {} question(s) unanswered", missing.len())]
    IncompleteAssessment { missing: Vec<QuestionId> },
}
