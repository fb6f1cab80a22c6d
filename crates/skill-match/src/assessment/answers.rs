use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::domain::{LikertLevel, QuestionId, QuestionSet};

/// In-memory mapping from question to the selected Likert level.
///
/// One answer per question; setting an answer again silently replaces the previous one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerStore {
    values: BTreeMap<QuestionId, LikertLevel>,
}

impl AnswerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a raw 1-5 selection, rejecting anything outside the scale.
    pub fn set_answer(&mut self, question_id: QuestionId, value: i64) -> Result<(), AnswerError> {
        let level = u8::try_from(value)
            .map_err(|_| AnswerError::OutOfRange(value))
            .and_then(LikertLevel::try_from)?;
        self.set_level(question_id, level);
        Ok(())
    }

    pub fn set_level(&mut self, question_id: QuestionId, level: LikertLevel) {
        self.values.insert(question_id, level);
    }

    pub fn get_answer(&self, question_id: &QuestionId) -> Option<LikertLevel> {
        self.values.get(question_id).copied()
    }

    pub fn contains(&self, question_id: &QuestionId) -> bool {
        self.values.contains_key(question_id)
    }

    /// True iff every question in the set has an answer.
    pub fn is_complete(&self, questions: &QuestionSet) -> bool {
        questions
            .iter()
            .all(|question| self.values.contains_key(&question.id))
    }

    /// Questions of the set that are still unanswered, in set order.
    pub fn missing(&self, questions: &QuestionSet) -> Vec<QuestionId> {
        questions
            .iter()
            .filter(|question| !self.values.contains_key(&question.id))
            .map(|question| question.id.clone())
            .collect()
    }

    /// Number of questions of the set that carry an answer.
    pub fn answered_in(&self, questions: &QuestionSet) -> usize {
        questions
            .iter()
            .filter(|question| self.values.contains_key(&question.id))
            .count()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn reset(&mut self) {
        self.values.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&QuestionId, LikertLevel)> + '_ {
        self.values.iter().map(|(id, level)| (id, *level))
    }
}

/// Rejected answer input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AnswerError {
    #[error("answer {0} is outside the 1-5 scale")]
    OutOfRange(i64),
}
