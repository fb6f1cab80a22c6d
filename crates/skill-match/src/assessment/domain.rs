use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use super::answers::AnswerError;

/// Identifier wrapper for assessment questions (`Question_ID` on the wire).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuestionId(pub String);

impl fmt::Display for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for QuestionId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Identifier of a user record held by the external API.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of the person taking an assessment, injected instead of read from ambient storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    pub user_id: UserId,
}

impl SessionContext {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: UserId(user_id.into()),
        }
    }
}

/// Skill categories a question can contribute to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    TechnicalSkill,
    ProblemSolvingAbility,
    CommunicationSkill,
    SecurityAwareness,
    LeadershipAndCollaboration,
    FrontendSkill,
    BackendSkill,
    InfrastructureSkill,
}

impl Category {
    pub const ALL: [Category; 8] = [
        Category::TechnicalSkill,
        Category::ProblemSolvingAbility,
        Category::CommunicationSkill,
        Category::SecurityAwareness,
        Category::LeadershipAndCollaboration,
        Category::FrontendSkill,
        Category::BackendSkill,
        Category::InfrastructureSkill,
    ];

    /// Categories every profile reports, whether or not a question touches them.
    pub const CORE: [Category; 5] = [
        Category::TechnicalSkill,
        Category::ProblemSolvingAbility,
        Category::CommunicationSkill,
        Category::SecurityAwareness,
        Category::LeadershipAndCollaboration,
    ];

    /// Field name used by question rows and user records.
    pub const fn field_name(self) -> &'static str {
        match self {
            Category::TechnicalSkill => "technical_skill",
            Category::ProblemSolvingAbility => "problem_solving_ability",
            Category::CommunicationSkill => "communication_skill",
            Category::SecurityAwareness => "security_awareness",
            Category::LeadershipAndCollaboration => "leadership_and_collaboration",
            Category::FrontendSkill => "frontend_skill",
            Category::BackendSkill => "backend_skill",
            Category::InfrastructureSkill => "infrastructure_skill",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Category::TechnicalSkill => "Technical Skill",
            Category::ProblemSolvingAbility => "Problem Solving Ability",
            Category::CommunicationSkill => "Communication Skill",
            Category::SecurityAwareness => "Security Awareness",
            Category::LeadershipAndCollaboration => "Leadership and Collaboration",
            Category::FrontendSkill => "Frontend Skill",
            Category::BackendSkill => "Backend Skill",
            Category::InfrastructureSkill => "Infrastructure Skill",
        }
    }

    pub fn from_field_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|category| category.field_name() == name)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.field_name())
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::from_field_name(value.trim()).ok_or_else(|| format!("unknown category '{value}'"))
    }
}

/// Five-point self-assessment scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum LikertLevel {
    Basic = 1,
    Beginner = 2,
    Intermediate = 3,
    Advanced = 4,
    Expert = 5,
}

impl LikertLevel {
    pub const MAX: LikertLevel = LikertLevel::Expert;

    pub const ALL: [LikertLevel; 5] = [
        LikertLevel::Basic,
        LikertLevel::Beginner,
        LikertLevel::Intermediate,
        LikertLevel::Advanced,
        LikertLevel::Expert,
    ];

    pub const fn value(self) -> u8 {
        self as u8
    }

    pub const fn label(self) -> &'static str {
        match self {
            LikertLevel::Basic => "basic",
            LikertLevel::Beginner => "beginner",
            LikertLevel::Intermediate => "intermediate",
            LikertLevel::Advanced => "advanced",
            LikertLevel::Expert => "expert",
        }
    }
}

impl From<LikertLevel> for u8 {
    fn from(level: LikertLevel) -> Self {
        level.value()
    }
}

impl TryFrom<u8> for LikertLevel {
    type Error = AnswerError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(LikertLevel::Basic),
            2 => Ok(LikertLevel::Beginner),
            3 => Ok(LikertLevel::Intermediate),
            4 => Ok(LikertLevel::Advanced),
            5 => Ok(LikertLevel::Expert),
            other => Err(AnswerError::OutOfRange(other.into())),
        }
    }
}

/// Assessment question with the per-category weights it contributes.
///
/// Only strictly positive weights are stored; a missing category means no contribution.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "QuestionPayload")]
pub struct Question {
    pub id: QuestionId,
    pub text: String,
    pub weights: BTreeMap<Category, f64>,
}

impl Question {
    pub fn new(
        id: impl Into<String>,
        text: impl Into<String>,
        weights: impl IntoIterator<Item = (Category, f64)>,
    ) -> Self {
        Self {
            id: QuestionId(id.into()),
            text: text.into(),
            weights: weights
                .into_iter()
                .filter(|(_, weight)| *weight > 0.0)
                .collect(),
        }
    }

    pub fn weight(&self, category: Category) -> f64 {
        self.weights.get(&category).copied().unwrap_or(0.0)
    }
}

/// Loosely-typed question row as served by `GET /questions`.
#[derive(Debug, Deserialize)]
struct QuestionPayload {
    #[serde(rename = "Question_ID")]
    id: RawQuestionId,
    #[serde(rename = "Text", default)]
    text: String,
    #[serde(flatten)]
    fields: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawQuestionId {
    Number(Number),
    Text(String),
}

impl TryFrom<QuestionPayload> for Question {
    type Error = QuestionSetError;

    fn try_from(payload: QuestionPayload) -> Result<Self, Self::Error> {
        let id = match payload.id {
            RawQuestionId::Number(number) => QuestionId(number.to_string()),
            RawQuestionId::Text(text) => QuestionId(text.trim().to_string()),
        };

        let mut weights = BTreeMap::new();
        for (field, value) in &payload.fields {
            let Some(category) = Category::from_field_name(field) else {
                continue;
            };
            let weight = match value {
                Value::Number(number) => number.as_f64().unwrap_or(f64::NAN),
                Value::Bool(true) => 1.0,
                Value::Bool(false) | Value::Null => 0.0,
                _ => continue,
            };
            if !weight.is_finite() || weight < 0.0 {
                return Err(QuestionSetError::InvalidWeight {
                    question: id,
                    category,
                    weight,
                });
            }
            if weight > 0.0 {
                weights.insert(category, weight);
            }
        }

        Ok(Question {
            id,
            text: payload.text,
            weights,
        })
    }
}

/// Ordered, id-unique set of questions for one assessment session.
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionSet {
    questions: Vec<Question>,
    positions: HashMap<QuestionId, usize>,
}

impl QuestionSet {
    pub fn new(questions: Vec<Question>) -> Result<Self, QuestionSetError> {
        if questions.is_empty() {
            return Err(QuestionSetError::Empty);
        }

        let mut positions = HashMap::with_capacity(questions.len());
        for (index, question) in questions.iter().enumerate() {
            if positions.insert(question.id.clone(), index).is_some() {
                return Err(QuestionSetError::DuplicateId(question.id.clone()));
            }
        }

        // all-expert totals per category must stay finite for normalisation to hold
        let max_answer = f64::from(LikertLevel::MAX.value());
        let mut ceilings: BTreeMap<Category, f64> = BTreeMap::new();
        for question in &questions {
            for (category, weight) in &question.weights {
                if !weight.is_finite() || *weight < 0.0 {
                    return Err(QuestionSetError::InvalidWeight {
                        question: question.id.clone(),
                        category: *category,
                        weight: *weight,
                    });
                }
                *ceilings.entry(*category).or_insert(0.0) += max_answer * weight;
            }
        }
        if let Some(category) = ceilings
            .iter()
            .find_map(|(category, ceiling)| (!ceiling.is_finite()).then_some(*category))
        {
            return Err(QuestionSetError::WeightOverflow(category));
        }

        Ok(Self {
            questions,
            positions,
        })
    }

    /// Decodes a JSON array in the `GET /questions` wire shape.
    pub fn from_json(raw: &str) -> Result<Self, QuestionSetError> {
        let questions: Vec<Question> = serde_json::from_str(raw)
            .map_err(|err| QuestionSetError::Malformed(err.to_string()))?;
        Self::new(questions)
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }

    pub fn position(&self, id: &QuestionId) -> Option<usize> {
        self.positions.get(id).copied()
    }

    pub fn question(&self, id: &QuestionId) -> Option<&Question> {
        self.position(id).and_then(|index| self.questions.get(index))
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Question> {
        self.questions.iter()
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    /// Categories that at least one question weights above zero.
    pub fn categories(&self) -> BTreeSet<Category> {
        self.questions
            .iter()
            .flat_map(|question| question.weights.keys().copied())
            .collect()
    }
}

impl<'a> IntoIterator for &'a QuestionSet {
    type Item = &'a Question;
    type IntoIter = std::slice::Iter<'a, Question>;

    fn into_iter(self) -> Self::IntoIter {
        self.questions.iter()
    }
}

/// Reasons a fetched question list cannot back an assessment.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum QuestionSetError {
    #[error("question set is empty")]
    Empty,
    #[error("question {0} appears more than once")]
    DuplicateId(QuestionId),
    #[error("question {question} has invalid {category} weight {weight}; weights must be finite and non-negative")]
    InvalidWeight {
        question: QuestionId,
        category: Category,
        weight: f64,
    },
    #[error("{0} weights are too large to score")]
    WeightOverflow(Category),
    #[error("malformed question payload: {0}")]
    Malformed(String),
}
