use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use super::domain::{Category, Question, QuestionSet, QuestionSetError, UserId};

/// Source of the ordered assessment question list.
#[async_trait]
pub trait QuestionSource: Send + Sync {
    async fn fetch_questions(&self) -> Result<Vec<Question>, ApiError>;
}

/// Read/write access to user records held by the external API.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// `Ok(None)` when the user does not exist.
    async fn fetch_user(&self, user_id: &UserId) -> Result<Option<UserRecord>, ApiError>;
    async fn store_user(&self, user_id: &UserId, record: &UserRecord) -> Result<(), ApiError>;
}

/// Fetch and validate the question set for a new session.
///
/// A failed fetch is an error, never an empty assessment.
pub async fn load_question_set<Q>(source: &Q) -> Result<QuestionSet, QuestionLoadError>
where
    Q: QuestionSource + ?Sized,
{
    let questions = source.fetch_questions().await?;
    debug!(count = questions.len(), "fetched assessment questions");
    Ok(QuestionSet::new(questions)?)
}

/// Opaque user record; fields other than the skill scores are carried through untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserRecord(Map<String, Value>);

impl UserRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(field.into(), value)
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.0.remove(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn skill_score(&self, category: Category) -> Option<f64> {
        self.0.get(category.field_name()).and_then(Value::as_f64)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for UserRecord {
    fn from(value: Map<String, Value>) -> Self {
        Self(value)
    }
}

/// Failure talking to the external API.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("{url} responded with status {status}")]
    Status { status: u16, url: String },
    #[error("unexpected response body: {0}")]
    Decode(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl ApiError {
    /// Timeouts, transport failures and 5xx responses may succeed on a later attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Timeout(_) | ApiError::Transport(_) => true,
            ApiError::Status { status, .. } => *status >= 500,
            ApiError::Decode(_) | ApiError::InvalidRequest(_) => false,
        }
    }
}

/// Why a session could not obtain its questions.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum QuestionLoadError {
    #[error("failed to fetch questions: {0}")]
    Network(#[from] ApiError),
    #[error("question set rejected: {0}")]
    Invalid(#[from] QuestionSetError),
}
