use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::response::Response;
use serde_json::{json, Value};

use crate::assessment::domain::{Category, Question, QuestionSet, UserId};
use crate::assessment::flow::{AssessmentFlow, Presentation};
use crate::assessment::repository::{ApiError, QuestionSource, UserDirectory, UserRecord};
use crate::assessment::scoring::{ScoringConfig, ScoringEngine, ScoringMode};
use crate::assessment::{assessment_router, AssessmentService};

/// Two questions: Q1 {technical 2, communication 1}, Q2 {technical 1, problem solving 3}.
pub(super) fn sample_questions() -> Vec<Question> {
    vec![
        Question::new(
            "1",
            "How comfortable are you writing production Rust?",
            [(Category::TechnicalSkill, 2.0), (Category::CommunicationSkill, 1.0)],
        ),
        Question::new(
            "2",
            "How often do you lead incident debugging?",
            [(Category::TechnicalSkill, 1.0), (Category::ProblemSolvingAbility, 3.0)],
        ),
    ]
}

pub(super) fn three_questions() -> Vec<Question> {
    let mut questions = sample_questions();
    questions.push(Question::new(
        "3",
        "How confident are you running threat models?",
        [(Category::SecurityAwareness, 1.0)],
    ));
    questions
}

pub(super) fn question_set(questions: Vec<Question>) -> QuestionSet {
    QuestionSet::new(questions).expect("valid question set")
}

pub(super) fn loaded_flow(presentation: Presentation, questions: Vec<Question>) -> AssessmentFlow {
    let mut flow = AssessmentFlow::new(presentation, ScoringEngine::default());
    let epoch = flow.epoch();
    flow.load(epoch, question_set(questions))
        .expect("load succeeds");
    flow
}

pub(super) fn user_record() -> UserRecord {
    UserRecord::from(
        json!({
            "username": "sora",
            "email": "sora@example.com",
            "password": "pbkdf2$secret",
            "backend_skill": 55,
        })
        .as_object()
        .cloned()
        .expect("object literal"),
    )
}

/// Question source that answers every fetch with the same result, counting calls.
pub(super) struct StaticQuestions {
    result: Mutex<Result<Vec<Question>, ApiError>>,
    calls: Mutex<usize>,
}

impl StaticQuestions {
    pub(super) fn ok(questions: Vec<Question>) -> Self {
        Self {
            result: Mutex::new(Ok(questions)),
            calls: Mutex::new(0),
        }
    }

    pub(super) fn failing(error: ApiError) -> Self {
        Self {
            result: Mutex::new(Err(error)),
            calls: Mutex::new(0),
        }
    }

    pub(super) fn set(&self, result: Result<Vec<Question>, ApiError>) {
        *self.result.lock().expect("question mutex poisoned") = result;
    }

    pub(super) fn calls(&self) -> usize {
        *self.calls.lock().expect("question mutex poisoned")
    }
}

#[async_trait]
impl QuestionSource for StaticQuestions {
    async fn fetch_questions(&self) -> Result<Vec<Question>, ApiError> {
        *self.calls.lock().expect("question mutex poisoned") += 1;
        self.result.lock().expect("question mutex poisoned").clone()
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryDirectory {
    pub(super) users: Arc<Mutex<HashMap<UserId, UserRecord>>>,
    puts: Arc<Mutex<Vec<(UserId, UserRecord)>>>,
    fail_writes: bool,
}

impl MemoryDirectory {
    pub(super) fn with_user(user_id: &str, record: UserRecord) -> Self {
        let directory = Self::default();
        directory
            .users
            .lock()
            .expect("directory mutex poisoned")
            .insert(UserId(user_id.to_string()), record);
        directory
    }

    pub(super) fn read_only(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    pub(super) fn puts(&self) -> Vec<(UserId, UserRecord)> {
        self.puts.lock().expect("directory mutex poisoned").clone()
    }

    pub(super) fn user(&self, user_id: &str) -> Option<UserRecord> {
        self.users
            .lock()
            .expect("directory mutex poisoned")
            .get(&UserId(user_id.to_string()))
            .cloned()
    }
}

#[async_trait]
impl UserDirectory for MemoryDirectory {
    async fn fetch_user(&self, user_id: &UserId) -> Result<Option<UserRecord>, ApiError> {
        Ok(self
            .users
            .lock()
            .expect("directory mutex poisoned")
            .get(user_id)
            .cloned())
    }

    async fn store_user(&self, user_id: &UserId, record: &UserRecord) -> Result<(), ApiError> {
        if self.fail_writes {
            return Err(ApiError::Status {
                status: 503,
                url: format!("memory://user/{user_id}"),
            });
        }
        self.puts
            .lock()
            .expect("directory mutex poisoned")
            .push((user_id.clone(), record.clone()));
        self.users
            .lock()
            .expect("directory mutex poisoned")
            .insert(user_id.clone(), record.clone());
        Ok(())
    }
}

pub(super) fn build_service(
    questions: StaticQuestions,
    directory: MemoryDirectory,
    presentation: Presentation,
) -> (
    AssessmentService<StaticQuestions, MemoryDirectory>,
    Arc<StaticQuestions>,
    MemoryDirectory,
) {
    let questions = Arc::new(questions);
    let service = AssessmentService::new(
        questions.clone(),
        Arc::new(directory.clone()),
        ScoringConfig::new(ScoringMode::WeightedNormalized),
        presentation,
    );
    (service, questions, directory)
}

pub(super) fn router_with_service(
    service: AssessmentService<StaticQuestions, MemoryDirectory>,
) -> axum::Router {
    assessment_router(Arc::new(service))
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
