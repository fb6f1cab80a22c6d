//! End-to-end scenarios against a loopback stand-in for the external REST API.
//!
//! The reqwest client, result submitter, and assessment service are exercised through the
//! public crate surface only.

mod common {
    use std::collections::HashMap;
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use axum::extract::{Path, State};
    use axum::http::StatusCode;
    use axum::response::{IntoResponse, Response};
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::{json, Value};

    use skill_match::assessment::ApiClient;
    use skill_match::config::ApiConfig;

    #[derive(Default)]
    pub(super) struct MockApi {
        pub(super) users: Mutex<HashMap<String, Value>>,
        pub(super) puts: Mutex<Vec<(String, Value)>>,
        pub(super) question_calls: AtomicUsize,
        pub(super) question_failures: AtomicUsize,
        pub(super) question_delay: Mutex<Option<Duration>>,
    }

    impl MockApi {
        pub(super) fn with_user(self, user_id: &str, record: Value) -> Self {
            self.users
                .lock()
                .expect("mock mutex poisoned")
                .insert(user_id.to_string(), record);
            self
        }

        pub(super) fn failing_question_fetches(self, failures: usize) -> Self {
            self.question_failures.store(failures, Ordering::SeqCst);
            self
        }

        pub(super) fn slow_questions(self, delay: Duration) -> Self {
            *self.question_delay.lock().expect("mock mutex poisoned") = Some(delay);
            self
        }

        pub(super) fn puts(&self) -> Vec<(String, Value)> {
            self.puts.lock().expect("mock mutex poisoned").clone()
        }

        pub(super) fn question_calls(&self) -> usize {
            self.question_calls.load(Ordering::SeqCst)
        }
    }

    pub(super) fn questions_payload() -> Value {
        json!([
            {
                "Question_ID": 1,
                "Text": "How comfortable are you shipping backend services?",
                "technical_skill": 1,
                "communication_skill": 0,
                "created_by": "seed"
            },
            {
                "Question_ID": 2,
                "Text": "How often do you review other people's designs?",
                "technical_skill": 2
            },
            {
                "Question_ID": "3",
                "Text": "How clearly do you explain trade-offs to stakeholders?",
                "communication_skill": true
            }
        ])
    }

    async fn questions(State(api): State<Arc<MockApi>>) -> Response {
        api.question_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *api.question_delay.lock().expect("mock mutex poisoned");
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let failing = api
            .question_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| {
                left.checked_sub(1)
            })
            .is_ok();
        if failing {
            return StatusCode::SERVICE_UNAVAILABLE.into_response();
        }
        Json(questions_payload()).into_response()
    }

    async fn fetch_user(State(api): State<Arc<MockApi>>, Path(user_id): Path<String>) -> Response {
        let users = api.users.lock().expect("mock mutex poisoned");
        match users.get(&user_id) {
            Some(record) => Json(record.clone()).into_response(),
            None => (StatusCode::NOT_FOUND, Json(json!({ "detail": "Not found." }))).into_response(),
        }
    }

    async fn store_user(
        State(api): State<Arc<MockApi>>,
        Path(user_id): Path<String>,
        Json(record): Json<Value>,
    ) -> Response {
        api.puts
            .lock()
            .expect("mock mutex poisoned")
            .push((user_id.clone(), record.clone()));
        if user_id == "locked" {
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
        api.users
            .lock()
            .expect("mock mutex poisoned")
            .insert(user_id, record.clone());
        Json(record).into_response()
    }

    pub(super) async fn spawn(api: MockApi) -> (SocketAddr, Arc<MockApi>) {
        let api = Arc::new(api);
        let router = Router::new()
            .route("/api/questions", get(questions))
            .route("/api/user/:user_id", get(fetch_user).put(store_user))
            .with_state(api.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind loopback");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, router).await.expect("mock api runs");
        });
        (addr, api)
    }

    pub(super) fn client(addr: SocketAddr, timeout: Duration, get_retries: u8) -> ApiClient {
        ApiClient::new(&ApiConfig {
            base_url: format!("http://{addr}/api"),
            timeout,
            get_retries,
        })
        .expect("client builds")
        .with_backoff(Duration::from_millis(10))
    }
}

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeZone, Utc};
use serde_json::json;

use common::*;
use skill_match::assessment::{
    compute_profile, load_question_set, AnswerStore, ApiError, AssessmentService, Category,
    Presentation, QuestionId, QuestionLoadError, QuestionSource, ResultSubmitter,
    ScoringConfig, ScoringMode, SessionContext, SubmitError, UserDirectory, UserId,
};

fn scenario_answers() -> AnswerStore {
    let mut answers = AnswerStore::new();
    for (id, value) in [("1", 5), ("2", 3), ("3", 4)] {
        answers
            .set_answer(QuestionId::from(id), value)
            .expect("valid answer");
    }
    answers
}

#[tokio::test]
async fn client_decodes_loosely_typed_question_rows() {
    let (addr, api) = spawn(MockApi::default()).await;
    let client = client(addr, Duration::from_secs(2), 0);

    let questions = load_question_set(&client).await.expect("questions load");

    assert_eq!(questions.len(), 3);
    let ids: Vec<String> = questions.iter().map(|question| question.id.0.clone()).collect();
    assert_eq!(ids, vec!["1", "2", "3"]);
    let first = questions.get(0).expect("first question");
    assert_eq!(first.weight(Category::TechnicalSkill), 1.0);
    assert_eq!(first.weight(Category::CommunicationSkill), 0.0);
    assert_eq!(
        questions
            .get(2)
            .map(|question| question.weight(Category::CommunicationSkill)),
        Some(1.0)
    );

    let profile = compute_profile(&questions, &scenario_answers(), ScoringMode::WeightedNormalized)
        .expect("scores");
    let technical = profile.score(Category::TechnicalSkill).expect("technical");
    assert!((technical - 11.0 / 15.0 * 100.0).abs() < 1e-9);
    assert_eq!(profile.score(Category::CommunicationSkill), Some(80.0));
    assert_eq!(api.question_calls(), 1);
}

#[tokio::test]
async fn idempotent_reads_are_retried_after_server_errors() {
    let (addr, api) = spawn(MockApi::default().failing_question_fetches(1)).await;
    let client = client(addr, Duration::from_secs(2), 1);

    let questions = client.fetch_questions().await.expect("second attempt succeeds");

    assert_eq!(questions.len(), 3);
    assert_eq!(api.question_calls(), 2);
}

#[tokio::test]
async fn reads_fail_once_retries_are_exhausted() {
    let (addr, api) = spawn(MockApi::default().failing_question_fetches(5)).await;
    let client = client(addr, Duration::from_secs(2), 1);

    match load_question_set(&client).await {
        Err(QuestionLoadError::Network(ApiError::Status { status: 503, .. })) => {}
        other => panic!("expected upstream status error, got {other:?}"),
    }
    assert_eq!(api.question_calls(), 2);
}

#[tokio::test]
async fn slow_responses_time_out() {
    let (addr, _) = spawn(MockApi::default().slow_questions(Duration::from_millis(500))).await;
    let client = client(addr, Duration::from_millis(100), 0);

    match client.fetch_questions().await {
        Err(ApiError::Timeout(limit)) => assert_eq!(limit, Duration::from_millis(100)),
        other => panic!("expected timeout, got {other:?}"),
    }
}

#[tokio::test]
async fn missing_users_resolve_to_none() {
    let (addr, _) = spawn(MockApi::default()).await;
    let client = client(addr, Duration::from_secs(2), 1);

    let record = client
        .fetch_user(&UserId("nobody".to_string()))
        .await
        .expect("404 is not an error");

    assert!(record.is_none());
}

#[tokio::test]
async fn saving_for_an_unknown_user_performs_no_put() {
    let (addr, api) = spawn(MockApi::default()).await;
    let client = Arc::new(client(addr, Duration::from_secs(2), 1));
    let questions = load_question_set(client.as_ref()).await.expect("questions");
    let profile = compute_profile(&questions, &scenario_answers(), ScoringMode::WeightedNormalized)
        .expect("scores");

    let submitter = ResultSubmitter::new(client);
    match submitter
        .save_profile(&UserId("nobody".to_string()), &profile)
        .await
    {
        Err(SubmitError::UserNotFound(user)) => assert_eq!(user.0, "nobody"),
        other => panic!("expected user not found, got {other:?}"),
    }
    assert!(api.puts().is_empty());
}

#[tokio::test]
async fn saving_merges_scores_into_the_existing_record() {
    let (addr, api) = spawn(MockApi::default().with_user(
        "42",
        json!({
            "id": 42,
            "username": "ren",
            "password": "argon2$hash",
            "frontend_skill": 61.5,
        }),
    ))
    .await;
    let client = Arc::new(client(addr, Duration::from_secs(2), 1));
    let questions = load_question_set(client.as_ref()).await.expect("questions");
    let profile = compute_profile(&questions, &scenario_answers(), ScoringMode::WeightedNormalized)
        .expect("scores");
    let assessed_at = Utc
        .with_ymd_and_hms(2025, 6, 2, 14, 0, 0)
        .single()
        .expect("valid timestamp");

    let committed = ResultSubmitter::new(client)
        .save_profile_at(&UserId("42".to_string()), &profile, assessed_at)
        .await
        .expect("saved");
    assert_eq!(committed.assessed_at, assessed_at);

    let puts = api.puts();
    assert_eq!(puts.len(), 1);
    let (user_id, body) = &puts[0];
    assert_eq!(user_id, "42");
    assert_eq!(body["username"], json!("ren"));
    assert_eq!(body["frontend_skill"], json!(61.5));
    assert_eq!(body["communication_skill"], json!(80.0));
    assert_eq!(body["last_assessment_date"], json!("2025-06-02T14:00:00.000Z"));
    assert!(body.get("password").is_none());
    let technical = body["technical_skill"].as_f64().expect("unrounded score");
    assert!((technical - 73.333_333_333).abs() < 1e-6);
}

#[tokio::test]
async fn failed_writes_are_not_retried() {
    let (addr, api) = spawn(MockApi::default().with_user("locked", json!({ "username": "kai" }))).await;
    let client = Arc::new(client(addr, Duration::from_secs(2), 3));
    let questions = load_question_set(client.as_ref()).await.expect("questions");
    let profile = compute_profile(&questions, &scenario_answers(), ScoringMode::WeightedNormalized)
        .expect("scores");

    match ResultSubmitter::new(client)
        .save_profile(&UserId("locked".to_string()), &profile)
        .await
    {
        Err(SubmitError::Persistence(ApiError::Status { status: 500, .. })) => {}
        other => panic!("expected persistence failure, got {other:?}"),
    }
    assert_eq!(api.puts().len(), 1);
}

#[tokio::test]
async fn service_runs_a_session_against_the_live_client() {
    let (addr, api) = spawn(MockApi::default().with_user("42", json!({ "username": "ren" }))).await;
    let client = Arc::new(client(addr, Duration::from_secs(2), 1));
    let service = AssessmentService::new(
        client.clone(),
        client,
        ScoringConfig::new(ScoringMode::WeightedNormalized),
        Presentation::AutoAdvance,
    );

    let snapshot = service
        .start(SessionContext::new("42"))
        .await
        .expect("session starts");
    let session_id = snapshot.session_id;
    for value in [5, 3, 4] {
        service
            .answer(
                &session_id,
                &service
                    .snapshot(&session_id)
                    .expect("snapshot")
                    .current
                    .expect("current question")
                    .id,
                value,
            )
            .expect("answer accepted");
    }

    let snapshot = service.snapshot(&session_id).expect("snapshot");
    assert_eq!(snapshot.state, "complete");
    let profile = snapshot.profile.expect("profile");
    assert_eq!(profile.display[&Category::TechnicalSkill], 73);

    service.save(&session_id).await.expect("saved");
    let puts = api.puts();
    assert_eq!(puts.len(), 1);
    assert_eq!(puts[0].1["communication_skill"], json!(80.0));
}
