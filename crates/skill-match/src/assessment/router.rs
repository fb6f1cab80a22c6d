use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use super::domain::{QuestionId, SessionContext};
use super::flow::FlowError;
use super::repository::{QuestionSource, UserDirectory};
use super::scoring::ScoringError;
use super::service::{AssessmentService, AssessmentServiceError, SessionId, SessionSnapshot};
use super::submitter::SubmitError;

type SharedService<Q, U> = Arc<AssessmentService<Q, U>>;

/// Router exposing assessment sessions over HTTP.
pub fn assessment_router<Q, U>(service: SharedService<Q, U>) -> Router
where
    Q: QuestionSource + 'static,
    U: UserDirectory + 'static,
{
    Router::new()
        .route("/api/v1/assessments", post(start_handler::<Q, U>))
        .route(
            "/api/v1/assessments/:session_id",
            get(snapshot_handler::<Q, U>).delete(abandon_handler::<Q, U>),
        )
        .route(
            "/api/v1/assessments/:session_id/answers",
            put(answer_handler::<Q, U>),
        )
        .route(
            "/api/v1/assessments/:session_id/advance",
            post(advance_handler::<Q, U>),
        )
        .route(
            "/api/v1/assessments/:session_id/back",
            post(back_handler::<Q, U>),
        )
        .route(
            "/api/v1/assessments/:session_id/jump",
            post(jump_handler::<Q, U>),
        )
        .route(
            "/api/v1/assessments/:session_id/reset",
            post(reset_handler::<Q, U>),
        )
        .route(
            "/api/v1/assessments/:session_id/reload",
            post(reload_handler::<Q, U>),
        )
        .route(
            "/api/v1/assessments/:session_id/complete",
            post(complete_handler::<Q, U>),
        )
        .route(
            "/api/v1/assessments/:session_id/submit",
            post(submit_handler::<Q, U>),
        )
        .with_state(service)
}

#[derive(Debug, Deserialize)]
pub(crate) struct StartRequest {
    pub(crate) user_id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AnswerRequest {
    pub(crate) question_id: QuestionId,
    pub(crate) value: i64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct JumpRequest {
    pub(crate) index: usize,
}

pub(crate) async fn start_handler<Q, U>(
    State(service): State<SharedService<Q, U>>,
    Json(request): Json<StartRequest>,
) -> Response
where
    Q: QuestionSource + 'static,
    U: UserDirectory + 'static,
{
    if request.user_id.trim().is_empty() {
        let payload = json!({ "error": "user_id must not be empty" });
        return (StatusCode::UNPROCESSABLE_ENTITY, Json(payload)).into_response();
    }

    let context = SessionContext::new(request.user_id.trim());
    snapshot_response(StatusCode::CREATED, service.start(context).await)
}

pub(crate) async fn snapshot_handler<Q, U>(
    State(service): State<SharedService<Q, U>>,
    Path(session_id): Path<String>,
) -> Response
where
    Q: QuestionSource + 'static,
    U: UserDirectory + 'static,
{
    snapshot_response(StatusCode::OK, service.snapshot(&SessionId(session_id)))
}

pub(crate) async fn abandon_handler<Q, U>(
    State(service): State<SharedService<Q, U>>,
    Path(session_id): Path<String>,
) -> Response
where
    Q: QuestionSource + 'static,
    U: UserDirectory + 'static,
{
    match service.abandon(&SessionId(session_id)) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn answer_handler<Q, U>(
    State(service): State<SharedService<Q, U>>,
    Path(session_id): Path<String>,
    Json(request): Json<AnswerRequest>,
) -> Response
where
    Q: QuestionSource + 'static,
    U: UserDirectory + 'static,
{
    let result = service.answer(&SessionId(session_id), &request.question_id, request.value);
    snapshot_response(StatusCode::OK, result)
}

pub(crate) async fn advance_handler<Q, U>(
    State(service): State<SharedService<Q, U>>,
    Path(session_id): Path<String>,
) -> Response
where
    Q: QuestionSource + 'static,
    U: UserDirectory + 'static,
{
    snapshot_response(StatusCode::OK, service.advance(&SessionId(session_id)))
}

pub(crate) async fn back_handler<Q, U>(
    State(service): State<SharedService<Q, U>>,
    Path(session_id): Path<String>,
) -> Response
where
    Q: QuestionSource + 'static,
    U: UserDirectory + 'static,
{
    snapshot_response(StatusCode::OK, service.back(&SessionId(session_id)))
}

pub(crate) async fn jump_handler<Q, U>(
    State(service): State<SharedService<Q, U>>,
    Path(session_id): Path<String>,
    Json(request): Json<JumpRequest>,
) -> Response
where
    Q: QuestionSource + 'static,
    U: UserDirectory + 'static,
{
    snapshot_response(
        StatusCode::OK,
        service.jump(&SessionId(session_id), request.index),
    )
}

pub(crate) async fn reset_handler<Q, U>(
    State(service): State<SharedService<Q, U>>,
    Path(session_id): Path<String>,
) -> Response
where
    Q: QuestionSource + 'static,
    U: UserDirectory + 'static,
{
    snapshot_response(StatusCode::OK, service.reset(&SessionId(session_id)))
}

pub(crate) async fn reload_handler<Q, U>(
    State(service): State<SharedService<Q, U>>,
    Path(session_id): Path<String>,
) -> Response
where
    Q: QuestionSource + 'static,
    U: UserDirectory + 'static,
{
    let session_id = SessionId(session_id);
    snapshot_response(StatusCode::OK, service.reload(&session_id).await)
}

pub(crate) async fn complete_handler<Q, U>(
    State(service): State<SharedService<Q, U>>,
    Path(session_id): Path<String>,
) -> Response
where
    Q: QuestionSource + 'static,
    U: UserDirectory + 'static,
{
    snapshot_response(StatusCode::OK, service.complete(&SessionId(session_id)))
}

pub(crate) async fn submit_handler<Q, U>(
    State(service): State<SharedService<Q, U>>,
    Path(session_id): Path<String>,
) -> Response
where
    Q: QuestionSource + 'static,
    U: UserDirectory + 'static,
{
    let session_id = SessionId(session_id);
    match service.save(&session_id).await {
        Ok(committed) => (StatusCode::OK, Json(committed)).into_response(),
        Err(err) => error_response(err),
    }
}

fn snapshot_response(
    success: StatusCode,
    result: Result<SessionSnapshot, AssessmentServiceError>,
) -> Response {
    match result {
        Ok(snapshot) => (success, Json(snapshot)).into_response(),
        Err(err) => error_response(err),
    }
}

fn error_response(err: AssessmentServiceError) -> Response {
    let status = status_for(&err);
    let payload = match &err {
        AssessmentServiceError::QuestionLoad { session_id, .. } => json!({
            "error": err.to_string(),
            "session_id": session_id,
        }),
        AssessmentServiceError::Flow(FlowError::Scoring(ScoringError::IncompleteAssessment {
            missing,
        })) => json!({
            "error": err.to_string(),
            "missing": missing,
        }),
        _ => json!({ "error": err.to_string() }),
    };
    (status, Json(payload)).into_response()
}

pub(crate) fn status_for(err: &AssessmentServiceError) -> StatusCode {
    match err {
        AssessmentServiceError::SessionNotFound(_) => StatusCode::NOT_FOUND,
        AssessmentServiceError::QuestionLoad { .. } => StatusCode::BAD_GATEWAY,
        AssessmentServiceError::Flow(FlowError::Answer(_))
        | AssessmentServiceError::Flow(FlowError::UnknownQuestion(_))
        | AssessmentServiceError::Flow(FlowError::OutOfBounds { .. }) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        AssessmentServiceError::Flow(_) => StatusCode::CONFLICT,
        AssessmentServiceError::Submit(err) => submit_status(err),
    }
}

pub(crate) fn submit_status(err: &SubmitError) -> StatusCode {
    match err {
        SubmitError::UserNotFound(_) => StatusCode::NOT_FOUND,
        SubmitError::Unrepresentable { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        SubmitError::Network(_) | SubmitError::Persistence(_) => StatusCode::BAD_GATEWAY,
    }
}
