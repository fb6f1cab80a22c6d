use metrics_exporter_prometheus::PrometheusHandle;
use skill_match::assessment::{ApiClient, AssessmentService, ScoringConfig};
use skill_match::config::{ApiConfig, AppConfig};
use skill_match::error::AppError;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) type LiveAssessmentService = AssessmentService<ApiClient, ApiClient>;

/// Point the API settings at an override URL, validated like `APP_API_URL`.
pub(crate) fn apply_api_url(api: &mut ApiConfig, api_url: Option<String>) -> Result<(), AppError> {
    if let Some(raw) = api_url {
        api.base_url = ApiConfig::normalize_base_url(&raw)?;
    }
    Ok(())
}

pub(crate) fn api_client(api: &ApiConfig) -> Result<ApiClient, AppError> {
    Ok(ApiClient::new(api)?)
}

pub(crate) fn assessment_service(config: &AppConfig) -> Result<LiveAssessmentService, AppError> {
    let client = Arc::new(api_client(&config.api)?);
    Ok(AssessmentService::new(
        client.clone(),
        client,
        ScoringConfig::new(config.assessment.scoring_mode),
        config.assessment.presentation,
    ))
}
