use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use super::domain::{Question, UserId};
use super::repository::{ApiError, QuestionSource, UserDirectory, UserRecord};
use crate::config::ApiConfig;

const DEFAULT_BACKOFF: Duration = Duration::from_millis(250);

/// JSON client for the external REST API serving questions and user records.
///
/// Every call is bounded by the configured timeout. Idempotent GETs are retried on
/// retryable failures; the PUT of a user record is attempted exactly once.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    timeout: Duration,
    get_retries: u8,
    backoff: Duration,
}

impl ApiClient {
    pub fn new(config: &ApiConfig) -> Result<Self, ApiError> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|err| ApiError::InvalidRequest(format!("{}: {err}", config.base_url)))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::InvalidRequest(format!(
                "{} cannot be used as a base URL",
                config.base_url
            )));
        }

        let http = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|err| ApiError::Transport(err.to_string()))?;

        Ok(Self {
            http,
            base_url,
            timeout: config.timeout,
            get_retries: config.get_retries,
            backoff: DEFAULT_BACKOFF,
        })
    }

    /// Override the linear retry backoff step.
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::InvalidRequest(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn bounded<T, F>(&self, call: F) -> Result<T, ApiError>
    where
        F: Future<Output = Result<T, ApiError>>,
    {
        timeout(self.timeout, call)
            .await
            .map_err(|_| ApiError::Timeout(self.timeout))?
    }

    /// GET returning `Ok(None)` on 404, retrying retryable failures.
    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<Option<T>, ApiError> {
        let mut attempt: u8 = 0;
        loop {
            match self.bounded(self.get_once::<T>(url.clone())).await {
                Ok(value) => {
                    debug!(%url, attempts = attempt + 1, "GET succeeded");
                    return Ok(value);
                }
                Err(err) if err.is_retryable() && attempt < self.get_retries => {
                    attempt += 1;
                    warn!(%url, attempt, error = %err, "retrying GET");
                    sleep(self.backoff * u32::from(attempt)).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn get_once<T: DeserializeOwned>(&self, url: Url) -> Result<Option<T>, ApiError> {
        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|err| ApiError::Transport(err.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        response
            .json::<T>()
            .await
            .map(Some)
            .map_err(|err| ApiError::Decode(err.to_string()))
    }

    async fn put_json(&self, url: Url, record: &UserRecord) -> Result<(), ApiError> {
        let response = self
            .http
            .put(url.clone())
            .json(record)
            .send()
            .await
            .map_err(|err| ApiError::Transport(err.to_string()))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(ApiError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            })
        }
    }
}

#[async_trait]
impl QuestionSource for ApiClient {
    async fn fetch_questions(&self) -> Result<Vec<Question>, ApiError> {
        let url = self.endpoint(&["questions"])?;
        self.get_json::<Vec<Question>>(url.clone())
            .await?
            .ok_or(ApiError::Status {
                status: StatusCode::NOT_FOUND.as_u16(),
                url: url.to_string(),
            })
    }
}

#[async_trait]
impl UserDirectory for ApiClient {
    async fn fetch_user(&self, user_id: &UserId) -> Result<Option<UserRecord>, ApiError> {
        let url = self.endpoint(&["user", &user_id.0])?;
        self.get_json::<UserRecord>(url).await
    }

    async fn store_user(&self, user_id: &UserId, record: &UserRecord) -> Result<(), ApiError> {
        let url = self.endpoint(&["user", &user_id.0])?;
        self.bounded(self.put_json(url, record)).await
    }
}
