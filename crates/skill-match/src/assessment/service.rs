use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::domain::{Category, QuestionId, SessionContext, UserId};
use super::flow::{AssessmentFlow, FlowError, FlowState, Presentation};
use super::repository::{load_question_set, QuestionLoadError, QuestionSource, UserDirectory};
use super::scoring::{ScoringConfig, ScoringEngine, ScoringMode, SkillProfile};
use super::submitter::{CommittedProfile, ResultSubmitter, SubmitError};

/// Handle for one in-flight assessment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub String);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Sessions untouched for this long are dropped when the next one starts.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30 * 60);

static SESSION_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_session_id() -> SessionId {
    let id = SESSION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    SessionId(format!("assess-{id:06}"))
}

struct AssessmentSession {
    context: SessionContext,
    flow: AssessmentFlow,
    touched: Instant,
}

/// Service composing the question source, per-session flows, and the result submitter.
pub struct AssessmentService<Q, U> {
    questions: Arc<Q>,
    submitter: ResultSubmitter<U>,
    scoring: ScoringConfig,
    presentation: Presentation,
    idle_timeout: Duration,
    sessions: Mutex<HashMap<SessionId, AssessmentSession>>,
}

impl<Q, U> AssessmentService<Q, U>
where
    Q: QuestionSource + 'static,
    U: UserDirectory + 'static,
{
    pub fn new(
        questions: Arc<Q>,
        directory: Arc<U>,
        scoring: ScoringConfig,
        presentation: Presentation,
    ) -> Self {
        Self {
            questions,
            submitter: ResultSubmitter::new(directory),
            scoring,
            presentation,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    pub fn presentation(&self) -> Presentation {
        self.presentation
    }

    pub fn scoring_mode(&self) -> ScoringMode {
        self.scoring.mode
    }

    /// Open a session for the user and load its questions.
    ///
    /// On a failed fetch the session stays registered in `load_failed` so it can be reloaded.
    pub async fn start(
        &self,
        context: SessionContext,
    ) -> Result<SessionSnapshot, AssessmentServiceError> {
        let session_id = next_session_id();
        let flow = AssessmentFlow::new(self.presentation, ScoringEngine::new(self.scoring.clone()));
        let epoch = flow.epoch();
        debug!(%session_id, user_id = %context.user_id, "assessment session opened");
        {
            let mut sessions = self.lock();
            let before = sessions.len();
            sessions.retain(|_, session| session.touched.elapsed() < self.idle_timeout);
            if sessions.len() < before {
                debug!(evicted = before - sessions.len(), "idle assessment sessions dropped");
            }
            sessions.insert(
                session_id.clone(),
                AssessmentSession {
                    context,
                    flow,
                    touched: Instant::now(),
                },
            );
        }

        self.load_into(&session_id, epoch).await
    }

    /// Retry the question fetch for a session whose load failed.
    pub async fn reload(
        &self,
        session_id: &SessionId,
    ) -> Result<SessionSnapshot, AssessmentServiceError> {
        let epoch = self.with_session(session_id, |session| {
            session.flow.begin_reload().map_err(AssessmentServiceError::from)
        })?;
        self.load_into(session_id, epoch).await
    }

    pub fn snapshot(&self, session_id: &SessionId) -> Result<SessionSnapshot, AssessmentServiceError> {
        self.with_session(session_id, |session| Ok(SessionSnapshot::capture(session_id, session)))
    }

    pub fn answer(
        &self,
        session_id: &SessionId,
        question_id: &QuestionId,
        value: i64,
    ) -> Result<SessionSnapshot, AssessmentServiceError> {
        self.transition(session_id, |flow| flow.answer(question_id, value))
    }

    pub fn advance(&self, session_id: &SessionId) -> Result<SessionSnapshot, AssessmentServiceError> {
        self.transition(session_id, AssessmentFlow::advance)
    }

    pub fn back(&self, session_id: &SessionId) -> Result<SessionSnapshot, AssessmentServiceError> {
        self.transition(session_id, AssessmentFlow::back)
    }

    pub fn jump(
        &self,
        session_id: &SessionId,
        index: usize,
    ) -> Result<SessionSnapshot, AssessmentServiceError> {
        self.transition(session_id, |flow| flow.jump(index))
    }

    pub fn reset(&self, session_id: &SessionId) -> Result<SessionSnapshot, AssessmentServiceError> {
        self.transition(session_id, AssessmentFlow::reset)
    }

    pub fn complete(&self, session_id: &SessionId) -> Result<SessionSnapshot, AssessmentServiceError> {
        self.transition(session_id, |flow| flow.complete().map(|_| ()))
    }

    /// Persist the completed profile into the session user's record.
    ///
    /// The session is closed once the record is written; failed saves keep it for a retry.
    pub async fn save(
        &self,
        session_id: &SessionId,
    ) -> Result<CommittedProfile, AssessmentServiceError> {
        let (user_id, profile) = self.with_session(session_id, |session| {
            let profile = session.flow.complete()?.clone();
            Ok((session.context.user_id.clone(), profile))
        })?;

        match self.submitter.save_profile(&user_id, &profile).await {
            Ok(committed) => {
                self.lock().remove(session_id);
                debug!(%session_id, "assessment session closed after save");
                Ok(committed)
            }
            Err(err) => {
                warn!(%session_id, %user_id, error = %err, "profile save failed");
                Err(err.into())
            }
        }
    }

    /// Drop a session; a question load still in flight for it is discarded on arrival.
    pub fn abandon(&self, session_id: &SessionId) -> Result<(), AssessmentServiceError> {
        match self.lock().remove(session_id) {
            Some(_) => {
                debug!(%session_id, "assessment session abandoned");
                Ok(())
            }
            None => Err(AssessmentServiceError::SessionNotFound(session_id.clone())),
        }
    }

    pub fn active_sessions(&self) -> usize {
        self.lock().len()
    }

    async fn load_into(
        &self,
        session_id: &SessionId,
        epoch: u64,
    ) -> Result<SessionSnapshot, AssessmentServiceError> {
        let loaded = load_question_set(self.questions.as_ref()).await;

        self.with_session(session_id, |session| match loaded {
            Ok(questions) => {
                session.flow.load(epoch, questions)?;
                info!(
                    %session_id,
                    questions = session.flow.total(),
                    "assessment ready"
                );
                Ok(SessionSnapshot::capture(session_id, session))
            }
            Err(source) => {
                session.flow.fail_loading(epoch, source.to_string())?;
                warn!(%session_id, error = %source, "assessment questions unavailable");
                Err(AssessmentServiceError::QuestionLoad {
                    session_id: session_id.clone(),
                    source,
                })
            }
        })
    }

    fn transition<F>(
        &self,
        session_id: &SessionId,
        action: F,
    ) -> Result<SessionSnapshot, AssessmentServiceError>
    where
        F: FnOnce(&mut AssessmentFlow) -> Result<(), FlowError>,
    {
        self.with_session(session_id, |session| {
            action(&mut session.flow)?;
            Ok(SessionSnapshot::capture(session_id, session))
        })
    }

    fn with_session<T, F>(&self, session_id: &SessionId, f: F) -> Result<T, AssessmentServiceError>
    where
        F: FnOnce(&mut AssessmentSession) -> Result<T, AssessmentServiceError>,
    {
        let mut sessions = self.lock();
        let session = sessions
            .get_mut(session_id)
            .ok_or_else(|| AssessmentServiceError::SessionNotFound(session_id.clone()))?;
        session.touched = Instant::now();
        f(session)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SessionId, AssessmentSession>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Point-in-time view of a session for API responses and terminal rendering.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub session_id: SessionId,
    pub user_id: UserId,
    pub state: &'static str,
    pub presentation: Presentation,
    pub total: usize,
    pub answered: usize,
    pub progress: u8,
    pub cursor: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current: Option<QuestionView>,
    /// Every question, populated only for free navigation.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub questions: Vec<QuestionView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile: Option<ProfileView>,
}

impl SessionSnapshot {
    fn capture(session_id: &SessionId, session: &AssessmentSession) -> Self {
        let flow = &session.flow;
        let view = |index: usize| {
            flow.questions()
                .and_then(|questions| questions.get(index))
                .map(|question| QuestionView {
                    index,
                    id: question.id.clone(),
                    text: question.text.clone(),
                    answer: flow.answers().get_answer(&question.id).map(|level| level.value()),
                })
        };

        let questions = if flow.presentation() == Presentation::FreeNavigation {
            (0..flow.total()).filter_map(&view).collect()
        } else {
            Vec::new()
        };
        let failure = match flow.state() {
            FlowState::LoadFailed { reason } => Some(reason.clone()),
            _ => None,
        };

        Self {
            session_id: session_id.clone(),
            user_id: session.context.user_id.clone(),
            state: flow.state().label(),
            presentation: flow.presentation(),
            total: flow.total(),
            answered: flow.answered(),
            progress: flow.progress(),
            cursor: flow.cursor(),
            current: flow.current_question().and_then(|_| view(flow.cursor())),
            questions,
            failure,
            profile: flow.profile().map(ProfileView::from),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestionView {
    pub index: usize,
    pub id: QuestionId,
    pub text: String,
    pub answer: Option<u8>,
}

/// Scores as shown to the respondent: raw for storage, rounded for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileView {
    pub mode: ScoringMode,
    pub scores: BTreeMap<Category, f64>,
    pub display: BTreeMap<Category, i64>,
}

impl From<&SkillProfile> for ProfileView {
    fn from(profile: &SkillProfile) -> Self {
        Self {
            mode: profile.mode,
            scores: profile
                .scores
                .iter()
                .map(|(category, entry)| (*category, entry.score))
                .collect(),
            display: profile.display_scores(),
        }
    }
}

/// Error raised by the assessment service.
#[derive(Debug, thiserror::Error)]
pub enum AssessmentServiceError {
    #[error("assessment session {0} not found")]
    SessionNotFound(SessionId),
    #[error("session {session_id} could not load questions: {source}")]
    QuestionLoad {
        session_id: SessionId,
        #[source]
        source: QuestionLoadError,
    },
    #[error(transparent)]
    Flow(#[from] FlowError),
    #[error(transparent)]
    Submit(#[from] SubmitError),
}
