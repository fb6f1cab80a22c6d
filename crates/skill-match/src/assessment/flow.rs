use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::answers::{AnswerError, AnswerStore};
use super::domain::{Question, QuestionId, QuestionSet};
use super::scoring::{ScoringEngine, ScoringError, SkillProfile};

/// How questions are put in front of the respondent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Presentation {
    /// One question at a time; moving forward requires an answer.
    #[default]
    Gated,
    /// One question at a time; selecting an answer moves to the next unanswered question.
    AutoAdvance,
    /// Every question addressable at once.
    FreeNavigation,
}

impl Presentation {
    pub const fn label(self) -> &'static str {
        match self {
            Presentation::Gated => "gated",
            Presentation::AutoAdvance => "auto-advance",
            Presentation::FreeNavigation => "free",
        }
    }
}

impl fmt::Display for Presentation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Presentation {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "gated" | "sequential" => Ok(Presentation::Gated),
            "auto-advance" | "auto_advance" | "auto" => Ok(Presentation::AutoAdvance),
            "free" | "free-navigation" | "free_navigation" | "simultaneous" => {
                Ok(Presentation::FreeNavigation)
            }
            other => Err(format!("unknown presentation '{other}'")),
        }
    }
}

/// Lifecycle of one assessment session.
#[derive(Debug, Clone, PartialEq)]
pub enum FlowState {
    Loading,
    LoadFailed { reason: String },
    InProgress,
    Complete(SkillProfile),
}

impl FlowState {
    pub const fn label(&self) -> &'static str {
        match self {
            FlowState::Loading => "loading",
            FlowState::LoadFailed { .. } => "load_failed",
            FlowState::InProgress => "in_progress",
            FlowState::Complete(_) => "complete",
        }
    }
}

/// Explicit state machine driving question progression and scoring.
#[derive(Debug, Clone)]
pub struct AssessmentFlow {
    presentation: Presentation,
    engine: ScoringEngine,
    state: FlowState,
    questions: Option<QuestionSet>,
    answers: AnswerStore,
    cursor: usize,
    epoch: u64,
}

impl AssessmentFlow {
    pub fn new(presentation: Presentation, engine: ScoringEngine) -> Self {
        Self {
            presentation,
            engine,
            state: FlowState::Loading,
            questions: None,
            answers: AnswerStore::new(),
            cursor: 0,
            epoch: 0,
        }
    }

    pub fn state(&self) -> &FlowState {
        &self.state
    }

    pub fn presentation(&self) -> Presentation {
        self.presentation
    }

    /// Bumped on every reset and reload so results addressed to an older generation are refused.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn questions(&self) -> Option<&QuestionSet> {
        self.questions.as_ref()
    }

    pub fn answers(&self) -> &AnswerStore {
        &self.answers
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn current_question(&self) -> Option<&Question> {
        match self.state {
            FlowState::InProgress => self.questions.as_ref()?.get(self.cursor),
            _ => None,
        }
    }

    pub fn profile(&self) -> Option<&SkillProfile> {
        match &self.state {
            FlowState::Complete(profile) => Some(profile),
            _ => None,
        }
    }

    pub fn total(&self) -> usize {
        self.questions.as_ref().map(QuestionSet::len).unwrap_or(0)
    }

    pub fn answered(&self) -> usize {
        self.questions
            .as_ref()
            .map(|questions| self.answers.answered_in(questions))
            .unwrap_or(0)
    }

    /// Share of answered questions as a whole percentage.
    pub fn progress(&self) -> u8 {
        let total = self.total();
        if total == 0 {
            return 0;
        }
        ((self.answered() as f64 / total as f64) * 100.0).round() as u8
    }

    /// Install the fetched question set for the generation that requested it.
    pub fn load(&mut self, epoch: u64, questions: QuestionSet) -> Result<(), FlowError> {
        self.ensure_epoch(epoch)?;
        if self.state != FlowState::Loading {
            return Err(FlowError::InvalidTransition {
                state: self.state.label(),
                action: "load",
            });
        }

        debug!(questions = questions.len(), epoch, "assessment questions loaded");
        self.questions = Some(questions);
        self.answers.reset();
        self.cursor = 0;
        self.state = FlowState::InProgress;
        Ok(())
    }

    pub fn fail_loading(&mut self, epoch: u64, reason: impl Into<String>) -> Result<(), FlowError> {
        self.ensure_epoch(epoch)?;
        if self.state != FlowState::Loading {
            return Err(FlowError::InvalidTransition {
                state: self.state.label(),
                action: "fail_loading",
            });
        }

        let reason = reason.into();
        debug!(%reason, epoch, "assessment question load failed");
        self.state = FlowState::LoadFailed { reason };
        Ok(())
    }

    /// Return a failed session to `Loading`, handing out the generation the next load must carry.
    pub fn begin_reload(&mut self) -> Result<u64, FlowError> {
        match self.state {
            FlowState::LoadFailed { .. } => {
                self.epoch += 1;
                self.state = FlowState::Loading;
                Ok(self.epoch)
            }
            _ => Err(FlowError::InvalidTransition {
                state: self.state.label(),
                action: "reload",
            }),
        }
    }

    /// Answer the question under the cursor.
    pub fn select(&mut self, value: i64) -> Result<(), FlowError> {
        let question_id = self
            .current_question()
            .map(|question| question.id.clone())
            .ok_or_else(|| self.not_in_progress())?;
        self.answer(&question_id, value)
    }

    /// Answer a question by id; outside free navigation only the current question is open.
    pub fn answer(&mut self, question_id: &QuestionId, value: i64) -> Result<(), FlowError> {
        self.ensure_in_progress()?;
        let questions = self.questions.as_ref().ok_or(FlowError::NotReady {
            state: FlowState::Loading.label(),
        })?;
        let position = questions
            .position(question_id)
            .ok_or_else(|| FlowError::UnknownQuestion(question_id.clone()))?;
        if self.presentation != Presentation::FreeNavigation && position != self.cursor {
            return Err(FlowError::NavigationLocked { index: position });
        }

        self.answers.set_answer(question_id.clone(), value)?;

        if self.presentation == Presentation::AutoAdvance {
            if let Some(next) = self.next_unanswered_after(position) {
                self.cursor = next;
            }
        }

        if self.all_answered() {
            self.finish()?;
        }
        Ok(())
    }

    /// Move to the next question. On the last question this requests completion.
    pub fn advance(&mut self) -> Result<(), FlowError> {
        self.ensure_in_progress()?;
        let current = self
            .current_question()
            .map(|question| question.id.clone())
            .ok_or_else(|| self.not_in_progress())?;

        if self.presentation != Presentation::FreeNavigation && !self.answers.contains(&current) {
            return Err(FlowError::Unanswered(current));
        }

        if self.cursor + 1 < self.total() {
            self.cursor += 1;
            Ok(())
        } else {
            self.complete().map(|_| ())
        }
    }

    pub fn back(&mut self) -> Result<(), FlowError> {
        self.ensure_in_progress()?;
        if self.cursor == 0 {
            return Err(FlowError::OutOfBounds {
                index: 0,
                len: self.total(),
            });
        }
        self.cursor -= 1;
        Ok(())
    }

    /// Jump to a question; gated modes cannot skip past the first unanswered question.
    pub fn jump(&mut self, index: usize) -> Result<(), FlowError> {
        self.ensure_in_progress()?;
        let len = self.total();
        if index >= len {
            return Err(FlowError::OutOfBounds { index, len });
        }
        if self.presentation != Presentation::FreeNavigation {
            let frontier = self.first_unanswered().unwrap_or(len - 1);
            if index > frontier {
                return Err(FlowError::NavigationLocked { index });
            }
        }
        self.cursor = index;
        Ok(())
    }

    /// Score the session, failing while any question lacks an answer.
    pub fn complete(&mut self) -> Result<&SkillProfile, FlowError> {
        if let FlowState::InProgress = self.state {
            self.finish()?;
        }
        match &self.state {
            FlowState::Complete(profile) => Ok(profile),
            other => Err(FlowError::NotReady {
                state: other.label(),
            }),
        }
    }

    /// Discard all answers and restart from the first question.
    pub fn reset(&mut self) -> Result<(), FlowError> {
        match self.state {
            FlowState::InProgress | FlowState::Complete(_) => {
                self.answers.reset();
                self.cursor = 0;
                self.epoch += 1;
                self.state = FlowState::InProgress;
                debug!(epoch = self.epoch, "assessment reset");
                Ok(())
            }
            _ => Err(self.not_in_progress()),
        }
    }

    fn finish(&mut self) -> Result<(), FlowError> {
        let questions = self.questions.as_ref().ok_or(FlowError::NotReady {
            state: FlowState::Loading.label(),
        })?;
        let profile = self.engine.compute_profile(questions, &self.answers)?;
        debug!(
            categories = profile.len(),
            mode = %profile.mode,
            "assessment complete"
        );
        self.state = FlowState::Complete(profile);
        Ok(())
    }

    fn all_answered(&self) -> bool {
        self.questions
            .as_ref()
            .map(|questions| self.answers.is_complete(questions))
            .unwrap_or(false)
    }

    fn first_unanswered(&self) -> Option<usize> {
        let questions = self.questions.as_ref()?;
        questions
            .iter()
            .position(|question| !self.answers.contains(&question.id))
    }

    fn next_unanswered_after(&self, position: usize) -> Option<usize> {
        let questions = self.questions.as_ref()?;
        let len = questions.len();
        (1..len)
            .map(|offset| (position + offset) % len)
            .find(|index| {
                questions
                    .get(*index)
                    .map(|question| !self.answers.contains(&question.id))
                    .unwrap_or(false)
            })
    }

    fn ensure_epoch(&self, epoch: u64) -> Result<(), FlowError> {
        if epoch == self.epoch {
            Ok(())
        } else {
            Err(FlowError::Stale {
                expected: self.epoch,
                received: epoch,
            })
        }
    }

    fn ensure_in_progress(&self) -> Result<(), FlowError> {
        match self.state {
            FlowState::InProgress => Ok(()),
            _ => Err(self.not_in_progress()),
        }
    }

    fn not_in_progress(&self) -> FlowError {
        match self.state {
            FlowState::Complete(_) => FlowError::AlreadyComplete,
            _ => FlowError::NotReady {
                state: self.state.label(),
            },
        }
    }
}

/// Rejected flow actions.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FlowError {
    #[error("assessment is not in progress (state: {state})")]
    NotReady { state: &'static str },
    #[error("assessment already complete; reset to answer again")]
    AlreadyComplete,
    #[error("cannot {action} while {state}")]
    InvalidTransition {
        state: &'static str,
        action: &'static str,
    },
    #[error("result belongs to generation {received}, session is at {expected}")]
    Stale { expected: u64, received: u64 },
    #[error("question {0} is not part of this assessment")]
    UnknownQuestion(QuestionId),
    #[error("question {index} is not reachable yet")]
    NavigationLocked { index: usize },
    #[error("question {0} must be answered before moving on")]
    Unanswered(QuestionId),
    #[error("question index {index} out of bounds for {len} question(s)")]
    OutOfBounds { index: usize, len: usize },
    #[error(transparent)]
    Answer(#[from] AnswerError),
    #[error(transparent)]
    Scoring(#[from] ScoringError),
}
