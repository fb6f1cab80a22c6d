//! Skill assessment engine.
//!
//! Questions come from an external REST API, answers are collected through an explicit
//! flow state machine, scored into per-category percentages, and merged back into the
//! user's record with a read-modify-write round trip.

pub mod answers;
pub mod client;
pub mod domain;
pub mod flow;
pub mod import;
pub mod repository;
pub mod router;
pub mod scoring;
pub mod service;
pub mod submitter;

#[cfg(test)]
mod tests;

pub use answers::{AnswerError, AnswerStore};
pub use client::ApiClient;
pub use domain::{
    Category, LikertLevel, Question, QuestionId, QuestionSet, QuestionSetError, SessionContext,
    UserId,
};
pub use flow::{AssessmentFlow, FlowError, FlowState, Presentation};
pub use import::{AnswerImportError, AnswerSheet, AnswerSheetImporter, SheetOutcome};
pub use repository::{
    load_question_set, ApiError, QuestionLoadError, QuestionSource, UserDirectory, UserRecord,
};
pub use router::assessment_router;
pub use scoring::{
    compute_profile, CategoryScore, ScoringConfig, ScoringEngine, ScoringError, ScoringMode,
    SkillProfile,
};
pub use service::{
    AssessmentService, AssessmentServiceError, ProfileView, QuestionView, SessionId,
    SessionSnapshot,
};
pub use submitter::{merge_profile, CommittedProfile, ResultSubmitter, SubmitError};
