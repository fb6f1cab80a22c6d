use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Number, Value};
use tracing::{debug, info, warn};

use super::domain::{Category, UserId};
use super::repository::{ApiError, UserDirectory, UserRecord};
use super::scoring::SkillProfile;

/// Field stamped on the user record with the time of the assessment.
pub const LAST_ASSESSMENT_FIELD: &str = "last_assessment_date";

/// Credentials never travel back on the update path.
const STRIPPED_FIELDS: [&str; 1] = ["password"];

/// Writes computed profiles into the user's record with a read-modify-write round trip.
///
/// The GET and PUT are not atomic: a concurrent writer between the two calls loses its update.
pub struct ResultSubmitter<U> {
    directory: Arc<U>,
}

impl<U> ResultSubmitter<U>
where
    U: UserDirectory + 'static,
{
    pub fn new(directory: Arc<U>) -> Self {
        Self { directory }
    }

    pub async fn save_profile(
        &self,
        user_id: &UserId,
        profile: &SkillProfile,
    ) -> Result<CommittedProfile, SubmitError> {
        self.save_profile_at(user_id, profile, Utc::now()).await
    }

    pub async fn save_profile_at(
        &self,
        user_id: &UserId,
        profile: &SkillProfile,
        assessed_at: DateTime<Utc>,
    ) -> Result<CommittedProfile, SubmitError> {
        let record = match self.directory.fetch_user(user_id).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                warn!(%user_id, "profile save targeted unknown user");
                return Err(SubmitError::UserNotFound(user_id.clone()));
            }
            Err(err) => return Err(SubmitError::Network(err)),
        };

        let merged = merge_profile(record, profile, assessed_at)?;
        debug!(%user_id, "writing merged user record; concurrent edits since the read are overwritten");

        self.directory
            .store_user(user_id, &merged)
            .await
            .map_err(SubmitError::Persistence)?;

        info!(
            %user_id,
            categories = profile.scores.values().filter(|entry| entry.is_measured()).count(),
            "skill profile committed"
        );
        Ok(CommittedProfile {
            user_id: user_id.clone(),
            assessed_at,
            profile: profile.clone(),
        })
    }
}

/// Overlay the profile's unrounded scores and the assessment timestamp onto a fetched record.
///
/// Only measured categories are written; a stored score for a category no question weighted
/// stays as it was. Every other field is preserved, except `password`, which is dropped so
/// the update never echoes credentials back to the API.
pub fn merge_profile(
    mut record: UserRecord,
    profile: &SkillProfile,
    assessed_at: DateTime<Utc>,
) -> Result<UserRecord, SubmitError> {
    for (category, entry) in profile.scores.iter().filter(|(_, entry)| entry.is_measured()) {
        let number = Number::from_f64(entry.score).ok_or(SubmitError::Unrepresentable {
            category: *category,
            score: entry.score,
        })?;
        record.insert(category.field_name(), Value::Number(number));
    }
    record.insert(
        LAST_ASSESSMENT_FIELD,
        Value::String(assessed_at.to_rfc3339_opts(SecondsFormat::Millis, true)),
    );
    for field in STRIPPED_FIELDS {
        record.remove(field);
    }
    Ok(record)
}

/// Outcome of a successful save.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommittedProfile {
    pub user_id: UserId,
    pub assessed_at: DateTime<Utc>,
    pub profile: SkillProfile,
}

/// Failure persisting a profile.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SubmitError {
    #[error("user {0} not found")]
    UserNotFound(UserId),
    #[error("failed to read user record: {0}")]
    Network(ApiError),
    #[error("failed to write user record: {0}")]
    Persistence(ApiError),
    #[error("{category} score {score} cannot be stored as JSON")]
    Unrepresentable { category: Category, score: f64 },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assessment::scoring::{CategoryScore, ScoringMode};
    use chrono::TimeZone;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn profile(score: f64) -> SkillProfile {
        SkillProfile {
            mode: ScoringMode::WeightedNormalized,
            scores: BTreeMap::from([(
                Category::TechnicalSkill,
                CategoryScore {
                    score,
                    raw_total: 11.0,
                    max_total: Some(15.0),
                    contributing_questions: 2,
                },
            )]),
        }
    }

    #[test]
    fn merge_keeps_unrelated_fields_and_strips_password() {
        let record = UserRecord::from(
            json!({
                "username": "kenta",
                "email": "kenta@example.com",
                "password": "hunter2",
                "technical_skill": 12,
                "backend_skill": 40
            })
            .as_object()
            .cloned()
            .unwrap_or_default(),
        );
        let at = Utc.with_ymd_and_hms(2025, 4, 1, 9, 30, 0).single().expect("valid");

        let merged = merge_profile(record, &profile(73.33333333333333), at).expect("merges");

        assert_eq!(merged.get("username"), Some(&json!("kenta")));
        assert_eq!(merged.get("backend_skill"), Some(&json!(40)));
        assert_eq!(merged.skill_score(Category::TechnicalSkill), Some(73.33333333333333));
        assert_eq!(
            merged.get(LAST_ASSESSMENT_FIELD),
            Some(&json!("2025-04-01T09:30:00.000Z"))
        );
        assert!(!merged.contains("password"));
    }

    #[test]
    fn merge_leaves_unmeasured_categories_alone() {
        let record = UserRecord::from(
            json!({ "security_awareness": 88, "technical_skill": 12 })
                .as_object()
                .cloned()
                .unwrap_or_default(),
        );
        let mut profile = profile(60.0);
        profile.scores.insert(
            Category::SecurityAwareness,
            CategoryScore {
                score: 0.0,
                raw_total: 0.0,
                max_total: Some(0.0),
                contributing_questions: 0,
            },
        );
        let at = Utc.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).single().expect("valid");

        let merged = merge_profile(record, &profile, at).expect("merges");

        assert_eq!(merged.get("security_awareness"), Some(&json!(88)));
        assert_eq!(merged.skill_score(Category::TechnicalSkill), Some(60.0));
    }

    #[test]
    fn merge_rejects_infinite_scores() {
        let at = Utc.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).single().expect("valid");
        match merge_profile(UserRecord::new(), &profile(f64::INFINITY), at) {
            Err(SubmitError::Unrepresentable { category, .. }) => {
                assert_eq!(category, Category::TechnicalSkill)
            }
            other => panic!("expected unrepresentable score, got {other:?}"),
        }
    }
}
