//! Offline answer sheets: `respondent,question_id,value` CSV rows grouped per respondent.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::answers::{AnswerError, AnswerStore};
use super::domain::{QuestionId, QuestionSet};
use super::scoring::{ScoringEngine, SkillProfile};

/// All answers recorded for one respondent, plus the rows that could not be accepted.
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerSheet {
    pub respondent: String,
    pub answers: AnswerStore,
    pub rejected: Vec<RejectedRow>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RejectedRow {
    pub line: usize,
    pub question_id: QuestionId,
    pub reason: AnswerError,
}

#[derive(Debug)]
pub enum AnswerImportError {
    Io(std::io::Error),
    Csv(csv::Error),
}

impl std::fmt::Display for AnswerImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AnswerImportError::Io(err) => write!(f, "failed to read answer sheet: {}", err),
            AnswerImportError::Csv(err) => write!(f, "invalid answer sheet CSV: {}", err),
        }
    }
}

impl std::error::Error for AnswerImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AnswerImportError::Io(err) => Some(err),
            AnswerImportError::Csv(err) => Some(err),
        }
    }
}

impl From<std::io::Error> for AnswerImportError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}

impl From<csv::Error> for AnswerImportError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err)
    }
}

pub struct AnswerSheetImporter;

impl AnswerSheetImporter {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Vec<AnswerSheet>, AnswerImportError> {
        let file = File::open(path)?;
        Self::from_reader(file)
    }

    /// Sheets come back in order of each respondent's first row.
    pub fn from_reader<R: Read>(reader: R) -> Result<Vec<AnswerSheet>, AnswerImportError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let mut sheets: Vec<AnswerSheet> = Vec::new();
        let mut index: BTreeMap<String, usize> = BTreeMap::new();

        for (row_number, record) in csv_reader.deserialize::<AnswerRow>().enumerate() {
            let row = record?;
            let slot = *index.entry(row.respondent.clone()).or_insert_with(|| {
                sheets.push(AnswerSheet {
                    respondent: row.respondent.clone(),
                    answers: AnswerStore::new(),
                    rejected: Vec::new(),
                });
                sheets.len() - 1
            });
            let sheet = &mut sheets[slot];
            let question_id = QuestionId(row.question_id);
            if let Err(reason) = sheet.answers.set_answer(question_id.clone(), row.value) {
                sheet.rejected.push(RejectedRow {
                    // header occupies line 1
                    line: row_number + 2,
                    question_id,
                    reason,
                });
            }
        }

        debug!(respondents = sheets.len(), "answer sheets imported");
        Ok(sheets)
    }
}

#[derive(Debug, Deserialize)]
struct AnswerRow {
    respondent: String,
    question_id: String,
    value: i64,
}

/// Result of scoring one imported sheet.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SheetOutcome {
    Scored {
        respondent: String,
        profile: SkillProfile,
    },
    Skipped {
        respondent: String,
        reason: String,
    },
}

impl SheetOutcome {
    pub fn respondent(&self) -> &str {
        match self {
            SheetOutcome::Scored { respondent, .. } | SheetOutcome::Skipped { respondent, .. } => {
                respondent
            }
        }
    }
}

/// Score every sheet against the question set; invalid or incomplete sheets are skipped.
pub fn score_sheets(
    questions: &QuestionSet,
    sheets: &[AnswerSheet],
    engine: &ScoringEngine,
) -> Vec<SheetOutcome> {
    sheets
        .iter()
        .map(|sheet| {
            let respondent = sheet.respondent.clone();
            if let Some(row) = sheet.rejected.first() {
                return SheetOutcome::Skipped {
                    respondent,
                    reason: format!("line {}: {}: {}", row.line, row.question_id, row.reason),
                };
            }
            if let Some((unknown, _)) = sheet
                .answers
                .iter()
                .find(|(question_id, _)| questions.position(question_id).is_none())
            {
                return SheetOutcome::Skipped {
                    respondent,
                    reason: format!("question {unknown} is not part of the assessment"),
                };
            }
            match engine.compute_profile(questions, &sheet.answers) {
                Ok(profile) => SheetOutcome::Scored {
                    respondent,
                    profile,
                },
                Err(err) => SheetOutcome::Skipped {
                    respondent,
                    reason: err.to_string(),
                },
            }
        })
        .collect()
}
