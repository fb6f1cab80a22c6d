use clap::Args;
use skill_match::assessment::{
    import::score_sheets, AnswerSheetImporter, QuestionLoadError, QuestionSet, ScoringConfig,
    ScoringEngine, ScoringMode, SheetOutcome,
};
use skill_match::error::AppError;
use std::io::{self, Write};
use std::path::PathBuf;
use tracing::warn;

#[derive(Args, Debug)]
pub(crate) struct ScoreArgs {
    /// JSON question list in the `GET /questions` format
    #[arg(long)]
    pub(crate) questions: PathBuf,
    /// CSV answer sheet with `respondent,question_id,value` columns
    #[arg(long)]
    pub(crate) answers: PathBuf,
    /// Scoring mode (`weighted` or `multiplicative`)
    #[arg(long, default_value_t = ScoringMode::WeightedNormalized)]
    pub(crate) mode: ScoringMode,
}

pub(crate) fn run_scoring(args: ScoreArgs) -> Result<(), AppError> {
    let raw = std::fs::read_to_string(&args.questions)?;
    let questions = QuestionSet::from_json(&raw).map_err(QuestionLoadError::from)?;
    let sheets = AnswerSheetImporter::from_path(&args.answers)?;
    let engine = ScoringEngine::new(ScoringConfig::new(args.mode));

    let outcomes = score_sheets(&questions, &sheets, &engine);
    let mut stdout = io::stdout();
    let mut stderr = io::stderr();
    render_outcomes(&outcomes, &mut stdout, &mut stderr)
}

/// Scored sheets go to `out` as JSON lines; skipped respondents are reported on `err`.
pub(crate) fn render_outcomes<O, E>(
    outcomes: &[SheetOutcome],
    out: &mut O,
    err: &mut E,
) -> Result<(), AppError>
where
    O: Write,
    E: Write,
{
    let mut skipped = 0usize;
    for outcome in outcomes {
        match outcome {
            SheetOutcome::Scored { .. } => {
                let line = serde_json::to_string(outcome)
                    .map_err(|error| io::Error::new(io::ErrorKind::InvalidData, error))?;
                writeln!(out, "{line}")?;
            }
            SheetOutcome::Skipped { respondent, reason } => {
                skipped += 1;
                warn!(%respondent, %reason, "answer sheet skipped");
                writeln!(err, "skipped {respondent}: {reason}")?;
            }
        }
    }
    writeln!(
        err,
        "scored {} of {} respondent(s)",
        outcomes.len() - skipped,
        outcomes.len()
    )?;
    Ok(())
}
