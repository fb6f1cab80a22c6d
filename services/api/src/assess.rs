use crate::infra::{api_client, apply_api_url};
use clap::Args;
use skill_match::assessment::{
    load_question_set, AssessmentFlow, FlowError, FlowState, LikertLevel, Presentation,
    ResultSubmitter, ScoringConfig, ScoringEngine, SessionContext, SkillProfile,
};
use skill_match::config::AppConfig;
use skill_match::error::AppError;
use std::io::{self, BufRead, Write};
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct AssessArgs {
    /// Identifier of the user whose record receives the profile
    #[arg(long)]
    pub(crate) user_id: String,
    /// Override the base URL of the question and user API
    #[arg(long)]
    pub(crate) api_url: Option<String>,
    /// Print the profile without saving it
    #[arg(long)]
    pub(crate) no_save: bool,
}

pub(crate) async fn run_assessment(args: AssessArgs) -> Result<(), AppError> {
    let AssessArgs {
        user_id,
        api_url,
        no_save,
    } = args;

    let mut config = AppConfig::load()?;
    apply_api_url(&mut config.api, api_url)?;
    let context = SessionContext::new(user_id.trim());
    let client = Arc::new(api_client(&config.api)?);

    let questions = load_question_set(client.as_ref()).await?;
    let mut flow = AssessmentFlow::new(
        config.assessment.presentation,
        ScoringEngine::new(ScoringConfig::new(config.assessment.scoring_mode)),
    );
    flow.load(flow.epoch(), questions)
        .map_err(|err| AppError::Assessment(err.into()))?;

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let Some(profile) = run_questionnaire(&mut flow, stdin.lock(), &mut stdout)? else {
        writeln!(stdout, "Assessment abandoned; nothing saved.")?;
        return Ok(());
    };

    render_profile(&profile, &mut stdout)?;

    if no_save {
        writeln!(stdout, "Skipping save (--no-save).")?;
        return Ok(());
    }

    let committed = ResultSubmitter::new(client)
        .save_profile(&context.user_id, &profile)
        .await?;
    writeln!(
        stdout,
        "Saved profile for user {} at {}.",
        committed.user_id,
        committed.assessed_at.to_rfc3339()
    )?;
    Ok(())
}

/// Drive the flow from line-based input until it completes or the respondent quits.
///
/// Accepts `1`-`5` to answer, `b` to go back, `r` to start over and `q` to quit.
pub(crate) fn run_questionnaire<R, W>(
    flow: &mut AssessmentFlow,
    input: R,
    output: &mut W,
) -> io::Result<Option<SkillProfile>>
where
    R: BufRead,
    W: Write,
{
    let mut lines = input.lines();

    loop {
        if let FlowState::Complete(profile) = flow.state() {
            return Ok(Some(profile.clone()));
        }
        let Some(question) = flow.current_question() else {
            return Ok(None);
        };

        writeln!(
            output,
            "\n[{}/{}] {} ({}% done)",
            flow.cursor() + 1,
            flow.total(),
            question.text,
            flow.progress()
        )?;
        if let Some(previous) = flow.answers().get_answer(&question.id) {
            writeln!(output, "  current answer: {}", previous.label())?;
        }
        for level in LikertLevel::ALL {
            writeln!(output, "  {}) {}", level.value(), level.label())?;
        }
        write!(output, "answer [1-5], b=back, r=restart, q=quit: ")?;
        output.flush()?;

        let Some(line) = lines.next().transpose()? else {
            return Ok(None);
        };

        let outcome = match line.trim() {
            "q" | "quit" => return Ok(None),
            "b" | "back" => flow.back(),
            "r" | "restart" => flow.reset(),
            raw => match raw.parse::<i64>() {
                Ok(value) => answer_current(flow, value),
                Err(_) => {
                    writeln!(output, "Please enter a number from 1 to 5.")?;
                    continue;
                }
            },
        };

        if let Err(err) = outcome {
            writeln!(output, "{err}")?;
        }
    }
}

fn answer_current(flow: &mut AssessmentFlow, value: i64) -> Result<(), FlowError> {
    flow.select(value)?;
    let moves_on = flow.presentation() != Presentation::AutoAdvance
        && matches!(flow.state(), FlowState::InProgress);
    if moves_on {
        flow.advance()?;
    }
    Ok(())
}

fn render_profile<W: Write>(profile: &SkillProfile, output: &mut W) -> io::Result<()> {
    writeln!(output, "\nSkill profile ({} scoring)", profile.mode)?;
    for (category, score) in profile.display_scores() {
        writeln!(output, "  {:<30} {:>5}", category.label(), score)?;
    }
    Ok(())
}
