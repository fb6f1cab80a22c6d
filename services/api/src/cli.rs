use crate::assess::{run_assessment, AssessArgs};
use crate::score::{run_scoring, ScoreArgs};
use crate::server;
use clap::{Args, Parser, Subcommand};
use skill_match::error::AppError;

#[derive(Parser, Debug)]
#[command(
    name = "Skill Match",
    about = "Run skill assessments over HTTP, in the terminal, or in bulk from answer sheets",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Take the assessment interactively and save the resulting profile
    Assess(AssessArgs),
    /// Score CSV answer sheets offline against a question file
    Score(ScoreArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Override the base URL of the question and user API
    #[arg(long)]
    pub(crate) api_url: Option<String>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Assess(args) => run_assessment(args).await,
        Command::Score(args) => run_scoring(args),
    }
}
