mod assess;
mod cli;
mod infra;
mod routes;
mod score;
mod server;

use skill_match::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
