mod cli;
mod demo;
mod infra;
mod routes;
mod server;

use water_pathways::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
