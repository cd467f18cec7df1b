use anyhow::Result;
use roster::cli::{self, telemetry};

// Main function
#[tokio::main]
async fn main() -> Result<()> {
    let (action, globals) = cli::start()?;

    let result = action.execute(&globals).await;

    telemetry::shutdown_tracer();

    result
}
