//! Gateway entry point.

use gateway::error::StartupError;

#[tokio::main]
async fn main() -> Result<(), StartupError> {
    gateway::server::run_gateway().await
}
