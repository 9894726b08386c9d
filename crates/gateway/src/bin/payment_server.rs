//! Payment service RPC server.

use gateway::config::LeafService;
use gateway::error::StartupError;

#[tokio::main]
async fn main() -> Result<(), StartupError> {
    gateway::server::run_leaf_server(LeafService::Payment).await
}
