//! Collaborative editing relay server.
//!
//! Relays presence, cursor, selection and code changes between the
//! connections of a room and persists room chat.
//!
//! Run with:
//! ```not_rust
//! cargo run --bin codeshare-server -- --port 5001
//! ```

use clap::Parser;
use codeshare_server::ServerConfig;
use codeshare_shared::logger::setup_logger;

#[tokio::main]
async fn main() {
    let config = ServerConfig::parse();

    // Initialize tracing
    setup_logger(env!("CARGO_BIN_NAME"), &config.log_level);

    // Run the server
    if let Err(e) = codeshare_server::run(config).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}
