//! Server configuration from command-line flags and environment variables.

use std::time::Duration;

use clap::Parser;

use crate::usecase::DEFAULT_HISTORY_LIMIT;

/// Real-time room relay for collaborative editing
#[derive(Debug, Clone, Parser)]
#[command(name = "codeshare-server")]
#[command(version, about, long_about = None)]
pub struct ServerConfig {
    /// Address to bind
    #[arg(long, env = "CODESHARE_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port to listen on
    #[arg(short, long, env = "CODESHARE_PORT", default_value_t = 5001)]
    pub port: u16,

    /// PostgreSQL connection string; chat is kept in memory when absent
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Size of the PostgreSQL connection pool
    #[arg(long, env = "CODESHARE_DB_MAX_CONNECTIONS", default_value_t = 5)]
    pub db_max_connections: u32,

    /// Chat messages replayed to a connection when it joins a room
    #[arg(long, env = "CODESHARE_HISTORY_LIMIT", default_value_t = DEFAULT_HISTORY_LIMIT)]
    pub history_limit: usize,

    /// Evict presences idle for this many seconds (disabled when unset or 0)
    #[arg(long, env = "CODESHARE_IDLE_TIMEOUT_SECS")]
    pub idle_timeout_secs: Option<u64>,

    /// Default log level; RUST_LOG overrides it
    #[arg(long, env = "CODESHARE_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl ServerConfig {
    /// `host:port` to bind
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}
