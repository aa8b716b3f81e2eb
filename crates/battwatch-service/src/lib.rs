//! HTTP service that collects battery telemetry and reports state of health.
//!
//! A field device posts one sample at a time; a browser dashboard polls the
//! latest reading and recent history. The service:
//! - Validates and records each sample in a bounded in-memory history
//! - Writes the history to a JSON snapshot every N samples and on shutdown
//! - Restores the history from that snapshot on startup
//! - Scores battery state of health from the recent voltage window
//!
//! # REST API Endpoints
//!
//! - `POST /data` - Submit a sample
//! - `GET /latest` - Latest sample plus `soh`
//! - `GET /history?limit=N` - Recent samples
//! - `GET /health` - Service health check
//! - `GET /soh` - State-of-health breakdown
//!
//! # Configuration
//!
//! The service reads configuration from `~/.config/battwatch/server.toml`:
//!
//! ```toml
//! [server]
//! bind = "0.0.0.0:5000"
//!
//! [storage]
//! snapshot_path = "~/.local/share/battwatch/history.json"
//! flush_interval = 10   # 0 = only on shutdown
//!
//! [history]
//! capacity = 1000
//! default_limit = 100
//! max_limit = 1000
//! ```

pub mod api;
pub mod config;
pub mod state;

pub use config::{
    Config, ConfigError, FieldError, HistoryConfig, ServerConfig, StorageConfig,
    default_config_path,
};
pub use state::{AppState, HealthReport, HistoryPage, IngestReceipt, LatestStatus, SohReport};
