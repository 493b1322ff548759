pub mod abuse;
pub mod challenge;
pub mod config;
pub mod error;
pub mod presence;
pub mod queue;
pub mod registry;
pub mod router;
pub mod routes;
pub mod server;
pub mod session;

use agora_types::Timestamp;

/// Current wall-clock time in Unix milliseconds.
pub fn now_millis() -> Timestamp {
    chrono::Utc::now().timestamp_millis()
}
