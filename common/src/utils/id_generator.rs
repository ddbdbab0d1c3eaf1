//! Unique ID generator.
//!
//! Provides utilities for generating unique identifiers.

use chrono::Utc;
use uuid::Uuid;

/// Generates unique identifiers for various entities.
pub struct IdGenerator;

impl IdGenerator {
    /// Generates a time-based saved-connection ID (`conn_<unix millis>`).
    pub fn connection_id() -> String {
        format!("conn_{}", Utc::now().timestamp_millis())
    }

    /// Generates a session ID (`session_<unix millis>_<random suffix>`).
    ///
    /// Unique with overwhelming probability within one process; collisions
    /// are not checked.
    pub fn session_id() -> String {
        format!("session_{}_{}", Utc::now().timestamp_millis(), Self::short_id())
    }

    /// Generates a unique request ID.
    pub fn request_id() -> String {
        Uuid::new_v4().to_string()
    }

    /// Generates a short random ID (9 hex characters).
    pub fn short_id() -> String {
        Uuid::new_v4().simple().to_string()[..9].to_string()
    }
}
