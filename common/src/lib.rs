//! Shared building blocks for the schema explorer.
//!
//! - [`models`]: backend kinds, normalized schema descriptions, saved
//!   connections and session contexts
//! - [`errors`]: the application error type and its HTTP mapping
//! - [`config`]: environment-driven service configuration
//! - [`response`]: the unified API response envelope
//! - [`middleware`]: request-id propagation
//! - [`utils`]: id generation and secret masking

pub mod config;
pub mod errors;
pub mod middleware;
pub mod models;
pub mod response;
pub mod utils;
