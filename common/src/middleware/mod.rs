//! Middleware components for all services.

pub mod request_id;

// Re-export commonly used types
pub use request_id::{request_id_middleware, REQUEST_ID_HEADER};
