//! Utility functions and helpers.

pub mod id_generator;
pub mod masking;

// Re-export commonly used types
pub use id_generator::IdGenerator;
pub use masking::{mask_password, redact_credentials};
