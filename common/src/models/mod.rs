//! Shared data models.

pub mod backend;
pub mod connection;
pub mod schema;
pub mod session;

// Re-export commonly used types
pub use backend::BackendKind;
pub use connection::{Connection, ConnectionSummary, SaveConnectionRequest};
pub use schema::{
    ColumnDescription, ConnectionStatus, EndpointDescription, FieldDescription, ForeignKey,
    IndexDescription, InferredType, Record, ResponseShape, SchemaDescription, SchemaGroup,
    SchemaPayload, Statistics, TableDescription, MAX_SAMPLE_ROWS,
};
pub use session::{Credentials, SessionContext, SessionSummary, SessionView};
