//! Partial-success bookkeeping for metadata sub-queries.
//!
//! Once a driver is connected, each per-table or per-collection step yields a
//! [`Fetched`] value: the data, or a default plus a [`MetadataWarning`]. The
//! driver hands every result to a [`WarningLog`], which logs the warning and
//! keeps it for the caller; the value is used either way.

use std::fmt;

use crate::clients::ClientResult;

/// Introspection step that can degrade independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataStep {
    Tables,
    Columns,
    RowCount,
    PrimaryKeys,
    ForeignKeys,
    Indexes,
    TableInfo,
    SampleData,
    DocumentCount,
    Documents,
}

impl MetadataStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetadataStep::Tables => "tables",
            MetadataStep::Columns => "columns",
            MetadataStep::RowCount => "row_count",
            MetadataStep::PrimaryKeys => "primary_keys",
            MetadataStep::ForeignKeys => "foreign_keys",
            MetadataStep::Indexes => "indexes",
            MetadataStep::TableInfo => "table_info",
            MetadataStep::SampleData => "sample_data",
            MetadataStep::DocumentCount => "document_count",
            MetadataStep::Documents => "documents",
        }
    }
}

impl fmt::Display for MetadataStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A non-fatal failure of one step for one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataWarning {
    /// `schema.table`, table or collection name.
    pub target: String,
    pub step: MetadataStep,
    pub message: String,
}

impl fmt::Display for MetadataWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]: {}", self.target, self.step, self.message)
    }
}

/// Value of a sub-fetch together with the warning that replaced it, if any.
#[derive(Debug)]
pub struct Fetched<T> {
    pub value: T,
    pub warning: Option<MetadataWarning>,
}

impl<T: Default> Fetched<T> {
    /// Uses the default value when the fetch failed.
    pub fn from_result(target: &str, step: MetadataStep, result: ClientResult<T>) -> Self {
        match result {
            Ok(value) => Self {
                value,
                warning: None,
            },
            Err(e) => Self {
                value: T::default(),
                warning: Some(MetadataWarning {
                    target: target.to_string(),
                    step,
                    message: e.to_string(),
                }),
            },
        }
    }
}

/// Collects warnings raised during one exploration.
#[derive(Debug, Default)]
pub struct WarningLog {
    warnings: Vec<MetadataWarning>,
}

impl WarningLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unwraps a sub-fetch, recording its warning.
    pub fn take<T>(&mut self, fetched: Fetched<T>) -> T {
        if let Some(warning) = fetched.warning {
            self.push(warning);
        }
        fetched.value
    }

    /// Shorthand for `take(Fetched::from_result(..))`.
    pub fn settle<T: Default>(
        &mut self,
        target: &str,
        step: MetadataStep,
        result: ClientResult<T>,
    ) -> T {
        self.take(Fetched::from_result(target, step, result))
    }

    pub fn push(&mut self, warning: MetadataWarning) {
        tracing::warn!(
            target_name = %warning.target,
            step = %warning.step,
            error = %warning.message,
            "metadata fetch degraded"
        );
        self.warnings.push(warning);
    }

    /// Number of degraded steps so far.
    pub fn count(&self) -> usize {
        self.warnings.len()
    }

    pub fn into_warnings(self) -> Vec<MetadataWarning> {
        self.warnings
    }
}
