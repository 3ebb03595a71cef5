//! Error types for workload generation.

use thiserror::Error;

/// Errors raised while parsing templates or building work items.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DataError {
    /// The field template is empty or has a malformed part.
    #[error("Invalid field template '{0}': expected key=value pairs like 'n=0i,f=1.5'")]
    InvalidFieldTemplate(String),

    /// The tag template is malformed.
    #[error("Invalid series template '{0}': expected tags like 'host=server,region=us'")]
    InvalidSeriesTemplate(String),

    /// Unknown timestamp precision.
    #[error("Unknown precision '{0}', expected one of ns, us, ms, s")]
    InvalidPrecision(String),

    /// A measurement or table name is required.
    #[error("Measurement name must not be empty")]
    EmptyMeasurement,

    /// String pool must hold at least one string.
    #[error("String pool must not be empty")]
    EmptyPool,
}
