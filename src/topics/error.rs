//! Error definitions for the topic layer

use thiserror::Error;

/// Error types for template authoring and validation
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TopicError {
    /// A template pattern was empty
    #[error("template pattern must not be empty")]
    EmptyPattern,

    /// Unbalanced or nested placeholder braces
    #[error("malformed placeholder braces in pattern '{0}'")]
    MalformedPlaceholder(String),

    /// A brace token other than `{tenant}` or `{serialNo}`
    #[error("unknown placeholder '{token}' in pattern '{pattern}'")]
    UnknownPlaceholder { pattern: String, token: String },

    /// `#` somewhere other than alone in the final level
    #[error("'#' must stand alone as the final level in pattern '{0}'")]
    MultiLevelMisplaced(String),

    /// `+` mixed with literal characters inside a level
    #[error("'+' must occupy a whole level in pattern '{0}'")]
    SingleLevelMisplaced(String),

    /// Template id collision in the store
    #[error("a template with id '{0}' already exists")]
    DuplicateId(String),

    /// Lookup of an id the store does not hold
    #[error("no template with id '{0}'")]
    UnknownId(String),

    /// Quality level outside the protocol range 0..=2
    #[error("invalid quality level {0}, expected 0, 1 or 2")]
    InvalidQualityLevel(u8),
}
