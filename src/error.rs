use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for the analysis engine
pub type Result<T> = std::result::Result<T, AnalysisError>;

/// Error types for the analysis engine.
///
/// Every layer returns these explicitly; nothing is retried and nothing is
/// recovered into a partial model.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Expected {expected}, found {found}")]
    Structural { expected: String, found: String },

    #[error("Unresolved symbol: {0}")]
    Unresolved(String),

    #[error("Package {path} could not be loaded: {reason}")]
    PackageLoad { path: String, reason: String },

    #[error("Index {index} out of range for {what} ({len} available)")]
    Index {
        what: String,
        index: usize,
        len: usize,
    },

    #[error("Unsupported {0}")]
    Unsupported(String),

    #[error("Handler {0} never declares a response")]
    NoResponse(String),

    #[error("Worklist did not settle after {0} passes")]
    NoFixpoint(usize),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Coarse grouping of [`AnalysisError`] variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// A node did not have the expected syntax shape
    Structural,
    /// A symbol, file or package could not be found, read or parsed
    Resolution,
    /// An argument or result position was out of range
    Index,
    /// The program is well-formed but does not fit the analysis
    Domain,
}

impl AnalysisError {
    pub fn structural(expected: impl Into<String>, found: impl Into<String>) -> Self {
        AnalysisError::Structural {
            expected: expected.into(),
            found: found.into(),
        }
    }

    pub fn unresolved(what: impl Into<String>) -> Self {
        AnalysisError::Unresolved(what.into())
    }

    pub fn unsupported(what: impl Into<String>) -> Self {
        AnalysisError::Unsupported(what.into())
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            AnalysisError::Structural { .. } => ErrorCategory::Structural,
            AnalysisError::Io { .. }
            | AnalysisError::Parse { .. }
            | AnalysisError::Unresolved(_)
            | AnalysisError::PackageLoad { .. } => ErrorCategory::Resolution,
            AnalysisError::Index { .. } => ErrorCategory::Index,
            AnalysisError::Config(_)
            | AnalysisError::Unsupported(_)
            | AnalysisError::NoResponse(_)
            | AnalysisError::NoFixpoint(_)
            | AnalysisError::Serialization(_) => ErrorCategory::Domain,
        }
    }
}

impl From<serde_json::Error> for AnalysisError {
    fn from(err: serde_json::Error) -> Self {
        AnalysisError::Serialization(format!("JSON: {}", err))
    }
}

impl From<serde_yaml::Error> for AnalysisError {
    fn from(err: serde_yaml::Error) -> Self {
        AnalysisError::Serialization(format!("YAML: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        assert_eq!(
            AnalysisError::structural("call", "literal").category(),
            ErrorCategory::Structural
        );
        assert_eq!(
            AnalysisError::unresolved("crate::missing").category(),
            ErrorCategory::Resolution
        );
        assert_eq!(
            AnalysisError::Index {
                what: "results".into(),
                index: 2,
                len: 1
            }
            .category(),
            ErrorCategory::Index
        );
        assert_eq!(
            AnalysisError::NoResponse("get_user".into()).category(),
            ErrorCategory::Domain
        );
    }

    #[test]
    fn test_display_messages() {
        let err = AnalysisError::Index {
            what: "arguments of create".into(),
            index: 3,
            len: 2,
        };
        assert_eq!(
            err.to_string(),
            "Index 3 out of range for arguments of create (2 available)"
        );
        assert_eq!(
            AnalysisError::NoResponse("list".into()).to_string(),
            "Handler list never declares a response"
        );
    }
}
