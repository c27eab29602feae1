//! Error types for the provtrail core library.
//!
//! Uses `thiserror` for public API error types. Persistence failures are
//! kept in their own enum so store backends do not depend on the façade.

/// Top-level error type for provenance operations.
#[derive(Debug, thiserror::Error)]
pub enum ProvenanceError {
    #[error("Unknown data element definition: {id}")]
    UnknownDefinition { id: String },

    #[error("Missing required field: {field}")]
    MissingField { field: &'static str },

    #[error("Unknown output format: {format}")]
    UnknownFormat { format: String },

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProvenanceError {
    pub fn unknown_definition(id: impl Into<String>) -> Self {
        Self::UnknownDefinition { id: id.into() }
    }

    pub fn missing_field(field: &'static str) -> Self {
        Self::MissingField { field }
    }
}

/// Errors from the entity store backends.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Corrupt store: {message}")]
    Corrupt { message: String },

    #[error("Schema error: {message}")]
    Schema { message: String },
}

impl StoreError {
    pub fn corrupt(message: impl Into<String>) -> Self {
        Self::Corrupt {
            message: message.into(),
        }
    }
}

pub type Result<T, E = ProvenanceError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_definition_message() {
        let err = ProvenanceError::unknown_definition("pulse");
        assert_eq!(err.to_string(), "Unknown data element definition: pulse");
    }

    #[test]
    fn test_store_error_converts() {
        let err: ProvenanceError = StoreError::corrupt("dangling element 7").into();
        assert!(matches!(err, ProvenanceError::Store(StoreError::Corrupt { .. })));
        assert!(err.to_string().contains("dangling element 7"));
    }
}
