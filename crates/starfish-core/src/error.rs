use thiserror::Error;

/// Errors raised while turning a remote JSON document into typed payloads.
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("Expected a JSON object for {0}")]
    NotAnObject(&'static str),

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid field '{field}': {message}")]
    InvalidField { field: &'static str, message: String },

    #[error("Unknown resource type: {0}")]
    UnknownResourceType(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl PayloadError {
    /// Create a new InvalidField error
    pub fn invalid_field(field: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidField {
            field,
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, PayloadError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = PayloadError::MissingField("Results");
        assert_eq!(err.to_string(), "Missing required field: Results");

        let err = PayloadError::invalid_field("Ranges", "expected an array");
        assert_eq!(err.to_string(), "Invalid field 'Ranges': expected an array");
    }
}
