use thiserror::Error;

#[derive(Debug, Error)]
pub enum EventStudyError {
    #[error("Invalid input: {field} — {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Unknown expected-return model: {0}")]
    UnknownModel(String),

    #[error("Unknown result column: {0}")]
    UnknownColumn(String),

    #[error("Price data error: {0}")]
    PriceData(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Date error: {0}")]
    DateError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for EventStudyError {
    fn from(e: serde_json::Error) -> Self {
        EventStudyError::SerializationError(e.to_string())
    }
}

impl From<serde_yaml::Error> for EventStudyError {
    fn from(e: serde_yaml::Error) -> Self {
        EventStudyError::Config(e.to_string())
    }
}
