pub mod config;
pub mod descriptive;
pub mod error;
pub mod types;

#[cfg(feature = "event_study")]
pub mod event_study;

#[cfg(feature = "statistics")]
pub mod statistics;

#[cfg(feature = "events")]
pub mod events;

#[cfg(feature = "quality")]
pub mod quality;

#[cfg(feature = "pipeline")]
pub mod pipeline;

pub use config::EventStudyConfig;
pub use error::EventStudyError;
pub use types::*;

/// Standard result type for all event-study operations
pub type EventStudyResult<T> = Result<T, EventStudyError>;
