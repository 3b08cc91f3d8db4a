//! Error types for schedule resolution

use thiserror::Error;

/// Result type for schedule operations
pub type ScheduleResult<T> = Result<T, ScheduleError>;

/// Errors raised while resolving a schedule document.
///
/// These indicate a broken document, not a runtime condition to recover
/// from; resolution fails loudly rather than silently skipping.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ScheduleError {
    /// The `replaces` relation between the selected days contains a cycle.
    #[error("possible circular loop in replaces among days {days:?}")]
    CircularReplaces { days: Vec<String> },

    /// An entry or an ad hoc activation referenced a template that does not
    /// exist in the document.
    #[error("unknown template '{name}'")]
    UnknownTemplate { name: String },

    /// Template references nest deeper than the fixed limit, which means a
    /// template ultimately includes itself.
    #[error("template nesting exceeds {limit} levels while expanding '{name}'")]
    TemplateTooDeep { name: String, limit: usize },

    /// A `timer` marker needs a preceding entry to act as the start anchor.
    #[error("timer marker at {time} in '{context}' has no preceding entry to anchor to")]
    TimerMarkerWithoutAnchor { context: String, time: String },
}
