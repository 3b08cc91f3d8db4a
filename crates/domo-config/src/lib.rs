//! Configuration loading for domo
//!
//! Two YAML documents drive the engine: the application config (locations,
//! output settings, path to the schedule) and the schedule document itself
//! (day and template maps). Both are plain serde models loaded from files;
//! the schedule document is replaced wholesale on hot reload, never mutated.

mod app;
mod document;
mod error;
mod loader;

pub use app::{
    AppConfig, AudioConfig, AudioLocationConfig, LightConfig, PubSubConfig,
};
pub use document::{
    DateSpan, DaySpec, ScheduleDocument, ScheduleEntry, TemplateSpec, TimerMarker, WhenSpec,
};
pub use error::{ConfigError, ConfigResult};
pub use loader::{load_app_config, load_schedule_document};
