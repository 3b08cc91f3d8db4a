//! Output capability contract and concrete outputs
//!
//! An `Output` is a collaborator able to realize actions at specific
//! locations. The executor asks every registered output whether an action is
//! needed at a location (routing) and later invokes them all concurrently to
//! deliver each dequeued action. Realization mechanics (speech synthesis,
//! light wire protocols, broker transports) stay outside the engine: the
//! concrete outputs here translate actions into typed commands on outbound
//! channels that external transports consume.

mod audio;
mod light;
mod pubsub;

use async_trait::async_trait;
use domo_core::Action;
use thiserror::Error;

pub use audio::{AudioCommand, AudioOutput};
pub use light::{LightOutput, LightUpdate};
pub use pubsub::{PubSubMessage, PubSubOutput};

/// Errors raised while delivering an action to an output.
#[derive(Debug, Error)]
pub enum OutputError {
    /// The outbound command channel has no consumer anymore.
    #[error("output '{output}' command channel closed")]
    ChannelClosed { output: &'static str },

    /// Failed to encode an action for publication.
    #[error("failed to encode action: {0}")]
    Encode(#[from] serde_json::Error),
}

/// A collaborator capable of realizing actions at specific locations.
#[async_trait]
pub trait Output: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Whether this output has anything to do for `action` at `location`.
    fn is_action_required_for_location(&self, location: &str, action: &Action) -> bool;

    /// Realize `action` at `location`. Called for every dequeued action; an
    /// output with nothing to do returns `Ok(())` without side effects.
    async fn execute(&self, location: &str, action: &Action) -> Result<(), OutputError>;
}
