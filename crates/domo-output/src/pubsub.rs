//! Generic pub/sub output
//!
//! Publishes every deliverable action as JSON on a broadcast channel, one
//! topic per location. External transports (an MQTT bridge, a websocket
//! fan-out) subscribe and forward; with no subscriber attached publication
//! is a no-op, matching broadcast semantics.

use crate::{Output, OutputError};
use async_trait::async_trait;
use domo_config::PubSubConfig;
use domo_core::Action;
use tokio::sync::broadcast;
use tracing::trace;

/// A published action notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PubSubMessage {
    pub topic: String,
    pub payload: serde_json::Value,
}

/// Output publishing actions to pub/sub subscribers.
pub struct PubSubOutput {
    config: PubSubConfig,
    sender: broadcast::Sender<PubSubMessage>,
}

impl PubSubOutput {
    pub fn new(config: PubSubConfig) -> Self {
        let (sender, _) = broadcast::channel(config.capacity);
        Self { config, sender }
    }

    /// Subscribe to every published message.
    pub fn subscribe(&self) -> broadcast::Receiver<PubSubMessage> {
        self.sender.subscribe()
    }
}

#[async_trait]
impl Output for PubSubOutput {
    fn name(&self) -> &'static str {
        "pubsub"
    }

    fn is_action_required_for_location(&self, location: &str, _action: &Action) -> bool {
        !self.config.disabled && self.config.locations.contains(location)
    }

    async fn execute(&self, location: &str, action: &Action) -> Result<(), OutputError> {
        if !self.is_action_required_for_location(location, action) {
            return Ok(());
        }

        let message = PubSubMessage {
            topic: format!("/action/{}", location),
            payload: serde_json::to_value(action)?,
        };
        trace!(topic = %message.topic, "publishing action");

        // No subscribers is fine; the message is simply dropped.
        let _ = self.sender.send(message);
        Ok(())
    }
}
