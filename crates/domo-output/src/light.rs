//! Lighting output
//!
//! Maps each location to a group of bulb labels and translates `lights`
//! actions into `LightUpdate`s for the device transport to apply.

use crate::{Output, OutputError};
use async_trait::async_trait;
use domo_config::LightConfig;
use domo_core::{Action, LightEffect};
use tokio::sync::mpsc;
use tracing::debug;

/// An effect to apply to a group of bulbs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LightUpdate {
    pub labels: Vec<String>,
    pub effect: LightEffect,
}

/// Output handling `lights` actions.
pub struct LightOutput {
    config: LightConfig,
    updates: mpsc::UnboundedSender<LightUpdate>,
}

impl LightOutput {
    /// Create the output and the channel its updates are produced on.
    pub fn new(config: LightConfig) -> (Self, mpsc::UnboundedReceiver<LightUpdate>) {
        let (updates, rx) = mpsc::unbounded_channel();
        (Self { config, updates }, rx)
    }

    fn labels_for_location(&self, location: &str) -> &[String] {
        self.config
            .locations
            .get(location)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

#[async_trait]
impl Output for LightOutput {
    fn name(&self) -> &'static str {
        "lights"
    }

    fn is_action_required_for_location(&self, location: &str, action: &Action) -> bool {
        if self.config.disabled {
            return false;
        }
        if self.labels_for_location(location).is_empty() {
            return false;
        }
        matches!(action, Action::Lights(_))
    }

    async fn execute(&self, location: &str, action: &Action) -> Result<(), OutputError> {
        if !self.is_action_required_for_location(location, action) {
            return Ok(());
        }
        let Action::Lights(command) = action else {
            return Ok(());
        };

        let update = LightUpdate {
            labels: self.labels_for_location(location).to_vec(),
            effect: command.action,
        };
        debug!(location, ?update, "light update");
        self.updates
            .send(update)
            .map_err(|_| OutputError::ChannelClosed { output: "lights" })
    }
}
