//! Audio output: messages, music and sounds
//!
//! Translates `message`, `music` and `sound` actions into `AudioCommand`s on
//! an outbound channel, scoped by per-location capability flags.

use crate::{Output, OutputError};
use async_trait::async_trait;
use domo_config::AudioConfig;
use domo_core::Action;
use tokio::sync::mpsc;
use tracing::debug;

/// A realized audio instruction for one location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioCommand {
    Say { location: String, text: String },
    PlayMusic { location: String, play_list: String },
    PlaySound { location: String, name: String },
}

/// Output handling `message`, `music` and `sound` actions.
pub struct AudioOutput {
    config: AudioConfig,
    commands: mpsc::UnboundedSender<AudioCommand>,
}

impl AudioOutput {
    /// Create the output and the channel its commands are produced on.
    pub fn new(config: AudioConfig) -> (Self, mpsc::UnboundedReceiver<AudioCommand>) {
        let (commands, rx) = mpsc::unbounded_channel();
        (Self { config, commands }, rx)
    }

    fn send(&self, command: AudioCommand) -> Result<(), OutputError> {
        debug!(?command, "audio command");
        self.commands
            .send(command)
            .map_err(|_| OutputError::ChannelClosed { output: "audio" })
    }
}

#[async_trait]
impl Output for AudioOutput {
    fn name(&self) -> &'static str {
        "audio"
    }

    fn is_action_required_for_location(&self, location: &str, action: &Action) -> bool {
        if self.config.disabled {
            return false;
        }
        let Some(capabilities) = self.config.locations.get(location) else {
            return false;
        };
        match action {
            Action::Message(_) => capabilities.say,
            Action::Music(_) => capabilities.music,
            Action::Sound(_) => capabilities.sound,
            _ => false,
        }
    }

    async fn execute(&self, location: &str, action: &Action) -> Result<(), OutputError> {
        if !self.is_action_required_for_location(location, action) {
            return Ok(());
        }

        match action {
            Action::Message(message) => self.send(AudioCommand::Say {
                location: location.to_string(),
                text: message.text.clone(),
            }),
            Action::Music(music) => self.send(AudioCommand::PlayMusic {
                location: location.to_string(),
                play_list: music.play_list.clone(),
            }),
            Action::Sound(sound) => self.send(AudioCommand::PlaySound {
                location: location.to_string(),
                name: sound.name.clone(),
            }),
            _ => Ok(()),
        }
    }
}
