//! Application configuration model
//!
//! Settings for the process itself: the known location set, the path to the
//! schedule document, and per-output settings. Every output carries a
//! `disabled` switch and its own per-location scoping.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

/// Top-level application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Every location the engine will route to; queues are sized from this.
    pub locations: Vec<String>,

    /// Path to the schedule document.
    pub schedule: PathBuf,

    #[serde(default)]
    pub audio: AudioConfig,

    #[serde(default)]
    pub lights: LightConfig,

    #[serde(default)]
    pub pubsub: PubSubConfig,
}

/// Audio output configuration: which locations can say, play and sound.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AudioConfig {
    #[serde(default)]
    pub disabled: bool,

    #[serde(default)]
    pub locations: HashMap<String, AudioLocationConfig>,
}

/// Audio capabilities of one location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioLocationConfig {
    #[serde(default = "yes")]
    pub say: bool,

    #[serde(default = "yes")]
    pub music: bool,

    #[serde(default = "yes")]
    pub sound: bool,
}

impl Default for AudioLocationConfig {
    fn default() -> Self {
        Self { say: true, music: true, sound: true }
    }
}

fn yes() -> bool {
    true
}

/// Lighting output configuration: bulb label groups per location.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LightConfig {
    #[serde(default)]
    pub disabled: bool,

    #[serde(default)]
    pub locations: HashMap<String, Vec<String>>,
}

/// Pub/sub output configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PubSubConfig {
    #[serde(default)]
    pub disabled: bool,

    #[serde(default)]
    pub locations: HashSet<String>,

    /// Broadcast channel capacity for subscribers.
    #[serde(default = "PubSubConfig::default_capacity")]
    pub capacity: usize,
}

impl PubSubConfig {
    fn default_capacity() -> usize {
        1024
    }
}

impl Default for PubSubConfig {
    fn default() -> Self {
        Self {
            disabled: false,
            locations: HashSet::new(),
            capacity: Self::default_capacity(),
        }
    }
}
