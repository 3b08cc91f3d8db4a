//! The action tagged union
//!
//! An action is a single tag-keyed value (`{message: {text: "..."}}`). The
//! engine only inspects the tag to decide routing and special handling:
//! `timer` and `template` affect scheduling state, everything else is
//! delivered to outputs. Tags the engine does not recognize are kept verbatim
//! in the `Other` variant and passed through.

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

use crate::time::hhmm_opt;

/// A single schedulable action, keyed by its tag.
///
/// Serializes externally tagged, so the wire shape matches the schedule
/// document: `{lights: {...}}`, `{timer_status: {...}}`, etc. A bag carrying
/// several tags is expressed as a list of actions, one per tag.
///
/// Deserialization dispatches on the tag by hand: a recognized tag with a
/// malformed payload is a hard error, and only unrecognized tags land in
/// `Other`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Drive lights at the target locations.
    Lights(LightCommand),
    /// Speak a message at the target locations.
    Message(Message),
    /// Start a play list at the target locations.
    Music(Music),
    /// Play a named sound at the target locations.
    Sound(Sound),
    /// Start, replace or cancel a named countdown timer.
    Timer(TimerRequest),
    /// Activate a schedule template immediately.
    Template(TemplateRef),
    /// Periodic countdown broadcast at a minute boundary.
    TimerStatus(TimerBroadcast),
    /// Early-warning countdown broadcast just before a minute boundary.
    TimerWarn(TimerBroadcast),
    /// A timer was cancelled or crashed before expiry.
    TimerCancel(TimerCancelled),
    /// Unrecognized tag, passed through to outputs untouched.
    #[serde(untagged)]
    Other(serde_json::Map<String, serde_json::Value>),
}

impl Action {
    /// The action's tag, as written in schedule documents.
    pub fn tag(&self) -> &str {
        match self {
            Action::Lights(_) => "lights",
            Action::Message(_) => "message",
            Action::Music(_) => "music",
            Action::Sound(_) => "sound",
            Action::Timer(_) => "timer",
            Action::Template(_) => "template",
            Action::TimerStatus(_) => "timer_status",
            Action::TimerWarn(_) => "timer_warn",
            Action::TimerCancel(_) => "timer_cancel",
            Action::Other(map) => map.keys().next().map(String::as_str).unwrap_or("unknown"),
        }
    }

    /// Whether this action drives scheduling state rather than devices.
    ///
    /// Scheduling actions propagate to every requested location regardless of
    /// per-output capability.
    pub fn is_scheduling(&self) -> bool {
        matches!(self, Action::Timer(_) | Action::Template(_))
    }
}

impl<'de> Deserialize<'de> for Action {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::Error;

        fn payload<T, E>(tag: &str, value: serde_json::Value) -> Result<T, E>
        where
            T: serde::de::DeserializeOwned,
            E: Error,
        {
            serde_json::from_value(value)
                .map_err(|err| E::custom(format!("invalid '{}' payload: {}", tag, err)))
        }

        let map = serde_json::Map::deserialize(deserializer)?;
        if map.len() != 1 {
            return Err(D::Error::custom(format!(
                "an action carries exactly one tag, found {}",
                map.len()
            )));
        }
        let Some((tag, value)) = map.into_iter().next() else {
            return Err(D::Error::custom("an action carries exactly one tag"));
        };

        match tag.as_str() {
            "lights" => payload(&tag, value).map(Action::Lights),
            "message" => payload(&tag, value).map(Action::Message),
            "music" => payload(&tag, value).map(Action::Music),
            "sound" => payload(&tag, value).map(Action::Sound),
            "timer" => payload(&tag, value).map(Action::Timer),
            "template" => payload(&tag, value).map(Action::Template),
            "timer_status" => payload(&tag, value).map(Action::TimerStatus),
            "timer_warn" => payload(&tag, value).map(Action::TimerWarn),
            "timer_cancel" => payload(&tag, value).map(Action::TimerCancel),
            _ => {
                let mut other = serde_json::Map::new();
                other.insert(tag, value);
                Ok(Action::Other(other))
            }
        }
    }
}

/// Payload of a `lights` action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LightCommand {
    pub action: LightEffect,
}

/// The light effects the engine knows how to ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LightEffect {
    Flash,
    WakeUp,
    TurnOff,
}

/// Payload of a `message` action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub text: String,
}

/// Payload of a `music` action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Music {
    pub play_list: String,
}

/// Payload of a `sound` action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sound {
    pub name: String,
}

/// Payload of a `timer` action: start, replace or cancel a named timer.
///
/// Exactly one of `minutes` and `end_time` must be present to start a timer;
/// `cancel: true` without either only stops the running timer of that name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerRequest {
    #[serde(default = "TimerRequest::default_name")]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minutes: Option<i64>,

    #[serde(default, with = "hhmm_opt", skip_serializing_if = "Option::is_none")]
    pub end_time: Option<NaiveTime>,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub replace: bool,

    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub cancel: bool,
}

impl TimerRequest {
    fn default_name() -> String {
        "default".to_string()
    }
}

impl Default for TimerRequest {
    fn default() -> Self {
        Self {
            name: Self::default_name(),
            minutes: None,
            end_time: None,
            replace: false,
            cancel: false,
        }
    }
}

/// Payload of a `template` action: activate a named template now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateRef {
    pub name: String,
}

/// Payload of `timer_status` and `timer_warn` broadcasts.
///
/// `time_left` and `time_total` are whole minutes; the epoch fields anchor
/// displays to absolute wall-clock time so receivers never drift.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerBroadcast {
    pub name: String,
    pub time_left: i64,
    pub time_total: i64,
    pub epoch_minute: i64,
    pub epoch_finish: i64,
}

/// Payload of a `timer_cancel` broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerCancelled {
    pub name: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_action_tags_round_trip() {
        let action: Action = serde_json::from_value(json!({
            "message": {"text": "Time to wake up."}
        }))
        .unwrap();
        assert_eq!(action, Action::Message(Message { text: "Time to wake up.".into() }));
        assert_eq!(action.tag(), "message");

        let back = serde_json::to_value(&action).unwrap();
        assert_eq!(back, json!({"message": {"text": "Time to wake up."}}));
    }

    #[test]
    fn test_lights_action() {
        let action: Action =
            serde_json::from_value(json!({"lights": {"action": "wake_up"}})).unwrap();
        assert_eq!(
            action,
            Action::Lights(LightCommand { action: LightEffect::WakeUp })
        );
    }

    #[test]
    fn test_timer_request_defaults() {
        let action: Action = serde_json::from_value(json!({"timer": {"minutes": 5}})).unwrap();
        let Action::Timer(request) = action else {
            panic!("expected timer action");
        };
        assert_eq!(request.name, "default");
        assert_eq!(request.minutes, Some(5));
        assert_eq!(request.end_time, None);
        assert!(!request.replace);
        assert!(!request.cancel);
    }

    #[test]
    fn test_timer_request_end_time() {
        let action: Action = serde_json::from_value(json!({
            "timer": {"name": "tea", "end_time": "16:30", "replace": true}
        }))
        .unwrap();
        let Action::Timer(request) = action else {
            panic!("expected timer action");
        };
        assert_eq!(request.name, "tea");
        assert_eq!(
            request.end_time,
            Some(chrono::NaiveTime::from_hms_opt(16, 30, 0).unwrap())
        );
        assert!(request.replace);
    }

    #[test]
    fn test_invalid_end_time_is_rejected() {
        let result: Result<Action, _> =
            serde_json::from_value(json!({"timer": {"end_time": "half past"}}));
        assert!(result.is_err());
    }

    #[test]
    fn test_malformed_known_tag_is_rejected() {
        // A recognized tag with a bad payload must not fall through to the
        // passthrough variant; it would otherwise be routed to device
        // outputs instead of erroring.
        let result: Result<Action, _> =
            serde_json::from_value(json!({"timer": {"end_time": "half past"}}));
        assert!(result.is_err());

        let result: Result<Action, _> =
            serde_json::from_value(json!({"message": {"txt": "typo"}}));
        assert!(result.is_err());

        let result: Result<Action, _> =
            serde_json::from_value(json!({"lights": {"action": "strobe"}}));
        assert!(result.is_err());
    }

    #[test]
    fn test_multi_tag_map_is_rejected() {
        let result: Result<Action, _> = serde_json::from_value(json!({
            "message": {"text": "hi"},
            "sound": {"name": "gong"}
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_tag_passes_through() {
        let value = json!({"hvac": {"mode": "heat", "target": 21}});
        let action: Action = serde_json::from_value(value.clone()).unwrap();
        assert!(matches!(action, Action::Other(_)));
        assert_eq!(action.tag(), "hvac");
        assert_eq!(serde_json::to_value(&action).unwrap(), value);
    }

    #[test]
    fn test_scheduling_actions() {
        let timer: Action = serde_json::from_value(json!({"timer": {"minutes": 1}})).unwrap();
        let template: Action =
            serde_json::from_value(json!({"template": {"name": "bedtime"}})).unwrap();
        let message: Action =
            serde_json::from_value(json!({"message": {"text": "hi"}})).unwrap();

        assert!(timer.is_scheduling());
        assert!(template.is_scheduling());
        assert!(!message.is_scheduling());
    }
}
