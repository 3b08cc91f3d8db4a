//! Core types for the domo scheduling engine
//!
//! This crate provides the fundamental types shared by the resolver, the
//! executor and the outputs: the `Action` tagged union and the `HH:MM`
//! clock-time serde helpers.

mod action;
pub mod time;

pub use action::{
    Action, LightCommand, LightEffect, Message, Music, Sound, TemplateRef, TimerBroadcast,
    TimerCancelled, TimerRequest,
};
pub use time::{format_hhmm, parse_hhmm, TimeError};

/// A named physical zone that actions target (e.g. "bedroom").
pub type Location = String;
