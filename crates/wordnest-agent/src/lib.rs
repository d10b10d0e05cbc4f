//! # WordNest Agent
//!
//! The conversational side of the bot:
//! - [`dialogue`]: pure state machine for the setup conversation
//! - [`bot`]: executes dialogue effects against the store, scheduler and sync
//! - [`inbox`]: fans inbound messages out to one ordered worker per learner

pub mod bot;
pub mod dialogue;
pub mod inbox;

pub use bot::WordNestBot;
pub use dialogue::{DialogueOptions, DialogueSession, Effect, Input, Stage, Transition};
pub use inbox::Inbox;
