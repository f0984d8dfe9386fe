//! Client core for Robin group chat rooms.
//!
//! The [`session::SessionController`] owns all chat state and reacts to three
//! event sources: realtime pushes from [`realtime`], user intents from the
//! view, and completions of outbound room actions from [`room`]. Everything
//! else is a collaborator injected at construction.

pub mod api;
pub mod cli;
pub mod collections;
pub mod config;
pub mod error;
pub mod events;
pub mod input;
pub mod join;
pub mod models;
pub mod notifications;
pub mod realtime;
pub mod room;
pub mod session;
pub mod terminal;
pub mod unread;
pub mod validators;
pub mod view;
pub mod vote;

pub use error::{Result, RobinError};
