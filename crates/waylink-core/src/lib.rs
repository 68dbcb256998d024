//! # waylink-core
//!
//! Core types, traits, configuration, and error handling for the waylink bot.

pub mod config;
pub mod error;
pub mod event;
pub mod message;
pub mod state;
pub mod traits;
