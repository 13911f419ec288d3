//! Meme sender — emotion-driven meme replies and per-user meme uploads.

pub mod commands;
pub mod config;
pub mod emotions;
pub mod error;
pub mod host;
pub mod inbound;
pub mod message;
pub mod outbound;
pub mod sender;
pub mod store;

pub use sender::MemeSender;
