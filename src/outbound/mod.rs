//! Outbound flow: reply text → emotion tags → memes appended to the message.

pub mod composer;
pub mod interceptor;

pub use composer::{MemeSelector, ResultComposer};
pub use interceptor::{PendingEmotions, ResponseInterceptor};
