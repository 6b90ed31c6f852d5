//! Propagation channels and the consumers that subscribe to them.
//!
//! - Channels: one broadcast handle per declared key
//! - Consumers: render passes re-run when a channel they read changes

mod channel;
mod consumer;

pub use channel::Channel;
pub use consumer::Consumer;
