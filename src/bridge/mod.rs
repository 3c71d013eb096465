//! Bridge core: channel mapping, routing and shared state.
//!
//! ## Module Structure
//!
//! - `channels`: queues between the sessions
//! - `mapping`: Discord <-> IRC channel table
//! - `orchestrator`: the validated `Bridge`
//! - `router`: per-event routing decisions

pub mod channels;
pub mod mapping;
pub mod orchestrator;
pub mod router;

pub use channels::ChannelBundle;
pub use orchestrator::{Bridge, SharedBridge};
