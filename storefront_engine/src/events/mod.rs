//! Order lifecycle events.
//!
//! The engine publishes an event whenever an order is placed, paid or cancelled. Listeners register async hooks via
//! [`EventHooks`]; each hook gets its own channel and runs independently of the request that triggered it.
mod channel;
mod event_types;
mod hooks;

pub use channel::{EventHandler, EventProducer, Handler};
pub use event_types::*;
pub use hooks::{EventHandlers, EventHooks, EventProducers};
