//! Event model for the Mafia arena
//!
//! Typed game events, the visibility predicate that decides who may see
//! each one, and the broadcast bus transports subscribe to.

mod bus;
mod types;
mod visibility;

pub use bus::{EventBus, EventSink, NullSink};
pub use types::*;
pub use visibility::{should_deliver, Subscriber};
