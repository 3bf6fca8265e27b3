//! FlowDeck Tab Events
//!
//! In-process publish/subscribe for tab lifecycle notifications:
//! - `add`, `remove`, `select` and `reorder` events with typed payloads
//! - subscribe to every kind, or to one kind
//! - every subscription returns a [`Subscription`] that removes it again
//!
//! Delivery is synchronous and in registration order. A panicking listener is
//! isolated so the rest of the fan-out still happens.

mod bus;
mod error;
mod event;
mod hooks;
mod kind;

pub use bus::{tab_events, Subscription, TabEventBus};
pub use error::EventError;
pub use event::{TabDescriptor, TabEvent, TabReorder};
pub use hooks::{tab_event_debugger, TabEventHandlers, TabEventHooks};
pub use kind::TabEventKind;

pub type Result<T> = std::result::Result<T, EventError>;
