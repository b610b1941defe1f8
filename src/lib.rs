//! An event dispatcher and immutable state store for reactive application
//! cores.
//!
//! A [`Store`] owns one current [`Value`] and applies structural [`Diff`]s
//! to it through a single serialized update channel; every published state
//! is a new immutable value sharing untouched subtrees with its
//! predecessor. An [`EventBus`] broadcasts typed events to observers in
//! subscription order, queueing reentrant dispatches instead of
//! interleaving them, and a store can pair a state transition with an event
//! dispatch as one step.
//!
//! ```
//! use coreflux::{Diff, Event, EventBus, OperationResult, Store, Value};
//!
//! struct Ticked(i64);
//! impl Event for Ticked {}
//!
//! let bus = EventBus::new();
//! let store = Store::with_bus(Value::record([("count", 0)]), &bus);
//!
//! store.update_state(Diff::new().with("count", |v| {
//!     (v.as_int().unwrap_or(0) + 1).into()
//! }));
//! assert_eq!(store.state().get("count"), Some(&Value::Int(1)));
//!
//! store.execute(|state| {
//!     let count = state.get("count").and_then(Value::as_int).unwrap_or(0) + 1;
//!     OperationResult::new()
//!         .update(Diff::new().set("count", count))
//!         .event(Ticked(count))
//! });
//! assert_eq!(store.state().get("count"), Some(&Value::Int(2)));
//! ```

mod core;
mod event;
mod store;
mod subscription;
mod update;
mod utils;
mod value;

pub use crate::core::Core;
pub use event::{Event, EventBus};
pub use store::{Derived, OperationResult, Store};
pub use subscription::Subscription;
pub use update::{apply, merge, Diff, InvalidDiffError, Patch};
pub use value::{shallow_eq, Record, Value};
