// crates/flowschema/src/events/mod.rs

mod base;

pub use base::{EventBus, StateEvent};
