//! Storefront domain: value objects, aggregates and events. No I/O lives here.
pub mod aggregates;
pub mod events;
pub mod value_objects;
