//! Domain layer: aggregates, their lifecycles, events and value objects
pub mod aggregates;
pub mod events;
pub mod lifecycle;
pub mod value_objects;
