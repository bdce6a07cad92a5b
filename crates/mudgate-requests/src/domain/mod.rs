//! Domain layer: registry, rules and commands. No I/O.

pub mod commands;
pub mod events;
pub mod field_map;
pub mod navigation;
pub mod registry;
pub mod status;
pub mod validators;
