//! Domain layer: entities, newtypes, wire messages, and errors
//!
//! Everything here is pure data plus validation. The diff/plan algorithms
//! that operate on these types live in `peersync-sync`.

pub mod connection;
pub mod errors;
pub mod messages;
pub mod newtypes;
pub mod plan;
pub mod snapshot;
