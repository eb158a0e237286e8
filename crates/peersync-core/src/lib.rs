//! PeerSync Core - Domain types and business rules
//!
//! This crate contains the shared domain layer with:
//! - **Newtypes** - `PeerId`, `SessionId`, `ConfigId`, `RelativePath`, `ContentHash`
//! - **Entities** - `FileSnapshot`, `SyncConfig`, `SyncState`, `ConflictFile`
//! - **Wire types** - `SignalingMessage`, `SyncMessage`, `ChunkData`
//! - **State machine** - per-peer `ConnectionState` transitions
//! - **Configuration** - endpoint derivation and the persisted peer identity
//!
//! The domain module is pure: no I/O and no network. Engine crates
//! (`peersync-signal`, `peersync-transfer`, `peersync-sync`) build on
//! these types and own the side effects.

pub mod config;
pub mod domain;
pub mod identity;
pub mod logging;
