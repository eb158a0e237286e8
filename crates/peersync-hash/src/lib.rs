//! PeerSync Hash - Content fingerprinting
//!
//! Provides:
//! - [`digest`] - one-shot SHA-256 content digest
//! - [`ChunkedHasher`] - incremental digest over byte ranges with bounded
//!   memory, matching the one-shot result for the same concatenation
//! - [`metadata_fingerprint`] - cheap non-cryptographic fingerprint over
//!   size and mtime, used to short-circuit unchanged-file detection
//!   before paying for a full content hash
//!
//! Hashing itself has no failure mode observable by callers; read errors
//! on the input propagate from the caller's own I/O.

pub mod digest;
pub mod fingerprint;

pub use digest::{digest, ChunkedHasher};
pub use fingerprint::metadata_fingerprint;
