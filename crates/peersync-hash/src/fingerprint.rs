//! Fast metadata fingerprints
//!
//! A cheap rolling hash over the string form of a file's size and
//! modification time. Only used to short-circuit unchanged-file checks:
//! equal fingerprints skip the full content digest, differing ones fall
//! through to it. Never used for integrity decisions.

/// FNV-1a offset basis (64-bit).
const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;

/// FNV-1a prime (64-bit).
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// Computes a fast, non-cryptographic fingerprint of file metadata.
///
/// Rolls FNV-1a over `"{size}:{last_modified_millis}"`. Deterministic,
/// collision-tolerant by design (collisions only cost a redundant content
/// hash, never a missed change, because callers re-hash on mismatching
/// content anyway).
#[must_use]
pub fn metadata_fingerprint(size: u64, last_modified_millis: i64) -> u64 {
    let input = format!("{size}:{last_modified_millis}");

    let mut hash = FNV_OFFSET;
    for byte in input.bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}
