//! SHA-256 content digests
//!
//! The digest is rendered as lowercase hex and wrapped in the domain
//! [`ContentHash`] newtype so downstream comparisons are type-safe.

use sha2::{Digest, Sha256};

use peersync_core::domain::newtypes::ContentHash;

/// Computes the SHA-256 digest of `bytes` in one shot.
///
/// Deterministic and side-effect-free.
#[must_use]
pub fn digest(bytes: &[u8]) -> ContentHash {
    let mut hasher = ChunkedHasher::new();
    hasher.update(bytes);
    hasher.finalize()
}

/// Incremental SHA-256 over a sequence of byte ranges.
///
/// Accepts ranges as they are read so callers never materialize a whole
/// file twice; the result equals [`digest`] over the full concatenation.
#[derive(Debug, Default)]
pub struct ChunkedHasher {
    inner: Sha256,
}

impl ChunkedHasher {
    /// Creates a new empty hasher
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Sha256::new(),
        }
    }

    /// Folds one byte range into the digest state
    pub fn update(&mut self, bytes: &[u8]) {
        self.inner.update(bytes);
    }

    /// Finishes the digest and renders it as a [`ContentHash`]
    #[must_use]
    pub fn finalize(self) -> ContentHash {
        let raw = self.inner.finalize();
        let hex: String = raw.iter().map(|b| format!("{b:02x}")).collect();
        // 32 bytes of SHA-256 always render as 64 hex chars
        ContentHash::new(hex).expect("SHA-256 hex digest is always a valid ContentHash")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_deterministic() {
        let a = digest(b"hello world");
        let b = digest(b"hello world");
        assert_eq!(a, b);
    }

    #[test]
    fn test_digest_known_vector() {
        // SHA-256 of the empty string
        assert_eq!(
            digest(b"").as_str(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        // SHA-256 of "abc"
        assert_eq!(
            digest(b"abc").as_str(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_different_content_different_digest() {
        assert_ne!(digest(b"one"), digest(b"two"));
    }

    #[test]
    fn test_chunked_matches_one_shot() {
        let payload: Vec<u8> = (0u32..10_000).map(|i| (i % 251) as u8).collect();

        let mut hasher = ChunkedHasher::new();
        for range in payload.chunks(777) {
            hasher.update(range);
        }
        assert_eq!(hasher.finalize(), digest(&payload));
    }

    #[test]
    fn test_chunked_split_point_irrelevant() {
        let payload = b"the quick brown fox jumps over the lazy dog";

        let mut a = ChunkedHasher::new();
        a.update(&payload[..10]);
        a.update(&payload[10..]);

        let mut b = ChunkedHasher::new();
        b.update(&payload[..40]);
        b.update(&payload[40..]);

        assert_eq!(a.finalize(), b.finalize());
    }
}
