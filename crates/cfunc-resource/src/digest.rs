//! Content digests of canonical document forms

use std::fmt::{self, Display, Formatter};

/// A 32-byte content digest (Blake3)
///
/// Computed over canonical serializations; equal digests mean byte-identical
/// output, which is what idempotence checks compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ContentDigest([u8; 32]);

impl ContentDigest {
    /// Compute Blake3 digest of arbitrary data
    #[inline]
    #[must_use]
    pub fn compute(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }
}

impl Display for ContentDigest {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digest_deterministic() {
        assert_eq!(ContentDigest::compute(b"a"), ContentDigest::compute(b"a"));
        assert_ne!(ContentDigest::compute(b"a"), ContentDigest::compute(b"b"));
    }

    #[test]
    fn digest_display_hex() {
        let digest = ContentDigest::compute(b"test");
        assert_eq!(digest.to_string().len(), 64);
        assert!(digest.to_string().chars().all(|c| c.is_ascii_hexdigit()));
    }
}
