//! BLAKE3 content-addressing primitives.

/// Size of a BLAKE3 hash in bytes.
pub const HASH_SIZE: usize = 32;

/// Type alias for a 32-byte hash.
pub type Hash = [u8; HASH_SIZE];

/// Hashes raw content to a fixed-width digest.
///
/// Used for canonical voucher messages and anywhere a stable
/// content address is needed.
#[must_use]
pub fn hash_content(content: &[u8]) -> Hash {
    *blake3::hash(content).as_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_deterministic() {
        let a = hash_content(b"voucher bytes");
        let b = hash_content(b"voucher bytes");
        assert_eq!(a, b);
        assert_eq!(a.len(), HASH_SIZE);
    }

    #[test]
    fn different_content_different_hash() {
        assert_ne!(hash_content(b"one"), hash_content(b"two"));
    }
}
