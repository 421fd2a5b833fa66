//! Shared SHA-256 helpers.
//!
//! Used by `seed` for prompt-hash seeds and by `assets` for content
//! identities of local reference files.

use sha2::{Digest, Sha256};

/// Compute a SHA-256 hex digest of the given bytes.
pub fn sha256_hex(data: &[u8]) -> String {
    let hash = Sha256::digest(data);
    format!("{hash:x}")
}

/// First 32 bits of the SHA-256 digest, big-endian.
pub fn sha256_prefix_u32(data: &[u8]) -> u32 {
    let hash = Sha256::digest(data);
    u32::from_be_bytes([hash[0], hash[1], hash[2], hash[3]])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_produces_known_hash() {
        let hash = sha256_hex(b"");
        assert_eq!(
            hash,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn prefix_matches_hex_digest() {
        assert_eq!(sha256_prefix_u32(b""), 0xe3b0_c442);
        let data = b"hello world";
        assert_eq!(
            format!("{:08x}", sha256_prefix_u32(data)),
            sha256_hex(data)[..8]
        );
    }
}
