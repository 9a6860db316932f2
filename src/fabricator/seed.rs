//! Random source for one segment.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use sha2::{Digest, Sha256};

/// Derives the seed of one segment from a base seed.
///
/// SHA-256 of `base:chain_id:offset`, first 8 bytes little-endian.
pub fn segment_seed(base: u64, chain_id: &str, offset: u64) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(format!("{}:{}:{}", base, chain_id, offset).as_bytes());
    let digest = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}

/// Generator for one segment: reproducible when `base` is set, OS entropy otherwise.
pub fn segment_rng(base: Option<u64>, chain_id: &str, offset: u64) -> ChaCha8Rng {
    match base {
        Some(base) => ChaCha8Rng::seed_from_u64(segment_seed(base, chain_id, offset)),
        None => ChaCha8Rng::from_entropy(),
    }
}
