//! Per-chain random streams.
//!
//! A sampling pass receives one `u64` seed. [`RngKey::split`] expands it into
//! one key per chain by running ChaCha8 from that seed, so chain `c` sees the
//! same stream no matter how chains are scheduled across threads, and adding
//! chains never changes the streams of existing ones.

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Seed of one chain's random stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RngKey(pub u64);

impl RngKey {
    pub fn new(seed: u64) -> Self {
        RngKey(seed)
    }

    /// `n` chain keys derived from this one. A single chain keeps the key
    /// itself.
    pub fn split(self, n: usize) -> Vec<RngKey> {
        match n {
            0 => Vec::new(),
            1 => vec![self],
            _ => {
                let mut parent = ChaCha8Rng::seed_from_u64(self.0);
                (0..n).map(|_| RngKey(parent.next_u64())).collect()
            }
        }
    }

    /// The chain's generator.
    pub fn rng(self) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(self.0)
    }
}
