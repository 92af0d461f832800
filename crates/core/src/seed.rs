//! Epoch seed chain
//!
//! Each epoch's seed commits to the previous seed and to a window of recent block
//! hashes chosen by the chain layer.

use sha3::{Digest, Sha3_256};

use crate::params::SEED_BYTES;

/// `SHA3-256(previous || recent[0] || recent[1] || ...)`
pub fn derive_seed(
    previous: &[u8; SEED_BYTES],
    recent_block_hashes: &[[u8; 32]],
) -> [u8; SEED_BYTES] {
    let mut hasher = Sha3_256::new();
    hasher.update(previous);
    for block_hash in recent_block_hashes {
        hasher.update(block_hash);
    }
    hasher.finalize().into()
}

/// Fold [`derive_seed`] over consecutive epoch windows, starting from `genesis`.
pub fn seed_for_epoch<'a, I>(genesis: &[u8; SEED_BYTES], windows: I) -> [u8; SEED_BYTES]
where
    I: IntoIterator<Item = &'a [[u8; 32]]>,
{
    windows
        .into_iter()
        .fold(*genesis, |seed, window| derive_seed(&seed, window))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seed_is_sha3_of_concatenation() {
        let previous = [0u8; 32];
        let blocks = [[1u8; 32], [2u8; 32]];

        let mut concat = previous.to_vec();
        concat.extend_from_slice(&blocks[0]);
        concat.extend_from_slice(&blocks[1]);
        let expected: [u8; 32] = Sha3_256::digest(&concat).into();

        assert_eq!(derive_seed(&previous, &blocks), expected);
        assert_eq!(
            hex::encode(expected),
            "53db6a4df39e2326b428d0a0ad59138f6cc90f898f222d7266e2ac5f26f58789"
        );
    }

    #[test]
    fn test_seed_depends_on_order() {
        let previous = [7u8; 32];
        let a = derive_seed(&previous, &[[1u8; 32], [2u8; 32]]);
        let b = derive_seed(&previous, &[[2u8; 32], [1u8; 32]]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_empty_window_hashes_previous_only() {
        let previous = [9u8; 32];
        let expected: [u8; 32] = Sha3_256::digest(previous).into();
        assert_eq!(derive_seed(&previous, &[]), expected);
    }

    #[test]
    fn test_seed_for_epoch_folds_windows() {
        let genesis = [0u8; 32];
        let w1 = [[1u8; 32]];
        let w2 = [[2u8; 32], [3u8; 32]];

        let manual = derive_seed(&derive_seed(&genesis, &w1), &w2);
        let folded = seed_for_epoch(&genesis, [&w1[..], &w2[..]]);
        assert_eq!(folded, manual);
        assert_eq!(seed_for_epoch(&genesis, core::iter::empty()), genesis);
    }
}
