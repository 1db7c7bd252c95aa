//! Keyed pseudo-random streams.
//!
//! Every random decision shared between embedding and extraction is drawn
//! from a `fastrand::Rng` seeded by hashing a domain tag together with the
//! key, so independent uses of one key never see correlated streams.

use fastrand::Rng;

/// Purpose a keyed stream is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Domain {
    /// Ordering of eligible coefficients.
    Selection,
    /// Payload whitening bytes.
    Whitening,
    /// Direction of ±1 magnitude steps during embedding.
    Direction,
}

impl Domain {
    fn tag(self) -> &'static [u8] {
        match self {
            Domain::Selection => b"outguess/select",
            Domain::Whitening => b"outguess/whiten",
            Domain::Direction => b"outguess/direction",
        }
    }
}

/// Deterministic generator for `key` in `domain`.
pub fn keyed_rng(key: &[u8], domain: Domain) -> Rng {
    let tag = domain.tag();
    Rng::with_seed(hash_seed(tag.iter().chain([0u8].iter()).chain(key.iter())))
}

/// Forward Fisher-Yates shuffle.
///
/// Position `i` is fixed by the `i`-th draw alone, so the first `m` entries
/// do not depend on the slice length beyond them being drawn from it.
/// Draws are 64-bit, keeping the result identical on every platform.
pub fn shuffle<T>(items: &mut [T], rng: &mut Rng) {
    let len = items.len() as u64;
    for i in 0..items.len() {
        let j = rng.u64(i as u64..len) as usize;
        items.swap(i, j);
    }
}

/// Hash seed bytes to u64 for RNG seeding (FNV-1a).
fn hash_seed<'a>(bytes: impl Iterator<Item = &'a u8>) -> u64 {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;

    bytes.fold(FNV_OFFSET, |hash, &byte| {
        (hash ^ (byte as u64)).wrapping_mul(FNV_PRIME)
    })
}
