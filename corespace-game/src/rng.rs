//! Seeded randomness segregated by domain.
use hmac::{Hmac, Mac};
use rand::rngs::SmallRng;
use rand::{RngCore, SeedableRng};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::cell::{RefCell, RefMut};

use crate::constants::{MAX_RESTORE_DRAWS, RNG_TAG_IDS, RNG_TAG_SPAWN};

/// Persistable position of an [`RngBundle`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RngState {
    #[serde(default)]
    pub seed: u64,
    #[serde(default)]
    pub spawn_draws: u64,
    #[serde(default)]
    pub id_draws: u64,
}

/// Deterministic bundle of RNG streams: one for parasite spawns, one for instance ids.
#[derive(Debug, Clone)]
pub struct RngBundle {
    seed: u64,
    spawn: RefCell<CountingRng<SmallRng>>,
    ids: RefCell<CountingRng<SmallRng>>,
}

impl RngBundle {
    /// Construct the bundle from a user-visible seed.
    #[must_use]
    pub fn from_user_seed(seed: u64) -> Self {
        Self {
            seed,
            spawn: RefCell::new(CountingRng::new(derive_stream_seed(seed, RNG_TAG_SPAWN))),
            ids: RefCell::new(CountingRng::new(derive_stream_seed(seed, RNG_TAG_IDS))),
        }
    }

    /// Rebuild a bundle and fast-forward each stream to its recorded draw count.
    ///
    /// A count above [`MAX_RESTORE_DRAWS`] is not replayed; that stream starts
    /// fresh instead. The flag is `true` when any stream was reset.
    #[must_use]
    pub fn restore(state: RngState) -> (Self, bool) {
        let bundle = Self::from_user_seed(state.seed);
        let spawn_ok = fast_forward(&mut bundle.spawn(), state.spawn_draws, "spawn");
        let ids_ok = fast_forward(&mut bundle.ids(), state.id_draws, "ids");
        (bundle, !(spawn_ok && ids_ok))
    }

    #[must_use]
    pub const fn seed(&self) -> u64 {
        self.seed
    }

    /// Access the parasite spawn stream.
    #[must_use]
    pub fn spawn(&self) -> RefMut<'_, CountingRng<SmallRng>> {
        self.spawn.borrow_mut()
    }

    /// Access the instance id stream.
    #[must_use]
    pub fn ids(&self) -> RefMut<'_, CountingRng<SmallRng>> {
        self.ids.borrow_mut()
    }

    #[must_use]
    pub fn state(&self) -> RngState {
        RngState {
            seed: self.seed,
            spawn_draws: self.spawn.borrow().draws(),
            id_draws: self.ids.borrow().draws(),
        }
    }
}

fn fast_forward(stream: &mut CountingRng<SmallRng>, draws: u64, label: &str) -> bool {
    if draws > MAX_RESTORE_DRAWS {
        log::warn!("{label} stream recorded {draws} draws; reseeding instead of replaying");
        return false;
    }
    stream.advance(draws);
    true
}

/// Counting wrapper so stream positions can be persisted and replayed.
#[derive(Debug, Clone)]
pub struct CountingRng<R> {
    rng: R,
    draws: u64,
}

impl CountingRng<SmallRng> {
    fn new(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
            draws: 0,
        }
    }
}

impl<R: RngCore> CountingRng<R> {
    /// Number of draw calls performed against this stream.
    #[must_use]
    pub const fn draws(&self) -> u64 {
        self.draws
    }

    /// Discard `draws` words. Streams are only ever read one word per call,
    /// so this lands on the same position the original draws reached.
    pub fn advance(&mut self, draws: u64) {
        for _ in 0..draws {
            self.next_u64();
        }
    }
}

impl<R: RngCore> RngCore for CountingRng<R> {
    fn next_u32(&mut self) -> u32 {
        self.draws = self.draws.saturating_add(1);
        self.rng.next_u32()
    }

    fn next_u64(&mut self) -> u64 {
        self.draws = self.draws.saturating_add(1);
        self.rng.next_u64()
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        self.draws = self.draws.saturating_add(1);
        self.rng.fill_bytes(dest);
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

/// Per-domain seed from the user seed, so streams never share state.
///
/// # Panics
///
/// Never in practice: HMAC accepts keys of any length and the digest is 32 bytes.
#[must_use]
pub fn derive_stream_seed(user_seed: u64, domain_tag: &[u8]) -> u64 {
    let mut mac =
        Hmac::<Sha256>::new_from_slice(&user_seed.to_le_bytes()).expect("64-bit seed is valid key");
    mac.update(domain_tag);
    let digest = mac.finalize().into_bytes();
    let seed_bytes: [u8; 8] = digest[..8].try_into().expect("digest slice length");
    u64::from_le_bytes(seed_bytes)
}
