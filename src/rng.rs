//! Seedable random number generator for deterministic testing.
//!
//! When a seed is provided via [`Config::rng_seed`][crate::Config::rng_seed],
//! timer jitter and explicit record nonces are deterministic. Key material,
//! cookies and hello randoms always come from the operating system.

use rand::distributions::{Distribution, Standard};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Random source for non-secret values.
pub struct SeededRng {
    inner: Option<StdRng>,
}

impl SeededRng {
    /// Create a new RNG with an optional seed.
    ///
    /// Without a seed, values come from the thread-local generator.
    pub fn new(seed: Option<u64>) -> Self {
        let inner = seed.map(StdRng::seed_from_u64);
        Self { inner }
    }

    pub fn gen<T>(&mut self) -> T
    where
        Standard: Distribution<T>,
    {
        match self.inner.as_mut() {
            Some(rng) => rng.gen(),
            None => rand::random(),
        }
    }

    pub fn is_seeded(&self) -> bool {
        self.inner.is_some()
    }
}

impl std::fmt::Debug for SeededRng {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SeededRng")
            .field("seeded", &self.is_seeded())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_nonces() {
        let mut a = SeededRng::new(Some(7));
        let mut b = SeededRng::new(Some(7));

        let na: [u8; 8] = a.gen();
        let nb: [u8; 8] = b.gen();
        assert_eq!(na, nb);

        let ja: f32 = a.gen();
        let jb: f32 = b.gen();
        assert_eq!(ja, jb);
    }

    #[test]
    fn unseeded_is_marked() {
        let rng = SeededRng::new(None);
        assert!(!rng.is_seeded());
        assert_eq!(format!("{:?}", rng), "SeededRng { seeded: false }");
    }
}
