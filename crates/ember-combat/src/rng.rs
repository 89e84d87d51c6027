//! Seeded randomness for spawn placement and probabilistic AI rolls.

use fastrand::Rng;

/// Seeded random source owned by the simulation.
#[derive(Debug)]
pub struct SimRng {
    rng: Rng,
    seed: u64,
}

impl SimRng {
    /// Create a new RNG with seed.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Rng::with_seed(seed),
            seed,
        }
    }

    /// Seed this RNG was created with.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Get random f32 in [0, 1).
    pub fn next_f32(&mut self) -> f32 {
        self.rng.f32()
    }

    /// Returns true with probability `p`.
    pub fn chance(&mut self, p: f32) -> bool {
        self.next_f32() < p
    }

    /// Get random value in range [min, max).
    pub fn range(&mut self, min: f32, max: f32) -> f32 {
        min + self.next_f32() * (max - min)
    }

    /// Random sign, -1 or 1.
    pub fn sign(&mut self) -> f32 {
        if self.rng.bool() {
            1.0
        } else {
            -1.0
        }
    }
}

impl Default for SimRng {
    fn default() -> Self {
        Self::new(12345)
    }
}
