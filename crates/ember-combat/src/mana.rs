//! Regenerating resource spent by player abilities.

use serde::{Deserialize, Serialize};

/// Mana pool.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Mana {
    /// Current mana
    pub current: f32,
    /// Pool size
    pub max: f32,
    /// Regeneration per second
    pub regen_per_sec: f32,
}

impl Default for Mana {
    fn default() -> Self {
        Self::new(100.0, 12.0)
    }
}

impl Mana {
    /// Creates a full pool.
    #[must_use]
    pub fn new(max: f32, regen_per_sec: f32) -> Self {
        let max = max.max(0.0);
        Self {
            current: max,
            max,
            regen_per_sec: regen_per_sec.max(0.0),
        }
    }

    /// Whether `cost` can be paid.
    #[must_use]
    pub fn can_afford(&self, cost: f32) -> bool {
        cost <= 0.0 || self.current >= cost
    }

    /// Pays `cost` if affordable. Returns false and spends nothing otherwise.
    pub fn spend(&mut self, cost: f32) -> bool {
        if !self.can_afford(cost) {
            return false;
        }
        self.current = (self.current - cost.max(0.0)).max(0.0);
        true
    }

    /// Regenerates for `dt` seconds.
    pub fn regenerate(&mut self, dt: f32) {
        self.current = (self.current + self.regen_per_sec * dt).min(self.max);
    }

    /// Mana as a fraction of the pool.
    #[must_use]
    pub fn fraction(&self) -> f32 {
        if self.max <= 0.0 {
            0.0
        } else {
            self.current / self.max
        }
    }

    /// Refills the pool.
    pub fn refill(&mut self) {
        self.current = self.max;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spend_and_regen() {
        let mut mana = Mana::new(100.0, 12.0);
        assert!(mana.spend(30.0));
        assert!((mana.current - 70.0).abs() < 0.001);
        mana.regenerate(1.0);
        assert!((mana.current - 82.0).abs() < 0.001);
        mana.regenerate(10.0);
        assert!((mana.current - 100.0).abs() < 0.001);
    }

    #[test]
    fn test_insufficient_mana_spends_nothing() {
        let mut mana = Mana::new(10.0, 0.0);
        assert!(!mana.spend(15.0));
        assert!((mana.current - 10.0).abs() < 0.001);
        assert!(mana.spend(0.0));
    }
}
