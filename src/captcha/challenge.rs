//! Challenge generation
//!
//! Picks the notch position once per widget. The RNG is injected so the
//! browser can seed from entropy and tests can seed deterministically.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::config::CaptchaConfig;

/// Target geometry for one page load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge {
    /// Horizontal offset of the notch (and the matching piece position)
    pub target_x: u32,
    /// Vertical offset of the notch, fixed by config
    pub target_y: u32,
    /// Edge length of the square piece
    pub piece_size: u32,
}

impl Challenge {
    /// Draw a target uniformly from the configured range
    pub fn generate<R: Rng>(config: &CaptchaConfig, rng: &mut R) -> Self {
        let span = config.target_span.max(1);
        let target_x = config.target_min_x.saturating_add(rng.random_range(0..span));
        Self {
            target_x,
            target_y: config.target_y,
            piece_size: config.piece_size,
        }
    }

    /// Notch rectangle in container coordinates (x, y, w, h)
    pub fn notch_rect(&self) -> (u32, u32, u32, u32) {
        (self.target_x, self.target_y, self.piece_size, self.piece_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    #[test]
    fn test_generate_is_deterministic_per_seed() {
        let config = CaptchaConfig::default();
        let a = Challenge::generate(&config, &mut Pcg32::seed_from_u64(7));
        let b = Challenge::generate(&config, &mut Pcg32::seed_from_u64(7));
        assert_eq!(a, b);
        assert_eq!(a.target_y, 50);
        assert_eq!(a.piece_size, 50);
    }

    #[test]
    fn test_single_slot_span() {
        let config = CaptchaConfig {
            target_min_x: 80,
            target_span: 1,
            ..Default::default()
        };
        let mut rng = Pcg32::seed_from_u64(1);
        for _ in 0..20 {
            assert_eq!(Challenge::generate(&config, &mut rng).target_x, 80);
        }
    }

    #[test]
    fn test_covers_both_ends_of_range() {
        let config = CaptchaConfig {
            target_min_x: 10,
            target_span: 3,
            ..Default::default()
        };
        let mut rng = Pcg32::seed_from_u64(99);
        let mut seen = [false; 3];
        for _ in 0..200 {
            let x = Challenge::generate(&config, &mut rng).target_x;
            seen[(x - 10) as usize] = true;
        }
        assert_eq!(seen, [true; 3]);
    }

    proptest! {
        #[test]
        fn prop_target_strictly_inside_travel_range(seed in any::<u64>()) {
            let config = CaptchaConfig::default();
            let challenge = Challenge::generate(&config, &mut Pcg32::seed_from_u64(seed));
            prop_assert!(challenge.target_x >= config.target_min_x);
            prop_assert!(Some(challenge.target_x) <= config.target_max_x());
            prop_assert!(challenge.target_x > 0);
            prop_assert!(challenge.target_x < config.travel_max());
            prop_assert!(challenge.target_x + challenge.piece_size < config.container_width);
        }
    }
}
