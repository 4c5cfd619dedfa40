//! Dice pool resolution
//!
//! A pool of six-sided dice counts faces of 5 or 6 as successes and faces of
//! 1 as failures. Net successes are successes minus failures. Forcing and
//! luck rerolls replace an outcome; they never merge with the prior one.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::combat::constants::{DIE_FACES, FAILURE_FACE, LUCK_REROLL_PENALTY, SUCCESS_THRESHOLD};

/// Why a pool is being rolled (for logs only)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RollMode {
    Attack,
    Dodge,
    Damage,
    Initiative,
}

/// Structured result of a dice pool roll
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiceOutcome {
    /// Raw faces in roll order
    pub faces: Vec<u8>,
    pub successes: u32,
    pub failures: u32,
    /// Successes minus failures, before any penalty
    pub net_successes: i32,
    /// Penalty subtracted from net successes (forcing or luck reroll)
    pub penalty: i32,
}

impl DiceOutcome {
    /// Build an outcome from already-rolled faces
    pub fn from_faces(faces: Vec<u8>) -> Self {
        let successes = faces.iter().filter(|&&f| f >= SUCCESS_THRESHOLD).count() as u32;
        let failures = faces.iter().filter(|&&f| f == FAILURE_FACE).count() as u32;
        Self {
            faces,
            successes,
            failures,
            net_successes: successes as i32 - failures as i32,
            penalty: 0,
        }
    }

    /// Net successes after the penalty is applied
    pub fn adjusted_net(&self) -> i32 {
        self.net_successes - self.penalty
    }

    pub fn dice_count(&self) -> usize {
        self.faces.len()
    }

    pub fn sum(&self) -> u32 {
        self.faces.iter().map(|&f| f as u32).sum()
    }
}

fn roll_faces<R: Rng + ?Sized>(n: u32, rng: &mut R) -> Vec<u8> {
    (0..n).map(|_| rng.gen_range(1..=DIE_FACES)).collect()
}

/// Roll `max(1, n)` six-sided dice and count successes
pub fn roll_pool<R: Rng + ?Sized>(n: u32, rng: &mut R) -> DiceOutcome {
    let outcome = DiceOutcome::from_faces(roll_faces(n.max(1), rng));
    tracing::debug!(
        dice = outcome.dice_count(),
        net = outcome.net_successes,
        "rolled pool {:?}",
        outcome.faces
    );
    outcome
}

/// Reroll a pool with a penalty on net successes
///
/// A luck-token reroll only ever carries a penalty of 1; prior forcing
/// penalties are not accumulated onto it.
pub fn forced_roll<R: Rng + ?Sized>(
    n: u32,
    prior_penalty: i32,
    mode: RollMode,
    is_luck_token_roll: bool,
    rng: &mut R,
) -> DiceOutcome {
    let mut outcome = DiceOutcome::from_faces(roll_faces(n.max(1), rng));
    outcome.penalty = if is_luck_token_roll {
        LUCK_REROLL_PENALTY
    } else {
        prior_penalty
    };
    tracing::debug!(
        ?mode,
        luck = is_luck_token_roll,
        net = outcome.net_successes,
        adjusted = outcome.adjusted_net(),
        "forced reroll"
    );
    outcome
}

/// Roll `n` dice and return their arithmetic sum
pub fn roll_sum<R: Rng + ?Sized>(n: u32, rng: &mut R) -> u32 {
    roll_faces(n, rng).iter().map(|&f| f as u32).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_from_faces_counts() {
        let outcome = DiceOutcome::from_faces(vec![1, 5, 6, 3, 1, 2]);
        assert_eq!(outcome.successes, 2);
        assert_eq!(outcome.failures, 2);
        assert_eq!(outcome.net_successes, 0);
    }

    #[test]
    fn test_zero_pool_rolls_one_die() {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        assert_eq!(roll_pool(0, &mut rng).dice_count(), 1);
    }

    #[test]
    fn test_forced_roll_keeps_raw_and_adjusted() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let outcome = forced_roll(4, 2, RollMode::Attack, false, &mut rng);
        assert_eq!(outcome.penalty, 2);
        assert_eq!(outcome.adjusted_net(), outcome.net_successes - 2);
    }

    #[test]
    fn test_luck_roll_ignores_prior_penalty() {
        let mut rng = ChaCha8Rng::seed_from_u64(11);
        let outcome = forced_roll(4, 5, RollMode::Dodge, true, &mut rng);
        assert_eq!(outcome.penalty, 1);
    }

    #[test]
    fn test_roll_sum_three_dice_range() {
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for _ in 0..500 {
            let total = roll_sum(3, &mut rng);
            assert!((3..=18).contains(&total));
        }
    }

    proptest! {
        #[test]
        fn prop_pool_size_and_net(n in 0u32..40, seed in any::<u64>()) {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let outcome = roll_pool(n, &mut rng);
            prop_assert_eq!(outcome.dice_count(), n.max(1) as usize);
            prop_assert_eq!(
                outcome.successes as i32 - outcome.failures as i32,
                outcome.net_successes
            );
            prop_assert!(outcome.faces.iter().all(|f| (1..=6).contains(f)));
        }
    }
}
