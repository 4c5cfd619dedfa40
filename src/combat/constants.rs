//! Combat constants - fixed rules values
//!
//! Tunable chances and durations live in `CombatConfig`; the values here are
//! part of the dice and grid rules themselves.

// Dice
pub const DIE_FACES: u8 = 6;
pub const SUCCESS_THRESHOLD: u8 = 5;
pub const FAILURE_FACE: u8 = 1;
pub const LUCK_REROLL_PENALTY: i32 = 1;

// Dodging
pub const DODGE_DISTANCES: [i32; 2] = [1, 2];
pub const MIN_DODGE_POOL: u32 = 1;

// Damage
pub const MIN_HIT_DAMAGE: u32 = 1;
