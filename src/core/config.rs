//! Combat configuration with documented constants
//!
//! All tunable numbers are collected here with explanations of their purpose
//! and how they interact with each other. Values can be overridden from a
//! TOML file; missing keys keep their defaults.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::core::error::{CombatError, Result};

/// Configuration for the combat resolution systems
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatConfig {
    // === STATUS EFFECTS ===
    /// Chance that paralysis makes the owner lose its turn
    ///
    /// Also used as the chance that paralysis blocks a dodge or reaction.
    pub paralysis_skip_chance: f64,

    /// Chance per owner turn that sleep wears off on its own
    pub sleep_wake_chance: f64,

    /// Chance per owner turn that frozen thaws on its own
    pub frozen_thaw_chance: f64,

    /// Owner turns after which frozen is force-cleared
    pub frozen_max_turns: u32,

    /// Chance that a confused owner's action may target allies this turn
    pub confusion_chance: f64,

    // === DAMAGE OVER TIME ===
    /// Divisor applied to max health for poison, seeded and held ticks
    pub minor_dot_divisor: u32,

    /// Divisor applied to max health for burn ticks (rounded up)
    pub burn_divisor: u32,

    /// Divisor applied to max health for curse ticks
    pub curse_divisor: u32,

    // === ROLLING ATTACK ===
    /// Flat damage dice every rolling attack hit starts with
    pub rolling_base_dice: u32,

    /// Highest value the chain counter can reach
    pub chain_cap: u8,

    /// Extra damage dice per chain step beyond the first
    pub chain_dice_per_step: u32,

    /// Upper bound on chain bonus dice
    ///
    /// With a cap of 6 and 3 dice per step this is reached exactly at the
    /// cap: (6 - 1) * 3 = 15.
    pub chain_bonus_cap: u32,

    /// Sub-cell step used when searching for the rolling endpoint
    pub endpoint_step: f32,

    /// Time the attacker takes to advance one path cell (milliseconds)
    pub step_delay_ms: u64,

    /// Time a dodging combatant needs to finish relocating (milliseconds)
    ///
    /// A target whose window has not elapsed when the attacker's hitbox
    /// reaches it is caught mid-dodge.
    pub dodge_window_ms: u64,

    // === STRIKES ===
    /// Flat damage dice for a single-target strike
    pub strike_base_dice: u32,

    /// Maximum reach of a ranged strike in grid steps
    pub ranged_reach: u32,

    /// Length of a cone attack in grid steps
    pub cone_length: u32,

    // === DEFEAT ===
    /// How long the defeat coordinator waits for an explosion hook (milliseconds)
    pub explosion_timeout_ms: u64,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            // Status chances
            paralysis_skip_chance: 0.30,
            sleep_wake_chance: 0.20,
            frozen_thaw_chance: 0.10,
            frozen_max_turns: 3,
            confusion_chance: 0.50,

            // Damage over time (1/16, 1/8 rounded up, 1/4)
            minor_dot_divisor: 16,
            burn_divisor: 8,
            curse_divisor: 4,

            // Rolling attack
            rolling_base_dice: 3,
            chain_cap: 6,
            chain_dice_per_step: 3,
            chain_bonus_cap: 15,
            endpoint_step: 0.5,
            step_delay_ms: 120,
            dodge_window_ms: 300,

            // Strikes
            strike_base_dice: 3,
            ranged_reach: 6,
            cone_length: 3,

            // Defeat
            explosion_timeout_ms: 5_000,
        }
    }
}

impl CombatConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse overrides from a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: CombatConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load overrides from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn step_delay(&self) -> Duration {
        Duration::from_millis(self.step_delay_ms)
    }

    pub fn dodge_window(&self) -> Duration {
        Duration::from_millis(self.dodge_window_ms)
    }

    pub fn explosion_timeout(&self) -> Duration {
        Duration::from_millis(self.explosion_timeout_ms)
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> Result<()> {
        let chances = [
            ("paralysis_skip_chance", self.paralysis_skip_chance),
            ("sleep_wake_chance", self.sleep_wake_chance),
            ("frozen_thaw_chance", self.frozen_thaw_chance),
            ("confusion_chance", self.confusion_chance),
        ];
        for (name, value) in chances {
            if !(0.0..=1.0).contains(&value) {
                return Err(CombatError::InvalidConfig(format!(
                    "{} ({}) must be within 0.0..=1.0",
                    name, value
                )));
            }
        }

        if self.minor_dot_divisor == 0 || self.burn_divisor == 0 || self.curse_divisor == 0 {
            return Err(CombatError::InvalidConfig(
                "damage divisors must be positive".into(),
            ));
        }

        if self.chain_cap == 0 {
            return Err(CombatError::InvalidConfig("chain_cap must be at least 1".into()));
        }

        if self.endpoint_step <= 0.0 || self.endpoint_step > 1.0 {
            return Err(CombatError::InvalidConfig(format!(
                "endpoint_step ({}) must be within (0.0, 1.0]",
                self.endpoint_step
            )));
        }

        if self.frozen_max_turns == 0 {
            return Err(CombatError::InvalidConfig(
                "frozen_max_turns must be at least 1".into(),
            ));
        }

        Ok(())
    }
}
