//! Combat mechanics - dice, combatants, status effects and attack resolution
//!
//! Every attack goes through the same pipeline: an accuracy pool roll, the
//! dodge/reaction protocol, damage, and the defeat coordinator.

pub mod attack;
pub mod combatant;
pub mod constants;
pub mod damage;
pub mod defeat;
pub mod dice;
pub mod dodge;
pub mod rolling;
pub mod status;

pub use attack::{cone_attack, strike, AttackDescriptor, ConeReport, StrikeReport, TargetResult};
pub use combatant::{Abilities, ChainCounter, Combatant, LuckTokens, SizeCategory, StatBlock};
pub use damage::{deal_damage, roll_hit_damage, DamageOutcome, HitDamage};
pub use defeat::{handle_defeat, DefeatOutcome};
pub use dice::{forced_roll, roll_pool, roll_sum, DiceOutcome, RollMode};
pub use dodge::{find_dodge_positions, resolve_dodge, DodgeContext, DodgeGate, DodgeResolution};
pub use rolling::{rolling_attack, RollingAttackReport, RollingFailure};
pub use status::{ApplyOptions, StatusEffects, StatusInstance, StatusKind};
