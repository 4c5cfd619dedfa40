//! Hit damage and damage application
//!
//! Damage is a summed dice roll scaled by the type chart and the weather.
//! Application is shared by every attack resolver; health reaching zero is
//! always routed through the defeat coordinator.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::battle::events::BattleEventKind;
use crate::battle::hooks::CombatHooks;
use crate::battle::session::BattleSession;
use crate::combat::attack::AttackDescriptor;
use crate::combat::combatant::Combatant;
use crate::combat::constants::MIN_HIT_DAMAGE;
use crate::combat::defeat::handle_defeat;
use crate::combat::dice::roll_sum;
use crate::core::error::Result;
use crate::core::types::CombatantId;

/// Breakdown of one hit's damage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HitDamage {
    pub dice: u32,
    pub raw: u32,
    pub type_multiplier: f32,
    pub weather_multiplier: f32,
    pub total: u32,
}

/// Roll damage for one hit
///
/// `bonus_dice` carries the rolling attack's chain bonus; other attacks pass 0.
pub fn roll_hit_damage<R: Rng + ?Sized>(
    attacker: &Combatant,
    defender: &Combatant,
    attack: &AttackDescriptor,
    base_dice: u32,
    bonus_dice: u32,
    hooks: &CombatHooks,
    rng: &mut R,
) -> HitDamage {
    let dice = base_dice + attacker.stats.power + bonus_dice;
    let raw = roll_sum(dice, rng);
    let type_multiplier = hooks
        .modifiers
        .type_effectiveness_multiplier(&attack.kind, &defender.kinds);
    let weather = hooks.modifiers.current_weather();
    let weather_multiplier = hooks.modifiers.weather_multiplier(weather, &attack.kind);
    let scaled = (raw as f32 * type_multiplier * weather_multiplier).round();
    let total = if type_multiplier <= 0.0 {
        0
    } else {
        (scaled as u32).max(MIN_HIT_DAMAGE)
    };

    tracing::debug!(
        attack = %attack.name,
        dice,
        raw,
        type_multiplier,
        weather_multiplier,
        total,
        "hit damage"
    );

    HitDamage {
        dice,
        raw,
        type_multiplier,
        weather_multiplier,
        total,
    }
}

/// Result of applying damage to one combatant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DamageOutcome {
    pub dealt: u32,
    pub remaining_hp: u32,
    pub defeated: bool,
}

/// Apply damage, logging it and handing a zero-health target to defeat
pub async fn deal_damage(
    session: &mut BattleSession,
    hooks: &CombatHooks,
    target: CombatantId,
    amount: u32,
    killer: Option<CombatantId>,
) -> Result<DamageOutcome> {
    let victim = session.combatant_mut(target)?;
    let dealt = victim.take_damage(amount);
    let remaining_hp = victim.hp;
    let name = victim.name.clone();
    session.log_event(
        BattleEventKind::Damage,
        format!("{} took {} damage ({} HP left).", name, dealt, remaining_hp),
    );

    let mut outcome = DamageOutcome {
        dealt,
        remaining_hp,
        defeated: false,
    };
    if remaining_hp == 0 {
        let defeat = handle_defeat(session, hooks, target, killer).await?;
        outcome.defeated = defeat.defeated;
        outcome.remaining_hp = session.combatant(target)?.hp;
    }
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::hooks::{ModifierSource, NoDoubleTurns, Weather};
    use crate::combat::combatant::StatBlock;
    use crate::core::config::CombatConfig;
    use crate::core::types::{GridPos, TeamIndex};
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    struct Immune;

    impl ModifierSource for Immune {
        fn type_effectiveness_multiplier(&self, _: &str, _: &[String]) -> f32 {
            0.0
        }

        fn current_weather(&self) -> Weather {
            Weather::Clear
        }
    }

    struct SunnyFire;

    impl ModifierSource for SunnyFire {
        fn type_effectiveness_multiplier(&self, kind: &str, defender: &[String]) -> f32 {
            if kind == "fire" && defender.iter().any(|k| k == "grass") {
                2.0
            } else {
                1.0
            }
        }

        fn current_weather(&self) -> Weather {
            Weather::Sun
        }

        fn weather_multiplier(&self, weather: Weather, kind: &str) -> f32 {
            if weather == Weather::Sun && kind == "fire" {
                1.5
            } else {
                1.0
            }
        }
    }

    fn pair() -> (Combatant, Combatant) {
        let attacker = Combatant::new("Attacker", TeamIndex(0), 30, GridPos::new(0, 0))
            .with_stats(StatBlock { power: 2, ..StatBlock::default() });
        let defender = Combatant::new("Defender", TeamIndex(1), 30, GridPos::new(1, 0)).with_kinds(&["grass"]);
        (attacker, defender)
    }

    #[test]
    fn test_dice_include_power_and_chain_bonus() {
        let (attacker, defender) = pair();
        let attack = AttackDescriptor::melee("Rollout", "rock");
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let hit = roll_hit_damage(&attacker, &defender, &attack, 3, 6, &CombatHooks::default(), &mut rng);
        assert_eq!(hit.dice, 11);
        assert!((11..=66).contains(&hit.raw));
        assert_eq!(hit.total, hit.raw);
    }

    #[test]
    fn test_modifiers_scale_damage() {
        let (attacker, defender) = pair();
        let attack = AttackDescriptor::melee("Flame Wheel", "fire");
        let hooks = CombatHooks::default().with_modifiers(SunnyFire);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let hit = roll_hit_damage(&attacker, &defender, &attack, 3, 0, &hooks, &mut rng);
        assert_eq!(hit.type_multiplier, 2.0);
        assert_eq!(hit.weather_multiplier, 1.5);
        assert_eq!(hit.total, (hit.raw as f32 * 3.0).round() as u32);
    }

    #[test]
    fn test_immunity_deals_nothing() {
        let (attacker, defender) = pair();
        let attack = AttackDescriptor::melee("Tackle", "normal");
        let hooks = CombatHooks::default().with_modifiers(Immune);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        let hit = roll_hit_damage(&attacker, &defender, &attack, 3, 0, &hooks, &mut rng);
        assert_eq!(hit.total, 0);
    }

    #[tokio::test]
    async fn test_lethal_damage_defeats() {
        let mut session = BattleSession::new(CombatConfig::default(), 6, 6, 1);
        let (attacker, defender) = pair();
        let killer = session.add_combatant(attacker).unwrap();
        let target = session.add_combatant(defender).unwrap();
        session.start_round(&NoDoubleTurns);
        let hooks = CombatHooks::default();

        let first = deal_damage(&mut session, &hooks, target, 10, Some(killer)).await.unwrap();
        assert_eq!(first, DamageOutcome { dealt: 10, remaining_hp: 20, defeated: false });

        let second = deal_damage(&mut session, &hooks, target, 50, Some(killer)).await.unwrap();
        assert_eq!(second.dealt, 20);
        assert!(second.defeated);
        assert!(!session.scheduler.contains(target));
        assert!(session.log.contains("took 20 damage"));
    }
}
