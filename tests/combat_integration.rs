//! Combat mechanics integration tests
//!
//! Dice, status effects and dodges exercised through the public API the way
//! a battle driver uses them.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use squad_combat::battle::hooks::ReactionSelector;
use squad_combat::battle::{BattleSession, Battlefield, CombatHooks};
use squad_combat::combat::combatant::chain_bonus_dice;
use squad_combat::combat::status::{dot_damage, tick_turn_end, AddOutcome};
use squad_combat::combat::*;
use squad_combat::core::types::{GridPos, TeamIndex};
use squad_combat::core::CombatConfig;

#[test]
fn test_speed_three_initiative_is_three_dice() {
    let mut rng = ChaCha8Rng::seed_from_u64(2024);
    let mut seen_min = u32::MAX;
    let mut seen_max = 0;
    for _ in 0..5000 {
        let roll = roll_sum(3, &mut rng);
        assert!((3..=18).contains(&roll));
        seen_min = seen_min.min(roll);
        seen_max = seen_max.max(roll);
    }
    assert_eq!(seen_min, 3);
    assert_eq!(seen_max, 18);
}

#[test]
fn test_pool_counts_are_consistent() {
    let mut rng = ChaCha8Rng::seed_from_u64(1);
    for n in 0..12 {
        let outcome = roll_pool(n, &mut rng);
        assert_eq!(outcome.dice_count(), n.max(1) as usize);
        assert_eq!(
            outcome.successes as i32 - outcome.failures as i32,
            outcome.net_successes
        );
    }
}

#[test]
fn test_dodge_ties_favor_the_defender() {
    // Two successes each: the dodge holds
    let attack = DiceOutcome::from_faces(vec![5, 6, 3]);
    let dodge = DiceOutcome::from_faces(vec![6, 6, 2, 4]);
    assert_eq!(attack.adjusted_net(), 2);
    assert!(dodge.adjusted_net() >= attack.adjusted_net());

    // One net success against two: the dodge fails
    let weak = DiceOutcome::from_faces(vec![5, 2]);
    assert!(weak.adjusted_net() < attack.adjusted_net());
}

#[test]
fn test_chain_bonus_dice() {
    assert_eq!(chain_bonus_dice(3, 3, 15), 6);
    assert_eq!(chain_bonus_dice(6, 3, 15), 15);
    assert_eq!(chain_bonus_dice(7, 3, 15), chain_bonus_dice(6, 3, 15));
    assert_eq!(chain_bonus_dice(1, 3, 15), 0);
    assert_eq!(chain_bonus_dice(0, 3, 15), 0);
}

#[test]
fn test_burn_on_thirty_two_max_health() {
    let config = CombatConfig::default();
    let mut c = Combatant::new("Kindling", TeamIndex(0), 32, GridPos::new(0, 0));
    c.statuses.add(StatusKind::Burned, ApplyOptions::default());
    let burn = c.statuses.get(StatusKind::Burned).unwrap();
    assert_eq!(dot_damage(burn, 32, &config), 4);
    assert_eq!(tick_turn_end(&c, &config).damage, 4);
}

#[test]
fn test_poison_forms_never_coexist() {
    let mut c = Combatant::new("Target", TeamIndex(0), 32, GridPos::new(0, 0));
    assert_eq!(c.statuses.add(StatusKind::BadlyPoisoned, ApplyOptions::default()), AddOutcome::Applied);
    assert_eq!(
        c.statuses.add(StatusKind::Poisoned, ApplyOptions::default()),
        AddOutcome::BlockedByStrongerPoison
    );
    assert!(!c.statuses.has(StatusKind::Poisoned));

    let mut d = Combatant::new("Other", TeamIndex(0), 32, GridPos::new(0, 0));
    d.statuses.add(StatusKind::Poisoned, ApplyOptions::default());
    assert_eq!(d.statuses.add(StatusKind::BadlyPoisoned, ApplyOptions::default()), AddOutcome::Upgraded);
    assert!(d.statuses.has(StatusKind::BadlyPoisoned));
    assert!(!d.statuses.has(StatusKind::Poisoned));
}

struct Counter;

#[async_trait::async_trait]
impl ReactionSelector for Counter {
    async fn attempt_reaction(&self, _: &Combatant, _: &Combatant, _: &AttackDescriptor) -> bool {
        true
    }
}

#[tokio::test]
async fn test_reaction_always_excludes_dodge() {
    let mut field = Battlefield::new(8, 8);
    let attacker = Combatant::new("Attacker", TeamIndex(0), 30, GridPos::new(2, 2));
    let defender = Combatant::new("Defender", TeamIndex(1), 30, GridPos::new(3, 2));
    field.place(attacker.id, attacker.position, attacker.size).unwrap();
    field.place(defender.id, defender.position, defender.size).unwrap();

    let hooks = CombatHooks::default().with_reactions(Counter);
    let config = CombatConfig::default();
    let attack = AttackDescriptor::melee("Tackle", "normal");
    let mut rng = ChaCha8Rng::seed_from_u64(99);
    for _ in 0..50 {
        let attack_roll = roll_pool(3, &mut rng);
        let ctx = DodgeContext {
            attacker: &attacker,
            defender: &defender,
            attack_roll: &attack_roll,
            attack: &attack,
            field: &field,
        };
        let result = resolve_dodge(&ctx, &hooks, &config, &mut rng).await;
        assert!(result.reacted);
        assert!(!result.dodged);
        assert!(result.roll.is_none());
    }
}

#[tokio::test]
async fn test_strike_reaction_blocks_damage() {
    let mut session = BattleSession::new(CombatConfig::default(), 8, 8, 5);
    let a = session
        .add_combatant(Combatant::new("A", TeamIndex(0), 30, GridPos::new(2, 2)))
        .unwrap();
    let b = session
        .add_combatant(Combatant::new("B", TeamIndex(1), 30, GridPos::new(3, 2)))
        .unwrap();
    let hooks = CombatHooks::default().with_reactions(Counter);
    let report = strike(&mut session, &hooks, a, b, &AttackDescriptor::melee("Tackle", "normal"))
        .await
        .unwrap();
    assert!(report.result.reacted);
    assert!(!report.result.hit);
    assert_eq!(session.combatant(b).unwrap().hp, 30);
}
