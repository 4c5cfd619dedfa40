//! Dodge and reaction resolution
//!
//! Order of checks for an incoming hit:
//! 1. Hard status gates (frozen, held, asleep; paralysis by chance)
//! 2. Reaction attempt - if one fires, no dodge is rolled at all
//! 3. Evasion pool vs the attack's net successes (ties favor the dodger)
//! 4. One luck-token reroll on failure, if the policy allows
//! 5. A safe destination tile; without one a successful roll still fails

use rand::seq::SliceRandom;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::battle::battlefield::Battlefield;
use crate::battle::hooks::CombatHooks;
use crate::combat::attack::AttackDescriptor;
use crate::combat::combatant::Combatant;
use crate::combat::constants::{DODGE_DISTANCES, MIN_DODGE_POOL};
use crate::combat::dice::{roll_pool, DiceOutcome};
use crate::combat::status::StatusKind;
use crate::core::config::CombatConfig;
use crate::core::types::{GridPos, COMPASS_DIRECTIONS};

/// Status that stopped a defender from responding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DodgeGate {
    Frozen,
    Held,
    Asleep,
    Paralyzed,
}

impl DodgeGate {
    fn describe(&self, name: &str) -> String {
        match self {
            DodgeGate::Frozen => format!("{} is frozen and cannot dodge!", name),
            DodgeGate::Held => format!("{} is held fast and cannot dodge!", name),
            DodgeGate::Asleep => format!("{} is asleep and cannot dodge!", name),
            DodgeGate::Paralyzed => format!("{} is paralyzed and cannot dodge!", name),
        }
    }
}

/// Everything the resolver looks at for one incoming hit
pub struct DodgeContext<'a> {
    pub attacker: &'a Combatant,
    pub defender: &'a Combatant,
    pub attack_roll: &'a DiceOutcome,
    pub attack: &'a AttackDescriptor,
    pub field: &'a Battlefield,
}

/// Outcome of a dodge/reaction resolution
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DodgeResolution {
    pub dodged: bool,
    pub reacted: bool,
    /// The dodge roll that decided the outcome (reroll replaces the first)
    pub roll: Option<DiceOutcome>,
    pub gate: Option<DodgeGate>,
    pub luck_token_used: bool,
    pub destination: Option<GridPos>,
    pub messages: Vec<String>,
}

/// Status gate check, rolling for paralysis
pub fn status_gate<R: Rng + ?Sized>(
    defender: &Combatant,
    config: &CombatConfig,
    rng: &mut R,
) -> Option<DodgeGate> {
    let statuses = &defender.statuses;
    if statuses.has(StatusKind::Frozen) {
        Some(DodgeGate::Frozen)
    } else if statuses.has(StatusKind::Held) {
        Some(DodgeGate::Held)
    } else if statuses.has(StatusKind::Asleep) {
        Some(DodgeGate::Asleep)
    } else if statuses.has(StatusKind::Paralyzed) && rng.gen_bool(config.paralysis_skip_chance) {
        Some(DodgeGate::Paralyzed)
    } else {
        None
    }
}

/// Decide whether an incoming hit lands
pub async fn resolve_dodge(
    ctx: &DodgeContext<'_>,
    hooks: &CombatHooks,
    config: &CombatConfig,
    rng: &mut ChaCha8Rng,
) -> DodgeResolution {
    let mut resolution = DodgeResolution::default();
    let name = &ctx.defender.name;

    if let Some(gate) = status_gate(ctx.defender, config, rng) {
        resolution.gate = Some(gate);
        resolution.messages.push(gate.describe(name));
        return resolution;
    }

    if hooks
        .reactions
        .attempt_reaction(ctx.defender, ctx.attacker, ctx.attack)
        .await
    {
        resolution.reacted = true;
        resolution
            .messages
            .push(format!("{} reacts to {}!", name, ctx.attack.name));
        return resolution;
    }

    let attack_net = ctx.attack_roll.adjusted_net();
    let pool = ctx.defender.stats.evasion.max(MIN_DODGE_POOL);
    let mut roll = roll_pool(pool, rng);
    let mut success = roll.adjusted_net() >= attack_net;
    tracing::debug!(
        defender = %ctx.defender.id,
        dodge_net = roll.adjusted_net(),
        attack_net,
        success,
        "dodge roll"
    );

    if !success
        && ctx.defender.luck.remaining > 0
        && hooks.luck.should_use_luck_token(ctx.defender, &roll).await
    {
        let reroll = hooks
            .luck
            .use_luck_token(ctx.defender, &roll, pool, attack_net, rng)
            .await;
        resolution.luck_token_used = true;
        if !reroll.message.is_empty() {
            resolution.messages.push(reroll.message);
        }
        success = reroll.success;
        roll = reroll.roll;
    }
    resolution.roll = Some(roll);

    if !success {
        resolution
            .messages
            .push(format!("{} failed to dodge {}.", name, ctx.attack.name));
        return resolution;
    }

    let candidates = find_dodge_positions(ctx.field, ctx.defender, ctx.attacker, ctx.attack.ranged);
    match candidates.choose(rng) {
        Some(dest) => {
            resolution.dodged = true;
            resolution.destination = Some(*dest);
            resolution
                .messages
                .push(format!("{} dodged {} to {}!", name, ctx.attack.name, dest));
        }
        None => {
            resolution
                .messages
                .push(format!("{} had nowhere to dodge to!", name));
        }
    }

    resolution
}

/// Candidate tiles a defender could dodge to
///
/// The eight compass directions at distances 1 and 2. A candidate survives
/// if the whole footprint is in bounds and free, and it actually gets out of
/// the attack: out of melee reach, or off every row, column and diagonal
/// through a ranged attacker.
pub fn find_dodge_positions(
    field: &Battlefield,
    defender: &Combatant,
    attacker: &Combatant,
    ranged: bool,
) -> Vec<GridPos> {
    let attacker_cells = attacker.footprint();
    let mut candidates = Vec::new();

    for distance in DODGE_DISTANCES {
        for (dx, dy) in COMPASS_DIRECTIONS {
            let candidate = defender.position.offset(dx * distance, dy * distance);
            if !field.footprint_fits(candidate, defender.size, Some(defender.id)) {
                continue;
            }

            let escapes = if ranged {
                !candidate.is_colinear_with(&attacker.position)
            } else {
                let cells = defender.size.footprint_at(candidate);
                cells.iter().all(|cell| {
                    attacker_cells
                        .iter()
                        .all(|a| cell.grid_distance(a) > 1)
                })
            };

            if escapes {
                candidates.push(candidate);
            }
        }
    }

    candidates
}
