//! Attack descriptors, single-target strikes and cone attacks
//!
//! Strikes and cones share the dice, dodge, damage and defeat code with the
//! rolling attack. Dodges here are resolved one defender at a time; only the
//! rolling attack races dodges against the attacker's advance.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::battle::events::BattleEventKind;
use crate::battle::hooks::CombatHooks;
use crate::battle::session::{ActionKind, BattleSession};
use crate::combat::combatant::Combatant;
use crate::combat::damage::{deal_damage, roll_hit_damage};
use crate::combat::dice::{roll_pool, DiceOutcome};
use crate::combat::dodge::{resolve_dodge, DodgeContext, DodgeResolution};
use crate::combat::status::{AddOutcome, ApplyOptions, StatusKind};
use crate::core::error::{CombatError, Result};
use crate::core::types::{CombatantId, GridPos, Vec2};

/// Status effect an attack may leave behind on a hit
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatusChance {
    pub kind: StatusKind,
    pub chance: f64,
}

/// What an attack is, as far as resolution cares
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttackDescriptor {
    pub name: String,
    /// Elemental kind, fed to the type chart
    pub kind: String,
    pub ranged: bool,
    pub inflicts: Option<StatusChance>,
}

impl AttackDescriptor {
    pub fn melee(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            ranged: false,
            inflicts: None,
        }
    }

    pub fn ranged(name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            ranged: true,
            ..Self::melee(name, kind)
        }
    }

    pub fn inflicting(mut self, kind: StatusKind, chance: f64) -> Self {
        self.inflicts = Some(StatusChance {
            kind,
            chance: chance.clamp(0.0, 1.0),
        });
        self
    }
}

/// Closest distance between any two footprint cells
pub fn footprint_distance(a: &Combatant, b: &Combatant) -> u32 {
    let b_cells = b.footprint();
    a.footprint()
        .iter()
        .flat_map(|ca| b_cells.iter().map(move |cb| ca.grid_distance(cb)))
        .min()
        .unwrap_or(u32::MAX)
}

/// Whether `attacker` can reach `defender` with `attack`
pub fn in_reach(attacker: &Combatant, defender: &Combatant, attack: &AttackDescriptor, ranged_reach: u32) -> bool {
    let distance = footprint_distance(attacker, defender);
    if attack.ranged {
        distance <= ranged_reach
    } else {
        distance <= 1
    }
}

/// Per-defender record of a strike or cone
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetResult {
    pub target: Option<CombatantId>,
    pub hit: bool,
    pub damage: u32,
    pub defeated: bool,
    pub dodged: bool,
    pub reacted: bool,
    pub inflicted: Option<StatusKind>,
}

/// Result of a single-target strike
#[derive(Debug, Clone, Default)]
pub struct StrikeReport {
    pub result: TargetResult,
    /// Set when the strike could not be attempted at all
    pub failed: Option<String>,
}

/// Result of a cone attack
#[derive(Debug, Clone, Default)]
pub struct ConeReport {
    pub cells: Vec<GridPos>,
    pub results: Vec<TargetResult>,
    pub failed: Option<String>,
}

/// Commit a dodge outcome to the session: messages, luck, relocation
pub(crate) fn settle_dodge(
    session: &mut BattleSession,
    defender: CombatantId,
    resolution: &DodgeResolution,
) -> Result<()> {
    for message in &resolution.messages {
        session.log_event(BattleEventKind::Dodge, message.clone());
    }
    if resolution.luck_token_used {
        session.combatant_mut(defender)?.luck.consume();
    }
    if let (true, Some(dest)) = (resolution.dodged, resolution.destination) {
        if let Err(err) = session.relocate(defender, dest) {
            let name = session.name_of(defender);
            session.log_event(
                BattleEventKind::Warning,
                format!("{} could not finish the dodge to {}: {}", name, dest, err),
            );
        }
    }
    Ok(())
}

/// Roll and apply hit damage plus any on-hit status
async fn land_hit(
    session: &mut BattleSession,
    hooks: &CombatHooks,
    attacker: &Combatant,
    target: CombatantId,
    attack: &AttackDescriptor,
) -> Result<TargetResult> {
    let defender = session.combatant(target)?.clone();
    let base = session.config.strike_base_dice;
    let hit = roll_hit_damage(attacker, &defender, attack, base, 0, hooks, session.rng());
    session.log_event(
        BattleEventKind::Attack,
        format!("{}'s {} hit {}!", attacker.name, attack.name, defender.name),
    );
    let outcome = deal_damage(session, hooks, target, hit.total, Some(attacker.id)).await?;

    let mut result = TargetResult {
        target: Some(target),
        hit: true,
        damage: outcome.dealt,
        defeated: outcome.defeated,
        ..TargetResult::default()
    };

    if let (false, Some(inflict)) = (outcome.defeated, attack.inflicts) {
        if session.rng().gen_bool(inflict.chance) {
            let turn = session.round();
            let victim = session.combatant_mut(target)?;
            let applied = victim
                .statuses
                .add(inflict.kind, ApplyOptions::at_turn(turn).from_source(attacker.id));
            if applied.took_effect() {
                let verb = if applied == AddOutcome::Upgraded { "is now" } else { "became" };
                let line = format!("{} {} {}!", defender.name, verb, inflict.kind.label());
                session.log_event(BattleEventKind::Status, line);
                result.inflicted = Some(inflict.kind);
            }
        }
    }
    Ok(result)
}

/// Attack roll, dodge, then damage against one defender
async fn resolve_against(
    session: &mut BattleSession,
    hooks: &CombatHooks,
    attacker: &Combatant,
    target: CombatantId,
    attack: &AttackDescriptor,
    attack_roll: &DiceOutcome,
) -> Result<TargetResult> {
    let defender = session.combatant(target)?.clone();
    let field = session.field.clone();
    let config = session.config.clone();
    let mut rng = session.fork_rng();

    let ctx = DodgeContext {
        attacker,
        defender: &defender,
        attack_roll,
        attack,
        field: &field,
    };
    let resolution = resolve_dodge(&ctx, hooks, &config, &mut rng).await;
    if let (true, Some(dest)) = (resolution.dodged, resolution.destination) {
        hooks.presenter.animate_dodge(target, defender.position, dest).await;
    }
    settle_dodge(session, target, &resolution)?;

    if resolution.dodged || resolution.reacted {
        return Ok(TargetResult {
            target: Some(target),
            dodged: resolution.dodged,
            reacted: resolution.reacted,
            ..TargetResult::default()
        });
    }
    land_hit(session, hooks, attacker, target, attack).await
}

/// Single-target melee or ranged strike
pub async fn strike(
    session: &mut BattleSession,
    hooks: &CombatHooks,
    attacker_id: CombatantId,
    target_id: CombatantId,
    attack: &AttackDescriptor,
) -> Result<StrikeReport> {
    let attacker = session.combatant(attacker_id)?.clone();
    let defender = session.combatant(target_id)?.clone();
    if !attacker.is_alive() {
        return Err(CombatError::AlreadyDefeated(attacker_id));
    }

    let mut report = StrikeReport::default();
    let failure = if attacker_id == target_id {
        Some(format!("{} cannot target itself.", attacker.name))
    } else if !defender.is_alive() {
        Some(format!("{} is no longer in the fight.", defender.name))
    } else if !in_reach(&attacker, &defender, attack, session.config.ranged_reach) {
        Some(format!("{} is out of reach of {}.", defender.name, attack.name))
    } else {
        None
    };
    if let Some(reason) = failure {
        session.log_event(BattleEventKind::Attack, reason.clone());
        report.failed = Some(reason);
        return Ok(report);
    }

    session.log_event(
        BattleEventKind::Attack,
        format!("{} used {} on {}.", attacker.name, attack.name, defender.name),
    );
    let attack_roll = roll_pool(attacker.stats.accuracy, session.rng());
    report.result = resolve_against(session, hooks, &attacker, target_id, attack, &attack_roll).await?;
    session.record_action(attacker_id, ActionKind::Strike)?;
    Ok(report)
}

/// Cells covered by a cone of `length` opening from `origin` toward `toward`
///
/// A cell is inside when it is within `length` grid steps and no more than
/// 45 degrees off the aim line.
pub fn cone_cells(origin: GridPos, toward: GridPos, length: u32, width: u32, height: u32) -> Vec<GridPos> {
    let aim = (toward.to_vec2() - origin.to_vec2()).normalize();
    if aim.length() == 0.0 {
        return Vec::new();
    }
    let reach = length as i32;
    let mut cells = Vec::new();
    for dy in -reach..=reach {
        for dx in -reach..=reach {
            if dx == 0 && dy == 0 {
                continue;
            }
            let cell = origin.offset(dx, dy);
            if cell.x < 0 || cell.y < 0 || cell.x >= width as i32 || cell.y >= height as i32 {
                continue;
            }
            let offset = Vec2::new(dx as f32, dy as f32).normalize();
            let cos = offset.x * aim.x + offset.y * aim.y;
            if cos >= std::f32::consts::FRAC_1_SQRT_2 - 0.001 {
                cells.push(cell);
            }
        }
    }
    cells
}

/// Area attack hitting every combatant whose footprint meets the cone
pub async fn cone_attack(
    session: &mut BattleSession,
    hooks: &CombatHooks,
    attacker_id: CombatantId,
    toward: GridPos,
    attack: &AttackDescriptor,
) -> Result<ConeReport> {
    let attacker = session.combatant(attacker_id)?.clone();
    if !attacker.is_alive() {
        return Err(CombatError::AlreadyDefeated(attacker_id));
    }

    let mut report = ConeReport {
        cells: cone_cells(
            attacker.position,
            toward,
            session.config.cone_length,
            session.field.width,
            session.field.height,
        ),
        ..ConeReport::default()
    };
    if report.cells.is_empty() {
        let reason = format!("{} has no direction to aim {}.", attacker.name, attack.name);
        session.log_event(BattleEventKind::Attack, reason.clone());
        report.failed = Some(reason);
        return Ok(report);
    }

    let own_cells = attacker.footprint();
    let targets: Vec<CombatantId> = session
        .living()
        .filter(|c| c.id != attacker_id)
        .filter(|c| {
            c.footprint()
                .iter()
                .any(|cell| report.cells.contains(cell) && !own_cells.contains(cell))
        })
        .map(|c| c.id)
        .collect();

    session.log_event(
        BattleEventKind::Attack,
        format!("{} unleashed {} toward {}.", attacker.name, attack.name, toward),
    );
    let attack_roll = roll_pool(attacker.stats.accuracy, session.rng());
    for target in targets {
        if !session.combatant(target)?.is_alive() {
            continue;
        }
        let result = resolve_against(session, hooks, &attacker, target, attack, &attack_roll).await?;
        report.results.push(result);
    }

    session.record_action(attacker_id, ActionKind::Cone)?;
    Ok(report)
}
