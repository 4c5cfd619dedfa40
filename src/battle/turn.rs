//! Per-turn status hooks
//!
//! `begin_turn` runs before the combatant acts and may cost it the turn.
//! `end_turn` applies damage over time after it acts; health reaching zero
//! goes through the defeat coordinator like any other defeat.

use crate::battle::events::BattleEventKind;
use crate::battle::hooks::CombatHooks;
use crate::battle::session::BattleSession;
use crate::combat::damage::deal_damage;
use crate::combat::status::{tick_turn_end, tick_turn_start, StatusKind, TurnEndReport, TurnStartReport};
use crate::core::error::{CombatError, Result};
use crate::core::types::CombatantId;

/// Start-of-turn status effects; a skipped turn breaks the chain
pub fn begin_turn(session: &mut BattleSession, id: CombatantId) -> Result<TurnStartReport> {
    let config = session.config.clone();
    let mut rng = session.fork_rng();
    let owner = session.combatant_mut(id)?;
    if !owner.is_alive() {
        return Err(CombatError::AlreadyDefeated(id));
    }
    let report = tick_turn_start(owner, &config, &mut rng);
    // Wake-ups are already in the report messages
    owner.statuses.drain_notices();
    let name = owner.name.clone();

    for message in &report.messages {
        session.log_event(BattleEventKind::Status, message.clone());
    }
    if report.skip_turn {
        session.break_chain(id)?;
        session.log_event(BattleEventKind::Turn, format!("{} loses the turn.", name));
    } else {
        session.log_event(BattleEventKind::Turn, format!("{}'s turn.", name));
    }
    Ok(report)
}

/// Result of the end-of-turn tick
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TurnEnd {
    pub tick: TurnEndReport,
    pub damage_dealt: u32,
    pub healed: u32,
    pub woke_up: bool,
    pub defeated: bool,
}

/// End-of-turn damage over time, heals and seed drain
pub async fn end_turn(session: &mut BattleSession, hooks: &CombatHooks, id: CombatantId) -> Result<TurnEnd> {
    let owner = session.combatant(id)?;
    if !owner.is_alive() {
        return Ok(TurnEnd::default());
    }
    let tick = tick_turn_end(owner, &session.config);
    let mut end = TurnEnd::default();

    for message in &tick.messages {
        session.log_event(BattleEventKind::Status, message.clone());
    }

    if tick.heal > 0 {
        end.healed = session.combatant_mut(id)?.heal(tick.heal);
    }

    if tick.damage > 0 {
        let outcome = deal_damage(session, hooks, id, tick.damage, None).await?;
        end.damage_dealt = outcome.dealt;
        end.defeated = outcome.defeated;

        let owner = session.combatant_mut(id)?;
        if outcome.dealt > 0 && owner.is_alive() && owner.statuses.remove(StatusKind::Asleep) {
            owner.statuses.drain_notices();
            let name = owner.name.clone();
            end.woke_up = true;
            session.log_event(BattleEventKind::Status, format!("{} woke up from the pain!", name));
        }
    }

    for (source, amount) in &tick.source_heals {
        let Ok(seeder) = session.combatant_mut(*source) else {
            tracing::debug!(%source, "seed source no longer exists");
            continue;
        };
        if !seeder.is_alive() {
            continue;
        }
        let restored = seeder.heal(*amount);
        let name = seeder.name.clone();
        if restored > 0 {
            session.log_event(
                BattleEventKind::Status,
                format!("{} drained {} HP through the seed.", name, restored),
            );
        }
    }

    end.tick = tick;
    Ok(end)
}
