//! Defeat coordinator
//!
//! Runs whenever a combatant's health reaches zero. Steps after the victim
//! lookup never abort the sequence: a failing step is logged and the next
//! one runs.

use crate::battle::events::{BattleEventKind, SessionChange};
use crate::battle::hooks::CombatHooks;
use crate::battle::session::BattleSession;
use crate::core::error::Result;
use crate::core::types::CombatantId;

/// What happened to a combatant whose health hit zero
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DefeatOutcome {
    pub defeated: bool,
    /// A steal hook claimed the victim instead
    pub stolen: bool,
    /// The explosion hook did not finish in time
    pub explosion_timed_out: bool,
}

/// Handle a combatant reaching zero health
pub async fn handle_defeat(
    session: &mut BattleSession,
    hooks: &CombatHooks,
    victim_id: CombatantId,
    killer_id: Option<CombatantId>,
) -> Result<DefeatOutcome> {
    let mut outcome = DefeatOutcome::default();

    let victim = session.combatant_mut(victim_id)?;
    if victim.defeated {
        tracing::debug!(victim = %victim_id, "already defeated");
        outcome.defeated = true;
        return Ok(outcome);
    }
    victim.hp = 0;
    session.break_chain(victim_id)?;

    let killer = killer_id.and_then(|id| match session.combatant(id) {
        Ok(c) => Some(c.clone()),
        Err(err) => {
            tracing::warn!(killer = %id, %err, "killer missing during defeat");
            None
        }
    });
    let victim = session.combatant(victim_id)?.clone();

    if let Some(killer) = &killer {
        if hooks.kills.should_steal(killer, &victim).await {
            match hooks.kills.steal(killer, &victim).await {
                Some(hp) => {
                    let kept = session.combatant_mut(victim_id)?;
                    kept.hp = hp.clamp(1, kept.max_hp.max(1));
                    session.log_event(
                        BattleEventKind::Defeat,
                        format!("{} was claimed by {} instead of fainting!", victim.name, killer.name),
                    );
                    outcome.stolen = true;
                    return Ok(outcome);
                }
                None => session.log_event(
                    BattleEventKind::Warning,
                    format!("{} failed to claim {}.", killer.name, victim.name),
                ),
            }
        }
    }

    session.log_event(BattleEventKind::Defeat, format!("{} fainted!", victim.name));

    if let Some(killer) = &killer {
        if let Ok(k) = session.combatant_mut(killer.id) {
            k.luck.refill();
        }
    }

    if hooks.kills.should_explode(&victim).await {
        let timeout = session.config.explosion_timeout();
        let explosion = hooks.kills.explode(&victim, victim.position);
        if tokio::time::timeout(timeout, explosion).await.is_err() {
            outcome.explosion_timed_out = true;
            session.log_event(
                BattleEventKind::Warning,
                format!(
                    "{}'s explosion did not finish within {} ms; continuing.",
                    victim.name,
                    timeout.as_millis()
                ),
            );
        }
    }

    if let Err(err) = session
        .scheduler
        .remove_defeated(victim_id, hooks.double_turns.as_ref())
    {
        tracing::warn!(victim = %victim_id, %err, "defeated combatant was not in the turn order");
    } else {
        session.notify_order_changed();
    }
    session.field.remove(victim_id);

    let c = session.combatant_mut(victim_id)?;
    c.statuses.clear();
    c.defeated = true;
    session.notify(SessionChange::CombatantDefeated(victim_id));

    outcome.defeated = true;
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::hooks::{KillHooks, NoDoubleTurns};
    use crate::combat::combatant::Combatant;
    use crate::combat::status::{ApplyOptions, StatusKind};
    use crate::core::config::CombatConfig;
    use crate::core::types::{GridPos, TeamIndex};
    use async_trait::async_trait;
    use std::time::Duration;

    struct Thief;

    #[async_trait]
    impl KillHooks for Thief {
        async fn should_steal(&self, _: &Combatant, _: &Combatant) -> bool {
            true
        }

        async fn steal(&self, _: &Combatant, victim: &Combatant) -> Option<u32> {
            Some(victim.max_hp / 2)
        }
    }

    struct SlowFuse;

    #[async_trait]
    impl KillHooks for SlowFuse {
        async fn should_explode(&self, _: &Combatant) -> bool {
            true
        }

        async fn explode(&self, _: &Combatant, _: GridPos) {
            tokio::time::sleep(Duration::from_secs(60)).await;
        }
    }

    fn session() -> (BattleSession, CombatantId, CombatantId) {
        let mut session = BattleSession::new(CombatConfig::default(), 8, 8, 11);
        let killer = session
            .add_combatant(Combatant::new("Killer", TeamIndex(0), 30, GridPos::new(0, 0)))
            .unwrap();
        let victim = session
            .add_combatant(Combatant::new("Victim", TeamIndex(1), 20, GridPos::new(3, 3)))
            .unwrap();
        session.start_round(&NoDoubleTurns);
        (session, killer, victim)
    }

    #[tokio::test]
    async fn test_defeat_removes_from_logic_list_only() {
        let (mut session, killer, victim) = session();
        session.combatant_mut(killer).unwrap().luck.remaining = 0;
        session.combatant_mut(victim).unwrap().chain.increment(6);
        session
            .combatant_mut(victim)
            .unwrap()
            .statuses
            .add(StatusKind::Burned, ApplyOptions::default());
        let mut rx = session.subscribe();

        let outcome = handle_defeat(&mut session, &CombatHooks::default(), victim, Some(killer))
            .await
            .unwrap();
        assert!(outcome.defeated);
        assert!(!session.scheduler.contains(victim));
        assert!(session
            .scheduler
            .display_list()
            .iter()
            .any(|e| e.combatant == victim && e.defeated));

        let v = session.combatant(victim).unwrap();
        assert_eq!(v.hp, 0);
        assert_eq!(v.chain.value(), 0);
        assert!(v.statuses.is_empty());
        assert_eq!(session.field.anchor_of(victim), None);
        assert_eq!(session.combatant(killer).unwrap().luck.remaining, 1);
        assert!(session.log.contains("Victim fainted!"));

        let mut saw_defeat = false;
        while let Ok(change) = rx.try_recv() {
            saw_defeat |= change == SessionChange::CombatantDefeated(victim);
        }
        assert!(saw_defeat);
    }

    #[tokio::test]
    async fn test_steal_keeps_victim_in_play() {
        let (mut session, killer, victim) = session();
        let hooks = CombatHooks::default().with_kill_hooks(Thief);
        let outcome = handle_defeat(&mut session, &hooks, victim, Some(killer)).await.unwrap();
        assert!(!outcome.defeated);
        assert!(outcome.stolen);
        assert!(session.scheduler.contains(victim));
        assert_eq!(session.combatant(victim).unwrap().hp, 10);
        assert!(session.combatant(victim).unwrap().is_alive());
    }

    #[tokio::test]
    async fn test_steal_needs_a_killer() {
        let (mut session, _killer, victim) = session();
        let hooks = CombatHooks::default().with_kill_hooks(Thief);
        let outcome = handle_defeat(&mut session, &hooks, victim, None).await.unwrap();
        assert!(outcome.defeated);
        assert!(!session.scheduler.contains(victim));
    }

    #[tokio::test(start_paused = true)]
    async fn test_explosion_timeout_is_a_warning() {
        let (mut session, killer, victim) = session();
        let hooks = CombatHooks::default().with_kill_hooks(SlowFuse);
        let outcome = handle_defeat(&mut session, &hooks, victim, Some(killer)).await.unwrap();
        assert!(outcome.defeated);
        assert!(outcome.explosion_timed_out);
        assert_eq!(session.log.of_kind(BattleEventKind::Warning).count(), 1);
        assert!(!session.scheduler.contains(victim));
    }

    #[tokio::test]
    async fn test_unknown_victim_is_not_found() {
        let (mut session, _, _) = session();
        let result = handle_defeat(&mut session, &CombatHooks::default(), CombatantId::new(), None).await;
        assert!(result.is_err());
    }
}
