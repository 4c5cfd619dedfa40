//! Battle session - the explicitly owned state of one battle
//!
//! Holds the combatant registry, the battlefield, the initiative scheduler,
//! the battle log and the session rng. Every component receives the session
//! by reference; there is no ambient global state.

use ahash::AHashMap;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tokio::sync::broadcast;

use crate::battle::battlefield::Battlefield;
use crate::battle::events::{BattleEventKind, BattleLog, SessionChange};
use crate::battle::hooks::{DoubleTurnPolicy, PositionQuery};
use crate::battle::initiative::{InitiativeChange, PointerCrossing, Roller, Scheduler};
use crate::combat::combatant::Combatant;
use crate::core::config::CombatConfig;
use crate::core::error::{CombatError, Result};
use crate::core::types::{CombatantId, GridPos, Round, TeamIndex};

const CHANGE_CHANNEL_CAPACITY: usize = 256;

/// What a combatant did with its turn
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    RollingAttack,
    Strike,
    Cone,
    Move,
    Wait,
}

pub struct BattleSession {
    pub config: CombatConfig,
    pub field: Battlefield,
    pub scheduler: Scheduler,
    pub log: BattleLog,
    roster: Vec<CombatantId>,
    combatants: AHashMap<CombatantId, Combatant>,
    rng: ChaCha8Rng,
    changes: broadcast::Sender<SessionChange>,
}

impl BattleSession {
    pub fn new(config: CombatConfig, width: u32, height: u32, seed: u64) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            config,
            field: Battlefield::new(width, height),
            scheduler: Scheduler::new(),
            log: BattleLog::new(),
            roster: Vec::new(),
            combatants: AHashMap::new(),
            rng: ChaCha8Rng::seed_from_u64(seed),
            changes,
        }
    }

    /// Register a combatant and place it on the battlefield
    pub fn add_combatant(&mut self, combatant: Combatant) -> Result<CombatantId> {
        let id = combatant.id;
        self.field.place(id, combatant.position, combatant.size)?;
        self.roster.push(id);
        self.combatants.insert(id, combatant);
        Ok(id)
    }

    pub fn combatant(&self, id: CombatantId) -> Result<&Combatant> {
        self.combatants.get(&id).ok_or(CombatError::CombatantNotFound(id))
    }

    pub fn combatant_mut(&mut self, id: CombatantId) -> Result<&mut Combatant> {
        self.combatants
            .get_mut(&id)
            .ok_or(CombatError::CombatantNotFound(id))
    }

    /// Combatants in registration order
    pub fn combatants(&self) -> impl Iterator<Item = &Combatant> {
        self.roster.iter().filter_map(|id| self.combatants.get(id))
    }

    pub fn living(&self) -> impl Iterator<Item = &Combatant> {
        self.combatants().filter(|c| c.is_alive())
    }

    pub fn living_on_team(&self, team: TeamIndex) -> usize {
        self.living().filter(|c| c.team == team).count()
    }

    /// Teams that still have someone standing
    pub fn teams_standing(&self) -> Vec<TeamIndex> {
        let mut teams: Vec<TeamIndex> = self.living().map(|c| c.team).collect();
        teams.sort();
        teams.dedup();
        teams
    }

    /// Move a combatant on the battlefield and keep its position in sync
    pub fn relocate(&mut self, id: CombatantId, dest: GridPos) -> Result<()> {
        if !self.combatants.contains_key(&id) {
            return Err(CombatError::CombatantNotFound(id));
        }
        self.field.update_position(id, dest)?;
        if let Some(c) = self.combatants.get_mut(&id) {
            c.position = dest;
        }
        Ok(())
    }

    pub fn round(&self) -> Round {
        self.scheduler.round()
    }

    pub fn rng(&mut self) -> &mut ChaCha8Rng {
        &mut self.rng
    }

    /// Independent rng for a task that runs alongside the session
    pub fn fork_rng(&mut self) -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(self.rng.gen())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionChange> {
        self.changes.subscribe()
    }

    pub(crate) fn notify(&self, change: SessionChange) {
        // No subscribers is fine
        let _ = self.changes.send(change);
    }

    /// Record a battle-log line
    pub fn log_event(&mut self, kind: BattleEventKind, message: impl Into<String>) {
        let message = message.into();
        match kind {
            BattleEventKind::Error => tracing::error!(round = self.round(), "{}", message),
            BattleEventKind::Warning => tracing::warn!(round = self.round(), "{}", message),
            _ => tracing::info!(round = self.round(), "{}", message),
        }
        let round = self.round();
        self.log.push(kind, message, round);
    }

    pub fn name_of(&self, id: CombatantId) -> String {
        self.combatants
            .get(&id)
            .map(|c| c.name.clone())
            .unwrap_or_else(|| id.to_string())
    }

    // === ROUND LIFECYCLE ===

    /// Roll initiative for every living combatant and open a new round
    pub fn start_round(&mut self, policy: &dyn DoubleTurnPolicy) {
        let rollers: Vec<Roller> = self
            .living()
            .map(|c| Roller {
                combatant: c.id,
                team: c.team,
                speed: c.stats.speed,
            })
            .collect();
        for id in &self.roster {
            if let Some(c) = self.combatants.get_mut(id) {
                c.clear_round_flags();
            }
        }

        let ties = self.scheduler.roll_round(&rollers, policy, &mut self.rng);
        let round = self.round();
        self.log_event(BattleEventKind::Initiative, format!("Round {} begins.", round));

        for group in ties {
            let names: Vec<String> = group.iter().map(|id| self.name_of(*id)).collect();
            self.log_event(
                BattleEventKind::Initiative,
                format!("{} tied on initiative; order decided by shuffle.", names.join(", ")),
            );
        }

        let order: Vec<String> = self
            .scheduler
            .logic_list()
            .iter()
            .map(|e| format!("{} ({})", self.name_of(e.combatant), e.roll))
            .collect();
        self.log_event(BattleEventKind::Initiative, format!("Turn order: {}", order.join(", ")));

        self.notify(SessionChange::RoundStarted(round));
        self.notify_order_changed();
    }

    pub fn end_round(&mut self) {
        self.scheduler.end_round();
        self.notify(SessionChange::RoundEnded(self.round()));
    }

    /// Drop the turn order and every transient flag
    pub fn reset(&mut self) {
        self.scheduler.reset();
        for c in self.combatants.values_mut() {
            c.clear_round_flags();
        }
        self.notify(SessionChange::Reset);
    }

    pub(crate) fn notify_order_changed(&self) {
        let mut doubled: Vec<CombatantId> = self.scheduler.double_turns().iter().copied().collect();
        doubled.sort();
        self.notify(SessionChange::OrderChanged);
        self.notify(SessionChange::DoubleTurnsChanged(doubled));
    }

    // === INITIATIVE CHANGES ===

    /// Change one combatant's initiative, re-sort and recompute double turns
    pub fn update_initiative(
        &mut self,
        id: CombatantId,
        new_roll: u32,
        policy: &dyn DoubleTurnPolicy,
    ) -> Result<InitiativeChange> {
        let change = self.scheduler.update_initiative(id, new_roll, policy)?;
        self.apply_initiative_change(change);
        if change != InitiativeChange::Unchanged {
            self.notify_order_changed();
        }
        Ok(change)
    }

    /// Change several initiatives at once
    pub fn batch_update_initiative(
        &mut self,
        updates: &[(CombatantId, u32)],
        policy: &dyn DoubleTurnPolicy,
    ) -> Result<Vec<InitiativeChange>> {
        let changes = self.scheduler.batch_update_initiative(updates, policy)?;
        let mut any = false;
        for change in &changes {
            any |= *change != InitiativeChange::Unchanged;
            self.apply_initiative_change(*change);
        }
        if any {
            self.notify_order_changed();
        }
        Ok(changes)
    }

    fn apply_initiative_change(&mut self, change: InitiativeChange) {
        let InitiativeChange::Changed {
            combatant,
            old_roll,
            new_roll,
            crossing,
        } = change
        else {
            return;
        };

        let name = self.name_of(combatant);
        self.log_event(
            BattleEventKind::Initiative,
            format!("{}'s initiative changed from {} to {}.", name, old_roll, new_roll),
        );

        let Some(c) = self.combatants.get_mut(&combatant) else {
            return;
        };
        // A crossing back over the pointer cancels the flag the first crossing set
        let note = match crossing {
            Some(PointerCrossing::MovedAheadOfPointer) if c.flags.pending_immediate_turn => {
                c.flags.pending_immediate_turn = false;
                Some(format!("{} will act in initiative order instead.", name))
            }
            Some(PointerCrossing::MovedAheadOfPointer) if c.flags.has_acted_this_round => {
                c.flags.skip_next_turn = true;
                Some(format!("{} already acted and will not act again this round.", name))
            }
            Some(PointerCrossing::MovedBehindPointer) if c.flags.skip_next_turn => {
                c.flags.skip_next_turn = false;
                None
            }
            Some(PointerCrossing::MovedBehindPointer) if !c.flags.has_acted_this_round => {
                c.flags.pending_immediate_turn = true;
                Some(format!("{} gets an immediate turn.", name))
            }
            _ => None,
        };
        if let Some(note) = note {
            self.log_event(BattleEventKind::Initiative, note);
        }
    }

    // === TURN DISPATCH ===

    /// Who acts next this round
    ///
    /// Pending immediate turns go first, skip flags are consumed, and the
    /// scheduler's bonus pass serves double turns. `None` ends the round.
    pub fn next_turn(&mut self) -> Option<CombatantId> {
        let immediate = self
            .scheduler
            .logic_list()
            .iter()
            .map(|e| e.combatant)
            .find(|id| {
                self.combatants
                    .get(id)
                    .is_some_and(|c| c.is_alive() && c.flags.pending_immediate_turn)
            });
        if let Some(id) = immediate {
            if let Some(c) = self.combatants.get_mut(&id) {
                c.flags.pending_immediate_turn = false;
                c.flags.has_acted_this_round = true;
            }
            return Some(id);
        }

        while let Some(id) = self.scheduler.next_slot() {
            let Some(c) = self.combatants.get_mut(&id) else {
                continue;
            };
            if !c.is_alive() {
                continue;
            }
            if c.flags.skip_next_turn {
                c.flags.skip_next_turn = false;
                continue;
            }
            c.flags.has_acted_this_round = true;
            return Some(id);
        }
        None
    }

    /// Note an action; anything other than a rolling attack breaks the chain
    pub fn record_action(&mut self, id: CombatantId, action: ActionKind) -> Result<()> {
        if action == ActionKind::RollingAttack {
            return Ok(());
        }
        self.break_chain(id)
    }

    /// Reset a combatant's chain counter, logging if a chain was broken
    pub fn break_chain(&mut self, id: CombatantId) -> Result<()> {
        let c = self.combatant_mut(id)?;
        if c.chain.reset() {
            let name = c.name.clone();
            self.log_event(BattleEventKind::Attack, format!("{}'s chain was broken.", name));
        }
        Ok(())
    }
}

impl std::fmt::Debug for BattleSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BattleSession")
            .field("round", &self.round())
            .field("combatants", &self.roster.len())
            .field("field", &(self.field.width, self.field.height))
            .finish_non_exhaustive()
    }
}
