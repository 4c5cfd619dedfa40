//! Initiative scheduler
//!
//! Turn order lives in two parallel lists. The logic list holds living
//! combatants and drives turn selection; the display list also keeps
//! defeated combatants so presentation can show them greyed out. Both lists
//! are re-sorted together on every initiative change, and every change
//! recomputes double-turn entitlement before returning.

use ahash::AHashSet;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::battle::hooks::DoubleTurnPolicy;
use crate::combat::dice::roll_sum;
use crate::core::error::{CombatError, Result};
use crate::core::types::{CombatantId, Round, TeamIndex};

/// One combatant's place in the turn order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitiativeEntry {
    pub combatant: CombatantId,
    pub team: TeamIndex,
    pub roll: u32,
    /// Roll before the first mid-round change (never restored automatically)
    pub original_roll: Option<u32>,
    pub defeated: bool,
}

impl InitiativeEntry {
    pub fn new(combatant: CombatantId, team: TeamIndex, roll: u32) -> Self {
        Self {
            combatant,
            team,
            roll,
            original_roll: None,
            defeated: false,
        }
    }
}

/// Round lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RoundPhase {
    #[default]
    Rolling,
    Active,
    RoundComplete,
}

/// How a moved entry ended up relative to the turn pointer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerCrossing {
    /// Was still due this round, now sorted before the pointer
    MovedBehindPointer,
    /// Already passed, now sorted at or after the pointer
    MovedAheadOfPointer,
}

/// Result of a single initiative update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitiativeChange {
    Unchanged,
    Changed {
        combatant: CombatantId,
        old_roll: u32,
        new_roll: u32,
        crossing: Option<PointerCrossing>,
    },
}

/// Input for a round roll
#[derive(Debug, Clone, Copy)]
pub struct Roller {
    pub combatant: CombatantId,
    pub team: TeamIndex,
    pub speed: u32,
}

/// The turn order for one battle
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Scheduler {
    logic: Vec<InitiativeEntry>,
    display: Vec<InitiativeEntry>,
    phase: RoundPhase,
    round: Round,
    /// Index into the logic list of the next entry due
    pointer: usize,
    double_turns: AHashSet<CombatantId>,
    bonus_taken: AHashSet<CombatantId>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn logic_list(&self) -> &[InitiativeEntry] {
        &self.logic
    }

    pub fn display_list(&self) -> &[InitiativeEntry] {
        &self.display
    }

    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    pub fn round(&self) -> Round {
        self.round
    }

    pub fn pointer(&self) -> usize {
        self.pointer
    }

    pub fn double_turns(&self) -> &AHashSet<CombatantId> {
        &self.double_turns
    }

    pub fn contains(&self, id: CombatantId) -> bool {
        self.logic.iter().any(|e| e.combatant == id)
    }

    pub fn entry(&self, id: CombatantId) -> Option<&InitiativeEntry> {
        self.logic.iter().find(|e| e.combatant == id)
    }

    fn logic_index(&self, id: CombatantId) -> Option<usize> {
        self.logic.iter().position(|e| e.combatant == id)
    }

    /// Roll initiative for a new round
    ///
    /// Each roller throws `speed` dice and sums them. The list is shuffled
    /// before a stable descending sort, so equal rolls end up in random
    /// order rather than insertion or id order. Returns the groups of
    /// combatants whose rolls tied.
    pub fn roll_round<R: Rng + ?Sized>(
        &mut self,
        rollers: &[Roller],
        policy: &dyn DoubleTurnPolicy,
        rng: &mut R,
    ) -> Vec<Vec<CombatantId>> {
        self.phase = RoundPhase::Rolling;
        self.round += 1;

        let mut logic: Vec<InitiativeEntry> = rollers
            .iter()
            .map(|r| InitiativeEntry::new(r.combatant, r.team, roll_sum(r.speed, rng)))
            .collect();
        logic.shuffle(rng);
        logic.sort_by(|a, b| b.roll.cmp(&a.roll));

        let ties = tie_groups(&logic);

        // Defeated entries stay visible after the living ones
        let mut defeated: Vec<InitiativeEntry> = self
            .display
            .iter()
            .filter(|e| e.defeated && !logic.iter().any(|l| l.combatant == e.combatant))
            .cloned()
            .collect();
        let mut display = logic.clone();
        display.append(&mut defeated);
        display.sort_by(|a, b| b.roll.cmp(&a.roll));

        self.logic = logic;
        self.display = display;
        self.pointer = 0;
        self.bonus_taken.clear();
        self.double_turns = policy.recompute_double_turns(&self.logic);
        self.phase = RoundPhase::Active;

        ties
    }

    /// Entry for a turn number, modulo the current logic list length
    ///
    /// The list shrinks on defeat, so the mapping is not fixed at round start.
    pub fn get_next_character_for_turn(&self, turn_number: usize) -> Option<&InitiativeEntry> {
        if self.logic.is_empty() {
            return None;
        }
        self.logic.get(turn_number % self.logic.len())
    }

    /// Change one combatant's initiative
    ///
    /// A no-op update leaves the order untouched and reports `Unchanged`.
    pub fn update_initiative(
        &mut self,
        id: CombatantId,
        new_roll: u32,
        policy: &dyn DoubleTurnPolicy,
    ) -> Result<InitiativeChange> {
        let old_index = self.logic_index(id).ok_or(CombatError::CombatantNotFound(id))?;
        let old_roll = self.logic[old_index].roll;
        if old_roll == new_roll {
            return Ok(InitiativeChange::Unchanged);
        }

        self.set_roll(id, new_roll);
        self.resort();
        let crossing = self.settle_pointer(old_index, id);
        self.double_turns = policy.recompute_double_turns(&self.logic);

        Ok(InitiativeChange::Changed {
            combatant: id,
            old_roll,
            new_roll,
            crossing,
        })
    }

    /// Change several initiatives with a single re-sort and recompute
    ///
    /// Unknown ids are reported as not found before anything is changed.
    pub fn batch_update_initiative(
        &mut self,
        updates: &[(CombatantId, u32)],
        policy: &dyn DoubleTurnPolicy,
    ) -> Result<Vec<InitiativeChange>> {
        if let Some((missing, _)) = updates.iter().find(|(id, _)| !self.contains(*id)) {
            return Err(CombatError::CombatantNotFound(*missing));
        }

        let mut pending = Vec::new();
        for &(id, new_roll) in updates {
            let old_roll = self.entry(id).map(|e| e.roll).unwrap_or(new_roll);
            if old_roll == new_roll {
                continue;
            }
            let old_index = self.logic_index(id).unwrap_or(0);
            self.set_roll(id, new_roll);
            pending.push((id, old_index, old_roll, new_roll));
        }

        if pending.is_empty() {
            return Ok(vec![InitiativeChange::Unchanged; updates.len()]);
        }

        self.resort();
        let changes = pending
            .into_iter()
            .map(|(id, old_index, old_roll, new_roll)| InitiativeChange::Changed {
                combatant: id,
                old_roll,
                new_roll,
                crossing: self.settle_pointer(old_index, id),
            })
            .collect();
        self.double_turns = policy.recompute_double_turns(&self.logic);

        Ok(changes)
    }

    /// Take a defeated combatant out of the logic list
    ///
    /// It stays in the display list, flagged as defeated.
    pub fn remove_defeated(&mut self, id: CombatantId, policy: &dyn DoubleTurnPolicy) -> Result<()> {
        let index = self.logic_index(id).ok_or(CombatError::CombatantNotFound(id))?;
        self.logic.remove(index);
        if index < self.pointer {
            self.pointer -= 1;
        }
        for entry in self.display.iter_mut().filter(|e| e.combatant == id) {
            entry.defeated = true;
        }
        self.resort();
        self.double_turns = policy.recompute_double_turns(&self.logic);
        Ok(())
    }

    /// Hand out the next regular slot, then double-turn bonus slots
    ///
    /// Returns `None` once the round is exhausted.
    pub fn next_slot(&mut self) -> Option<CombatantId> {
        if self.phase != RoundPhase::Active {
            return None;
        }
        if self.pointer < self.logic.len() {
            let id = self.logic[self.pointer].combatant;
            self.pointer += 1;
            return Some(id);
        }

        let bonus = self
            .logic
            .iter()
            .map(|e| e.combatant)
            .find(|id| self.double_turns.contains(id) && !self.bonus_taken.contains(id));
        if let Some(id) = bonus {
            self.bonus_taken.insert(id);
        }
        bonus
    }

    pub fn end_round(&mut self) {
        self.phase = RoundPhase::RoundComplete;
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    fn set_roll(&mut self, id: CombatantId, new_roll: u32) {
        for list in [&mut self.logic, &mut self.display] {
            for entry in list.iter_mut().filter(|e| e.combatant == id) {
                if entry.original_roll.is_none() {
                    entry.original_roll = Some(entry.roll);
                }
                entry.roll = new_roll;
            }
        }
    }

    /// Stable descending sort keeps the round-start tie order
    fn resort(&mut self) {
        self.logic.sort_by(|a, b| b.roll.cmp(&a.roll));
        self.display.sort_by(|a, b| b.roll.cmp(&a.roll));
    }

    /// Keep the pointer on the same set of passed entries after a move
    fn settle_pointer(&mut self, old_index: usize, id: CombatantId) -> Option<PointerCrossing> {
        let new_index = self.logic_index(id)?;
        let was_passed = old_index < self.pointer;
        if !was_passed && new_index < self.pointer {
            self.pointer += 1;
            Some(PointerCrossing::MovedBehindPointer)
        } else if was_passed && new_index >= self.pointer {
            self.pointer -= 1;
            Some(PointerCrossing::MovedAheadOfPointer)
        } else {
            None
        }
    }
}

fn tie_groups(sorted: &[InitiativeEntry]) -> Vec<Vec<CombatantId>> {
    let mut groups = Vec::new();
    let mut start = 0;
    while start < sorted.len() {
        let mut end = start + 1;
        while end < sorted.len() && sorted[end].roll == sorted[start].roll {
            end += 1;
        }
        if end - start > 1 {
            groups.push(sorted[start..end].iter().map(|e| e.combatant).collect());
        }
        start = end;
    }
    groups
}
