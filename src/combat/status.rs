//! Status effect store
//!
//! Each combatant carries a small collection of active effects. Effects are
//! ticked at the start of the owner's turn (control effects) and at the end
//! of it (damage over time). Poisoned and badly-poisoned never coexist.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::combat::combatant::Combatant;
use crate::core::config::CombatConfig;
use crate::core::types::CombatantId;

/// Kinds of status effect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusKind {
    Poisoned,
    BadlyPoisoned,
    Burned,
    Asleep,
    Paralyzed,
    Frozen,
    Confused,
    Cursed,
    Infatuated,
    Held,
    Seeded,
}

impl StatusKind {
    pub fn label(&self) -> &'static str {
        match self {
            StatusKind::Poisoned => "poisoned",
            StatusKind::BadlyPoisoned => "badly poisoned",
            StatusKind::Burned => "burned",
            StatusKind::Asleep => "asleep",
            StatusKind::Paralyzed => "paralyzed",
            StatusKind::Frozen => "frozen",
            StatusKind::Confused => "confused",
            StatusKind::Cursed => "cursed",
            StatusKind::Infatuated => "infatuated",
            StatusKind::Held => "held",
            StatusKind::Seeded => "seeded",
        }
    }

    /// Deals damage at the end of the owner's turn
    pub fn is_damage_over_time(&self) -> bool {
        matches!(
            self,
            StatusKind::Poisoned
                | StatusKind::BadlyPoisoned
                | StatusKind::Burned
                | StatusKind::Cursed
                | StatusKind::Seeded
                | StatusKind::Held
        )
    }

    pub fn is_poison(&self) -> bool {
        matches!(self, StatusKind::Poisoned | StatusKind::BadlyPoisoned)
    }
}

/// One active effect on a combatant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusInstance {
    pub kind: StatusKind,
    /// Round the effect was applied in
    pub applied_turn: u32,
    /// Owner turns the effect has persisted through
    pub turns_active: u32,
    /// Combatant that applied it (seeded heals its source)
    pub source: Option<CombatantId>,
    /// Owner turns after which the effect expires
    pub duration: Option<u32>,
}

/// Options for applying an effect
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyOptions {
    pub applied_turn: u32,
    pub source: Option<CombatantId>,
    pub duration: Option<u32>,
}

impl ApplyOptions {
    pub fn at_turn(applied_turn: u32) -> Self {
        Self {
            applied_turn,
            ..Default::default()
        }
    }

    pub fn from_source(mut self, source: CombatantId) -> Self {
        self.source = Some(source);
        self
    }

    pub fn lasting(mut self, turns: u32) -> Self {
        self.duration = Some(turns);
        self
    }
}

/// Result of an `add` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Applied,
    /// Badly-poisoned replaced plain poison
    Upgraded,
    AlreadyPresent,
    /// Plain poison refused while badly-poisoned is active
    BlockedByStrongerPoison,
}

impl AddOutcome {
    pub fn took_effect(&self) -> bool {
        matches!(self, AddOutcome::Applied | AddOutcome::Upgraded)
    }
}

/// One-shot notifications raised by the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusNotice {
    WokeUp,
}

/// Active effects on one combatant
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusEffects {
    active: Vec<StatusInstance>,
    #[serde(skip)]
    notices: Vec<StatusNotice>,
}

impl StatusEffects {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, kind: StatusKind, options: ApplyOptions) -> AddOutcome {
        if self.has(kind) {
            return AddOutcome::AlreadyPresent;
        }
        if kind == StatusKind::Poisoned && self.has(StatusKind::BadlyPoisoned) {
            return AddOutcome::BlockedByStrongerPoison;
        }

        let upgraded = kind == StatusKind::BadlyPoisoned && self.remove(StatusKind::Poisoned);

        self.active.push(StatusInstance {
            kind,
            applied_turn: options.applied_turn,
            turns_active: 0,
            source: options.source,
            duration: options.duration,
        });

        if upgraded {
            AddOutcome::Upgraded
        } else {
            AddOutcome::Applied
        }
    }

    /// Remove an effect, returns whether one was actually removed
    pub fn remove(&mut self, kind: StatusKind) -> bool {
        let before = self.active.len();
        self.active.retain(|s| s.kind != kind);
        let removed = self.active.len() != before;
        if removed && kind == StatusKind::Asleep {
            self.notices.push(StatusNotice::WokeUp);
        }
        removed
    }

    pub fn has(&self, kind: StatusKind) -> bool {
        self.active.iter().any(|s| s.kind == kind)
    }

    pub fn get(&self, kind: StatusKind) -> Option<&StatusInstance> {
        self.active.iter().find(|s| s.kind == kind)
    }

    pub fn iter(&self) -> impl Iterator<Item = &StatusInstance> {
        self.active.iter()
    }

    pub fn kinds(&self) -> Vec<StatusKind> {
        self.active.iter().map(|s| s.kind).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }

    /// Drop every effect (on defeat)
    pub fn clear(&mut self) {
        self.active.clear();
    }

    /// Take pending one-shot notices
    pub fn drain_notices(&mut self) -> Vec<StatusNotice> {
        std::mem::take(&mut self.notices)
    }

    fn get_mut(&mut self, kind: StatusKind) -> Option<&mut StatusInstance> {
        self.active.iter_mut().find(|s| s.kind == kind)
    }
}

/// What happened at the start of the owner's turn
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TurnStartReport {
    pub skip_turn: bool,
    /// Confusion: this turn's action may land on allies
    pub ally_targetable: bool,
    pub messages: Vec<String>,
}

/// What happened at the end of the owner's turn
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TurnEndReport {
    pub damage: u32,
    pub heal: u32,
    /// Heals owed to seeders, by source id
    pub source_heals: Vec<(CombatantId, u32)>,
    pub messages: Vec<String>,
}

/// Run start-of-turn behavior for every active effect
pub fn tick_turn_start<R: Rng + ?Sized>(
    owner: &mut Combatant,
    config: &CombatConfig,
    rng: &mut R,
) -> TurnStartReport {
    let mut report = TurnStartReport::default();
    let name = owner.name.clone();

    for kind in owner.statuses.kinds() {
        let turns = match owner.statuses.get_mut(kind) {
            Some(instance) => {
                instance.turns_active += 1;
                instance.turns_active
            }
            None => continue,
        };

        if let Some(duration) = owner.statuses.get(kind).and_then(|s| s.duration) {
            if turns > duration {
                owner.statuses.remove(kind);
                report
                    .messages
                    .push(format!("{} is no longer {}.", name, kind.label()));
                continue;
            }
        }

        match kind {
            StatusKind::Paralyzed => {
                if rng.gen_bool(config.paralysis_skip_chance) {
                    report.skip_turn = true;
                    report
                        .messages
                        .push(format!("{} is fully paralyzed and cannot move!", name));
                }
            }
            StatusKind::Asleep => {
                // Waking clears the skip in the same tick
                if rng.gen_bool(config.sleep_wake_chance) {
                    owner.statuses.remove(StatusKind::Asleep);
                    report.messages.push(format!("{} woke up!", name));
                } else {
                    report.skip_turn = true;
                    report.messages.push(format!("{} is fast asleep.", name));
                }
            }
            StatusKind::Frozen => {
                if turns >= config.frozen_max_turns {
                    owner.statuses.remove(StatusKind::Frozen);
                    report.messages.push(format!("{} thawed out!", name));
                } else if rng.gen_bool(config.frozen_thaw_chance) {
                    owner.statuses.remove(StatusKind::Frozen);
                    report.messages.push(format!("{} broke free of the ice!", name));
                } else {
                    report.skip_turn = true;
                    report.messages.push(format!("{} is frozen solid!", name));
                }
            }
            StatusKind::Confused => {
                if rng.gen_bool(config.confusion_chance) {
                    report.ally_targetable = true;
                    report.messages.push(format!("{} is confused!", name));
                }
            }
            _ => {}
        }
    }

    report
}

/// Compute end-of-turn damage over time
///
/// Nothing is applied to health here; the caller applies `damage`, `heal`
/// and `source_heals` so that defeat handling stays in one place.
pub fn tick_turn_end(owner: &Combatant, config: &CombatConfig) -> TurnEndReport {
    let mut report = TurnEndReport::default();
    let max_hp = owner.max_hp;

    for instance in owner.statuses.iter() {
        if !instance.kind.is_damage_over_time() {
            continue;
        }

        let amount = dot_damage(instance, max_hp, config);
        if amount == 0 {
            continue;
        }

        if instance.kind.is_poison() && owner.abilities.poison_heal {
            report.heal += amount;
            report.messages.push(format!(
                "{} restored {} HP from poison.",
                owner.name, amount
            ));
            continue;
        }

        report.damage += amount;
        report.messages.push(match instance.kind {
            StatusKind::Seeded => format!("{} had {} HP sapped by the seed.", owner.name, amount),
            StatusKind::Held => format!("{} took {} damage from the hold.", owner.name, amount),
            other => format!("{} took {} damage from being {}.", owner.name, amount, other.label()),
        });

        if instance.kind == StatusKind::Seeded {
            if let Some(source) = instance.source {
                report.source_heals.push((source, amount));
            }
        }
    }

    report
}

/// Damage dealt by one damage-over-time instance
pub fn dot_damage(instance: &StatusInstance, max_hp: u32, config: &CombatConfig) -> u32 {
    let minor = (max_hp / config.minor_dot_divisor).max(1);
    match instance.kind {
        StatusKind::Poisoned | StatusKind::Seeded | StatusKind::Held => minor,
        StatusKind::BadlyPoisoned => {
            // No cap on the stack count
            let stacks = instance.turns_active.max(1);
            ((max_hp * stacks) / config.minor_dot_divisor).max(1)
        }
        StatusKind::Burned => max_hp.div_ceil(config.burn_divisor),
        StatusKind::Cursed => (max_hp / config.curse_divisor).max(1),
        _ => 0,
    }
}
