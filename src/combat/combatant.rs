//! Combatant model: stats, chain counter, luck tokens and round flags

use serde::{Deserialize, Serialize};

use crate::combat::status::StatusEffects;
use crate::core::types::{CombatantId, GridPos, TeamIndex};

/// Size category, determines the footprint on the grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SizeCategory {
    Small,
    #[default]
    Medium,
    Large,
    Huge,
}

impl SizeCategory {
    /// Footprint radius in cells around the anchor (0 = single cell)
    pub fn footprint_radius(&self) -> i32 {
        match self {
            SizeCategory::Small | SizeCategory::Medium => 0,
            SizeCategory::Large => 1,
            SizeCategory::Huge => 2,
        }
    }

    /// Every cell occupied when anchored at `anchor`
    pub fn footprint_at(&self, anchor: GridPos) -> Vec<GridPos> {
        let r = self.footprint_radius();
        let mut cells = Vec::with_capacity(((2 * r + 1) * (2 * r + 1)) as usize);
        for dy in -r..=r {
            for dx in -r..=r {
                cells.push(anchor.offset(dx, dy));
            }
        }
        cells
    }
}

/// Combat stat block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatBlock {
    /// Attack pool size
    pub accuracy: u32,
    /// Dodge pool size
    pub evasion: u32,
    /// Initiative dice count
    pub speed: u32,
    /// Tiles per move action
    pub movement: u32,
    /// Flat damage dice added to every hit
    pub power: u32,
    /// Luck token pool maximum
    pub luck: u32,
}

impl Default for StatBlock {
    fn default() -> Self {
        Self {
            accuracy: 3,
            evasion: 2,
            speed: 3,
            movement: 3,
            power: 0,
            luck: 1,
        }
    }
}

/// Ability flags relevant to resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Abilities {
    /// Poison and badly-poisoned ticks heal instead of hurt
    pub poison_heal: bool,
}

/// Consecutive rolling-attack counter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ChainCounter(u8);

impl ChainCounter {
    pub fn value(&self) -> u8 {
        self.0
    }

    pub fn increment(&mut self, cap: u8) -> u8 {
        self.0 = (self.0 + 1).min(cap);
        self.0
    }

    /// Reset to zero, returns true if a chain was broken
    pub fn reset(&mut self) -> bool {
        let broken = self.0 > 0;
        self.0 = 0;
        broken
    }

    /// Extra damage dice granted by this chain value
    pub fn bonus_dice(&self, dice_per_step: u32, cap: u32) -> u32 {
        chain_bonus_dice(self.0 as u32, dice_per_step, cap)
    }
}

/// `min((chain - 1) * per_step, cap)`, zero for chains below 2
pub fn chain_bonus_dice(chain: u32, dice_per_step: u32, cap: u32) -> u32 {
    (chain.saturating_sub(1) * dice_per_step).min(cap)
}

/// Per-combatant luck token pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LuckTokens {
    pub remaining: u32,
    pub max: u32,
}

impl LuckTokens {
    pub fn new(max: u32) -> Self {
        Self { remaining: max, max }
    }

    /// Spend one token, returns false if none are left
    pub fn consume(&mut self) -> bool {
        if self.remaining == 0 {
            return false;
        }
        self.remaining -= 1;
        true
    }

    pub fn refill(&mut self) {
        self.remaining = self.max;
    }
}

/// Transient per-round flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RoundFlags {
    pub has_acted_this_round: bool,
    pub skip_next_turn: bool,
    pub pending_immediate_turn: bool,
}

/// A stat-bearing combatant on the grid
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Combatant {
    pub id: CombatantId,
    pub name: String,
    pub team: TeamIndex,
    pub hp: u32,
    pub max_hp: u32,
    pub position: GridPos,
    pub size: SizeCategory,
    /// Elemental kinds used by the type chart
    pub kinds: Vec<String>,
    pub stats: StatBlock,
    pub abilities: Abilities,
    pub statuses: StatusEffects,
    pub chain: ChainCounter,
    pub luck: LuckTokens,
    pub flags: RoundFlags,
    pub defeated: bool,
}

impl Combatant {
    pub fn new(name: impl Into<String>, team: TeamIndex, max_hp: u32, position: GridPos) -> Self {
        let stats = StatBlock::default();
        Self {
            id: CombatantId::new(),
            name: name.into(),
            team,
            hp: max_hp,
            max_hp,
            position,
            size: SizeCategory::default(),
            kinds: Vec::new(),
            stats,
            abilities: Abilities::default(),
            statuses: StatusEffects::default(),
            chain: ChainCounter::default(),
            luck: LuckTokens::new(stats.luck),
            flags: RoundFlags::default(),
            defeated: false,
        }
    }

    pub fn with_stats(mut self, stats: StatBlock) -> Self {
        self.stats = stats;
        self.luck = LuckTokens::new(stats.luck);
        self
    }

    pub fn with_size(mut self, size: SizeCategory) -> Self {
        self.size = size;
        self
    }

    pub fn with_kinds(mut self, kinds: &[&str]) -> Self {
        self.kinds = kinds.iter().map(|k| k.to_string()).collect();
        self
    }

    pub fn with_abilities(mut self, abilities: Abilities) -> Self {
        self.abilities = abilities;
        self
    }

    pub fn is_alive(&self) -> bool {
        !self.defeated && self.hp > 0
    }

    pub fn footprint(&self) -> Vec<GridPos> {
        self.size.footprint_at(self.position)
    }

    /// Apply damage, returns the health actually removed
    pub fn take_damage(&mut self, amount: u32) -> u32 {
        let dealt = amount.min(self.hp);
        self.hp -= dealt;
        dealt
    }

    /// Heal up to max health, returns the health actually restored
    pub fn heal(&mut self, amount: u32) -> u32 {
        let restored = amount.min(self.max_hp - self.hp);
        self.hp += restored;
        restored
    }

    pub fn clear_round_flags(&mut self) {
        self.flags = RoundFlags::default();
    }
}
