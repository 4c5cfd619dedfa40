//! Collaborator contracts consumed by the resolution engine
//!
//! Everything outside combat mechanics (type charts, weather, reaction
//! choice, luck policy, kill hooks, animation) reaches the engine through
//! these traits. Defaults are neutral so a bare session resolves combat
//! without any presentation or content layer attached.

use ahash::AHashSet;
use async_trait::async_trait;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::battle::initiative::InitiativeEntry;
use crate::combat::attack::AttackDescriptor;
use crate::combat::combatant::Combatant;
use crate::combat::dice::{forced_roll, DiceOutcome, RollMode};
use crate::core::error::Result;
use crate::core::types::{CombatantId, GridPos};

/// Positional queries against the grid
pub trait PositionQuery {
    fn in_bounds(&self, pos: GridPos) -> bool;
    fn is_tile_occupied(&self, x: i32, y: i32, exclude: Option<CombatantId>) -> bool;
    fn footprint_of(&self, id: CombatantId) -> Option<Vec<GridPos>>;
    fn update_position(&mut self, id: CombatantId, pos: GridPos) -> Result<()>;
}

/// Battlefield weather
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Weather {
    #[default]
    Clear,
    Sun,
    Rain,
    Sandstorm,
    Hail,
}

/// Type-effectiveness and weather lookups
pub trait ModifierSource: Send + Sync {
    fn type_effectiveness_multiplier(&self, attack_kind: &str, defender_kinds: &[String]) -> f32;

    fn current_weather(&self) -> Weather;

    fn weather_multiplier(&self, _weather: Weather, _attack_kind: &str) -> f32 {
        1.0
    }
}

/// Decides whether a defender reacts instead of dodging
#[async_trait]
pub trait ReactionSelector: Send + Sync {
    /// True if a reaction fired, consuming the defender's response
    async fn attempt_reaction(
        &self,
        defender: &Combatant,
        attacker: &Combatant,
        attack: &AttackDescriptor,
    ) -> bool;
}

/// Result of spending a luck token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LuckReroll {
    pub success: bool,
    pub roll: DiceOutcome,
    pub message: String,
}

/// When and how luck tokens are spent
#[async_trait]
pub trait LuckPolicy: Send + Sync {
    async fn should_use_luck_token(&self, combatant: &Combatant, failed_roll: &DiceOutcome) -> bool;

    async fn use_luck_token(
        &self,
        combatant: &Combatant,
        failed_roll: &DiceOutcome,
        pool_size: u32,
        target_net: i32,
        rng: &mut ChaCha8Rng,
    ) -> LuckReroll;
}

/// Computes which combatants act twice per round
pub trait DoubleTurnPolicy: Send + Sync {
    fn recompute_double_turns(&self, logic_list: &[InitiativeEntry]) -> AHashSet<CombatantId>;
}

/// Steal-on-kill and explosion-on-death hooks
#[async_trait]
pub trait KillHooks: Send + Sync {
    async fn should_steal(&self, _killer: &Combatant, _victim: &Combatant) -> bool {
        false
    }

    /// Claim the victim; `Some(hp)` keeps it in play at that health
    async fn steal(&self, _killer: &Combatant, _victim: &Combatant) -> Option<u32> {
        None
    }

    async fn should_explode(&self, _victim: &Combatant) -> bool {
        false
    }

    async fn explode(&self, _victim: &Combatant, _position: GridPos) {}
}

/// Presentation layer: animations complete when the future resolves
#[async_trait]
pub trait Presenter: Send + Sync {
    async fn animate_move(&self, _id: CombatantId, _dest: GridPos) {}

    async fn animate_dodge(&self, _id: CombatantId, _from: GridPos, _dest: GridPos) {}
}

// === DEFAULT COLLABORATORS ===

/// Every matchup is neutral and the sky is clear
#[derive(Debug, Clone, Default)]
pub struct NeutralModifiers;

impl ModifierSource for NeutralModifiers {
    fn type_effectiveness_multiplier(&self, _attack_kind: &str, _defender_kinds: &[String]) -> f32 {
        1.0
    }

    fn current_weather(&self) -> Weather {
        Weather::Clear
    }
}

/// Nobody ever reacts
#[derive(Debug, Clone, Default)]
pub struct NeverReact;

#[async_trait]
impl ReactionSelector for NeverReact {
    async fn attempt_reaction(&self, _: &Combatant, _: &Combatant, _: &AttackDescriptor) -> bool {
        false
    }
}

/// Spend a token on every failed roll while any remain
#[derive(Debug, Clone, Default)]
pub struct SpendWhileAvailable;

#[async_trait]
impl LuckPolicy for SpendWhileAvailable {
    async fn should_use_luck_token(&self, combatant: &Combatant, _failed_roll: &DiceOutcome) -> bool {
        combatant.luck.remaining > 0
    }

    async fn use_luck_token(
        &self,
        combatant: &Combatant,
        _failed_roll: &DiceOutcome,
        pool_size: u32,
        target_net: i32,
        rng: &mut ChaCha8Rng,
    ) -> LuckReroll {
        let roll = forced_roll(pool_size, 0, RollMode::Dodge, true, rng);
        let success = roll.adjusted_net() >= target_net;
        let message = if success {
            format!("{} used a luck token and rerolled to safety!", combatant.name)
        } else {
            format!("{} used a luck token, but the reroll failed.", combatant.name)
        };
        LuckReroll {
            success,
            roll,
            message,
        }
    }
}

/// Luck tokens are never spent
#[derive(Debug, Clone, Default)]
pub struct NeverUseLuck;

#[async_trait]
impl LuckPolicy for NeverUseLuck {
    async fn should_use_luck_token(&self, _: &Combatant, _: &DiceOutcome) -> bool {
        false
    }

    async fn use_luck_token(
        &self,
        _combatant: &Combatant,
        failed_roll: &DiceOutcome,
        _pool_size: u32,
        _target_net: i32,
        _rng: &mut ChaCha8Rng,
    ) -> LuckReroll {
        LuckReroll {
            success: false,
            roll: failed_roll.clone(),
            message: String::new(),
        }
    }
}

/// No one gets a second action
#[derive(Debug, Clone, Default)]
pub struct NoDoubleTurns;

impl DoubleTurnPolicy for NoDoubleTurns {
    fn recompute_double_turns(&self, _logic_list: &[InitiativeEntry]) -> AHashSet<CombatantId> {
        AHashSet::new()
    }
}

/// A combatant whose initiative is at least `ratio` times every opposing
/// initiative acts twice
#[derive(Debug, Clone)]
pub struct SpeedRatioDoubleTurns {
    pub ratio: u32,
}

impl Default for SpeedRatioDoubleTurns {
    fn default() -> Self {
        Self { ratio: 2 }
    }
}

impl DoubleTurnPolicy for SpeedRatioDoubleTurns {
    fn recompute_double_turns(&self, logic_list: &[InitiativeEntry]) -> AHashSet<CombatantId> {
        logic_list
            .iter()
            .filter(|entry| {
                let fastest_opponent = logic_list
                    .iter()
                    .filter(|other| other.team != entry.team)
                    .map(|other| other.roll)
                    .max();
                match fastest_opponent {
                    Some(opponent) => entry.roll >= opponent.max(1) * self.ratio,
                    None => false,
                }
            })
            .map(|entry| entry.combatant)
            .collect()
    }
}

/// Kill hooks that never claim or explode
#[derive(Debug, Clone, Default)]
pub struct NoKillHooks;

#[async_trait]
impl KillHooks for NoKillHooks {}

/// Animations complete immediately
#[derive(Debug, Clone, Default)]
pub struct InstantPresenter;

#[async_trait]
impl Presenter for InstantPresenter {}

/// All collaborators the engine talks to
#[derive(Clone)]
pub struct CombatHooks {
    pub modifiers: Arc<dyn ModifierSource>,
    pub reactions: Arc<dyn ReactionSelector>,
    pub luck: Arc<dyn LuckPolicy>,
    pub double_turns: Arc<dyn DoubleTurnPolicy>,
    pub kills: Arc<dyn KillHooks>,
    pub presenter: Arc<dyn Presenter>,
}

impl Default for CombatHooks {
    fn default() -> Self {
        Self {
            modifiers: Arc::new(NeutralModifiers),
            reactions: Arc::new(NeverReact),
            luck: Arc::new(SpendWhileAvailable),
            double_turns: Arc::new(NoDoubleTurns),
            kills: Arc::new(NoKillHooks),
            presenter: Arc::new(InstantPresenter),
        }
    }
}

impl CombatHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_modifiers(mut self, modifiers: impl ModifierSource + 'static) -> Self {
        self.modifiers = Arc::new(modifiers);
        self
    }

    pub fn with_reactions(mut self, reactions: impl ReactionSelector + 'static) -> Self {
        self.reactions = Arc::new(reactions);
        self
    }

    pub fn with_luck(mut self, luck: impl LuckPolicy + 'static) -> Self {
        self.luck = Arc::new(luck);
        self
    }

    pub fn with_double_turns(mut self, policy: impl DoubleTurnPolicy + 'static) -> Self {
        self.double_turns = Arc::new(policy);
        self
    }

    pub fn with_kill_hooks(mut self, kills: impl KillHooks + 'static) -> Self {
        self.kills = Arc::new(kills);
        self
    }

    pub fn with_presenter(mut self, presenter: impl Presenter + 'static) -> Self {
        self.presenter = Arc::new(presenter);
        self
    }
}

impl std::fmt::Debug for CombatHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CombatHooks").finish_non_exhaustive()
    }
}
