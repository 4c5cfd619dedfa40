//! Battle orchestration - the session, its grid, turn order and collaborators

pub mod battlefield;
pub mod events;
pub mod hooks;
pub mod initiative;
pub mod session;
pub mod turn;

pub use battlefield::Battlefield;
pub use events::{BattleEvent, BattleEventKind, BattleLog, SessionChange};
pub use hooks::{
    CombatHooks, DoubleTurnPolicy, KillHooks, LuckPolicy, ModifierSource, PositionQuery, Presenter,
    ReactionSelector, Weather,
};
pub use initiative::{InitiativeChange, InitiativeEntry, RoundPhase, Scheduler};
pub use session::{ActionKind, BattleSession};
pub use turn::{begin_turn, end_turn, TurnEnd};
