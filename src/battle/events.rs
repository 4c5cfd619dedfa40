//! Battle log and session change notifications

use serde::{Deserialize, Serialize};

use crate::core::types::{CombatantId, Round};

/// Log entry for battle events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BattleEvent {
    pub round: Round,
    pub kind: BattleEventKind,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BattleEventKind {
    Initiative,
    Turn,
    Status,
    Attack,
    Dodge,
    Damage,
    Defeat,
    Warning,
    Error,
}

/// Human-readable battle log
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BattleLog {
    pub events: Vec<BattleEvent>,
}

impl BattleLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, kind: BattleEventKind, description: String, round: Round) {
        self.events.push(BattleEvent {
            round,
            kind,
            description,
        });
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.events.iter().any(|e| e.description.contains(needle))
    }

    pub fn of_kind(&self, kind: BattleEventKind) -> impl Iterator<Item = &BattleEvent> {
        self.events.iter().filter(move |e| e.kind == kind)
    }
}

/// Change notifications for presentation subscribers
///
/// Sent after the mutation has fully completed, including double-turn
/// recomputation for ordering changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionChange {
    RoundStarted(Round),
    OrderChanged,
    DoubleTurnsChanged(Vec<CombatantId>),
    CombatantDefeated(CombatantId),
    RoundEnded(Round),
    Reset,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_push_and_filter() {
        let mut log = BattleLog::new();
        log.push(BattleEventKind::Attack, "Walzer rolls forward".into(), 1);
        log.push(BattleEventKind::Defeat, "Target fainted".into(), 1);
        assert_eq!(log.len(), 2);
        assert!(log.contains("fainted"));
        assert_eq!(log.of_kind(BattleEventKind::Defeat).count(), 1);
    }
}
