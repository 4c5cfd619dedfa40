use thiserror::Error;

use crate::core::types::{CombatantId, GridPos};

#[derive(Error, Debug)]
pub enum CombatError {
    #[error("Combatant not found: {0}")]
    CombatantNotFound(CombatantId),

    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    #[error("Out of bounds: {0}")]
    OutOfBounds(GridPos),

    #[error("Combatant already defeated: {0}")]
    AlreadyDefeated(CombatantId),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, CombatError>;
