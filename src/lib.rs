//! Squad Combat - turn-based combat resolution on a grid
//!
//! Initiative scheduling, dice pools, status effects, dodges and the
//! line-rolling attack, all driven through an explicitly owned
//! [`battle::session::BattleSession`].

pub mod battle;
pub mod combat;
pub mod core;
