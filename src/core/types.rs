//! Core type definitions used throughout the codebase

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for combatants
///
/// This is the only join key between the scheduler, the battlefield and the
/// status store. Combatants are never matched by value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CombatantId(pub Uuid);

impl CombatantId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for CombatantId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for CombatantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Short form is enough to tell combatants apart in logs
        let s = self.0.simple().to_string();
        write!(f, "{}", &s[..8])
    }
}

/// Team (squad) index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TeamIndex(pub u8);

/// Round counter
pub type Round = u32;

/// Integer grid position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct GridPos {
    pub x: i32,
    pub y: i32,
}

impl GridPos {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn offset(&self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    /// Grid step distance where a diagonal step counts as one
    pub fn grid_distance(&self, other: &Self) -> u32 {
        let dx = (self.x - other.x).unsigned_abs();
        let dy = (self.y - other.y).unsigned_abs();
        dx.max(dy)
    }

    /// Shares a row, a column or a diagonal with `other`
    pub fn is_colinear_with(&self, other: &Self) -> bool {
        let dx = (self.x - other.x).abs();
        let dy = (self.y - other.y).abs();
        dx == 0 || dy == 0 || dx == dy
    }

    pub fn to_vec2(self) -> Vec2 {
        Vec2::new(self.x as f32, self.y as f32)
    }
}

impl std::fmt::Display for GridPos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// 2D vector used for directions and sub-cell stepping
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn length(&self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn normalize(&self) -> Self {
        let len = self.length();
        if len > 0.0001 {
            Self { x: self.x / len, y: self.y / len }
        } else {
            Self::default()
        }
    }

    /// Round to the nearest grid cell
    pub fn round_to_grid(&self) -> GridPos {
        GridPos::new(self.x.round() as i32, self.y.round() as i32)
    }
}

impl std::ops::Add for Vec2 {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self { x: self.x + rhs.x, y: self.y + rhs.y }
    }
}

impl std::ops::Sub for Vec2 {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self { x: self.x - rhs.x, y: self.y - rhs.y }
    }
}

impl std::ops::Mul<f32> for Vec2 {
    type Output = Self;
    fn mul(self, rhs: f32) -> Self {
        Self { x: self.x * rhs, y: self.y * rhs }
    }
}

/// The eight compass directions as unit grid offsets
pub const COMPASS_DIRECTIONS: [(i32, i32); 8] = [
    (0, -1),
    (1, -1),
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combatant_id_uniqueness() {
        let a = CombatantId::new();
        let b = CombatantId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn test_combatant_id_hash() {
        use std::collections::HashMap;
        let id = CombatantId::new();
        let mut map: HashMap<CombatantId, &str> = HashMap::new();
        map.insert(id, "walzer");
        assert_eq!(map.get(&id), Some(&"walzer"));
    }

    #[test]
    fn test_grid_distance_counts_diagonals_once() {
        let a = GridPos::new(0, 0);
        assert_eq!(a.grid_distance(&GridPos::new(1, 1)), 1);
        assert_eq!(a.grid_distance(&GridPos::new(3, -2)), 3);
    }

    #[test]
    fn test_colinear() {
        let a = GridPos::new(2, 2);
        assert!(a.is_colinear_with(&GridPos::new(2, 7)));
        assert!(a.is_colinear_with(&GridPos::new(9, 2)));
        assert!(a.is_colinear_with(&GridPos::new(5, 5)));
        assert!(a.is_colinear_with(&GridPos::new(0, 4)));
        assert!(!a.is_colinear_with(&GridPos::new(3, 4)));
    }

    #[test]
    fn test_vec2_normalize() {
        let v = Vec2::new(3.0, 4.0).normalize();
        assert!((v.length() - 1.0).abs() < 0.001);
        assert_eq!(Vec2::default().normalize(), Vec2::default());
    }

    #[test]
    fn test_round_to_grid() {
        assert_eq!(Vec2::new(1.4, 2.6).round_to_grid(), GridPos::new(1, 3));
    }
}
