//! Battlefield grid with occupancy and footprints
//!
//! The grid is bounded and rectangular. Each combatant occupies every cell of
//! its footprint; occupancy is keyed by cell and resolved back to the owning
//! combatant id.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::battle::hooks::PositionQuery;
use crate::combat::combatant::SizeCategory;
use crate::core::error::{CombatError, Result};
use crate::core::types::{CombatantId, GridPos};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct Placement {
    anchor: GridPos,
    size: SizeCategory,
}

/// The combat grid
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Battlefield {
    pub width: u32,
    pub height: u32,
    cells: AHashMap<GridPos, CombatantId>,
    placements: AHashMap<CombatantId, Placement>,
}

impl Battlefield {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            cells: AHashMap::new(),
            placements: AHashMap::new(),
        }
    }

    /// Check if coordinate is within map bounds
    pub fn in_bounds(&self, pos: GridPos) -> bool {
        pos.x >= 0 && pos.y >= 0 && pos.x < self.width as i32 && pos.y < self.height as i32
    }

    /// Every footprint cell is inside the grid and free of other combatants
    pub fn footprint_fits(&self, anchor: GridPos, size: SizeCategory, exclude: Option<CombatantId>) -> bool {
        size.footprint_at(anchor).into_iter().all(|cell| {
            self.in_bounds(cell) && !self.is_tile_occupied(cell.x, cell.y, exclude)
        })
    }

    /// Place a combatant, failing if its footprint does not fit
    pub fn place(&mut self, id: CombatantId, anchor: GridPos, size: SizeCategory) -> Result<()> {
        if !size.footprint_at(anchor).iter().all(|c| self.in_bounds(*c)) {
            return Err(CombatError::OutOfBounds(anchor));
        }
        if !self.footprint_fits(anchor, size, Some(id)) {
            return Err(CombatError::InvalidTarget(format!("{} is occupied", anchor)));
        }
        self.clear_cells(id);
        for cell in size.footprint_at(anchor) {
            self.cells.insert(cell, id);
        }
        self.placements.insert(id, Placement { anchor, size });
        Ok(())
    }

    /// Take a combatant off the grid, returns whether it was present
    pub fn remove(&mut self, id: CombatantId) -> bool {
        self.clear_cells(id);
        self.placements.remove(&id).is_some()
    }

    pub fn anchor_of(&self, id: CombatantId) -> Option<GridPos> {
        self.placements.get(&id).map(|p| p.anchor)
    }

    pub fn occupant_at(&self, pos: GridPos) -> Option<CombatantId> {
        self.cells.get(&pos).copied()
    }

    pub fn occupant_count(&self) -> usize {
        self.placements.len()
    }

    fn clear_cells(&mut self, id: CombatantId) {
        if let Some(placement) = self.placements.get(&id) {
            for cell in placement.size.footprint_at(placement.anchor) {
                if self.cells.get(&cell) == Some(&id) {
                    self.cells.remove(&cell);
                }
            }
        }
    }
}

impl PositionQuery for Battlefield {
    fn in_bounds(&self, pos: GridPos) -> bool {
        Battlefield::in_bounds(self, pos)
    }

    fn is_tile_occupied(&self, x: i32, y: i32, exclude: Option<CombatantId>) -> bool {
        match self.cells.get(&GridPos::new(x, y)) {
            Some(occupant) => Some(*occupant) != exclude,
            None => false,
        }
    }

    fn footprint_of(&self, id: CombatantId) -> Option<Vec<GridPos>> {
        self.placements
            .get(&id)
            .map(|p| p.size.footprint_at(p.anchor))
    }

    fn update_position(&mut self, id: CombatantId, pos: GridPos) -> Result<()> {
        let size = self
            .placements
            .get(&id)
            .map(|p| p.size)
            .ok_or(CombatError::CombatantNotFound(id))?;
        self.place(id, pos, size)
    }
}
