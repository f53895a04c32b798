//! Terrain grid: the immutable tile map an encounter is fought on.

use crate::creature::Position;
use crate::dice::Dice;
use serde::{Deserialize, Serialize};

/// Movement class of a single tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Terrain {
    #[default]
    Open,
    Difficult,
    Impassable,
}

impl Terrain {
    /// Cost multiplier for stepping onto this tile, or `None` if it can't be entered.
    pub fn multiplier(self) -> Option<f64> {
        match self {
            Terrain::Open => Some(1.0),
            Terrain::Difficult => Some(2.0),
            Terrain::Impassable => None,
        }
    }

    pub fn is_passable(self) -> bool {
        self.multiplier().is_some()
    }
}

/// Width × height tile map, stored row-major.
///
/// Built once at encounter creation; nothing mutates it afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerrainGrid {
    width: u32,
    height: u32,
    tiles: Vec<Terrain>,
}

impl TerrainGrid {
    /// A grid where every tile is open.
    pub fn open(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            tiles: vec![Terrain::Open; width as usize * height as usize],
        }
    }

    /// A square grid where each tile is independently difficult with `difficult_chance`.
    pub fn generate(size: u32, difficult_chance: f64, dice: &mut Dice) -> Self {
        let tiles = (0..size as usize * size as usize)
            .map(|_| {
                if dice.chance(difficult_chance) {
                    Terrain::Difficult
                } else {
                    Terrain::Open
                }
            })
            .collect();
        Self {
            width: size,
            height: size,
            tiles,
        }
    }

    /// Builder-style tile override, for hand-made maps.
    pub fn with_tile(mut self, position: Position, terrain: Terrain) -> Self {
        if let Some(index) = self.index(position) {
            self.tiles[index] = terrain;
        }
        self
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn contains(&self, position: Position) -> bool {
        position.x >= 0
            && position.y >= 0
            && position.x < self.width as i32
            && position.y < self.height as i32
    }

    fn index(&self, position: Position) -> Option<usize> {
        self.contains(position)
            .then(|| position.y as usize * self.width as usize + position.x as usize)
    }

    /// Terrain at `position`, or `None` off the map.
    pub fn terrain(&self, position: Position) -> Option<Terrain> {
        self.index(position).map(|i| self.tiles[i])
    }

    /// In bounds and not impassable.
    pub fn is_passable(&self, position: Position) -> bool {
        self.terrain(position).is_some_and(Terrain::is_passable)
    }

    /// Every position on the grid, row by row.
    pub fn positions(&self) -> impl Iterator<Item = Position> + '_ {
        (0..self.height as i32)
            .flat_map(move |y| (0..self.width as i32).map(move |x| Position::new(x, y)))
    }

    pub fn count(&self, terrain: Terrain) -> usize {
        self.tiles.iter().filter(|t| **t == terrain).count()
    }
}
