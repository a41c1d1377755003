//! Hex tile coordinates.

use serde::{Deserialize, Serialize};

/// Axial hex coordinate of a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Pos {
    pub x: i32,
    pub y: i32,
}

impl Pos {
    pub const ORIGIN: Pos = Pos::new(0, 0);

    /// The six unit steps, in rotation order.
    pub const UNITS: [Pos; 6] = [
        Pos::new(1, 0),
        Pos::new(1, -1),
        Pos::new(0, -1),
        Pos::new(-1, 0),
        Pos::new(-1, 1),
        Pos::new(0, 1),
    ];

    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub const fn add(self, other: Pos) -> Pos {
        Pos::new(self.x + other.x, self.y + other.y)
    }

    pub const fn sub(self, other: Pos) -> Pos {
        Pos::new(self.x - other.x, self.y - other.y)
    }

    pub const fn scale(self, c: i32) -> Pos {
        Pos::new(self.x * c, self.y * c)
    }

    /// Adjacent tile in direction `dir` (taken modulo 6).
    pub const fn neighbor(self, dir: usize) -> Pos {
        self.add(Pos::UNITS[dir % 6])
    }

    /// Number of hex steps between two tiles.
    pub fn distance(self, other: Pos) -> i32 {
        let Pos { x, y } = other.sub(self);
        if x * y >= 0 {
            (x + y).abs()
        } else {
            x.abs().max(y.abs())
        }
    }
}

impl std::fmt::Display for Pos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}
