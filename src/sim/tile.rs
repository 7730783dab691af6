//! Tile codes and the fixed-size arena grid

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::consts::{GRID_CELLS, GRID_SIZE};

/// Static terrain and interactive features of one grid cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Tile {
    #[default]
    Empty,
    /// Destroyed by any bullet
    Brick,
    /// Absorbs bullets, never destroyed
    Steel,
    Water,
    /// Drawn above tanks, never collides
    Tree,
    QuestionBox,
    KnowledgeBox,
    /// Only present in templates; cleared when the map is built
    Spawn,
}

impl Tile {
    /// Decode a host template code
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Tile::Empty),
            1 => Some(Tile::Brick),
            2 => Some(Tile::Steel),
            3 => Some(Tile::Water),
            4 => Some(Tile::Tree),
            5 => Some(Tile::QuestionBox),
            6 => Some(Tile::KnowledgeBox),
            9 => Some(Tile::Spawn),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            Tile::Empty => 0,
            Tile::Brick => 1,
            Tile::Steel => 2,
            Tile::Water => 3,
            Tile::Tree => 4,
            Tile::QuestionBox => 5,
            Tile::KnowledgeBox => 6,
            Tile::Spawn => 9,
        }
    }

    /// Stops tanks
    pub fn blocks_movement(self) -> bool {
        matches!(self, Tile::Brick | Tile::Steel | Tile::Water)
    }

    /// Stops bullets (water swallows them, brick breaks, steel holds)
    pub fn blocks_bullets(self) -> bool {
        matches!(self, Tile::Brick | Tile::Steel | Tile::Water)
    }

    pub fn is_box(self) -> bool {
        matches!(self, Tile::QuestionBox | Tile::KnowledgeBox)
    }

    fn from_template_char(c: u8) -> Self {
        match c {
            b'B' => Tile::Brick,
            b'S' => Tile::Steel,
            b'W' => Tile::Water,
            b'T' => Tile::Tree,
            b'Q' => Tile::QuestionBox,
            b'K' => Tile::KnowledgeBox,
            b'P' => Tile::Spawn,
            _ => Tile::Empty,
        }
    }
}

/// Grid coordinate of a tile (column, row)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileCoord {
    pub x: i32,
    pub y: i32,
}

impl TileCoord {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// King-move distance
    pub fn chebyshev(self, other: TileCoord) -> i32 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }

    pub fn in_bounds(self) -> bool {
        (0..GRID_SIZE as i32).contains(&self.x) && (0..GRID_SIZE as i32).contains(&self.y)
    }

    /// Not on the outermost ring
    pub fn is_interior(self) -> bool {
        (1..GRID_SIZE as i32 - 1).contains(&self.x) && (1..GRID_SIZE as i32 - 1).contains(&self.y)
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.x, self.y)
    }
}

/// Built-in arena used when the host supplies no (valid) template.
///
/// `.` empty, `B` brick, `S` steel, `W` water, `T` tree, `P` spawn.
pub const DEFAULT_TEMPLATE: [&str; GRID_SIZE] = [
    "......................",
    ".BB.BB.BB....BB.BB.BB.",
    ".BB.BB.BB....BB.BB.BB.",
    "......................",
    "..SS....TTTTTT....SS..",
    "..SS....T....T....SS..",
    "........T....T........",
    ".BBBB............BBBB.",
    "......WWW....WWW......",
    ".TT...WWW....WWW...TT.",
    "....BB....SS....BB....",
    "....BB....SS....BB....",
    ".TT...WWW....WWW...TT.",
    "......WWW....WWW......",
    ".BBBB............BBBB.",
    "........T....T........",
    "..SS....T....T....SS..",
    "..SS....TTTTTT....SS..",
    "......................",
    ".BB.BB.BB....BB.BB.BB.",
    ".BB.BB.BB....BB.BB.BB.",
    "...........P..........",
];

/// Row-major 22x22 tile array
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileGrid {
    cells: Vec<Tile>,
}

impl TileGrid {
    pub fn filled(tile: Tile) -> Self {
        Self {
            cells: vec![tile; GRID_CELLS],
        }
    }

    pub fn default_template() -> Self {
        let cells = DEFAULT_TEMPLATE
            .iter()
            .flat_map(|row| row.bytes().map(Tile::from_template_char))
            .collect();
        Self { cells }
    }

    /// Decode host template codes; `None` when the length or any code is wrong
    pub fn from_codes(codes: &[u8]) -> Option<Self> {
        if codes.len() != GRID_CELLS {
            return None;
        }
        let cells = codes
            .iter()
            .map(|&c| Tile::from_code(c))
            .collect::<Option<Vec<_>>>()?;
        Some(Self { cells })
    }

    fn index(coord: TileCoord) -> Option<usize> {
        coord
            .in_bounds()
            .then(|| coord.y as usize * GRID_SIZE + coord.x as usize)
    }

    /// Out-of-bounds reads as `None`
    pub fn get(&self, coord: TileCoord) -> Option<Tile> {
        Self::index(coord).map(|i| self.cells[i])
    }

    pub fn set(&mut self, coord: TileCoord, tile: Tile) {
        if let Some(i) = Self::index(coord) {
            self.cells[i] = tile;
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (TileCoord, Tile)> + '_ {
        self.cells.iter().enumerate().map(|(i, &tile)| {
            (
                TileCoord::new((i % GRID_SIZE) as i32, (i / GRID_SIZE) as i32),
                tile,
            )
        })
    }

    pub fn coords_of(&self, wanted: Tile) -> impl Iterator<Item = TileCoord> + '_ {
        self.iter()
            .filter(move |&(_, tile)| tile == wanted)
            .map(|(coord, _)| coord)
    }

    pub fn count(&self, wanted: Tile) -> usize {
        self.cells.iter().filter(|&&t| t == wanted).count()
    }

    pub fn codes(&self) -> Vec<u8> {
        self.cells.iter().map(|t| t.code()).collect()
    }
}
