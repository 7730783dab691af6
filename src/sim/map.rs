//! Arena map builder
//!
//! Turns a tile template into a live grid, resolves the player spawn and
//! scatters question/knowledge boxes with rejection sampling. Every cell a box
//! has ever occupied is remembered so refills never land on an old spot.

use std::collections::HashSet;

use rand::Rng;
use rand_pcg::Pcg32;

use super::tile::{Tile, TileCoord, TileGrid};
use crate::consts::*;

/// Live arena: grid, resolved spawn and placement bookkeeping
#[derive(Debug, Clone)]
pub struct ArenaMap {
    pub grid: TileGrid,
    pub spawn: TileCoord,
    /// Cells that have held a box this session
    used: HashSet<TileCoord>,
    /// Question boxes ever put on the board (template ones included)
    question_boxes_placed: usize,
    /// True when the host template was rejected
    pub fell_back: bool,
}

impl ArenaMap {
    /// Build the arena and do the first round of box placement.
    ///
    /// A template of the wrong length (or with unknown codes) is ignored in
    /// favour of the built-in layout.
    pub fn build(
        template: Option<&[u8]>,
        question_pool: usize,
        knowledge_pool: usize,
        rng: &mut Pcg32,
    ) -> Self {
        let (mut grid, fell_back) = match template {
            None => (TileGrid::default_template(), false),
            Some(codes) => match TileGrid::from_codes(codes) {
                Some(grid) => (grid, false),
                None => {
                    log::warn!(
                        "Map template rejected ({} cells, expected {}); using default arena",
                        codes.len(),
                        GRID_CELLS
                    );
                    (TileGrid::default_template(), true)
                }
            },
        };

        let spawn = resolve_spawn(&mut grid);

        // Boxes with nothing behind them would open an empty prompt
        if question_pool == 0 {
            clear_tiles(&mut grid, Tile::QuestionBox);
        }
        if knowledge_pool == 0 {
            clear_tiles(&mut grid, Tile::KnowledgeBox);
        }

        let used: HashSet<TileCoord> = grid
            .iter()
            .filter(|(_, tile)| tile.is_box())
            .map(|(coord, _)| coord)
            .collect();
        let question_boxes_placed = grid.count(Tile::QuestionBox);
        let template_knowledge = grid.count(Tile::KnowledgeBox);

        let mut map = Self {
            grid,
            spawn,
            used,
            question_boxes_placed,
            fell_back,
        };

        map.top_up_question_boxes(question_pool, spawn, rng);
        map.place_knowledge_boxes(knowledge_pool.saturating_sub(template_knowledge), spawn, rng);
        map
    }

    /// Question boxes currently on the board
    pub fn question_boxes(&self) -> usize {
        self.grid.count(Tile::QuestionBox)
    }

    pub fn boxes(&self) -> impl Iterator<Item = (TileCoord, Tile)> + '_ {
        self.grid.iter().filter(|(_, tile)| tile.is_box())
    }

    pub fn was_used(&self, coord: TileCoord) -> bool {
        self.used.contains(&coord)
    }

    /// Place question boxes until the board holds as many as the pool still
    /// allows (never more than `MAX_QUESTION_BOXES`). Returns how many landed.
    ///
    /// Each unit tries spacing 3 first, then 2; a unit that finds no cell is
    /// skipped for this pass.
    pub fn top_up_question_boxes(
        &mut self,
        question_pool: usize,
        player_tile: TileCoord,
        rng: &mut Pcg32,
    ) -> usize {
        let allowance = question_pool.saturating_sub(self.question_boxes_placed);
        let room = MAX_QUESTION_BOXES.saturating_sub(self.question_boxes());
        let wanted = allowance.min(room);

        let mut placed = 0;
        for _ in 0..wanted {
            let cell = self
                .find_cell(BOX_SPACING, player_tile, rng)
                .or_else(|| self.find_cell(BOX_SPACING_RELAXED, player_tile, rng));
            match cell {
                Some(coord) => {
                    self.put_box(coord, Tile::QuestionBox);
                    self.question_boxes_placed += 1;
                    placed += 1;
                }
                None => log::debug!("No free cell for a question box this pass"),
            }
        }
        if placed < wanted {
            log::warn!("Placed {placed} of {wanted} question boxes");
        }
        placed
    }

    /// One knowledge box per item. Spacing relaxes 3 -> 0, then spawn
    /// clearance goes, so content is only lost when there is no free cell at all.
    pub fn place_knowledge_boxes(
        &mut self,
        count: usize,
        player_tile: TileCoord,
        rng: &mut Pcg32,
    ) -> usize {
        let mut placed = 0;
        for _ in 0..count {
            let cell = (0..=BOX_SPACING)
                .rev()
                .find_map(|spacing| self.find_cell(spacing, player_tile, rng))
                .or_else(|| self.first_free_cell(player_tile));
            match cell {
                Some(coord) => {
                    self.put_box(coord, Tile::KnowledgeBox);
                    placed += 1;
                }
                None => log::warn!("Arena full, knowledge box dropped"),
            }
        }
        placed
    }

    /// Remove a box after it has been answered. Returns the removed tile.
    pub fn consume_box(&mut self, coord: TileCoord) -> Option<Tile> {
        let tile = self.grid.get(coord).filter(|t| t.is_box())?;
        self.grid.set(coord, Tile::Empty);
        Some(tile)
    }

    fn put_box(&mut self, coord: TileCoord, tile: Tile) {
        self.grid.set(coord, tile);
        self.used.insert(coord);
    }

    /// Rejection-sample an interior cell honouring `spacing`
    fn find_cell(
        &self,
        spacing: i32,
        player_tile: TileCoord,
        rng: &mut Pcg32,
    ) -> Option<TileCoord> {
        let hi = GRID_SIZE as i32 - 1;
        (0..PLACEMENT_ATTEMPTS)
            .map(|_| TileCoord::new(rng.random_range(1..hi), rng.random_range(1..hi)))
            .find(|&c| self.accepts(c, spacing, player_tile))
    }

    /// Deterministic sweep used once sampling at spacing 0 has failed. Spawn
    /// clearance no longer applies; only the spawn and player cells are off limits.
    fn first_free_cell(&self, player_tile: TileCoord) -> Option<TileCoord> {
        self.grid
            .iter()
            .find(|&(c, tile)| {
                tile == Tile::Empty
                    && c.is_interior()
                    && c != self.spawn
                    && c != player_tile
                    && !self.used.contains(&c)
            })
            .map(|(c, _)| c)
    }

    fn accepts(&self, c: TileCoord, spacing: i32, player_tile: TileCoord) -> bool {
        self.grid.get(c) == Some(Tile::Empty)
            && !self.used.contains(&c)
            && c.chebyshev(self.spawn) >= SPAWN_CLEARANCE
            && c.chebyshev(player_tile) >= spacing.max(1)
            && self.boxes().all(|(b, _)| c.chebyshev(b) >= spacing)
    }
}

/// Keep the last spawn marker, clear the rest. Without one, fall back to
/// bottom-centre and open the cells around it.
fn resolve_spawn(grid: &mut TileGrid) -> TileCoord {
    let markers: Vec<TileCoord> = grid.coords_of(Tile::Spawn).collect();
    for &coord in &markers {
        grid.set(coord, Tile::Empty);
    }
    match markers.last() {
        Some(&spawn) => {
            if markers.len() > 1 {
                log::debug!("{} spawn markers, using {spawn}", markers.len());
            }
            spawn
        }
        None => {
            let spawn = TileCoord::new(GRID_SIZE as i32 / 2, GRID_SIZE as i32 - 1);
            grid.set(spawn, Tile::Empty);
            grid.set(TileCoord::new(spawn.x, spawn.y - 1), Tile::Empty);
            log::debug!("No spawn marker, defaulting to {spawn}");
            spawn
        }
    }
}

fn clear_tiles(grid: &mut TileGrid, wanted: Tile) {
    let coords: Vec<TileCoord> = grid.coords_of(wanted).collect();
    for coord in coords {
        grid.set(coord, Tile::Empty);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rand::SeedableRng;

    fn rng(seed: u64) -> Pcg32 {
        Pcg32::seed_from_u64(seed)
    }

    fn question_coords(map: &ArenaMap) -> Vec<TileCoord> {
        map.grid.coords_of(Tile::QuestionBox).collect()
    }

    #[test]
    fn test_default_build() {
        let map = ArenaMap::build(None, 20, 3, &mut rng(1));
        assert!(!map.fell_back);
        assert_eq!(map.spawn, TileCoord::new(11, 21));
        assert_eq!(map.grid.count(Tile::Spawn), 0);
        assert!(map.question_boxes() <= MAX_QUESTION_BOXES);
        assert!(map.question_boxes() > 0);
        assert_eq!(map.grid.count(Tile::KnowledgeBox), 3);
    }

    #[test]
    fn test_question_boxes_bounded_by_pool() {
        let map = ArenaMap::build(None, 4, 0, &mut rng(2));
        assert!(map.question_boxes() <= 4);
        let map = ArenaMap::build(None, 0, 0, &mut rng(2));
        assert_eq!(map.question_boxes(), 0);
    }

    #[test]
    fn test_wrong_length_falls_back() {
        let map = ArenaMap::build(Some(&[0, 1, 2]), 5, 1, &mut rng(3));
        assert!(map.fell_back);
        assert_eq!(map.spawn, TileCoord::new(11, 21));
        assert_eq!(map.grid.get(TileCoord::new(1, 1)), Some(Tile::Brick));
    }

    #[test]
    fn test_missing_spawn_defaults_bottom_centre() {
        let codes = vec![Tile::Brick.code(); GRID_CELLS];
        let map = ArenaMap::build(Some(&codes), 0, 0, &mut rng(4));
        assert_eq!(map.spawn, TileCoord::new(11, 21));
        assert_eq!(map.grid.get(map.spawn), Some(Tile::Empty));
        assert_eq!(map.grid.get(TileCoord::new(11, 20)), Some(Tile::Empty));
    }

    #[test]
    fn test_last_spawn_marker_wins() {
        let mut codes = vec![0u8; GRID_CELLS];
        codes[GRID_SIZE + 2] = 9;
        codes[10 * GRID_SIZE + 5] = 9;
        codes[20 * GRID_SIZE + 7] = 9;
        let map = ArenaMap::build(Some(&codes), 0, 0, &mut rng(5));
        assert_eq!(map.spawn, TileCoord::new(7, 20));
        assert_eq!(map.grid.count(Tile::Spawn), 0);
    }

    #[test]
    fn test_knowledge_never_dropped_when_crowded() {
        // Only a handful of free cells: spacing has to collapse to fit
        let mut codes = vec![Tile::Steel.code(); GRID_CELLS];
        for x in 5..11 {
            codes[5 * GRID_SIZE + x] = 0;
        }
        codes[20 * GRID_SIZE + 11] = 9;
        let map = ArenaMap::build(Some(&codes), 0, 4, &mut rng(6));
        assert_eq!(map.grid.count(Tile::KnowledgeBox), 4);
    }

    #[test]
    fn test_knowledge_fits_next_to_spawn() {
        // The only open cells sit inside the spawn clearance
        let mut codes = vec![Tile::Steel.code(); GRID_CELLS];
        for x in 9..14 {
            codes[20 * GRID_SIZE + x] = 0;
        }
        codes[20 * GRID_SIZE + 11] = 9;
        let map = ArenaMap::build(Some(&codes), 0, 3, &mut rng(9));
        assert_eq!(map.grid.count(Tile::KnowledgeBox), 3);
        assert_eq!(map.grid.get(map.spawn), Some(Tile::Empty));
    }

    #[test]
    fn test_refill_never_reuses_cells() {
        let mut r = rng(7);
        let mut map = ArenaMap::build(None, 30, 0, &mut r);
        let first = question_coords(&map);
        let consumed = first[0];
        assert_eq!(map.consume_box(consumed), Some(Tile::QuestionBox));
        assert_eq!(map.consume_box(consumed), None);

        let placed = map.top_up_question_boxes(30, map.spawn, &mut r);
        assert_eq!(placed, 1);
        assert_eq!(map.grid.get(consumed), Some(Tile::Empty));
        assert!(map.was_used(consumed));
        assert_eq!(map.question_boxes(), first.len());
    }

    #[test]
    fn test_refill_stops_when_pool_spent() {
        let mut r = rng(8);
        let mut map = ArenaMap::build(None, 2, 0, &mut r);
        assert_eq!(map.question_boxes(), 2);
        for coord in question_coords(&map) {
            map.consume_box(coord);
        }
        assert_eq!(map.top_up_question_boxes(2, map.spawn, &mut r), 0);
        assert_eq!(map.question_boxes(), 0);
    }

    proptest! {
        #[test]
        fn prop_placement_invariant(seed in any::<u64>(), questions in 0usize..25, knowledge in 0usize..4) {
            let map = ArenaMap::build(None, questions, knowledge, &mut rng(seed));
            let qs = question_coords(&map);
            for (i, a) in qs.iter().enumerate() {
                for b in &qs[i + 1..] {
                    prop_assert!(a.chebyshev(*b) >= BOX_SPACING_RELAXED);
                }
            }
            for (coord, _) in map.boxes() {
                prop_assert!(coord.is_interior());
                prop_assert!(coord.chebyshev(map.spawn) >= SPAWN_CLEARANCE);
            }
            prop_assert_eq!(map.grid.count(Tile::KnowledgeBox), knowledge);
        }

        #[test]
        fn prop_single_spawn(seed in any::<u64>(), spawns in proptest::collection::vec(0usize..GRID_CELLS, 0..6)) {
            let mut codes = vec![0u8; GRID_CELLS];
            for i in &spawns {
                codes[*i] = Tile::Spawn.code();
            }
            let map = ArenaMap::build(Some(&codes), 5, 1, &mut rng(seed));
            prop_assert_eq!(map.grid.count(Tile::Spawn), 0);
            prop_assert!(map.spawn.in_bounds());
            prop_assert_eq!(map.grid.get(map.spawn), Some(Tile::Empty));
        }
    }
}
