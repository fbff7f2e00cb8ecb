//! Spatial partitioning for efficient neighbor queries.
//!
//! A uniform-cell index rebuilt from scratch each tick over the alive
//! agents. Storage is two flat arrays: `head[cell]` holds the first agent
//! index in that cell (or -1) and `next[agent]` chains to the next agent
//! in the same cell. Rebuild is O(N) with no per-cell allocation, and
//! queries take `&self`, so any number of tasks may read concurrently
//! while the resolver runs.
//!
//! The query yields every agent in the 3x3 block of cells around the
//! query point, in no particular order; callers filter by distance and
//! alliance themselves.

use crate::agents::AgentStore;

/// Cell edge length in grid units.
pub const CELL_SIZE: f32 = 30.0;

/// Uniform-grid spatial index over agent positions.
#[derive(Debug, Clone)]
pub struct SpatialIndex {
    cell_size: f32,
    cells_y: usize,
    cells_x: usize,
    head: Vec<i32>,
    next: Vec<i32>,
}

impl SpatialIndex {
    /// Index sized for a `height` x `width` grid.
    pub fn new(height: usize, width: usize) -> Self {
        let cells_y = (height as f32 / CELL_SIZE).ceil().max(1.0) as usize;
        let cells_x = (width as f32 / CELL_SIZE).ceil().max(1.0) as usize;
        Self {
            cell_size: CELL_SIZE,
            cells_y,
            cells_x,
            head: vec![-1; cells_y * cells_x],
            next: Vec::new(),
        }
    }

    #[inline]
    fn cell_of(&self, y: f32, x: f32) -> (i32, i32) {
        (
            ((y / self.cell_size).floor() as i32).clamp(0, self.cells_y as i32 - 1),
            ((x / self.cell_size).floor() as i32).clamp(0, self.cells_x as i32 - 1),
        )
    }

    /// Rebuild over the alive agents of `store`.
    pub fn rebuild(&mut self, store: &AgentStore) {
        self.head.fill(-1);
        self.next.clear();
        self.next.resize(store.len(), -1);

        for i in 0..store.len() {
            if !store.is_alive(i) {
                continue;
            }
            let (cy, cx) = self.cell_of(store.y[i], store.x[i]);
            let cell = cy as usize * self.cells_x + cx as usize;
            self.next[i] = self.head[cell];
            self.head[cell] = i as i32;
        }
    }

    /// All agent indices in the 3x3 block of cells containing `(y, x)`.
    pub fn neighbors(&self, y: f32, x: f32) -> Neighbors<'_> {
        let (cy, cx) = self.cell_of(y, x);
        Neighbors {
            index: self,
            cy,
            cx,
            block: 0,
            cursor: -1,
        }
    }
}

/// Iterator over the agents in a 3x3 cell block.
pub struct Neighbors<'a> {
    index: &'a SpatialIndex,
    cy: i32,
    cx: i32,
    /// Which of the nine block cells is being walked; 9 means done.
    block: u8,
    cursor: i32,
}

impl Iterator for Neighbors<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        loop {
            if self.cursor >= 0 {
                let agent = self.cursor as usize;
                self.cursor = self.index.next[agent];
                return Some(agent);
            }
            if self.block >= 9 {
                return None;
            }
            let dy = self.block as i32 / 3 - 1;
            let dx = self.block as i32 % 3 - 1;
            self.block += 1;

            let cy = self.cy + dy;
            let cx = self.cx + dx;
            if cy < 0
                || cx < 0
                || cy >= self.index.cells_y as i32
                || cx >= self.index.cells_x as i32
            {
                continue;
            }
            self.cursor = self.index.head[cy as usize * self.index.cells_x + cx as usize];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{Rng, SeedableRng};
    use rand_pcg::Pcg64Mcg;

    fn store_with(positions: &[(f32, f32, u8)]) -> AgentStore {
        let mut store = AgentStore::with_capacity(positions.len());
        for &(y, x, team) in positions {
            store.add(y, x, team, 0.0);
        }
        store
    }

    #[test]
    fn test_neighbors_within_block() {
        let store = store_with(&[(5.0, 5.0, 0), (15.0, 5.0, 0), (200.0, 200.0, 1)]);
        let mut index = SpatialIndex::new(240, 240);
        index.rebuild(&store);

        let mut near: Vec<usize> = index.neighbors(5.0, 5.0).collect();
        near.sort_unstable();
        assert_eq!(near, vec![0, 1]);

        let far: Vec<usize> = index.neighbors(200.0, 200.0).collect();
        assert_eq!(far, vec![2]);
    }

    #[test]
    fn test_rebuild_skips_dead_agents() {
        let mut store = store_with(&[(10.0, 10.0, 0), (12.0, 12.0, 1)]);
        store.kill(0);
        let mut index = SpatialIndex::new(64, 64);
        index.rebuild(&store);

        let found: Vec<usize> = index.neighbors(11.0, 11.0).collect();
        assert_eq!(found, vec![1]);
    }

    #[test]
    fn test_rebuild_clears_previous_tick() {
        let mut index = SpatialIndex::new(64, 64);
        let store = store_with(&[(10.0, 10.0, 0)]);
        index.rebuild(&store);
        assert_eq!(index.neighbors(10.0, 10.0).count(), 1);

        let moved = store_with(&[(50.0, 50.0, 0)]);
        index.rebuild(&moved);
        assert_eq!(index.neighbors(10.0, 10.0).count(), 0);
        assert_eq!(index.neighbors(50.0, 50.0).count(), 1);
    }

    /// Nearest-hostile through the index must agree with brute force for
    /// every query, for radii up to the cell size.
    #[test]
    fn test_nearest_hostile_matches_brute_force() {
        let mut rng = Pcg64Mcg::seed_from_u64(42);
        let (h, w) = (480usize, 540usize);
        let radius = 25.0f32;
        let radius_sq = radius * radius;

        let mut store = AgentStore::with_capacity(1000);
        for _ in 0..1000 {
            store.add(
                rng.gen_range(1.0..(h as f32 - 1.0)),
                rng.gen_range(1.0..(w as f32 - 1.0)),
                rng.gen_range(0..4u8),
                0.0,
            );
        }
        let mut index = SpatialIndex::new(h, w);
        index.rebuild(&store);

        for i in 0..store.len() {
            let (y, x, team) = (store.y[i], store.x[i], store.team[i]);

            let brute = (0..store.len())
                .filter(|&j| j != i && store.team[j] != team)
                .map(|j| {
                    let dy = store.y[j] - y;
                    let dx = store.x[j] - x;
                    (j, dy * dy + dx * dx)
                })
                .filter(|&(_, d2)| d2 <= radius_sq)
                .min_by(|a, b| a.1.total_cmp(&b.1));

            let indexed = index
                .neighbors(y, x)
                .filter(|&j| j != i && store.team[j] != team)
                .map(|j| {
                    let dy = store.y[j] - y;
                    let dx = store.x[j] - x;
                    (j, dy * dy + dx * dx)
                })
                .filter(|&(_, d2)| d2 <= radius_sq)
                .min_by(|a, b| a.1.total_cmp(&b.1));

            assert_eq!(
                brute.map(|(_, d2)| d2),
                indexed.map(|(_, d2)| d2),
                "query {i} disagrees with brute force"
            );
        }
    }
}
