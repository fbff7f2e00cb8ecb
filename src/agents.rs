//! Structure-of-arrays agent pool.
//!
//! Agents live in parallel arrays indexed by a dense `usize` id. Indices
//! `0..len()` hold live plus recently-dead entries; end-of-tick compaction
//! moves the survivors back to the prefix. Compaction is stable so that
//! per-agent modular scheduling (`tick % ai_interval == i % ai_interval`)
//! stays meaningful from tick to tick, and so that the occupancy grid's
//! stored indices remain valid for exactly one tick.

/// Health assigned to a freshly spawned agent.
pub const SPAWN_HEALTH: i32 = 100;

/// Agent pool: position `(y, x)`, heading in radians, team id, health.
/// `health > 0` is alive; `health <= 0` is scheduled for compaction.
#[derive(Debug, Clone)]
pub struct AgentStore {
    capacity: usize,
    pub y: Vec<f32>,
    pub x: Vec<f32>,
    pub heading: Vec<f32>,
    pub team: Vec<u8>,
    pub health: Vec<i32>,
    dropped_spawns: u64,
}

impl AgentStore {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            y: Vec::with_capacity(capacity),
            x: Vec::with_capacity(capacity),
            heading: Vec::with_capacity(capacity),
            team: Vec::with_capacity(capacity),
            health: Vec::with_capacity(capacity),
            dropped_spawns: 0,
        }
    }

    /// Number of entries in the live prefix (live + this tick's dead).
    #[inline]
    pub fn len(&self) -> usize {
        self.y.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Spawns dropped because the pool was full.
    pub fn dropped_spawns(&self) -> u64 {
        self.dropped_spawns
    }

    #[inline]
    pub fn is_alive(&self, i: usize) -> bool {
        self.health[i] > 0
    }

    /// Append an agent, or drop it (counted) when the pool is full.
    pub fn add(&mut self, y: f32, x: f32, team_id: u8, heading: f32) -> bool {
        if self.len() >= self.capacity {
            self.dropped_spawns += 1;
            return false;
        }
        self.y.push(y);
        self.x.push(x);
        self.heading.push(heading);
        self.team.push(team_id);
        self.health.push(SPAWN_HEALTH);
        true
    }

    /// Schedule an agent for removal at the next compaction.
    #[inline]
    pub fn kill(&mut self, i: usize) {
        self.health[i] = 0;
    }

    /// Stable in-place filter keeping entries with `health > 0`.
    pub fn compact(&mut self) {
        let mut write = 0;
        for read in 0..self.len() {
            if self.health[read] > 0 {
                if write != read {
                    self.y[write] = self.y[read];
                    self.x[write] = self.x[read];
                    self.heading[write] = self.heading[read];
                    self.team[write] = self.team[read];
                    self.health[write] = self.health[read];
                }
                write += 1;
            }
        }
        self.y.truncate(write);
        self.x.truncate(write);
        self.heading.truncate(write);
        self.team.truncate(write);
        self.health.truncate(write);
    }

    /// Live agents on the given team.
    pub fn count_by_team(&self, team_id: u8) -> usize {
        (0..self.len())
            .filter(|&i| self.team[i] == team_id && self.health[i] > 0)
            .count()
    }
}
