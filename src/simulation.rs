//! The simulation orchestrator.
//!
//! [`Simulation`] owns every piece of world state — grids, pheromone
//! fields, the agent pool, bases, event buffers — and advances it with a
//! synchronous [`Simulation::step`]. Collaborators (dashboards, encoders,
//! editors) never get called back; between ticks they pull a snapshot and
//! drain the event buffer.
//!
//! ## Tick order
//!
//! 1. Rebuild the terrain grid from bases (cores drawn over armor, so a
//!    cell inside any base's core keeps that core id — the fusion rule).
//! 2. Rebuild the occupancy grid from live agents (later index wins ties).
//! 3. Rebuild the spatial index.
//! 4. Run the resolver kernel (decide + apply).
//! 5. Compact the agent pool.
//! 6. Sync each base's armor set against the post-combat grid.
//! 7. Deposit, then decay/diffuse, every pheromone field; pump the exit
//!    ports and zero scent under base pixels.
//! 8. Redraw the render grid (trails, bases, agents).
//! 9. Run base spawners.
//! 10. Evaluate terminal conditions, at most once.
//!
//! ## Determinism
//!
//! With a fixed seed, config, and scene, runs are reproducible: all
//! randomness flows from the seed (a master stream for spawning, derived
//! per-(tick, agent) streams in the resolver), and agents are processed
//! in stable index order.

use rand_pcg::Pcg64Mcg;
use rand::SeedableRng;
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use tracing::info;

use crate::agents::AgentStore;
use crate::base::Base;
use crate::config::{ConfigError, EngineConfig, Param, TeamOverrides};
use crate::grid::{self, LogicGrid, ObjectGrid, SOLDIER_OFFSET};
use crate::pheromone::PheromoneField;
use crate::profiler::Phase;
use crate::scene::{self, SceneLayout};
use crate::spatial::SpatialIndex;
use crate::systems::resolver::{self, ApplyCtx, DecideCtx, TeamParams};
use crate::systems::steering::SteeringParams;
use crate::teams::{team_count, AllianceMap};
use crate::world::{TickEvents, TickSnapshot, WinReason, WinnerInfo};

/// Raw pheromone level above which a trail shows on the render grid.
const TRAIL_THRESHOLD: f32 = 0.1;

/// The complete engine state.
pub struct Simulation {
    config: EngineConfig,
    overrides: TeamOverrides,
    alliances: AllianceMap,
    tick: u64,
    logic: LogicGrid,
    objects: ObjectGrid,
    render: LogicGrid,
    fields: Vec<PheromoneField>,
    index: SpatialIndex,
    store: AgentStore,
    bases: Vec<Base>,
    events: TickEvents,
    kill_counts: Vec<u32>,
    ai_evaluations: u64,
    winner: Option<WinnerInfo>,
    spawn_rng: Pcg64Mcg,
    #[cfg(feature = "profile")]
    timer: crate::profiler::PhaseTimer,
}

impl Simulation {
    /// Build an engine from a validated config and an injected scene.
    pub fn new(config: EngineConfig, layout: &SceneLayout) -> Result<Self, ConfigError> {
        config.validate()?;
        let (height, width) = (config.grid_height, config.grid_width);
        let teams = team_count();
        Ok(Self {
            spawn_rng: Pcg64Mcg::seed_from_u64(config.seed),
            overrides: TeamOverrides::new(),
            alliances: AllianceMap::default(),
            tick: 0,
            logic: LogicGrid::new(height, width),
            objects: ObjectGrid::new(height, width),
            render: LogicGrid::new(height, width),
            fields: vec![PheromoneField::new(height, width); teams],
            index: SpatialIndex::new(height, width),
            store: AgentStore::with_capacity(config.max_agents),
            bases: scene::build_bases(layout),
            events: TickEvents::default(),
            kill_counts: vec![0; teams],
            ai_evaluations: 0,
            winner: None,
            #[cfg(feature = "profile")]
            timer: crate::profiler::PhaseTimer::new(),
            config,
        })
    }

    /// The default duel on the default grid.
    pub fn new_duel(config: EngineConfig) -> Result<Self, ConfigError> {
        let layout = SceneLayout::duel(config.grid_height, config.grid_width);
        Self::new(config, &layout)
    }

    // ------------------------------------------------------------------
    // Configuration surface
    // ------------------------------------------------------------------

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// A parameter for one team: override first, then global.
    pub fn get_param(&self, team_id: u8, key: Param) -> f32 {
        self.overrides
            .get(team_id, key)
            .unwrap_or_else(|| self.config.global(key))
    }

    pub fn set_override(&mut self, team_id: u8, key: Param, value: f32) {
        self.overrides.set(team_id, key, value);
    }

    pub fn clear_override(&mut self, team_id: u8, key: Param) {
        self.overrides.remove(team_id, key);
    }

    pub fn alliance_map(&self) -> &AllianceMap {
        &self.alliances
    }

    pub fn set_alliance_map(&mut self, map: AllianceMap) {
        self.alliances = map;
    }

    // ------------------------------------------------------------------
    // Snapshot surface (between ticks)
    // ------------------------------------------------------------------

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn agent_count(&self) -> usize {
        self.store.len()
    }

    pub fn agent_count_by_team(&self, team_id: u8) -> usize {
        self.store.count_by_team(team_id)
    }

    /// Remaining armor cells across the team's bases.
    pub fn base_health_by_team(&self, team_id: u8) -> usize {
        self.bases
            .iter()
            .filter(|b| b.team_id == team_id)
            .map(|b| b.armor_pixels.len())
            .sum()
    }

    pub fn kill_counts(&self) -> &[u32] {
        &self.kill_counts
    }

    pub fn winner_info(&self) -> Option<WinnerInfo> {
        self.winner
    }

    pub fn dropped_spawns(&self) -> u64 {
        self.store.dropped_spawns()
    }

    /// Total target-acquisition evaluations so far (the stratified-AI
    /// cost metric).
    pub fn ai_evaluations(&self) -> u64 {
        self.ai_evaluations
    }

    pub fn logic_grid(&self) -> &LogicGrid {
        &self.logic
    }

    pub fn render_grid(&self) -> &LogicGrid {
        &self.render
    }

    pub fn bases(&self) -> &[Base] {
        &self.bases
    }

    pub fn pheromone_field(&self, team_id: u8) -> &PheromoneField {
        &self.fields[team_id as usize]
    }

    /// Normalized view of one team's trails.
    pub fn pheromone_view(&self, team_id: u8) -> Vec<f32> {
        self.fields[team_id as usize].render_view()
    }

    /// Take this tick's events; the buffer is also cleared at the start
    /// of the next step.
    pub fn drain_events(&mut self) -> TickEvents {
        std::mem::take(&mut self.events)
    }

    pub fn snapshot(&self) -> TickSnapshot {
        let teams = team_count() as u8;
        TickSnapshot {
            tick: self.tick,
            agent_counts: (0..teams)
                .map(|t| self.agent_count_by_team(t) as u32)
                .collect(),
            base_health: (0..teams)
                .map(|t| self.base_health_by_team(t) as u32)
                .collect(),
            kill_counts: self.kill_counts.clone(),
            dropped_spawns: self.dropped_spawns(),
            winner: self.winner,
            teams: TickSnapshot::roster(),
        }
    }

    /// Add one agent directly; used for scripted scenarios and tests.
    pub fn spawn_agent(&mut self, y: f32, x: f32, team_id: u8, heading: f32) -> bool {
        self.store.add(y, x, team_id, heading)
    }

    // ------------------------------------------------------------------
    // The tick
    // ------------------------------------------------------------------

    /// Advance the world by one tick.
    pub fn step(&mut self) {
        self.events.clear();

        self.mark(Phase::Geometry);
        self.rebuild_terrain();
        self.rebuild_occupancy();

        self.mark(Phase::Index);
        self.index.rebuild(&self.store);

        self.mark(Phase::Resolver);
        let team_params = self.resolve_team_params();
        let (headings, ai_runs) = resolver::decide_headings(&DecideCtx {
            store: &self.store,
            fields: &self.fields,
            index: &self.index,
            logic: &self.logic,
            alliances: &self.alliances,
            params: &team_params,
            seed: self.config.seed,
            tick: self.tick,
        });
        self.ai_evaluations += ai_runs;
        resolver::apply_motion(
            &mut ApplyCtx {
                store: &mut self.store,
                logic: &mut self.logic,
                objects: &mut self.objects,
                alliances: &self.alliances,
                params: &team_params,
                events: &mut self.events,
                kill_counts: &mut self.kill_counts,
                seed: self.config.seed,
                tick: self.tick,
            },
            &headings,
        );

        self.mark(Phase::Compact);
        self.store.compact();
        self.sync_armor();

        self.mark(Phase::Fields);
        self.update_pheromones();

        self.mark(Phase::Render);
        self.redraw_render_grid();

        self.mark(Phase::Spawning);
        self.run_spawners();

        self.mark(Phase::Victory);
        self.tick += 1;
        if self.winner.is_none() {
            self.evaluate_victory();
        }
        self.finish_timing();
    }

    /// Step once and return the wall-clock cost, for stress tests.
    #[cfg(any(test, feature = "profile"))]
    pub fn step_profiled(&mut self) -> std::time::Duration {
        let start = std::time::Instant::now();
        self.step();
        start.elapsed()
    }

    /// Print the per-phase timing breakdown.
    #[cfg(feature = "profile")]
    pub fn profile_summary(&self) {
        self.timer.print_summary();
    }

    #[inline]
    fn mark(&mut self, _phase: Phase) {
        #[cfg(feature = "profile")]
        self.timer.begin(_phase);
    }

    #[inline]
    fn finish_timing(&mut self) {
        #[cfg(feature = "profile")]
        self.timer.finish_tick();
    }

    /// Phase 1: terrain from bases. All armor first, then all cores, so
    /// no base's armor can overwrite another base's core.
    fn rebuild_terrain(&mut self) {
        self.logic.clear();
        for base in &self.bases {
            let id = grid::armor_id(base.team_id);
            for &(y, x) in &base.armor_pixels {
                self.logic.set(y, x, id);
            }
        }
        for base in &self.bases {
            let id = grid::core_id(base.team_id);
            for &(y, x) in &base.core_pixels {
                self.logic.set(y, x, id);
            }
        }
    }

    /// Phase 2: occupancy from live agents, ascending index order.
    fn rebuild_occupancy(&mut self) {
        self.objects.clear();
        for i in 0..self.store.len() {
            if self.store.is_alive(i) {
                let cy = self.store.y[i].floor() as i32;
                let cx = self.store.x[i].floor() as i32;
                self.objects.set(cy, cx, i as i32);
            }
        }
    }

    fn resolve_team_params(&self) -> Vec<TeamParams> {
        (0..team_count() as u8)
            .map(|t| TeamParams {
                steering: SteeringParams {
                    sensor_angle: self.get_param(t, Param::SensorAngleDegrees).to_radians(),
                    rotation_angle: self.get_param(t, Param::RotationAngleDegrees).to_radians(),
                    sensor_distance: self.get_param(t, Param::SensorDistance),
                },
                combat_chance: self.get_param(t, Param::CombatChance),
                enemy_sense_radius: self.get_param(t, Param::EnemySenseRadius),
                base_attack_radius: self.get_param(t, Param::BaseAttackRadius),
                ai_interval: self.get_param(t, Param::AiUpdateInterval).max(1.0) as u64,
            })
            .collect()
    }

    /// Phase 6: drop armor cells that no longer match their id in the
    /// post-combat grid.
    fn sync_armor(&mut self) {
        let logic = &self.logic;
        let tick = self.tick;
        for base in &mut self.bases {
            let id = grid::armor_id(base.team_id);
            let before = base.armor_pixels.len();
            base.armor_pixels.retain(|&(y, x)| logic.get(y, x) == id);
            if base.armor_pixels.len() != before {
                base.last_damage_tick = tick;
            }
        }
    }

    /// Phase 7: deposits, decay/diffusion, port pump, base scent mask.
    fn update_pheromones(&mut self) {
        let teams = team_count();

        let mut positions: Vec<Vec<(f32, f32)>> = vec![Vec::new(); teams];
        for i in 0..self.store.len() {
            positions[self.store.team[i] as usize].push((self.store.y[i], self.store.x[i]));
        }
        for (t, team_positions) in positions.into_iter().enumerate() {
            if !team_positions.is_empty() {
                let amount = self.get_param(t as u8, Param::PheromoneDepositAmount);
                self.fields[t].deposit(team_positions, amount);
            }
        }

        let rates: Vec<(f32, f32)> = (0..teams as u8)
            .map(|t| {
                (
                    self.get_param(t, Param::PheromoneDecayRate),
                    self.get_param(t, Param::PheromoneBlurSigma),
                )
            })
            .collect();
        let tick = self.tick;

        #[cfg(feature = "parallel")]
        self.fields
            .par_iter_mut()
            .enumerate()
            .for_each(|(t, field)| field.update(tick, rates[t].0, rates[t].1));

        #[cfg(not(feature = "parallel"))]
        for (t, field) in self.fields.iter_mut().enumerate() {
            field.update(tick, rates[t].0, rates[t].1);
        }

        // Living bases pump scent at their ports so trails lead home;
        // scent under any base pixel is wiped so bases never become traps.
        let fields = &mut self.fields;
        let pump = self.config.base_pump_amount;
        for base in &self.bases {
            if base.is_dead() {
                continue;
            }
            let field = &mut fields[base.team_id as usize];
            for (y, x) in base.exit_ports() {
                field.set(y, x, pump);
            }
        }
        for base in &self.bases {
            for (y, x) in base.all_pixels() {
                for field in fields.iter_mut() {
                    field.set(y, x, 0.0);
                }
            }
        }
    }

    /// Phase 8: trails under bases under agents, fusion rule as in the
    /// terrain rebuild.
    fn redraw_render_grid(&mut self) {
        let render = &mut self.render;
        render.clear();

        for (t, field) in self.fields.iter().enumerate() {
            let id = grid::armor_id(t as u8);
            let width = field.width();
            for (cell, &v) in field.grid().iter().enumerate() {
                if v > TRAIL_THRESHOLD {
                    render.set((cell / width) as i32, (cell % width) as i32, id);
                }
            }
        }
        for base in &self.bases {
            let id = grid::armor_id(base.team_id);
            for &(y, x) in &base.armor_pixels {
                render.set(y, x, id);
            }
        }
        for base in &self.bases {
            let id = grid::core_id(base.team_id);
            for &(y, x) in &base.core_pixels {
                render.set(y, x, id);
            }
        }
        for i in 0..self.store.len() {
            if self.store.is_alive(i) {
                let cy = self.store.y[i].floor() as i32;
                let cx = self.store.x[i].floor() as i32;
                render.set(cy, cx, SOLDIER_OFFSET + self.store.team[i]);
            }
        }
    }

    /// Phase 9: base spawners.
    fn run_spawners(&mut self) {
        let spawn_params: Vec<(u32, u32)> = (0..team_count() as u8)
            .map(|t| {
                (
                    self.get_param(t, Param::SpawnRate).max(1.0) as u32,
                    self.get_param(t, Param::UnitsPerSpawn).max(0.0) as u32,
                )
            })
            .collect();

        let store = &mut self.store;
        let rng = &mut self.spawn_rng;
        let (height, width) = (self.config.grid_height, self.config.grid_width);
        for base in &mut self.bases {
            let (rate, units) = spawn_params[base.team_id as usize];
            base.update_spawning(store, height, width, rate, units, rng);
        }
    }

    /// Phase 10: terminal conditions.
    fn evaluate_victory(&mut self) {
        let teams = team_count();

        let mut participates = vec![false; teams];
        let mut armor_total = vec![0usize; teams];
        for base in &self.bases {
            if base.is_inert() {
                continue;
            }
            participates[base.team_id as usize] = true;
            armor_total[base.team_id as usize] += base.armor_pixels.len();
        }

        let participating: std::collections::BTreeSet<u8> = (0..teams)
            .filter(|&t| participates[t])
            .map(|t| self.alliances.alliance_of(t as u8))
            .collect();
        if participating.len() >= 2 {
            let live: std::collections::BTreeSet<u8> = (0..teams)
                .filter(|&t| participates[t] && armor_total[t] > 0)
                .map(|t| self.alliances.alliance_of(t as u8))
                .collect();
            if live.len() == 1 {
                let alliance = *live.iter().next().unwrap();
                let winner = (0..teams)
                    .filter(|&t| {
                        participates[t]
                            && armor_total[t] > 0
                            && self.alliances.alliance_of(t as u8) == alliance
                    })
                    .max_by_key(|&t| (self.kill_counts[t], std::cmp::Reverse(t)));
                if let Some(team) = winner {
                    self.set_winner(team as i8, WinReason::Elimination);
                }
                return;
            }
            if live.is_empty() {
                self.set_winner(-1, WinReason::Draw);
                return;
            }
        }

        if self.tick >= self.config.total_frames {
            let best = self.kill_counts.iter().copied().max().unwrap_or(0);
            let leaders: Vec<usize> = (0..teams)
                .filter(|&t| self.kill_counts[t] == best)
                .collect();
            if leaders.len() == 1 {
                self.set_winner(leaders[0] as i8, WinReason::Kills);
            } else {
                self.set_winner(-1, WinReason::Draw);
            }
        }
    }

    fn set_winner(&mut self, team_id: i8, reason: WinReason) {
        info!(team_id, ?reason, tick = self.tick, "terminal condition reached");
        self.winner = Some(WinnerInfo { team_id, reason });
    }
}
