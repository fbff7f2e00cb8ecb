//! Engine configuration and per-team parameter overrides.
//!
//! All tunables are read at construction from an injected [`EngineConfig`]
//! (typically deserialized from JSON by the embedding application). Any of
//! the [`Param`] keys may additionally be overridden per team at runtime;
//! lookups consult the override table first and fall back to the global
//! value.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::teams::MAX_TEAMS;

/// Construction-time configuration failures.
///
/// Per-tick anomalies (dropped spawns, inert bases) are metrics, not
/// errors; only an out-of-range value injected at construction is
/// surfaced to the caller.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config value out of range: {key} = {value}")]
    OutOfRange { key: &'static str, value: f32 },
}

/// The closed set of numeric parameters that may be overridden per team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Param {
    SensorAngleDegrees,
    SensorDistance,
    RotationAngleDegrees,
    CombatChance,
    PheromoneDecayRate,
    PheromoneBlurSigma,
    PheromoneDepositAmount,
    EnemySenseRadius,
    BaseAttackRadius,
    AiUpdateInterval,
    SpawnRate,
    UnitsPerSpawn,
}

/// Global engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Grid height in cells.
    pub grid_height: usize,
    /// Grid width in cells.
    pub grid_width: usize,
    /// Agent pool capacity; spawns beyond it are dropped and counted.
    pub max_agents: usize,
    /// PRNG seed. Same seed, same scene, same config: same run.
    pub seed: u64,

    /// Sensor cone half-angle in degrees.
    pub sensor_angle_degrees: f32,
    /// Distance from the agent to its three sensor points, in cells.
    pub sensor_distance: f32,
    /// Rotation step in degrees when steering toward a side sensor.
    pub rotation_angle_degrees: f32,
    /// Bernoulli probability for each of the two combat trials.
    pub combat_chance: f32,
    /// Multiplicative pheromone decay factor, in (0, 1].
    pub pheromone_decay_rate: f32,
    /// Gaussian blur sigma for pheromone diffusion; 0 disables the blur.
    pub pheromone_blur_sigma: f32,
    /// Pheromone deposited by each living agent per tick.
    pub pheromone_deposit_amount: f32,
    /// Pheromone level written at base exit ports after each field update.
    pub base_pump_amount: f32,
    /// Radius for hostile-agent acquisition, in cells.
    pub enemy_sense_radius: f32,
    /// Radius of the bounded scan for hostile armor, in cells.
    pub base_attack_radius: f32,
    /// Target acquisition runs for each agent once every this many ticks.
    pub ai_update_interval: u32,
    /// Ticks between spawn waves at each base.
    pub spawn_rate: u32,
    /// Agents created per spawn wave.
    pub units_per_spawn: u32,
    /// Tick at which the terminal timer fires.
    pub total_frames: u64,
    /// Frame cadence of the embedding renderer; carried for collaborators.
    pub fps: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            grid_height: 480,
            grid_width: 540,
            max_agents: 10_000,
            seed: 0,
            sensor_angle_degrees: 30.0,
            sensor_distance: 9.0,
            rotation_angle_degrees: 30.0,
            combat_chance: 0.5,
            pheromone_decay_rate: 0.97,
            pheromone_blur_sigma: 0.6,
            pheromone_deposit_amount: 100.0,
            base_pump_amount: 100.0,
            enemy_sense_radius: 25.0,
            base_attack_radius: 30.0,
            ai_update_interval: 5,
            spawn_rate: 20,
            units_per_spawn: 3,
            total_frames: 1800,
            fps: 30,
        }
    }
}

impl EngineConfig {
    /// Range-check every numeric option.
    pub fn validate(&self) -> Result<(), ConfigError> {
        fn check(ok: bool, key: &'static str, value: f32) -> Result<(), ConfigError> {
            if ok {
                Ok(())
            } else {
                Err(ConfigError::OutOfRange { key, value })
            }
        }

        check(self.grid_height >= 8, "grid_height", self.grid_height as f32)?;
        check(self.grid_width >= 8, "grid_width", self.grid_width as f32)?;
        check(self.max_agents >= 1, "max_agents", self.max_agents as f32)?;
        check(
            self.pheromone_decay_rate > 0.0 && self.pheromone_decay_rate <= 1.0,
            "pheromone_decay_rate",
            self.pheromone_decay_rate,
        )?;
        check(
            self.pheromone_blur_sigma >= 0.0,
            "pheromone_blur_sigma",
            self.pheromone_blur_sigma,
        )?;
        check(
            (0.0..=1.0).contains(&self.combat_chance),
            "combat_chance",
            self.combat_chance,
        )?;
        check(self.sensor_distance >= 0.0, "sensor_distance", self.sensor_distance)?;
        check(
            self.enemy_sense_radius >= 0.0,
            "enemy_sense_radius",
            self.enemy_sense_radius,
        )?;
        check(
            self.base_attack_radius >= 0.0,
            "base_attack_radius",
            self.base_attack_radius,
        )?;
        check(
            self.ai_update_interval >= 1,
            "ai_update_interval",
            self.ai_update_interval as f32,
        )?;
        check(self.spawn_rate >= 1, "spawn_rate", self.spawn_rate as f32)?;
        Ok(())
    }

    /// The global value of an overridable parameter.
    pub fn global(&self, key: Param) -> f32 {
        match key {
            Param::SensorAngleDegrees => self.sensor_angle_degrees,
            Param::SensorDistance => self.sensor_distance,
            Param::RotationAngleDegrees => self.rotation_angle_degrees,
            Param::CombatChance => self.combat_chance,
            Param::PheromoneDecayRate => self.pheromone_decay_rate,
            Param::PheromoneBlurSigma => self.pheromone_blur_sigma,
            Param::PheromoneDepositAmount => self.pheromone_deposit_amount,
            Param::EnemySenseRadius => self.enemy_sense_radius,
            Param::BaseAttackRadius => self.base_attack_radius,
            Param::AiUpdateInterval => self.ai_update_interval as f32,
            Param::SpawnRate => self.spawn_rate as f32,
            Param::UnitsPerSpawn => self.units_per_spawn as f32,
        }
    }
}

/// Runtime per-team parameter overrides.
#[derive(Debug, Clone)]
pub struct TeamOverrides {
    maps: Vec<HashMap<Param, f32>>,
}

impl TeamOverrides {
    pub fn new() -> Self {
        Self {
            maps: vec![HashMap::new(); MAX_TEAMS],
        }
    }

    pub fn set(&mut self, team_id: u8, key: Param, value: f32) {
        self.maps[team_id as usize].insert(key, value);
    }

    pub fn remove(&mut self, team_id: u8, key: Param) {
        self.maps[team_id as usize].remove(&key);
    }

    pub fn get(&self, team_id: u8, key: Param) -> Option<f32> {
        self.maps[team_id as usize].get(&key).copied()
    }
}

impl Default for TeamOverrides {
    fn default() -> Self {
        Self::new()
    }
}
