//! plasm_sim - Slime-Mold Battle Simulation Core
//!
//! A deterministic-per-seed tick engine in which teams of slime-mold
//! agents forage over a shared grid, follow team-colored pheromone
//! trails, fight stochastic battles, and chew through the armor of
//! hostile bases. Rendering, audio, and editing live in external
//! collaborators that consume the snapshot and event APIs between ticks.

pub mod agents;
pub mod base;
pub mod config;
pub mod grid;
pub mod pheromone;
pub mod profiler;
pub mod scene;
pub mod simulation;
pub mod spatial;
pub mod systems;
pub mod teams;
pub mod world;

pub use agents::AgentStore;
pub use base::{Base, GeometryPass, ShapeKind};
pub use config::{ConfigError, EngineConfig, Param};
pub use pheromone::PheromoneField;
pub use scene::{BaseRecord, SceneLayout};
pub use simulation::Simulation;
pub use spatial::SpatialIndex;
pub use teams::{AllianceMap, Team, TEAMS};
pub use world::{BaseDamageEvent, ExplosionEvent, TickEvents, TickSnapshot, WinReason, WinnerInfo};
