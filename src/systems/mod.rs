//! Tick-phase systems.
//!
//! The orchestrator in `simulation.rs` drives one synchronous `step` per
//! tick. Phases run in a fixed order; each one reads what earlier phases
//! produced and owns its own writes.
//!
//! | Phase | Reads | Writes |
//! |-------|-------|--------|
//! | terrain rebuild | bases | LogicGrid |
//! | occupancy rebuild | AgentStore | ObjectGrid |
//! | index rebuild | AgentStore | SpatialIndex |
//! | resolver (decide) | store, fields, index, LogicGrid | headings |
//! | resolver (apply) | headings | store, LogicGrid, ObjectGrid, events |
//! | compaction | store | store |
//! | armor sync | LogicGrid | bases |
//! | pheromones | store, bases | fields |
//! | render grid | fields, bases, store | render grid |
//! | spawning | bases | store |
//! | victory | bases, kill counts | winner info |
//!
//! ## Parallelism
//!
//! The resolver's decide phase and the per-team field updates are
//! data-parallel and fan out with rayon under the `parallel` feature.
//! Everything else is serial. The apply phase stays serial in both
//! builds; together with per-(tick, agent) PRNG streams this keeps the
//! parallel build bit-identical to the serial reference (see
//! `resolver.rs`).

pub mod resolver;
pub mod steering;

pub use resolver::{ApplyCtx, DecideCtx, TeamParams};
pub use steering::{steer, SteeringParams, FORWARD_BIAS};
