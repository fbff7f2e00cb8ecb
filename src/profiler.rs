//! Per-phase tick timing.
//!
//! A lightweight timer over the fixed set of tick phases. Enable the
//! `profile` feature to have [`crate::Simulation`] record each phase of
//! every `step`; call `profile_summary` to print the breakdown.
//!
//! ```bash
//! cargo test --release --features profile -- --nocapture
//! ```

use std::time::{Duration, Instant};

/// The phases of one tick, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Geometry,
    Index,
    Resolver,
    Compact,
    Fields,
    Render,
    Spawning,
    Victory,
}

/// Number of phases; keep in sync with [`Phase::ALL`].
const PHASE_COUNT: usize = 8;

impl Phase {
    pub const ALL: [Phase; PHASE_COUNT] = [
        Phase::Geometry,
        Phase::Index,
        Phase::Resolver,
        Phase::Compact,
        Phase::Fields,
        Phase::Render,
        Phase::Spawning,
        Phase::Victory,
    ];

    fn name(self) -> &'static str {
        match self {
            Phase::Geometry => "geometry",
            Phase::Index => "index",
            Phase::Resolver => "resolver",
            Phase::Compact => "compact",
            Phase::Fields => "fields",
            Phase::Render => "render",
            Phase::Spawning => "spawning",
            Phase::Victory => "victory",
        }
    }
}

/// Accumulated timing for one phase.
#[derive(Debug, Clone, Copy, Default)]
pub struct PhaseStats {
    pub total: Duration,
    pub calls: u64,
    pub max: Duration,
}

impl PhaseStats {
    pub fn mean(&self) -> Duration {
        if self.calls == 0 {
            Duration::ZERO
        } else {
            self.total / self.calls as u32
        }
    }
}

/// Timer over the tick phases.
#[derive(Debug, Default)]
pub struct PhaseTimer {
    stats: [PhaseStats; PHASE_COUNT],
    open: Option<(Phase, Instant)>,
    ticks: u64,
}

impl PhaseTimer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start timing a phase; the previous open phase, if any, is closed.
    pub fn begin(&mut self, phase: Phase) {
        self.end();
        self.open = Some((phase, Instant::now()));
    }

    /// Close the open phase and record its duration.
    pub fn end(&mut self) {
        if let Some((phase, start)) = self.open.take() {
            let elapsed = start.elapsed();
            let stats = &mut self.stats[phase as usize];
            stats.total += elapsed;
            stats.calls += 1;
            stats.max = stats.max.max(elapsed);
        }
    }

    /// Mark the end of a tick.
    pub fn finish_tick(&mut self) {
        self.end();
        self.ticks += 1;
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn stats(&self, phase: Phase) -> PhaseStats {
        self.stats[phase as usize]
    }

    /// Print the per-phase breakdown, heaviest first.
    pub fn print_summary(&self) {
        let total: Duration = self.stats.iter().map(|s| s.total).sum();
        let mut rows: Vec<(Phase, PhaseStats)> = Phase::ALL
            .iter()
            .map(|&p| (p, self.stats[p as usize]))
            .collect();
        rows.sort_by(|a, b| b.1.total.cmp(&a.1.total));

        println!("\n=== Tick phases ({} ticks) ===", self.ticks);
        println!("{:<12} {:>12} {:>12} {:>12} {:>8}", "Phase", "Total", "Mean", "Max", "% Time");
        for (phase, stats) in rows {
            let pct = if total.as_nanos() > 0 {
                stats.total.as_nanos() as f64 / total.as_nanos() as f64 * 100.0
            } else {
                0.0
            };
            println!(
                "{:<12} {:>12.2?} {:>12.2?} {:>12.2?} {:>7.1}%",
                phase.name(),
                stats.total,
                stats.mean(),
                stats.max,
                pct
            );
        }
        if self.ticks > 0 {
            let per_tick = total / self.ticks as u32;
            println!("{:<12} {:>12.2?} per tick", "TOTAL", per_tick);
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn test_records_phase_durations() {
        let mut timer = PhaseTimer::new();
        timer.begin(Phase::Resolver);
        sleep(Duration::from_millis(5));
        timer.begin(Phase::Fields);
        sleep(Duration::from_millis(1));
        timer.finish_tick();

        assert_eq!(timer.ticks(), 1);
        let resolver = timer.stats(Phase::Resolver);
        assert_eq!(resolver.calls, 1);
        assert!(resolver.total >= Duration::from_millis(5));
        assert_eq!(timer.stats(Phase::Fields).calls, 1);
        assert_eq!(timer.stats(Phase::Spawning).calls, 0);
    }

    #[test]
    fn test_begin_closes_previous_phase() {
        let mut timer = PhaseTimer::new();
        for _ in 0..3 {
            timer.begin(Phase::Index);
            timer.begin(Phase::Compact);
            timer.finish_tick();
        }
        assert_eq!(timer.ticks(), 3);
        assert_eq!(timer.stats(Phase::Index).calls, 3);
        assert_eq!(timer.stats(Phase::Compact).calls, 3);

        timer.reset();
        assert_eq!(timer.ticks(), 0);
        assert_eq!(timer.stats(Phase::Index).calls, 0);
    }
}
