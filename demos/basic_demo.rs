//! Basic demonstration of the slime-mold battle engine.
//!
//! Run with: cargo run --example basic_demo

use plasm_sim::{AllianceMap, EngineConfig, Simulation};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    println!("=== plasm_sim - duel demo ===\n");

    let mut config = EngineConfig::default();
    config.seed = 7;
    let mut sim = Simulation::new_duel(config).expect("valid default config");
    sim.set_alliance_map(AllianceMap::two_sided());

    for _ in 0..600 {
        sim.step();
        let events = sim.drain_events();

        if sim.tick() % 60 == 0 {
            let snapshot = sim.snapshot();
            println!(
                "tick {:>4}  agents {:>3}/{:>3}  armor {:>3}/{:>3}  kills {:?}",
                snapshot.tick,
                snapshot.agent_counts[0],
                snapshot.agent_counts[1],
                snapshot.base_health[0],
                snapshot.base_health[1],
                &snapshot.kill_counts[..2],
            );
        }
        if !events.base_damage.is_empty() {
            println!(
                "tick {:>4}  {} armor cells bitten",
                sim.tick(),
                events.base_damage.len()
            );
        }
        if let Some(winner) = sim.winner_info() {
            println!("\nwinner: team {} by {:?}", winner.team_id, winner.reason);
            break;
        }
    }

    println!("\n=== final snapshot ===\n");
    println!("{}", sim.snapshot().to_json_pretty().unwrap());
}
