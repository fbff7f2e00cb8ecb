//! Serializable snapshot and event types.
//!
//! The engine never calls back into collaborators; between ticks they pull
//! a [`TickSnapshot`] and drain the [`TickEvents`] buffer. Everything here
//! serializes to JSON for clients in other processes.

use serde::{Deserialize, Serialize};

use crate::teams::TEAMS;

/// An agent died at a cell during combat or while biting armor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplosionEvent {
    pub y: i32,
    pub x: i32,
    pub team_id: u8,
}

/// One armor cell of a base was removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseDamageEvent {
    pub damaged_team_id: u8,
    pub attacker_team_id: u8,
}

/// Event buffer for a single tick, cleared at the start of the next one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TickEvents {
    pub explosions: Vec<ExplosionEvent>,
    pub base_damage: Vec<BaseDamageEvent>,
}

impl TickEvents {
    pub fn clear(&mut self) {
        self.explosions.clear();
        self.base_damage.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.explosions.is_empty() && self.base_damage.is_empty()
    }
}

/// Why the match ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WinReason {
    Elimination,
    Kills,
    Draw,
}

/// Terminal result; `team_id` is -1 for a draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WinnerInfo {
    pub team_id: i8,
    pub reason: WinReason,
}

/// Team display metadata embedded in snapshots so collaborators need no
/// side table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamInfo {
    pub name: String,
    pub color: [u8; 3],
    pub trail_color: [u8; 3],
}

/// Per-tick read-only view of the match state, indexed by team id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickSnapshot {
    pub tick: u64,
    pub agent_counts: Vec<u32>,
    pub base_health: Vec<u32>,
    pub kill_counts: Vec<u32>,
    pub dropped_spawns: u64,
    pub winner: Option<WinnerInfo>,
    pub teams: Vec<TeamInfo>,
}

impl TickSnapshot {
    /// The static roster rendered into owned records.
    pub fn roster() -> Vec<TeamInfo> {
        TEAMS
            .iter()
            .map(|t| TeamInfo {
                name: t.name.to_string(),
                color: t.color,
                trail_color: t.trail_color,
            })
            .collect()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(data: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_roundtrip() {
        let snapshot = TickSnapshot {
            tick: 42,
            agent_counts: vec![3, 0, 7],
            base_health: vec![120, 0, 88],
            kill_counts: vec![1, 0, 4],
            dropped_spawns: 2,
            winner: Some(WinnerInfo {
                team_id: 2,
                reason: WinReason::Elimination,
            }),
            teams: TickSnapshot::roster(),
        };

        let json = snapshot.to_json().unwrap();
        let restored = TickSnapshot::from_json(&json).unwrap();
        assert_eq!(restored.tick, 42);
        assert_eq!(restored.agent_counts, vec![3, 0, 7]);
        assert_eq!(restored.winner, snapshot.winner);
        assert_eq!(restored.teams.len(), TEAMS.len());
    }

    #[test]
    fn test_win_reason_wire_names() {
        let json = serde_json::to_string(&WinnerInfo {
            team_id: -1,
            reason: WinReason::Draw,
        })
        .unwrap();
        assert!(json.contains("\"draw\""));
        assert!(json.contains("-1"));

        let json = serde_json::to_string(&WinReason::Elimination).unwrap();
        assert_eq!(json, "\"elimination\"");
    }

    #[test]
    fn test_events_clear() {
        let mut events = TickEvents::default();
        events.explosions.push(ExplosionEvent { y: 10, x: 11, team_id: 0 });
        events.base_damage.push(BaseDamageEvent {
            damaged_team_id: 1,
            attacker_team_id: 0,
        });
        assert!(!events.is_empty());
        events.clear();
        assert!(events.is_empty());
    }
}
