//! Team roster and alliance grouping.
//!
//! Teams are a static table; every runtime structure that is "per team"
//! (pheromone fields, kill counts, parameter overrides) is indexed by the
//! `u8` team id. Alliances partition teams into groups: two agents are
//! hostile iff their alliance ids differ.

use serde::Serialize;

/// Hard upper bound on the team table; terrain ids reserve 16 slots.
pub const MAX_TEAMS: usize = 16;

/// A static team record: display name plus agent and trail colors.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Team {
    pub name: &'static str,
    pub color: [u8; 3],
    pub trail_color: [u8; 3],
}

/// The team roster. Team id is the index into this table.
pub const TEAMS: &[Team] = &[
    Team { name: "Azure", color: [50, 100, 255], trail_color: [20, 50, 180] },
    Team { name: "Crimson", color: [255, 50, 50], trail_color: [180, 20, 20] },
    Team { name: "Veridian", color: [50, 255, 100], trail_color: [20, 180, 50] },
    Team { name: "Gold", color: [255, 215, 0], trail_color: [200, 160, 0] },
    Team { name: "Amethyst", color: [153, 50, 204], trail_color: [110, 20, 160] },
    Team { name: "Amber", color: [255, 126, 0], trail_color: [200, 100, 0] },
    Team { name: "Jade", color: [0, 168, 107], trail_color: [0, 120, 80] },
    Team { name: "Sapphire", color: [15, 82, 186], trail_color: [10, 60, 140] },
    Team { name: "Rose", color: [255, 105, 180], trail_color: [200, 80, 140] },
    Team { name: "Onyx", color: [200, 200, 200], trail_color: [150, 150, 150] },
];

/// Number of teams in the roster.
pub fn team_count() -> usize {
    TEAMS.len()
}

/// Case-insensitive name lookup.
pub fn team_id_by_name(name: &str) -> Option<u8> {
    TEAMS
        .iter()
        .position(|t| t.name.eq_ignore_ascii_case(name))
        .map(|i| i as u8)
}

/// Assignment of each team to an alliance group.
///
/// Hostility is symmetric and never reflexive: a team is allied with
/// itself by construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllianceMap {
    groups: [u8; MAX_TEAMS],
}

impl AllianceMap {
    /// Every team in its own alliance.
    pub fn free_for_all() -> Self {
        let mut groups = [0u8; MAX_TEAMS];
        for (i, g) in groups.iter_mut().enumerate() {
            *g = i as u8;
        }
        Self { groups }
    }

    /// Even team ids against odd team ids.
    pub fn two_sided() -> Self {
        let mut groups = [0u8; MAX_TEAMS];
        for (i, g) in groups.iter_mut().enumerate() {
            *g = (i % 2) as u8;
        }
        Self { groups }
    }

    pub fn set(&mut self, team_id: u8, alliance_id: u8) {
        self.groups[team_id as usize] = alliance_id;
    }

    #[inline]
    pub fn alliance_of(&self, team_id: u8) -> u8 {
        self.groups[team_id as usize]
    }

    #[inline]
    pub fn hostile(&self, a: u8, b: u8) -> bool {
        self.groups[a as usize] != self.groups[b as usize]
    }
}

impl Default for AllianceMap {
    fn default() -> Self {
        Self::free_for_all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roster_fits_id_space() {
        assert!(team_count() <= MAX_TEAMS);
        assert_eq!(team_id_by_name("Azure"), Some(0));
        assert_eq!(team_id_by_name("crimson"), Some(1));
        assert_eq!(team_id_by_name("Chartreuse"), None);
    }

    #[test]
    fn test_hostility_is_symmetric_and_irreflexive() {
        let map = AllianceMap::two_sided();
        for a in 0..team_count() as u8 {
            assert!(!map.hostile(a, a), "a team is never hostile to itself");
            for b in 0..team_count() as u8 {
                assert_eq!(map.hostile(a, b), map.hostile(b, a));
                assert_eq!(
                    map.hostile(a, b),
                    map.alliance_of(a) != map.alliance_of(b)
                );
            }
        }
    }

    #[test]
    fn test_free_for_all_everyone_fights() {
        let map = AllianceMap::free_for_all();
        assert!(map.hostile(0, 1));
        assert!(map.hostile(3, 9));
        let mut map = map;
        map.set(3, 0);
        map.set(9, 0);
        assert!(!map.hostile(3, 9));
    }
}
