//! Injected scene layouts.
//!
//! A scene is a list of base records keyed by team name, with exit ports
//! given as absolute pixel positions. Ingest resolves names against the
//! roster (unknown names fall back to team 0, logged once per name) and
//! converts ports to pivot-relative offsets; encoding converts them back,
//! so a layout round-trips exactly at the same pivot.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::base::{Base, ShapeKind};
use crate::teams::{team_id_by_name, TEAMS};

fn default_scale() -> f32 {
    1.0
}

fn default_thickness() -> i32 {
    1
}

/// One base in the injected layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseRecord {
    pub team_name: String,
    pub shape_name: ShapeKind,
    /// `(y, x)` stamp position.
    pub pivot: [i32; 2],
    #[serde(default = "default_scale")]
    pub scale: f32,
    #[serde(default = "default_thickness")]
    pub core_thickness: i32,
    #[serde(default = "default_thickness")]
    pub armor_thickness: i32,
    /// Absolute `(y, x)` pixel positions; empty means the shape's
    /// template-derived default ports.
    #[serde(default)]
    pub exit_ports: Vec<[i32; 2]>,
}

/// An injected scene: the complete list of bases.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SceneLayout {
    pub bases: Vec<BaseRecord>,
}

impl SceneLayout {
    /// The stock duel: a Y base on the west edge against an N base on the
    /// east edge, mid-height, scale 3.
    pub fn duel(grid_height: usize, grid_width: usize) -> Self {
        let mid = grid_height as i32 / 2;
        Self {
            bases: vec![
                BaseRecord {
                    team_name: TEAMS[0].name.to_string(),
                    shape_name: ShapeKind::Y,
                    pivot: [mid, 60],
                    scale: 3.0,
                    core_thickness: 1,
                    armor_thickness: 1,
                    exit_ports: Vec::new(),
                },
                BaseRecord {
                    team_name: TEAMS[1].name.to_string(),
                    shape_name: ShapeKind::N,
                    pivot: [mid, grid_width as i32 - 60],
                    scale: 3.0,
                    core_thickness: 1,
                    armor_thickness: 1,
                    exit_ports: Vec::new(),
                },
            ],
        }
    }

    pub fn from_json(data: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(data)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Build bases from a layout. Unknown team names fall back to team 0;
/// each offending name is logged once.
pub fn build_bases(scene: &SceneLayout) -> Vec<Base> {
    let mut warned: HashSet<&str> = HashSet::new();
    scene
        .bases
        .iter()
        .map(|record| {
            let team_id = team_id_by_name(&record.team_name).unwrap_or_else(|| {
                if warned.insert(record.team_name.as_str()) {
                    warn!(
                        team_name = %record.team_name,
                        "unknown team name in scene layout; assigning team 0"
                    );
                }
                0
            });

            let pivot = (record.pivot[0], record.pivot[1]);
            let relative_ports: Vec<(i32, i32)> = if record.exit_ports.is_empty() {
                record.shape_name.default_ports(record.scale)
            } else {
                record
                    .exit_ports
                    .iter()
                    .map(|p| (p[0] - pivot.0, p[1] - pivot.1))
                    .collect()
            };

            Base::new(
                team_id,
                record.shape_name,
                pivot,
                record.scale,
                record.core_thickness,
                record.armor_thickness,
                relative_ports,
            )
        })
        .collect()
}

/// Encode live bases back into a layout with absolute exit ports.
pub fn encode_scene(bases: &[Base]) -> SceneLayout {
    SceneLayout {
        bases: bases
            .iter()
            .map(|base| BaseRecord {
                team_name: TEAMS[base.team_id as usize].name.to_string(),
                shape_name: base.shape,
                pivot: [base.pivot.0, base.pivot.1],
                scale: base.scale,
                core_thickness: base.core_thickness,
                armor_thickness: base.armor_thickness,
                exit_ports: base.exit_ports().map(|(y, x)| [y, x]).collect(),
            })
            .collect(),
    }
}
