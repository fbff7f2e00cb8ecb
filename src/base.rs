//! Bases: shape-templated static obstacles that spawn agents.
//!
//! A base is stamped from a scaled shape template at a pivot cell. Line
//! templates (Y, N) rasterize each segment with Bresenham steps; polygon
//! templates (Arrowhead, Box) rasterize the filled outline. The raster is
//! thickened into the indestructible core, and the destructible armor is
//! the morphological dilation of the core (square element) minus the core.
//! The rim is the set of base pixels with at least one 4-neighbor outside
//! the base.
//!
//! Geometry runs in two passes: `Preview` computes the core only (cheap
//! enough for interactive dragging), `Final` adds armor and rim. Editor
//! drags run previews and finish with one final pass on release.

use std::collections::BTreeSet;

use rand::Rng;
use rand_pcg::Pcg64Mcg;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::agents::AgentStore;

/// The closed set of base shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShapeKind {
    Y,
    N,
    Arrowhead,
    Box,
}

/// Which stage of the geometry pipeline to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryPass {
    /// Core only, for interactive dragging.
    Preview,
    /// Core, armor, and rim.
    Final,
}

/// A line segment in template coordinates, `((y1, x1), (y2, x2))`.
type Segment = ((i32, i32), (i32, i32));

const Y_SEGMENTS: &[Segment] = &[((4, 0), (-1, 0)), ((-1, 0), (-4, -3)), ((-1, 0), (-4, 3))];
const N_SEGMENTS: &[Segment] = &[((4, -2), (-4, -2)), ((-4, 2), (4, 2)), ((-4, -2), (4, 2))];
const ARROWHEAD_OUTLINE: &[(i32, i32)] = &[(-4, 0), (4, 4), (1, 0), (4, -4)];
const BOX_OUTLINE: &[(i32, i32)] = &[(-3, -3), (-3, 3), (3, 3), (3, -3)];

impl ShapeKind {
    /// Pivot-relative exit ports derived from the template: segment
    /// endpoints for line shapes, outline vertices for polygons, nudged
    /// one cell outward along each axis.
    pub fn default_ports(self, scale: f32) -> Vec<(i32, i32)> {
        let tips: &[(i32, i32)] = match self {
            ShapeKind::Y => &[(4, 0), (-4, -3), (-4, 3)],
            ShapeKind::N => &[(-4, -2), (4, 2)],
            ShapeKind::Arrowhead => ARROWHEAD_OUTLINE,
            ShapeKind::Box => BOX_OUTLINE,
        };
        tips.iter()
            .map(|&(y, x)| (scaled(y, scale) + y.signum(), scaled(x, scale) + x.signum()))
            .collect()
    }
}

/// Scale a template coordinate, truncating toward zero.
#[inline]
fn scaled(v: i32, scale: f32) -> i32 {
    (v as f32 * scale) as i32
}

/// A base: owns its pixel sets and its spawner state.
#[derive(Debug, Clone)]
pub struct Base {
    pub team_id: u8,
    pub shape: ShapeKind,
    /// World-space stamp position, `(y, x)`.
    pub pivot: (i32, i32),
    pub scale: f32,
    pub core_thickness: i32,
    pub armor_thickness: i32,
    /// Exit ports as offsets from the pivot.
    pub relative_exit_ports: Vec<(i32, i32)>,
    pub core_pixels: Vec<(i32, i32)>,
    pub armor_pixels: Vec<(i32, i32)>,
    pub rim_pixels: Vec<(i32, i32)>,
    /// Tick at which this base last lost an armor cell.
    pub last_damage_tick: u64,
    pub spawn_cooldown: i32,
    inert: bool,
}

impl Base {
    pub fn new(
        team_id: u8,
        shape: ShapeKind,
        pivot: (i32, i32),
        scale: f32,
        core_thickness: i32,
        armor_thickness: i32,
        relative_exit_ports: Vec<(i32, i32)>,
    ) -> Self {
        let mut base = Self {
            team_id,
            shape,
            pivot,
            scale,
            core_thickness: core_thickness.max(1),
            armor_thickness: armor_thickness.max(1),
            relative_exit_ports,
            core_pixels: Vec::new(),
            armor_pixels: Vec::new(),
            rim_pixels: Vec::new(),
            last_damage_tick: 0,
            spawn_cooldown: 0,
            inert: false,
        };
        base.recalculate_geometry(GeometryPass::Final);
        base
    }

    /// Re-stamp the template and rebuild the pixel sets.
    pub fn recalculate_geometry(&mut self, pass: GeometryPass) {
        self.core_pixels.clear();
        self.armor_pixels.clear();
        self.rim_pixels.clear();

        let raster = self.rasterize_template();
        if raster.is_empty() {
            if !self.inert {
                warn!(
                    team_id = self.team_id,
                    shape = ?self.shape,
                    "shape template rasterized to no pixels; base is inert"
                );
            }
            self.inert = true;
            return;
        }
        self.inert = false;

        let core = dilate(&raster, self.core_thickness - 1);
        self.core_pixels = core.iter().copied().collect();

        if pass == GeometryPass::Preview {
            return;
        }

        let armor: BTreeSet<(i32, i32)> = dilate(&core, self.armor_thickness)
            .difference(&core)
            .copied()
            .collect();
        self.armor_pixels = armor.iter().copied().collect();

        let all: BTreeSet<(i32, i32)> = core.union(&armor).copied().collect();
        self.rim_pixels = all
            .iter()
            .copied()
            .filter(|&(y, x)| {
                [(y - 1, x), (y + 1, x), (y, x - 1), (y, x + 1)]
                    .iter()
                    .any(|n| !all.contains(n))
            })
            .collect();
    }

    fn rasterize_template(&self) -> BTreeSet<(i32, i32)> {
        let mut out = BTreeSet::new();
        let (py, px) = self.pivot;
        match self.shape {
            ShapeKind::Y | ShapeKind::N => {
                let segments = if self.shape == ShapeKind::Y { Y_SEGMENTS } else { N_SEGMENTS };
                for &((y1, x1), (y2, x2)) in segments {
                    bresenham(
                        py + scaled(y1, self.scale),
                        px + scaled(x1, self.scale),
                        py + scaled(y2, self.scale),
                        px + scaled(x2, self.scale),
                        &mut out,
                    );
                }
            }
            ShapeKind::Arrowhead | ShapeKind::Box => {
                let outline = if self.shape == ShapeKind::Arrowhead {
                    ARROWHEAD_OUTLINE
                } else {
                    BOX_OUTLINE
                };
                let vertices: Vec<(i32, i32)> = outline
                    .iter()
                    .map(|&(y, x)| (py + scaled(y, self.scale), px + scaled(x, self.scale)))
                    .collect();
                fill_polygon(&vertices, &mut out);
            }
        }
        out
    }

    /// A template that produced no pixels; the base never spawns and
    /// contributes nothing to the grid.
    pub fn is_inert(&self) -> bool {
        self.inert
    }

    /// A base with no armor left neither spawns nor takes further damage.
    pub fn is_dead(&self) -> bool {
        self.armor_pixels.is_empty()
    }

    /// World-space exit ports.
    pub fn exit_ports(&self) -> impl Iterator<Item = (i32, i32)> + '_ {
        let (py, px) = self.pivot;
        self.relative_exit_ports.iter().map(move |&(y, x)| (py + y, px + x))
    }

    /// Core and armor together.
    pub fn all_pixels(&self) -> impl Iterator<Item = (i32, i32)> + '_ {
        self.core_pixels.iter().chain(self.armor_pixels.iter()).copied()
    }

    /// Run one spawn-cooldown step, creating agents at random in-grid
    /// exit ports when the cooldown expires.
    pub fn update_spawning(
        &mut self,
        store: &mut AgentStore,
        grid_height: usize,
        grid_width: usize,
        spawn_rate: u32,
        units_per_spawn: u32,
        rng: &mut Pcg64Mcg,
    ) {
        if self.is_dead() {
            return;
        }
        self.spawn_cooldown -= 1;
        if self.spawn_cooldown > 0 {
            return;
        }

        let ports: Vec<(i32, i32)> = self
            .exit_ports()
            .filter(|&(y, x)| {
                y >= 0 && x >= 0 && (y as usize) < grid_height && (x as usize) < grid_width
            })
            .collect();
        if !ports.is_empty() {
            for _ in 0..units_per_spawn {
                let (y, x) = ports[rng.gen_range(0..ports.len())];
                let heading = rng.gen_range(0.0..std::f32::consts::TAU);
                store.add(y as f32, x as f32, self.team_id, heading);
            }
        }
        self.spawn_cooldown = spawn_rate as i32;
    }
}

/// Bresenham grid-step line, endpoints inclusive.
fn bresenham(mut y1: i32, mut x1: i32, y2: i32, x2: i32, out: &mut BTreeSet<(i32, i32)>) {
    let dx = (x2 - x1).abs();
    let dy = (y2 - y1).abs();
    let sx = if x1 < x2 { 1 } else { -1 };
    let sy = if y1 < y2 { 1 } else { -1 };
    let mut err = dx - dy;
    loop {
        out.insert((y1, x1));
        if y1 == y2 && x1 == x2 {
            break;
        }
        let e2 = 2 * err;
        if e2 > -dy {
            err -= dy;
            x1 += sx;
        }
        if e2 < dx {
            err += dx;
            y1 += sy;
        }
    }
}

/// Even-odd scanline fill plus a Bresenham outline, so boundary rows that
/// the half-open scanline rule skips are still covered.
fn fill_polygon(vertices: &[(i32, i32)], out: &mut BTreeSet<(i32, i32)>) {
    let n = vertices.len();
    if n < 3 {
        return;
    }
    for i in 0..n {
        let (y1, x1) = vertices[i];
        let (y2, x2) = vertices[(i + 1) % n];
        bresenham(y1, x1, y2, x2, out);
    }

    let y_min = vertices.iter().map(|v| v.0).min().unwrap();
    let y_max = vertices.iter().map(|v| v.0).max().unwrap();
    let mut xs: Vec<f32> = Vec::new();
    for y in y_min..=y_max {
        xs.clear();
        for i in 0..n {
            let (y1, x1) = vertices[i];
            let (y2, x2) = vertices[(i + 1) % n];
            if y1 == y2 {
                continue;
            }
            let (lo, hi) = if y1 < y2 { (y1, y2) } else { (y2, y1) };
            if y >= lo && y < hi {
                let t = (y - y1) as f32 / (y2 - y1) as f32;
                xs.push(x1 as f32 + t * (x2 - x1) as f32);
            }
        }
        xs.sort_by(|a, b| a.total_cmp(b));
        for pair in xs.chunks(2) {
            if let [a, b] = pair {
                for x in (a.ceil() as i32)..=(b.floor() as i32) {
                    out.insert((y, x));
                }
            }
        }
    }
}

/// Morphological dilation with a square element of the given Chebyshev
/// radius; radius 0 is the identity.
fn dilate(cells: &BTreeSet<(i32, i32)>, radius: i32) -> BTreeSet<(i32, i32)> {
    if radius <= 0 {
        return cells.clone();
    }
    let mut out = BTreeSet::new();
    for &(y, x) in cells {
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                out.insert((y + dy, x + dx));
            }
        }
    }
    out
}
