//! The slime-mold steering rule: sense, rotate, move.
//!
//! An agent samples its team's pheromone field at three sensor points
//! ahead of it (forward, left, right of heading), turns toward the
//! strongest scent, and steps one cell along the new heading. The forward
//! sample is weighted by a fixed 1.2 bias so agents commit to trails
//! instead of oscillating between the side sensors.

use rand::Rng;

use crate::pheromone::PheromoneField;

/// Multiplier applied to the forward sensor before comparison.
pub const FORWARD_BIAS: f32 = 1.2;

/// Resolved steering parameters for one team, angles in radians.
#[derive(Debug, Clone, Copy)]
pub struct SteeringParams {
    /// Sensor cone half-angle.
    pub sensor_angle: f32,
    /// Rotation step applied when turning toward a side sensor.
    pub rotation_angle: f32,
    /// Distance from the agent to each sensor point.
    pub sensor_distance: f32,
}

/// One sense-rotate step; returns the new heading. Sensor points outside
/// the grid read as zero scent.
pub fn steer<R: Rng>(
    y: f32,
    x: f32,
    heading: f32,
    field: &PheromoneField,
    params: &SteeringParams,
    rng: &mut R,
) -> f32 {
    let sense = |angle: f32| -> f32 {
        let sy = (y + params.sensor_distance * angle.sin()).floor() as i32;
        let sx = (x + params.sensor_distance * angle.cos()).floor() as i32;
        field.sample(sy, sx)
    };

    let forward = sense(heading);
    let left = sense(heading - params.sensor_angle);
    let right = sense(heading + params.sensor_angle);

    let biased = forward * FORWARD_BIAS;
    if biased >= left && biased >= right {
        heading
    } else if left > right {
        heading - params.rotation_angle
    } else if right > left {
        heading + params.rotation_angle
    } else {
        heading + rng.gen_range(-params.rotation_angle..=params.rotation_angle)
    }
}
