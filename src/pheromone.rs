//! Per-team pheromone fields.
//!
//! Each team owns one scalar field over the grid. Agents deposit into it,
//! the field decays multiplicatively every tick and diffuses through a
//! Gaussian blur on even ticks only (running the blur every other tick
//! halves its cost). Normalization for consumers divides by a smoothed
//! maximum: the mean of the last 30 per-tick maxima, which keeps the
//! rendered trails stable against single-tick spikes.
//!
//! The field is strictly nonnegative. Decay and diffusion run exactly once
//! per tick, in that order. Mass is not conserved; decay is multiplicative
//! and that is the point.

use std::collections::VecDeque;

/// Values below this are snapped to zero after each update.
const FLOOR: f32 = 1e-3;
/// Window length of the smoothed-maximum history.
const MAX_HISTORY: usize = 30;
/// Blur kernel truncation: the kernel extends `TRUNCATE * sigma` cells.
const TRUNCATE: f32 = 2.5;

/// One team's scalar trail field.
#[derive(Debug, Clone)]
pub struct PheromoneField {
    height: usize,
    width: usize,
    grid: Vec<f32>,
    scratch: Vec<f32>,
    max_history: VecDeque<f32>,
    smoothed_max: f32,
}

impl PheromoneField {
    pub fn new(height: usize, width: usize) -> Self {
        Self {
            height,
            width,
            grid: vec![0.0; height * width],
            scratch: vec![0.0; height * width],
            max_history: VecDeque::with_capacity(MAX_HISTORY),
            smoothed_max: 1.0,
        }
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Raw row-major view of the field.
    pub fn grid(&self) -> &[f32] {
        &self.grid
    }

    /// The stabilized normalization maximum.
    pub fn smoothed_max(&self) -> f32 {
        self.smoothed_max
    }

    /// Field value at an integer cell; zero outside the grid.
    #[inline]
    pub fn sample(&self, y: i32, x: i32) -> f32 {
        if y >= 0 && x >= 0 && (y as usize) < self.height && (x as usize) < self.width {
            self.grid[y as usize * self.width + x as usize]
        } else {
            0.0
        }
    }

    /// Overwrite the value at an integer cell; out-of-grid writes are
    /// dropped. Used by the base exit-port pump.
    #[inline]
    pub fn set(&mut self, y: i32, x: i32, value: f32) {
        if y >= 0 && x >= 0 && (y as usize) < self.height && (x as usize) < self.width {
            self.grid[y as usize * self.width + x as usize] = value;
        }
    }

    /// Add `amount` at the cell under each position, clamped to the grid.
    pub fn deposit<I>(&mut self, positions: I, amount: f32)
    where
        I: IntoIterator<Item = (f32, f32)>,
    {
        let max_y = self.height as i32 - 1;
        let max_x = self.width as i32 - 1;
        for (y, x) in positions {
            let cy = (y.floor() as i32).clamp(0, max_y);
            let cx = (x.floor() as i32).clamp(0, max_x);
            self.grid[cy as usize * self.width + cx as usize] += amount;
        }
    }

    /// Decay, diffuse (even ticks), floor-clamp, and refresh the smoothed
    /// maximum. `decay_rate` and `blur_sigma` come from the per-team
    /// resolved parameters.
    pub fn update(&mut self, tick: u64, decay_rate: f32, blur_sigma: f32) {
        for v in &mut self.grid {
            *v *= decay_rate;
        }

        if blur_sigma > 0.0 && tick % 2 == 0 {
            self.gaussian_blur(blur_sigma);
        }

        for v in &mut self.grid {
            if *v < FLOOR {
                *v = 0.0;
            }
        }

        let current_max = self.grid.iter().copied().fold(0.0f32, f32::max);
        if self.max_history.len() == MAX_HISTORY {
            self.max_history.pop_front();
        }
        self.max_history.push_back(current_max);
        self.smoothed_max =
            self.max_history.iter().sum::<f32>() / self.max_history.len() as f32;
    }

    /// Normalized copy of the field for read-only consumption.
    pub fn render_view(&self) -> Vec<f32> {
        let scale = 1.0 / self.smoothed_max.max(1.0);
        self.grid.iter().map(|&v| v * scale).collect()
    }

    /// Separable Gaussian blur with reflected boundaries.
    fn gaussian_blur(&mut self, sigma: f32) {
        let half = (TRUNCATE * sigma + 0.5) as usize;
        if half == 0 {
            return;
        }

        let mut weights = Vec::with_capacity(half + 1);
        for k in 0..=half {
            let k = k as f32;
            weights.push((-0.5 * k * k / (sigma * sigma)).exp());
        }
        let norm = weights[0] + 2.0 * weights[1..].iter().sum::<f32>();
        for w in &mut weights {
            *w /= norm;
        }

        let (h, w) = (self.height, self.width);

        // Horizontal pass: grid -> scratch.
        for y in 0..h {
            let row = &self.grid[y * w..(y + 1) * w];
            let out = &mut self.scratch[y * w..(y + 1) * w];
            for x in 0..w {
                let mut acc = weights[0] * row[x];
                for k in 1..=half {
                    acc += weights[k]
                        * (row[reflect(x as isize - k as isize, w)]
                            + row[reflect(x as isize + k as isize, w)]);
                }
                out[x] = acc;
            }
        }

        // Vertical pass: scratch -> grid.
        for y in 0..h {
            for x in 0..w {
                let mut acc = weights[0] * self.scratch[y * w + x];
                for k in 1..=half {
                    let above = reflect(y as isize - k as isize, h);
                    let below = reflect(y as isize + k as isize, h);
                    acc += weights[k]
                        * (self.scratch[above * w + x] + self.scratch[below * w + x]);
                }
                self.grid[y * w + x] = acc;
            }
        }
    }
}

/// Reflect an index into `[0, len)` about the array edges
/// (half-sample symmetric: -1 maps to 0, len maps to len-1).
#[inline]
fn reflect(mut i: isize, len: usize) -> usize {
    let n = len as isize;
    loop {
        if i < 0 {
            i = -i - 1;
        } else if i >= n {
            i = 2 * n - i - 1;
        } else {
            return i as usize;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solo_decay_matches_closed_form() {
        // 32x32 field, one spike of 100, decay 0.9, no blur.
        let mut field = PheromoneField::new(32, 32);
        field.deposit([(16.0, 16.0)], 100.0);

        for tick in 0..10 {
            field.update(tick, 0.9, 0.0);
        }
        let v = field.sample(16, 16);
        assert!((v - 100.0 * 0.9f32.powi(10)).abs() < 1e-3, "got {v}");

        for tick in 10..20 {
            field.update(tick, 0.9, 0.0);
        }
        let v = field.sample(16, 16);
        assert!((v - 100.0 * 0.9f32.powi(20)).abs() < 1e-3, "got {v}");
    }

    #[test]
    fn test_decay_bound_holds() {
        let mut field = PheromoneField::new(16, 16);
        field.deposit([(3.0, 3.0), (8.0, 12.0), (8.0, 12.0)], 50.0);
        let initial_max = field.grid().iter().copied().fold(0.0f32, f32::max);

        let decay = 0.95;
        for tick in 0..12 {
            field.update(tick, decay, 0.0);
            let max = field.grid().iter().copied().fold(0.0f32, f32::max);
            assert!(
                max <= initial_max * decay.powi(tick as i32 + 1) + 1e-4,
                "tick {tick}: max {max} exceeds decay bound"
            );
        }
    }

    #[test]
    fn test_small_values_snap_to_zero() {
        let mut field = PheromoneField::new(8, 8);
        field.deposit([(4.0, 4.0)], 0.0015);
        field.update(0, 0.5, 0.0);
        assert_eq!(field.sample(4, 4), 0.0);
    }

    #[test]
    fn test_field_stays_nonnegative() {
        let mut field = PheromoneField::new(24, 24);
        field.deposit([(1.0, 1.0), (12.0, 12.0), (22.0, 22.0)], 80.0);
        for tick in 0..40 {
            field.update(tick, 0.93, 1.1);
            assert!(field.grid().iter().all(|&v| v >= 0.0));
        }
    }

    #[test]
    fn test_blur_spreads_and_conserves_mass() {
        let mut field = PheromoneField::new(21, 21);
        field.deposit([(10.0, 10.0)], 100.0);
        let before: f32 = field.grid().iter().sum();

        // Tick 0 is even, so the blur runs; decay 1.0 isolates it.
        field.update(0, 1.0, 1.0);

        let after: f32 = field.grid().iter().sum();
        assert!((before - after).abs() < 0.5, "blur lost mass: {before} -> {after}");
        assert!(field.sample(10, 10) < 100.0);
        assert!(field.sample(10, 11) > 0.0);
        // Symmetric kernel, symmetric result.
        assert!((field.sample(10, 11) - field.sample(10, 9)).abs() < 1e-4);
        assert!((field.sample(9, 10) - field.sample(11, 10)).abs() < 1e-4);
    }

    #[test]
    fn test_blur_skipped_on_odd_ticks() {
        let mut field = PheromoneField::new(16, 16);
        field.deposit([(8.0, 8.0)], 100.0);
        field.update(1, 1.0, 2.0);
        assert_eq!(field.sample(8, 8), 100.0);
        assert_eq!(field.sample(8, 9), 0.0);
    }

    #[test]
    fn test_deposit_clamps_to_grid() {
        let mut field = PheromoneField::new(8, 8);
        field.deposit([(-3.0, 2.0), (100.0, 100.0)], 5.0);
        assert_eq!(field.sample(0, 2), 5.0);
        assert_eq!(field.sample(7, 7), 5.0);
    }

    #[test]
    fn test_smoothed_max_averages_recent_peaks() {
        let mut field = PheromoneField::new(8, 8);
        field.deposit([(4.0, 4.0)], 200.0);
        field.update(0, 1.0, 0.0);
        assert_eq!(field.smoothed_max(), 200.0);

        // A second tick at half the peak pulls the mean down, not to the
        // instantaneous value.
        field.update(1, 0.5, 0.0);
        assert!((field.smoothed_max() - 150.0).abs() < 1e-3);
    }

    #[test]
    fn test_render_view_normalizes_against_smoothed_max() {
        let mut field = PheromoneField::new(8, 8);
        field.deposit([(2.0, 2.0)], 50.0);
        field.update(0, 1.0, 0.0);

        let view = field.render_view();
        assert!((view[2 * 8 + 2] - 1.0).abs() < 1e-6);

        // A dim field divides by 1.0, never amplifies.
        let mut dim = PheromoneField::new(8, 8);
        dim.deposit([(2.0, 2.0)], 0.5);
        dim.update(0, 1.0, 0.0);
        assert!((dim.render_view()[2 * 8 + 2] - 0.5).abs() < 1e-6);
    }
}
