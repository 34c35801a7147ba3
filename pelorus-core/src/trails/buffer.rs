use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

use crate::legend::Legend;

/// Sentinel for a cell that holds no trail.
pub const TRAIL_NONE: u8 = u8::MAX;

/// Ages saturate here; the palette maps expired ages to intensity 0 anyway.
const MAX_AGE: u8 = 254;

/// Slack around the sweep circle so shifted trails survive a few
/// revolutions before falling off the grid.
const CART_MARGIN: usize = 64;

/// Assumed antenna rotation period until the server measures one (24 RPM).
pub const DEFAULT_ROTATION_PERIOD_MS: u32 = 2_500;

/// User-selectable trail length buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrailLength {
    Secs15,
    Secs30,
    Secs60,
    Secs180,
    Secs300,
    Secs600,
    Continuous,
}

impl TrailLength {
    /// Trail duration in seconds; `None` means trails never expire.
    pub fn seconds(&self) -> Option<u32> {
        match self {
            TrailLength::Secs15 => Some(15),
            TrailLength::Secs30 => Some(30),
            TrailLength::Secs60 => Some(60),
            TrailLength::Secs180 => Some(180),
            TrailLength::Secs300 => Some(300),
            TrailLength::Secs600 => Some(600),
            TrailLength::Continuous => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrailMotion {
    Off,
    Relative,
    True,
}

/// Trail accumulators for one radar.
pub struct TrailBuffer {
    spokes: usize,
    max_spoke_len: usize,

    /// Width and height of the true-motion grid, boat at the center.
    cart_size: usize,
    true_cells: Vec<u8>,
    relative_cells: Vec<u8>,

    /// (east, north) unit vector per rotation slot.
    dir: Vec<(f64, f64)>,

    /// Age in revolutions → display intensity; index clamped to MAX_AGE.
    palette: Vec<u8>,
    max_revolutions: u32,

    length: TrailLength,
    motion: TrailMotion,
    legend: Legend,
    rotation_period_ms: u32,

    /// Sub-cell displacement remainder carried between ticks, in cells.
    carry: Vector2<f64>,
}

impl TrailBuffer {
    pub fn new(spokes: usize, max_spoke_len: usize, legend: Legend) -> Self {
        let cart_size = 2 * (max_spoke_len + CART_MARGIN);
        let dir = (0..spokes)
            .map(|s| {
                let theta = s as f64 / spokes as f64 * std::f64::consts::TAU;
                // Slot 0 points north; slots increase clockwise.
                (theta.sin(), theta.cos())
            })
            .collect();

        let mut buffer = TrailBuffer {
            spokes,
            max_spoke_len,
            cart_size,
            true_cells: vec![TRAIL_NONE; cart_size * cart_size],
            relative_cells: vec![TRAIL_NONE; spokes * max_spoke_len],
            dir,
            palette: vec![0; MAX_AGE as usize + 1],
            max_revolutions: 0,
            length: TrailLength::Secs30,
            motion: TrailMotion::Off,
            legend,
            rotation_period_ms: DEFAULT_ROTATION_PERIOD_MS,
            carry: Vector2::zeros(),
        };
        buffer.rebuild_palette();
        buffer
    }

    pub fn motion(&self) -> TrailMotion {
        self.motion
    }

    pub fn length(&self) -> TrailLength {
        self.length
    }

    pub fn max_revolutions(&self) -> u32 {
        self.max_revolutions
    }

    /// Change the trail length bucket. Recomputes the palette only; ages
    /// survive so existing trails re-render at the new length.
    pub fn set_length(&mut self, length: TrailLength) {
        if self.length != length {
            self.length = length;
            self.rebuild_palette();
        }
    }

    /// Change the motion mode. OFF clears the accumulators to inert and
    /// disables aging; other changes only recompute the palette.
    pub fn set_motion(&mut self, motion: TrailMotion) {
        if self.motion != motion {
            self.motion = motion;
            if motion == TrailMotion::Off {
                self.clear();
            }
            self.rebuild_palette();
        }
    }

    /// Update the measured antenna rotation period.
    pub fn set_rotation_period(&mut self, millis: u32) {
        if millis > 0 && millis != self.rotation_period_ms {
            self.rotation_period_ms = millis;
            self.rebuild_palette();
        }
    }

    fn rebuild_palette(&mut self) {
        let strong = self.legend.trail_strong as f64;
        let weak = self.legend.trail_weak as f64;
        self.max_revolutions = match self.length.seconds() {
            Some(secs) => ((secs * 1000) / self.rotation_period_ms)
                .max(1)
                .min(MAX_AGE as u32),
            None => MAX_AGE as u32 + 1,
        };
        let span = (self.max_revolutions.max(2) - 1) as f64;
        for (age, slot) in self.palette.iter_mut().enumerate() {
            *slot = if (age as u32) < self.max_revolutions {
                (strong - (strong - weak) * age as f64 / span).max(weak) as u8
            } else {
                0
            };
        }
    }

    /// Display intensity for a cell age.
    pub fn intensity_for_age(&self, age: u8) -> u8 {
        if age == TRAIL_NONE {
            0
        } else {
            self.palette[age as usize]
        }
    }

    /// Wipe both accumulators to inert.
    pub fn clear(&mut self) {
        self.true_cells.fill(TRAIL_NONE);
        self.relative_cells.fill(TRAIL_NONE);
        self.carry = Vector2::zeros();
    }

    /// Once per revolution: age every cell, cap, and re-anchor the
    /// true-motion grid by the ownship displacement (meters east/north)
    /// projected into cells. Inert while motion is OFF.
    pub fn tick(&mut self, displacement_m: Option<Vector2<f64>>, pixels_per_meter: f64) {
        if self.motion == TrailMotion::Off {
            return;
        }

        for cell in self.true_cells.iter_mut().chain(self.relative_cells.iter_mut()) {
            if *cell != TRAIL_NONE && *cell < MAX_AGE {
                *cell += 1;
            }
        }

        if let Some(d) = displacement_m {
            if pixels_per_meter > 0.0 {
                // Earth-fixed content moves opposite to the boat.
                let cells = self.carry - d * pixels_per_meter;
                let dx = cells.x.trunc();
                let dy = cells.y.trunc();
                self.carry = cells - Vector2::new(dx, dy);
                if dx != 0.0 || dy != 0.0 {
                    self.shift_true(dx as i64, dy as i64);
                }
            }
        }
    }

    /// Update the true-motion accumulator from one spoke and merge trail
    /// intensities into cells that hold no live echo.
    pub fn update_true(&mut self, bearing: usize, data: &mut [u8], len: usize) {
        if self.motion != TrailMotion::True {
            return;
        }
        let (east, north) = self.dir[bearing];
        for radius in 0..len.min(data.len()).min(self.max_spoke_len) {
            let ex = (east * radius as f64).round() as i64;
            let ny = (north * radius as f64).round() as i64;
            let Some(index) = self.cart_index(ex, ny) else {
                continue;
            };
            if self.legend.is_target(data[radius]) {
                self.true_cells[index] = 0;
            } else {
                let intensity = self.intensity_for_age(self.true_cells[index]);
                if intensity > data[radius] {
                    data[radius] = intensity;
                }
            }
        }
    }

    /// Update the relative-motion accumulator from one spoke and merge
    /// trail intensities into cells that hold no live echo.
    pub fn update_relative(&mut self, angle: usize, data: &mut [u8], len: usize) {
        if self.motion != TrailMotion::Relative {
            return;
        }
        let base = angle * self.max_spoke_len;
        for radius in 0..len.min(data.len()).min(self.max_spoke_len) {
            let cell = &mut self.relative_cells[base + radius];
            if self.legend.is_target(data[radius]) {
                *cell = 0;
            } else {
                let intensity = self.palette[(*cell).min(MAX_AGE) as usize];
                if *cell != TRAIL_NONE && intensity > data[radius] {
                    data[radius] = intensity;
                }
            }
        }
    }

    /// Age of the true-motion cell at (east, north) cells from the boat.
    pub fn true_age_at(&self, east: i64, north: i64) -> u8 {
        match self.cart_index(east, north) {
            Some(index) => self.true_cells[index],
            None => TRAIL_NONE,
        }
    }

    /// Age of the relative-motion cell at (angle, radius).
    pub fn relative_age_at(&self, angle: usize, radius: usize) -> u8 {
        self.relative_cells[angle * self.max_spoke_len + radius]
    }

    fn cart_index(&self, east: i64, north: i64) -> Option<usize> {
        let half = (self.cart_size / 2) as i64;
        let ix = east + half;
        let iy = north + half;
        if ix < 0 || iy < 0 || ix >= self.cart_size as i64 || iy >= self.cart_size as i64 {
            None
        } else {
            Some(iy as usize * self.cart_size + ix as usize)
        }
    }

    /// Translate the true-motion grid contents by (dx, dy) cells, filling
    /// vacated cells with inert.
    fn shift_true(&mut self, dx: i64, dy: i64) {
        let size = self.cart_size;
        if dx.unsigned_abs() as usize >= size || dy.unsigned_abs() as usize >= size {
            self.true_cells.fill(TRAIL_NONE);
            return;
        }

        if dy > 0 {
            for iy in (0..size).rev() {
                let row = iy * size;
                let src = iy as i64 - dy;
                if src >= 0 {
                    let s = src as usize * size;
                    self.true_cells.copy_within(s..s + size, row);
                } else {
                    self.true_cells[row..row + size].fill(TRAIL_NONE);
                }
            }
        } else if dy < 0 {
            for iy in 0..size {
                let row = iy * size;
                let src = iy as i64 - dy;
                if (src as usize) < size {
                    let s = src as usize * size;
                    self.true_cells.copy_within(s..s + size, row);
                } else {
                    self.true_cells[row..row + size].fill(TRAIL_NONE);
                }
            }
        }

        if dx != 0 {
            for iy in 0..size {
                let row = iy * size;
                if dx > 0 {
                    let d = dx as usize;
                    self.true_cells.copy_within(row..row + size - d, row + d);
                    self.true_cells[row..row + d].fill(TRAIL_NONE);
                } else {
                    let d = (-dx) as usize;
                    self.true_cells.copy_within(row + d..row + size, row);
                    self.true_cells[row + size - d..row + size].fill(TRAIL_NONE);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPOKES: usize = 360;
    const LEN: usize = 64;

    fn buffer(motion: TrailMotion) -> TrailBuffer {
        let mut b = TrailBuffer::new(SPOKES, LEN, Legend::default());
        b.set_motion(motion);
        b
    }

    fn hot(radius: usize) -> Vec<u8> {
        let mut data = vec![0u8; LEN];
        data[radius] = 255;
        data
    }

    #[test]
    fn test_fresh_hit_has_age_zero() {
        let mut b = buffer(TrailMotion::Relative);
        let mut data = hot(10);
        b.update_relative(45, &mut data, LEN);
        assert_eq!(b.relative_age_at(45, 10), 0);
    }

    #[test]
    fn test_tick_ages_and_hit_resets() {
        let mut b = buffer(TrailMotion::Relative);
        let mut data = hot(10);
        b.update_relative(45, &mut data, LEN);

        b.tick(None, 1.0);
        b.tick(None, 1.0);
        assert_eq!(b.relative_age_at(45, 10), 2);

        let mut data = hot(10);
        b.update_relative(45, &mut data, LEN);
        assert_eq!(b.relative_age_at(45, 10), 0);
    }

    #[test]
    fn test_expired_age_maps_to_no_trail() {
        let mut b = buffer(TrailMotion::Relative);
        b.set_length(TrailLength::Secs15);

        let max = b.max_revolutions();
        assert!(max >= 1);
        assert!(b.intensity_for_age(0) > 0);
        assert_eq!(b.intensity_for_age(max as u8), 0);
        assert_eq!(b.intensity_for_age(TRAIL_NONE), 0);
    }

    #[test]
    fn test_trail_merged_into_empty_cell() {
        let mut b = buffer(TrailMotion::Relative);
        let mut data = hot(10);
        b.update_relative(45, &mut data, LEN);
        b.tick(None, 1.0);

        // Next sweep sees nothing; the trail paints the cell.
        let mut data = vec![0u8; LEN];
        b.update_relative(45, &mut data, LEN);
        assert_eq!(data[10], b.intensity_for_age(1));
        assert!(data[10] > 0);
        // Painted trails stay below the live-echo threshold.
        assert!(!Legend::default().is_target(data[10]));
    }

    #[test]
    fn test_true_motion_shift_on_displacement() {
        let mut b = buffer(TrailMotion::True);

        // Echo due north at 10 cells (bearing slot 0, 1 cell per meter).
        let mut data = hot(10);
        b.update_true(0, &mut data, LEN);
        assert_eq!(b.true_age_at(0, 10), 0);

        // Boat moves 3 m north: earth-fixed content slides 3 cells south.
        b.tick(Some(Vector2::new(0.0, 3.0)), 1.0);
        assert_eq!(b.true_age_at(0, 7), 1);
        assert_eq!(b.true_age_at(0, 10), TRAIL_NONE);
    }

    #[test]
    fn test_sub_cell_displacement_carries() {
        let mut b = buffer(TrailMotion::True);
        let mut data = hot(10);
        b.update_true(0, &mut data, LEN);

        // Two half-cell moves add up to one cell.
        b.tick(Some(Vector2::new(0.0, 0.5)), 1.0);
        assert_eq!(b.true_age_at(0, 10), 1);
        b.tick(Some(Vector2::new(0.0, 0.5)), 1.0);
        assert_eq!(b.true_age_at(0, 9), 2);
    }

    #[test]
    fn test_length_change_keeps_ages() {
        let mut b = buffer(TrailMotion::Relative);
        let mut data = hot(10);
        b.update_relative(45, &mut data, LEN);
        b.tick(None, 1.0);

        b.set_length(TrailLength::Secs600);
        assert_eq!(b.relative_age_at(45, 10), 1);
    }

    #[test]
    fn test_motion_off_clears_and_disables() {
        let mut b = buffer(TrailMotion::Relative);
        let mut data = hot(10);
        b.update_relative(45, &mut data, LEN);

        b.set_motion(TrailMotion::Off);
        assert_eq!(b.relative_age_at(45, 10), TRAIL_NONE);

        // No aging and no accumulation while off.
        b.tick(None, 1.0);
        let mut data = hot(10);
        b.update_relative(45, &mut data, LEN);
        assert_eq!(b.relative_age_at(45, 10), TRAIL_NONE);
    }

    #[test]
    fn test_continuous_never_expires() {
        let mut b = buffer(TrailMotion::Relative);
        b.set_length(TrailLength::Continuous);
        assert!(b.intensity_for_age(MAX_AGE) > 0);
    }
}
