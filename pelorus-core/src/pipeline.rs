//! Spoke Ingest Pipeline
//!
//! The per-spoke orchestrator. A decoder collaborator delivers one spoke at
//! a time; the pipeline updates the course average, detection history,
//! guard zones and trails, then forwards the processed intensity line to
//! the renderer collaborator.
//!
//! The caller serializes `process_spoke` invocations and holds the
//! per-radar lock around each one; render passes take the same lock, so
//! spoke processing and rendering never overlap.

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::capabilities::Characteristics;
use crate::course::{CourseAverager, COURSE_SAMPLE_STRIDE};
use crate::guard_zones::GuardZoneSet;
use crate::history::{confirmed, HistoryStore};
use crate::legend::Legend;
use crate::spoke::{GeoPosition, Millis, Spoke};
use crate::state::Versioned;
use crate::trails::{TrailBuffer, TrailMotion};

const METERS_PER_DEGREE_LATITUDE: f64 = 60.0 * 1852.0;

/// Rotation period estimates outside this window are discarded as
/// start-up artifacts or dropped rotations.
const ROTATION_PERIOD_SANE_MS: std::ops::Range<u64> = 500..10_000;

/// Display orientation. History is bearing-absolute only in stabilized
/// modes; head-up stores and renders by boat-relative angle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    HeadUp,
    NorthUp,
    CourseUp,
}

impl Orientation {
    pub fn stabilized(&self) -> bool {
        !matches!(self, Orientation::HeadUp)
    }
}

/// Externally owned display/processing configuration, snapshotted into the
/// pipeline under the shared lock.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineSettings {
    pub orientation: Orientation,
    /// Leading range cells zeroed for main-bang suppression.
    pub main_bang_cells: usize,
    /// Zero returns not confirmed by the previous sweep before display.
    pub multi_sweep_display: bool,
    /// Force the outermost cell to maximum intensity (range diagnostic).
    pub show_extreme_range: bool,
    /// Overlay transparency passed through to the renderer.
    pub transparency: u8,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        PipelineSettings {
            orientation: Orientation::HeadUp,
            main_bang_cells: 0,
            multi_sweep_display: false,
            show_extreme_range: false,
            transparency: 0,
        }
    }
}

/// Renderer collaborator. Called under the per-radar lock; must not block.
pub trait SpokeRenderer {
    fn process_spoke(&mut self, transparency: u8, rotation_slot: usize, data: &[u8], len: usize);
    fn draw_frame(&mut self);
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("spoke length {len} exceeds maximum {max}")]
    SpokeTooLong { len: usize, max: usize },
    #[error("rotation slot {slot} outside [0, {spokes})")]
    SlotOutOfRange { slot: usize, spokes: usize },
}

/// Per-spoke processing engine for one radar instance.
pub struct SpokePipeline {
    characteristics: Characteristics,
    legend: Legend,
    settings: PipelineSettings,

    course: CourseAverager,
    history: HistoryStore,
    trails: TrailBuffer,
    guard_zones: GuardZoneSet,

    pixels_per_meter: f64,
    range_meters: Versioned<u32>,
    /// Orientation class the stored history was built under.
    stabilized: bool,

    last_angle: Option<usize>,
    rotation_start_pos: Option<GeoPosition>,
    rotation_start_time: Option<Millis>,
}

impl SpokePipeline {
    pub fn new(characteristics: Characteristics, legend: Legend, settings: PipelineSettings) -> Self {
        let spokes = characteristics.spokes_per_revolution as usize;
        let max_len = characteristics.max_spoke_length as usize;
        SpokePipeline {
            legend,
            stabilized: settings.orientation.stabilized(),
            settings,
            course: CourseAverager::new(),
            history: HistoryStore::new(spokes, max_len),
            trails: TrailBuffer::new(spokes, max_len, legend),
            guard_zones: GuardZoneSet::new(),
            pixels_per_meter: 0.0,
            range_meters: Versioned::new(0),
            last_angle: None,
            rotation_start_pos: None,
            rotation_start_time: None,
            characteristics,
        }
    }

    /// Process one decoded spoke and forward it to the renderer.
    ///
    /// `range_meters == 0` means the decoder has no range yet; the spoke is
    /// dropped rather than dividing by zero. An over-long spoke is a fatal
    /// contract violation with the decoder.
    pub fn process_spoke(
        &mut self,
        spoke: &mut Spoke,
        renderer: &mut dyn SpokeRenderer,
    ) -> Result<(), PipelineError> {
        let spokes = self.characteristics.spokes_per_revolution as usize;
        let max_len = self.characteristics.max_spoke_length as usize;
        let len = spoke.data.len();

        if len > max_len {
            return Err(PipelineError::SpokeTooLong { len, max: max_len });
        }
        if spoke.angle >= spokes {
            return Err(PipelineError::SlotOutOfRange {
                slot: spoke.angle,
                spokes,
            });
        }
        if spoke.bearing >= spokes {
            return Err(PipelineError::SlotOutOfRange {
                slot: spoke.bearing,
                spokes,
            });
        }
        if spoke.range_meters == 0 {
            // No range known yet
            return Ok(());
        }

        // Course average, one sample every 128th angle
        if spoke.angle % COURSE_SAMPLE_STRIDE == 0 {
            let heading = (spoke.bearing + spokes - spoke.angle) % spokes;
            self.course.sample(heading as f64 * 360.0 / spokes as f64);
        }

        // Main-bang suppression
        let bang = self.settings.main_bang_cells.min(len);
        spoke.data[..bang].fill(0);

        // Geometry: a range or spoke-length change invalidates everything
        // derived from the old cell size, before the new range is recorded.
        let pixels_per_meter = len as f64 / spoke.range_meters as f64;
        if spoke.range_meters != *self.range_meters.value()
            || (pixels_per_meter - self.pixels_per_meter).abs() > f64::EPSILON
        {
            self.invalidate(renderer);
            self.pixels_per_meter = pixels_per_meter;
            self.range_meters.set(spoke.range_meters);
        }

        // Orientation class change: stored slots change meaning
        let stabilized = self.settings.orientation.stabilized();
        if stabilized != self.stabilized {
            self.invalidate(renderer);
            self.stabilized = stabilized;
        }

        // Rotation boundary: age trails, re-anchor, update period estimate
        if let Some(last) = self.last_angle {
            if spoke.angle < last {
                let displacement = match (self.rotation_start_pos, spoke.pos) {
                    (Some(from), Some(to)) => Some(displacement_meters(&from, &to)),
                    _ => None,
                };
                self.trails.tick(displacement, self.pixels_per_meter);
                if let Some(start) = self.rotation_start_time {
                    let period = spoke.time.saturating_sub(start);
                    if ROTATION_PERIOD_SANE_MS.contains(&period) {
                        self.trails.set_rotation_period(period as u32);
                    }
                }
                self.rotation_start_pos = spoke.pos;
                self.rotation_start_time = Some(spoke.time);
            }
        } else {
            self.rotation_start_pos = spoke.pos;
            self.rotation_start_time = Some(spoke.time);
        }
        self.last_angle = Some(spoke.angle);

        // Detection history for this slot
        let slot = if stabilized { spoke.bearing } else { spoke.angle };
        self.history
            .advance(slot, &spoke.data, &self.legend, spoke.time, spoke.pos);

        // Guard zones scan the raw returns plus this slot's history
        self.guard_zones.scan_spoke(
            spoke.angle,
            &spoke.data,
            self.history.line(slot).cells(),
            len,
            self.pixels_per_meter,
            &self.legend,
            spoke.time,
        );

        // Display filter: drop returns not seen on consecutive sweeps
        if self.settings.multi_sweep_display {
            let line = self.history.line(slot).cells();
            for radius in 0..len {
                if spoke.data[radius] != 0 && !confirmed(line[radius]) {
                    spoke.data[radius] = 0;
                }
            }
        }

        // Trails accumulate on, and paint into, the processed line
        match self.trails.motion() {
            TrailMotion::True => self.trails.update_true(spoke.bearing, &mut spoke.data, len),
            TrailMotion::Relative => self.trails.update_relative(spoke.angle, &mut spoke.data, len),
            TrailMotion::Off => {}
        }

        // Range diagnostic: light the outermost cell
        if self.settings.show_extreme_range && len > 0 {
            spoke.data[len - 1] = 255;
        }

        let rotation_slot = if stabilized { spoke.bearing } else { spoke.angle };
        renderer.process_spoke(self.settings.transparency, rotation_slot, &spoke.data, len);
        Ok(())
    }

    /// Wipe all derived state and zero the renderer's stored spokes.
    fn invalidate(&mut self, renderer: &mut dyn SpokeRenderer) {
        self.history.reset();
        self.trails.clear();
        self.guard_zones.reset_sweep_state();

        let zap = vec![0u8; self.characteristics.max_spoke_length as usize];
        for slot in 0..self.characteristics.spokes_per_revolution as usize {
            renderer.process_spoke(self.settings.transparency, slot, &zap, zap.len());
        }
    }

    /// Snapshot new display/processing settings under the shared lock.
    /// An orientation class change takes effect on the next spoke.
    pub fn apply_settings(&mut self, settings: PipelineSettings) {
        self.settings = settings;
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn characteristics(&self) -> &Characteristics {
        &self.characteristics
    }

    pub fn legend(&self) -> &Legend {
        &self.legend
    }

    pub fn pixels_per_meter(&self) -> f64 {
        self.pixels_per_meter
    }

    pub fn range_meters(&self) -> u32 {
        *self.range_meters.value()
    }

    pub fn range_snapshot(&self) -> (u32, u64) {
        self.range_meters.snapshot()
    }

    pub fn course(&self) -> &CourseAverager {
        &self.course
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn trails(&self) -> &TrailBuffer {
        &self.trails
    }

    pub fn trails_mut(&mut self) -> &mut TrailBuffer {
        &mut self.trails
    }

    pub fn guard_zones(&self) -> &GuardZoneSet {
        &self.guard_zones
    }

    pub fn guard_zones_mut(&mut self) -> &mut GuardZoneSet {
        &mut self.guard_zones
    }
}

/// Ownship displacement in meters (east, north) between two positions.
fn displacement_meters(from: &GeoPosition, to: &GeoPosition) -> Vector2<f64> {
    let mean_lat = ((from.lat + to.lat) / 2.0).to_radians();
    Vector2::new(
        (to.lon - from.lon) * METERS_PER_DEGREE_LATITUDE * mean_lat.cos(),
        (to.lat - from.lat) * METERS_PER_DEGREE_LATITUDE,
    )
}
