//! Spoke and position types
//!
//! A spoke is one radial sweep of intensity samples, from the radar center
//! outward at a fixed bearing. Spokes are ephemeral: the pipeline consumes
//! them one at a time and never stores them.

use serde::{Deserialize, Serialize};

/// Milliseconds since the Unix epoch.
pub type Millis = u64;

/// Geographic position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPosition {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPosition {
    pub fn new(lat: f64, lon: f64) -> Self {
        GeoPosition { lat, lon }
    }
}

/// One decoded radial sweep.
///
/// `angle` is boat-relative, `bearing` is north-relative; both are in raw
/// spoke units `[0, spokes_per_revolution)`. Each byte of `data` is the echo
/// strength at that radius, 0-255.
#[derive(Debug, Clone)]
pub struct Spoke {
    pub angle: usize,
    pub bearing: usize,
    pub data: Vec<u8>,
    /// Range of the outermost sample in meters. 0 means the decoder has not
    /// yet learned the range; such spokes are skipped.
    pub range_meters: u32,
    pub time: Millis,
    pub pos: Option<GeoPosition>,
}
