//! Radar Family Capabilities
//!
//! Each radar family declares its geometry and supported range table once;
//! the rest of the pipeline is generic over this record. Clients that add a
//! new family provide a `Characteristics` plus a hardware-control
//! implementation, nothing else.

use serde::{Deserialize, Serialize};

/// Hardware characteristics of a radar family.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Characteristics {
    /// Number of spokes per antenna revolution
    pub spokes_per_revolution: u16,

    /// Maximum spoke length in samples
    pub max_spoke_length: u16,

    /// Discrete range values supported, ascending (in meters)
    pub supported_ranges: Vec<u32>,
}

impl Characteristics {
    /// Largest supported range ≤ `meters`, or the smallest table entry when
    /// none qualifies. Never panics: the table is validated non-empty.
    pub fn nearest_range_at_or_below(&self, meters: u32) -> u32 {
        let mut best = self.supported_ranges[0];
        for &r in &self.supported_ranges {
            if r <= meters {
                best = r;
            } else {
                break;
            }
        }
        best
    }

    /// Index of the largest supported range ≤ `meters`, or 0.
    pub fn range_index_at_or_below(&self, meters: u32) -> usize {
        let mut best = 0;
        for (i, &r) in self.supported_ranges.iter().enumerate() {
            if r <= meters {
                best = i;
            } else {
                break;
            }
        }
        best
    }
}

/// Supported radar families.
///
/// A family bundles the spoke geometry, the range table and (on the server
/// side) the matching command encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RadarFamily {
    /// Magnetron pulse radars: 2048 spokes, 1024-sample spokes.
    Magnetron,
    /// Solid-state CHIRP radars: 1440 spokes, 720-sample spokes.
    SolidState,
}

const MAGNETRON_SPOKES: u16 = 2048;
const MAGNETRON_SPOKE_LEN: u16 = 1024;

const SOLID_STATE_SPOKES: u16 = 1440;
const SOLID_STATE_SPOKE_LEN: u16 = 720;

impl RadarFamily {
    pub fn characteristics(&self) -> Characteristics {
        match self {
            RadarFamily::Magnetron => Characteristics {
                spokes_per_revolution: MAGNETRON_SPOKES,
                max_spoke_length: MAGNETRON_SPOKE_LEN,
                supported_ranges: vec![
                    50, 75, 100, 250, 500, 750, 1000, 1500, 2000, 3000, 4000, 6000, 8000, 12000,
                    16000, 24000, 36000, 48000,
                ],
            },
            RadarFamily::SolidState => Characteristics {
                spokes_per_revolution: SOLID_STATE_SPOKES,
                max_spoke_length: SOLID_STATE_SPOKE_LEN,
                supported_ranges: vec![
                    231, 463, 926, 1852, 2778, 3704, 5556, 9260, 13890, 18520, 27780, 44448,
                ],
            },
        }
    }
}
