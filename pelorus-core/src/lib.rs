//! Platform-independent radar spoke processing library for Pelorus.
//!
//! This crate turns decoded radar spokes into renderer-ready imagery and
//! derived state: detection history, target trails, guard-zone alarms and
//! a heartbeat-driven power state machine. It contains no I/O, no async
//! and no platform-specific code; wire decoding, sockets and drawing are
//! collaborators owned by the server crate.
//!
//! # Modules
//!
//! - **capabilities**: per-radar-family geometry and range tables
//! - **course**: wrap-safe course averaging for course-up display
//! - **guard_zones**: monitored regions with alarm hysteresis
//! - **history**: per-bearing multi-sweep detection history
//! - **legend**: intensity thresholds and trail palette
//! - **pipeline**: the per-spoke orchestrator
//! - **range**: manual range stepping and auto-range hysteresis
//! - **state**: power state machine and versioned values
//! - **trails**: true- and relative-motion trail accumulators

use std::sync::OnceLock;

pub mod capabilities;
pub mod course;
pub mod guard_zones;
pub mod history;
pub mod legend;
pub mod pipeline;
pub mod range;
pub mod spoke;
pub mod state;
pub mod trails;

pub use capabilities::{Characteristics, RadarFamily};
pub use legend::Legend;
pub use pipeline::{Orientation, PipelineError, PipelineSettings, SpokePipeline, SpokeRenderer};
pub use range::RangeNegotiator;
pub use spoke::{GeoPosition, Millis, Spoke};
pub use state::{Effect, PowerState, RadarStateMachine, RequestError, Versioned};

/// One-shot latch recording when the first frame was drawn.
///
/// Explicit single-initialization semantics: the first `record` wins and
/// returns true, every later call is ignored. The process-wide instance is
/// [`FIRST_DRAW`]; tests construct their own.
#[derive(Debug)]
pub struct FirstDraw {
    at: OnceLock<Millis>,
}

impl FirstDraw {
    pub const fn new() -> Self {
        FirstDraw { at: OnceLock::new() }
    }

    /// Record the first draw time. Returns true only for the call that won.
    pub fn record(&self, now: Millis) -> bool {
        self.at.set(now).is_ok()
    }

    pub fn get(&self) -> Option<Millis> {
        self.at.get().copied()
    }
}

impl Default for FirstDraw {
    fn default() -> Self {
        FirstDraw::new()
    }
}

/// Process-wide first-draw telemetry for startup time reporting.
pub static FIRST_DRAW: FirstDraw = FirstDraw::new();

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_draw_records_once() {
        let latch = FirstDraw::new();
        assert_eq!(latch.get(), None);
        assert!(latch.record(1_000));
        assert!(!latch.record(2_000));
        assert_eq!(latch.get(), Some(1_000));
    }
}
