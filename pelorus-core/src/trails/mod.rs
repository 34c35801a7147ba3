//! Target Trails
//!
//! Per-cell memory of prior detections, rendered as a fading tail behind
//! moving targets. Two accumulators are kept: a boat-fixed polar grid for
//! relative-motion trails and a boat-centered cartesian grid for
//! true-motion (earth-fixed) trails. The true-motion grid is shifted by
//! the ownship displacement so earth-fixed echoes stay put as the boat
//! moves.
//!
//! Cells store an age in revolutions; a revolution→intensity palette maps
//! ages to display values and is recomputed, without touching the ages,
//! when the user changes the trail length bucket or motion mode.

mod buffer;

pub use buffer::*;
