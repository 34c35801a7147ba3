//! Detection History
//!
//! One history line per rotation slot. Each cell is a shift register of the
//! last eight sweeps: the byte is shifted left one bit per sweep and bit 0
//! is set when the return was at or above the weak threshold. Guard zones
//! and the display filter use this to demand detections confirmed across
//! consecutive sweeps.

use bitflags::bitflags;

use crate::legend::Legend;
use crate::spoke::{GeoPosition, Millis};

bitflags! {
    /// One byte of per-cell sweep history. Bit k set means the cell was at
    /// or above the weak threshold k sweeps ago.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SweepHistory: u8 {
        const THIS_SWEEP = 0b0000_0001;
        const LAST_SWEEP = 0b0000_0010;
        /// A detection counts as confirmed when it was seen in the current
        /// and the previous sweep.
        const CONFIRMED = Self::THIS_SWEEP.bits() | Self::LAST_SWEEP.bits();
    }
}

/// True if the history byte shows a multi-sweep confirmed detection.
pub fn confirmed(history: u8) -> bool {
    SweepHistory::from_bits_retain(history).contains(SweepHistory::CONFIRMED)
}

/// History of one rotation slot.
#[derive(Debug, Clone)]
pub struct HistoryLine {
    line: Vec<u8>,
    pub time: Millis,
    pub pos: Option<GeoPosition>,
}

impl HistoryLine {
    fn new(max_spoke_len: usize) -> Self {
        HistoryLine {
            line: vec![0; max_spoke_len],
            time: 0,
            pos: None,
        }
    }

    pub fn cells(&self) -> &[u8] {
        &self.line
    }
}

/// Per-bearing detection history for one radar.
///
/// Lines are allocated once per geometry at the maximum spoke length; a
/// geometry change goes through [`HistoryStore::reset`], never through
/// reallocation while a spoke is in flight.
#[derive(Debug)]
pub struct HistoryStore {
    lines: Vec<HistoryLine>,
    max_spoke_len: usize,
}

impl HistoryStore {
    pub fn new(spokes: usize, max_spoke_len: usize) -> Self {
        HistoryStore {
            lines: (0..spokes).map(|_| HistoryLine::new(max_spoke_len)).collect(),
            max_spoke_len,
        }
    }

    /// Shift this slot's history one sweep and fold in the new returns.
    ///
    /// Cells beyond `data.len()` shift too, so stale detections age out of
    /// the confirmation window even when the spoke got shorter.
    pub fn advance(
        &mut self,
        slot: usize,
        data: &[u8],
        legend: &Legend,
        time: Millis,
        pos: Option<GeoPosition>,
    ) {
        let line = &mut self.lines[slot];
        for (radius, cell) in line.line.iter_mut().enumerate() {
            *cell <<= 1;
            if radius < data.len() && legend.is_target(data[radius]) {
                *cell |= SweepHistory::THIS_SWEEP.bits();
            }
        }
        line.time = time;
        line.pos = pos;
    }

    pub fn line(&self, slot: usize) -> &HistoryLine {
        &self.lines[slot]
    }

    pub fn max_spoke_len(&self) -> usize {
        self.max_spoke_len
    }

    /// Wipe all history. Called when geometry or orientation changes make
    /// the stored bearings meaningless.
    pub fn reset(&mut self) {
        for line in &mut self.lines {
            line.line.fill(0);
            line.time = 0;
            line.pos = None;
        }
    }
}
