use serde::{Deserialize, Serialize};

use crate::history::confirmed;
use crate::legend::Legend;
use crate::spoke::Millis;

/// Number of guard zones per radar.
pub const GUARD_ZONES: usize = 2;

/// Once raised, an alarm stays asserted this long after the last positive
/// scan (about two rotations at 24 RPM).
pub const GUARD_ALARM_HOLD: Millis = 5_000;

/// Minimum interval between audible re-announcements of an active alarm.
pub const GUARD_ALARM_REPEAT: Millis = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZoneKind {
    Off,
    Circle,
    Sector,
}

impl Default for ZoneKind {
    fn default() -> Self {
        ZoneKind::Off
    }
}

/// One monitored region.
///
/// `start_bearing`/`end_bearing` are raw spoke units; a sector with
/// `start > end` spans through zero. Ranges are meters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuardZone {
    pub id: usize,
    pub kind: ZoneKind,
    pub start_bearing: usize,
    pub end_bearing: usize,
    pub inner_range: u32,
    pub outer_range: u32,
    pub alarm_on: bool,
    pub arpa_on: bool,
    pub multi_sweep_filter: bool,

    #[serde(skip)]
    last_hit_time: Option<Millis>,
    #[serde(skip)]
    last_alarm_shown_time: Option<Millis>,
}

impl GuardZone {
    pub fn new(id: usize) -> Self {
        GuardZone {
            id,
            kind: ZoneKind::Off,
            start_bearing: 0,
            end_bearing: 0,
            inner_range: 0,
            outer_range: 0,
            alarm_on: false,
            arpa_on: false,
            multi_sweep_filter: false,
            last_hit_time: None,
            last_alarm_shown_time: None,
        }
    }

    /// Is `angle` within the zone's bearing span?
    fn bearing_in_span(&self, angle: usize) -> bool {
        match self.kind {
            ZoneKind::Off => false,
            ZoneKind::Circle => true,
            ZoneKind::Sector => {
                if self.start_bearing <= self.end_bearing {
                    angle >= self.start_bearing && angle <= self.end_bearing
                } else {
                    // Wraps through zero
                    angle >= self.start_bearing || angle <= self.end_bearing
                }
            }
        }
    }

    /// Scan one spoke against this zone.
    ///
    /// Returns true if any cell within `[inner_range, outer_range]` and the
    /// zone's bearing span is at or above the detection threshold. With
    /// `multi_sweep_filter` the cell must also be history-confirmed.
    pub fn scan_spoke(
        &mut self,
        angle: usize,
        data: &[u8],
        history: &[u8],
        len: usize,
        pixels_per_meter: f64,
        legend: &Legend,
        now: Millis,
    ) -> bool {
        if !self.bearing_in_span(angle) {
            return false;
        }

        let len = len.min(data.len()).min(history.len());
        let first = (self.inner_range as f64 * pixels_per_meter) as usize;
        let last = ((self.outer_range as f64 * pixels_per_meter) as usize).min(len.saturating_sub(1));
        if first > last {
            return false;
        }

        for radius in first..=last {
            if !legend.is_target(data[radius]) {
                continue;
            }
            if self.multi_sweep_filter && !confirmed(history[radius]) {
                continue;
            }
            self.last_hit_time = Some(now);
            return true;
        }
        false
    }

    /// Alarm state with hysteresis: asserted while the last positive scan
    /// is within the grace window.
    pub fn alarm_active(&self, now: Millis) -> bool {
        self.alarm_on
            && self
                .last_hit_time
                .map(|t| now.saturating_sub(t) <= GUARD_ALARM_HOLD)
                .unwrap_or(false)
    }

    /// True when an active alarm is due for an audible announcement;
    /// records the announcement time.
    pub fn take_alarm_announcement(&mut self, now: Millis) -> bool {
        if !self.alarm_active(now) {
            return false;
        }
        let due = self
            .last_alarm_shown_time
            .map(|t| now.saturating_sub(t) >= GUARD_ALARM_REPEAT)
            .unwrap_or(true);
        if due {
            self.last_alarm_shown_time = Some(now);
        }
        due
    }

    /// Drop sweep-derived state, keeping the user configuration.
    pub fn reset_sweep_state(&mut self) {
        self.last_hit_time = None;
    }
}

/// The fixed set of guard zones for one radar.
#[derive(Debug, Clone)]
pub struct GuardZoneSet {
    zones: [GuardZone; GUARD_ZONES],
}

impl Default for GuardZoneSet {
    fn default() -> Self {
        GuardZoneSet::new()
    }
}

impl GuardZoneSet {
    pub fn new() -> Self {
        GuardZoneSet {
            zones: std::array::from_fn(GuardZone::new),
        }
    }

    /// Dispatch one spoke to every enabled zone.
    pub fn scan_spoke(
        &mut self,
        angle: usize,
        data: &[u8],
        history: &[u8],
        len: usize,
        pixels_per_meter: f64,
        legend: &Legend,
        now: Millis,
    ) {
        for zone in &mut self.zones {
            if zone.kind == ZoneKind::Off || !zone.alarm_on {
                continue;
            }
            zone.scan_spoke(angle, data, history, len, pixels_per_meter, legend, now);
        }
    }

    /// Does any enabled zone request multi-sweep history?
    pub fn any_multi_sweep(&self) -> bool {
        self.zones
            .iter()
            .any(|z| z.kind != ZoneKind::Off && z.multi_sweep_filter)
    }

    /// IDs of zones whose alarm is currently asserted.
    pub fn active_alarms(&self, now: Millis) -> Vec<usize> {
        self.zones
            .iter()
            .filter(|z| z.alarm_active(now))
            .map(|z| z.id)
            .collect()
    }

    pub fn reset_sweep_state(&mut self) {
        for zone in &mut self.zones {
            zone.reset_sweep_state();
        }
    }

    pub fn zones(&self) -> &[GuardZone; GUARD_ZONES] {
        &self.zones
    }

    pub fn zone_mut(&mut self, id: usize) -> &mut GuardZone {
        &mut self.zones[id]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 360 spokes per rotation so raw units line up with degrees.
    const PPM: f64 = 0.1; // 10 m per cell

    fn sector(start: usize, end: usize) -> GuardZone {
        let mut z = GuardZone::new(0);
        z.kind = ZoneKind::Sector;
        z.start_bearing = start;
        z.end_bearing = end;
        z.inner_range = 100;
        z.outer_range = 500;
        z.alarm_on = true;
        z
    }

    fn hot_spoke() -> Vec<u8> {
        vec![200u8; 64]
    }

    #[test]
    fn test_sector_wrap_membership() {
        let mut z = sector(350, 10);
        let data = hot_spoke();
        let hist = vec![0u8; 64];

        assert!(z.scan_spoke(5, &data, &hist, 64, PPM, &Legend::default(), 0));
        assert!(!z.scan_spoke(180, &data, &hist, 64, PPM, &Legend::default(), 0));
        assert!(z.scan_spoke(350, &data, &hist, 64, PPM, &Legend::default(), 0));
        assert!(z.scan_spoke(10, &data, &hist, 64, PPM, &Legend::default(), 0));
        assert!(!z.scan_spoke(11, &data, &hist, 64, PPM, &Legend::default(), 0));
    }

    #[test]
    fn test_range_span() {
        let mut z = sector(0, 90);
        let hist = vec![0u8; 64];
        let legend = Legend::default();

        // Return inside the zone radially: cell 20 = 200 m
        let mut data = vec![0u8; 64];
        data[20] = 255;
        assert!(z.scan_spoke(45, &data, &hist, 64, PPM, &legend, 0));

        // Return outside outer_range: cell 60 = 600 m
        let mut data = vec![0u8; 64];
        data[60] = 255;
        assert!(!z.scan_spoke(45, &data, &hist, 64, PPM, &legend, 0));

        // Return under inner_range: cell 5 = 50 m
        let mut data = vec![0u8; 64];
        data[5] = 255;
        assert!(!z.scan_spoke(45, &data, &hist, 64, PPM, &legend, 0));
    }

    #[test]
    fn test_multi_sweep_filter_needs_confirmation() {
        let mut z = sector(0, 90);
        z.multi_sweep_filter = true;
        let data = hot_spoke();
        let legend = Legend::default();

        let unconfirmed = vec![0b01u8; 64];
        assert!(!z.scan_spoke(45, &data, &unconfirmed, 64, PPM, &legend, 0));

        let confirmed_hist = vec![0b11u8; 64];
        assert!(z.scan_spoke(45, &data, &confirmed_hist, 64, PPM, &legend, 0));
    }

    #[test]
    fn test_alarm_hysteresis() {
        let mut z = sector(0, 90);
        let data = hot_spoke();
        let hist = vec![0u8; 64];

        assert!(!z.alarm_active(1_000));
        z.scan_spoke(45, &data, &hist, 64, PPM, &Legend::default(), 1_000);
        assert!(z.alarm_active(1_000));
        // Still asserted within the grace window
        assert!(z.alarm_active(1_000 + GUARD_ALARM_HOLD));
        // Cleared after it
        assert!(!z.alarm_active(1_001 + GUARD_ALARM_HOLD));
    }

    #[test]
    fn test_alarm_announcement_throttled() {
        let mut z = sector(0, 90);
        let data = hot_spoke();
        let hist = vec![0u8; 64];
        z.scan_spoke(45, &data, &hist, 64, PPM, &Legend::default(), 1_000);

        assert!(z.take_alarm_announcement(1_000));
        assert!(!z.take_alarm_announcement(2_000));
        // Re-announce after the repeat interval with a fresh hit
        z.scan_spoke(45, &data, &hist, 64, PPM, &Legend::default(), 11_500);
        assert!(z.take_alarm_announcement(11_500));
    }

    #[test]
    fn test_set_skips_off_and_silent_zones() {
        let mut set = GuardZoneSet::new();
        let data = hot_spoke();
        let hist = vec![0u8; 64];

        // Zone 0 configured but OFF; zone 1 sector without alarm enabled.
        *set.zone_mut(0) = GuardZone {
            kind: ZoneKind::Off,
            ..sector(0, 90)
        };
        *set.zone_mut(1) = GuardZone {
            id: 1,
            alarm_on: false,
            ..sector(0, 90)
        };

        set.scan_spoke(45, &data, &hist, 64, PPM, &Legend::default(), 1_000);
        assert!(set.active_alarms(1_000).is_empty());
    }
}
