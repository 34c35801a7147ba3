//! Range Negotiation
//!
//! Manual range stepping and auto-range over a radar family's supported
//! range table. Auto proposals come from the chart viewport and oscillate;
//! a 5% hysteresis band keeps the hardware from being re-ranged on every
//! jitter. Manual stepping always wins: it disables auto-range.

use crate::capabilities::Characteristics;
use crate::state::PowerState;

/// Auto proposals within this fraction of the last applied value are
/// ignored.
const AUTO_RANGE_HYSTERESIS: f64 = 0.05;

#[derive(Debug, Clone)]
pub struct RangeNegotiator {
    auto: bool,
    /// Last auto proposal that resulted in a hardware command.
    last_auto_applied: Option<u32>,
}

impl Default for RangeNegotiator {
    fn default() -> Self {
        RangeNegotiator::new()
    }
}

impl RangeNegotiator {
    pub fn new() -> Self {
        RangeNegotiator {
            auto: true,
            last_auto_applied: None,
        }
    }

    pub fn auto_enabled(&self) -> bool {
        self.auto
    }

    pub fn set_auto_enabled(&mut self, auto: bool) {
        self.auto = auto;
        if !auto {
            self.last_auto_applied = None;
        }
    }

    /// Step the range up or down one table entry from `current_meters`.
    ///
    /// Returns the range to command, clamped at the table bounds. Stepping
    /// manually disables auto-range.
    pub fn adjust_range(
        &mut self,
        characteristics: &Characteristics,
        current_meters: u32,
        delta: i32,
    ) -> Option<u32> {
        self.auto = false;
        self.last_auto_applied = None;

        let table = &characteristics.supported_ranges;
        let index = characteristics.range_index_at_or_below(current_meters) as i64;
        let stepped = (index + delta as i64).clamp(0, table.len() as i64 - 1) as usize;
        Some(table[stepped])
    }

    /// Feed an auto-range proposal in meters.
    ///
    /// Active only while transmitting with auto-range enabled. The proposal
    /// is ignored when within the hysteresis band of the last applied one;
    /// otherwise it is rounded down to a supported range and returned for
    /// the hardware command.
    pub fn set_auto_range_meters(
        &mut self,
        characteristics: &Characteristics,
        proposed_meters: u32,
        state: PowerState,
    ) -> Option<u32> {
        if !self.auto || state != PowerState::Transmit || proposed_meters == 0 {
            return None;
        }

        if let Some(last) = self.last_auto_applied {
            let delta = (proposed_meters as f64 - last as f64).abs();
            if delta <= last as f64 * AUTO_RANGE_HYSTERESIS {
                return None;
            }
        }

        self.last_auto_applied = Some(proposed_meters);
        Some(characteristics.nearest_range_at_or_below(proposed_meters))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capabilities::RadarFamily;

    #[test]
    fn test_adjust_range_steps_and_clamps() {
        let c = RadarFamily::Magnetron.characteristics();
        let mut neg = RangeNegotiator::new();

        assert_eq!(neg.adjust_range(&c, 1000, 1), Some(1500));
        assert_eq!(neg.adjust_range(&c, 1000, -1), Some(750));
        // Current between entries: index is the entry at-or-below
        assert_eq!(neg.adjust_range(&c, 1200, 1), Some(1500));
        // Clamped at both ends
        assert_eq!(neg.adjust_range(&c, 50, -1), Some(50));
        assert_eq!(neg.adjust_range(&c, 48000, 1), Some(48000));
    }

    #[test]
    fn test_adjust_range_disables_auto() {
        let c = RadarFamily::Magnetron.characteristics();
        let mut neg = RangeNegotiator::new();
        assert!(neg.auto_enabled());
        neg.adjust_range(&c, 1000, 1);
        assert!(!neg.auto_enabled());
    }

    #[test]
    fn test_auto_range_hysteresis() {
        let c = RadarFamily::Magnetron.characteristics();
        let mut neg = RangeNegotiator::new();

        let mut commands = 0;
        for proposed in [2000, 2050, 1950, 2099, 1901] {
            if neg
                .set_auto_range_meters(&c, proposed, PowerState::Transmit)
                .is_some()
            {
                commands += 1;
            }
        }
        // All proposals within ±5% of the first: exactly one command.
        assert_eq!(commands, 1);

        // A proposal outside the band goes through.
        assert_eq!(
            neg.set_auto_range_meters(&c, 2500, PowerState::Transmit),
            Some(c.nearest_range_at_or_below(2500))
        );
    }

    #[test]
    fn test_auto_range_rounds_down_to_table() {
        let c = RadarFamily::Magnetron.characteristics();
        let mut neg = RangeNegotiator::new();
        assert_eq!(
            neg.set_auto_range_meters(&c, 2999, PowerState::Transmit),
            Some(2000)
        );
    }

    #[test]
    fn test_auto_range_gated_on_transmit_and_enable() {
        let c = RadarFamily::Magnetron.characteristics();
        let mut neg = RangeNegotiator::new();

        assert_eq!(neg.set_auto_range_meters(&c, 2000, PowerState::Standby), None);
        neg.set_auto_enabled(false);
        assert_eq!(neg.set_auto_range_meters(&c, 2000, PowerState::Transmit), None);
        // Zero means "no estimate", never a division by zero downstream.
        neg.set_auto_enabled(true);
        assert_eq!(neg.set_auto_range_meters(&c, 0, PowerState::Transmit), None);
    }
}
