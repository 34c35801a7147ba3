//! Intensity Legend
//!
//! Classifies raw echo strength bytes. The weak-return threshold decides
//! what counts as a target for history, guard zones and trails; the trail
//! band is the intensity range used when painting trail ages into a spoke,
//! kept strictly below the threshold so painted trails never read back as
//! live echoes.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Legend {
    /// Minimum intensity that counts as a target return.
    pub weak_return: u8,

    /// Intensity painted for a trail of age 0.
    pub trail_strong: u8,

    /// Intensity painted for a trail one revolution short of expiry.
    pub trail_weak: u8,
}

impl Default for Legend {
    fn default() -> Self {
        Legend {
            weak_return: 64,
            trail_strong: 63,
            trail_weak: 16,
        }
    }
}

impl Legend {
    /// True if `intensity` is at or above the weak-return threshold.
    pub fn is_target(&self, intensity: u8) -> bool {
        intensity >= self.weak_return
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold() {
        let legend = Legend::default();
        assert!(!legend.is_target(0));
        assert!(!legend.is_target(63));
        assert!(legend.is_target(64));
        assert!(legend.is_target(255));
    }

    #[test]
    fn test_trail_band_below_threshold() {
        let legend = Legend::default();
        assert!(legend.trail_strong < legend.weak_return);
        assert!(legend.trail_weak < legend.trail_strong);
    }
}
