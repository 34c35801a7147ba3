//! Guard Zone Alerting
//!
//! Guard zones are user-defined circular or sector regions monitored for
//! target presence. Every incoming spoke is scanned against the enabled
//! zones; a positive scan raises the zone alarm, and hysteresis keeps it
//! asserted for a grace window after the last hit so a single missed sweep
//! does not make the alarm flicker.
//!
//! Zone bearings are untrusted user input in raw spoke units; sector spans
//! may wrap through zero and are never assumed ordered.

mod zone;

pub use zone::*;
