//! Spoke Emulator
//!
//! Stands in for a real decoder: generates a rotating sweep with a fixed
//! synthetic target and a slowly drifting ownship position, at a realistic
//! rotation rate. Used by the demo binary and replay-style testing.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio_graceful_shutdown::SubsystemHandle;

use pelorus_core::{Characteristics, GeoPosition, Spoke};

use crate::radar::now_millis;

/// Spokes generated per wakeup.
const SPOKES_PER_BATCH: usize = 32;

pub struct Emulator {
    key: String,
    characteristics: Characteristics,
    range_meters: u32,
    rotation_period: Duration,
    tx: mpsc::Sender<Spoke>,

    angle: usize,
    position: GeoPosition,
}

impl Emulator {
    pub fn new(
        key: String,
        characteristics: Characteristics,
        range_meters: u32,
        rotation_period: Duration,
        tx: mpsc::Sender<Spoke>,
    ) -> Self {
        Emulator {
            key,
            characteristics,
            range_meters,
            rotation_period,
            tx,
            angle: 0,
            position: GeoPosition::new(52.37, 4.90),
        }
    }

    pub async fn run(mut self, subsys: SubsystemHandle) -> anyhow::Result<()> {
        let spokes = self.characteristics.spokes_per_revolution as usize;
        let batch_interval = self.rotation_period * SPOKES_PER_BATCH as u32 / spokes as u32;
        log::info!(
            "{}: emulating {} spokes/rev at {:?}/rev",
            self.key,
            spokes,
            self.rotation_period
        );

        loop {
            tokio::select! {
                _ = subsys.on_shutdown_requested() => break,
                _ = tokio::time::sleep(batch_interval) => {
                    if !self.send_batch().await {
                        break;
                    }
                }
            }
        }
        log::debug!("{}: emulator stopped", self.key);
        Ok(())
    }

    async fn send_batch(&mut self) -> bool {
        let spokes = self.characteristics.spokes_per_revolution as usize;
        for _ in 0..SPOKES_PER_BATCH {
            let spoke = self.synthesize();
            if self.tx.send(spoke).await.is_err() {
                return false;
            }
            self.angle = (self.angle + 1) % spokes;
            if self.angle == 0 {
                // Creep north about a boat length per revolution.
                self.position.lat += 0.00002;
            }
        }
        true
    }

    /// One spoke: light noise plus a solid blob dead east at mid-range.
    fn synthesize(&self) -> Spoke {
        let spokes = self.characteristics.spokes_per_revolution as usize;
        let len = self.characteristics.max_spoke_length as usize / 2;
        let mut data = vec![0u8; len];

        // Sprinkle weak clutter derived from the angle so runs are
        // reproducible.
        for radius in (7..len).step_by(97) {
            data[radius] = ((self.angle * 31 + radius) % 48) as u8;
        }

        let east = spokes / 4;
        let width = spokes / 128;
        let distance = (self.angle as i64 - east as i64).unsigned_abs() as usize;
        if distance <= width {
            let center = len / 2;
            for cell in &mut data[center.saturating_sub(4)..(center + 4).min(len)] {
                *cell = 255;
            }
        }

        // Constant heading 25° starboard of north.
        let heading = spokes * 25 / 360;
        Spoke {
            angle: self.angle,
            bearing: (self.angle + heading) % spokes,
            data,
            range_meters: self.range_meters,
            time: now_millis(),
            pos: Some(self.position),
        }
    }
}
