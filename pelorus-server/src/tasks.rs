//! Periodic Tasks
//!
//! The state check and the render pass run as independent subsystems on
//! their own timers. Both take the per-radar lock for a single pass and
//! dispatch any resulting commands after releasing it. Both are canceled
//! and joined by the toplevel before the radar is dropped, so neither can
//! fire into freed state.

use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_graceful_shutdown::SubsystemHandle;

use pelorus_core::{PowerState, FIRST_DRAW};

use crate::radar::{now_millis, RadarHandle};

/// State machine check interval.
pub const STATE_CHECK_INTERVAL: Duration = Duration::from_secs(1);

/// Runs the radar state machine once a second: timeouts, timed-idle
/// alternation, stay-alive emission, guard-zone alarm announcements.
pub struct StateTicker {
    handle: RadarHandle,
    last_state_generation: u64,
}

impl StateTicker {
    pub fn new(handle: RadarHandle) -> Self {
        StateTicker {
            handle,
            last_state_generation: 0,
        }
    }

    pub async fn run(mut self, subsys: SubsystemHandle) -> anyhow::Result<()> {
        let mut interval = tokio::time::interval(STATE_CHECK_INTERVAL);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = subsys.on_shutdown_requested() => break,
                _ = interval.tick() => self.check().await,
            }
        }
        log::debug!("{}: state ticker stopped", self.handle.key());
        Ok(())
    }

    async fn check(&mut self) {
        let now = now_millis();
        let (effects, alarms, status) = {
            let mut guard = self.handle.lock();
            let core = &mut *guard;
            let effects = core.state.tick(now);

            let alarms: Vec<usize> = (0..pelorus_core::guard_zones::GUARD_ZONES)
                .filter(|&id| core.pipeline.guard_zones_mut().zone_mut(id).take_alarm_announcement(now))
                .collect();

            let status = if core.state.state_changed_since(self.last_state_generation) {
                let (state, generation) = core.state.state_snapshot();
                self.last_state_generation = generation;
                Some((state, core.state.to_status_map()))
            } else {
                None
            };
            (effects, alarms, status)
        };

        for id in alarms {
            log::warn!("{}: guard zone {} alarm", self.handle.key(), id);
        }
        if let Some((state, map)) = status {
            log::info!(
                "{}: state {} {}",
                self.handle.key(),
                state,
                serde_json::to_string(&map).unwrap_or_default()
            );
        }
        self.handle.dispatch_effects(effects).await;
    }
}

/// Drives the render collaborator at the display refresh rate, plus
/// immediately on redraw requests from state transitions.
pub struct RenderTicker {
    handle: RadarHandle,
    refresh: Duration,
}

impl RenderTicker {
    pub fn new(handle: RadarHandle, refresh: Duration) -> Self {
        RenderTicker { handle, refresh }
    }

    pub async fn run(self, subsys: SubsystemHandle) -> anyhow::Result<()> {
        let redraw = self.handle.redraw_notify();
        let mut interval = tokio::time::interval(self.refresh);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = subsys.on_shutdown_requested() => break,
                _ = interval.tick() => self.render_pass(),
                _ = redraw.notified() => self.render_pass(),
            }
        }
        log::debug!("{}: render ticker stopped", self.handle.key());
        Ok(())
    }

    fn render_pass(&self) {
        let now = now_millis();
        // Frame drawn within the same lock scope as the spoke updates it
        // renders, so the two never interleave.
        let drew = {
            let mut core = self.handle.lock();
            if core.state.state() == PowerState::Transmit {
                core.renderer.draw_frame();
                true
            } else {
                false
            }
        };
        if drew && FIRST_DRAW.record(now) {
            log::info!("{}: first frame drawn", self.handle.key());
        }
    }
}
