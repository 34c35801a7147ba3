//! Shared Radar Instance
//!
//! One `RadarCore` per radar holds everything the producer and the render
//! side share: the spoke pipeline, the power state machine, the range
//! negotiator and the renderer collaborator. A single mutex guards the
//! whole core; it is held for exactly one spoke or one render pass, and
//! never across I/O. Side effects leave the critical section as
//! [`RadarCommand`] values on a channel.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::{mpsc, Notify};

use pelorus_core::state::Effect;
use pelorus_core::{
    Millis, PowerState, RangeNegotiator, RadarStateMachine, SpokePipeline, SpokeRenderer,
};

use crate::control::{ControlKind, RadarCommand};

/// Wall clock in milliseconds since the epoch.
pub fn now_millis() -> Millis {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as Millis)
        .unwrap_or(0)
}

/// Everything guarded by the per-radar lock.
pub struct RadarCore {
    pub pipeline: SpokePipeline,
    pub state: RadarStateMachine,
    pub negotiator: RangeNegotiator,
    pub renderer: Box<dyn SpokeRenderer + Send>,
}

/// Cheap clonable handle to one radar instance.
#[derive(Clone)]
pub struct RadarHandle {
    key: Arc<String>,
    core: Arc<Mutex<RadarCore>>,
    command_tx: mpsc::Sender<RadarCommand>,
    redraw: Arc<Notify>,
}

impl RadarHandle {
    pub fn new(key: String, core: RadarCore, command_tx: mpsc::Sender<RadarCommand>) -> Self {
        RadarHandle {
            key: Arc::new(key),
            core: Arc::new(Mutex::new(core)),
            command_tx,
            redraw: Arc::new(Notify::new()),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn lock(&self) -> MutexGuard<'_, RadarCore> {
        self.core.lock().unwrap()
    }

    pub fn redraw_notify(&self) -> Arc<Notify> {
        self.redraw.clone()
    }

    pub async fn send_command(&self, command: RadarCommand) {
        if self.command_tx.send(command).await.is_err() {
            log::debug!("{}: command channel closed, dropping {:?}", self.key, command);
        }
    }

    /// Turn state machine effects into queued commands and redraw pings.
    /// Must be called with the lock released.
    pub async fn dispatch_effects(&self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::PowerOn => self.send_command(RadarCommand::PowerOn).await,
                Effect::PowerOff => self.send_command(RadarCommand::PowerOff).await,
                Effect::StayAlive => self.send_command(RadarCommand::StayAlive).await,
                Effect::RequestRedraw => self.redraw.notify_one(),
            }
        }
    }

    /// Explicit user state request; rejections are logged, never applied.
    pub async fn request_state(&self, requested: PowerState) {
        let now = now_millis();
        let effects = {
            let mut core = self.lock();
            match core.state.request_state(requested, now) {
                Ok(effects) => effects,
                Err(e) => {
                    log::warn!("{}: state request rejected: {}", self.key, e);
                    Vec::new()
                }
            }
        };
        self.dispatch_effects(effects).await;
    }

    /// Step the range table up or down; disables auto-range.
    pub async fn adjust_range(&self, delta: i32) {
        let command = {
            let mut guard = self.lock();
            let core = &mut *guard;
            let current = core.pipeline.range_meters();
            let meters =
                core.negotiator
                    .adjust_range(core.pipeline.characteristics(), current, delta);
            // Range commands are only meaningful while transmitting.
            meters.filter(|_| core.state.state() == PowerState::Transmit)
        };
        if let Some(meters) = command {
            self.send_command(RadarCommand::SetRange(meters)).await;
        }
    }

    /// Auto-range proposal from the chart viewport.
    pub async fn propose_auto_range(&self, meters: u32) {
        let command = {
            let mut guard = self.lock();
            let core = &mut *guard;
            let state = core.state.state();
            core.negotiator
                .set_auto_range_meters(core.pipeline.characteristics(), meters, state)
        };
        if let Some(meters) = command {
            self.send_command(RadarCommand::SetRange(meters)).await;
        }
    }

    pub async fn set_control(&self, kind: ControlKind, value: i32) {
        self.send_command(RadarCommand::SetControl(kind, value)).await;
    }
}
