//! Radar Power State
//!
//! Tracks the operational state of one radar against hardware heartbeats
//! and timers. The machine never performs I/O: transitions return
//! [`Effect`] values (power commands, stay-alive, redraw requests) that the
//! caller dispatches outside the shared critical section.
//!
//! The state itself is a [`Versioned`] value so consumers detect
//! transitions from a snapshot without diffing.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::spoke::Millis;

/// Power state of the radar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerState {
    Off,
    Standby,
    WarmingUp,
    SpinningUp,
    Transmit,
    /// Scheduled standby phase of the timed-idle cycle.
    TimedIdle,
}

impl Default for PowerState {
    fn default() -> Self {
        PowerState::Off
    }
}

impl std::fmt::Display for PowerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PowerState::Off => "off",
            PowerState::Standby => "standby",
            PowerState::WarmingUp => "warming up",
            PowerState::SpinningUp => "spinning up",
            PowerState::Transmit => "transmit",
            PowerState::TimedIdle => "timed idle",
        };
        write!(f, "{}", s)
    }
}

/// No hardware presence heartbeat for this long means the radar is gone.
pub const RADAR_TIMEOUT: Millis = 10_000;

/// No spoke data for this long while transmitting means "data lost".
pub const DATA_TIMEOUT: Millis = 5_000;

/// Stay-alive command interval while transmitting and displayed.
pub const STAYALIVE_INTERVAL: Millis = 5_000;

/// A value plus a generation counter bumped on every change.
///
/// Mutated only inside the shared critical section; consumers read a
/// snapshot and compare generations to detect transitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Versioned<T> {
    value: T,
    generation: u64,
}

impl<T: PartialEq + Clone> Versioned<T> {
    pub fn new(value: T) -> Self {
        Versioned {
            value,
            generation: 0,
        }
    }

    /// Store a new value; bumps the generation only on an actual change.
    pub fn set(&mut self, value: T) -> bool {
        if value != self.value {
            self.value = value;
            self.generation += 1;
            true
        } else {
            false
        }
    }

    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn snapshot(&self) -> (T, u64) {
        (self.value.clone(), self.generation)
    }

    pub fn changed_since(&self, generation: u64) -> bool {
        self.generation != generation
    }
}

/// Side effect of a state transition or a periodic check, dispatched by
/// the caller outside the lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    PowerOn,
    PowerOff,
    StayAlive,
    RequestRedraw,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RequestError {
    #[error("cannot request {requested} while {current}")]
    InvalidTransition {
        current: PowerState,
        requested: PowerState,
    },
    #[error("{requested} cannot be requested directly")]
    NotRequestable { requested: PowerState },
}

/// Timed-idle scheduler: alternates transmit and scheduled standby based
/// on user on/off durations. Inert while disabled or while the radar is
/// OFF, and never overrides a manual request (a manual request restarts
/// the cycle instead).
#[derive(Debug, Clone, Default)]
struct TimedIdleSchedule {
    enabled: bool,
    run_time: Millis,
    idle_time: Millis,
    next_transition: Option<Millis>,
}

/// State machine for one radar.
#[derive(Debug)]
pub struct RadarStateMachine {
    state: Versioned<PowerState>,
    presence_deadline: Option<Millis>,
    data_deadline: Option<Millis>,
    stayalive_deadline: Option<Millis>,
    /// "Radar currently displayed" gate for transmit requests and
    /// stay-alive emission.
    displayed: bool,
    timed_idle: TimedIdleSchedule,
}

impl Default for RadarStateMachine {
    fn default() -> Self {
        RadarStateMachine::new()
    }
}

impl RadarStateMachine {
    pub fn new() -> Self {
        RadarStateMachine {
            state: Versioned::new(PowerState::Off),
            presence_deadline: None,
            data_deadline: None,
            stayalive_deadline: None,
            displayed: false,
            timed_idle: TimedIdleSchedule::default(),
        }
    }

    pub fn state(&self) -> PowerState {
        *self.state.value()
    }

    pub fn state_snapshot(&self) -> (PowerState, u64) {
        self.state.snapshot()
    }

    pub fn state_changed_since(&self, generation: u64) -> bool {
        self.state.changed_since(generation)
    }

    pub fn set_displayed(&mut self, displayed: bool) {
        self.displayed = displayed;
    }

    pub fn displayed(&self) -> bool {
        self.displayed
    }

    /// Hardware presence heartbeat (beacon, report, anything from the
    /// scanner). Discovers an OFF radar into STANDBY; emits no commands.
    pub fn observe_presence(&mut self, now: Millis) {
        self.presence_deadline = Some(now + RADAR_TIMEOUT);
        if self.state() == PowerState::Off {
            self.state.set(PowerState::Standby);
        }
    }

    /// Spoke data heartbeat; refreshes both the data and presence windows.
    pub fn observe_data(&mut self, now: Millis) {
        self.presence_deadline = Some(now + RADAR_TIMEOUT);
        if self.data_deadline.is_some() {
            self.data_deadline = Some(now + DATA_TIMEOUT);
        }
    }

    /// The radar reported its own status. WARMING_UP and SPINNING_UP are
    /// only ever entered through here; we never command them.
    pub fn observe_reported_status(&mut self, reported: PowerState, now: Millis) -> Vec<Effect> {
        self.presence_deadline = Some(now + RADAR_TIMEOUT);

        let current = self.state();
        match reported {
            PowerState::Off | PowerState::TimedIdle => Vec::new(),
            // The scanner reports plain standby during the scheduled idle
            // phase; keep showing timed idle.
            PowerState::Standby if current == PowerState::TimedIdle => Vec::new(),
            PowerState::Standby => {
                self.data_deadline = None;
                self.state.set(PowerState::Standby);
                Vec::new()
            }
            PowerState::WarmingUp | PowerState::SpinningUp => {
                self.state.set(reported);
                Vec::new()
            }
            PowerState::Transmit => {
                if self.state.set(PowerState::Transmit) {
                    self.data_deadline = Some(now + DATA_TIMEOUT);
                    self.stayalive_deadline = Some(now + STAYALIVE_INTERVAL);
                    vec![Effect::RequestRedraw]
                } else {
                    Vec::new()
                }
            }
        }
    }

    /// Explicit user request. TRANSMIT is only reachable from STANDBY and
    /// only while the radar is displayed; STANDBY from TRANSMIT or the
    /// timed-idle phase. Everything else is rejected for the caller to log.
    pub fn request_state(
        &mut self,
        requested: PowerState,
        now: Millis,
    ) -> Result<Vec<Effect>, RequestError> {
        let current = self.state();
        match requested {
            PowerState::Transmit => {
                if current != PowerState::Standby || !self.displayed {
                    return Err(RequestError::InvalidTransition { current, requested });
                }
                self.restart_timed_idle(PowerState::Transmit, now);
                Ok(self.enter_transmit(now))
            }
            PowerState::Standby => {
                if !matches!(current, PowerState::Transmit | PowerState::TimedIdle) {
                    return Err(RequestError::InvalidTransition { current, requested });
                }
                self.restart_timed_idle(PowerState::Standby, now);
                Ok(self.enter_standby())
            }
            PowerState::Off
            | PowerState::WarmingUp
            | PowerState::SpinningUp
            | PowerState::TimedIdle => Err(RequestError::NotRequestable { requested }),
        }
    }

    /// Configure the timed-idle scheduler. Durations are minutes of
    /// transmit (run) and standby (idle) per cycle.
    pub fn configure_timed_idle(
        &mut self,
        enabled: bool,
        run_minutes: u32,
        idle_minutes: u32,
        now: Millis,
    ) {
        self.timed_idle.enabled = enabled && run_minutes > 0 && idle_minutes > 0;
        self.timed_idle.run_time = run_minutes as Millis * 60_000;
        self.timed_idle.idle_time = idle_minutes as Millis * 60_000;
        if !self.timed_idle.enabled {
            self.timed_idle.next_transition = None;
        } else if self.state() != PowerState::Off {
            let phase = if self.state() == PowerState::Transmit {
                self.timed_idle.run_time
            } else {
                self.timed_idle.idle_time
            };
            self.timed_idle.next_transition = Some(now + phase);
        }
    }

    /// Periodic state check. Applies at most one transition, in strict
    /// precedence: data timeout, then presence timeout, then the timed-idle
    /// schedule. Stay-alive is emitted only on ticks without a transition.
    pub fn tick(&mut self, now: Millis) -> Vec<Effect> {
        // Data lost while transmitting
        if self.state() == PowerState::Transmit {
            if let Some(deadline) = self.data_deadline {
                if now >= deadline {
                    return self.enter_standby();
                }
            }
        }

        // Hardware gone
        if self.state() != PowerState::Off {
            if let Some(deadline) = self.presence_deadline {
                if now >= deadline {
                    self.state.set(PowerState::Off);
                    self.presence_deadline = None;
                    self.data_deadline = None;
                    self.stayalive_deadline = None;
                    self.timed_idle.next_transition = None;
                    return Vec::new();
                }
            }
        }

        // Timed-idle alternation
        if self.timed_idle.enabled && self.state() != PowerState::Off {
            if let Some(at) = self.timed_idle.next_transition {
                if now >= at {
                    match self.state() {
                        PowerState::Transmit => {
                            self.timed_idle.next_transition = Some(now + self.timed_idle.idle_time);
                            self.state.set(PowerState::TimedIdle);
                            self.data_deadline = None;
                            self.stayalive_deadline = None;
                            return vec![Effect::PowerOff];
                        }
                        PowerState::TimedIdle => {
                            self.timed_idle.next_transition = Some(now + self.timed_idle.run_time);
                            return self.enter_transmit(now);
                        }
                        _ => {
                            // Cycle interrupted (warming up, standby by
                            // hand); wait for the next configure/request.
                            self.timed_idle.next_transition = None;
                        }
                    }
                }
            }
        }

        // Keep the scanner's client window open
        if self.state() == PowerState::Transmit && self.displayed {
            if let Some(deadline) = self.stayalive_deadline {
                if now >= deadline {
                    self.stayalive_deadline = Some(now + STAYALIVE_INTERVAL);
                    return vec![Effect::StayAlive];
                }
            }
        }

        Vec::new()
    }

    fn enter_transmit(&mut self, now: Millis) -> Vec<Effect> {
        self.state.set(PowerState::Transmit);
        self.data_deadline = Some(now + DATA_TIMEOUT);
        self.stayalive_deadline = Some(now + STAYALIVE_INTERVAL);
        vec![Effect::PowerOn, Effect::RequestRedraw]
    }

    fn enter_standby(&mut self) -> Vec<Effect> {
        self.state.set(PowerState::Standby);
        self.data_deadline = None;
        self.stayalive_deadline = None;
        vec![Effect::PowerOff]
    }

    /// Status values in the format expected by status consumers.
    pub fn to_status_map(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("power".to_string(), serde_json::json!(self.state().to_string()));
        map.insert("generation".to_string(), serde_json::json!(self.state.generation()));
        map.insert("displayed".to_string(), serde_json::json!(self.displayed));
        map.insert(
            "timedIdle".to_string(),
            serde_json::json!(self.timed_idle.enabled),
        );
        map
    }

    fn restart_timed_idle(&mut self, entering: PowerState, now: Millis) {
        if self.timed_idle.enabled {
            let phase = if entering == PowerState::Transmit {
                self.timed_idle.run_time
            } else {
                self.timed_idle.idle_time
            };
            self.timed_idle.next_transition = Some(now + phase);
        }
    }
}
