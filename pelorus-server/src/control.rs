//! Hardware Command Dispatch
//!
//! Radar hardware commands are fire-and-forget UDP sends on real radars:
//! a failure is logged and the state machine detects true unresponsiveness
//! via its timeouts. Commands are queued on a channel inside the critical
//! section and executed here, outside any lock.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_graceful_shutdown::SubsystemHandle;

/// Settings forwarded verbatim to the radar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ControlKind {
    Gain,
    Sea,
    Rain,
    InterferenceRejection,
    ScanSpeed,
    BearingAlignment,
}

#[derive(Debug, Error)]
pub enum HardwareError {
    #[error("command send failed: {0}")]
    Send(String),
}

/// One queued hardware command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RadarCommand {
    PowerOn,
    PowerOff,
    SetRange(u32),
    StayAlive,
    SetControl(ControlKind, i32),
}

/// Hardware-control collaborator: the per-family command encoder and
/// socket live behind this trait.
#[async_trait]
pub trait HardwareControl: Send + Sync {
    async fn power_on(&self) -> Result<(), HardwareError>;
    async fn power_off(&self) -> Result<(), HardwareError>;
    async fn set_range(&self, meters: u32) -> Result<(), HardwareError>;
    async fn stay_alive(&self) -> Result<(), HardwareError>;
    async fn set_control_value(&self, kind: ControlKind, value: i32) -> Result<(), HardwareError>;
}

/// Drains the command channel into the hardware collaborator.
pub struct CommandDispatcher {
    key: String,
    rx: mpsc::Receiver<RadarCommand>,
    hardware: Arc<dyn HardwareControl>,
}

impl CommandDispatcher {
    pub fn new(key: String, rx: mpsc::Receiver<RadarCommand>, hardware: Arc<dyn HardwareControl>) -> Self {
        CommandDispatcher { key, rx, hardware }
    }

    pub async fn run(mut self, subsys: SubsystemHandle) -> anyhow::Result<()> {
        loop {
            tokio::select! {
                _ = subsys.on_shutdown_requested() => break,
                command = self.rx.recv() => match command {
                    Some(command) => self.execute(command).await,
                    None => break,
                },
            }
        }
        log::debug!("{}: command dispatcher stopped", self.key);
        Ok(())
    }

    async fn execute(&self, command: RadarCommand) {
        let result = match command {
            RadarCommand::PowerOn => self.hardware.power_on().await,
            RadarCommand::PowerOff => self.hardware.power_off().await,
            RadarCommand::SetRange(meters) => self.hardware.set_range(meters).await,
            RadarCommand::StayAlive => self.hardware.stay_alive().await,
            RadarCommand::SetControl(kind, value) => {
                self.hardware.set_control_value(kind, value).await
            }
        };
        match result {
            Ok(()) => log::trace!("{}: sent {:?}", self.key, command),
            // Non-fatal: the state machine times out if the radar is gone.
            Err(e) => log::warn!("{}: {:?} failed: {}", self.key, command, e),
        }
    }
}

/// Hardware collaborator that only logs, for the demo binary.
pub struct LogHardware {
    key: String,
}

impl LogHardware {
    pub fn new(key: String) -> Self {
        LogHardware { key }
    }
}

#[async_trait]
impl HardwareControl for LogHardware {
    async fn power_on(&self) -> Result<(), HardwareError> {
        log::info!("{}: transmit on", self.key);
        Ok(())
    }

    async fn power_off(&self) -> Result<(), HardwareError> {
        log::info!("{}: transmit off", self.key);
        Ok(())
    }

    async fn set_range(&self, meters: u32) -> Result<(), HardwareError> {
        log::info!("{}: range {} meters", self.key, meters);
        Ok(())
    }

    async fn stay_alive(&self) -> Result<(), HardwareError> {
        log::trace!("{}: stay-alive", self.key);
        Ok(())
    }

    async fn set_control_value(&self, kind: ControlKind, value: i32) -> Result<(), HardwareError> {
        log::info!("{}: control {:?} = {}", self.key, kind, value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio_graceful_shutdown::{SubsystemBuilder, Toplevel};

    /// Fails every command but counts them, like a dead UDP peer.
    struct FlakyHardware {
        attempts: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl HardwareControl for FlakyHardware {
        async fn power_on(&self) -> Result<(), HardwareError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(HardwareError::Send("host unreachable".into()))
        }

        async fn power_off(&self) -> Result<(), HardwareError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(HardwareError::Send("host unreachable".into()))
        }

        async fn set_range(&self, _meters: u32) -> Result<(), HardwareError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(HardwareError::Send("host unreachable".into()))
        }

        async fn stay_alive(&self) -> Result<(), HardwareError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(HardwareError::Send("host unreachable".into()))
        }

        async fn set_control_value(&self, _: ControlKind, _: i32) -> Result<(), HardwareError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(HardwareError::Send("host unreachable".into()))
        }
    }

    #[tokio::test]
    async fn test_command_failures_are_non_fatal() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let hardware = Arc::new(FlakyHardware {
            attempts: attempts.clone(),
        });
        let (tx, rx) = mpsc::channel(8);
        let dispatcher = CommandDispatcher::new("radar-1".into(), rx, hardware);

        tx.send(RadarCommand::PowerOn).await.unwrap();
        tx.send(RadarCommand::SetRange(1852)).await.unwrap();
        tx.send(RadarCommand::StayAlive).await.unwrap();
        drop(tx);

        // The dispatcher must survive every failure and drain the queue.
        Toplevel::new(move |s| async move {
            s.start(SubsystemBuilder::new("commands", |h| dispatcher.run(h)));
        })
        .handle_shutdown_requests(std::time::Duration::from_millis(500))
        .await
        .unwrap();

        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }
}
