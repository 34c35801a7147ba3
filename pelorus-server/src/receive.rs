//! Spoke Producer
//!
//! Consumes decoded spokes from the decoder collaborator and runs each one
//! through the pipeline under the per-radar lock. There is exactly one
//! producer per radar instance, so spoke processing is serialized by
//! construction; render passes contend only on the lock.
//!
//! Shutdown is cooperative: the subsystem drains until cancellation or
//! decoder disconnect and is joined by the toplevel before any shared
//! buffer is dropped.

use tokio::sync::mpsc;
use tokio_graceful_shutdown::SubsystemHandle;

use anyhow::Context;
use pelorus_core::Spoke;

use crate::radar::{now_millis, RadarHandle};

pub struct SpokeReceiver {
    handle: RadarHandle,
    rx: mpsc::Receiver<Spoke>,
}

impl SpokeReceiver {
    pub fn new(handle: RadarHandle, rx: mpsc::Receiver<Spoke>) -> Self {
        SpokeReceiver { handle, rx }
    }

    pub async fn run(mut self, subsys: SubsystemHandle) -> anyhow::Result<()> {
        let key = self.handle.key().to_string();
        loop {
            tokio::select! {
                _ = subsys.on_shutdown_requested() => break,
                spoke = self.rx.recv() => match spoke {
                    Some(mut spoke) => self
                        .process(&mut spoke)
                        .with_context(|| format!("{}: spoke processing failed", key))?,
                    None => {
                        log::debug!("{}: decoder disconnected", key);
                        break;
                    }
                },
            }
        }
        log::debug!("{}: spoke receiver stopped", key);
        Ok(())
    }

    fn process(&self, spoke: &mut Spoke) -> anyhow::Result<()> {
        let now = now_millis();
        let mut guard = self.handle.lock();
        let core = &mut *guard;
        core.state.observe_presence(now);
        core.state.observe_data(now);
        core.pipeline.process_spoke(spoke, core.renderer.as_mut())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio_graceful_shutdown::{SubsystemBuilder, Toplevel};

    use pelorus_core::{
        Legend, PipelineSettings, PowerState, RadarFamily, RangeNegotiator, RadarStateMachine,
        SpokePipeline, SpokeRenderer,
    };

    use crate::radar::RadarCore;

    struct CountingRenderer {
        spokes: Arc<AtomicUsize>,
    }

    impl SpokeRenderer for CountingRenderer {
        fn process_spoke(&mut self, _: u8, _: usize, _: &[u8], _: usize) {
            self.spokes.fetch_add(1, Ordering::SeqCst);
        }
        fn draw_frame(&mut self) {}
    }

    fn test_radar(spokes: Arc<AtomicUsize>) -> (RadarHandle, mpsc::Receiver<crate::control::RadarCommand>) {
        let (tx, rx) = mpsc::channel(8);
        let core = RadarCore {
            pipeline: SpokePipeline::new(
                RadarFamily::SolidState.characteristics(),
                Legend::default(),
                PipelineSettings::default(),
            ),
            state: RadarStateMachine::new(),
            negotiator: RangeNegotiator::new(),
            renderer: Box::new(CountingRenderer { spokes }),
        };
        (RadarHandle::new("radar-1".into(), core, tx), rx)
    }

    fn spoke(angle: usize) -> Spoke {
        Spoke {
            angle,
            bearing: angle,
            data: vec![0u8; 256],
            range_meters: 1852,
            time: 1_000 + angle as u64,
            pos: None,
        }
    }

    #[tokio::test]
    async fn test_spokes_flow_to_renderer_and_shutdown_joins() {
        let rendered = Arc::new(AtomicUsize::new(0));
        let (handle, _command_rx) = test_radar(rendered.clone());
        let (spoke_tx, spoke_rx) = mpsc::channel(16);
        let receiver = SpokeReceiver::new(handle.clone(), spoke_rx);

        for angle in 0..4 {
            spoke_tx.send(spoke(angle)).await.unwrap();
        }
        drop(spoke_tx); // decoder disconnect ends the producer

        Toplevel::new(move |s| async move {
            s.start(SubsystemBuilder::new("spokes", |h| receiver.run(h)));
        })
        .handle_shutdown_requests(Duration::from_millis(500))
        .await
        .unwrap();

        // First spoke triggers the geometry zap (one per rotation slot),
        // then every spoke is forwarded once.
        let spokes_per_rev = 1440;
        assert_eq!(rendered.load(Ordering::SeqCst), spokes_per_rev + 4);

        // Spoke data doubles as presence heartbeat.
        assert_eq!(handle.lock().state.state(), PowerState::Standby);
    }
}
