use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};
use miette::{IntoDiagnostic, Result};
use tokio::sync::mpsc;
use tokio_graceful_shutdown::{SubsystemBuilder, SubsystemHandle, Toplevel};

use pelorus_core::{
    Legend, PipelineSettings, PowerState, RadarFamily, RadarStateMachine, RangeNegotiator,
    SpokePipeline,
};
use pelorus_server::control::LogHardware;
use pelorus_server::{
    now_millis, CommandDispatcher, Emulator, LogRenderer, RadarCore, RadarHandle, RenderTicker,
    SpokeReceiver, StateTicker,
};

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
enum FamilyArg {
    Magnetron,
    SolidState,
}

impl From<FamilyArg> for RadarFamily {
    fn from(arg: FamilyArg) -> Self {
        match arg {
            FamilyArg::Magnetron => RadarFamily::Magnetron,
            FamilyArg::SolidState => RadarFamily::SolidState,
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "pelorus-server",
    about = "Radar spoke processing runtime with emulated decoder"
)]
struct Args {
    #[command(flatten)]
    verbosity: Verbosity<InfoLevel>,

    /// Radar family to emulate
    #[arg(long, value_enum, default_value_t = FamilyArg::Magnetron)]
    family: FamilyArg,

    /// Operating range in meters
    #[arg(long, default_value_t = 1852)]
    range: u32,

    /// Antenna rotation period in milliseconds
    #[arg(long, default_value_t = 2500)]
    rotation_ms: u64,

    /// Display refresh interval in milliseconds
    #[arg(long, default_value_t = 500)]
    refresh_ms: u64,

    /// Stop after this many seconds (runs until interrupted when absent)
    #[arg(long)]
    seconds: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    env_logger::Builder::new()
        .filter_level(args.verbosity.log_level_filter())
        .init();

    let family: RadarFamily = args.family.into();
    let characteristics = family.characteristics();
    let key = "radar-1".to_string();

    let (command_tx, command_rx) = mpsc::channel(32);
    let (spoke_tx, spoke_rx) = mpsc::channel(256);

    let core = RadarCore {
        pipeline: SpokePipeline::new(
            characteristics.clone(),
            Legend::default(),
            PipelineSettings::default(),
        ),
        state: RadarStateMachine::new(),
        negotiator: RangeNegotiator::new(),
        renderer: Box::new(LogRenderer::new(key.clone())),
    };
    let handle = RadarHandle::new(key.clone(), core, command_tx);

    let dispatcher = CommandDispatcher::new(
        key.clone(),
        command_rx,
        Arc::new(LogHardware::new(key.clone())),
    );
    let receiver = SpokeReceiver::new(handle.clone(), spoke_rx);
    let emulator = Emulator::new(
        key.clone(),
        characteristics,
        args.range,
        Duration::from_millis(args.rotation_ms),
        spoke_tx,
    );
    let state_ticker = StateTicker::new(handle.clone());
    let render_ticker = RenderTicker::new(handle.clone(), Duration::from_millis(args.refresh_ms));

    let startup = handle.clone();
    let seconds = args.seconds;

    Toplevel::new(move |s: SubsystemHandle| async move {
        s.start(SubsystemBuilder::new("commands", |h| dispatcher.run(h)));
        s.start(SubsystemBuilder::new("spokes", |h| receiver.run(h)));
        s.start(SubsystemBuilder::new("emulator", |h| emulator.run(h)));
        s.start(SubsystemBuilder::new("state", |h| state_ticker.run(h)));
        s.start(SubsystemBuilder::new("render", |h| render_ticker.run(h)));

        if let Some(seconds) = seconds {
            s.start(SubsystemBuilder::new(
                "deadline",
                move |h: SubsystemHandle| async move {
                    tokio::select! {
                        _ = h.on_shutdown_requested() => {}
                        _ = tokio::time::sleep(Duration::from_secs(seconds)) => {
                            log::info!("run time elapsed, shutting down");
                            h.request_shutdown();
                        }
                    }
                    Ok::<(), anyhow::Error>(())
                },
            ));
        }

        // The emulated scanner is present and on screen; bring it to
        // transmit as soon as it reports standby.
        let now = now_millis();
        {
            let mut core = startup.lock();
            core.state.set_displayed(true);
            core.state.observe_reported_status(PowerState::Standby, now);
        }
        startup.request_state(PowerState::Transmit).await;
    })
    .catch_signals()
    .handle_shutdown_requests(Duration::from_millis(2000))
    .await
    .into_diagnostic()
}
