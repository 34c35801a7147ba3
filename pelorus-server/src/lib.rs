//! Tokio runtime for the Pelorus radar spoke processing engine.
//!
//! Owns the concurrency model around `pelorus-core`: one producer task per
//! radar feeding the pipeline, periodic state and render subsystems, and a
//! hardware command dispatcher, all sharing a single per-radar mutex and
//! shut down cancel-then-join via `tokio-graceful-shutdown`.

pub mod control;
pub mod emulator;
pub mod radar;
pub mod receive;
pub mod render;
pub mod tasks;

pub use control::{CommandDispatcher, ControlKind, HardwareControl, HardwareError, RadarCommand};
pub use emulator::Emulator;
pub use radar::{now_millis, RadarCore, RadarHandle};
pub use receive::SpokeReceiver;
pub use render::LogRenderer;
pub use tasks::{RenderTicker, StateTicker};
