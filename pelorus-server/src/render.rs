//! Renderer Collaborators
//!
//! Real deployments hand the pipeline an OpenGL or framebuffer renderer;
//! the server ships a logging implementation for the demo binary and
//! headless runs.

use pelorus_core::SpokeRenderer;

/// Counts spokes and frames, logging at a low rate.
pub struct LogRenderer {
    key: String,
    spokes: u64,
    frames: u64,
}

impl LogRenderer {
    pub fn new(key: String) -> Self {
        LogRenderer {
            key,
            spokes: 0,
            frames: 0,
        }
    }
}

impl SpokeRenderer for LogRenderer {
    fn process_spoke(&mut self, _transparency: u8, rotation_slot: usize, data: &[u8], len: usize) {
        self.spokes += 1;
        if self.spokes % 4096 == 0 {
            let lit = data[..len].iter().filter(|&&v| v > 0).count();
            log::debug!(
                "{}: {} spokes, slot {} has {} lit cells",
                self.key,
                self.spokes,
                rotation_slot,
                lit
            );
        }
    }

    fn draw_frame(&mut self) {
        self.frames += 1;
        log::trace!("{}: frame {}", self.key, self.frames);
    }
}
