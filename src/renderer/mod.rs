//! Rendering seam
//!
//! The core never draws. Once per loop iteration it hands a [`FrameSnapshot`]
//! to a [`Renderer`]; a UI on another thread can instead read the latest
//! frame through a [`SharedFrame`].

pub mod snapshot;

use std::sync::Arc;

use parking_lot::RwLock;

pub use snapshot::{
    BallView, BombView, EffectView, EnemyView, FrameSnapshot, PlayerView, PowerUpView,
};

/// Receives one snapshot per loop iteration
pub trait Renderer: Send {
    fn render(&mut self, frame: &Arc<FrameSnapshot>);
}

/// Counts frames and draws nothing
#[derive(Debug, Default)]
pub struct NullRenderer {
    pub frames: u64,
}

impl Renderer for NullRenderer {
    fn render(&mut self, _frame: &Arc<FrameSnapshot>) {
        self.frames += 1;
    }
}

/// Latest frame, readable from any thread
#[derive(Debug, Clone)]
pub struct SharedFrame {
    inner: Arc<RwLock<Arc<FrameSnapshot>>>,
}

impl Default for SharedFrame {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedFrame {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(FrameSnapshot::empty()))),
        }
    }

    pub fn publish(&self, frame: Arc<FrameSnapshot>) {
        *self.inner.write() = frame;
    }

    /// Cheap clone of the most recent frame
    pub fn latest(&self) -> Arc<FrameSnapshot> {
        Arc::clone(&self.inner.read())
    }
}

impl Renderer for SharedFrame {
    fn render(&mut self, frame: &Arc<FrameSnapshot>) {
        self.publish(Arc::clone(frame));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_frame_publishes_latest() {
        let shared = SharedFrame::new();
        let reader = shared.clone();
        assert_eq!(reader.latest().frame, 0);

        let mut frame = FrameSnapshot::empty();
        frame.frame = 7;
        let mut renderer = shared;
        renderer.render(&Arc::new(frame));
        assert_eq!(reader.latest().frame, 7);
    }
}
