//! Input events with bounded per-frame draining

use crossbeam_channel::{Receiver, Sender, TryRecvError, bounded};
use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Most events drained in one frame; the rest wait for the next
pub const MAX_EVENTS_PER_FRAME: usize = 100;

/// Held movement keys
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementIntent {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
}

impl MovementIntent {
    pub const IDLE: MovementIntent = MovementIntent {
        up: false,
        down: false,
        left: false,
        right: false,
    };

    /// Unit direction (zero when idle or opposing keys cancel)
    pub fn direction(&self) -> Vec2 {
        let axis = |neg: bool, pos: bool| (pos as i8 - neg as i8) as f32;
        // Screen space: y grows downward
        Vec2::new(axis(self.left, self.right), axis(self.up, self.down)).normalize_or_zero()
    }
}

/// Discrete actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputAction {
    /// Leave the menu
    Start,
    /// Toggle pause
    Pause,
    Dash,
    /// New game after game over (or any time)
    Restart,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputEvent {
    Movement(MovementIntent),
    Action(InputAction),
    /// Window closed or the embedder wants out
    Quit,
}

/// Loop control signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickControl {
    Continue,
    Exit,
}

/// Drains the input channel once per frame
#[derive(Debug)]
pub struct InputCollector {
    receiver: Receiver<InputEvent>,
    intent: MovementIntent,
    actions: Vec<InputAction>,
}

/// Bounded input channel: the sender goes to the platform layer
pub fn input_channel(capacity: usize) -> (Sender<InputEvent>, InputCollector) {
    let (tx, rx) = bounded(capacity.max(1));
    (tx, InputCollector::new(rx))
}

impl InputCollector {
    pub fn new(receiver: Receiver<InputEvent>) -> Self {
        Self {
            receiver,
            intent: MovementIntent::IDLE,
            actions: Vec::with_capacity(8),
        }
    }

    /// Collect pending events (bounded to prevent starvation)
    pub fn collect_frame(&mut self) -> TickControl {
        self.actions.clear();
        let mut drained = 0;

        while drained < MAX_EVENTS_PER_FRAME {
            match self.receiver.try_recv() {
                Ok(InputEvent::Movement(intent)) => self.intent = intent,
                Ok(InputEvent::Action(action)) => self.actions.push(action),
                Ok(InputEvent::Quit) => return TickControl::Exit,
                Err(TryRecvError::Disconnected) => return TickControl::Exit,
                Err(TryRecvError::Empty) => break,
            }
            drained += 1;
        }

        if drained >= MAX_EVENTS_PER_FRAME {
            log::warn!("Input backlog: drained {} events this frame", drained);
        }
        TickControl::Continue
    }

    /// Latest movement state
    pub fn intent(&self) -> MovementIntent {
        self.intent
    }

    /// Actions collected this frame, in arrival order
    pub fn actions(&self) -> &[InputAction] {
        &self.actions
    }

    /// Take this frame's actions, leaving the buffer empty
    pub fn take_actions(&mut self) -> Vec<InputAction> {
        std::mem::take(&mut self.actions)
    }
}
