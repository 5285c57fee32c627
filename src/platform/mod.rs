//! Input seam between the platform layer and the core
//!
//! The platform turns key state into [`InputEvent`]s; debouncing and key
//! repeat stay on its side of the channel.

pub mod input;

pub use input::{
    InputAction, InputCollector, InputEvent, MovementIntent, TickControl, input_channel,
};
