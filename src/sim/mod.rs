//! Simulation module
//!
//! Entities, their registries and everything the game-loop thread does once
//! per tick:
//! - Bodies only mutate themselves in `advance`
//! - Structural registry changes take the write lock, scans the read lock
//! - Player, score, lives and effects are owned by the loop thread
//! - No rendering or platform dependencies

pub mod ball;
pub mod collision;
pub mod enemy;
pub mod entity;
pub mod geometry;
pub mod player;
pub mod powerup;
pub mod registry;
pub mod state;
pub mod tick;
pub mod timed_effect;
pub mod world;

pub use ball::{Ball, BallKind};
pub use collision::{CollisionContext, CollisionReport, resolve_collisions};
pub use enemy::{Behavior, Bomb, Enemy, EnemyClass, HitOutcome};
pub use entity::{AdvanceContext, Body, EntityId, Slot};
pub use geometry::Bounds;
pub use player::Player;
pub use powerup::{PowerUp, PowerUpKind};
pub use registry::Registry;
pub use state::{GamePhase, GameState, LoopCounters, RunState};
pub use tick::{Advancer, InlineAdvancer, Simulation, TickInput, TickOutcome};
pub use timed_effect::{Activation, ActiveEffects, TimedEffect};
pub use world::{Caps, Population, World};
