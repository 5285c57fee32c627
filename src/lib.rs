//! Ball Frenzy - concurrent simulation core for an arcade survival game
//!
//! Core modules:
//! - `sim`: Entities, registries, collision resolution and timed effects
//! - `runtime`: Worker pool, periodic tasks, spawners and lifecycle management
//! - `game_loop`: Fixed timestep loop driving logic updates and rendering
//! - `renderer`: Read-only frame snapshots for the rendering collaborator
//! - `platform`: Movement intents and discrete input actions
//! - `settings`: Difficulty presets and profiles

pub mod effects;
pub mod error;
pub mod game_loop;
pub mod highscores;
pub mod platform;
pub mod renderer;
pub mod runtime;
pub mod settings;
pub mod sim;

pub use error::{CoreError, CoreResult};
pub use game_loop::GameLoop;
pub use highscores::{HighScores, ScoreSink};
pub use runtime::LifecycleManager;
pub use settings::{Difficulty, DifficultyProfile, LevelParams};

use glam::Vec2;

/// Game configuration constants
pub mod consts {
    use std::time::Duration;

    /// Fixed logic timestep (60 Hz)
    pub const TICK_DT: f32 = 1.0 / 60.0;
    /// Maximum logic updates per loop iteration to prevent spiral of death
    pub const MAX_SUBSTEPS: u32 = 8;
    /// Longest wall-clock gap fed into the accumulator in one iteration
    pub const MAX_FRAME_GAP: f32 = 0.25;

    /// Visible arena dimensions
    pub const ARENA_WIDTH: f32 = 800.0;
    pub const ARENA_HEIGHT: f32 = 600.0;

    /// Player defaults
    pub const PLAYER_START_SIZE: f32 = 24.0;
    pub const PLAYER_MAX_SIZE: f32 = 72.0;
    pub const PLAYER_GROWTH_PER_BALL: f32 = 0.4;
    pub const PLAYER_BASE_SPEED: f32 = 240.0;
    pub const PLAYER_TRAIL_LENGTH: usize = 12;
    /// Invincibility window granted after taking damage
    pub const DAMAGE_GRACE_SECS: f32 = 3.0;
    /// Dash burst
    pub const DASH_SPEED_FACTOR: f32 = 2.5;
    pub const DASH_SECS: f32 = 0.25;
    pub const DASH_COOLDOWN_SECS: f32 = 1.5;
    pub const MAX_SHIELD_CHARGES: u32 = 3;

    /// Ball defaults
    pub const MIN_BALL_SIZE: f32 = 8.0;
    pub const MAX_BALL_SIZE: f32 = 60.0;
    /// Chance a ghost ball ignores an overlap
    pub const GHOST_MISS_CHANCE: f64 = 0.3;
    /// Chance per tick a homing ball re-aims at its target
    pub const HOMING_STEER_CHANCE: f64 = 0.15;
    /// Blend toward the target heading when a homing ball steers
    pub const HOMING_STEER_STRENGTH: f32 = 0.35;
    /// Bounce budget range for bouncy balls (inclusive)
    pub const MIN_BOUNCES: u32 = 3;
    pub const MAX_BOUNCES: u32 = 7;
    /// Split children speed up relative to their parent
    pub const SPLIT_SPEED_FACTOR: f32 = 1.2;

    /// Enemy defaults
    pub const TRACKER_SIZE: f32 = 28.0;
    pub const BOMBER_SIZE: f32 = 34.0;
    pub const ENEMY_HIT_COOLDOWN_SECS: f32 = 0.5;
    pub const TRACKER_KILL_SCORE: u64 = 50;
    pub const BOMBER_KILL_SCORE: u64 = 75;
    pub const MAX_BOMBS_PER_BOMBER: usize = 3;
    pub const BOMB_SIZE: f32 = 14.0;
    pub const BOMB_BLAST_SIZE: f32 = 64.0;
    pub const BOMB_FUSE_SECS: f32 = 2.0;
    pub const BOMB_BLAST_SECS: f32 = 0.5;

    /// Power-up defaults
    pub const POWERUP_SIZE: f32 = 20.0;
    pub const POWERUP_LIFETIME_SECS: f32 = 10.0;
    pub const POWERUP_RESPAWN_MIN_SECS: f32 = 3.0;
    pub const POWERUP_RESPAWN_MAX_SECS: f32 = 8.0;
    pub const SPEED_BOOST_FACTOR: f32 = 1.6;
    pub const SCORE_MULTIPLIER: u64 = 2;
    pub const TIME_SLOW_FACTOR: f32 = 0.5;

    /// Runtime bounds
    pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(2);
    pub const LOCK_TIMEOUT: Duration = Duration::from_millis(5);
    pub const TICK_JOB_TIMEOUT: Duration = Duration::from_millis(50);
    pub const STATS_INTERVAL: Duration = Duration::from_secs(1);
}

/// Arena size as a vector
#[inline]
pub fn arena_size() -> Vec2 {
    Vec2::new(consts::ARENA_WIDTH, consts::ARENA_HEIGHT)
}

/// Clamp a center point so a body of `size` stays inside the arena
#[inline]
pub fn clamp_to_arena(pos: Vec2, size: f32, arena: Vec2) -> Vec2 {
    let half = (size / 2.0).min(arena.x / 2.0).min(arena.y / 2.0);
    pos.clamp(Vec2::splat(half), arena - Vec2::splat(half))
}

/// Milliseconds since the Unix epoch (0 if the clock is before it)
pub fn unix_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
