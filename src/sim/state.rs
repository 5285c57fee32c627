//! Game state and the run flags shared with background tasks
//!
//! [`GameState`] is owned by the game-loop thread. [`RunState`] and
//! [`LoopCounters`] are the small atomic views spawners and the stats task
//! read without touching it.

use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU32, AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Current phase of the game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum GamePhase {
    /// Title screen, waiting for start
    #[default]
    Menu,
    /// Active gameplay
    Running,
    /// Game is paused
    Paused,
    /// Lives exhausted; terminal until restart
    GameOver,
}

impl GamePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            GamePhase::Menu => "menu",
            GamePhase::Running => "running",
            GamePhase::Paused => "paused",
            GamePhase::GameOver => "game_over",
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => GamePhase::Running,
            2 => GamePhase::Paused,
            3 => GamePhase::GameOver,
            _ => GamePhase::Menu,
        }
    }
}

/// Score, lives and counters of one game
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameState {
    pub score: u64,
    /// Current level (1-based)
    pub level: u32,
    pub lives: u32,
    pub phase: GamePhase,
    /// Applied to every score award
    pub score_multiplier: u64,
    /// Scales the dt handed to enemies
    pub enemy_time_scale: f32,
    /// Logic updates run
    pub updates: u64,
    /// Frames rendered
    pub frames: u64,
    /// Seconds of running gameplay
    pub elapsed: f32,
    pub balls_eaten: u64,
    pub enemies_destroyed: u64,
    #[serde(default)]
    game_over_reported: bool,
}

impl GameState {
    pub fn new(lives: u32) -> Self {
        Self {
            score: 0,
            level: 1,
            lives,
            phase: GamePhase::Menu,
            score_multiplier: 1,
            enemy_time_scale: 1.0,
            updates: 0,
            frames: 0,
            elapsed: 0.0,
            balls_eaten: 0,
            enemies_destroyed: 0,
            game_over_reported: false,
        }
    }

    /// Award `base` points scaled by the multiplier; returns points added
    pub fn add_score(&mut self, base: u64) -> u64 {
        let points = base.saturating_mul(self.score_multiplier.max(1));
        self.score = self.score.saturating_add(points);
        points
    }

    /// Take one life. Returns true only for the hit that ends the game.
    pub fn lose_life(&mut self) -> bool {
        if self.phase == GamePhase::GameOver {
            return false;
        }
        self.lives = self.lives.saturating_sub(1);
        if self.lives == 0 {
            self.phase = GamePhase::GameOver;
            true
        } else {
            false
        }
    }

    pub fn is_game_over(&self) -> bool {
        self.phase == GamePhase::GameOver
    }

    /// True the first time it is called after game over
    pub fn take_game_over_report(&mut self) -> bool {
        if self.is_game_over() && !self.game_over_reported {
            self.game_over_reported = true;
            true
        } else {
            false
        }
    }
}

/// Phase and level mirrored for spawners, plus the generation stop flag
#[derive(Debug)]
pub struct RunState {
    phase: AtomicU8,
    level: AtomicU32,
    stopped: AtomicBool,
    generation: u64,
}

impl RunState {
    pub fn new(generation: u64) -> Self {
        Self {
            phase: AtomicU8::new(GamePhase::Menu as u8),
            level: AtomicU32::new(1),
            stopped: AtomicBool::new(false),
            generation,
        }
    }

    pub fn phase(&self) -> GamePhase {
        GamePhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    pub fn set_phase(&self, phase: GamePhase) {
        self.phase.store(phase as u8, Ordering::Release);
    }

    pub fn level(&self) -> u32 {
        self.level.load(Ordering::Acquire).max(1)
    }

    pub fn set_level(&self, level: u32) {
        self.level.store(level, Ordering::Release);
    }

    /// Spawning allowed: game running and this generation not stopped
    pub fn is_running(&self) -> bool {
        !self.is_stopped() && self.phase() == GamePhase::Running
    }

    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// Update and frame counts since the stats task last looked
#[derive(Debug, Default)]
pub struct LoopCounters {
    updates: AtomicU64,
    frames: AtomicU64,
}

impl LoopCounters {
    pub fn record_update(&self) {
        self.updates.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_frame(&self) {
        self.frames.fetch_add(1, Ordering::Relaxed);
    }

    /// Read and zero both counters: (updates, frames)
    pub fn take(&self) -> (u64, u64) {
        (
            self.updates.swap(0, Ordering::Relaxed),
            self.frames.swap(0, Ordering::Relaxed),
        )
    }
}
