//! Difficulty presets and profiles
//!
//! A `DifficultyProfile` is immutable once handed to the lifecycle manager.
//! Per-level numbers are derived on demand through [`DifficultyProfile::at_level`].

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Difficulty preset levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Difficulty {
    Easy,
    #[default]
    Normal,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Normal => "Normal",
            Difficulty::Hard => "Hard",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "easy" => Some(Difficulty::Easy),
            "normal" | "med" | "medium" => Some(Difficulty::Normal),
            "hard" => Some(Difficulty::Hard),
            _ => None,
        }
    }

    /// Profile for this preset
    pub fn profile(&self) -> DifficultyProfile {
        DifficultyProfile::for_difficulty(*self)
    }
}

/// Smallest spawn/cleanup interval a profile may ask for
pub const MIN_INTERVAL_MS: u64 = 50;
/// Levels beyond this stop scaling
pub const MAX_SCALED_LEVEL: u32 = 30;

/// Named numeric parameters for one difficulty
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DifficultyProfile {
    pub difficulty: Difficulty,

    // === Population caps ===
    pub max_balls: usize,
    pub max_tracker_enemies: usize,
    pub max_bomber_enemies: usize,
    pub max_powerups: usize,
    pub max_total_entities: usize,

    // === Spawn cadence ===
    pub ball_spawn_interval_ms: u64,
    pub tracker_spawn_interval_ms: u64,
    pub bomber_spawn_interval_ms: u64,
    pub powerup_spawn_interval_ms: u64,
    pub cleanup_interval_ms: u64,

    // === Entity tuning ===
    pub ball_speed: f32,
    pub tracker_speed: f32,
    pub bomber_speed: f32,
    pub tracker_health: u32,
    pub bomber_health: u32,
    pub bomb_drop_interval_secs: f32,
    pub powerup_duration_secs: f32,

    // === Player / progression ===
    pub starting_lives: u32,
    pub level_score_step: u64,
    /// Extra ball slots per level
    pub ball_cap_growth: usize,
    /// Fractional speed gain per level
    pub speed_growth: f32,
    /// Fractional spawn interval shrink per level
    pub spawn_interval_decay: f32,

    // === Runtime ===
    pub worker_threads: usize,
}

impl Default for DifficultyProfile {
    fn default() -> Self {
        Self::for_difficulty(Difficulty::Normal)
    }
}

impl DifficultyProfile {
    /// Preset values for a difficulty
    pub fn for_difficulty(difficulty: Difficulty) -> Self {
        let normal = Self {
            difficulty: Difficulty::Normal,
            max_balls: 20,
            max_tracker_enemies: 4,
            max_bomber_enemies: 2,
            max_powerups: 2,
            max_total_entities: 40,
            ball_spawn_interval_ms: 800,
            tracker_spawn_interval_ms: 5_000,
            bomber_spawn_interval_ms: 9_000,
            powerup_spawn_interval_ms: 4_000,
            cleanup_interval_ms: 500,
            ball_speed: 120.0,
            tracker_speed: 90.0,
            bomber_speed: 70.0,
            tracker_health: 2,
            bomber_health: 3,
            bomb_drop_interval_secs: 3.0,
            powerup_duration_secs: 8.0,
            starting_lives: 3,
            level_score_step: 500,
            ball_cap_growth: 2,
            speed_growth: 0.08,
            spawn_interval_decay: 0.08,
            worker_threads: 4,
        };

        match difficulty {
            Difficulty::Normal => normal,
            Difficulty::Easy => Self {
                difficulty,
                max_tracker_enemies: 2,
                max_bomber_enemies: 1,
                max_powerups: 3,
                max_total_entities: 32,
                tracker_spawn_interval_ms: 7_000,
                bomber_spawn_interval_ms: 12_000,
                powerup_spawn_interval_ms: 3_000,
                ball_speed: 95.0,
                tracker_speed: 70.0,
                bomber_speed: 55.0,
                tracker_health: 1,
                bomber_health: 2,
                bomb_drop_interval_secs: 4.5,
                powerup_duration_secs: 10.0,
                starting_lives: 5,
                speed_growth: 0.05,
                spawn_interval_decay: 0.05,
                ..normal
            },
            Difficulty::Hard => Self {
                difficulty,
                max_balls: 28,
                max_tracker_enemies: 6,
                max_bomber_enemies: 3,
                max_powerups: 1,
                max_total_entities: 56,
                ball_spawn_interval_ms: 600,
                tracker_spawn_interval_ms: 3_500,
                bomber_spawn_interval_ms: 6_000,
                powerup_spawn_interval_ms: 6_000,
                ball_speed: 150.0,
                tracker_speed: 115.0,
                bomber_speed: 90.0,
                tracker_health: 3,
                bomber_health: 4,
                bomb_drop_interval_secs: 2.0,
                powerup_duration_secs: 6.0,
                starting_lives: 2,
                speed_growth: 0.1,
                spawn_interval_decay: 0.1,
                ..normal
            },
        }
    }

    /// Parse a profile from JSON. Missing fields take Normal values.
    pub fn from_json(json: &str) -> CoreResult<Self> {
        let profile: Self =
            serde_json::from_str(json).map_err(|e| CoreError::InvalidConfig(e.to_string()))?;
        Ok(profile.sanitized())
    }

    /// Clamp malformed values to safe minimums
    pub fn sanitized(mut self) -> Self {
        self.max_balls = at_least("max_balls", self.max_balls, 1);
        self.max_tracker_enemies = at_least("max_tracker_enemies", self.max_tracker_enemies, 1);
        self.max_bomber_enemies = at_least("max_bomber_enemies", self.max_bomber_enemies, 1);
        self.max_powerups = at_least("max_powerups", self.max_powerups, 1);
        self.max_total_entities = at_least("max_total_entities", self.max_total_entities, 1);

        self.ball_spawn_interval_ms =
            at_least("ball_spawn_interval_ms", self.ball_spawn_interval_ms, MIN_INTERVAL_MS);
        self.tracker_spawn_interval_ms =
            at_least("tracker_spawn_interval_ms", self.tracker_spawn_interval_ms, MIN_INTERVAL_MS);
        self.bomber_spawn_interval_ms =
            at_least("bomber_spawn_interval_ms", self.bomber_spawn_interval_ms, MIN_INTERVAL_MS);
        self.powerup_spawn_interval_ms =
            at_least("powerup_spawn_interval_ms", self.powerup_spawn_interval_ms, MIN_INTERVAL_MS);
        self.cleanup_interval_ms =
            at_least("cleanup_interval_ms", self.cleanup_interval_ms, MIN_INTERVAL_MS);

        self.ball_speed = positive("ball_speed", self.ball_speed, 10.0);
        self.tracker_speed = positive("tracker_speed", self.tracker_speed, 10.0);
        self.bomber_speed = positive("bomber_speed", self.bomber_speed, 10.0);
        self.tracker_health = at_least("tracker_health", self.tracker_health, 1);
        self.bomber_health = at_least("bomber_health", self.bomber_health, 1);
        self.bomb_drop_interval_secs =
            positive("bomb_drop_interval_secs", self.bomb_drop_interval_secs, 0.5);
        self.powerup_duration_secs =
            positive("powerup_duration_secs", self.powerup_duration_secs, 1.0);

        self.starting_lives = at_least("starting_lives", self.starting_lives, 1);
        self.level_score_step = at_least("level_score_step", self.level_score_step, 1);
        self.speed_growth = non_negative("speed_growth", self.speed_growth);
        self.spawn_interval_decay =
            non_negative("spawn_interval_decay", self.spawn_interval_decay).min(0.5);
        self.worker_threads = at_least("worker_threads", self.worker_threads, 1);
        self
    }

    /// Derived parameters for a level (1-based)
    pub fn at_level(&self, level: u32) -> LevelParams {
        let level = level.clamp(1, MAX_SCALED_LEVEL);
        let steps = (level - 1) as usize;
        let speed = 1.0 + self.speed_growth * steps as f32;
        let interval = (1.0 - self.spawn_interval_decay).powi(steps as i32);
        let scale_ms = |ms: u64| {
            Duration::from_millis(((ms as f32 * interval) as u64).max(MIN_INTERVAL_MS))
        };

        let extra_balls = self.ball_cap_growth * steps;
        let extra_enemies = steps / 2;

        LevelParams {
            level,
            max_balls: self.max_balls + extra_balls,
            max_tracker_enemies: self.max_tracker_enemies + extra_enemies,
            max_bomber_enemies: self.max_bomber_enemies + extra_enemies / 2,
            max_powerups: self.max_powerups,
            max_total_entities: self.max_total_entities + extra_balls + extra_enemies * 2,
            ball_spawn_interval: scale_ms(self.ball_spawn_interval_ms),
            tracker_spawn_interval: scale_ms(self.tracker_spawn_interval_ms),
            bomber_spawn_interval: scale_ms(self.bomber_spawn_interval_ms),
            powerup_spawn_interval: Duration::from_millis(self.powerup_spawn_interval_ms),
            cleanup_interval: Duration::from_millis(self.cleanup_interval_ms),
            ball_speed: self.ball_speed * speed,
            tracker_speed: self.tracker_speed * speed,
            bomber_speed: self.bomber_speed * speed,
            tracker_health: self.tracker_health + level / 5,
            bomber_health: self.bomber_health + level / 5,
            bomb_drop_interval_secs: self.bomb_drop_interval_secs / speed,
            powerup_duration_secs: self.powerup_duration_secs,
        }
    }

    /// Level reached at a given score
    pub fn level_for_score(&self, score: u64) -> u32 {
        let step = self.level_score_step.max(1);
        (1 + score / step).min(u32::MAX as u64) as u32
    }
}

/// Per-level numbers looked up each time a spawner or pass runs
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelParams {
    pub level: u32,
    pub max_balls: usize,
    pub max_tracker_enemies: usize,
    pub max_bomber_enemies: usize,
    pub max_powerups: usize,
    pub max_total_entities: usize,
    pub ball_spawn_interval: Duration,
    pub tracker_spawn_interval: Duration,
    pub bomber_spawn_interval: Duration,
    pub powerup_spawn_interval: Duration,
    pub cleanup_interval: Duration,
    pub ball_speed: f32,
    pub tracker_speed: f32,
    pub bomber_speed: f32,
    pub tracker_health: u32,
    pub bomber_health: u32,
    pub bomb_drop_interval_secs: f32,
    pub powerup_duration_secs: f32,
}

fn at_least<T: PartialOrd + Copy + std::fmt::Debug>(name: &str, value: T, min: T) -> T {
    if value < min {
        log::warn!("Config `{}` = {:?} below minimum, clamped to {:?}", name, value, min);
        min
    } else {
        value
    }
}

fn positive(name: &str, value: f32, fallback: f32) -> f32 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        log::warn!("Config `{}` = {} is not positive, using {}", name, value, fallback);
        fallback
    }
}

fn non_negative(name: &str, value: f32) -> f32 {
    if value.is_finite() && value >= 0.0 {
        value
    } else {
        log::warn!("Config `{}` = {} is negative, using 0", name, value);
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_difficulty_from_str() {
        assert_eq!(Difficulty::from_str("HARD"), Some(Difficulty::Hard));
        assert_eq!(Difficulty::from_str("easy"), Some(Difficulty::Easy));
        assert_eq!(Difficulty::from_str("medium"), Some(Difficulty::Normal));
        assert_eq!(Difficulty::from_str("nightmare"), None);
        assert_eq!(Difficulty::Hard.as_str(), "Hard");
    }

    #[test]
    fn test_presets_scale_with_difficulty() {
        let easy = Difficulty::Easy.profile();
        let normal = Difficulty::Normal.profile();
        let hard = Difficulty::Hard.profile();
        assert!(easy.max_tracker_enemies < normal.max_tracker_enemies);
        assert!(normal.max_tracker_enemies < hard.max_tracker_enemies);
        assert!(easy.starting_lives > hard.starting_lives);
        assert!(hard.ball_speed > easy.ball_speed);
    }

    #[test]
    fn test_zero_cap_is_clamped() {
        let profile = DifficultyProfile {
            max_balls: 0,
            max_total_entities: 0,
            ball_spawn_interval_ms: 0,
            ball_speed: -3.0,
            worker_threads: 0,
            ..Default::default()
        }
        .sanitized();
        assert_eq!(profile.max_balls, 1);
        assert_eq!(profile.max_total_entities, 1);
        assert_eq!(profile.ball_spawn_interval_ms, MIN_INTERVAL_MS);
        assert_eq!(profile.ball_speed, 10.0);
        assert_eq!(profile.worker_threads, 1);
    }

    #[test]
    fn test_from_json_partial_and_invalid() {
        let profile = DifficultyProfile::from_json(r#"{"max_balls": 0, "starting_lives": 7}"#)
            .expect("partial profile parses");
        assert_eq!(profile.max_balls, 1);
        assert_eq!(profile.starting_lives, 7);
        assert_eq!(profile.max_tracker_enemies, 4);

        let err = DifficultyProfile::from_json("{ not json").unwrap_err();
        assert!(matches!(err, CoreError::InvalidConfig(_)));
    }

    #[test]
    fn test_at_level_scaling() {
        let profile = DifficultyProfile::default();
        let l1 = profile.at_level(1);
        let l5 = profile.at_level(5);
        assert_eq!(l1.max_balls, profile.max_balls);
        assert!(l5.max_balls > l1.max_balls);
        assert!(l5.ball_spawn_interval < l1.ball_spawn_interval);
        assert!(l5.tracker_speed > l1.tracker_speed);
        // Level 0 is treated as level 1
        assert_eq!(profile.at_level(0), l1);
    }

    #[test]
    fn test_level_for_score() {
        let profile = DifficultyProfile::default();
        assert_eq!(profile.level_for_score(0), 1);
        assert_eq!(profile.level_for_score(499), 1);
        assert_eq!(profile.level_for_score(500), 2);
        assert_eq!(profile.level_for_score(1750), 4);
    }

    proptest! {
        #[test]
        fn prop_sanitized_profiles_are_usable(
            max_balls in 0usize..100,
            total in 0usize..200,
            interval in 0u64..10_000,
            speed in -500.0f32..500.0,
            level in 0u32..100,
        ) {
            let profile = DifficultyProfile {
                max_balls,
                max_total_entities: total,
                ball_spawn_interval_ms: interval,
                tracker_speed: speed,
                ..Default::default()
            }
            .sanitized();
            let params = profile.at_level(level);
            prop_assert!(params.max_balls >= 1);
            prop_assert!(params.max_total_entities >= 1);
            prop_assert!(params.ball_spawn_interval >= Duration::from_millis(MIN_INTERVAL_MS));
            prop_assert!(params.tracker_speed > 0.0);
        }
    }
}
