//! Timed power-up effects
//!
//! Each kind runs its own NONE -> ACTIVE(expiry) -> NONE machine. Distinct
//! kinds stack; collecting a kind that is already active pushes its expiry
//! out instead of starting a second copy. Shield and clear-screen are one-shot
//! and never enter the set.

use std::time::{Duration, Instant};

use serde::Serialize;

use super::player::Player;
use super::powerup::PowerUpKind;
use super::state::GameState;
use crate::consts::*;

/// One running effect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimedEffect {
    pub kind: PowerUpKind,
    #[serde(skip)]
    pub expires_at: Instant,
}

/// What `activate` did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    Started,
    Refreshed,
    /// Not a timed kind; nothing entered the set
    OneShot,
}

/// Active effects in the order they started
#[derive(Debug, Clone, Default)]
pub struct ActiveEffects {
    effects: Vec<TimedEffect>,
}

impl ActiveEffects {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn activate(&mut self, kind: PowerUpKind, now: Instant, duration: Duration) -> Activation {
        if !kind.is_timed() {
            return Activation::OneShot;
        }
        let expires_at = now + duration;
        match self.effects.iter_mut().find(|e| e.kind == kind) {
            Some(effect) => {
                effect.expires_at = effect.expires_at.max(expires_at);
                Activation::Refreshed
            }
            None => {
                self.effects.push(TimedEffect { kind, expires_at });
                Activation::Started
            }
        }
    }

    /// Drop every effect whose expiry has passed; returns the kinds removed
    pub fn expire(&mut self, now: Instant) -> Vec<PowerUpKind> {
        let mut expired = Vec::new();
        self.effects.retain(|e| {
            if now > e.expires_at {
                expired.push(e.kind);
                false
            } else {
                true
            }
        });
        expired
    }

    pub fn is_active(&self, kind: PowerUpKind) -> bool {
        self.effects.iter().any(|e| e.kind == kind)
    }

    pub fn remaining(&self, kind: PowerUpKind, now: Instant) -> Option<Duration> {
        self.effects
            .iter()
            .find(|e| e.kind == kind)
            .map(|e| e.expires_at.saturating_duration_since(now))
    }

    pub fn iter(&self) -> impl Iterator<Item = &TimedEffect> {
        self.effects.iter()
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }

    /// Most recently started effect (what a HUD shows first)
    pub fn primary(&self) -> Option<&TimedEffect> {
        self.effects.last()
    }

    pub fn clear(&mut self) {
        self.effects.clear();
    }

    pub fn score_multiplier(&self) -> u64 {
        if self.is_active(PowerUpKind::ScoreMultiplier) {
            SCORE_MULTIPLIER
        } else {
            1
        }
    }

    pub fn speed_factor(&self) -> f32 {
        if self.is_active(PowerUpKind::SpeedBoost) {
            SPEED_BOOST_FACTOR
        } else {
            1.0
        }
    }

    pub fn enemy_time_scale(&self) -> f32 {
        if self.is_active(PowerUpKind::TimeSlow) {
            TIME_SLOW_FACTOR
        } else {
            1.0
        }
    }

    pub fn invincible(&self) -> bool {
        self.is_active(PowerUpKind::Invincibility)
    }

    /// Recompute every controlled parameter from the current set.
    /// With nothing active this restores the defaults.
    pub fn apply(&self, player: &mut Player, state: &mut GameState) {
        player.speed = player.base_speed * self.speed_factor();
        player.effect_invincible = self.invincible();
        state.score_multiplier = self.score_multiplier();
        state.enemy_time_scale = self.enemy_time_scale();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECS: Duration = Duration::from_secs(5);

    #[test]
    fn test_distinct_kinds_stack() {
        let now = Instant::now();
        let mut effects = ActiveEffects::new();
        assert_eq!(
            effects.activate(PowerUpKind::SpeedBoost, now, SECS),
            Activation::Started
        );
        assert_eq!(
            effects.activate(PowerUpKind::ScoreMultiplier, now, SECS),
            Activation::Started
        );
        assert_eq!(effects.len(), 2);
        assert_eq!(effects.score_multiplier(), SCORE_MULTIPLIER);
        assert_eq!(effects.speed_factor(), SPEED_BOOST_FACTOR);
        assert_eq!(
            effects.primary().map(|e| e.kind),
            Some(PowerUpKind::ScoreMultiplier)
        );
    }

    #[test]
    fn test_recollect_refreshes() {
        let now = Instant::now();
        let mut effects = ActiveEffects::new();
        effects.activate(PowerUpKind::TimeSlow, now, SECS);
        let later = now + Duration::from_secs(3);
        assert_eq!(
            effects.activate(PowerUpKind::TimeSlow, later, SECS),
            Activation::Refreshed
        );
        assert_eq!(effects.len(), 1);
        assert_eq!(effects.remaining(PowerUpKind::TimeSlow, later), Some(SECS));
    }

    #[test]
    fn test_one_shot_kinds_skip_the_set() {
        let mut effects = ActiveEffects::new();
        let now = Instant::now();
        assert_eq!(
            effects.activate(PowerUpKind::Shield, now, SECS),
            Activation::OneShot
        );
        assert_eq!(
            effects.activate(PowerUpKind::ClearScreen, now, SECS),
            Activation::OneShot
        );
        assert!(effects.is_empty());
    }

    #[test]
    fn test_expiry_is_strict_and_restores_defaults() {
        let now = Instant::now();
        let arena = crate::arena_size();
        let mut player = Player::new(arena);
        let mut state = GameState::new(3);
        let mut effects = ActiveEffects::new();

        effects.activate(PowerUpKind::Invincibility, now, SECS);
        effects.activate(PowerUpKind::SpeedBoost, now, SECS);
        effects.apply(&mut player, &mut state);
        assert!(player.effect_invincible);
        assert_eq!(player.speed, PLAYER_BASE_SPEED * SPEED_BOOST_FACTOR);

        // Exactly at the deadline the effect still holds
        assert!(effects.expire(now + SECS).is_empty());

        let expired = effects.expire(now + SECS + Duration::from_millis(1));
        assert_eq!(
            expired,
            vec![PowerUpKind::Invincibility, PowerUpKind::SpeedBoost]
        );
        effects.apply(&mut player, &mut state);
        assert!(!player.effect_invincible);
        assert_eq!(player.speed, PLAYER_BASE_SPEED);
        assert_eq!(state.score_multiplier, 1);
        assert_eq!(state.enemy_time_scale, 1.0);
    }
}
