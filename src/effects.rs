//! Fire-and-forget effect requests and the short-lived visuals they spawn
//!
//! The core posts an [`EffectEvent`] for every collect, hit, explosion and
//! power-up. Sinks must never block the game loop: the channel sink uses
//! `try_send` and counts what it had to drop.

use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_channel::{Receiver, Sender, TrySendError, bounded};
use glam::Vec2;
use serde::Serialize;

use crate::sim::ball::BallKind;
use crate::sim::enemy::EnemyClass;
use crate::sim::powerup::PowerUpKind;

/// Visual or audio feedback request
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EffectEvent {
    Collect { pos: Vec2, kind: BallKind, points: u64 },
    Split { pos: Vec2, children: usize },
    PowerUp { pos: Vec2, kind: PowerUpKind },
    PowerUpExpired { kind: PowerUpKind },
    EnemyHit { pos: Vec2, remaining: u32 },
    Explosion { pos: Vec2, class: EnemyClass, points: u64 },
    ShieldBlock { pos: Vec2 },
    PlayerHit { pos: Vec2, lives_left: u32 },
    Dash { pos: Vec2 },
    LevelUp { level: u32 },
    GameOver { score: u64 },
}

impl EffectEvent {
    /// Stable name, used as the sound cue key by audio collaborators
    pub fn name(&self) -> &'static str {
        match self {
            EffectEvent::Collect { .. } => "collect",
            EffectEvent::Split { .. } => "split",
            EffectEvent::PowerUp { .. } => "powerup",
            EffectEvent::PowerUpExpired { .. } => "powerup_expired",
            EffectEvent::EnemyHit { .. } => "enemy_hit",
            EffectEvent::Explosion { .. } => "explosion",
            EffectEvent::ShieldBlock { .. } => "shield_block",
            EffectEvent::PlayerHit { .. } => "player_hit",
            EffectEvent::Dash { .. } => "dash",
            EffectEvent::LevelUp { .. } => "level_up",
            EffectEvent::GameOver { .. } => "game_over",
        }
    }

    pub fn pos(&self) -> Option<Vec2> {
        match *self {
            EffectEvent::Collect { pos, .. }
            | EffectEvent::Split { pos, .. }
            | EffectEvent::PowerUp { pos, .. }
            | EffectEvent::EnemyHit { pos, .. }
            | EffectEvent::Explosion { pos, .. }
            | EffectEvent::ShieldBlock { pos }
            | EffectEvent::PlayerHit { pos, .. }
            | EffectEvent::Dash { pos } => Some(pos),
            EffectEvent::PowerUpExpired { .. }
            | EffectEvent::LevelUp { .. }
            | EffectEvent::GameOver { .. } => None,
        }
    }
}

/// Receives effect requests; must return immediately
pub trait EffectSink: Send {
    fn post(&self, event: EffectEvent);
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullEffectSink;

impl EffectSink for NullEffectSink {
    fn post(&self, _event: EffectEvent) {}
}

/// Bounded channel sink; a slow consumer loses events, never the loop
#[derive(Debug)]
pub struct ChannelEffectSink {
    tx: Sender<EffectEvent>,
    dropped: AtomicU64,
}

impl ChannelEffectSink {
    /// Sink plus the receiving end for the effects collaborator
    pub fn new(capacity: usize) -> (Self, Receiver<EffectEvent>) {
        let (tx, rx) = bounded(capacity.max(1));
        (
            Self {
                tx,
                dropped: AtomicU64::new(0),
            },
            rx,
        )
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl EffectSink for ChannelEffectSink {
    fn post(&self, event: EffectEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                log::trace!("Effect queue full, dropped {} ({} total)", event.name(), dropped);
            }
            Err(TrySendError::Disconnected(_)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

/// Shape of an on-screen effect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VisualKind {
    Sparkle,
    Burst,
    Ring,
    Flash,
}

/// A fading on-screen effect
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VisualEffect {
    pub pos: Vec2,
    pub kind: VisualKind,
    /// 1.0 when spawned, removed at 0
    pub life: f32,
    pub size: f32,
}

/// Maximum live visual effects
pub const MAX_VISUALS: usize = 128;

/// Visual effects owned by the game loop
#[derive(Debug, Clone, Default)]
pub struct VisualEffects {
    items: Vec<VisualEffect>,
}

impl VisualEffects {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn the visual matching an event, if it has one
    pub fn push_for(&mut self, event: &EffectEvent) {
        let Some(pos) = event.pos() else {
            return;
        };
        let (kind, size) = match event {
            EffectEvent::Collect { .. } => (VisualKind::Sparkle, 16.0),
            EffectEvent::Split { .. } => (VisualKind::Sparkle, 28.0),
            EffectEvent::Explosion { .. } => (VisualKind::Burst, 56.0),
            EffectEvent::EnemyHit { .. } => (VisualKind::Burst, 24.0),
            EffectEvent::PowerUp { .. } | EffectEvent::ShieldBlock { .. } => (VisualKind::Ring, 40.0),
            EffectEvent::PlayerHit { .. } | EffectEvent::Dash { .. } => (VisualKind::Flash, 48.0),
            _ => return,
        };
        if self.items.len() >= MAX_VISUALS {
            self.items.remove(0);
        }
        self.items.push(VisualEffect {
            pos,
            kind,
            life: 1.0,
            size,
        });
    }

    /// Fade everything; effects last `1 / rate` seconds
    pub fn advance(&mut self, dt: f32) {
        const FADE_RATE: f32 = 2.0;
        for item in &mut self.items {
            item.life -= dt * FADE_RATE;
        }
        self.items.retain(|item| item.life > 0.0);
    }

    pub fn iter(&self) -> impl Iterator<Item = &VisualEffect> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_sink_drops_when_full() {
        let (sink, rx) = ChannelEffectSink::new(2);
        for level in 0..5 {
            sink.post(EffectEvent::LevelUp { level });
        }
        assert_eq!(sink.dropped(), 3);
        assert_eq!(rx.try_iter().count(), 2);
    }

    #[test]
    fn test_disconnected_sink_does_not_block() {
        let (sink, rx) = ChannelEffectSink::new(1);
        drop(rx);
        sink.post(EffectEvent::GameOver { score: 1 });
        assert_eq!(sink.dropped(), 1);
    }

    #[test]
    fn test_visuals_fade_out() {
        let mut visuals = VisualEffects::new();
        visuals.push_for(&EffectEvent::ShieldBlock { pos: Vec2::ONE });
        visuals.push_for(&EffectEvent::LevelUp { level: 2 });
        assert_eq!(visuals.len(), 1);

        visuals.advance(0.25);
        assert_eq!(visuals.len(), 1);
        visuals.advance(0.3);
        assert!(visuals.is_empty());
    }

    #[test]
    fn test_visuals_are_bounded() {
        let mut visuals = VisualEffects::new();
        for _ in 0..(MAX_VISUALS + 10) {
            visuals.push_for(&EffectEvent::Dash { pos: Vec2::ZERO });
        }
        assert_eq!(visuals.len(), MAX_VISUALS);
    }

    #[test]
    fn test_event_serializes_tagged() {
        let json = serde_json::to_string(&EffectEvent::LevelUp { level: 3 }).unwrap();
        assert_eq!(json, r#"{"type":"level_up","level":3}"#);
    }
}
