//! Read-only frame snapshots
//!
//! Captured once per loop iteration on the game-loop thread. A snapshot is a
//! plain copy, so the renderer can hold it as long as it likes while entities
//! keep appearing and disappearing in the live registries.

use std::time::Instant;

use glam::Vec2;
use serde::Serialize;

use crate::effects::VisualEffect;
use crate::sim::{
    BallKind, EnemyClass, GamePhase, Population, PowerUpKind, Registry, Simulation, World,
};
use crate::sim::entity::Body;

// ============================================================================
// VIEW TYPES
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct PlayerView {
    pub pos: Vec2,
    pub size: f32,
    pub invincible: bool,
    pub dashing: bool,
    pub shield_charges: u32,
    pub trail: Vec<Vec2>,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct BallView {
    pub pos: Vec2,
    pub size: f32,
    pub kind: BallKind,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct EnemyView {
    pub pos: Vec2,
    pub size: f32,
    pub class: EnemyClass,
    /// Remaining health as a fraction of the maximum
    pub health: f32,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct BombView {
    pub pos: Vec2,
    pub size: f32,
    pub exploding: bool,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct PowerUpView {
    pub pos: Vec2,
    pub size: f32,
    pub kind: PowerUpKind,
}

/// HUD entry for a running timed effect
#[derive(Debug, Clone, Copy, Serialize)]
pub struct EffectView {
    pub kind: PowerUpKind,
    pub remaining_secs: f32,
}

/// Everything a renderer needs for one frame
#[derive(Debug, Clone, Serialize)]
pub struct FrameSnapshot {
    pub frame: u64,
    pub phase: GamePhase,
    pub score: u64,
    pub level: u32,
    pub lives: u32,
    pub score_multiplier: u64,
    pub elapsed: f32,
    pub arena: Vec2,
    pub player: PlayerView,
    pub balls: Vec<BallView>,
    pub enemies: Vec<EnemyView>,
    pub bombs: Vec<BombView>,
    pub powerups: Vec<PowerUpView>,
    pub effects: Vec<EffectView>,
    pub visuals: Vec<VisualEffect>,
    pub population: Population,
}

impl FrameSnapshot {
    /// Copy the current state. A registry whose lock is contended is left
    /// empty for this frame.
    pub fn capture(sim: &Simulation, world: &World, now: Instant) -> Self {
        let player = &sim.player;
        let state = &sim.state;

        let balls = collect(&world.balls, |b| BallView {
            pos: b.pos,
            size: b.size,
            kind: b.kind,
        });
        let powerups = collect(&world.powerups, |p| PowerUpView {
            pos: p.pos,
            size: p.size * p.pulse_scale(),
            kind: p.kind,
        });

        let mut enemies = Vec::new();
        let mut bombs = Vec::new();
        for registry in [&world.trackers, &world.bombers] {
            let Ok(slots) = registry.try_snapshot() else {
                continue;
            };
            for slot in slots {
                slot.with(|e| {
                    enemies.push(EnemyView {
                        pos: e.pos,
                        size: e.size,
                        class: e.class(),
                        health: e.health as f32 / e.max_health.max(1) as f32,
                    });
                    bombs.extend(e.bombs().iter().filter(|b| !b.is_expired(now)).map(|b| {
                        BombView {
                            pos: b.pos,
                            size: b.bounds(now).size().x,
                            exploding: b.is_exploding(now),
                        }
                    }));
                });
            }
        }

        Self {
            frame: state.frames,
            phase: state.phase,
            score: state.score,
            level: state.level,
            lives: state.lives,
            score_multiplier: state.score_multiplier,
            elapsed: state.elapsed,
            arena: sim.arena(),
            player: PlayerView {
                pos: player.pos,
                size: player.size,
                invincible: player.is_invincible(now),
                dashing: player.is_dashing(now),
                shield_charges: player.shield_charges,
                trail: player.trail.iter().copied().collect(),
            },
            population: Population {
                balls: balls.len(),
                trackers: enemies.iter().filter(|e| e.class == EnemyClass::Tracker).count(),
                bombers: enemies.iter().filter(|e| e.class == EnemyClass::Bomber).count(),
                powerups: powerups.len(),
            },
            balls,
            enemies,
            bombs,
            powerups,
            effects: sim
                .effects
                .iter()
                .map(|e| EffectView {
                    kind: e.kind,
                    remaining_secs: e.expires_at.saturating_duration_since(now).as_secs_f32(),
                })
                .collect(),
            visuals: sim.visuals.iter().copied().collect(),
        }
    }

    /// Empty frame shown before the first capture
    pub fn empty() -> Self {
        Self {
            frame: 0,
            phase: GamePhase::Menu,
            score: 0,
            level: 1,
            lives: 0,
            score_multiplier: 1,
            elapsed: 0.0,
            arena: crate::arena_size(),
            player: PlayerView {
                pos: crate::arena_size() / 2.0,
                size: crate::consts::PLAYER_START_SIZE,
                invincible: false,
                dashing: false,
                shield_charges: 0,
                trail: Vec::new(),
            },
            balls: Vec::new(),
            enemies: Vec::new(),
            bombs: Vec::new(),
            powerups: Vec::new(),
            effects: Vec::new(),
            visuals: Vec::new(),
            population: Population::default(),
        }
    }
}

fn collect<T: Body, V>(registry: &Registry<T>, view: impl Fn(&T) -> V) -> Vec<V> {
    match registry.try_snapshot() {
        Ok(slots) => slots.iter().map(|slot| slot.with(&view)).collect(),
        Err(e) => {
            log::debug!("Snapshot skipped {}: {}", registry.name(), e);
            Vec::new()
        }
    }
}
