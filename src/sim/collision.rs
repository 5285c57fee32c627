//! Player-versus-world collision resolution
//!
//! Runs once per tick on the game-loop thread after every body has advanced.
//! Order: balls, power-ups, trackers, bombers (with their bombs). Each active
//! entity is looked at once per pass; balls reset during the pass are not
//! revisited and split children first collide on the next tick.

use std::time::{Duration, Instant};

use glam::Vec2;
use rand::Rng;
use rand_pcg::Pcg32;

use super::ball::{Ball, BallKind};
use super::enemy::{Enemy, HitOutcome};
use super::entity::{Body, Slot};
use super::geometry::Bounds;
use super::player::Player;
use super::powerup::PowerUpKind;
use super::registry::Registry;
use super::state::GameState;
use super::timed_effect::ActiveEffects;
use super::world::{Caps, World};
use crate::consts::*;
use crate::effects::EffectEvent;
use crate::settings::LevelParams;

/// Everything one pass reads and writes
pub struct CollisionContext<'a> {
    pub world: &'a World,
    pub player: &'a mut Player,
    pub state: &'a mut GameState,
    pub effects: &'a mut ActiveEffects,
    pub params: &'a LevelParams,
    pub rng: &'a mut Pcg32,
    pub arena: Vec2,
    pub now: Instant,
}

/// What happened during one pass
#[derive(Debug, Default)]
pub struct CollisionReport {
    pub events: Vec<EffectEvent>,
    pub balls_eaten: u32,
    pub split_children: usize,
    pub shield_blocks: u32,
    pub damage_taken: u32,
    pub powerups_collected: Vec<PowerUpKind>,
    pub enemies_destroyed: u32,
    /// Registries skipped because their lock timed out
    pub skipped_passes: u32,
    /// This pass ended the game
    pub game_over: bool,
}

/// Test the player against every live entity and apply the outcomes
pub fn resolve_collisions(ctx: &mut CollisionContext<'_>) -> CollisionReport {
    let mut report = CollisionReport::default();
    if ctx.state.is_game_over() {
        return report;
    }

    let world = ctx.world;
    let player_bounds = ctx.player.bounds();

    resolve_balls(ctx, &player_bounds, &mut report);
    if !ctx.state.is_game_over() {
        resolve_powerups(ctx, &player_bounds, &mut report);
    }
    for registry in [&world.trackers, &world.bombers] {
        if ctx.state.is_game_over() {
            break;
        }
        resolve_enemies(ctx, registry, &player_bounds, &mut report);
    }

    report
}

fn resolve_balls(ctx: &mut CollisionContext<'_>, player_bounds: &Bounds, report: &mut CollisionReport) {
    let balls = match ctx.world.balls.try_snapshot() {
        Ok(balls) => balls,
        Err(e) => {
            log::warn!("Ball collision pass skipped: {}", e);
            report.skipped_passes += 1;
            return;
        }
    };

    for slot in &balls {
        if ctx.state.is_game_over() {
            break;
        }
        if !slot.is_active() || !slot.with_mut(|ball| ball.overlaps(player_bounds)) {
            continue;
        }

        let (pos, size, kind, value) = slot.with(|b| (b.pos, b.size, b.kind, b.score_value));
        if size < ctx.player.size || ctx.player.is_invincible(ctx.now) {
            let points = ctx.state.add_score(value);
            ctx.state.balls_eaten += 1;
            report.balls_eaten += 1;
            ctx.player.grow();
            report.events.push(EffectEvent::Collect { pos, kind, points });

            if kind == BallKind::Splitter {
                split_ball(ctx, slot, pos, report);
            }
        } else if ctx.player.consume_shield() {
            report.shield_blocks += 1;
            report.events.push(EffectEvent::ShieldBlock { pos });
        } else {
            damage_player(ctx, report);
        }

        let arena = ctx.arena;
        slot.respawn(|ball| ball.reset(arena));
    }
}

/// Hand a splitter's children to the ball registry; children over the caps
/// are dropped
fn split_ball(ctx: &mut CollisionContext<'_>, slot: &Slot<Ball>, pos: Vec2, report: &mut CollisionReport) {
    let children = slot.with_mut(|ball| ball.split());
    let caps = Caps::balls(ctx.params);
    let mut spawned = 0;
    for child in children {
        match ctx.world.spawn_ball(child, caps) {
            Ok(_) => spawned += 1,
            Err(e) => log::debug!("Split child dropped: {}", e),
        }
    }
    if spawned > 0 {
        report.split_children += spawned;
        report.events.push(EffectEvent::Split {
            pos,
            children: spawned,
        });
    }
}

fn resolve_powerups(ctx: &mut CollisionContext<'_>, player_bounds: &Bounds, report: &mut CollisionReport) {
    let powerups = match ctx.world.powerups.try_snapshot() {
        Ok(powerups) => powerups,
        Err(e) => {
            log::warn!("Power-up collision pass skipped: {}", e);
            report.skipped_passes += 1;
            return;
        }
    };

    for slot in &powerups {
        if !slot.bounds().intersects(player_bounds) || !slot.deactivate() {
            continue;
        }
        let (kind, pos) = slot.with(|p| (p.kind, p.pos));
        apply_powerup(ctx, kind);
        report.powerups_collected.push(kind);
        report.events.push(EffectEvent::PowerUp { pos, kind });

        let delay = ctx
            .rng
            .random_range(POWERUP_RESPAWN_MIN_SECS..=POWERUP_RESPAWN_MAX_SECS);
        ctx.world
            .schedule_powerup_respawn(ctx.now, Duration::from_secs_f32(delay));
    }
}

fn apply_powerup(ctx: &mut CollisionContext<'_>, kind: PowerUpKind) {
    match kind {
        PowerUpKind::ClearScreen => {
            let cleared = ctx.world.clear_enemies();
            log::debug!("Clear screen removed {} enemies", cleared);
        }
        PowerUpKind::Shield => {
            if !ctx.player.add_shield() {
                log::trace!("Shield already full");
            }
        }
        _ => {
            let duration = Duration::from_secs_f32(ctx.params.powerup_duration_secs);
            let activation = ctx.effects.activate(kind, ctx.now, duration);
            log::debug!("{} {:?}", kind.as_str(), activation);
        }
    }
    ctx.effects.apply(ctx.player, ctx.state);
}

fn resolve_enemies(
    ctx: &mut CollisionContext<'_>,
    registry: &Registry<Enemy>,
    player_bounds: &Bounds,
    report: &mut CollisionReport,
) {
    let scanned = registry.scan(|slots| {
        for slot in slots {
            if ctx.state.is_game_over() {
                break;
            }
            if !slot.is_active() {
                continue;
            }
            slot.with_mut(|enemy| {
                if enemy.bounds().intersects(player_bounds) {
                    enemy_contact(ctx, slot, enemy, report);
                }
                if !ctx.state.is_game_over() {
                    bomb_contacts(ctx, enemy, player_bounds, report);
                }
            });
        }
    });
    if let Err(e) = scanned {
        log::warn!("Enemy collision pass skipped: {}", e);
        report.skipped_passes += 1;
    }
}

fn enemy_contact(
    ctx: &mut CollisionContext<'_>,
    slot: &Slot<Enemy>,
    enemy: &mut Enemy,
    report: &mut CollisionReport,
) {
    if ctx.player.is_invincible(ctx.now) {
        strike_enemy(ctx, slot, enemy, report);
    } else if ctx.player.consume_shield() {
        block_with_shield(ctx, report);
        strike_enemy(ctx, slot, enemy, report);
    } else {
        damage_player(ctx, report);
    }
}

fn strike_enemy(
    ctx: &mut CollisionContext<'_>,
    slot: &Slot<Enemy>,
    enemy: &mut Enemy,
    report: &mut CollisionReport,
) {
    match enemy.hit(ctx.now) {
        HitOutcome::Ignored => {}
        HitOutcome::Damaged { remaining } => {
            report.events.push(EffectEvent::EnemyHit {
                pos: enemy.pos,
                remaining,
            });
        }
        HitOutcome::Destroyed => {
            if slot.deactivate() {
                let class = enemy.class();
                let points = ctx.state.add_score(class.kill_score());
                ctx.state.enemies_destroyed += 1;
                report.enemies_destroyed += 1;
                report.events.push(EffectEvent::Explosion {
                    pos: enemy.pos,
                    class,
                    points,
                });
            }
        }
    }
}

/// Only exploding bombs hurt, and each one at most once
fn bomb_contacts(
    ctx: &mut CollisionContext<'_>,
    enemy: &mut Enemy,
    player_bounds: &Bounds,
    report: &mut CollisionReport,
) {
    let now = ctx.now;
    for bomb in enemy.bombs_mut() {
        if bomb.spent || !bomb.is_exploding(now) || !bomb.bounds(now).intersects(player_bounds) {
            continue;
        }
        bomb.spent = true;
        if ctx.player.is_invincible(now) {
            continue;
        }
        if ctx.player.consume_shield() {
            block_with_shield(ctx, report);
        } else {
            damage_player(ctx, report);
        }
        if ctx.state.is_game_over() {
            break;
        }
    }
}

/// A blocked enemy or bomb hit also starts the grace window so one sustained
/// overlap costs a single charge
fn block_with_shield(ctx: &mut CollisionContext<'_>, report: &mut CollisionReport) {
    ctx.player.grant_grace(ctx.now);
    report.shield_blocks += 1;
    report.events.push(EffectEvent::ShieldBlock {
        pos: ctx.player.pos,
    });
}

fn damage_player(ctx: &mut CollisionContext<'_>, report: &mut CollisionReport) {
    if ctx.state.is_game_over() || ctx.player.is_invincible(ctx.now) {
        return;
    }
    report.damage_taken += 1;
    let ended = ctx.state.lose_life();
    ctx.player.grant_grace(ctx.now);
    report.events.push(EffectEvent::PlayerHit {
        pos: ctx.player.pos,
        lives_left: ctx.state.lives,
    });

    if ended {
        report.game_over = true;
        report.events.push(EffectEvent::GameOver {
            score: ctx.state.score,
        });
        log::debug!("Last life lost at score {}", ctx.state.score);
    }
}
