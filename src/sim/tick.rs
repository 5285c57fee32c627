//! Fixed timestep logic update
//!
//! [`Simulation`] owns everything only the game-loop thread may touch: the
//! player, score and lives, timed effects and visuals. Entity bodies live in
//! the shared [`World`] and are advanced through an [`Advancer`].

use std::sync::Arc;
use std::time::Instant;

use glam::Vec2;
use rand::SeedableRng;
use rand_pcg::Pcg32;

use super::collision::{CollisionContext, CollisionReport, resolve_collisions};
use super::entity::AdvanceContext;
use super::player::Player;
use super::state::{GamePhase, GameState};
use super::timed_effect::ActiveEffects;
use super::world::World;
use crate::consts::*;
use crate::effects::{EffectEvent, VisualEffects};
use crate::error::CoreResult;
use crate::settings::{DifficultyProfile, LevelParams};

/// Advances every live body of a world by one step
pub trait Advancer {
    /// `bodies` drives balls and power-ups, `enemies` drives both enemy kinds
    fn advance_world(
        &self,
        world: &World,
        bodies: &AdvanceContext,
        enemies: &AdvanceContext,
    ) -> CoreResult<()>;
}

/// Advances on the calling thread
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineAdvancer;

impl Advancer for InlineAdvancer {
    fn advance_world(
        &self,
        world: &World,
        bodies: &AdvanceContext,
        enemies: &AdvanceContext,
    ) -> CoreResult<()> {
        let mut skipped = None;
        for slot in world.balls.snapshot_or_skip(&mut skipped) {
            slot.advance(bodies);
        }
        for slot in world.powerups.snapshot_or_skip(&mut skipped) {
            slot.advance(bodies);
        }
        for slot in world.trackers.snapshot_or_skip(&mut skipped) {
            slot.advance(enemies);
        }
        for slot in world.bombers.snapshot_or_skip(&mut skipped) {
            slot.advance(enemies);
        }
        skipped.map_or(Ok(()), Err)
    }
}

/// Input commands for a single tick
#[derive(Debug, Clone, Copy, Default)]
pub struct TickInput {
    /// Unit movement direction (zero when idle)
    pub direction: Vec2,
    /// Dash requested this tick
    pub dash: bool,
}

/// What one update produced
#[derive(Debug, Default)]
pub struct TickOutcome {
    pub events: Vec<EffectEvent>,
    pub collisions: CollisionReport,
    pub level_up: Option<u32>,
    pub game_over: bool,
}

/// Loop-thread game state
#[derive(Debug)]
pub struct Simulation {
    pub player: Player,
    pub state: GameState,
    pub effects: ActiveEffects,
    pub visuals: VisualEffects,
    profile: Arc<DifficultyProfile>,
    rng: Pcg32,
    arena: Vec2,
}

impl Simulation {
    pub fn new(profile: Arc<DifficultyProfile>, seed: u64) -> Self {
        let arena = crate::arena_size();
        Self {
            player: Player::new(arena),
            state: GameState::new(profile.starting_lives),
            effects: ActiveEffects::new(),
            visuals: VisualEffects::new(),
            profile,
            rng: Pcg32::seed_from_u64(seed),
            arena,
        }
    }

    /// Fresh game, same profile
    pub fn reset(&mut self, seed: u64) {
        *self = Self::new(Arc::clone(&self.profile), seed);
    }

    pub fn profile(&self) -> &DifficultyProfile {
        &self.profile
    }

    /// Parameters for the current level, looked up fresh every call
    pub fn params(&self) -> LevelParams {
        self.profile.at_level(self.state.level)
    }

    pub fn arena(&self) -> Vec2 {
        self.arena
    }

    pub fn phase(&self) -> GamePhase {
        self.state.phase
    }

    /// Advance the game by one fixed timestep
    pub fn tick(
        &mut self,
        world: &World,
        advancer: &dyn Advancer,
        input: &TickInput,
        now: Instant,
    ) -> TickOutcome {
        let dt = TICK_DT;
        let mut outcome = TickOutcome::default();

        for kind in self.effects.expire(now) {
            log::debug!("{} expired", kind.as_str());
            outcome.events.push(EffectEvent::PowerUpExpired { kind });
        }
        self.effects.apply(&mut self.player, &mut self.state);

        if input.dash && self.player.try_dash(now) {
            outcome.events.push(EffectEvent::Dash {
                pos: self.player.pos,
            });
        }
        self.player.advance(input.direction, dt, now, self.arena);

        let bodies = AdvanceContext {
            dt,
            now,
            target: self.player.pos,
            arena: self.arena,
        };
        let enemies = AdvanceContext {
            dt: dt * self.state.enemy_time_scale,
            ..bodies
        };
        if let Err(e) = advancer.advance_world(world, &bodies, &enemies) {
            log::warn!("Advance incomplete this tick: {}", e);
        }

        self.visuals.advance(dt);

        let params = self.params();
        let mut collisions = resolve_collisions(&mut CollisionContext {
            world,
            player: &mut self.player,
            state: &mut self.state,
            effects: &mut self.effects,
            params: &params,
            rng: &mut self.rng,
            arena: self.arena,
            now,
        });
        outcome.events.append(&mut collisions.events);
        outcome.game_over = collisions.game_over;
        outcome.collisions = collisions;

        let level = self.profile.level_for_score(self.state.score);
        if level > self.state.level && !self.state.is_game_over() {
            self.state.level = level;
            outcome.level_up = Some(level);
            outcome.events.push(EffectEvent::LevelUp { level });
            log::info!("Level {} reached (score {})", level, self.state.score);
        }

        self.state.updates += 1;
        self.state.elapsed += dt;
        for event in &outcome.events {
            self.visuals.push_for(event);
        }
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::ball::{Ball, BallKind};
    use crate::sim::enemy::Enemy;
    use crate::sim::powerup::PowerUpKind;
    use crate::sim::world::Caps;
    use std::time::Duration;

    const CAPS: Caps = Caps {
        kind: 50,
        total: 200,
    };

    fn sim() -> Simulation {
        let mut sim = Simulation::new(Arc::new(DifficultyProfile::default()), 1);
        sim.state.phase = GamePhase::Running;
        sim
    }

    #[test]
    fn test_tick_moves_player_and_bodies() {
        let mut sim = sim();
        let world = World::new(1);
        let start = Vec2::new(100.0, 100.0);
        world
            .spawn_ball(Ball::at(BallKind::Normal, start, Vec2::new(60.0, 0.0), 10.0, 1), CAPS)
            .unwrap();

        let input = TickInput {
            direction: Vec2::X,
            dash: false,
        };
        let player_start = sim.player.pos;
        sim.tick(&world, &InlineAdvancer, &input, Instant::now());

        assert!(sim.player.pos.x > player_start.x);
        let ball_x = world.balls.snapshot()[0].with(|b| b.pos.x);
        assert!((ball_x - (start.x + 60.0 * TICK_DT)).abs() < 0.001);
        assert_eq!(sim.state.updates, 1);
    }

    #[test]
    fn test_level_up_on_score_threshold() {
        let mut sim = sim();
        let world = World::new(1);
        sim.state.score = sim.profile().level_score_step;

        let outcome = sim.tick(&world, &InlineAdvancer, &TickInput::default(), Instant::now());
        assert_eq!(outcome.level_up, Some(2));
        assert_eq!(sim.state.level, 2);
        assert!(outcome.events.contains(&EffectEvent::LevelUp { level: 2 }));

        let outcome = sim.tick(&world, &InlineAdvancer, &TickInput::default(), Instant::now());
        assert_eq!(outcome.level_up, None);
    }

    #[test]
    fn test_effect_expiry_restores_speed() {
        let mut sim = sim();
        let world = World::new(1);
        let now = Instant::now();
        sim.effects
            .activate(PowerUpKind::SpeedBoost, now, Duration::from_secs(1));
        sim.tick(&world, &InlineAdvancer, &TickInput::default(), now);
        assert_eq!(sim.player.speed, PLAYER_BASE_SPEED * SPEED_BOOST_FACTOR);

        let later = now + Duration::from_secs(2);
        let outcome = sim.tick(&world, &InlineAdvancer, &TickInput::default(), later);
        assert_eq!(sim.player.speed, PLAYER_BASE_SPEED);
        assert!(outcome.events.contains(&EffectEvent::PowerUpExpired {
            kind: PowerUpKind::SpeedBoost
        }));
    }

    #[test]
    fn test_time_slow_halves_enemy_step() {
        let mut sim = sim();
        let world = World::new(1);
        let now = Instant::now();
        let start = Vec2::new(100.0, 300.0);
        world
            .spawn_tracker(Enemy::tracker(start, 2, 120.0, 1), CAPS)
            .unwrap();
        sim.effects
            .activate(PowerUpKind::TimeSlow, now, Duration::from_secs(5));

        sim.tick(&world, &InlineAdvancer, &TickInput::default(), now);
        let moved = world.trackers.snapshot()[0].with(|e| e.pos.x) - start.x;
        let expected = 120.0 * TICK_DT * TIME_SLOW_FACTOR;
        assert!((moved - expected).abs() < 0.01, "moved {}", moved);
    }

    #[test]
    fn test_dash_posts_event_once_per_cooldown() {
        let mut sim = sim();
        let world = World::new(1);
        let now = Instant::now();
        let input = TickInput {
            direction: Vec2::Y,
            dash: true,
        };
        let first = sim.tick(&world, &InlineAdvancer, &input, now);
        let second = sim.tick(&world, &InlineAdvancer, &input, now + Duration::from_millis(100));
        let dashes = |o: &TickOutcome| {
            o.events
                .iter()
                .filter(|e| matches!(e, EffectEvent::Dash { .. }))
                .count()
        };
        assert_eq!(dashes(&first), 1);
        assert_eq!(dashes(&second), 0);
        assert!(!sim.visuals.is_empty());
    }

    #[test]
    fn test_reset_starts_fresh() {
        let mut sim = sim();
        sim.state.score = 900;
        sim.player.size = 60.0;
        sim.reset(2);
        assert_eq!(sim.state.score, 0);
        assert_eq!(sim.state.phase, GamePhase::Menu);
        assert_eq!(sim.player.size, PLAYER_START_SIZE);
        assert_eq!(sim.state.lives, sim.profile().starting_lives);
    }
}
