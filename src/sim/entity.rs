//! Entity slots and the capability set every simulated body shares
//!
//! A [`Slot`] pairs an always-visible `active` flag with the body behind an
//! uncontended lock. Worker jobs and the collision pass never overlap within
//! a tick, so each body has a single writer at any instant.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use glam::Vec2;
use parking_lot::Mutex;

use super::geometry::Bounds;

/// Unique entity id (monotonic per world)
pub type EntityId = u64;

/// Per-tick inputs handed to every body's `advance`
#[derive(Debug, Clone, Copy)]
pub struct AdvanceContext {
    /// Seconds to advance (already scaled for time dilation)
    pub dt: f32,
    /// Wall clock for deadline checks
    pub now: Instant,
    /// Point pursuers steer toward (the player)
    pub target: Vec2,
    /// Arena size
    pub arena: Vec2,
}

/// Shared capability set of balls, enemies and power-ups
pub trait Body: Send + 'static {
    /// Mutate own state by one step. Returns false when the body expired itself.
    fn advance(&mut self, ctx: &AdvanceContext) -> bool;

    /// Current collision bounds
    fn bounds(&self) -> Bounds;
}

/// A registry entry: id, activity flag and the body
pub struct Slot<T> {
    id: EntityId,
    active: AtomicBool,
    body: Mutex<T>,
}

impl<T: Body> Slot<T> {
    pub fn new(id: EntityId, body: T) -> Self {
        Self {
            id,
            active: AtomicBool::new(true),
            body: Mutex::new(body),
        }
    }

    #[inline]
    pub fn id(&self) -> EntityId {
        self.id
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Mark inactive. Returns true if this call performed the transition.
    pub fn deactivate(&self) -> bool {
        self.active.swap(false, Ordering::AcqRel)
    }

    /// Reset a still-active body in place. Inactive slots stay inactive;
    /// once deactivated an entity only comes back as a fresh spawn.
    pub fn respawn(&self, reset: impl FnOnce(&mut T)) -> bool {
        if !self.is_active() {
            return false;
        }
        reset(&mut *self.body.lock());
        true
    }

    /// Advance one step; deactivates the slot if the body expired
    pub fn advance(&self, ctx: &AdvanceContext) {
        if !self.is_active() {
            return;
        }
        let alive = self.body.lock().advance(ctx);
        if !alive {
            self.deactivate();
        }
    }

    pub fn bounds(&self) -> Bounds {
        self.body.lock().bounds()
    }

    /// Read the body
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&*self.body.lock())
    }

    /// Mutate the body
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut *self.body.lock())
    }
}

impl<T> std::fmt::Debug for Slot<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Slot")
            .field("id", &self.id)
            .field("active", &self.active.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Body that lives for a fixed number of steps
    pub(crate) struct Countdown {
        pub pos: Vec2,
        pub steps_left: u32,
    }

    impl Body for Countdown {
        fn advance(&mut self, ctx: &AdvanceContext) -> bool {
            self.pos.x += ctx.dt;
            self.steps_left = self.steps_left.saturating_sub(1);
            self.steps_left > 0
        }

        fn bounds(&self) -> Bounds {
            Bounds::from_center(self.pos, 1.0)
        }
    }

    pub(crate) fn ctx() -> AdvanceContext {
        AdvanceContext {
            dt: 1.0,
            now: Instant::now(),
            target: Vec2::ZERO,
            arena: crate::arena_size(),
        }
    }

    #[test]
    fn test_slot_expires_itself() {
        let slot = Slot::new(1, Countdown { pos: Vec2::ZERO, steps_left: 2 });
        slot.advance(&ctx());
        assert!(slot.is_active());
        slot.advance(&ctx());
        assert!(!slot.is_active());
        // Inactive slots no longer advance
        slot.advance(&ctx());
        assert_eq!(slot.with(|b| b.pos.x), 2.0);
    }

    #[test]
    fn test_deactivate_once() {
        let slot = Slot::new(7, Countdown { pos: Vec2::ZERO, steps_left: 5 });
        assert!(slot.deactivate());
        assert!(!slot.deactivate());
        assert_eq!(slot.id(), 7);
    }

    #[test]
    fn test_respawn_never_resurrects() {
        let slot = Slot::new(3, Countdown { pos: Vec2::ZERO, steps_left: 5 });
        assert!(slot.respawn(|b| b.pos = Vec2::new(9.0, 9.0)));
        assert_eq!(slot.bounds().center(), Vec2::new(9.0, 9.0));

        slot.deactivate();
        assert!(!slot.respawn(|b| b.pos = Vec2::ZERO));
        assert!(!slot.is_active());
        assert_eq!(slot.bounds().center(), Vec2::new(9.0, 9.0));
    }
}
