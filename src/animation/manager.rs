//! Set of running top-level animations.

use super::{ActiveDirection, Animation};

/// Handle of an animation started on an [`AnimationManager`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct AnimationId(u64);

/// Owns running animations and ticks them against a shared clock.
///
/// Animations are ticked in start order. Finished animations are dropped at
/// the end of the tick that finished them.
pub struct AnimationManager<C> {
    animations: Vec<(AnimationId, Animation<C>)>,
    next_id: u64,
}

impl<C> Default for AnimationManager<C> {
    fn default() -> Self {
        Self {
            animations: Vec::new(),
            next_id: 0,
        }
    }
}

impl<C> AnimationManager<C> {
    /// A manager with nothing running.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start `animation` at clock time `now`.
    pub fn start(&mut self, mut animation: Animation<C>, now: f64) -> AnimationId {
        animation.set_start_time(now);
        animation.set_running(true);

        let id = AnimationId(self.next_id);
        self.next_id += 1;
        self.animations.push((id, animation));
        log::trace!("Started animation {:?}", id);
        id
    }

    /// Stop and hand back an animation. Returns `None` for unknown or
    /// already finished animations.
    pub fn stop(&mut self, id: AnimationId) -> Option<Animation<C>> {
        let index = self.animations.iter().position(|(i, _)| *i == id)?;
        let (_, mut animation) = self.animations.remove(index);
        animation.stop();
        Some(animation)
    }

    /// Advance every animation to clock time `now`.
    pub fn tick(&mut self, now: f64, cx: &mut C) {
        for (_, animation) in &mut self.animations {
            let elapsed = (now - animation.start_time()).max(0.0);
            animation.tick(elapsed, ActiveDirection::Forwards, cx);
        }

        let before = self.animations.len();
        self.animations.retain(|(_, animation)| animation.is_running());
        if self.animations.len() != before {
            log::trace!("{} animations finished", before - self.animations.len());
        }
    }

    /// Whether `id` is still being ticked.
    pub fn is_running(&self, id: AnimationId) -> bool {
        self.animations.iter().any(|(i, _)| *i == id)
    }

    /// The running animation behind `id`.
    pub fn get(&self, id: AnimationId) -> Option<&Animation<C>> {
        self.animations
            .iter()
            .find(|(i, _)| *i == id)
            .map(|(_, animation)| animation)
    }

    /// Number of running animations.
    pub fn len(&self) -> usize {
        self.animations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.animations.is_empty()
    }
}
