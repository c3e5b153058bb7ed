//! Timeline animations.
//!
//! An [`Animation`] is a small state machine: idle until started, then
//! driven by [`Animation::tick`] with the time elapsed since it started,
//! until its iterations run out. What it animates is either a leaf
//! [`Apply`] implementation (a closure, a keyframed node property, ...) or a
//! [`SequentialGroup`] of child animations played one after another.
//!
//! Directions are resolved in one place: Reverse, Alternate on odd
//! iterations and AlternateReverse on even iterations play the iteration
//! backwards by inverting the local time and flipping the active direction
//! handed to the leaf.
//!
//! Everything is generic over a context `C` that leaves mutate, typically
//! the [`Scene`](crate::scene::Scene).

mod animatable;
mod keyframes;
mod manager;
mod sequential;
mod timing;

pub use animatable::Animatable;
pub use keyframes::{KeyFrames, NodeProperty, PropertyAnimation};
pub use manager::{AnimationId, AnimationManager};
pub use sequential::SequentialGroup;
pub use timing::TimingFunction;

/// Playback direction of an animation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Direction {
    #[default]
    Normal,
    Reverse,
    /// Even iterations forwards, odd iterations backwards
    Alternate,
    /// Even iterations backwards, odd iterations forwards
    AlternateReverse,
}

/// Direction time actually flows in for the iteration being applied.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ActiveDirection {
    #[default]
    Forwards,
    Backwards,
}

impl ActiveDirection {
    /// The opposite direction.
    pub fn flipped(self) -> Self {
        match self {
            ActiveDirection::Forwards => ActiveDirection::Backwards,
            ActiveDirection::Backwards => ActiveDirection::Forwards,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Iterations {
    Finite(u32),
    Infinite,
}

impl Default for Iterations {
    fn default() -> Self {
        Iterations::Finite(1)
    }
}

/// One application of an animation at a point of its iteration.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sample {
    /// Local time in `0..=duration`, already inverted for backwards iterations
    pub time: f64,
    pub duration: f64,
    pub direction: ActiveDirection,
}

impl Sample {
    /// `time / duration`, or 1 for zero-length animations.
    pub fn progress(&self) -> f32 {
        if self.duration > 0.0 {
            (self.time / self.duration).clamp(0.0, 1.0) as f32
        } else {
            1.0
        }
    }
}

/// Effect of a leaf animation.
pub trait Apply<C> {
    fn apply(&mut self, sample: Sample, cx: &mut C);

    /// Called once per crossed iteration boundary with the new iteration
    /// index and the direction the finished iteration played in.
    fn iteration_changed(&mut self, _iteration: u32, _direction: ActiveDirection, _cx: &mut C) {}
}

/// [`Apply`] backed by a closure, see [`Animation::from_fn`].
pub struct FnApply<F>(F);

impl<C, F> Apply<C> for FnApply<F>
where
    F: FnMut(Sample, &mut C),
{
    fn apply(&mut self, sample: Sample, cx: &mut C) {
        (self.0)(sample, cx)
    }
}

enum Body<C> {
    Leaf(Box<dyn Apply<C>>),
    Sequential(SequentialGroup<C>),
}

pub struct Animation<C> {
    duration: f64,
    iterations: Iterations,
    direction: Direction,
    current_iteration: u32,
    start_time: f64,
    running: bool,
    finished: bool,
    body: Body<C>,
}

impl<C> Animation<C> {
    /// A leaf animation of one iteration. Panics on a negative duration.
    pub fn new(duration: f64, apply: impl Apply<C> + 'static) -> Self {
        assert!(duration >= 0.0, "animation duration must not be negative");
        Self::with_body(duration, Body::Leaf(Box::new(apply)))
    }

    /// A leaf animation applying a closure.
    pub fn from_fn<F>(duration: f64, f: F) -> Self
    where
        F: FnMut(Sample, &mut C) + 'static,
    {
        Self::new(duration, FnApply(f))
    }

    /// An empty sequential group; see [`Animation::append`].
    pub fn sequential() -> Self {
        Self::with_body(0.0, Body::Sequential(SequentialGroup::new()))
    }

    fn with_body(duration: f64, body: Body<C>) -> Self {
        Self {
            duration,
            iterations: Iterations::default(),
            direction: Direction::Normal,
            current_iteration: 0,
            start_time: 0.0,
            running: false,
            finished: false,
            body,
        }
    }

    /// Builder form of [`Animation::set_iterations`].
    pub fn with_iterations(mut self, iterations: Iterations) -> Self {
        self.set_iterations(iterations);
        self
    }

    /// Builder form of [`Animation::set_direction`].
    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.set_direction(direction);
        self
    }

    /// Length of one iteration. For groups, the sum of the children's total
    /// durations.
    pub fn duration(&self) -> f64 {
        match &self.body {
            Body::Leaf(_) => self.duration,
            Body::Sequential(group) => group.duration(),
        }
    }

    /// Set the length of one iteration of a leaf. Only valid while idle.
    pub fn set_duration(&mut self, duration: f64) {
        assert!(!self.running, "cannot change the duration of a running animation");
        assert!(duration >= 0.0, "animation duration must not be negative");
        assert!(
            matches!(self.body, Body::Leaf(_)),
            "the duration of a sequential animation follows its children"
        );
        self.duration = duration;
    }

    /// Duration of all iterations, or `None` when repeating forever.
    pub fn total_duration(&self) -> Option<f64> {
        match self.iterations {
            Iterations::Finite(n) => Some(self.duration() * n as f64),
            Iterations::Infinite => None,
        }
    }

    /// Number of iterations to play.
    pub fn iterations(&self) -> Iterations {
        self.iterations
    }

    /// Only valid while idle. `Finite(0)` is rejected.
    pub fn set_iterations(&mut self, iterations: Iterations) {
        assert!(!self.running, "cannot change the iterations of a running animation");
        assert!(
            iterations != Iterations::Finite(0),
            "an animation needs at least one iteration"
        );
        self.iterations = iterations;
    }

    /// Playback direction.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Only valid while idle.
    pub fn set_direction(&mut self, direction: Direction) {
        assert!(!self.running, "cannot change the direction of a running animation");
        self.direction = direction;
    }

    /// Zero-based index of the iteration being played.
    pub fn current_iteration(&self) -> u32 {
        self.current_iteration
    }

    /// Clock time the first iteration starts at.
    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    /// Clock time the first iteration starts at. Only valid while idle.
    pub fn set_start_time(&mut self, start_time: f64) {
        assert!(!self.running, "cannot move the start of a running animation");
        self.start_time = start_time;
    }

    /// Whether the animation is started and not yet finished or stopped.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Whether the animation ran out of iterations since it was last started.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Start from the first iteration, or stop. Panics when already in that state.
    pub fn set_running(&mut self, running: bool) {
        assert!(
            running != self.running,
            "animation is already {}",
            if running { "running" } else { "stopped" }
        );
        if running {
            self.current_iteration = 0;
            self.finished = false;
            self.running = true;
        } else {
            self.stop();
        }
    }

    /// Go idle, stopping any running children first. Safe to call when
    /// already idle.
    pub fn stop(&mut self) {
        if let Body::Sequential(group) = &mut self.body {
            group.stop();
        }
        self.running = false;
    }

    /// Append a child to a sequential animation.
    pub fn append(&mut self, child: Animation<C>) {
        assert!(!self.running, "cannot append to a running animation");
        match &mut self.body {
            Body::Sequential(group) => group.append(child),
            Body::Leaf(_) => panic!("only sequential animations have children"),
        }
    }

    /// Children of a sequential animation, empty for leaves.
    pub fn children(&self) -> &[Animation<C>] {
        match &self.body {
            Body::Sequential(group) => group.children(),
            Body::Leaf(_) => &[],
        }
    }

    /// Advance to `time`, measured from the start of the first iteration.
    ///
    /// Crossing iteration boundaries notifies once per boundary. Reaching
    /// the end of the last iteration applies the terminal value and stops.
    /// Ticking a finished animation reapplies its terminal value.
    pub fn tick(&mut self, time: f64, direction: ActiveDirection, cx: &mut C) {
        let duration = self.duration();

        if !self.running {
            if self.finished {
                self.apply_at(duration, direction, cx);
            } else {
                log::trace!("Ignoring tick of an idle animation");
            }
            return;
        }

        if duration <= 0.0 {
            self.apply_at(0.0, direction, cx);
            self.finish();
            return;
        }

        if time < duration {
            self.apply_at(time.max(0.0), direction, cx);
            return;
        }

        let iteration = (time / duration).floor();
        if let Iterations::Finite(n) = self.iterations {
            if iteration >= n as f64 {
                while self.current_iteration + 1 < n {
                    self.next_iteration(direction, cx);
                }
                self.apply_at(duration, direction, cx);
                self.finish();
                return;
            }
        }

        let iteration = iteration.min(u32::MAX as f64) as u32;
        while self.current_iteration < iteration {
            self.next_iteration(direction, cx);
        }
        self.apply_at(time % duration, direction, cx);
    }

    fn finish(&mut self) {
        self.finished = true;
        self.stop();
    }

    fn plays_backwards(&self) -> bool {
        let odd = self.current_iteration % 2 == 1;
        match self.direction {
            Direction::Normal => false,
            Direction::Reverse => true,
            Direction::Alternate => odd,
            Direction::AlternateReverse => !odd,
        }
    }

    fn resolve(&self, direction: ActiveDirection) -> ActiveDirection {
        if self.plays_backwards() {
            direction.flipped()
        } else {
            direction
        }
    }

    fn next_iteration(&mut self, direction: ActiveDirection, cx: &mut C) {
        let finished_direction = self.resolve(direction);
        let duration = self.duration();
        self.current_iteration += 1;
        match &mut self.body {
            Body::Leaf(apply) => {
                apply.iteration_changed(self.current_iteration, finished_direction, cx)
            }
            Body::Sequential(group) => group.iteration_changed(duration, finished_direction, cx),
        }
    }

    fn apply_at(&mut self, time: f64, direction: ActiveDirection, cx: &mut C) {
        let duration = self.duration();
        let (time, direction) = if self.plays_backwards() {
            (duration - time, direction.flipped())
        } else {
            (time, direction)
        };

        match &mut self.body {
            Body::Leaf(apply) => apply.apply(
                Sample {
                    time,
                    duration,
                    direction,
                },
                cx,
            ),
            Body::Sequential(group) => group.apply(time, direction, cx),
        }
    }
}

impl<C> std::fmt::Debug for Animation<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Animation")
            .field("duration", &self.duration())
            .field("iterations", &self.iterations)
            .field("direction", &self.direction)
            .field("current_iteration", &self.current_iteration)
            .field("running", &self.running)
            .field("children", &self.children().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Log {
        applied: Vec<f64>,
        directions: Vec<ActiveDirection>,
    }

    fn recorder(duration: f64) -> Animation<Log> {
        Animation::from_fn(duration, |sample: Sample, log: &mut Log| {
            log.applied.push(sample.time);
            log.directions.push(sample.direction);
        })
    }

    #[test]
    fn test_zero_duration_finishes_immediately() {
        let mut log = Log::default();
        let mut anim = recorder(0.0);
        anim.set_running(true);
        anim.tick(0.0, ActiveDirection::Forwards, &mut log);
        assert!(!anim.is_running());
        assert!(anim.is_finished());
        assert_eq!(log.applied, vec![0.0]);
    }

    #[test]
    fn test_reverse_flips_active_direction() {
        let mut log = Log::default();
        let mut anim = recorder(4.0).with_direction(Direction::Reverse);
        anim.set_running(true);
        anim.tick(1.0, ActiveDirection::Forwards, &mut log);
        assert_eq!(log.applied, vec![3.0]);
        assert_eq!(log.directions, vec![ActiveDirection::Backwards]);
    }

    #[test]
    fn test_tick_after_finish_reapplies_terminal_value() {
        let mut log = Log::default();
        let mut anim = recorder(2.0);
        anim.set_running(true);
        anim.tick(5.0, ActiveDirection::Forwards, &mut log);
        anim.tick(9.0, ActiveDirection::Forwards, &mut log);
        assert_eq!(log.applied, vec![2.0, 2.0]);
        assert!(!anim.is_running());
    }

    #[test]
    fn test_restart_resets_iteration() {
        let mut log = Log::default();
        let mut anim = recorder(1.0).with_iterations(Iterations::Finite(3));
        anim.set_running(true);
        anim.tick(1.5, ActiveDirection::Forwards, &mut log);
        assert_eq!(anim.current_iteration(), 1);
        anim.stop();
        anim.set_running(true);
        assert_eq!(anim.current_iteration(), 0);
    }

    #[test]
    fn test_infinite_keeps_running() {
        let mut log = Log::default();
        let mut anim = recorder(1.0).with_iterations(Iterations::Infinite);
        anim.set_running(true);
        anim.tick(1000.25, ActiveDirection::Forwards, &mut log);
        assert!(anim.is_running());
        assert_eq!(anim.current_iteration(), 1000);
        assert_eq!(anim.total_duration(), None);
    }

    #[test]
    #[should_panic(expected = "running animation")]
    fn test_set_duration_while_running_panics() {
        let mut anim = recorder(1.0);
        anim.set_running(true);
        anim.set_duration(2.0);
    }

    #[test]
    #[should_panic(expected = "running animation")]
    fn test_set_start_time_while_running_panics() {
        let mut anim = recorder(1.0);
        anim.set_start_time(2.0);
        anim.set_running(true);
        anim.set_start_time(3.0);
    }

    #[test]
    #[should_panic(expected = "already running")]
    fn test_double_start_panics() {
        let mut anim = recorder(1.0);
        anim.set_running(true);
        anim.set_running(true);
    }

    #[test]
    fn test_sample_progress() {
        let sample = Sample {
            time: 2.5,
            duration: 10.0,
            direction: ActiveDirection::Forwards,
        };
        assert_eq!(sample.progress(), 0.25);
    }
}
