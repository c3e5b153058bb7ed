//! Children played back to back.
//!
//! Each child owns a window of `iterations * duration` on the group's
//! timeline. Whenever the current child changes, the children passed over
//! are started, applied at their terminal value and stopped, so a large
//! time step never skips a child's end state.

use super::{ActiveDirection, Animation, Direction, Iterations};

pub struct SequentialGroup<C> {
    children: Vec<Animation<C>>,
    current: Option<usize>,
}

impl<C> SequentialGroup<C> {
    pub(super) fn new() -> Self {
        Self {
            children: Vec::new(),
            current: None,
        }
    }

    pub(super) fn append(&mut self, child: Animation<C>) {
        assert!(
            !child.is_running(),
            "cannot append a running animation to a group"
        );
        assert!(
            child.direction() == Direction::Normal,
            "animations in a sequential group must have Normal direction"
        );
        assert!(
            matches!(child.iterations(), Iterations::Finite(_)),
            "animations in a sequential group must have finite iterations"
        );
        self.children.push(child);
    }

    pub fn children(&self) -> &[Animation<C>] {
        &self.children
    }

    pub(super) fn duration(&self) -> f64 {
        self.children.iter().map(child_span).sum()
    }

    /// Child whose window contains `time`, with the window start. Times past
    /// the end belong to the last child.
    fn locate(&self, time: f64) -> (usize, f64) {
        let mut start = 0.0;
        for (index, child) in self.children.iter().enumerate() {
            let span = child_span(child);
            if time < start + span {
                return (index, start);
            }
            if index + 1 < self.children.len() {
                start += span;
            }
        }
        (self.children.len() - 1, start)
    }

    pub(super) fn apply(&mut self, time: f64, direction: ActiveDirection, cx: &mut C) {
        if self.children.is_empty() {
            return;
        }

        let (index, window_start) = self.locate(time);
        let last = self.children.len() - 1;

        match (self.current, direction) {
            (Some(current), _) if current == index => {}
            (Some(current), ActiveDirection::Forwards) => {
                for skipped in current..index {
                    self.finish_child(skipped, direction, cx);
                }
                self.children[current].stop();
            }
            (Some(current), ActiveDirection::Backwards) => {
                for skipped in (index..current).rev() {
                    self.finish_child(skipped, direction, cx);
                }
                self.children[current].stop();
            }
            (None, ActiveDirection::Forwards) => {
                for skipped in 0..index {
                    self.finish_child(skipped, direction, cx);
                }
            }
            (None, ActiveDirection::Backwards) => {
                if index < last {
                    for skipped in (index..=last).rev() {
                        self.finish_child(skipped, direction, cx);
                    }
                }
            }
        }
        self.current = Some(index);

        let child = &mut self.children[index];
        if !child.is_running() {
            start_child(child);
        }
        child.tick(time - window_start, direction, cx);
    }

    /// End of one of the group's own iterations: settle on the terminal
    /// value of the finished iteration and reset for the next one.
    pub(super) fn iteration_changed(
        &mut self,
        duration: f64,
        direction: ActiveDirection,
        cx: &mut C,
    ) {
        let terminal = match direction {
            ActiveDirection::Forwards => duration,
            ActiveDirection::Backwards => 0.0,
        };
        self.apply(terminal, direction, cx);
        self.stop();
    }

    pub(super) fn stop(&mut self) {
        for child in &mut self.children {
            child.stop();
        }
        self.current = None;
    }

    /// Play `index` to its end in `direction` and stop it.
    fn finish_child(&mut self, index: usize, direction: ActiveDirection, cx: &mut C) {
        let child = &mut self.children[index];
        if !child.is_running() {
            start_child(child);
        }
        match direction {
            ActiveDirection::Forwards => {
                let end = child_span(child);
                child.tick(end, direction, cx);
            }
            ActiveDirection::Backwards => child.tick(0.0, direction, cx),
        }
        child.stop();
    }
}

fn start_child<C>(child: &mut Animation<C>) {
    child.set_start_time(0.0);
    child.set_running(true);
}

fn child_span<C>(child: &Animation<C>) -> f64 {
    child.total_duration().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn letter(c: char) -> Animation<String> {
        Animation::from_fn(1.0, move |_, out: &mut String| out.push(c))
    }

    #[test]
    fn test_locate_windows() {
        let mut group = SequentialGroup::new();
        group.append(letter('a'));
        group.append(letter('b').with_iterations(Iterations::Finite(2)));
        group.append(letter('c'));

        assert_eq!(group.duration(), 4.0);
        assert_eq!(group.locate(0.5), (0, 0.0));
        assert_eq!(group.locate(1.0), (1, 1.0));
        assert_eq!(group.locate(2.9), (1, 1.0));
        assert_eq!(group.locate(3.0), (2, 3.0));
        assert_eq!(group.locate(7.0), (2, 3.0));
    }

    #[test]
    fn test_large_step_finishes_skipped_children() {
        let mut group = SequentialGroup::new();
        group.append(letter('a'));
        group.append(letter('b'));
        group.append(letter('c'));

        let mut out = String::new();
        group.apply(0.0, ActiveDirection::Forwards, &mut out);
        group.apply(2.5, ActiveDirection::Forwards, &mut out);

        assert_eq!(out, "aabc");
        assert!(!group.children()[0].is_running());
        assert!(!group.children()[1].is_running());
        assert!(group.children()[2].is_running());
    }

    #[test]
    #[should_panic(expected = "Normal direction")]
    fn test_append_reversed_child_panics() {
        let mut group = SequentialGroup::new();
        group.append(letter('a').with_direction(Direction::Reverse));
    }
}
