use lamina::animation::{
    ActiveDirection, Animation, Apply, Direction, Iterations, Sample,
};

#[derive(Default)]
struct Record {
    applied: Vec<f64>,
    iterations: Vec<u32>,
}

struct Recorder;

impl Apply<Record> for Recorder {
    fn apply(&mut self, sample: Sample, record: &mut Record) {
        record.applied.push(sample.time);
    }

    fn iteration_changed(&mut self, iteration: u32, _direction: ActiveDirection, record: &mut Record) {
        record.iterations.push(iteration);
    }
}

/// Tick at `i * step` for i = 0, 1, ... until the animation stops.
fn run_single(direction: Direction, duration: f64, iterations: u32, step: f64) -> Record {
    let mut anim = Animation::new(duration, Recorder)
        .with_iterations(Iterations::Finite(iterations))
        .with_direction(direction);
    anim.set_running(true);

    let mut record = Record::default();
    let mut i = 0;
    while anim.is_running() {
        anim.tick(i as f64 * step, ActiveDirection::Forwards, &mut record);
        i += 1;
        assert!(i < 100_000, "animation never finished");
    }
    record
}

fn plays_backwards(direction: Direction, iteration: u32) -> bool {
    let odd = iteration % 2 == 1;
    match direction {
        Direction::Normal => false,
        Direction::Reverse => true,
        Direction::Alternate => odd,
        Direction::AlternateReverse => !odd,
    }
}

fn within_iteration(i: usize) -> (usize, f64) {
    (i / 10, (i % 10) as f64)
}

#[test]
fn test_normal() {
    let record = run_single(Direction::Normal, 10.0, 5, 1.0);

    let (last, samples) = record.applied.split_last().unwrap();
    assert_eq!(samples.len(), 50);
    for (i, &time) in samples.iter().enumerate() {
        assert_eq!(time, within_iteration(i).1, "sample {}", i);
    }
    assert_eq!(*last, 10.0);
    assert_eq!(record.iterations, vec![1, 2, 3, 4]);
}

#[test]
fn test_reverse() {
    let record = run_single(Direction::Reverse, 10.0, 5, 1.0);

    let (last, samples) = record.applied.split_last().unwrap();
    for (i, &time) in samples.iter().enumerate() {
        assert_eq!(time, 10.0 - within_iteration(i).1, "sample {}", i);
    }
    assert_eq!(*last, 0.0);
    assert_eq!(record.iterations, vec![1, 2, 3, 4]);
}

#[test]
fn test_alternate() {
    let record = run_single(Direction::Alternate, 10.0, 5, 1.0);

    let (last, samples) = record.applied.split_last().unwrap();
    for (i, &time) in samples.iter().enumerate() {
        let (iteration, local) = within_iteration(i);
        let expected = if iteration % 2 == 0 { local } else { 10.0 - local };
        assert_eq!(time, expected, "sample {}", i);
    }
    // Five iterations end on an even, forwards one.
    assert_eq!(*last, 10.0);
    assert_eq!(record.iterations, vec![1, 2, 3, 4]);
}

#[test]
fn test_alternate_reverse() {
    let record = run_single(Direction::AlternateReverse, 10.0, 5, 1.0);

    let (last, samples) = record.applied.split_last().unwrap();
    for (i, &time) in samples.iter().enumerate() {
        let (iteration, local) = within_iteration(i);
        let expected = if iteration % 2 == 0 { 10.0 - local } else { local };
        assert_eq!(time, expected, "sample {}", i);
    }
    assert_eq!(*last, 0.0);
    assert_eq!(record.iterations, vec![1, 2, 3, 4]);
}

#[test]
fn test_directions_under_varied_steps() {
    // (duration, iterations, step), including fractional steps and a step
    // longer than one iteration.
    let cases = [
        (10.0, 5, 1.0),
        (1.0, 3, 0.1),
        (3.0, 4, 0.7),
        (2.0, 3, 0.3),
        (10.0, 5, 25.0),
    ];
    let directions = [
        Direction::Normal,
        Direction::Reverse,
        Direction::Alternate,
        Direction::AlternateReverse,
    ];

    for direction in directions {
        for (duration, iterations, step) in cases {
            let case = format!("{:?} d={} n={} s={}", direction, duration, iterations, step);
            let record = run_single(direction, duration, iterations, step);

            let (last, samples) = record.applied.split_last().unwrap();
            for (i, &time) in samples.iter().enumerate() {
                let t = i as f64 * step;
                let iteration = (t / duration).floor() as u32;
                let local = t % duration;
                let expected = if plays_backwards(direction, iteration) {
                    duration - local
                } else {
                    local
                };
                assert_eq!(time, expected, "{} sample {}", case, i);
                assert!(iteration < iterations, "{} sample {}", case, i);
            }

            let stopped_at = samples.len() as f64 * step;
            assert!(
                (stopped_at / duration).floor() >= iterations as f64,
                "{} stopped early at {}",
                case,
                stopped_at
            );
            let terminal = if plays_backwards(direction, iterations - 1) {
                0.0
            } else {
                duration
            };
            assert_eq!(*last, terminal, "{}", case);
            assert_eq!(
                record.iterations,
                (1..iterations).collect::<Vec<_>>(),
                "{}",
                case
            );
        }
    }
}

#[test]
fn test_large_step_notifies_every_boundary() {
    let mut anim = Animation::new(10.0, Recorder).with_iterations(Iterations::Finite(5));
    anim.set_running(true);

    let mut record = Record::default();
    anim.tick(0.0, ActiveDirection::Forwards, &mut record);
    anim.tick(35.0, ActiveDirection::Forwards, &mut record);
    assert!(anim.is_running());
    anim.tick(1000.0, ActiveDirection::Forwards, &mut record);

    assert!(!anim.is_running());
    assert_eq!(record.applied, vec![0.0, 5.0, 10.0]);
    assert_eq!(record.iterations, vec![1, 2, 3, 4]);
}

#[test]
fn test_stop_is_idempotent() {
    let mut anim = Animation::new(10.0, Recorder);
    anim.set_running(true);
    anim.stop();
    anim.stop();
    assert!(!anim.is_running());

    // A stopped animation can be started again.
    anim.set_running(true);
    assert!(anim.is_running());
}

#[test]
fn test_repeated_ticks_past_end_reapply_terminal_value() {
    let mut anim = Animation::new(10.0, Recorder).with_iterations(Iterations::Finite(2));
    anim.set_running(true);

    let mut record = Record::default();
    for time in [25.0, 30.0, 1e6] {
        anim.tick(time, ActiveDirection::Forwards, &mut record);
    }

    assert_eq!(record.applied, vec![10.0, 10.0, 10.0]);
    assert_eq!(record.iterations, vec![1]);
}

#[test]
#[should_panic(expected = "running animation")]
fn test_set_direction_while_running_panics() {
    let mut anim = Animation::new(10.0, Recorder);
    anim.set_running(true);
    anim.set_direction(Direction::Reverse);
}

#[test]
#[should_panic(expected = "running animation")]
fn test_set_iterations_while_running_panics() {
    let mut anim = Animation::new(10.0, Recorder);
    anim.set_running(true);
    anim.set_iterations(Iterations::Finite(3));
}

// Sequential composition: three one-tick children each appending a letter.

fn letters(direction: Direction, iterations: u32) -> Animation<String> {
    let mut seq = Animation::sequential()
        .with_iterations(Iterations::Finite(iterations))
        .with_direction(direction);
    for c in ['a', 'b', 'c'] {
        seq.append(Animation::from_fn(1.0, move |_, out: &mut String| {
            out.push(c)
        }));
    }
    seq
}

fn run_sequence(direction: Direction, iterations: u32) -> String {
    let mut seq = letters(direction, iterations);
    assert_eq!(seq.duration(), 3.0);
    seq.set_running(true);

    let mut out = String::new();
    let mut time = 0.0;
    while seq.is_running() {
        seq.tick(time, ActiveDirection::Forwards, &mut out);
        time += 1.0;
        assert!(time < 100.0, "sequence never finished");
    }

    for child in seq.children() {
        assert!(!child.is_running(), "child left running after {:?}", direction);
    }
    out
}

#[test]
fn test_sequential_normal() {
    assert_eq!(run_sequence(Direction::Normal, 1), "aabbcc");
    assert_eq!(run_sequence(Direction::Normal, 2), "aabbccaabbcc");
    assert_eq!(run_sequence(Direction::Normal, 3), "aabbccaabbccaabbcc");
}

#[test]
fn test_sequential_reverse() {
    assert_eq!(run_sequence(Direction::Reverse, 1), "ccbbaa");
    assert_eq!(run_sequence(Direction::Reverse, 2), "ccbbaaccbbaa");
    assert_eq!(run_sequence(Direction::Reverse, 3), "ccbbaaccbbaaccbbaa");
}

#[test]
fn test_sequential_alternate() {
    assert_eq!(run_sequence(Direction::Alternate, 1), "aabbcc");
    assert_eq!(run_sequence(Direction::Alternate, 2), "aabbccccbbaa");
    assert_eq!(run_sequence(Direction::Alternate, 3), "aabbccccbbaaaabbcc");
}

#[test]
fn test_sequential_alternate_reverse() {
    assert_eq!(run_sequence(Direction::AlternateReverse, 1), "ccbbaa");
    assert_eq!(run_sequence(Direction::AlternateReverse, 2), "ccbbaaaabbcc");
    assert_eq!(
        run_sequence(Direction::AlternateReverse, 3),
        "ccbbaaaabbccccbbaa"
    );
}

#[test]
fn test_sequential_overshoot_finishes_every_child() {
    let mut seq = letters(Direction::Normal, 1);
    seq.set_running(true);

    let mut out = String::new();
    seq.tick(0.0, ActiveDirection::Forwards, &mut out);
    seq.tick(50.0, ActiveDirection::Forwards, &mut out);

    assert_eq!(out, "aabc");
    assert!(!seq.is_running());
}

#[test]
fn test_group_stop_stops_children() {
    let mut seq = letters(Direction::Normal, 1);
    seq.set_running(true);

    let mut out = String::new();
    seq.tick(1.5, ActiveDirection::Forwards, &mut out);
    assert!(seq.children()[1].is_running());

    seq.stop();
    seq.stop();
    assert!(seq.children().iter().all(|child| !child.is_running()));
}

#[test]
#[should_panic(expected = "Normal direction")]
fn test_append_non_normal_child_panics() {
    let mut seq: Animation<String> = Animation::sequential();
    seq.append(
        Animation::from_fn(1.0, |_, _: &mut String| {}).with_direction(Direction::Alternate),
    );
}

#[test]
#[should_panic(expected = "running animation")]
fn test_append_to_running_group_panics() {
    let mut seq = letters(Direction::Normal, 1);
    seq.set_running(true);
    seq.append(Animation::from_fn(1.0, |_, _: &mut String| {}));
}
