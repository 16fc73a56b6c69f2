use rcsense_hardware::sim::{NEVER, bump_cycle, sweep_frames};
use rcsense_hardware::{SimClock, SimEmitter, SimPins};
use rcsense_traits::{Emitter, MicrosClock, RcPins};
use rstest::rstest;

fn charge_and_release(pins: &mut SimPins, clock: &SimClock) {
    for ch in 0..pins.channel_count() {
        pins.drive_high(ch);
    }
    clock.delay_us(10);
    for ch in 0..pins.channel_count() {
        pins.set_input(ch);
    }
}

#[test]
fn channel_discharges_after_scripted_time() {
    let clock = SimClock::new(1);
    let mut pins = SimPins::new(2, clock.clone());
    pins.push_frame(vec![100, NEVER]);

    charge_and_release(&mut pins, &clock);
    clock.advance(99);
    assert!(pins.is_high(0));
    clock.advance(1);
    assert!(!pins.is_high(0));
    clock.advance(30_000);
    assert!(pins.is_high(1));
}

#[test]
fn driven_channel_reads_high() {
    let clock = SimClock::new(1);
    let mut pins = SimPins::new(1, clock.clone());
    pins.push_frame(vec![0]);
    pins.drive_high(0);
    assert!(pins.is_high(0));
    assert!(pins.any_driven());
}

#[test]
fn one_frame_per_pass_then_last_repeats() {
    let clock = SimClock::new(1);
    let mut pins = SimPins::new(1, clock.clone());
    pins.push_frames([vec![5], vec![50]]);

    charge_and_release(&mut pins, &clock);
    clock.advance(10);
    assert!(!pins.is_high(0));

    charge_and_release(&mut pins, &clock);
    clock.advance(10);
    assert!(pins.is_high(0));

    charge_and_release(&mut pins, &clock);
    clock.advance(10);
    assert!(pins.is_high(0), "last frame should repeat");
    assert_eq!(pins.passes(), 3);
    assert_eq!(pins.queued(), 0);
}

#[test]
fn cycle_replays_after_queue_drains() {
    let clock = SimClock::new(1);
    let mut pins = SimPins::new(1, clock.clone());
    pins.set_cycle(vec![vec![5], vec![NEVER]]);
    let mut seen = Vec::new();
    for _ in 0..4 {
        charge_and_release(&mut pins, &clock);
        clock.advance(10);
        seen.push(pins.is_high(0));
    }
    assert_eq!(seen, vec![false, true, false, true]);
}

#[test]
fn short_frames_are_padded_with_never() {
    let clock = SimClock::new(1);
    let mut pins = SimPins::new(3, clock.clone());
    pins.push_frame(vec![1]);
    charge_and_release(&mut pins, &clock);
    clock.advance(1000);
    assert!(!pins.is_high(0));
    assert!(pins.is_high(2));
}

#[test]
fn clock_ticks_on_every_read_and_wraps() {
    let clock = SimClock::starting_at(u32::MAX - 1, 2);
    let start = clock.now_us();
    assert_eq!(start, u32::MAX - 1);
    assert_eq!(clock.us_since(start), 2);
    assert_eq!(clock.peek(), 2);
}

#[test]
fn emitter_probe_logs_state_per_pass() {
    let clock = SimClock::new(1);
    let mut pins = SimPins::new(1, clock.clone());
    let mut em = SimEmitter::new();
    pins.observe_emitter(&em);

    em.activate();
    charge_and_release(&mut pins, &clock);
    em.deactivate();
    charge_and_release(&mut pins, &clock);

    assert_eq!(pins.emitter_log(), vec![true, false]);
    assert_eq!(em.activations(), 1);
    assert_eq!(em.deactivations(), 1);
}

#[test]
fn interrupt_counters_track_depth() {
    let clock = SimClock::new(1);
    let mut pins = SimPins::new(1, clock);
    pins.suspend_interrupts();
    pins.suspend_interrupts();
    pins.resume_interrupts();
    pins.resume_interrupts();
    assert_eq!(pins.interrupt_depth(), 0);
    assert_eq!(pins.max_interrupt_depth(), 2);
    assert_eq!(pins.interrupt_suspends(), 2);
}

#[rstest]
#[case(5, 4000)]
#[case(3, 1000)]
fn sweep_is_darkest_under_the_line(#[case] channels: usize, #[case] timeout: u16) {
    let frames = sweep_frames(channels, timeout, 4, 1);
    // first frame: line at sensor 0
    let first = &frames[0];
    assert_eq!(first[0], timeout - timeout / 8);
    assert!(first[1..].iter().all(|v| *v == timeout / 8));
    // forward then back, endpoints visited once
    let forward = (channels - 1) * 4 + 1;
    assert_eq!(frames.len(), forward + forward - 2);
    let far = &frames[forward - 1];
    assert_eq!(far[channels - 1], timeout - timeout / 8);
}

#[test]
fn sweep_holds_each_position() {
    let frames = sweep_frames(2, 800, 2, 3);
    assert_eq!(frames[0], frames[2]);
    assert_ne!(frames[2], frames[3]);
}

#[test]
fn bump_cycle_shapes() {
    let c = bump_cycle(300, 2);
    assert_eq!(c.len(), 10);
    assert_eq!(c[2], vec![NEVER, 300]);
    assert_eq!(c[8], vec![NEVER, NEVER]);
}
