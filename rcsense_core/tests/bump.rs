use rcsense_core::error::BuildError;
use rcsense_core::{BumpCfg, BumpSensors, BumpSide, TimingCfg};
use rcsense_hardware::sim::NEVER;
use rcsense_hardware::{SimClock, SimEmitter, SimPins};
use rstest::rstest;

type SimBump = BumpSensors<SimPins, SimEmitter, SimClock>;

fn rig(timeout: u16, margin: u16) -> (SimBump, SimPins, SimEmitter) {
    let clock = SimClock::new(1);
    let pins = SimPins::new(2, clock.clone());
    let emitter = SimEmitter::new();
    pins.observe_emitter(&emitter);
    let cfg = BumpCfg {
        timing: TimingCfg {
            timeout_us: timeout,
            charge_us: 10,
        },
        margin_percentage: margin,
    };
    let bump = BumpSensors::new(pins.clone(), emitter.clone(), clock, cfg).expect("bump sensors");
    (bump, pins, emitter)
}

#[test]
fn baseline_and_margin_give_threshold() {
    let (mut b, pins, _) = rig(4000, 50);
    pins.push_frames(vec![vec![100, 100]; 4]);
    b.calibrate(4);
    for side in BumpSide::ALL {
        assert_eq!(b.baseline(side), 100);
        assert_eq!(b.threshold(side), 150);
    }

    pins.push_frame(vec![150, 80]);
    assert_eq!(b.read(), 0b01);
    assert!(b.is_pressed(BumpSide::Left));
    assert!(!b.is_pressed(BumpSide::Right));
    assert_eq!(b.raw(BumpSide::Right), 80);
}

#[test]
fn baseline_rounds_to_nearest() {
    let (mut b, pins, _) = rig(4000, 0);
    pins.push_frames([vec![100, 100], vec![101, 102]]);
    b.calibrate(2);
    // (201 + 1) / 2 and (202 + 1) / 2
    assert_eq!(b.baseline(BumpSide::Left), 101);
    assert_eq!(b.baseline(BumpSide::Right), 101);
    assert_eq!(b.threshold(BumpSide::Left), 101);
}

#[test]
fn threshold_clamps_to_timeout() {
    let (mut b, pins, _) = rig(4000, 50);
    pins.push_frame(vec![3000, NEVER]);
    b.calibrate(1);
    assert_eq!(b.threshold(BumpSide::Left), 4000);
    assert_eq!(b.baseline(BumpSide::Right), 4000);
    assert_eq!(b.threshold(BumpSide::Right), 4000);
}

#[test]
fn timed_out_reading_counts_as_pressed() {
    let (mut b, pins, _) = rig(4000, 50);
    pins.push_frame(vec![3000, 3000]);
    b.calibrate(1);
    pins.push_frame(vec![NEVER, 3999]);
    assert_eq!(b.read(), BumpSide::Left.bit());
    assert_eq!(b.raw(BumpSide::Left), 4000);
}

#[test]
fn zero_count_calibration_is_a_noop() {
    let (mut b, pins, _) = rig(4000, 50);
    b.calibrate(0);
    assert_eq!(pins.passes(), 0);
    assert_eq!(b.baseline(BumpSide::Left), 0);
    assert_eq!(b.threshold(BumpSide::Left), 4000);
}

#[rstest]
#[case(&[[80, 80], [200, 80]], [true, false])]
#[case(&[[200, 80], [200, 80]], [false, false])]
#[case(&[[200, 200], [80, 80]], [true, true])]
fn changed_tracks_last_two_reads(#[case] frames: &[[u16; 2]], #[case] expected: [bool; 2]) {
    let (mut b, pins, _) = rig(4000, 50);
    pins.push_frame(vec![100, 100]);
    b.calibrate(1);
    for f in frames {
        pins.push_frame(f.to_vec());
        b.read();
    }
    assert_eq!(b.changed(BumpSide::Left), expected[0]);
    assert_eq!(b.changed(BumpSide::Right), expected[1]);
}

#[test]
fn emitter_lit_only_during_passes() {
    let (mut b, pins, emitter) = rig(1000, 50);
    b.calibrate(2);
    b.read();
    assert_eq!(pins.emitter_log(), vec![true; 3]);
    assert!(!emitter.is_active());
    assert_eq!(emitter.activations(), 3);
}

#[test]
fn tuning_accessors() {
    let (mut b, pins, _) = rig(4000, 50);
    b.set_margin_percentage(20);
    assert_eq!(b.margin_percentage(), 20);
    b.set_timeout(60_000);
    assert_eq!(b.timeout(), 32_767);
    b.set_timeout(1000);
    pins.push_frame(vec![500, 500]);
    b.calibrate(1);
    assert_eq!(b.threshold(BumpSide::Left), 600);
}

#[test]
fn lowering_timeout_caps_threshold() {
    let (mut b, pins, _) = rig(4000, 50);
    b.set_timeout(2000);
    for side in BumpSide::ALL {
        assert_eq!(b.threshold(side), 2000);
    }
    pins.push_frame(vec![NEVER, NEVER]);
    assert_eq!(b.read(), 0b11);
    assert_eq!(b.raw(BumpSide::Left), 2000);

    // a calibrated threshold under the new timeout is kept
    let (mut b, pins, _) = rig(4000, 50);
    pins.push_frame(vec![1000, 3000]);
    b.calibrate(1);
    b.set_timeout(2000);
    assert_eq!(b.threshold(BumpSide::Left), 1500);
    assert_eq!(b.threshold(BumpSide::Right), 2000);
}

#[test]
fn requires_two_channels() {
    let clock = SimClock::new(1);
    let err = BumpSensors::new(
        SimPins::new(3, clock.clone()),
        SimEmitter::new(),
        clock,
        BumpCfg::default(),
    )
    .expect_err("three channels rejected");
    assert_eq!(
        err.downcast_ref::<BuildError>(),
        Some(&BuildError::ChannelCountMismatch {
            expected: 2,
            actual: 3
        })
    );
}
