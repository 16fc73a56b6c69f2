use proptest::prelude::*;
use rcsense_core::{CalibrationBounds, LineSensors, LinePositionEstimator, ReadMode};
use rcsense_hardware::{SimClock, SimEmitter, SimPins};

const TIMEOUT: u16 = 4000;
// short timeout keeps simulated passes cheap
const SIM_TIMEOUT: u16 = 400;

fn sim_sensors(channels: usize) -> (LineSensors<SimPins, SimEmitter, SimClock>, SimPins) {
    let clock = SimClock::new(1);
    let pins = SimPins::new(channels, clock.clone());
    let s = LineSensors::builder()
        .with_pins(pins.clone())
        .with_emitter(SimEmitter::new())
        .with_clock(clock)
        .with_timeout_us(SIM_TIMEOUT)
        .build()
        .unwrap();
    (s, pins)
}

prop_compose! {
    /// Ten frames (one calibration batch) over `channels` channels.
    fn batch_strategy(channels: usize)(
        frames in prop::collection::vec(prop::collection::vec(1u16..=SIM_TIMEOUT, channels), 10)
    ) -> Vec<Vec<u16>> {
        frames
    }
}

prop_compose! {
    fn batches_strategy()(channels in 1usize..=6)(
        batches in prop::collection::vec(batch_strategy(channels), 1..6),
        channels in Just(channels),
    ) -> (usize, Vec<Vec<Vec<u16>>>) {
        (channels, batches)
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn calibrated_values_stay_in_range(
        lo in 0u16..=TIMEOUT,
        hi in 0u16..=TIMEOUT,
        raw in 0u16..=TIMEOUT,
    ) {
        let b = CalibrationBounds::new(vec![lo], vec![hi]).unwrap();
        let v = b.normalize(0, raw);
        prop_assert!(v <= 1000);
        if hi > lo {
            if raw <= lo {
                prop_assert_eq!(v, 0);
            }
            if raw >= hi {
                prop_assert_eq!(v, 1000);
            }
        }
        if hi == lo {
            prop_assert_eq!(v, 0);
        }
    }

    #[test]
    fn bounds_move_monotonically((channels, batches) in batches_strategy()) {
        let (mut s, pins) = sim_sensors(channels);
        let mut prev: Option<(Vec<u16>, Vec<u16>)> = None;
        for batch in batches {
            pins.push_frames(batch);
            s.calibrate(ReadMode::On);
            let b = s.calibration(ReadMode::On).unwrap();
            let now = (b.minimum().to_vec(), b.maximum().to_vec());
            if let Some((min0, max0)) = &prev {
                for ch in 0..channels {
                    prop_assert!(now.0[ch] <= min0[ch], "minimum rose on channel {}", ch);
                    prop_assert!(now.1[ch] >= max0[ch], "maximum fell on channel {}", ch);
                }
            }
            prev = Some(now);
        }
    }

    #[test]
    fn reset_then_one_batch_equals_fresh(
        (channels, batches) in batches_strategy(),
    ) {
        let last = batches.last().cloned().unwrap();

        let (mut fresh, fresh_pins) = sim_sensors(channels);
        fresh_pins.push_frames(last.clone());
        fresh.calibrate(ReadMode::Off);

        let (mut used, used_pins) = sim_sensors(channels);
        for batch in batches {
            used_pins.push_frames(batch);
            used.calibrate(ReadMode::Off);
        }
        used.reset_calibration();
        used_pins.push_frames(last);
        used.calibrate(ReadMode::Off);

        prop_assert_eq!(used.calibration(ReadMode::Off), fresh.calibration(ReadMode::Off));
    }

    #[test]
    fn position_stays_on_scale(
        values in prop::collection::vec(0u16..=1000, 1..=16),
        invert in any::<bool>(),
    ) {
        let mut e = LinePositionEstimator::new();
        let p = e.estimate(&values, invert);
        prop_assert!(u32::from(p) <= (values.len() as u32 - 1) * 1000);
    }

    #[test]
    fn moving_peak_right_increases_position(n in 2usize..=16, level in 201u16..=1000) {
        let mut prev = None;
        for i in 0..n {
            let mut values = vec![0u16; n];
            values[i] = level;
            let p = LinePositionEstimator::new().estimate(&values, false);
            prop_assert_eq!(u32::from(p), i as u32 * 1000);
            if let Some(q) = prev {
                prop_assert!(p > q);
            }
            prev = Some(p);
        }
    }

    #[test]
    fn below_noise_floor_snaps_to_last_side(
        n in 2usize..=16,
        at in 0usize..16,
        noise in prop::collection::vec(0u16..=50, 16),
    ) {
        let at = at % n;
        let mut e = LinePositionEstimator::new();
        let mut seen = vec![0u16; n];
        seen[at] = 1000;
        let last = e.estimate(&seen, false);
        let far = (n as u16 - 1) * 1000;
        let expected = if u32::from(last) < u32::from(far) / 2 { 0 } else { far };
        prop_assert_eq!(e.estimate(&noise[..n], false), expected);
        prop_assert_eq!(e.last_position(), last);
    }
}
