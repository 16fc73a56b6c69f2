#![no_main]
use libfuzzer_sys::fuzz_target;
use rcsense_core::{CalibrationBounds, LinePositionEstimator};

fuzz_target!(|data: (Vec<(u16, u16, u16)>, bool)| {
    let (channels, invert) = data;
    if channels.is_empty() || channels.len() > 16 {
        return;
    }
    let minimum = channels.iter().map(|c| c.0).collect();
    let maximum = channels.iter().map(|c| c.1).collect();
    let Ok(bounds) = CalibrationBounds::new(minimum, maximum) else {
        return;
    };
    let values: Vec<u16> = channels
        .iter()
        .enumerate()
        .map(|(ch, c)| bounds.normalize(ch, c.2))
        .collect();
    assert!(values.iter().all(|v| *v <= 1000));

    let mut estimator = LinePositionEstimator::new();
    let position = estimator.estimate(&values, invert);
    let far_edge = (values.len() as u32 - 1) * 1000;
    assert!(u32::from(position) <= far_edge);

    // read_line on an uncalibrated mode hands raw buffer contents to the estimator
    let raw: Vec<u16> = channels.iter().map(|c| c.2).collect();
    let position = estimator.estimate(&raw, invert);
    assert!(u32::from(position) <= far_edge);
});
