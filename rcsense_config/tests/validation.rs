use rcsense_config::{ReadModeCfg, load_toml};
use rstest::rstest;

const BASE: &str = r#"
[pins]
line = [5, 6, 13, 19, 26]
emitter = 21
"#;

fn with(extra: &str) -> String {
    format!("{BASE}\n{extra}")
}

#[test]
fn minimal_config_uses_defaults() {
    let cfg = load_toml(BASE).expect("parse TOML");
    cfg.validate().expect("valid config should pass");
    assert_eq!(cfg.line.timeout_us, 4000);
    assert_eq!(cfg.line.charge_us, 10);
    assert_eq!(cfg.line.mode, ReadModeCfg::On);
    assert_eq!(cfg.line.calibration_batches, 100);
    assert_eq!(cfg.bump.margin_percentage, 50);
    assert_eq!(cfg.bump.calibration_samples, 50);
    assert!(cfg.emitter.line_active_high);
    assert!(!cfg.emitter.bump_active_high);
    assert_eq!(cfg.sampler.rate_hz, 100);
    assert!(cfg.calibration.is_none());
}

#[test]
fn parses_lowercase_modes() {
    let cfg = load_toml(&with("[line]\nmode = \"manual\"\n")).expect("parse TOML");
    assert_eq!(cfg.line.mode, ReadModeCfg::Manual);
    assert!(load_toml(&with("[line]\nmode = \"ON\"\n")).is_err());
}

#[test]
fn missing_pins_is_a_parse_error() {
    assert!(load_toml("[line]\ntimeout_us = 100\n").is_err());
}

#[rstest]
#[case("[line]\ntimeout_us = 0\n", "line.timeout_us must be in 1..=32767")]
#[case("[line]\ntimeout_us = 32768\n", "line.timeout_us must be in 1..=32767")]
#[case("[line]\ncalibration_batches = 0\n", "calibration_batches must be >= 1")]
#[case("[bump]\ntimeout_us = 0\n", "bump.timeout_us must be in 1..=32767")]
#[case("[bump]\ncalibration_samples = 0\n", "calibration_samples must be >= 1")]
#[case("[sampler]\nrate_hz = 0\n", "sampler.rate_hz must be > 0")]
#[case("[logging]\nrotation = \"weekly\"\n", "logging.rotation must be one of")]
fn rejects_out_of_range(#[case] extra: &str, #[case] needle: &str) {
    let cfg = load_toml(&with(extra)).expect("parse TOML");
    let err = cfg.validate().expect_err("should be rejected");
    assert!(
        format!("{err}").contains(needle),
        "unexpected message: {err}"
    );
}

#[rstest]
#[case("[pins]\nline = []\nemitter = 21\n", "at least one pin")]
#[case("[pins]\nline = [5, 5]\nemitter = 21\n", "pin 5 is assigned more than once")]
#[case("[pins]\nline = [5, 6]\nemitter = 6\n", "pin 6 is assigned more than once")]
#[case("[pins]\nline = [5]\nemitter = 21\nbump_left = 4\n", "must be set together")]
#[case(
    "[pins]\nline = [1,2,3,4,5,6,7,8,9,10,11,12,13,14,15,16,17]\nemitter = 21\n",
    "at most 16 pins"
)]
fn rejects_bad_pins(#[case] toml: &str, #[case] needle: &str) {
    let cfg = load_toml(toml).expect("parse TOML");
    let err = cfg.validate().expect_err("should be rejected");
    assert!(format!("{err}").contains(needle), "unexpected message: {err}");
}

#[test]
fn inline_calibration_must_match_channel_count() {
    let ok = with("[calibration.on]\nminimum = [1,2,3,4,5]\nmaximum = [9,9,9,9,9]\n");
    let cfg = load_toml(&ok).expect("parse TOML");
    cfg.validate().expect("matching calibration passes");
    let bounds = cfg
        .calibration
        .as_ref()
        .and_then(|c| c.get(ReadModeCfg::On))
        .expect("on bounds");
    assert_eq!(bounds.minimum, vec![1, 2, 3, 4, 5]);

    let bad = with("[calibration.off]\nminimum = [1,2]\nmaximum = [9,9]\n");
    let cfg = load_toml(&bad).expect("parse TOML");
    let err = cfg.validate().expect_err("short calibration rejected");
    assert!(format!("{err}").contains("calibration.off must list 5"));
}

#[test]
fn shipped_sample_config_is_valid() {
    let text = include_str!("../../etc/rcsense.toml");
    let cfg = load_toml(text).expect("sample parses");
    cfg.validate().expect("sample validates");
    assert_eq!(cfg.pins.line.len(), 5);
    assert!(cfg.calibration.is_none());
}
