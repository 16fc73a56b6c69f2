use std::fs::File;
use std::io::Write;

use rcsense_config::{
    CalibrationRow, PersistedBounds, PersistedCalibration, ReadModeCfg, load_calibration_csv,
    write_calibration_csv,
};
use rstest::rstest;
use tempfile::tempdir;

fn row(mode: ReadModeCfg, channel: usize, minimum: u16, maximum: u16) -> CalibrationRow {
    CalibrationRow {
        mode,
        channel,
        minimum,
        maximum,
    }
}

#[rstest]
fn rows_in_any_order_rebuild_bounds() {
    let rows = vec![
        row(ReadModeCfg::On, 1, 210, 3600),
        row(ReadModeCfg::On, 0, 200, 3500),
        row(ReadModeCfg::Off, 0, 900, 4000),
        row(ReadModeCfg::Off, 1, 950, 4000),
    ];
    let cal = PersistedCalibration::from_rows(rows).unwrap();
    assert_eq!(
        cal.on,
        Some(PersistedBounds {
            minimum: vec![200, 210],
            maximum: vec![3500, 3600],
        })
    );
    assert_eq!(cal.off.as_ref().unwrap().minimum, vec![900, 950]);
}

#[rstest]
#[case(vec![row(ReadModeCfg::On, 0, 1, 2), row(ReadModeCfg::On, 0, 3, 4)], "twice")]
#[case(vec![row(ReadModeCfg::On, 0, 1, 2), row(ReadModeCfg::On, 2, 3, 4)], "missing channel 1")]
#[case(vec![row(ReadModeCfg::Manual, 0, 1, 2)], "manual")]
#[case(vec![], "at least one row")]
#[case(
    vec![row(ReadModeCfg::On, 0, 1, 2), row(ReadModeCfg::Off, 0, 1, 2), row(ReadModeCfg::Off, 1, 1, 2)],
    "disagree on channel count"
)]
fn rejects_inconsistent_rows(#[case] rows: Vec<CalibrationRow>, #[case] needle: &str) {
    let err = PersistedCalibration::from_rows(rows).unwrap_err();
    assert!(format!("{err}").contains(needle), "unexpected message: {err}");
}

#[rstest]
fn load_csv_strict_headers() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("cal.csv");
    let mut f = File::create(&path).unwrap();
    writeln!(f, "mode,chan,minimum,maximum").unwrap();
    writeln!(f, "on,0,1,2").unwrap();
    drop(f);
    let err = load_calibration_csv(&path).unwrap_err();
    assert!(format!("{err}").contains("must have headers 'mode,channel,minimum,maximum'"));
}

#[rstest]
fn load_csv_rejects_unknown_mode() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("cal.csv");
    let mut f = File::create(&path).unwrap();
    writeln!(f, "mode,channel,minimum,maximum").unwrap();
    writeln!(f, "dim,0,1,2").unwrap();
    drop(f);
    let err = load_calibration_csv(&path).unwrap_err();
    assert!(format!("{err}").contains("invalid CSV row 2"));
}

#[rstest]
fn written_file_loads_back() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("cal.csv");
    let cal = PersistedCalibration {
        on: Some(PersistedBounds {
            minimum: vec![180, 190, 200],
            maximum: vec![3400, 3500, 3600],
        }),
        off: None,
    };
    write_calibration_csv(&path, &cal).unwrap();
    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.starts_with("mode,channel,minimum,maximum\non,0,180,3400\n"));
    assert_eq!(load_calibration_csv(&path).unwrap(), cal);
}

#[rstest]
fn writing_nothing_is_an_error() {
    let dir = tempdir().unwrap();
    let err = write_calibration_csv(&dir.path().join("x.csv"), &PersistedCalibration::default())
        .unwrap_err();
    assert!(format!("{err}").contains("no calibrated mode"));
}
