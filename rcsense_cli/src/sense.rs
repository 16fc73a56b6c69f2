//! Command implementations: config mapping, sensor assembly, and output.

use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use eyre::WrapErr;
use rcsense_config::{Config, PersistedBounds, PersistedCalibration};
use rcsense_core::error::{BuildError, SenseError};
use rcsense_core::{BumpSensors, BumpSide, CalibrationBounds, LineSensors, ReadMode, Sampler};
use serde_json::json;

use crate::cli::ModeArg;
use crate::hw::{Bank, DynClock, DynEmitter, DynPins, Rig};
use crate::rt::setup_rt_once;

type Line = LineSensors<DynPins, DynEmitter, DynClock>;

/// Shared per-run context.
pub struct Ctx<'a> {
    pub cfg: &'a Config,
    pub json: bool,
    pub shutdown: Arc<AtomicBool>,
}

impl Ctx<'_> {
    fn interrupted(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    fn mode(&self, arg: Option<ModeArg>) -> ReadMode {
        arg.map_or_else(|| self.cfg.line.mode.into(), Into::into)
    }

    // JSON line under --json, the text rendering otherwise.
    fn emit(&self, value: &serde_json::Value, text: impl FnOnce() -> String) {
        if self.json {
            println!("{value}");
        } else {
            println!("{}", text());
        }
    }
}

fn automatic(mode: ReadMode) -> eyre::Result<ReadMode> {
    if mode.is_automatic() {
        Ok(mode)
    } else {
        Err(eyre::Report::new(BuildError::InvalidConfig(
            "manual mode keeps no calibration; use --mode on or --mode off",
        )))
    }
}

fn join(values: &[u16]) -> String {
    let mut s = String::new();
    for (i, v) in values.iter().enumerate() {
        if i > 0 {
            s.push(' ');
        }
        let _ = write!(s, "{v:>5}");
    }
    s
}

fn build_line(ctx: &Ctx<'_>, bank: Bank, installed: Option<(ReadMode, CalibrationBounds)>) -> eyre::Result<Line> {
    let mut builder = LineSensors::builder()
        .with_pins(bank.pins)
        .with_emitter(bank.emitter)
        .with_clock(bank.clock)
        .with_timing((&ctx.cfg.line).into())
        .with_channels(ctx.cfg.pins.line.len());
    if let Some((mode, bounds)) = installed {
        builder = builder.with_calibration(mode, bounds);
    }
    builder.build()
}

/// Bounds for `mode` from `path`, or from the config's inline table.
fn stored_bounds(
    cfg: &Config,
    path: Option<&Path>,
    mode: ReadMode,
) -> eyre::Result<CalibrationBounds> {
    let persisted = match path {
        Some(p) => Some(rcsense_config::load_calibration_csv(p)?),
        None => cfg.calibration.clone(),
    };
    let Some(bounds) = persisted.as_ref().and_then(|p| p.get(mode.into())) else {
        return Err(eyre::Report::new(SenseError::NotCalibrated(mode)));
    };
    CalibrationBounds::try_from(bounds).map_err(eyre::Report::new)
}

pub fn read(ctx: &Ctx<'_>, rig: Rig, mode: Option<ModeArg>, count: u32) -> eyre::Result<()> {
    let mode = ctx.mode(mode);
    let mut sensors = build_line(ctx, rig.line, None)?;
    let mut values = vec![0u16; sensors.channel_count()];
    for _ in 0..count {
        if ctx.interrupted() {
            break;
        }
        sensors.read(&mut values, mode);
        ctx.emit(&json!({ "mode": mode.to_string(), "values": values }), || {
            format!("raw[{mode}]: {}", join(&values))
        });
    }
    Ok(())
}

pub fn calibrate(
    ctx: &Ctx<'_>,
    rig: Rig,
    batches: Option<u32>,
    mode: Option<ModeArg>,
    out: &Path,
) -> eyre::Result<()> {
    let mode = automatic(ctx.mode(mode))?;
    let batches = batches.unwrap_or(ctx.cfg.line.calibration_batches);
    if batches == 0 {
        return Err(eyre::Report::new(BuildError::InvalidConfig(
            "--batches must be >= 1",
        )));
    }

    let mut sensors = build_line(ctx, rig.line, None)?;
    tracing::info!(%mode, batches, "calibration start");
    for done in 0..batches {
        if ctx.interrupted() {
            eyre::bail!("calibration interrupted after {done} of {batches} batches");
        }
        sensors.calibrate(mode);
    }

    let bounds = sensors
        .calibration(mode)
        .ok_or_else(|| eyre::Report::new(SenseError::NotCalibrated(mode)))?;
    let flat: Vec<usize> = (0..bounds.len()).filter(|ch| !bounds.has_range(*ch)).collect();
    if !flat.is_empty() {
        tracing::warn!(channels = ?flat, "no spread between minimum and maximum; these channels will read 0");
    }

    let mut persisted = if out.exists() {
        rcsense_config::load_calibration_csv(out)
            .wrap_err_with(|| format!("existing calibration file {} is unreadable", out.display()))?
    } else {
        PersistedCalibration::default()
    };
    let fresh = PersistedBounds::from(bounds);
    let n = fresh.minimum.len();
    match mode {
        ReadMode::On => persisted.on = Some(fresh),
        ReadMode::Off => persisted.off = Some(fresh),
        ReadMode::Manual => {}
    }
    // a kept mode recorded on a different pin list would make the file unloadable
    for (name, kept) in [("on", &mut persisted.on), ("off", &mut persisted.off)] {
        if kept.as_ref().is_some_and(|b| b.minimum.len() != n) {
            tracing::warn!(mode = name, "dropping stored bounds with a different channel count");
            *kept = None;
        }
    }
    rcsense_config::write_calibration_csv(out, &persisted)?;
    tracing::info!(%mode, out = %out.display(), "calibration saved");

    ctx.emit(
        &json!({
            "mode": mode.to_string(),
            "batches": batches,
            "minimum": bounds.minimum(),
            "maximum": bounds.maximum(),
            "out": out.display().to_string(),
        }),
        || {
            format!(
                "calibrated[{mode}] over {batches} batches\n  minimum: {}\n  maximum: {}\nsaved to {}",
                join(bounds.minimum()),
                join(bounds.maximum()),
                out.display()
            )
        },
    );
    Ok(())
}

pub fn line(
    ctx: &Ctx<'_>,
    rig: Rig,
    white: bool,
    count: u32,
    calibration: Option<&Path>,
    mode: Option<ModeArg>,
) -> eyre::Result<()> {
    let mode = automatic(ctx.mode(mode))?;
    let bounds = stored_bounds(ctx.cfg, calibration, mode)?;
    let mut sensors = build_line(ctx, rig.line, Some((mode, bounds)))?;
    let mut values = vec![0u16; sensors.channel_count()];
    for _ in 0..count {
        if ctx.interrupted() {
            break;
        }
        let position = sensors.read_line(&mut values, mode, white);
        ctx.emit(&json!({ "position": position, "values": values }), || {
            format!("position: {position:>5}  values: {}", join(&values))
        });
    }
    Ok(())
}

pub fn watch(
    ctx: &Ctx<'_>,
    rig: Rig,
    white: bool,
    count: Option<u32>,
    calibration: Option<&Path>,
    rt: (bool, Option<i32>),
) -> eyre::Result<()> {
    setup_rt_once(rt.0, rt.1);

    let mut scfg: rcsense_core::SamplerCfg = ctx.cfg.into();
    scfg.invert = white;
    let mode = automatic(scfg.mode)?;
    let bounds = stored_bounds(ctx.cfg, calibration, mode)?;
    let sensors = build_line(ctx, rig.line, Some((mode, bounds)))?;

    let stall_ms = ctx.cfg.sampler.stall_ms;
    let poll = Duration::from_millis(stall_ms.min(100));
    let sampler = Sampler::spawn(sensors, scfg);
    tracing::info!(rate_hz = scfg.rate_hz, %mode, white, "watch start");

    let mut printed = 0u32;
    while !ctx.interrupted() && count.is_none_or(|c| printed < c) {
        match sampler.recv_timeout(poll) {
            Some(sample) => {
                printed += 1;
                ctx.emit(
                    &json!({ "seq": sample.seq, "position": sample.position, "values": sample.values }),
                    || format!("#{:<6} position: {:>5}  values: {}", sample.seq, sample.position, join(&sample.values)),
                );
            }
            None => {
                let ms = sampler.stalled_for_ms();
                if ms > stall_ms || sampler.is_finished() {
                    tracing::warn!(stalled_ms = ms, "sampler stalled");
                    return Err(eyre::Report::new(SenseError::SamplerStalled { ms }));
                }
            }
        }
    }
    tracing::info!(samples = printed, "watch stop");
    Ok(())
}

pub fn bump(ctx: &Ctx<'_>, rig: Rig, count: u32) -> eyre::Result<()> {
    let bank = rig.bump.ok_or_else(|| {
        eyre::eyre!("bump sensors are not configured (set pins.bump_left and pins.bump_right)")
    })?;
    let mut bump = BumpSensors::new(bank.pins, bank.emitter, bank.clock, ctx.cfg.into())?;
    bump.calibrate(ctx.cfg.bump.calibration_samples);
    tracing::info!(
        baseline = ?[bump.baseline(BumpSide::Left), bump.baseline(BumpSide::Right)],
        threshold = ?[bump.threshold(BumpSide::Left), bump.threshold(BumpSide::Right)],
        "bump calibrated"
    );

    let word = |p: bool| if p { "pressed" } else { "released" };
    for _ in 0..count {
        if ctx.interrupted() {
            break;
        }
        let bits = bump.read();
        let (left, right) = (bump.is_pressed(BumpSide::Left), bump.is_pressed(BumpSide::Right));
        ctx.emit(
            &json!({
                "bits": bits,
                "left": left,
                "right": right,
                "changed": [bump.changed(BumpSide::Left), bump.changed(BumpSide::Right)],
                "raw": [bump.raw(BumpSide::Left), bump.raw(BumpSide::Right)],
            }),
            || format!("bump: {bits:#04b} left={} right={}", word(left), word(right)),
        );
    }
    Ok(())
}

pub fn self_check(ctx: &Ctx<'_>, rig: Rig) -> eyre::Result<()> {
    let mode = ctx.mode(None);
    let mut sensors = build_line(ctx, rig.line, None)?;
    let mut values = vec![0u16; sensors.channel_count()];
    sensors.read(&mut values, mode);
    let timeout = sensors.timeout();
    let timed_out = values.iter().filter(|v| **v >= timeout).count();
    if timed_out > 0 {
        tracing::warn!(timed_out, timeout_us = timeout, "line channels read the timeout");
    }

    let bump = match rig.bump {
        Some(bank) => {
            let mut b = BumpSensors::new(bank.pins, bank.emitter, bank.clock, ctx.cfg.into())?;
            b.read();
            Some([b.raw(BumpSide::Left), b.raw(BumpSide::Right)])
        }
        None => None,
    };

    ctx.emit(
        &json!({
            "status": "ok",
            "line": { "channels": values.len(), "values": values, "timed_out": timed_out },
            "bump": bump,
        }),
        || {
            let mut s = format!(
                "OK: line {} channels [{}], {} at timeout",
                values.len(),
                join(&values),
                timed_out
            );
            if let Some(raw) = bump {
                let _ = write!(s, "; bump raw [{}]", join(&raw));
            }
            s
        },
    );
    Ok(())
}
