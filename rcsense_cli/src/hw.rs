//! Hardware assembly: simulator by default, Raspberry Pi GPIO with `--features hardware`.

use rcsense_traits::{Emitter, MicrosClock, RcPins};

pub type DynPins = Box<dyn RcPins + Send>;
pub type DynEmitter = Box<dyn Emitter + Send>;
pub type DynClock = Box<dyn MicrosClock + Send>;

/// One pin bank with the emitter and clock it is timed against.
pub struct Bank {
    pub pins: DynPins,
    pub emitter: DynEmitter,
    pub clock: DynClock,
}

pub struct Rig {
    pub line: Bank,
    /// Present when `pins.bump_left` / `pins.bump_right` are configured.
    pub bump: Option<Bank>,
}

#[cfg(not(all(feature = "hardware", target_os = "linux")))]
pub fn open(cfg: &rcsense_config::Config) -> eyre::Result<Rig> {
    use rcsense_hardware::sim::{bump_cycle, sweep_frames};
    use rcsense_hardware::{SimClock, SimEmitter, SimPins};

    let clock = SimClock::new(1);
    let n = cfg.pins.line.len();

    // A dark line sweeping back and forth, two reads per position.
    let line_pins = SimPins::new(n, clock.clone());
    line_pins.set_cycle(sweep_frames(n, cfg.line.timeout_us, 8, 2));

    let bump = cfg.pins.bump_left.zip(cfg.pins.bump_right).map(|_| {
        let idle = (cfg.bump.timeout_us / 4).max(1);
        let pins = SimPins::new(2, clock.clone());
        // untouched contacts while the baseline is learned
        pins.push_frames(
            std::iter::repeat_n(vec![idle, idle], usize::from(cfg.bump.calibration_samples)),
        );
        pins.set_cycle(bump_cycle(idle, 2));
        Bank {
            pins: Box::new(pins),
            emitter: Box::new(SimEmitter::new()),
            clock: Box::new(clock.clone()),
        }
    });

    tracing::info!(channels = n, bump = bump.is_some(), "simulated sensors ready");
    Ok(Rig {
        line: Bank {
            pins: Box::new(line_pins),
            emitter: Box::new(SimEmitter::new()),
            clock: Box::new(clock),
        },
        bump,
    })
}

#[cfg(all(feature = "hardware", target_os = "linux"))]
pub fn open(cfg: &rcsense_config::Config) -> eyre::Result<Rig> {
    use eyre::WrapErr;
    use rcsense_hardware::EmitterCfg;
    use rcsense_hardware::rpi::{RpiPins, open_gpio, shared_emitters};
    use rcsense_traits::MonotonicClock;

    let gpio = open_gpio().wrap_err("open gpio")?;
    let polarity = EmitterCfg {
        line_active_high: cfg.emitter.line_active_high,
        bump_active_high: cfg.emitter.bump_active_high,
    };
    let (line_emitter, bump_emitter) =
        shared_emitters(&gpio, cfg.pins.emitter, polarity).wrap_err("open emitter pin")?;
    let line_pins = RpiPins::new(&gpio, &cfg.pins.line).wrap_err("open line pins")?;

    let bump = match cfg.pins.bump_left.zip(cfg.pins.bump_right) {
        Some((left, right)) => Some(Bank {
            pins: Box::new(RpiPins::new(&gpio, &[left, right]).wrap_err("open bump pins")?),
            emitter: Box::new(bump_emitter),
            clock: Box::new(MonotonicClock::new()),
        }),
        None => None,
    };

    tracing::info!(
        line = ?cfg.pins.line,
        emitter = cfg.pins.emitter,
        bump = bump.is_some(),
        "gpio sensors ready"
    );
    Ok(Rig {
        line: Bank {
            pins: Box::new(line_pins),
            emitter: Box::new(line_emitter),
            clock: Box::new(MonotonicClock::new()),
        },
        bump,
    })
}
