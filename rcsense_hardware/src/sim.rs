//! Scripted RC sensor simulator.
//!
//! `SimPins` replays discharge times (µs after release) one frame per timing
//! pass. A pass starts when the first channel is driven high while no channel
//! is charged. Time comes from a shared `SimClock` that advances a fixed tick
//! on every `now_us()` call, so a polling loop observes deterministic elapsed
//! times and a tick of 1 µs reproduces scripted values exactly.
//!
//! All handles are cheap clones over shared state: keep one in the test to
//! script frames and inspect counters after moving another into the sensors.

use rcsense_traits::{Emitter, MicrosClock, RcPins};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Discharge time that never completes within any legal timeout.
pub const NEVER: u16 = u16::MAX;

/// Deterministic microsecond timeline shared between simulated parts.
#[derive(Debug, Clone)]
pub struct SimClock {
    now: Arc<AtomicU32>,
    tick_us: u32,
}

impl SimClock {
    pub fn new(tick_us: u32) -> Self {
        Self::starting_at(0, tick_us)
    }

    /// Start the counter at an arbitrary value (e.g. just before the wrap).
    pub fn starting_at(start_us: u32, tick_us: u32) -> Self {
        Self {
            now: Arc::new(AtomicU32::new(start_us)),
            tick_us: tick_us.max(1),
        }
    }

    /// Current time without advancing.
    pub fn peek(&self) -> u32 {
        self.now.load(Ordering::Relaxed)
    }

    pub fn advance(&self, us: u32) {
        self.now.fetch_add(us, Ordering::Relaxed);
    }
}

impl MicrosClock for SimClock {
    fn now_us(&self) -> u32 {
        self.now.fetch_add(self.tick_us, Ordering::Relaxed)
    }

    fn delay_us(&self, us: u32) {
        self.advance(us);
    }
}

#[derive(Debug, Default)]
struct EmitterState {
    active: bool,
    activations: usize,
    deactivations: usize,
}

/// Emitter that only records what it was told.
#[derive(Debug, Clone, Default)]
pub struct SimEmitter {
    state: Arc<Mutex<EmitterState>>,
}

impl SimEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, EmitterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_active(&self) -> bool {
        self.lock().active
    }

    pub fn activations(&self) -> usize {
        self.lock().activations
    }

    pub fn deactivations(&self) -> usize {
        self.lock().deactivations
    }
}

impl Emitter for SimEmitter {
    fn activate(&mut self) {
        let mut s = self.lock();
        s.active = true;
        s.activations += 1;
    }

    fn deactivate(&mut self) {
        let mut s = self.lock();
        s.active = false;
        s.deactivations += 1;
    }
}

#[derive(Debug)]
struct PinState {
    channels: usize,
    queued: VecDeque<Vec<u16>>,
    cycle: Vec<Vec<u16>>,
    cycle_idx: usize,
    current: Vec<u16>,
    charged: Vec<bool>,
    released_at: Vec<Option<u32>>,
    passes: usize,
    irq_depth: i32,
    irq_max_depth: i32,
    irq_suspends: u64,
    probe: Option<SimEmitter>,
    emitter_log: Vec<bool>,
}

impl PinState {
    fn fit(&self, mut frame: Vec<u16>) -> Vec<u16> {
        frame.resize(self.channels, NEVER);
        frame
    }

    // Queued frames first, then the cycle; with neither, the last frame repeats.
    fn begin_pass(&mut self) {
        let next = match self.queued.pop_front() {
            Some(f) => Some(f),
            None if !self.cycle.is_empty() => {
                let f = self.cycle[self.cycle_idx % self.cycle.len()].clone();
                self.cycle_idx = self.cycle_idx.wrapping_add(1);
                Some(f)
            }
            None => None,
        };
        if let Some(f) = next {
            self.current = f;
        }
        self.passes += 1;
        if let Some(p) = &self.probe {
            self.emitter_log.push(p.is_active());
        }
    }
}

/// Simulated bank of RC sensor pins.
#[derive(Debug, Clone)]
pub struct SimPins {
    state: Arc<Mutex<PinState>>,
    clock: SimClock,
}

impl SimPins {
    /// A bank whose channels never discharge until frames are scripted.
    pub fn new(channels: usize, clock: SimClock) -> Self {
        Self {
            state: Arc::new(Mutex::new(PinState {
                channels,
                queued: VecDeque::new(),
                cycle: Vec::new(),
                cycle_idx: 0,
                current: vec![NEVER; channels],
                charged: vec![false; channels],
                released_at: vec![None; channels],
                passes: 0,
                irq_depth: 0,
                irq_max_depth: 0,
                irq_suspends: 0,
                probe: None,
                emitter_log: Vec::new(),
            })),
            clock,
        }
    }

    fn lock(&self) -> MutexGuard<'_, PinState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue the discharge times for one pass. Short frames are padded with `NEVER`.
    pub fn push_frame(&self, discharge_us: impl Into<Vec<u16>>) {
        let mut s = self.lock();
        let f = s.fit(discharge_us.into());
        s.queued.push_back(f);
    }

    pub fn push_frames<I>(&self, frames: I)
    where
        I: IntoIterator,
        I::Item: Into<Vec<u16>>,
    {
        for f in frames {
            self.push_frame(f);
        }
    }

    /// Frames replayed round-robin once the queue is empty.
    pub fn set_cycle(&self, frames: Vec<Vec<u16>>) {
        let mut s = self.lock();
        let cycle = frames.into_iter().map(|f| s.fit(f)).collect();
        s.cycle = cycle;
        s.cycle_idx = 0;
    }

    /// Record the emitter's state at the start of every later pass.
    pub fn observe_emitter(&self, emitter: &SimEmitter) {
        self.lock().probe = Some(emitter.clone());
    }

    pub fn emitter_log(&self) -> Vec<bool> {
        self.lock().emitter_log.clone()
    }

    pub fn passes(&self) -> usize {
        self.lock().passes
    }

    pub fn queued(&self) -> usize {
        self.lock().queued.len()
    }

    pub fn interrupt_depth(&self) -> i32 {
        self.lock().irq_depth
    }

    pub fn max_interrupt_depth(&self) -> i32 {
        self.lock().irq_max_depth
    }

    pub fn interrupt_suspends(&self) -> u64 {
        self.lock().irq_suspends
    }

    /// True while any channel is still driven as an output.
    pub fn any_driven(&self) -> bool {
        self.lock().charged.iter().any(|c| *c)
    }
}

impl RcPins for SimPins {
    fn channel_count(&self) -> usize {
        self.lock().channels
    }

    fn drive_high(&mut self, channel: usize) {
        let mut s = self.lock();
        if channel >= s.channels {
            return;
        }
        if !s.charged.iter().any(|c| *c) {
            s.begin_pass();
        }
        s.charged[channel] = true;
        s.released_at[channel] = None;
    }

    fn set_input(&mut self, channel: usize) {
        let now = self.clock.peek();
        let mut s = self.lock();
        if channel >= s.channels {
            return;
        }
        s.charged[channel] = false;
        s.released_at[channel] = Some(now);
    }

    fn is_high(&mut self, channel: usize) -> bool {
        let now = self.clock.peek();
        let s = self.lock();
        if channel >= s.channels {
            return false;
        }
        if s.charged[channel] {
            return true;
        }
        match s.released_at[channel] {
            Some(t) => now.wrapping_sub(t) < u32::from(s.current[channel]),
            None => false,
        }
    }

    fn suspend_interrupts(&mut self) {
        let mut s = self.lock();
        s.irq_depth += 1;
        s.irq_suspends += 1;
        s.irq_max_depth = s.irq_max_depth.max(s.irq_depth);
    }

    fn resume_interrupts(&mut self) {
        self.lock().irq_depth -= 1;
    }
}

/// Frames of a dark line sweeping across `channels` sensors and back.
///
/// Positions move in `1000 / steps_per_gap` increments over `[0, (channels-1)*1000]`
/// and each position is held for `hold` frames. A sensor directly under the line
/// discharges in 7/8 of the timeout, a sensor one spacing or more away in 1/8.
pub fn sweep_frames(
    channels: usize,
    timeout_us: u16,
    steps_per_gap: u16,
    hold: usize,
) -> Vec<Vec<u16>> {
    let white = i64::from(timeout_us / 8);
    let dark = i64::from(timeout_us - timeout_us / 8);
    let span = channels.saturating_sub(1) as i64 * 1000;
    let step = (1000 / i64::from(steps_per_gap.max(1))).max(1);

    let mut positions: Vec<i64> = (0..=span).step_by(step as usize).collect();
    let back: Vec<i64> = positions
        .iter()
        .rev()
        .skip(1)
        .filter(|x| **x > 0)
        .copied()
        .collect();
    positions.extend(back);

    let mut frames = Vec::with_capacity(positions.len() * hold.max(1));
    for x in positions {
        let frame: Vec<u16> = (0..channels)
            .map(|i| {
                let dist = (x - i as i64 * 1000).abs();
                let darkness = (1000 - dist).max(0);
                (white + (dark - white) * darkness / 1000) as u16
            })
            .collect();
        for _ in 0..hold.max(1) {
            frames.push(frame.clone());
        }
    }
    frames
}

/// Two-channel bump cycle: idle, left pressed, idle, right pressed, both pressed.
/// Idle contacts discharge in `idle_us`; pressed contacts never discharge.
pub fn bump_cycle(idle_us: u16, hold: usize) -> Vec<Vec<u16>> {
    let pattern = [
        [idle_us, idle_us],
        [NEVER, idle_us],
        [idle_us, idle_us],
        [idle_us, NEVER],
        [NEVER, NEVER],
    ];
    pattern
        .iter()
        .flat_map(|f| std::iter::repeat_n(f.to_vec(), hold.max(1)))
        .collect()
}
