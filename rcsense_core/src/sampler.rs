//! Background line sampling.
//!
//! Spawns a thread that owns the `LineSensors`, reads the line position at a
//! paced rate, pushes the newest sample through a bounded channel, and tracks
//! the last publish time for stall detection.
//!
//! Each `Sampler` spawns exactly one thread, which is shut down and joined
//! when the `Sampler` is dropped.
use crossbeam_channel as xch;
use rcsense_traits::{Emitter, MicrosClock, RcPins};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::config::SamplerCfg;
use crate::line::LineSensors;

/// One published reading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineSample {
    /// Starts at 1 and increases by one per read, published or not.
    pub seq: u64,
    pub position: u16,
    /// Calibrated values the position was computed from.
    pub values: Vec<u16>,
}

pub struct Sampler {
    rx: xch::Receiver<LineSample>,
    last_ok: Arc<AtomicU64>,
    epoch: Instant,
    shutdown: Arc<AtomicBool>,
    join_handle: Option<std::thread::JoinHandle<()>>,
}

fn elapsed_ms(epoch: Instant) -> u64 {
    let ms = Instant::now().saturating_duration_since(epoch).as_millis();
    (ms.min(u128::from(u64::MAX))) as u64
}

impl Sampler {
    /// Move `sensors` into a sampling thread.
    ///
    /// A read taken while the previous sample is still unread is dropped, so
    /// a slow consumer never stalls the sensors.
    pub fn spawn<P, E, C>(mut sensors: LineSensors<P, E, C>, cfg: SamplerCfg) -> Self
    where
        P: RcPins + Send + 'static,
        E: Emitter + Send + 'static,
        C: MicrosClock + Send + 'static,
    {
        let (tx, rx) = xch::bounded(1);
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();
        let last_ok = Arc::new(AtomicU64::new(0));
        let last_ok_clone = last_ok.clone();
        let period = Duration::from_micros(crate::util::period_us(cfg.rate_hz));
        let epoch = Instant::now();

        let join_handle = std::thread::spawn(move || {
            let mut values = vec![0u16; sensors.channel_count()];
            let mut seq: u64 = 0;
            loop {
                if shutdown_clone.load(Ordering::Relaxed) {
                    tracing::debug!("Sampler thread received shutdown signal");
                    break;
                }

                let position = sensors.read_line(&mut values, cfg.mode, cfg.invert);
                seq += 1;
                let sample = LineSample {
                    seq,
                    position,
                    values: values.clone(),
                };
                match tx.try_send(sample) {
                    Ok(()) => last_ok_clone.store(elapsed_ms(epoch), Ordering::Relaxed),
                    Err(xch::TrySendError::Full(_)) => {
                        tracing::trace!(seq, "previous sample unread, dropping");
                    }
                    Err(xch::TrySendError::Disconnected(_)) => {
                        tracing::debug!("Sampler consumer disconnected, exiting thread");
                        break;
                    }
                }

                if shutdown_clone.load(Ordering::Relaxed) {
                    break;
                }
                std::thread::sleep(period);
            }
            tracing::trace!("Sampler thread exiting cleanly");
        });

        Self {
            rx,
            last_ok,
            epoch,
            shutdown,
            join_handle: Some(join_handle),
        }
    }

    /// Newest pending sample, if any.
    pub fn latest(&self) -> Option<LineSample> {
        self.rx.try_iter().last()
    }

    /// Block up to `timeout` for the next sample.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<LineSample> {
        self.rx.recv_timeout(timeout).ok()
    }

    /// Milliseconds since the last sample was published.
    pub fn stalled_for_ms(&self) -> u64 {
        elapsed_ms(self.epoch).saturating_sub(self.last_ok.load(Ordering::Relaxed))
    }

    /// Whether the sampling thread has exited.
    pub fn is_finished(&self) -> bool {
        self.join_handle
            .as_ref()
            .is_none_or(std::thread::JoinHandle::is_finished)
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);

        // the thread exits after at most one read and one period
        if let Some(handle) = self.join_handle.take() {
            match handle.join() {
                Ok(()) => {
                    tracing::trace!("Sampler thread joined successfully");
                }
                Err(e) => {
                    tracing::warn!(?e, "Sampler thread panicked during shutdown");
                }
            }
        }
    }
}
