//! Real-time scheduling helpers (Linux SCHED_FIFO / mlockall).

#[cfg(target_os = "linux")]
pub fn setup_rt_once(rt: bool, prio: Option<i32>) {
    use libc::{SCHED_FIFO, sched_get_priority_max, sched_get_priority_min, sched_param};
    use std::sync::OnceLock;
    static RT_ONCE: OnceLock<()> = OnceLock::new();

    if !rt {
        return;
    }

    #[inline]
    fn try_lock_memory() -> eyre::Result<()> {
        use libc::{MCL_CURRENT, MCL_FUTURE, mlockall};
        let rc = unsafe { mlockall(MCL_CURRENT | MCL_FUTURE) };
        if rc == 0 {
            return Ok(());
        }
        let err = std::io::Error::last_os_error();
        let mut msg = format!("mlockall(current|future) failed: {err}");
        if matches!(err.raw_os_error(), Some(code) if code == libc::EPERM || code == libc::ENOMEM)
        {
            msg.push_str("; hint: needs CAP_IPC_LOCK (or root) and sufficient 'ulimit -l'");
        }
        Err(eyre::eyre!(msg))
    }

    // SCHED_FIFO priority, clamped to the system range.
    #[inline]
    fn try_apply_fifo_priority(prio: Option<i32>) -> eyre::Result<i32> {
        let (min, max) = unsafe {
            let min = sched_get_priority_min(SCHED_FIFO);
            let max = sched_get_priority_max(SCHED_FIFO);
            if min < 0 || max < 0 {
                (1, 99)
            } else {
                (min, max)
            }
        };
        let prio_val = prio.unwrap_or(max).clamp(min, max);
        let param = sched_param {
            sched_priority: prio_val,
        };
        let rc = unsafe { libc::sched_setscheduler(0, SCHED_FIFO, &param) };
        if rc != 0 {
            let err = std::io::Error::last_os_error();
            if err.raw_os_error() == Some(libc::EPERM) {
                eyre::bail!(
                    "{err}; hint: run with 'sudo' or grant CAP_SYS_NICE: 'sudo setcap cap_sys_nice=ep /path/to/rcsense'"
                );
            }
            return Err(eyre::eyre!(err));
        }
        Ok(prio_val)
    }

    RT_ONCE.get_or_init(|| {
        match try_lock_memory() {
            Ok(()) => tracing::info!("RT: memory lock = all (current|future)"),
            Err(err) => tracing::warn!(error = %err, "mlockall failed"),
        }
        match try_apply_fifo_priority(prio) {
            Ok(p) => tracing::info!(priority = p, "RT: SCHED_FIFO enabled"),
            Err(err) => {
                let prio_dbg = prio.map_or_else(|| "(max)".to_string(), |p| p.to_string());
                tracing::warn!(error = %err, prio = %prio_dbg, "sched_setscheduler(SCHED_FIFO) failed");
            }
        }
    });
}

#[cfg(not(target_os = "linux"))]
pub fn setup_rt_once(rt: bool, _prio: Option<i32>) {
    if rt {
        tracing::warn!("real-time mode is only supported on Linux; continuing without it");
    }
}
