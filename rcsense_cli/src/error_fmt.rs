//! Human-readable error descriptions and structured JSON error formatting.

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    use rcsense_core::error::{BuildError, SenseError};

    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingPins | BuildError::MissingEmitter => format!(
                "What happened: The sensor array was built without its hardware ({be}).\nLikely causes: The backend failed to initialize or was not wired into the builder.\nHow to fix: Check the [pins] section and the startup log for GPIO errors."
            ),
            BuildError::NoChannels | BuildError::TooManyChannels(_) => format!(
                "What happened: Unsupported sensor count ({be}).\nLikely causes: pins.line is empty or lists more than 16 pins.\nHow to fix: List between 1 and 16 BCM pins in pins.line."
            ),
            BuildError::ChannelCountMismatch { expected, actual } => format!(
                "What happened: Channel count mismatch (expected {expected}, got {actual}).\nLikely causes: The calibration was recorded for a different pins.line list.\nHow to fix: Re-run `rcsense calibrate` with the current config."
            ),
            BuildError::Allocation(n) => format!(
                "What happened: Could not reserve calibration storage for {n} channels.\nLikely causes: The system is out of memory.\nHow to fix: Free memory and retry."
            ),
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML or command line.\nHow to fix: Edit the config file, then rerun. See etc/rcsense.toml for a sample."
            ),
        };
    }

    if let Some(se) = err.downcast_ref::<SenseError>() {
        return match se {
            SenseError::NotCalibrated(mode) => format!(
                "What happened: No calibration for read mode '{mode}'.\nLikely causes: No --calibration file was given and the config has no [calibration.{mode}] table.\nHow to fix: Run `rcsense calibrate --mode {mode} --out cal.csv`, then pass --calibration cal.csv."
            ),
            SenseError::SamplerStalled { ms } => format!(
                "What happened: The sampler published nothing for {ms} ms.\nLikely causes: Sensor reads are slower than sampler.rate_hz allows, or the sampler thread exited.\nHow to fix: Lower sampler.rate_hz or line.timeout_us, or raise sampler.stall_ms."
            ),
        };
    }

    // String-based heuristics for errors coming from init or config
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("open gpio")
        || lower.contains("open line pins")
        || lower.contains("open bump pins")
        || lower.contains("open emitter pin")
    {
        return "What happened: Failed to initialize GPIO pins.\nLikely causes: Incorrect pin numbers, pins in use by another process, or insufficient GPIO permissions.\nHow to fix: Fix the [pins] values in the config; ensure the process can access /dev/gpiomem.".to_string();
    }

    if lower.contains("bump sensors are not configured") {
        return "What happened: The bump command needs two bump pins.\nLikely causes: pins.bump_left and pins.bump_right are not set.\nHow to fix: Add both pins to the [pins] section.".to_string();
    }

    if lower.contains("invalid configuration") || lower.contains("pins.") {
        return format!(
            "What happened: Configuration is invalid or incomplete.\nLikely causes: {msg}.\nHow to fix: Edit the TOML config and try again."
        );
    }

    // Calibration CSV header special-case
    if lower.contains("calibration csv must have headers") {
        return "Invalid headers in calibration CSV. Expected 'mode,channel,minimum,maximum'."
            .to_string();
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Missing calibration exits with 3; everything else with 1.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    use rcsense_core::error::SenseError;
    match err.downcast_ref::<SenseError>() {
        Some(SenseError::NotCalibrated(_)) => 3,
        _ => 1,
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    use rcsense_core::error::SenseError;
    use serde_json::json;

    if let Some(se) = err.downcast_ref::<SenseError>() {
        let msg = humanize(err);
        let obj = match se {
            SenseError::NotCalibrated(mode) => json!({
                "reason": "NotCalibrated",
                "details": { "mode": mode.to_string() },
                "message": msg,
            }),
            SenseError::SamplerStalled { ms } => json!({
                "reason": "SamplerStalled",
                "details": { "stalled_ms": ms },
                "message": msg,
            }),
        };
        return obj.to_string();
    }

    // Generic error JSON
    json!({ "reason": "Error", "message": humanize(err) }).to_string()
}
