/// How a read treats the IR emitters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ReadMode {
    /// Emitters held off for the read (ambient light only).
    Off,
    /// Emitters switched on for the read, off again afterwards.
    #[default]
    On,
    /// Emitters left as the caller set them. No calibration is kept for this mode.
    Manual,
}

impl ReadMode {
    /// Modes that own a calibration set.
    #[inline]
    pub const fn is_automatic(self) -> bool {
        !matches!(self, Self::Manual)
    }
}

impl core::fmt::Display for ReadMode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            Self::Off => "off",
            Self::On => "on",
            Self::Manual => "manual",
        })
    }
}
