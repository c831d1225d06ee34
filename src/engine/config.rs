// src/engine/config.rs
//
// Corruption configuration: how far into the scan to start, which bytes of
// the scan are fair game, and where randomness comes from.

use crate::error::CrungeError;

/// Historical number of scan-header bytes left untouched after the SOS marker.
pub const DEFAULT_HEADER_SKIP: usize = 18;
/// The wider skip used by later revisions.
pub const WIDE_HEADER_SKIP: usize = 32;

const ENV_HEADER_SKIP: &str = "CRUNGE_HEADER_SKIP";
const ENV_SEED: &str = "CRUNGE_SEED";

/// How many bytes after the Start-Of-Scan marker are protected.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HeaderSkip {
    /// Skip a fixed number of bytes, counted from the first byte after the marker.
    Fixed(usize),
    /// Skip exactly the segment length declared in the two bytes after the marker.
    DeclaredLength,
}

impl Default for HeaderSkip {
    fn default() -> Self {
        HeaderSkip::Fixed(DEFAULT_HEADER_SKIP)
    }
}

impl HeaderSkip {
    pub fn parse(value: &str) -> Result<Self, CrungeError> {
        let value = value.trim();
        if value.eq_ignore_ascii_case("declared") {
            return Ok(HeaderSkip::DeclaredLength);
        }
        value.parse::<usize>().map(HeaderSkip::Fixed).map_err(|_| {
            CrungeError::invalid_argument(
                "header_skip",
                value.to_string(),
                "expected a byte count or 'declared'",
            )
        })
    }
}

/// Periodic edit window over the sequence of eligible bytes.
///
/// Byte number `n` (counting eligible bytes only) can be edited once
/// `n >= offset`. The window opens whenever `n % period == 0` and closes once
/// `n % period > length`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PeriodicWindow {
    pub offset: u64,
    pub length: u64,
    pub period: u64,
}

impl PeriodicWindow {
    pub fn new(offset: u64, length: u64, period: u64) -> Result<Self, CrungeError> {
        if period == 0 {
            return Err(CrungeError::invalid_argument(
                "period",
                "0",
                "the window period must be at least 1",
            ));
        }
        Ok(Self {
            offset,
            length,
            period,
        })
    }

    pub(crate) fn gate(&self) -> WindowGate {
        WindowGate {
            window: *self,
            open: false,
        }
    }
}

/// Running state of a [`PeriodicWindow`] for one corruption run.
#[derive(Clone, Debug)]
pub(crate) struct WindowGate {
    window: PeriodicWindow,
    open: bool,
}

impl WindowGate {
    pub(crate) fn admits(&mut self, n: u64) -> bool {
        let w = &self.window;
        if n < w.offset {
            self.open = false;
        } else if n % w.period == 0 {
            self.open = true;
        } else if n % w.period > w.length {
            self.open = false;
        }
        self.open
    }
}

/// Settings for one corruption run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CorruptionConfig {
    pub header_skip: HeaderSkip,
    /// Keep corrupting scan data after RSTn markers inside an open scan.
    pub follow_restarts: bool,
    pub window: Option<PeriodicWindow>,
    /// Fixed seed for every random source; `None` draws from OS entropy.
    pub seed: Option<u64>,
    pub max_input_bytes: Option<u64>,
}

impl Default for CorruptionConfig {
    fn default() -> Self {
        Self {
            header_skip: HeaderSkip::default(),
            follow_restarts: false,
            window: None,
            seed: None,
            max_input_bytes: None,
        }
    }
}

impl CorruptionConfig {
    /// Get the built-in preset by name
    pub fn preset(name: &str) -> Result<Self, CrungeError> {
        match name.to_lowercase().as_str() {
            "classic" => Ok(Self::classic()),
            "wide" => Ok(Self::wide()),
            "declared" => Ok(Self::declared()),
            _ => Err(CrungeError::invalid_preset(name.to_string())),
        }
    }

    /// Skip 18 bytes after SOS, first restart interval only.
    pub fn classic() -> Self {
        Self::default()
    }

    /// Skip 32 bytes after SOS.
    pub fn wide() -> Self {
        Self {
            header_skip: HeaderSkip::Fixed(WIDE_HEADER_SKIP),
            ..Self::default()
        }
    }

    /// Skip the declared SOS header and corrupt every restart interval.
    pub fn declared() -> Self {
        Self {
            header_skip: HeaderSkip::DeclaredLength,
            follow_restarts: true,
            ..Self::default()
        }
    }

    /// Default configuration with `CRUNGE_HEADER_SKIP` / `CRUNGE_SEED` applied.
    pub fn from_env() -> Result<Self, CrungeError> {
        Self::default().with_overrides(
            std::env::var(ENV_HEADER_SKIP).ok().as_deref(),
            std::env::var(ENV_SEED).ok().as_deref(),
        )
    }

    fn with_overrides(
        mut self,
        header_skip: Option<&str>,
        seed: Option<&str>,
    ) -> Result<Self, CrungeError> {
        if let Some(raw) = header_skip {
            self.header_skip = HeaderSkip::parse(raw)?;
        }
        if let Some(raw) = seed {
            let seed = raw.trim().parse::<u64>().map_err(|_| {
                CrungeError::invalid_argument(
                    "seed",
                    raw.to_string(),
                    "expected an unsigned integer",
                )
            })?;
            self.seed = Some(seed);
        }
        Ok(self)
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_header_skip(mut self, header_skip: HeaderSkip) -> Self {
        self.header_skip = header_skip;
        self
    }

    pub fn with_window(mut self, window: PeriodicWindow) -> Self {
        self.window = Some(window);
        self
    }

    pub fn enforce_source_len(&self, len: usize) -> Result<(), CrungeError> {
        if let Some(limit) = self.max_input_bytes {
            let len = len as u64;
            if len > limit {
                return Err(CrungeError::input_too_large(len, limit));
            }
        }
        Ok(())
    }
}
