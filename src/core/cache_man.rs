//! Cache budget: how much a `FrameCache` may hold
//!
//! A budget counts either entries or bytes. Byte budgets come from an explicit
//! size, a GiB preset, or a fraction of currently available system memory.

use log::{info, warn};
use serde::{Deserialize, Serialize};
use sysinfo::System;

/// Smallest byte budget accepted; anything lower is clamped up
pub const MIN_CACHE_BYTES: usize = 1024 * 1024;

/// Cache size presets in GiB
pub const PRESETS_GB: &[usize] = &[1, 2, 3, 6, 12, 24, 48, 96];

const GIB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Upper bound for a cache, by entry count or by total weight in bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBudget {
    Items(usize),
    Bytes(usize),
}

impl Default for CacheBudget {
    fn default() -> Self {
        Self::Bytes(PRESETS_GB[0] * 1024 * 1024 * 1024)
    }
}

impl CacheBudget {
    /// Entry-count budget; zero is clamped to one
    pub fn items(n: usize) -> Self {
        if n == 0 {
            warn!("Cache budget of 0 items, using 1");
            return Self::Items(1);
        }
        Self::Items(n)
    }

    /// Byte budget; values below `MIN_CACHE_BYTES` are clamped
    pub fn bytes(n: usize) -> Self {
        if n < MIN_CACHE_BYTES {
            warn!(
                "Cache budget of {} bytes is below minimum, using {} MB",
                n,
                MIN_CACHE_BYTES / 1024 / 1024
            );
            return Self::Bytes(MIN_CACHE_BYTES);
        }
        Self::Bytes(n)
    }

    /// Byte budget in whole GiB (see `PRESETS_GB`)
    pub fn gigabytes(gb: usize) -> Self {
        Self::bytes(gb.saturating_mul(1024 * 1024 * 1024))
    }

    /// Fraction of available memory after keeping `reserve_gb` for the system
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// # use seqcache::core::cache_man::CacheBudget;
    /// let budget = CacheBudget::from_system(0.75, 2.0); // 75% of available, reserve 2GB
    /// ```
    pub fn from_system(mem_fraction: f64, reserve_gb: f64) -> Self {
        let mut sys = System::new();
        sys.refresh_memory();

        let available = sys.available_memory() as usize;
        let fraction = mem_fraction.clamp(0.0, 1.0);
        let reserve = (reserve_gb.max(0.0) * GIB) as usize;
        let usable = available.saturating_sub(reserve);
        let limit = (usable as f64 * fraction) as usize;

        info!(
            "Cache budget: available={} MB, reserve={} MB, limit={} MB ({}%)",
            available / 1024 / 1024,
            reserve / 1024 / 1024,
            limit / 1024 / 1024,
            (fraction * 100.0) as u32
        );
        Self::bytes(limit)
    }

    /// Re-apply the clamps (used after deserializing)
    pub fn validated(self) -> Self {
        match self {
            Self::Items(n) => Self::items(n),
            Self::Bytes(n) => Self::bytes(n),
        }
    }

    /// Numeric limit in the budget's own unit
    pub fn limit(&self) -> usize {
        match self {
            Self::Items(n) | Self::Bytes(n) => *n,
        }
    }

    /// Current usage in the budget's unit
    pub fn usage(&self, len: usize, bytes: usize) -> usize {
        match self {
            Self::Items(_) => len,
            Self::Bytes(_) => bytes,
        }
    }

    pub fn exceeded(&self, len: usize, bytes: usize) -> bool {
        self.usage(len, bytes) > self.limit()
    }
}
