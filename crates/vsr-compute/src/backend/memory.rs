//! Memory budgeting and accounting.
//!
//! Provides system memory detection, the device budget with environment
//! overrides, and atomic allocation counters.
//!
//! # Environment Variables
//!
//! - `VSR_MEM_MB` - Explicit device memory budget in megabytes
//! - `VSR_MEM_PCT` - Budget as percentage of system RAM (10-95)

use std::env;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::warn;

use crate::{ComputeError, ComputeResult};

/// Budget as a percentage of system RAM when no override is set.
pub const DEFAULT_BUDGET_PCT: u64 = 80;

const FALLBACK_RAM_BYTES: u64 = 8 << 30;
const MIB: u64 = 1 << 20;

/// Total system RAM in bytes, probed once.
pub fn system_memory() -> u64 {
    static RAM: OnceLock<u64> = OnceLock::new();
    *RAM.get_or_init(|| match sys_info::mem_info() {
        // sys-info reports KiB
        Ok(info) => info.total * 1024,
        Err(e) => {
            warn!(error = %e, "memory probe failed, assuming 8 GB");
            FALLBACK_RAM_BYTES
        }
    })
}

/// Device memory budget for the CPU backend.
///
/// `VSR_MEM_MB` wins over `VSR_MEM_PCT`; without either the budget is
/// [`DEFAULT_BUDGET_PCT`] of system RAM. The percentage is clamped to 10-95.
pub fn device_budget() -> u64 {
    if let Some(mb) = env_u64("VSR_MEM_MB") {
        return mb.saturating_mul(MIB);
    }
    let pct = env_u64("VSR_MEM_PCT").unwrap_or(DEFAULT_BUDGET_PCT).clamp(10, 95);
    system_memory() / 100 * pct
}

fn env_u64(var: &str) -> Option<u64> {
    let raw = env::var(var).ok()?;
    let parsed = raw.trim().parse().ok();
    if parsed.is_none() {
        warn!(var, value = %raw, "ignoring unparsable memory override");
    }
    parsed
}

/// Human-readable byte count in binary units (`"1.5 MiB"`).
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KiB", "MiB", "GiB", "TiB"];
    if bytes < 1024 {
        return format!("{bytes} B");
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit + 1 < UNITS.len() {
        value /= 1024.0;
        unit += 1;
    }
    format!("{value:.1} {}", UNITS[unit])
}

/// Point-in-time view of [`VramAccounting`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemorySnapshot {
    /// Bytes currently allocated.
    pub current: u64,
    /// High-water mark.
    pub peak: u64,
    /// Budget, 0 = unlimited.
    pub limit: u64,
    /// Number of successful reservations.
    pub allocations: u64,
}

/// Atomic device byte counters. Lock-free reads.
#[derive(Debug)]
pub struct VramAccounting {
    current: AtomicU64,
    peak: AtomicU64,
    allocations: AtomicU64,
    limit: u64,
}

impl VramAccounting {
    /// Counters with a budget in bytes (0 = unlimited).
    pub const fn new(limit: u64) -> Self {
        Self {
            current: AtomicU64::new(0),
            peak: AtomicU64::new(0),
            allocations: AtomicU64::new(0),
            limit,
        }
    }

    /// Counters without a budget.
    pub const fn unlimited() -> Self {
        Self::new(0)
    }

    /// Reserves `bytes`, failing if the budget would be exceeded.
    pub fn try_reserve(&self, bytes: u64) -> ComputeResult<()> {
        let limit = self.limit;
        let prev = self
            .current
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |cur| {
                let next = cur.checked_add(bytes)?;
                (limit == 0 || next <= limit).then_some(next)
            })
            .map_err(|cur| ComputeError::BudgetExceeded {
                requested: bytes,
                available: limit.saturating_sub(cur),
            })?;
        self.peak.fetch_max(prev + bytes, Ordering::Relaxed);
        self.allocations.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Replaces a reservation of `old` bytes with one of `new` bytes.
    ///
    /// Only the net growth has to fit the budget. On failure the `old`
    /// reservation stays in place.
    pub fn try_exchange(&self, old: u64, new: u64) -> ComputeResult<()> {
        let limit = self.limit;
        let prev = self
            .current
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |cur| {
                let next = cur.saturating_sub(old).checked_add(new)?;
                (limit == 0 || next <= limit).then_some(next)
            })
            .map_err(|cur| ComputeError::BudgetExceeded {
                requested: new,
                available: limit.saturating_sub(cur.saturating_sub(old)),
            })?;
        self.peak
            .fetch_max(prev.saturating_sub(old) + new, Ordering::Relaxed);
        Ok(())
    }

    /// Returns `bytes` to the budget.
    pub fn release(&self, bytes: u64) {
        let _ = self
            .current
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |cur| {
                Some(cur.saturating_sub(bytes))
            });
    }

    /// Bytes currently allocated.
    pub fn current(&self) -> u64 {
        self.current.load(Ordering::Relaxed)
    }

    /// High-water mark.
    pub fn peak(&self) -> u64 {
        self.peak.load(Ordering::Relaxed)
    }

    /// Budget, 0 = unlimited.
    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// Current counters.
    pub fn snapshot(&self) -> MemorySnapshot {
        MemorySnapshot {
            current: self.current(),
            peak: self.peak(),
            limit: self.limit,
            allocations: self.allocations.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_memory_probed() {
        assert!(system_memory() >= 256 * MIB);
        assert_eq!(system_memory(), system_memory());
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(1023), "1023 B");
        assert_eq!(format_bytes(1536), "1.5 KiB");
        assert_eq!(format_bytes(3 * MIB), "3.0 MiB");
        assert_eq!(format_bytes(5 << 30), "5.0 GiB");
    }

    #[test]
    fn test_budget_enforced() {
        let acc = VramAccounting::new(100);
        acc.try_reserve(60).unwrap();
        let err = acc.try_reserve(50).unwrap_err();
        assert_eq!(err, ComputeError::BudgetExceeded { requested: 50, available: 40 });
        acc.release(60);
        acc.try_reserve(100).unwrap();
        assert_eq!(acc.peak(), 100);
        assert_eq!(acc.snapshot().allocations, 2);
    }

    #[test]
    fn test_exchange_counts_net_growth() {
        let acc = VramAccounting::new(1000);
        acc.try_reserve(400).unwrap();
        acc.try_exchange(400, 900).unwrap();
        assert_eq!(acc.current(), 900);
        assert_eq!(acc.peak(), 900);

        let err = acc.try_exchange(900, 1200).unwrap_err();
        assert_eq!(err, ComputeError::BudgetExceeded { requested: 1200, available: 1000 });
        assert_eq!(acc.current(), 900);

        acc.try_exchange(900, 100).unwrap();
        assert_eq!(acc.current(), 100);
        assert_eq!(acc.peak(), 900);
    }

    #[test]
    fn test_release_saturates() {
        let acc = VramAccounting::unlimited();
        acc.try_reserve(10).unwrap();
        acc.release(20);
        assert_eq!(acc.current(), 0);
        assert_eq!(acc.peak(), 10);
    }
}
