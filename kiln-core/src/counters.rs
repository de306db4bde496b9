//! Process wide performance counters.
//!
//! Engines add to these after every kernel. The driver resets them between
//! the static and dynamic phase, so whatever is read afterwards describes
//! only the per inference work.

use core::fmt::{Display, Formatter};
use core::sync::atomic::{AtomicU64, Ordering};

static KERNEL_COUNT: AtomicU64 = AtomicU64::new(0);
static GLOBAL_OPS: AtomicU64 = AtomicU64::new(0);
static GLOBAL_MEM: AtomicU64 = AtomicU64::new(0);
static TIME_SUM_NS: AtomicU64 = AtomicU64::new(0);

/// Handle to the global counters.
pub struct GlobalCounters;

impl GlobalCounters {
    /// Record one executed kernel.
    pub fn record(ops: u64, mem: u64, time_ns: u64) {
        KERNEL_COUNT.fetch_add(1, Ordering::Relaxed);
        GLOBAL_OPS.fetch_add(ops, Ordering::Relaxed);
        GLOBAL_MEM.fetch_add(mem, Ordering::Relaxed);
        TIME_SUM_NS.fetch_add(time_ns, Ordering::Relaxed);
    }

    /// Set all counters to zero.
    pub fn reset() {
        KERNEL_COUNT.store(0, Ordering::Relaxed);
        GLOBAL_OPS.store(0, Ordering::Relaxed);
        GLOBAL_MEM.store(0, Ordering::Relaxed);
        TIME_SUM_NS.store(0, Ordering::Relaxed);
    }

    /// Read current values.
    #[must_use]
    pub fn snapshot() -> CounterSnapshot {
        CounterSnapshot {
            kernel_count: KERNEL_COUNT.load(Ordering::Relaxed),
            global_ops: GLOBAL_OPS.load(Ordering::Relaxed),
            global_mem: GLOBAL_MEM.load(Ordering::Relaxed),
            time_sum_ns: TIME_SUM_NS.load(Ordering::Relaxed),
        }
    }
}

/// Values of global counters at one point in time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CounterSnapshot {
    /// Number of executed kernels
    pub kernel_count: u64,
    /// Number of arithmetic operations
    pub global_ops: u64,
    /// Bytes read and written
    pub global_mem: u64,
    /// Time spent inside kernels
    pub time_sum_ns: u64,
}

impl Display for CounterSnapshot {
    #[allow(clippy::cast_precision_loss)]
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        let ms = self.time_sum_ns as f64 / 1e6;
        let gflops = if self.time_sum_ns > 0 { self.global_ops as f64 / self.time_sum_ns as f64 } else { 0.0 };
        f.write_fmt(format_args!(
            "{} kernels, {} ops, {} B, {ms:.3} ms, {gflops:.2} GFLOPS",
            self.kernel_count, self.global_ops, self.global_mem,
        ))
    }
}
