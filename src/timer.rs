//! CPU cycle timestamp source and wall-clock calibration
//!
//! Region begin/end read the hardware cycle counter directly; converting
//! cycles into milliseconds needs an estimate of the counter frequency, which
//! is measured once when a session closes.

use std::time::{Duration, Instant};

/// Default wall-clock interval used for frequency calibration
pub const DEFAULT_CALIBRATION: Duration = Duration::from_millis(100);

/// Read the current CPU timestamp counter
///
/// On x86_64 this is `RDTSC`, on aarch64 the virtual counter `CNTVCT_EL0`.
/// Other targets fall back to nanoseconds since a process-wide epoch.
#[inline(always)]
pub fn read_cpu_timer() -> u64 {
    #[cfg(target_arch = "x86_64")]
    {
        // SAFETY: RDTSC is available on every x86_64 CPU and has no side effects.
        unsafe { core::arch::x86_64::_rdtsc() }
    }

    #[cfg(target_arch = "aarch64")]
    {
        let val: u64;
        // SAFETY: CNTVCT_EL0 is readable from EL0 on all supported OSes.
        unsafe {
            core::arch::asm!("mrs {}, cntvct_el0", out(reg) val, options(nomem, nostack));
        }
        val
    }

    #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
    {
        fallback::nanos_since_epoch()
    }
}

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
mod fallback {
    use std::sync::OnceLock;
    use std::time::Instant;

    static EPOCH: OnceLock<Instant> = OnceLock::new();

    pub(super) fn nanos_since_epoch() -> u64 {
        EPOCH.get_or_init(Instant::now).elapsed().as_nanos() as u64
    }
}

/// Estimate the cycle counter frequency in cycles per second
///
/// Samples the counter, sleeps for `wait`, and samples again. Returns 0 if no
/// measurable wall time elapsed.
///
/// # Example
/// ```no_run
/// use cycleprof::timer::{estimate_cpu_freq, DEFAULT_CALIBRATION};
///
/// let freq = estimate_cpu_freq(DEFAULT_CALIBRATION);
/// println!("~{} Hz", freq);
/// ```
pub fn estimate_cpu_freq(wait: Duration) -> u64 {
    let start_time = Instant::now();
    let start_cycles = read_cpu_timer();

    std::thread::sleep(wait);

    let end_cycles = read_cpu_timer();
    let elapsed = start_time.elapsed();

    let seconds = elapsed.as_secs_f64();
    if seconds <= 0.0 {
        return 0;
    }

    (end_cycles.saturating_sub(start_cycles) as f64 / seconds) as u64
}

/// Convert a cycle count to milliseconds at the given frequency
pub fn cycles_to_ms(cycles: u64, cpu_freq: u64) -> f64 {
    if cpu_freq == 0 {
        return 0.0;
    }
    1000.0 * cycles as f64 / cpu_freq as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_cpu_timer_monotonic() {
        let a = read_cpu_timer();
        let b = read_cpu_timer();
        let c = read_cpu_timer();
        assert!(b >= a);
        assert!(c >= b);
    }

    #[test]
    fn test_timer_advances_across_sleep() {
        let start = read_cpu_timer();
        std::thread::sleep(Duration::from_millis(5));
        let end = read_cpu_timer();
        assert!(end > start);
    }

    #[test]
    fn test_estimate_cpu_freq_nonzero() {
        let freq = estimate_cpu_freq(Duration::from_millis(20));
        assert!(freq > 0);
    }

    #[test]
    fn test_cycles_to_ms() {
        assert_eq!(cycles_to_ms(1_000_000, 1_000_000_000), 1.0);
        assert_eq!(cycles_to_ms(3_000_000_000, 3_000_000_000), 1000.0);
    }

    #[test]
    fn test_cycles_to_ms_zero_freq() {
        assert_eq!(cycles_to_ms(12345, 0), 0.0);
    }
}
