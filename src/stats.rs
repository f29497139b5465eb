// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Run-time statistics clock over the DWT cycle counter.
//!
//! Run-time statistics reporters want a time base that ticks 10-100x faster
//! than the scheduler tick, so that short bursts of task execution still
//! register. The Cortex-M DWT cycle counter is a convenient source: it's
//! free-running, increments once per CPU cycle, and exists on every part
//! with the debug/trace block (ARMv7-M and up -- notably *not* ARMv6-M
//! parts like the Cortex-M0).
//!
//! Raw cycles are too fine-grained, though: at 100 MHz a 32-bit cycle count
//! wraps in under 43 seconds, and the reporter's percentage arithmetic
//! would overflow long before a demo finishes running. So [`StatsClock`]
//! scales the raw count down by a fixed shift (there is no prescaler on
//! CYCCNT, so the divide is simulated in software) and folds counter
//! wraparounds back in, producing a 32-bit value that keeps increasing
//! smoothly across wraps.
//!
//! # Usage
//!
//! Build one `StatsClock` at boot, configure it once, then poll it from
//! your statistics reporter:
//!
//! ```ignore
//! let mut cp = cortex_m::Peripherals::take().unwrap();
//! let mut clock = StatsClock::new(CPU_CLOCK_HZ);
//! clock.configure(&mut cp.DCB, &mut cp.DWT);
//! // ... later, from the stats reporter:
//! let now = clock.read();
//! ```
//!
//! # A note on wraparound
//!
//! Wrap detection is purely ordinal: a sample numerically below its
//! predecessor counts as exactly one wrap. If the reporter polls less often
//! than once per counter period (2^32 cycles), additional wraps in between
//! are invisible and the statistics silently undercount. That limitation is
//! inherent to polling a free-running 32-bit counter; pick a polling rate
//! accordingly.

use cortex_m::peripheral::{DCB, DWT};

/// Below this core clock frequency the raw count is shifted by 13 bits;
/// at or above it, by 14. The goal in both cases is a scaled rate in the
/// same few-kHz ballpark regardless of part.
pub const SLOWER_CLOCK_THRESHOLD_HZ: u32 = 70_000_000;

const SHIFT_SLOW: u32 = 13;
const SHIFT_FAST: u32 = 14;

/// Monotonic scaled view of the DWT cycle counter.
///
/// All state lives in the struct -- the last raw sample and the number of
/// wraps observed so far -- so the borrow checker enforces what the
/// hardware already requires: exactly one execution context may poll the
/// clock. Polling from two contexts (say, a task and an ISR) would race the
/// wrap detection; don't share this, and don't wrap it in anything that
/// would let you.
#[derive(Debug)]
pub struct StatsClock {
    last_raw: u32,
    overflows: u32,
    shift: u32,
}

impl StatsClock {
    /// Creates a clock for a core running at `cpu_clock_hz`.
    ///
    /// The frequency is only used to pick the scaling shift, so an
    /// approximate value is fine as long as it lands on the correct side
    /// of [`SLOWER_CLOCK_THRESHOLD_HZ`].
    pub const fn new(cpu_clock_hz: u32) -> Self {
        let shift = if cpu_clock_hz < SLOWER_CLOCK_THRESHOLD_HZ {
            SHIFT_SLOW
        } else {
            SHIFT_FAST
        };
        Self {
            last_raw: 0,
            overflows: 0,
            shift,
        }
    }

    /// Turns the cycle counter on and zeroes all state.
    ///
    /// Enables the trace subsystem (`DEMCR.TRCENA` -- the DWT is powered
    /// down without it), zeroes `CYCCNT`, and starts it counting. Call this
    /// exactly once, before the first [`read`][Self::read]. It cannot fail;
    /// it assumes the debug hardware is present, which is true on any part
    /// this module compiles for.
    pub fn configure(&mut self, dcb: &mut DCB, dwt: &mut DWT) {
        dcb.enable_trace();
        dwt.set_cycle_count(0);
        dwt.enable_cycle_counter();

        self.last_raw = 0;
        self.overflows = 0;
    }

    /// Samples the hardware counter and returns the scaled,
    /// wrap-compensated value.
    ///
    /// The returned sequence is non-decreasing provided at most one
    /// counter wraparound occurs between consecutive calls (see the module
    /// docs). Not safe to call concurrently from multiple contexts, which
    /// the `&mut self` receiver already rules out for safe code.
    pub fn read(&mut self) -> u32 {
        self.update(DWT::cycle_count())
    }

    /// Folds a raw counter sample into the clock and returns the scaled
    /// value.
    ///
    /// This is the whole algorithm; [`read`][Self::read] only supplies the
    /// sample. It's public so the same scaling can be driven from another
    /// free-running 32-bit counter on parts without a usable DWT.
    pub fn update(&mut self, raw: u32) -> u32 {
        // Ordinal wrap check: at most one wrap per call is assumed.
        if raw < self.last_raw {
            self.overflows = self.overflows.wrapping_add(1);
        }
        self.last_raw = raw;

        // Each wrap contributes a full counter period, post-shift.
        let wrap_weight = 1u32 << (32 - self.shift);
        (raw >> self.shift).wrapping_add(self.overflows.wrapping_mul(wrap_weight))
    }

    /// Number of wraparounds observed so far.
    pub fn overflows(&self) -> u32 {
        self.overflows
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shift_follows_clock_speed() {
        // LPC1830 class part at 48 MHz: slow side of the threshold.
        assert_eq!(StatsClock::new(48_000_000).shift, 13);
        // Exactly at the threshold counts as fast.
        assert_eq!(StatsClock::new(70_000_000).shift, 14);
        assert_eq!(StatsClock::new(120_000_000).shift, 14);
    }

    #[test]
    fn no_wrap_is_plain_scaling() {
        let mut clock = StatsClock::new(48_000_000);
        assert_eq!(clock.update(0x0010_0000), 0x0010_0000 >> 13);
        assert_eq!(clock.update(0x0400_0000), 0x0400_0000 >> 13);
        assert_eq!(clock.overflows(), 0);
    }

    #[test]
    fn repeated_reads_without_wrap_are_non_decreasing() {
        let mut clock = StatsClock::new(48_000_000);
        let mut last = 0;
        for raw in (0..0xF000_0000u32).step_by(0x0800_0000) {
            let scaled = clock.update(raw);
            assert!(scaled >= last, "scaled value went backwards");
            last = scaled;
        }
        assert_eq!(clock.overflows(), 0);
    }

    #[test]
    fn equal_sample_leaves_overflow_count_alone() {
        let mut clock = StatsClock::new(48_000_000);
        let a = clock.update(0x1234_5678);
        let b = clock.update(0x1234_5678);
        assert_eq!(a, b);
        assert_eq!(clock.overflows(), 0);
    }

    #[test]
    fn wrap_increments_overflow_count_exactly_once() {
        let mut clock = StatsClock::new(48_000_000);
        clock.update(0xFFFF_0000);
        assert_eq!(clock.overflows(), 0);
        clock.update(0x0000_0010); // wrapped
        assert_eq!(clock.overflows(), 1);
        clock.update(0x0000_0020); // no wrap
        assert_eq!(clock.overflows(), 1);
        clock.update(0x0000_0008); // wrapped again
        assert_eq!(clock.overflows(), 2);
    }

    #[test]
    fn output_is_monotonic_across_a_wrap() {
        let mut clock = StatsClock::new(48_000_000);
        let before = clock.update(0xFFFF_FF00);
        let after = clock.update(0x0000_0100);
        assert!(after >= before);
    }

    #[test]
    fn wrap_weight_matches_shift() {
        // Slow clock: shift 13, each wrap worth 2^19.
        let mut slow = StatsClock::new(48_000_000);
        slow.update(0x8000_0000);
        let scaled = slow.update(0x10);
        assert_eq!(scaled, (0x10 >> 13) + (1 << 19));

        // Fast clock: shift 14, each wrap worth 2^18.
        let mut fast = StatsClock::new(120_000_000);
        fast.update(0x8000_0000);
        let scaled = fast.update(0x10);
        assert_eq!(scaled, (0x10 >> 14) + (1 << 18));
    }

    #[test]
    fn multiple_wraps_accumulate() {
        let mut clock = StatsClock::new(48_000_000);
        let mut last = 0;
        // Three full revolutions of the raw counter, sampled four times
        // per revolution so each call sees at most one wrap.
        for _rev in 0..3 {
            for raw in [0x4000_0000u32, 0x8000_0000, 0xC000_0000, 0x0000_0000] {
                let scaled = clock.update(raw);
                assert!(scaled >= last);
                last = scaled;
            }
        }
        assert_eq!(clock.overflows(), 3);
    }
}
