// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Interrupt-nesting timer driver for interrupt-queue test suites.
//!
//! The standard interrupt-queue test wants two independent timers firing at
//! different rates so that their interrupts occasionally nest. On boards
//! where only one timer channel can be made to fire reliably, the same
//! coverage can be approximated with one genuine timer interrupt plus a
//! second interrupt line that is never driven by hardware at all: the
//! primary handler manually pends it on most occurrences. The second line
//! is programmed strictly more urgent than the first, so the pended
//! interrupt always preempts the handler that pended it, and the tick
//! interrupt can in turn nest with the primary, for a maximum nesting
//! depth of three.
//!
//! Note this arrangement is weaker than two real timers: nesting always
//! happens at the same point in the code, rather than wherever the second
//! timer happens to land. It is still enough to shake out save/restore
//! bugs in interrupt entry and exit.
//!
//! Every eighth occurrence skips the manual pend, so the suite also sees
//! primary interrupts that complete without being preempted.
//!
//! # Hardware abstraction
//!
//! The driver does not know which timer peripheral or interrupt controller
//! it is running on. The board supplies a [`CompareTimer`] for the timer
//! channel and an [`InterruptController`] for pend/priority/enable
//! operations; an implementation of the latter is provided for the NVIC.
//! The test suite supplies a [`TestHandlers`] with the two per-timer
//! callbacks, and the RTOS port supplies a [`Scheduler`] that receives the
//! context-switch decision on the way out of each handler.
//!
//! # Wiring
//!
//! The ISRs themselves are board property, since they need the device
//! crate's vector names. A typical arrangement:
//!
//! ```ignore
//! static DRIVER: Mutex<RefCell<Option<Bench>>> = Mutex::new(RefCell::new(None));
//!
//! fn start_int_queue_test(bench: Bench) {
//!     // Before interrupts are enabled globally:
//!     bench.driver.initialise(&mut bench.timer, &mut bench.nvic, &CONFIG);
//!     // ... stash `bench` where the ISRs below can reach it ...
//! }
//!
//! #[interrupt]
//! fn TC0() {
//!     with_bench(|b| {
//!         b.driver.on_primary_interrupt(&mut b.timer, &mut b.nvic,
//!                                       &mut b.suite, &mut b.port)
//!     });
//! }
//!
//! #[interrupt]
//! fn TC1() {
//!     with_bench(|b| b.driver.on_nested_interrupt(&mut b.suite, &mut b.port));
//! }
//! ```

use cortex_m::interrupt::InterruptNumber;
use cortex_m::peripheral::NVIC;

/// Timer frequency used by the original interrupt-queue demos, in Hz.
///
/// Deliberately offset from a round multiple of the usual 1 kHz tick
/// rate, so the phase between the test interrupts and the tick interrupt
/// drifts over time instead of locking.
pub const DEFAULT_FREQUENCY_HZ: u32 = 2030;

/// Compare-match timer channel, as the board provides it.
///
/// Implementations wrap whatever vendor API programs the peripheral; the
/// driver only dictates the order of calls. None of these operations can
/// fail -- a channel that cannot be programmed is an integration defect,
/// not a runtime condition.
pub trait CompareTimer {
    /// Prepares the channel to interrupt at `frequency_hz`: enable the
    /// peripheral clock, pick a divider, program the compare register, and
    /// enable the compare-match interrupt. Must not start counting yet.
    fn configure(&mut self, frequency_hz: u32);

    /// Starts the channel counting.
    fn start(&mut self);

    /// Reads and clears the channel's interrupt status, returning whether
    /// a compare match was pending.
    fn take_interrupt(&mut self) -> bool;
}

/// The interrupt-controller operations the driver needs, over lines of
/// type `L`.
///
/// Keeping this a trait decouples the driver from any particular
/// controller's register layout; in particular [`pend`][Self::pend] is the
/// "request nested event" capability that makes the whole test work. An
/// implementation for the Cortex-M NVIC is provided below.
pub trait InterruptController<L: Copy> {
    /// Discards any pending state on `line`.
    fn clear_pending(&mut self, line: L);

    /// Programs the priority of `line`. Zero is most urgent.
    fn set_priority(&mut self, line: L, priority: u8);

    /// Enables `line`.
    fn enable(&mut self, line: L);

    /// Pends `line` by software, as if its hardware source had fired.
    fn pend(&mut self, line: L);
}

impl<I: InterruptNumber> InterruptController<I> for NVIC {
    fn clear_pending(&mut self, line: I) {
        NVIC::unpend(line);
    }

    fn set_priority(&mut self, line: I, priority: u8) {
        // Raw IPR value, not the CMSIS-shifted form: callers must already
        // have shifted for the number of priority bits their part
        // implements, which is the `cortex-m` convention throughout.
        unsafe { self.set_priority(line, priority) }
    }

    fn enable(&mut self, line: I) {
        // Sound here under the driver's own contract: lines are enabled
        // before interrupts are globally enabled, never from inside a
        // priority-based critical section.
        unsafe { NVIC::unmask(line) }
    }

    fn pend(&mut self, line: I) {
        NVIC::pend(line);
    }
}

/// The interrupt-queue test suite's per-timer callbacks.
///
/// Each returns whether the work it did (typically a queue send or receive
/// from interrupt context) unblocked a task that should now run, i.e.
/// whether a context switch should be requested at interrupt exit.
pub trait TestHandlers {
    /// Handler for the genuine timer interrupt.
    fn first_timer(&mut self) -> bool;

    /// Handler for the interrupt that would come from a second,
    /// independent timer if the board had one.
    fn second_timer(&mut self) -> bool;
}

/// The scheduler's interrupt-exit hook.
pub trait Scheduler {
    /// Records that a context switch should (or need not) be considered
    /// when the current interrupt unwinds.
    fn yield_from_isr(&mut self, switch_required: bool);
}

/// Static configuration for [`NestingTimer::initialise`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimerConfig {
    /// Rate at which the primary timer interrupt fires.
    pub frequency_hz: u32,
    /// Priority of the primary (genuine timer) line.
    pub lower_priority: u8,
    /// Priority of the nested (manually pended) line. Must be numerically
    /// below `lower_priority` -- more urgent -- or nothing nests.
    pub higher_priority: u8,
}

impl TimerConfig {
    /// Builds the conventional configuration: the nested line sits at the
    /// most urgent priority from which the RTOS API may be called
    /// (`max_syscall_priority`), and the primary line one notch below it.
    pub const fn new(frequency_hz: u32, max_syscall_priority: u8) -> Self {
        Self {
            frequency_hz,
            lower_priority: max_syscall_priority + 1,
            higher_priority: max_syscall_priority,
        }
    }
}

/// Driver state: the two interrupt lines and the occurrence counter.
///
/// Owns no hardware; the timer and controller are passed into each
/// operation so the same driver works against the NVIC on target and
/// against mocks off target.
#[derive(Debug)]
pub struct NestingTimer<L: Copy> {
    primary: L,
    nested: L,
    isr_count: u32,
}

impl<L: Copy> NestingTimer<L> {
    /// Creates a driver for the given pair of interrupt lines.
    pub const fn new(primary: L, nested: L) -> Self {
        Self {
            primary,
            nested,
            isr_count: 0,
        }
    }

    /// Programs the timer and both interrupt lines, then starts the timer.
    ///
    /// Order matters and is fixed: the channel is fully configured first,
    /// stale pending state on both lines is discarded, priorities and
    /// enables are programmed, and only then does the timer start. Call
    /// this before interrupts are enabled globally, or a partially
    /// configured channel may fire spuriously.
    pub fn initialise(
        &mut self,
        timer: &mut impl CompareTimer,
        ctl: &mut impl InterruptController<L>,
        config: &TimerConfig,
    ) {
        // Inverted priorities would silently defeat the test. Checked in
        // debug builds only; see the module docs on failure semantics.
        debug_assert!(config.higher_priority < config.lower_priority);

        self.isr_count = 0;

        timer.configure(config.frequency_hz);

        // Both lines get configured even though only the primary has a
        // hardware source; the nested line is pended from software.
        ctl.clear_pending(self.primary);
        ctl.clear_pending(self.nested);
        ctl.set_priority(self.primary, config.lower_priority);
        ctl.set_priority(self.nested, config.higher_priority);
        ctl.enable(self.primary);
        ctl.enable(self.nested);

        // Start the timer last of all.
        timer.start();
    }

    /// Body of the primary timer ISR.
    ///
    /// Checks and clears the compare-match status; a spurious entry with
    /// nothing pending does nothing at all. Otherwise, on seven of every
    /// eight occurrences, pends the nested line -- which, being more
    /// urgent, preempts this handler immediately -- then runs the suite's
    /// first-timer callback and forwards its decision to the scheduler.
    pub fn on_primary_interrupt(
        &mut self,
        timer: &mut impl CompareTimer,
        ctl: &mut impl InterruptController<L>,
        handlers: &mut impl TestHandlers,
        sched: &mut impl Scheduler,
    ) {
        if !timer.take_interrupt() {
            return;
        }

        // Skip the pend on every eighth occurrence so the suite also sees
        // un-nested primary interrupts.
        if self.isr_count & 0x07 != 0x07 {
            ctl.pend(self.nested);
        }
        self.isr_count = self.isr_count.wrapping_add(1);

        let switch_required = handlers.first_timer();
        sched.yield_from_isr(switch_required);
    }

    /// Body of the nested ISR.
    ///
    /// Reached only via the manual pend in
    /// [`on_primary_interrupt`][Self::on_primary_interrupt], so it always
    /// runs nested inside the primary handler. There is no hardware status
    /// to clear; it just runs the suite's second-timer callback and
    /// forwards the decision.
    pub fn on_nested_interrupt(
        &mut self,
        handlers: &mut impl TestHandlers,
        sched: &mut impl Scheduler,
    ) {
        let switch_required = handlers.second_timer();
        sched.yield_from_isr(switch_required);
    }
}
