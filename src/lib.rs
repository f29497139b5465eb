// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Board-support glue for RTOS demo applications on ARM Cortex-M.
//!
//! This crate collects two small, unrelated adapters that RTOS demo
//! applications tend to need and that otherwise get rewritten for every
//! board:
//!
//! - [`stats`] keeps a steadily increasing, wrap-compensated tick count
//!   derived from the Cortex-M DWT cycle counter, suitable for feeding a
//!   run-time-statistics reporter that computes per-task CPU usage.
//!
//! - [`nesting`] drives a compare-match timer at a fixed frequency and, on
//!   most firings, manually pends a second, higher-priority interrupt so an
//!   external interrupt-queue test suite can exercise nested interrupt
//!   handling.
//!
//! Neither adapter talks to the other; both forward events to collaborators
//! you supply. The hardware they touch is injected -- `cortex-m` peripheral
//! handles for the cycle counter, small traits for the board timer and
//! interrupt controller -- so the interesting logic is plain owned state
//! that can be tested off-target.
//!
//! # Design principles
//!
//! 1. Be compact. These are leaf utilities; they should not drag in an
//!    allocator, a panicking API surface, or anything that grows the text
//!    size of a demo image.
//!
//! 2. No ambient state. Every counter lives in an adapter struct that the
//!    application owns and passes around. There are no `static mut`s here;
//!    if you need an adapter inside an ISR, the storage (and the discipline
//!    around it) is yours, as it would be for any other peripheral handle.
//!
//! 3. No magic. Each operation maps onto an obvious sequence of register
//!    accesses, in the order the hardware wants them.
//!
//! # Concurrency
//!
//! Nothing in this crate locks. [`stats::StatsClock`] must only ever be
//! polled from a single execution context, and [`nesting::NestingTimer`]
//! relies on the nested interrupt line being programmed strictly more
//! urgent than the primary line. Both constraints come from the hardware
//! arrangement, not from this crate, and both are spelled out on the types
//! in question.

#![cfg_attr(not(test), no_std)]

#![warn(
    elided_lifetimes_in_paths,
    explicit_outlives_requirements,
    missing_debug_implementations,
    missing_docs,
    semicolon_in_expressions_from_macros,
    single_use_lifetimes,
    trivial_casts,
    trivial_numeric_casts,
    unreachable_pub,
    unsafe_op_in_unsafe_fn,
    unused_qualifications,
)]

#[cfg(feature = "stats")]
pub mod stats;

#[cfg(feature = "int-queue")]
pub mod nesting;
