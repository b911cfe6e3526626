/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

//! Delivery tracking for metrics.
//!
//! A tracked metric shares a reference counted ledger with every clone made
//! of it while it travels through the pipeline. Each holder releases its
//! reference exactly once by accepting, rejecting or discarding it, and the
//! release that brings the count to zero notifies the owner of the ledger.

use std::fmt;
use std::num::NonZeroU64;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};

use log::error;

mod ledger;
use ledger::TrackingLedger;

mod metric;
pub use metric::TrackingMetric;

static LAST_TRACKING_ID: AtomicU64 = AtomicU64::new(0);

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TrackingId(NonZeroU64);

impl TrackingId {
    /// Allocate a tracking id that is unique in current process
    pub fn new_unique() -> Self {
        let id = LAST_TRACKING_ID.fetch_add(1, Ordering::Relaxed) + 1;
        match NonZeroU64::new(id) {
            Some(id) => TrackingId(id),
            None => panic!("tracking id space exhausted"),
        }
    }

    #[inline]
    pub fn as_u64(&self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for TrackingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DeliveryInfo {
    id: TrackingId,
    accepted: usize,
    rejected: usize,
}

impl DeliveryInfo {
    #[inline]
    pub fn id(&self) -> TrackingId {
        self.id
    }

    #[inline]
    pub fn accepted(&self) -> usize {
        self.accepted
    }

    #[inline]
    pub fn rejected(&self) -> usize {
        self.rejected
    }

    #[inline]
    pub fn delivered(&self) -> bool {
        self.rejected == 0
    }
}

/// Called once per ledger, from whichever holder released the last reference.
pub type NotifyFn = Arc<dyn Fn(DeliveryInfo) + Send + Sync>;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LeakCheck {
    #[default]
    Off,
    /// log the leak and count it in [`leaked_ledgers`]
    Log,
    /// log the leak and abort the process
    Abort,
}

impl LeakCheck {
    fn as_u8(self) -> u8 {
        match self {
            LeakCheck::Off => 0,
            LeakCheck::Log => 1,
            LeakCheck::Abort => 2,
        }
    }

    fn from_u8(v: u8) -> Self {
        match v {
            1 => LeakCheck::Log,
            2 => LeakCheck::Abort,
            _ => LeakCheck::Off,
        }
    }
}

static LEAK_CHECK: AtomicU8 = AtomicU8::new(0);
static LEAKED_LEDGERS: AtomicU64 = AtomicU64::new(0);

/// Set how a ledger reclaimed with a non-zero reference count is reported.
pub fn set_leak_check(check: LeakCheck) {
    LEAK_CHECK.store(check.as_u8(), Ordering::Relaxed);
}

pub fn leak_check() -> LeakCheck {
    LeakCheck::from_u8(LEAK_CHECK.load(Ordering::Relaxed))
}

/// Number of leaked ledgers reported since process start
pub fn leaked_ledgers() -> u64 {
    LEAKED_LEDGERS.load(Ordering::Relaxed)
}

/// What to do when a holder breaks the tracking contract, e.g. by releasing
/// a ledger more often than it was acquired.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ViolationAction {
    /// log the violation and abort the process
    #[default]
    Abort,
    /// log the violation and panic, only meant for tests
    Panic,
}

static VIOLATION_ACTION: AtomicU8 = AtomicU8::new(0);

pub fn set_violation_action(action: ViolationAction) {
    let v = match action {
        ViolationAction::Abort => 0,
        ViolationAction::Panic => 1,
    };
    VIOLATION_ACTION.store(v, Ordering::Relaxed);
}

pub fn violation_action() -> ViolationAction {
    match VIOLATION_ACTION.load(Ordering::Relaxed) {
        1 => ViolationAction::Panic,
        _ => ViolationAction::Abort,
    }
}

/// Report a broken tracking contract.
///
/// The counts of the affected ledger can no longer be trusted, so this never
/// returns. A panic would be caught by the runtime of the task that made the
/// release, so the process is aborted unless [`ViolationAction::Panic`] is set.
#[cold]
pub fn contract_violation(msg: fmt::Arguments<'_>) -> ! {
    error!("tracking contract violation: {msg}");
    match violation_action() {
        ViolationAction::Panic => panic!("{msg}"),
        ViolationAction::Abort => {
            // the log backend may be asynchronous
            eprintln!("fatal: tracking contract violation: {msg}");
            std::process::abort()
        }
    }
}
