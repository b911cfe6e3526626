/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::fmt;
use std::sync::atomic::{AtomicIsize, AtomicUsize, Ordering};

use log::error;

use super::{DeliveryInfo, LEAKED_LEDGERS, LeakCheck, NotifyFn, TrackingId};

pub(super) struct TrackingLedger {
    id: TrackingId,
    rc: AtomicIsize,
    accepted: AtomicUsize,
    rejected: AtomicUsize,
    notify: NotifyFn,
}

impl TrackingLedger {
    pub(super) fn new(rc: isize, notify: NotifyFn) -> Self {
        TrackingLedger {
            id: TrackingId::new_unique(),
            rc: AtomicIsize::new(rc),
            accepted: AtomicUsize::new(0),
            rejected: AtomicUsize::new(0),
            notify,
        }
    }

    #[inline]
    pub(super) fn id(&self) -> TrackingId {
        self.id
    }

    #[cfg(test)]
    pub(super) fn ref_count(&self) -> isize {
        self.rc.load(Ordering::Acquire)
    }

    pub(super) fn incr(&self) {
        self.rc.fetch_add(1, Ordering::Relaxed);
    }

    pub(super) fn accept(&self) {
        self.accepted.fetch_add(1, Ordering::Relaxed);
        self.decr();
    }

    pub(super) fn reject(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
        self.decr();
    }

    pub(super) fn discard(&self) {
        self.decr();
    }

    fn decr(&self) {
        let rc = self.rc.fetch_sub(1, Ordering::AcqRel) - 1;
        if rc < 0 {
            super::contract_violation(format_args!(
                "tracking ledger {} released more times than acquired, reference count {rc}",
                self.id
            ));
        }
        if rc == 0 {
            self.notify();
        }
    }

    /// Only the holder of the last reference may call this.
    pub(super) fn notify(&self) {
        let info = DeliveryInfo {
            id: self.id,
            accepted: self.accepted.load(Ordering::Acquire),
            rejected: self.rejected.load(Ordering::Acquire),
        };
        (self.notify)(info);
    }
}

impl fmt::Debug for TrackingLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackingLedger")
            .field("id", &self.id)
            .field("rc", &self.rc.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

impl Drop for TrackingLedger {
    fn drop(&mut self) {
        let rc = *self.rc.get_mut();
        if rc == 0 {
            return;
        }
        let check = super::leak_check();
        if check == LeakCheck::Off {
            return;
        }

        LEAKED_LEDGERS.fetch_add(1, Ordering::Relaxed);
        error!(
            "tracked metric {} reclaimed with non-zero reference count {rc}",
            self.id
        );
        if check == LeakCheck::Abort {
            // the log backend may be asynchronous
            eprintln!(
                "fatal: tracked metric {} reclaimed with non-zero reference count {rc}",
                self.id
            );
            std::process::abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    fn recording_notify() -> (NotifyFn, Arc<Mutex<Vec<DeliveryInfo>>>) {
        let records = Arc::new(Mutex::new(Vec::new()));
        let records2 = records.clone();
        let notify: NotifyFn = Arc::new(move |info| records2.lock().unwrap().push(info));
        (notify, records)
    }

    #[test]
    fn single_accept() {
        let (notify, records) = recording_notify();
        let ledger = TrackingLedger::new(1, notify);
        ledger.accept();

        let records = records.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id(), ledger.id());
        assert_eq!(records[0].accepted(), 1);
        assert_eq!(records[0].rejected(), 0);
        assert!(records[0].delivered());
    }

    #[test]
    fn notify_on_last_release() {
        let (notify, records) = recording_notify();
        let ledger = TrackingLedger::new(1, notify);
        ledger.incr();
        ledger.incr();
        assert_eq!(ledger.ref_count(), 3);

        ledger.accept();
        ledger.discard();
        assert!(records.lock().unwrap().is_empty());
        ledger.reject();

        let records = records.lock().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].accepted(), 1);
        assert_eq!(records[0].rejected(), 1);
        assert!(!records[0].delivered());
    }

    #[test]
    #[should_panic(expected = "released more times than acquired")]
    fn release_past_zero() {
        crate::tracking::set_violation_action(crate::tracking::ViolationAction::Panic);
        let (notify, _records) = recording_notify();
        let ledger = TrackingLedger::new(1, notify);
        ledger.accept();
        ledger.accept();
    }
}
