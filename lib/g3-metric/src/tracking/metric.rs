/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::sync::Arc;

use super::{NotifyFn, TrackingId, TrackingLedger};
use crate::Metric;

/// A metric bound to a delivery tracking ledger.
///
/// Every instance holds one reference on the ledger and must be released by
/// exactly one call to [`accept`](Self::accept), [`reject`](Self::reject) or
/// [`discard`](Self::discard). Use `clone` to get an extra reference.
#[derive(Debug)]
pub struct TrackingMetric {
    metric: Metric,
    ledger: Arc<TrackingLedger>,
}

impl TrackingMetric {
    pub fn new(metric: Metric, notify: NotifyFn) -> (Self, TrackingId) {
        let ledger = Arc::new(TrackingLedger::new(1, notify));
        let id = ledger.id();
        (TrackingMetric { metric, ledger }, id)
    }

    /// Track a group of metrics derived from one source event as a unit.
    ///
    /// An empty group is notified as delivered before this returns.
    pub fn new_group(group: Vec<Metric>, notify: NotifyFn) -> (Vec<Self>, TrackingId) {
        let ledger = Arc::new(TrackingLedger::new(0, notify));
        let id = ledger.id();

        let tracked = group
            .into_iter()
            .map(|metric| {
                ledger.incr();
                TrackingMetric {
                    metric,
                    ledger: ledger.clone(),
                }
            })
            .collect::<Vec<_>>();
        if tracked.is_empty() {
            ledger.notify();
        }
        (tracked, id)
    }

    #[inline]
    pub fn id(&self) -> TrackingId {
        self.ledger.id()
    }

    #[inline]
    pub fn metric(&self) -> &Metric {
        &self.metric
    }

    #[inline]
    pub fn metric_mut(&mut self) -> &mut Metric {
        &mut self.metric
    }

    pub fn accept(self) {
        self.ledger.accept();
    }

    pub fn reject(self) {
        self.ledger.reject();
    }

    /// Release without recording an outcome, e.g. when filtered out.
    pub fn discard(self) {
        self.ledger.discard();
    }

    /// Replace the inner metric, keeping the reference held by `self`.
    ///
    /// When `f` returns `None` the reference is discarded.
    pub fn map_metric<F>(self, f: F) -> Option<Self>
    where
        F: FnOnce(Metric) -> Option<Metric>,
    {
        let TrackingMetric { metric, ledger } = self;
        match f(metric) {
            Some(metric) => Some(TrackingMetric { metric, ledger }),
            None => {
                ledger.discard();
                None
            }
        }
    }
}

impl Clone for TrackingMetric {
    fn clone(&self) -> Self {
        self.ledger.incr();
        TrackingMetric {
            metric: self.metric.clone(),
            ledger: self.ledger.clone(),
        }
    }
}
