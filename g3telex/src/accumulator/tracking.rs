/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::ops::Deref;
use std::sync::Arc;

use log::trace;

use g3_metric::Metric;
use g3_metric::tracking::{self, DeliveryInfo, NotifyFn, TrackingId, TrackingMetric};

use super::Accumulator;

/// An accumulator whose metrics report back once every downstream stage has
/// finished with them.
pub struct TrackingAccumulator {
    inner: Accumulator,
    max_tracked: usize,
    notify: NotifyFn,
    delivered: flume::Receiver<DeliveryInfo>,
}

impl TrackingAccumulator {
    pub(super) fn new(inner: Accumulator, max_tracked: usize) -> Self {
        let (sender, receiver) = flume::bounded(max_tracked);
        let name = inner.name().to_string();
        let notify: NotifyFn = Arc::new(move |info: DeliveryInfo| {
            match sender.try_send(info) {
                Ok(_) => {}
                Err(flume::TrySendError::Full(info)) => {
                    // the plugin has more metrics in flight than it asked room for
                    tracking::contract_violation(format_args!(
                        "[{name}] delivery queue is full (capacity {max_tracked}), \
                         unable to notify tracking id {}",
                        info.id()
                    ));
                }
                Err(flume::TrySendError::Disconnected(info)) => {
                    trace!("[{name}] delivery queue closed, drop notification for {}", info.id());
                }
            }
        });

        TrackingAccumulator {
            inner,
            max_tracked,
            notify,
            delivered: receiver,
        }
    }

    #[inline]
    pub fn max_tracked(&self) -> usize {
        self.max_tracked
    }

    pub fn add_tracking_metric(&self, metric: Metric) -> TrackingId {
        let (metric, id) = TrackingMetric::new(metric, self.notify.clone());
        self.inner.add_metric(metric);
        id
    }

    pub async fn add_tracking_metric_async(&self, metric: Metric) -> TrackingId {
        let (metric, id) = TrackingMetric::new(metric, self.notify.clone());
        self.inner.add_metric_async(metric).await;
        id
    }

    /// Track metrics parsed from one source event, they will be reported
    /// under a single tracking id.
    pub fn add_tracking_metric_group(&self, group: Vec<Metric>) -> TrackingId {
        let (group, id) = TrackingMetric::new_group(group, self.notify.clone());
        for metric in group {
            self.inner.add_metric(metric);
        }
        id
    }

    pub async fn add_tracking_metric_group_async(&self, group: Vec<Metric>) -> TrackingId {
        let (group, id) = TrackingMetric::new_group(group, self.notify.clone());
        for metric in group {
            self.inner.add_metric_async(metric).await;
        }
        id
    }

    /// The queue delivery notifications are pushed to.
    #[inline]
    pub fn delivered(&self) -> &flume::Receiver<DeliveryInfo> {
        &self.delivered
    }
}

impl Deref for TrackingAccumulator {
    type Target = Accumulator;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use chrono::Utc;
    use g3_metric::{PipelineMetric, Tags};

    use super::*;
    use crate::stat::AgentStats;
    use crate::testutil::{self, NamedMaker};

    fn new_tracking_acc(
        max_tracked: usize,
    ) -> (TrackingAccumulator, flume::Receiver<PipelineMetric>) {
        let (sender, receiver) = flume::bounded(64);
        let acc = Accumulator::with_stats(
            NamedMaker::arc("tracking"),
            sender,
            Arc::new(AgentStats::default()),
        );
        (acc.with_tracking(max_tracked), receiver)
    }

    #[test]
    fn accept_single() {
        let (acc, receiver) = new_tracking_acc(4);
        let id = acc.add_tracking_metric(testutil::metric("cpu", Utc::now()));

        let m = receiver.try_recv().unwrap();
        assert_eq!(m.tracking_id(), Some(id));
        assert!(acc.delivered().is_empty());
        m.accept();

        let info = acc.delivered().try_recv().unwrap();
        assert_eq!(info.id(), id);
        assert_eq!(info.accepted(), 1);
        assert_eq!(info.rejected(), 0);
        assert!(info.delivered());
        assert!(acc.delivered().is_empty());
    }

    #[test]
    fn fan_out_to_three_stages() {
        let (acc, receiver) = new_tracking_acc(4);
        let mut fields = g3_metric::Fields::new();
        fields.insert("usage".to_string(), 42.0.into());
        let metric = Metric::new(
            "cpu",
            testutil::tags("host", "a"),
            fields,
            Utc::now(),
            g3_metric::ValueType::Untyped,
        )
        .unwrap();
        let id = acc.add_tracking_metric(metric);

        let m = receiver.try_recv().unwrap();
        let stages = (0..3).map(|_| m.clone()).collect::<Vec<_>>();
        let handles = stages
            .into_iter()
            .map(|c| thread::spawn(move || c.accept()))
            .collect::<Vec<_>>();
        m.accept();
        for h in handles {
            h.join().unwrap();
        }

        let info = acc.delivered().try_recv().unwrap();
        assert_eq!(info.id(), id);
        assert_eq!(info.accepted(), 4);
        assert_eq!(info.rejected(), 0);
        assert!(info.delivered());
        assert!(acc.delivered().try_recv().is_err());
    }

    #[test]
    fn reject_group() {
        let (acc, receiver) = new_tracking_acc(4);
        let group = vec![
            testutil::metric("a", Utc::now()),
            testutil::metric("b", Utc::now()),
        ];
        let id = acc.add_tracking_metric_group(group);

        let first = receiver.try_recv().unwrap();
        let second = receiver.try_recv().unwrap();
        assert_eq!(first.tracking_id(), Some(id));
        assert_eq!(second.tracking_id(), Some(id));
        first.accept();
        assert!(acc.delivered().is_empty());
        second.reject();

        let info = acc.delivered().try_recv().unwrap();
        assert_eq!(info.id(), id);
        assert_eq!(info.accepted(), 1);
        assert_eq!(info.rejected(), 1);
        assert!(!info.delivered());
    }

    #[test]
    fn empty_group() {
        let (acc, receiver) = new_tracking_acc(4);
        let id = acc.add_tracking_metric_group(Vec::new());
        assert!(receiver.is_empty());

        let info = acc.delivered().try_recv().unwrap();
        assert_eq!(info.id(), id);
        assert_eq!(info.accepted(), 0);
        assert_eq!(info.rejected(), 0);
        assert!(info.delivered());
    }

    #[test]
    fn vetoed_metric_is_released() {
        let (sender, receiver) = flume::bounded(4);
        let acc = Accumulator::with_stats(
            Arc::new(testutil::VetoMaker),
            sender,
            Arc::new(AgentStats::default()),
        )
        .with_tracking(2);
        let id = acc.add_tracking_metric(testutil::metric("cpu", Utc::now()));
        assert!(receiver.is_empty());

        let info = acc.delivered().try_recv().unwrap();
        assert_eq!(info.id(), id);
        assert_eq!(info.accepted(), 0);
        assert_eq!(info.rejected(), 0);
    }

    #[test]
    fn untracked_metrics_pass_through() {
        let (acc, receiver) = new_tracking_acc(1);
        acc.add_fields("cpu", testutil::fields_f64("usage", 1.0), Tags::new(), None);
        let m = receiver.try_recv().unwrap();
        assert!(m.tracking_id().is_none());
        m.accept();
        assert!(acc.delivered().is_empty());
    }

    #[tokio::test]
    async fn async_group() {
        let (acc, receiver) = new_tracking_acc(2);
        let group = vec![
            testutil::metric("a", Utc::now()),
            testutil::metric("b", Utc::now()),
        ];
        let id = acc.add_tracking_metric_group_async(group).await;
        let single = acc
            .add_tracking_metric_async(testutil::metric("c", Utc::now()))
            .await;
        assert_ne!(id, single);

        for m in receiver.drain() {
            m.accept();
        }
        let infos = acc.delivered().drain().collect::<Vec<_>>();
        assert_eq!(infos.len(), 2);
        assert_eq!(infos[0].id(), id);
        assert_eq!(infos[0].accepted(), 2);
        assert_eq!(infos[1].id(), single);
        assert_eq!(infos[1].accepted(), 1);
    }

    #[tokio::test]
    async fn wait_for_delivery() {
        let (acc, receiver) = new_tracking_acc(1);
        let id = acc.add_tracking_metric(testutil::metric("cpu", Utc::now()));

        let stage = tokio::spawn(async move {
            let m = receiver.recv_async().await.unwrap();
            m.accept();
        });

        let info = acc.delivered().recv_async().await.unwrap();
        assert_eq!(info.id(), id);
        assert!(info.delivered());
        stage.await.unwrap();
    }

    #[test]
    #[should_panic(expected = "delivery queue is full")]
    fn delivery_queue_overflow() {
        tracking::set_violation_action(tracking::ViolationAction::Panic);
        let (acc, receiver) = new_tracking_acc(1);
        acc.add_tracking_metric(testutil::metric("a", Utc::now()));
        acc.add_tracking_metric(testutil::metric("b", Utc::now()));
        for m in receiver.drain() {
            m.accept();
        }
    }
}
