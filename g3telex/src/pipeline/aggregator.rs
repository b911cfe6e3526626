/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, TimeDelta, Utc};
use log::{debug, trace};

use g3_metric::{Metric, PipelineMetric};

use crate::config::AggregatorConfig;

/// A stage that folds the metrics of one period into new metrics.
pub trait Aggregator: Send {
    fn name(&self) -> &str;

    fn add(&mut self, metric: &Metric);

    /// Emit the aggregated metrics of the current period, stamped with `time`.
    fn push(&self, time: DateTime<Utc>) -> Vec<Metric>;

    fn reset(&mut self);
}

pub type BoxAggregator = Box<dyn Aggregator>;

#[derive(Default)]
pub struct AggregatorStats {
    metrics_added: AtomicU64,
    metrics_skipped: AtomicU64,
    metrics_pushed: AtomicU64,
}

impl AggregatorStats {
    pub fn metrics_added(&self) -> u64 {
        self.metrics_added.load(Ordering::Relaxed)
    }

    /// Metrics timed before the start of the current period.
    pub fn metrics_skipped(&self) -> u64 {
        self.metrics_skipped.load(Ordering::Relaxed)
    }

    pub fn metrics_pushed(&self) -> u64 {
        self.metrics_pushed.load(Ordering::Relaxed)
    }
}

pub struct RunningAggregator {
    config: AggregatorConfig,
    aggregator: BoxAggregator,
    period: TimeDelta,
    period_start: DateTime<Utc>,
    period_end: DateTime<Utc>,
    stats: Arc<AggregatorStats>,
}

impl RunningAggregator {
    pub fn new(aggregator: BoxAggregator, config: AggregatorConfig) -> Self {
        let period = TimeDelta::from_std(config.period).unwrap_or(TimeDelta::MAX);
        let now = Utc::now();
        let mut running = RunningAggregator {
            config,
            aggregator,
            period,
            period_start: now,
            period_end: now,
            stats: Arc::new(AggregatorStats::default()),
        };
        running.set_period_start(now);
        running
    }

    #[inline]
    pub fn name(&self) -> &str {
        self.config.log_name()
    }

    #[inline]
    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    pub fn stats(&self) -> Arc<AggregatorStats> {
        self.stats.clone()
    }

    pub fn set_period_start(&mut self, start: DateTime<Utc>) {
        self.period_start = start;
        self.period_end = start
            .checked_add_signed(self.period)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
    }

    #[inline]
    pub fn period_start(&self) -> DateTime<Utc> {
        self.period_start
    }

    #[inline]
    pub fn period_end(&self) -> DateTime<Utc> {
        self.period_end
    }

    /// Feed the metric to the aggregator.
    ///
    /// The metric is returned to be passed on, or released and consumed here
    /// if `drop_original` is set.
    pub fn add(&mut self, metric: PipelineMetric) -> Option<PipelineMetric> {
        if metric.metric().time() < self.period_start {
            trace!(
                "aggregator {}: skip metric {} from before the current period",
                self.name(),
                metric.metric().name()
            );
            self.stats.metrics_skipped.fetch_add(1, Ordering::Relaxed);
        } else {
            self.aggregator.add(metric.metric());
            self.stats.metrics_added.fetch_add(1, Ordering::Relaxed);
        }

        if self.config.drop_original {
            metric.discard();
            None
        } else {
            Some(metric)
        }
    }

    /// Emit the metrics of the current period and start the next one.
    pub fn push(&mut self) -> Vec<Metric> {
        let metrics = self.aggregator.push(self.period_end);
        self.aggregator.reset();
        debug!(
            "aggregator {}: pushed {} metrics for period ending {}",
            self.name(),
            metrics.len(),
            self.period_end
        );
        self.stats
            .metrics_pushed
            .fetch_add(metrics.len() as u64, Ordering::Relaxed);
        self.set_period_start(self.period_end);
        metrics
    }

    /// Push if the current period has ended at `now`.
    ///
    /// A lagging period is realigned to `now` after the push.
    pub fn push_due(&mut self, now: DateTime<Utc>) -> Vec<Metric> {
        if self.period_end > now {
            return Vec::new();
        }
        let metrics = self.push();
        if self.period_end <= now {
            self.set_period_start(now);
        }
        metrics
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::time::Duration;

    use g3_metric::{Fields, Tags, ValueType};

    use super::*;
    use crate::pipeline::output::tests::notify_to;
    use crate::testutil;

    /// Sum the `value` field of every metric into a `sum` field.
    #[derive(Default)]
    pub(crate) struct SumAggregator {
        sum: f64,
    }

    impl Aggregator for SumAggregator {
        fn name(&self) -> &str {
            "sum"
        }

        fn add(&mut self, metric: &Metric) {
            if let Some(v) = metric.field("value").and_then(|v| v.as_f64()) {
                self.sum += v;
            }
        }

        fn push(&self, time: DateTime<Utc>) -> Vec<Metric> {
            let mut fields = Fields::new();
            fields.insert("sum".to_string(), self.sum.into());
            Metric::new("TestMetric", Tags::new(), fields, time, ValueType::Untyped)
                .into_iter()
                .collect()
        }

        fn reset(&mut self) {
            self.sum = 0.0;
        }
    }

    fn value_metric(time: DateTime<Utc>, value: f64) -> Metric {
        Metric::new(
            "RITest",
            Tags::new(),
            testutil::fields_f64("value", value),
            time,
            ValueType::Untyped,
        )
        .unwrap()
    }

    fn new_sum(period: Duration, drop_original: bool) -> RunningAggregator {
        let config = AggregatorConfig {
            period,
            drop_original,
            ..AggregatorConfig::new("sum")
        };
        RunningAggregator::new(Box::new(SumAggregator::default()), config)
    }

    fn sum_of(metrics: &[Metric]) -> Option<f64> {
        metrics[0].field("sum").and_then(|v| v.as_f64())
    }

    #[test]
    fn add_and_push() {
        let mut ra = new_sum(Duration::from_millis(500), false);
        let now = Utc::now();
        ra.set_period_start(now);

        let m = value_metric(now + TimeDelta::milliseconds(150), 101.0);
        let passed = ra.add(m.into()).unwrap();
        assert_eq!(passed.metric().name(), "RITest");

        let pushed = ra.push();
        assert_eq!(pushed.len(), 1);
        assert_eq!(pushed[0].name(), "TestMetric");
        assert_eq!(sum_of(&pushed), Some(101.0));
        assert_eq!(pushed[0].time(), now + TimeDelta::milliseconds(500));
        assert_eq!(ra.stats().metrics_pushed(), 1);
    }

    #[test]
    fn metrics_outside_period() {
        let mut ra = new_sum(Duration::from_millis(500), false);
        let now = Utc::now();
        ra.set_period_start(now);

        ra.add(value_metric(now - TimeDelta::hours(1), 101.0).into());
        ra.add(value_metric(now + TimeDelta::hours(1), 101.0).into());
        ra.add(value_metric(now + TimeDelta::milliseconds(50), 101.0).into());

        let pushed = ra.push();
        assert_eq!(sum_of(&pushed), Some(202.0));
        let stats = ra.stats();
        assert_eq!(stats.metrics_added(), 2);
        assert_eq!(stats.metrics_skipped(), 1);
    }

    #[test]
    fn push_resets() {
        let mut ra = new_sum(Duration::from_secs(10), false);
        let now = Utc::now();
        ra.set_period_start(now);
        ra.add(value_metric(now, 1.0).into());

        assert_eq!(sum_of(&ra.push()), Some(1.0));
        assert_eq!(ra.period_start(), now + TimeDelta::seconds(10));
        assert_eq!(sum_of(&ra.push()), Some(0.0));
        assert_eq!(ra.period_end(), now + TimeDelta::seconds(30));
    }

    #[test]
    fn push_when_due() {
        let mut ra = new_sum(Duration::from_secs(10), false);
        let now = Utc::now();
        ra.set_period_start(now);

        assert!(ra.push_due(now + TimeDelta::seconds(5)).is_empty());
        assert_eq!(ra.push_due(now + TimeDelta::seconds(10)).len(), 1);
        assert_eq!(ra.period_start(), now + TimeDelta::seconds(10));

        let late = now + TimeDelta::seconds(45);
        assert_eq!(ra.push_due(late).len(), 1);
        assert_eq!(ra.period_start(), late);
    }

    #[test]
    fn drop_original() {
        let mut ra = new_sum(Duration::from_secs(10), true);
        let now = Utc::now();
        ra.set_period_start(now);

        let (notify_sender, delivered) = flume::unbounded();
        let (tracked, id) = g3_metric::tracking::TrackingMetric::new(
            value_metric(now, 101.0),
            notify_to(notify_sender),
        );
        assert!(ra.add(tracked.into()).is_none());

        let info = delivered.try_recv().unwrap();
        assert_eq!(info.id(), id);
        assert_eq!(info.accepted(), 0);
        assert_eq!(info.rejected(), 0);
        assert!(delivered.is_empty());
        assert_eq!(sum_of(&ra.push()), Some(101.0));
    }
}
