/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, error, trace};

use g3_metric::{Fields, Metric, PipelineMetric, Tags, ValueType};

use crate::stat::AgentStats;

mod tracking;
pub use tracking::TrackingAccumulator;

/// Identifies the plugin that owns an accumulator and gets the final say on
/// every metric it emits.
pub trait MetricMaker: Send + Sync {
    fn name(&self) -> &str;

    /// Return `None` to drop the metric.
    fn make_metric(&self, metric: Metric) -> Option<Metric>;
}

pub type ArcMetricMaker = Arc<dyn MetricMaker>;

/// The per plugin entry point for metrics and errors.
///
/// The `add_*` methods block the calling thread while the transport is full,
/// use them from plugin threads or `spawn_blocking`. Plugins running as async
/// tasks use the `*_async` variants, which suspend the task instead.
pub struct Accumulator {
    maker: ArcMetricMaker,
    transport: flume::Sender<PipelineMetric>,
    precision_nanos: AtomicU64,
    stats: Arc<AgentStats>,
}

impl Accumulator {
    pub fn new(maker: ArcMetricMaker, transport: flume::Sender<PipelineMetric>) -> Self {
        Accumulator::with_stats(maker, transport, crate::stat::global_agent_stats())
    }

    pub fn with_stats(
        maker: ArcMetricMaker,
        transport: flume::Sender<PipelineMetric>,
        stats: Arc<AgentStats>,
    ) -> Self {
        Accumulator {
            maker,
            transport,
            precision_nanos: AtomicU64::new(
                g3_metric::time::DEFAULT_PRECISION.as_nanos() as u64,
            ),
            stats,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        self.maker.name()
    }

    pub fn add_fields(
        &self,
        measurement: &str,
        fields: Fields,
        tags: Tags,
        time: Option<DateTime<Utc>>,
    ) {
        self.add_typed_fields(measurement, fields, tags, time, ValueType::Untyped);
    }

    pub fn add_gauge(
        &self,
        measurement: &str,
        fields: Fields,
        tags: Tags,
        time: Option<DateTime<Utc>>,
    ) {
        self.add_typed_fields(measurement, fields, tags, time, ValueType::Gauge);
    }

    pub fn add_counter(
        &self,
        measurement: &str,
        fields: Fields,
        tags: Tags,
        time: Option<DateTime<Utc>>,
    ) {
        self.add_typed_fields(measurement, fields, tags, time, ValueType::Counter);
    }

    pub fn add_summary(
        &self,
        measurement: &str,
        fields: Fields,
        tags: Tags,
        time: Option<DateTime<Utc>>,
    ) {
        self.add_typed_fields(measurement, fields, tags, time, ValueType::Summary);
    }

    pub fn add_histogram(
        &self,
        measurement: &str,
        fields: Fields,
        tags: Tags,
        time: Option<DateTime<Utc>>,
    ) {
        self.add_typed_fields(measurement, fields, tags, time, ValueType::Histogram);
    }

    fn add_typed_fields(
        &self,
        measurement: &str,
        fields: Fields,
        tags: Tags,
        time: Option<DateTime<Utc>>,
        value_type: ValueType,
    ) {
        if let Some(metric) = self.make_fields(measurement, fields, tags, time, value_type) {
            self.forward(metric);
        }
    }

    pub async fn add_fields_async(
        &self,
        measurement: &str,
        fields: Fields,
        tags: Tags,
        time: Option<DateTime<Utc>>,
    ) {
        self.add_typed_fields_async(measurement, fields, tags, time, ValueType::Untyped)
            .await;
    }

    pub async fn add_gauge_async(
        &self,
        measurement: &str,
        fields: Fields,
        tags: Tags,
        time: Option<DateTime<Utc>>,
    ) {
        self.add_typed_fields_async(measurement, fields, tags, time, ValueType::Gauge)
            .await;
    }

    pub async fn add_counter_async(
        &self,
        measurement: &str,
        fields: Fields,
        tags: Tags,
        time: Option<DateTime<Utc>>,
    ) {
        self.add_typed_fields_async(measurement, fields, tags, time, ValueType::Counter)
            .await;
    }

    pub async fn add_summary_async(
        &self,
        measurement: &str,
        fields: Fields,
        tags: Tags,
        time: Option<DateTime<Utc>>,
    ) {
        self.add_typed_fields_async(measurement, fields, tags, time, ValueType::Summary)
            .await;
    }

    pub async fn add_histogram_async(
        &self,
        measurement: &str,
        fields: Fields,
        tags: Tags,
        time: Option<DateTime<Utc>>,
    ) {
        self.add_typed_fields_async(measurement, fields, tags, time, ValueType::Histogram)
            .await;
    }

    async fn add_typed_fields_async(
        &self,
        measurement: &str,
        fields: Fields,
        tags: Tags,
        time: Option<DateTime<Utc>>,
        value_type: ValueType,
    ) {
        if let Some(metric) = self.make_fields(measurement, fields, tags, time, value_type) {
            self.forward_async(metric).await;
        }
    }

    fn make_fields(
        &self,
        measurement: &str,
        fields: Fields,
        tags: Tags,
        time: Option<DateTime<Utc>>,
        value_type: ValueType,
    ) -> Option<PipelineMetric> {
        let time = self.round_time(time.unwrap_or_else(Utc::now));
        // malformed metrics are dropped silently, plugins call this on hot paths
        let metric = match Metric::new(measurement, tags, fields, time, value_type) {
            Ok(m) => m,
            Err(e) => {
                trace!("[{}] dropped metric {measurement}: {e}", self.maker.name());
                return None;
            }
        };
        self.maker.make_metric(metric).map(PipelineMetric::Plain)
    }

    /// Add a metric built by the plugin itself, which may be tracked.
    pub fn add_metric<M: Into<PipelineMetric>>(&self, metric: M) {
        if let Some(metric) = self.make_metric(metric.into()) {
            self.forward(metric);
        }
    }

    pub async fn add_metric_async<M: Into<PipelineMetric>>(&self, metric: M) {
        if let Some(metric) = self.make_metric(metric.into()) {
            self.forward_async(metric).await;
        }
    }

    fn make_metric(&self, mut metric: PipelineMetric) -> Option<PipelineMetric> {
        let time = self.round_time(metric.metric().time());
        metric.metric_mut().set_time(time);
        metric.map_metric(|m| self.maker.make_metric(m))
    }

    // blocks the thread while the transport is full
    fn forward(&self, metric: PipelineMetric) {
        if let Err(flume::SendError(metric)) = self.transport.send(metric) {
            self.transport_closed(metric);
        }
    }

    async fn forward_async(&self, metric: PipelineMetric) {
        if let Err(flume::SendError(metric)) = self.transport.send_async(metric).await {
            self.transport_closed(metric);
        }
    }

    fn transport_closed(&self, metric: PipelineMetric) {
        debug!(
            "[{}] transport closed, rejecting metric {}",
            self.maker.name(),
            metric.metric().name()
        );
        metric.reject();
    }

    /// Record a non-fatal error reported by the plugin.
    pub fn add_error<E: fmt::Display>(&self, e: E) {
        self.stats.add_gather_error();
        error!("[{}] error in plugin: {e}", self.maker.name());
    }

    /// Record the error of a failed plugin call, an `Ok` result is passed
    /// through untouched.
    pub fn add_result<T, E: fmt::Display>(&self, r: Result<T, E>) -> Option<T> {
        match r {
            Ok(v) => Some(v),
            Err(e) => {
                self.add_error(e);
                None
            }
        }
    }

    /// Use `precision` if non-zero, or derive it from the collection interval.
    pub fn set_precision(&self, precision: Duration, interval: Duration) {
        let precision = if precision.is_zero() {
            g3_metric::time::precision_for_interval(interval)
        } else {
            precision
        };
        let nanos = u64::try_from(precision.as_nanos()).unwrap_or(u64::MAX);
        self.precision_nanos.store(nanos, Ordering::Relaxed);
    }

    pub fn precision(&self) -> Duration {
        Duration::from_nanos(self.precision_nanos.load(Ordering::Relaxed))
    }

    fn round_time(&self, time: DateTime<Utc>) -> DateTime<Utc> {
        g3_metric::time::round_time(time, self.precision())
    }

    /// Wrap into an accumulator that can track up to `max_tracked` undelivered
    /// metrics or groups.
    pub fn with_tracking(self, max_tracked: usize) -> TrackingAccumulator {
        TrackingAccumulator::new(self, max_tracked)
    }
}
