/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use log::debug;

use g3_metric::{Metric, PipelineMetric, Tags};

use crate::accumulator::{Accumulator, MetricMaker, TrackingAccumulator};
use crate::config::{AgentConfig, InputConfig};

/// The accumulator handed to an input plugin.
pub enum InputAccumulator {
    Plain(Accumulator),
    Tracking(TrackingAccumulator),
}

impl InputAccumulator {
    pub fn accumulator(&self) -> &Accumulator {
        match self {
            InputAccumulator::Plain(acc) => acc,
            InputAccumulator::Tracking(acc) => &**acc,
        }
    }

    pub fn tracking(&self) -> Option<&TrackingAccumulator> {
        match self {
            InputAccumulator::Plain(_) => None,
            InputAccumulator::Tracking(acc) => Some(acc),
        }
    }
}

/// An input plugin instance with its naming and tagging settings applied to
/// every metric it produces.
pub struct RunningInput {
    config: InputConfig,
    global_tags: Tags,
    metrics_gathered: AtomicU64,
}

impl RunningInput {
    pub fn new(config: InputConfig, global_tags: Tags) -> Arc<Self> {
        Arc::new(RunningInput {
            config,
            global_tags,
            metrics_gathered: AtomicU64::new(0),
        })
    }

    #[inline]
    pub fn config(&self) -> &InputConfig {
        &self.config
    }

    pub fn metrics_gathered(&self) -> u64 {
        self.metrics_gathered.load(Ordering::Relaxed)
    }

    pub fn interval(&self, agent: &AgentConfig) -> Duration {
        self.config.interval.unwrap_or(agent.interval)
    }

    pub fn new_accumulator(
        self: &Arc<Self>,
        transport: flume::Sender<PipelineMetric>,
        agent: &AgentConfig,
    ) -> InputAccumulator {
        let acc = Accumulator::new(self.clone(), transport);
        let precision = self.config.precision.unwrap_or(agent.precision);
        acc.set_precision(precision, self.interval(agent));
        debug!(
            "[{}] new accumulator with precision {:?}",
            self.config.log_name(),
            acc.precision()
        );

        match self.config.max_undelivered {
            0 => InputAccumulator::Plain(acc),
            n => InputAccumulator::Tracking(acc.with_tracking(n)),
        }
    }
}

impl MetricMaker for RunningInput {
    fn name(&self) -> &str {
        self.config.log_name()
    }

    fn make_metric(&self, mut metric: Metric) -> Option<Metric> {
        if let Some(name) = &self.config.name_override {
            metric.set_name(name.as_str());
        }
        if let Some(prefix) = &self.config.name_prefix {
            metric.add_prefix(prefix);
        }
        if let Some(suffix) = &self.config.name_suffix {
            metric.add_suffix(suffix);
        }

        for (k, v) in self.config.tags.iter().chain(self.global_tags.iter()) {
            if !metric.has_tag(k) {
                metric.add_tag(k.as_str(), v.as_str());
            }
        }

        self.metrics_gathered.fetch_add(1, Ordering::Relaxed);
        Some(metric)
    }
}
