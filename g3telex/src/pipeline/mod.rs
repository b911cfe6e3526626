/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use log::{debug, trace, warn};
use tokio::task::JoinHandle;
use tokio::time::Interval;

use g3_metric::PipelineMetric;
use g3_metric::tracking::LeakCheck;

use crate::config::{AgentConfig, AggregatorConfig};

mod output;
pub use output::{ArcOutput, Output, OutputStats, RunningOutput};

mod aggregator;
pub use aggregator::{Aggregator, AggregatorStats, BoxAggregator, RunningAggregator};

const MAX_PUSH_CHECK_INTERVAL: Duration = Duration::from_secs(1);

/// A stage that sees every metric before the outputs.
///
/// A metric left out of the returned list must have been released by the
/// processor, usually with [`PipelineMetric::discard`].
pub trait Processor: Send + Sync {
    fn name(&self) -> &str;

    fn apply(&self, metrics: Vec<PipelineMetric>) -> Vec<PipelineMetric>;
}

pub type ArcProcessor = Arc<dyn Processor>;

/// Send one copy of the metric to every receiver.
///
/// The last receiver gets the original. With no receiver at all the metric is
/// discarded, and a copy sent to a closed receiver is rejected.
pub async fn fan_out(metric: PipelineMetric, senders: &[flume::Sender<PipelineMetric>]) {
    let Some((last, others)) = senders.split_last() else {
        metric.discard();
        return;
    };

    for sender in others {
        if let Err(flume::SendError(m)) = sender.send_async(metric.clone()).await {
            m.reject();
        }
    }
    if let Err(flume::SendError(m)) = last.send_async(metric).await {
        m.reject();
    }
}

fn drain_ready<T>(receiver: &flume::Receiver<T>, buf: &mut Vec<T>, batch_size: usize) {
    while buf.len() < batch_size {
        match receiver.try_recv() {
            Ok(m) => buf.push(m),
            Err(_) => break,
        }
    }
}

pub struct Pipeline {
    leak_check: LeakCheck,
    buffer_limit: usize,
    batch_size: usize,
    processors: Vec<ArcProcessor>,
    aggregators: Vec<RunningAggregator>,
    outputs: Vec<RunningOutput>,
}

impl Pipeline {
    pub fn new(config: &AgentConfig) -> Self {
        Pipeline {
            leak_check: config.leak_check,
            buffer_limit: config.metric_buffer_limit.max(1),
            batch_size: config.metric_batch_size.max(1),
            processors: Vec::new(),
            aggregators: Vec::new(),
            outputs: Vec::new(),
        }
    }

    /// Processors run in the order they are added.
    pub fn add_processor(&mut self, processor: ArcProcessor) {
        self.processors.push(processor);
    }

    /// Aggregators see the metrics left by the processors, in the order they
    /// are added.
    pub fn add_aggregator(
        &mut self,
        aggregator: BoxAggregator,
        config: AggregatorConfig,
    ) -> Arc<AggregatorStats> {
        let aggregator = RunningAggregator::new(aggregator, config);
        let stats = aggregator.stats();
        self.aggregators.push(aggregator);
        stats
    }

    pub fn add_output(&mut self, output: ArcOutput) -> Arc<OutputStats> {
        let output = RunningOutput::new(output, self.batch_size);
        let stats = output.stats();
        self.outputs.push(output);
        stats
    }

    /// Start the pipeline tasks on the current tokio runtime.
    ///
    /// The runtime should have the time driver enabled if aggregators are
    /// used.
    ///
    /// The returned sender is the transport for accumulators, the pipeline
    /// stops after every clone of it has been dropped.
    pub fn spawn(self) -> (flume::Sender<PipelineMetric>, PipelineHandle) {
        g3_metric::tracking::set_leak_check(self.leak_check);
        let (transport, receiver) = flume::bounded(self.buffer_limit);

        let mut tasks = Vec::with_capacity(self.outputs.len() + 1);
        let mut output_senders = Vec::with_capacity(self.outputs.len());
        for output in self.outputs {
            let (sender, output_receiver) = flume::bounded(self.buffer_limit);
            output_senders.push(sender);
            tasks.push(tokio::spawn(output.into_running(output_receiver)));
        }

        let now = Utc::now();
        let mut aggregators = self.aggregators;
        for agg in &mut aggregators {
            agg.set_period_start(now);
        }
        let runtime = ProcessorRuntime {
            processors: self.processors,
            aggregators,
            outputs: output_senders,
            batch_size: self.batch_size,
        };
        tasks.push(tokio::spawn(runtime.into_running(receiver)));

        (transport, PipelineHandle { tasks })
    }
}

struct ProcessorRuntime {
    processors: Vec<ArcProcessor>,
    aggregators: Vec<RunningAggregator>,
    outputs: Vec<flume::Sender<PipelineMetric>>,
    batch_size: usize,
}

impl ProcessorRuntime {
    fn push_check_interval(&self) -> Option<Interval> {
        let min_period = self.aggregators.iter().map(|a| a.config().period).min()?;
        let period = min_period.min(MAX_PUSH_CHECK_INTERVAL);
        Some(tokio::time::interval(period))
    }

    async fn into_running(mut self, receiver: flume::Receiver<PipelineMetric>) {
        let mut buf = Vec::with_capacity(self.batch_size);
        let mut push_check = self.push_check_interval();

        loop {
            tokio::select! {
                r = receiver.recv_async() => {
                    let Ok(m) = r else {
                        break;
                    };
                    buf.push(m);
                    drain_ready(&receiver, &mut buf, self.batch_size);
                    self.handle_batch(std::mem::take(&mut buf)).await;
                }
                _ = tick(&mut push_check) => {
                    self.push_aggregators(false).await;
                }
            }
        }
        debug!("transport closed, pipeline processor quit");
        self.push_aggregators(true).await;
    }

    async fn handle_batch(&mut self, mut metrics: Vec<PipelineMetric>) {
        for p in &self.processors {
            metrics = p.apply(metrics);
            trace!("processor {}: {} metrics left", p.name(), metrics.len());
        }
        for m in metrics {
            if let Some(m) = aggregate(&mut self.aggregators, m) {
                fan_out(m, &self.outputs).await;
            }
        }
    }

    async fn push_aggregators(&mut self, all: bool) {
        let now = Utc::now();
        let mut pushed = Vec::new();
        for agg in &mut self.aggregators {
            if all {
                pushed.extend(agg.push());
            } else {
                pushed.extend(agg.push_due(now));
            }
        }
        for m in pushed {
            fan_out(m.into(), &self.outputs).await;
        }
    }
}

fn aggregate(
    aggregators: &mut [RunningAggregator],
    mut metric: PipelineMetric,
) -> Option<PipelineMetric> {
    for agg in aggregators {
        metric = agg.add(metric)?;
    }
    Some(metric)
}

async fn tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

pub struct PipelineHandle {
    tasks: Vec<JoinHandle<()>>,
}

impl PipelineHandle {
    /// Wait for every pipeline task to finish.
    ///
    /// All tasks are awaited even if some of them failed, the first failure
    /// is returned.
    pub async fn join(self) -> anyhow::Result<()> {
        let mut first_err = None;
        for task in self.tasks {
            if let Err(e) = task.await {
                warn!("pipeline task failed: {e}");
                if first_err.is_none() {
                    first_err = Some(e);
                }
            }
        }
        match first_err {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }
}
