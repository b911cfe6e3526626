/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use log::{trace, warn};

use g3_metric::PipelineMetric;

#[async_trait]
pub trait Output: Send + Sync {
    fn name(&self) -> &str;

    /// Write a batch of metrics, the whole batch fails or succeeds together.
    async fn write(&self, metrics: &[PipelineMetric]) -> anyhow::Result<()>;
}

pub type ArcOutput = Arc<dyn Output>;

#[derive(Default)]
pub struct OutputStats {
    metrics_written: AtomicU64,
    metrics_rejected: AtomicU64,
    write_errors: AtomicU64,
}

impl OutputStats {
    pub fn metrics_written(&self) -> u64 {
        self.metrics_written.load(Ordering::Relaxed)
    }

    pub fn metrics_rejected(&self) -> u64 {
        self.metrics_rejected.load(Ordering::Relaxed)
    }

    pub fn write_errors(&self) -> u64 {
        self.write_errors.load(Ordering::Relaxed)
    }
}

/// The last holder of every metric routed to an output.
pub struct RunningOutput {
    output: ArcOutput,
    batch_size: usize,
    stats: Arc<OutputStats>,
}

impl RunningOutput {
    pub fn new(output: ArcOutput, batch_size: usize) -> Self {
        RunningOutput {
            output,
            batch_size: batch_size.max(1),
            stats: Arc::new(OutputStats::default()),
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        self.output.name()
    }

    #[inline]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn stats(&self) -> Arc<OutputStats> {
        self.stats.clone()
    }

    /// Write the batch and release every metric in it, accepted if the write
    /// succeeds or rejected if not.
    pub async fn write_batch(&self, batch: Vec<PipelineMetric>) {
        if batch.is_empty() {
            return;
        }

        let count = batch.len() as u64;
        match self.output.write(&batch).await {
            Ok(_) => {
                trace!("output {}: wrote {count} metrics", self.name());
                self.stats
                    .metrics_written
                    .fetch_add(count, Ordering::Relaxed);
                batch.into_iter().for_each(PipelineMetric::accept);
            }
            Err(e) => {
                warn!("output {}: failed to write {count} metrics: {e:?}", self.name());
                self.stats.write_errors.fetch_add(1, Ordering::Relaxed);
                self.stats
                    .metrics_rejected
                    .fetch_add(count, Ordering::Relaxed);
                batch.into_iter().for_each(PipelineMetric::reject);
            }
        }
    }

    pub(super) async fn into_running(self, receiver: flume::Receiver<PipelineMetric>) {
        let mut buf = Vec::with_capacity(self.batch_size);
        while let Ok(m) = receiver.recv_async().await {
            buf.push(m);
            super::drain_ready(&receiver, &mut buf, self.batch_size);
            self.write_batch(std::mem::take(&mut buf)).await;
        }
        trace!("output {}: input queue closed", self.name());
    }
}
