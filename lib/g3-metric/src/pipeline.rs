/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use crate::Metric;
use crate::tracking::{TrackingId, TrackingMetric};

/// The unit passed between pipeline stages.
///
/// A stage that receives one must finish it with exactly one of `accept`,
/// `reject` or `discard`, and must `clone` it for every extra copy it
/// forwards. All three are no-ops for untracked metrics.
#[derive(Debug, Clone)]
pub enum PipelineMetric {
    Plain(Metric),
    Tracked(TrackingMetric),
}

impl PipelineMetric {
    #[inline]
    pub fn metric(&self) -> &Metric {
        match self {
            PipelineMetric::Plain(m) => m,
            PipelineMetric::Tracked(m) => m.metric(),
        }
    }

    #[inline]
    pub fn metric_mut(&mut self) -> &mut Metric {
        match self {
            PipelineMetric::Plain(m) => m,
            PipelineMetric::Tracked(m) => m.metric_mut(),
        }
    }

    pub fn tracking_id(&self) -> Option<TrackingId> {
        match self {
            PipelineMetric::Plain(_) => None,
            PipelineMetric::Tracked(m) => Some(m.id()),
        }
    }

    pub fn accept(self) {
        if let PipelineMetric::Tracked(m) = self {
            m.accept();
        }
    }

    pub fn reject(self) {
        if let PipelineMetric::Tracked(m) = self {
            m.reject();
        }
    }

    pub fn discard(self) {
        if let PipelineMetric::Tracked(m) = self {
            m.discard();
        }
    }

    /// Transform or veto the inner metric. A vetoed tracked metric is
    /// discarded.
    pub fn map_metric<F>(self, f: F) -> Option<Self>
    where
        F: FnOnce(Metric) -> Option<Metric>,
    {
        match self {
            PipelineMetric::Plain(m) => f(m).map(PipelineMetric::Plain),
            PipelineMetric::Tracked(m) => m.map_metric(f).map(PipelineMetric::Tracked),
        }
    }
}

impl From<Metric> for PipelineMetric {
    fn from(m: Metric) -> Self {
        PipelineMetric::Plain(m)
    }
}

impl From<TrackingMetric> for PipelineMetric {
    fn from(m: TrackingMetric) -> Self {
        PipelineMetric::Tracked(m)
    }
}
