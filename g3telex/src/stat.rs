/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock};

use chrono::{DateTime, Utc};

use g3_metric::{FieldValue, Fields, Metric, Tags, ValueType};

const AGENT_STATS_MEASUREMENT: &str = "internal_agent";

static GLOBAL_AGENT_STATS: LazyLock<Arc<AgentStats>> =
    LazyLock::new(|| Arc::new(AgentStats::default()));

pub fn global_agent_stats() -> Arc<AgentStats> {
    GLOBAL_AGENT_STATS.clone()
}

#[derive(Default)]
pub struct AgentStats {
    gather_errors: AtomicU64,
}

impl AgentStats {
    pub(crate) fn add_gather_error(&self) {
        self.gather_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn gather_errors(&self) -> u64 {
        self.gather_errors.load(Ordering::Relaxed)
    }

    pub fn to_metric(&self, time: DateTime<Utc>) -> Option<Metric> {
        let mut fields = Fields::new();
        fields.insert(
            "gather_errors".to_string(),
            FieldValue::Unsigned(self.gather_errors()),
        );
        Metric::new(
            AGENT_STATS_MEASUREMENT,
            Tags::new(),
            fields,
            time,
            ValueType::Gauge,
        )
        .ok()
    }
}
