/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};

use g3_metric::{FieldValue, Fields, Metric, Tags, ValueType};

use crate::accumulator::{ArcMetricMaker, MetricMaker};

pub(crate) struct NamedMaker {
    name: String,
}

impl NamedMaker {
    pub(crate) fn arc(name: &str) -> ArcMetricMaker {
        Arc::new(NamedMaker {
            name: name.to_string(),
        })
    }
}

impl MetricMaker for NamedMaker {
    fn name(&self) -> &str {
        &self.name
    }

    fn make_metric(&self, metric: Metric) -> Option<Metric> {
        Some(metric)
    }
}

pub(crate) struct VetoMaker;

impl MetricMaker for VetoMaker {
    fn name(&self) -> &str {
        "veto"
    }

    fn make_metric(&self, _metric: Metric) -> Option<Metric> {
        None
    }
}

pub(crate) fn time(secs: i64, nanos: u32) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, nanos).unwrap()
}

pub(crate) fn fields_f64(k: &str, v: f64) -> Fields {
    let mut fields = Fields::new();
    fields.insert(k.to_string(), FieldValue::Float(v));
    fields
}

pub(crate) fn tags(k: &str, v: &str) -> Tags {
    let mut tags = Tags::new();
    tags.insert(k.to_string(), v.to_string());
    tags
}

pub(crate) fn metric(name: &str, time: DateTime<Utc>) -> Metric {
    Metric::new(
        name,
        Tags::new(),
        fields_f64("value", 1.0),
        time,
        ValueType::Untyped,
    )
    .unwrap()
}
