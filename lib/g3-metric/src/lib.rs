/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

mod value;
pub use value::{FieldValue, ValueType};

mod metric;
pub use metric::{Fields, Metric, MetricError, Tags};

mod pipeline;
pub use pipeline::PipelineMetric;

pub mod time;
pub mod tracking;
