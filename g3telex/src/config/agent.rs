/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::time::Duration;

use anyhow::{Context, anyhow};
use yaml_rust::{Yaml, yaml};

use g3_metric::Tags;
use g3_metric::tracking::LeakCheck;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AgentConfig {
    pub interval: Duration,
    /// zero means derive it from the collection interval
    pub precision: Duration,
    pub global_tags: Tags,
    pub metric_buffer_limit: usize,
    pub metric_batch_size: usize,
    pub leak_check: LeakCheck,
}

impl Default for AgentConfig {
    fn default() -> Self {
        AgentConfig {
            interval: Duration::from_secs(10),
            precision: Duration::ZERO,
            global_tags: Tags::new(),
            metric_buffer_limit: 10000,
            metric_batch_size: 1000,
            leak_check: LeakCheck::Off,
        }
    }
}

impl AgentConfig {
    pub fn parse(map: &yaml::Hash) -> anyhow::Result<Self> {
        let mut config = AgentConfig::default();

        super::foreach_kv(map, |k, v| config.set(k, v))?;

        config.check()?;
        Ok(config)
    }

    pub fn load_str(content: &str) -> anyhow::Result<Self> {
        let map = super::load_hash(content)?;
        AgentConfig::parse(&map)
    }

    fn set(&mut self, k: &str, v: &Yaml) -> anyhow::Result<()> {
        match super::normalize(k).as_str() {
            "interval" => {
                self.interval = super::as_duration(v)
                    .context(format!("invalid humanize duration value for key {k}"))?;
                Ok(())
            }
            "precision" => {
                self.precision = super::as_duration(v)
                    .context(format!("invalid humanize duration value for key {k}"))?;
                Ok(())
            }
            "global_tags" => {
                self.global_tags =
                    super::as_tags(v).context(format!("invalid tags value for key {k}"))?;
                Ok(())
            }
            "metric_buffer_limit" => {
                self.metric_buffer_limit =
                    super::as_usize(v).context(format!("invalid usize value for key {k}"))?;
                Ok(())
            }
            "metric_batch_size" => {
                self.metric_batch_size =
                    super::as_usize(v).context(format!("invalid usize value for key {k}"))?;
                Ok(())
            }
            "leak_check" => {
                self.leak_check = super::as_leak_check(v)
                    .context(format!("invalid leak check value for key {k}"))?;
                Ok(())
            }
            _ => Err(anyhow!("invalid key {k}")),
        }
    }

    fn check(&mut self) -> anyhow::Result<()> {
        if self.interval.is_zero() {
            return Err(anyhow!("interval should not be zero"));
        }
        if self.metric_buffer_limit == 0 {
            return Err(anyhow!("metric_buffer_limit should not be zero"));
        }
        if self.metric_batch_size == 0 {
            return Err(anyhow!("metric_batch_size should not be zero"));
        }
        if self.metric_batch_size > self.metric_buffer_limit {
            self.metric_batch_size = self.metric_buffer_limit;
        }
        Ok(())
    }
}
