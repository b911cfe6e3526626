/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::time::Duration;

use anyhow::{Context, anyhow};
use yaml_rust::{Yaml, yaml};

const DEFAULT_PERIOD: Duration = Duration::from_secs(30);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AggregatorConfig {
    pub name: String,
    pub alias: Option<String>,
    pub period: Duration,
    /// discard the metrics seen by the aggregator instead of passing them on
    pub drop_original: bool,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        AggregatorConfig {
            name: String::new(),
            alias: None,
            period: DEFAULT_PERIOD,
            drop_original: false,
        }
    }
}

impl AggregatorConfig {
    pub fn new(name: &str) -> Self {
        AggregatorConfig {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn parse(map: &yaml::Hash) -> anyhow::Result<Self> {
        let mut config = AggregatorConfig::default();

        super::foreach_kv(map, |k, v| config.set(k, v))?;

        config.check()?;
        Ok(config)
    }

    pub fn load_str(content: &str) -> anyhow::Result<Self> {
        let map = super::load_hash(content)?;
        AggregatorConfig::parse(&map)
    }

    fn set(&mut self, k: &str, v: &Yaml) -> anyhow::Result<()> {
        match super::normalize(k).as_str() {
            "name" => {
                self.name =
                    super::as_string(v).context(format!("invalid string value for key {k}"))?;
                Ok(())
            }
            "alias" => {
                let alias =
                    super::as_string(v).context(format!("invalid string value for key {k}"))?;
                self.alias = if alias.is_empty() { None } else { Some(alias) };
                Ok(())
            }
            "period" => {
                self.period = super::as_duration(v)
                    .context(format!("invalid humanize duration value for key {k}"))?;
                Ok(())
            }
            "drop_original" => {
                self.drop_original =
                    super::as_bool(v).context(format!("invalid bool value for key {k}"))?;
                Ok(())
            }
            _ => Err(anyhow!("invalid key {k}")),
        }
    }

    fn check(&mut self) -> anyhow::Result<()> {
        if self.name.is_empty() {
            return Err(anyhow!("name is not set"));
        }
        if self.period.is_zero() {
            return Err(anyhow!("period should not be zero"));
        }
        Ok(())
    }

    pub fn log_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}
