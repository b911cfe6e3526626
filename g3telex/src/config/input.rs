/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::time::Duration;

use anyhow::{Context, anyhow};
use yaml_rust::{Yaml, yaml};

use g3_metric::Tags;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InputConfig {
    pub name: String,
    pub alias: Option<String>,
    pub name_override: Option<String>,
    pub name_prefix: Option<String>,
    pub name_suffix: Option<String>,
    pub tags: Tags,
    /// fall back to the agent interval if not set
    pub interval: Option<Duration>,
    /// fall back to the agent precision if not set
    pub precision: Option<Duration>,
    /// 0 means the input does not track delivery
    pub max_undelivered: usize,
}

impl InputConfig {
    pub fn new(name: &str) -> Self {
        InputConfig {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn parse(map: &yaml::Hash) -> anyhow::Result<Self> {
        let mut config = InputConfig::default();

        super::foreach_kv(map, |k, v| config.set(k, v))?;

        config.check()?;
        Ok(config)
    }

    pub fn load_str(content: &str) -> anyhow::Result<Self> {
        let map = super::load_hash(content)?;
        InputConfig::parse(&map)
    }

    fn set(&mut self, k: &str, v: &Yaml) -> anyhow::Result<()> {
        match super::normalize(k).as_str() {
            "name" => {
                self.name =
                    super::as_string(v).context(format!("invalid string value for key {k}"))?;
                Ok(())
            }
            "alias" => {
                self.alias = non_empty(v).context(format!("invalid string value for key {k}"))?;
                Ok(())
            }
            "name_override" => {
                self.name_override =
                    non_empty(v).context(format!("invalid string value for key {k}"))?;
                Ok(())
            }
            "name_prefix" => {
                self.name_prefix =
                    non_empty(v).context(format!("invalid string value for key {k}"))?;
                Ok(())
            }
            "name_suffix" => {
                self.name_suffix =
                    non_empty(v).context(format!("invalid string value for key {k}"))?;
                Ok(())
            }
            "tags" => {
                self.tags = super::as_tags(v).context(format!("invalid tags value for key {k}"))?;
                Ok(())
            }
            "interval" => {
                let interval = super::as_duration(v)
                    .context(format!("invalid humanize duration value for key {k}"))?;
                self.interval = Some(interval);
                Ok(())
            }
            "precision" => {
                let precision = super::as_duration(v)
                    .context(format!("invalid humanize duration value for key {k}"))?;
                self.precision = Some(precision);
                Ok(())
            }
            "max_undelivered" => {
                self.max_undelivered =
                    super::as_usize(v).context(format!("invalid usize value for key {k}"))?;
                Ok(())
            }
            _ => Err(anyhow!("invalid key {k}")),
        }
    }

    fn check(&mut self) -> anyhow::Result<()> {
        if self.name.is_empty() {
            return Err(anyhow!("name is not set"));
        }
        if matches!(self.interval, Some(d) if d.is_zero()) {
            return Err(anyhow!("interval should not be zero"));
        }
        Ok(())
    }

    /// The name used in logs, the alias if one is set.
    pub fn log_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }
}

fn non_empty(v: &Yaml) -> anyhow::Result<Option<String>> {
    let s = super::as_string(v)?;
    if s.is_empty() { Ok(None) } else { Ok(Some(s)) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse() {
        let config = InputConfig::load_str(
            r#"
            name: cpu
            alias: cpu0
            name-override: processor
            Name_Prefix: "sys_"
            name_suffix: ""
            tags:
              host: a
            interval: 30s
            precision: 1s
            max_undelivered: 100
            "#,
        )
        .unwrap();
        assert_eq!(config.name, "cpu");
        assert_eq!(config.log_name(), "cpu0");
        assert_eq!(config.name_override.as_deref(), Some("processor"));
        assert_eq!(config.name_prefix.as_deref(), Some("sys_"));
        assert!(config.name_suffix.is_none());
        assert_eq!(config.tags.get("host").map(|s| s.as_str()), Some("a"));
        assert_eq!(config.interval, Some(Duration::from_secs(30)));
        assert_eq!(config.precision, Some(Duration::from_secs(1)));
        assert_eq!(config.max_undelivered, 100);
    }

    #[test]
    fn minimal() {
        let config = InputConfig::load_str("name: mem").unwrap();
        assert_eq!(config, InputConfig::new("mem"));
        assert_eq!(config.log_name(), "mem");
        assert!(config.interval.is_none());
        assert_eq!(config.max_undelivered, 0);
    }

    #[test]
    fn invalid() {
        assert!(InputConfig::load_str("alias: a").is_err());
        assert!(InputConfig::load_str("name: a\nnamepass: [cpu]").is_err());
        assert!(InputConfig::load_str("name: a\ninterval: 0").is_err());
        assert!(InputConfig::load_str("name: a\nmax_undelivered: -1").is_err());
    }
}
