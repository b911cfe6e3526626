/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

//! YAML config loading.
//!
//! The value helpers keep the key and value conventions of the `g3-yaml`
//! crate from the g3 project (`hash::foreach_kv`, `humanize::as_duration`,
//! `value::as_usize`, `value::as_bool` and `value::as_string`), trimmed to what telex configs
//! need, so that the same config file syntax is accepted.

use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, anyhow};
use humanize_rs::ParseError;
use yaml_rust::{Yaml, YamlLoader, yaml};

use g3_metric::Tags;
use g3_metric::tracking::LeakCheck;

mod agent;
pub use agent::AgentConfig;

mod input;
pub use input::InputConfig;

mod aggregator;
pub use aggregator::AggregatorConfig;

pub(crate) fn load_hash(content: &str) -> anyhow::Result<yaml::Hash> {
    let docs = YamlLoader::load_from_str(content).map_err(|e| anyhow!("invalid yaml: {e}"))?;
    match docs.into_iter().next() {
        Some(Yaml::Hash(map)) => Ok(map),
        Some(_) => Err(anyhow!("yaml doc root should be a map")),
        None => Ok(yaml::Hash::new()),
    }
}

pub(crate) fn foreach_kv<F>(table: &yaml::Hash, mut f: F) -> anyhow::Result<()>
where
    F: FnMut(&str, &Yaml) -> anyhow::Result<()>,
{
    for (k, v) in table.iter() {
        if let Yaml::String(key) = k {
            f(key, v).context(format!("failed to parse value of key {key}"))?;
        } else {
            return Err(anyhow!("key in hash should be string"));
        }
    }
    Ok(())
}

pub(crate) fn normalize(raw: &str) -> String {
    raw.to_lowercase().replace('-', "_")
}

pub(crate) fn as_duration(v: &Yaml) -> anyhow::Result<Duration> {
    match v {
        Yaml::String(value) => match humanize_rs::duration::parse(value) {
            Ok(v) => Ok(v),
            Err(ParseError::MissingUnit) => {
                if let Ok(u) = u64::from_str(value) {
                    Ok(Duration::from_secs(u))
                } else if let Ok(f) = f64::from_str(value) {
                    Duration::try_from_secs_f64(f).map_err(anyhow::Error::new)
                } else {
                    Err(anyhow!("invalid duration string"))
                }
            }
            Err(e) => Err(anyhow!("invalid humanize duration string: {e}")),
        },
        Yaml::Integer(value) => {
            let u = u64::try_from(*value).map_err(|_| anyhow!("negative duration {value}"))?;
            Ok(Duration::from_secs(u))
        }
        Yaml::Real(s) => {
            let f = f64::from_str(s).map_err(|e| anyhow!("invalid f64 value: {e}"))?;
            Duration::try_from_secs_f64(f).map_err(anyhow::Error::new)
        }
        _ => Err(anyhow!(
            "yaml value type for humanize duration should be 'string' or 'integer' or 'real'"
        )),
    }
}

pub(crate) fn as_usize(v: &Yaml) -> anyhow::Result<usize> {
    match v {
        Yaml::String(s) => Ok(usize::from_str(s)?),
        Yaml::Integer(i) => Ok(usize::try_from(*i)?),
        _ => Err(anyhow!(
            "yaml value type for 'usize' should be 'string' or 'integer'"
        )),
    }
}

pub(crate) fn as_bool(v: &Yaml) -> anyhow::Result<bool> {
    match v {
        Yaml::String(s) => match s.to_lowercase().as_str() {
            "on" | "true" | "yes" | "1" => Ok(true),
            "off" | "false" | "no" | "0" => Ok(false),
            _ => Err(anyhow!("invalid yaml string value for 'bool': {s}")),
        },
        Yaml::Boolean(value) => Ok(*value),
        Yaml::Integer(i) => Ok(*i != 0),
        _ => Err(anyhow!(
            "yaml value type for 'bool' should be 'boolean' / 'string' / 'integer'"
        )),
    }
}

pub(crate) fn as_string(v: &Yaml) -> anyhow::Result<String> {
    match v {
        Yaml::String(s) => Ok(s.to_string()),
        Yaml::Integer(i) => Ok(i.to_string()),
        Yaml::Real(s) => Ok(s.to_string()),
        _ => Err(anyhow!(
            "yaml value type for string should be 'string' / 'integer' / 'real'"
        )),
    }
}

pub(crate) fn as_tags(v: &Yaml) -> anyhow::Result<Tags> {
    let Yaml::Hash(map) = v else {
        return Err(anyhow!("yaml value type for tags should be 'map'"));
    };
    let mut tags = Tags::new();
    foreach_kv(map, |k, v| {
        if k.is_empty() {
            return Err(anyhow!("empty tag name"));
        }
        let value = as_string(v).context(format!("invalid value for tag {k}"))?;
        tags.insert(k.to_string(), value);
        Ok(())
    })?;
    Ok(tags)
}

pub(crate) fn as_leak_check(v: &Yaml) -> anyhow::Result<LeakCheck> {
    match v {
        Yaml::String(s) => match s.to_lowercase().as_str() {
            "off" | "none" => Ok(LeakCheck::Off),
            "log" => Ok(LeakCheck::Log),
            "abort" => Ok(LeakCheck::Abort),
            _ => Err(anyhow!("invalid leak check mode {s}")),
        },
        Yaml::Boolean(false) => Ok(LeakCheck::Off),
        Yaml::Boolean(true) => Ok(LeakCheck::Log),
        _ => Err(anyhow!(
            "yaml value type for leak check mode should be 'string' or 'boolean'"
        )),
    }
}
