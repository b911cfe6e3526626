/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::{FieldValue, ValueType};

pub type Tags = BTreeMap<String, String>;
pub type Fields = BTreeMap<String, FieldValue>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MetricError {
    #[error("missing metric name")]
    EmptyName,
    #[error("metric has no fields")]
    NoFields,
    #[error("unsupported {1} value for field {0}")]
    UnsupportedField(String, &'static str),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    name: String,
    tags: Tags,
    fields: Fields,
    time: DateTime<Utc>,
    value_type: ValueType,
}

impl Metric {
    pub fn new<S: Into<String>>(
        name: S,
        tags: Tags,
        fields: Fields,
        time: DateTime<Utc>,
        value_type: ValueType,
    ) -> Result<Self, MetricError> {
        let name = name.into();
        if name.is_empty() {
            return Err(MetricError::EmptyName);
        }
        if fields.is_empty() {
            return Err(MetricError::NoFields);
        }
        if let Some((key, v)) = fields.iter().find(|(_, v)| !v.is_supported()) {
            return Err(MetricError::UnsupportedField(key.clone(), v.type_name()));
        }

        Ok(Metric {
            name,
            tags,
            fields,
            time,
            value_type,
        })
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name<S: Into<String>>(&mut self, name: S) {
        self.name = name.into();
    }

    pub fn add_prefix(&mut self, prefix: &str) {
        self.name.insert_str(0, prefix);
    }

    pub fn add_suffix(&mut self, suffix: &str) {
        self.name.push_str(suffix);
    }

    #[inline]
    pub fn tags(&self) -> &Tags {
        &self.tags
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(|v| v.as_str())
    }

    pub fn has_tag(&self, key: &str) -> bool {
        self.tags.contains_key(key)
    }

    pub fn add_tag<K: Into<String>, V: Into<String>>(&mut self, key: K, value: V) {
        self.tags.insert(key.into(), value.into());
    }

    pub fn remove_tag(&mut self, key: &str) -> Option<String> {
        self.tags.remove(key)
    }

    #[inline]
    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    pub fn field(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    /// Unsupported values are ignored so the metric stays valid.
    pub fn add_field<K: Into<String>, V: Into<FieldValue>>(&mut self, key: K, value: V) {
        let value = value.into();
        if value.is_supported() {
            self.fields.insert(key.into(), value);
        }
    }

    #[inline]
    pub fn time(&self) -> DateTime<Utc> {
        self.time
    }

    pub fn set_time(&mut self, time: DateTime<Utc>) {
        self.time = time;
    }

    #[inline]
    pub fn value_type(&self) -> ValueType {
        self.value_type
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        for (k, v) in &self.tags {
            write!(f, ",{k}={v}")?;
        }
        let mut sep = ' ';
        for (k, v) in &self.fields {
            write!(f, "{sep}{k}={v}")?;
            sep = ',';
        }
        match self.time.timestamp_nanos_opt() {
            Some(ns) => write!(f, " {ns}"),
            None => write!(f, " {}", self.time.to_rfc3339()),
        }
    }
}
