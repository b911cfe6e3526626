/*
 * SPDX-License-Identifier: Apache-2.0
 * Copyright 2025 ByteDance and/or its affiliates.
 */

use std::fmt::{self, Write};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ValueType {
    #[default]
    Untyped,
    Gauge,
    Counter,
    Summary,
    Histogram,
}

impl ValueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ValueType::Untyped => "untyped",
            ValueType::Gauge => "gauge",
            ValueType::Counter => "counter",
            ValueType::Summary => "summary",
            ValueType::Histogram => "histogram",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Signed(i64),
    Unsigned(u64),
    Float(f64),
    Bool(bool),
    String(String),
}

impl FieldValue {
    /// Non-finite floats have no representation in any of the sink formats
    pub fn is_supported(&self) -> bool {
        match self {
            FieldValue::Float(f) => f.is_finite(),
            _ => true,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Signed(i) => Some(*i as f64),
            FieldValue::Unsigned(u) => Some(*u as f64),
            FieldValue::Float(f) => Some(*f),
            FieldValue::Bool(_) | FieldValue::String(_) => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Signed(_) => "signed",
            FieldValue::Unsigned(_) => "unsigned",
            FieldValue::Float(_) => "float",
            FieldValue::Bool(_) => "bool",
            FieldValue::String(_) => "string",
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Unsigned(u) => {
                itoa::Buffer::new().format(*u).fmt(f)?;
                f.write_char('u')
            }
            FieldValue::Signed(i) => {
                itoa::Buffer::new().format(*i).fmt(f)?;
                f.write_char('i')
            }
            FieldValue::Float(v) => ryu::Buffer::new().format(*v).fmt(f),
            FieldValue::Bool(b) => {
                if *b {
                    f.write_str("true")
                } else {
                    f.write_str("false")
                }
            }
            FieldValue::String(s) => write!(f, "{s:?}"),
        }
    }
}

macro_rules! impl_from_signed {
    ($($t:ty),+) => {
        $(
            impl From<$t> for FieldValue {
                fn from(v: $t) -> Self {
                    FieldValue::Signed(v as i64)
                }
            }
        )+
    };
}

macro_rules! impl_from_unsigned {
    ($($t:ty),+) => {
        $(
            impl From<$t> for FieldValue {
                fn from(v: $t) -> Self {
                    FieldValue::Unsigned(v as u64)
                }
            }
        )+
    };
}

impl_from_signed!(i8, i16, i32, i64);
impl_from_unsigned!(u8, u16, u32, u64);

impl From<f32> for FieldValue {
    fn from(v: f32) -> Self {
        FieldValue::Float(v as f64)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Float(v)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::String(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::String(v)
    }
}
