//! Identity claims
//!
//! The verified identity token payload is kept as an ordered map of claim
//! names to JSON-shaped values. Well-known claims get typed accessors; the
//! rest stay reachable through [`Claims::get`].

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A single claim value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ClaimValue {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    Array(Vec<ClaimValue>),
    Object(BTreeMap<String, ClaimValue>),
}

impl ClaimValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ClaimValue::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ClaimValue::Number(value) => value
                .as_i64()
                .or_else(|| value.as_f64().map(|float| float as i64)),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ClaimValue::Bool(value) => Some(*value),
            _ => None,
        }
    }
}

/// Decoded identity claims
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Claims(BTreeMap<String, ClaimValue>);

impl Claims {
    /// Decode a JSON payload. The payload must be an object.
    pub fn from_json(payload: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(payload)
    }

    pub fn get(&self, name: &str) -> Option<&ClaimValue> {
        self.0.get(name)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(ClaimValue::as_str)
    }

    pub fn insert(&mut self, name: impl Into<String>, value: ClaimValue) {
        self.0.insert(name.into(), value);
    }

    pub fn subject(&self) -> Option<&str> {
        self.get_str("sub")
    }

    pub fn issuer(&self) -> Option<&str> {
        self.get_str("iss")
    }

    pub fn name(&self) -> Option<&str> {
        self.get_str("name")
    }

    pub fn nickname(&self) -> Option<&str> {
        self.get_str("nickname")
    }

    pub fn email(&self) -> Option<&str> {
        self.get_str("email")
    }

    /// Best human-readable name: `name`, then `nickname`, then `sub`
    pub fn display_name(&self) -> Option<&str> {
        self.name().or_else(|| self.nickname()).or_else(|| self.subject())
    }

    /// `exp` as a timestamp
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.get("exp")
            .and_then(ClaimValue::as_i64)
            .and_then(|seconds| Utc.timestamp_opt(seconds, 0).single())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ClaimValue)> {
        self.0.iter()
    }
}
