//! Job flags: the scalar inputs configuration functions read.
//!
//! Flags are declared with a default, may be overridden while the container
//! is unlocked, and are frozen with `lock` before configuration starts.
//! Configuration functions only see the read-only `FlagSource` view.

use crate::error::{ConfigError, Result};
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum FlagValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<String>),
}

impl FlagValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            FlagValue::Bool(_) => "bool",
            FlagValue::Int(_) => "int",
            FlagValue::Float(_) => "float",
            FlagValue::Str(_) => "string",
            FlagValue::List(_) => "list",
        }
    }

    /// Parse `raw` as a value of the same type as `self`.
    fn parse_like(&self, raw: &str) -> Option<FlagValue> {
        let raw = raw.trim();
        match self {
            FlagValue::Bool(_) => match raw {
                "True" | "true" | "1" => Some(FlagValue::Bool(true)),
                "False" | "false" | "0" => Some(FlagValue::Bool(false)),
                _ => None,
            },
            FlagValue::Int(_) => raw.parse().ok().map(FlagValue::Int),
            FlagValue::Float(_) => raw.parse().ok().map(FlagValue::Float),
            FlagValue::Str(_) => Some(FlagValue::Str(unquote(raw).to_string())),
            FlagValue::List(_) => {
                let inner = raw
                    .strip_prefix('[')
                    .and_then(|r| r.strip_suffix(']'))
                    .unwrap_or(raw);
                Some(FlagValue::List(
                    inner
                        .split(',')
                        .map(|item| unquote(item.trim()).to_string())
                        .filter(|item| !item.is_empty())
                        .collect(),
                ))
            }
        }
    }
}

fn unquote(s: &str) -> &str {
    for q in ['"', '\''] {
        if let Some(inner) = s.strip_prefix(q).and_then(|r| r.strip_suffix(q)) {
            return inner;
        }
    }
    s
}

impl fmt::Display for FlagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlagValue::Bool(b) => write!(f, "{}", b),
            FlagValue::Int(i) => write!(f, "{}", i),
            FlagValue::Float(x) => write!(f, "{:?}", x),
            FlagValue::Str(s) => write!(f, "{}", s),
            FlagValue::List(items) => write!(f, "[{}]", items.join(", ")),
        }
    }
}

impl From<bool> for FlagValue {
    fn from(v: bool) -> Self {
        FlagValue::Bool(v)
    }
}

impl From<i64> for FlagValue {
    fn from(v: i64) -> Self {
        FlagValue::Int(v)
    }
}

impl From<i32> for FlagValue {
    fn from(v: i32) -> Self {
        FlagValue::Int(v.into())
    }
}

impl From<f64> for FlagValue {
    fn from(v: f64) -> Self {
        FlagValue::Float(v)
    }
}

impl From<&str> for FlagValue {
    fn from(v: &str) -> Self {
        FlagValue::Str(v.to_string())
    }
}

impl From<String> for FlagValue {
    fn from(v: String) -> Self {
        FlagValue::Str(v)
    }
}

impl From<Vec<String>> for FlagValue {
    fn from(v: Vec<String>) -> Self {
        FlagValue::List(v)
    }
}

/// Read-only access to flags, as seen by configuration functions.
pub trait FlagSource {
    fn flag(&self, name: &str) -> Option<&FlagValue>;

    fn require(&self, name: &str) -> Result<&FlagValue> {
        self.flag(name)
            .ok_or_else(|| ConfigError::UnknownFlag(name.to_string()))
    }

    fn get_bool(&self, name: &str) -> Result<bool> {
        match self.require(name)? {
            FlagValue::Bool(b) => Ok(*b),
            other => Err(type_error(name, "bool", other)),
        }
    }

    fn get_int(&self, name: &str) -> Result<i64> {
        match self.require(name)? {
            FlagValue::Int(i) => Ok(*i),
            other => Err(type_error(name, "int", other)),
        }
    }

    /// Int flags widen.
    fn get_float(&self, name: &str) -> Result<f64> {
        match self.require(name)? {
            FlagValue::Float(x) => Ok(*x),
            FlagValue::Int(i) => Ok(*i as f64),
            other => Err(type_error(name, "float", other)),
        }
    }

    fn get_str(&self, name: &str) -> Result<&str> {
        match self.require(name)? {
            FlagValue::Str(s) => Ok(s),
            other => Err(type_error(name, "string", other)),
        }
    }

    fn get_list(&self, name: &str) -> Result<&[String]> {
        match self.require(name)? {
            FlagValue::List(items) => Ok(items),
            other => Err(type_error(name, "list", other)),
        }
    }
}

fn type_error(name: &str, expected: &'static str, found: &FlagValue) -> ConfigError {
    ConfigError::FlagType {
        name: name.to_string(),
        expected,
        found: found.type_name(),
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConfigFlags {
    flags: BTreeMap<String, FlagValue>,
    locked: bool,
}

impl ConfigFlags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a flag with its default; the default fixes the flag's type.
    pub fn add_flag(&mut self, name: impl Into<String>, default: impl Into<FlagValue>) -> Result<()> {
        let name = name.into();
        self.ensure_unlocked(&name)?;
        if self.flags.contains_key(&name) {
            return Err(ConfigError::DuplicateFlag(name));
        }
        self.flags.insert(name, default.into());
        Ok(())
    }

    pub fn set(&mut self, name: &str, value: impl Into<FlagValue>) -> Result<()> {
        self.ensure_unlocked(name)?;
        let value = value.into();
        let slot = self
            .flags
            .get_mut(name)
            .ok_or_else(|| ConfigError::UnknownFlag(name.to_string()))?;
        let value = match (&*slot, value) {
            (FlagValue::Float(_), FlagValue::Int(i)) => FlagValue::Float(i as f64),
            (current, value) if current.type_name() != value.type_name() => {
                return Err(ConfigError::FlagType {
                    name: name.to_string(),
                    expected: current.type_name(),
                    found: value.type_name(),
                });
            }
            (_, value) => value,
        };
        tracing::debug!("flag {} = {}", name, value);
        *slot = value;
        Ok(())
    }

    /// Apply a `Name=value` override; the value is parsed as the flag's type.
    pub fn fill_from_str(&mut self, assignment: &str) -> Result<()> {
        let Some((name, raw)) = assignment.split_once('=') else {
            return Err(ConfigError::InvalidFlagAssignment(assignment.to_string()));
        };
        let name = name.trim();
        let current = self.require(name)?;
        let Some(value) = current.parse_like(raw) else {
            return Err(ConfigError::InvalidFlagAssignment(assignment.to_string()));
        };
        self.set(name, value)
    }

    /// Build a flag container from a JSON document. Nested objects become
    /// dotted names: `{"Exec": {"MaxEvents": 10}}` declares `Exec.MaxEvents`.
    pub fn from_json_str(text: &str) -> Result<Self> {
        let root: Value = serde_json::from_str(text)?;
        let mut flags = ConfigFlags::new();
        flags.add_json("", &root)?;
        Ok(flags)
    }

    fn add_json(&mut self, prefix: &str, value: &Value) -> Result<()> {
        let name = || prefix.to_string();
        let flag = match value {
            Value::Object(map) => {
                for (key, child) in map {
                    let child_name = if prefix.is_empty() {
                        key.clone()
                    } else {
                        format!("{}.{}", prefix, key)
                    };
                    self.add_json(&child_name, child)?;
                }
                return Ok(());
            }
            Value::Bool(b) => FlagValue::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => FlagValue::Int(i),
                None => FlagValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => FlagValue::Str(s.clone()),
            Value::Array(items) => FlagValue::List(
                items
                    .iter()
                    .map(|item| match item {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect(),
            ),
            Value::Null => {
                return Err(ConfigError::FlagType {
                    name: name(),
                    expected: "bool, int, float, string or list",
                    found: "null",
                });
            }
        };
        if prefix.is_empty() {
            return Err(ConfigError::FlagType {
                name: "<root>".to_string(),
                expected: "object",
                found: flag.type_name(),
            });
        }
        self.add_flag(name(), flag)
    }

    /// Freeze the container; every later modification fails.
    pub fn lock(&mut self) {
        self.locked = true;
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// An unlocked copy, for deriving a variant configuration.
    pub fn clone_unlocked(&self) -> Self {
        Self {
            flags: self.flags.clone(),
            locked: false,
        }
    }

    pub fn has_flag(&self, name: &str) -> bool {
        self.flags.contains_key(name)
    }

    /// True if any flag lives under `category.`.
    pub fn has_category(&self, category: &str) -> bool {
        let prefix = format!("{}.", category);
        self.flags.keys().any(|k| k.starts_with(&prefix))
    }

    pub fn len(&self) -> usize {
        self.flags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flags.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FlagValue)> {
        self.flags.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Table of the flags whose name matches `pattern`, sorted by name.
    pub fn dump(&self, pattern: &str) -> Result<String> {
        let re = Regex::new(pattern)?;
        let mut out = format!("{:40} : {}\n", "Flag Name", "Value");
        for (name, value) in self.iter().filter(|(name, _)| re.is_match(name)) {
            out.push_str(&format!("{:40} : {}\n", name, value));
        }
        Ok(out)
    }

    fn ensure_unlocked(&self, name: &str) -> Result<()> {
        if self.locked {
            return Err(ConfigError::FlagsLocked(name.to_string()));
        }
        Ok(())
    }
}

impl FlagSource for ConfigFlags {
    fn flag(&self, name: &str) -> Option<&FlagValue> {
        self.flags.get(name)
    }
}
