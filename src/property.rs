//! Typed module properties.
//!
//! A property is a tagged value (`Int`, `Double`, `String`, `Bool`) plus the
//! metadata the control plane needs: optional bounds, optional choices, and
//! a read-only flag. The kind of a property is fixed when it is registered;
//! writes are coerced to that kind or rejected.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{ModuleError, ModuleResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyKind {
    Int,
    Double,
    String,
    Bool,
}

impl fmt::Display for PropertyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PropertyKind::Int => "int",
            PropertyKind::Double => "double",
            PropertyKind::String => "string",
            PropertyKind::Bool => "bool",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Bool(bool),
    Int(i64),
    Double(f64),
    Str(String),
}

impl PropertyValue {
    pub fn kind(&self) -> PropertyKind {
        match self {
            PropertyValue::Bool(_) => PropertyKind::Bool,
            PropertyValue::Int(_) => PropertyKind::Int,
            PropertyValue::Double(_) => PropertyKind::Double,
            PropertyValue::Str(_) => PropertyKind::String,
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            PropertyValue::Int(v) => Some(*v as f64),
            PropertyValue::Double(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Bool(v) => write!(f, "{}", v),
            PropertyValue::Int(v) => write!(f, "{}", v),
            PropertyValue::Double(v) => write!(f, "{}", v),
            PropertyValue::Str(v) => f.write_str(v),
        }
    }
}

impl From<i64> for PropertyValue {
    fn from(v: i64) -> Self {
        PropertyValue::Int(v)
    }
}

impl From<i32> for PropertyValue {
    fn from(v: i32) -> Self {
        PropertyValue::Int(v as i64)
    }
}

impl From<f64> for PropertyValue {
    fn from(v: f64) -> Self {
        PropertyValue::Double(v)
    }
}

impl From<bool> for PropertyValue {
    fn from(v: bool) -> Self {
        PropertyValue::Bool(v)
    }
}

impl From<&str> for PropertyValue {
    fn from(v: &str) -> Self {
        PropertyValue::Str(v.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(v: String) -> Self {
        PropertyValue::Str(v)
    }
}

/// A single named configuration value with its metadata.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Property {
    #[serde(rename = "type")]
    kind: PropertyKind,
    value: PropertyValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    min: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    choices: Option<Vec<String>>,
    #[serde(rename = "readonly")]
    read_only: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    description: String,
}

impl Property {
    pub fn new(value: impl Into<PropertyValue>) -> Self {
        let value = value.into();
        Self {
            kind: value.kind(),
            value,
            min: None,
            max: None,
            choices: None,
            read_only: false,
            description: String::new(),
        }
    }

    pub fn with_range(mut self, min: f64, max: f64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    pub fn with_min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    pub fn with_choices(mut self, choices: &[&str]) -> Self {
        self.choices = Some(choices.iter().map(|c| c.to_string()).collect());
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn kind(&self) -> PropertyKind {
        self.kind
    }

    pub fn value(&self) -> &PropertyValue {
        &self.value
    }

    pub fn min(&self) -> Option<f64> {
        self.min
    }

    pub fn max(&self) -> Option<f64> {
        self.max
    }

    pub fn choices(&self) -> Option<&[String]> {
        self.choices.as_deref()
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn as_int(&self) -> i64 {
        match &self.value {
            PropertyValue::Int(v) => *v,
            PropertyValue::Double(v) => *v as i64,
            PropertyValue::Bool(v) => i64::from(*v),
            PropertyValue::Str(v) => v.trim().parse().unwrap_or(0),
        }
    }

    pub fn as_double(&self) -> f64 {
        match &self.value {
            PropertyValue::Int(v) => *v as f64,
            PropertyValue::Double(v) => *v,
            PropertyValue::Bool(v) => f64::from(u8::from(*v)),
            PropertyValue::Str(v) => v.trim().parse().unwrap_or(0.0),
        }
    }

    pub fn as_bool(&self) -> bool {
        match &self.value {
            PropertyValue::Bool(v) => *v,
            PropertyValue::Int(v) => *v != 0,
            PropertyValue::Double(v) => *v != 0.0,
            PropertyValue::Str(v) => parse_bool(v).unwrap_or(false),
        }
    }

    pub fn as_text(&self) -> String {
        self.value.to_string()
    }

    /// Write a new value, coercing it to this property's kind.
    ///
    /// Fails on read-only properties, values that cannot be coerced, values
    /// outside `[min, max]`, and strings not listed in `choices`.
    pub fn set(&mut self, value: impl Into<PropertyValue>) -> ModuleResult<()> {
        if self.read_only {
            return Err(ModuleError::configuration("property is read-only"));
        }
        let value = self.coerce(value.into())?;
        self.check_bounds(&value)?;
        self.value = value;
        Ok(())
    }

    fn coerce(&self, value: PropertyValue) -> ModuleResult<PropertyValue> {
        let mismatch = |value: &PropertyValue| {
            ModuleError::configuration(format!(
                "cannot convert {} value '{}' to {}",
                value.kind(),
                value,
                self.kind
            ))
        };
        let coerced = match (self.kind, &value) {
            (PropertyKind::Int, PropertyValue::Int(_)) => value.clone(),
            (PropertyKind::Int, PropertyValue::Double(v)) if v.fract() == 0.0 => {
                PropertyValue::Int(*v as i64)
            }
            (PropertyKind::Int, PropertyValue::Str(s)) => {
                PropertyValue::Int(s.trim().parse().map_err(|_| mismatch(&value))?)
            }
            (PropertyKind::Double, PropertyValue::Double(_)) => value.clone(),
            (PropertyKind::Double, PropertyValue::Int(v)) => PropertyValue::Double(*v as f64),
            (PropertyKind::Double, PropertyValue::Str(s)) => {
                PropertyValue::Double(s.trim().parse().map_err(|_| mismatch(&value))?)
            }
            (PropertyKind::Bool, PropertyValue::Bool(_)) => value.clone(),
            (PropertyKind::Bool, PropertyValue::Int(v)) if *v == 0 || *v == 1 => {
                PropertyValue::Bool(*v == 1)
            }
            (PropertyKind::Bool, PropertyValue::Str(s)) => {
                PropertyValue::Bool(parse_bool(s).ok_or_else(|| mismatch(&value))?)
            }
            (PropertyKind::String, PropertyValue::Str(_)) => value.clone(),
            (PropertyKind::String, other) => PropertyValue::Str(other.to_string()),
            _ => return Err(mismatch(&value)),
        };
        Ok(coerced)
    }

    fn check_bounds(&self, value: &PropertyValue) -> ModuleResult<()> {
        if let Some(v) = value.as_f64() {
            if let Some(min) = self.min {
                if v < min {
                    return Err(ModuleError::configuration(format!(
                        "value {} is below minimum {}",
                        v, min
                    )));
                }
            }
            if let Some(max) = self.max {
                if v > max {
                    return Err(ModuleError::configuration(format!(
                        "value {} is above maximum {}",
                        v, max
                    )));
                }
            }
        }
        if let (Some(choices), PropertyValue::Str(s)) = (&self.choices, value) {
            if !choices.iter().any(|c| c == s) {
                return Err(ModuleError::configuration(format!(
                    "'{}' is not one of [{}]",
                    s,
                    choices.join(", ")
                )));
            }
        }
        Ok(())
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Name-keyed property table owned by a module.
#[derive(Clone, Debug, Default, Serialize)]
#[serde(transparent)]
pub struct PropertyBag {
    entries: BTreeMap<String, Property>,
}

impl PropertyBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a property. Re-registering a name replaces its definition.
    pub fn register(&mut self, name: &str, property: Property) {
        self.entries.insert(name.to_string(), property);
    }

    pub fn get(&self, name: &str) -> Option<&Property> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn set(&mut self, name: &str, value: impl Into<PropertyValue>) -> ModuleResult<()> {
        let property = self
            .entries
            .get_mut(name)
            .ok_or_else(|| ModuleError::configuration(format!("unknown property '{}'", name)))?;
        property
            .set(value)
            .map_err(|e| ModuleError::configuration(format!("property '{}': {}", name, inner(e))))
    }

    pub fn set_read_only(&mut self, name: &str, read_only: bool) -> ModuleResult<()> {
        let property = self
            .entries
            .get_mut(name)
            .ok_or_else(|| ModuleError::configuration(format!("unknown property '{}'", name)))?;
        property.set_read_only(read_only);
        Ok(())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Property)> {
        self.entries.iter().map(|(name, p)| (name.as_str(), p))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn inner(e: ModuleError) -> String {
    match e {
        ModuleError::Configuration(msg)
        | ModuleError::Resource(msg)
        | ModuleError::Runtime(msg)
        | ModuleError::InvalidState(msg) => msg,
    }
}
