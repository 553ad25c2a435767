//! Merge-patch style diff between a desired spec and a reference spec
//!
//! A field counts as changed when the desired value is set and differs
//! from the reference. Unset desired fields (null, empty string, empty
//! list or map) never mean "clear this field". Command fields such as
//! `action` count as changed whenever they are set.
//!
//! The walk runs over the serde JSON form of the spec so that every
//! spec type gets the same semantics without per-field code. Nested
//! objects are compared field by field, except for paths listed in
//! [`Diffable::ATOMIC_FIELDS`] which are compared as a whole (tag maps).

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::controller::error::Result;

pub trait Diffable: Serialize + DeserializeOwned {
    /// Dotted JSON paths of one-shot command fields
    const COMMAND_FIELDS: &'static [&'static str] = &[];

    /// Dotted JSON paths of object fields compared as a single value
    const ATOMIC_FIELDS: &'static [&'static str] = &[];
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpecDelta<T> {
    pub changed: bool,
    /// Copy of the desired spec holding only the changed fields
    pub delta: T,
    /// Dotted JSON paths of the changed fields, in walk order
    pub changed_fields: Vec<String>,
}

impl<T> SpecDelta<T> {
    /// True if any changed field is `path` or nested below it
    pub fn touches(&self, path: &str) -> bool {
        self.changed_fields.iter().any(|f| {
            f == path
                || f.strip_prefix(path)
                    .is_some_and(|rest| rest.starts_with('.'))
        })
    }

    pub fn touches_any(&self, paths: &[&str]) -> bool {
        paths.iter().any(|p| self.touches(p))
    }
}

/// Null, empty string, empty list and empty map are "not specified"
pub fn is_zero(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        Value::Bool(_) | Value::Number(_) => false,
    }
}

fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

struct Walker<'a> {
    commands: &'a [&'a str],
    atomic: &'a [&'a str],
    changed: Vec<String>,
}

impl Walker<'_> {
    fn walk(&mut self, prefix: &str, desired: &Map<String, Value>, reference: &Value) -> Map<String, Value> {
        let mut delta = Map::new();
        for (key, desired_value) in desired {
            if is_zero(desired_value) {
                continue;
            }
            let path = join(prefix, key);
            let reference_value = reference.get(key).unwrap_or(&Value::Null);

            if let Value::Object(nested) = desired_value
                && !self.atomic.contains(&path.as_str())
            {
                let nested_delta = self.walk(&path, nested, reference_value);
                if !nested_delta.is_empty() {
                    delta.insert(key.clone(), Value::Object(nested_delta));
                }
                continue;
            }

            let is_command = self.commands.contains(&path.as_str());
            if is_command || is_zero(reference_value) || desired_value != reference_value {
                delta.insert(key.clone(), desired_value.clone());
                self.changed.push(path);
            }
        }
        delta
    }
}

/// Compute the fields of `desired` that differ from `reference`
pub fn diff<T: Diffable>(desired: &T, reference: &T) -> Result<SpecDelta<T>> {
    let desired_value = serde_json::to_value(desired)?;
    let reference_value = serde_json::to_value(reference)?;

    let mut walker = Walker {
        commands: T::COMMAND_FIELDS,
        atomic: T::ATOMIC_FIELDS,
        changed: Vec::new(),
    };
    let delta = match &desired_value {
        Value::Object(map) => walker.walk("", map, &reference_value),
        _ => Map::new(),
    };

    Ok(SpecDelta {
        changed: !walker.changed.is_empty(),
        delta: serde_json::from_value(Value::Object(delta))?,
        changed_fields: walker.changed,
    })
}

fn overlay(prefix: &str, atomic: &[&str], base: &mut Map<String, Value>, delta: &Map<String, Value>) {
    for (key, delta_value) in delta {
        if is_zero(delta_value) {
            continue;
        }
        let path = join(prefix, key);
        match (base.get_mut(key), delta_value) {
            (Some(Value::Object(base_nested)), Value::Object(delta_nested))
                if !atomic.contains(&path.as_str()) =>
            {
                overlay(&path, atomic, base_nested, delta_nested);
            }
            _ => {
                base.insert(key.clone(), delta_value.clone());
            }
        }
    }
}

/// Apply the set fields of `delta` on top of `reference`
pub fn merge<T: Diffable>(reference: &T, delta: &T) -> Result<T> {
    let mut base = serde_json::to_value(reference)?;
    let delta_value = serde_json::to_value(delta)?;
    if let (Value::Object(base_map), Value::Object(delta_map)) = (&mut base, &delta_value) {
        overlay("", T::ATOMIC_FIELDS, base_map, delta_map);
    }
    Ok(serde_json::from_value(base)?)
}
