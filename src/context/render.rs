//! Host-supplied render values.

use std::collections::BTreeMap;

use serde::Serialize;

/// Named values the host passes to a script, serialized to JSON on insert.
///
/// A value that fails to serialize, or whose name is not a valid channel
/// name, is kept as an error entry so the request can still proceed
/// without it.
#[derive(Debug, Default, Clone)]
pub struct RenderData {
    entries: BTreeMap<String, Result<String, String>>,
}

impl RenderData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serialize and store `value` under `name`. A later insert of the
    /// same name replaces the earlier one.
    pub fn insert<T: Serialize + ?Sized>(&mut self, name: impl Into<String>, value: &T) -> &mut Self {
        let name = name.into();
        let entry = if !is_valid_name(&name) {
            Err("name must be non-empty ASCII alphanumerics or '_'".to_string())
        } else {
            serde_json::to_string(value).map_err(|e| e.to_string())
        };
        self.entries.insert(name, entry);
        self
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with<T: Serialize + ?Sized>(mut self, name: impl Into<String>, value: &T) -> Self {
        self.insert(name, value);
        self
    }

    /// Serialized JSON of a successfully inserted value.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries.get(name)?.as_deref().ok()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Split into accepted values and `(name, reason)` failures.
    pub(crate) fn into_parts(self) -> (BTreeMap<String, String>, Vec<(String, String)>) {
        let mut values = BTreeMap::new();
        let mut errors = Vec::new();
        for (name, entry) in self.entries {
            match entry {
                Ok(json) => {
                    values.insert(name, json);
                }
                Err(reason) => errors.push((name, reason)),
            }
        }
        (values, errors)
    }
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty() && name.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}
