// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Class id to name mapping
//!
//! Ultralytics ONNX exports carry the mapping in the `names` metadata entry
//! using Python dict syntax (`{0: 'dent', 1: 'scratch'}`). A JSON file with
//! either an array of names or an object keyed by id can be used instead.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClassNamesError {
    #[error("Failed to read class names file {0}: {1}")]
    Io(String, std::io::Error),

    #[error("Invalid class names JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("Invalid class id '{0}'")]
    InvalidId(String),

    #[error("Class names must be a JSON array or object")]
    UnsupportedShape,
}

/// Ordered mapping from class id to human-readable name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassNames {
    names: BTreeMap<usize, String>,
}

fn dict_entry_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(\d+)\s*:\s*(?:'((?:[^'\\]|\\.)*)'|"((?:[^"\\]|\\.)*)")"#)
            .expect("class name pattern is valid")
    })
}

impl ClassNames {
    pub fn new(names: BTreeMap<usize, String>) -> Self {
        Self { names }
    }

    /// Parse the Ultralytics `names` metadata value
    ///
    /// Entries that do not match `<id>: '<name>'` are skipped.
    pub fn from_metadata(raw: &str) -> Self {
        let names = dict_entry_regex()
            .captures_iter(raw)
            .filter_map(|caps| {
                let id = caps.get(1)?.as_str().parse::<usize>().ok()?;
                let name = caps.get(2).or_else(|| caps.get(3))?.as_str();
                Some((id, unescape(name)))
            })
            .collect();
        Self { names }
    }

    /// Parse a JSON array (`["dent", "scratch"]`) or object (`{"0": "dent"}`)
    pub fn from_json(raw: &str) -> Result<Self, ClassNamesError> {
        let value: serde_json::Value = serde_json::from_str(raw)?;
        let mut names = BTreeMap::new();

        match value {
            serde_json::Value::Array(items) => {
                for (id, item) in items.into_iter().enumerate() {
                    names.insert(id, json_name(item));
                }
            }
            serde_json::Value::Object(entries) => {
                for (key, item) in entries {
                    let id = key
                        .trim()
                        .parse::<usize>()
                        .map_err(|_| ClassNamesError::InvalidId(key.clone()))?;
                    names.insert(id, json_name(item));
                }
            }
            _ => return Err(ClassNamesError::UnsupportedShape),
        }

        Ok(Self { names })
    }

    /// Load a JSON class-names file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ClassNamesError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ClassNamesError::Io(path.display().to_string(), e))?;
        Self::from_json(&raw)
    }

    /// Resolve a class id, falling back to the stringified id
    pub fn resolve(&self, class_id: usize) -> String {
        self.names
            .get(&class_id)
            .cloned()
            .unwrap_or_else(|| class_id.to_string())
    }

    pub fn get(&self, class_id: usize) -> Option<&str> {
        self.names.get(&class_id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

fn json_name(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    }
}

fn unescape(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut chars = name.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}
