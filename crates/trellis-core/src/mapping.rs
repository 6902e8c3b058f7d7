//! Path-addressed utilities over nested mappings
//!
//! A nested mapping is a JSON-style object whose values may themselves be
//! objects. A [`Path`] addresses a leaf or subtree inside one; its external
//! form joins the segments with a delimiter (`.` unless stated otherwise).

use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// A nested (or flat) key/value document
pub type Mapping = Map<String, Value>;

/// Delimiter used when none is given explicitly
pub const DEFAULT_DELIMITER: &str = ".";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MappingError {
    #[error("Conflict at {path}")]
    Conflict { path: String },
    #[error("Path not found: {path}")]
    Lookup { path: String },
    #[error("Cannot descend into non-mapping value at {path}")]
    NotAMapping { path: String },
    #[error("Leaf at {path} is not a string")]
    NonStringLeaf { path: String },
    #[error("Value {value:?} appears at both {first} and {second}")]
    DuplicateValue {
        value: String,
        first: String,
        second: String,
    },
    #[error("Invalid path: {0}")]
    InvalidPath(String),
}

/// An ordered, non-empty sequence of segments identifying a node in a mapping
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Path {
    segments: Vec<String>,
}

impl Path {
    /// Split a delimiter-joined path into its segments
    pub fn parse(text: &str, delimiter: &str) -> Result<Self, MappingError> {
        if delimiter.is_empty() {
            return Err(MappingError::InvalidPath("delimiter must not be empty".to_string()));
        }
        if text.is_empty() {
            return Err(MappingError::InvalidPath("path must not be empty".to_string()));
        }
        Ok(Self {
            segments: text.split(delimiter).map(str::to_string).collect(),
        })
    }

    /// Build a path from segments, checking that joining with `delimiter`
    /// and splitting again reproduces them exactly
    pub fn from_segments<I, S>(segments: I, delimiter: &str) -> Result<Self, MappingError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if delimiter.is_empty() {
            return Err(MappingError::InvalidPath("delimiter must not be empty".to_string()));
        }
        let segments: Vec<String> = segments.into_iter().map(Into::into).collect();
        if segments.is_empty() {
            return Err(MappingError::InvalidPath("path must not be empty".to_string()));
        }
        if let Some(bad) = segments.iter().find(|s| s.contains(delimiter)) {
            return Err(MappingError::InvalidPath(format!(
                "segment {bad:?} contains delimiter {delimiter:?}"
            )));
        }
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Always false; kept for symmetry with `len`
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Join the segments with `delimiter`
    pub fn join(&self, delimiter: &str) -> String {
        self.segments.join(delimiter)
    }

    /// Return a new path with `segment` appended
    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(segment.into());
        Self { segments }
    }

    /// True if `self` equals `other` or is an ancestor of it
    pub fn is_prefix_of(&self, other: &Path) -> bool {
        other.segments.len() >= self.segments.len()
            && self.segments.iter().zip(&other.segments).all(|(a, b)| a == b)
    }

    fn split_last(&self) -> Result<(&String, &[String]), MappingError> {
        self.segments
            .split_last()
            .ok_or_else(|| MappingError::InvalidPath("path must not be empty".to_string()))
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.join(DEFAULT_DELIMITER))
    }
}

impl FromStr for Path {
    type Err = MappingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s, DEFAULT_DELIMITER)
    }
}

/// Flatten a nested mapping into `path -> leaf` entries
///
/// Non-empty mappings are descended into; everything else, including empty
/// mappings, becomes a leaf.
pub fn flatten(nested: &Mapping, delimiter: &str) -> Mapping {
    let mut flat = Mapping::new();
    flatten_into(nested, None, delimiter, &mut flat);
    flat
}

fn flatten_into(nested: &Mapping, prefix: Option<&str>, delimiter: &str, flat: &mut Mapping) {
    for (key, value) in nested {
        let path = match prefix {
            Some(prefix) => format!("{prefix}{delimiter}{key}"),
            None => key.clone(),
        };
        match value {
            Value::Object(child) if !child.is_empty() => {
                flatten_into(child, Some(&path), delimiter, flat)
            }
            _ => {
                flat.insert(path, value.clone());
            }
        }
    }
}

/// Rebuild a nested mapping from `path -> leaf` entries
///
/// Fails with [`MappingError::Conflict`] if two entries disagree about the
/// same path (e.g. `a` is a leaf while `a.b` is also present).
pub fn unflatten(flat: &Mapping, delimiter: &str) -> Result<Mapping, MappingError> {
    let mut nested = Mapping::new();
    for (key, value) in flat {
        let mut segments = key.rsplit(delimiter);
        // rsplit always yields at least one segment
        let innermost = segments.next().unwrap_or_default();
        let mut branch = Mapping::new();
        branch.insert(innermost.to_string(), value.clone());
        for segment in segments {
            let mut outer = Mapping::new();
            outer.insert(segment.to_string(), Value::Object(branch));
            branch = outer;
        }
        merge_at(&mut nested, &branch, &mut Vec::new(), delimiter)?;
    }
    Ok(nested)
}

/// Recursively merge `b` into `a`, returning `a`
///
/// Sub-mappings present on both sides are merged; equal leaves are left
/// alone; differing leaves fail with the conflicting path. `a` may be
/// partially merged when an error is returned.
pub fn merge<'a>(a: &'a mut Mapping, b: &Mapping) -> Result<&'a mut Mapping, MappingError> {
    merge_at(a, b, &mut Vec::new(), DEFAULT_DELIMITER)?;
    Ok(a)
}

fn merge_at(
    a: &mut Mapping,
    b: &Mapping,
    path: &mut Vec<String>,
    delimiter: &str,
) -> Result<(), MappingError> {
    for (key, theirs) in b {
        if !a.contains_key(key) {
            a.insert(key.clone(), theirs.clone());
            continue;
        }
        path.push(key.clone());
        match (a.get_mut(key), theirs) {
            (Some(Value::Object(ours)), Value::Object(theirs)) => merge_at(ours, theirs, path, delimiter)?,
            (Some(ours), theirs) if *ours == *theirs => {}
            _ => {
                return Err(MappingError::Conflict {
                    path: path.join(delimiter),
                })
            }
        }
        path.pop();
    }
    Ok(())
}

/// Map every string leaf of `nested` back to its path
///
/// All leaves must be strings and pairwise distinct; a repeated value would
/// make the reverse lookup ambiguous and is rejected.
pub fn invert(nested: &Mapping, delimiter: &str) -> Result<Mapping, MappingError> {
    let mut inverted = Mapping::new();
    for (path, value) in flatten(nested, delimiter) {
        let Value::String(value) = value else {
            return Err(MappingError::NonStringLeaf { path });
        };
        if let Some(first) = inverted.get(&value) {
            return Err(MappingError::DuplicateValue {
                first: first.as_str().unwrap_or_default().to_string(),
                second: path,
                value,
            });
        }
        inverted.insert(value, Value::String(path));
    }
    Ok(inverted)
}

/// Look up the value at `path`
pub fn get<'a>(nested: &'a Mapping, path: &Path) -> Result<&'a Value, MappingError> {
    let lookup_error = || MappingError::Lookup {
        path: path.to_string(),
    };
    let (last, parents) = path.split_last()?;
    let mut level = nested;
    for segment in parents {
        level = level
            .get(segment)
            .and_then(Value::as_object)
            .ok_or_else(lookup_error)?;
    }
    level.get(last).ok_or_else(lookup_error)
}

/// True if `path` resolves to a value
pub fn contains(nested: &Mapping, path: &Path) -> bool {
    get(nested, path).is_ok()
}

/// Assign `value` at `path`, creating empty intermediate mappings as needed
pub fn set(nested: &mut Mapping, path: &Path, value: Value) -> Result<(), MappingError> {
    let (last, parents) = path.split_last()?;
    let mut level = nested;
    for (depth, segment) in parents.iter().enumerate() {
        let entry = level
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(Mapping::new()));
        level = match entry {
            Value::Object(child) => child,
            _ => {
                return Err(MappingError::NotAMapping {
                    path: parents[..=depth].join(DEFAULT_DELIMITER),
                })
            }
        };
    }
    level.insert(last.clone(), value);
    Ok(())
}
