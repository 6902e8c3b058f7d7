//! Templates describe which paths a configuration node recognizes
//!
//! Every leaf of a template is an [`Accessor`]: a getter/setter pair bound to
//! one field of the backing object. A template is built once per entity type
//! and shared between all nodes of that type.

use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::keyed::CollectionError;
use crate::mapping::{MappingError, Path, DEFAULT_DELIMITER};
use crate::node::BindError;
use crate::options::NodeOptions;

/// Failure reported by a field setter
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FieldError {
    #[error("Expected {expected}: {reason}")]
    Type { expected: String, reason: String },
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error(transparent)]
    Collection(#[from] CollectionError),
    #[error(transparent)]
    Nested(Box<BindError>),
}

impl FieldError {
    pub fn validation(reason: impl Into<String>) -> Self {
        Self::Validation(reason.into())
    }

    /// A value of the wrong JSON kind was supplied
    pub fn type_mismatch(expected: impl Into<String>, found: &Value) -> Self {
        Self::Type {
            expected: expected.into(),
            reason: format!("found {}", value_kind(found)),
        }
    }
}

impl From<BindError> for FieldError {
    fn from(err: BindError) -> Self {
        Self::Nested(Box::new(err))
    }
}

pub(crate) fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "a mapping",
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("Template leaf must be callable: {path}")]
    NotCallable { path: String },
    #[error("Duplicate template path: {path}")]
    DuplicatePath { path: String },
    #[error("Template path is both a field and a group: {path}")]
    PathCollision { path: String },
    #[error(transparent)]
    Mapping(#[from] MappingError),
}

type GetFn<T> = dyn Fn(&T) -> Value + Send + Sync;
type SetFn<T> = dyn Fn(&mut T, &Value, &NodeOptions) -> Result<(), FieldError> + Send + Sync;

/// Getter/setter pair bound to one field of `T`
pub struct Accessor<T> {
    get: Arc<GetFn<T>>,
    set: Arc<SetFn<T>>,
}

impl<T> Accessor<T> {
    /// Build an accessor from raw value closures
    pub fn new<G, S>(get: G, set: S) -> Self
    where
        G: Fn(&T) -> Value + Send + Sync + 'static,
        S: Fn(&mut T, &Value) -> Result<(), FieldError> + Send + Sync + 'static,
    {
        Self::nested(get, move |object: &mut T, value: &Value, _: &NodeOptions| {
            set(object, value)
        })
    }

    /// Build an accessor whose setter binds child nodes
    ///
    /// The setter also receives the options of the node being bound, so the
    /// children it builds can inherit them (see [`NodeOptions::nested_in`]).
    pub fn nested<G, S>(get: G, set: S) -> Self
    where
        G: Fn(&T) -> Value + Send + Sync + 'static,
        S: Fn(&mut T, &Value, &NodeOptions) -> Result<(), FieldError> + Send + Sync + 'static,
    {
        Self {
            get: Arc::new(get),
            set: Arc::new(set),
        }
    }

    /// Build an accessor for a field of type `V`
    ///
    /// Incoming values are deserialized into `V` before `set` sees them, so a
    /// value of the wrong shape fails with [`FieldError::Type`] instead of
    /// being coerced.
    pub fn typed<V, G, S>(get: G, set: S) -> Self
    where
        V: Into<Value> + DeserializeOwned,
        G: Fn(&T) -> V + Send + Sync + 'static,
        S: Fn(&mut T, V) -> Result<(), FieldError> + Send + Sync + 'static,
    {
        Self::new(
            move |object| get(object).into(),
            move |object, value| {
                let typed = serde_json::from_value::<V>(value.clone()).map_err(|e| {
                    FieldError::Type {
                        expected: short_type_name::<V>(),
                        reason: e.to_string(),
                    }
                })?;
                set(object, typed)
            },
        )
    }

    /// Read the field's current value
    pub fn get(&self, object: &T) -> Value {
        (self.get)(object)
    }

    /// Write the field, validating `value`
    pub fn set(&self, object: &mut T, value: &Value) -> Result<(), FieldError> {
        self.set_within(object, value, &NodeOptions::default())
    }

    /// Write the field on behalf of a node bound with `options`
    pub fn set_within(
        &self,
        object: &mut T,
        value: &Value,
        options: &NodeOptions,
    ) -> Result<(), FieldError> {
        (self.set)(object, value, options)
    }
}

impl<T> Clone for Accessor<T> {
    fn clone(&self) -> Self {
        Self {
            get: Arc::clone(&self.get),
            set: Arc::clone(&self.set),
        }
    }
}

impl<T> fmt::Debug for Accessor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Accessor")
    }
}

fn short_type_name<V>() -> String {
    let full = std::any::type_name::<V>();
    full.rsplit("::").next().unwrap_or(full).to_string()
}

/// Explicit nested template tree
#[derive(Debug, Clone)]
pub enum TemplateNode<T> {
    Field(Accessor<T>),
    Group(BTreeMap<String, TemplateNode<T>>),
}

/// Validated, flattened template
pub struct Template<T> {
    delimiter: String,
    fields: Vec<(Path, Accessor<T>)>,
}

impl<T> Template<T> {
    pub fn builder() -> TemplateBuilder<T> {
        TemplateBuilder::new()
    }

    /// Validate and flatten an explicit template tree
    ///
    /// Every leaf must be a [`TemplateNode::Field`]; an empty group would
    /// flatten to a leaf with nothing to call and is rejected.
    pub fn from_tree(
        tree: BTreeMap<String, TemplateNode<T>>,
        delimiter: &str,
    ) -> Result<Self, TemplateError> {
        let mut fields = Vec::new();
        collect_fields(tree, &[], delimiter, &mut fields)?;
        Ok(Self {
            delimiter: delimiter.to_string(),
            fields,
        })
    }

    pub fn delimiter(&self) -> &str {
        &self.delimiter
    }

    /// Parse a path string using this template's delimiter
    pub fn parse_path(&self, text: &str) -> Result<Path, MappingError> {
        Path::parse(text, &self.delimiter)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&Path, &Accessor<T>)> {
        self.fields.iter().map(|(path, accessor)| (path, accessor))
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.fields.iter().map(|(path, _)| path)
    }

    pub fn accessor(&self, path: &Path) -> Option<&Accessor<T>> {
        self.fields
            .iter()
            .find(|(candidate, _)| candidate == path)
            .map(|(_, accessor)| accessor)
    }

    /// True if `path` is a field, lies inside a field's value, or is a group
    /// containing fields
    pub fn recognizes(&self, path: &Path) -> bool {
        self.paths()
            .any(|field| field.is_prefix_of(path) || path.is_prefix_of(field))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<T> fmt::Debug for Template<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Template")
            .field("delimiter", &self.delimiter)
            .field(
                "paths",
                &self.paths().map(|p| p.join(&self.delimiter)).collect::<Vec<_>>(),
            )
            .finish()
    }
}

fn collect_fields<T>(
    tree: BTreeMap<String, TemplateNode<T>>,
    prefix: &[String],
    delimiter: &str,
    fields: &mut Vec<(Path, Accessor<T>)>,
) -> Result<(), TemplateError> {
    for (key, node) in tree {
        let path = Path::from_segments(prefix.iter().cloned().chain([key]), delimiter)?;
        match node {
            TemplateNode::Field(accessor) => fields.push((path, accessor)),
            TemplateNode::Group(children) if children.is_empty() => {
                return Err(TemplateError::NotCallable {
                    path: path.join(delimiter),
                })
            }
            TemplateNode::Group(children) => {
                collect_fields(children, path.segments(), delimiter, fields)?
            }
        }
    }
    Ok(())
}

/// Incrementally assemble a template from `path -> accessor` entries
pub struct TemplateBuilder<T> {
    delimiter: String,
    entries: Vec<(String, Accessor<T>)>,
}

impl<T> TemplateBuilder<T> {
    pub fn new() -> Self {
        Self {
            delimiter: DEFAULT_DELIMITER.to_string(),
            entries: Vec::new(),
        }
    }

    /// Delimiter used to split field paths (default `.`)
    pub fn delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = delimiter.into();
        self
    }

    pub fn field(mut self, path: impl Into<String>, accessor: Accessor<T>) -> Self {
        self.entries.push((path.into(), accessor));
        self
    }

    /// Validate the entries and produce the template
    pub fn build(self) -> Result<Template<T>, TemplateError> {
        let mut tree = BTreeMap::new();
        for (text, accessor) in self.entries {
            let path = Path::parse(&text, &self.delimiter)?;
            insert_field(&mut tree, &path, accessor, &self.delimiter)?;
        }
        Template::from_tree(tree, &self.delimiter)
    }
}

impl<T> Default for TemplateBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn insert_field<T>(
    tree: &mut BTreeMap<String, TemplateNode<T>>,
    path: &Path,
    accessor: Accessor<T>,
    delimiter: &str,
) -> Result<(), TemplateError> {
    let Some((last, parents)) = path.segments().split_last() else {
        return Err(MappingError::InvalidPath("path must not be empty".to_string()).into());
    };
    let mut level = tree;
    for (depth, segment) in parents.iter().enumerate() {
        let node = level
            .entry(segment.clone())
            .or_insert_with(|| TemplateNode::Group(BTreeMap::new()));
        level = match node {
            TemplateNode::Group(children) => children,
            TemplateNode::Field(_) => {
                return Err(TemplateError::PathCollision {
                    path: parents[..=depth].join(delimiter),
                })
            }
        };
    }
    match level.get(last) {
        Some(TemplateNode::Field(_)) => Err(TemplateError::DuplicatePath {
            path: path.join(delimiter),
        }),
        Some(TemplateNode::Group(_)) => Err(TemplateError::PathCollision {
            path: path.join(delimiter),
        }),
        None => {
            level.insert(last.clone(), TemplateNode::Field(accessor));
            Ok(())
        }
    }
}
