//! Template-bound configuration nodes
//!
//! A [`ConfigNode`] owns one backing object and the [`Template`] describing
//! its fields. Input documents are applied leaf-by-leaf through the
//! template's setters; the node's exported mapping is always re-derived from
//! the object through the getters, so the object stays the source of truth.

use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, trace};

use crate::indexed::Indexed;
use crate::mapping::{self, Mapping, MappingError};
use crate::options::NodeOptions;
use crate::template::{value_kind, FieldError, Template};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum BindError {
    #[error("Invalid value for {path}: {source}")]
    Field { path: String, source: FieldError },
    #[error("Expected a mapping, found {0}")]
    NotAMapping(&'static str),
    #[error("Path {path} is not recognized by the template")]
    UnknownPath { path: String },
    #[error(transparent)]
    Mapping(#[from] MappingError),
}

/// Anything that can be projected into a nested mapping document
pub trait Export {
    fn to_value(&self) -> Value;
}

/// A domain type that describes itself with a template
pub trait Configurable: Clone + Default {
    /// Top-level key the template's paths are nested under, if any
    const ROOT_KEY: Option<&'static str> = None;

    fn template() -> Arc<Template<Self>>;
}

/// One object bound to its template, plus the exported view of it
#[derive(Clone)]
pub struct ConfigNode<T> {
    template: Arc<Template<T>>,
    options: NodeOptions,
    object: T,
    config: Mapping,
}

impl<T: Clone> ConfigNode<T> {
    /// Wrap `object` without applying any input
    pub fn new(template: Arc<Template<T>>, object: T) -> Self {
        Self::with_options(template, object, NodeOptions::default())
    }

    pub fn with_options(template: Arc<Template<T>>, object: T, options: NodeOptions) -> Self {
        let mut node = Self {
            template,
            options,
            object,
            config: Mapping::new(),
        };
        node.sync();
        node
    }

    /// Apply `input` to `object` through the template and wrap the result
    pub fn bind(template: Arc<Template<T>>, object: T, input: &Value) -> Result<Self, BindError> {
        Self::bind_with(template, object, input, NodeOptions::default())
    }

    /// Like [`bind`](Self::bind) with explicit options
    ///
    /// Paths present in `input` are handed to their setters; absent paths
    /// keep the object's current values. If any setter fails the object is
    /// discarded and the error returned, so no partially bound node exists.
    pub fn bind_with(
        template: Arc<Template<T>>,
        mut object: T,
        input: &Value,
        options: NodeOptions,
    ) -> Result<Self, BindError> {
        apply_input(&template, &options, &mut object, input)
            .inspect_err(|err| debug!(error = %err, "Rejected node input"))?;
        Ok(Self::with_options(template, object, options))
    }

    /// Apply another input document on top of the current state
    ///
    /// All-or-nothing: on error the node is unchanged.
    pub fn apply(&mut self, input: &Value) -> Result<(), BindError> {
        let options = self.options.clone();
        self.apply_staged(input, &options)
    }

    /// Apply `input` on behalf of an enclosing node bound with `parent`
    ///
    /// Used by setters that update a child node in place; the child keeps its
    /// root key and inherits the parent's strictness.
    pub fn apply_within(&mut self, input: &Value, parent: &NodeOptions) -> Result<(), BindError> {
        let options = self.options.nested_in(parent);
        self.apply_staged(input, &options)
    }

    fn apply_staged(&mut self, input: &Value, options: &NodeOptions) -> Result<(), BindError> {
        let mut staged = self.object.clone();
        apply_input(&self.template, options, &mut staged, input)?;
        self.object = staged;
        self.sync();
        Ok(())
    }

    pub fn get(&self) -> &T {
        &self.object
    }

    pub fn into_inner(self) -> T {
        self.object
    }

    /// Mutate the backing object, then refresh the exported view
    pub fn modify<R>(&mut self, f: impl FnOnce(&mut T) -> R) -> R {
        let result = f(&mut self.object);
        self.sync();
        result
    }

    /// Read the live value of one template field
    pub fn get_param(&self, path: &str) -> Result<Value, BindError> {
        let path = self.template.parse_path(path)?;
        let accessor = self
            .template
            .accessor(&path)
            .ok_or_else(|| BindError::UnknownPath {
                path: path.join(self.template.delimiter()),
            })?;
        Ok(accessor.get(&self.object))
    }

    /// Write one template field through its setter
    pub fn set_param(&mut self, path: &str, value: &Value) -> Result<(), BindError> {
        let path = self.template.parse_path(path)?;
        let joined = path.join(self.template.delimiter());
        let accessor = self
            .template
            .accessor(&path)
            .ok_or_else(|| BindError::UnknownPath {
                path: joined.clone(),
            })?;
        let mut staged = self.object.clone();
        accessor
            .set_within(&mut staged, value, &self.options)
            .map_err(|source| BindError::Field {
                path: joined,
                source,
            })?;
        self.object = staged;
        self.sync();
        Ok(())
    }

    /// Exported view as of the last mutation
    pub fn config(&self) -> &Mapping {
        &self.config
    }

    /// Walk every template getter and build the exported mapping afresh
    pub fn export(&self) -> Mapping {
        let mut exported = Mapping::new();
        for (path, accessor) in self.template.fields() {
            // Templates reject a field path that runs through another field,
            // so no write has to descend below a leaf.
            let written = mapping::set(&mut exported, path, accessor.get(&self.object));
            debug_assert!(written.is_ok(), "template paths never collide");
        }
        exported
    }

    /// Exported view without the root key wrapper
    pub fn body(&self) -> Value {
        match self.options.root_key.as_deref() {
            Some(root) => self
                .config
                .get(root)
                .cloned()
                .unwrap_or_else(|| Value::Object(Mapping::new())),
            None => Value::Object(self.config.clone()),
        }
    }

    pub fn template(&self) -> &Arc<Template<T>> {
        &self.template
    }

    pub fn options(&self) -> &NodeOptions {
        &self.options
    }

    fn sync(&mut self) {
        self.config = self.export();
    }
}

impl<T: Configurable> ConfigNode<T> {
    /// Node holding `T::default()`
    pub fn from_defaults() -> Self {
        Self::with_options(T::template(), T::default(), NodeOptions::for_root(T::ROOT_KEY))
    }

    /// Bind `input` onto `T::default()`
    pub fn from_value(input: &Value) -> Result<Self, BindError> {
        Self::bind_with(
            T::template(),
            T::default(),
            input,
            NodeOptions::for_root(T::ROOT_KEY),
        )
    }

    /// Bind `input` onto `T::default()` as a child of a node bound with
    /// `parent`
    pub fn from_value_within(input: &Value, parent: &NodeOptions) -> Result<Self, BindError> {
        Self::bind_with(
            T::template(),
            T::default(),
            input,
            NodeOptions::for_root(T::ROOT_KEY).nested_in(parent),
        )
    }
}

impl<T: Configurable> Default for ConfigNode<T> {
    fn default() -> Self {
        Self::from_defaults()
    }
}

impl<T: Clone> Export for ConfigNode<T> {
    fn to_value(&self) -> Value {
        Value::Object(self.config.clone())
    }
}

impl<T> PartialEq for ConfigNode<T> {
    fn eq(&self, other: &Self) -> bool {
        self.config == other.config
    }
}

impl<T: fmt::Debug> fmt::Debug for ConfigNode<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigNode")
            .field("object", &self.object)
            .field("config", &self.config)
            .finish()
    }
}

/// A bound node keeps its exported view current when reindexed
impl<T: Indexed + Clone> Indexed for ConfigNode<T> {
    fn index(&self) -> usize {
        self.object.index()
    }

    fn set_index(&mut self, index: usize) {
        self.modify(|object| object.set_index(index));
    }
}

fn apply_input<T>(
    template: &Template<T>,
    options: &NodeOptions,
    object: &mut T,
    input: &Value,
) -> Result<(), BindError> {
    let input = match input {
        Value::Null => return Ok(()),
        Value::Object(input) => input,
        other => return Err(BindError::NotAMapping(value_kind(other))),
    };

    let wrapped;
    let input = match options.root_key.as_deref() {
        Some(root) if !input.contains_key(root) => {
            let mut outer = Mapping::new();
            outer.insert(root.to_string(), Value::Object(input.clone()));
            wrapped = outer;
            &wrapped
        }
        _ => input,
    };

    if options.strict {
        for key in mapping::flatten(input, template.delimiter()).keys() {
            let path = template.parse_path(key)?;
            if !template.recognizes(&path) {
                return Err(BindError::UnknownPath { path: key.clone() });
            }
        }
    }

    for (path, accessor) in template.fields() {
        let Ok(value) = mapping::get(input, path) else {
            continue;
        };
        trace!(path = %path, "Binding template field");
        accessor
            .set_within(object, value, options)
            .map_err(|source| BindError::Field {
                path: path.join(template.delimiter()),
                source,
            })?;
    }
    Ok(())
}
