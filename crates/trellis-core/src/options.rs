//! Binding options for configuration nodes

use serde::{Deserialize, Serialize};

/// How a [`ConfigNode`](crate::ConfigNode) interprets its input document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeOptions {
    /// Top-level key the template's paths live under (e.g. "system").
    /// Input that is not already nested under this key is wrapped in it.
    #[serde(default)]
    pub root_key: Option<String>,
    /// Reject input paths the template does not recognize instead of
    /// ignoring them
    #[serde(default = "default_strict")]
    pub strict: bool,
}

fn default_strict() -> bool {
    false
}

impl NodeOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Options for a node whose template lives under `root_key`, if any
    pub fn for_root(root_key: Option<&str>) -> Self {
        Self {
            root_key: root_key.map(str::to_string),
            strict: default_strict(),
        }
    }

    pub fn with_root_key(mut self, root_key: impl Into<String>) -> Self {
        self.root_key = Some(root_key.into());
        self
    }

    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Options for a child node bound while binding a node with `parent`
    ///
    /// The child keeps its own root key; strictness is inherited.
    pub fn nested_in(&self, parent: &NodeOptions) -> Self {
        Self {
            root_key: self.root_key.clone(),
            strict: self.strict || parent.strict,
        }
    }
}
