//! Trellis Core - Template-bound configuration nodes and collections
//!
//! This crate provides the substrate that configuration entities are built on:
//! - Path-addressed utilities over nested mappings (flatten, unflatten, merge, invert)
//! - Templates of getter/setter accessors describing an entity's fields
//! - Configuration nodes binding an input document to a typed object and exporting it back
//! - Uniquely keyed collections with atomic bulk replace
//! - Contiguously indexed collections that reindex their elements on every change

pub mod indexed;
pub mod keyed;
pub mod mapping;
pub mod node;
pub mod options;
pub mod template;

pub use indexed::{Indexed, IndexedList};
pub use keyed::{CollectionError, KeyedList};
pub use mapping::{Mapping, MappingError, Path, DEFAULT_DELIMITER};
pub use node::{BindError, ConfigNode, Configurable, Export};
pub use options::NodeOptions;
pub use template::{Accessor, FieldError, Template, TemplateBuilder, TemplateError, TemplateNode};
