//! Resolved protobuf schema model.
//!
//! The compiler front-end hands protodoc a fully resolved [`Module`]. This crate
//! holds that model and the [`SchemaRegistry`] that assigns every node its
//! qualified name, checks cross-references and derives documentation paths.

pub mod registry;
pub mod schema;

pub use registry::{
    document_path, DocumentKind, ModelError, SchemaEntry, SchemaNode, SchemaRegistry, TypeRef,
    REFERENCE_NAMESPACE,
};
pub use schema::{
    Enum, EnumConstant, Field, FieldModifier, Message, Module, OptionEntry, ProtoFile, Service,
    ServiceMethod, SCALAR_TYPES,
};
