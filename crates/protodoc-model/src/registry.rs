//! Qualified-name registry for a resolved module.
//!
//! Walks every file of a [`Module`], assigns each documentable node its
//! qualified name and checks that every type reference resolves.

use std::collections::HashMap;
use std::fmt;

use crate::schema::{Enum, Message, Module, ProtoFile, Service, SCALAR_TYPES};

/// Output subtree holding generated reference documents.
pub const REFERENCE_NAMESPACE: &str = "data";

/// Kind of a reference document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DocumentKind {
    Proto,
    Message,
    Enum,
    Service,
}

impl DocumentKind {
    /// All kinds, in the order they are grouped in navigation.
    pub const ALL: [DocumentKind; 4] = [
        DocumentKind::Proto,
        DocumentKind::Message,
        DocumentKind::Enum,
        DocumentKind::Service,
    ];

    /// Tag used in JSON and as the directory name under the reference namespace.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Proto => "proto",
            Self::Message => "message",
            Self::Enum => "enum",
            Self::Service => "service",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Borrowed schema node behind a registry entry.
#[derive(Debug, Clone, Copy)]
pub enum SchemaNode<'m> {
    File(&'m ProtoFile),
    Message(&'m Message),
    Enum(&'m Enum),
    Service(&'m Service),
}

impl<'m> SchemaNode<'m> {
    /// Raw markdown comment attached to the node.
    pub fn comment(&self) -> Option<&'m str> {
        match self {
            Self::File(f) => f.comment.as_deref(),
            Self::Message(m) => m.comment.as_deref(),
            Self::Enum(e) => e.comment.as_deref(),
            Self::Service(s) => s.comment.as_deref(),
        }
    }

    pub fn as_file(self) -> Option<&'m ProtoFile> {
        match self {
            Self::File(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_message(self) -> Option<&'m Message> {
        match self {
            Self::Message(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_enum(self) -> Option<&'m Enum> {
        match self {
            Self::Enum(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_service(self) -> Option<&'m Service> {
        match self {
            Self::Service(s) => Some(s),
            _ => None,
        }
    }
}

/// A documentable node with its qualified name.
#[derive(Debug, Clone)]
pub struct SchemaEntry<'m> {
    pub kind: DocumentKind,

    /// Unique dotted name (file path for protos)
    pub qualified_name: String,

    /// Name of the declaring file
    pub file: String,

    /// Qualified name of the enclosing message for nested types
    pub parent: Option<String>,

    pub node: SchemaNode<'m>,
}

impl SchemaEntry<'_> {
    /// Short name as declared.
    pub fn name(&self) -> &str {
        match self.node {
            SchemaNode::File(f) => &f.name,
            SchemaNode::Message(m) => &m.name,
            SchemaNode::Enum(e) => &e.name,
            SchemaNode::Service(s) => &s.name,
        }
    }

    /// Relative URL of this entry's reference document.
    pub fn document_path(&self) -> String {
        document_path(self.kind, &self.qualified_name)
    }
}

/// Resolved type of a field or method parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeRef {
    Scalar(String),
    Named {
        kind: DocumentKind,
        qualified_name: String,
    },
}

impl TypeRef {
    pub fn name(&self) -> &str {
        match self {
            Self::Scalar(name) => name,
            Self::Named { qualified_name, .. } => qualified_name,
        }
    }

    /// `scalar`, `message` or `enum`.
    pub fn kind_str(&self) -> &'static str {
        match self {
            Self::Scalar(_) => "scalar",
            Self::Named { kind, .. } => kind.as_str(),
        }
    }

    /// Relative URL of the referenced document; `None` for scalars.
    pub fn document_path(&self) -> Option<String> {
        match self {
            Self::Scalar(_) => None,
            Self::Named {
                kind,
                qualified_name,
            } => Some(document_path(*kind, qualified_name)),
        }
    }
}

/// Errors raised while indexing a module.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Duplicate {kind} name: {name}")]
    DuplicateName { kind: DocumentKind, name: String },

    #[error("Invalid {kind} name '{name}': {reason}")]
    InvalidName {
        kind: DocumentKind,
        name: String,
        reason: &'static str,
    },

    #[error("Unresolved type '{type_name}' referenced by {referrer}")]
    UnresolvedType { referrer: String, type_name: String },
}

/// Relative URL of the reference document for `qualified_name`.
pub fn document_path(kind: DocumentKind, qualified_name: &str) -> String {
    format!("{}/{}/{}.json", REFERENCE_NAMESPACE, kind, qualified_name)
}

/// Registry of every documentable node in a module.
#[derive(Debug, Default)]
pub struct SchemaRegistry<'m> {
    /// Entries in declaration order
    entries: Vec<SchemaEntry<'m>>,

    /// Type and service names (one shared namespace, as in protobuf)
    by_name: HashMap<String, usize>,

    /// File names
    by_file: HashMap<String, usize>,
}

impl<'m> SchemaRegistry<'m> {
    /// Index a module and validate its cross-references.
    pub fn build(module: &'m Module) -> Result<Self, ModelError> {
        let mut registry = Self::default();

        for file in &module.files {
            validate_file_name(&file.name)?;
            if registry.by_file.contains_key(&file.name) {
                return Err(ModelError::DuplicateName {
                    kind: DocumentKind::Proto,
                    name: file.name.clone(),
                });
            }
            registry.by_file.insert(file.name.clone(), registry.entries.len());
            registry.entries.push(SchemaEntry {
                kind: DocumentKind::Proto,
                qualified_name: file.name.clone(),
                file: file.name.clone(),
                parent: None,
                node: SchemaNode::File(file),
            });

            let scope = file.scope();
            for message in &file.messages {
                registry.add_message(file, &scope, None, message)?;
            }
            for en in &file.enums {
                registry.add_named(
                    file,
                    None,
                    DocumentKind::Enum,
                    format!("{}{}", scope, en.name),
                    SchemaNode::Enum(en),
                )?;
            }
            for service in &file.services {
                registry.add_named(
                    file,
                    None,
                    DocumentKind::Service,
                    format!("{}{}", scope, service.name),
                    SchemaNode::Service(service),
                )?;
            }
        }

        registry.check_references()?;

        tracing::debug!(
            "Indexed {} schema entries from {} files",
            registry.entries.len(),
            module.files.len()
        );

        Ok(registry)
    }

    fn add_message(
        &mut self,
        file: &'m ProtoFile,
        scope: &str,
        parent: Option<&str>,
        message: &'m Message,
    ) -> Result<(), ModelError> {
        let qualified_name = format!("{}{}", scope, message.name);
        self.add_named(
            file,
            parent,
            DocumentKind::Message,
            qualified_name.clone(),
            SchemaNode::Message(message),
        )?;

        let nested_scope = format!("{}.", qualified_name);
        for nested in &message.messages {
            self.add_message(file, &nested_scope, Some(&qualified_name), nested)?;
        }
        for en in &message.enums {
            self.add_named(
                file,
                Some(&qualified_name),
                DocumentKind::Enum,
                format!("{}{}", nested_scope, en.name),
                SchemaNode::Enum(en),
            )?;
        }
        Ok(())
    }

    fn add_named(
        &mut self,
        file: &ProtoFile,
        parent: Option<&str>,
        kind: DocumentKind,
        qualified_name: String,
        node: SchemaNode<'m>,
    ) -> Result<(), ModelError> {
        validate_type_name(kind, &qualified_name)?;
        if self.by_name.contains_key(&qualified_name) {
            return Err(ModelError::DuplicateName {
                kind,
                name: qualified_name,
            });
        }
        self.by_name.insert(qualified_name.clone(), self.entries.len());
        self.entries.push(SchemaEntry {
            kind,
            qualified_name,
            file: file.name.clone(),
            parent: parent.map(str::to_string),
            node,
        });
        Ok(())
    }

    fn check_references(&self) -> Result<(), ModelError> {
        for entry in &self.entries {
            match entry.node {
                SchemaNode::Message(message) => {
                    for field in &message.fields {
                        let referrer = format!("{}.{}", entry.qualified_name, field.name);
                        self.resolve(&field.type_name).ok_or_else(|| {
                            ModelError::UnresolvedType {
                                referrer: referrer.clone(),
                                type_name: field.type_name.clone(),
                            }
                        })?;
                        if let Some(key) = &field.map_key {
                            if !is_scalar(key) {
                                return Err(ModelError::UnresolvedType {
                                    referrer,
                                    type_name: key.clone(),
                                });
                            }
                        }
                    }
                }
                SchemaNode::Service(service) => {
                    for method in &service.methods {
                        for type_name in [&method.input_type, &method.output_type] {
                            match self.resolve(type_name) {
                                Some(TypeRef::Named {
                                    kind: DocumentKind::Message,
                                    ..
                                }) => {}
                                _ => {
                                    return Err(ModelError::UnresolvedType {
                                        referrer: format!(
                                            "{}.{}",
                                            entry.qualified_name, method.name
                                        ),
                                        type_name: type_name.clone(),
                                    })
                                }
                            }
                        }
                    }
                }
                SchemaNode::File(_) | SchemaNode::Enum(_) => {}
            }
        }
        Ok(())
    }

    /// Resolve a field or method type to a scalar or a message/enum.
    ///
    /// A leading `.` (fully-qualified form) is accepted.
    pub fn resolve(&self, type_name: &str) -> Option<TypeRef> {
        if is_scalar(type_name) {
            return Some(TypeRef::Scalar(type_name.to_string()));
        }
        let name = type_name.strip_prefix('.').unwrap_or(type_name);
        let entry = self.get(name)?;
        match entry.kind {
            DocumentKind::Message | DocumentKind::Enum => Some(TypeRef::Named {
                kind: entry.kind,
                qualified_name: entry.qualified_name.clone(),
            }),
            DocumentKind::Proto | DocumentKind::Service => None,
        }
    }

    /// Look up a message, enum or service by qualified name.
    pub fn get(&self, qualified_name: &str) -> Option<&SchemaEntry<'m>> {
        self.by_name.get(qualified_name).map(|&i| &self.entries[i])
    }

    /// Look up a proto file entry by file name.
    pub fn file(&self, name: &str) -> Option<&SchemaEntry<'m>> {
        self.by_file.get(name).map(|&i| &self.entries[i])
    }

    /// All entries in declaration order.
    pub fn entries(&self) -> &[SchemaEntry<'m>] {
        &self.entries
    }

    /// Entries of one kind, in declaration order.
    pub fn entries_of(&self, kind: DocumentKind) -> impl Iterator<Item = &SchemaEntry<'m>> {
        self.entries.iter().filter(move |e| e.kind == kind)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn is_scalar(type_name: &str) -> bool {
    SCALAR_TYPES.contains(&type_name)
}

fn validate_type_name(kind: DocumentKind, name: &str) -> Result<(), ModelError> {
    let invalid = |reason| ModelError::InvalidName {
        kind,
        name: name.to_string(),
        reason,
    };
    if name.split('.').any(str::is_empty) {
        return Err(invalid("empty name segment"));
    }
    if name.contains(['/', '\\']) {
        return Err(invalid("path separator in name"));
    }
    Ok(())
}

fn validate_file_name(name: &str) -> Result<(), ModelError> {
    let invalid = |reason| ModelError::InvalidName {
        kind: DocumentKind::Proto,
        name: name.to_string(),
        reason,
    };
    if name.starts_with('/') || name.contains('\\') {
        return Err(invalid("file name must be a relative path"));
    }
    if name
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return Err(invalid("empty or relative path segment"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Field, ServiceMethod};
    use pretty_assertions::assert_eq;

    fn sample_module() -> Module {
        let mut file = ProtoFile::new("acme/shop.proto");
        file.package = Some("acme".to_string());

        let mut order = Message::new("Order");
        order.fields.push(Field::new("id", "int64", 1));
        order.fields.push(Field::new("status", "acme.Order.Status", 2));
        order.fields.push(Field::new("item", ".acme.Order.Item", 3));
        order.messages.push(Message::new("Item"));
        order.enums.push(Enum::new("Status"));
        file.messages.push(order);
        file.enums.push(Enum::new("Currency"));

        let mut service = Service::new("Shop");
        service.methods.push(ServiceMethod {
            name: "Get".to_string(),
            input_type: "acme.Order".to_string(),
            output_type: "acme.Order".to_string(),
            ..Default::default()
        });
        file.services.push(service);

        let mut module = Module::new("shop", "dist");
        module.files.push(file);
        module
    }

    #[test]
    fn assigns_qualified_names_in_declaration_order() {
        let module = sample_module();
        let registry = SchemaRegistry::build(&module).unwrap();

        let names: Vec<_> = registry
            .entries()
            .iter()
            .map(|e| (e.kind, e.qualified_name.as_str()))
            .collect();

        assert_eq!(
            names,
            vec![
                (DocumentKind::Proto, "acme/shop.proto"),
                (DocumentKind::Message, "acme.Order"),
                (DocumentKind::Message, "acme.Order.Item"),
                (DocumentKind::Enum, "acme.Order.Status"),
                (DocumentKind::Enum, "acme.Currency"),
                (DocumentKind::Service, "acme.Shop"),
            ]
        );
        assert_eq!(
            registry.get("acme.Order.Item").unwrap().parent.as_deref(),
            Some("acme.Order")
        );
    }

    #[test]
    fn resolves_scalars_and_named_types() {
        let module = sample_module();
        let registry = SchemaRegistry::build(&module).unwrap();

        assert_eq!(
            registry.resolve("int64"),
            Some(TypeRef::Scalar("int64".to_string()))
        );

        let status = registry.resolve("acme.Order.Status").unwrap();
        assert_eq!(status.kind_str(), "enum");
        assert_eq!(
            status.document_path().as_deref(),
            Some("data/enum/acme.Order.Status.json")
        );

        assert!(registry.resolve(".acme.Order.Item").is_some());
        assert!(registry.resolve("acme.Shop").is_none());
        assert!(registry.resolve("acme.Missing").is_none());
    }

    #[test]
    fn rejects_duplicate_names() {
        let mut module = sample_module();
        module.files[0].messages.push(Message::new("Order"));

        let err = SchemaRegistry::build(&module).unwrap_err();

        assert!(matches!(
            err,
            ModelError::DuplicateName { kind: DocumentKind::Message, ref name } if name == "acme.Order"
        ));
    }

    #[test]
    fn rejects_duplicate_files() {
        let mut module = sample_module();
        module.files.push(ProtoFile::new("acme/shop.proto"));

        let err = SchemaRegistry::build(&module).unwrap_err();

        assert!(matches!(
            err,
            ModelError::DuplicateName {
                kind: DocumentKind::Proto,
                ..
            }
        ));
    }

    #[test]
    fn rejects_unresolved_field_type() {
        let mut module = sample_module();
        module.files[0].messages[0]
            .fields
            .push(Field::new("owner", "acme.User", 4));

        let err = SchemaRegistry::build(&module).unwrap_err();

        match err {
            ModelError::UnresolvedType {
                referrer,
                type_name,
            } => {
                assert_eq!(referrer, "acme.Order.owner");
                assert_eq!(type_name, "acme.User");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rejects_enum_as_method_input() {
        let mut module = sample_module();
        module.files[0].services[0].methods[0].input_type = "acme.Currency".to_string();

        assert!(matches!(
            SchemaRegistry::build(&module),
            Err(ModelError::UnresolvedType { .. })
        ));
    }

    #[test]
    fn rejects_unsafe_file_names() {
        for name in ["../escape.proto", "/abs.proto", "a//b.proto"] {
            let mut module = Module::new("m", "dist");
            module.files.push(ProtoFile::new(name));
            assert!(
                matches!(
                    SchemaRegistry::build(&module),
                    Err(ModelError::InvalidName { .. })
                ),
                "{name} should be rejected"
            );
        }
    }

    #[test]
    fn document_paths_are_namespaced_by_kind() {
        let module = sample_module();
        let registry = SchemaRegistry::build(&module).unwrap();

        assert_eq!(
            registry.file("acme/shop.proto").unwrap().document_path(),
            "data/proto/acme/shop.proto.json"
        );
        assert_eq!(
            registry.get("acme.Shop").unwrap().document_path(),
            "data/service/acme.Shop.json"
        );
    }
}
