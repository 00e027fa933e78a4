//! Schema node types.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Well-known scalar types. A field type that is not one of these must name a
/// message or enum in the module.
pub const SCALAR_TYPES: &[&str] = &[
    "double", "float", "int32", "int64", "uint32", "uint64", "sint32", "sint64", "fixed32",
    "fixed64", "sfixed32", "sfixed64", "bool", "string", "bytes",
];

/// A resolved set of proto files and where their documentation goes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    /// Module name, shown as the site title when none is configured
    #[serde(default)]
    pub name: String,

    /// Proto files in declaration order
    #[serde(default)]
    pub files: Vec<ProtoFile>,

    /// Output directory for the generated site
    #[serde(default = "default_output")]
    pub output: PathBuf,
}

fn default_output() -> PathBuf {
    PathBuf::from("dist")
}

impl Module {
    /// Create an empty module writing to `output`.
    pub fn new(name: impl Into<String>, output: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            files: Vec::new(),
            output: output.into(),
        }
    }

    /// Deserialize a module exported by the compiler front-end.
    pub fn from_json(source: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(source)
    }
}

/// A single `.proto` file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProtoFile {
    /// Path of the file relative to the import root, e.g. `foo/bar.proto`
    pub name: String,

    #[serde(default)]
    pub package: Option<String>,

    #[serde(default = "default_syntax")]
    pub syntax: String,

    #[serde(default)]
    pub comment: Option<String>,

    #[serde(default)]
    pub imports: Vec<String>,

    #[serde(default)]
    pub options: Vec<OptionEntry>,

    #[serde(default)]
    pub messages: Vec<Message>,

    #[serde(default)]
    pub enums: Vec<Enum>,

    #[serde(default)]
    pub services: Vec<Service>,
}

fn default_syntax() -> String {
    "proto3".to_string()
}

impl ProtoFile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            syntax: default_syntax(),
            ..Default::default()
        }
    }

    /// Prefix for qualified names declared in this file (`pkg.` or empty).
    pub fn scope(&self) -> String {
        match self.package.as_deref() {
            Some(pkg) if !pkg.is_empty() => format!("{}.", pkg),
            _ => String::new(),
        }
    }
}

/// A message declaration, possibly with nested types.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub name: String,

    #[serde(default)]
    pub comment: Option<String>,

    #[serde(default)]
    pub fields: Vec<Field>,

    /// Nested messages
    #[serde(default)]
    pub messages: Vec<Message>,

    /// Nested enums
    #[serde(default)]
    pub enums: Vec<Enum>,

    #[serde(default)]
    pub options: Vec<OptionEntry>,
}

impl Message {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// Field cardinality as written in the source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldModifier {
    Optional,
    Required,
    Repeated,
    #[default]
    None,
}

/// A message field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,

    pub tag: i32,

    /// Scalar name or qualified name of a message/enum. For map fields this is
    /// the value type.
    #[serde(rename = "type")]
    pub type_name: String,

    #[serde(default)]
    pub modifier: FieldModifier,

    /// Name of the enclosing oneof, if any
    #[serde(default)]
    pub oneof: Option<String>,

    /// Key type for map fields
    #[serde(default)]
    pub map_key: Option<String>,

    #[serde(default)]
    pub comment: Option<String>,

    #[serde(default)]
    pub options: Vec<OptionEntry>,
}

impl Field {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>, tag: i32) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            tag,
            ..Default::default()
        }
    }
}

/// An enum declaration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Enum {
    pub name: String,

    #[serde(default)]
    pub comment: Option<String>,

    #[serde(default)]
    pub constants: Vec<EnumConstant>,

    #[serde(default)]
    pub options: Vec<OptionEntry>,
}

impl Enum {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnumConstant {
    pub name: String,

    pub value: i32,

    #[serde(default)]
    pub comment: Option<String>,

    #[serde(default)]
    pub options: Vec<OptionEntry>,
}

/// A service declaration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub name: String,

    #[serde(default)]
    pub comment: Option<String>,

    #[serde(default)]
    pub methods: Vec<ServiceMethod>,

    #[serde(default)]
    pub options: Vec<OptionEntry>,
}

impl Service {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// An rpc method on a service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceMethod {
    pub name: String,

    /// Qualified name of the request message
    pub input_type: String,

    /// Qualified name of the response message
    pub output_type: String,

    #[serde(default)]
    pub client_streaming: bool,

    #[serde(default)]
    pub server_streaming: bool,

    #[serde(default)]
    pub comment: Option<String>,

    #[serde(default)]
    pub options: Vec<OptionEntry>,
}

/// An option attached to any node, e.g. `deprecated = true`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionEntry {
    pub name: String,
    pub value: serde_json::Value,
}

impl OptionEntry {
    pub fn new(name: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}
