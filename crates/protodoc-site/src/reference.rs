//! Reference document stages.
//!
//! Each stage projects one kind of schema node into self-contained JSON view
//! models under `data/<kind>/<qualified-name>.json`, plus the global index at
//! `data/index.json`.

use rayon::prelude::*;
use serde::Serialize;

use protodoc_model::{
    Enum, Field, FieldModifier, Message, OptionEntry, ProtoFile, SchemaEntry,
    SchemaNode, Service, ServiceMethod, TypeRef, REFERENCE_NAMESPACE,
};

use crate::builder::BuildError;
use crate::stage::{BuildContext, Stage, StageReport};

/// Link to another reference document.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LinkView {
    pub name: String,
    pub qualified_name: String,
    pub kind: &'static str,
    pub summary: String,
    #[serde(rename = "ref")]
    pub document: String,
}

/// A resolved field or method type.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TypeView {
    pub name: String,
    pub kind: &'static str,
    #[serde(rename = "ref", skip_serializing_if = "Option::is_none")]
    pub document: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct IndexView<'a> {
    pub module: &'a str,
    pub title: &'a str,
    pub entries: Vec<IndexEntry>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct IndexEntry {
    pub name: String,
    pub kind: &'static str,
    pub summary: String,
    #[serde(rename = "ref")]
    pub document: String,
}

#[derive(Debug, Serialize)]
pub struct MessageView<'a> {
    pub kind: &'static str,
    pub name: &'a str,
    pub qualified_name: &'a str,
    pub file: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<LinkView>,
    pub description: String,
    pub fields: Vec<FieldView<'a>>,
    pub messages: Vec<LinkView>,
    pub enums: Vec<LinkView>,
    pub options: &'a [OptionEntry],
}

#[derive(Debug, Serialize)]
pub struct FieldView<'a> {
    pub name: &'a str,
    pub tag: i32,
    pub modifier: FieldModifier,
    #[serde(rename = "type")]
    pub type_ref: TypeView,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub map_key: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oneof: Option<&'a str>,
    pub description: String,
    pub options: &'a [OptionEntry],
}

#[derive(Debug, Serialize)]
pub struct EnumView<'a> {
    pub kind: &'static str,
    pub name: &'a str,
    pub qualified_name: &'a str,
    pub file: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<LinkView>,
    pub description: String,
    pub constants: Vec<ConstantView<'a>>,
    pub options: &'a [OptionEntry],
}

#[derive(Debug, Serialize)]
pub struct ConstantView<'a> {
    pub name: &'a str,
    pub value: i32,
    pub description: String,
    pub options: &'a [OptionEntry],
}

#[derive(Debug, Serialize)]
pub struct ServiceView<'a> {
    pub kind: &'static str,
    pub name: &'a str,
    pub qualified_name: &'a str,
    pub file: &'a str,
    pub description: String,
    pub methods: Vec<MethodView<'a>>,
    pub options: &'a [OptionEntry],
}

#[derive(Debug, Serialize)]
pub struct MethodView<'a> {
    pub name: &'a str,
    pub input: TypeView,
    pub output: TypeView,
    pub client_streaming: bool,
    pub server_streaming: bool,
    pub description: String,
    pub options: &'a [OptionEntry],
}

#[derive(Debug, Serialize)]
pub struct ProtoView<'a> {
    pub kind: &'static str,
    pub name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package: Option<&'a str>,
    pub syntax: &'a str,
    pub description: String,
    pub imports: Vec<TypeView>,
    pub options: &'a [OptionEntry],
    pub messages: Vec<LinkView>,
    pub enums: Vec<LinkView>,
    pub services: Vec<LinkView>,
}

/// Writes `data/index.json` listing every node of every kind.
pub struct IndexStage;

impl Stage for IndexStage {
    fn name(&self) -> &'static str {
        "index"
    }

    fn compile(&self, ctx: &BuildContext<'_>) -> Result<StageReport, BuildError> {
        let entries = ctx
            .registry
            .entries()
            .iter()
            .map(|entry| IndexEntry {
                name: entry.qualified_name.clone(),
                kind: entry.kind.as_str(),
                summary: ctx.markdown.summary_opt(entry.node.comment()),
                document: entry.document_path(),
            })
            .collect();

        let index = IndexView {
            module: &ctx.module.name,
            title: ctx.title,
            entries,
        };
        ctx.output
            .write_json(&format!("{}/index.json", REFERENCE_NAMESPACE), &index)?;

        Ok(StageReport::documents(1))
    }
}

/// Writes one document per enum.
pub struct EnumStage;

impl Stage for EnumStage {
    fn name(&self) -> &'static str {
        "enums"
    }

    fn compile(&self, ctx: &BuildContext<'_>) -> Result<StageReport, BuildError> {
        write_each(ctx, SchemaNode::as_enum, |entry, en| {
            ctx.output
                .write_json(&entry.document_path(), &enum_view(ctx, entry, en))
        })
    }
}

/// Writes one document per message, nested messages included.
pub struct MessageStage;

impl Stage for MessageStage {
    fn name(&self) -> &'static str {
        "messages"
    }

    fn compile(&self, ctx: &BuildContext<'_>) -> Result<StageReport, BuildError> {
        write_each(ctx, SchemaNode::as_message, |entry, message| {
            ctx.output
                .write_json(&entry.document_path(), &message_view(ctx, entry, message))
        })
    }
}

/// Writes one document per service.
pub struct ServiceStage;

impl Stage for ServiceStage {
    fn name(&self) -> &'static str {
        "services"
    }

    fn compile(&self, ctx: &BuildContext<'_>) -> Result<StageReport, BuildError> {
        write_each(ctx, SchemaNode::as_service, |entry, service| {
            ctx.output
                .write_json(&entry.document_path(), &service_view(ctx, entry, service))
        })
    }
}

/// Writes one document per proto file.
pub struct ProtoStage;

impl Stage for ProtoStage {
    fn name(&self) -> &'static str {
        "protos"
    }

    fn compile(&self, ctx: &BuildContext<'_>) -> Result<StageReport, BuildError> {
        write_each(ctx, SchemaNode::as_file, |entry, file| {
            ctx.output
                .write_json(&entry.document_path(), &proto_view(ctx, entry, file))
        })
    }
}

/// Write every entry whose node `select` accepts, in parallel; output paths
/// are disjoint.
fn write_each<'a, T, F>(
    ctx: &BuildContext<'a>,
    select: fn(SchemaNode<'a>) -> Option<&'a T>,
    write: F,
) -> Result<StageReport, BuildError>
where
    T: Sync,
    F: Fn(&SchemaEntry<'a>, &'a T) -> Result<(), BuildError> + Send + Sync,
{
    let selected: Vec<_> = ctx
        .registry
        .entries()
        .iter()
        .filter_map(|entry| select(entry.node).map(|node| (entry, node)))
        .collect();

    selected
        .par_iter()
        .map(|&(entry, node)| write(entry, node))
        .collect::<Result<Vec<()>, BuildError>>()?;

    Ok(StageReport::documents(selected.len()))
}

fn link(ctx: &BuildContext<'_>, entry: &SchemaEntry<'_>) -> LinkView {
    LinkView {
        name: entry.name().to_string(),
        qualified_name: entry.qualified_name.clone(),
        kind: entry.kind.as_str(),
        summary: ctx.markdown.summary_opt(entry.node.comment()),
        document: entry.document_path(),
    }
}

fn link_named(ctx: &BuildContext<'_>, qualified_name: &str) -> Option<LinkView> {
    ctx.registry.get(qualified_name).map(|e| link(ctx, e))
}

fn parent_link(ctx: &BuildContext<'_>, entry: &SchemaEntry<'_>) -> Option<LinkView> {
    entry
        .parent
        .as_deref()
        .and_then(|parent| link_named(ctx, parent))
}

fn type_view(ctx: &BuildContext<'_>, type_name: &str) -> TypeView {
    let resolved = ctx
        .registry
        .resolve(type_name)
        .unwrap_or_else(|| TypeRef::Scalar(type_name.to_string()));
    TypeView {
        name: resolved.name().to_string(),
        kind: resolved.kind_str(),
        document: resolved.document_path(),
    }
}

fn message_view<'a>(
    ctx: &BuildContext<'_>,
    entry: &'a SchemaEntry<'_>,
    message: &'a Message,
) -> MessageView<'a> {
    let scope = &entry.qualified_name;
    MessageView {
        kind: "message",
        name: &message.name,
        qualified_name: &entry.qualified_name,
        file: &entry.file,
        parent: parent_link(ctx, entry),
        description: ctx.markdown.render_opt(message.comment.as_deref()),
        fields: message.fields.iter().map(|f| field_view(ctx, f)).collect(),
        messages: message
            .messages
            .iter()
            .filter_map(|m| link_named(ctx, &format!("{}.{}", scope, m.name)))
            .collect(),
        enums: message
            .enums
            .iter()
            .filter_map(|e| link_named(ctx, &format!("{}.{}", scope, e.name)))
            .collect(),
        options: &message.options,
    }
}

fn field_view<'a>(ctx: &BuildContext<'_>, field: &'a Field) -> FieldView<'a> {
    FieldView {
        name: &field.name,
        tag: field.tag,
        modifier: field.modifier,
        type_ref: type_view(ctx, &field.type_name),
        map_key: field.map_key.as_deref(),
        oneof: field.oneof.as_deref(),
        description: ctx.markdown.render_opt(field.comment.as_deref()),
        options: &field.options,
    }
}

fn enum_view<'a>(ctx: &BuildContext<'_>, entry: &'a SchemaEntry<'_>, en: &'a Enum) -> EnumView<'a> {
    EnumView {
        kind: "enum",
        name: &en.name,
        qualified_name: &entry.qualified_name,
        file: &entry.file,
        parent: parent_link(ctx, entry),
        description: ctx.markdown.render_opt(en.comment.as_deref()),
        constants: en
            .constants
            .iter()
            .map(|c| ConstantView {
                name: &c.name,
                value: c.value,
                description: ctx.markdown.render_opt(c.comment.as_deref()),
                options: &c.options,
            })
            .collect(),
        options: &en.options,
    }
}

fn service_view<'a>(
    ctx: &BuildContext<'_>,
    entry: &'a SchemaEntry<'_>,
    service: &'a Service,
) -> ServiceView<'a> {
    ServiceView {
        kind: "service",
        name: &service.name,
        qualified_name: &entry.qualified_name,
        file: &entry.file,
        description: ctx.markdown.render_opt(service.comment.as_deref()),
        methods: service
            .methods
            .iter()
            .map(|m| method_view(ctx, m))
            .collect(),
        options: &service.options,
    }
}

fn method_view<'a>(ctx: &BuildContext<'_>, method: &'a ServiceMethod) -> MethodView<'a> {
    MethodView {
        name: &method.name,
        input: type_view(ctx, &method.input_type),
        output: type_view(ctx, &method.output_type),
        client_streaming: method.client_streaming,
        server_streaming: method.server_streaming,
        description: ctx.markdown.render_opt(method.comment.as_deref()),
        options: &method.options,
    }
}

fn proto_view<'a>(
    ctx: &BuildContext<'_>,
    entry: &'a SchemaEntry<'_>,
    file: &'a ProtoFile,
) -> ProtoView<'a> {
    let scope = file.scope();
    let named = |name: &str| link_named(ctx, &format!("{}{}", scope, name));

    ProtoView {
        kind: "proto",
        name: &entry.qualified_name,
        package: file.package.as_deref(),
        syntax: &file.syntax,
        description: ctx.markdown.render_opt(file.comment.as_deref()),
        imports: file
            .imports
            .iter()
            .map(|import| TypeView {
                name: import.clone(),
                kind: "proto",
                document: ctx.registry.file(import).map(|e| e.document_path()),
            })
            .collect(),
        options: &file.options,
        messages: file.messages.iter().filter_map(|m| named(&m.name)).collect(),
        enums: file.enums.iter().filter_map(|e| named(&e.name)).collect(),
        services: file.services.iter().filter_map(|s| named(&s.name)).collect(),
    }
}
