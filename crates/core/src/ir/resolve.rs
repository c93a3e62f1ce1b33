//! Schema resolution into the [`TypeGraph`].
//!
//! Resolution runs in passes over a single mutable [`TypeResolver`] value:
//! every named schema first claims a class name and an arena slot, then each
//! named schema is resolved depth-first, then operation schemas are resolved
//! on demand by the operation normalizer. A reference to a schema that is
//! still being resolved returns its reserved slot, which is what makes
//! self- and mutually-referential schemas terminate.

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use tracing::debug;

use crate::error::{Diagnostic, DiagnosticKind, GenerateError};
use crate::spec::{AdditionalProperties, Schema, SpecModel};

use super::types::{DeclOrigin, Field, Literal, PrimitiveKind, TypeDecl, TypeGraph, TypeId, TypeNode};
use super::utils::{sanitize_class_name, to_pascal_case};

const SCHEMA_REF_PREFIXES: [&str; 2] = ["#/components/schemas/", "#/definitions/"];

/// Candidate name and location for a schema that may need a declaration.
#[derive(Debug, Clone)]
pub(crate) struct NameHint {
    name: String,
    path: String,
}

impl NameHint {
    pub(crate) fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }

    fn field(&self, field: &str) -> Self {
        Self::new(
            format!("{}{}", self.name, to_pascal_case(field)),
            format!("{}.{field}", self.path),
        )
    }

    fn suffix(&self, suffix: &str) -> Self {
        Self::new(format!("{}{suffix}", self.name), format!("{}.{suffix}", self.path))
    }

    pub(crate) fn path(&self) -> &str {
        &self.path
    }
}

/// Result of classifying a schema before it is placed in the arena.
enum Shape {
    /// A new node still to be placed.
    Node(TypeNode),
    /// The schema denotes an existing node (a reference or a collapsed union).
    Existing(TypeId),
}

struct Classified {
    shape: Shape,
    /// Whether `null` was folded out of an enum or a union.
    nullable: bool,
}

impl Classified {
    fn node(node: TypeNode) -> Self {
        Self {
            shape: Shape::Node(node),
            nullable: false,
        }
    }
}

/// Mutable state of one resolution run.
pub(crate) struct TypeResolver<'a> {
    spec: &'a SpecModel,
    nodes: Vec<TypeNode>,
    interned: HashMap<TypeNode, TypeId>,
    decls: Vec<TypeDecl>,
    /// Schema key to reserved slot; the n-th entry owns `decls[n]`.
    named: IndexMap<String, TypeId>,
    resolved: HashSet<String>,
    visiting: HashSet<String>,
    /// Lowercased class names in use (they double as file names).
    taken: HashSet<String>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> TypeResolver<'a> {
    /// Claim a class name and a slot for every named schema.
    pub(crate) fn new(spec: &'a SpecModel) -> Result<Self, GenerateError> {
        let mut resolver = Self {
            spec,
            nodes: Vec::new(),
            interned: HashMap::new(),
            decls: Vec::new(),
            named: IndexMap::new(),
            resolved: HashSet::new(),
            visiting: HashSet::new(),
            taken: HashSet::new(),
            diagnostics: Vec::new(),
        };

        let mut owners: HashMap<String, &str> = HashMap::new();
        for (key, schema) in spec.schemas() {
            let name = sanitize_class_name(key);
            let folded = name.to_ascii_lowercase();
            if let Some(first) = owners.get(&folded) {
                return Err(GenerateError::IdentifierCollision {
                    kind: "model",
                    name,
                    first: format!("schema `{first}`"),
                    second: format!("schema `{key}`"),
                });
            }
            owners.insert(folded.clone(), key);
            resolver.taken.insert(folded);

            let id = resolver.push(TypeNode::FreeForm);
            resolver.named.insert(key.clone(), id);
            resolver.decls.push(TypeDecl {
                id,
                name,
                origin: DeclOrigin::Named(key.clone()),
                description: schema.description.clone(),
                recursive: false,
            });
        }
        Ok(resolver)
    }

    /// Resolve every named schema in document order.
    pub(crate) fn resolve_components(&mut self) -> Result<(), GenerateError> {
        debug!(schemas = self.named.len(), "Resolving named schemas.");
        let keys: Vec<String> = self.named.keys().cloned().collect();
        for key in keys {
            self.resolve_named(&key)?;
        }
        Ok(())
    }

    pub(crate) fn push_diagnostic(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub(crate) fn spec(&self) -> &'a SpecModel {
        self.spec
    }

    /// Class names of the declarations placed so far.
    pub(crate) fn decl_names(&self) -> impl Iterator<Item = &str> {
        self.decls.iter().map(|decl| decl.name.as_str())
    }

    /// The node currently stored at `id`.
    pub(crate) fn node(&self, id: TypeId) -> &TypeNode {
        &self.nodes[id.0]
    }

    /// Freeze the arena.
    pub(crate) fn finish(self) -> (TypeGraph, Vec<Diagnostic>) {
        (TypeGraph::new(self.nodes, self.decls, self.named), self.diagnostics)
    }

    fn push(&mut self, node: TypeNode) -> TypeId {
        let id = TypeId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    fn intern(&mut self, node: TypeNode) -> TypeId {
        if let Some(&id) = self.interned.get(&node) {
            return id;
        }
        let id = self.push(node.clone());
        self.interned.insert(node, id);
        id
    }

    /// Place an anonymous node, declaring it when it needs a class of its own.
    fn place(&mut self, node: TypeNode, hint: &NameHint, description: Option<&str>) -> TypeId {
        if let Some(&id) = self.interned.get(&node) {
            return id;
        }
        let declares = matches!(node, TypeNode::Object { .. } | TypeNode::Enum(_));
        let id = self.intern(node);
        if declares {
            let name = self.synthesize_name(&hint.name);
            debug!(name = %name, owner = %hint.path, "Synthesized inline type.");
            self.decls.push(TypeDecl {
                id,
                name,
                origin: DeclOrigin::Synthesized(hint.path.clone()),
                description: description.map(str::to_string),
                recursive: false,
            });
        }
        id
    }

    fn synthesize_name(&mut self, base: &str) -> String {
        let base = sanitize_class_name(base);
        let mut candidate = base.clone();
        let mut n = 1;
        while self.taken.contains(&candidate.to_ascii_lowercase()) {
            candidate = if n == 1 {
                format!("{base}Inline")
            } else {
                format!("{base}Inline{n}")
            };
            n += 1;
        }
        self.taken.insert(candidate.to_ascii_lowercase());
        candidate
    }

    pub(crate) fn primitive(&mut self, kind: PrimitiveKind) -> TypeId {
        self.intern(TypeNode::Primitive(kind))
    }

    fn null(&mut self) -> TypeId {
        self.primitive(PrimitiveKind::Null)
    }

    pub(crate) fn free_form(&mut self) -> TypeId {
        self.intern(TypeNode::FreeForm)
    }

    /// `Union(T, Null)`, or `id` itself when it already admits null.
    fn nullable(&mut self, id: TypeId) -> TypeId {
        let null = self.null();
        if id == null {
            return id;
        }
        if let TypeNode::Union { variants, .. } = self.node(id)
            && variants.contains(&null)
        {
            return id;
        }
        self.intern(TypeNode::Union {
            variants: vec![id, null],
            discriminator: None,
        })
    }

    fn resolve_named(&mut self, key: &str) -> Result<TypeId, GenerateError> {
        let Some(&id) = self.named.get(key) else {
            return Err(GenerateError::unresolved(key, "named schemas"));
        };
        if self.resolved.contains(key) {
            return Ok(id);
        }
        if self.visiting.contains(key) {
            if let Some(index) = self.named.get_index_of(key) {
                self.decls[index].recursive = true;
            }
            debug!(schema = %key, "Reference cycle closed by name.");
            return Ok(id);
        }
        let spec = self.spec;
        let Some(schema) = spec.schema(key) else {
            return Err(GenerateError::unresolved(key, "named schemas"));
        };

        self.visiting.insert(key.to_string());
        let hint = NameHint::new(self.decl_name(key), format!("schema {key}"));
        let classified = self.classify(schema, &hint)?;
        let node = match classified.shape {
            Shape::Node(node) => node,
            Shape::Existing(target) if target == id => TypeNode::FreeForm,
            Shape::Existing(target) => TypeNode::Alias(target),
        };
        self.nodes[id.0] = node;
        self.visiting.remove(key);
        self.resolved.insert(key.to_string());
        Ok(id)
    }

    fn decl_name(&self, key: &str) -> String {
        self.named
            .get_index_of(key)
            .map_or_else(|| sanitize_class_name(key), |i| self.decls[i].name.clone())
    }

    /// Resolve a `$ref` to a schema, applying the target's nullability.
    pub(crate) fn resolve_ref(&mut self, reference: &str, context: &str) -> Result<TypeId, GenerateError> {
        let key = schema_key(reference).ok_or_else(|| GenerateError::unresolved(reference, context))?;
        let spec = self.spec;
        let target = spec
            .schema(&key)
            .ok_or_else(|| GenerateError::unresolved(reference, context))?;
        let id = self.resolve_named(&key)?;
        Ok(if declares_null(target) { self.nullable(id) } else { id })
    }

    /// Resolve an inline or referencing schema to a node id.
    pub(crate) fn resolve_schema(&mut self, schema: &'a Schema, hint: &NameHint) -> Result<TypeId, GenerateError> {
        let classified = self.classify(schema, hint)?;
        let id = match classified.shape {
            Shape::Existing(id) => id,
            Shape::Node(node) => self.place(node, hint, schema.description.as_deref()),
        };
        Ok(if classified.nullable || schema.is_nullable() {
            self.nullable(id)
        } else {
            id
        })
    }

    fn classify(&mut self, schema: &'a Schema, hint: &NameHint) -> Result<Classified, GenerateError> {
        if let Some(reference) = &schema.ref_path {
            let id = self.resolve_ref(reference, &hint.path)?;
            return Ok(Classified {
                shape: Shape::Existing(id),
                nullable: false,
            });
        }
        if let Some(values) = &schema.enum_values {
            return Ok(classify_enum(values));
        }
        if let Some(members) = &schema.all_of {
            return self.classify_all_of(schema, members, hint);
        }
        if let Some(members) = schema.one_of.as_ref().or(schema.any_of.as_ref()) {
            let discriminator = schema.discriminator.as_ref().map(|d| d.property_name.clone());
            return self.classify_union(members, discriminator, hint);
        }

        let types = schema.non_null_types();
        match types.as_slice() {
            [] => self.classify_untyped(schema, hint),
            [single] => self.classify_typed(single, schema, hint).map(Classified::node),
            several => {
                let mut variants = Vec::new();
                for (i, ty) in several.iter().enumerate() {
                    let node = self.classify_typed(ty, schema, hint)?;
                    let variant_hint = hint.suffix(&format!("Variant{}", i + 1));
                    let id = self.place(node, &variant_hint, None);
                    if !variants.contains(&id) {
                        variants.push(id);
                    }
                }
                Ok(Classified::node(TypeNode::Union {
                    variants,
                    discriminator: None,
                }))
            }
        }
    }

    fn classify_untyped(&mut self, schema: &'a Schema, hint: &NameHint) -> Result<Classified, GenerateError> {
        if schema.properties.is_some() || schema.additional_properties.is_some() {
            return self.classify_typed("object", schema, hint).map(Classified::node);
        }
        if schema.items.is_some() {
            return self.classify_typed("array", schema, hint).map(Classified::node);
        }
        if schema.is_null_type() {
            return Ok(Classified::node(TypeNode::Primitive(PrimitiveKind::Null)));
        }
        Ok(Classified::node(TypeNode::FreeForm))
    }

    fn classify_typed(&mut self, ty: &str, schema: &'a Schema, hint: &NameHint) -> Result<TypeNode, GenerateError> {
        let node = match ty {
            "array" => {
                let item = match &schema.items {
                    Some(items) => self.resolve_schema(items, &hint.suffix("Item"))?,
                    None => self.free_form(),
                };
                TypeNode::Array(item)
            }
            "object" => self.classify_object(schema, hint)?,
            "integer" => TypeNode::Primitive(PrimitiveKind::Integer),
            "number" => TypeNode::Primitive(PrimitiveKind::Float),
            "boolean" => TypeNode::Primitive(PrimitiveKind::Bool),
            "null" => TypeNode::Primitive(PrimitiveKind::Null),
            "string" | "file" => match schema.format.as_deref() {
                Some("date-time") => TypeNode::Primitive(PrimitiveKind::DateTime),
                Some("date") => TypeNode::Primitive(PrimitiveKind::Date),
                Some("binary") => TypeNode::Primitive(PrimitiveKind::Binary),
                _ if ty == "file" => TypeNode::Primitive(PrimitiveKind::Binary),
                _ => TypeNode::Primitive(PrimitiveKind::Text),
            },
            _ => TypeNode::FreeForm,
        };
        Ok(node)
    }

    fn classify_object(&mut self, schema: &'a Schema, hint: &NameHint) -> Result<TypeNode, GenerateError> {
        let properties = schema.properties.as_ref().filter(|p| !p.is_empty());
        let Some(properties) = properties else {
            let value = match &schema.additional_properties {
                Some(AdditionalProperties::Schema(value)) => self.resolve_schema(value, &hint.suffix("Value"))?,
                _ => self.free_form(),
            };
            return Ok(TypeNode::Map(value));
        };

        let required: HashSet<&str> = schema.required.iter().flatten().map(String::as_str).collect();
        let mut fields = Vec::with_capacity(properties.len());
        for (name, property) in properties {
            let ty = self.resolve_schema(property, &hint.field(name))?;
            fields.push(Field {
                name: name.clone(),
                ty,
                required: required.contains(name.as_str()),
                default: property.default.as_ref().map(Literal::from_json),
                description: property.description.clone(),
            });
        }
        let extra = matches!(
            schema.additional_properties,
            Some(AdditionalProperties::Bool(true) | AdditionalProperties::Schema(_))
        );
        Ok(TypeNode::Object { fields, extra })
    }

    fn classify_all_of(
        &mut self,
        schema: &'a Schema,
        members: &'a [Schema],
        hint: &NameHint,
    ) -> Result<Classified, GenerateError> {
        let mut fields: Vec<Field> = Vec::new();
        let mut extra = false;
        let mut merged_any = false;
        let mut others: Vec<TypeId> = Vec::new();
        let mut pending: Vec<String> = Vec::new();
        let mut required: HashSet<&str> = schema.required.iter().flatten().map(String::as_str).collect();

        for (i, member) in members.iter().enumerate() {
            required.extend(member.required.iter().flatten().map(String::as_str));

            let node = if let Some(reference) = &member.ref_path {
                let key = schema_key(reference).ok_or_else(|| GenerateError::unresolved(reference, &hint.path))?;
                let target = self.resolve_ref(reference, &hint.path)?;
                if self.visiting.contains(&key) {
                    // Its fields are not known yet; it can still be referenced by name.
                    pending.push(key);
                    others.push(target);
                    continue;
                }
                let base = self.strip_null_marker(target);
                let aliased = resolve_alias_in(&self.nodes, base);
                match self.node(aliased) {
                    TypeNode::Object { .. } => self.node(aliased).clone(),
                    _ => {
                        others.push(target);
                        continue;
                    }
                }
            } else {
                let member_hint = hint.suffix(&format!("Part{}", i + 1));
                match self.classify(member, &member_hint)? {
                    Classified {
                        shape: Shape::Node(node @ TypeNode::Object { .. }),
                        ..
                    } => node,
                    Classified {
                        shape: Shape::Node(TypeNode::Map(_)),
                        ..
                    } if member.properties.is_some() => continue,
                    other => {
                        let id = match other.shape {
                            Shape::Existing(id) => id,
                            Shape::Node(node) => self.place(node, &member_hint, member.description.as_deref()),
                        };
                        others.push(id);
                        continue;
                    }
                }
            };

            if let TypeNode::Object {
                fields: member_fields,
                extra: member_extra,
            } = node
            {
                merged_any = true;
                extra |= member_extra;
                for field in member_fields {
                    merge_field(&mut fields, field);
                }
            }
        }

        if schema.properties.as_ref().is_some_and(|p| !p.is_empty())
            && let TypeNode::Object {
                fields: own_fields,
                extra: own_extra,
            } = self.classify_object(schema, hint)?
        {
            merged_any = true;
            extra |= own_extra;
            for field in own_fields {
                merge_field(&mut fields, field);
            }
        }

        if !merged_any {
            return Ok(match others.as_slice() {
                [single] => Classified {
                    shape: Shape::Existing(*single),
                    nullable: false,
                },
                _ => Classified::node(TypeNode::FreeForm),
            });
        }
        for key in pending {
            self.diagnostics.push(Diagnostic {
                kind: DiagnosticKind::CyclicComposition,
                location: hint.path.clone(),
                message: format!("allOf member `{key}` is still being resolved; its fields are not merged"),
            });
        }
        for field in &mut fields {
            field.required |= required.contains(field.name.as_str());
        }
        Ok(Classified::node(TypeNode::Object { fields, extra }))
    }

    fn classify_union(
        &mut self,
        members: &'a [Schema],
        discriminator: Option<String>,
        hint: &NameHint,
    ) -> Result<Classified, GenerateError> {
        let mut nullable = false;
        let mut variants = Vec::new();
        let mut n = 0;
        for member in members {
            if member.is_null_type() {
                nullable = true;
                continue;
            }
            n += 1;
            let id = self.resolve_schema(member, &hint.suffix(&format!("Variant{n}")))?;
            if !variants.contains(&id) {
                variants.push(id);
            }
        }

        let shape = match variants.as_slice() {
            [] => Shape::Node(TypeNode::FreeForm),
            [single] => Shape::Existing(*single),
            _ => Shape::Node(TypeNode::Union {
                variants,
                discriminator,
            }),
        };
        Ok(Classified { shape, nullable })
    }

    /// For a nullable wrapper produced by [`Self::nullable`], the wrapped id.
    fn strip_null_marker(&mut self, id: TypeId) -> TypeId {
        let null = self.null();
        match self.node(id) {
            TypeNode::Union { variants, .. } if variants.len() == 2 && variants[1] == null => variants[0],
            _ => id,
        }
    }
}

fn resolve_alias_in(nodes: &[TypeNode], mut id: TypeId) -> TypeId {
    for _ in 0..nodes.len() {
        match &nodes[id.0] {
            TypeNode::Alias(target) => id = *target,
            _ => break,
        }
    }
    id
}

/// Last wins: a redeclared field replaces the earlier one in place.
fn merge_field(fields: &mut Vec<Field>, field: Field) {
    match fields.iter_mut().find(|f| f.name == field.name) {
        Some(existing) => *existing = field,
        None => fields.push(field),
    }
}

fn classify_enum(values: &[serde_json::Value]) -> Classified {
    let nullable = values.iter().any(serde_json::Value::is_null);
    let literals: Vec<Literal> = values
        .iter()
        .filter(|v| !v.is_null())
        .map(Literal::from_json)
        .collect();
    let node = if literals.is_empty() {
        TypeNode::Primitive(PrimitiveKind::Null)
    } else {
        TypeNode::Enum(literals)
    };
    Classified {
        shape: Shape::Node(node),
        nullable,
    }
}

/// Whether uses of a named schema must admit `null`.
fn declares_null(schema: &Schema) -> bool {
    schema.is_nullable()
        || schema.enum_values.iter().flatten().any(serde_json::Value::is_null)
        || schema
            .one_of
            .iter()
            .chain(schema.any_of.iter())
            .flatten()
            .any(Schema::is_null_type)
}

/// Schema key named by a local `$ref`, with JSON-pointer escapes undone.
pub(crate) fn schema_key(reference: &str) -> Option<String> {
    SCHEMA_REF_PREFIXES
        .iter()
        .find_map(|prefix| reference.strip_prefix(prefix))
        .filter(|key| !key.is_empty() && !key.contains('/'))
        .map(|key| key.replace("~1", "/").replace("~0", "~"))
}
