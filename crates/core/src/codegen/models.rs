//! Model unit generation: one pydantic module per type declaration.

use std::collections::{BTreeSet, HashSet};

use crate::ir::types::{DeclOrigin, Field, Literal, TypeDecl, TypeGraph, TypeNode};
use crate::ir::utils::{dedupe, py_str, sanitize_field_name};
use crate::python::{Emit, PyClass, PyExpr, PyImport, PyItem, PyModule, PyStmt, PyType};

use super::types::{default_expr, enum_members, node_type, py_literal, py_type, quote_names};

/// Source text of the model unit for `decl`.
pub fn emit_model(graph: &TypeGraph, decl: &TypeDecl) -> String {
    model_module(graph, decl).emit()
}

/// Imports gathered while building a unit body.
#[derive(Default)]
struct ModelImports {
    typing: BTreeSet<&'static str>,
    datetime: BTreeSet<&'static str>,
    pydantic: BTreeSet<&'static str>,
    uses_enum: bool,
    type_alias: bool,
    /// Referenced declarations, in first-use order
    refs: Vec<String>,
}

impl ModelImports {
    fn add_type(&mut self, ty: &PyType) {
        ty.collect_typing(&mut self.typing);
        ty.collect_datetime(&mut self.datetime);
        ty.collect_named(&mut self.refs);
    }

    fn add_ref(&mut self, name: String) {
        if !self.refs.contains(&name) {
            self.refs.push(name);
        }
    }
}

fn model_module(graph: &TypeGraph, decl: &TypeDecl) -> PyModule {
    let mut imports = ModelImports::default();

    // Declarations that lead back here must be imported after this one is bound.
    let deferred: HashSet<String> = graph
        .decl_refs(decl.id)
        .into_iter()
        .filter(|&id| id != decl.id && graph.reaches(id, decl.id))
        .filter_map(|id| graph.decl(id).map(|d| d.name.clone()))
        .collect();

    let item = match graph.node(decl.id) {
        TypeNode::Object { fields, extra } => PyItem::Class(model_class(graph, decl, fields, *extra, &mut imports)),
        TypeNode::Enum(values) => {
            imports.uses_enum = true;
            PyItem::Class(enum_class(decl, values))
        }
        _ => {
            let mut quoted = deferred.clone();
            quoted.insert(decl.name.clone());
            let ty = quote_names(node_type(graph, decl.id), &quoted);
            imports.add_type(&ty);
            // A plain assignment would bind quoted names as strings; TypeAliasType resolves them lazily.
            let value = if ty.has_forward() {
                imports.type_alias = true;
                format!("TypeAliasType({}, {})", py_str(&decl.name), ty.emit())
            } else {
                ty.emit()
            };
            PyItem::Stmt(PyStmt::Assign {
                target: decl.name.clone(),
                annotation: None,
                value: Some(PyExpr::raw(value)),
            })
        }
    };

    let mut module = PyModule {
        imports: vec![PyImport::from("__future__", ["annotations"])],
        ..PyModule::default()
    };
    if !imports.typing.is_empty() {
        module.imports.push(PyImport::from("typing", imports.typing.iter().copied()));
    }
    if imports.type_alias {
        module.imports.push(PyImport::from("typing_extensions", ["TypeAliasType"]));
    }
    if !imports.datetime.is_empty() {
        module.imports.push(PyImport::from("datetime", imports.datetime.iter().copied()));
    }
    if imports.uses_enum {
        module.imports.push(PyImport::from("enum", ["Enum"]));
    }
    if !imports.pydantic.is_empty() {
        module.imports.push(PyImport::from("pydantic", imports.pydantic.iter().copied()));
    }

    let mut late = Vec::new();
    for name in imports.refs.iter().filter(|name| **name != decl.name) {
        let import = PyImport::from(format!(".{name}"), [name.as_str()]);
        if deferred.contains(name) {
            late.push(import);
        } else {
            module.imports.push(import);
        }
    }

    module.body.extend(header_comments(graph, decl));
    module.body.push(item);

    let is_class = matches!(graph.node(decl.id), TypeNode::Object { .. });
    for import in late {
        module.trailer.push(PyStmt::Raw(import.emit()));
    }
    if is_class && (decl.recursive || !deferred.is_empty()) {
        module
            .trailer
            .push(PyStmt::Expr(PyExpr::raw(format!("{}.model_rebuild()", decl.name))));
    }
    module
}

/// Comments placed above alias declarations (which cannot carry docstrings).
fn header_comments(graph: &TypeGraph, decl: &TypeDecl) -> Vec<PyItem> {
    let mut comments = Vec::new();
    if matches!(graph.node(decl.id), TypeNode::Object { .. } | TypeNode::Enum(_)) {
        return comments;
    }
    if let Some(description) = &decl.description {
        comments.push(PyItem::Stmt(PyStmt::Comment(description.trim().to_string())));
    }
    if let TypeNode::Union {
        discriminator: Some(property),
        ..
    } = graph.node(decl.id)
    {
        comments.push(PyItem::Stmt(PyStmt::Comment(format!(
            "Variants are distinguished by the `{property}` property."
        ))));
    }
    comments
}

fn docstring_for(decl: &TypeDecl) -> Option<String> {
    match (&decl.description, &decl.origin) {
        (Some(description), _) => Some(description.clone()),
        (None, DeclOrigin::Named(_)) => None,
        (None, DeclOrigin::Synthesized(owner)) => Some(format!("Inline schema at {owner}.")),
    }
}

fn model_class(
    graph: &TypeGraph,
    decl: &TypeDecl,
    fields: &[Field],
    extra: bool,
    imports: &mut ModelImports,
) -> PyClass {
    imports.pydantic.insert("BaseModel");
    imports.pydantic.insert("ConfigDict");

    let config = if extra {
        "ConfigDict(populate_by_name=True, extra=\"allow\")"
    } else {
        "ConfigDict(populate_by_name=True)"
    };
    let mut body = vec![PyStmt::assign("model_config", PyExpr::raw(config))];
    if !fields.is_empty() {
        body.push(PyStmt::Blank);
    }

    let shadowed = annotation_names(graph, fields);
    let mut taken = HashSet::new();
    for field in fields {
        let mut name = sanitize_field_name(&field.name);
        while shadowed.contains(&name) {
            name.push('_');
        }
        let name = dedupe(name, &taken);
        taken.insert(name.clone());
        body.push(model_field(graph, field, name, imports));
    }

    PyClass {
        name: decl.name.clone(),
        bases: vec!["BaseModel".to_string()],
        docstring: docstring_for(decl),
        body,
    }
}

/// Names the class body reads: a field named after one of them would rebind it
/// inside the class namespace.
fn annotation_names(graph: &TypeGraph, fields: &[Field]) -> HashSet<String> {
    let mut typing = BTreeSet::from(["Optional"]);
    let mut datetime = BTreeSet::new();
    let mut named = Vec::new();
    for field in fields {
        let ty = py_type(graph, field.ty);
        ty.collect_typing(&mut typing);
        ty.collect_datetime(&mut datetime);
        ty.collect_named(&mut named);
    }
    typing
        .into_iter()
        .chain(datetime)
        .chain(["Field"])
        .map(str::to_string)
        .chain(named)
        .collect()
}

fn model_field(graph: &TypeGraph, field: &Field, name: String, imports: &mut ModelImports) -> PyStmt {
    let base = py_type(graph, field.ty);
    let annotation = if field.required { base } else { PyType::optional(base) };
    imports.add_type(&annotation);

    // A required field never takes a default, so it stays required on the model.
    let default = if field.required {
        None
    } else {
        Some(match &field.default {
            Some(value) => {
                let (expr, enum_ref) = default_expr(graph, field.ty, value);
                if let Some(enum_ref) = enum_ref {
                    imports.add_ref(enum_ref);
                }
                expr
            }
            None => "None".to_string(),
        })
    };

    let mut kwargs = Vec::new();
    if name != field.name {
        kwargs.push(format!("alias={}", py_str(&field.name)));
    }
    if let Some(description) = &field.description {
        kwargs.push(format!("description={}", py_str(description.trim())));
    }

    let value = if kwargs.is_empty() {
        default
    } else {
        imports.pydantic.insert("Field");
        let first = match default {
            Some(default) if is_mutable_default(field.default.as_ref()) => {
                format!("default_factory=lambda: {default}")
            }
            Some(default) => format!("default={default}"),
            None => "...".to_string(),
        };
        Some(format!("Field({first}, {})", kwargs.join(", ")))
    };

    PyStmt::Assign {
        target: name,
        annotation: Some(annotation),
        value: value.map(PyExpr::Raw),
    }
}

fn is_mutable_default(value: Option<&Literal>) -> bool {
    matches!(value, Some(Literal::List(_) | Literal::Map(_)))
}

fn enum_class(decl: &TypeDecl, values: &[Literal]) -> PyClass {
    let bases = if values.iter().all(|v| matches!(v, Literal::Str(_))) {
        vec!["str".to_string(), "Enum".to_string()]
    } else if values.iter().all(|v| matches!(v, Literal::Int(_))) {
        vec!["int".to_string(), "Enum".to_string()]
    } else {
        vec!["Enum".to_string()]
    };

    let body = enum_members(values)
        .into_iter()
        .map(|(member, value)| PyStmt::assign(member, PyExpr::raw(py_literal(value))))
        .collect();

    PyClass {
        name: decl.name.clone(),
        bases,
        docstring: docstring_for(decl),
        body,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::ir::normalize_spec;
    use crate::spec::SpecModel;

    fn graph(json: &str) -> TypeGraph {
        let spec = SpecModel::from_json(json).unwrap();
        normalize_spec(&spec).unwrap().types
    }

    fn unit(graph: &TypeGraph, name: &str) -> String {
        let decl = graph.decls().iter().find(|d| d.name == name).expect("declaration");
        emit_model(graph, decl)
    }

    // ===== Classes =====

    #[test]
    fn test_object_model() {
        let graph = graph(
            r##"{
                "openapi": "3.0.0",
                "info": {"title": "T", "version": "1"},
                "paths": {},
                "components": {"schemas": {
                    "Pet": {
                        "type": "object",
                        "description": "A pet.",
                        "required": ["id", "name"],
                        "properties": {
                            "id": {"type": "integer"},
                            "name": {"type": "string"},
                            "tag": {"type": "string", "description": "Free tag"},
                            "birth-date": {"type": "string", "format": "date"}
                        }
                    }
                }}
            }"##,
        );
        assert_eq!(
            unit(&graph, "Pet"),
            r#"from __future__ import annotations
from typing import Optional
from datetime import date
from pydantic import BaseModel, ConfigDict, Field


class Pet(BaseModel):
    """A pet."""

    model_config = ConfigDict(populate_by_name=True)

    id: int
    name: str
    tag: Optional[str] = Field(default=None, description="Free tag")
    birth_date: Optional[date] = Field(default=None, alias="birth-date")
"#
        );
    }

    #[test]
    fn test_field_named_after_its_type_is_renamed() {
        let graph = graph(
            r##"{
                "openapi": "3.0.0",
                "info": {"title": "T", "version": "1"},
                "paths": {},
                "components": {"schemas": {
                    "Owner": {"type": "object", "properties": {"id": {"type": "integer"}}},
                    "Event": {
                        "type": "object",
                        "required": ["Owner"],
                        "properties": {
                            "date": {"type": "string", "format": "date"},
                            "datetime": {"type": "string"},
                            "Owner": {"$ref": "#/components/schemas/Owner"},
                            "title": {"type": "string"}
                        }
                    }
                }}
            }"##,
        );
        let code = unit(&graph, "Event");
        assert!(code.contains("    date_: Optional[date] = Field(default=None, alias=\"date\")\n"), "got:\n{code}");
        assert!(code.contains("    datetime: Optional[str] = None\n"), "got:\n{code}");
        assert!(code.contains("    Owner_: Owner = Field(..., alias=\"Owner\")\n"), "got:\n{code}");
        assert!(code.contains("    title: Optional[str] = None\n"), "got:\n{code}");
    }

    #[test]
    fn test_required_field_keeps_no_default() {
        let graph = graph(
            r##"{
                "openapi": "3.0.0",
                "info": {"title": "T", "version": "1"},
                "paths": {},
                "components": {"schemas": {
                    "Page": {
                        "type": "object",
                        "required": ["size"],
                        "properties": {
                            "size": {"type": "integer", "default": 20},
                            "offset": {"type": "integer", "default": 0},
                            "labels": {"type": "array", "items": {"type": "string"}, "default": [], "description": "Labels"}
                        }
                    }
                }}
            }"##,
        );
        let code = unit(&graph, "Page");
        assert!(code.contains("    size: int\n"), "got:\n{code}");
        assert!(code.contains("    offset: Optional[int] = 0\n"), "got:\n{code}");
        assert!(
            code.contains("labels: Optional[List[str]] = Field(default_factory=lambda: [], description=\"Labels\")"),
            "got:\n{code}"
        );
    }

    #[test]
    fn test_enum_default_imports_enum() {
        let graph = graph(
            r##"{
                "openapi": "3.0.0",
                "info": {"title": "T", "version": "1"},
                "paths": {},
                "components": {"schemas": {
                    "Status": {"type": "string", "enum": ["available", "sold"]},
                    "Pet": {
                        "type": "object",
                        "properties": {
                            "status": {"$ref": "#/components/schemas/Status", "default": "sold"}
                        }
                    }
                }}
            }"##,
        );
        let code = unit(&graph, "Pet");
        assert!(code.contains("from .Status import Status\n"), "got:\n{code}");
        assert!(code.contains("status: Optional[Status] = Status.SOLD\n"), "got:\n{code}");
    }

    #[test]
    fn test_additional_properties_allow_extra() {
        let graph = graph(
            r##"{
                "openapi": "3.0.0",
                "info": {"title": "T", "version": "1"},
                "paths": {},
                "components": {"schemas": {
                    "Bag": {
                        "type": "object",
                        "properties": {"id": {"type": "string"}},
                        "additionalProperties": true
                    }
                }}
            }"##,
        );
        assert!(unit(&graph, "Bag").contains("ConfigDict(populate_by_name=True, extra=\"allow\")"));
    }

    // ===== Enums and aliases =====

    #[test]
    fn test_enum_unit() {
        let graph = graph(
            r##"{
                "openapi": "3.0.0",
                "info": {"title": "T", "version": "1"},
                "paths": {},
                "components": {"schemas": {
                    "Level": {"type": "integer", "enum": [1, 2, 3]}
                }}
            }"##,
        );
        assert_eq!(
            unit(&graph, "Level"),
            "from __future__ import annotations\nfrom enum import Enum\n\n\nclass Level(int, Enum):\n    VALUE_1 = 1\n    VALUE_2 = 2\n    VALUE_3 = 3\n"
        );
    }

    #[test]
    fn test_alias_unit() {
        let graph = graph(
            r##"{
                "openapi": "3.0.0",
                "info": {"title": "T", "version": "1"},
                "paths": {},
                "components": {"schemas": {
                    "Cat": {"type": "object", "properties": {"meow": {"type": "boolean"}}},
                    "Dog": {"type": "object", "properties": {"bark": {"type": "boolean"}}},
                    "Animal": {
                        "description": "Any animal.",
                        "oneOf": [{"$ref": "#/components/schemas/Cat"}, {"$ref": "#/components/schemas/Dog"}],
                        "discriminator": {"propertyName": "kind"}
                    }
                }}
            }"##,
        );
        assert_eq!(
            unit(&graph, "Animal"),
            "from __future__ import annotations\nfrom typing import Union\nfrom .Cat import Cat\nfrom .Dog import Dog\n\n# Any animal.\n# Variants are distinguished by the `kind` property.\nAnimal = Union[Cat, Dog]\n"
        );
    }

    // ===== Cycles =====

    #[test]
    fn test_self_reference_rebuilds() {
        let graph = graph(
            r##"{
                "openapi": "3.0.0",
                "info": {"title": "T", "version": "1"},
                "paths": {},
                "components": {"schemas": {
                    "Node": {
                        "type": "object",
                        "properties": {
                            "children": {"type": "array", "items": {"$ref": "#/components/schemas/Node"}}
                        }
                    }
                }}
            }"##,
        );
        let code = unit(&graph, "Node");
        assert!(!code.contains("from .Node import"), "got:\n{code}");
        assert!(code.contains("children: Optional[List[Node]] = None\n"), "got:\n{code}");
        assert!(code.ends_with("\n\n\nNode.model_rebuild()\n"), "got:\n{code}");
    }

    #[test]
    fn test_mutual_reference_defers_import() {
        let graph = graph(
            r##"{
                "openapi": "3.0.0",
                "info": {"title": "T", "version": "1"},
                "paths": {},
                "components": {"schemas": {
                    "A": {"type": "object", "properties": {"b": {"$ref": "#/components/schemas/B"}}},
                    "B": {"type": "object", "properties": {"a": {"$ref": "#/components/schemas/A"}}}
                }}
            }"##,
        );
        for (name, other) in [("A", "B"), ("B", "A")] {
            let code = unit(&graph, name);
            let import = format!("from .{other} import {other}\n");
            let class = format!("class {name}(BaseModel):");
            let import_at = code.find(&import).expect("late import");
            assert!(import_at > code.find(&class).unwrap(), "got:\n{code}");
            assert!(code.ends_with(&format!("{name}.model_rebuild()\n")), "got:\n{code}");
        }
    }

    #[test]
    fn test_alias_cycle_uses_type_alias_type() {
        let graph = graph(
            r##"{
                "openapi": "3.0.0",
                "info": {"title": "T", "version": "1"},
                "paths": {},
                "components": {"schemas": {
                    "Loop1": {"$ref": "#/components/schemas/Loop2"},
                    "Loop2": {"type": "array", "items": {"$ref": "#/components/schemas/Loop1"}}
                }}
            }"##,
        );
        assert_eq!(
            unit(&graph, "Loop1"),
            "from __future__ import annotations\nfrom typing_extensions import TypeAliasType\n\nLoop1 = TypeAliasType(\"Loop1\", \"Loop2\")\n\n\nfrom .Loop2 import Loop2\n"
        );
        let loop2 = unit(&graph, "Loop2");
        assert!(
            loop2.contains("Loop2 = TypeAliasType(\"Loop2\", List[\"Loop1\"])\n"),
            "got:\n{loop2}"
        );
        assert!(loop2.ends_with("from .Loop1 import Loop1\n"), "got:\n{loop2}");
    }
}
