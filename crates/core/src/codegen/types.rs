//! TypeGraph to Python annotation mapping.

use std::collections::HashSet;

use crate::ir::types::{Literal, PrimitiveKind, TypeGraph, TypeId, TypeNode};
use crate::ir::utils::{dedupe, enum_member_name, py_str};
use crate::python::PyType;

/// Annotation for a use of `id`; declarations are referenced by name.
pub(crate) fn py_type(graph: &TypeGraph, id: TypeId) -> PyType {
    match graph.decl(id) {
        Some(decl) => PyType::Named(decl.name.clone()),
        None => node_type(graph, id),
    }
}

/// Annotation for the structure of `id` itself, even when it is declared.
pub(crate) fn node_type(graph: &TypeGraph, id: TypeId) -> PyType {
    match graph.node(id) {
        TypeNode::Primitive(kind) => primitive_type(*kind),
        TypeNode::Array(item) => PyType::list(py_type(graph, *item)),
        TypeNode::Map(value) => PyType::dict(py_type(graph, *value)),
        TypeNode::Union { variants, .. } => {
            let mut nullable = false;
            let mut members: Vec<PyType> = Vec::new();
            for variant in variants {
                if matches!(graph.node(*variant), TypeNode::Primitive(PrimitiveKind::Null)) {
                    nullable = true;
                    continue;
                }
                let ty = py_type(graph, *variant);
                if !members.contains(&ty) {
                    members.push(ty);
                }
            }
            let inner = match members.len() {
                0 => PyType::Builtin("None"),
                1 => members.remove(0),
                _ => PyType::Union(members),
            };
            if nullable { PyType::optional(inner) } else { inner }
        }
        TypeNode::Alias(target) => py_type(graph, *target),
        TypeNode::FreeForm => PyType::Any,
        // Objects and enums are always declared; a bare one is still a valid payload.
        TypeNode::Object { .. } => PyType::dict(PyType::Any),
        TypeNode::Enum(_) => PyType::Any,
    }
}

fn primitive_type(kind: PrimitiveKind) -> PyType {
    match kind {
        PrimitiveKind::Integer => PyType::Builtin("int"),
        PrimitiveKind::Float => PyType::Builtin("float"),
        PrimitiveKind::Text => PyType::Builtin("str"),
        PrimitiveKind::Bool => PyType::Builtin("bool"),
        PrimitiveKind::DateTime => PyType::DateTime,
        PrimitiveKind::Date => PyType::Date,
        PrimitiveKind::Binary => PyType::Builtin("bytes"),
        PrimitiveKind::Null => PyType::Builtin("None"),
    }
}

/// Replace references to `names` with quoted forward references.
pub(crate) fn quote_names(ty: PyType, names: &HashSet<String>) -> PyType {
    match ty {
        PyType::Named(name) if names.contains(&name) => PyType::Forward(name),
        PyType::List(inner) => PyType::list(quote_names(*inner, names)),
        PyType::Dict(inner) => PyType::dict(quote_names(*inner, names)),
        PyType::Optional(inner) => PyType::Optional(Box::new(quote_names(*inner, names))),
        PyType::Union(variants) => PyType::Union(variants.into_iter().map(|v| quote_names(v, names)).collect()),
        other => other,
    }
}

/// Python source for a literal value.
pub(crate) fn py_literal(value: &Literal) -> String {
    match value {
        Literal::Null => "None".to_string(),
        Literal::Bool(true) => "True".to_string(),
        Literal::Bool(false) => "False".to_string(),
        Literal::Int(n) => n.to_string(),
        Literal::Float(f) => {
            let f = f.into_inner();
            if f.is_nan() {
                "float(\"nan\")".to_string()
            } else if f.is_infinite() {
                if f > 0.0 { "float(\"inf\")".to_string() } else { "float(\"-inf\")".to_string() }
            } else {
                let text = f.to_string();
                if text.contains(['.', 'e', 'E']) { text } else { format!("{text}.0") }
            }
        }
        Literal::Str(s) => py_str(s),
        Literal::List(items) => format!("[{}]", items.iter().map(py_literal).collect::<Vec<_>>().join(", ")),
        Literal::Map(entries) => {
            let parts: Vec<_> = entries
                .iter()
                .map(|(key, value)| format!("{}: {}", py_str(key), py_literal(value)))
                .collect();
            format!("{{{}}}", parts.join(", "))
        }
    }
}

/// Enum members as `(member name, value)`, with member names made unique.
pub(crate) fn enum_members(values: &[Literal]) -> Vec<(String, &Literal)> {
    let mut taken = HashSet::new();
    values
        .iter()
        .enumerate()
        .map(|(i, value)| {
            let base = enum_member_name(value, i);
            let name = dedupe(base, &taken);
            taken.insert(name.clone());
            (name, value)
        })
        .collect()
}

/// Default for a value of type `ty`, rendering enum values as members.
///
/// The second element names the enum declaration the expression refers to.
pub(crate) fn default_expr(graph: &TypeGraph, ty: TypeId, value: &Literal) -> (String, Option<String>) {
    let target = graph.resolve_alias(graph.strip_null(ty));
    if let (TypeNode::Enum(values), Some(decl)) = (graph.node(target), graph.decl(target))
        && let Some((member, _)) = enum_members(values).into_iter().find(|(_, v)| *v == value)
    {
        return (format!("{}.{member}", decl.name), Some(decl.name.clone()));
    }
    (py_literal(value), None)
}
