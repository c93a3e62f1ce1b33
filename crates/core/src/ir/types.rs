//! The resolved type graph.
//!
//! Types live in an arena addressed by [`TypeId`]; edges between nodes are
//! ids, so self- and mutually-referential schemas need no recursive values.
//! Named schemas own exactly one slot each (nominal identity), anonymous
//! shapes are interned (structural identity).

use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use ordered_float::OrderedFloat;

/// Index of a node in the [`TypeGraph`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub(crate) usize);

impl TypeId {
    /// Position of the node in the arena.
    pub fn index(self) -> usize {
        self.0
    }
}

/// A JSON value usable as an enum member or a default.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Literal {
    Null,
    Bool(bool),
    Int(i64),
    Float(OrderedFloat<f64>),
    Str(String),
    List(Vec<Literal>),
    Map(Vec<(String, Literal)>),
}

impl Literal {
    /// Convert a JSON value, keeping object key order.
    pub fn from_json(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Literal::Null,
            serde_json::Value::Bool(b) => Literal::Bool(*b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Literal::Int(i),
                None => Literal::Float(OrderedFloat(n.as_f64().unwrap_or(0.0))),
            },
            serde_json::Value::String(s) => Literal::Str(s.clone()),
            serde_json::Value::Array(items) => Literal::List(items.iter().map(Literal::from_json).collect()),
            serde_json::Value::Object(map) => Literal::Map(
                map.iter()
                    .map(|(k, v)| (k.clone(), Literal::from_json(v)))
                    .collect(),
            ),
        }
    }
}

/// Primitive kinds, mapped from `type` + `format`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    Integer,
    Float,
    Text,
    Bool,
    DateTime,
    Date,
    Binary,
    /// The null marker used in nullable unions.
    Null,
}

/// One property of an object type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Field {
    /// Property name as it appears on the wire.
    pub name: String,
    pub ty: TypeId,
    pub required: bool,
    pub default: Option<Literal>,
    pub description: Option<String>,
}

/// A node in the type graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeNode {
    Primitive(PrimitiveKind),
    Array(TypeId),
    /// String-keyed dictionary with values of the given type.
    Map(TypeId),
    Object {
        fields: Vec<Field>,
        /// Whether undeclared properties are allowed through.
        extra: bool,
    },
    Union {
        variants: Vec<TypeId>,
        discriminator: Option<String>,
    },
    Enum(Vec<Literal>),
    FreeForm,
    /// A named schema that only refers to another type.
    Alias(TypeId),
}

impl TypeNode {
    /// Ids this node points at directly.
    pub fn children(&self) -> Vec<TypeId> {
        match self {
            TypeNode::Array(t) | TypeNode::Map(t) | TypeNode::Alias(t) => vec![*t],
            TypeNode::Object { fields, .. } => fields.iter().map(|f| f.ty).collect(),
            TypeNode::Union { variants, .. } => variants.clone(),
            TypeNode::Primitive(_) | TypeNode::Enum(_) | TypeNode::FreeForm => Vec::new(),
        }
    }
}

/// Where a declaration's name came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclOrigin {
    /// A named schema, with its document key.
    Named(String),
    /// An inline schema, with the owner path it was found at.
    Synthesized(String),
}

/// A node that is emitted as its own unit.
#[derive(Debug, Clone)]
pub struct TypeDecl {
    pub id: TypeId,
    /// Class / module name.
    pub name: String,
    pub origin: DeclOrigin,
    pub description: Option<String>,
    /// Set when a reference cycle passes through this declaration.
    pub recursive: bool,
}

/// The resolved, immutable collection of types for one run.
#[derive(Debug, Clone)]
pub struct TypeGraph {
    nodes: Vec<TypeNode>,
    decls: Vec<TypeDecl>,
    decl_index: HashMap<TypeId, usize>,
    named: IndexMap<String, TypeId>,
}

impl TypeGraph {
    pub(crate) fn new(nodes: Vec<TypeNode>, decls: Vec<TypeDecl>, named: IndexMap<String, TypeId>) -> Self {
        let decl_index = decls.iter().enumerate().map(|(i, d)| (d.id, i)).collect();
        Self {
            nodes,
            decls,
            decl_index,
            named,
        }
    }

    pub fn node(&self, id: TypeId) -> &TypeNode {
        &self.nodes[id.0]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Declarations in emission order.
    pub fn decls(&self) -> &[TypeDecl] {
        &self.decls
    }

    pub fn decl(&self, id: TypeId) -> Option<&TypeDecl> {
        self.decl_index.get(&id).map(|&i| &self.decls[i])
    }

    /// The id reserved for a named schema key.
    pub fn named(&self, key: &str) -> Option<TypeId> {
        self.named.get(key).copied()
    }

    /// Follow `Alias` links to the aliased node.
    pub fn resolve_alias(&self, mut id: TypeId) -> TypeId {
        let mut seen = HashSet::new();
        while let TypeNode::Alias(target) = self.node(id) {
            if !seen.insert(id) {
                break;
            }
            id = *target;
        }
        id
    }

    /// Whether the type admits `null`.
    pub fn is_nullable(&self, id: TypeId) -> bool {
        match self.node(id) {
            TypeNode::Primitive(PrimitiveKind::Null) => true,
            TypeNode::Union { variants, .. } => variants
                .iter()
                .any(|v| matches!(self.node(*v), TypeNode::Primitive(PrimitiveKind::Null))),
            _ => false,
        }
    }

    /// For `Union(T, Null)` return `T`; otherwise the id itself.
    pub fn strip_null(&self, id: TypeId) -> TypeId {
        if let TypeNode::Union { variants, .. } = self.node(id) {
            let non_null: Vec<_> = variants
                .iter()
                .filter(|v| !matches!(self.node(**v), TypeNode::Primitive(PrimitiveKind::Null)))
                .collect();
            if non_null.len() == 1 && self.decl(id).is_none() {
                return *non_null[0];
            }
        }
        id
    }

    /// Declarations referenced from `id`'s node, looking through anonymous nodes.
    pub fn decl_refs(&self, id: TypeId) -> Vec<TypeId> {
        let mut found = Vec::new();
        let mut seen = HashSet::new();
        let mut stack: Vec<TypeId> = self.node(id).children().into_iter().rev().collect();
        while let Some(next) = stack.pop() {
            if !seen.insert(next) {
                continue;
            }
            if self.decl(next).is_some() {
                found.push(next);
            } else {
                stack.extend(self.node(next).children().into_iter().rev());
            }
        }
        found
    }

    /// Whether following declaration references from `from` leads to `to`.
    pub fn reaches(&self, from: TypeId, to: TypeId) -> bool {
        let mut seen = HashSet::new();
        let mut stack = vec![from];
        while let Some(next) = stack.pop() {
            if next == to {
                return true;
            }
            if seen.insert(next) {
                stack.extend(self.decl_refs(next));
            }
        }
        false
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn decl(id: usize, name: &str) -> TypeDecl {
        TypeDecl {
            id: TypeId(id),
            name: name.to_string(),
            origin: DeclOrigin::Named(name.to_string()),
            description: None,
            recursive: false,
        }
    }

    /// A <-> B cycle, C standalone: A { b: B }, B { a: Optional[A] }, C { n: int }
    fn cyclic_graph() -> TypeGraph {
        let field = |name: &str, ty: usize| Field {
            name: name.to_string(),
            ty: TypeId(ty),
            required: true,
            default: None,
            description: None,
        };
        let nodes = vec![
            TypeNode::Object { fields: vec![field("b", 1)], extra: false },
            TypeNode::Object { fields: vec![field("a", 4)], extra: false },
            TypeNode::Object { fields: vec![field("n", 3)], extra: false },
            TypeNode::Primitive(PrimitiveKind::Integer),
            TypeNode::Union { variants: vec![TypeId(0), TypeId(5)], discriminator: None },
            TypeNode::Primitive(PrimitiveKind::Null),
        ];
        let decls = vec![decl(0, "A"), decl(1, "B"), decl(2, "C")];
        let named = decls.iter().map(|d| (d.name.clone(), d.id)).collect();
        TypeGraph::new(nodes, decls, named)
    }

    #[test]
    fn test_literal_from_json() {
        let value = serde_json::json!({ "b": [1, 2.5, "x", null, true] });
        let literal = Literal::from_json(&value);
        assert_eq!(
            literal,
            Literal::Map(vec![(
                "b".to_string(),
                Literal::List(vec![
                    Literal::Int(1),
                    Literal::Float(OrderedFloat(2.5)),
                    Literal::Str("x".to_string()),
                    Literal::Null,
                    Literal::Bool(true),
                ])
            )])
        );
    }

    #[test]
    fn test_decl_refs_look_through_anonymous_nodes() {
        let graph = cyclic_graph();
        assert_eq!(graph.decl_refs(TypeId(1)), vec![TypeId(0)]);
        assert_eq!(graph.decl_refs(TypeId(2)), Vec::<TypeId>::new());
    }

    #[test]
    fn test_reaches() {
        let graph = cyclic_graph();
        assert!(graph.reaches(TypeId(0), TypeId(1)));
        assert!(graph.reaches(TypeId(1), TypeId(0)));
        assert!(!graph.reaches(TypeId(2), TypeId(0)));
    }

    #[test]
    fn test_nullable_helpers() {
        let graph = cyclic_graph();
        assert!(graph.is_nullable(TypeId(4)));
        assert_eq!(graph.strip_null(TypeId(4)), TypeId(0));
        assert!(!graph.is_nullable(TypeId(3)));
        assert_eq!(graph.strip_null(TypeId(3)), TypeId(3));
    }
}
