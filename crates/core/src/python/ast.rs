//! Python AST IR for code generation.
//!
//! This module defines the small subset of Python the generator produces:
//! - PyType: annotations (builtins, typing generics, class references)
//! - PyExpr: expressions used in generated function bodies
//! - PyStmt / PyClass / PyFunction / PyModule: statements and declarations

use std::collections::BTreeSet;

/// Python type annotation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PyType {
    /// Builtin type: int, float, str, bool, bytes, None
    Builtin(&'static str),
    Any,
    DateTime,
    Date,
    /// List[T]
    List(Box<PyType>),
    /// Dict[str, T]
    Dict(Box<PyType>),
    /// Optional[T]
    Optional(Box<PyType>),
    /// Union[A, B, ...]
    Union(Vec<PyType>),
    /// Reference to a generated class or alias
    Named(String),
    /// Quoted reference, for names bound later in the module
    Forward(String),
}

impl PyType {
    pub fn list(inner: PyType) -> Self {
        PyType::List(Box::new(inner))
    }

    pub fn dict(value: PyType) -> Self {
        PyType::Dict(Box::new(value))
    }

    /// `Optional[T]`, leaving already-optional types alone.
    pub fn optional(inner: PyType) -> Self {
        match inner {
            PyType::Optional(_) | PyType::Any => inner,
            PyType::Builtin("None") => inner,
            other => PyType::Optional(Box::new(other)),
        }
    }

    /// Names this annotation needs from `typing`.
    pub fn collect_typing(&self, out: &mut BTreeSet<&'static str>) {
        match self {
            PyType::Any => {
                out.insert("Any");
            }
            PyType::List(inner) => {
                out.insert("List");
                inner.collect_typing(out);
            }
            PyType::Dict(inner) => {
                out.insert("Dict");
                inner.collect_typing(out);
            }
            PyType::Optional(inner) => {
                out.insert("Optional");
                inner.collect_typing(out);
            }
            PyType::Union(variants) => {
                out.insert("Union");
                for variant in variants {
                    variant.collect_typing(out);
                }
            }
            PyType::Builtin(_) | PyType::DateTime | PyType::Date | PyType::Named(_) | PyType::Forward(_) => {}
        }
    }

    /// Names this annotation needs from `datetime`.
    pub fn collect_datetime(&self, out: &mut BTreeSet<&'static str>) {
        match self {
            PyType::DateTime => {
                out.insert("datetime");
            }
            PyType::Date => {
                out.insert("date");
            }
            PyType::List(inner) | PyType::Dict(inner) | PyType::Optional(inner) => inner.collect_datetime(out),
            PyType::Union(variants) => variants.iter().for_each(|v| v.collect_datetime(out)),
            PyType::Builtin(_) | PyType::Any | PyType::Named(_) | PyType::Forward(_) => {}
        }
    }

    /// Whether any reference in this annotation is quoted.
    pub fn has_forward(&self) -> bool {
        match self {
            PyType::Forward(_) => true,
            PyType::List(inner) | PyType::Dict(inner) | PyType::Optional(inner) => inner.has_forward(),
            PyType::Union(variants) => variants.iter().any(PyType::has_forward),
            PyType::Builtin(_) | PyType::Any | PyType::DateTime | PyType::Date | PyType::Named(_) => false,
        }
    }

    /// Generated names referenced by this annotation, in first-use order.
    pub fn collect_named(&self, out: &mut Vec<String>) {
        match self {
            PyType::Named(name) | PyType::Forward(name) => {
                if !out.contains(name) {
                    out.push(name.clone());
                }
            }
            PyType::List(inner) | PyType::Dict(inner) | PyType::Optional(inner) => inner.collect_named(out),
            PyType::Union(variants) => variants.iter().for_each(|v| v.collect_named(out)),
            PyType::Builtin(_) | PyType::Any | PyType::DateTime | PyType::Date => {}
        }
    }
}

/// Python expression
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PyExpr {
    /// Identifier or dotted name: foo, api_config.base_path
    Name(String),
    /// String literal: "foo"
    Str(String),
    /// f-string with the inner text given verbatim: f"{base}/pets/{id}"
    FString(String),
    /// Call: f(a, b, key=value)
    Call {
        func: Box<PyExpr>,
        args: Vec<PyExpr>,
        kwargs: Vec<(String, PyExpr)>,
    },
    /// Dict display: {"a": b}
    Dict(Vec<(PyExpr, PyExpr)>),
    /// await expr
    Await(Box<PyExpr>),
    /// Pre-rendered code
    Raw(String),
}

impl PyExpr {
    pub fn name(name: impl Into<String>) -> Self {
        PyExpr::Name(name.into())
    }

    pub fn raw(code: impl Into<String>) -> Self {
        PyExpr::Raw(code.into())
    }

    pub fn call(func: impl Into<String>, args: Vec<PyExpr>) -> Self {
        PyExpr::Call {
            func: Box::new(PyExpr::Name(func.into())),
            args,
            kwargs: Vec::new(),
        }
    }

    pub fn with_kwargs(self, kwargs: Vec<(String, PyExpr)>) -> Self {
        match self {
            PyExpr::Call { func, args, .. } => PyExpr::Call { func, args, kwargs },
            other => other,
        }
    }
}

/// Python statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PyStmt {
    /// target[: annotation][ = value]
    Assign {
        target: String,
        annotation: Option<PyType>,
        value: Option<PyExpr>,
    },
    Expr(PyExpr),
    Return(Option<PyExpr>),
    /// A compound statement: `header:` followed by an indented body
    Block { header: String, body: Vec<PyStmt> },
    Raise(PyExpr),
    Def(Box<PyFunction>),
    Docstring(String),
    Comment(String),
    Pass,
    Blank,
    /// Pre-rendered lines, re-indented on emission
    Raw(String),
}

impl PyStmt {
    pub fn assign(target: impl Into<String>, value: PyExpr) -> Self {
        PyStmt::Assign {
            target: target.into(),
            annotation: None,
            value: Some(value),
        }
    }

    pub fn block(header: impl Into<String>, body: Vec<PyStmt>) -> Self {
        PyStmt::Block {
            header: header.into(),
            body,
        }
    }
}

/// Function parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PyParam {
    pub name: String,
    pub ty: Option<PyType>,
    /// Rendered default value
    pub default: Option<String>,
}

impl PyParam {
    pub fn new(name: impl Into<String>, ty: PyType) -> Self {
        Self {
            name: name.into(),
            ty: Some(ty),
            default: None,
        }
    }

    pub fn with_default(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }
}

/// Function or method definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PyFunction {
    pub name: String,
    pub params: Vec<PyParam>,
    pub returns: Option<PyType>,
    pub docstring: Option<String>,
    pub body: Vec<PyStmt>,
    pub is_async: bool,
}

/// Class definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PyClass {
    pub name: String,
    pub bases: Vec<String>,
    pub docstring: Option<String>,
    pub body: Vec<PyStmt>,
}

/// Import statement: `from module import a, b` or `import module`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PyImport {
    pub module: String,
    pub names: Vec<String>,
}

impl PyImport {
    pub fn from(module: impl Into<String>, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            module: module.into(),
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn module(module: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            names: Vec::new(),
        }
    }
}

/// Top-level module item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PyItem {
    Class(PyClass),
    Function(PyFunction),
    Stmt(PyStmt),
}

/// Complete Python module
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PyModule {
    pub imports: Vec<PyImport>,
    pub body: Vec<PyItem>,
    /// Statements emitted after the body (late imports, model rebuilds)
    pub trailer: Vec<PyStmt>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_typing_and_named() {
        let ty = PyType::optional(PyType::list(PyType::Union(vec![
            PyType::Named("Cat".into()),
            PyType::dict(PyType::DateTime),
            PyType::Named("Cat".into()),
        ])));

        let mut typing = BTreeSet::new();
        ty.collect_typing(&mut typing);
        assert_eq!(typing.into_iter().collect::<Vec<_>>(), ["Dict", "List", "Optional", "Union"]);

        let mut datetime = BTreeSet::new();
        ty.collect_datetime(&mut datetime);
        assert!(datetime.contains("datetime"));

        let mut named = Vec::new();
        ty.collect_named(&mut named);
        assert_eq!(named, ["Cat"]);
    }

    #[test]
    fn test_optional_is_idempotent() {
        let once = PyType::optional(PyType::Builtin("int"));
        assert_eq!(PyType::optional(once.clone()), once);
        assert_eq!(PyType::optional(PyType::Any), PyType::Any);
    }
}
