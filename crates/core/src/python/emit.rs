//! Python code emission via the Emit trait.
//!
//! Each AST type implements `Emit`; nested statements use `emit_indented`
//! with four spaces per level.

use crate::ir::utils::py_str;

use super::ast::{PyClass, PyExpr, PyFunction, PyImport, PyItem, PyModule, PyParam, PyStmt, PyType};

/// Signatures longer than this are split one parameter per line.
const MAX_SIGNATURE_WIDTH: usize = 88;

/// Trait for emitting Python code from AST nodes.
pub trait Emit {
    /// Convert the AST node to its Python source representation.
    fn emit(&self) -> String;
}

fn indent_str(indent: usize) -> String {
    "    ".repeat(indent)
}

fn join<T: Emit>(items: &[T]) -> String {
    items.iter().map(Emit::emit).collect::<Vec<_>>().join(", ")
}

// =============================================================================
// Types and expressions
// =============================================================================

impl Emit for PyType {
    fn emit(&self) -> String {
        match self {
            PyType::Builtin(name) => (*name).to_string(),
            PyType::Any => "Any".to_string(),
            PyType::DateTime => "datetime".to_string(),
            PyType::Date => "date".to_string(),
            PyType::List(inner) => format!("List[{}]", inner.emit()),
            PyType::Dict(inner) => format!("Dict[str, {}]", inner.emit()),
            PyType::Optional(inner) => format!("Optional[{}]", inner.emit()),
            PyType::Union(variants) => format!("Union[{}]", join(variants)),
            PyType::Named(name) => name.clone(),
            PyType::Forward(name) => format!("\"{name}\""),
        }
    }
}

impl Emit for PyExpr {
    fn emit(&self) -> String {
        match self {
            PyExpr::Name(name) => name.clone(),
            PyExpr::Str(s) => py_str(s),
            PyExpr::FString(inner) => format!("f\"{inner}\""),
            PyExpr::Call { func, args, kwargs } => {
                let mut parts: Vec<String> = args.iter().map(Emit::emit).collect();
                parts.extend(kwargs.iter().map(|(key, value)| format!("{key}={}", value.emit())));
                format!("{}({})", func.emit(), parts.join(", "))
            }
            PyExpr::Dict(entries) => {
                let parts: Vec<_> = entries
                    .iter()
                    .map(|(key, value)| format!("{}: {}", key.emit(), value.emit()))
                    .collect();
                format!("{{{}}}", parts.join(", "))
            }
            PyExpr::Await(inner) => format!("await {}", inner.emit()),
            PyExpr::Raw(code) => code.clone(),
        }
    }
}

impl Emit for PyParam {
    fn emit(&self) -> String {
        let mut out = self.name.clone();
        if let Some(ty) = &self.ty {
            out.push_str(&format!(": {}", ty.emit()));
        }
        if let Some(default) = &self.default {
            out.push_str(&format!(" = {default}"));
        }
        out
    }
}

// =============================================================================
// Statements
// =============================================================================

/// Render a docstring at the given prefix.
fn docstring(text: &str, prefix: &str) -> String {
    let text = text.trim().replace('\\', "\\\\").replace("\"\"\"", "\\\"\\\"\\\"");
    if !text.contains('\n') {
        let pad = if text.ends_with('"') { " " } else { "" };
        return format!("{prefix}\"\"\"{text}{pad}\"\"\"\n");
    }
    let mut out = format!("{prefix}\"\"\"\n");
    for line in text.lines() {
        let line = line.trim_end();
        if line.is_empty() {
            out.push('\n');
        } else {
            out.push_str(&format!("{prefix}{line}\n"));
        }
    }
    out.push_str(&format!("{prefix}\"\"\"\n"));
    out
}

fn emit_body(body: &[PyStmt], indent: usize) -> String {
    if body.is_empty() {
        return format!("{}pass\n", indent_str(indent));
    }
    body.iter().map(|stmt| stmt.emit_indented(indent)).collect()
}

impl Emit for PyStmt {
    fn emit(&self) -> String {
        self.emit_indented(0)
    }
}

impl PyStmt {
    /// Emit with specified indentation level (4 spaces per level)
    pub fn emit_indented(&self, indent: usize) -> String {
        let prefix = indent_str(indent);
        match self {
            PyStmt::Assign {
                target,
                annotation,
                value,
            } => {
                let mut out = format!("{prefix}{target}");
                if let Some(annotation) = annotation {
                    out.push_str(&format!(": {}", annotation.emit()));
                }
                if let Some(value) = value {
                    out.push_str(&format!(" = {}", value.emit()));
                }
                out.push('\n');
                out
            }
            PyStmt::Expr(expr) => format!("{prefix}{}\n", expr.emit()),
            PyStmt::Return(Some(expr)) => format!("{prefix}return {}\n", expr.emit()),
            PyStmt::Return(None) => format!("{prefix}return None\n"),
            PyStmt::Block { header, body } => {
                format!("{prefix}{header}:\n{}", emit_body(body, indent + 1))
            }
            PyStmt::Raise(expr) => format!("{prefix}raise {}\n", expr.emit()),
            PyStmt::Def(function) => function.emit_indented(indent),
            PyStmt::Docstring(text) => docstring(text, &prefix),
            PyStmt::Comment(text) => text.lines().map(|line| format!("{prefix}# {line}\n")).collect(),
            PyStmt::Pass => format!("{prefix}pass\n"),
            PyStmt::Blank => "\n".to_string(),
            PyStmt::Raw(code) => code
                .lines()
                .map(|line| {
                    if line.is_empty() {
                        "\n".to_string()
                    } else {
                        format!("{prefix}{line}\n")
                    }
                })
                .collect(),
        }
    }
}

// =============================================================================
// Declarations
// =============================================================================

impl Emit for PyFunction {
    fn emit(&self) -> String {
        self.emit_indented(0)
    }
}

impl PyFunction {
    pub fn emit_indented(&self, indent: usize) -> String {
        let prefix = indent_str(indent);
        let keyword = if self.is_async { "async def" } else { "def" };
        let returns = self
            .returns
            .as_ref()
            .map(|ty| format!(" -> {}", ty.emit()))
            .unwrap_or_default();

        let one_line = format!("{prefix}{keyword} {}({}){returns}:", self.name, join(&self.params));
        let mut out = if one_line.len() <= MAX_SIGNATURE_WIDTH || self.params.is_empty() {
            format!("{one_line}\n")
        } else {
            let inner = indent_str(indent + 1);
            let mut out = format!("{prefix}{keyword} {}(\n", self.name);
            for param in &self.params {
                out.push_str(&format!("{inner}{},\n", param.emit()));
            }
            out.push_str(&format!("{prefix}){returns}:\n"));
            out
        };

        if let Some(text) = &self.docstring {
            out.push_str(&docstring(text, &indent_str(indent + 1)));
        }
        if self.docstring.is_none() || !self.body.is_empty() {
            out.push_str(&emit_body(&self.body, indent + 1));
        }
        out
    }
}

impl Emit for PyClass {
    fn emit(&self) -> String {
        let mut out = if self.bases.is_empty() {
            format!("class {}:\n", self.name)
        } else {
            format!("class {}({}):\n", self.name, self.bases.join(", "))
        };
        if let Some(text) = &self.docstring {
            out.push_str(&docstring(text, &indent_str(1)));
            if !self.body.is_empty() {
                out.push('\n');
            }
        }
        if self.docstring.is_none() || !self.body.is_empty() {
            out.push_str(&emit_body(&self.body, 1));
        }
        out
    }
}

impl Emit for PyImport {
    fn emit(&self) -> String {
        if self.names.is_empty() {
            format!("import {}\n", self.module)
        } else {
            format!("from {} import {}\n", self.module, self.names.join(", "))
        }
    }
}

impl Emit for PyItem {
    fn emit(&self) -> String {
        match self {
            PyItem::Class(class) => class.emit(),
            PyItem::Function(function) => function.emit(),
            PyItem::Stmt(stmt) => stmt.emit(),
        }
    }
}

impl Emit for PyModule {
    fn emit(&self) -> String {
        let mut output = String::new();

        for import in &self.imports {
            output.push_str(&import.emit());
        }

        let mut previous: Option<&PyItem> = None;
        for item in &self.body {
            let is_decl = |item: &PyItem| matches!(item, PyItem::Class(_) | PyItem::Function(_));
            match previous {
                None if !output.is_empty() => output.push_str(if is_decl(item) { "\n\n" } else { "\n" }),
                Some(prev) if is_decl(prev) || is_decl(item) => output.push_str("\n\n"),
                _ => {}
            }
            output.push_str(&item.emit());
            previous = Some(item);
        }

        if !self.trailer.is_empty() {
            if !output.is_empty() {
                output.push_str("\n\n");
            }
            for stmt in &self.trailer {
                output.push_str(&stmt.emit());
            }
        }

        output
    }
}

// =============================================================================
// Tests
// =============================================================================
