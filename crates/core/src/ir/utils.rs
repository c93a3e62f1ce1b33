//! Naming and literal helpers shared across resolution and code generation.

use std::collections::HashSet;
use std::sync::LazyLock;

use super::types::Literal;

/// Python keywords (hard and soft) that cannot be used as plain identifiers.
pub static PY_RESERVED_WORDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "False", "None", "True", "and", "as", "assert", "async", "await", "break", "case",
        "class", "continue", "def", "del", "elif", "else", "except", "finally", "for", "from",
        "global", "if", "import", "in", "is", "lambda", "match", "nonlocal", "not", "or", "pass",
        "raise", "return", "try", "type", "while", "with", "yield",
    ]
    .into_iter()
    .collect()
});

/// Attribute names owned by pydantic's `BaseModel` that a field must not shadow.
pub static PYDANTIC_RESERVED_FIELDS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "construct", "copy", "dict", "json", "parse_obj", "parse_raw", "schema", "schema_json",
        "validate", "model_config", "model_fields", "model_computed_fields", "model_construct",
        "model_copy", "model_dump", "model_dump_json", "model_extra", "model_fields_set",
        "model_json_schema", "model_post_init", "model_rebuild", "model_validate",
        "model_validate_json", "model_validate_strings",
    ]
    .into_iter()
    .collect()
});

/// Names generated modules import or define; classes must not shadow them.
pub static RUNTIME_NAMES: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "APIConfig", "HTTPException", "BaseModel", "ConfigDict", "Field", "TypeAdapter", "Enum", "Any",
        "Dict", "List", "Optional", "Union",
    ]
    .into_iter()
    .collect()
});

/// Check whether `name` is already a valid Python identifier (ASCII subset).
pub fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Replace every character that is not valid in an identifier with `_`.
fn replace_invalid(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

/// Split a name into words on separators, case changes and digit boundaries.
fn split_words(name: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let chars: Vec<char> = name.chars().collect();

    for (i, &c) in chars.iter().enumerate() {
        if !c.is_ascii_alphanumeric() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }
        if c.is_ascii_uppercase() && !current.is_empty() {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_ascii_lowercase());
            // "fooBar" -> foo|Bar, "HTTPServer" -> HTTP|Server
            if prev.is_ascii_lowercase() || prev.is_ascii_digit() || (prev.is_ascii_uppercase() && next_is_lower) {
                words.push(std::mem::take(&mut current));
            }
        }
        current.push(c);
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}

/// Convert a string to snake_case.
pub fn to_snake_case(s: &str) -> String {
    split_words(s)
        .iter()
        .map(|w| w.to_ascii_lowercase())
        .collect::<Vec<_>>()
        .join("_")
}

/// Convert a string to PascalCase.
pub fn to_pascal_case(s: &str) -> String {
    split_words(s).iter().map(|w| capitalize_first(w)).collect()
}

/// Capitalize the first letter of a string.
pub fn capitalize_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        None => String::new(),
        Some(first) => first.to_uppercase().chain(chars).collect(),
    }
}

/// Turn an arbitrary string into a snake_case Python identifier.
///
/// Keywords and any name in `taken` get a trailing `_`; leading digits get a `_` prefix.
pub fn sanitize_identifier(name: &str, taken: &HashSet<&str>) -> String {
    let mut result = to_snake_case(name);
    if result.is_empty() {
        result = "value".to_string();
    }
    if result.starts_with(|c: char| c.is_ascii_digit()) {
        result = format!("_{result}");
    }
    while PY_RESERVED_WORDS.contains(result.as_str()) || taken.contains(result.as_str()) {
        result.push('_');
    }
    result
}

/// Turn a schema key into a class (and module) name, keeping its casing.
///
/// Star imports skip names with a leading underscore, so those (and leading
/// digits) get a `Model` prefix instead.
pub fn sanitize_class_name(name: &str) -> String {
    let result = replace_invalid(name);
    let trimmed = result.trim_start_matches('_');
    if trimmed.is_empty() {
        return "Model".to_string();
    }
    let mut result = if trimmed.starts_with(|c: char| c.is_ascii_digit()) || trimmed.len() != result.len() {
        format!("Model{trimmed}")
    } else {
        result
    };
    if PY_RESERVED_WORDS.contains(result.as_str()) {
        result.push('_');
    } else if RUNTIME_NAMES.contains(result.as_str()) {
        result.push_str("Model");
    }
    result
}

/// Turn a JSON property name into a pydantic field name.
///
/// Pydantic treats leading underscores as private attributes, so those (and
/// leading digits) are prefixed with `field_`.
pub fn sanitize_field_name(name: &str) -> String {
    let mut result = if is_identifier(name) && !name.starts_with('_') {
        name.to_string()
    } else {
        let replaced = replace_invalid(name);
        let trimmed = replaced.trim_start_matches('_');
        if trimmed.is_empty() {
            "field".to_string()
        } else if trimmed.starts_with(|c: char| c.is_ascii_digit()) || trimmed.len() != replaced.len() {
            format!("field_{trimmed}")
        } else {
            trimmed.to_string()
        }
    };
    while PY_RESERVED_WORDS.contains(result.as_str()) || PYDANTIC_RESERVED_FIELDS.contains(result.as_str()) {
        result.push('_');
    }
    result
}

/// Member name for an enum value.
pub fn enum_member_name(value: &Literal, index: usize) -> String {
    match value {
        Literal::Str(s) => {
            let upper = replace_invalid(s).to_ascii_uppercase();
            let trimmed = upper.trim_matches('_');
            if trimmed.is_empty() {
                if s.is_empty() { "EMPTY".to_string() } else { format!("VALUE_{index}") }
            } else if trimmed.starts_with(|c: char| c.is_ascii_digit()) {
                format!("VALUE_{trimmed}")
            } else {
                trimmed.to_string()
            }
        }
        Literal::Int(n) if *n < 0 => format!("VALUE_MINUS_{}", n.unsigned_abs()),
        Literal::Int(n) => format!("VALUE_{n}"),
        Literal::Bool(true) => "TRUE".to_string(),
        Literal::Bool(false) => "FALSE".to_string(),
        Literal::Null => "NONE".to_string(),
        Literal::Float(_) | Literal::List(_) | Literal::Map(_) => format!("VALUE_{index}"),
    }
}

/// Escape a string for use inside a double-quoted Python string literal.
pub fn escape_py_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out
}

/// A double-quoted Python string literal.
pub fn py_str(s: &str) -> String {
    format!("\"{}\"", escape_py_string(s))
}

/// Make `base` unique against `taken` by appending `_2`, `_3`, ...
pub fn dedupe(base: String, taken: &HashSet<String>) -> String {
    if !taken.contains(&base) {
        return base;
    }
    let mut n = 2;
    loop {
        let candidate = format!("{base}_{n}");
        if !taken.contains(&candidate) {
            return candidate;
        }
        n += 1;
    }
}
