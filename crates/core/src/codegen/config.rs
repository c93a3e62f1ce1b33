//! The `api_config` unit: client settings and the transport error type.

use crate::backend::BackendConfig;
use crate::ir::utils::py_str;
use crate::python::{Emit, PyClass, PyExpr, PyFunction, PyImport, PyItem, PyModule, PyParam, PyStmt, PyType};

/// Name of the config unit inside the generated package.
pub const CONFIG_UNIT: &str = "api_config";

/// Request timeout, in seconds, when the caller does not set one.
const DEFAULT_TIMEOUT: &str = "30.0";

/// Source text of the config unit for `backend`, defaulting requests to `base_url`.
pub fn emit_config(backend: &BackendConfig, base_url: &str) -> String {
    let mut imports = vec![
        PyImport::from("__future__", ["annotations"]),
        PyImport::from("typing", ["Dict", "Optional", "Union"]),
    ];
    imports.extend(backend.config_imports.iter().map(|module| PyImport::module(*module)));
    imports.push(PyImport::from("pydantic", ["BaseModel", "ConfigDict", "Field"]));

    PyModule {
        imports,
        body: vec![
            PyItem::Class(config_class(backend, base_url)),
            PyItem::Class(exception_class()),
        ],
        trailer: Vec::new(),
    }
    .emit()
}

fn field(name: &str, ty: PyType, default: impl Into<String>) -> PyStmt {
    PyStmt::Assign {
        target: name.to_string(),
        annotation: Some(ty),
        value: Some(PyExpr::Raw(default.into())),
    }
}

fn method(name: &str, params: Vec<PyParam>, returns: PyType, body: Vec<PyStmt>) -> PyStmt {
    let mut all = vec![PyParam {
        name: "self".into(),
        ty: None,
        default: None,
    }];
    all.extend(params);
    PyStmt::Def(Box::new(PyFunction {
        name: name.to_string(),
        params: all,
        returns: Some(returns),
        docstring: None,
        body,
        is_async: false,
    }))
}

fn config_class(backend: &BackendConfig, base_url: &str) -> PyClass {
    let optional_str = || PyType::optional(PyType::Builtin("str"));
    let mut body = vec![
        PyStmt::assign("model_config", PyExpr::raw("ConfigDict(validate_assignment=True)")),
        PyStmt::Blank,
        field("base_path", PyType::Builtin("str"), py_str(base_url)),
        field(
            "verify",
            PyType::Union(vec![PyType::Builtin("bool"), PyType::Builtin("str")]),
            "True",
        ),
        field("timeout", PyType::Builtin("float"), DEFAULT_TIMEOUT),
        field(
            "default_headers",
            PyType::dict(PyType::Builtin("str")),
            "Field(default_factory=dict)",
        ),
        field("access_token", optional_str(), "None"),
        field("api_key", optional_str(), "None"),
        PyStmt::Blank,
        method(
            "get_access_token",
            vec![],
            optional_str(),
            vec![PyStmt::Return(Some(PyExpr::name("self.access_token")))],
        ),
        PyStmt::Blank,
        method(
            "set_access_token",
            vec![PyParam::new("value", optional_str())],
            PyType::Builtin("None"),
            vec![PyStmt::assign("self.access_token", PyExpr::name("value"))],
        ),
    ];

    for helper in backend.config_helpers {
        body.push(PyStmt::Blank);
        body.push(method(
            helper.name,
            vec![],
            PyType::Named(helper.returns.to_string()),
            vec![PyStmt::Raw(helper.body.to_string())],
        ));
    }

    PyClass {
        name: "APIConfig".into(),
        bases: vec!["BaseModel".into()],
        docstring: Some("Settings shared by every generated request function.".into()),
        body,
    }
}

fn exception_class() -> PyClass {
    let init = PyFunction {
        name: "__init__".into(),
        params: vec![
            PyParam {
                name: "self".into(),
                ty: None,
                default: None,
            },
            PyParam::new("status_code", PyType::Builtin("int")),
            PyParam::new("message", PyType::Builtin("str")),
        ],
        returns: Some(PyType::Builtin("None")),
        docstring: None,
        body: vec![
            PyStmt::Expr(PyExpr::raw("super().__init__(f\"{status_code}: {message}\")")),
            PyStmt::assign("self.status_code", PyExpr::name("status_code")),
            PyStmt::assign("self.message", PyExpr::name("message")),
        ],
        is_async: false,
    };

    PyClass {
        name: "HTTPException".into(),
        bases: vec!["Exception".into()],
        docstring: Some("Raised when a response carries an unexpected status code.".into()),
        body: vec![PyStmt::Def(Box::new(init))],
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::backend::{AIOHTTP, HTTPX, REQUESTS};

    #[test]
    fn test_httpx_config_unit() {
        let code = emit_config(&HTTPX, "https://petstore.example/v1");
        assert_eq!(
            code,
            r#"from __future__ import annotations
from typing import Dict, Optional, Union
import httpx
from pydantic import BaseModel, ConfigDict, Field


class APIConfig(BaseModel):
    """Settings shared by every generated request function."""

    model_config = ConfigDict(validate_assignment=True)

    base_path: str = "https://petstore.example/v1"
    verify: Union[bool, str] = True
    timeout: float = 30.0
    default_headers: Dict[str, str] = Field(default_factory=dict)
    access_token: Optional[str] = None
    api_key: Optional[str] = None

    def get_access_token(self) -> Optional[str]:
        return self.access_token

    def set_access_token(self, value: Optional[str]) -> None:
        self.access_token = value

    def client_timeout(self) -> httpx.Timeout:
        return httpx.Timeout(self.timeout)


class HTTPException(Exception):
    """Raised when a response carries an unexpected status code."""

    def __init__(self, status_code: int, message: str) -> None:
        super().__init__(f"{status_code}: {message}")
        self.status_code = status_code
        self.message = message
"#
        );
    }

    #[test]
    fn test_requests_config_has_no_helper() {
        let code = emit_config(&REQUESTS, "http://localhost");
        assert!(!code.contains("import requests"), "got:\n{code}");
        assert!(!code.contains("client_timeout"), "got:\n{code}");
        assert!(code.contains("    base_path: str = \"http://localhost\"\n"), "got:\n{code}");
    }

    #[test]
    fn test_aiohttp_config_helper() {
        let code = emit_config(&AIOHTTP, "http://localhost");
        assert!(code.contains("import aiohttp\n"), "got:\n{code}");
        assert!(
            code.contains(
                "    def client_timeout(self) -> aiohttp.ClientTimeout:\n        return aiohttp.ClientTimeout(total=self.timeout)\n"
            ),
            "got:\n{code}"
        );
    }

    #[test]
    fn test_aiohttp_ssl_context_accepts_ca_bundle() {
        let code = emit_config(&AIOHTTP, "http://localhost");
        assert!(code.contains("import ssl\nimport aiohttp\n"), "got:\n{code}");
        assert!(
            code.contains(
                "    def ssl_context(self) -> Union[bool, ssl.SSLContext]:\n        if isinstance(self.verify, str):\n            return ssl.create_default_context(cafile=self.verify)\n        return self.verify\n"
            ),
            "got:\n{code}"
        );
    }

    #[test]
    fn test_base_url_is_escaped() {
        let code = emit_config(&HTTPX, "http://host/\"quoted\"");
        assert!(code.contains(r#"base_path: str = "http://host/\"quoted\"""#), "got:\n{code}");
    }
}
