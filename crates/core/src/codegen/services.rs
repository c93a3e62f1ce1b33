//! Service unit generation: one module of request functions per group and
//! calling convention.
//!
//! The backend's [`CallTemplate`] decides how a client is opened, how the
//! request is issued and how the response is read; everything else (signature,
//! URL, headers, query, status check, return conversion) is shared.

use std::collections::BTreeSet;

use indexmap::IndexMap;

use crate::backend::{BackendConfig, CallTemplate};
use crate::ir::api::{AuthIR, BodyEncoding, BodyIR, OperationIR, ParamIR, ParamLocation, ResponseContent};
use crate::ir::types::{PrimitiveKind, TypeGraph, TypeId, TypeNode};
use crate::ir::utils::{escape_py_string, py_str, to_snake_case};
use crate::python::{Emit, PyExpr, PyFunction, PyImport, PyItem, PyModule, PyParam, PyStmt, PyType};

use super::types::{default_expr, py_type};

/// Operations sharing a service group, in document order.
#[derive(Debug)]
pub(crate) struct ServiceGroup<'a> {
    pub(crate) name: &'a str,
    pub(crate) operations: Vec<&'a OperationIR>,
}

/// Group operations by service group, in order of first appearance.
pub(crate) fn group_operations(operations: &[OperationIR]) -> Vec<ServiceGroup<'_>> {
    let mut groups: IndexMap<&str, Vec<&OperationIR>> = IndexMap::new();
    for op in operations {
        groups.entry(op.group.as_str()).or_default().push(op);
    }
    groups
        .into_iter()
        .map(|(name, operations)| ServiceGroup { name, operations })
        .collect()
}

/// Unit name for a group under a call template (`pets_service`, `async_pets_service`).
pub fn unit_name(group: &str, template: &CallTemplate) -> String {
    format!("{}{group}_service", template.unit_prefix)
}

/// Source text of one service unit.
pub fn emit_service(
    graph: &TypeGraph,
    backend: &BackendConfig,
    template: &CallTemplate,
    operations: &[&OperationIR],
) -> String {
    let mut imports = UnitImports::default();
    let body = operations
        .iter()
        .map(|&op| {
            let mut builder = FunctionBuilder {
                graph,
                backend,
                template,
                op,
                imports: &mut imports,
            };
            PyItem::Function(builder.build())
        })
        .collect();

    PyModule {
        imports: imports.into_imports(backend),
        body,
        trailer: Vec::new(),
    }
    .emit()
}

#[derive(Default)]
struct UnitImports {
    typing: BTreeSet<&'static str>,
    datetime: BTreeSet<&'static str>,
    models: BTreeSet<String>,
    type_adapter: bool,
}

impl UnitImports {
    fn add_type(&mut self, ty: &PyType) {
        ty.collect_typing(&mut self.typing);
        ty.collect_datetime(&mut self.datetime);
        let mut named = Vec::new();
        ty.collect_named(&mut named);
        self.models.extend(named);
    }

    fn into_imports(self, backend: &BackendConfig) -> Vec<PyImport> {
        let mut imports = vec![PyImport::from("__future__", ["annotations"])];
        if !self.typing.is_empty() {
            imports.push(PyImport::from("typing", self.typing));
        }
        if !self.datetime.is_empty() {
            imports.push(PyImport::from("datetime", self.datetime));
        }
        if self.type_adapter {
            imports.push(PyImport::from("pydantic", ["TypeAdapter"]));
        }
        imports.extend(backend.imports.iter().map(|module| PyImport::module(*module)));
        imports.push(PyImport::from("..api_config", ["APIConfig", "HTTPException"]));
        if !self.models.is_empty() {
            imports.push(PyImport::from("..models", self.models));
        }
        imports
    }
}

struct FunctionBuilder<'a, 'b> {
    graph: &'a TypeGraph,
    backend: &'a BackendConfig,
    template: &'a CallTemplate,
    op: &'a OperationIR,
    imports: &'b mut UnitImports,
}

impl FunctionBuilder<'_, '_> {
    fn build(&mut self) -> PyFunction {
        let params = self.signature();
        let returns = self.return_type();

        let mut body = vec![
            PyStmt::assign(
                "api_config",
                PyExpr::raw("api_config_override if api_config_override else APIConfig()"),
            ),
            PyStmt::Blank,
            PyStmt::assign("base_path", PyExpr::raw("api_config.base_path")),
            PyStmt::assign("path", self.path_expr()),
        ];
        body.extend(self.headers());
        body.extend(self.query());
        body.push(PyStmt::Blank);
        body.extend(self.call());

        PyFunction {
            name: self.op.name.clone(),
            params,
            returns: Some(returns),
            docstring: self.docstring(),
            body,
            is_async: self.template.is_async(),
        }
    }

    // ===== Signature =====

    fn signature(&mut self) -> Vec<PyParam> {
        let op = self.op;
        let mut params = Vec::new();

        let required = |p: &&ParamIR| p.required;
        params.extend(
            op.params
                .iter()
                .filter(|p| p.location == ParamLocation::Path)
                .filter(required)
                .map(|p| self.required_param(p)),
        );
        params.extend(
            op.params
                .iter()
                .filter(|p| p.location != ParamLocation::Path)
                .filter(required)
                .map(|p| self.required_param(p)),
        );

        if let Some(body) = &op.body {
            let ty = py_type(self.graph, body.ty);
            let param = if body.required {
                PyParam::new("data", ty)
            } else {
                PyParam::new("data", PyType::optional(ty)).with_default("None")
            };
            self.add_param_type(&param);
            // A required body sits with the required params, an optional one leads the optional params.
            params.push(param);
        }

        for p in op.params.iter().filter(|p| !p.required) {
            let param = self.optional_param(p);
            params.push(param);
        }

        let config = PyParam::new("api_config_override", PyType::optional(PyType::Named("APIConfig".into())))
            .with_default("None");
        self.imports.typing.insert("Optional");
        params.push(config);
        params
    }

    fn add_param_type(&mut self, param: &PyParam) {
        if let Some(ty) = &param.ty {
            self.imports.add_type(ty);
        }
    }

    fn required_param(&mut self, p: &ParamIR) -> PyParam {
        let param = PyParam::new(&p.name, py_type(self.graph, p.ty));
        self.add_param_type(&param);
        param
    }

    fn optional_param(&mut self, p: &ParamIR) -> PyParam {
        let default = match &p.default {
            Some(value) => {
                let (expr, enum_ref) = default_expr(self.graph, p.ty, value);
                if let Some(enum_ref) = enum_ref {
                    self.imports.models.insert(enum_ref);
                }
                expr
            }
            None => "None".to_string(),
        };
        let param = PyParam::new(&p.name, PyType::optional(py_type(self.graph, p.ty))).with_default(default);
        self.add_param_type(&param);
        param
    }

    fn docstring(&self) -> Option<String> {
        let op = self.op;
        let mut parts = Vec::new();
        if op.deprecated {
            parts.push("Deprecated.".to_string());
        }
        parts.extend(op.summary.iter().map(|s| s.trim().to_string()));
        if let Some(description) = &op.description
            && op.summary.as_deref().map(str::trim) != Some(description.trim())
        {
            parts.push(description.trim().to_string());
        }
        parts.retain(|p| !p.is_empty());
        (!parts.is_empty()).then(|| parts.join("\n\n"))
    }

    // ===== Request =====

    /// The path template as an f-string, placeholders bound to parameters.
    fn path_expr(&self) -> PyExpr {
        let mut inner = String::new();
        let mut bound = false;
        let mut rest = self.op.path.as_str();
        while let Some(open) = rest.find('{') {
            let Some(close) = rest[open..].find('}').map(|i| open + i) else {
                break;
            };
            inner.push_str(&escape_fstring_text(&rest[..open]));
            let placeholder = &rest[open + 1..close];
            match self.path_param(placeholder) {
                Some(param) => {
                    bound = true;
                    inner.push_str(&format!("{{{}}}", param.name));
                }
                None => inner.push_str(&format!("{{{{{}}}}}", escape_py_string(placeholder))),
            }
            rest = &rest[close + 1..];
        }
        inner.push_str(&escape_fstring_text(rest));

        if bound {
            PyExpr::FString(inner)
        } else {
            PyExpr::Str(self.op.path.clone())
        }
    }

    /// Path parameter for a placeholder: exact name first, then snake_case equivalence.
    fn path_param(&self, placeholder: &str) -> Option<&ParamIR> {
        let path_params = || self.op.params.iter().filter(|p| p.location == ParamLocation::Path);
        path_params().find(|p| p.original_name == placeholder).or_else(|| {
            let wanted = to_snake_case(placeholder);
            path_params().find(|p| to_snake_case(&p.original_name) == wanted || p.name == wanted)
        })
    }

    fn headers(&mut self) -> Vec<PyStmt> {
        let op = self.op;
        let accept = match op.returns.content {
            ResponseContent::Json | ResponseContent::Empty => "application/json",
            ResponseContent::Text | ResponseContent::Bytes => "*/*",
        };
        let mut entries = vec![(PyExpr::Str("Accept".into()), PyExpr::Str(accept.into()))];
        if let Some(body) = &op.body
            && matches!(body.encoding, BodyEncoding::Json | BodyEncoding::Raw)
        {
            entries.push((PyExpr::Str("Content-Type".into()), PyExpr::Str(body.media_type.clone())));
        }

        let mut stmts = vec![
            PyStmt::assign("headers", PyExpr::Dict(entries)),
            PyStmt::Expr(PyExpr::raw("headers.update(api_config.default_headers)")),
        ];

        match &op.auth {
            AuthIR::Bearer => stmts.push(PyStmt::block(
                "if api_config.get_access_token() is not None",
                vec![PyStmt::Raw(
                    "headers[\"Authorization\"] = f\"Bearer {api_config.get_access_token()}\"".into(),
                )],
            )),
            AuthIR::HeaderKey(name) => stmts.push(PyStmt::block(
                "if api_config.api_key is not None",
                vec![PyStmt::Raw(format!("headers[{}] = api_config.api_key", py_str(name)))],
            )),
            AuthIR::QueryKey(_) | AuthIR::None => {}
        }

        for p in op.params.iter().filter(|p| p.location == ParamLocation::Header) {
            let set = PyStmt::Raw(format!(
                "headers[{}] = str({})",
                py_str(&p.original_name),
                self.wire_value(p, true)
            ));
            if p.required {
                stmts.push(set);
            } else {
                stmts.push(PyStmt::block(format!("if {} is not None", p.name), vec![set]));
            }
        }
        stmts
    }

    fn query(&mut self) -> Vec<PyStmt> {
        let entries: Vec<_> = self
            .op
            .params
            .iter()
            .filter(|p| p.location == ParamLocation::Query)
            .map(|p| (PyExpr::Str(p.original_name.clone()), PyExpr::raw(self.wire_value(p, p.required))))
            .collect();
        self.imports.typing.extend(["Any", "Dict"]);

        let has_optional = self
            .op
            .params
            .iter()
            .any(|p| p.location == ParamLocation::Query && !p.required);
        let mut stmts = vec![PyStmt::Assign {
            target: "query_params".into(),
            annotation: Some(PyType::dict(PyType::Any)),
            value: Some(PyExpr::Dict(entries)),
        }];
        if has_optional {
            stmts.push(PyStmt::assign(
                "query_params",
                PyExpr::raw("{key: value for key, value in query_params.items() if value is not None}"),
            ));
        }
        if let AuthIR::QueryKey(name) = &self.op.auth {
            stmts.push(PyStmt::block(
                "if api_config.api_key is not None",
                vec![PyStmt::Raw(format!("query_params[{}] = api_config.api_key", py_str(name)))],
            ));
        }
        stmts
    }

    /// How a parameter value goes on the wire; enums send their value, dates their ISO form.
    ///
    /// Bool query values become `"true"`/`"false"` for templates that cannot send bools.
    fn wire_value(&self, p: &ParamIR, present: bool) -> String {
        let target = self.graph.resolve_alias(self.graph.strip_null(p.ty));
        let name = &p.name;
        let value = match self.graph.node(target) {
            TypeNode::Enum(_) if self.graph.decl(target).is_some() => format!("{name}.value"),
            TypeNode::Primitive(PrimitiveKind::DateTime | PrimitiveKind::Date) => format!("{name}.isoformat()"),
            TypeNode::Primitive(PrimitiveKind::Bool)
                if p.location == ParamLocation::Query && self.template.query_bools_as_text =>
            {
                format!("(\"true\" if {name} else \"false\")")
            }
            _ => return name.clone(),
        };
        if present && !self.graph.is_nullable(p.ty) {
            value
        } else {
            format!("{value} if {name} is not None else None")
        }
    }

    fn request_args(&mut self) -> String {
        let url = if self.backend.absolute_url { "base_path + path" } else { "path" };
        let mut args = vec![
            py_str(self.op.method.as_str()),
            url.to_string(),
            "headers=headers".to_string(),
            "params=query_params".to_string(),
        ];
        if let Some(body) = &self.op.body {
            let keyword = self.template.body_keywords.for_encoding(body.encoding);
            args.push(format!("{keyword}={}", self.body_value(body)));
        }
        args.extend(self.template.extra_args.iter().map(|(key, value)| format!("{key}={value}")));
        args.join(", ")
    }

    /// Serialized request body.
    fn body_value(&mut self, body: &BodyIR) -> String {
        let dump = match body.encoding {
            BodyEncoding::Json | BodyEncoding::Form => "model_dump(mode=\"json\", by_alias=True, exclude_none=True)",
            BodyEncoding::Multipart => "model_dump(by_alias=True, exclude_none=True)",
            BodyEncoding::Raw => return "data".to_string(),
        };
        if self.model_name(body.ty).is_some() {
            if body.required && !self.graph.is_nullable(body.ty) {
                format!("data.{dump}")
            } else {
                format!("data.{dump} if data is not None else None")
            }
        } else if body.encoding == BodyEncoding::Json && self.is_typed(body.ty) {
            let ty = py_type(self.graph, body.ty);
            let ty = if body.required { ty } else { PyType::optional(ty) };
            format!("{}.dump_python(data, mode=\"json\", by_alias=True)", self.adapter(&ty))
        } else {
            "data".to_string()
        }
    }

    // ===== Response =====

    fn call(&mut self) -> Vec<PyStmt> {
        let template = self.template;
        let request = template.render_request(&self.request_args());

        let mut handling = self.status_check();
        handling.extend(self.read_body());

        let (session_body, after) = if template.request_opens_block {
            let keyword = if template.is_async() { "async with" } else { "with" };
            (vec![PyStmt::block(format!("{keyword} {request} as response"), handling)], Vec::new())
        } else if template.response_in_session {
            let mut body = vec![PyStmt::assign("response", PyExpr::raw(request)), PyStmt::Blank];
            body.extend(handling);
            (body, Vec::new())
        } else {
            (vec![PyStmt::assign("response", PyExpr::raw(request))], handling)
        };

        let mut stmts = match template.session {
            Some(session) => vec![PyStmt::block(session, session_body)],
            None => session_body,
        };
        if !after.is_empty() {
            stmts.push(PyStmt::Blank);
            stmts.extend(after);
        }
        stmts.push(self.return_stmt());
        stmts
    }

    fn status_check(&self) -> Vec<PyStmt> {
        let status = self.template.status;
        let condition = match self.op.success_statuses.as_slice() {
            [] => format!("if not 200 <= {status} < 300"),
            [code] => format!("if {status} != {code}"),
            codes => {
                let codes: Vec<String> = codes.iter().map(u16::to_string).collect();
                format!("if {status} not in ({})", codes.join(", "))
            }
        };
        let message = format!("{} failed with status code: {{{status}}}", self.op.name);
        vec![PyStmt::block(
            condition,
            vec![PyStmt::Raise(PyExpr::call(
                "HTTPException",
                vec![PyExpr::raw(status), PyExpr::FString(message)],
            ))],
        )]
    }

    fn read_body(&self) -> Vec<PyStmt> {
        let expr = match self.op.returns.content {
            ResponseContent::Json => self.template.json,
            ResponseContent::Text => self.template.text,
            ResponseContent::Bytes => self.template.bytes,
            ResponseContent::Empty => return Vec::new(),
        };
        vec![PyStmt::Blank, PyStmt::assign("body", PyExpr::raw(expr))]
    }

    fn return_type(&mut self) -> PyType {
        let returns = self.op.returns;
        let ty = match (returns.content, returns.ty) {
            (ResponseContent::Empty, _) => PyType::Builtin("None"),
            (ResponseContent::Text, _) => PyType::Builtin("str"),
            (ResponseContent::Bytes, _) => PyType::Builtin("bytes"),
            (ResponseContent::Json, Some(ty)) => py_type(self.graph, ty),
            (ResponseContent::Json, None) => PyType::Any,
        };
        self.imports.add_type(&ty);
        ty
    }

    fn return_stmt(&mut self) -> PyStmt {
        let returns = self.op.returns;
        let expr = match (returns.content, returns.ty) {
            (ResponseContent::Empty, _) => return PyStmt::Return(None),
            (ResponseContent::Json, Some(ty)) => self.unwrap_json(ty),
            _ => "body".to_string(),
        };
        PyStmt::Return(Some(PyExpr::Raw(expr)))
    }

    /// Conversion of the decoded JSON payload into the declared return type.
    fn unwrap_json(&mut self, ty: TypeId) -> String {
        let graph = self.graph;
        if let Some(model) = self.model_name(ty) {
            return if graph.is_nullable(ty) {
                format!("{model}.model_validate(body) if body is not None else None")
            } else {
                format!("{model}.model_validate(body)")
            };
        }
        if let TypeNode::Array(item) = graph.node(ty)
            && let Some(model) = self.model_name(*item)
            && !graph.is_nullable(*item)
        {
            return format!("[{model}.model_validate(item) for item in body]");
        }
        if !self.is_typed(ty) {
            return "body".to_string();
        }
        let annotation = py_type(graph, ty);
        format!("{}.validate_python(body)", self.adapter(&annotation))
    }

    // ===== Helpers =====

    /// The pydantic model a type refers to, looking through nullability and aliases.
    fn model_name(&self, ty: TypeId) -> Option<String> {
        let id = self.graph.strip_null(ty);
        let decl = self.graph.decl(id)?;
        matches!(self.graph.node(self.graph.resolve_alias(id)), TypeNode::Object { .. }).then(|| decl.name.clone())
    }

    /// Whether values of `ty` need validation rather than passing through.
    fn is_typed(&self, ty: TypeId) -> bool {
        !matches!(py_type(self.graph, ty), PyType::Any)
    }

    fn adapter(&mut self, ty: &PyType) -> String {
        self.imports.type_adapter = true;
        self.imports.add_type(ty);
        format!("TypeAdapter({})", ty.emit())
    }
}

/// Escape literal path text for use inside an f-string.
fn escape_fstring_text(text: &str) -> String {
    escape_py_string(text).replace('{', "{{").replace('}', "}}")
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::backend::{AIOHTTP, HTTPX, REQUESTS};
    use crate::ir::api::ApiIR;
    use crate::ir::normalize_spec;
    use crate::spec::SpecModel;

    const PET_API: &str = r##"{
        "openapi": "3.0.0",
        "info": {"title": "Pets", "version": "1"},
        "paths": {
            "/pets/{id}": {
                "get": {
                    "operationId": "getPet",
                    "tags": ["pets"],
                    "parameters": [{"name": "id", "in": "path", "required": true, "schema": {"type": "integer"}}],
                    "responses": {
                        "200": {
                            "description": "ok",
                            "content": {"application/json": {"schema": {"$ref": "#/components/schemas/Pet"}}}
                        }
                    }
                }
            }
        },
        "components": {"schemas": {
            "Pet": {
                "type": "object",
                "required": ["id"],
                "properties": {"id": {"type": "integer"}, "name": {"type": "string"}}
            }
        }}
    }"##;

    fn api(json: &str) -> ApiIR {
        normalize_spec(&SpecModel::from_json(json).unwrap()).unwrap()
    }

    fn emit_all(api: &ApiIR, backend: &BackendConfig, template: usize) -> String {
        let ops: Vec<&OperationIR> = api.operations.iter().collect();
        emit_service(&api.types, backend, &backend.templates[template], &ops)
    }

    // ===== Backends =====

    #[test]
    fn test_blocking_httpx_unit() {
        let api = api(PET_API);
        let code = emit_all(&api, &HTTPX, 0);

        assert!(
            code.starts_with(
                "from __future__ import annotations\nfrom typing import Any, Dict, Optional\nimport httpx\nfrom ..api_config import APIConfig, HTTPException\nfrom ..models import Pet\n\n\n"
            ),
            "got:\n{code}"
        );
        assert!(
            code.contains("def get_pet(id: int, api_config_override: Optional[APIConfig] = None) -> Pet:\n"),
            "got:\n{code}"
        );
        assert!(code.contains("    path = f\"/pets/{id}\"\n"), "got:\n{code}");
        assert!(code.contains("    query_params: Dict[str, Any] = {}\n"), "got:\n{code}");
        assert!(
            code.contains(
                "    with httpx.Client(base_url=base_path, verify=api_config.verify, timeout=api_config.client_timeout()) as client:\n        response = client.request(\"GET\", path, headers=headers, params=query_params)\n\n    if response.status_code != 200:\n"
            ),
            "got:\n{code}"
        );
        assert!(
            code.ends_with("    body = response.json()\n    return Pet.model_validate(body)\n"),
            "got:\n{code}"
        );
    }

    #[test]
    fn test_async_httpx_unit() {
        let api = api(PET_API);
        let code = emit_all(&api, &HTTPX, 1);
        assert!(code.contains("async def get_pet("), "got:\n{code}");
        assert!(code.contains("    async with httpx.AsyncClient("), "got:\n{code}");
        assert!(code.contains("        response = await client.request(\"GET\", path,"), "got:\n{code}");
    }

    #[test]
    fn test_aiohttp_reads_inside_session() {
        let api = api(PET_API);
        let code = emit_all(&api, &AIOHTTP, 0);
        assert!(
            code.contains(
                "    async with aiohttp.ClientSession(timeout=api_config.client_timeout()) as session:\n        async with session.request(\"GET\", base_path + path, headers=headers, params=query_params, ssl=api_config.ssl_context()) as response:\n            if response.status != 200:\n"
            ),
            "got:\n{code}"
        );
        assert!(
            code.ends_with("            body = await response.json()\n    return Pet.model_validate(body)\n"),
            "got:\n{code}"
        );
    }

    #[test]
    fn test_requests_passes_absolute_url() {
        let api = api(PET_API);
        let code = emit_all(&api, &REQUESTS, 0);
        assert!(code.contains("import requests\n"), "got:\n{code}");
        assert!(
            code.contains(
                "    response = requests.request(\"GET\", base_path + path, headers=headers, params=query_params, verify=api_config.verify, timeout=api_config.timeout)\n"
            ),
            "got:\n{code}"
        );
        assert!(
            code.contains("raise HTTPException(response.status_code, f\"get_pet failed with status code: {response.status_code}\")"),
            "got:\n{code}"
        );
    }

    #[test]
    fn test_aiohttp_sends_bool_query_as_text() {
        let api = api(
            r##"{
                "openapi": "3.0.0",
                "info": {"title": "T", "version": "1"},
                "paths": {
                    "/pets": {
                        "get": {
                            "operationId": "listPets",
                            "parameters": [
                                {"name": "archived", "in": "query", "required": true, "schema": {"type": "boolean"}},
                                {"name": "verbose", "in": "query", "schema": {"type": "boolean"}}
                            ],
                            "responses": {"204": {"description": "done"}}
                        }
                    }
                }
            }"##,
        );
        let code = emit_all(&api, &AIOHTTP, 0);
        assert!(
            code.contains(
                "{\"archived\": (\"true\" if archived else \"false\"), \"verbose\": (\"true\" if verbose else \"false\") if verbose is not None else None}"
            ),
            "got:\n{code}"
        );

        let blocking = emit_all(&api, &HTTPX, 0);
        assert!(
            blocking.contains("{\"archived\": archived, \"verbose\": verbose}"),
            "got:\n{blocking}"
        );
    }

    // ===== Signatures =====

    #[test]
    fn test_parameter_order() {
        let api = api(
            r##"{
                "openapi": "3.0.0",
                "info": {"title": "T", "version": "1"},
                "paths": {
                    "/items/{itemId}": {
                        "put": {
                            "operationId": "updateItem",
                            "parameters": [
                                {"name": "limit", "in": "query", "schema": {"type": "integer", "default": 20}},
                                {"name": "X-Trace", "in": "header", "required": true, "schema": {"type": "string"}},
                                {"name": "itemId", "in": "path", "required": true, "schema": {"type": "string"}}
                            ],
                            "requestBody": {
                                "content": {"application/json": {"schema": {"type": "object", "properties": {"a": {"type": "string"}}}}}
                            },
                            "responses": {"204": {"description": "done"}}
                        }
                    }
                }
            }"##,
        );
        let code = emit_all(&api, &HTTPX, 0);
        assert!(
            code.contains(
                "def update_item(\n    item_id: str,\n    x_trace: str,\n    data: Optional[UpdateItemRequest] = None,\n    limit: Optional[int] = 20,\n    api_config_override: Optional[APIConfig] = None,\n) -> None:\n"
            ),
            "got:\n{code}"
        );
        assert!(code.contains("    path = f\"/items/{item_id}\"\n"), "got:\n{code}");
        assert!(code.contains("    headers[\"X-Trace\"] = str(x_trace)\n"), "got:\n{code}");
        assert!(
            code.contains("{\"Accept\": \"application/json\", \"Content-Type\": \"application/json\"}"),
            "got:\n{code}"
        );
        assert!(
            code.contains("json=data.model_dump(mode=\"json\", by_alias=True, exclude_none=True) if data is not None else None"),
            "got:\n{code}"
        );
        assert!(
            code.contains("query_params = {key: value for key, value in query_params.items() if value is not None}"),
            "got:\n{code}"
        );
        assert!(code.contains("    if response.status_code != 204:\n"), "got:\n{code}");
        assert!(code.ends_with("    return None\n"), "got:\n{code}");
        assert!(!code.contains("body = "), "got:\n{code}");
    }

    #[test]
    fn test_unbound_placeholder_is_escaped() {
        let api = api(
            r##"{
                "openapi": "3.0.0",
                "info": {"title": "T", "version": "1"},
                "paths": {
                    "/a/{id}/b/{other}": {
                        "get": {
                            "operationId": "getB",
                            "parameters": [{"name": "id", "in": "path", "required": true, "schema": {"type": "integer"}}],
                            "responses": {"200": {"description": "ok"}}
                        }
                    },
                    "/c/{free}": {
                        "get": {"operationId": "getC", "responses": {"200": {"description": "ok"}}}
                    }
                }
            }"##,
        );
        let code = emit_all(&api, &HTTPX, 0);
        assert!(code.contains("    path = f\"/a/{id}/b/{{other}}\"\n"), "got:\n{code}");
        assert!(code.contains("    path = \"/c/{free}\"\n"), "got:\n{code}");
    }

    // ===== Responses =====

    #[test]
    fn test_return_conversions() {
        let api = api(
            r##"{
                "openapi": "3.0.0",
                "info": {"title": "T", "version": "1"},
                "paths": {
                    "/pets": {
                        "get": {
                            "operationId": "listPets",
                            "responses": {"200": {"description": "ok", "content": {"application/json": {
                                "schema": {"type": "array", "items": {"$ref": "#/components/schemas/Pet"}}
                            }}}}
                        },
                        "post": {
                            "operationId": "countPets",
                            "responses": {
                                "200": {"description": "ok", "content": {"application/json": {
                                    "schema": {"type": "object", "additionalProperties": {"type": "integer"}}
                                }}},
                                "201": {"description": "created"}
                            }
                        }
                    },
                    "/pets/raw": {
                        "get": {
                            "operationId": "rawPets",
                            "responses": {"200": {"description": "ok", "content": {"text/plain": {"schema": {"type": "string"}}}}}
                        }
                    }
                },
                "components": {"schemas": {"Pet": {"type": "object", "properties": {"id": {"type": "integer"}}}}}
            }"##,
        );
        let code = emit_all(&api, &HTTPX, 0);
        assert!(code.contains("-> List[Pet]:\n"), "got:\n{code}");
        assert!(code.contains("    return [Pet.model_validate(item) for item in body]\n"), "got:\n{code}");
        assert!(code.contains("-> Dict[str, int]:\n"), "got:\n{code}");
        assert!(code.contains("    return TypeAdapter(Dict[str, int]).validate_python(body)\n"), "got:\n{code}");
        assert!(code.contains("from pydantic import TypeAdapter\n"), "got:\n{code}");
        assert!(code.contains("    if response.status_code not in (200, 201):\n"), "got:\n{code}");
        assert!(code.contains("def raw_pets(api_config_override: Optional[APIConfig] = None) -> str:\n"), "got:\n{code}");
        assert!(code.contains("    body = response.text\n    return body\n"), "got:\n{code}");
    }

    // ===== Auth =====

    #[test]
    fn test_api_key_auth() {
        let api = api(
            r##"{
                "openapi": "3.0.0",
                "info": {"title": "T", "version": "1"},
                "security": [{"key": []}],
                "paths": {
                    "/a": {"get": {"operationId": "a", "responses": {"200": {"description": "ok"}}}},
                    "/b": {"get": {"operationId": "b", "security": [{"query": []}], "responses": {"200": {"description": "ok"}}}},
                    "/c": {"get": {"operationId": "c", "security": [], "responses": {"200": {"description": "ok"}}}}
                },
                "components": {"securitySchemes": {
                    "key": {"type": "apiKey", "in": "header", "name": "X-API-Key"},
                    "query": {"type": "apiKey", "in": "query", "name": "api_key"}
                }}
            }"##,
        );
        let code = emit_all(&api, &HTTPX, 0);
        assert!(code.contains("        headers[\"X-API-Key\"] = api_config.api_key\n"), "got:\n{code}");
        assert!(code.contains("        query_params[\"api_key\"] = api_config.api_key\n"), "got:\n{code}");
        assert!(!code.contains("Authorization"), "got:\n{code}");
    }

    #[test]
    fn test_group_operations_keeps_first_appearance() {
        let api = api(
            r##"{
                "openapi": "3.0.0",
                "info": {"title": "T", "version": "1"},
                "paths": {
                    "/b": {"get": {"operationId": "b1", "tags": ["Beta"], "responses": {"200": {"description": "ok"}}}},
                    "/a": {"get": {"operationId": "a1", "tags": ["alpha"], "responses": {"200": {"description": "ok"}}}},
                    "/c": {
                        "get": {"operationId": "b2", "tags": ["Beta"], "responses": {"200": {"description": "ok"}}},
                        "post": {"operationId": "untagged", "responses": {"200": {"description": "ok"}}}
                    }
                }
            }"##,
        );
        let groups = group_operations(&api.operations);
        let shape: Vec<(&str, Vec<&str>)> = groups
            .iter()
            .map(|g| (g.name, g.operations.iter().map(|op| op.name.as_str()).collect()))
            .collect();
        assert_eq!(
            shape,
            [
                ("beta", vec!["b1", "b2"]),
                ("alpha", vec!["a1"]),
                ("default", vec!["untagged"]),
            ]
        );
        assert_eq!(unit_name("beta", &HTTPX.templates[1]), "async_beta_service");
    }
}
