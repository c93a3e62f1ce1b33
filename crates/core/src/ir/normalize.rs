//! Normalization from the API document to [`ApiIR`].
//!
//! This module handles the operation-side OpenAPI logic:
//! - Parameter, request body and response reference lookup
//! - Parameter merging (operation-level overrides path-level)
//! - Request body content negotiation
//! - Security requirement mapping
//!
//! Schema classification itself lives in the resolver; this module feeds it
//! the schemas found on operations, in document order.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::error::{Diagnostic, DiagnosticKind, GenerateError};
use crate::spec::{MediaType, Operation, Parameter, PathItem, RefOr, RequestBody, Response, Schema, SpecModel};

use super::api::{
    ApiIR, AuthIR, BodyEncoding, BodyIR, HttpMethod, OperationIR, ParamIR, ParamLocation, ResponseContent, ResponseIR,
    ReturnIR,
};
use super::resolve::{NameHint, TypeResolver};
use super::types::{Literal, PrimitiveKind};
use super::utils::{dedupe, sanitize_identifier, to_pascal_case, to_snake_case};

/// Names the generated function bodies bind or import; parameters must not shadow them.
static SERVICE_LOCALS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "api_config_override", "api_config", "base_path", "path", "headers", "query_params", "response",
        "client", "session", "data", "body", "access_token", "httpx", "requests", "aiohttp", "datetime",
        "date", "typing", "self", "str",
    ]
    .into_iter()
    .collect()
});

/// Module-level names of a service unit that a function definition must not rebind.
static SERVICE_GLOBALS: LazyLock<HashSet<&'static str>> = LazyLock::new(|| {
    [
        "annotations", "httpx", "requests", "aiohttp", "datetime", "date", "str", "int", "float", "bool",
        "bytes",
    ]
    .into_iter()
    .collect()
});

/// Normalize an API document into API IR.
pub fn normalize_spec(spec: &SpecModel) -> Result<ApiIR, GenerateError> {
    let mut resolver = TypeResolver::new(spec)?;
    resolver.resolve_components()?;

    // Synthesized names are PascalCase, so only schema-named classes can clash with a function.
    let model_names: Vec<String> = resolver.decl_names().map(str::to_string).collect();
    let mut globals: HashSet<&str> = SERVICE_GLOBALS.iter().copied().collect();
    globals.extend(model_names.iter().map(String::as_str));

    let mut operations = Vec::new();
    let mut owners: HashMap<(String, String), String> = HashMap::new();
    for (path, item) in spec.paths.iter().flatten() {
        for (method, op) in path_operations(item) {
            let op_ir = normalize_operation(&mut resolver, &globals, path, method, item, op)?;
            debug!(operation = %op_ir.location(), name = %op_ir.name, group = %op_ir.group, "Normalized operation.");

            let key = (op_ir.group.clone(), op_ir.name.clone());
            if let Some(first) = owners.get(&key) {
                return Err(GenerateError::IdentifierCollision {
                    kind: "function",
                    name: op_ir.name.clone(),
                    first: first.clone(),
                    second: op_ir.location(),
                });
            }
            owners.insert(key, op_ir.location());
            operations.push(op_ir);
        }
    }

    let (types, diagnostics) = resolver.finish();
    for diagnostic in &diagnostics {
        warn!(kind = %diagnostic.kind, location = %diagnostic.location, "{}", diagnostic.message);
    }

    Ok(ApiIR {
        title: spec.info.title.clone(),
        version: spec.info.version.clone(),
        server_url: spec.server_url(),
        types,
        operations,
        diagnostics,
    })
}

fn path_operations(item: &PathItem) -> impl Iterator<Item = (HttpMethod, &Operation)> {
    let ops = [
        &item.get,
        &item.put,
        &item.post,
        &item.delete,
        &item.options,
        &item.head,
        &item.patch,
        &item.trace,
    ];
    HttpMethod::ALL
        .into_iter()
        .zip(ops)
        .filter_map(|(method, op)| op.as_ref().map(|op| (method, op)))
}

/// Snake_case `operationId`, else `<method>_<path words>`.
fn function_name(method: HttpMethod, path: &str, op: &Operation, globals: &HashSet<&str>) -> String {
    let base = match op.operation_id.as_deref().map(to_snake_case) {
        Some(id) if !id.is_empty() => id,
        _ => {
            let words = to_snake_case(path);
            let words = if words.is_empty() { "root".to_string() } else { words };
            format!("{}_{words}", method.lower())
        }
    };
    sanitize_identifier(&base, globals)
}

fn normalize_operation<'a>(
    resolver: &mut TypeResolver<'a>,
    globals: &HashSet<&str>,
    path: &str,
    method: HttpMethod,
    item: &'a PathItem,
    op: &'a Operation,
) -> Result<OperationIR, GenerateError> {
    let spec = resolver.spec();
    let name = function_name(method, path, op, globals);
    let location = format!("{} {path}", method.as_str());
    let owner = to_pascal_case(&name);
    let group = op
        .tags
        .first()
        .map(|tag| to_snake_case(tag))
        .filter(|tag| !tag.is_empty())
        .unwrap_or_else(|| "default".to_string());

    // Operation-level parameters override path-level ones with the same (name, in).
    let mut merged: IndexMap<(String, String), &'a Parameter> = IndexMap::new();
    for param in item.parameters.iter().chain(&op.parameters) {
        let param = deref_parameter(spec, param, &location)?;
        merged.insert((param.name.clone(), param.location.clone()), param);
    }

    let mut params = Vec::new();
    let mut body = None;
    let mut used_names = HashSet::new();
    for param in merged.into_values() {
        let param_location = match param.location.as_str() {
            "path" => ParamLocation::Path,
            "query" => ParamLocation::Query,
            "header" => ParamLocation::Header,
            "body" => {
                body = Some(swagger_body(resolver, param, &owner, &location)?);
                continue;
            }
            other => {
                resolver.push_diagnostic(Diagnostic {
                    kind: DiagnosticKind::SkippedParameter,
                    location: location.clone(),
                    message: format!("parameter `{}` in `{other}` is not supported and was skipped", param.name),
                });
                continue;
            }
        };

        let hint = NameHint::new(
            format!("{owner}{}", to_pascal_case(&param.name)),
            format!("{location} parameter {}", param.name),
        );
        let schema = param.value_schema();
        let ty = match schema {
            Some(schema) => resolver.resolve_schema(schema, &hint)?,
            None => resolver.primitive(PrimitiveKind::Text),
        };
        let ident = dedupe(sanitize_identifier(&param.name, &SERVICE_LOCALS), &used_names);
        used_names.insert(ident.clone());

        params.push(ParamIR {
            name: ident,
            original_name: param.name.clone(),
            location: param_location,
            ty,
            required: param.required || param_location == ParamLocation::Path,
            default: schema.and_then(|s| s.default.as_ref()).map(Literal::from_json),
            description: param.description.clone(),
        });
    }

    if let Some(request_body) = &op.request_body {
        let request_body = deref_request_body(spec, request_body, &location)?;
        body = request_body_ir(resolver, request_body, &owner, &location)?;
    }

    let (responses, returns, success_statuses) = normalize_responses(resolver, op, &owner, &location)?;
    let auth = normalize_auth(spec, op, &location)?;

    Ok(OperationIR {
        name,
        method,
        path: path.to_string(),
        group,
        summary: op.summary.clone(),
        description: op.description.clone(),
        deprecated: op.deprecated,
        params,
        body,
        responses,
        returns,
        success_statuses,
        auth,
    })
}

fn component_key<'r>(reference: &'r str, kind: &str) -> Option<&'r str> {
    reference
        .strip_prefix("#/components/")
        .and_then(|rest| rest.strip_prefix(kind))
        .and_then(|rest| rest.strip_prefix('/'))
}

fn deref_parameter<'a>(
    spec: &'a SpecModel,
    param: &'a RefOr<Parameter>,
    location: &str,
) -> Result<&'a Parameter, GenerateError> {
    match param {
        RefOr::Item(param) => Ok(param),
        RefOr::Ref(reference) => component_key(&reference.ref_path, "parameters")
            .and_then(|key| spec.components.as_ref()?.parameters.as_ref()?.get(key))
            .ok_or_else(|| GenerateError::unresolved(&reference.ref_path, location)),
    }
}

fn deref_request_body<'a>(
    spec: &'a SpecModel,
    body: &'a RefOr<RequestBody>,
    location: &str,
) -> Result<&'a RequestBody, GenerateError> {
    match body {
        RefOr::Item(body) => Ok(body),
        RefOr::Ref(reference) => component_key(&reference.ref_path, "requestBodies")
            .and_then(|key| spec.components.as_ref()?.request_bodies.as_ref()?.get(key))
            .ok_or_else(|| GenerateError::unresolved(&reference.ref_path, location)),
    }
}

fn deref_response<'a>(
    spec: &'a SpecModel,
    response: &'a RefOr<Response>,
    location: &str,
) -> Result<&'a Response, GenerateError> {
    match response {
        RefOr::Item(response) => Ok(response),
        RefOr::Ref(reference) => component_key(&reference.ref_path, "responses")
            .and_then(|key| spec.components.as_ref()?.responses.as_ref()?.get(key))
            .ok_or_else(|| GenerateError::unresolved(&reference.ref_path, location)),
    }
}

fn swagger_body<'a>(
    resolver: &mut TypeResolver<'a>,
    param: &'a Parameter,
    owner: &str,
    location: &str,
) -> Result<BodyIR, GenerateError> {
    let hint = NameHint::new(format!("{owner}Request"), format!("{location} request body"));
    let ty = match param.value_schema() {
        Some(schema) => resolver.resolve_schema(schema, &hint)?,
        None => resolver.free_form(),
    };
    Ok(BodyIR {
        ty,
        media_type: "application/json".to_string(),
        encoding: BodyEncoding::Json,
        required: param.required,
        description: param.description.clone(),
    })
}

/// A schema that describes a structured payload rather than raw bytes or text.
fn is_structured(schema: &Schema) -> bool {
    schema.ref_path.is_some()
        || schema.properties.is_some()
        || schema.all_of.is_some()
        || schema.one_of.is_some()
        || schema.any_of.is_some()
        || schema.non_null_types().contains(&"object")
}

fn request_body_ir<'a>(
    resolver: &mut TypeResolver<'a>,
    body: &'a RequestBody,
    owner: &str,
    location: &str,
) -> Result<Option<BodyIR>, GenerateError> {
    let Some((media_type, content)) = pick_request_content(&body.content) else {
        return Ok(None);
    };
    if body.content.len() > 1 {
        let declared: Vec<&str> = body.content.keys().map(String::as_str).collect();
        resolver.push_diagnostic(Diagnostic {
            kind: DiagnosticKind::AmbiguousRequestBody,
            location: location.to_string(),
            message: format!("request body declares {}; using `{media_type}`", declared.join(", ")),
        });
    }

    let encoding = BodyEncoding::from_media_type(media_type);
    let hint = NameHint::new(format!("{owner}Request"), format!("{location} request body"));
    let ty = match &content.schema {
        Some(schema) => resolver.resolve_schema(schema, &hint)?,
        None if encoding == BodyEncoding::Json => resolver.free_form(),
        None => resolver.primitive(PrimitiveKind::Binary),
    };
    Ok(Some(BodyIR {
        ty,
        media_type: media_type.to_string(),
        encoding,
        required: body.required,
        description: body.description.clone(),
    }))
}

/// First content type with a structured schema, else the first declared.
fn pick_request_content(content: &IndexMap<String, MediaType>) -> Option<(&str, &MediaType)> {
    content
        .iter()
        .find(|(_, media)| media.schema.as_ref().is_some_and(is_structured))
        .or_else(|| content.first())
        .map(|(media_type, media)| (media_type.as_str(), media))
}

/// JSON content when declared, else the first declared content type.
fn pick_response_content(content: &IndexMap<String, MediaType>) -> Option<(&str, &MediaType)> {
    content
        .iter()
        .find(|(media_type, _)| ResponseContent::from_media_type(media_type) == ResponseContent::Json)
        .or_else(|| content.first())
        .map(|(media_type, media)| (media_type.as_str(), media))
}

fn is_success(status: &str) -> bool {
    status.starts_with('2')
}

fn normalize_responses<'a>(
    resolver: &mut TypeResolver<'a>,
    op: &'a Operation,
    owner: &str,
    location: &str,
) -> Result<(Vec<ResponseIR>, ReturnIR, Vec<u16>), GenerateError> {
    let spec = resolver.spec();
    let mut resolved = Vec::with_capacity(op.responses.len());
    for (status, response) in &op.responses {
        resolved.push((status, deref_response(spec, response, location)?));
    }

    let payload = |response: &'a Response| -> Option<(ResponseContent, Option<&'a Schema>)> {
        if let Some(schema) = &response.schema {
            return Some((ResponseContent::Json, Some(schema)));
        }
        let (media_type, media) = pick_response_content(response.content.as_ref()?)?;
        Some((ResponseContent::from_media_type(media_type), media.schema.as_ref()))
    };

    let primary = resolved
        .iter()
        .find(|(status, response)| is_success(status) && payload(*response).is_some_and(|(_, s)| s.is_some()))
        .or_else(|| resolved.iter().find(|(status, _)| is_success(status)))
        .map(|(status, _)| status.as_str());

    let mut responses = Vec::with_capacity(resolved.len());
    let mut returns = ReturnIR::NONE;
    for (status, response) in &resolved {
        let (content, schema) = payload(*response).unwrap_or((ResponseContent::Empty, None));
        let is_primary = primary == Some(status.as_str());
        let name = if is_primary {
            format!("{owner}Response")
        } else {
            format!("{owner}Response{}", to_pascal_case(status))
        };
        let hint = NameHint::new(name, format!("{location} response {status}"));
        let ty = match schema {
            Some(schema) => Some(resolver.resolve_schema(schema, &hint)?),
            None => None,
        };
        // A text or binary payload is returned as-is; only JSON carries a type.
        let content = match (content, ty) {
            (ResponseContent::Json, None) => ResponseContent::Empty,
            (content, _) => content,
        };
        if is_primary {
            returns = ReturnIR {
                content,
                ty: ty.filter(|_| content == ResponseContent::Json),
            };
        }
        responses.push(ResponseIR {
            status: status.to_string(),
            description: response.description.clone(),
            content,
            ty,
        });
    }

    let success_statuses = responses
        .iter()
        .filter_map(|r| r.status.parse::<u16>().ok())
        .filter(|code| (200..300).contains(code))
        .collect();

    Ok((responses, returns, success_statuses))
}

fn normalize_auth(spec: &SpecModel, op: &Operation, location: &str) -> Result<AuthIR, GenerateError> {
    let Some(requirements) = op.security.as_ref().or(spec.security.as_ref()) else {
        return Ok(AuthIR::Bearer);
    };

    let mut auth = None;
    for requirement in requirements {
        for name in requirement.keys() {
            let scheme = spec
                .security_scheme(name)
                .ok_or_else(|| GenerateError::unresolved(name, format!("security requirement of {location}")))?;
            if auth.is_none() {
                auth = Some(match (scheme.scheme_type.as_str(), scheme.location.as_deref()) {
                    ("apiKey", Some("header")) => AuthIR::HeaderKey(scheme.name.clone().unwrap_or_default()),
                    ("apiKey", Some("query")) => AuthIR::QueryKey(scheme.name.clone().unwrap_or_default()),
                    ("apiKey", _) => AuthIR::None,
                    _ => AuthIR::Bearer,
                });
            }
        }
    }
    Ok(auth.unwrap_or(AuthIR::None))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::ir::types::TypeNode;

    fn normalize(json: &str) -> Result<ApiIR, GenerateError> {
        normalize_spec(&SpecModel::from_json(json).unwrap())
    }

    #[test]
    fn test_operation_order_and_names() {
        let api = normalize(
            r##"{
  "openapi": "3.0.3",
  "info": { "title": "T", "version": "1" },
  "paths": {
    "/pets/{id}": {
      "delete": { "responses": { "204": { "description": "gone" } } },
      "get": { "operationId": "getPetById", "tags": ["Pets"], "responses": { "200": { "description": "ok" } } }
    },
    "/": { "get": { "responses": { "200": { "description": "ok" } } } }
  }
}"##,
        )
        .unwrap();

        let names: Vec<_> = api.operations.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, ["get_pet_by_id", "delete_pets_id", "get_root"]);
        assert_eq!(api.operations[0].group, "pets");
        assert_eq!(api.operations[1].group, "default");
        assert_eq!(api.operations[1].returns, ReturnIR::NONE);
    }

    #[test]
    fn test_function_names_avoid_unit_globals() {
        let api = normalize(
            r##"{
  "openapi": "3.0.3",
  "info": { "title": "T", "version": "1" },
  "paths": {
    "/a": { "get": { "operationId": "requests", "responses": { "200": { "description": "ok" } } } },
    "/b": { "get": { "operationId": "str", "responses": { "200": { "description": "ok" } } } },
    "/c": { "get": { "operationId": "pet", "responses": { "200": { "description": "ok" } } } }
  },
  "components": { "schemas": { "pet": { "type": "object", "properties": { "id": { "type": "integer" } } } } }
}"##,
        )
        .unwrap();

        let names: Vec<_> = api.operations.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, ["requests_", "str_", "pet_"]);
    }

    #[test]
    fn test_parameter_merge_and_sanitizing() {
        let api = normalize(
            r##"{
  "openapi": "3.0.3",
  "info": { "title": "T", "version": "1" },
  "components": { "parameters": {
    "Limit": { "name": "limit", "in": "query", "schema": { "type": "integer", "default": 20 } }
  } },
  "paths": { "/items/{itemId}": {
    "parameters": [
      { "name": "itemId", "in": "path", "schema": { "type": "string" } },
      { "name": "from", "in": "query", "schema": { "type": "string" } }
    ],
    "get": {
      "parameters": [
        { "$ref": "#/components/parameters/Limit" },
        { "name": "from", "in": "query", "required": true, "schema": { "type": "string", "format": "date" } },
        { "name": "session", "in": "cookie", "schema": { "type": "string" } }
      ],
      "responses": { "200": { "description": "ok" } }
    }
  } }
}"##,
        )
        .unwrap();

        let op = &api.operations[0];
        let names: Vec<_> = op.params.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, ["item_id", "from_", "limit"]);
        assert!(op.params[0].required, "path params are always required");
        assert!(op.params[1].required, "operation-level override wins");
        assert_eq!(
            api.types.node(op.params[1].ty),
            &TypeNode::Primitive(PrimitiveKind::Date)
        );
        assert_eq!(op.params[2].default, Some(Literal::Int(20)));
        assert_eq!(api.diagnostics.len(), 1);
        assert_eq!(api.diagnostics[0].kind, DiagnosticKind::SkippedParameter);
    }

    #[test]
    fn test_request_body_prefers_structured_content() {
        let api = normalize(
            r##"{
  "openapi": "3.0.3",
  "info": { "title": "T", "version": "1" },
  "paths": { "/upload": { "post": {
    "operationId": "upload",
    "requestBody": { "required": true, "content": {
      "application/octet-stream": { "schema": { "type": "string", "format": "binary" } },
      "application/json": { "schema": { "type": "object", "properties": { "name": { "type": "string" } } } }
    } },
    "responses": { "201": { "description": "created" } }
  } } }
}"##,
        )
        .unwrap();

        let body = api.operations[0].body.as_ref().unwrap();
        assert_eq!(body.media_type, "application/json");
        assert_eq!(body.encoding, BodyEncoding::Json);
        assert!(body.required);
        assert_eq!(api.types.decl(body.ty).unwrap().name, "UploadRequest");
        assert_eq!(api.diagnostics[0].kind, DiagnosticKind::AmbiguousRequestBody);
        assert_eq!(api.operations[0].success_statuses, [201]);
    }

    #[test]
    fn test_primary_response_and_inline_names() {
        let api = normalize(
            r##"{
  "openapi": "3.0.3",
  "info": { "title": "T", "version": "1" },
  "paths": { "/stats": { "get": {
    "operationId": "getStats",
    "responses": {
      "200": { "description": "ok", "content": { "application/json": {
        "schema": { "type": "object", "properties": { "count": { "type": "integer" } } } } } },
      "404": { "description": "missing", "content": { "application/json": {
        "schema": { "type": "object", "properties": { "error": { "type": "string" } } } } } }
    }
  } } }
}"##,
        )
        .unwrap();

        let op = &api.operations[0];
        let ty = op.returns.ty.unwrap();
        assert_eq!(api.types.decl(ty).unwrap().name, "GetStatsResponse");
        assert_eq!(api.types.decl(op.responses[1].ty.unwrap()).unwrap().name, "GetStatsResponse404");
        assert_eq!(op.success_statuses, [200]);
    }

    #[test]
    fn test_swagger_body_parameter() {
        let api = normalize(
            r##"{
  "swagger": "2.0",
  "info": { "title": "T", "version": "1" },
  "definitions": { "Pet": { "type": "object", "properties": { "name": { "type": "string" } } } },
  "paths": { "/pets": { "post": {
    "operationId": "addPet",
    "parameters": [ { "name": "pet", "in": "body", "required": true, "schema": { "$ref": "#/definitions/Pet" } } ],
    "responses": { "200": { "description": "ok", "schema": { "$ref": "#/definitions/Pet" } } }
  } } }
}"##,
        )
        .unwrap();

        let op = &api.operations[0];
        let pet = api.types.named("Pet").unwrap();
        assert!(op.params.is_empty());
        assert_eq!(op.body.as_ref().unwrap().ty, pet);
        assert_eq!(op.returns.ty, Some(pet));
    }

    #[test]
    fn test_security_mapping() {
        let api = normalize(
            r##"{
  "openapi": "3.0.3",
  "info": { "title": "T", "version": "1" },
  "security": [ { "key": [] } ],
  "components": { "securitySchemes": {
    "key": { "type": "apiKey", "in": "header", "name": "X-API-Key" },
    "token": { "type": "http", "scheme": "bearer" }
  } },
  "paths": {
    "/a": { "get": { "responses": { "200": { "description": "ok" } } } },
    "/b": { "get": { "security": [ { "token": [] } ], "responses": { "200": { "description": "ok" } } } },
    "/c": { "get": { "security": [], "responses": { "200": { "description": "ok" } } } }
  }
}"##,
        )
        .unwrap();

        let auth: Vec<_> = api.operations.iter().map(|o| o.auth.clone()).collect();
        assert_eq!(
            auth,
            [AuthIR::HeaderKey("X-API-Key".to_string()), AuthIR::Bearer, AuthIR::None]
        );
    }

    #[test]
    fn test_undefined_security_scheme_is_unresolved() {
        let err = normalize(
            r##"{
  "openapi": "3.0.3",
  "info": { "title": "T", "version": "1" },
  "paths": { "/a": { "get": { "security": [ { "missing": [] } ], "responses": {} } } }
}"##,
        )
        .unwrap_err();
        assert!(matches!(err, GenerateError::UnresolvedReference { ref reference, .. } if reference == "missing"));
    }

    #[test]
    fn test_duplicate_function_name_in_group() {
        let err = normalize(
            r##"{
  "openapi": "3.0.3",
  "info": { "title": "T", "version": "1" },
  "paths": {
    "/a": { "get": { "operationId": "listThings", "responses": {} } },
    "/b": { "get": { "operationId": "list_things", "responses": {} } }
  }
}"##,
        )
        .unwrap_err();
        match err {
            GenerateError::IdentifierCollision { kind, name, first, second } => {
                assert_eq!(kind, "function");
                assert_eq!(name, "list_things");
                assert_eq!(first, "GET /a");
                assert_eq!(second, "GET /b");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
