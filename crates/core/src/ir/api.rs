//! API-level IR for normalized operations.
//!
//! Everything OpenAPI-specific about an operation (reference lookup,
//! parameter merging, content negotiation, security) is settled here, so
//! code generation only ever sees resolved [`TypeId`]s and plain values.

use crate::error::Diagnostic;

use super::types::{Literal, TypeGraph, TypeId};

/// HTTP method, in path item declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Put,
    Post,
    Delete,
    Options,
    Head,
    Patch,
    Trace,
}

impl HttpMethod {
    pub const ALL: [HttpMethod; 8] = [
        HttpMethod::Get,
        HttpMethod::Put,
        HttpMethod::Post,
        HttpMethod::Delete,
        HttpMethod::Options,
        HttpMethod::Head,
        HttpMethod::Patch,
        HttpMethod::Trace,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Put => "PUT",
            HttpMethod::Post => "POST",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Head => "HEAD",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Trace => "TRACE",
        }
    }

    pub fn lower(&self) -> &'static str {
        match self {
            HttpMethod::Get => "get",
            HttpMethod::Put => "put",
            HttpMethod::Post => "post",
            HttpMethod::Delete => "delete",
            HttpMethod::Options => "options",
            HttpMethod::Head => "head",
            HttpMethod::Patch => "patch",
            HttpMethod::Trace => "trace",
        }
    }
}

/// Where a parameter is sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamLocation {
    Path,
    Query,
    Header,
}

/// Single parameter definition
#[derive(Debug, Clone)]
pub struct ParamIR {
    /// Python-safe identifier
    pub name: String,
    /// Original name from the document (for URL and header building)
    pub original_name: String,
    pub location: ParamLocation,
    pub ty: TypeId,
    pub required: bool,
    pub default: Option<Literal>,
    pub description: Option<String>,
}

/// How a request body is put on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyEncoding {
    Json,
    Form,
    Multipart,
    Raw,
}

impl BodyEncoding {
    pub fn from_media_type(media_type: &str) -> Self {
        let essence = media_type.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
        if essence == "application/json" || essence.ends_with("+json") {
            BodyEncoding::Json
        } else if essence == "application/x-www-form-urlencoded" {
            BodyEncoding::Form
        } else if essence.starts_with("multipart/") {
            BodyEncoding::Multipart
        } else {
            BodyEncoding::Raw
        }
    }
}

/// Request body
#[derive(Debug, Clone)]
pub struct BodyIR {
    pub ty: TypeId,
    pub media_type: String,
    pub encoding: BodyEncoding,
    pub required: bool,
    pub description: Option<String>,
}

/// What a response carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseContent {
    Json,
    Text,
    Bytes,
    /// No body is documented.
    Empty,
}

impl ResponseContent {
    pub fn from_media_type(media_type: &str) -> Self {
        let essence = media_type.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
        if essence == "application/json" || essence.ends_with("+json") || essence == "*/*" {
            ResponseContent::Json
        } else if essence.starts_with("text/") {
            ResponseContent::Text
        } else {
            ResponseContent::Bytes
        }
    }
}

/// One documented response.
#[derive(Debug, Clone)]
pub struct ResponseIR {
    /// Status key as written (`200`, `2XX`, `default`).
    pub status: String,
    pub description: Option<String>,
    pub content: ResponseContent,
    /// Payload type for JSON content.
    pub ty: Option<TypeId>,
}

/// The value a generated function hands back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReturnIR {
    pub content: ResponseContent,
    pub ty: Option<TypeId>,
}

impl ReturnIR {
    pub const NONE: ReturnIR = ReturnIR {
        content: ResponseContent::Empty,
        ty: None,
    };
}

/// Credentials attached to a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthIR {
    /// `Authorization: Bearer <access_token>` when a token is set.
    Bearer,
    /// API key sent in the named header.
    HeaderKey(String),
    /// API key sent as the named query parameter.
    QueryKey(String),
    None,
}

/// Normalized API operation
#[derive(Debug, Clone)]
pub struct OperationIR {
    /// Python function name (e.g., "get_pet_by_id")
    pub name: String,
    pub method: HttpMethod,
    /// URL path (e.g., "/pets/{petId}")
    pub path: String,
    /// Service group stem (snake_case first tag, or `default`)
    pub group: String,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub deprecated: bool,
    /// Parameters in declaration order, path-level first.
    pub params: Vec<ParamIR>,
    pub body: Option<BodyIR>,
    pub responses: Vec<ResponseIR>,
    pub returns: ReturnIR,
    /// Declared numeric 2xx statuses; empty means any 2xx is accepted.
    pub success_statuses: Vec<u16>,
    pub auth: AuthIR,
}

impl OperationIR {
    /// `GET /pets/{id}`, used in logs and diagnostics.
    pub fn location(&self) -> String {
        format!("{} {}", self.method.as_str(), self.path)
    }
}

/// Complete normalized API
#[derive(Debug, Clone)]
pub struct ApiIR {
    pub title: String,
    pub version: String,
    /// First server URL declared by the document.
    pub server_url: Option<String>,
    pub types: TypeGraph,
    pub operations: Vec<OperationIR>,
    pub diagnostics: Vec<Diagnostic>,
}
