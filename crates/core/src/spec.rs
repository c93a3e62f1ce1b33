//! OpenAPI document structs for serde deserialization.
//!
//! This module defines the subset of the OpenAPI 3.0/3.1 (and Swagger 2.0)
//! object model the generator needs. Every keyed collection is an `IndexMap`
//! so that document order survives into the generated output.

use indexmap::IndexMap;
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::error::SpecError;

/// Root API document.
#[derive(Debug, Clone, Deserialize)]
pub struct SpecModel {
    /// OpenAPI version (`3.0.x` / `3.1.x`).
    pub openapi: Option<String>,
    /// Swagger version (`2.0`).
    pub swagger: Option<String>,
    pub info: Info,
    #[serde(default)]
    pub servers: Vec<Server>,
    /// Swagger 2 host/basePath pair, folded into a server URL when present.
    pub host: Option<String>,
    #[serde(rename = "basePath")]
    pub base_path: Option<String>,
    pub paths: Option<IndexMap<String, PathItem>>,
    pub components: Option<Components>,
    /// Swagger 2 schema section.
    pub definitions: Option<IndexMap<String, Schema>>,
    /// Swagger 2 security schemes.
    #[serde(rename = "securityDefinitions")]
    pub security_definitions: Option<IndexMap<String, SecurityScheme>>,
    /// Document-wide security requirements.
    pub security: Option<Vec<SecurityRequirement>>,
}

/// Document metadata.
#[derive(Debug, Clone, Deserialize)]
pub struct Info {
    pub title: String,
    pub version: String,
    pub description: Option<String>,
}

/// Server entry; only the URL is used.
#[derive(Debug, Clone, Deserialize)]
pub struct Server {
    pub url: String,
}

/// Reusable components.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Components {
    pub schemas: Option<IndexMap<String, Schema>>,
    pub parameters: Option<IndexMap<String, Parameter>>,
    pub request_bodies: Option<IndexMap<String, RequestBody>>,
    pub responses: Option<IndexMap<String, Response>>,
    pub security_schemes: Option<IndexMap<String, SecurityScheme>>,
}

/// A path item containing operations for different HTTP methods.
#[derive(Debug, Clone, Deserialize)]
pub struct PathItem {
    pub get: Option<Operation>,
    pub put: Option<Operation>,
    pub post: Option<Operation>,
    pub delete: Option<Operation>,
    pub options: Option<Operation>,
    pub head: Option<Operation>,
    pub patch: Option<Operation>,
    pub trace: Option<Operation>,
    /// Path-level parameters shared by all operations.
    #[serde(default)]
    pub parameters: Vec<RefOr<Parameter>>,
}

/// An API operation (endpoint).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Operation {
    pub operation_id: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub parameters: Vec<RefOr<Parameter>>,
    pub request_body: Option<RefOr<RequestBody>>,
    #[serde(default)]
    pub responses: IndexMap<String, RefOr<Response>>,
    #[serde(default)]
    pub deprecated: bool,
    pub security: Option<Vec<SecurityRequirement>>,
}

/// Either a `$ref` object or an inline value.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RefOr<T> {
    Ref(Reference),
    Item(T),
}

/// A `{ "$ref": "..." }` object.
#[derive(Debug, Clone, Deserialize)]
pub struct Reference {
    #[serde(rename = "$ref")]
    pub ref_path: String,
}

/// A parameter (path, query, header, cookie; Swagger 2 also body/formData).
#[derive(Debug, Clone, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(rename = "in")]
    pub location: String,
    #[serde(default)]
    pub required: bool,
    pub description: Option<String>,
    pub schema: Option<Schema>,
    /// Swagger 2 non-body parameters carry their schema inline.
    #[serde(flatten)]
    pub inline_schema: Schema,
}

impl Parameter {
    /// The schema describing this parameter's value, if any.
    pub fn value_schema(&self) -> Option<&Schema> {
        self.schema.as_ref().or_else(|| {
            let inline = &self.inline_schema;
            (inline.schema_type.is_some() || inline.ref_path.is_some() || inline.enum_values.is_some())
                .then_some(inline)
        })
    }
}

/// A request body definition.
#[derive(Debug, Clone, Deserialize)]
pub struct RequestBody {
    pub description: Option<String>,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub content: IndexMap<String, MediaType>,
}

/// A response definition.
#[derive(Debug, Clone, Deserialize)]
pub struct Response {
    pub description: Option<String>,
    pub content: Option<IndexMap<String, MediaType>>,
    /// Swagger 2 response schema.
    pub schema: Option<Schema>,
}

/// Media type content (e.g., application/json).
#[derive(Debug, Clone, Deserialize)]
pub struct MediaType {
    pub schema: Option<Schema>,
}

/// Security scheme declaration.
#[derive(Debug, Clone, Deserialize)]
pub struct SecurityScheme {
    /// `apiKey`, `http`, `oauth2`, `openIdConnect` (Swagger 2: `basic`).
    #[serde(rename = "type")]
    pub scheme_type: String,
    /// Header / query / cookie name for `apiKey` schemes.
    pub name: Option<String>,
    #[serde(rename = "in")]
    pub location: Option<String>,
    /// HTTP auth scheme (`bearer`, `basic`).
    pub scheme: Option<String>,
}

/// Scheme name to required scopes.
pub type SecurityRequirement = IndexMap<String, Vec<String>>;

/// JSON Schema definition used in OpenAPI.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    /// The type of the schema (string, number, integer, boolean, object, array, null).
    #[serde(rename = "type")]
    pub schema_type: Option<SchemaType>,

    /// Reference to another schema.
    #[serde(rename = "$ref")]
    pub ref_path: Option<String>,

    pub title: Option<String>,
    pub description: Option<String>,

    /// Properties for object types, in document order.
    pub properties: Option<IndexMap<String, Schema>>,

    /// Required property names for object types.
    pub required: Option<Vec<String>>,

    /// Item schema for array types.
    pub items: Option<Box<Schema>>,

    /// Enum values.
    #[serde(rename = "enum")]
    pub enum_values: Option<Vec<serde_json::Value>>,

    #[serde(rename = "anyOf")]
    pub any_of: Option<Vec<Schema>>,

    #[serde(rename = "oneOf")]
    pub one_of: Option<Vec<Schema>>,

    #[serde(rename = "allOf")]
    pub all_of: Option<Vec<Schema>>,

    /// Additional properties for object types (dict types).
    pub additional_properties: Option<AdditionalProperties>,

    /// Discriminator for polymorphic oneOf/anyOf schemas.
    pub discriminator: Option<Discriminator>,

    /// Format hint (e.g., date-time, binary).
    pub format: Option<String>,

    /// Default value for the schema.
    pub default: Option<serde_json::Value>,

    /// OpenAPI 3.0 nullable flag (3.1 uses type arrays instead).
    pub nullable: Option<bool>,
}

/// Discriminator for polymorphic schemas (oneOf/anyOf).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Discriminator {
    /// The property name that contains the discriminator value.
    pub property_name: String,
    /// Optional mapping from discriminator values to schema refs.
    pub mapping: Option<IndexMap<String, String>>,
}

/// Schema type can be a single type or an array of types (for nullable).
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SchemaType {
    Single(String),
    Multiple(Vec<String>),
}

/// Additional properties can be a boolean or a schema.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum AdditionalProperties {
    Bool(bool),
    Schema(Box<Schema>),
}

impl SpecModel {
    /// Parse and validate a document from JSON text.
    pub fn from_json(json: &str) -> Result<Self, SpecError> {
        let mut de = serde_json::Deserializer::from_str(json);
        let spec: Self = deserialize_with_path(&mut de)?;
        spec.validate()?;
        Ok(spec)
    }

    /// Parse and validate a document from YAML text.
    pub fn from_yaml(yaml: &str) -> Result<Self, SpecError> {
        let de = serde_yaml::Deserializer::from_str(yaml);
        let spec: Self = deserialize_with_path(de)?;
        spec.validate()?;
        Ok(spec)
    }

    /// Parse JSON when the text looks like JSON, YAML otherwise.
    pub fn from_str_auto(text: &str) -> Result<Self, SpecError> {
        if text.trim_start().starts_with('{') {
            Self::from_json(text)
        } else {
            Self::from_yaml(text)
        }
    }

    /// Check the structural constraints the deserializer cannot express.
    pub fn validate(&self) -> Result<(), SpecError> {
        match (&self.openapi, &self.swagger) {
            (Some(version), _) if version.starts_with("3.") => {}
            (None, Some(version)) if version == "2.0" => {}
            (Some(version), _) | (None, Some(version)) => {
                return Err(SpecError::UnsupportedVersion(version.clone()));
            }
            (None, None) => return Err(SpecError::MissingVersion),
        }

        if let Some(paths) = &self.paths
            && let Some(bad) = paths.keys().find(|path| !path.starts_with('/'))
        {
            return Err(SpecError::InvalidPath(bad.clone()));
        }

        Ok(())
    }

    /// Named schemas, from `components.schemas` or Swagger 2 `definitions`.
    pub fn schemas(&self) -> impl Iterator<Item = (&String, &Schema)> {
        let components = self
            .components
            .as_ref()
            .and_then(|c| c.schemas.as_ref())
            .into_iter()
            .flatten();
        let definitions = self.definitions.iter().flatten();
        components.chain(definitions)
    }

    /// Look up a named schema by its key.
    pub fn schema(&self, name: &str) -> Option<&Schema> {
        self.components
            .as_ref()
            .and_then(|c| c.schemas.as_ref())
            .and_then(|schemas| schemas.get(name))
            .or_else(|| self.definitions.as_ref().and_then(|d| d.get(name)))
    }

    /// Look up a security scheme by name.
    pub fn security_scheme(&self, name: &str) -> Option<&SecurityScheme> {
        self.components
            .as_ref()
            .and_then(|c| c.security_schemes.as_ref())
            .and_then(|schemes| schemes.get(name))
            .or_else(|| self.security_definitions.as_ref().and_then(|d| d.get(name)))
    }

    /// First server URL, falling back to the Swagger 2 host/basePath pair.
    pub fn server_url(&self) -> Option<String> {
        if let Some(server) = self.servers.first() {
            return Some(server.url.clone());
        }
        self.host.as_ref().map(|host| {
            format!("https://{host}{}", self.base_path.as_deref().unwrap_or(""))
        })
    }
}

fn deserialize_with_path<'de, D, T>(de: D) -> Result<T, SpecError>
where
    D: serde::Deserializer<'de>,
    T: DeserializeOwned,
{
    serde_path_to_error::deserialize(de).map_err(|err| SpecError::Parse {
        path: err.path().to_string(),
        message: err.inner().to_string(),
    })
}

impl Schema {
    /// Check if this schema is nullable (nullable flag or `null` in a type array).
    pub fn is_nullable(&self) -> bool {
        if self.nullable == Some(true) {
            return true;
        }

        matches!(&self.schema_type, Some(SchemaType::Multiple(types)) if types.iter().any(|t| t == "null"))
    }

    /// The declared type names, with `null` removed.
    pub fn non_null_types(&self) -> Vec<&str> {
        match &self.schema_type {
            Some(SchemaType::Single(t)) if t != "null" => vec![t.as_str()],
            Some(SchemaType::Multiple(types)) => types
                .iter()
                .map(String::as_str)
                .filter(|t| *t != "null")
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Whether the schema is exactly `{ "type": "null" }`.
    pub fn is_null_type(&self) -> bool {
        matches!(&self.schema_type, Some(SchemaType::Single(t)) if t == "null")
            && self.ref_path.is_none()
    }
}
