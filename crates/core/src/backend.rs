//! Transport backends.
//!
//! The set of supported HTTP libraries is closed: each one maps to a static
//! [`BackendConfig`] describing how generated code opens a client, issues a
//! request and reads the response. Service and config emission read these
//! records and never branch on the library itself.

use std::fmt;
use std::str::FromStr;

use crate::error::GenerateError;
use crate::ir::api::BodyEncoding;

/// Supported HTTP client libraries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpLibrary {
    /// httpx: blocking and async clients
    Httpx,
    /// requests: blocking only
    Requests,
    /// aiohttp: async only
    Aiohttp,
}

impl HttpLibrary {
    pub const ALL: [HttpLibrary; 3] = [HttpLibrary::Httpx, HttpLibrary::Requests, HttpLibrary::Aiohttp];

    /// Identifier accepted by [`lookup`]
    pub fn id(&self) -> &'static str {
        match self {
            HttpLibrary::Httpx => "httpx",
            HttpLibrary::Requests => "requests",
            HttpLibrary::Aiohttp => "aiohttp",
        }
    }

    pub fn config(&self) -> &'static BackendConfig {
        match self {
            HttpLibrary::Httpx => &HTTPX,
            HttpLibrary::Requests => &REQUESTS,
            HttpLibrary::Aiohttp => &AIOHTTP,
        }
    }
}

impl fmt::Display for HttpLibrary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for HttpLibrary {
    type Err = GenerateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        HttpLibrary::ALL
            .into_iter()
            .find(|library| library.id().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| GenerateError::UnsupportedBackend(wanted.to_string()))
    }
}

/// Whether generated functions block or suspend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallingConvention {
    Blocking,
    Async,
}

/// Keyword argument used to attach a request body, per encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BodyKeywords {
    pub json: &'static str,
    pub form: &'static str,
    pub multipart: &'static str,
    pub raw: &'static str,
}

impl BodyKeywords {
    pub fn for_encoding(&self, encoding: BodyEncoding) -> &'static str {
        match encoding {
            BodyEncoding::Json => self.json,
            BodyEncoding::Form => self.form,
            BodyEncoding::Multipart => self.multipart,
            BodyEncoding::Raw => self.raw,
        }
    }
}

/// How one flavour of service unit performs a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallTemplate {
    pub convention: CallingConvention,
    /// Prepended to service unit names (`async_pets_service`).
    pub unit_prefix: &'static str,
    /// `with` header opening a client, if the library needs one.
    pub session: Option<&'static str>,
    /// Request call; `{args}` is replaced by the rendered arguments.
    pub request: &'static str,
    /// The request is itself a context manager yielding `response`.
    pub request_opens_block: bool,
    /// Whether the response must be read before the session closes.
    pub response_in_session: bool,
    pub status: &'static str,
    pub json: &'static str,
    pub text: &'static str,
    pub bytes: &'static str,
    pub body_keywords: BodyKeywords,
    /// Boolean query values are sent as `"true"`/`"false"` instead of Python bools.
    pub query_bools_as_text: bool,
    /// Extra keyword arguments passed on every request.
    pub extra_args: &'static [(&'static str, &'static str)],
}

impl CallTemplate {
    pub fn is_async(&self) -> bool {
        self.convention == CallingConvention::Async
    }

    /// Render the request call for the given argument list.
    pub fn render_request(&self, args: &str) -> String {
        self.request.replace("{args}", args)
    }
}

/// A method added to `APIConfig` for library-specific client settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigHelper {
    pub name: &'static str,
    pub returns: &'static str,
    pub body: &'static str,
}

/// Everything the emitters need to know about one library.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendConfig {
    pub library: HttpLibrary,
    /// Modules imported by every service unit.
    pub imports: &'static [&'static str],
    /// One service unit is emitted per template and group.
    pub templates: &'static [CallTemplate],
    /// Requests carry `base_path + path` instead of a client-relative path.
    pub absolute_url: bool,
    /// Modules the config unit imports for its helper methods.
    pub config_imports: &'static [&'static str],
    pub config_helpers: &'static [ConfigHelper],
}

const HTTPX_BODY: BodyKeywords = BodyKeywords {
    json: "json",
    form: "data",
    multipart: "files",
    raw: "content",
};

pub static HTTPX: BackendConfig = BackendConfig {
    library: HttpLibrary::Httpx,
    imports: &["httpx"],
    templates: &[
        CallTemplate {
            convention: CallingConvention::Blocking,
            unit_prefix: "",
            session: Some(
                "with httpx.Client(base_url=base_path, verify=api_config.verify, timeout=api_config.client_timeout()) as client",
            ),
            request: "client.request({args})",
            request_opens_block: false,
            response_in_session: false,
            status: "response.status_code",
            json: "response.json()",
            text: "response.text",
            bytes: "response.content",
            body_keywords: HTTPX_BODY,
            query_bools_as_text: false,
            extra_args: &[],
        },
        CallTemplate {
            convention: CallingConvention::Async,
            unit_prefix: "async_",
            session: Some(
                "async with httpx.AsyncClient(base_url=base_path, verify=api_config.verify, timeout=api_config.client_timeout()) as client",
            ),
            request: "await client.request({args})",
            request_opens_block: false,
            response_in_session: false,
            status: "response.status_code",
            json: "response.json()",
            text: "response.text",
            bytes: "response.content",
            body_keywords: HTTPX_BODY,
            query_bools_as_text: false,
            extra_args: &[],
        },
    ],
    absolute_url: false,
    config_imports: &["httpx"],
    config_helpers: &[ConfigHelper {
        name: "client_timeout",
        returns: "httpx.Timeout",
        body: "return httpx.Timeout(self.timeout)",
    }],
};

pub static REQUESTS: BackendConfig = BackendConfig {
    library: HttpLibrary::Requests,
    imports: &["requests"],
    templates: &[CallTemplate {
        convention: CallingConvention::Blocking,
        unit_prefix: "",
        session: None,
        request: "requests.request({args})",
        request_opens_block: false,
        response_in_session: false,
        status: "response.status_code",
        json: "response.json()",
        text: "response.text",
        bytes: "response.content",
        body_keywords: BodyKeywords {
            json: "json",
            form: "data",
            multipart: "files",
            raw: "data",
        },
        query_bools_as_text: false,
        extra_args: &[("verify", "api_config.verify"), ("timeout", "api_config.timeout")],
    }],
    absolute_url: true,
    config_imports: &[],
    config_helpers: &[],
};

pub static AIOHTTP: BackendConfig = BackendConfig {
    library: HttpLibrary::Aiohttp,
    imports: &["aiohttp"],
    templates: &[CallTemplate {
        convention: CallingConvention::Async,
        unit_prefix: "async_",
        session: Some("async with aiohttp.ClientSession(timeout=api_config.client_timeout()) as session"),
        request: "session.request({args})",
        request_opens_block: true,
        response_in_session: true,
        status: "response.status",
        json: "await response.json()",
        text: "await response.text()",
        bytes: "await response.read()",
        body_keywords: BodyKeywords {
            json: "json",
            form: "data",
            multipart: "data",
            raw: "data",
        },
        // yarl rejects bool query values.
        query_bools_as_text: true,
        extra_args: &[("ssl", "api_config.ssl_context()")],
    }],
    absolute_url: true,
    config_imports: &["ssl", "aiohttp"],
    config_helpers: &[
        ConfigHelper {
            name: "client_timeout",
            returns: "aiohttp.ClientTimeout",
            body: "return aiohttp.ClientTimeout(total=self.timeout)",
        },
        ConfigHelper {
            name: "ssl_context",
            returns: "Union[bool, ssl.SSLContext]",
            body: "if isinstance(self.verify, str):\n    return ssl.create_default_context(cafile=self.verify)\nreturn self.verify",
        },
    ],
};

/// Look up the backend for a library identifier (case-insensitive).
pub fn lookup(id: &str) -> Result<&'static BackendConfig, GenerateError> {
    id.parse::<HttpLibrary>().map(|library| library.config())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_known_backends() {
        for library in HttpLibrary::ALL {
            let config = lookup(library.id()).unwrap();
            assert_eq!(config.library, library);
            assert!(!config.templates.is_empty());
        }
    }

    #[test]
    fn test_lookup_is_case_insensitive() {
        assert_eq!(lookup("  HTTPX ").unwrap().library, HttpLibrary::Httpx);
        assert_eq!(lookup("AioHttp").unwrap().library, HttpLibrary::Aiohttp);
    }

    #[test]
    fn test_lookup_unknown_backend() {
        let err = lookup("urllib3").unwrap_err();
        assert!(matches!(err, GenerateError::UnsupportedBackend(ref id) if id == "urllib3"));
        assert!(err.to_string().contains("httpx, requests, aiohttp"));
    }

    #[test]
    fn test_calling_conventions() {
        let conventions = |library: HttpLibrary| -> Vec<CallingConvention> {
            library.config().templates.iter().map(|t| t.convention).collect()
        };
        assert_eq!(
            conventions(HttpLibrary::Httpx),
            [CallingConvention::Blocking, CallingConvention::Async]
        );
        assert_eq!(conventions(HttpLibrary::Requests), [CallingConvention::Blocking]);
        assert_eq!(conventions(HttpLibrary::Aiohttp), [CallingConvention::Async]);
    }

    #[test]
    fn test_render_request() {
        let template = &HTTPX.templates[1];
        assert_eq!(
            template.render_request("\"get\", path"),
            "await client.request(\"get\", path)"
        );
        assert_eq!(template.body_keywords.for_encoding(BodyEncoding::Multipart), "files");
        assert_eq!(REQUESTS.templates[0].body_keywords.for_encoding(BodyEncoding::Raw), "data");
    }

    #[test]
    fn test_only_aiohttp_sends_bools_as_text() {
        for library in HttpLibrary::ALL {
            let expected = library == HttpLibrary::Aiohttp;
            assert!(library.config().templates.iter().all(|t| t.query_bools_as_text == expected));
        }
    }
}
