//! REST client over a pluggable transport.
//!
//! The product's API is collection-oriented JSON over HTTPS. The client
//! shapes requests, records the last response (several helpers assert
//! on it after the fact), and maps the server's error envelope onto
//! typed errors. The wire is behind [`Transport`] so tests run against
//! an in-memory server.

use std::cell::RefCell;
use std::rc::Rc;

use serde_json::Value;

use crate::result::{MiradorError, MiradorResult};

/// HTTP method subset the API uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// GET
    Get,
    /// POST
    Post,
    /// DELETE
    Delete,
    /// OPTIONS
    Options,
}

impl Method {
    /// The method name on the wire
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Delete => "DELETE",
            Self::Options => "OPTIONS",
        }
    }
}

/// Authentication modes
#[derive(Debug, Clone)]
pub enum Auth {
    /// HTTP Basic
    Basic {
        /// User name
        user: String,
        /// Password
        password: String,
    },
    /// Bearer token from `/api/auth`
    Token(String),
}

/// One request on the wire
#[derive(Debug, Clone)]
pub struct RestRequest {
    /// HTTP method
    pub method: Method,
    /// Absolute URL
    pub url: String,
    /// JSON body, if any
    pub body: Option<Value>,
}

/// One response off the wire
#[derive(Debug, Clone)]
pub struct RestResponse {
    /// HTTP status code
    pub status: u16,
    /// Parsed JSON body; `Null` for empty bodies (204)
    pub body: Value,
}

impl RestResponse {
    /// Whether the status is 2xx
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }

    /// The `results` array of a collection action, if present
    #[must_use]
    pub fn results(&self) -> Option<&Vec<Value>> {
        self.body.get("results").and_then(Value::as_array)
    }
}

/// The wire seam. Implementations do not interpret the response beyond
/// producing status + JSON.
pub trait Transport {
    /// Send one request
    fn send(&self, request: &RestRequest, auth: &Auth) -> MiradorResult<RestResponse>;
}

/// Production transport over a blocking HTTP client.
#[derive(Debug)]
pub struct HttpTransport {
    client: reqwest::blocking::Client,
}

impl HttpTransport {
    /// Build the transport; certificate verification stays off, matching
    /// self-signed appliance certs.
    pub fn new() -> MiradorResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .danger_accept_invalid_certs(true)
            .build()?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: &RestRequest, auth: &Auth) -> MiradorResult<RestResponse> {
        let method = reqwest::Method::from_bytes(request.method.as_str().as_bytes())
            .expect("static method names are valid");
        let mut builder = self.client.request(method, &request.url);
        builder = match auth {
            Auth::Basic { user, password } => builder.basic_auth(user, Some(password)),
            Auth::Token(token) => builder.bearer_auth(token),
        };
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        let response = builder.send()?;
        let status = response.status().as_u16();
        let text = response.text()?;
        let body = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text)?
        };
        Ok(RestResponse { status, body })
    }
}

/// The REST client: entry point, auth, transport, and the retained last
/// response.
pub struct RestClient {
    entry_point: String,
    auth: Auth,
    transport: Rc<dyn Transport>,
    last_response: RefCell<Option<RestResponse>>,
}

impl std::fmt::Debug for RestClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestClient")
            .field("entry_point", &self.entry_point)
            .finish_non_exhaustive()
    }
}

impl RestClient {
    /// Create a client rooted at `entry_point` (e.g.
    /// `https://host/api`)
    #[must_use]
    pub fn new(entry_point: impl Into<String>, auth: Auth, transport: Rc<dyn Transport>) -> Self {
        Self {
            entry_point: entry_point.into().trim_end_matches('/').to_string(),
            auth,
            transport,
            last_response: RefCell::new(None),
        }
    }

    /// The API entry point URL
    #[must_use]
    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }

    /// The last response seen, if any. Helpers that issue intermediate
    /// requests capture this first and restore it after.
    #[must_use]
    pub fn last_response(&self) -> Option<RestResponse> {
        self.last_response.borrow().clone()
    }

    /// Overwrite the retained response (restoring a captured one)
    pub fn set_last_response(&self, response: Option<RestResponse>) {
        *self.last_response.borrow_mut() = response;
    }

    /// Absolute URL for a path under the entry point
    #[must_use]
    pub fn url_for(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}/{}", self.entry_point, path.trim_start_matches('/'))
        }
    }

    fn send(&self, method: Method, url: &str, body: Option<Value>) -> MiradorResult<RestResponse> {
        let request = RestRequest {
            method,
            url: self.url_for(url),
            body,
        };
        tracing::info!(method = request.method.as_str(), url = %request.url, "REST request");
        let response = self.transport.send(&request, &self.auth)?;
        tracing::debug!(status = response.status, "REST response");
        *self.last_response.borrow_mut() = Some(response.clone());
        Self::check(&request, response)
    }

    /// Map the server's error envelope to typed errors; success passes
    /// through.
    fn check(request: &RestRequest, response: RestResponse) -> MiradorResult<RestResponse> {
        if response.is_success() {
            return Ok(response);
        }
        let message = response
            .body
            .get("error")
            .map_or_else(
                || response.body.to_string(),
                |error| {
                    let klass = error.get("klass").and_then(Value::as_str).unwrap_or("");
                    let text = error.get("message").and_then(Value::as_str).unwrap_or("");
                    format!("{klass}: {text}")
                },
            );
        match response.status {
            404 => Err(MiradorError::RestRecordNotFound {
                href: request.url.clone(),
                message,
            }),
            400 => Err(MiradorError::RestBadRequest { message }),
            status => Err(MiradorError::ResponseAssertion {
                message: format!("unexpected HTTP {status} for {}: {message}", request.url),
            }),
        }
    }

    /// GET a path
    pub fn get(&self, path: &str) -> MiradorResult<RestResponse> {
        self.send(Method::Get, path, None)
    }

    /// POST a JSON payload to a path
    pub fn post(&self, path: &str, body: Value) -> MiradorResult<RestResponse> {
        self.send(Method::Post, path, Some(body))
    }

    /// DELETE a path
    pub fn delete(&self, path: &str) -> MiradorResult<RestResponse> {
        self.send(Method::Delete, path, None)
    }

    /// OPTIONS a path
    pub fn options(&self, path: &str) -> MiradorResult<RestResponse> {
        self.send(Method::Options, path, None)
    }

    /// Exchange basic credentials for a bearer token via `/api/auth`
    pub fn obtain_token(&mut self) -> MiradorResult<()> {
        let response = self.get("auth")?;
        let token = response
            .body
            .get("auth_token")
            .and_then(Value::as_str)
            .ok_or_else(|| MiradorError::ResponseAssertion {
                message: "auth response carried no auth_token".to_string(),
            })?;
        self.auth = Auth::Token(token.to_string());
        Ok(())
    }
}
