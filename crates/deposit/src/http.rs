//! HTTP transport used by the protocols.
//!
//! Protocols describe each remote call as an [`HttpRequest`] and hand it to a [`Transport`].
//! [`ReqwestTransport`] performs the call for real with a fixed timeout; tests substitute a
//! scripted transport so that every step of a choreography can be checked without a network.
//!
//! # Examples
//!
//! ```no_run
//! use deposit::http::{HttpRequest, ReqwestTransport, Transport};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = ReqwestTransport::new()?;
//! let response = transport
//!   .send(HttpRequest::get("https://zenodo.org/api/deposit/depositions").query("access_token", "…"))
//!   .await?;
//! println!("{}", response.status);
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use serde::de::DeserializeOwned;

use super::*;

/// Timeout applied to every request unless configured otherwise.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(20);

/// HTTP methods used by the deposit protocols.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Method {
  /// GET
  Get,
  /// POST
  Post,
  /// PUT
  Put,
  /// PATCH
  Patch,
  /// DELETE
  Delete,
}

impl fmt::Display for Method {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Method::Get => write!(f, "GET"),
      Method::Post => write!(f, "POST"),
      Method::Put => write!(f, "PUT"),
      Method::Patch => write!(f, "PATCH"),
      Method::Delete => write!(f, "DELETE"),
    }
  }
}

impl From<Method> for reqwest::Method {
  fn from(method: Method) -> Self {
    match method {
      Method::Get => reqwest::Method::GET,
      Method::Post => reqwest::Method::POST,
      Method::Put => reqwest::Method::PUT,
      Method::Patch => reqwest::Method::PATCH,
      Method::Delete => reqwest::Method::DELETE,
    }
  }
}

/// How a request authenticates.
#[derive(Clone, PartialEq, Eq, Default)]
pub enum Auth {
  /// Anonymous
  #[default]
  None,
  /// HTTP basic auth
  Basic {
    /// User name
    username: String,
    /// Password
    password: String,
  },
  /// `Authorization: Bearer <token>`
  Bearer(String),
}

// Credentials never end up in debug output or logs.
impl fmt::Debug for Auth {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Auth::None => write!(f, "None"),
      Auth::Basic { username, .. } => write!(f, "Basic({username}, ***)"),
      Auth::Bearer(_) => write!(f, "Bearer(***)"),
    }
  }
}

/// Request payload.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Body {
  /// No body
  #[default]
  Empty,
  /// A JSON document, sent as `application/json`
  Json(Value),
  /// Raw bytes with their content type
  Bytes {
    /// MIME type of the payload
    content_type: String,
    /// The payload
    data:         Vec<u8>,
  },
  /// `multipart/form-data` with text fields and one file
  Multipart {
    /// Plain text fields
    fields:       Vec<(String, String)>,
    /// Name of the file field
    file_field:   String,
    /// File name announced for the file
    filename:     String,
    /// MIME type of the file
    content_type: String,
    /// File contents
    data:         Vec<u8>,
  },
}

/// Query parameters carrying credentials.
const SECRET_PARAMETERS: [&str; 2] = ["access_token", "api_key"];

/// A request to a repository API.
#[derive(Clone, PartialEq)]
pub struct HttpRequest {
  /// Method
  pub method:  Method,
  /// Target URL, without query parameters
  pub url:     String,
  /// Query parameters
  pub query:   Vec<(String, String)>,
  /// Extra headers
  pub headers: Vec<(String, String)>,
  /// Authentication
  pub auth:    Auth,
  /// Payload
  pub body:    Body,
}

// Tokens passed as query parameters are redacted like `Auth`.
impl fmt::Debug for HttpRequest {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let query: Vec<(&str, &str)> = self
      .query
      .iter()
      .map(|(key, value)| {
        let value = if SECRET_PARAMETERS.contains(&key.as_str()) { "***" } else { value.as_str() };
        (key.as_str(), value)
      })
      .collect();
    f.debug_struct("HttpRequest")
      .field("method", &self.method)
      .field("url", &self.url)
      .field("query", &query)
      .field("headers", &self.headers)
      .field("auth", &self.auth)
      .field("body", &self.body)
      .finish()
  }
}

impl HttpRequest {
  /// A request with no query, headers, auth or body.
  pub fn new(method: Method, url: impl Into<String>) -> Self {
    Self {
      method,
      url: url.into(),
      query: Vec::new(),
      headers: Vec::new(),
      auth: Auth::None,
      body: Body::Empty,
    }
  }

  /// GET `url`
  pub fn get(url: impl Into<String>) -> Self { Self::new(Method::Get, url) }

  /// POST `url`
  pub fn post(url: impl Into<String>) -> Self { Self::new(Method::Post, url) }

  /// PUT `url`
  pub fn put(url: impl Into<String>) -> Self { Self::new(Method::Put, url) }

  /// PATCH `url`
  pub fn patch(url: impl Into<String>) -> Self { Self::new(Method::Patch, url) }

  /// DELETE `url`
  pub fn delete(url: impl Into<String>) -> Self { Self::new(Method::Delete, url) }

  /// Adds a query parameter.
  pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.query.push((key.into(), value.into()));
    self
  }

  /// Adds a header.
  pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
    self.headers.push((name.into(), value.into()));
    self
  }

  /// Authenticates with HTTP basic auth.
  pub fn basic_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
    self.auth = Auth::Basic { username: username.into(), password: password.into() };
    self
  }

  /// Authenticates with a bearer token.
  pub fn bearer_auth(mut self, token: impl Into<String>) -> Self {
    self.auth = Auth::Bearer(token.into());
    self
  }

  /// Sends a JSON document.
  pub fn json(mut self, value: Value) -> Self {
    self.body = Body::Json(value);
    self
  }

  /// Sends raw bytes.
  pub fn bytes(mut self, content_type: impl Into<String>, data: Vec<u8>) -> Self {
    self.body = Body::Bytes { content_type: content_type.into(), data };
    self
  }

  /// Sends a multipart form with a single file.
  pub fn multipart(
    mut self,
    fields: Vec<(String, String)>,
    file_field: impl Into<String>,
    filename: impl Into<String>,
    content_type: impl Into<String>,
    data: Vec<u8>,
  ) -> Self {
    self.body = Body::Multipart {
      fields,
      file_field: file_field.into(),
      filename: filename.into(),
      content_type: content_type.into(),
      data,
    };
    self
  }

  /// Value of a header, matched case-insensitively.
  pub fn header_value(&self, name: &str) -> Option<&str> {
    self
      .headers
      .iter()
      .find(|(key, _)| key.eq_ignore_ascii_case(name))
      .map(|(_, value)| value.as_str())
  }
}

/// A response from a repository API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
  /// Method of the request that produced this response
  pub method: Method,
  /// URL of the request, without query parameters
  pub url:    String,
  /// Status code
  pub status: u16,
  /// Body as text
  pub body:   String,
}

impl HttpResponse {
  /// Parses the body as JSON.
  ///
  /// # Errors
  ///
  /// Returns [`DepositError::InvalidResponse`] if the body is not the expected JSON.
  pub fn json<T: DeserializeOwned>(&self) -> Result<T, DepositError> {
    serde_json::from_str(&self.body).map_err(|e| {
      DepositError::InvalidResponse(format!("{} {} returned invalid JSON: {e}", self.method, self.url))
    })
  }
}

/// Something that can carry out an [`HttpRequest`].
///
/// Implementations must not judge the status code: a 500 is a successful exchange at this level,
/// and [`DepositLog::log_request`] decides whether the protocol step succeeded.
#[async_trait]
pub trait Transport: Send + Sync {
  /// Performs the request.
  ///
  /// # Errors
  ///
  /// Returns [`DepositError::Transport`] if no response could be obtained.
  async fn send(&self, request: HttpRequest) -> Result<HttpResponse, DepositError>;
}

/// [`Transport`] backed by a `reqwest` client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
  /// Internal web client used to connect to the repositories.
  client: reqwest::Client,
}

impl ReqwestTransport {
  /// Creates a transport with the [`DEFAULT_TIMEOUT`].
  pub fn new() -> Result<Self, DepositError> { Self::with_timeout(DEFAULT_TIMEOUT) }

  /// Creates a transport whose requests give up after `timeout`.
  pub fn with_timeout(timeout: Duration) -> Result<Self, DepositError> {
    let client = reqwest::Client::builder()
      .timeout(timeout)
      .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
      .build()?;
    Ok(Self { client })
  }
}

#[async_trait]
impl Transport for ReqwestTransport {
  async fn send(&self, request: HttpRequest) -> Result<HttpResponse, DepositError> {
    debug!("{} {}", request.method, request.url);

    let mut builder = self.client.request(request.method.into(), &request.url);
    if !request.query.is_empty() {
      builder = builder.query(&request.query);
    }
    for (name, value) in &request.headers {
      builder = builder.header(name.as_str(), value.as_str());
    }
    builder = match request.auth {
      Auth::None => builder,
      Auth::Basic { username, password } => builder.basic_auth(username, Some(password)),
      Auth::Bearer(token) => builder.bearer_auth(token),
    };
    builder = match request.body {
      Body::Empty => builder,
      Body::Json(value) => builder.json(&value),
      Body::Bytes { content_type, data } =>
        builder.header(reqwest::header::CONTENT_TYPE, content_type).body(data),
      Body::Multipart { fields, file_field, filename, content_type, data } => {
        let mut form = reqwest::multipart::Form::new();
        for (name, value) in fields {
          form = form.text(name, value);
        }
        let part =
          reqwest::multipart::Part::bytes(data).file_name(filename).mime_str(&content_type)?;
        builder.multipart(form.part(file_field, part))
      },
    };

    let response = builder.send().await?;
    let status = response.status().as_u16();
    let body = response.text().await?;
    trace!("{} {} answered {status}: {body}", request.method, request.url);

    Ok(HttpResponse { method: request.method, url: request.url, status, body })
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_request_builder() {
    let request = HttpRequest::post("https://repository.example/sword")
      .basic_auth("depositor", "secret")
      .header("Packaging", "http://purl.org/net/sword/package/METSMODS")
      .bytes("application/zip", vec![1, 2, 3]);

    assert_eq!(request.method, Method::Post);
    assert_eq!(request.header_value("packaging"), Some("http://purl.org/net/sword/package/METSMODS"));
    assert!(matches!(request.body, Body::Bytes { ref content_type, .. } if content_type == "application/zip"));
  }

  #[test]
  fn test_credentials_are_hidden_from_debug_output() {
    let request = HttpRequest::get("https://api.osf.io/v2/").bearer_auth("very-secret-token");
    let debug = format!("{request:?}");
    assert!(!debug.contains("very-secret-token"));

    let request = HttpRequest::post("https://zenodo.org/api/deposit/depositions")
      .query("access_token", "zenodo-secret-token")
      .query("page", "2");
    let debug = format!("{request:?}");
    assert!(!debug.contains("zenodo-secret-token"));
    assert!(debug.contains(r#"("access_token", "***")"#));
    assert!(debug.contains(r#"("page", "2")"#));

    let auth = Auth::Basic { username: "depositor".into(), password: "hunter2".into() };
    assert_eq!(format!("{auth:?}"), "Basic(depositor, ***)");
  }

  #[test]
  fn test_response_json() {
    let response = HttpResponse {
      method: Method::Post,
      url:    "https://zenodo.org/api/deposit/depositions".to_string(),
      status: 201,
      body:   r#"{"id": 1}"#.to_string(),
    };
    let value: Value = response.json().unwrap();
    assert_eq!(value["id"], 1);

    let broken = HttpResponse { body: "<html>".to_string(), ..response };
    assert!(matches!(broken.json::<Value>(), Err(DepositError::InvalidResponse(_))));
  }

  #[test]
  fn test_reqwest_transport_builds() {
    assert!(ReqwestTransport::with_timeout(Duration::from_secs(1)).is_ok());
  }
}
