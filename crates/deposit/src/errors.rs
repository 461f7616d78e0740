//! Error types for the deposit library.
//!
//! Every foreseeable failure of a deposit attempt is a [`DepositError`]:
//! - Configuration problems detected before any network call (missing credentials or endpoint)
//! - Transport failures (connection refused, timeouts, TLS)
//! - Protocol failures (unexpected HTTP status, malformed response bodies)
//! - Metadata that a target cannot do without (e.g. Zenodo refuses papers without an abstract)
//! - Local failures (XML writing, zip packaging, file access, the SQLite store)
//!
//! Each error also knows which text may be shown to the depositing user, see
//! [`DepositError::user_message`]. The full detail only ever goes to the deposit log.
//!
//! # Examples
//!
//! ```
//! use deposit::{errors::DepositError, repository::Repository};
//!
//! let repository = Repository::new("Zenodo", "zenodo");
//! match repository.api_key() {
//!   Err(DepositError::Configuration(message)) => println!("{message}"),
//!   Err(e) => println!("Other error: {e}"),
//!   Ok(key) => println!("Using key {key}"),
//! }
//! ```

use thiserror::Error;

/// Message shown to users whenever the failure is not theirs to fix.
pub const GENERIC_FAILURE: &str =
  "Failed to connect to the repository. Please try again later.";

/// Errors that can occur while preparing or submitting a deposit.
#[derive(Error, Debug)]
pub enum DepositError {
  /// The repository configuration lacks something the protocol needs.
  ///
  /// Raised before any network call, e.g. when a SWORD repository has no username or a Zenodo
  /// repository has no API key.
  #[error("{0}")]
  Configuration(String),

  /// The request could not be carried out at all.
  ///
  /// This wraps connection failures, timeouts and TLS errors. The string holds the underlying
  /// error text, which is logged but never shown to the user.
  #[error("Transport failure: {0}")]
  Transport(String),

  /// The repository answered with a status other than the one the protocol step expects.
  #[error("{message}")]
  UnexpectedStatus {
    /// The status the protocol step waited for
    expected: u16,
    /// The status the repository sent
    found:    u16,
    /// User-facing description of the failed step
    message:  String,
  },

  /// The repository answered with the expected status but an unusable body.
  #[error("Invalid response from the repository: {0}")]
  InvalidResponse(String),

  /// A formatter or protocol cannot proceed without more input from the user.
  #[error("{0}")]
  MissingMetadata(String),

  /// The publication type string is not one of the known identifiers.
  #[error("Unknown publication type: {0}")]
  UnknownPubType(String),

  /// A persisted deposit status could not be parsed.
  #[error("Unknown deposit status: {0}")]
  InvalidStatus(String),

  /// No protocol is registered under the repository's protocol identifier.
  #[error("No protocol registered under `{0}`")]
  UnknownProtocol(String),

  /// The session was asked for a form or a submission before `init_deposit`.
  #[error("The deposit has not been initialized")]
  NotInitialized,

  /// Writing or parsing an XML document failed.
  #[error("XML error: {0}")]
  Xml(String),

  /// Building a zip package failed.
  #[error(transparent)]
  Zip(#[from] zip::result::ZipError),

  /// JSON (de)serialization failed.
  #[error(transparent)]
  Json(#[from] serde_json::Error),

  /// A URL could not be parsed.
  #[error(transparent)]
  InvalidUrl(#[from] url::ParseError),

  /// A file system operation failed, typically reading the uploaded PDF.
  #[error(transparent)]
  Path(#[from] std::io::Error),

  /// A SQLite operation failed.
  #[error(transparent)]
  Sqlite(#[from] rusqlite::Error),

  /// An async SQLite operation failed.
  #[error(transparent)]
  AsyncSqlite(#[from] tokio_rusqlite::Error),
}

impl From<reqwest::Error> for DepositError {
  fn from(err: reqwest::Error) -> Self { DepositError::Transport(err.to_string()) }
}

impl DepositError {
  /// The text that may be displayed to the depositing user.
  ///
  /// Configuration, status and missing-metadata errors carry a message written for the user.
  /// Everything else collapses to [`GENERIC_FAILURE`], the details staying in the deposit log.
  ///
  /// ```
  /// use deposit::errors::{DepositError, GENERIC_FAILURE};
  ///
  /// let err = DepositError::Transport("connection reset by peer".into());
  /// assert_eq!(err.user_message(), GENERIC_FAILURE);
  ///
  /// let err = DepositError::MissingMetadata("An abstract is required.".into());
  /// assert_eq!(err.user_message(), "An abstract is required.");
  /// ```
  pub fn user_message(&self) -> String {
    match self {
      DepositError::Configuration(_)
      | DepositError::UnexpectedStatus { .. }
      | DepositError::MissingMetadata(_)
      | DepositError::UnknownProtocol(_)
      | DepositError::UnknownPubType(_)
      | DepositError::NotInitialized => self.to_string(),
      DepositError::InvalidResponse(_) =>
        "The repository sent a response we could not understand.".to_string(),
      _ => GENERIC_FAILURE.to_string(),
    }
  }

  /// Whether the error happened before reaching the repository.
  pub fn is_configuration_error(&self) -> bool { matches!(self, DepositError::Configuration(_)) }
}
