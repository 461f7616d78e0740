//! Error types for the depositd CLI application.
//!
//! This module gathers every failure mode of the CLI:
//! - User interaction errors
//! - Deposit library errors (configuration, transport, database)
//! - Invalid deposit forms
//! - File system operations and JSON input files
//!
//! Most variants are transparent so that the underlying message reaches the user unchanged.

use thiserror::Error;

/// Errors that can occur during CLI operations.
///
/// # Examples
///
/// ```
/// use depositd::errors::DepositdErrors;
///
/// # fn example() -> Result<(), DepositdErrors> {
/// let repository: deposit::Repository =
///   serde_json::from_str(r#"{"name": "Zenodo", "protocol": "zenodo"}"#)?;
/// # Ok(())
/// # }
/// ```
#[derive(Error, Debug)]
pub enum DepositdErrors {
  /// Errors from user interaction dialogs
  #[error(transparent)]
  Dialoguer(#[from] dialoguer::Error),

  /// Errors from the underlying deposit library
  #[error(transparent)]
  Deposit(#[from] deposit::errors::DepositError),

  /// The deposit form did not validate
  #[error("Invalid deposit form: {0}")]
  Form(#[from] deposit::FormErrors),

  /// Malformed JSON input files
  #[error(transparent)]
  Json(#[from] serde_json::Error),

  /// File system and IO operation errors
  #[error(transparent)]
  IO(#[from] std::io::Error),

  /// Glob pattern matching errors
  #[error(transparent)]
  Glob(#[from] glob::PatternError),

  /// No formatter goes by the requested name
  #[error("Unknown metadata format `{0}`")]
  UnknownFormat(String),
}
