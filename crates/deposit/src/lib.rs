//! A library for depositing academic papers into open repositories.
//!
//! The crate models a deposit attempt end to end: a [`Paper`] and the depositing [`User`] are
//! bound to a [`RepositoryProtocol`] through a [`DepositSession`], the protocol describes the
//! extra metadata it needs as a [`Form`], and [`submit_deposit_wrapper`] drives the
//! protocol-specific choreography (SWORD + METS/MODS, HAL's SWORD + TEI, Zenodo's REST API, OSF's
//! JSON:API or a dark archive) and always hands back a [`DepositResult`] carrying the full request
//! log.
//!
//! # Example
//! ```rust,no_run
//! use deposit::{
//!   database::Database,
//!   http::ReqwestTransport,
//!   paper::{Paper, UploadedPdf, User},
//!   protocol::{default_registry, submit_deposit_wrapper, DepositSession},
//!   repository::Repository,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!   let repository: Repository = serde_json::from_str(&std::fs::read_to_string("zenodo.json")?)?;
//!   let paper: Paper = serde_json::from_str(&std::fs::read_to_string("paper.json")?)?;
//!   let user: User = serde_json::from_str(&std::fs::read_to_string("user.json")?)?;
//!
//!   let protocol = default_registry().instantiate(repository)?;
//!   let mut session = DepositSession::new(protocol);
//!   if !session.init_deposit(paper, user) {
//!     println!("Already deposited there");
//!     return Ok(());
//!   }
//!
//!   let form = session.get_form()?;
//!   let db = Database::open(Database::default_path()).await?;
//!   let pdf = UploadedPdf::new("article.pdf");
//!   let result =
//!     submit_deposit_wrapper(&mut session, &ReqwestTransport::new()?, &db, &pdf, &form, false)
//!       .await;
//!   println!("{}: {:?}", result.status, result.splash_url);
//!
//!   Ok(())
//! }
//! ```

#![warn(missing_docs, clippy::missing_docs_in_private_items)]
use std::{
  collections::BTreeMap,
  fmt,
  path::{Path, PathBuf},
  str::FromStr,
};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, trace, warn};
#[cfg(test)] use tracing_test::traced_test;

pub mod database;
pub mod errors;
pub mod form;
pub mod format;
pub mod http;
pub mod metadata;
pub mod mets;
pub mod paper;
pub mod protocol;
pub mod repository;
pub mod result;
#[cfg(test)] mod tests;

use errors::DepositError;
pub use form::{DepositData, Form, FormData, FormErrors};
use http::{HttpRequest, HttpResponse, Transport};
use metadata::{xml::Element, Document, MetadataFormatter};
pub use paper::{Author, OaiRecord, Paper, PubType, Publication, UploadedPdf, User};
pub use protocol::{
  submit_deposit_wrapper, DepositSession, PaperCatalog, ProtocolRegistry, RepositoryProtocol,
};
pub use repository::{EmbargoPolicy, License, LicenseChooser, Repository};
pub use result::{DepositLog, DepositRecord, DepositResult, DepositStatus};
