//! Deposit protocols and the machinery shared by all of them.
//!
//! A [`RepositoryProtocol`] implements one wire protocol against one configured [`Repository`].
//! The protocol itself is stateless: the per-attempt state (bound paper and user, lifecycle state,
//! request log) lives in a [`DepositSession`], and [`submit_deposit_wrapper`] is the single place
//! where failures are contained and the side effects of a successful deposit are applied.
//!
//! ```text
//! Uninitialized --init_deposit--> Initialized --get_form--> FormPending
//!     --submit_deposit_wrapper--> Submitting --> Succeeded | Failed
//! ```
//!
//! # Supported protocols
//!
//! - [`sword`]: SWORD v2 with a METS package (MODS or Dublin Core inside)
//! - [`hal`]: HAL's SWORD endpoint with TEI/AOfr metadata
//! - [`zenodo`]: Zenodo's REST deposition API
//! - [`osf`]: OSF's JSON:API (project + preprint)
//! - [`dark_archive`]: no network, hands the metadata to another system

use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;

use crate::{
  errors::GENERIC_FAILURE,
  form::{FieldKind, FormField},
};

pub mod dark_archive;
pub mod hal;
pub mod osf;
pub mod registry;
pub mod sword;
pub mod zenodo;

pub use registry::{default_registry, ProtocolConstructor, ProtocolRegistry};

use super::*;

/// Everything a protocol needs to carry out one submission.
#[derive(Debug, Clone, Copy)]
pub struct Deposit<'a> {
  /// The deposited paper
  pub paper:   &'a Paper,
  /// The depositing user
  pub user:    &'a User,
  /// The full text
  pub pdf:     &'a UploadedPdf,
  /// Validated form values
  pub data:    &'a DepositData,
  /// Run the whole choreography, then roll back instead of publishing
  pub dry_run: bool,
}

/// A deposit protocol bound to a repository configuration.
#[async_trait]
pub trait RepositoryProtocol: Send + Sync + fmt::Debug {
  /// Identifier under which the protocol is registered.
  fn id(&self) -> &'static str;

  /// The repository deposits go to.
  fn repository(&self) -> &Repository;

  /// The endpoint actually contacted, taking protocol defaults into account.
  fn endpoint(&self) -> Option<String> { self.repository().endpoint.clone() }

  /// Whether the repository can accept `paper` at all.
  fn can_deposit(&self, paper: &Paper) -> bool {
    !already_deposited(paper, self.repository(), self.endpoint().as_deref())
  }

  /// Whether the deposit form must carry an abstract.
  fn requires_abstract(&self) -> bool { false }

  /// Fields this protocol needs on top of the standard deposit form.
  fn form_fields(&self, _paper: &Paper, _user: &User) -> Vec<FormField> { Vec::new() }

  /// Carries out the submission, appending every exchange to `log`.
  ///
  /// # Errors
  ///
  /// Returns a [`DepositError`] for every foreseeable failure. Missing credentials are reported
  /// before any request is sent.
  async fn submit_deposit(
    &self,
    deposit: &Deposit<'_>,
    transport: &dyn Transport,
    log: &mut DepositLog,
  ) -> Result<DepositResult, DepositError>;
}

/// Whether one of the paper's OAI records already points at the repository.
///
/// A record matches when its source is the repository's OAI source, or when its splash URL lives
/// on the host of `endpoint` (see [`Repository::same_site`]).
pub fn already_deposited(paper: &Paper, repository: &Repository, endpoint: Option<&str>) -> bool {
  paper.oai_records.iter().any(|record| {
    let same_source = repository.oai_source.as_deref() == Some(record.source.as_str());
    let same_site = match (endpoint, record.splash_url.as_deref()) {
      (Some(endpoint), Some(splash)) => Repository::same_site(endpoint, splash),
      _ => false,
    };
    same_source || same_site
  })
}

/// Lifecycle of a deposit attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DepositState {
  /// No paper bound yet
  Uninitialized,
  /// Paper and user bound
  Initialized,
  /// The form was handed out
  FormPending,
  /// The protocol is running
  Submitting,
  /// The submission ended in a good state
  Succeeded,
  /// The submission failed
  Failed,
}

/// One deposit attempt of a paper by a user through a protocol.
#[derive(Debug)]
pub struct DepositSession {
  /// The protocol carrying out the attempt
  protocol: Box<dyn RepositoryProtocol>,
  /// Where the attempt stands
  state:    DepositState,
  /// Bound paper
  paper:    Option<Paper>,
  /// Bound user
  user:     Option<User>,
  /// Request log of the attempt
  log:      DepositLog,
}

impl DepositSession {
  /// Starts an uninitialized session.
  pub fn new(protocol: Box<dyn RepositoryProtocol>) -> Self {
    Self { protocol, state: DepositState::Uninitialized, paper: None, user: None, log: DepositLog::new() }
  }

  /// The protocol of the session.
  pub fn protocol(&self) -> &dyn RepositoryProtocol { self.protocol.as_ref() }

  /// Current lifecycle state.
  pub fn state(&self) -> DepositState { self.state }

  /// The request log so far.
  pub fn log(&self) -> &DepositLog { &self.log }

  /// The bound paper.
  pub fn paper(&self) -> Option<&Paper> { self.paper.as_ref() }

  /// Binds `paper` and `user`, discarding anything from a previous attempt.
  ///
  /// Returns whether the repository can accept the paper; `false` when it was already deposited
  /// there.
  pub fn init_deposit(&mut self, paper: Paper, user: User) -> bool {
    self.log.clear();
    let accepted = self.protocol.can_deposit(&paper);
    info!(
      "Deposit of paper {} by {} on {}: {}",
      paper.id,
      user.username,
      self.protocol.repository().name,
      if accepted { "initialized" } else { "already deposited" }
    );
    if !accepted {
      self.log.log(format!("Paper {} is already deposited on this repository.", paper.id));
    }
    self.paper = Some(paper);
    self.user = Some(user);
    self.state = DepositState::Initialized;
    accepted
  }

  /// The unbound deposit form, prefilled with defaults.
  ///
  /// # Errors
  ///
  /// Returns [`DepositError::NotInitialized`] before [`DepositSession::init_deposit`].
  pub fn get_form(&mut self) -> Result<Form, DepositError> {
    let (Some(paper), Some(user)) = (&self.paper, &self.user) else {
      return Err(DepositError::NotInitialized);
    };
    let form = Form::for_deposit(
      paper,
      self.protocol.repository(),
      self.protocol.requires_abstract(),
      self.protocol.form_fields(paper, user),
    );
    self.state = DepositState::FormPending;
    Ok(form)
  }

  /// The deposit form bound to submitted data.
  ///
  /// # Errors
  ///
  /// Returns [`DepositError::NotInitialized`] before [`DepositSession::init_deposit`].
  pub fn get_bound_form(&mut self, data: FormData) -> Result<Form, DepositError> {
    Ok(self.get_form()?.bind(data))
  }
}

/// Receives the side effects of successful deposits.
#[async_trait]
pub trait PaperCatalog: Send + Sync {
  /// Attaches a record of the new deposit to the paper.
  async fn add_oai_record(&self, paper: &Paper, record: &OaiRecord) -> Result<(), DepositError>;

  /// Recomputes the paper's availability statistics.
  async fn update_statistics(&self, paper: &Paper) -> Result<(), DepositError>;
}

/// Runs a submission and always returns a [`DepositResult`].
///
/// Form validation errors, [`DepositError`]s and panics of the protocol all end up as a failed
/// result with a user-facing message; the detail only goes to the request log, which is attached
/// to every result. After a successful real deposit, an [`OaiRecord`] pointing at the deposit is
/// handed to `catalog` and the paper's statistics are refreshed. Failures of the catalog are
/// logged and do not turn the deposit into a failure.
pub async fn submit_deposit_wrapper(
  session: &mut DepositSession,
  transport: &dyn Transport,
  catalog: &dyn PaperCatalog,
  pdf: &UploadedPdf,
  form: &Form,
  dry_run: bool,
) -> DepositResult {
  let (Some(paper), Some(user)) = (session.paper.clone(), session.user.clone()) else {
    warn!("Deposit submitted before init_deposit");
    session.state = DepositState::Failed;
    return DepositResult::failed(DepositError::NotInitialized.user_message());
  };

  let data = match form.validate() {
    Ok(data) => data,
    Err(errors) => {
      session.log.log(format!("Invalid deposit form: {errors}"));
      session.state = DepositState::Failed;
      let mut result = DepositResult::failed(format!("The deposit form is invalid: {errors}"));
      result.logs = session.log.to_text();
      return result;
    },
  };

  session.state = DepositState::Submitting;
  info!(
    "Submitting paper {} to {} with protocol {}{}",
    paper.id,
    session.protocol.repository().name,
    session.protocol.id(),
    if dry_run { " (dry run)" } else { "" }
  );

  let deposit = Deposit { paper: &paper, user: &user, pdf, data: &data, dry_run };
  let protocol = session.protocol.as_ref();
  let outcome =
    AssertUnwindSafe(protocol.submit_deposit(&deposit, transport, &mut session.log)).catch_unwind().await;

  let mut result = match outcome {
    Ok(Ok(result)) => result,
    Ok(Err(err)) => {
      warn!("Deposit of paper {} failed: {err}", paper.id);
      session.log.log(format!("Deposit failed: {err:?}"));
      DepositResult::failed(err.user_message())
    },
    Err(panic) => {
      let message = panic
        .downcast_ref::<&str>()
        .map(|message| message.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
      warn!("Protocol {} panicked: {message}", protocol.id());
      session.log.log(format!("Unexpected failure: {message}"));
      DepositResult::failed(GENERIC_FAILURE)
    },
  };

  if result.success() {
    if result.license.is_none() {
      result.license = data.license.as_ref().map(|chooser| chooser.license.clone());
    }
    if !dry_run && result.status != DepositStatus::DrySuccess {
      record_deposit(protocol, catalog, &paper, &mut result, &mut session.log).await;
    }
  }

  result.logs = session.log.to_text();
  session.state = if result.success() { DepositState::Succeeded } else { DepositState::Failed };
  debug!("Deposit of paper {} ended as {}", paper.id, result.status);
  result
}

/// Hands the new deposit to the catalog, logging instead of failing.
async fn record_deposit(
  protocol: &dyn RepositoryProtocol,
  catalog: &dyn PaperCatalog,
  paper: &Paper,
  result: &mut DepositResult,
  log: &mut DepositLog,
) {
  match result.identifier.clone().or_else(|| result.splash_url.clone()) {
    Some(identifier) => {
      let record = OaiRecord {
        source: protocol.repository().oai_source.clone().unwrap_or_else(|| protocol.id().to_string()),
        identifier,
        splash_url: result.splash_url.clone(),
        pdf_url: result.pdf_url.clone(),
      };
      match catalog.add_oai_record(paper, &record).await {
        Ok(()) => result.oai_record = Some(record),
        Err(err) => {
          warn!("Could not record the deposit of paper {}: {err}", paper.id);
          log.log(format!("Could not record the deposit: {err}"));
        },
      }
    },
    None => debug!("Deposit of paper {} has no identifier, no record created", paper.id),
  }
  if let Err(err) = catalog.update_statistics(paper).await {
    warn!("Could not update the statistics of paper {}: {err}", paper.id);
    log.log(format!("Could not update the paper statistics: {err}"));
  }
}

/// Joins an endpoint and a path with exactly one slash.
pub(crate) fn join_url(base: &str, path: &str) -> String {
  format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Choice field listing the authors of `paper`, preselecting the one matching `user`.
pub(crate) fn depositing_author_field(paper: &Paper, user: &User) -> FormField {
  let choices = paper
    .authors
    .iter()
    .enumerate()
    .map(|(index, author)| crate::form::Choice::new(index.to_string(), author.full_name()))
    .collect();
  let initial = paper
    .authors
    .iter()
    .position(|author| author.last_name.eq_ignore_ascii_case(&user.last_name))
    .unwrap_or(0);
  FormField::new(crate::form::fields::DEPOSITING_AUTHOR, "Depositing author", FieldKind::Choice(choices))
    .required()
    .initial(initial.to_string())
}
