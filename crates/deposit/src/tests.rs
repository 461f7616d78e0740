//! Fixtures shared by the unit tests of every module.

use std::{collections::VecDeque, sync::Mutex};

use tempfile::TempDir;

use super::*;
use crate::{metadata::xml::Node, protocol::Deposit};

pub fn full_paper() -> Paper {
  let mut paper = Paper::new(
    7,
    "The God of the Labyrinth",
    vec![
      Author::new("Herbert", "Quain").with_orcid("0000-0002-1825-0097"),
      Author::new("Pierre", "Menard"),
    ],
    NaiveDate::from_ymd_opt(2021, 6, 15).unwrap(),
    PubType::JournalArticle,
  );
  paper.abstract_text =
    Some("<p>A detective novel whose solution is <i>not</i> the one the reader expects.</p>".to_string());
  paper.publications.push(Publication {
    doi:           Some("10.1000/xyz123".to_string()),
    journal_title: Some("Journal of Imaginary Letters".to_string()),
    issn:          Some("1234-5678".to_string()),
    eissn:         Some("8765-4321".to_string()),
    volume:        Some("12".to_string()),
    issue:         Some("3".to_string()),
    pages:         Some("45-67".to_string()),
    publisher:     Some("Tlön University Press".to_string()),
    pubdate:       None,
  });
  paper
}

pub fn minimal_paper() -> Paper {
  Paper::new(
    8,
    "The approach to Al-Mu'tasim",
    vec![Author::new("Herbert", "Quain")],
    NaiveDate::from_ymd_opt(1936, 1, 1).unwrap(),
    PubType::Book,
  )
}

pub fn test_user() -> User {
  User {
    username:   "hquain".to_string(),
    first_name: "Herbert".to_string(),
    last_name:  "Quain".to_string(),
    email:      None,
    orcid:      Some("0000-0002-1825-0097".to_string()),
  }
}

pub fn cc_by() -> LicenseChooser {
  LicenseChooser {
    license:     License {
      name: "Creative Commons Attribution 4.0 International".to_string(),
      uri:  "https://creativecommons.org/licenses/by/4.0/".to_string(),
    },
    transmit_id: "cc-by".to_string(),
    default:     true,
  }
}

pub fn zenodo_repository() -> Repository {
  let mut repository = Repository::new("Zenodo", "zenodo");
  repository.api_key = Some("zenodo-token".to_string());
  repository.licenses = vec![cc_by()];
  repository
}

pub fn sword_repository() -> Repository {
  let mut repository = Repository::new("Test SWORD", "sword_mets_mods");
  repository.endpoint = Some("https://repository.example/sword/collection".to_string());
  repository.username = Some("depositor".to_string());
  repository.password = Some("secret".to_string());
  repository
}

pub fn hal_repository() -> Repository {
  let mut repository = Repository::new("HAL", "hal");
  repository.username = Some("depositor".to_string());
  repository.password = Some("secret".to_string());
  repository
}

pub fn osf_repository() -> Repository {
  let mut repository = Repository::new("OSF", "osf");
  repository.api_key = Some("osf-token".to_string());
  repository.licenses = vec![cc_by()];
  repository
}

pub fn dark_archive_repository() -> Repository { Repository::new("Dark archive", "dark_archive") }

/// A small PDF on disk. Keep the directory alive for as long as the file is used.
pub fn temp_pdf() -> anyhow::Result<(TempDir, UploadedPdf)> {
  let dir = tempfile::tempdir()?;
  let path = dir.path().join("article.pdf");
  std::fs::write(&path, b"%PDF-1.4\n1 0 obj << /Type /Catalog >> endobj\n%%EOF\n")?;
  Ok((dir, UploadedPdf::new(path)))
}

/// Local names of the elements with neither attributes nor content.
pub fn bare_elements(element: &Element) -> Vec<String> {
  let mut bare = Vec::new();
  if element.attributes.is_empty() && element.children.is_empty() {
    bare.push(element.local_name().to_string());
  }
  for child in &element.children {
    if let Node::Element(child) = child {
      bare.extend(bare_elements(child));
    }
  }
  bare
}

/// A transport answering with canned responses, in order, and remembering every request.
#[derive(Default)]
pub struct ScriptedTransport {
  responses: Mutex<VecDeque<(u16, String)>>,
  requests:  Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
  pub fn new() -> Self { Self::default() }

  pub fn respond(self, status: u16, body: &str) -> Self {
    self.responses.lock().unwrap().push_back((status, body.to_string()));
    self
  }

  pub fn requests(&self) -> Vec<HttpRequest> { self.requests.lock().unwrap().clone() }
}

#[async_trait]
impl Transport for ScriptedTransport {
  async fn send(&self, request: HttpRequest) -> Result<HttpResponse, DepositError> {
    self.requests.lock().unwrap().push(request.clone());
    let Some((status, body)) = self.responses.lock().unwrap().pop_front() else {
      return Err(DepositError::Transport(format!("no scripted response for {} {}", request.method, request.url)));
    };
    Ok(HttpResponse { method: request.method, url: request.url, status, body })
  }
}

/// A catalog remembering what it was asked to record.
#[derive(Default)]
pub struct RecordingCatalog {
  records:    Mutex<Vec<OaiRecord>>,
  statistics: Mutex<usize>,
}

impl RecordingCatalog {
  pub fn records(&self) -> Vec<OaiRecord> { self.records.lock().unwrap().clone() }

  pub fn statistics_updates(&self) -> usize { *self.statistics.lock().unwrap() }
}

#[async_trait]
impl PaperCatalog for RecordingCatalog {
  async fn add_oai_record(&self, _paper: &Paper, record: &OaiRecord) -> Result<(), DepositError> {
    self.records.lock().unwrap().push(record.clone());
    Ok(())
  }

  async fn update_statistics(&self, _paper: &Paper) -> Result<(), DepositError> {
    *self.statistics.lock().unwrap() += 1;
    Ok(())
  }
}

/// Returns a published deposit without touching the transport.
#[derive(Debug)]
pub struct SucceedingProtocol {
  repository: Repository,
}

impl SucceedingProtocol {
  pub fn new() -> Self {
    let mut repository = Repository::new("Fake", "fake");
    repository.oai_source = Some("fake".to_string());
    Self { repository }
  }
}

#[async_trait]
impl RepositoryProtocol for SucceedingProtocol {
  fn id(&self) -> &'static str { "fake" }

  fn repository(&self) -> &Repository { &self.repository }

  async fn submit_deposit(
    &self,
    deposit: &Deposit<'_>,
    _transport: &dyn Transport,
    log: &mut DepositLog,
  ) -> Result<DepositResult, DepositError> {
    log.log(format!("Pretending to deposit paper {}", deposit.paper.id));
    let status = if deposit.dry_run { DepositStatus::DrySuccess } else { DepositStatus::Published };
    let mut result = DepositResult::new(status);
    result.identifier = Some("1".to_string());
    result.splash_url = Some("https://repository.example/record/1".to_string());
    Ok(result)
  }
}

/// Fails as if the repository could not be reached.
#[derive(Debug)]
pub struct FailingProtocol;

#[async_trait]
impl RepositoryProtocol for FailingProtocol {
  fn id(&self) -> &'static str { "failing" }

  fn repository(&self) -> &Repository {
    lazy_static::lazy_static! {
      static ref REPOSITORY: Repository = Repository::new("Failing", "failing");
    }
    &REPOSITORY
  }

  async fn submit_deposit(
    &self,
    _deposit: &Deposit<'_>,
    _transport: &dyn Transport,
    _log: &mut DepositLog,
  ) -> Result<DepositResult, DepositError> {
    Err(DepositError::Transport("connection refused".to_string()))
  }
}

/// Panics in the middle of a submission.
#[derive(Debug)]
pub struct PanickingProtocol;

#[async_trait]
impl RepositoryProtocol for PanickingProtocol {
  fn id(&self) -> &'static str { "panicking" }

  fn repository(&self) -> &Repository {
    lazy_static::lazy_static! {
      static ref REPOSITORY: Repository = Repository::new("Panicking", "panicking");
    }
    &REPOSITORY
  }

  async fn submit_deposit(
    &self,
    _deposit: &Deposit<'_>,
    _transport: &dyn Transport,
    _log: &mut DepositLog,
  ) -> Result<DepositResult, DepositError> {
    panic!("the protocol exploded");
  }
}

#[test]
fn test_fixtures_are_consistent() {
  let paper = full_paper();
  assert_eq!(paper.doi(), Some("10.1000/xyz123"));
  assert!(zenodo_repository().validate().is_ok());
  assert!(sword_repository().validate().is_ok());
  assert_eq!(bare_elements(&Element::new("empty")), vec!["empty"]);
}

#[tokio::test]
async fn test_scripted_transport_runs_out() {
  let transport = ScriptedTransport::new().respond(200, "{}");
  assert!(transport.send(HttpRequest::get("https://repository.example/")).await.is_ok());
  let err = transport.send(HttpRequest::get("https://repository.example/")).await.unwrap_err();
  assert!(matches!(err, DepositError::Transport(_)));
  assert_eq!(transport.requests().len(), 2);
}
