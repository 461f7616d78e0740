//! Deposits on Zenodo through its REST deposition API.
//!
//! The choreography is: check the token, create an empty deposition, upload the PDF to it, set
//! its metadata, then publish it. A dry run deletes the deposition instead of publishing it, and a
//! failure before publication deletes it on a best-effort basis so that no half-filled draft is
//! left behind.

use super::*;
use crate::{metadata::zenodo::ZenodoFormatter, result::AdditionalInfo};

/// Registered identifier
pub const ZENODO: &str = "zenodo";

/// Production deposition endpoint
pub const ZENODO_ENDPOINT: &str = "https://zenodo.org/api/deposit/depositions";

/// Internal representation of a deposition as returned by the API.
#[derive(Debug, Deserialize)]
struct Deposition {
  /// Deposition id
  id:    u64,
  /// Links to the deposition's pages
  #[serde(default)]
  links: DepositionLinks,
  /// Files attached to the deposition
  #[serde(default)]
  files: Vec<DepositionFile>,
  /// DOI minted by Zenodo once published
  #[serde(default)]
  doi:   Option<String>,
}

/// Links of a deposition.
#[derive(Debug, Default, Deserialize)]
struct DepositionLinks {
  /// Landing page of the published record
  record_html: Option<String>,
  /// Landing page of the deposition
  html:        Option<String>,
}

/// A file of a deposition.
#[derive(Debug, Deserialize)]
struct DepositionFile {
  /// Links of the file
  links: FileLinks,
}

/// Links of a deposition file.
#[derive(Debug, Deserialize)]
struct FileLinks {
  /// Direct download link
  download: Option<String>,
}

/// Creates an empty deposition and returns its id.
///
/// # Errors
///
/// Returns [`DepositError::UnexpectedStatus`] unless Zenodo answers 201, and
/// [`DepositError::InvalidResponse`] if the answer carries no id.
pub async fn create_empty_publication(
  transport: &dyn Transport,
  endpoint: &str,
  api_key: &str,
  log: &mut DepositLog,
) -> Result<u64, DepositError> {
  log.log("### Creating a new deposition");
  let request = HttpRequest::post(endpoint).query("access_token", api_key).json(json!({}));
  let response = transport.send(request).await?;
  log.log_request(&response, 201, "Unable to create a new deposition on Zenodo.")?;
  let deposition: Deposition = response.json()?;
  log.log(format!("Created deposition {}", deposition.id));
  Ok(deposition.id)
}

/// Zenodo protocol.
#[derive(Debug, Clone)]
pub struct ZenodoProtocol {
  /// Target repository
  repository: Repository,
}

impl ZenodoProtocol {
  /// Binds the protocol to `repository`.
  pub fn new(repository: Repository) -> Self { Self { repository } }

  /// [`ZenodoProtocol::new`] as a registry constructor.
  pub fn boxed(repository: Repository) -> Box<dyn RepositoryProtocol> { Box::new(Self::new(repository)) }

  /// Uploads the PDF and sets the metadata of deposition `id`.
  #[allow(clippy::too_many_arguments)]
  async fn fill_deposition(
    &self,
    transport: &dyn Transport,
    deposition_url: &str,
    api_key: &str,
    filename: &str,
    pdf: Vec<u8>,
    metadata: Value,
    log: &mut DepositLog,
  ) -> Result<(), DepositError> {
    log.log("### Uploading the PDF");
    let request = HttpRequest::post(join_url(deposition_url, "files"))
      .query("access_token", api_key)
      .multipart(vec![("name".to_string(), filename.to_string())], "file", filename, "application/pdf", pdf);
    let response = transport.send(request).await?;
    log.log_request(&response, 201, "Unable to transfer the document to Zenodo.")?;

    log.log("### Setting the metadata");
    let request = HttpRequest::put(deposition_url).query("access_token", api_key).json(metadata);
    let response = transport.send(request).await?;
    log.log_request(&response, 200, "Unable to set the metadata of the deposition on Zenodo.")
  }

  /// Publishes the filled deposition.
  async fn publish_deposition(
    &self,
    transport: &dyn Transport,
    deposition_url: &str,
    api_key: &str,
    log: &mut DepositLog,
  ) -> Result<Deposition, DepositError> {
    log.log("### Publishing the deposition");
    let request =
      HttpRequest::post(join_url(deposition_url, "actions/publish")).query("access_token", api_key);
    let response = transport.send(request).await?;
    log.log_request(&response, 202, "Unable to publish the deposition on Zenodo.")?;
    response.json()
  }

  /// Deletes deposition `id`.
  async fn delete_deposition(
    &self,
    transport: &dyn Transport,
    deposition_url: &str,
    api_key: &str,
    log: &mut DepositLog,
  ) -> Result<(), DepositError> {
    log.log("### Deleting the deposition");
    let request = HttpRequest::delete(deposition_url).query("access_token", api_key);
    let response = transport.send(request).await?;
    log.log_request(&response, 204, "Unable to delete the deposition on Zenodo.")
  }
}

#[async_trait]
impl RepositoryProtocol for ZenodoProtocol {
  fn id(&self) -> &'static str { ZENODO }

  fn repository(&self) -> &Repository { &self.repository }

  fn endpoint(&self) -> Option<String> { Some(self.repository.endpoint_or(ZENODO_ENDPOINT)) }

  fn requires_abstract(&self) -> bool { true }

  async fn submit_deposit(
    &self,
    deposit: &Deposit<'_>,
    transport: &dyn Transport,
    log: &mut DepositLog,
  ) -> Result<DepositResult, DepositError> {
    let api_key = self.repository.api_key()?;
    let endpoint = self.repository.endpoint_or(ZENODO_ENDPOINT);

    let metadata = match ZenodoFormatter.render(deposit.paper, None, deposit.data)? {
      Document::Json(metadata) => metadata,
      Document::Xml(_) => return Err(DepositError::Xml("Zenodo metadata must be JSON".to_string())),
    };
    let pdf = deposit.pdf.read().await?;

    log.log("### Checking the API key");
    let response = transport.send(HttpRequest::get(&endpoint).query("access_token", api_key)).await?;
    log.log_request(&response, 200, "Zenodo rejected the API key.")?;

    let id = create_empty_publication(transport, &endpoint, api_key, log).await?;
    let deposition_url = join_url(&endpoint, &id.to_string());
    let filename = format::pdf_file_name(&deposit.paper.title);

    let outcome = match self
      .fill_deposition(transport, &deposition_url, api_key, &filename, pdf, metadata, log)
      .await
    {
      Ok(()) if deposit.dry_run => Ok(None),
      Ok(()) => self.publish_deposition(transport, &deposition_url, api_key, log).await.map(Some),
      Err(err) => Err(err),
    };

    let published = match outcome {
      Ok(Some(published)) => published,
      Ok(None) => {
        self.delete_deposition(transport, &deposition_url, api_key, log).await?;
        let mut result = DepositResult::new(DepositStatus::DrySuccess);
        result.identifier = Some(id.to_string());
        return Ok(result);
      },
      Err(err) => {
        log.log("Removing the unpublished deposition");
        if let Err(cleanup) = self.delete_deposition(transport, &deposition_url, api_key, log).await {
          warn!("Could not delete Zenodo deposition {id}: {cleanup}");
        }
        return Err(err);
      },
    };

    let mut result = DepositResult::new(DepositStatus::Pending)
      .published_or_embargoed(deposit.data.embargo_date, Utc::now().date_naive());
    result.identifier = Some(published.id.to_string());
    result.splash_url = published.links.record_html.or(published.links.html);
    result.pdf_url = published.files.into_iter().find_map(|file| file.links.download);
    if let Some(doi) = published.doi {
      result.additional_info.push(AdditionalInfo::new("DOI", doi));
    }
    Ok(result)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    http::{Body, Method},
    tests::{cc_by, full_paper, minimal_paper, temp_pdf, test_user, zenodo_repository, ScriptedTransport},
  };

  const PUBLISHED: &str = r#"{
    "id": 1,
    "doi": "10.5281/zenodo.1",
    "links": {"record_html": "https://zenodo.org/record/1", "html": "https://zenodo.org/deposit/1"},
    "files": [{"links": {"download": "https://zenodo.org/api/files/abc/article.pdf"}}]
  }"#;

  fn zenodo_data() -> DepositData {
    DepositData { license: Some(cc_by()), ..Default::default() }
  }

  #[tokio::test]
  async fn test_create_empty_publication() -> anyhow::Result<()> {
    let transport = ScriptedTransport::new().respond(201, r#"{"id": 1}"#);
    let id = create_empty_publication(&transport, ZENODO_ENDPOINT, "token", &mut DepositLog::new()).await?;
    assert_eq!(id, 1);
    assert_eq!(transport.requests()[0].query, vec![("access_token".to_string(), "token".to_string())]);

    let transport = ScriptedTransport::new().respond(500, "Internal Server Error");
    let err = create_empty_publication(&transport, ZENODO_ENDPOINT, "token", &mut DepositLog::new())
      .await
      .unwrap_err();
    assert!(matches!(err, DepositError::UnexpectedStatus { expected: 201, found: 500, .. }));
    Ok(())
  }

  #[tokio::test]
  async fn test_missing_api_key_makes_no_request() -> anyhow::Result<()> {
    let (_dir, pdf) = temp_pdf()?;
    let (paper, user, data) = (full_paper(), test_user(), zenodo_data());
    let mut repository = zenodo_repository();
    repository.api_key = None;
    let transport = ScriptedTransport::new();

    let deposit = Deposit { paper: &paper, user: &user, pdf: &pdf, data: &data, dry_run: false };
    let err = ZenodoProtocol::new(repository)
      .submit_deposit(&deposit, &transport, &mut DepositLog::new())
      .await
      .unwrap_err();

    assert!(err.is_configuration_error());
    assert!(transport.requests().is_empty());
    Ok(())
  }

  #[tokio::test]
  async fn test_missing_abstract_makes_no_request() -> anyhow::Result<()> {
    let (_dir, pdf) = temp_pdf()?;
    let (paper, user, data) = (minimal_paper(), test_user(), zenodo_data());
    let transport = ScriptedTransport::new();

    let deposit = Deposit { paper: &paper, user: &user, pdf: &pdf, data: &data, dry_run: false };
    let err = ZenodoProtocol::new(zenodo_repository())
      .submit_deposit(&deposit, &transport, &mut DepositLog::new())
      .await
      .unwrap_err();

    assert!(matches!(err, DepositError::MissingMetadata(_)));
    assert!(transport.requests().is_empty());
    Ok(())
  }

  #[tokio::test]
  async fn test_publication() -> anyhow::Result<()> {
    let (_dir, pdf) = temp_pdf()?;
    let (paper, user, data) = (full_paper(), test_user(), zenodo_data());
    let transport = ScriptedTransport::new()
      .respond(200, "[]")
      .respond(201, r#"{"id": 1}"#)
      .respond(201, r#"{"id": "file"}"#)
      .respond(200, r#"{"id": 1}"#)
      .respond(202, PUBLISHED);
    let mut log = DepositLog::new();

    let deposit = Deposit { paper: &paper, user: &user, pdf: &pdf, data: &data, dry_run: false };
    let result = ZenodoProtocol::new(zenodo_repository()).submit_deposit(&deposit, &transport, &mut log).await?;

    assert_eq!(result.status, DepositStatus::Published);
    assert_eq!(result.identifier.as_deref(), Some("1"));
    assert_eq!(result.splash_url.as_deref(), Some("https://zenodo.org/record/1"));
    assert_eq!(result.pdf_url.as_deref(), Some("https://zenodo.org/api/files/abc/article.pdf"));
    assert_eq!(result.additional_info[0].value, "10.5281/zenodo.1");

    let requests = transport.requests();
    let calls: Vec<(Method, &str)> =
      requests.iter().map(|request| (request.method, request.url.as_str())).collect();
    assert_eq!(
      calls,
      vec![
        (Method::Get, ZENODO_ENDPOINT),
        (Method::Post, ZENODO_ENDPOINT),
        (Method::Post, "https://zenodo.org/api/deposit/depositions/1/files"),
        (Method::Put, "https://zenodo.org/api/deposit/depositions/1"),
        (Method::Post, "https://zenodo.org/api/deposit/depositions/1/actions/publish"),
      ]
    );
    let Body::Json(metadata) = &requests[3].body else { panic!("expected JSON metadata") };
    assert_eq!(metadata["metadata"]["license"], "cc-by");
    assert!(matches!(&requests[2].body, Body::Multipart { file_field, .. } if file_field == "file"));
    Ok(())
  }

  #[tokio::test]
  async fn test_embargoed_publication() -> anyhow::Result<()> {
    let (_dir, pdf) = temp_pdf()?;
    let (paper, user) = (full_paper(), test_user());
    let data = DepositData { embargo_date: NaiveDate::from_ymd_opt(2999, 1, 1), ..zenodo_data() };
    let transport = ScriptedTransport::new()
      .respond(200, "[]")
      .respond(201, r#"{"id": 1}"#)
      .respond(201, "{}")
      .respond(200, "{}")
      .respond(202, PUBLISHED);

    let deposit = Deposit { paper: &paper, user: &user, pdf: &pdf, data: &data, dry_run: false };
    let result = ZenodoProtocol::new(zenodo_repository())
      .submit_deposit(&deposit, &transport, &mut DepositLog::new())
      .await?;

    assert_eq!(result.status, DepositStatus::Embargoed);
    assert_eq!(result.embargo_date, NaiveDate::from_ymd_opt(2999, 1, 1));
    Ok(())
  }

  #[tokio::test]
  async fn test_dry_run_deletes_the_deposition() -> anyhow::Result<()> {
    let (_dir, pdf) = temp_pdf()?;
    let (paper, user, data) = (full_paper(), test_user(), zenodo_data());
    let transport = ScriptedTransport::new()
      .respond(200, "[]")
      .respond(201, r#"{"id": 1}"#)
      .respond(201, "{}")
      .respond(200, "{}")
      .respond(204, "");

    let deposit = Deposit { paper: &paper, user: &user, pdf: &pdf, data: &data, dry_run: true };
    let result = ZenodoProtocol::new(zenodo_repository())
      .submit_deposit(&deposit, &transport, &mut DepositLog::new())
      .await?;

    assert_eq!(result.status, DepositStatus::DrySuccess);
    let requests = transport.requests();
    assert_eq!(requests.len(), 5);
    assert_eq!(requests[4].method, Method::Delete);
    assert_eq!(requests[4].url, "https://zenodo.org/api/deposit/depositions/1");
    Ok(())
  }

  #[tokio::test]
  async fn test_failed_upload_removes_the_deposition() -> anyhow::Result<()> {
    let (_dir, pdf) = temp_pdf()?;
    let (paper, user, data) = (full_paper(), test_user(), zenodo_data());
    let transport = ScriptedTransport::new()
      .respond(200, "[]")
      .respond(201, r#"{"id": 1}"#)
      .respond(400, r#"{"message": "File too large"}"#)
      .respond(204, "");
    let mut log = DepositLog::new();

    let deposit = Deposit { paper: &paper, user: &user, pdf: &pdf, data: &data, dry_run: false };
    let err = ZenodoProtocol::new(zenodo_repository())
      .submit_deposit(&deposit, &transport, &mut log)
      .await
      .unwrap_err();

    assert_eq!(err.user_message(), "Unable to transfer the document to Zenodo.");
    let requests = transport.requests();
    assert_eq!(requests.last().unwrap().method, Method::Delete);
    assert!(log.to_text().contains("File too large"));
    Ok(())
  }

  #[tokio::test]
  async fn test_failed_publication_removes_the_deposition() -> anyhow::Result<()> {
    let (_dir, pdf) = temp_pdf()?;
    let (paper, user, data) = (full_paper(), test_user(), zenodo_data());
    let transport = ScriptedTransport::new()
      .respond(200, "[]")
      .respond(201, r#"{"id": 1}"#)
      .respond(201, "{}")
      .respond(200, "{}")
      .respond(500, r#"{"message": "Internal error"}"#)
      .respond(204, "");
    let mut log = DepositLog::new();

    let deposit = Deposit { paper: &paper, user: &user, pdf: &pdf, data: &data, dry_run: false };
    let err = ZenodoProtocol::new(zenodo_repository())
      .submit_deposit(&deposit, &transport, &mut log)
      .await
      .unwrap_err();

    assert_eq!(err.user_message(), "Unable to publish the deposition on Zenodo.");
    let requests = transport.requests();
    assert_eq!(requests.len(), 6);
    assert_eq!(requests[5].method, Method::Delete);
    assert_eq!(requests[5].url, "https://zenodo.org/api/deposit/depositions/1");
    assert!(log.to_text().contains("Removing the unpublished deposition"));
    Ok(())
  }

  #[tokio::test]
  async fn test_rejected_token() -> anyhow::Result<()> {
    let (_dir, pdf) = temp_pdf()?;
    let (paper, user, data) = (full_paper(), test_user(), zenodo_data());
    let transport = ScriptedTransport::new().respond(401, r#"{"message": "invalid token"}"#);

    let deposit = Deposit { paper: &paper, user: &user, pdf: &pdf, data: &data, dry_run: false };
    let err = ZenodoProtocol::new(zenodo_repository())
      .submit_deposit(&deposit, &transport, &mut DepositLog::new())
      .await
      .unwrap_err();

    assert_eq!(err.user_message(), "Zenodo rejected the API key.");
    assert_eq!(transport.requests().len(), 1);
    Ok(())
  }
}
