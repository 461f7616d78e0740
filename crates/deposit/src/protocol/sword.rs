//! SWORD v2 deposits of METS packages.
//!
//! The metadata (MODS or Dublin Core) is wrapped in a METS document, zipped with the PDF and
//! POSTed to the collection IRI in one authenticated request. The server answers with an Atom
//! deposit receipt; its `sword:originalDeposit` link, when present, is the public landing page.
//! Servers that process deposits asynchronously omit it, and the deposit is then pending.

use super::*;
use crate::{metadata, mets::{self, MdType}};

/// Identifier of the METS + MODS flavour
pub const SWORD_METS_MODS: &str = "sword_mets_mods";
/// Identifier of the METS + Dublin Core flavour
pub const SWORD_METS_DC: &str = "sword_mets_dc";

/// SWORD packaging identifier of METS packages carrying MODS.
pub const PACKAGING: &str = "http://purl.org/net/sword/package/METSMODS";

/// The parts of an Atom deposit receipt the protocols care about.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct AtomReceipt {
  /// `atom:id`
  pub id:               Option<String>,
  /// `link[@rel=edit]`, the Edit-IRI
  pub edit:             Option<String>,
  /// `link[@rel=alternate]`, a human-readable page
  pub alternate:        Option<String>,
  /// `sword:originalDeposit/@href`
  pub original_deposit: Option<String>,
}

impl AtomReceipt {
  /// Reads a receipt.
  ///
  /// # Errors
  ///
  /// Returns [`DepositError::InvalidResponse`] if the body is not an Atom entry.
  pub fn parse(body: &str) -> Result<Self, DepositError> {
    let entry = Element::parse(body)
      .map_err(|e| DepositError::InvalidResponse(format!("unreadable deposit receipt: {e}")))?;
    if entry.local_name() != "entry" {
      return Err(DepositError::InvalidResponse(format!(
        "expected an Atom entry, got <{}>",
        entry.name
      )));
    }

    let link = |rel: &str| {
      entry
        .find_all("link")
        .into_iter()
        .find(|link| link.attribute("rel") == Some(rel))
        .and_then(|link| link.attribute("href"))
        .map(str::to_string)
    };

    Ok(Self {
      id:               entry
        .find("id")
        .map(|id| id.text_content().trim().to_string())
        .filter(|id| !id.is_empty()),
      edit:             link("edit"),
      alternate:        link("alternate"),
      original_deposit: entry
        .descendant("originalDeposit")
        .and_then(|original| original.attribute("href"))
        .map(str::to_string),
    })
  }
}

/// SWORD v2 + METS protocol.
#[derive(Debug, Clone)]
pub struct SwordMetsProtocol {
  /// Target repository
  repository: Repository,
  /// Registered identifier
  id:         &'static str,
  /// Name of the metadata formatter, see [`metadata::formatter`]
  format:     &'static str,
  /// `MDTYPE` announced in the METS document
  md_type:    MdType,
}

impl SwordMetsProtocol {
  /// METS packages carrying MODS.
  pub fn mods(repository: Repository) -> Self {
    Self { repository, id: SWORD_METS_MODS, format: "mods", md_type: MdType::Mods }
  }

  /// METS packages carrying Dublin Core.
  pub fn dublin_core(repository: Repository) -> Self {
    Self { repository, id: SWORD_METS_DC, format: "dc", md_type: MdType::Dc }
  }

  /// [`SwordMetsProtocol::mods`] as a registry constructor.
  pub fn boxed_mods(repository: Repository) -> Box<dyn RepositoryProtocol> {
    Box::new(Self::mods(repository))
  }

  /// [`SwordMetsProtocol::dublin_core`] as a registry constructor.
  pub fn boxed_dublin_core(repository: Repository) -> Box<dyn RepositoryProtocol> {
    Box::new(Self::dublin_core(repository))
  }

  /// Deletes the deposit behind `edit_iri` after a dry run.
  async fn delete(
    &self,
    edit_iri: &str,
    credentials: &(String, String),
    transport: &dyn Transport,
    log: &mut DepositLog,
  ) -> Result<(), DepositError> {
    log.log("### Deleting the dry-run deposit");
    let request = HttpRequest::delete(edit_iri).basic_auth(&credentials.0, &credentials.1);
    let response = transport.send(request).await?;
    log.log_request(&response, 204, "Unable to delete the dry-run deposit.")
  }
}

#[async_trait]
impl RepositoryProtocol for SwordMetsProtocol {
  fn id(&self) -> &'static str { self.id }

  fn repository(&self) -> &Repository { &self.repository }

  async fn submit_deposit(
    &self,
    deposit: &Deposit<'_>,
    transport: &dyn Transport,
    log: &mut DepositLog,
  ) -> Result<DepositResult, DepositError> {
    let credentials = self.repository.basic_auth()?;
    let endpoint = self.repository.required_endpoint()?;

    log.log(format!("### Preparing the {} metadata", self.format));
    let formatter = metadata::formatter(self.format)
      .ok_or_else(|| DepositError::Configuration(format!("Unknown metadata format {}", self.format)))?;
    let metadata = formatter.render(deposit.paper, Some(mets::PDF_ENTRY), deposit.data)?.into_xml()?;
    let mets = mets::build_mets(metadata, self.md_type);
    let package = mets::build_package(&mets, &deposit.pdf.read().await?)?;

    log.log(format!("### Sending the package to {endpoint}"));
    let request = HttpRequest::post(&endpoint)
      .basic_auth(&credentials.0, &credentials.1)
      .header("Content-Disposition", "attachment; filename=mets.zip")
      .header("Packaging", PACKAGING)
      .header("In-Progress", if deposit.dry_run { "true" } else { "false" })
      .bytes("application/zip", package);
    let response = transport.send(request).await?;
    log.log_request(&response, 201, "Unable to deposit the package on the repository.")?;

    let receipt = AtomReceipt::parse(&response.body)?;
    let mut result = DepositResult::new(DepositStatus::Pending);
    result.identifier = receipt.id.clone();
    match &receipt.original_deposit {
      Some(href) => {
        result.splash_url = Some(href.clone());
        result.status = DepositStatus::Published;
      },
      None => log.log("The receipt has no original deposit link, the deposit is pending."),
    }

    if deposit.dry_run {
      match &receipt.edit {
        Some(edit_iri) => self.delete(edit_iri, &credentials, transport, log).await?,
        None => log.log("The receipt has no edit link, the dry-run deposit stays in progress."),
      }
      result.status = DepositStatus::DrySuccess;
    }
    Ok(result)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    http::{Body, Method},
    tests::{full_paper, sword_repository, temp_pdf, test_user, ScriptedTransport},
  };

  const RECEIPT: &str = r#"<?xml version="1.0" encoding="utf-8"?>
    <entry xmlns="http://www.w3.org/2005/Atom" xmlns:sword="http://purl.org/net/sword/terms/">
      <id>oai:repository.example:42</id>
      <link rel="edit" href="https://repository.example/sword/edit/42"/>
      <link rel="alternate" href="https://repository.example/view/42"/>
      <sword:originalDeposit href="https://repository.example/record/42"/>
    </entry>"#;

  const ASYNC_RECEIPT: &str = r#"<entry xmlns="http://www.w3.org/2005/Atom">
      <id>oai:repository.example:43</id>
    </entry>"#;

  #[test]
  fn test_receipt() {
    let receipt = AtomReceipt::parse(RECEIPT).unwrap();
    assert_eq!(receipt.id.as_deref(), Some("oai:repository.example:42"));
    assert_eq!(receipt.edit.as_deref(), Some("https://repository.example/sword/edit/42"));
    assert_eq!(receipt.alternate.as_deref(), Some("https://repository.example/view/42"));
    assert_eq!(receipt.original_deposit.as_deref(), Some("https://repository.example/record/42"));

    assert!(matches!(AtomReceipt::parse("<html/>"), Err(DepositError::InvalidResponse(_))));
    assert!(AtomReceipt::parse("not xml at all <").is_err());
  }

  #[tokio::test]
  async fn test_missing_credentials_make_no_request() -> anyhow::Result<()> {
    let (_dir, pdf) = temp_pdf()?;
    let (paper, user, data) = (full_paper(), test_user(), DepositData::default());
    let mut repository = sword_repository();
    repository.password = None;
    let protocol = SwordMetsProtocol::mods(repository);
    let transport = ScriptedTransport::new();

    let deposit = Deposit { paper: &paper, user: &user, pdf: &pdf, data: &data, dry_run: false };
    let err = protocol.submit_deposit(&deposit, &transport, &mut DepositLog::new()).await.unwrap_err();

    assert!(err.is_configuration_error());
    assert!(transport.requests().is_empty());
    Ok(())
  }

  #[tokio::test]
  async fn test_deposit_published() -> anyhow::Result<()> {
    let (_dir, pdf) = temp_pdf()?;
    let (paper, user, data) = (full_paper(), test_user(), DepositData::default());
    let protocol = SwordMetsProtocol::mods(sword_repository());
    let transport = ScriptedTransport::new().respond(201, RECEIPT);
    let mut log = DepositLog::new();

    let deposit = Deposit { paper: &paper, user: &user, pdf: &pdf, data: &data, dry_run: false };
    let result = protocol.submit_deposit(&deposit, &transport, &mut log).await?;

    assert_eq!(result.status, DepositStatus::Published);
    assert_eq!(result.splash_url.as_deref(), Some("https://repository.example/record/42"));
    assert_eq!(result.identifier.as_deref(), Some("oai:repository.example:42"));

    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request.method, Method::Post);
    assert_eq!(request.url, "https://repository.example/sword/collection");
    assert_eq!(request.header_value("Packaging"), Some(PACKAGING));
    assert_eq!(request.header_value("In-Progress"), Some("false"));
    let Body::Bytes { content_type, data } = &request.body else { panic!("expected a zip body") };
    assert_eq!(content_type, "application/zip");
    let archive = zip::ZipArchive::new(std::io::Cursor::new(data.clone()))?;
    assert_eq!(archive.len(), 2);
    assert!(log.to_text().contains("Status code: 201"));
    Ok(())
  }

  #[tokio::test]
  async fn test_receipt_without_original_deposit_is_pending() -> anyhow::Result<()> {
    let (_dir, pdf) = temp_pdf()?;
    let (paper, user, data) = (full_paper(), test_user(), DepositData::default());
    let protocol = SwordMetsProtocol::dublin_core(sword_repository());
    let transport = ScriptedTransport::new().respond(201, ASYNC_RECEIPT);

    let deposit = Deposit { paper: &paper, user: &user, pdf: &pdf, data: &data, dry_run: false };
    let result = protocol.submit_deposit(&deposit, &transport, &mut DepositLog::new()).await?;

    assert_eq!(result.status, DepositStatus::Pending);
    assert!(result.splash_url.is_none());
    Ok(())
  }

  #[tokio::test]
  async fn test_dry_run_deletes_the_deposit() -> anyhow::Result<()> {
    let (_dir, pdf) = temp_pdf()?;
    let (paper, user, data) = (full_paper(), test_user(), DepositData::default());
    let protocol = SwordMetsProtocol::mods(sword_repository());
    let transport = ScriptedTransport::new().respond(201, RECEIPT).respond(204, "");

    let deposit = Deposit { paper: &paper, user: &user, pdf: &pdf, data: &data, dry_run: true };
    let result = protocol.submit_deposit(&deposit, &transport, &mut DepositLog::new()).await?;

    assert_eq!(result.status, DepositStatus::DrySuccess);
    let requests = transport.requests();
    assert_eq!(requests[0].header_value("In-Progress"), Some("true"));
    assert_eq!(requests[1].method, Method::Delete);
    assert_eq!(requests[1].url, "https://repository.example/sword/edit/42");
    Ok(())
  }

  #[tokio::test]
  async fn test_server_error() -> anyhow::Result<()> {
    let (_dir, pdf) = temp_pdf()?;
    let (paper, user, data) = (full_paper(), test_user(), DepositData::default());
    let protocol = SwordMetsProtocol::mods(sword_repository());
    let transport = ScriptedTransport::new().respond(500, "Internal Server Error");
    let mut log = DepositLog::new();

    let deposit = Deposit { paper: &paper, user: &user, pdf: &pdf, data: &data, dry_run: false };
    let err = protocol.submit_deposit(&deposit, &transport, &mut log).await.unwrap_err();

    assert!(matches!(err, DepositError::UnexpectedStatus { found: 500, .. }));
    assert!(log.to_text().contains("Internal Server Error"));
    Ok(())
  }
}
