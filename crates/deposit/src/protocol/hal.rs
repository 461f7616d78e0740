//! Deposits on HAL through its SWORD endpoint.
//!
//! HAL takes a zip holding `meta.xml` (TEI in the AOfr profile) and the PDF referenced from it.
//! Deposits go through moderation, so a successful submission is always pending. The depositor
//! picks a scientific domain, may give the structure id of their laboratory, and says which of
//! the authors they are.

use super::*;
use crate::{
  form::{fields, Choice},
  metadata::tei::TeiFormatter,
  mets,
};

/// Registered identifier
pub const HAL: &str = "hal";

/// Production SWORD endpoint
pub const HAL_ENDPOINT: &str = "https://api.archives-ouvertes.fr/sword/hal/";

/// SWORD packaging identifier of the AOfr profile
pub const PACKAGING: &str = "http://purl.org/net/sword-types/AOfr";

/// Top-level HAL domains offered in the topic field.
pub const DOMAINS: [(&str, &str); 13] = [
  ("chim", "Chemical Sciences"),
  ("info", "Computer Science"),
  ("sde", "Environmental Sciences"),
  ("sdv", "Life Sciences"),
  ("math", "Mathematics"),
  ("nlin", "Nonlinear Sciences"),
  ("phys", "Physics"),
  ("qfin", "Quantitative Finance"),
  ("scco", "Cognitive Science"),
  ("sdu", "Planet and Universe"),
  ("shs", "Humanities and Social Sciences"),
  ("spi", "Engineering Sciences"),
  ("stat", "Statistics"),
];

/// HAL protocol.
#[derive(Debug, Clone)]
pub struct HalProtocol {
  /// Target repository
  repository: Repository,
}

impl HalProtocol {
  /// Binds the protocol to `repository`.
  pub fn new(repository: Repository) -> Self { Self { repository } }

  /// [`HalProtocol::new`] as a registry constructor.
  pub fn boxed(repository: Repository) -> Box<dyn RepositoryProtocol> { Box::new(Self::new(repository)) }
}

#[async_trait]
impl RepositoryProtocol for HalProtocol {
  fn id(&self) -> &'static str { HAL }

  fn repository(&self) -> &Repository { &self.repository }

  fn endpoint(&self) -> Option<String> { Some(self.repository.endpoint_or(HAL_ENDPOINT)) }

  fn form_fields(&self, paper: &Paper, user: &User) -> Vec<FormField> {
    let topics = DOMAINS.iter().map(|(code, label)| Choice::new(*code, *label)).collect();
    vec![
      FormField::new(fields::TOPIC, "Scientific field", FieldKind::Choice(topics)).required(),
      FormField::new(fields::AFFILIATION, "Laboratory", FieldKind::Text)
        .help("HAL structure id of your laboratory"),
      depositing_author_field(paper, user),
    ]
  }

  async fn submit_deposit(
    &self,
    deposit: &Deposit<'_>,
    transport: &dyn Transport,
    log: &mut DepositLog,
  ) -> Result<DepositResult, DepositError> {
    let (username, password) = self.repository.basic_auth()?;
    let endpoint = self.repository.endpoint_or(HAL_ENDPOINT);

    log.log("### Generating the TEI metadata");
    let filename = format::pdf_file_name(&deposit.paper.title);
    let tei = TeiFormatter.to_bytes(deposit.paper, Some(&filename), deposit.data)?;
    let pdf = deposit.pdf.read().await?;
    let package = mets::zip_entries(&[("meta.xml", tei.as_slice()), (filename.as_str(), pdf.as_slice())])?;

    log.log(format!("### Submitting to {endpoint}"));
    let request = HttpRequest::post(&endpoint)
      .basic_auth(&username, &password)
      .header("Packaging", PACKAGING)
      .header("Content-Disposition", "attachment; filename=meta.xml")
      .header("On-Behalf-Of", format!("loginFilter|{}", deposit.user.username))
      .bytes("application/zip", package);
    let response = transport.send(request).await?;
    log.log_request(&response, 202, "Unable to submit the paper to HAL.")?;

    let receipt = sword::AtomReceipt::parse(&response.body)?;
    let identifier = receipt
      .id
      .clone()
      .ok_or_else(|| DepositError::InvalidResponse("HAL did not return a deposit id".to_string()))?;
    log.log(format!("HAL assigned the identifier {identifier}"));

    let mut result = DepositResult::new(DepositStatus::Pending);
    result.splash_url = receipt.alternate.clone();
    result.identifier = Some(identifier.clone());

    if deposit.dry_run {
      log.log("### Deleting the dry-run deposit");
      let request = HttpRequest::delete(join_url(&endpoint, &identifier)).basic_auth(&username, &password);
      let response = transport.send(request).await?;
      log.log_request(&response, 204, "Unable to delete the dry-run deposit from HAL.")?;
      result.status = DepositStatus::DrySuccess;
    }
    Ok(result)
  }
}
