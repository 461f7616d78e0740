//! Dark archive deposits.
//!
//! Nothing is sent anywhere: the protocol assembles everything an archiving system needs to
//! ingest the paper later and attaches it to the result as [`DepositResult::archive_metadata`].
//! The deposit stays pending until that system reports back.

use super::*;
use crate::result::AdditionalInfo;

/// Registered identifier
pub const DARK_ARCHIVE: &str = "dark_archive";

/// Dark archive protocol.
#[derive(Debug, Clone)]
pub struct DarkArchiveProtocol {
  /// Target repository
  repository: Repository,
}

impl DarkArchiveProtocol {
  /// Binds the protocol to `repository`.
  pub fn new(repository: Repository) -> Self { Self { repository } }

  /// [`DarkArchiveProtocol::new`] as a registry constructor.
  pub fn boxed(repository: Repository) -> Box<dyn RepositoryProtocol> { Box::new(Self::new(repository)) }

  /// The document handed to the archiving system.
  pub fn archive_metadata(&self, deposit: &Deposit<'_>) -> Value {
    let paper = deposit.paper;
    let authors: Vec<Value> = paper
      .authors
      .iter()
      .map(|author| {
        json!({
          "first_name": author.first_name,
          "last_name": author.last_name,
          "orcid": author.orcid,
        })
      })
      .collect();
    let email = deposit.data.email.clone().or_else(|| deposit.user.email.clone());

    json!({
      "paper": {
        "id": paper.id,
        "title": paper.title.trim(),
        "doctype": paper.doctype.as_str(),
        "pubdate": paper.pubdate.to_string(),
        "dois": paper.dois(),
        "abstract": crate::metadata::abstract_text(paper, deposit.data),
        "language": paper.language(),
      },
      "authors": authors,
      "depositor": {
        "username": deposit.user.username,
        "first_name": deposit.user.first_name,
        "last_name": deposit.user.last_name,
        "email": email,
        "orcid": deposit.user.orcid,
      },
      "license": deposit.data.license.as_ref().map(|chooser| json!({
        "name": chooser.license.name,
        "uri": chooser.license.uri,
        "transmit_id": chooser.transmit_id,
      })),
      "embargo_date": deposit.data.embargo_date.map(|date| date.to_string()),
      "file_url": deposit.pdf.location(),
      "file_name": deposit.pdf.file_name(),
      "repository": self.repository.name,
    })
  }
}

#[async_trait]
impl RepositoryProtocol for DarkArchiveProtocol {
  fn id(&self) -> &'static str { DARK_ARCHIVE }

  fn repository(&self) -> &Repository { &self.repository }

  fn form_fields(&self, _paper: &Paper, user: &User) -> Vec<FormField> {
    let email = FormField::new(crate::form::fields::EMAIL, "Contact email", FieldKind::Email).required();
    vec![match &user.email {
      Some(address) => email.initial(address.as_str()),
      None => email,
    }]
  }

  async fn submit_deposit(
    &self,
    deposit: &Deposit<'_>,
    _transport: &dyn Transport,
    log: &mut DepositLog,
  ) -> Result<DepositResult, DepositError> {
    log.log("### Preparing the metadata for the archive");
    let metadata = self.archive_metadata(deposit);
    log.log(serde_json::to_string_pretty(&metadata)?);

    let status = if deposit.dry_run { DepositStatus::DrySuccess } else { DepositStatus::Pending };
    let mut result = DepositResult::new(status);
    result.archive_metadata = Some(metadata);
    result.embargo_date = deposit.data.embargo_date;
    result.additional_info.push(AdditionalInfo::new(
      "Archive",
      format!("Paper {} is waiting to be ingested by {}.", deposit.paper.id, self.repository.name),
    ));
    Ok(result)
  }
}
