//! Deposits on OSF Preprints through the OSF JSON:API.
//!
//! OSF has no single deposit call. The paper becomes a node (project), the PDF is uploaded to the
//! node's storage, the authors are added as unregistered contributors and the node gets its
//! license. Only then is a preprint created on top of the node and its file. A dry run stops
//! before the preprint and deletes the node.

use super::*;
use crate::metadata::osf::{self, OsfFormatter};

/// Registered identifier
pub const OSF: &str = "osf";

/// Production API root
pub const OSF_ENDPOINT: &str = "https://api.osf.io/v2/";

/// Public site, used to build landing pages when the API does not return one.
pub const OSF_SITE: &str = "https://osf.io";

/// A JSON:API document with a single resource.
#[derive(Debug, Deserialize)]
struct Resource {
  /// The resource
  data: ResourceData,
}

/// A JSON:API document with a list of resources.
#[derive(Debug, Deserialize)]
struct ResourceList {
  /// The resources
  data: Vec<ResourceData>,
}

/// Identity and links of a resource.
#[derive(Debug, Deserialize)]
struct ResourceData {
  /// Resource id
  #[serde(default)]
  id:    String,
  /// Links of the resource
  #[serde(default)]
  links: ResourceLinks,
}

/// Links of a resource, only the ones the choreography follows.
#[derive(Debug, Default, Deserialize)]
struct ResourceLinks {
  /// Upload URL of a storage provider
  upload: Option<String>,
  /// Public landing page
  html:   Option<String>,
}

/// OSF protocol.
#[derive(Debug, Clone)]
pub struct OsfProtocol {
  /// Target repository
  repository: Repository,
}

impl OsfProtocol {
  /// Binds the protocol to `repository`.
  pub fn new(repository: Repository) -> Self { Self { repository } }

  /// [`OsfProtocol::new`] as a registry constructor.
  pub fn boxed(repository: Repository) -> Box<dyn RepositoryProtocol> { Box::new(Self::new(repository)) }

  /// Builds the node: file upload, contributors and license. Returns the uploaded file id.
  #[allow(clippy::too_many_arguments)]
  async fn fill_node(
    &self,
    deposit: &Deposit<'_>,
    transport: &dyn Transport,
    endpoint: &str,
    token: &str,
    node_id: &str,
    license_id: &str,
    log: &mut DepositLog,
  ) -> Result<String, DepositError> {
    log.log("### Looking up the node storage");
    let request = HttpRequest::get(join_url(endpoint, &format!("nodes/{node_id}/files/"))).bearer_auth(token);
    let response = transport.send(request).await?;
    log.log_request(&response, 200, "Unable to find the storage of the OSF project.")?;
    let providers: ResourceList = response.json()?;
    let upload_url = providers
      .data
      .into_iter()
      .find_map(|provider| provider.links.upload)
      .ok_or_else(|| DepositError::InvalidResponse("OSF returned no storage provider".to_string()))?;

    log.log("### Uploading the PDF");
    let filename = format::pdf_file_name(&deposit.paper.title);
    let pdf = deposit.pdf.read().await?;
    let request = HttpRequest::put(upload_url)
      .bearer_auth(token)
      .query("kind", "file")
      .query("name", filename.as_str())
      .bytes("application/pdf", pdf);
    let response = transport.send(request).await?;
    log.log_request(&response, 201, "Unable to upload the document to OSF.")?;
    let file: Resource = response.json()?;
    let file_id = file.data.id.rsplit('/').next().unwrap_or_default().to_string();
    if file_id.is_empty() {
      return Err(DepositError::InvalidResponse("OSF returned no id for the uploaded file".to_string()));
    }

    log.log("### Adding the authors");
    let contributors_url = join_url(endpoint, &format!("nodes/{node_id}/contributors/"));
    for author in &deposit.paper.authors {
      let request = HttpRequest::post(&contributors_url)
        .bearer_auth(token)
        .query("send_email", "false")
        .json(osf::contributor(author));
      let response = transport.send(request).await?;
      log.log_request(&response, 201, "Unable to add the authors to the OSF project.")?;
    }

    log.log("### Setting the license");
    let request = HttpRequest::patch(join_url(endpoint, &format!("nodes/{node_id}/")))
      .bearer_auth(token)
      .json(osf::node_license(deposit.paper, node_id, license_id));
    let response = transport.send(request).await?;
    log.log_request(&response, 200, "Unable to set the license of the OSF project.")?;

    Ok(file_id)
  }

  /// Creates the preprint and gives it the node's license. Returns the preprint resource.
  #[allow(clippy::too_many_arguments)]
  async fn create_preprint(
    &self,
    deposit: &Deposit<'_>,
    transport: &dyn Transport,
    endpoint: &str,
    token: &str,
    node_id: &str,
    file_id: &str,
    license_id: &str,
    log: &mut DepositLog,
  ) -> Result<ResourceData, DepositError> {
    log.log("### Creating the preprint");
    let request = HttpRequest::post(join_url(endpoint, "preprints/"))
      .bearer_auth(token)
      .json(osf::preprint(deposit.paper, node_id, file_id));
    let response = transport.send(request).await?;
    log.log_request(&response, 201, "Unable to create the preprint on OSF.")?;
    let preprint: Resource = response.json()?;

    let request = HttpRequest::patch(join_url(endpoint, &format!("preprints/{}/", preprint.data.id)))
      .bearer_auth(token)
      .json(osf::preprint_license(deposit.paper, &preprint.data.id, license_id));
    let response = transport.send(request).await?;
    log.log_request(&response, 200, "Unable to set the license of the preprint on OSF.")?;

    Ok(preprint.data)
  }

  /// Deletes node `node_id`.
  async fn delete_node(
    &self,
    transport: &dyn Transport,
    endpoint: &str,
    token: &str,
    node_id: &str,
    log: &mut DepositLog,
  ) -> Result<(), DepositError> {
    log.log("### Deleting the project");
    let request = HttpRequest::delete(join_url(endpoint, &format!("nodes/{node_id}/"))).bearer_auth(token);
    let response = transport.send(request).await?;
    log.log_request(&response, 204, "Unable to delete the project on OSF.")
  }
}

#[async_trait]
impl RepositoryProtocol for OsfProtocol {
  fn id(&self) -> &'static str { OSF }

  fn repository(&self) -> &Repository { &self.repository }

  fn endpoint(&self) -> Option<String> { Some(self.repository.endpoint_or(OSF_ENDPOINT)) }

  async fn submit_deposit(
    &self,
    deposit: &Deposit<'_>,
    transport: &dyn Transport,
    log: &mut DepositLog,
  ) -> Result<DepositResult, DepositError> {
    let token = self.repository.api_key()?;
    let endpoint = self.repository.endpoint_or(OSF_ENDPOINT);
    let license_id = deposit
      .data
      .license
      .as_ref()
      .map(|chooser| chooser.transmit_id.clone())
      .ok_or_else(|| DepositError::MissingMetadata("OSF requires a license for every deposit.".to_string()))?;

    log.log("### Creating the project");
    let node = OsfFormatter.render(deposit.paper, None, deposit.data)?;
    let Document::Json(node) = node else {
      return Err(DepositError::Xml("OSF metadata must be JSON".to_string()));
    };
    let request = HttpRequest::post(join_url(&endpoint, "nodes/")).bearer_auth(token).json(node);
    let response = transport.send(request).await?;
    log.log_request(&response, 201, "Unable to create a project on OSF.")?;
    let node_id = response.json::<Resource>()?.data.id;
    log.log(format!("Created project {node_id}"));

    let outcome = match self.fill_node(deposit, transport, &endpoint, token, &node_id, &license_id, log).await
    {
      Ok(_) if deposit.dry_run => Ok(None),
      Ok(file_id) => self
        .create_preprint(deposit, transport, &endpoint, token, &node_id, &file_id, &license_id, log)
        .await
        .map(Some),
      Err(err) => Err(err),
    };

    let preprint = match outcome {
      Ok(preprint) => preprint,
      Err(err) => {
        log.log("Removing the incomplete project");
        if let Err(cleanup) = self.delete_node(transport, &endpoint, token, &node_id, log).await {
          warn!("Could not delete OSF node {node_id}: {cleanup}");
        }
        return Err(err);
      },
    };

    let Some(preprint) = preprint else {
      self.delete_node(transport, &endpoint, token, &node_id, log).await?;
      let mut result = DepositResult::new(DepositStatus::DrySuccess);
      result.identifier = Some(node_id);
      return Ok(result);
    };

    let splash_url = match preprint.links.html {
      Some(html) => html,
      None => format!("{OSF_SITE}/{}/", preprint.id),
    };
    let mut result = DepositResult::new(DepositStatus::Published);
    result.splash_url = Some(splash_url);
    result.identifier = Some(preprint.id);
    Ok(result)
  }
}
