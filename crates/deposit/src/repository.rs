//! Repository configuration: where deposits go and with which credentials.
//!
//! A [`Repository`] names its protocol (resolved through the
//! [`ProtocolRegistry`](crate::protocol::ProtocolRegistry)), an optional endpoint overriding the
//! protocol's default one, credentials, an embargo policy and the licenses a depositor may pick
//! from. Configuration is read-only during a deposit.

use url::Url;

use super::*;

/// Whether a repository accepts, requires or ignores embargo dates.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbargoPolicy {
  /// No embargo field is offered
  #[default]
  None,
  /// The depositor may set an embargo date
  Optional,
  /// The depositor must set an embargo date
  Required,
}

/// A license with its canonical URI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct License {
  /// Human-readable name, e.g. "Creative Commons Attribution 4.0 International"
  pub name: String,
  /// Canonical URI, e.g. `https://creativecommons.org/licenses/by/4.0/`
  pub uri:  String,
}

/// Binds a [`License`] to a repository together with the id the repository expects for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseChooser {
  /// The license itself
  pub license:     License,
  /// What gets transmitted to the repository (Zenodo's `cc-by`, an OSF license object id)
  pub transmit_id: String,
  /// Whether the form preselects this license
  #[serde(default)]
  pub default:     bool,
}

/// Configuration of a deposit target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repository {
  /// Display name
  pub name:               String,
  /// Identifier of the protocol implementation, see [`crate::protocol::registry`]
  pub protocol:           String,
  /// API endpoint, overriding the protocol default when set
  #[serde(default)]
  pub endpoint:           Option<String>,
  /// HTTP basic-auth user (SWORD family)
  #[serde(default)]
  pub username:           Option<String>,
  /// HTTP basic-auth password (SWORD family)
  #[serde(default)]
  pub password:           Option<String>,
  /// API token (Zenodo, OSF)
  #[serde(default)]
  pub api_key:            Option<String>,
  /// Disabled repositories cannot be instantiated
  #[serde(default = "enabled_by_default")]
  pub enabled:            bool,
  /// Embargo handling
  #[serde(default)]
  pub embargo:            EmbargoPolicy,
  /// OAI source under which successful deposits are recorded
  #[serde(default)]
  pub oai_source:         Option<String>,
  /// Licenses offered to the depositor
  #[serde(default)]
  pub licenses:           Vec<LicenseChooser>,
  /// Key of the letter of declaration to generate after a deposit, handled by the caller
  #[serde(default)]
  pub letter_declaration: Option<String>,
}

/// Serde default for [`Repository::enabled`].
fn enabled_by_default() -> bool { true }

impl Repository {
  /// Creates an enabled repository with no endpoint, credentials or licenses.
  pub fn new(name: impl Into<String>, protocol: impl Into<String>) -> Self {
    Self {
      name:               name.into(),
      protocol:           protocol.into(),
      endpoint:           None,
      username:           None,
      password:           None,
      api_key:            None,
      enabled:            true,
      embargo:            EmbargoPolicy::None,
      oai_source:         None,
      licenses:           Vec::new(),
      letter_declaration: None,
    }
  }

  /// The username and password for HTTP basic auth.
  ///
  /// # Errors
  ///
  /// Returns [`DepositError::Configuration`] if either is missing or empty.
  pub fn basic_auth(&self) -> Result<(String, String), DepositError> {
    match (non_empty(&self.username), non_empty(&self.password)) {
      (Some(username), Some(password)) => Ok((username.to_string(), password.to_string())),
      _ => Err(DepositError::Configuration(format!(
        "The repository {} is missing its username or password.",
        self.name
      ))),
    }
  }

  /// The API token.
  ///
  /// # Errors
  ///
  /// Returns [`DepositError::Configuration`] if the token is missing or empty.
  pub fn api_key(&self) -> Result<&str, DepositError> {
    non_empty(&self.api_key).ok_or_else(|| {
      DepositError::Configuration(format!("The repository {} is missing its API key.", self.name))
    })
  }

  /// The configured endpoint, or `default` when none is set.
  pub fn endpoint_or(&self, default: &str) -> String {
    non_empty(&self.endpoint).unwrap_or(default).to_string()
  }

  /// The configured endpoint, for protocols without a default one.
  ///
  /// # Errors
  ///
  /// Returns [`DepositError::Configuration`] if no endpoint is configured.
  pub fn required_endpoint(&self) -> Result<String, DepositError> {
    non_empty(&self.endpoint).map(str::to_string).ok_or_else(|| {
      DepositError::Configuration(format!("The repository {} has no endpoint.", self.name))
    })
  }

  /// The license preselected in deposit forms.
  pub fn default_license(&self) -> Option<&LicenseChooser> {
    self.licenses.iter().find(|chooser| chooser.default)
  }

  /// Looks up a license by the id transmitted to the repository.
  pub fn license(&self, transmit_id: &str) -> Option<&LicenseChooser> {
    self.licenses.iter().find(|chooser| chooser.transmit_id == transmit_id)
  }

  /// Checks invariants of the configuration that serde cannot express.
  ///
  /// # Errors
  ///
  /// Returns [`DepositError::Configuration`] if more than one license is marked as default or
  /// if the endpoint is not a valid URL.
  pub fn validate(&self) -> Result<(), DepositError> {
    let defaults = self.licenses.iter().filter(|chooser| chooser.default).count();
    if defaults > 1 {
      return Err(DepositError::Configuration(format!(
        "The repository {} marks {defaults} licenses as default, at most one is allowed.",
        self.name
      )));
    }
    if let Some(endpoint) = non_empty(&self.endpoint) {
      Url::parse(endpoint)?;
    }
    Ok(())
  }

  /// Host of a URL, lowercased and without a leading `www.`, `api.` or `sandbox.` label
  /// (`archives-ouvertes.fr` for `https://api.archives-ouvertes.fr/sword/hal/`).
  pub fn domain_of(url: &str) -> Option<String> {
    let url = Url::parse(url).ok()?;
    let host = url.host_str()?.to_ascii_lowercase();
    let stripped = SERVICE_LABELS.iter().find_map(|label| host.strip_prefix(label)).map(str::to_string);
    Some(stripped.unwrap_or(host))
  }

  /// Whether `url` lives on the host of `endpoint` or one of its subdomains.
  ///
  /// Hosts are compared whole, so two institutions under the same public suffix (`ac.uk`,
  /// `edu.au`) never match each other.
  pub fn same_site(endpoint: &str, url: &str) -> bool {
    match (Self::domain_of(endpoint), Self::domain_of(url)) {
      (Some(site), Some(host)) => host == site || host.ends_with(&format!(".{site}")),
      _ => false,
    }
  }
}

/// Leading host labels naming a service of a site rather than a different site.
const SERVICE_LABELS: [&str; 3] = ["www.", "api.", "sandbox."];

/// Treats empty strings as absent.
fn non_empty(value: &Option<String>) -> Option<&str> {
  value.as_deref().map(str::trim).filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn cc_by(default: bool) -> LicenseChooser {
    LicenseChooser {
      license: License {
        name: "Creative Commons Attribution 4.0 International".to_string(),
        uri:  "https://creativecommons.org/licenses/by/4.0/".to_string(),
      },
      transmit_id: "cc-by".to_string(),
      default,
    }
  }

  #[test]
  fn test_missing_credentials_are_configuration_errors() {
    let mut repository = Repository::new("Test SWORD", "sword_mets_mods");
    assert!(repository.basic_auth().unwrap_err().is_configuration_error());
    assert!(repository.api_key().unwrap_err().is_configuration_error());

    repository.username = Some("depositor".to_string());
    repository.password = Some("  ".to_string());
    assert!(repository.basic_auth().is_err());

    repository.password = Some("secret".to_string());
    assert_eq!(repository.basic_auth().unwrap(), ("depositor".to_string(), "secret".to_string()));
  }

  #[test]
  fn test_endpoint_defaults() {
    let mut repository = Repository::new("Zenodo", "zenodo");
    assert_eq!(repository.endpoint_or("https://zenodo.org/api"), "https://zenodo.org/api");
    assert!(repository.required_endpoint().is_err());

    repository.endpoint = Some("https://sandbox.zenodo.org/api".to_string());
    assert_eq!(repository.endpoint_or("https://zenodo.org/api"), "https://sandbox.zenodo.org/api");
  }

  #[test]
  fn test_single_default_license() {
    let mut repository = Repository::new("Zenodo", "zenodo");
    repository.licenses = vec![cc_by(true), cc_by(false)];
    assert!(repository.validate().is_ok());
    assert_eq!(repository.default_license().unwrap().transmit_id, "cc-by");

    repository.licenses = vec![cc_by(true), cc_by(true)];
    assert!(repository.validate().is_err());
  }

  #[test]
  fn test_invalid_endpoint_is_rejected() {
    let mut repository = Repository::new("Zenodo", "zenodo");
    repository.endpoint = Some("not a url".to_string());
    assert!(matches!(repository.validate(), Err(DepositError::InvalidUrl(_))));
  }

  #[test]
  fn test_domain_of() {
    assert_eq!(
      Repository::domain_of("https://api.archives-ouvertes.fr/sword/hal/").as_deref(),
      Some("archives-ouvertes.fr")
    );
    assert_eq!(Repository::domain_of("https://zenodo.org/record/1").as_deref(), Some("zenodo.org"));
    assert_eq!(Repository::domain_of("https://WWW.Example.org/").as_deref(), Some("example.org"));
    assert_eq!(Repository::domain_of("nonsense"), None);
  }

  #[test]
  fn test_same_site() {
    let hal = "https://api.archives-ouvertes.fr/sword/hal/";
    assert!(Repository::same_site(hal, "https://hal.archives-ouvertes.fr/hal-01234567"));
    assert!(Repository::same_site("https://api.osf.io/v2/", "https://osf.io/abcde/"));
    assert!(!Repository::same_site("https://zenodo.org/api", "https://notzenodo.org/record/1"));

    let soton = "https://eprints.soton.ac.uk/sword/collection";
    assert!(Repository::same_site(soton, "https://eprints.soton.ac.uk/1/"));
    assert!(!Repository::same_site(soton, "https://eprints.whiterose.ac.uk/1/"));
    assert!(!Repository::same_site(soton, "nonsense"));
  }

  #[test]
  fn test_repository_deserialization_defaults() {
    let repository: Repository =
      serde_json::from_str(r#"{"name": "OSF", "protocol": "osf", "embargo": "optional"}"#).unwrap();
    assert!(repository.enabled);
    assert_eq!(repository.embargo, EmbargoPolicy::Optional);
    assert!(repository.licenses.is_empty());
  }
}
