//! Maps protocol identifiers to protocol constructors.
//!
//! The registry is built explicitly from a list of constructors; the process-wide one returned by
//! [`default_registry`] is initialized once, on first use, and never mutated afterwards.

use lazy_static::lazy_static;

use super::*;

/// Builds a protocol bound to a repository.
pub type ProtocolConstructor = fn(Repository) -> Box<dyn RepositoryProtocol>;

lazy_static! {
  /// Registry of every protocol shipped with the crate.
  static ref DEFAULT_REGISTRY: ProtocolRegistry = ProtocolRegistry::with_defaults();
}

/// The registry of every protocol shipped with the crate.
pub fn default_registry() -> &'static ProtocolRegistry { &DEFAULT_REGISTRY }

/// Protocol constructors by identifier.
#[derive(Debug, Clone, Default)]
pub struct ProtocolRegistry {
  /// Registered constructors
  protocols: BTreeMap<&'static str, ProtocolConstructor>,
}

impl ProtocolRegistry {
  /// An empty registry.
  pub fn new() -> Self { Self::default() }

  /// A registry holding every protocol shipped with the crate.
  pub fn with_defaults() -> Self {
    Self::from_entries([
      (sword::SWORD_METS_MODS, sword::SwordMetsProtocol::boxed_mods as ProtocolConstructor),
      (sword::SWORD_METS_DC, sword::SwordMetsProtocol::boxed_dublin_core as ProtocolConstructor),
      (hal::HAL, hal::HalProtocol::boxed as ProtocolConstructor),
      (zenodo::ZENODO, zenodo::ZenodoProtocol::boxed as ProtocolConstructor),
      (osf::OSF, osf::OsfProtocol::boxed as ProtocolConstructor),
      (dark_archive::DARK_ARCHIVE, dark_archive::DarkArchiveProtocol::boxed as ProtocolConstructor),
    ])
  }

  /// A registry holding `entries`, later entries replacing earlier ones with the same id.
  pub fn from_entries(entries: impl IntoIterator<Item = (&'static str, ProtocolConstructor)>) -> Self {
    let mut registry = Self::new();
    for (id, constructor) in entries {
      registry.register(id, constructor);
    }
    registry
  }

  /// Registers a constructor, replacing (and warning about) any previous one under `id`.
  pub fn register(&mut self, id: &'static str, constructor: ProtocolConstructor) {
    if self.protocols.insert(id, constructor).is_some() {
      warn!("Protocol {id} was registered twice, keeping the last registration");
    }
  }

  /// The constructor registered under `id`.
  pub fn get(&self, id: &str) -> Option<ProtocolConstructor> { self.protocols.get(id).copied() }

  /// Registered identifiers, sorted.
  pub fn protocols(&self) -> impl Iterator<Item = &'static str> + '_ {
    self.protocols.keys().copied()
  }

  /// Instantiates the protocol named by `repository.protocol`.
  ///
  /// # Errors
  ///
  /// Returns [`DepositError::UnknownProtocol`] if nothing is registered under that name and
  /// [`DepositError::Configuration`] if the repository is disabled or its configuration invalid.
  pub fn instantiate(&self, repository: Repository) -> Result<Box<dyn RepositoryProtocol>, DepositError> {
    let constructor = self
      .get(&repository.protocol)
      .ok_or_else(|| DepositError::UnknownProtocol(repository.protocol.clone()))?;
    if !repository.enabled {
      return Err(DepositError::Configuration(format!(
        "The repository {} is disabled.",
        repository.name
      )));
    }
    repository.validate()?;
    debug!("Instantiating protocol {} for {}", repository.protocol, repository.name);
    Ok(constructor(repository))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::tests::zenodo_repository;

  #[test]
  fn test_default_protocols() {
    let ids: Vec<&str> = default_registry().protocols().collect();
    assert_eq!(ids, vec!["dark_archive", "hal", "osf", "sword_mets_dc", "sword_mets_mods", "zenodo"]);
  }

  #[test]
  fn test_instantiate() {
    let protocol = default_registry().instantiate(zenodo_repository()).unwrap();
    assert_eq!(protocol.id(), "zenodo");
    assert_eq!(protocol.repository().name, "Zenodo");

    let mut unknown = zenodo_repository();
    unknown.protocol = "ftp".to_string();
    assert!(matches!(default_registry().instantiate(unknown), Err(DepositError::UnknownProtocol(id)) if id == "ftp"));

    let mut disabled = zenodo_repository();
    disabled.enabled = false;
    assert!(default_registry().instantiate(disabled).unwrap_err().is_configuration_error());
  }

  #[test]
  #[traced_test]
  fn test_collisions_keep_the_last_registration() {
    let mut registry = ProtocolRegistry::new();
    registry.register("zenodo", dark_archive::DarkArchiveProtocol::boxed);
    registry.register("zenodo", zenodo::ZenodoProtocol::boxed);
    assert!(logs_contain("registered twice"));

    let protocol = registry.instantiate(zenodo_repository()).unwrap();
    assert_eq!(protocol.id(), "zenodo");
  }
}
