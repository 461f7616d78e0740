//! Metadata formatters: pure functions from a paper and validated form data to a document in a
//! target vocabulary.
//!
//! | name     | document | used by                       |
//! |----------|----------|-------------------------------|
//! | `tei`    | XML      | HAL (AOfr TEI profile)        |
//! | `mods`   | XML      | SWORD + METS repositories     |
//! | `dc`     | XML      | SWORD repositories taking DC  |
//! | `zenodo` | JSON     | Zenodo deposition metadata    |
//! | `osf`    | JSON     | OSF node and preprint bodies  |
//!
//! Formatters never touch the network and rendering the same input twice yields byte-identical
//! output.

use super::*;

pub mod dublin_core;
pub mod mods;
pub mod osf;
pub mod tei;
pub mod xml;
pub mod zenodo;

/// A rendered metadata document.
#[derive(Debug, Clone, PartialEq)]
pub enum Document {
  /// An XML element tree
  Xml(Element),
  /// A JSON value
  Json(Value),
}

impl Document {
  /// Serializes the document, XML with a declaration, JSON pretty-printed.
  pub fn to_bytes(&self) -> Result<Vec<u8>, DepositError> {
    match self {
      Document::Xml(element) => element.to_bytes(),
      Document::Json(value) => Ok(serde_json::to_vec_pretty(value)?),
    }
  }

  /// The XML tree, if this is an XML document.
  pub fn as_xml(&self) -> Option<&Element> {
    match self {
      Document::Xml(element) => Some(element),
      Document::Json(_) => None,
    }
  }

  /// The JSON value, if this is a JSON document.
  pub fn as_json(&self) -> Option<&Value> {
    match self {
      Document::Json(value) => Some(value),
      Document::Xml(_) => None,
    }
  }

  /// Takes the XML tree out of the document.
  ///
  /// # Errors
  ///
  /// Returns [`DepositError::Xml`] for a JSON document.
  pub fn into_xml(self) -> Result<Element, DepositError> {
    match self {
      Document::Xml(element) => Ok(element),
      Document::Json(_) => Err(DepositError::Xml("expected an XML document, got JSON".to_string())),
    }
  }
}

/// Renders a paper in some metadata vocabulary.
pub trait MetadataFormatter: Send + Sync {
  /// Short name of the vocabulary, as accepted by [`formatter`].
  fn format_name(&self) -> &'static str;

  /// Builds the document for `paper`.
  ///
  /// `filename` is the name under which the PDF is shipped alongside the metadata, if any.
  ///
  /// # Errors
  ///
  /// Returns [`DepositError::MissingMetadata`] when the vocabulary requires something neither the
  /// paper nor `data` provides.
  fn render(
    &self,
    paper: &Paper,
    filename: Option<&str>,
    data: &DepositData,
  ) -> Result<Document, DepositError>;

  /// [`MetadataFormatter::render`] followed by serialization.
  fn to_bytes(
    &self,
    paper: &Paper,
    filename: Option<&str>,
    data: &DepositData,
  ) -> Result<Vec<u8>, DepositError> {
    self.render(paper, filename, data)?.to_bytes()
  }
}

/// Names accepted by [`formatter`].
pub const FORMATS: [&str; 5] = ["tei", "mods", "dc", "zenodo", "osf"];

/// Looks up a formatter by its short name.
pub fn formatter(name: &str) -> Option<Box<dyn MetadataFormatter>> {
  match name {
    "tei" => Some(Box::new(tei::TeiFormatter)),
    "mods" => Some(Box::new(mods::ModsFormatter)),
    "dc" => Some(Box::new(dublin_core::DublinCoreFormatter)),
    "zenodo" => Some(Box::new(zenodo::ZenodoFormatter)),
    "osf" => Some(Box::new(osf::OsfFormatter)),
    _ => None,
  }
}

/// Abstract to emit: the form value first, then the paper's own, stripped of HTML.
pub(crate) fn abstract_text(paper: &Paper, data: &DepositData) -> Option<String> {
  data
    .abstract_text
    .clone()
    .or_else(|| paper.abstract_text.as_deref().map(format::strip_html))
    .map(|text| text.trim().to_string())
    .filter(|text| !text.is_empty())
}

/// Publication date of the version of record, falling back to the paper's.
pub(crate) fn publication_date(paper: &Paper) -> NaiveDate {
  paper.publication().and_then(|publication| publication.pubdate).unwrap_or(paper.pubdate)
}
