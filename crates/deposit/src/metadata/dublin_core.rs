//! Dublin Core terms in an Atom entry, the plain metadata format of SWORD v2.

use super::*;

/// Atom namespace
pub const ATOM_NAMESPACE: &str = "http://www.w3.org/2005/Atom";
/// DCMI terms namespace
pub const DCTERMS_NAMESPACE: &str = "http://purl.org/dc/terms/";

/// Renders [`Paper`]s as an Atom entry carrying `dcterms` elements.
#[derive(Debug, Clone, Copy, Default)]
pub struct DublinCoreFormatter;

impl MetadataFormatter for DublinCoreFormatter {
  fn format_name(&self) -> &'static str { "dc" }

  fn render(
    &self,
    paper: &Paper,
    _filename: Option<&str>,
    data: &DepositData,
  ) -> Result<Document, DepositError> {
    // `updated` is derived from the paper so that rendering stays reproducible.
    let updated = paper.pubdate.and_hms_opt(0, 0, 0).map(|time| time.and_utc().to_rfc3339());

    let entry = Element::new("entry")
      .attr("xmlns", ATOM_NAMESPACE)
      .attr("xmlns:dcterms", DCTERMS_NAMESPACE)
      .child(Element::leaf("title", paper.title.trim()))
      .child(Element::leaf("id", format!("urn:paper:{}", paper.id)))
      .optional_child(Element::optional_leaf("updated", updated.as_deref()))
      .child(
        Element::new("author").child(Element::leaf(
          "name",
          paper.authors.first().map(Author::full_name).unwrap_or_else(|| "Unknown".to_string()),
        )),
      )
      .child(Element::leaf("dcterms:title", paper.title.trim()))
      .optional_child(abstract_text(paper, data).map(|text| Element::leaf("dcterms:abstract", text)))
      .child(Element::leaf("dcterms:type", paper.doctype.as_str()))
      .child(Element::leaf("dcterms:issued", publication_date(paper).to_string()))
      .child(Element::leaf("dcterms:language", paper.language()))
      .children(
        paper.authors.iter().map(|author| Element::leaf("dcterms:contributor", author.citation_name())),
      )
      .children(paper.dois().into_iter().map(|doi| Element::leaf("dcterms:identifier", format!("doi:{doi}"))))
      .optional_child(
        paper
          .publication()
          .and_then(|publication| Element::optional_leaf("dcterms:publisher", publication.publisher.as_deref())),
      )
      .optional_child(
        data.license.as_ref().map(|chooser| Element::leaf("dcterms:license", chooser.license.uri.as_str())),
      );
    Ok(Document::Xml(entry))
  }
}
