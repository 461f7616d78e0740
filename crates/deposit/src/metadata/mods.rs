//! MODS 3.7, the descriptive metadata wrapped in METS packages for SWORD repositories.

use super::*;

/// MODS namespace
pub const MODS_NAMESPACE: &str = "http://www.loc.gov/mods/v3";
/// Version attribute written on the root element
pub const MODS_VERSION: &str = "3.7";

/// Renders [`Paper`]s as a `mods` document.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModsFormatter;

impl MetadataFormatter for ModsFormatter {
  fn format_name(&self) -> &'static str { "mods" }

  fn render(
    &self,
    paper: &Paper,
    _filename: Option<&str>,
    data: &DepositData,
  ) -> Result<Document, DepositError> {
    let mods = Element::new("mods")
      .attr("xmlns", MODS_NAMESPACE)
      .attr("version", MODS_VERSION)
      .child(Element::new("titleInfo").child(Element::leaf("title", paper.title.trim())))
      .children(paper.authors.iter().map(name))
      .child(Element::leaf("genre", paper.doctype.as_str()))
      .child(origin_info(paper))
      .child(
        Element::new("language").child(
          Element::leaf("languageTerm", paper.language())
            .attr("type", "code")
            .attr("authority", "iso639-1"),
        ),
      )
      .optional_child(abstract_text(paper, data).map(|text| Element::leaf("abstract", text)))
      .children(data.keywords.iter().map(|keyword| {
        Element::new("subject").child(Element::leaf("topic", keyword.as_str()))
      }))
      .optional_child(
        data.license.as_ref().map(|chooser| {
          Element::leaf("accessCondition", chooser.license.uri.as_str()).attr("type", "use and reproduction")
        }),
      )
      .children(paper.dois().into_iter().map(|doi| Element::leaf("identifier", doi).attr("type", "doi")))
      .optional_child(related_item(paper));
    Ok(Document::Xml(mods))
  }
}

/// `name[@type=personal]` of one author
fn name(author: &Author) -> Element {
  Element::new("name")
    .attr("type", "personal")
    .child(Element::leaf("namePart", author.last_name.trim()).attr("type", "family"))
    .optional_child(
      Element::optional_leaf("namePart", Some(author.first_name.as_str())).map(|e| e.attr("type", "given")),
    )
    .optional_child(
      Element::optional_leaf("nameIdentifier", author.orcid.as_deref()).map(|e| e.attr("type", "orcid")),
    )
    .child(
      Element::new("role").child(
        Element::leaf("roleTerm", "aut").attr("type", "code").attr("authority", "marcrelator"),
      ),
    )
}

/// `originInfo` with the issue date and publisher
fn origin_info(paper: &Paper) -> Element {
  let publisher = paper.publication().and_then(|publication| publication.publisher.as_deref());
  Element::new("originInfo")
    .child(Element::leaf("dateIssued", publication_date(paper).to_string()).attr("encoding", "w3cdtf"))
    .optional_child(Element::optional_leaf("publisher", publisher))
}

/// `relatedItem[@type=host]` describing the journal, omitted when nothing is known about it
fn related_item(paper: &Paper) -> Option<Element> {
  let publication = paper.publication()?;

  let detail = |kind: &str, number: Option<&str>| {
    Element::optional_leaf("number", number).map(|number| Element::new("detail").attr("type", kind).child(number))
  };
  let (start, end) = publication.pages.as_deref().map(format::split_pages).unwrap_or_default();
  let extent = start.map(|start| {
    Element::new("extent")
      .attr("unit", "pages")
      .child(Element::leaf("start", start))
      .optional_child(end.map(|end| Element::leaf("end", end)))
  });

  let part = Element::new("part")
    .optional_child(detail("volume", publication.volume.as_deref()))
    .optional_child(detail("issue", publication.issue.as_deref()))
    .optional_child(extent);

  let item = Element::new("relatedItem")
    .attr("type", "host")
    .optional_child(
      Element::optional_leaf("title", publication.journal_title.as_deref())
        .map(|title| Element::new("titleInfo").child(title)),
    )
    .optional_child(
      Element::optional_leaf("identifier", publication.issn.as_deref()).map(|e| e.attr("type", "issn")),
    )
    .optional_child(
      Element::optional_leaf("identifier", publication.eissn.as_deref()).map(|e| e.attr("type", "eissn")),
    )
    .optional_child((!part.children.is_empty()).then_some(part));

  (!item.children.is_empty()).then_some(item)
}
