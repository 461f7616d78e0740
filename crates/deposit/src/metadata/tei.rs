//! TEI in the AOfr profile expected by HAL's SWORD endpoint.
//!
//! The document is a single `biblFull` inside `text/body/listBibl`. HAL reads the bibliographic
//! description from `sourceDesc/biblStruct`, the domain and document type from two `classCode`
//! elements in `profileDesc`, and picks the file shipped in the same zip through the `ref` of
//! `editionStmt`.

use super::*;

/// TEI namespace
pub const TEI_NAMESPACE: &str = "http://www.tei-c.org/ns/1.0";
/// HAL extension namespace
pub const HAL_NAMESPACE: &str = "http://hal.archives-ouvertes.fr/";

/// Abstract sent when neither the paper nor the form has one; HAL rejects empty abstracts.
pub const NO_ABSTRACT: &str = "No abstract.";

/// Renders [`Paper`]s as TEI/AOfr.
#[derive(Debug, Clone, Copy, Default)]
pub struct TeiFormatter;

/// HAL document type code for a publication type.
pub fn typology(pubtype: PubType) -> &'static str {
  match pubtype {
    PubType::JournalArticle => "ART",
    PubType::ProceedingsArticle => "COMM",
    PubType::BookChapter => "COUV",
    PubType::Book => "OUV",
    PubType::JournalIssue | PubType::Proceedings => "DOUV",
    PubType::Poster => "POSTER",
    PubType::Report => "REPORT",
    PubType::Thesis => "THESE",
    PubType::Preprint => "UNDEFINED",
    PubType::ReferenceEntry | PubType::Dataset | PubType::Other => "OTHER",
  }
}

impl MetadataFormatter for TeiFormatter {
  fn format_name(&self) -> &'static str { "tei" }

  fn render(
    &self,
    paper: &Paper,
    filename: Option<&str>,
    data: &DepositData,
  ) -> Result<Document, DepositError> {
    let bibl_full = Element::new("biblFull").children(vec![
      title_stmt(paper, data),
      edition_stmt(paper, filename),
      Element::new("seriesStmt"),
      notes_stmt(),
      source_desc(paper),
      profile_desc(paper, data),
    ]);

    let tei = Element::new("TEI")
      .attr("xmlns", TEI_NAMESPACE)
      .attr("xmlns:hal", HAL_NAMESPACE)
      .child(Element::new("text").child(
        Element::new("body").child(Element::new("listBibl").child(bibl_full)),
      ));
    Ok(Document::Xml(tei))
  }
}

/// The title in the paper's language.
fn title(paper: &Paper) -> Element {
  Element::leaf("title", paper.title.trim()).attr("xml:lang", paper.language())
}

/// One `author` element; `affiliation` is the HAL structure id of the depositor's lab.
fn author(author: &Author, affiliation: Option<&str>) -> Element {
  let pers_name = Element::new("persName")
    .optional_child(
      Element::optional_leaf("forename", Some(author.first_name.as_str())).map(|e| e.attr("type", "first")),
    )
    .child(Element::leaf("surname", author.last_name.trim()));

  Element::new("author")
    .attr("role", "aut")
    .child(pers_name)
    .optional_child(Element::optional_leaf("idno", author.orcid.as_deref()).map(|e| e.attr("type", "ORCID")))
    .optional_child(
      affiliation.map(|id| Element::new("affiliation").attr("ref", format!("#struct-{id}"))),
    )
}

/// Authors, with the form's affiliation attached to the depositing author (the first one unless
/// the form says otherwise).
fn authors(paper: &Paper, data: Option<&DepositData>) -> Vec<Element> {
  let affiliation = data.and_then(|data| data.affiliation.as_deref());
  let depositor = data.and_then(|data| data.depositing_author).unwrap_or(0);
  paper
    .authors
    .iter()
    .enumerate()
    .map(|(index, a)| author(a, affiliation.filter(|_| index == depositor)))
    .collect()
}

/// `titleStmt`
fn title_stmt(paper: &Paper, data: &DepositData) -> Element {
  Element::new("titleStmt").child(title(paper)).children(authors(paper, Some(data)))
}

/// `editionStmt`, pointing at the shipped file
fn edition_stmt(paper: &Paper, filename: Option<&str>) -> Element {
  let edition = Element::new("edition")
    .child(Element::leaf("date", paper.pubdate.to_string()).attr("type", "whenWritten"))
    .optional_child(
      filename.map(|name| Element::new("ref").attr("type", "file").attr("target", name)),
    );
  Element::new("editionStmt").child(edition)
}

/// `notesStmt` with HAL's audience, popularization and peer-review flags
fn notes_stmt() -> Element {
  Element::new("notesStmt").children(vec![
    Element::new("note").attr("type", "audience").attr("n", "2"),
    Element::new("note").attr("type", "popular").attr("n", "0"),
    Element::new("note").attr("type", "peer").attr("n", "1"),
  ])
}

/// `monogr`: the container of the paper and its imprint
fn monogr(paper: &Paper) -> Element {
  let publication = paper.publication().cloned().unwrap_or_default();
  let level = match paper.doctype {
    PubType::BookChapter | PubType::Book => "m",
    _ => "j",
  };
  let (first_page, last_page) = publication.pages.as_deref().map(format::split_pages).unwrap_or_default();
  let pages = match (first_page, last_page) {
    (Some(first), Some(last)) => Some(format!("{first}-{last}")),
    (first, _) => first,
  };

  let imprint = Element::new("imprint")
    .optional_child(Element::optional_leaf("publisher", publication.publisher.as_deref()))
    .optional_child(
      Element::optional_leaf("biblScope", publication.volume.as_deref()).map(|e| e.attr("unit", "volume")),
    )
    .optional_child(
      Element::optional_leaf("biblScope", publication.issue.as_deref()).map(|e| e.attr("unit", "issue")),
    )
    .optional_child(Element::optional_leaf("biblScope", pages.as_deref()).map(|e| e.attr("unit", "pp")))
    .child(Element::leaf("date", publication_date(paper).to_string()).attr("type", "datePub"));

  Element::new("monogr")
    .optional_child(Element::optional_leaf("idno", publication.issn.as_deref()).map(|e| e.attr("type", "issn")))
    .optional_child(
      Element::optional_leaf("idno", publication.eissn.as_deref()).map(|e| e.attr("type", "eissn")),
    )
    .optional_child(
      Element::optional_leaf("title", publication.journal_title.as_deref()).map(|e| e.attr("level", level)),
    )
    .child(imprint)
}

/// `sourceDesc/biblStruct`
fn source_desc(paper: &Paper) -> Element {
  let analytic = Element::new("analytic").child(title(paper)).children(authors(paper, None));
  let bibl_struct = Element::new("biblStruct")
    .child(analytic)
    .child(monogr(paper))
    .optional_child(Element::optional_leaf("idno", paper.doi()).map(|e| e.attr("type", "doi")));
  Element::new("sourceDesc").child(bibl_struct)
}

/// `profileDesc`: language, classification and abstract
fn profile_desc(paper: &Paper, data: &DepositData) -> Element {
  let language = Element::new("langUsage")
    .child(Element::new("language").attr("ident", paper.language()));

  let keywords = (!data.keywords.is_empty()).then(|| {
    Element::new("keywords").attr("scheme", "author").children(
      data
        .keywords
        .iter()
        .map(|keyword| Element::leaf("term", keyword.as_str()).attr("xml:lang", paper.language())),
    )
  });

  let text_class = Element::new("textClass")
    .optional_child(keywords)
    .optional_child(
      data
        .topic
        .as_deref()
        .map(|topic| Element::leaf("classCode", topic).attr("scheme", "halDomain").attr("n", topic)),
    )
    .child(
      Element::leaf("classCode", paper.doctype.as_str())
        .attr("scheme", "halTypology")
        .attr("n", typology(paper.doctype)),
    );

  let abstract_text = abstract_text(paper, data).unwrap_or_else(|| NO_ABSTRACT.to_string());
  Element::new("profileDesc").child(language).child(text_class).child(
    Element::leaf("abstract", abstract_text).attr("xml:lang", paper.language()),
  )
}
