//! Bibliographic types handed to the deposit machinery.
//!
//! These mirror what the surrounding application knows about a paper: its title, authors,
//! abstract, the publications (journal versions) it is attached to and the OAI records harvested
//! for it. The deposit code only reads them; the one thing it produces is a new [`OaiRecord`]
//! once a deposit succeeds.
//!
//! # Examples
//!
//! ```
//! use chrono::NaiveDate;
//! use deposit::paper::{Author, Paper, PubType};
//!
//! let paper = Paper::new(
//!   1,
//!   "The approach to Al-Mu'tasim",
//!   vec![Author::new("Herbert", "Quain")],
//!   NaiveDate::from_ymd_opt(1936, 1, 1).unwrap(),
//!   PubType::Book,
//! );
//! assert_eq!(paper.authors[0].citation_name(), "Quain, Herbert");
//! assert!(paper.doi().is_none());
//! ```

use super::*;

/// The publication type of a paper, using the identifiers of the paper database.
///
/// Every target vocabulary (HAL typologies, Zenodo upload types, MODS genres) maps from this
/// closed set, so each mapping table is a total `match` and an unknown identifier fails when it
/// is parsed rather than silently defaulting later.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PubType {
  /// An article in a journal
  JournalArticle,
  /// A paper in conference proceedings
  ProceedingsArticle,
  /// A chapter of a book
  BookChapter,
  /// A whole book
  Book,
  /// A full issue of a journal
  JournalIssue,
  /// A full volume of proceedings
  Proceedings,
  /// An entry in an encyclopedia or dictionary
  ReferenceEntry,
  /// A poster
  Poster,
  /// A technical report
  Report,
  /// A thesis
  Thesis,
  /// A dataset
  Dataset,
  /// A preprint
  Preprint,
  /// Anything else
  Other,
}

impl PubType {
  /// All publication types, in the order used by the paper database.
  pub const ALL: [PubType; 13] = [
    PubType::JournalArticle,
    PubType::ProceedingsArticle,
    PubType::BookChapter,
    PubType::Book,
    PubType::JournalIssue,
    PubType::Proceedings,
    PubType::ReferenceEntry,
    PubType::Poster,
    PubType::Report,
    PubType::Thesis,
    PubType::Dataset,
    PubType::Preprint,
    PubType::Other,
  ];

  /// The identifier string of this type, e.g. `journal-article`.
  pub fn as_str(&self) -> &'static str {
    match self {
      PubType::JournalArticle => "journal-article",
      PubType::ProceedingsArticle => "proceedings-article",
      PubType::BookChapter => "book-chapter",
      PubType::Book => "book",
      PubType::JournalIssue => "journal-issue",
      PubType::Proceedings => "proceedings",
      PubType::ReferenceEntry => "reference-entry",
      PubType::Poster => "poster",
      PubType::Report => "report",
      PubType::Thesis => "thesis",
      PubType::Dataset => "dataset",
      PubType::Preprint => "preprint",
      PubType::Other => "other",
    }
  }
}

impl fmt::Display for PubType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.as_str()) }
}

impl FromStr for PubType {
  type Err = DepositError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let s = s.trim().to_lowercase();
    PubType::ALL
      .iter()
      .find(|pubtype| pubtype.as_str() == s)
      .copied()
      .ok_or(DepositError::UnknownPubType(s))
  }
}

/// An author of a paper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Author {
  /// Given name(s)
  pub first_name:  String,
  /// Family name
  pub last_name:   String,
  /// ORCID identifier, if known (e.g. `0000-0002-1825-0097`)
  #[serde(default)]
  pub orcid:       Option<String>,
  /// Free-text affiliation, if known
  #[serde(default)]
  pub affiliation: Option<String>,
}

impl Author {
  /// Creates an author with no ORCID and no affiliation.
  pub fn new(first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
    Self {
      first_name:  first_name.into(),
      last_name:   last_name.into(),
      orcid:       None,
      affiliation: None,
    }
  }

  /// Sets the ORCID identifier.
  pub fn with_orcid(mut self, orcid: impl Into<String>) -> Self {
    self.orcid = Some(orcid.into());
    self
  }

  /// "First Last"
  pub fn full_name(&self) -> String {
    format!("{} {}", self.first_name, self.last_name).trim().to_string()
  }

  /// "Last, First", the form most bibliographic vocabularies expect.
  pub fn citation_name(&self) -> String {
    if self.first_name.is_empty() {
      self.last_name.clone()
    } else {
      format!("{}, {}", self.last_name, self.first_name)
    }
  }
}

/// A published version of a paper, typically in a journal or proceedings.
///
/// All fields are optional: formatters emit only what is present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Publication {
  /// DOI of this version
  #[serde(default)]
  pub doi:           Option<String>,
  /// Title of the journal, proceedings or book containing the paper
  #[serde(default)]
  pub journal_title: Option<String>,
  /// Print ISSN
  #[serde(default)]
  pub issn:          Option<String>,
  /// Electronic ISSN
  #[serde(default)]
  pub eissn:         Option<String>,
  /// Volume number
  #[serde(default)]
  pub volume:        Option<String>,
  /// Issue number
  #[serde(default)]
  pub issue:         Option<String>,
  /// Page range, e.g. `12-34`
  #[serde(default)]
  pub pages:         Option<String>,
  /// Publisher name
  #[serde(default)]
  pub publisher:     Option<String>,
  /// Publication date of this version
  #[serde(default)]
  pub pubdate:       Option<NaiveDate>,
}

/// A bibliographic record harvested for a paper, or created by a successful deposit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OaiRecord {
  /// The OAI source the record comes from (e.g. `zenodo`, `hal`)
  pub source:     String,
  /// Identifier of the record within its source
  pub identifier: String,
  /// Human-readable landing page
  #[serde(default)]
  pub splash_url: Option<String>,
  /// Direct link to the full text
  #[serde(default)]
  pub pdf_url:    Option<String>,
}

/// A paper as known to the paper database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paper {
  /// Primary key of the paper
  pub id:            i64,
  /// The paper's title
  pub title:         String,
  /// Authors, in order
  pub authors:       Vec<Author>,
  /// Abstract, possibly containing HTML markup
  #[serde(default)]
  pub abstract_text: Option<String>,
  /// Publication date of the paper
  pub pubdate:       NaiveDate,
  /// Publication type
  pub doctype:       PubType,
  /// ISO 639-1 language code of the full text
  #[serde(default)]
  pub language:      Option<String>,
  /// Published versions
  #[serde(default)]
  pub publications:  Vec<Publication>,
  /// Harvested records
  #[serde(default)]
  pub oai_records:   Vec<OaiRecord>,
}

impl Paper {
  /// Creates a paper with no abstract, publications or records.
  pub fn new(
    id: i64,
    title: impl Into<String>,
    authors: Vec<Author>,
    pubdate: NaiveDate,
    doctype: PubType,
  ) -> Self {
    Self {
      id,
      title: title.into(),
      authors,
      abstract_text: None,
      pubdate,
      doctype,
      language: None,
      publications: Vec::new(),
      oai_records: Vec::new(),
    }
  }

  /// The first publication, which formatters treat as the version of record.
  pub fn publication(&self) -> Option<&Publication> { self.publications.first() }

  /// The first DOI found among the publications.
  pub fn doi(&self) -> Option<&str> {
    self.publications.iter().find_map(|publication| publication.doi.as_deref())
  }

  /// All distinct DOIs of the paper, in publication order.
  pub fn dois(&self) -> Vec<&str> {
    let mut dois: Vec<&str> = Vec::new();
    for doi in self.publications.iter().filter_map(|publication| publication.doi.as_deref()) {
      if !dois.contains(&doi) {
        dois.push(doi);
      }
    }
    dois
  }

  /// Language of the full text, defaulting to English.
  pub fn language(&self) -> &str { self.language.as_deref().unwrap_or("en") }
}

/// The user performing a deposit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
  /// Login name
  pub username:   String,
  /// Given name(s)
  pub first_name: String,
  /// Family name
  pub last_name:  String,
  /// Contact address
  #[serde(default)]
  pub email:      Option<String>,
  /// ORCID identifier
  #[serde(default)]
  pub orcid:      Option<String>,
}

/// A reference to the PDF the user uploaded for this deposit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadedPdf {
  /// Where the file lives on disk
  pub path: PathBuf,
  /// Public URL of the file, if it is served somewhere
  #[serde(default)]
  pub url:  Option<String>,
}

impl UploadedPdf {
  /// References a PDF on disk.
  pub fn new(path: impl Into<PathBuf>) -> Self { Self { path: path.into(), url: None } }

  /// Reads the whole file.
  pub async fn read(&self) -> Result<Vec<u8>, DepositError> {
    trace!("Reading uploaded PDF from {}", self.path.display());
    Ok(tokio::fs::read(&self.path).await?)
  }

  /// File name component of the path, falling back to `article.pdf`.
  pub fn file_name(&self) -> String {
    self
      .path
      .file_name()
      .map(|name| name.to_string_lossy().into_owned())
      .unwrap_or_else(|| "article.pdf".to_string())
  }

  /// Where the file can be fetched from: its public URL or a `file://` URL.
  pub fn location(&self) -> String {
    self.url.clone().unwrap_or_else(|| format!("file://{}", self.path.display()))
  }
}
