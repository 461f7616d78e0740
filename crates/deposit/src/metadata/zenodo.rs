//! Zenodo deposition metadata.
//!
//! The document is the body of `PUT /api/deposit/depositions/:id`, a `{"metadata": {...}}`
//! object. Zenodo refuses depositions without a description, so a missing abstract is reported as
//! [`DepositError::MissingMetadata`] instead of producing a document Zenodo would reject.

use serde_json::Map;

use super::*;

/// Renders [`Paper`]s as Zenodo deposition metadata.
#[derive(Debug, Clone, Copy, Default)]
pub struct ZenodoFormatter;

/// Zenodo `upload_type` and, for publications, `publication_type` of a publication type.
pub fn upload_type(pubtype: PubType) -> (&'static str, Option<&'static str>) {
  match pubtype {
    PubType::JournalArticle => ("publication", Some("article")),
    PubType::ProceedingsArticle => ("publication", Some("conferencepaper")),
    PubType::BookChapter => ("publication", Some("section")),
    PubType::Book | PubType::Proceedings => ("publication", Some("book")),
    PubType::JournalIssue | PubType::ReferenceEntry | PubType::Other => ("publication", Some("other")),
    PubType::Report => ("publication", Some("report")),
    PubType::Thesis => ("publication", Some("thesis")),
    PubType::Preprint => ("publication", Some("preprint")),
    PubType::Poster => ("poster", None),
    PubType::Dataset => ("dataset", None),
  }
}

impl MetadataFormatter for ZenodoFormatter {
  fn format_name(&self) -> &'static str { "zenodo" }

  fn render(
    &self,
    paper: &Paper,
    _filename: Option<&str>,
    data: &DepositData,
  ) -> Result<Document, DepositError> {
    let description = abstract_text(paper, data).ok_or_else(|| {
      DepositError::MissingMetadata("Zenodo requires an abstract for every deposit.".to_string())
    })?;

    let creators: Vec<Value> = paper
      .authors
      .iter()
      .map(|author| {
        let mut creator = json!({ "name": author.citation_name() });
        if let Some(orcid) = &author.orcid {
          creator["orcid"] = json!(orcid);
        }
        creator
      })
      .collect();

    let (upload_type, publication_type) = upload_type(paper.doctype);
    let mut fields = Map::new();
    fields.insert("upload_type".into(), json!(upload_type));
    fields.insert("title".into(), json!(paper.title.trim()));
    fields.insert("creators".into(), json!(creators));
    fields.insert("description".into(), json!(description));
    fields.insert("publication_date".into(), json!(publication_date(paper).to_string()));
    fields.insert("language".into(), json!(paper.language()));
    if let Some(publication_type) = publication_type {
      fields.insert("publication_type".into(), json!(publication_type));
    }

    match data.embargo_date {
      Some(date) => {
        fields.insert("access_right".into(), json!("embargoed"));
        fields.insert("embargo_date".into(), json!(date.to_string()));
      },
      None => {
        fields.insert("access_right".into(), json!("open"));
      },
    }
    if let Some(chooser) = &data.license {
      fields.insert("license".into(), json!(chooser.transmit_id));
    }
    if !data.keywords.is_empty() {
      fields.insert("keywords".into(), json!(data.keywords));
    }

    let dois = paper.dois();
    if let Some(doi) = dois.first() {
      fields.insert("doi".into(), json!(doi));
    }
    if !dois.is_empty() {
      let related: Vec<Value> = dois
        .iter()
        .map(|doi| json!({ "relation": "isIdenticalTo", "identifier": doi, "scheme": "doi" }))
        .collect();
      fields.insert("related_identifiers".into(), json!(related));
    }

    if let Some(publication) = paper.publication() {
      if let Some(venue) = publication.journal_title.as_deref().filter(|venue| !venue.is_empty()) {
        let key = match paper.doctype {
          PubType::ProceedingsArticle => "conference_title",
          PubType::BookChapter => "imprint_title",
          _ => "journal_title",
        };
        fields.insert(key.into(), json!(venue));
      }
      let optional = [
        ("journal_volume", &publication.volume),
        ("journal_issue", &publication.issue),
        ("journal_pages", &publication.pages),
        ("imprint_publisher", &publication.publisher),
      ];
      for (key, value) in optional {
        if let Some(value) = value.as_deref().map(str::trim).filter(|value| !value.is_empty()) {
          fields.insert(key.into(), json!(value));
        }
      }
    }

    Ok(Document::Json(json!({ "metadata": Value::Object(fields) })))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::tests::{cc_by, full_paper, minimal_paper};

  #[test]
  fn test_upload_type_is_total() {
    for pubtype in PubType::ALL {
      let (upload_type, publication_type) = upload_type(pubtype);
      assert_eq!(publication_type.is_some(), upload_type == "publication", "{pubtype}");
    }
    assert_eq!(upload_type(PubType::JournalArticle), ("publication", Some("article")));
    assert_eq!(upload_type(PubType::Dataset), ("dataset", None));
  }

  #[test]
  fn test_full_paper() {
    let data = DepositData { license: Some(cc_by()), ..Default::default() };
    let document = ZenodoFormatter.render(&full_paper(), None, &data).unwrap();
    let metadata = &document.as_json().unwrap()["metadata"];

    assert_eq!(metadata["upload_type"], "publication");
    assert_eq!(metadata["publication_type"], "article");
    assert_eq!(metadata["creators"][0]["name"], "Quain, Herbert");
    assert_eq!(metadata["creators"][0]["orcid"], "0000-0002-1825-0097");
    assert!(metadata["creators"][1].get("orcid").is_none());
    assert_eq!(metadata["license"], "cc-by");
    assert_eq!(metadata["access_right"], "open");
    assert_eq!(metadata["doi"], "10.1000/xyz123");
    assert_eq!(metadata["journal_title"], "Journal of Imaginary Letters");
    assert_eq!(metadata["journal_volume"], "12");
    assert_eq!(metadata["journal_pages"], "45-67");
    assert_eq!(metadata["related_identifiers"][0]["relation"], "isIdenticalTo");
  }

  #[test]
  fn test_missing_abstract_is_an_error() {
    let err = ZenodoFormatter.render(&minimal_paper(), None, &DepositData::default()).unwrap_err();
    assert!(matches!(err, DepositError::MissingMetadata(_)));
  }

  #[test]
  fn test_minimal_paper_with_embargo() {
    let data = DepositData {
      abstract_text: Some("Lorem ipsum".to_string()),
      embargo_date: NaiveDate::from_ymd_opt(2030, 1, 1),
      ..Default::default()
    };
    let document = ZenodoFormatter.render(&minimal_paper(), None, &data).unwrap();
    let metadata = document.as_json().unwrap()["metadata"].as_object().unwrap();

    assert_eq!(metadata["access_right"], "embargoed");
    assert_eq!(metadata["embargo_date"], "2030-01-01");
    for absent in ["doi", "related_identifiers", "journal_title", "license", "keywords"] {
      assert!(!metadata.contains_key(absent), "{absent} should be omitted");
    }
  }

  #[test]
  fn test_conference_title() {
    let mut paper = full_paper();
    paper.doctype = PubType::ProceedingsArticle;
    let data = DepositData { abstract_text: Some("Lorem ipsum".to_string()), ..Default::default() };
    let document = ZenodoFormatter.render(&paper, None, &data).unwrap();
    let metadata = &document.as_json().unwrap()["metadata"];
    assert_eq!(metadata["publication_type"], "conferencepaper");
    assert_eq!(metadata["conference_title"], "Journal of Imaginary Letters");
    assert!(metadata.get("journal_title").is_none());
  }
}
