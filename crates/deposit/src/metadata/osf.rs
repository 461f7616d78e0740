//! OSF JSON:API payloads.
//!
//! A deposit on OSF is a sequence of documents rather than one: a node (project) holding the
//! paper's description, one contributor document per author, a license patch on the node, then a
//! preprint pointing at the node and its uploaded file. [`OsfFormatter`] renders the node; the
//! other bodies are built by the functions of this module as the choreography needs them.

use super::*;

/// Preprint provider deposits are filed under.
pub const PROVIDER: &str = "osf";

/// Renders the node creation document of a [`Paper`].
#[derive(Debug, Clone, Copy, Default)]
pub struct OsfFormatter;

impl MetadataFormatter for OsfFormatter {
  fn format_name(&self) -> &'static str { "osf" }

  fn render(
    &self,
    paper: &Paper,
    _filename: Option<&str>,
    data: &DepositData,
  ) -> Result<Document, DepositError> {
    Ok(Document::Json(node(paper, data)))
  }
}

/// Node (project) creation.
pub fn node(paper: &Paper, data: &DepositData) -> Value {
  json!({
    "data": {
      "type": "nodes",
      "attributes": {
        "title": paper.title.trim(),
        "category": "project",
        "description": abstract_text(paper, data).unwrap_or_default(),
        "tags": data.keywords,
      }
    }
  })
}

/// Unregistered contributor creation for one author.
pub fn contributor(author: &Author) -> Value {
  json!({
    "data": {
      "type": "contributors",
      "attributes": {
        "full_name": author.full_name(),
      }
    }
  })
}

/// License of a node, with the publication year and the authors as copyright holders.
pub fn node_license(paper: &Paper, node_id: &str, license_id: &str) -> Value {
  let holders: Vec<String> = paper.authors.iter().map(Author::full_name).collect();
  json!({
    "data": {
      "type": "nodes",
      "id": node_id,
      "attributes": {
        "node_license": {
          "year": publication_date(paper).format("%Y").to_string(),
          "copyright_holders": holders,
        }
      },
      "relationships": {
        "license": {
          "data": { "type": "licenses", "id": license_id }
        }
      }
    }
  })
}

/// Preprint creation referencing the node and its uploaded file.
pub fn preprint(paper: &Paper, node_id: &str, file_id: &str) -> Value {
  let mut attributes = json!({ "title": paper.title.trim() });
  if let Some(doi) = paper.doi() {
    attributes["doi"] = json!(doi);
  }
  json!({
    "data": {
      "type": "preprints",
      "attributes": attributes,
      "relationships": {
        "node": { "data": { "type": "nodes", "id": node_id } },
        "primary_file": { "data": { "type": "files", "id": file_id } },
        "provider": { "data": { "type": "providers", "id": PROVIDER } }
      }
    }
  })
}

/// License of a preprint, copying the node's.
pub fn preprint_license(paper: &Paper, preprint_id: &str, license_id: &str) -> Value {
  let holders: Vec<String> = paper.authors.iter().map(Author::full_name).collect();
  json!({
    "data": {
      "type": "preprints",
      "id": preprint_id,
      "attributes": {
        "license_record": {
          "year": publication_date(paper).format("%Y").to_string(),
          "copyright_holders": holders,
        }
      },
      "relationships": {
        "license": {
          "data": { "type": "licenses", "id": license_id }
        }
      }
    }
  })
}
