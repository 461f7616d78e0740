//! Text helpers shared by the metadata formatters and the forms.
//!
//! Abstracts harvested from publishers frequently carry HTML (JATS leftovers, `<p>` wrappers,
//! entities), titles need turning into upload file names and page ranges come as free text.
//!
//! # Examples
//!
//! ```
//! use deposit::format;
//!
//! assert_eq!(format::strip_html("<p>Lorem &amp; <i>ipsum</i></p>"), "Lorem & ipsum");
//! assert_eq!(format::format_title("A Survey of Everything", Some(50)), "a_survey_of_everything");
//! assert_eq!(format::split_pages("12-34"), (Some("12".to_string()), Some("34".to_string())));
//! ```

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
  /// Any HTML/XML tag
  static ref TAG: Regex = Regex::new(r"(?s)<[^>]*>").unwrap();
  /// Numeric character references
  static ref NUMERIC_ENTITY: Regex = Regex::new(r"&#(x[0-9a-fA-F]+|[0-9]+);").unwrap();
  /// Page ranges such as `12-34`, `12–34` or `12 -- 34`
  static ref PAGE_RANGE: Regex = Regex::new(r"^\s*(\S+?)\s*(?:-+|–|—)\s*(\S+)\s*$").unwrap();
}

/// Removes markup from `text`, decodes common entities and collapses whitespace.
pub fn strip_html(text: &str) -> String {
  let text = TAG.replace_all(text, " ");
  let text = NUMERIC_ENTITY.replace_all(&text, |captures: &regex::Captures| {
    let code = &captures[1];
    let value = match code.strip_prefix('x') {
      Some(hex) => u32::from_str_radix(hex, 16).ok(),
      None => code.parse::<u32>().ok(),
    };
    value.and_then(char::from_u32).map(String::from).unwrap_or_default()
  });
  let text = text
    .replace("&nbsp;", " ")
    .replace("&lt;", "<")
    .replace("&gt;", ">")
    .replace("&quot;", "\"")
    .replace("&apos;", "'")
    .replace("&amp;", "&");
  text.split_whitespace().collect::<Vec<&str>>().join(" ")
}

/// Formats a title string for use as a filename.
///
/// The text is lowercased, whitespace runs become single underscores and the result is
/// truncated at a word boundary to `max_length` characters (50 by default). Characters that are
/// awkward in file names are dropped.
pub fn format_title(title: &str, max_length: Option<usize>) -> String {
  let formatted = title
    .to_lowercase()
    .chars()
    .filter(|c| c.is_alphanumeric() || c.is_whitespace() || *c == '-')
    .collect::<String>()
    .split_whitespace()
    .collect::<Vec<&str>>()
    .join("_");

  let max_length = max_length.unwrap_or(50);

  if formatted.len() <= max_length {
    return formatted;
  }

  let mut result = String::new();
  for (i, word) in formatted.split('_').enumerate() {
    let needed = if i > 0 { word.len() + 1 } else { word.len() };
    if result.len() + needed > max_length {
      break;
    }
    if i > 0 {
      result.push('_');
    }
    result.push_str(word);
  }

  result
}

/// Upload file name derived from a paper title, `article.pdf` if nothing usable remains.
pub fn pdf_file_name(title: &str) -> String {
  let stem = format_title(title, Some(50));
  if stem.is_empty() {
    "article.pdf".to_string()
  } else {
    format!("{stem}.pdf")
  }
}

/// Splits a page range into its first and last page.
///
/// A single page yields `(Some(page), None)`, blank input `(None, None)`.
pub fn split_pages(pages: &str) -> (Option<String>, Option<String>) {
  if let Some(captures) = PAGE_RANGE.captures(pages) {
    return (Some(captures[1].to_string()), Some(captures[2].to_string()));
  }
  let page = pages.trim();
  if page.is_empty() {
    (None, None)
  } else {
    (Some(page.to_string()), None)
  }
}
