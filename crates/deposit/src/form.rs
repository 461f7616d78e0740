//! Deposit forms: the metadata a protocol needs beyond what the [`Paper`] already carries.
//!
//! A [`Form`] is a list of typed [`FormField`]s with initial values. Binding it to submitted
//! [`FormData`] and calling [`Form::validate`] either yields the typed [`DepositData`] that
//! formatters and protocols consume, or [`FormErrors`] keyed by field name. Missing required input
//! (no abstract for Zenodo, no license, no HAL topic) is caught here, before any protocol runs.
//!
//! # Examples
//!
//! ```
//! use deposit::form::{fields, FieldKind, Form, FormData, FormField};
//!
//! let form = Form::new(
//!   vec![FormField::new(fields::EMAIL, "Contact email", FieldKind::Email).required()],
//!   Vec::new(),
//! );
//! assert!(form.validate().is_err());
//!
//! let data = FormData::from([(fields::EMAIL.to_string(), "herbert@quain.ie".to_string())]);
//! let deposit_data = form.bind(data).validate().unwrap();
//! assert_eq!(deposit_data.email.as_deref(), Some("herbert@quain.ie"));
//! ```

use lazy_static::lazy_static;
use regex::Regex;

use super::*;

/// Submitted form values, keyed by field name.
pub type FormData = BTreeMap<String, String>;

/// Names of the fields understood by [`Form::validate`].
pub mod fields {
  /// Hidden id of the deposited paper
  pub const PAPER_ID: &str = "paper_id";
  /// Abstract, HTML stripped
  pub const ABSTRACT: &str = "abstract";
  /// Transmit id of the chosen license
  pub const LICENSE: &str = "license";
  /// Embargo end date, `YYYY-MM-DD`
  pub const EMBARGO_DATE: &str = "embargo_date";
  /// Contact email of the depositor
  pub const EMAIL: &str = "email";
  /// Scientific domain code (HAL)
  pub const TOPIC: &str = "topic";
  /// Structure id of the depositor's laboratory (HAL)
  pub const AFFILIATION: &str = "affiliation";
  /// Index of the depositing author in the author list (HAL)
  pub const DEPOSITING_AUTHOR: &str = "depositing_author";
  /// Comma-separated keywords
  pub const KEYWORDS: &str = "keywords";
}

lazy_static! {
  /// Deliberately loose: one `@`, a dot in the domain, no whitespace.
  static ref EMAIL: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
}

/// One selectable value of a choice field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Choice {
  /// Submitted value
  pub value: String,
  /// Displayed label
  pub label: String,
}

impl Choice {
  /// Creates a choice.
  pub fn new(value: impl Into<String>, label: impl Into<String>) -> Self {
    Self { value: value.into(), label: label.into() }
  }
}

/// Input type of a field, driving validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldKind {
  /// Not shown, carried through the round-trip
  Hidden,
  /// Single line of text
  Text,
  /// Multi-line text
  TextArea,
  /// Email address
  Email,
  /// Calendar date, `YYYY-MM-DD`
  Date,
  /// One value out of a fixed list
  Choice(Vec<Choice>),
}

/// A form field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormField {
  /// Name under which the value is submitted
  pub name:     String,
  /// Displayed label
  pub label:    String,
  /// Input type
  pub kind:     FieldKind,
  /// Whether a value must be submitted
  pub required: bool,
  /// Prefilled value
  pub initial:  Option<String>,
  /// Help text shown below the field
  pub help:     Option<String>,
}

impl FormField {
  /// An optional field without initial value.
  pub fn new(name: impl Into<String>, label: impl Into<String>, kind: FieldKind) -> Self {
    Self { name: name.into(), label: label.into(), kind, required: false, initial: None, help: None }
  }

  /// Marks the field as required.
  pub fn required(mut self) -> Self {
    self.required = true;
    self
  }

  /// Marks the field as required or not.
  pub fn required_if(mut self, required: bool) -> Self {
    self.required = required;
    self
  }

  /// Prefills the field.
  pub fn initial(mut self, value: impl Into<String>) -> Self {
    self.initial = Some(value.into());
    self
  }

  /// Sets the help text.
  pub fn help(mut self, text: impl Into<String>) -> Self {
    self.help = Some(text.into());
    self
  }
}

/// Validation errors, keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormErrors {
  /// Messages per field
  errors: BTreeMap<String, Vec<String>>,
}

impl FormErrors {
  /// Records an error for `field`.
  pub fn add(&mut self, field: &str, message: impl Into<String>) {
    self.errors.entry(field.to_string()).or_default().push(message.into());
  }

  /// Whether no error was recorded.
  pub fn is_empty(&self) -> bool { self.errors.is_empty() }

  /// Messages recorded for `field`.
  pub fn get(&self, field: &str) -> &[String] {
    self.errors.get(field).map(Vec::as_slice).unwrap_or(&[])
  }

  /// Names of the fields with errors.
  pub fn fields(&self) -> impl Iterator<Item = &str> { self.errors.keys().map(String::as_str) }
}

impl fmt::Display for FormErrors {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let parts: Vec<String> = self
      .errors
      .iter()
      .map(|(field, messages)| format!("{field}: {}", messages.join(" ")))
      .collect();
    write!(f, "{}", parts.join("; "))
  }
}

impl std::error::Error for FormErrors {}

/// Typed, validated form values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DepositData {
  /// Id of the deposited paper
  pub paper_id:          Option<i64>,
  /// Abstract, HTML stripped
  pub abstract_text:     Option<String>,
  /// Chosen license
  pub license:           Option<LicenseChooser>,
  /// Embargo end date
  pub embargo_date:      Option<NaiveDate>,
  /// Contact email
  pub email:             Option<String>,
  /// Scientific domain code
  pub topic:             Option<String>,
  /// Laboratory structure id
  pub affiliation:       Option<String>,
  /// Index of the depositing author
  pub depositing_author: Option<usize>,
  /// Keywords
  pub keywords:          Vec<String>,
}

/// A deposit form, unbound (showing initial values) or bound to submitted data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Form {
  /// Fields, in display order
  fields:   Vec<FormField>,
  /// Submitted data, if bound
  data:     Option<FormData>,
  /// Licenses the license field resolves to
  licenses: Vec<LicenseChooser>,
}

impl Form {
  /// An unbound form.
  pub fn new(fields: Vec<FormField>, licenses: Vec<LicenseChooser>) -> Self {
    Self { fields, data: None, licenses }
  }

  /// The standard deposit form for `paper` on `repository`, followed by `extra` fields.
  ///
  /// Always carries the paper id and the abstract (prefilled with the HTML-stripped abstract of
  /// the paper). A license choice appears when the repository offers licenses, preselecting the
  /// default one; the embargo field follows the repository's [`EmbargoPolicy`].
  pub fn for_deposit(
    paper: &Paper,
    repository: &Repository,
    requires_abstract: bool,
    extra: Vec<FormField>,
  ) -> Self {
    let mut fields = vec![
      FormField::new(fields::PAPER_ID, "Paper", FieldKind::Hidden)
        .required()
        .initial(paper.id.to_string()),
    ];

    let mut abstract_field = FormField::new(fields::ABSTRACT, "Abstract", FieldKind::TextArea)
      .required_if(requires_abstract)
      .help("Paste the abstract of the paper if it is missing.");
    if let Some(text) = paper.abstract_text.as_deref().map(format::strip_html) {
      if !text.is_empty() {
        abstract_field = abstract_field.initial(text);
      }
    }
    fields.push(abstract_field);

    if !repository.licenses.is_empty() {
      let choices = repository
        .licenses
        .iter()
        .map(|chooser| Choice::new(&chooser.transmit_id, &chooser.license.name))
        .collect();
      let mut license = FormField::new(fields::LICENSE, "License", FieldKind::Choice(choices)).required();
      if let Some(default) = repository.default_license() {
        license = license.initial(&default.transmit_id);
      }
      fields.push(license);
    }

    match repository.embargo {
      EmbargoPolicy::None => {},
      policy => fields.push(
        FormField::new(fields::EMBARGO_DATE, "Embargo until", FieldKind::Date)
          .required_if(policy == EmbargoPolicy::Required)
          .help("The full text stays hidden until this date."),
      ),
    }

    fields.extend(extra);
    Self::new(fields, repository.licenses.clone())
  }

  /// Binds the form to submitted data.
  pub fn bind(mut self, data: FormData) -> Self {
    self.data = Some(data);
    self
  }

  /// Whether submitted data is bound.
  pub fn is_bound(&self) -> bool { self.data.is_some() }

  /// The fields, in display order.
  pub fn fields(&self) -> &[FormField] { &self.fields }

  /// Looks up a field.
  pub fn field(&self, name: &str) -> Option<&FormField> {
    self.fields.iter().find(|field| field.name == name)
  }

  /// The initial values, as they would be submitted untouched.
  pub fn initial_data(&self) -> FormData {
    self
      .fields
      .iter()
      .filter_map(|field| field.initial.clone().map(|initial| (field.name.clone(), initial)))
      .collect()
  }

  /// The value of a field: the submitted one if bound, the initial one otherwise.
  pub fn value(&self, name: &str) -> Option<&str> {
    match &self.data {
      Some(data) => data.get(name).map(String::as_str),
      None => self.field(name).and_then(|field| field.initial.as_deref()),
    }
  }

  /// Whether [`Form::validate`] succeeds.
  pub fn is_valid(&self) -> bool { self.validate().is_ok() }

  /// Validates the bound data (or the initial values of an unbound form).
  ///
  /// # Errors
  ///
  /// Returns every problem found, keyed by field name.
  pub fn validate(&self) -> Result<DepositData, FormErrors> {
    let today = Utc::now().date_naive();
    let mut errors = FormErrors::default();
    let mut data = DepositData::default();

    for field in &self.fields {
      let value = self.value(&field.name).map(str::trim).filter(|value| !value.is_empty());
      let Some(value) = value else {
        if field.required {
          errors.add(&field.name, "This field is required.");
        }
        continue;
      };

      match &field.kind {
        FieldKind::Email if !EMAIL.is_match(value) => {
          errors.add(&field.name, "Enter a valid email address.");
          continue;
        },
        FieldKind::Choice(choices) if !choices.iter().any(|choice| choice.value == value) => {
          errors.add(&field.name, "Select a valid choice.");
          continue;
        },
        _ => {},
      }

      match field.name.as_str() {
        fields::PAPER_ID => match value.parse::<i64>() {
          Ok(id) => data.paper_id = Some(id),
          Err(_) => errors.add(&field.name, "Invalid paper id."),
        },
        fields::ABSTRACT => data.abstract_text = Some(value.to_string()),
        fields::LICENSE => match self.licenses.iter().find(|chooser| chooser.transmit_id == value) {
          Some(chooser) => data.license = Some(chooser.clone()),
          None => errors.add(&field.name, "Select a valid choice."),
        },
        fields::EMBARGO_DATE => match NaiveDate::parse_from_str(value, "%Y-%m-%d") {
          Ok(date) if date < today =>
            errors.add(&field.name, "The embargo date cannot be in the past."),
          Ok(date) => data.embargo_date = Some(date),
          Err(_) => errors.add(&field.name, "Enter a valid date (YYYY-MM-DD)."),
        },
        fields::EMAIL => data.email = Some(value.to_string()),
        fields::TOPIC => data.topic = Some(value.to_string()),
        fields::AFFILIATION => data.affiliation = Some(value.to_string()),
        fields::DEPOSITING_AUTHOR => match value.parse::<usize>() {
          Ok(index) => data.depositing_author = Some(index),
          Err(_) => errors.add(&field.name, "Select a valid choice."),
        },
        fields::KEYWORDS =>
          data.keywords = value
            .split(',')
            .map(str::trim)
            .filter(|keyword| !keyword.is_empty())
            .map(str::to_string)
            .collect(),
        other => trace!("Ignoring value of unknown field {other}"),
      }
    }

    if errors.is_empty() {
      Ok(data)
    } else {
      Err(errors)
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::tests::{cc_by, full_paper, minimal_paper};

  fn repository(embargo: EmbargoPolicy) -> Repository {
    let mut repository = Repository::new("Zenodo", "zenodo");
    repository.embargo = embargo;
    repository.licenses = vec![cc_by()];
    repository
  }

  #[test]
  fn test_deposit_form_prefills_defaults() {
    let mut paper = full_paper();
    paper.abstract_text = Some("<p>Lorem <b>ipsum</b> dolor</p>".to_string());
    let form = Form::for_deposit(&paper, &repository(EmbargoPolicy::None), false, Vec::new());

    assert!(!form.is_bound());
    assert_eq!(form.value(fields::ABSTRACT), Some("Lorem ipsum dolor"));
    assert_eq!(form.value(fields::PAPER_ID), Some("7"));
    assert_eq!(form.value(fields::LICENSE), Some("cc-by"));
    assert!(form.field(fields::EMBARGO_DATE).is_none());

    let data = form.validate().unwrap();
    assert_eq!(data.paper_id, Some(7));
    assert_eq!(data.license.unwrap().transmit_id, "cc-by");
  }

  #[test]
  fn test_required_abstract() {
    let paper = minimal_paper();
    let form = Form::for_deposit(&paper, &repository(EmbargoPolicy::None), true, Vec::new());
    let errors = form.validate().unwrap_err();
    assert_eq!(errors.get(fields::ABSTRACT), ["This field is required."]);

    let mut data = form.initial_data();
    data.insert(fields::ABSTRACT.to_string(), "Lorem ipsum".to_string());
    assert!(form.bind(data).is_valid());
  }

  #[test]
  fn test_embargo_policy() {
    let paper = minimal_paper();
    let optional = Form::for_deposit(&paper, &repository(EmbargoPolicy::Optional), false, Vec::new());
    assert!(!optional.field(fields::EMBARGO_DATE).unwrap().required);
    assert!(optional.is_valid());

    let required = Form::for_deposit(&paper, &repository(EmbargoPolicy::Required), false, Vec::new());
    assert!(required.field(fields::EMBARGO_DATE).unwrap().required);
    assert!(!required.is_valid());

    let mut data = required.initial_data();
    data.insert(fields::EMBARGO_DATE.to_string(), "2000-01-01".to_string());
    let errors = required.clone().bind(data.clone()).validate().unwrap_err();
    assert_eq!(errors.get(fields::EMBARGO_DATE), ["The embargo date cannot be in the past."]);

    data.insert(fields::EMBARGO_DATE.to_string(), "3000-01-01".to_string());
    let valid = required.bind(data).validate().unwrap();
    assert_eq!(valid.embargo_date, NaiveDate::from_ymd_opt(3000, 1, 1));
  }

  #[test]
  fn test_invalid_values() {
    let paper = minimal_paper();
    let extra = vec![
      FormField::new(fields::EMAIL, "Email", FieldKind::Email),
      FormField::new(fields::KEYWORDS, "Keywords", FieldKind::Text),
    ];
    let form = Form::for_deposit(&paper, &repository(EmbargoPolicy::Optional), false, extra);

    let mut data = form.initial_data();
    data.insert(fields::LICENSE.to_string(), "all-rights-reserved".to_string());
    data.insert(fields::EMAIL.to_string(), "not an email".to_string());
    data.insert(fields::EMBARGO_DATE.to_string(), "next tuesday".to_string());
    let errors = form.clone().bind(data).validate().unwrap_err();

    assert_eq!(errors.fields().collect::<Vec<_>>(), vec!["email", "embargo_date", "license"]);
    assert!(errors.to_string().contains("email: Enter a valid email address."));

    let mut data = form.initial_data();
    data.insert(fields::KEYWORDS.to_string(), "fiction, , labyrinths ,mirrors".to_string());
    let valid = form.bind(data).validate().unwrap();
    assert_eq!(valid.keywords, vec!["fiction", "labyrinths", "mirrors"]);
    assert_eq!(valid.email, None);
  }
}
