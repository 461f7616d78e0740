//! Outcome types shared by every protocol: the status vocabulary, the per-deposit request log,
//! the transient [`DepositResult`] and the persisted [`DepositRecord`].

use super::*;

/// Status of a deposit, covering both the immediate submission outcome and the longer-lived
/// publication lifecycle.
///
/// Stored as its snake_case name (`pending`, `published`, ...) in the database.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepositStatus {
  /// Accepted by the repository, awaiting moderation or asynchronous processing
  Pending,
  /// Publicly available
  Published,
  /// Accepted, publicly available once the embargo date has passed
  Embargoed,
  /// Refused by the repository's moderators
  Refused,
  /// Withdrawn from the repository
  Deleted,
  /// A dry run went through the whole choreography and was rolled back
  DrySuccess,
  /// The deposit failed
  Failed,
}

impl DepositStatus {
  /// All statuses.
  pub const ALL: [DepositStatus; 7] = [
    DepositStatus::Pending,
    DepositStatus::Published,
    DepositStatus::Embargoed,
    DepositStatus::Refused,
    DepositStatus::Deleted,
    DepositStatus::DrySuccess,
    DepositStatus::Failed,
  ];

  /// Stable name used in storage and logs.
  pub fn as_str(&self) -> &'static str {
    match self {
      DepositStatus::Pending => "pending",
      DepositStatus::Published => "published",
      DepositStatus::Embargoed => "embargoed",
      DepositStatus::Refused => "refused",
      DepositStatus::Deleted => "deleted",
      DepositStatus::DrySuccess => "dry_success",
      DepositStatus::Failed => "failed",
    }
  }

  /// Whether the submission reached a good state.
  pub fn is_success(&self) -> bool {
    matches!(
      self,
      DepositStatus::Pending
        | DepositStatus::Published
        | DepositStatus::Embargoed
        | DepositStatus::DrySuccess
    )
  }
}

impl fmt::Display for DepositStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.as_str()) }
}

impl FromStr for DepositStatus {
  type Err = DepositError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    DepositStatus::ALL
      .iter()
      .find(|status| status.as_str() == s)
      .copied()
      .ok_or_else(|| DepositError::InvalidStatus(s.to_string()))
  }
}

/// A label/value pair shown to the user next to a deposit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdditionalInfo {
  /// What the value is
  pub label: String,
  /// The value
  pub value: String,
}

impl AdditionalInfo {
  /// Creates a label/value pair.
  pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
    Self { label: label.into(), value: value.into() }
  }
}

/// Append-only log of one deposit attempt.
///
/// The log is threaded explicitly through a protocol's `submit_deposit` and ends up verbatim in
/// [`DepositResult::logs`] and [`DepositRecord::request`]. Every line is mirrored to `tracing` at
/// debug level.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DepositLog {
  /// Lines in the order they were appended
  lines: Vec<String>,
}

impl DepositLog {
  /// Creates an empty log.
  pub fn new() -> Self { Self::default() }

  /// Appends a line.
  pub fn log(&mut self, line: impl Into<String>) {
    let line = line.into();
    debug!("{line}");
    self.lines.push(line);
  }

  /// Records an HTTP exchange and checks its status.
  ///
  /// The method, URL, status and body of the exchange are appended to the log. This is the
  /// single place where the success of a remote call is judged.
  ///
  /// # Errors
  ///
  /// Returns [`DepositError::UnexpectedStatus`] carrying `error_message` if the response status
  /// is not `expected_status`.
  pub fn log_request(
    &mut self,
    response: &HttpResponse,
    expected_status: u16,
    error_message: &str,
  ) -> Result<(), DepositError> {
    self.log(format!("--- Request to {} {}", response.method, response.url));
    self.log(format!("Status code: {} (expected {expected_status})", response.status));
    if !response.body.is_empty() {
      trace!("Response body: {}", response.body);
      self.log(response.body.clone());
    }
    if response.status != expected_status {
      self.log(format!("Aborting: {error_message}"));
      return Err(DepositError::UnexpectedStatus {
        expected: expected_status,
        found:    response.status,
        message:  error_message.to_string(),
      });
    }
    Ok(())
  }

  /// The appended lines.
  pub fn lines(&self) -> &[String] { &self.lines }

  /// Whether nothing was logged yet.
  pub fn is_empty(&self) -> bool { self.lines.is_empty() }

  /// Drops every line.
  pub fn clear(&mut self) { self.lines.clear(); }

  /// The log as newline-separated text.
  pub fn to_text(&self) -> String { self.lines.join("\n") }
}

/// What a protocol reports after a submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepositResult {
  /// Repository-assigned identifier
  pub identifier:       Option<String>,
  /// Human-viewable landing page
  pub splash_url:       Option<String>,
  /// Direct PDF link, often unset until the deposit is published
  pub pdf_url:          Option<String>,
  /// Full request log of the attempt
  pub logs:             String,
  /// Outcome
  pub status:           DepositStatus,
  /// User-facing summary of a failure
  pub message:          Option<String>,
  /// License the paper was deposited under
  pub license:          Option<License>,
  /// Record created for the new deposit by the submit wrapper
  pub oai_record:       Option<OaiRecord>,
  /// Date at which an embargoed deposit becomes public
  pub embargo_date:     Option<NaiveDate>,
  /// Extra details shown to the user
  pub additional_info:  Vec<AdditionalInfo>,
  /// Metadata prepared for an intermediate system (dark archive deposits)
  pub archive_metadata: Option<Value>,
}

impl DepositResult {
  /// An empty result with the given status.
  pub fn new(status: DepositStatus) -> Self {
    Self {
      identifier: None,
      splash_url: None,
      pdf_url: None,
      logs: String::new(),
      status,
      message: None,
      license: None,
      oai_record: None,
      embargo_date: None,
      additional_info: Vec::new(),
      archive_metadata: None,
    }
  }

  /// A failed result carrying a user-facing message.
  pub fn failed(message: impl Into<String>) -> Self {
    Self { message: Some(message.into()), ..Self::new(DepositStatus::Failed) }
  }

  /// Whether the status is a good terminal state.
  pub fn success(&self) -> bool { self.status.is_success() }

  /// Sets `Embargoed` with the given date when it lies after `today`, `Published` otherwise.
  pub fn published_or_embargoed(mut self, embargo_date: Option<NaiveDate>, today: NaiveDate) -> Self {
    match embargo_date {
      Some(date) if date > today => {
        self.status = DepositStatus::Embargoed;
        self.embargo_date = Some(date);
      },
      _ => self.status = DepositStatus::Published,
    }
    self
  }
}

/// The persisted outcome of a deposit attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepositRecord {
  /// Database id, unset until saved
  pub id:              Option<i64>,
  /// Deposited paper
  pub paper_id:        i64,
  /// Depositing user
  pub username:        String,
  /// Target repository name
  pub repository:      String,
  /// The uploaded PDF
  pub file_path:       PathBuf,
  /// Repository-assigned identifier
  pub identifier:      Option<String>,
  /// Landing page
  pub splash_url:      Option<String>,
  /// Direct PDF link
  pub pdf_url:         Option<String>,
  /// Request log
  pub request:         String,
  /// Current status
  pub status:          DepositStatus,
  /// URI of the license deposited under
  pub license:         Option<String>,
  /// Extra details shown to the user
  pub additional_info: Vec<AdditionalInfo>,
  /// When the deposit was attempted
  pub created:         DateTime<Utc>,
  /// When an embargoed deposit becomes public
  pub pub_date:        Option<NaiveDate>,
}

impl DepositRecord {
  /// Builds the record of a finished attempt, successful or not.
  pub fn from_result(
    paper: &Paper,
    user: &User,
    repository: &Repository,
    pdf: &UploadedPdf,
    result: &DepositResult,
  ) -> Self {
    Self {
      id:              None,
      paper_id:        paper.id,
      username:        user.username.clone(),
      repository:      repository.name.clone(),
      file_path:       pdf.path.clone(),
      identifier:      result.identifier.clone(),
      splash_url:      result.splash_url.clone(),
      pdf_url:         result.pdf_url.clone(),
      request:         result.logs.clone(),
      status:          result.status,
      license:         result.license.as_ref().map(|license| license.uri.clone()),
      additional_info: result.additional_info.clone(),
      created:         Utc::now(),
      pub_date:        result.embargo_date,
    }
  }
}
