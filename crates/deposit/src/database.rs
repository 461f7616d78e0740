//! SQLite persistence of deposit outcomes.
//!
//! The database keeps one [`DepositRecord`] per attempt, the [`OaiRecord`]s created by successful
//! deposits and a per-paper availability flag. It implements [`PaperCatalog`], which makes it the
//! default sink for the side effects of [`submit_deposit_wrapper`](crate::submit_deposit_wrapper).

use std::collections::BTreeSet;

use rusqlite::{params, OptionalExtension};
use tokio_rusqlite::Connection;

use super::*;

/// Columns of `deposit_records`, in the order [`RecordRow::read`] expects them.
const RECORD_COLUMNS: &str = "id, paper_id, username, repository, file_path, identifier, splash_url,
   pdf_url, request, status, license, additional_info, created, pub_date";

/// Database handle for deposit records
pub struct Database {
  /// Async connection to the SQLite file
  conn: Connection,
}

/// A `deposit_records` row as stored, before its text columns are parsed.
struct RecordRow {
  /// Row id
  id:              i64,
  /// Deposited paper
  paper_id:        i64,
  /// Depositing user
  username:        String,
  /// Repository name
  repository:      String,
  /// Path of the uploaded PDF
  file_path:       String,
  /// Repository-assigned identifier
  identifier:      Option<String>,
  /// Landing page
  splash_url:      Option<String>,
  /// Direct PDF link
  pdf_url:         Option<String>,
  /// Request log
  request:         String,
  /// Status name
  status:          String,
  /// License URI
  license:         Option<String>,
  /// JSON list of label/value pairs
  additional_info: String,
  /// Attempt time
  created:         DateTime<Utc>,
  /// End of embargo
  pub_date:        Option<NaiveDate>,
}

impl RecordRow {
  /// Reads a row selected with [`RECORD_COLUMNS`].
  fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:              row.get(0)?,
      paper_id:        row.get(1)?,
      username:        row.get(2)?,
      repository:      row.get(3)?,
      file_path:       row.get(4)?,
      identifier:      row.get(5)?,
      splash_url:      row.get(6)?,
      pdf_url:         row.get(7)?,
      request:         row.get(8)?,
      status:          row.get(9)?,
      license:         row.get(10)?,
      additional_info: row.get(11)?,
      created:         row.get(12)?,
      pub_date:        row.get(13)?,
    })
  }

  /// Parses the text columns.
  fn into_record(self) -> Result<DepositRecord, DepositError> {
    Ok(DepositRecord {
      id:              Some(self.id),
      paper_id:        self.paper_id,
      username:        self.username,
      repository:      self.repository,
      file_path:       PathBuf::from(self.file_path),
      identifier:      self.identifier,
      splash_url:      self.splash_url,
      pdf_url:         self.pdf_url,
      request:         self.request,
      status:          self.status.parse()?,
      license:         self.license,
      additional_info: serde_json::from_str(&self.additional_info)?,
      created:         self.created,
      pub_date:        self.pub_date,
    })
  }
}

impl Database {
  /// Open or create a database at the specified path
  pub async fn open(path: impl AsRef<Path>) -> Result<Self, DepositError> {
    let conn = Connection::open(path.as_ref()).await?;

    conn
      .call(|conn| {
        conn.execute_batch(include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/migrations/init.sql")))?;
        Ok(())
      })
      .await?;

    debug!("Opened deposit database at {}", path.as_ref().display());
    Ok(Self { conn })
  }

  /// Get default database path in user's data directory
  pub fn default_path() -> PathBuf {
    dirs::data_dir().unwrap_or_else(|| PathBuf::from(".")).join("deposit").join("deposit.db")
  }

  /// Saves a new deposit record and returns its id.
  pub async fn save_deposit_record(&self, record: &DepositRecord) -> Result<i64, DepositError> {
    let record = record.clone();
    let additional_info = serde_json::to_string(&record.additional_info)?;
    self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare_cached(
          "INSERT INTO deposit_records (
             paper_id, username, repository, file_path, identifier, splash_url, pdf_url,
             request, status, license, additional_info, created, pub_date
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
           RETURNING id",
        )?;
        let id = stmt.query_row(
          params![
            record.paper_id,
            &record.username,
            &record.repository,
            record.file_path.to_string_lossy().into_owned(),
            &record.identifier,
            &record.splash_url,
            &record.pdf_url,
            &record.request,
            record.status.as_str(),
            &record.license,
            additional_info,
            record.created,
            record.pub_date,
          ],
          |row| row.get::<_, i64>(0),
        )?;
        Ok(id)
      })
      .await
      .map_err(DepositError::from)
  }

  /// Gets a deposit record by id.
  pub async fn get_deposit_record(&self, id: i64) -> Result<Option<DepositRecord>, DepositError> {
    let row = self
      .conn
      .call(move |conn| {
        let mut stmt =
          conn.prepare_cached(&format!("SELECT {RECORD_COLUMNS} FROM deposit_records WHERE id = ?1"))?;
        Ok(stmt.query_row([id], RecordRow::read).optional()?)
      })
      .await?;
    row.map(RecordRow::into_record).transpose()
  }

  /// Every deposit record of a paper, oldest first.
  pub async fn deposit_records_for_paper(&self, paper_id: i64) -> Result<Vec<DepositRecord>, DepositError> {
    let rows = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare_cached(&format!(
          "SELECT {RECORD_COLUMNS} FROM deposit_records WHERE paper_id = ?1 ORDER BY id"
        ))?;
        let rows = stmt.query_map([paper_id], RecordRow::read)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
      })
      .await?;
    rows.into_iter().map(RecordRow::into_record).collect()
  }

  /// The `limit` most recent deposit records, newest first.
  pub async fn recent_deposit_records(&self, limit: usize) -> Result<Vec<DepositRecord>, DepositError> {
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    let rows = self
      .conn
      .call(move |conn| {
        let mut stmt = conn
          .prepare_cached(&format!("SELECT {RECORD_COLUMNS} FROM deposit_records ORDER BY id DESC LIMIT ?1"))?;
        let rows = stmt.query_map([limit], RecordRow::read)?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
      })
      .await?;
    rows.into_iter().map(RecordRow::into_record).collect()
  }

  /// Publishes every embargoed record whose embargo ended on or before `today`.
  ///
  /// Returns how many records changed; running it twice on the same day changes nothing the
  /// second time.
  pub async fn refresh_embargoed(&self, today: NaiveDate) -> Result<usize, DepositError> {
    let updated = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE deposit_records SET status = ?1
           WHERE status = ?2 AND pub_date IS NOT NULL AND pub_date <= ?3",
          params![DepositStatus::Published.as_str(), DepositStatus::Embargoed.as_str(), today],
        )?)
      })
      .await?;
    info!("Published {updated} deposits whose embargo ended by {today}");
    Ok(updated)
  }

  /// The OAI records attached to a paper.
  pub async fn oai_records_for_paper(&self, paper_id: i64) -> Result<Vec<OaiRecord>, DepositError> {
    self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare_cached(
          "SELECT source, identifier, splash_url, pdf_url FROM oai_records WHERE paper_id = ?1 ORDER BY id",
        )?;
        let records = stmt.query_map([paper_id], |row| {
          Ok(OaiRecord {
            source:     row.get(0)?,
            identifier: row.get(1)?,
            splash_url: row.get(2)?,
            pdf_url:    row.get(3)?,
          })
        })?;
        Ok(records.collect::<Result<Vec<_>, _>>()?)
      })
      .await
      .map_err(DepositError::from)
  }

  /// Number of distinct records giving access to the full text of a paper, as of the last
  /// statistics update.
  pub async fn full_text_records(&self, paper_id: i64) -> Result<usize, DepositError> {
    self
      .conn
      .call(move |conn| {
        let count = conn
          .query_row(
            "SELECT record_count FROM paper_availability WHERE paper_id = ?1",
            [paper_id],
            |row| row.get::<_, i64>(0),
          )
          .optional()?;
        Ok(count.unwrap_or(0) as usize)
      })
      .await
      .map_err(DepositError::from)
  }

  /// Whether the paper has a copy available somewhere, as last computed.
  pub async fn is_available(&self, paper_id: i64) -> Result<bool, DepositError> {
    self
      .conn
      .call(move |conn| {
        let available = conn
          .query_row("SELECT available FROM paper_availability WHERE paper_id = ?1", [paper_id], |row| {
            row.get::<_, bool>(0)
          })
          .optional()?;
        Ok(available.unwrap_or(false))
      })
      .await
      .map_err(DepositError::from)
  }
}

#[async_trait]
impl PaperCatalog for Database {
  async fn add_oai_record(&self, paper: &Paper, record: &OaiRecord) -> Result<(), DepositError> {
    let paper_id = paper.id;
    let record = record.clone();
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO oai_records (paper_id, source, identifier, splash_url, pdf_url)
           VALUES (?1, ?2, ?3, ?4, ?5)
           ON CONFLICT(source, identifier) DO UPDATE SET
             paper_id = excluded.paper_id,
             splash_url = excluded.splash_url,
             pdf_url = excluded.pdf_url",
          params![paper_id, &record.source, &record.identifier, &record.splash_url, &record.pdf_url],
        )?;
        Ok(())
      })
      .await
      .map_err(DepositError::from)
  }

  async fn update_statistics(&self, paper: &Paper) -> Result<(), DepositError> {
    let paper_id = paper.id;
    let harvested: BTreeSet<(String, String)> = paper
      .oai_records
      .iter()
      .filter(|record| record.pdf_url.is_some())
      .map(|record| (record.source.clone(), record.identifier.clone()))
      .collect();
    let now = Utc::now();
    self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT source, identifier FROM oai_records WHERE paper_id = ?1 AND pdf_url IS NOT NULL",
        )?;
        let mut full_texts = harvested;
        for key in stmt.query_map([paper_id], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))? {
          full_texts.insert(key?);
        }

        let count = full_texts.len() as i64;
        conn.execute(
          "INSERT INTO paper_availability (paper_id, available, record_count, updated)
           VALUES (?1, ?2, ?3, ?4)
           ON CONFLICT(paper_id) DO UPDATE SET
             available = excluded.available,
             record_count = excluded.record_count,
             updated = excluded.updated",
          params![paper_id, count > 0, count, now],
        )?;
        Ok(())
      })
      .await
      .map_err(DepositError::from)
  }
}

#[cfg(test)]
mod tests {
  use chrono::Days;
  use tempfile::tempdir;

  use super::*;
  use crate::{
    result::AdditionalInfo,
    tests::{full_paper, temp_pdf, test_user, zenodo_repository},
  };

  /// Helper function to set up a test database
  async fn setup_test_db() -> anyhow::Result<(Database, tempfile::TempDir)> {
    let dir = tempdir()?;
    let db = Database::open(dir.path().join("test.db")).await?;
    Ok((db, dir))
  }

  fn record(status: DepositStatus, pub_date: Option<NaiveDate>) -> anyhow::Result<DepositRecord> {
    let (_dir, pdf) = temp_pdf()?;
    let mut result = DepositResult::new(status);
    result.identifier = Some("1".to_string());
    result.splash_url = Some("https://zenodo.org/record/1".to_string());
    result.embargo_date = pub_date;
    result.logs = "--- Request to POST https://zenodo.org/api/deposit/depositions".to_string();
    result.additional_info.push(AdditionalInfo::new("DOI", "10.5281/zenodo.1"));
    Ok(DepositRecord::from_result(&full_paper(), &test_user(), &zenodo_repository(), &pdf, &result))
  }

  #[tokio::test]
  async fn test_database_creation() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let db_path = dir.path().join("test.db");
    let _db = Database::open(&db_path).await?;
    assert!(db_path.exists());

    // Reopening runs the schema again
    let _db = Database::open(&db_path).await?;
    Ok(())
  }

  #[tokio::test]
  async fn test_save_and_retrieve_record() -> anyhow::Result<()> {
    let (db, _dir) = setup_test_db().await?;
    let record = record(DepositStatus::Published, None)?;

    let id = db.save_deposit_record(&record).await?;
    assert!(id > 0);

    let retrieved = db.get_deposit_record(id).await?.expect("record should exist");
    assert_eq!(retrieved.id, Some(id));
    assert_eq!(retrieved.status, DepositStatus::Published);
    assert_eq!(retrieved.username, "hquain");
    assert_eq!(retrieved.repository, "Zenodo");
    assert_eq!(retrieved.file_path, record.file_path);
    assert_eq!(retrieved.request, record.request);
    assert_eq!(retrieved.additional_info, record.additional_info);
    assert_eq!(retrieved.created, record.created);

    assert!(db.get_deposit_record(id + 1).await?.is_none());
    assert_eq!(db.deposit_records_for_paper(7).await?.len(), 1);
    assert!(db.deposit_records_for_paper(8).await?.is_empty());
    Ok(())
  }

  #[tokio::test]
  async fn test_refresh_embargoed() -> anyhow::Result<()> {
    let (db, _dir) = setup_test_db().await?;
    let today = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
    let yesterday = today - Days::new(1);
    let tomorrow = today + Days::new(1);

    let ended = db.save_deposit_record(&record(DepositStatus::Embargoed, Some(yesterday))?).await?;
    let running = db.save_deposit_record(&record(DepositStatus::Embargoed, Some(tomorrow))?).await?;
    let pending = db.save_deposit_record(&record(DepositStatus::Pending, Some(yesterday))?).await?;

    assert_eq!(db.refresh_embargoed(today).await?, 1);
    assert_eq!(db.get_deposit_record(ended).await?.unwrap().status, DepositStatus::Published);
    assert_eq!(db.get_deposit_record(running).await?.unwrap().status, DepositStatus::Embargoed);
    assert_eq!(db.get_deposit_record(pending).await?.unwrap().status, DepositStatus::Pending);

    assert_eq!(db.refresh_embargoed(today).await?, 0);
    Ok(())
  }

  #[tokio::test]
  async fn test_recent_records_are_newest_first() -> anyhow::Result<()> {
    let (db, _dir) = setup_test_db().await?;
    let first = db.save_deposit_record(&record(DepositStatus::Failed, None)?).await?;
    let second = db.save_deposit_record(&record(DepositStatus::Pending, None)?).await?;

    let recent = db.recent_deposit_records(10).await?;
    assert_eq!(recent.iter().map(|record| record.id).collect::<Vec<_>>(), vec![Some(second), Some(first)]);
    assert_eq!(db.recent_deposit_records(1).await?.len(), 1);
    Ok(())
  }

  #[tokio::test]
  async fn test_catalog_side_effects() -> anyhow::Result<()> {
    let (db, _dir) = setup_test_db().await?;
    let mut paper = full_paper();
    assert!(!db.is_available(paper.id).await?);

    let pending = OaiRecord {
      source:     "hal".to_string(),
      identifier: "hal-01234567".to_string(),
      splash_url: Some("https://hal.archives-ouvertes.fr/hal-01234567".to_string()),
      pdf_url:    None,
    };
    db.add_oai_record(&paper, &pending).await?;
    db.update_statistics(&paper).await?;
    assert!(!db.is_available(paper.id).await?);
    assert_eq!(db.full_text_records(paper.id).await?, 0);

    let mut record = OaiRecord {
      source:     "zenodo".to_string(),
      identifier: "1".to_string(),
      splash_url: Some("https://zenodo.org/record/1".to_string()),
      pdf_url:    None,
    };
    db.add_oai_record(&paper, &record).await?;
    record.pdf_url = Some("https://zenodo.org/record/1/files/article.pdf".to_string());
    db.add_oai_record(&paper, &record).await?;

    let records = db.oai_records_for_paper(paper.id).await?;
    assert_eq!(records, vec![pending, record.clone()]);

    db.update_statistics(&paper).await?;
    assert!(db.is_available(paper.id).await?);
    assert_eq!(db.full_text_records(paper.id).await?, 1);

    // A harvested copy of the stored record is counted once
    paper.oai_records.push(record);
    db.update_statistics(&paper).await?;
    assert_eq!(db.full_text_records(paper.id).await?, 1);
    Ok(())
  }
}
