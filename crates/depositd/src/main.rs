use std::path::{Path, PathBuf};

use chrono::{NaiveDate, Utc};
use clap::{builder::ArgAction, Parser, Subcommand};
use console::{style, Emoji};
use deposit::{
  database::Database,
  http::ReqwestTransport,
  metadata::{self, dublin_core::DublinCoreFormatter, mods::ModsFormatter, MetadataFormatter},
  mets::{self, MdType},
  protocol::default_registry,
  submit_deposit_wrapper, DepositData, DepositRecord, DepositSession, FormData, Paper, Repository,
  UploadedPdf, User,
};
use errors::DepositdErrors;
use serde::de::DeserializeOwned;
use tracing::{debug, trace};
use tracing_subscriber::EnvFilter;

pub mod errors;

static BOOKS: Emoji<'_, '_> = Emoji("📚 ", "");
static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "");
static PAPER: Emoji<'_, '_> = Emoji("📄 ", "");
static PACKAGE: Emoji<'_, '_> = Emoji("📦 ", "");
static SAVE: Emoji<'_, '_> = Emoji("💾 ", "");
static WARNING: Emoji<'_, '_> = Emoji("⚠️  ", "");
static SUCCESS: Emoji<'_, '_> = Emoji("✨ ", "");

/// Environment variables consulted when a repository file carries no credentials.
const CREDENTIAL_VARIABLES: [&str; 3] = ["DEPOSIT_API_KEY", "DEPOSIT_USERNAME", "DEPOSIT_PASSWORD"];

#[derive(Parser)]
#[command(author, version, about = "Deposit papers into open repositories")]
struct Cli {
  /// Verbose mode (-v, -vv, -vvv)
  #[arg(
        short,
        long,
        action = ArgAction::Count,
        global = true,
        help = "Increase logging verbosity"
    )]
  verbose: u8,

  /// Path to the database file
  #[arg(long, short, global = true)]
  path: Option<PathBuf>,

  /// Answer yes to every confirmation prompt
  #[arg(long, global = true)]
  accept_defaults: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Initialize a new deposit database
  Init,
  /// Removes the entire database
  Clean,
  /// List the available deposit protocols and metadata formats
  Protocols,
  /// Render the metadata of a paper
  Render {
    /// Metadata format (tei, mods, dc, zenodo, osf)
    format:        String,
    /// JSON file describing the paper
    paper:         PathBuf,
    /// Abstract to use instead of the paper's own
    #[arg(long = "abstract")]
    abstract_text: Option<String>,
    /// Embargo end date (YYYY-MM-DD)
    #[arg(long)]
    embargo:       Option<NaiveDate>,
    /// Keyword, may be repeated
    #[arg(long = "keyword")]
    keywords:      Vec<String>,
  },
  /// Build a METS package (mets.xml + document.pdf)
  Package {
    /// JSON file describing the paper
    paper:       PathBuf,
    /// The full text
    pdf:         PathBuf,
    /// Where to write the zip
    output:      PathBuf,
    /// Wrap Dublin Core instead of MODS
    #[arg(long)]
    dublin_core: bool,
  },
  /// Deposit a paper into a repository
  Submit {
    /// JSON file describing the repository
    repository: PathBuf,
    /// JSON file describing the paper
    paper:      PathBuf,
    /// JSON file describing the depositing user
    user:       PathBuf,
    /// The full text
    pdf:        PathBuf,
    /// JSON object of form values (license, embargo_date, topic, ...)
    #[arg(long)]
    form:       Option<PathBuf>,
    /// Run the whole choreography, then roll back
    #[arg(long)]
    dry_run:    bool,
  },
  /// Publish deposits whose embargo has ended
  Refresh {
    /// Day to compare embargo dates with, today by default
    #[arg(long)]
    today: Option<NaiveDate>,
  },
  /// Show deposit records
  Records {
    /// Only the records of this paper
    #[arg(long)]
    paper: Option<i64>,
    /// How many of the most recent records to show
    #[arg(long, default_value_t = 20)]
    limit: usize,
  },
}

/// Setup logging with the specified verbosity level
fn setup_logging(verbosity: u8) {
  let filter = match verbosity {
    0 => "warn",
    1 => "info",
    2 => "debug",
    _ => "trace",
  };

  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_file(true)
    .with_line_number(true)
    .with_thread_ids(true)
    .with_target(true)
    .with_writer(std::io::stderr)
    .init();
}

/// Reads a JSON input file.
fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, DepositdErrors> {
  trace!("Reading {}", path.display());
  Ok(serde_json::from_str(&std::fs::read_to_string(path)?)?)
}

/// Fills missing credentials from the environment.
fn apply_env_credentials(repository: &mut Repository) {
  let [api_key, username, password] = CREDENTIAL_VARIABLES;
  let fields = [
    (&mut repository.api_key, api_key),
    (&mut repository.username, username),
    (&mut repository.password, password),
  ];
  for (field, variable) in fields {
    if field.is_none() {
      if let Ok(value) = std::env::var(variable) {
        debug!("Using {variable} from the environment");
        *field = Some(value);
      }
    }
  }
}

/// Asks for confirmation, unless prompts are disabled.
fn confirm(prompt: &str, accept_defaults: bool) -> Result<bool, DepositdErrors> {
  if accept_defaults {
    return Ok(true);
  }
  Ok(dialoguer::Confirm::new().with_prompt(prompt).default(false).wait_for_newline(true).interact()?)
}

/// Opens the database, creating its parent directories.
async fn open_database(path: &Path) -> Result<Database, DepositdErrors> {
  if let Some(parent) = path.parent() {
    trace!("Creating parent directories: {}", parent.display());
    std::fs::create_dir_all(parent)?;
  }
  trace!("Using database at: {}", path.display());
  Ok(Database::open(path).await?)
}

/// Removes the database file and its SQLite companions.
fn remove_database(path: &Path) -> Result<(), DepositdErrors> {
  std::fs::remove_file(path)?;
  let companions = glob::glob(&format!("{}*", path.display()))?;
  for file in companions.flatten() {
    std::fs::remove_file(file)?;
  }
  Ok(())
}

/// Prints one deposit record.
fn print_record(record: &DepositRecord) {
  println!(
    "\n{} {} {} on {}",
    style(PAPER).green(),
    style(format!("#{}", record.id.unwrap_or_default())).yellow(),
    style(record.status).cyan().bold(),
    style(&record.repository).white().bold()
  );
  println!("   {} {}", style("Paper:").green(), style(record.paper_id).white());
  println!("   {} {}", style("Depositor:").green(), style(&record.username).white());
  println!("   {} {}", style("Date:").green(), style(record.created.format("%Y-%m-%d %H:%M")).white());
  if let Some(identifier) = &record.identifier {
    println!("   {} {}", style("Identifier:").green(), style(identifier).yellow());
  }
  if let Some(url) = &record.splash_url {
    println!("   {} {}", style("Landing page:").green(), style(url).blue().underlined());
  }
  if let Some(date) = record.pub_date {
    println!("   {} {}", style("Embargo until:").green(), style(date).white());
  }
}

#[tokio::main]
async fn main() -> Result<(), DepositdErrors> {
  let cli = Cli::parse();
  setup_logging(cli.verbose);

  let path = cli.path.unwrap_or_else(|| {
    let default_path = Database::default_path();
    debug!("Using default database path: {}", default_path.display());
    default_path
  });

  match cli.command {
    Commands::Init => {
      if path.exists() {
        println!(
          "{} Database already exists at: {}",
          style(WARNING).yellow(),
          style(path.display()).yellow()
        );

        if !confirm(
          "Do you want to reinitialize this database? This will erase all existing data",
          cli.accept_defaults,
        )? {
          println!("{} Keeping existing database", style("ℹ").blue());
          return Ok(());
        }

        println!("{} Removing existing database", style(WARNING).yellow());
        remove_database(&path)?;
      }

      println!(
        "{} Initializing database at: {}",
        style(ROCKET).cyan(),
        style(path.display()).yellow()
      );
      open_database(&path).await?;
      println!("{} Database initialized successfully!", style(SUCCESS).green());
      Ok(())
    },

    Commands::Clean => {
      if !path.exists() {
        println!("{} No database found at: {}", style(WARNING).yellow(), style(path.display()).yellow());
        return Ok(());
      }

      println!("{} Database found at: {}", style(WARNING).yellow(), style(path.display()).yellow());
      if !confirm("Are you sure you want to delete this database?", cli.accept_defaults)? {
        println!("{} Operation cancelled", style("✖").red());
        return Ok(());
      }

      remove_database(&path)?;
      println!("{} Database files cleaned", style(SUCCESS).green());
      Ok(())
    },

    Commands::Protocols => {
      println!("{} Deposit protocols:", style(BOOKS).cyan());
      for id in default_registry().protocols() {
        println!("   {}", style(id).yellow());
      }
      println!("\n{} Metadata formats:", style(BOOKS).cyan());
      for name in metadata::FORMATS {
        println!("   {}", style(name).yellow());
      }
      Ok(())
    },

    Commands::Render { format, paper, abstract_text, embargo, keywords } => {
      let formatter =
        metadata::formatter(&format).ok_or_else(|| DepositdErrors::UnknownFormat(format.clone()))?;
      let paper: Paper = read_json(&paper)?;
      let data = DepositData { abstract_text, embargo_date: embargo, keywords, ..Default::default() };
      let filename = deposit::format::pdf_file_name(&paper.title);

      let bytes = formatter.to_bytes(&paper, Some(filename.as_str()), &data)?;
      println!("{}", String::from_utf8_lossy(&bytes));
      Ok(())
    },

    Commands::Package { paper, pdf, output, dublin_core } => {
      let paper: Paper = read_json(&paper)?;
      let data = DepositData::default();
      let (document, md_type) = if dublin_core {
        (DublinCoreFormatter.render(&paper, None, &data)?, MdType::Dc)
      } else {
        (ModsFormatter.render(&paper, None, &data)?, MdType::Mods)
      };

      let mets = mets::build_mets(document.into_xml()?, md_type);
      let package = mets::build_package(&mets, &std::fs::read(&pdf)?)?;
      std::fs::write(&output, &package)?;

      println!(
        "{} Wrote {} ({} bytes)",
        style(PACKAGE).green(),
        style(output.display()).yellow(),
        style(package.len()).white()
      );
      Ok(())
    },

    Commands::Submit { repository, paper, user, pdf, form, dry_run } => {
      let mut repository: Repository = read_json(&repository)?;
      apply_env_credentials(&mut repository);
      let paper: Paper = read_json(&paper)?;
      let user: User = read_json(&user)?;
      let values: FormData = match form {
        Some(form) => read_json(&form)?,
        None => FormData::new(),
      };

      let db = open_database(&path).await?;
      let protocol = default_registry().instantiate(repository.clone())?;
      let mut session = DepositSession::new(protocol);

      println!(
        "{} Depositing {} on {}{}",
        style(ROCKET).cyan(),
        style(&paper.title).white().bold(),
        style(&repository.name).yellow(),
        if dry_run { " (dry run)" } else { "" }
      );

      if !session.init_deposit(paper.clone(), user.clone()) {
        println!("{} This paper is already deposited on {}", style("ℹ").blue(), repository.name);
        return Ok(());
      }

      let form = session.get_form()?;
      let mut submitted = form.initial_data();
      submitted.extend(values);
      let form = form.bind(submitted);
      form.validate()?;

      let pdf = UploadedPdf::new(pdf);
      let transport = ReqwestTransport::new()?;
      let result = submit_deposit_wrapper(&mut session, &transport, &db, &pdf, &form, dry_run).await;
      debug!("Deposit log:\n{}", result.logs);

      let record = DepositRecord::from_result(&paper, &user, &repository, &pdf, &result);
      let id = db.save_deposit_record(&record).await?;

      if result.success() {
        println!("\n{} Deposit {}", style(SUCCESS).green(), style(result.status).cyan().bold());
        if let Some(identifier) = &result.identifier {
          println!("   {} {}", style("Identifier:").green().bold(), style(identifier).yellow());
        }
        if let Some(url) = &result.splash_url {
          println!("   {} {}", style("Landing page:").green().bold(), style(url).blue().underlined());
        }
        for info in &result.additional_info {
          println!("   {} {}", style(format!("{}:", info.label)).green().bold(), style(&info.value).white());
        }
        if let Some(letter) = &repository.letter_declaration {
          println!("   {} {}", style("Letter of declaration:").green().bold(), style(letter).white());
        }
      } else {
        println!(
          "\n{} Deposit failed: {}",
          style(WARNING).red(),
          style(result.message.as_deref().unwrap_or_default()).red()
        );
      }
      println!("{} Saved deposit record {}", style(SAVE).green(), style(id).yellow());
      Ok(())
    },

    Commands::Refresh { today } => {
      let today = today.unwrap_or_else(|| Utc::now().date_naive());
      let db = open_database(&path).await?;
      let published = db.refresh_embargoed(today).await?;
      println!(
        "{} Published {} deposits whose embargo ended by {}",
        style(SUCCESS).green(),
        style(published).yellow(),
        style(today).white()
      );
      Ok(())
    },

    Commands::Records { paper, limit } => {
      let db = open_database(&path).await?;
      let records = match paper {
        Some(paper_id) => db.deposit_records_for_paper(paper_id).await?,
        None => db.recent_deposit_records(limit).await?,
      };

      if records.is_empty() {
        println!("{} No deposit records found", style(WARNING).yellow());
      } else {
        println!("{} Found {} deposit records:", style(SUCCESS).green(), style(records.len()).yellow());
        for record in &records {
          print_record(record);
        }
      }
      Ok(())
    },
  }
}
