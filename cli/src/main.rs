use anyhow::Result;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use nukefire_core::database::Database;
use nukefire_core::export::export_csv_file;
use nukefire_core::file_utils::{decode_text, find_files_with_extension, read_text_file};
use nukefire_core::models::EditableColumn;
use nukefire_core::parsers::parse_item_file;
use nukefire_core::{AppConfig, ItemRecord, NewItem, ParseOptions, SearchQuery, parse_item_data_with};
use rayon::prelude::*;
use std::io::{BufRead, Read, Write};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

const DEFAULT_DATABASE: &str = "./nukefire-eq.sqlite";
const DEFAULT_LOG_FILE: &str = "/tmp/nukefire-eq.log";

#[derive(Parser)]
#[command(
    name = "nukefire",
    version = "0.1.0",
    about = "Parse Nukefire identify output and manage the EQ database",
    long_about = None
)]
struct Cli {
    /// Path to SQLite database file
    #[arg(long, global = true, env = "NUKEFIRE_DATABASE")]
    database: Option<PathBuf>,

    /// Path to TOML config file
    #[arg(long, global = true, env = "NUKEFIRE_CONFIG")]
    config: Option<PathBuf>,

    /// Path to log file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    /// Verbosity level (repeat for more verbose output)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse identify text and print the record as JSON
    Parse {
        /// File with identify output (reads stdin when omitted)
        #[arg(long)]
        input: Option<PathBuf>,
    },

    /// Parse identify text and add it to the database
    Add {
        /// File with identify output (reads stdin when omitted)
        #[arg(long)]
        input: Option<PathBuf>,
        /// Zone the item was found in
        #[arg(long, default_value = "")]
        zone: String,
        /// Directions to the zone
        #[arg(long, default_value = "")]
        directions: String,
        /// MOB that carries the item
        #[arg(long, default_value = "")]
        mob: String,
    },

    /// Parse every identify dump in a directory and add them in one batch
    Import {
        /// Directory containing identify dumps
        #[arg(long)]
        input_dir: PathBuf,
        /// File extension of the dumps
        #[arg(long, default_value = "txt")]
        extension: String,
        /// Zone applied to every imported item
        #[arg(long, default_value = "")]
        zone: String,
        /// MOB applied to every imported item
        #[arg(long, default_value = "")]
        mob: String,
    },

    /// Show all items
    List,

    /// Search items (case-insensitive substring, all filters must match)
    Search {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        zone: Option<String>,
        #[arg(long)]
        mob: Option<String>,
        #[arg(long = "type")]
        item_type: Option<String>,
        /// Worn, tattoo or implant location
        #[arg(long)]
        location: Option<String>,
    },

    /// Edit one column of the first item with the given name
    Edit {
        /// Exact item name
        #[arg(long)]
        name: String,
        /// Column to change, e.g. zone, directions, rent, affects
        #[arg(long)]
        column: EditableColumn,
        /// New value
        #[arg(long)]
        value: String,
        /// Skip the confirmation prompt
        #[arg(long, default_value_t = false)]
        yes: bool,
    },

    /// Export all items to CSV
    Export {
        /// Output CSV path
        #[arg(long)]
        output: PathBuf,
    },
}

fn setup_logging(verbose: u8, log_file: &Path) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    let filter_level = match verbose {
        0 => tracing::Level::ERROR,
        1 => tracing::Level::WARN,
        2 => tracing::Level::INFO,
        3 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    let filter = EnvFilter::from_default_env().add_directive(filter_level.into());

    let file_appender = tracing_appender::rolling::never(
        log_file.parent().unwrap_or(Path::new(".")),
        log_file.file_name().unwrap_or(std::ffi::OsStr::new("nukefire-eq.log")),
    );
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::Layer::new().with_writer(std::io::stderr).with_ansi(true))
        .with(fmt::Layer::new().with_writer(non_blocking).with_ansi(false));

    tracing::subscriber::set_global_default(subscriber)?;

    Ok(guard)
}

/// Read identify text from a file, or stdin when no file is given.
fn read_input(input: Option<&Path>) -> Result<String> {
    match input {
        Some(path) => {
            if !path.exists() {
                anyhow::bail!("Input file not found: {:?}", path);
            }
            Ok(read_text_file(path)?)
        }
        None => {
            let mut bytes = Vec::new();
            std::io::stdin().read_to_end(&mut bytes)?;
            Ok(decode_text(&bytes))
        }
    }
}

fn print_records(records: &[ItemRecord]) {
    if records.is_empty() {
        println!("No items found.");
        return;
    }
    for record in records {
        let item = &record.item;
        let location = item
            .locations()
            .map(|(kind, slots)| format!("{}: {}", kind.label(), slots))
            .unwrap_or_default();
        println!(
            "{:>5}  {}  [{}]  {}  zone: {}  mob: {}  {}",
            record.id,
            item.name.as_deref().unwrap_or_default(),
            item.item_type.as_deref().unwrap_or_default(),
            location,
            record.zone,
            record.mob,
            item.affects_summary(),
        );
    }
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{} [y/N] ", prompt);
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => {
            if !path.exists() {
                anyhow::bail!("Config file not found: {:?}", path);
            }
            AppConfig::from_file(path)?
        }
        None => AppConfig::default(),
    };

    let log_file = cli
        .log_file
        .clone()
        .or_else(|| config.log_file.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE));
    let _guard = setup_logging(cli.verbose, &log_file)?;

    info!("Starting nukefire CLI");

    let db_path = cli
        .database
        .clone()
        .or_else(|| config.database.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE));
    let options: ParseOptions = config.parser;

    match cli.command {
        Commands::Parse { input } => {
            let item = match input {
                Some(path) => parse_item_file(&path, &options)?,
                None => parse_item_data_with(&read_input(None)?, &options),
            };
            println!("{}", serde_json::to_string_pretty(&item)?);
        }
        Commands::Add { input, zone, directions, mob } => {
            let raw_text = read_input(input.as_deref())?;
            let item = parse_item_data_with(&raw_text, &options);
            if item.name.is_none() {
                anyhow::bail!("No \"Object '<name>',\" line found; is this identify output?");
            }

            let db = Database::new(&db_path)?;
            let id = db.add_item(&NewItem { item, zone, directions, mob, raw_text })?;
            println!("Added item {}", id);
        }
        Commands::Import { input_dir, extension, zone, mob } => {
            let db = Database::new(&db_path)?;

            let files = find_files_with_extension(&input_dir, &extension)?;
            info!("Found {} .{} files in {:?}", files.len(), extension, input_dir);

            let progress = ProgressBar::new(files.len() as u64);
            progress.set_style(ProgressStyle::with_template(
                "{spinner} [{bar:40}] {pos}/{len} {msg}",
            )?);

            // Parse all dumps in parallel
            let items: Vec<NewItem> = files
                .par_iter()
                .filter_map(|path| {
                    let parsed = match read_text_file(path) {
                        Ok(raw_text) => Some(NewItem {
                            item: parse_item_data_with(&raw_text, &options),
                            zone: zone.clone(),
                            directions: String::new(),
                            mob: mob.clone(),
                            raw_text,
                        }),
                        Err(e) => {
                            tracing::warn!("Failed to read {:?}: {}", path, e);
                            None
                        }
                    };
                    progress.inc(1);
                    parsed
                })
                .collect();
            progress.finish_with_message("parsed");

            let inserted = db.add_items(&items)?;
            println!(
                "Imported {} of {} files ({} skipped)",
                inserted,
                files.len(),
                files.len() - inserted
            );
        }
        Commands::List => {
            let db = Database::new(&db_path)?;
            print_records(&db.list_items()?);
        }
        Commands::Search { name, zone, mob, item_type, location } => {
            let db = Database::new(&db_path)?;
            let query = SearchQuery { name, zone, mob, item_type, location };
            print_records(&db.search_items(&query)?);
        }
        Commands::Edit { name, column, value, yes } => {
            let db = Database::new(&db_path)?;
            let Some(record) = db.find_by_name(&name)? else {
                anyhow::bail!("No item named '{}'", name);
            };

            println!("Current {}: {}", column, record.field_value(column));
            println!("New {}: {}", column, value);
            if !yes && !confirm("Are you sure you want to update this record?")? {
                println!("Update cancelled.");
                return Ok(());
            }

            db.update_field(&name, column, &value)?;
            println!("'{}' has been updated in column '{}'", name, column);
        }
        Commands::Export { output } => {
            let db = Database::new(&db_path)?;
            let count = export_csv_file(&db.list_items()?, &output)?;
            println!("Exported {} items to {:?}", count, output);
        }
    }

    info!("Nukefire CLI finished");
    Ok(())
}
