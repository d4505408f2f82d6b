use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use sheetdeck_tools::config::SyncConfig;
use sheetdeck_tools::io::http_fetch::HttpFetcher;
use sheetdeck_tools::store::AnkiConnectStore;
use sheetdeck_tools::store::anki_connect::DEFAULT_ANKI_CONNECT_URL;
use sheetdeck_tools::sync::{
    self, FailurePolicy, NewSource, SourceOutcome, SourceReport, SyncOptions, SyncReport,
};
use sheetdeck_tools::{Result, ToolError};
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();
    if let Err(error) = init_tracing().and_then(|()| run(cli)) {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| ToolError::Logging(err.to_string()))
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Add(args) => execute_add(&cli.config, &cli.anki_url, args),
        Command::Sync(args) => execute_sync(&cli.config, &cli.anki_url, args),
        Command::Remove(args) => execute_remove(&cli.config, args),
        Command::List => execute_list(&cli.config),
    }
}

fn execute_add(config_path: &Path, anki_url: &str, args: AddArgs) -> Result<()> {
    let mut config = SyncConfig::load(config_path)?;
    let fetcher = HttpFetcher::new()?;
    let mut store = AnkiConnectStore::new(anki_url)?;

    let source = sync::add_source(
        &mut config,
        &fetcher,
        &store,
        NewSource {
            url: args.url,
            deck_name: args.deck,
            note_type: args.note_type,
            key_field: args.key_field,
            tags_field: args.tags_field,
            tag_delimiter: args.tag_delimiter,
        },
    )?;
    config.save(config_path)?;
    println!(
        "Linked '{}' to deck '{}' (note type '{}', key field '{}').",
        source.url, source.deck_name, source.note_type, source.notecard_key_field
    );

    let report = sync::sync_all(&fetcher, &mut store, &config, SyncOptions::default())?;
    finish_sync(&report)
}

fn execute_sync(config_path: &Path, anki_url: &str, args: SyncArgs) -> Result<()> {
    let config = SyncConfig::load(config_path)?;
    if config.is_empty() {
        println!("There are currently no remote decks.");
        return Ok(());
    }

    let fetcher = HttpFetcher::new()?;
    let mut store = AnkiConnectStore::new(anki_url)?;
    let options = SyncOptions {
        dry_run: args.dry_run,
        policy: if args.fail_fast {
            FailurePolicy::Abort
        } else {
            FailurePolicy::Continue
        },
    };

    let report = match sync::sync_all(&fetcher, &mut store, &config, options) {
        Ok(report) => report,
        Err(ToolError::SourceFailed {
            deck,
            source,
            synced,
        }) => {
            synced.iter().for_each(print_source_report);
            return Err(ToolError::SourceFailed {
                deck,
                source,
                synced,
            });
        }
        Err(error) => return Err(error),
    };
    finish_sync(&report)
}

fn execute_remove(config_path: &Path, args: RemoveArgs) -> Result<()> {
    let mut config = SyncConfig::load(config_path)?;
    if config.is_empty() {
        println!("There are currently no remote decks.");
        return Ok(());
    }
    let source = sync::remove_source(&mut config, &args.deck)?;
    config.save(config_path)?;
    println!("The deck '{}' has been unlinked.", source.deck_name);
    Ok(())
}

fn execute_list(config_path: &Path) -> Result<()> {
    let config = SyncConfig::load(config_path)?;
    if config.is_empty() {
        println!("There are currently no remote decks.");
        return Ok(());
    }
    for source in config.sources() {
        println!(
            "{}\t{}\t{} [{}]\t{}",
            source.deck_name,
            source.note_type,
            source.notecard_key_field,
            source.note_type_fields.join(", "),
            source.url
        );
    }
    Ok(())
}

fn finish_sync(report: &SyncReport) -> Result<()> {
    for outcome in &report.outcomes {
        match outcome {
            SourceOutcome::Synced(source) => print_source_report(source),
            SourceOutcome::Failed {
                deck_name, error, ..
            } => eprintln!("{error}\nThe following deck failed to sync: {deck_name}"),
        }
    }

    let failed = report.failures().count();
    if failed > 0 {
        return Err(ToolError::SyncIncomplete {
            failed,
            total: report.outcomes.len(),
        });
    }
    println!("Synchronization complete");
    Ok(())
}

fn print_source_report(source: &SourceReport) {
    match &source.applied {
        Some(stats) => println!(
            "{}: {} created, {} updated, {} deleted, {} unchanged, {} skipped rows{}",
            source.deck_name,
            stats.created,
            stats.updated,
            stats.deleted,
            stats.unchanged,
            source.skipped_rows,
            if stats.skipped_creates > 0 {
                format!(", {} new notes skipped (missing note type)", stats.skipped_creates)
            } else {
                String::new()
            }
        ),
        None => println!(
            "{} (dry run): would create {}, update {}, delete {}; {} unchanged",
            source.deck_name,
            source.plan.creates.len(),
            source.plan.updates.len(),
            source.plan.deletes.len(),
            source.plan.unchanged.len()
        ),
    }
}

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Keep flashcard decks in sync with published Google Sheets."
)]
struct Cli {
    /// Path of the JSON file listing the linked sheets.
    #[arg(long, env = "SHEETDECK_CONFIG", default_value = "sheetdeck.json", global = true)]
    config: PathBuf,

    /// AnkiConnect endpoint of the collection to write to.
    #[arg(long, env = "SHEETDECK_ANKI_URL", default_value = DEFAULT_ANKI_CONNECT_URL, global = true)]
    anki_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Link a published sheet to a deck, then sync everything.
    Add(AddArgs),
    /// Sync every linked sheet into its deck.
    Sync(SyncArgs),
    /// Unlink the sheet bound to a deck.
    Remove(RemoveArgs),
    /// Show the linked sheets.
    List,
}

#[derive(clap::Args)]
struct AddArgs {
    /// URL of the sheet published as CSV (must contain `output=csv`).
    #[arg(long)]
    url: String,

    /// Deck to sync into.
    #[arg(long)]
    deck: Option<String>,

    /// Note type whose fields the sheet columns must match.
    #[arg(long)]
    note_type: Option<String>,

    /// Field identifying a note across syncs. Defaults to the first field.
    #[arg(long)]
    key_field: Option<String>,

    /// Field whose value lists the note's tags.
    #[arg(long)]
    tags_field: Option<String>,

    /// Separator between tags in the tags field.
    #[arg(long)]
    tag_delimiter: Option<String>,
}

#[derive(clap::Args)]
struct SyncArgs {
    /// Print the planned changes without touching the collection.
    #[arg(long)]
    dry_run: bool,

    /// Stop at the first deck that fails instead of continuing.
    #[arg(long)]
    fail_fast: bool,
}

#[derive(clap::Args)]
struct RemoveArgs {
    /// Name of the deck to unlink.
    #[arg(long)]
    deck: String,
}
