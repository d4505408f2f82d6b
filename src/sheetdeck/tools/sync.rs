use tracing::{debug, info, instrument, warn};
use url::Url;

use crate::sheetdeck::tools::build::{DEFAULT_TAG_DELIMITER, build_remote_deck};
use crate::sheetdeck::tools::config::{SourceConfig, SyncConfig};
use crate::sheetdeck::tools::error::{Result, ToolError};
use crate::sheetdeck::tools::io::csv_read::{decode_sheet, parse_csv_data};
use crate::sheetdeck::tools::io::http_fetch::Fetcher;
use crate::sheetdeck::tools::model::{DeckId, RemoteDeck};
use crate::sheetdeck::tools::reconcile::{ReconciliationPlan, reconcile};
use crate::sheetdeck::tools::schema::validate_headers;
use crate::sheetdeck::tools::store::NoteStore;

/// Deck used when a new source is added without a name.
pub const DEFAULT_DECK_NAME: &str = "Deck from CSV";
/// Note type used when a new source is added without one.
pub const DEFAULT_NOTE_TYPE: &str = "Basic";
/// Query fragment present in every published-to-CSV sheet link.
pub const CSV_EXPORT_MARKER: &str = "output=csv";

/// What to do with the remaining sources once one fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Record the failure and carry on with the next source.
    #[default]
    Continue,
    /// Stop at the first failing source.
    Abort,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOptions {
    /// Plan only; leave the collection untouched.
    pub dry_run: bool,
    pub policy: FailurePolicy,
}

/// Counts of the operations actually applied to a deck.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyStats {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub unchanged: usize,
    /// Creates dropped because the note type is missing.
    pub skipped_creates: usize,
}

/// Result of syncing one source.
#[derive(Debug, Clone)]
pub struct SourceReport {
    pub deck_name: String,
    pub url: String,
    pub record_count: usize,
    pub skipped_rows: usize,
    pub plan: ReconciliationPlan,
    /// `None` for dry runs.
    pub applied: Option<ApplyStats>,
}

#[derive(Debug)]
pub enum SourceOutcome {
    Synced(SourceReport),
    Failed {
        deck_name: String,
        url: String,
        error: ToolError,
    },
}

/// Per-source outcomes of a full sync, in config order.
#[derive(Debug, Default)]
pub struct SyncReport {
    pub outcomes: Vec<SourceOutcome>,
}

impl SyncReport {
    pub fn synced(&self) -> impl Iterator<Item = &SourceReport> {
        self.outcomes.iter().filter_map(|outcome| match outcome {
            SourceOutcome::Synced(report) => Some(report),
            SourceOutcome::Failed { .. } => None,
        })
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &ToolError)> {
        self.outcomes.iter().filter_map(|outcome| match outcome {
            SourceOutcome::Failed {
                deck_name, error, ..
            } => Some((deck_name.as_str(), error)),
            SourceOutcome::Synced(_) => None,
        })
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }
}

/// Settings for a source that is about to be added. Blank values fall back
/// to [`DEFAULT_DECK_NAME`], [`DEFAULT_NOTE_TYPE`] and the first field of the
/// note type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewSource {
    pub url: String,
    pub deck_name: Option<String>,
    pub note_type: Option<String>,
    pub key_field: Option<String>,
    pub tags_field: Option<String>,
    pub tag_delimiter: Option<String>,
}

/// Downloads a source and turns it into records.
#[instrument(
    level = "info",
    skip_all,
    fields(deck = %source.deck_name, url = %source.url)
)]
pub fn load_remote_deck(fetcher: &impl Fetcher, source: &SourceConfig) -> Result<RemoteDeck> {
    let schema = source.schema()?;
    let bytes = fetcher.fetch(&source.url)?;
    let text = decode_sheet(bytes)?;
    let rows = parse_csv_data(&text)?;
    debug!(row_count = rows.len(), "parsed sheet");

    let (headers, data_rows) = match rows.split_first() {
        Some((headers, data_rows)) => (Some(headers.as_slice()), data_rows),
        None => (None, &[][..]),
    };
    let columns = validate_headers(headers, &schema)?;
    let deck = build_remote_deck(&source.deck_name, data_rows, &columns, source.tag_source());
    info!(
        record_count = deck.records.len(),
        skipped_rows = deck.skipped_rows(),
        "built records from sheet"
    );
    Ok(deck)
}

/// Runs one full pass for a single source: fetch, plan, then apply.
#[instrument(
    level = "info",
    skip_all,
    fields(deck = %source.deck_name, dry_run = dry_run)
)]
pub fn sync_source(
    fetcher: &impl Fetcher,
    store: &mut impl NoteStore,
    source: &SourceConfig,
    dry_run: bool,
) -> Result<SourceReport> {
    let deck = load_remote_deck(fetcher, source)?;

    let deck_id = if dry_run {
        None
    } else {
        Some(store.ensure_deck_exists(&deck.deck_name)?)
    };

    let local = store.find_local_index(&deck.deck_name, &source.notecard_key_field)?;
    let plan = reconcile(
        &deck.deck_name,
        &deck.records,
        &local,
        &source.notecard_key_field,
    );
    info!(
        creates = plan.creates.len(),
        updates = plan.updates.len(),
        deletes = plan.deletes.len(),
        unchanged = plan.unchanged.len(),
        "planned deck changes"
    );

    let applied = match deck_id {
        Some(deck_id) => Some(apply_plan(store, deck_id, &source.note_type, &plan)?),
        None => None,
    };

    Ok(SourceReport {
        deck_name: deck.deck_name.clone(),
        url: source.url.clone(),
        record_count: deck.records.len(),
        skipped_rows: deck.skipped_rows(),
        plan,
        applied,
    })
}

/// Applies a plan to the collection: updates, then creates, then deletes.
///
/// Not transactional. A collection error stops the remaining operations and
/// leaves the ones already applied in place.
#[instrument(level = "debug", skip(store, plan))]
pub fn apply_plan(
    store: &mut impl NoteStore,
    deck_id: DeckId,
    note_type: &str,
    plan: &ReconciliationPlan,
) -> Result<ApplyStats> {
    let mut stats = ApplyStats {
        unchanged: plan.unchanged.len(),
        ..ApplyStats::default()
    };

    for update in &plan.updates {
        store.apply_update(update.id, &update.record)?;
        stats.updated += 1;
    }

    if !plan.creates.is_empty() {
        if store.record_type(note_type)?.is_some() {
            for create in &plan.creates {
                store.apply_create(deck_id, note_type, &create.record)?;
                stats.created += 1;
            }
        } else {
            for create in &plan.creates {
                warn!(key = %create.key, note_type, "note type does not exist, skipping new note");
            }
            stats.skipped_creates = plan.creates.len();
        }
    }

    let delete_ids = plan.delete_ids();
    if !delete_ids.is_empty() {
        store.apply_delete(&delete_ids)?;
        stats.deleted = delete_ids.len();
    }

    Ok(stats)
}

/// Syncs every configured source in turn.
///
/// With [`FailurePolicy::Continue`] a failing source is recorded in the report
/// and the next one is attempted. With [`FailurePolicy::Abort`] the first
/// failure is returned as [`ToolError::SourceFailed`], carrying the reports of
/// the sources already synced.
#[instrument(
    level = "info",
    skip_all,
    fields(source_count = config.remote_decks.len(), ?options)
)]
pub fn sync_all(
    fetcher: &impl Fetcher,
    store: &mut impl NoteStore,
    config: &SyncConfig,
    options: SyncOptions,
) -> Result<SyncReport> {
    let mut report = SyncReport::default();

    for source in config.sources() {
        match sync_source(fetcher, store, source, options.dry_run) {
            Ok(source_report) => report.outcomes.push(SourceOutcome::Synced(source_report)),
            Err(error) => {
                warn!(deck = %source.deck_name, %error, "the following deck failed to sync");
                if options.policy == FailurePolicy::Abort {
                    return Err(ToolError::SourceFailed {
                        deck: source.deck_name.clone(),
                        source: Box::new(error),
                        synced: report.synced().cloned().collect(),
                    });
                }
                report.outcomes.push(SourceOutcome::Failed {
                    deck_name: source.deck_name.clone(),
                    url: source.url.clone(),
                    error,
                });
            }
        }
    }

    Ok(report)
}

/// Validates a new source against the collection and the sheet itself, then
/// adds it to `config`.
#[instrument(level = "info", skip_all, fields(url = %request.url))]
pub fn add_source(
    config: &mut SyncConfig,
    fetcher: &impl Fetcher,
    store: &impl NoteStore,
    request: NewSource,
) -> Result<SourceConfig> {
    let url = validate_source_url(&request.url)?;
    if config.remote_decks.contains_key(&url) {
        return Err(ToolError::DuplicateSource(url));
    }

    let deck_name = non_blank(request.deck_name).unwrap_or_else(|| DEFAULT_DECK_NAME.to_string());
    let note_type = non_blank(request.note_type).unwrap_or_else(|| DEFAULT_NOTE_TYPE.to_string());
    let record_type = store
        .record_type(&note_type)?
        .ok_or_else(|| ToolError::RecordTypeMissing(note_type.clone()))?;

    let key_field = match non_blank(request.key_field) {
        Some(field) => field,
        None => record_type.fields.first().cloned().ok_or_else(|| {
            ToolError::InvalidSchema(format!("note type '{note_type}' has no fields"))
        })?,
    };

    let source = SourceConfig {
        url: url.clone(),
        deck_name,
        note_type,
        note_type_fields: record_type.fields,
        notecard_key_field: key_field,
        tags_field: non_blank(request.tags_field),
        tag_delimiter: request
            .tag_delimiter
            .unwrap_or_else(|| DEFAULT_TAG_DELIMITER.to_string()),
    };

    let deck = load_remote_deck(fetcher, &source)?;
    info!(
        deck = %source.deck_name,
        record_count = deck.records.len(),
        "remote deck added"
    );

    config.remote_decks.insert(url, source.clone());
    Ok(source)
}

/// Unlinks the first source that targets `deck_name`. Notes already in the
/// deck are kept.
pub fn remove_source(config: &mut SyncConfig, deck_name: &str) -> Result<SourceConfig> {
    let url = config
        .remote_decks
        .iter()
        .find(|(_, source)| source.deck_name == deck_name)
        .map(|(url, _)| url.clone())
        .ok_or_else(|| ToolError::UnknownDeck(deck_name.to_string()))?;

    config
        .remote_decks
        .remove(&url)
        .ok_or_else(|| ToolError::UnknownDeck(deck_name.to_string()))
}

fn validate_source_url(raw: &str) -> Result<String> {
    let url = raw.trim();
    let invalid = |reason: &str| ToolError::InvalidUrl {
        url: url.to_string(),
        reason: reason.to_string(),
    };

    if url.is_empty() {
        return Err(invalid("the URL is empty"));
    }
    let parsed = Url::parse(url).map_err(|err| invalid(&err.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(invalid("only http and https links are supported"));
    }
    if !url.contains(CSV_EXPORT_MARKER) {
        return Err(invalid(
            "the URL does not appear to be a published CSV from Google Sheets",
        ));
    }
    Ok(url.to_string())
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
