use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::sheetdeck::tools::error::{Result, ToolError};

/// Identifier the host collection assigns to a stored note.
pub type NoteId = i64;

/// Identifier the host collection assigns to a deck.
pub type DeckId = i64;

/// One parsed CSV row: the cells in column order.
pub type RemoteRow = Vec<String>;

/// Field name → value mapping of a note.
pub type FieldValues = BTreeMap<String, String>;

/// Ordered, duplicate-free list of field names declared by a note type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct FieldSchema {
    fields: Vec<String>,
}

impl FieldSchema {
    /// Builds a schema from the given names, kept exactly as the note type
    /// declares them. The list must be non-empty and must not repeat a name
    /// once surrounding whitespace is ignored.
    pub fn new<I, S>(fields: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let fields: Vec<String> = fields
            .into_iter()
            .map(|name| name.as_ref().to_string())
            .collect();

        if fields.is_empty() {
            return Err(ToolError::InvalidSchema("no fields declared".into()));
        }

        let mut seen = HashSet::new();
        for name in &fields {
            if !seen.insert(name.trim()) {
                return Err(ToolError::InvalidSchema(format!(
                    "field '{name}' is declared more than once"
                )));
            }
        }

        Ok(Self { fields })
    }

    pub fn names(&self) -> &[String] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.iter().any(|field| field == name)
    }

    /// Fails with [`ToolError::UnknownKeyField`] unless `name` is a member.
    pub fn require(&self, name: &str) -> Result<()> {
        if self.contains(name) {
            Ok(())
        } else {
            Err(ToolError::UnknownKeyField {
                field: name.to_string(),
                fields: self.fields.clone(),
            })
        }
    }
}

impl TryFrom<Vec<String>> for FieldSchema {
    type Error = ToolError;

    fn try_from(fields: Vec<String>) -> Result<Self> {
        FieldSchema::new(fields)
    }
}

impl From<FieldSchema> for Vec<String> {
    fn from(schema: FieldSchema) -> Self {
        schema.fields
    }
}

/// Identity of a record under the configured key field.
///
/// Records whose key field is blank cannot be matched by value, so they are
/// numbered in order of appearance instead: remote records by row order,
/// local notes by ascending note id.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RecordKey {
    Field(String),
    Blank(usize),
}

impl RecordKey {
    pub fn is_blank(&self) -> bool {
        matches!(self, RecordKey::Blank(_))
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKey::Field(value) => write!(f, "{value:?}"),
            RecordKey::Blank(ordinal) => write!(f, "<blank #{ordinal}>"),
        }
    }
}

/// One flashcard as described by a sheet row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Field name → trimmed value. Contains every schema field.
    pub fields: FieldValues,
    /// Tags attached to the note.
    pub tags: BTreeSet<String>,
}

impl Record {
    pub fn new(fields: FieldValues, tags: BTreeSet<String>) -> Self {
        Self { fields, tags }
    }

    /// Value of the given field, or an empty string when absent.
    pub fn field(&self, name: &str) -> &str {
        self.fields.get(name).map(String::as_str).unwrap_or("")
    }
}

/// Why a row produced a diagnostic while building records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowIssue {
    /// Every cell was empty; the row was skipped.
    Blank,
    /// The row had fewer cells than the header; these fields were left empty.
    ShortRow { missing: Vec<String> },
}

/// Informational note about a single sheet row. Never aborts a sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowDiagnostic {
    /// Spreadsheet row number; the header is row 1.
    pub row: usize,
    pub issue: RowIssue,
}

impl RowDiagnostic {
    pub fn skipped(&self) -> bool {
        matches!(self.issue, RowIssue::Blank)
    }
}

/// All records read from one source during one sync pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteDeck {
    pub deck_name: String,
    pub records: Vec<Record>,
    pub diagnostics: Vec<RowDiagnostic>,
}

impl RemoteDeck {
    pub fn skipped_rows(&self) -> usize {
        self.diagnostics.iter().filter(|diag| diag.skipped()).count()
    }
}

/// A note as currently stored in the host collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalNote {
    pub id: NoteId,
    pub fields: FieldValues,
    pub tags: BTreeSet<String>,
}

/// A note type known to the host collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordType {
    pub id: i64,
    pub name: String,
    pub fields: Vec<String>,
}

/// Snapshot of the notes in one deck, keyed by their identity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocalRecordIndex {
    entries: BTreeMap<RecordKey, LocalNote>,
    duplicates: BTreeMap<RecordKey, Vec<NoteId>>,
}

impl LocalRecordIndex {
    /// Indexes `notes` by the value of `key_field`.
    ///
    /// Notes without the key field are ignored. When several notes share a
    /// non-blank key the one with the lowest id is indexed; the rest are
    /// remembered as duplicates of that key. They are left alone while the
    /// key is still in the sheet and deleted with it once it is gone.
    pub fn build(notes: impl IntoIterator<Item = LocalNote>, key_field: &str) -> Self {
        let mut notes: Vec<LocalNote> = notes.into_iter().collect();
        notes.sort_by_key(|note| note.id);

        let mut index = Self::default();
        let mut blank_ordinal = 0;

        for note in notes {
            let Some(value) = note.fields.get(key_field) else {
                continue;
            };
            let value = value.trim();
            let key = if value.is_empty() {
                let key = RecordKey::Blank(blank_ordinal);
                blank_ordinal += 1;
                key
            } else {
                RecordKey::Field(value.to_string())
            };

            if index.entries.contains_key(&key) {
                warn!(note_id = note.id, %key, "duplicate key in local deck");
                index.duplicates.entry(key).or_default().push(note.id);
                continue;
            }
            index.entries.insert(key, note);
        }

        index
    }

    pub fn get(&self, key: &RecordKey) -> Option<&LocalNote> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &RecordKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RecordKey, &LocalNote)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Ids of the notes that share `key` with the indexed note, ascending.
    pub fn duplicates_of(&self, key: &RecordKey) -> &[NoteId] {
        self.duplicates.get(key).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn duplicate_count(&self) -> usize {
        self.duplicates.values().map(Vec::len).sum()
    }
}
