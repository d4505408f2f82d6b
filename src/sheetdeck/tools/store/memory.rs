use std::collections::BTreeMap;

use crate::sheetdeck::tools::error::{Result, ToolError};
use crate::sheetdeck::tools::model::{DeckId, LocalNote, NoteId, Record, RecordType};
use crate::sheetdeck::tools::store::NoteStore;

#[derive(Debug, Clone, PartialEq, Eq)]
struct StoredNote {
    deck_id: DeckId,
    note_type: String,
    note: LocalNote,
}

/// Collection kept entirely in memory. Ids are handed out in increasing order,
/// starting above any id inserted directly.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    decks: BTreeMap<String, DeckId>,
    note_types: BTreeMap<String, RecordType>,
    notes: BTreeMap<NoteId, StoredNote>,
    next_id: i64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a note type with the given fields.
    pub fn with_note_type<S: AsRef<str>>(mut self, name: &str, fields: &[S]) -> Self {
        let id = self.allocate_id();
        self.note_types.insert(
            name.to_string(),
            RecordType {
                id,
                name: name.to_string(),
                fields: fields.iter().map(|field| field.as_ref().to_string()).collect(),
            },
        );
        self
    }

    /// Stores a note directly, bypassing the sync engine.
    pub fn insert_note(&mut self, deck_name: &str, note_type: &str, note: LocalNote) -> Result<()> {
        let deck_id = self.ensure_deck_exists(deck_name)?;
        self.next_id = self.next_id.max(note.id);
        self.notes.insert(
            note.id,
            StoredNote {
                deck_id,
                note_type: note_type.to_string(),
                note,
            },
        );
        Ok(())
    }

    pub fn note(&self, id: NoteId) -> Option<&LocalNote> {
        self.notes.get(&id).map(|stored| &stored.note)
    }

    pub fn note_type_of(&self, id: NoteId) -> Option<&str> {
        self.notes.get(&id).map(|stored| stored.note_type.as_str())
    }

    pub fn deck_id(&self, deck_name: &str) -> Option<DeckId> {
        self.decks.get(deck_name).copied()
    }

    pub fn note_count(&self) -> usize {
        self.notes.len()
    }

    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

impl NoteStore for MemoryStore {
    fn notes_in_deck(&self, deck_name: &str) -> Result<Vec<LocalNote>> {
        let Some(deck_id) = self.deck_id(deck_name) else {
            return Ok(Vec::new());
        };
        Ok(self
            .notes
            .values()
            .filter(|stored| stored.deck_id == deck_id)
            .map(|stored| stored.note.clone())
            .collect())
    }

    fn ensure_deck_exists(&mut self, deck_name: &str) -> Result<DeckId> {
        if let Some(id) = self.deck_id(deck_name) {
            return Ok(id);
        }
        let id = self.allocate_id();
        self.decks.insert(deck_name.to_string(), id);
        Ok(id)
    }

    fn record_type(&self, name: &str) -> Result<Option<RecordType>> {
        Ok(self.note_types.get(name).cloned())
    }

    fn apply_create(&mut self, deck_id: DeckId, note_type: &str, record: &Record) -> Result<NoteId> {
        if !self.decks.values().any(|id| *id == deck_id) {
            return Err(ToolError::HostStorage(format!("deck {deck_id} does not exist")));
        }
        let id = self.allocate_id();
        self.notes.insert(
            id,
            StoredNote {
                deck_id,
                note_type: note_type.to_string(),
                note: LocalNote {
                    id,
                    fields: record.fields.clone(),
                    tags: record.tags.clone(),
                },
            },
        );
        Ok(id)
    }

    fn apply_update(&mut self, id: NoteId, record: &Record) -> Result<()> {
        let stored = self
            .notes
            .get_mut(&id)
            .ok_or_else(|| ToolError::HostStorage(format!("note {id} does not exist")))?;
        stored.note.fields = record.fields.clone();
        stored.note.tags = record.tags.clone();
        Ok(())
    }

    fn apply_delete(&mut self, ids: &[NoteId]) -> Result<()> {
        for id in ids {
            self.notes.remove(id);
        }
        Ok(())
    }
}
