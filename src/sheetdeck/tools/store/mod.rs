//! Host collection bindings.
//!
//! The sync engine never owns deck storage. It reaches the collection through
//! [`NoteStore`], which the CLI binds to a running AnkiConnect endpoint and
//! the tests bind to [`MemoryStore`].

pub mod anki_connect;
pub mod memory;

pub use anki_connect::AnkiConnectStore;
pub use memory::MemoryStore;

use crate::sheetdeck::tools::error::Result;
use crate::sheetdeck::tools::model::{
    DeckId, LocalNote, LocalRecordIndex, NoteId, Record, RecordType,
};

/// Capability interface over a flashcard collection.
pub trait NoteStore {
    /// Every note stored in `deck_name`. An unknown deck holds no notes.
    fn notes_in_deck(&self, deck_name: &str) -> Result<Vec<LocalNote>>;

    /// Returns the id of `deck_name`, creating the deck when needed.
    fn ensure_deck_exists(&mut self, deck_name: &str) -> Result<DeckId>;

    /// Looks up a note type by name.
    fn record_type(&self, name: &str) -> Result<Option<RecordType>>;

    /// Adds a note of type `note_type` to the deck and returns its id.
    fn apply_create(&mut self, deck_id: DeckId, note_type: &str, record: &Record) -> Result<NoteId>;

    /// Replaces every field and the tag set of an existing note.
    fn apply_update(&mut self, id: NoteId, record: &Record) -> Result<()>;

    fn apply_delete(&mut self, ids: &[NoteId]) -> Result<()>;

    /// Fresh snapshot of the deck keyed by `key_field`.
    fn find_local_index(&self, deck_name: &str, key_field: &str) -> Result<LocalRecordIndex> {
        let notes = self.notes_in_deck(deck_name)?;
        Ok(LocalRecordIndex::build(notes, key_field))
    }
}
