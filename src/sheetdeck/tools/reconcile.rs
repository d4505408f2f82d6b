//! Pure planning step of a sync pass.
//!
//! Given the records read from a sheet and a snapshot of the notes already in
//! the target deck, [`reconcile`] decides which notes to create, rewrite and
//! remove. Nothing here touches the host collection, so the planner can be
//! exercised without one.
//!
//! # Algorithm
//!
//! 1. Key every remote record by its key-field value. A later record with an
//!    already seen key replaces the earlier one but keeps its position, so
//!    the last row in the sheet wins while output order stays stable. Blank
//!    keys are numbered and never collapse.
//! 2. For every remote key: update the local note that holds it (unless it is
//!    already identical), or create a new note.
//! 3. Every local key the sheet no longer mentions is deleted, together with
//!    any other local notes that carry the same key.

use std::collections::{HashMap, HashSet};

use crate::sheetdeck::tools::model::{LocalNote, LocalRecordIndex, NoteId, Record, RecordKey};

/// A note to add to the deck.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedCreate {
    pub key: RecordKey,
    pub deck_name: String,
    pub record: Record,
}

/// A full rewrite of an existing note's fields and tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedUpdate {
    pub key: RecordKey,
    pub id: NoteId,
    pub record: Record,
}

/// A note whose key no longer appears in the sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedDelete {
    pub key: RecordKey,
    pub id: NoteId,
}

/// Operations that bring a deck in line with its sheet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconciliationPlan {
    pub creates: Vec<PlannedCreate>,
    pub updates: Vec<PlannedUpdate>,
    pub deletes: Vec<PlannedDelete>,
    /// Matched notes that already equal their remote record.
    pub unchanged: Vec<NoteId>,
}

impl ReconciliationPlan {
    /// True when applying the plan would not change the deck.
    pub fn is_empty(&self) -> bool {
        self.creates.is_empty() && self.updates.is_empty() && self.deletes.is_empty()
    }

    pub fn delete_ids(&self) -> Vec<NoteId> {
        self.deletes.iter().map(|delete| delete.id).collect()
    }
}

/// Plans the operations that make the deck mirror `records`.
pub fn reconcile(
    deck_name: &str,
    records: &[Record],
    local: &LocalRecordIndex,
    key_field: &str,
) -> ReconciliationPlan {
    let remote = key_records(records, key_field);
    let mut plan = ReconciliationPlan::default();

    for (key, record) in &remote {
        match local.get(key) {
            Some(note) if matches_note(record, note) => plan.unchanged.push(note.id),
            Some(note) => plan.updates.push(PlannedUpdate {
                key: key.clone(),
                id: note.id,
                record: (*record).clone(),
            }),
            None => plan.creates.push(PlannedCreate {
                key: key.clone(),
                deck_name: deck_name.to_string(),
                record: (*record).clone(),
            }),
        }
    }

    let remote_keys: HashSet<&RecordKey> = remote.iter().map(|(key, _)| key).collect();
    plan.deletes = local
        .iter()
        .filter(|(key, _)| !remote_keys.contains(key))
        .flat_map(|(key, note)| {
            std::iter::once(note.id)
                .chain(local.duplicates_of(key).iter().copied())
                .map(move |id| PlannedDelete {
                    key: key.clone(),
                    id,
                })
        })
        .collect();
    plan.deletes.sort_by_key(|delete| delete.id);

    plan
}

/// Keys `records` in first-appearance order, letting later duplicates win.
fn key_records<'a>(records: &'a [Record], key_field: &str) -> Vec<(RecordKey, &'a Record)> {
    let mut keyed: Vec<(RecordKey, &Record)> = Vec::with_capacity(records.len());
    let mut positions: HashMap<RecordKey, usize> = HashMap::new();
    let mut blank_ordinal = 0;

    for record in records {
        let value = record.field(key_field).trim();
        if value.is_empty() {
            keyed.push((RecordKey::Blank(blank_ordinal), record));
            blank_ordinal += 1;
            continue;
        }

        let key = RecordKey::Field(value.to_string());
        match positions.get(&key) {
            Some(&position) => keyed[position].1 = record,
            None => {
                positions.insert(key.clone(), keyed.len());
                keyed.push((key, record));
            }
        }
    }

    keyed
}

fn matches_note(record: &Record, note: &LocalNote) -> bool {
    record.tags == note.tags
        && record.fields.iter().all(|(name, value)| {
            note.fields.get(name).map(String::as_str).unwrap_or("") == value.as_str()
        })
}
