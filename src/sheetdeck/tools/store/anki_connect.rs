use std::collections::HashMap;
use std::time::Duration;

use reqwest::blocking::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, instrument};

use crate::sheetdeck::tools::error::{Result, ToolError};
use crate::sheetdeck::tools::model::{DeckId, LocalNote, NoteId, Record, RecordType};
use crate::sheetdeck::tools::store::NoteStore;

/// Address AnkiConnect listens on by default.
pub const DEFAULT_ANKI_CONNECT_URL: &str = "http://localhost:8765";

const API_VERSION: u8 = 6;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    result: Option<T>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NoteInfo {
    note_id: NoteId,
    #[serde(default)]
    tags: Vec<String>,
    fields: HashMap<String, FieldInfo>,
}

#[derive(Debug, Deserialize)]
struct FieldInfo {
    value: String,
}

impl From<NoteInfo> for LocalNote {
    fn from(info: NoteInfo) -> Self {
        LocalNote {
            id: info.note_id,
            fields: info
                .fields
                .into_iter()
                .map(|(name, field)| (name, field.value))
                .collect(),
            tags: info.tags.into_iter().collect(),
        }
    }
}

/// Collection reached through the AnkiConnect add-on's JSON API.
#[derive(Debug, Clone)]
pub struct AnkiConnectStore {
    client: Client,
    endpoint: String,
    deck_names: HashMap<DeckId, String>,
}

impl AnkiConnectStore {
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            deck_names: HashMap::new(),
        })
    }

    #[instrument(level = "debug", skip(self, params))]
    fn invoke<T: DeserializeOwned>(&self, action: &str, params: Option<Value>) -> Result<Option<T>> {
        let mut body = json!({ "action": action, "version": API_VERSION });
        if let Some(params) = params {
            body["params"] = params;
        }

        let response = self.client.post(&self.endpoint).json(&body).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(ToolError::Network {
                url: self.endpoint.clone(),
                status: status.as_u16(),
            });
        }

        let response: ApiResponse<T> = response.json()?;
        match response.error {
            Some(error) => Err(ToolError::HostStorage(format!("{action}: {error}"))),
            None => Ok(response.result),
        }
    }

    fn invoke_required<T: DeserializeOwned>(&self, action: &str, params: Option<Value>) -> Result<T> {
        self.invoke(action, params)?
            .ok_or_else(|| ToolError::HostStorage(format!("{action}: empty result")))
    }
}

impl NoteStore for AnkiConnectStore {
    fn notes_in_deck(&self, deck_name: &str) -> Result<Vec<LocalNote>> {
        let query = deck_query(deck_name);
        let ids: Vec<NoteId> = self
            .invoke("findNotes", Some(json!({ "query": query })))?
            .unwrap_or_default();
        debug!(note_count = ids.len(), %query, "found notes");
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let infos: Vec<NoteInfo> = self
            .invoke("notesInfo", Some(json!({ "notes": ids })))?
            .unwrap_or_default();
        Ok(infos.into_iter().map(LocalNote::from).collect())
    }

    fn ensure_deck_exists(&mut self, deck_name: &str) -> Result<DeckId> {
        let id: DeckId = self.invoke_required("createDeck", Some(json!({ "deck": deck_name })))?;
        self.deck_names.insert(id, deck_name.to_string());
        Ok(id)
    }

    fn record_type(&self, name: &str) -> Result<Option<RecordType>> {
        let models: HashMap<String, i64> = self
            .invoke("modelNamesAndIds", None)?
            .unwrap_or_default();
        let Some(&id) = models.get(name) else {
            return Ok(None);
        };
        let fields: Vec<String> = self
            .invoke("modelFieldNames", Some(json!({ "modelName": name })))?
            .unwrap_or_default();
        Ok(Some(RecordType {
            id,
            name: name.to_string(),
            fields,
        }))
    }

    fn apply_create(&mut self, deck_id: DeckId, note_type: &str, record: &Record) -> Result<NoteId> {
        let deck_name = self
            .deck_names
            .get(&deck_id)
            .ok_or_else(|| ToolError::HostStorage(format!("deck {deck_id} was not resolved")))?;
        let note = json!({
            "deckName": deck_name,
            "modelName": note_type,
            "fields": record.fields,
            "tags": record.tags,
            "options": { "allowDuplicate": true },
        });
        self.invoke_required("addNote", Some(json!({ "note": note })))
    }

    fn apply_update(&mut self, id: NoteId, record: &Record) -> Result<()> {
        let note = json!({
            "id": id,
            "fields": record.fields,
            "tags": record.tags,
        });
        self.invoke::<Value>("updateNote", Some(json!({ "note": note })))?;
        Ok(())
    }

    fn apply_delete(&mut self, ids: &[NoteId]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        self.invoke::<Value>("deleteNotes", Some(json!({ "notes": ids })))?;
        Ok(())
    }
}

/// Search query matching the notes of exactly one deck, excluding subdecks.
fn deck_query(deck_name: &str) -> String {
    let escaped = escape_search_term(deck_name);
    format!("deck:\"{escaped}\" -deck:\"{escaped}::*\"")
}

fn escape_search_term(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for ch in term.chars() {
        if matches!(ch, '\\' | '"' | '*' | '_') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}
