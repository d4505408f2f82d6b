use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::sheetdeck::tools::build::{DEFAULT_TAG_DELIMITER, TagSource};
use crate::sheetdeck::tools::error::Result;
use crate::sheetdeck::tools::model::FieldSchema;

/// Persisted list of remote sources, keyed by URL.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(rename = "remote-decks", default)]
    pub remote_decks: BTreeMap<String, SourceConfig>,
}

/// One published sheet bound to a deck.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub url: String,
    pub deck_name: String,
    pub note_type: String,
    pub note_type_fields: Vec<String>,
    pub notecard_key_field: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags_field: Option<String>,
    #[serde(default = "default_tag_delimiter")]
    pub tag_delimiter: String,
}

fn default_tag_delimiter() -> String {
    DEFAULT_TAG_DELIMITER.to_string()
}

impl SourceConfig {
    /// The expected header fields, validated.
    pub fn schema(&self) -> Result<FieldSchema> {
        let schema = FieldSchema::new(&self.note_type_fields)?;
        schema.require(&self.notecard_key_field)?;
        if let Some(field) = &self.tags_field {
            schema.require(field)?;
        }
        Ok(schema)
    }

    pub fn tag_source(&self) -> Option<TagSource<'_>> {
        self.tags_field.as_deref().map(|field| TagSource {
            field,
            delimiter: &self.tag_delimiter,
        })
    }
}

impl SyncConfig {
    /// Reads the config file, treating a missing file as an empty config.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "no config file yet, starting empty");
            return Ok(Self::default());
        }
        let data = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn sources(&self) -> impl Iterator<Item = &SourceConfig> {
        self.remote_decks.values()
    }

    pub fn is_empty(&self) -> bool {
        self.remote_decks.is_empty()
    }
}
