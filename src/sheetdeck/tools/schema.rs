use std::collections::{BTreeSet, HashMap};

use tracing::debug;

use crate::sheetdeck::tools::error::{Result, ToolError};
use crate::sheetdeck::tools::model::FieldSchema;

/// Column position of every schema field, in schema order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMap {
    columns: Vec<(String, usize)>,
}

impl ColumnMap {
    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.columns.iter().map(|(name, idx)| (name.as_str(), *idx))
    }

    pub fn index_of(&self, field: &str) -> Option<usize> {
        self.columns
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, idx)| *idx)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Checks that the header row names exactly the schema fields.
///
/// Both sides are trimmed and compared as sets, so column order is free but
/// spelling and case are not. A header that repeats a name never matches.
/// A missing header row is treated as an empty one.
pub fn validate_headers(headers: Option<&[String]>, schema: &FieldSchema) -> Result<ColumnMap> {
    let headers = headers.unwrap_or_default();
    let trimmed: Vec<&str> = headers.iter().map(|header| header.trim()).collect();

    let header_set: BTreeSet<&str> = trimmed.iter().copied().collect();
    let expected_set: BTreeSet<&str> = schema.names().iter().map(|name| name.trim()).collect();

    let mismatch = || ToolError::SchemaMismatch {
        headers: headers.to_vec(),
        expected: schema.names().to_vec(),
    };

    if header_set != expected_set || header_set.len() != trimmed.len() {
        return Err(mismatch());
    }

    let positions: HashMap<&str, usize> = trimmed
        .iter()
        .enumerate()
        .map(|(idx, header)| (*header, idx))
        .collect();

    let mut columns = Vec::with_capacity(schema.len());
    for name in schema.names() {
        let idx = *positions.get(name.trim()).ok_or_else(mismatch)?;
        debug!(field = %name, column = idx, "mapped header");
        columns.push((name.clone(), idx));
    }

    Ok(ColumnMap { columns })
}
