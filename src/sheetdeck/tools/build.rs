use std::collections::BTreeSet;

use tracing::debug;

use crate::sheetdeck::tools::model::{
    FieldValues, Record, RemoteDeck, RemoteRow, RowDiagnostic, RowIssue,
};
use crate::sheetdeck::tools::schema::ColumnMap;

/// Separator used between tags when a source does not configure one.
pub const DEFAULT_TAG_DELIMITER: &str = "::";

/// Where a deck's tags come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagSource<'a> {
    /// Schema field whose value lists the tags.
    pub field: &'a str,
    pub delimiter: &'a str,
}

/// Maps the data rows that follow the header onto records.
///
/// Rows whose cells are all blank are skipped. Rows shorter than the header
/// are padded with empty values. Both cases are reported as diagnostics and
/// never stop the build.
pub fn build_remote_deck(
    deck_name: &str,
    data_rows: &[RemoteRow],
    columns: &ColumnMap,
    tags: Option<TagSource<'_>>,
) -> RemoteDeck {
    let mut records = Vec::with_capacity(data_rows.len());
    let mut diagnostics = Vec::new();

    // Row 1 is the header.
    for (row_number, row) in (2..).zip(data_rows) {
        if row.iter().all(|cell| cell.trim().is_empty()) {
            debug!(row = row_number, "row skipped because it is empty");
            diagnostics.push(RowDiagnostic {
                row: row_number,
                issue: RowIssue::Blank,
            });
            continue;
        }

        let mut fields = FieldValues::new();
        let mut missing = Vec::new();
        for (name, idx) in columns.iter() {
            let value = match row.get(idx) {
                Some(cell) => cell.trim().to_string(),
                None => {
                    missing.push(name.to_string());
                    String::new()
                }
            };
            fields.insert(name.to_string(), value);
        }

        if !missing.is_empty() {
            debug!(row = row_number, ?missing, "short row padded with empty fields");
            diagnostics.push(RowDiagnostic {
                row: row_number,
                issue: RowIssue::ShortRow { missing },
            });
        }

        let tags = match tags {
            Some(source) => split_tags(
                fields.get(source.field).map(String::as_str).unwrap_or(""),
                source.delimiter,
            ),
            None => BTreeSet::new(),
        };

        records.push(Record::new(fields, tags));
    }

    debug!(
        record_count = records.len(),
        diagnostic_count = diagnostics.len(),
        "built remote deck"
    );

    RemoteDeck {
        deck_name: deck_name.to_string(),
        records,
        diagnostics,
    }
}

/// Splits a tag cell on `delimiter`, trimming each tag and dropping empties.
///
/// Anki tags cannot hold whitespace, so any run of inner whitespace becomes a
/// single `_`, the form the collection stores them in.
pub fn split_tags(text: &str, delimiter: &str) -> BTreeSet<String> {
    if delimiter.is_empty() {
        return normalize_tag(text).into_iter().collect();
    }

    text.split(delimiter).filter_map(normalize_tag).collect()
}

fn normalize_tag(tag: &str) -> Option<String> {
    let parts: Vec<&str> = tag.split_whitespace().collect();
    (!parts.is_empty()).then(|| parts.join("_"))
}
