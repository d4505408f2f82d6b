use csv::ReaderBuilder;

use crate::sheetdeck::tools::error::{Result, ToolError};
use crate::sheetdeck::tools::model::RemoteRow;

const BYTE_ORDER_MARK: char = '\u{feff}';

/// Decodes downloaded sheet bytes as UTF-8, dropping a leading byte order mark.
pub fn decode_sheet(bytes: Vec<u8>) -> Result<String> {
    let text = String::from_utf8(bytes)?;
    Ok(match text.strip_prefix(BYTE_ORDER_MARK) {
        Some(stripped) => stripped.to_string(),
        None => text,
    })
}

/// Parses comma separated text into rows of cells.
///
/// Quoted cells may contain commas, line breaks and doubled quotes. Rows keep
/// whatever length they have in the source; blank lines yield no row. A quote
/// that is never closed rejects the whole input.
pub fn parse_csv_data(text: &str) -> Result<Vec<RemoteRow>> {
    check_quotes_terminated(text)?;

    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(str::to_string).collect());
    }
    Ok(rows)
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum QuoteState {
    FieldStart,
    Unquoted,
    Quoted,
    QuoteInQuoted,
}

// Mirrors the reader's rules: a quote only opens a quoted cell at the start of
// a field, and `""` inside a quoted cell is a literal quote.
fn check_quotes_terminated(text: &str) -> Result<()> {
    let mut state = QuoteState::FieldStart;
    let mut line = 1;
    let mut opened_on = 1;

    for ch in text.chars() {
        state = match (state, ch) {
            (QuoteState::FieldStart, '"') => {
                opened_on = line;
                QuoteState::Quoted
            }
            (QuoteState::Quoted, '"') => QuoteState::QuoteInQuoted,
            (QuoteState::Quoted, _) => QuoteState::Quoted,
            (QuoteState::QuoteInQuoted, '"') => QuoteState::Quoted,
            (_, ',' | '\n' | '\r') => QuoteState::FieldStart,
            _ => QuoteState::Unquoted,
        };
        if ch == '\n' {
            line += 1;
        }
    }

    if state == QuoteState::Quoted {
        return Err(ToolError::UnterminatedQuote { line: opened_on });
    }
    Ok(())
}
