use std::collections::{BTreeMap, BTreeSet};

use httpmock::prelude::*;
use serde_json::json;
use sheetdeck_tools::ToolError;
use sheetdeck_tools::config::SyncConfig;
use sheetdeck_tools::io::http_fetch::{Fetcher, HttpFetcher};
use sheetdeck_tools::model::Record;
use sheetdeck_tools::store::{AnkiConnectStore, MemoryStore, NoteStore};
use sheetdeck_tools::sync::{self, NewSource};

// ── Sheet downloads ─────────────────────────────────────────────────

#[test]
fn fetcher_returns_sheet_body() {
    let server = MockServer::start();
    let sheet = server.mock(|when, then| {
        when.method(GET)
            .path("/spreadsheets/d/e/vocab/pub")
            .query_param("output", "csv");
        then.status(200)
            .header("content-type", "text/csv")
            .body("Front,Back\nQ1,A1\n");
    });

    let fetcher = HttpFetcher::new().expect("client built");
    let bytes = fetcher
        .fetch(&server.url("/spreadsheets/d/e/vocab/pub?output=csv"))
        .expect("sheet downloaded");

    sheet.assert();
    assert_eq!(bytes, b"Front,Back\nQ1,A1\n");
}

#[test]
fn fetcher_reports_http_status() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/spreadsheets/d/e/gone/pub");
        then.status(404).body("Not Found");
    });

    let url = server.url("/spreadsheets/d/e/gone/pub?output=csv");
    let err = HttpFetcher::new()
        .expect("client built")
        .fetch(&url)
        .expect_err("404 rejected");

    match err {
        ToolError::Network {
            url: reported,
            status,
        } => {
            assert_eq!(status, 404);
            assert_eq!(reported, url);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn add_source_downloads_sheet_over_http() {
    let server = MockServer::start();
    let sheet = server.mock(|when, then| {
        when.method(GET).path("/pub");
        then.status(200).body("Back,Front\nA1,Q1\n");
    });

    let store = MemoryStore::new().with_note_type("Basic", &["Front", "Back"]);
    let mut config = SyncConfig::default();
    let url = server.url("/pub?output=csv");

    let added = sync::add_source(
        &mut config,
        &HttpFetcher::new().expect("client built"),
        &store,
        NewSource {
            url: url.clone(),
            deck_name: Some("Vocabulary".to_string()),
            ..NewSource::default()
        },
    )
    .expect("source added");

    sheet.assert();
    assert_eq!(added.url, url);
    assert!(config.remote_decks.contains_key(&url));
}

// ── AnkiConnect ─────────────────────────────────────────────────────

#[test]
fn create_deck_returns_deck_id() {
    let server = MockServer::start();
    let create = server.mock(|when, then| {
        when.method(POST).path("/");
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!({ "result": 1519323742721_i64, "error": null }));
    });

    let mut store = AnkiConnectStore::new(server.base_url()).expect("client built");
    let id = store
        .ensure_deck_exists("Vocabulary")
        .expect("deck created");

    create.assert();
    assert_eq!(id, 1519323742721);
}

#[test]
fn api_error_becomes_host_storage_error() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/");
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!({ "result": null, "error": "collection is not available" }));
    });

    let mut store = AnkiConnectStore::new(server.base_url()).expect("client built");
    let err = store.apply_delete(&[1, 2]).expect_err("delete rejected");

    match err {
        ToolError::HostStorage(message) => {
            assert!(message.starts_with("deleteNotes"));
            assert!(message.contains("collection is not available"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn unknown_note_type_is_none() {
    let server = MockServer::start();
    let models = server.mock(|when, then| {
        when.method(POST).path("/");
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!({
                "result": { "Basic": 1483883011648_i64, "Cloze": 1483883011649_i64 },
                "error": null
            }));
    });

    let store = AnkiConnectStore::new(server.base_url()).expect("client built");
    let found = store.record_type("Vocab (reversed)").expect("lookup ran");

    models.assert();
    assert!(found.is_none());
}

#[test]
fn empty_deck_needs_a_single_request() {
    let server = MockServer::start();
    let find = server.mock(|when, then| {
        when.method(POST).path("/");
        then.status(200)
            .header("content-type", "application/json")
            .json_body(json!({ "result": [], "error": null }));
    });

    let store = AnkiConnectStore::new(server.base_url()).expect("client built");
    let notes = store.notes_in_deck("Vocabulary").expect("notes listed");

    find.assert();
    assert!(notes.is_empty());
}

#[test]
fn unreachable_status_is_network_error() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/");
        then.status(503);
    });

    let store = AnkiConnectStore::new(server.base_url()).expect("client built");
    let err = store.record_type("Basic").expect_err("lookup failed");

    assert!(matches!(err, ToolError::Network { status: 503, .. }));
}

#[test]
fn create_without_resolved_deck_is_rejected() {
    let server = MockServer::start();
    let add = server.mock(|when, then| {
        when.method(POST).path("/");
        then.status(200).json_body(json!({ "result": 1, "error": null }));
    });

    let mut store = AnkiConnectStore::new(server.base_url()).expect("client built");
    let record = Record::new(BTreeMap::new(), BTreeSet::new());
    let err = store
        .apply_create(42, "Basic", &record)
        .expect_err("unknown deck rejected");

    add.assert_calls(0);
    assert!(matches!(err, ToolError::HostStorage(_)));
}
