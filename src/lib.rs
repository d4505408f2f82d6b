//! Core library for the sheetdeck command line application.
//!
//! The library keeps a published spreadsheet and a flashcard deck in step.
//! Responsibilities are split into narrow, composable modules: IO adapters
//! (CSV reading, HTTP fetching) live under [`sheetdeck::tools::io`], data
//! representations inside [`sheetdeck::tools::model`], header validation in
//! [`sheetdeck::tools::schema`], row mapping in [`sheetdeck::tools::build`],
//! the pure diffing logic in [`sheetdeck::tools::reconcile`], host bindings
//! under [`sheetdeck::tools::store`], and the synchronization orchestration
//! under [`sheetdeck::tools::sync`].

pub mod sheetdeck;

pub use sheetdeck::tools::{
    Result, ToolError, build, config, error, io, model, reconcile, schema, store, sync,
};
