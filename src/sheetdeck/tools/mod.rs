pub mod build;
pub mod config;
pub mod error;
pub mod io;
pub mod model;
pub mod reconcile;
pub mod schema;
pub mod store;
pub mod sync;

pub use error::{Result, ToolError};
