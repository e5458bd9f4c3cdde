//! Core library for the Nukefire EQ database.
//!
//! Parses the text of the in-game `identify` command into [`ParsedItem`]
//! records and keeps them in an SQLite item table.

pub mod config;
pub mod database;
pub mod error;
pub mod export;
pub mod file_utils;
pub mod models;
pub mod parsers;

pub use config::{AppConfig, ParseOptions};
pub use error::{EqError, Result};
pub use models::{ItemRecord, NewItem, ParsedItem, SearchQuery};
pub use parsers::{parse_item_data, parse_item_data_with};
