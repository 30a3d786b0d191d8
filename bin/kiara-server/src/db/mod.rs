//! Database layer.
//!
//! The chat log contract lives in `kiara_core::ChatLogStore`; this module
//! provides the SQLite implementation the server runs with.

pub mod sqlite;
