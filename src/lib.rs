//! Terminal time tracker. Work sessions are recorded into a local SQLite file, browsed
//! and edited through an interactive shell, and kept fresh by a background autosave
//! task while a session is running.
//!

pub mod cli;
pub mod store;
pub mod tui;
pub mod utils;
