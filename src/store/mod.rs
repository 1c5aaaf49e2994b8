//! The session log store: a persistent table of work sessions behind a filter-driven
//! selection, shared between the interactive shell and the autosave task.

pub mod autosave;
pub mod entities;
pub mod filter;
pub mod session_log;
pub mod shared;
