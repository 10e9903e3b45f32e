//! Rich terminal display utilities for the CLI.
//!
//! Provides styled tables, progress spinners and themed messages.

pub mod progress;
pub mod tables;
pub mod theme;

pub use progress::{create_progress_bar, create_spinner};
pub use tables::{
    create_documents_table, create_edges_table, create_recompute_table, create_topics_table,
};
pub use theme::{THEME, Theme};
