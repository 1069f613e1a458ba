//! Command handlers - extracted from main.rs for testability

pub mod check;
pub mod promote;
pub mod show;

pub use check::{check_file, execute_check, FileReport};
pub use promote::{execute_promote, promote};
pub use show::{execute_show, render_json, render_text, select_entries};
