//! Remendador: maintenance CLI for Remendar reference namespaces
//!
//! Namespace files are normally written only by the healing engine. This
//! CLI lets people review them in CI (`check`), read them (`show`) and
//! apply a fix by hand (`promote`) with the same rotation a heal uses.

#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

mod commands;
mod config;
mod error;
pub mod handlers;

pub use commands::{CheckArgs, Cli, Commands, PromoteArgs, ShowArgs, ShowFormat};
pub use config::{CliConfig, Verbosity};
pub use error::{CliError, CliResult};
