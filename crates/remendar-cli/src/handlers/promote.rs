//! Promote command handler
//!
//! Runs the same locked read-rotate-write a successful heal performs, so
//! a hand-fixed reference keeps the old one as its first fallback.

use remendar::ReferenceEntry;

use crate::commands::PromoteArgs;
use crate::config::CliConfig;
use crate::error::{CliError, CliResult};

/// Promote `args.reference` and return the stored entry
pub fn promote(config: &CliConfig, args: &PromoteArgs) -> CliResult<ReferenceEntry> {
    let mut healer = config.healer.clone();
    if let Some(cap) = args.fallback_cap {
        healer = healer.with_fallback_cap(cap);
    }
    healer.validate()?;
    let store = healer.open_store(&args.file)?;

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .map_err(|e| CliError::config(format!("Failed to create runtime: {e}")))?;
    let entry = rt.block_on(store.record_heal(&args.key, &args.reference))?;
    tracing::info!(key = %entry.key, primary = %entry.primary, "reference promoted");
    Ok(entry)
}

/// Execute the promote command
pub fn execute_promote(config: &CliConfig, args: &PromoteArgs) -> CliResult<()> {
    let entry = promote(config, args)?;
    if !config.verbosity.is_quiet() {
        println!("{}: {}", entry.key, entry.primary);
        if !entry.fallbacks.is_empty() {
            println!("  fallbacks: {}", entry.fallbacks.join(", "));
        }
    }
    Ok(())
}
