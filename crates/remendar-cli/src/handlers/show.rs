//! Show command handler

use remendar::{ReferenceEntry, RemendarError};
use serde_json::{json, Map, Value};
use std::fmt::Write as _;

use crate::commands::{ShowArgs, ShowFormat};
use crate::config::CliConfig;
use crate::error::CliResult;

/// Select the entries to print: one key, or the whole namespace
pub fn select_entries(config: &CliConfig, args: &ShowArgs) -> CliResult<Vec<ReferenceEntry>> {
    let store = config.healer.open_store(&args.file)?;
    match &args.key {
        Some(key) => store
            .lookup(key)
            .map(|entry| vec![entry])
            .ok_or_else(|| RemendarError::UnknownElement { key: key.clone() }.into()),
        None => Ok(store
            .keys()
            .iter()
            .filter_map(|k| store.lookup(k))
            .collect()),
    }
}

/// Indented text listing
#[must_use]
pub fn render_text(entries: &[ReferenceEntry]) -> String {
    if entries.is_empty() {
        return "(no entries)\n".to_string();
    }
    let mut out = String::new();
    for entry in entries {
        let _ = writeln!(out, "{}", entry.key);
        let _ = writeln!(out, "  primary:  {}", entry.primary);
        for (i, fallback) in entry.fallbacks.iter().enumerate() {
            let _ = writeln!(out, "  fallback {}: {fallback}", i + 1);
        }
    }
    out
}

/// Same shape as the namespace file
#[must_use]
pub fn render_json(entries: &[ReferenceEntry]) -> Value {
    let map: Map<String, Value> = entries
        .iter()
        .map(|e| {
            (
                e.key.clone(),
                json!({ "primary": e.primary, "fallbacks": e.fallbacks }),
            )
        })
        .collect();
    Value::Object(map)
}

/// Execute the show command
pub fn execute_show(config: &CliConfig, args: &ShowArgs) -> CliResult<()> {
    let entries = select_entries(config, args)?;
    match args.format {
        ShowFormat::Text => print!("{}", render_text(&entries)),
        ShowFormat::Json => println!("{}", serde_json::to_string_pretty(&render_json(&entries))?),
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::CliError;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn namespace(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("login.json");
        std::fs::write(
            &path,
            r##"{
  "loginButton": {"primary": "#submit-login", "fallbacks": ["#login-btn"]},
  "username": {"primary": "input[name=username]"}
}"##,
        )
        .unwrap();
        path
    }

    fn args(file: PathBuf, key: Option<&str>) -> ShowArgs {
        ShowArgs {
            file,
            key: key.map(str::to_string),
            format: ShowFormat::Text,
        }
    }

    #[test]
    fn test_select_all_sorted() {
        let dir = TempDir::new().unwrap();
        let entries = select_entries(&CliConfig::new(), &args(namespace(&dir), None)).unwrap();
        let keys: Vec<&str> = entries.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["loginButton", "username"]);
    }

    #[test]
    fn test_select_unknown_key() {
        let dir = TempDir::new().unwrap();
        let err = select_entries(&CliConfig::new(), &args(namespace(&dir), Some("nope")))
            .unwrap_err();
        assert!(matches!(
            err,
            CliError::Remendar(RemendarError::UnknownElement { .. })
        ));
    }

    #[test]
    fn test_render_text() {
        let entry = ReferenceEntry::new("loginButton", "#submit-login").with_fallbacks(["#login-btn"]);
        assert_eq!(
            render_text(&[entry]),
            "loginButton\n  primary:  #submit-login\n  fallback 1: #login-btn\n"
        );
        assert_eq!(render_text(&[]), "(no entries)\n");
    }

    #[test]
    fn test_render_json_matches_file_shape() {
        let entry = ReferenceEntry::new("username", "input[name=username]");
        let value = render_json(&[entry]);
        assert_eq!(value["username"]["primary"], "input[name=username]");
        assert_eq!(value["username"]["fallbacks"], json!([]));
    }
}
