//! Check command handler

use remendar::ReferenceStore;
use std::path::{Path, PathBuf};

use crate::commands::CheckArgs;
use crate::config::CliConfig;
use crate::error::{CliError, CliResult};

/// Outcome of checking one namespace file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReport {
    /// File checked
    pub path: PathBuf,
    /// Entries read
    pub entries: usize,
    /// Violations, prefixed with the element key where there is one
    pub problems: Vec<String>,
}

impl FileReport {
    /// No violations
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.problems.is_empty()
    }
}

/// Check one namespace file. Unreadable files are reported, not raised.
#[must_use]
pub fn check_file(path: &Path) -> FileReport {
    let mut report = FileReport {
        path: path.to_path_buf(),
        entries: 0,
        problems: Vec::new(),
    };
    if !path.is_file() {
        report.problems.push("file not found".to_string());
        return report;
    }
    let store = match ReferenceStore::open(path) {
        Ok(store) => store,
        Err(e) => {
            report.problems.push(e.to_string());
            return report;
        }
    };
    for key in store.keys() {
        let Some(entry) = store.lookup(&key) else {
            continue;
        };
        report.entries += 1;
        report
            .problems
            .extend(entry.problems().into_iter().map(|p| format!("{key}: {p}")));
    }
    report
}

/// Execute the check command
pub fn execute_check(config: &CliConfig, args: &CheckArgs) -> CliResult<()> {
    let reports: Vec<FileReport> = args.files.iter().map(|f| check_file(f)).collect();

    let mut problems = 0;
    let mut files = 0;
    for report in &reports {
        let path = report.path.display();
        if report.is_clean() {
            if !config.verbosity.is_quiet() {
                println!("{path}: ok ({} entries)", report.entries);
            }
            continue;
        }
        files += 1;
        problems += report.problems.len();
        for problem in &report.problems {
            eprintln!("{path}: {problem}");
        }
    }

    if problems == 0 {
        Ok(())
    } else {
        Err(CliError::CheckFailed { problems, files })
    }
}
