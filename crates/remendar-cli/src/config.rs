//! CLI configuration

use remendar::HealerConfig;
use std::path::Path;

use crate::error::CliResult;

/// CLI verbosity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Verbosity {
    /// Quiet - errors only
    Quiet,
    /// Normal - default output
    #[default]
    Normal,
    /// Verbose - library debug logs
    Verbose,
    /// Debug - library trace logs
    Debug,
}

impl Verbosity {
    /// Map `-q` / `-v` counts to a level
    #[must_use]
    pub const fn from_flags(quiet: bool, verbose: u8) -> Self {
        if quiet {
            return Self::Quiet;
        }
        match verbose {
            0 => Self::Normal,
            1 => Self::Verbose,
            _ => Self::Debug,
        }
    }

    /// Check if quiet mode
    #[must_use]
    pub const fn is_quiet(self) -> bool {
        matches!(self, Self::Quiet)
    }

    /// Fallback log directive when `REMENDAR_LOG` is unset
    #[must_use]
    pub const fn log_directive(self) -> &'static str {
        match self {
            Self::Quiet => "remendar=error",
            Self::Normal => "remendar=warn",
            Self::Verbose => "remendar=debug",
            Self::Debug => "remendar=trace",
        }
    }
}

/// CLI configuration
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    /// Verbosity level
    pub verbosity: Verbosity,
    /// Healer configuration used when opening namespace files
    pub healer: HealerConfig,
}

impl CliConfig {
    /// Create new default configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set verbosity
    #[must_use]
    pub const fn with_verbosity(mut self, verbosity: Verbosity) -> Self {
        self.verbosity = verbosity;
        self
    }

    /// Set the healer configuration
    #[must_use]
    pub fn with_healer(mut self, healer: HealerConfig) -> Self {
        self.healer = healer;
        self
    }

    /// Load the healer configuration from `path` (or defaults), then
    /// overlay `REMENDAR_*` environment variables
    pub fn load_healer(path: Option<&Path>) -> CliResult<HealerConfig> {
        let base = match path {
            Some(path) => HealerConfig::from_file(path)?,
            None => HealerConfig::default(),
        };
        let healer = base.apply_env()?;
        healer.validate()?;
        Ok(healer)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_verbosity_from_flags() {
        assert_eq!(Verbosity::from_flags(true, 3), Verbosity::Quiet);
        assert_eq!(Verbosity::from_flags(false, 0), Verbosity::Normal);
        assert_eq!(Verbosity::from_flags(false, 1), Verbosity::Verbose);
        assert_eq!(Verbosity::from_flags(false, 5), Verbosity::Debug);
    }

    #[test]
    fn test_log_directive() {
        assert_eq!(Verbosity::Verbose.log_directive(), "remendar=debug");
        assert!(Verbosity::Quiet.is_quiet());
    }

    #[test]
    fn test_load_healer_from_yaml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("healer.yaml");
        std::fs::write(&path, "max_fallback_history: 2\n").unwrap();
        let healer = CliConfig::load_healer(Some(&path)).unwrap();
        assert_eq!(healer.max_fallback_history, 2);
    }

    #[test]
    fn test_load_healer_missing_file_is_error() {
        let dir = TempDir::new().unwrap();
        assert!(CliConfig::load_healer(Some(&dir.path().join("nope.yaml"))).is_err());
    }

    #[test]
    fn test_builder() {
        let config = CliConfig::new()
            .with_verbosity(Verbosity::Debug)
            .with_healer(HealerConfig::default().with_fallback_cap(1));
        assert_eq!(config.verbosity, Verbosity::Debug);
        assert_eq!(config.healer.max_fallback_history, 1);
    }
}
