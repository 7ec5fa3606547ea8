use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{ensure, Result};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Configuration {
    /// Root directory to scan recursively for images.
    pub library_path: PathBuf,
    /// Address the HTTP server binds to.
    pub bind_address: String,
    /// Port the HTTP server listens on.
    pub port: u16,
    /// Where the shuffled catalog is persisted between runs.
    pub records_file: PathBuf,
    /// Where the set of ignored photo names is persisted.
    pub ignored_file: PathBuf,
    /// Where the set of liked photo names is persisted.
    pub liked_file: PathBuf,
    /// Deterministic seed for the catalog shuffle.
    pub shuffle_seed: u64,
    /// Rebuild the catalog automatically when the library changes on disk.
    pub watch_library: bool,
    /// Quiet window after a filesystem event before a rebuild runs.
    #[serde(with = "humantime_serde")]
    pub watch_debounce: Duration,
}

impl Configuration {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let s = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&s)?)
    }

    /// Validate runtime invariants that cannot be expressed via serde defaults alone.
    pub fn validated(self) -> Result<Self> {
        ensure!(
            !self.library_path.as_os_str().is_empty(),
            "library-path must be set"
        );
        ensure!(self.port > 0, "port must be greater than zero");
        if self.watch_library {
            ensure!(
                self.watch_debounce > Duration::ZERO,
                "watch-debounce must be positive when watch-library is enabled"
            );
        }
        Ok(self)
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            library_path: PathBuf::new(),
            bind_address: "0.0.0.0".to_string(),
            port: 8080,
            records_file: PathBuf::from("records.json"),
            ignored_file: PathBuf::from("ignored.json"),
            liked_file: PathBuf::from("liked.json"),
            shuffle_seed: 1,
            watch_library: false,
            watch_debounce: Duration::from_secs(2),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_yaml_fills_defaults() {
        let cfg: Configuration = serde_yaml::from_str("library-path: /photos\n").unwrap();
        assert_eq!(cfg.library_path, PathBuf::from("/photos"));
        assert_eq!(cfg.bind_address, "0.0.0.0");
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.records_file, PathBuf::from("records.json"));
        assert_eq!(cfg.shuffle_seed, 1);
        assert!(!cfg.watch_library);
        assert_eq!(cfg.watch_debounce, Duration::from_secs(2));
    }

    #[test]
    fn kebab_case_fields_and_humantime_durations_parse() {
        let cfg: Configuration = serde_yaml::from_str(
            "library-path: /photos\n\
             bind-address: 127.0.0.1\n\
             port: 9000\n\
             ignored-file: /var/lib/carousel/ignored.json\n\
             shuffle-seed: 42\n\
             watch-library: true\n\
             watch-debounce: 500ms\n",
        )
        .unwrap();
        assert_eq!(cfg.port, 9000);
        assert_eq!(cfg.shuffle_seed, 42);
        assert!(cfg.watch_library);
        assert_eq!(cfg.watch_debounce, Duration::from_millis(500));
        assert!(cfg.validated().is_ok());
    }

    #[test]
    fn validation_rejects_missing_library_path() {
        let cfg = Configuration::default();
        assert!(cfg.validated().is_err());
    }

    #[test]
    fn validation_rejects_zero_debounce_with_watching_enabled() {
        let cfg = Configuration {
            library_path: PathBuf::from("/photos"),
            watch_library: true,
            watch_debounce: Duration::ZERO,
            ..Configuration::default()
        };
        assert!(cfg.validated().is_err());
    }
}
