//! Shared utilities for CLI commands

use anyhow::{Context, Result};
use qw_core::config::config_file_path;
use qw_core::WatchConfig;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Config file looked up in the working directory
pub const LOCAL_CONFIG_FILE: &str = "quietwatch.toml";

/// Initialize tracing, honoring `RUST_LOG` (default: info)
///
/// With a log directory, output goes to a daily-rolling file instead of the
/// terminal; the returned guard must be held until exit.
pub fn init_logging(log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let Some(dir) = log_dir else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
        return Ok(None);
    };

    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create log directory {}", dir.display()))?;

    let appender = tracing_appender::rolling::daily(dir, "quietwatch.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();

    Ok(Some(guard))
}

/// Config files tried when none is given explicitly, in order
pub fn default_config_candidates() -> Vec<PathBuf> {
    let mut candidates = vec![PathBuf::from(LOCAL_CONFIG_FILE)];
    if let Some(user) = config_file_path() {
        candidates.push(user);
    }
    candidates
}

/// Load the configuration and report which file it came from
///
/// An explicit path must exist. Otherwise the first existing candidate is
/// used, falling back to defaults when there is none.
pub fn resolve_config(explicit: Option<&Path>) -> Result<(WatchConfig, Option<PathBuf>)> {
    resolve_config_from(explicit, &default_config_candidates())
}

pub fn resolve_config_from(
    explicit: Option<&Path>,
    candidates: &[PathBuf],
) -> Result<(WatchConfig, Option<PathBuf>)> {
    if let Some(path) = explicit {
        let config = WatchConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?;
        return Ok((config, Some(path.to_path_buf())));
    }

    for path in candidates {
        if path.is_file() {
            let config = WatchConfig::load(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?;
            return Ok((config, Some(path.clone())));
        }
    }

    Ok((WatchConfig::default(), None))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_explicit_config_must_exist() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("missing.toml");
        assert!(resolve_config_from(Some(&missing), &[]).is_err());
    }

    #[test]
    fn test_first_existing_candidate_wins() {
        let temp_dir = TempDir::new().unwrap();
        let absent = temp_dir.path().join("absent.toml");
        let present = temp_dir.path().join("present.toml");
        std::fs::write(&present, "root_path = \"/data\"\nfile_extensions = [\".csv\"]\n").unwrap();

        let (config, source) =
            resolve_config_from(None, &[absent, present.clone()]).unwrap();
        assert_eq!(source, Some(present));
        assert_eq!(config.root_path, PathBuf::from("/data"));
    }

    #[test]
    fn test_defaults_without_any_file() {
        let (config, source) = resolve_config_from(None, &[]).unwrap();
        assert_eq!(source, None);
        assert_eq!(config, WatchConfig::default());
    }

    #[test]
    fn test_malformed_candidate_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let bad = temp_dir.path().join("bad.toml");
        std::fs::write(&bad, "root_path = [").unwrap();
        assert!(resolve_config_from(None, &[bad]).is_err());
    }
}
