//! Watch a directory tree and report files once they stop changing

use crate::util;
use anyhow::{Context, Result};
use clap::Args;
use owo_colors::OwoColorize;
use qw_core::{ReadyResult, WatchConfig, WatchEvent};
use std::path::PathBuf;
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, warn};
use watcher::WatchDispatcher;

#[derive(Args, Debug, Default)]
pub struct WatchArgs {
    /// Config file (default: ./quietwatch.toml, then the user config)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Directory to watch recursively
    #[arg(long)]
    pub root: Option<PathBuf>,

    /// Extension to track, leading dot included (repeatable)
    #[arg(long = "ext", value_name = "EXT")]
    pub extensions: Vec<String>,

    /// Only track file names matching this regular expression
    #[arg(long)]
    pub pattern: Option<String>,

    /// Seconds a new file must stay unchanged before it is ready
    #[arg(long)]
    pub initial_quiet_secs: Option<u64>,

    /// Seconds after a ready signal within which changes resume the batch
    #[arg(long)]
    pub batch_gap_secs: Option<u64>,

    /// Print ready results as JSON lines
    #[arg(long)]
    pub json: bool,
}

impl WatchArgs {
    /// Layer command-line overrides on top of the loaded config
    pub fn apply(&self, config: &mut WatchConfig) {
        if let Some(root) = &self.root {
            config.root_path = root.clone();
        }
        if !self.extensions.is_empty() {
            config.file_extensions = self.extensions.clone();
        }
        if let Some(pattern) = &self.pattern {
            config.use_name_pattern = true;
            config.name_pattern = Some(pattern.clone());
        }
        if let Some(secs) = self.initial_quiet_secs {
            config.initial_quiet_period_secs = secs;
        }
        if let Some(secs) = self.batch_gap_secs {
            config.batch_gap_threshold_secs = secs;
        }
    }
}

pub async fn run(args: WatchArgs) -> Result<()> {
    let (mut config, source_file) = util::resolve_config(args.config.as_deref())?;
    args.apply(&mut config);

    let dispatcher = match WatchDispatcher::configure(&config) {
        Ok(dispatcher) => dispatcher,
        Err(e) if e.is_configuration() => {
            // Nothing to watch yet; report and leave quietly
            error!("Not watching: {}", e);
            eprintln!("{} {}", "Not watching:".red(), e);
            if source_file.is_none() {
                eprintln!(
                    "{}",
                    "Hint: pass --root and --ext, or run `qw config path --create`".dimmed()
                );
            }
            return Ok(());
        }
        Err(e) => return Err(e).context("Failed to configure watcher"),
    };

    let mut events = dispatcher.subscribe();
    let source = dispatcher
        .start()
        .with_context(|| format!("Failed to watch {}", config.root_path.display()))?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            received = events.recv() => match received {
                Ok(WatchEvent::Ready(result)) => print_ready(&result, args.json)?,
                Ok(WatchEvent::Message(msg)) => {
                    if !args.json {
                        println!("{}", msg.dimmed());
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Output fell behind, {} events skipped", skipped);
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    source.stop();
    dispatcher.shutdown();
    Ok(())
}

fn print_ready(result: &ReadyResult, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(result)?);
    } else {
        println!(
            "{} {} {}",
            "ready".green().bold(),
            result.file_name,
            format!("({:.1}s since last update)", result.seconds_since_last_update).dimmed()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_replace_config_values() {
        let args = WatchArgs {
            root: Some(PathBuf::from("/srv/drop")),
            extensions: vec![".xml".to_string()],
            pattern: Some("^supplier_".to_string()),
            initial_quiet_secs: Some(2),
            batch_gap_secs: Some(30),
            ..WatchArgs::default()
        };
        let mut config = WatchConfig {
            root_path: PathBuf::from("/srv/incoming"),
            file_extensions: vec![".csv".to_string()],
            ..WatchConfig::default()
        };

        args.apply(&mut config);

        assert_eq!(config.root_path, PathBuf::from("/srv/drop"));
        assert_eq!(config.file_extensions, vec![".xml".to_string()]);
        assert_eq!(config.pattern(), Some("^supplier_"));
        assert_eq!(config.initial_quiet_period_secs, 2);
        assert_eq!(config.batch_gap_threshold_secs, 30);
    }

    #[test]
    fn test_no_overrides_keep_config() {
        let mut config = WatchConfig {
            root_path: PathBuf::from("/srv/incoming"),
            file_extensions: vec![".csv".to_string()],
            ..WatchConfig::default()
        };
        let before = config.clone();

        WatchArgs::default().apply(&mut config);

        assert_eq!(config, before);
    }
}
