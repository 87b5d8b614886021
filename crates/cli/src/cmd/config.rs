//! Configuration management command
//!
//! Shows the effective watch configuration and manages the user config file.

use crate::util;
use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use qw_core::config::{self, WatchConfig};
use std::path::Path;
use watcher::NotificationFilter;

/// Print the effective configuration and where it came from
pub async fn run_list(explicit: Option<&Path>) -> Result<()> {
    let (config, source) = util::resolve_config(explicit)?;

    println!("{}", "Watch Configuration".bold());
    match &source {
        Some(path) => println!("{}: {}\n", "Location".dimmed(), path.display().dimmed()),
        None => println!("{}\n", "No config file found, using defaults".dimmed()),
    }

    print_config(&config);
    Ok(())
}

fn print_config(config: &WatchConfig) {
    let unset = || "(unset)".dimmed().to_string();

    println!(
        "  {} = {}",
        "root_path".cyan(),
        if config.root_path.as_os_str().is_empty() {
            unset()
        } else {
            config.root_path.display().to_string()
        }
    );
    println!(
        "  {} = {}",
        "file_extensions".cyan(),
        if config.active_extensions().is_empty() {
            unset()
        } else {
            config.active_extensions().join(", ")
        }
    );
    println!(
        "  {} = {} {}",
        "initial_quiet_period_secs".cyan(),
        config.initial_quiet_period_secs,
        format!("({}s)", config.initial_quiet_period_secs).dimmed()
    );
    println!(
        "  {} = {} {}",
        "batch_gap_threshold_secs".cyan(),
        config.batch_gap_threshold_secs,
        format!(
            "({}s = {} min)",
            config.batch_gap_threshold_secs,
            config.batch_gap_threshold_secs / 60
        )
        .dimmed()
    );
    println!(
        "  {} = {}",
        "threshold_padding_secs".cyan(),
        config.threshold_padding_secs
    );
    println!(
        "  {} = {}",
        "use_name_pattern".cyan(),
        config.use_name_pattern
    );
    println!(
        "  {} = {}",
        "name_pattern".cyan(),
        config.name_pattern.clone().unwrap_or_else(unset)
    );
    println!(
        "  {} = {}",
        "log_raw_notifications".cyan(),
        config.log_raw_notifications
    );
    println!(
        "  {} = {}",
        "log_ready_events".cyan(),
        config.log_ready_events
    );
    println!(
        "  {} = {}",
        "evict_idle_after_secs".cyan(),
        match config.evict_idle_after_secs {
            Some(secs) => format!("{} {}", secs, format!("({}h)", secs / 3600).dimmed()),
            None => "(never)".dimmed().to_string(),
        }
    );
}

/// Show the user config path, optionally creating it
pub async fn run_path(create: bool) -> Result<()> {
    if create {
        let path = config::init_if_missing().context("Failed to create config file")?;
        println!("{}", path.display());
        return Ok(());
    }

    let path = config::config_file_path().context("Could not determine config file path")?;
    println!("{}", path.display());
    if !path.exists() {
        println!("{}", "(does not exist yet, use --create)".dimmed());
    }
    Ok(())
}

pub async fn run_example() -> Result<()> {
    print!("{}", config::example_config());
    Ok(())
}

/// Check whether `qw watch` could start with the configuration
pub async fn run_check(explicit: Option<&Path>) -> Result<()> {
    let (config, source) = util::resolve_config(explicit)?;
    if let Some(path) = &source {
        println!("{}: {}", "Checking".dimmed(), path.display());
    }

    match check(&config) {
        Ok(()) => {
            println!("{} {}", "✓".green(), config.summary());
            Ok(())
        }
        Err(e) => {
            println!("{} {}", "✗".red(), e);
            anyhow::bail!("configuration is not usable")
        }
    }
}

fn check(config: &WatchConfig) -> Result<()> {
    config.validate()?;
    NotificationFilter::from_config(config)?;

    if !config.root_path.is_dir() {
        anyhow::bail!("root_path {} is not a directory", config.root_path.display());
    }
    Ok(())
}
