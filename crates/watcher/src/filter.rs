//! Notification filtering
//!
//! A notification is routed only when:
//! 1. The name matches the configured pattern (when pattern filtering is on)
//! 2. The file extension is one of the configured extensions

use qw_core::{Error, Result, WatchConfig};
use regex::Regex;
use std::path::Path;

/// Filter applied to every raw notification before routing
#[derive(Debug, Clone)]
pub struct NotificationFilter {
    /// Accepted extensions, leading dot included
    extensions: Vec<String>,

    /// Optional name pattern
    pattern: Option<Regex>,
}

impl NotificationFilter {
    /// Build the filter from a validated config
    pub fn from_config(config: &WatchConfig) -> Result<Self> {
        Self::new(&config.active_extensions(), config.pattern())
    }

    pub fn new(extensions: &[&str], pattern: Option<&str>) -> Result<Self> {
        let pattern = pattern
            .map(|p| {
                Regex::new(p).map_err(|e| Error::InvalidPattern {
                    pattern: p.to_string(),
                    reason: e.to_string(),
                })
            })
            .transpose()?;

        Ok(Self {
            extensions: extensions.iter().map(|ext| ext.to_string()).collect(),
            pattern,
        })
    }

    /// Check if a notification should be routed to a tracker
    pub fn accepts(&self, name: &str, full_path: &Path) -> bool {
        self.matches_pattern(name) && self.matches_extension(full_path)
    }

    /// Pattern search anywhere in the name; no pattern accepts everything
    fn matches_pattern(&self, name: &str) -> bool {
        self.pattern
            .as_ref()
            .map_or(true, |pattern| pattern.is_match(name))
    }

    /// Exact, case-sensitive extension match
    fn matches_extension(&self, path: &Path) -> bool {
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return false;
        };

        self.extensions
            .iter()
            .any(|accepted| accepted.strip_prefix('.') == Some(ext))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn accepts(filter: &NotificationFilter, name: &str) -> bool {
        filter.accepts(name, &PathBuf::from("/srv/in").join(name))
    }

    #[test]
    fn test_extension_match_is_exact() {
        let filter = NotificationFilter::new(&[".csv", ".xml"], None).unwrap();

        assert!(accepts(&filter, "a.csv"));
        assert!(accepts(&filter, "nested/dir/b.xml"));
        assert!(!accepts(&filter, "e.txt"));
        assert!(!accepts(&filter, "A.CSV"));
        assert!(!accepts(&filter, "a.csv.tmp"));
        assert!(!accepts(&filter, "no_extension"));
    }

    #[test]
    fn test_pattern_filters_by_name() {
        let filter = NotificationFilter::new(&[".csv"], Some(r"^supplier_\d+")).unwrap();

        assert!(accepts(&filter, "supplier_42.csv"));
        assert!(!accepts(&filter, "customer_42.csv"));
        // Pattern passes but extension does not
        assert!(!accepts(&filter, "supplier_42.txt"));
    }

    #[test]
    fn test_pattern_matches_anywhere() {
        let filter = NotificationFilter::new(&[".csv"], Some("daily")).unwrap();
        assert!(accepts(&filter, "reports/2024_daily_sales.csv"));
    }

    #[test]
    fn test_invalid_pattern() {
        let err = NotificationFilter::new(&[".csv"], Some("([unclosed")).unwrap_err();
        assert!(matches!(err, Error::InvalidPattern { .. }));
    }

    #[test]
    fn test_from_config_skips_blank_extensions() {
        let config = WatchConfig {
            root_path: PathBuf::from("/srv/in"),
            file_extensions: vec![String::new(), ".csv".to_string()],
            ..WatchConfig::default()
        };
        let filter = NotificationFilter::from_config(&config).unwrap();
        assert_eq!(filter.extensions, vec![".csv"]);
        assert!(filter.pattern.is_none());
    }
}
