//! Minimal INI reader for the site configuration file.
//!
//! The input format is a conventional INI file: `[Section]` headers,
//! `key = value` assignments, and `;` or `#` comment lines. Section names
//! are matched case-sensitively and preserved in declaration order; a key
//! assigned twice within one section keeps the last value.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::{debug, info};

use crate::error::{ConfigError, GridConfError, Result};

/// Parsed INI configuration.
#[derive(Debug, Default, Clone)]
pub struct IniConfig {
    sections: BTreeMap<String, BTreeMap<String, String>>,
}

impl IniConfig {
    /// Loads a configuration file from disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the file does not exist, cannot be read, or is
    /// structurally malformed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading configuration from: {}", path.display());

        if !path.exists() {
            return Err(GridConfError::Config(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            }));
        }

        let content = std::fs::read_to_string(path)?;
        Self::parse(&content).map_err(GridConfError::Config)
    }

    /// Parses configuration text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Syntax`] for assignments outside any section
    /// or lines that are neither assignments, headers, nor comments.
    pub fn parse(content: &str) -> std::result::Result<Self, ConfigError> {
        let mut sections: BTreeMap<String, BTreeMap<String, String>> = BTreeMap::new();
        let mut current: Option<String> = None;

        for (idx, raw_line) in content.lines().enumerate() {
            let line = raw_line.trim();
            let lineno = idx + 1;

            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }

            if let Some(header) = line.strip_prefix('[') {
                let Some(name) = header.strip_suffix(']') else {
                    return Err(ConfigError::syntax(lineno, "unterminated section header"));
                };
                let name = name.trim();
                if name.is_empty() {
                    return Err(ConfigError::syntax(lineno, "empty section name"));
                }
                sections.entry(name.to_string()).or_default();
                current = Some(name.to_string());
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                return Err(ConfigError::syntax(lineno, format!("expected 'key = value', got {line:?}")));
            };
            let Some(section) = &current else {
                return Err(ConfigError::syntax(lineno, "assignment outside any section"));
            };

            let key = key.trim().to_ascii_lowercase();
            if key.is_empty() {
                return Err(ConfigError::syntax(lineno, "empty key"));
            }
            if let Some(entries) = sections.get_mut(section) {
                entries.insert(key, value.trim().to_string());
            }
        }

        debug!("Parsed {} configuration sections", sections.len());
        Ok(Self { sections })
    }

    /// True if the named section is present, even if empty.
    #[must_use]
    pub fn has_section(&self, section: &str) -> bool {
        self.sections.contains_key(section)
    }

    /// Looks up a key within a section.
    #[must_use]
    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.sections
            .get(section)
            .and_then(|s| s.get(&key.to_ascii_lowercase()))
            .map(String::as_str)
    }

    /// Returns all keys present in a section, in sorted order.
    #[must_use]
    pub fn section_keys(&self, section: &str) -> Vec<&str> {
        self.sections
            .get(section)
            .map(|s| s.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    /// Returns the names of all sections, in sorted order.
    #[must_use]
    pub fn section_names(&self) -> Vec<&str> {
        self.sections.keys().map(String::as_str).collect()
    }
}
