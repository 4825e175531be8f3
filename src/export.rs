//! External-attribute export.
//!
//! After a successful run, every active module's exported attributes are
//! merged into one deterministic set and written to a line-oriented
//! `KEY=value` file that downstream grid services source at job startup.
//! Modules contribute in registry precedence order; a later write to an
//! already-present key is an explicit override and is logged, never silently
//! dropped.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;

use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::error::GridConfError;
use crate::module::ConfigModule;

/// The merged attribute mapping, keyed by external attribute name.
///
/// A `BTreeMap` so iteration, file output, and the digest are deterministic
/// for identical input.
pub type AttributeSet = BTreeMap<String, String>;

/// Merges the exported attributes of every active module.
///
/// Modules must be given in registry precedence order; within that order,
/// later values win for a repeated key.
#[must_use]
pub fn export(modules: &[Box<dyn ConfigModule>]) -> AttributeSet {
    let mut attributes = AttributeSet::new();
    for module in modules {
        if !module.applicability().is_active() {
            debug!(section = module.section_name(), "Inactive module exports nothing");
            continue;
        }
        for (name, value) in module.exported_attributes() {
            if let Some(previous) = attributes.insert(name.clone(), value) {
                info!(
                    section = module.section_name(),
                    attribute = name,
                    previous,
                    "Attribute overridden"
                );
            }
        }
    }
    attributes
}

/// Writes the attribute set as `KEY=value` lines.
///
/// The file is written to a temporary sibling and renamed into place so
/// readers never observe a half-written mapping.
///
/// # Errors
///
/// Returns [`GridConfError::Io`] when the temporary file cannot be created,
/// written, or renamed.
pub fn write_attributes_file(path: &Path, attributes: &AttributeSet) -> Result<(), GridConfError> {
    let mut rendered = String::new();
    for (name, value) in attributes {
        rendered.push_str(name);
        rendered.push('=');
        rendered.push_str(value);
        rendered.push('\n');
    }

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let mut temp = tempfile::NamedTempFile::new_in(dir)?;
    temp.write_all(rendered.as_bytes())?;
    temp.persist(path).map_err(|e| GridConfError::Io(e.error))?;

    info!(path = %path.display(), attributes = attributes.len(), "Attribute file written");
    Ok(())
}

/// Reads an attribute file back into a set, ignoring blank lines.
///
/// # Errors
///
/// Returns [`GridConfError::Io`] when the file cannot be read.
pub fn read_attributes_file(path: &Path) -> Result<AttributeSet, GridConfError> {
    let content = fs::read_to_string(path)?;
    let mut attributes = AttributeSet::new();
    for line in content.lines() {
        if line.trim().is_empty() {
            continue;
        }
        if let Some((name, value)) = line.split_once('=') {
            attributes.insert(name.to_string(), value.to_string());
        }
    }
    Ok(attributes)
}

/// Hex-encoded sha256 over the sorted attribute pairs.
///
/// Identical attribute sets always hash identically, so the digest doubles
/// as a cheap change detector for the written file.
#[must_use]
pub fn attributes_digest(attributes: &AttributeSet) -> String {
    let mut hasher = Sha256::new();
    for (name, value) in attributes {
        hasher.update(name.as_bytes());
        hasher.update(b"=");
        hasher.update(value.as_bytes());
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}
