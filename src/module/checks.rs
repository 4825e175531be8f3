//! Shared validation predicates used by module validate stages.
//!
//! These are plausibility checks, not network lookups: the core performs no
//! I/O of its own beyond the local filesystem.

use std::path::Path;

/// True when `name` is a plausible DNS name: dot-separated labels of
/// alphanumerics and hyphens, no label starting or ending with a hyphen.
#[must_use]
pub fn valid_domain(name: &str) -> bool {
    if name.is_empty() {
        return false;
    }
    name.split('.').all(|label| {
        !label.is_empty()
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    })
}

/// True when `entry` is a plausible `host` or `host:port` specification.
#[must_use]
pub fn valid_host_port(entry: &str) -> bool {
    match entry.split_once(':') {
        Some((host, port)) => valid_domain(host) && !port.is_empty() && port.chars().all(|c| c.is_ascii_digit()),
        None => valid_domain(entry),
    }
}

/// True when `address` has the minimal shape of an email address.
#[must_use]
pub fn valid_email(address: &str) -> bool {
    match address.split_once('@') {
        Some((local, domain)) => !local.is_empty() && valid_domain(domain),
        None => false,
    }
}

/// True when the path exists as a directory.
#[must_use]
pub fn valid_location(path: &str) -> bool {
    !path.is_empty() && Path::new(path).is_dir()
}

/// True when the path exists as a regular file.
#[must_use]
pub fn valid_file(path: &str) -> bool {
    !path.is_empty() && Path::new(path).is_file()
}

/// True when the text is empty or whitespace-only.
#[must_use]
pub fn blank(text: &str) -> bool {
    text.trim().is_empty()
}
