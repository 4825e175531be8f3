//! Immutable run context.
//!
//! The context carries externally-discovered facts about the host being
//! configured: its deployment role and local hostname. It is constructed
//! once, before any module runs, and passed by shared reference into the
//! resolve/validate/apply stages; there is no global configuration state.

use tracing::debug;

/// Immutable deployment context for one configuration run.
#[derive(Debug, Clone)]
pub struct Context {
    /// True when this host exposes job-submission gateways; activates
    /// conditionally-mandatory options.
    pub is_compute_entry_point: bool,
    /// Local hostname, usable as an implicit default by modules.
    pub hostname: String,
}

impl Context {
    /// Creates a context from explicit values.
    #[must_use]
    pub fn new(is_compute_entry_point: bool, hostname: impl Into<String>) -> Self {
        Self {
            is_compute_entry_point,
            hostname: hostname.into(),
        }
    }

    /// Builds a context by discovering the local hostname.
    ///
    /// The `GRIDCONF_HOSTNAME` environment variable (typically supplied via
    /// a `.env` file) overrides discovery, which is useful in containers
    /// whose transient hostname is not the service name being configured.
    #[must_use]
    pub fn discover(is_compute_entry_point: bool) -> Self {
        let hostname = std::env::var("GRIDCONF_HOSTNAME").ok().unwrap_or_else(|| {
            hostname::get()
                .ok()
                .and_then(|h| h.into_string().ok())
                .unwrap_or_else(|| String::from("localhost"))
        });

        debug!(hostname, is_compute_entry_point, "Discovered run context");
        Self::new(is_compute_entry_point, hostname)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_explicit_context() {
        let ctx = Context::new(true, "ce.example.org");
        assert!(ctx.is_compute_entry_point);
        assert_eq!(ctx.hostname, "ce.example.org");
    }
}
