//! Cache-proxy (squid) module.
//!
//! Owns the location of the site HTTP cache proxy used by jobs. The value is
//! a `host:port` pair; a bare hostname gets the conventional squid port
//! appended during parse. Sites without a proxy set the location to the
//! `UNAVAILABLE` sentinel, which is accepted but exports nothing.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::config::{Context, IniConfig, OptionSpec, OptionValue, UNAVAILABLE};
use crate::error::{CollaboratorError, ConfigError};

use super::checks;
use super::{Applicability, ConfigModule, OptionSet, ResolvedView, ValidationIssue};

const SECTION: &str = "Cache Proxy";

/// Default squid port appended to bare hostnames.
const DEFAULT_PORT: &str = "3128";

/// Configuration module for the site cache proxy.
#[derive(Debug)]
pub struct CacheProxyModule {
    options: OptionSet,
    applicability: Applicability,
}

impl Default for CacheProxyModule {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheProxyModule {
    /// Creates the module with its declared options.
    #[must_use]
    pub fn new() -> Self {
        Self {
            options: OptionSet::new(vec![OptionSpec::new("location")
                .optional()
                .default_str("")
                .external("GRID_CACHE_PROXY")]),
            applicability: Applicability::Disabled,
        }
    }

    fn location_is_unset(&self) -> bool {
        let location = self.options.str_value("location");
        checks::blank(location) || location.eq_ignore_ascii_case(UNAVAILABLE)
    }
}

impl ConfigModule for CacheProxyModule {
    fn section_name(&self) -> &'static str {
        SECTION
    }

    fn applicability(&self) -> Applicability {
        self.applicability
    }

    fn parse(&mut self, config: &IniConfig, ctx: &Context) -> Vec<ConfigError> {
        self.applicability = Applicability::from_section(config, SECTION);
        if !self.applicability.is_active() {
            debug!(section = SECTION, "Section absent, disabled, or ignored");
            return Vec::new();
        }

        let errors = self.options.parse_section(config, SECTION, ctx);
        if !errors.is_empty() {
            return errors;
        }

        // Normalize once, before validate: keep the sentinel canonical and
        // give bare hostnames the conventional port.
        let location = self.options.str_value("location").to_string();
        if location.eq_ignore_ascii_case(UNAVAILABLE) {
            self.options.set("location", OptionValue::Str(String::from(UNAVAILABLE)));
        } else if !checks::blank(&location) && !location.contains(':') {
            self.options
                .set("location", OptionValue::Str(format!("{location}:{DEFAULT_PORT}")));
        }
        Vec::new()
    }

    fn validate(&mut self, _view: &ResolvedView, _ctx: &Context) -> Vec<ValidationIssue> {
        if !self.applicability.is_active() {
            return Vec::new();
        }

        let location = self.options.str_value("location");
        if checks::blank(location) {
            warn!(
                section = SECTION,
                option = "location",
                "location is not set; use UNAVAILABLE if the site provides no cache proxy"
            );
            return Vec::new();
        }
        if location.eq_ignore_ascii_case(UNAVAILABLE) {
            warn!(
                section = SECTION,
                "Cache proxy is set to UNAVAILABLE; jobs function better with a proxy available"
            );
            return Vec::new();
        }

        let mut issues = Vec::new();
        match location.split_once(':') {
            None => issues.push(ValidationIssue::option(
                SECTION,
                "location",
                format!("Bad host specification, got {location}, expected hostname:port"),
            )),
            Some((host, port)) => {
                if !checks::valid_domain(host) {
                    issues.push(ValidationIssue::option(
                        SECTION,
                        "location",
                        format!("Invalid hostname for cache proxy: {location}"),
                    ));
                }
                if port.is_empty() || !port.chars().all(|c| c.is_ascii_digit()) {
                    issues.push(ValidationIssue::option(
                        SECTION,
                        "location",
                        format!("The port must be a number (e.g. host:3128), got: {location}"),
                    ));
                }
            }
        }
        issues
    }

    fn apply(&mut self, _view: &ResolvedView, _ctx: &Context) -> Result<(), CollaboratorError> {
        debug!(section = SECTION, "No side effects to apply");
        Ok(())
    }

    fn resolved_options(&self) -> BTreeMap<String, OptionValue> {
        self.options.snapshot()
    }

    fn exported_attributes(&self) -> Vec<(String, String)> {
        // An unset or UNAVAILABLE proxy must not surface downstream.
        if self.location_is_unset() {
            return Vec::new();
        }
        self.options.exported()
    }
}
