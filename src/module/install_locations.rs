//! Middleware install-location module.
//!
//! Resolves where the middleware stack, the user account map, and the
//! transfer log live. The section is optional: when absent, the module
//! configures itself from defaults and skips location validation, since
//! typical installations never need to override these paths.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::config::{Context, IniConfig, OptionSpec, OptionValue};
use crate::error::{CollaboratorError, ConfigError};

use super::checks;
use super::{Applicability, ConfigModule, OptionSet, ResolvedView, ValidationIssue};

const SECTION: &str = "Install Locations";

/// Configuration module for middleware install locations.
#[derive(Debug)]
pub struct InstallLocationsModule {
    options: OptionSet,
    applicability: Applicability,
    self_configured: bool,
}

impl Default for InstallLocationsModule {
    fn default() -> Self {
        Self::new()
    }
}

impl InstallLocationsModule {
    /// Creates the module with its declared options.
    #[must_use]
    pub fn new() -> Self {
        Self {
            options: OptionSet::new(vec![
                OptionSpec::new("root")
                    .optional()
                    .default_str("/usr")
                    .external("GRID_LOCATION"),
                OptionSpec::new("account_map")
                    .optional()
                    .default_str("/var/lib/grid/user-account-map"),
                OptionSpec::new("transfer_log")
                    .optional()
                    .default_str("/var/log/grid-transfer.log"),
            ]),
            applicability: Applicability::Disabled,
            self_configured: false,
        }
    }
}

impl ConfigModule for InstallLocationsModule {
    fn section_name(&self) -> &'static str {
        SECTION
    }

    fn applicability(&self) -> Applicability {
        self.applicability
    }

    fn parse(&mut self, config: &IniConfig, ctx: &Context) -> Vec<ConfigError> {
        if config.has_section(SECTION) {
            warn!(
                section = SECTION,
                "Section found and will be used, but it is not needed for typical \
                 resources and can be deleted from the configuration"
            );
            self.applicability = Applicability::from_section(config, SECTION);
        } else {
            info!(section = SECTION, "Section not found, configuring automatically");
            self.self_configured = true;
            self.applicability = Applicability::Active;
        }

        // With the section absent every option resolves to its default.
        self.options.parse_section(config, SECTION, ctx)
    }

    fn validate(&mut self, _view: &ResolvedView, _ctx: &Context) -> Vec<ValidationIssue> {
        if self.self_configured || !self.applicability.is_active() {
            return Vec::new();
        }

        let mut issues = Vec::new();
        // The account map is created later in the run if missing, so only
        // the remaining locations are checked for existence.
        for name in ["root"] {
            let value = self.options.str_value(name);
            if !checks::valid_location(value) {
                issues.push(ValidationIssue::option(
                    SECTION,
                    name,
                    format!("Invalid location: {value}"),
                ));
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
        self.options.exported()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> Context {
        Context::new(false, "host.example.org")
    }

    #[test]
    fn test_absent_section_self_configures() {
        let ini = IniConfig::parse("[Site Information]\nhost_name = x.example.org\n").unwrap();
        let mut module = InstallLocationsModule::new();

        assert!(module.parse(&ini, &ctx()).is_empty());
        assert_eq!(module.applicability(), Applicability::Active);
        assert_eq!(module.resolved_options().get("root").unwrap().to_string(), "/usr");

        // Self-configured defaults are trusted, not validated.
        assert!(module.validate(&ResolvedView::default(), &ctx()).is_empty());
    }

    #[test]
    fn test_present_section_validates_locations() {
        let ini = IniConfig::parse("[Install Locations]\nroot = /nonexistent-grid-root\n").unwrap();
        let mut module = InstallLocationsModule::new();

        assert!(module.parse(&ini, &ctx()).is_empty());
        let issues = module.validate(&ResolvedView::default(), &ctx());
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.contains("/nonexistent-grid-root"));
    }

    #[test]
    fn test_export_maps_root() {
        let ini = IniConfig::parse("[Install Locations]\nroot = /usr\n").unwrap();
        let mut module = InstallLocationsModule::new();
        assert!(module.parse(&ini, &ctx()).is_empty());

        let exported = module.exported_attributes();
        assert_eq!(exported, vec![(String::from("GRID_LOCATION"), String::from("/usr"))]);
    }
}
