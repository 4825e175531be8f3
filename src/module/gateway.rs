//! Job-gateway enablement module.
//!
//! Owns the flags deciding which job-submission gateway is active. Batch
//! modules consult these flags through the resolved view, so this module is
//! always enabled: even without a `[Gateway]` section its defaults must be
//! visible to the rest of the run.

use std::collections::BTreeMap;

use tracing::debug;

use crate::config::{Context, IniConfig, OptionSpec, OptionValue, ValueKind};
use crate::error::{CollaboratorError, ConfigError};

use super::{Applicability, ConfigModule, OptionSet, ResolvedView, ValidationIssue};

const SECTION: &str = "Gateway";

/// Configuration module for job-gateway enablement.
#[derive(Debug)]
pub struct GatewayModule {
    options: OptionSet,
}

impl Default for GatewayModule {
    fn default() -> Self {
        Self::new()
    }
}

impl GatewayModule {
    /// Creates the module with its declared options.
    #[must_use]
    pub fn new() -> Self {
        Self {
            options: OptionSet::new(vec![
                OptionSpec::new("legacy_gateway_enabled")
                    .optional()
                    .kind(ValueKind::Bool)
                    .default_value(OptionValue::Bool(false)),
                OptionSpec::new("htcondor_gateway_enabled")
                    .optional()
                    .kind(ValueKind::Bool)
                    .default_value(OptionValue::Bool(true)),
                OptionSpec::new("job_env_path")
                    .optional()
                    .default_str("/bin:/usr/bin:/sbin:/usr/sbin")
                    .external("PATH"),
            ]),
        }
    }
}

impl ConfigModule for GatewayModule {
    fn section_name(&self) -> &'static str {
        SECTION
    }

    fn applicability(&self) -> Applicability {
        // Always active: sibling modules read the gateway flags and the
        // PATH mapping must export even when the section is absent.
        Applicability::Active
    }

    fn parse(&mut self, config: &IniConfig, ctx: &Context) -> Vec<ConfigError> {
        if !config.has_section(SECTION) {
            debug!(section = SECTION, "Section not in config file, using defaults");
        }
        self.options.parse_section(config, SECTION, ctx)
    }

    fn validate(&mut self, _view: &ResolvedView, _ctx: &Context) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();
        if self.options.bool_value("legacy_gateway_enabled") {
            issues.push(ValidationIssue::option(
                SECTION,
                "legacy_gateway_enabled",
                "The legacy gateway is no longer supported; please unset this option",
            ));
        }
        issues
    }

    fn apply(&mut self, _view: &ResolvedView, _ctx: &Context) -> Result<(), CollaboratorError> {
        // All gateway-dependent configuration happens in the batch modules.
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
        Context::new(true, "ce.example.org")
    }

    #[test]
    fn test_defaults_without_section() {
        let ini = IniConfig::parse("[Site Information]\nhost_name = x.example.org\n").unwrap();
        let mut module = GatewayModule::new();

        assert!(module.parse(&ini, &ctx()).is_empty());
        assert_eq!(module.applicability(), Applicability::Active);

        let resolved = module.resolved_options();
        assert_eq!(resolved.get("htcondor_gateway_enabled"), Some(&OptionValue::Bool(true)));
        assert_eq!(resolved.get("legacy_gateway_enabled"), Some(&OptionValue::Bool(false)));
    }

    #[test]
    fn test_legacy_gateway_is_rejected() {
        let ini = IniConfig::parse("[Gateway]\nlegacy_gateway_enabled = true\n").unwrap();
        let mut module = GatewayModule::new();

        assert!(module.parse(&ini, &ctx()).is_empty());
        let issues = module.validate(&ResolvedView::default(), &ctx());
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.contains("no longer supported"));
    }

    #[test]
    fn test_exports_job_env_path() {
        let ini = IniConfig::parse("[Gateway]\njob_env_path = /bin:/usr/bin\n").unwrap();
        let mut module = GatewayModule::new();
        assert!(module.parse(&ini, &ctx()).is_empty());

        assert_eq!(
            module.exported_attributes(),
            vec![(String::from("PATH"), String::from("/bin:/usr/bin"))]
        );
    }
}
