//! Site-information module.
//!
//! Owns site metadata: group, hostname, resource naming, sponsors, contact
//! details, and coordinates. Most of these are only required on compute
//! entry points, where downstream accounting and information services
//! consume them.
//!
//! The `resource` option deliberately maps to the same external name as the
//! deprecated `site_name` option; the export step lets `resource` override
//! it (see [`ConfigModule::exported_attributes`]).

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::config::{split_list, Context, IniConfig, OptionSpec, OptionValue, ValueKind};
use crate::error::{CollaboratorError, ConfigError};

use super::checks;
use super::{Applicability, ConfigModule, OptionSet, ResolvedView, ValidationIssue};

const SECTION: &str = "Site Information";

/// Placeholder hostname shipped in configuration templates.
const PLACEHOLDER_HOST: &str = "my.domain.name";

/// Valid values for the `group` option.
const VALID_GROUPS: &[&str] = &["Production", "Testbed"];

/// Configuration module for site metadata.
#[derive(Debug)]
pub struct SiteInformationModule {
    options: OptionSet,
    applicability: Applicability,
}

impl Default for SiteInformationModule {
    fn default() -> Self {
        Self::new()
    }
}

impl SiteInformationModule {
    /// Creates the module with its declared options.
    #[must_use]
    pub fn new() -> Self {
        Self {
            options: OptionSet::new(vec![
                OptionSpec::new("group")
                    .optional()
                    .default_str("Production")
                    .external("GRID_GROUP"),
                OptionSpec::new("host_name").external("GRID_HOSTNAME"),
                OptionSpec::new("site_name")
                    .optional()
                    .default_str("")
                    .external("GRID_SITE_NAME"),
                OptionSpec::new("resource").optional().default_str(""),
                OptionSpec::new("resource_group").optional().default_str(""),
                OptionSpec::new("sponsor").mandatory_on_ce().external("GRID_SPONSOR"),
                OptionSpec::new("site_policy")
                    .optional()
                    .default_str("")
                    .external("GRID_SITE_INFO"),
                OptionSpec::new("contact").mandatory_on_ce().external("GRID_CONTACT_NAME"),
                OptionSpec::new("email").mandatory_on_ce().external("GRID_CONTACT_EMAIL"),
                OptionSpec::new("city").mandatory_on_ce().external("GRID_SITE_CITY"),
                OptionSpec::new("country").mandatory_on_ce().external("GRID_SITE_COUNTRY"),
                OptionSpec::new("latitude")
                    .mandatory_on_ce()
                    .kind(ValueKind::Float)
                    .external("GRID_SITE_LATITUDE"),
                OptionSpec::new("longitude")
                    .mandatory_on_ce()
                    .kind(ValueKind::Float)
                    .external("GRID_SITE_LONGITUDE"),
            ]),
            applicability: Applicability::Disabled,
        }
    }

    /// Checks the `sponsor` setting: `name[:percentage]` entries whose
    /// percentages must total 100.
    fn check_sponsors(&self, issues: &mut Vec<ValidationIssue>) {
        let sponsors = self.options.str_value("sponsor");
        if checks::blank(sponsors) {
            return;
        }

        let mut percentage = 0i64;
        for entry in split_list(sponsors) {
            let mut parts = entry.splitn(2, ':');
            let name = parts.next().unwrap_or_default();
            if name.is_empty() {
                issues.push(ValidationIssue::option(
                    SECTION,
                    "sponsor",
                    format!("Sponsor entry is not formatted correctly: {entry:?}"),
                ));
                continue;
            }

            match parts.next() {
                None => percentage += 100,
                Some(share) => match share.trim().parse::<i64>() {
                    Ok(value) => percentage += value,
                    Err(_) => issues.push(ValidationIssue::option(
                        SECTION,
                        "sponsor",
                        format!("Sponsor percentage ({share}) in entry {entry:?} is not an integer"),
                    )),
                },
            }
        }

        if percentage != 100 {
            issues.push(ValidationIssue::option(
                SECTION,
                "sponsor",
                format!("Sponsor percentages must add up to 100, got {percentage}"),
            ));
        }
    }
}

impl ConfigModule for SiteInformationModule {
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
        self.options.parse_section(config, SECTION, ctx)
    }

    fn validate(&mut self, _view: &ResolvedView, _ctx: &Context) -> Vec<ValidationIssue> {
        if !self.applicability.is_active() {
            return Vec::new();
        }

        let mut issues = Vec::new();

        let group = self.options.str_value("group");
        if !VALID_GROUPS.contains(&group) {
            issues.push(ValidationIssue::option(
                SECTION,
                "group",
                format!("Must be one of {}, got: {group}", VALID_GROUPS.join(", ")),
            ));
        }

        let host_name = self.options.str_value("host_name");
        if host_name == PLACEHOLDER_HOST {
            issues.push(ValidationIssue::option(
                SECTION,
                "host_name",
                format!("Setting left at placeholder value: {PLACEHOLDER_HOST}"),
            ));
        } else if !checks::valid_domain(host_name) {
            issues.push(ValidationIssue::option(
                SECTION,
                "host_name",
                format!("Not a valid DNS name: {host_name}"),
            ));
        }

        if !checks::blank(self.options.str_value("site_name")) {
            warn!(
                section = SECTION,
                option = "site_name",
                "site_name is deprecated in favor of resource/resource_group and will be removed"
            );
        }

        let email = self.options.str_value("email");
        if !checks::blank(email) && !checks::valid_email(email) {
            issues.push(ValidationIssue::option(
                SECTION,
                "email",
                format!("Invalid email address: {email}"),
            ));
        }

        if let Some(OptionValue::Float(latitude)) = self.options.get("latitude") {
            if !(-90.0..=90.0).contains(latitude) {
                issues.push(ValidationIssue::option(
                    SECTION,
                    "latitude",
                    format!("Latitude must be between -90 and 90, got {latitude}"),
                ));
            }
        }
        if let Some(OptionValue::Float(longitude)) = self.options.get("longitude") {
            if !(-180.0..=180.0).contains(longitude) {
                issues.push(ValidationIssue::option(
                    SECTION,
                    "longitude",
                    format!("Longitude must be between -180 and 180, got {longitude}"),
                ));
            }
        }

        self.check_sponsors(&mut issues);

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
        let mut attributes = self.options.exported();

        // `resource` has no external name of its own: when set, it overrides
        // whatever `site_name` exported under GRID_SITE_NAME. Appending it
        // last makes the override explicit in export order.
        let resource = self.options.str_value("resource");
        if !checks::blank(resource) {
            attributes.push((String::from("GRID_SITE_NAME"), resource.to_string()));
        }
        attributes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_section(extra: &str) -> String {
        format!(
            "[Site Information]\n\
             host_name = ce.example.org\n\
             sponsor = physics:60, astronomy:40\n\
             contact = Grid Admin\n\
             email = admin@example.org\n\
             city = Amsterdam\n\
             country = NL\n\
             latitude = 52.3\n\
             longitude = 4.9\n\
             {extra}"
        )
    }

    fn ce_ctx() -> Context {
        Context::new(true, "ce.example.org")
    }

    #[test]
    fn test_valid_section_passes() {
        let ini = IniConfig::parse(&full_section("")).unwrap();
        let mut module = SiteInformationModule::new();
        assert!(module.parse(&ini, &ce_ctx()).is_empty());
        assert!(module.validate(&ResolvedView::default(), &ce_ctx()).is_empty());
    }

    #[test]
    fn test_validation_collects_all_issues() {
        let ini = IniConfig::parse(
            "[Site Information]\n\
             host_name = my.domain.name\n\
             group = Nonsense\n\
             sponsor = physics:50\n\
             contact = Grid Admin\n\
             email = not-an-email\n\
             city = Amsterdam\n\
             country = NL\n\
             latitude = 95.0\n\
             longitude = 4.9\n",
        )
        .unwrap();

        let mut module = SiteInformationModule::new();
        assert!(module.parse(&ini, &ce_ctx()).is_empty());
        let issues = module.validate(&ResolvedView::default(), &ce_ctx());

        // Placeholder hostname, invalid group, short sponsor total, bad
        // email, and out-of-range latitude are all reported together.
        assert_eq!(issues.len(), 5);
    }

    #[test]
    fn test_missing_metadata_allowed_off_ce() {
        let ini = IniConfig::parse("[Site Information]\nhost_name = ce.example.org\n").unwrap();
        let ctx = Context::new(false, "worker.example.org");
        let mut module = SiteInformationModule::new();
        assert!(module.parse(&ini, &ctx).is_empty());
    }

    #[test]
    fn test_missing_metadata_rejected_on_ce() {
        let ini = IniConfig::parse("[Site Information]\nhost_name = ce.example.org\n").unwrap();
        let mut module = SiteInformationModule::new();
        let errors = module.parse(&ini, &ce_ctx());

        // All seven required metadata fields are reported in one pass.
        assert_eq!(errors.len(), 7);
        assert!(errors
            .iter()
            .all(|e| matches!(e, ConfigError::MissingMandatory { .. })));
    }

    #[test]
    fn test_resource_overrides_site_name_in_export() {
        let ini = IniConfig::parse(&full_section("site_name = Legacy Name\nresource = AGLT2\n")).unwrap();
        let mut module = SiteInformationModule::new();
        assert!(module.parse(&ini, &ce_ctx()).is_empty());

        let attributes = module.exported_attributes();
        let site_names: Vec<&String> = attributes
            .iter()
            .filter(|(k, _)| k == "GRID_SITE_NAME")
            .map(|(_, v)| v)
            .collect();

        // Both are exported; the override comes later so it wins downstream.
        assert_eq!(site_names, vec!["Legacy Name", "AGLT2"]);
    }

    #[test]
    fn test_sponsor_without_percentage_counts_as_full() {
        let ini = IniConfig::parse(&full_section("sponsor = physics\n")).unwrap();
        let mut module = SiteInformationModule::new();
        assert!(module.parse(&ini, &ce_ctx()).is_empty());
        assert!(module.validate(&ResolvedView::default(), &ce_ctx()).is_empty());
    }
}
