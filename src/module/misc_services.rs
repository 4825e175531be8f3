//! Miscellaneous services module.
//!
//! Covers the grab-bag of site services that do not warrant a module of
//! their own: the mapping method used to authorize grid identities, and
//! optionally re-homing the host certificate pair for a service account
//! that cannot read the originals.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use tracing::{debug, info, warn};

use crate::config::{Context, IniConfig, OptionSpec, OptionValue, ValueKind};
use crate::error::{CollaboratorError, ConfigError};
use crate::external::{CredentialStager, FileCredentialStager};

use super::checks;
use super::{Applicability, ConfigModule, OptionSet, ResolvedView, ValidationIssue};

const SECTION: &str = "Misc Services";

/// Identity-mapping methods the authorization layer supports.
const VALID_AUTH_METHODS: [&str; 4] = ["gridmap", "local-gridmap", "xacml", "vomsmap"];

const DEFAULT_HOST_CERT: &str = "/etc/grid-security/hostcert.pem";
const DEFAULT_HOST_KEY: &str = "/etc/grid-security/hostkey.pem";

/// Configuration module for miscellaneous site services.
pub struct MiscServicesModule {
    options: OptionSet,
    applicability: Applicability,
    stager: Box<dyn CredentialStager>,
}

impl fmt::Debug for MiscServicesModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiscServicesModule")
            .field("options", &self.options)
            .field("applicability", &self.applicability)
            .finish_non_exhaustive()
    }
}

impl Default for MiscServicesModule {
    fn default() -> Self {
        Self::new(Box::new(FileCredentialStager::default()))
    }
}

impl MiscServicesModule {
    /// Creates the module with the given credential collaborator.
    #[must_use]
    pub fn new(stager: Box<dyn CredentialStager>) -> Self {
        Self {
            options: OptionSet::new(vec![
                OptionSpec::new("authorization_method")
                    .optional()
                    .default_str("vomsmap")
                    .external("GRID_AUTH_METHOD"),
                OptionSpec::new("gums_host").optional().default_str(""),
                OptionSpec::new("copy_host_certs")
                    .optional()
                    .kind(ValueKind::Bool)
                    .default_value(OptionValue::Bool(false)),
                OptionSpec::new("service_user")
                    .optional()
                    .default_str("grid-services"),
                OptionSpec::new("host_cert")
                    .optional()
                    .default_str(DEFAULT_HOST_CERT),
                OptionSpec::new("host_key")
                    .optional()
                    .default_str(DEFAULT_HOST_KEY),
            ]),
            applicability: Applicability::Disabled,
            stager,
        }
    }
}

impl ConfigModule for MiscServicesModule {
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

        let method = self.options.str_value("authorization_method");
        if !VALID_AUTH_METHODS.contains(&method) {
            issues.push(ValidationIssue::option(
                SECTION,
                "authorization_method",
                format!(
                    "Setting is not one of: {}, got {method}",
                    VALID_AUTH_METHODS.join(", ")
                ),
            ));
        }

        if method == "xacml" {
            warn!(
                section = SECTION,
                option = "authorization_method",
                "xacml mapping via a GUMS host is deprecated; migrate to vomsmap"
            );
            let gums_host = self.options.str_value("gums_host");
            if checks::blank(gums_host) {
                issues.push(ValidationIssue::option(
                    SECTION,
                    "gums_host",
                    "A GUMS host is required when authorization_method is xacml".to_string(),
                ));
            } else if !checks::valid_domain(gums_host) {
                issues.push(ValidationIssue::option(
                    SECTION,
                    "gums_host",
                    format!("GUMS host is not a valid domain name: {gums_host}"),
                ));
            }
        }

        if self.options.bool_value("copy_host_certs") {
            for option in ["host_cert", "host_key"] {
                let path = self.options.str_value(option);
                if !checks::valid_file(path) {
                    issues.push(ValidationIssue::option(
                        SECTION,
                        option,
                        format!("Certificate file not found: {path}"),
                    ));
                }
            }
        }

        issues
    }

    fn apply(&mut self, _view: &ResolvedView, _ctx: &Context) -> Result<(), CollaboratorError> {
        if !self.applicability.is_active() {
            return Ok(());
        }
        if !self.options.bool_value("copy_host_certs") {
            debug!(section = SECTION, "Host certificate copying disabled");
            return Ok(());
        }

        let user = self.options.str_value("service_user").to_string();
        for option in ["host_cert", "host_key"] {
            let source = self.options.str_value(option).to_string();
            let staged = self.stager.stage(Path::new(&source), &user)?;
            info!(section = SECTION, user, file = %staged.display(), "Host credential staged");
        }
        Ok(())
    }

    fn resolved_options(&self) -> BTreeMap<String, OptionValue> {
        self.options.snapshot()
    }

    fn exported_attributes(&self) -> Vec<(String, String)> {
        if !self.applicability.is_active() {
            return Vec::new();
        }
        self.options.exported()
    }
}
