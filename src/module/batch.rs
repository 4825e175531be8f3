//! Local batch-system modules (PBS, LSF, SLURM, HTCondor).
//!
//! One module implementation covers all four schedulers; a [`BatchSystem`]
//! value selects the section name and the job-manager identifier derived
//! during parse. At most one of these sections is usually active per host,
//! but the orchestrator does not enforce that.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, info};

use crate::config::{Context, IniConfig, OptionSpec, OptionValue};
use crate::error::{CollaboratorError, ConfigError};

use super::checks;
use super::{Applicability, ConfigModule, OptionSet, ResolvedView, ValidationIssue};

/// The batch schedulers a compute entry point can hand jobs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchSystem {
    /// Portable Batch System / Torque.
    Pbs,
    /// IBM Spectrum LSF.
    Lsf,
    /// SLURM workload manager.
    Slurm,
    /// HTCondor.
    HtCondor,
}

impl BatchSystem {
    /// Configuration section name for this scheduler.
    #[must_use]
    pub const fn section_name(self) -> &'static str {
        match self {
            Self::Pbs => "PBS",
            Self::Lsf => "LSF",
            Self::Slurm => "SLURM",
            Self::HtCondor => "HTCondor",
        }
    }

    /// Identifier handed to the gateway as the job manager name.
    #[must_use]
    pub const fn job_manager(self) -> &'static str {
        match self {
            Self::Pbs => "pbs",
            Self::Lsf => "lsf",
            Self::Slurm => "slurm",
            Self::HtCondor => "condor",
        }
    }
}

/// Configuration module for one local batch scheduler.
#[derive(Debug)]
pub struct BatchModule {
    system: BatchSystem,
    options: OptionSet,
    applicability: Applicability,
}

impl BatchModule {
    /// Creates the module for the given scheduler.
    #[must_use]
    pub fn new(system: BatchSystem) -> Self {
        Self {
            system,
            options: OptionSet::new(vec![
                OptionSpec::new("location").optional().default_str("/usr"),
                OptionSpec::new("server").optional(),
                // Derived during parse, never read from the section.
                OptionSpec::new("job_manager")
                    .optional()
                    .external("GRID_JOB_MANAGER"),
                OptionSpec::new("job_manager_home")
                    .optional()
                    .external("GRID_JOB_MANAGER_HOME"),
            ]),
            applicability: Applicability::Disabled,
        }
    }
}

impl ConfigModule for BatchModule {
    fn section_name(&self) -> &'static str {
        self.system.section_name()
    }

    fn applicability(&self) -> Applicability {
        self.applicability
    }

    fn depends_on(&self) -> &'static [&'static str] {
        &["Gateway"]
    }

    fn parse(&mut self, config: &IniConfig, ctx: &Context) -> Vec<ConfigError> {
        let section = self.system.section_name();
        self.applicability = Applicability::from_section(config, section);
        if !self.applicability.is_active() {
            debug!(section, "Section absent, disabled, or ignored");
            return Vec::new();
        }

        let errors = self.options.parse_section(config, section, ctx);
        if !errors.is_empty() {
            return errors;
        }

        // Derive the gateway-facing attributes from the resolved options.
        let home = self.options.str_value("location").to_string();
        self.options.set(
            "job_manager",
            OptionValue::Str(String::from(self.system.job_manager())),
        );
        self.options.set("job_manager_home", OptionValue::Str(home));
        Vec::new()
    }

    fn validate(&mut self, _view: &ResolvedView, _ctx: &Context) -> Vec<ValidationIssue> {
        if !self.applicability.is_active() {
            return Vec::new();
        }

        let section = self.system.section_name();
        let location = self.options.str_value("location");
        let mut issues = Vec::new();
        if !checks::valid_location(location) {
            issues.push(ValidationIssue::option(
                section,
                "location",
                format!("Given location is not present on the filesystem: {location}"),
            ));
        } else if !Path::new(location).join("bin").is_dir() {
            issues.push(ValidationIssue::option(
                section,
                "location",
                format!("Expected a bin/ directory under the install location: {location}/bin"),
            ));
        }

        let server = self.options.str_value("server");
        if !checks::blank(server) && !checks::valid_host_port(server) {
            issues.push(ValidationIssue::option(
                section,
                "server",
                format!("Scheduler server is not a valid host name: {server}"),
            ));
        }
        issues
    }

    fn apply(&mut self, view: &ResolvedView, _ctx: &Context) -> Result<(), CollaboratorError> {
        let section = self.system.section_name();
        if !self.applicability.is_active() {
            return Ok(());
        }
        if view.get_bool("Gateway", "htcondor_gateway_enabled", true) {
            info!(
                section,
                job_manager = self.system.job_manager(),
                "Batch system registered with the HTCondor gateway"
            );
        } else {
            info!(section, "Gateway disabled, leaving batch system unregistered");
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

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> Context {
        Context::new(true, "ce.example.org")
    }

    #[test]
    fn test_section_names_cover_all_schedulers() {
        assert_eq!(BatchSystem::Pbs.section_name(), "PBS");
        assert_eq!(BatchSystem::Lsf.section_name(), "LSF");
        assert_eq!(BatchSystem::Slurm.section_name(), "SLURM");
        assert_eq!(BatchSystem::HtCondor.section_name(), "HTCondor");
    }

    #[test]
    fn test_parse_derives_job_manager_attributes() {
        let ini = IniConfig::parse("[SLURM]\nenabled = true\nlocation = /opt/slurm\n").unwrap();
        let mut module = BatchModule::new(BatchSystem::Slurm);
        assert!(module.parse(&ini, &ctx()).is_empty());

        let exported = module.exported_attributes();
        assert!(exported.contains(&(String::from("GRID_JOB_MANAGER"), String::from("slurm"))));
        assert!(exported.contains(&(
            String::from("GRID_JOB_MANAGER_HOME"),
            String::from("/opt/slurm")
        )));
    }

    #[test]
    fn test_htcondor_maps_to_condor_job_manager() {
        let ini = IniConfig::parse("[HTCondor]\nenabled = true\n").unwrap();
        let mut module = BatchModule::new(BatchSystem::HtCondor);
        assert!(module.parse(&ini, &ctx()).is_empty());
        assert_eq!(
            module.resolved_options().get("job_manager").unwrap().to_string(),
            "condor"
        );
    }

    #[test]
    fn test_missing_location_is_a_validation_issue() {
        let ini =
            IniConfig::parse("[PBS]\nenabled = true\nlocation = /nonexistent/pbs\n").unwrap();
        let mut module = BatchModule::new(BatchSystem::Pbs);
        assert!(module.parse(&ini, &ctx()).is_empty());
        let issues = module.validate(&ResolvedView::default(), &ctx());
        assert_eq!(issues.len(), 1);
        assert!(issues[0].message.contains("/nonexistent/pbs"));
    }

    #[test]
    fn test_disabled_section_skips_validation() {
        let ini = IniConfig::parse("[LSF]\nenabled = false\nlocation = /nowhere\n").unwrap();
        let mut module = BatchModule::new(BatchSystem::Lsf);
        assert!(module.parse(&ini, &ctx()).is_empty());
        assert!(module.validate(&ResolvedView::default(), &ctx()).is_empty());
        assert!(module.exported_attributes().is_empty());
    }

    #[test]
    fn test_bad_server_host_is_a_validation_issue() {
        let ini =
            IniConfig::parse("[SLURM]\nenabled = true\nlocation = /usr\nserver = not a host\n")
                .unwrap();
        let mut module = BatchModule::new(BatchSystem::Slurm);
        assert!(module.parse(&ini, &ctx()).is_empty());
        let issues = module.validate(&ResolvedView::default(), &ctx());
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].option.as_deref(), Some("server"));
    }

    #[test]
    fn test_server_host_accepted_when_well_formed() {
        let ini =
            IniConfig::parse("[SLURM]\nenabled = true\nlocation = /usr\nserver = slurm.example.org\n")
                .unwrap();
        let mut module = BatchModule::new(BatchSystem::Slurm);
        assert!(module.parse(&ini, &ctx()).is_empty());
        assert!(module.validate(&ResolvedView::default(), &ctx()).is_empty());
    }

    #[test]
    fn test_depends_on_names_gateway() {
        let module = BatchModule::new(BatchSystem::Pbs);
        assert_eq!(module.depends_on(), ["Gateway"]);
    }
}
