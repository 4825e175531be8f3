//! Run orchestration across the module registry.
//!
//! The orchestrator owns the fixed-precedence module registry and drives
//! every module through the lifecycle with strict phase barriers: all parses
//! complete before any validate runs, and all validates complete before any
//! apply. A failing module is recorded and skipped for the rest of the run;
//! its siblings continue, so one bad section never hides problems in the
//! others.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::config::{Context, IniConfig};
use crate::error::{GridConfError, OrchestrationError};
use crate::export::{self, AttributeSet};
use crate::module::{
    Applicability, BatchModule, BatchSystem, CacheProxyModule, ConfigModule, GatewayModule,
    InstallLocationsModule, MiscServicesModule, ModuleState, MonitoringModule, RemoteBatchModule,
    ResolvedView, SiteInformationModule, ValidationIssue,
};

/// Outcome of one orchestrated run.
#[derive(Debug, Serialize)]
pub struct OverallResult {
    /// Final lifecycle state of every registered module, by section name.
    pub per_module: BTreeMap<String, ModuleState>,
    /// The merged external-attribute set (empty when the run failed).
    pub attributes: AttributeSet,
    /// Every validation issue collected across all modules.
    pub issues: Vec<ValidationIssue>,
    /// True when no module finished in the `Failed` state.
    pub ok: bool,
}

/// Drives registered modules through parse, validate, apply, and export.
pub struct Orchestrator {
    modules: Vec<Box<dyn ConfigModule>>,
    states: Vec<ModuleState>,
}

impl Orchestrator {
    /// Creates an orchestrator with an empty registry.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            modules: Vec::new(),
            states: Vec::new(),
        }
    }

    /// Creates an orchestrator with every built-in module registered in
    /// precedence order.
    #[must_use]
    pub fn with_default_registry() -> Self {
        let mut orchestrator = Self::new();
        orchestrator.register(Box::new(InstallLocationsModule::new()));
        orchestrator.register(Box::new(SiteInformationModule::new()));
        orchestrator.register(Box::new(GatewayModule::new()));
        orchestrator.register(Box::new(CacheProxyModule::new()));
        orchestrator.register(Box::new(BatchModule::new(BatchSystem::Pbs)));
        orchestrator.register(Box::new(BatchModule::new(BatchSystem::Lsf)));
        orchestrator.register(Box::new(BatchModule::new(BatchSystem::Slurm)));
        orchestrator.register(Box::new(BatchModule::new(BatchSystem::HtCondor)));
        orchestrator.register(Box::new(RemoteBatchModule::default()));
        orchestrator.register(Box::new(MiscServicesModule::default()));
        orchestrator.register(Box::new(MonitoringModule::default()));
        orchestrator
    }

    /// Adds a module to the registry. Registration order is precedence
    /// order for attribute export.
    pub fn register(&mut self, module: Box<dyn ConfigModule>) {
        self.modules.push(module);
        self.states.push(ModuleState::New);
    }

    /// Runs the full lifecycle: parse, validate, apply, export.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestrationError::DuplicateSection`] or
    /// [`OrchestrationError::MissingDependency`] before any module runs.
    /// Per-module failures never surface here; they are recorded in the
    /// result's `per_module` map.
    pub fn run(
        &mut self,
        config: &IniConfig,
        ctx: &Context,
    ) -> Result<OverallResult, GridConfError> {
        self.execute(config, ctx, true)
    }

    /// Runs parse and validate only, leaving the system untouched.
    ///
    /// # Errors
    ///
    /// Same registry-level failures as [`Self::run`].
    pub fn check(
        &mut self,
        config: &IniConfig,
        ctx: &Context,
    ) -> Result<OverallResult, GridConfError> {
        self.execute(config, ctx, false)
    }

    fn execute(
        &mut self,
        config: &IniConfig,
        ctx: &Context,
        apply: bool,
    ) -> Result<OverallResult, GridConfError> {
        self.check_registry()?;

        let mut issues = Vec::new();

        self.parse_all(config, ctx, &mut issues);
        let view = self.build_view();
        self.validate_all(&view, ctx, &mut issues);
        if apply {
            self.apply_all(&view, ctx);
        }

        let ok = !self.states.contains(&ModuleState::Failed);
        let attributes = if ok && apply {
            export::export(&self.modules)
        } else {
            AttributeSet::new()
        };

        let per_module: BTreeMap<String, ModuleState> = self
            .modules
            .iter()
            .zip(&self.states)
            .map(|(module, state)| (module.section_name().to_string(), *state))
            .collect();

        if ok {
            info!(modules = self.modules.len(), "Run completed");
        } else {
            error!("Run completed with failed modules");
        }

        Ok(OverallResult {
            per_module,
            attributes,
            issues,
            ok,
        })
    }

    /// Rejects duplicate sections and unsatisfiable dependencies up front.
    fn check_registry(&self) -> Result<(), OrchestrationError> {
        let mut seen = BTreeMap::new();
        for module in &self.modules {
            if seen.insert(module.section_name(), ()).is_some() {
                return Err(OrchestrationError::DuplicateSection {
                    section: module.section_name().to_string(),
                });
            }
        }
        for module in &self.modules {
            for required in module.depends_on() {
                if !seen.contains_key(required) {
                    return Err(OrchestrationError::MissingDependency {
                        module: module.section_name().to_string(),
                        requires: (*required).to_string(),
                    });
                }
            }
        }
        Ok(())
    }

    fn parse_all(
        &mut self,
        config: &IniConfig,
        ctx: &Context,
        issues: &mut Vec<ValidationIssue>,
    ) {
        for (module, state) in self.modules.iter_mut().zip(&mut self.states) {
            let errors = module.parse(config, ctx);
            if errors.is_empty() {
                *state = ModuleState::Parsed;
                debug!(section = module.section_name(), "Parsed");
            } else {
                *state = ModuleState::Failed;
                for e in errors {
                    error!(section = module.section_name(), error = %e, "Parse failed");
                    issues.push(ValidationIssue::section(module.section_name(), e.to_string()));
                }
            }
        }
    }

    /// Snapshots every successfully parsed module's resolved options.
    fn build_view(&self) -> ResolvedView {
        let mut view = ResolvedView::default();
        for (module, state) in self.modules.iter().zip(&self.states) {
            if *state == ModuleState::Parsed {
                view.insert_section(module.section_name(), module.resolved_options());
            }
        }
        view
    }

    fn validate_all(
        &mut self,
        view: &ResolvedView,
        ctx: &Context,
        issues: &mut Vec<ValidationIssue>,
    ) {
        for (module, state) in self.modules.iter_mut().zip(&mut self.states) {
            if *state != ModuleState::Parsed {
                continue;
            }
            let found = module.validate(view, ctx);
            if found.is_empty() {
                *state = ModuleState::Validated;
            } else {
                *state = ModuleState::Failed;
                for issue in &found {
                    warn!(section = module.section_name(), "{issue}");
                }
                issues.extend(found);
            }
        }
    }

    fn apply_all(&mut self, view: &ResolvedView, ctx: &Context) {
        for (module, state) in self.modules.iter_mut().zip(&mut self.states) {
            if *state != ModuleState::Validated {
                continue;
            }
            // Disabled and ignored modules have nothing to apply but still
            // finish the lifecycle as trivial successes.
            if module.applicability() != Applicability::Active {
                *state = ModuleState::Configured;
                continue;
            }
            match module.apply(view, ctx) {
                Ok(()) => {
                    *state = ModuleState::Configured;
                    info!(section = module.section_name(), "Configured");
                }
                Err(e) => {
                    *state = ModuleState::Failed;
                    error!(section = module.section_name(), error = %e, "Apply failed");
                }
            }
        }
    }
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::attributes_digest;

    fn ctx() -> Context {
        Context::new(false, "host.example.org")
    }

    fn minimal_config() -> IniConfig {
        IniConfig::parse(
            "[Site Information]\n\
             enabled = true\n\
             host_name = ce.example.org\n\
             resource = GRID_EXAMPLE\n",
        )
        .unwrap()
    }

    #[test]
    fn test_run_with_minimal_config_succeeds() {
        let mut orchestrator = Orchestrator::with_default_registry();
        let result = orchestrator.run(&minimal_config(), &ctx()).unwrap();

        assert!(result.ok);
        assert_eq!(
            result.per_module.get("Site Information"),
            Some(&ModuleState::Configured)
        );
        // Always-on modules export even without their sections.
        assert_eq!(result.attributes.get("GRID_LOCATION").map(String::as_str), Some("/usr"));
        assert_eq!(
            result.attributes.get("PATH").map(String::as_str),
            Some("/bin:/usr/bin:/sbin:/usr/sbin")
        );
        assert_eq!(
            result.attributes.get("GRID_SITE_NAME").map(String::as_str),
            Some("GRID_EXAMPLE")
        );
    }

    #[test]
    fn test_failed_module_does_not_stop_siblings() {
        let config = IniConfig::parse(
            "[Site Information]\n\
             enabled = true\n\
             host_name = ce.example.org\n\
             [Cache Proxy]\n\
             enabled = true\n\
             location = squid.example.org:http\n",
        )
        .unwrap();

        let mut orchestrator = Orchestrator::with_default_registry();
        let result = orchestrator.run(&config, &ctx()).unwrap();

        assert!(!result.ok);
        assert_eq!(
            result.per_module.get("Cache Proxy"),
            Some(&ModuleState::Failed)
        );
        assert_eq!(
            result.per_module.get("Site Information"),
            Some(&ModuleState::Configured)
        );
        assert!(result.attributes.is_empty());
    }

    #[test]
    fn test_missing_mandatory_marks_module_failed() {
        let config = IniConfig::parse("[Site Information]\nenabled = true\n").unwrap();
        let mut orchestrator = Orchestrator::with_default_registry();
        let result = orchestrator.run(&config, &ctx()).unwrap();

        assert!(!result.ok);
        assert_eq!(
            result.per_module.get("Site Information"),
            Some(&ModuleState::Failed)
        );
    }

    #[test]
    fn test_parse_errors_surface_in_result_issues() {
        let config = IniConfig::parse(
            "[Site Information]\n\
             enabled = true\n\
             host_name = ce.example.org\n\
             [Remote Batch]\n\
             enabled = true\n",
        )
        .unwrap();
        let mut orchestrator = Orchestrator::with_default_registry();
        let result = orchestrator.run(&config, &ctx()).unwrap();

        assert!(!result.ok);
        assert_eq!(
            result.per_module.get("Remote Batch"),
            Some(&ModuleState::Failed)
        );

        // Every missing mandatory option is reported, not just the first.
        let remote: Vec<&ValidationIssue> = result
            .issues
            .iter()
            .filter(|i| i.section == "Remote Batch")
            .collect();
        assert_eq!(remote.len(), 4);
        for option in ["endpoint", "batch", "users", "ssh_key"] {
            assert!(
                remote.iter().any(|i| i.message.contains(option)),
                "no issue names {option}"
            );
        }
    }

    #[test]
    fn test_disabled_module_finishes_configured() {
        let config = IniConfig::parse(
            "[Site Information]\n\
             enabled = true\n\
             host_name = ce.example.org\n\
             [PBS]\n\
             enabled = false\n",
        )
        .unwrap();
        let mut orchestrator = Orchestrator::with_default_registry();
        let result = orchestrator.run(&config, &ctx()).unwrap();

        assert!(result.ok);
        assert_eq!(result.per_module.get("PBS"), Some(&ModuleState::Configured));
    }

    #[test]
    fn test_missing_dependency_is_fatal() {
        let mut orchestrator = Orchestrator::new();
        orchestrator.register(Box::new(BatchModule::new(BatchSystem::Pbs)));

        let err = orchestrator.run(&minimal_config(), &ctx()).unwrap_err();
        match err {
            GridConfError::Orchestration(OrchestrationError::MissingDependency {
                module,
                requires,
            }) => {
                assert_eq!(module, "PBS");
                assert_eq!(requires, "Gateway");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_duplicate_section_is_fatal() {
        let mut orchestrator = Orchestrator::new();
        orchestrator.register(Box::new(GatewayModule::new()));
        orchestrator.register(Box::new(GatewayModule::new()));

        let err = orchestrator.run(&minimal_config(), &ctx()).unwrap_err();
        assert!(matches!(
            err,
            GridConfError::Orchestration(OrchestrationError::DuplicateSection { ref section })
                if section == "Gateway"
        ));
    }

    #[test]
    fn test_check_mode_skips_apply_and_export() {
        let mut orchestrator = Orchestrator::with_default_registry();
        let result = orchestrator.check(&minimal_config(), &ctx()).unwrap();

        assert!(result.ok);
        assert_eq!(
            result.per_module.get("Site Information"),
            Some(&ModuleState::Validated)
        );
        assert!(result.attributes.is_empty());
    }

    #[test]
    fn test_identical_runs_export_identically() {
        let first = Orchestrator::with_default_registry()
            .run(&minimal_config(), &ctx())
            .unwrap();
        let second = Orchestrator::with_default_registry()
            .run(&minimal_config(), &ctx())
            .unwrap();

        assert_eq!(first.attributes, second.attributes);
        assert_eq!(
            attributes_digest(&first.attributes),
            attributes_digest(&second.attributes)
        );
    }
}
