//! Configuration-module lifecycle framework.
//!
//! Every middleware subsystem is configured by one module implementing
//! [`ConfigModule`]: a named unit owning the declarative options of one
//! configuration section and driven through the three-stage lifecycle
//! parse → validate → apply by the orchestrator.
//!
//! Module kinds form a closed set; the orchestrator only ever sees the
//! trait, never a concrete kind.

mod batch;
mod cache_proxy;
mod checks;
mod gateway;
mod install_locations;
mod misc_services;
mod monitoring;
mod remote_batch;
mod site_info;

pub use batch::{BatchModule, BatchSystem};
pub use cache_proxy::CacheProxyModule;
pub use gateway::GatewayModule;
pub use install_locations::InstallLocationsModule;
pub use misc_services::MiscServicesModule;
pub use monitoring::{MetricCatalog, MonitoringModule};
pub use remote_batch::RemoteBatchModule;
pub use site_info::SiteInformationModule;

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use tracing::warn;

use crate::config::{Context, IniConfig, OptionSpec, OptionValue};
use crate::error::{CollaboratorError, ConfigError};

/// Lifecycle state of a module.
///
/// States move strictly forward; `Failed` is terminal and absorbing for the
/// module but never halts its siblings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ModuleState {
    /// Registered but not yet parsed.
    New,
    /// Section parsed and options resolved.
    Parsed,
    /// All validation rules passed (or stage trivially skipped).
    Validated,
    /// Side effects applied (or stage trivially skipped).
    Configured,
    /// A stage failed; no further stage runs for this module.
    Failed,
}

impl fmt::Display for ModuleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::New => "NEW",
            Self::Parsed => "PARSED",
            Self::Validated => "VALIDATED",
            Self::Configured => "CONFIGURED",
            Self::Failed => "FAILED",
        };
        write!(f, "{s}")
    }
}

/// Whether a module participates in the run.
///
/// This is expected control flow, not an error condition, so it is a plain
/// enum rather than anything on the error channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Applicability {
    /// Section present and enabled; all stages run.
    #[default]
    Active,
    /// Section absent or explicitly disabled; validate/apply are skipped
    /// and report success.
    Disabled,
    /// Section present but the operator asked to skip configuration;
    /// validation reports success and apply is skipped.
    Ignored,
}

impl Applicability {
    /// Derives applicability from a module's section.
    ///
    /// An absent section disables the module. A present section may carry an
    /// `enabled` key with the vocabulary `true`/`false`/`ignore`; absence of
    /// the key means enabled.
    #[must_use]
    pub fn from_section(config: &IniConfig, section: &str) -> Self {
        if !config.has_section(section) {
            return Self::Disabled;
        }
        match config.get(section, "enabled").map(str::to_ascii_lowercase).as_deref() {
            Some("false") | Some("no") | Some("0") => Self::Disabled,
            Some("ignore") => Self::Ignored,
            _ => Self::Active,
        }
    }

    /// True when all lifecycle stages should run.
    #[must_use]
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Active)
    }
}

/// One validation problem found by a module.
///
/// Validation is never fail-fast: a module collects every issue it finds in
/// one pass so the operator sees all problems at once.
#[derive(Debug, Clone, Serialize)]
pub struct ValidationIssue {
    /// Section the issue was found in.
    pub section: String,
    /// Option the issue relates to, if any.
    pub option: Option<String>,
    /// Human-readable description.
    pub message: String,
}

impl ValidationIssue {
    /// Creates an issue tied to a specific option.
    #[must_use]
    pub fn option(
        section: impl Into<String>,
        option: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            section: section.into(),
            option: Some(option.into()),
            message: message.into(),
        }
    }

    /// Creates a section-level issue.
    #[must_use]
    pub fn section(section: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            section: section.into(),
            option: None,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.option {
            Some(option) => write!(f, "[{}].{}: {}", self.section, option, self.message),
            None => write!(f, "[{}]: {}", self.section, self.message),
        }
    }
}

/// Read-only snapshot of every module's resolved options.
///
/// Built by the orchestrator after the parse phase; modules consult it during
/// validate/apply to read sibling configuration without holding a reference
/// into another module's state.
#[derive(Debug, Default, Clone)]
pub struct ResolvedView {
    sections: BTreeMap<String, BTreeMap<String, OptionValue>>,
}

impl ResolvedView {
    /// Records one module's resolved options under its section name.
    pub fn insert_section(
        &mut self,
        section: impl Into<String>,
        options: BTreeMap<String, OptionValue>,
    ) {
        self.sections.insert(section.into(), options);
    }

    /// Looks up a sibling module's resolved option.
    #[must_use]
    pub fn get(&self, section: &str, option: &str) -> Option<&OptionValue> {
        self.sections.get(section).and_then(|s| s.get(option))
    }

    /// Looks up a sibling boolean option, with a default for absent values.
    #[must_use]
    pub fn get_bool(&self, section: &str, option: &str, default: bool) -> bool {
        self.get(section, option).and_then(OptionValue::as_bool).unwrap_or(default)
    }
}

/// The shared lifecycle interface implemented by every module kind.
pub trait ConfigModule {
    /// The configuration section this module owns.
    fn section_name(&self) -> &'static str;

    /// Whether the module participates in this run; meaningful after parse.
    fn applicability(&self) -> Applicability;

    /// Sections of other modules this module reads during validate/apply.
    ///
    /// The orchestrator refuses to run if any named section has no
    /// registered module.
    fn depends_on(&self) -> &'static [&'static str] {
        &[]
    }

    /// Parses the module's section, resolving every option.
    ///
    /// An absent section is a valid outcome (the module becomes disabled),
    /// not an error. Resolution is never fail-fast: structural problems
    /// (missing mandatory options, type mismatches, malformed list values)
    /// are collected across the whole option table and returned together.
    /// An empty return means success.
    fn parse(&mut self, config: &IniConfig, ctx: &Context) -> Vec<ConfigError>;

    /// Checks all resolved options for consistency, collecting every issue.
    fn validate(&mut self, view: &ResolvedView, ctx: &Context) -> Vec<ValidationIssue>;

    /// Applies the configuration through external collaborators.
    ///
    /// # Errors
    ///
    /// Returns a [`CollaboratorError`] when an external invocation fails;
    /// the orchestrator marks the module `Failed` and continues with its
    /// siblings.
    fn apply(&mut self, view: &ResolvedView, ctx: &Context) -> Result<(), CollaboratorError>;

    /// The module's resolved options, for the cross-module snapshot.
    fn resolved_options(&self) -> BTreeMap<String, OptionValue>;

    /// External-attribute pairs this module contributes to the export step,
    /// in override order (later pairs win within the module).
    fn exported_attributes(&self) -> Vec<(String, String)>;
}

/// A module's option table: declared specs plus resolved values.
///
/// Shared by all module kinds; owns the common parse behavior (resolve every
/// declared option from the section, warn on unrecognized keys) and the
/// default attribute-export behavior.
#[derive(Debug, Default)]
pub struct OptionSet {
    specs: Vec<OptionSpec>,
    values: BTreeMap<String, OptionValue>,
}

impl OptionSet {
    /// Creates an option set from declared specs.
    #[must_use]
    pub fn new(specs: Vec<OptionSpec>) -> Self {
        Self {
            specs,
            values: BTreeMap::new(),
        }
    }

    /// Resolves every declared option from the given section.
    ///
    /// Resolution failures (missing mandatory values, type mismatches) are
    /// collected across the whole option table rather than stopping at the
    /// first one, so a section missing several settings reports all of them
    /// in one pass. Unknown keys in the section are reported with a warning,
    /// never an error; the `enabled` status key is always recognized.
    pub fn parse_section(
        &mut self,
        config: &IniConfig,
        section: &str,
        ctx: &Context,
    ) -> Vec<ConfigError> {
        let mut errors = Vec::new();
        for spec in &self.specs {
            let raw = config.get(section, &spec.name);
            match spec.resolve(raw, ctx) {
                Ok(value) => {
                    self.values.insert(spec.name.clone(), value);
                }
                Err(e) => errors.push(e),
            }
        }

        for key in config.section_keys(section) {
            if key == "enabled" || self.specs.iter().any(|s| s.name == key) {
                continue;
            }
            warn!(section, option = key, "Found unknown option");
        }

        errors
    }

    /// Looks up a resolved value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&OptionValue> {
        self.values.get(name)
    }

    /// Returns a resolved string value, or `""` when unresolved.
    #[must_use]
    pub fn str_value(&self, name: &str) -> &str {
        self.get(name).and_then(OptionValue::as_str).unwrap_or("")
    }

    /// Returns a resolved boolean value, or `false` when unresolved.
    #[must_use]
    pub fn bool_value(&self, name: &str) -> bool {
        self.get(name).and_then(OptionValue::as_bool).unwrap_or(false)
    }

    /// Returns a resolved flat-list value, or an empty slice when unresolved.
    #[must_use]
    pub fn list_value(&self, name: &str) -> &[String] {
        self.get(name).and_then(OptionValue::as_list).unwrap_or(&[])
    }

    /// Overwrites a resolved value.
    ///
    /// Used for derived defaulting and normalization between parse and
    /// validate; never called after the validate stage.
    pub fn set(&mut self, name: impl Into<String>, value: OptionValue) {
        self.values.insert(name.into(), value);
    }

    /// Clones the resolved values for the cross-module snapshot.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, OptionValue> {
        self.values.clone()
    }

    /// Default attribute export: every option with a declared external name
    /// and a non-blank resolved value, in declaration order.
    #[must_use]
    pub fn exported(&self) -> Vec<(String, String)> {
        self.specs
            .iter()
            .filter_map(|spec| {
                let external = spec.external_name.as_ref()?;
                let value = self.values.get(&spec.name)?;
                if value.is_blank() {
                    return None;
                }
                Some((external.clone(), value.to_string()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Requirement, ValueKind};

    fn ctx() -> Context {
        Context::new(false, "host.example.org")
    }

    #[test]
    fn test_applicability_from_section() {
        let ini = IniConfig::parse(
            "[A]\nx = 1\n[B]\nenabled = false\n[C]\nenabled = ignore\n[D]\nenabled = true\n",
        )
        .unwrap();

        assert_eq!(Applicability::from_section(&ini, "A"), Applicability::Active);
        assert_eq!(Applicability::from_section(&ini, "B"), Applicability::Disabled);
        assert_eq!(Applicability::from_section(&ini, "C"), Applicability::Ignored);
        assert_eq!(Applicability::from_section(&ini, "D"), Applicability::Active);
        assert_eq!(Applicability::from_section(&ini, "Missing"), Applicability::Disabled);
    }

    #[test]
    fn test_option_set_resolves_defaults_and_values() {
        let ini = IniConfig::parse("[PBS]\nlocation = /opt/pbs\n").unwrap();
        let mut options = OptionSet::new(vec![
            OptionSpec::new("location").optional().default_str("/usr"),
            OptionSpec::new("server").optional().default_str("batch.example.org"),
        ]);

        assert!(options.parse_section(&ini, "PBS", &ctx()).is_empty());
        assert_eq!(options.str_value("location"), "/opt/pbs");
        assert_eq!(options.str_value("server"), "batch.example.org");
    }

    #[test]
    fn test_option_set_collects_every_resolution_failure() {
        // One missing mandatory option and one type mismatch: both must be
        // reported together, not just the first.
        let ini = IniConfig::parse("[Remote Batch]\nbatch = pbs\nmax_jobs = lots\n").unwrap();
        let mut options = OptionSet::new(vec![
            OptionSpec::new("endpoint"),
            OptionSpec::new("users").kind(ValueKind::List),
            OptionSpec::new("max_jobs").optional().kind(ValueKind::Int),
        ]);

        let errors = options.parse_section(&ini, "Remote Batch", &ctx());
        assert_eq!(errors.len(), 3);
        assert!(errors
            .iter()
            .any(|e| matches!(e, ConfigError::MissingMandatory { name } if name == "endpoint")));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ConfigError::MissingMandatory { name } if name == "users")));
        assert!(errors
            .iter()
            .any(|e| matches!(e, ConfigError::TypeMismatch { name, .. } if name == "max_jobs")));
    }

    #[test]
    fn test_exported_skips_blank_and_unmapped() {
        let ini = IniConfig::parse("[S]\nresource = AGLT2\n").unwrap();
        let mut options = OptionSet::new(vec![
            OptionSpec::new("resource").optional().external("GRID_SITE_NAME"),
            OptionSpec::new("site_name")
                .optional()
                .default_str("")
                .external("GRID_SITE_NAME"),
            OptionSpec::new("internal").optional().default_str("x"),
        ]);
        assert!(options.parse_section(&ini, "S", &ctx()).is_empty());

        let exported = options.exported();
        assert_eq!(
            exported,
            vec![(String::from("GRID_SITE_NAME"), String::from("AGLT2"))]
        );
    }

    #[test]
    fn test_mandatory_on_ce_round_trip_through_option_set() {
        let ini = IniConfig::parse("[S]\n").unwrap();
        let specs = || {
            vec![OptionSpec::new("contact")
                .requirement(Requirement::MandatoryOnCe)
                .kind(ValueKind::Str)
                .default_str("")]
        };

        let mut worker = OptionSet::new(specs());
        assert!(worker
            .parse_section(&ini, "S", &Context::new(false, "h"))
            .is_empty());

        let mut ce = OptionSet::new(specs());
        assert!(!ce.parse_section(&ini, "S", &Context::new(true, "h")).is_empty());
    }
}
