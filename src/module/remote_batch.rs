//! Remote batch-system module.
//!
//! Configures job submission to a batch cluster reachable over SSH rather
//! than a locally installed scheduler. Apply is the only module stage with
//! real side effects in this crate: for every local user it stages the SSH
//! key through the credential collaborator and then runs the remote
//! installer against the endpoint.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use tracing::{debug, info};

use crate::config::{Context, IniConfig, OptionSpec, ValueKind};
use crate::error::{CollaboratorError, ConfigError};
use crate::external::{
    CredentialStager, FileCredentialStager, ProcessInstaller, RemoteInstaller,
};

use super::checks;
use super::{Applicability, ConfigModule, OptionSet, ResolvedView, ValidationIssue};

const SECTION: &str = "Remote Batch";

/// Batch-system kinds the remote installer understands.
const SUPPORTED_BATCH: [&str; 5] = ["pbs", "lsf", "sge", "condor", "slurm"];

/// Configuration module for SSH-reachable remote batch clusters.
pub struct RemoteBatchModule {
    options: OptionSet,
    applicability: Applicability,
    installer: Box<dyn RemoteInstaller>,
    stager: Box<dyn CredentialStager>,
}

impl fmt::Debug for RemoteBatchModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteBatchModule")
            .field("options", &self.options)
            .field("applicability", &self.applicability)
            .finish_non_exhaustive()
    }
}

impl Default for RemoteBatchModule {
    fn default() -> Self {
        Self::new(
            Box::new(ProcessInstaller::default()),
            Box::new(FileCredentialStager::default()),
        )
    }
}

impl RemoteBatchModule {
    /// Creates the module with the given collaborators.
    #[must_use]
    pub fn new(installer: Box<dyn RemoteInstaller>, stager: Box<dyn CredentialStager>) -> Self {
        Self {
            options: OptionSet::new(vec![
                OptionSpec::new("endpoint"),
                OptionSpec::new("batch"),
                OptionSpec::new("users").kind(ValueKind::List),
                OptionSpec::new("ssh_key"),
                OptionSpec::new("max_jobs")
                    .optional()
                    .kind(ValueKind::Int)
                    .default_value(crate::config::OptionValue::Int(1000)),
            ]),
            applicability: Applicability::Disabled,
            installer,
            stager,
        }
    }
}

impl ConfigModule for RemoteBatchModule {
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

        let endpoint = self.options.str_value("endpoint");
        match endpoint.split_once('@') {
            Some((user, host)) if !user.is_empty() && checks::valid_domain(host) => {}
            _ => issues.push(ValidationIssue::option(
                SECTION,
                "endpoint",
                format!("Endpoint must look like user@host.domain, got: {endpoint}"),
            )),
        }

        let batch = self.options.str_value("batch");
        if !SUPPORTED_BATCH.contains(&batch.to_lowercase().as_str()) {
            issues.push(ValidationIssue::option(
                SECTION,
                "batch",
                format!(
                    "Unsupported batch system {batch}; must be one of {}",
                    SUPPORTED_BATCH.join(", ")
                ),
            ));
        }

        let users = self.options.list_value("users");
        if users.iter().any(|u| u.is_empty()) {
            issues.push(ValidationIssue::option(
                SECTION,
                "users",
                "User list contains an empty entry".to_string(),
            ));
        }

        let ssh_key = self.options.str_value("ssh_key");
        if !checks::valid_file(ssh_key) {
            issues.push(ValidationIssue::option(
                SECTION,
                "ssh_key",
                format!("SSH key file not found: {ssh_key}"),
            ));
        }

        issues
    }

    fn apply(&mut self, _view: &ResolvedView, _ctx: &Context) -> Result<(), CollaboratorError> {
        if !self.applicability.is_active() {
            return Ok(());
        }

        let endpoint = self.options.str_value("endpoint").to_string();
        let batch = self.options.str_value("batch").to_lowercase();
        let ssh_key = self.options.str_value("ssh_key").to_string();
        let users = self.options.list_value("users").to_vec();

        for user in &users {
            let staged = self.stager.stage(Path::new(&ssh_key), user)?;
            debug!(user, key = %staged.display(), "Credential staged for remote submission");
            self.installer.install(&endpoint, &batch, user)?;
            info!(section = SECTION, user, endpoint, "Remote cluster registered");
        }
        Ok(())
    }

    fn resolved_options(&self) -> BTreeMap<String, crate::config::OptionValue> {
        self.options.snapshot()
    }

    fn exported_attributes(&self) -> Vec<(String, String)> {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use mockall::predicate::eq;

    use crate::external::{MockCredentialStager, MockRemoteInstaller};

    use super::*;

    fn ctx() -> Context {
        Context::new(true, "ce.example.org")
    }

    fn config_with_key(key_path: &str) -> IniConfig {
        IniConfig::parse(&format!(
            "[Remote Batch]\n\
             enabled = true\n\
             endpoint = grid@cluster.example.org\n\
             batch = slurm\n\
             users = alice, bob\n\
             ssh_key = {key_path}\n"
        ))
        .unwrap()
    }

    fn module_with(
        installer: MockRemoteInstaller,
        stager: MockCredentialStager,
    ) -> RemoteBatchModule {
        RemoteBatchModule::new(Box::new(installer), Box::new(stager))
    }

    #[test]
    fn test_valid_section_passes_validation() {
        let dir = tempfile::tempdir().unwrap();
        let key = dir.path().join("id_rsa");
        std::fs::write(&key, "key").unwrap();

        let mut module =
            module_with(MockRemoteInstaller::new(), MockCredentialStager::new());
        assert!(module
            .parse(&config_with_key(key.to_str().unwrap()), &ctx())
            .is_empty());
        assert!(module.validate(&ResolvedView::default(), &ctx()).is_empty());
    }

    #[test]
    fn test_validation_collects_every_problem() {
        let ini = IniConfig::parse(
            "[Remote Batch]\n\
             enabled = true\n\
             endpoint = not-an-endpoint\n\
             batch = torque\n\
             users = alice,,bob\n\
             ssh_key = /nonexistent/id_rsa\n",
        )
        .unwrap();
        let mut module =
            module_with(MockRemoteInstaller::new(), MockCredentialStager::new());
        assert!(module.parse(&ini, &ctx()).is_empty());
        let issues = module.validate(&ResolvedView::default(), &ctx());
        assert_eq!(issues.len(), 4);
    }

    #[test]
    fn test_missing_endpoint_is_a_parse_error() {
        let ini = IniConfig::parse(
            "[Remote Batch]\nenabled = true\nbatch = pbs\nusers = a\nssh_key = /k\n",
        )
        .unwrap();
        let mut module =
            module_with(MockRemoteInstaller::new(), MockCredentialStager::new());
        let errors = module.parse(&ini, &ctx());
        assert_eq!(errors.len(), 1);
        assert!(
            matches!(errors[0], ConfigError::MissingMandatory { ref name } if name == "endpoint")
        );
    }

    #[test]
    fn test_apply_stages_and_installs_per_user() {
        let mut stager = MockCredentialStager::new();
        stager
            .expect_stage()
            .times(2)
            .returning(|_, user| Ok(PathBuf::from(format!("/home/{user}/.credentials/id_rsa"))));

        let mut installer = MockRemoteInstaller::new();
        installer
            .expect_install()
            .with(eq("grid@cluster.example.org"), eq("slurm"), eq("alice"))
            .times(1)
            .returning(|_, _, _| Ok(()));
        installer
            .expect_install()
            .with(eq("grid@cluster.example.org"), eq("slurm"), eq("bob"))
            .times(1)
            .returning(|_, _, _| Ok(()));

        let mut module = module_with(installer, stager);
        assert!(module.parse(&config_with_key("/k"), &ctx()).is_empty());
        module.apply(&ResolvedView::default(), &ctx()).unwrap();
    }

    #[test]
    fn test_apply_stops_on_installer_failure() {
        let mut stager = MockCredentialStager::new();
        stager
            .expect_stage()
            .times(1)
            .returning(|_, _| Ok(PathBuf::from("/tmp/key")));

        let mut installer = MockRemoteInstaller::new();
        installer.expect_install().times(1).returning(|_, _, _| {
            Err(CollaboratorError::command_failed(
                "/usr/bin/cluster-register",
                "exit status: 1",
                "",
                "connection refused",
            ))
        });

        let mut module = module_with(installer, stager);
        assert!(module.parse(&config_with_key("/k"), &ctx()).is_empty());
        let err = module.apply(&ResolvedView::default(), &ctx()).unwrap_err();
        assert!(matches!(err, CollaboratorError::CommandFailed { .. }));
    }
}
