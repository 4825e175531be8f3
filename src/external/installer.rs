//! Remote batch-system installer invocation.

use std::process::Command;

use tracing::{debug, error};

use crate::error::CollaboratorError;

/// Installs and registers a remote batch cluster for a local user.
#[cfg_attr(test, mockall::automock)]
pub trait RemoteInstaller {
    /// Runs the cluster-registration tool for `endpoint` (in `user@host`
    /// form), the given batch-system kind, and the local operating identity.
    ///
    /// # Errors
    ///
    /// Returns [`CollaboratorError::CommandFailed`] with captured
    /// stdout/stderr for a non-zero exit, or [`CollaboratorError::Launch`]
    /// when the tool cannot be started.
    fn install(&self, endpoint: &str, batch: &str, user: &str) -> Result<(), CollaboratorError>;
}

/// Process-backed installer that invokes the cluster-registration binary.
#[derive(Debug, Clone)]
pub struct ProcessInstaller {
    program: String,
}

impl Default for ProcessInstaller {
    fn default() -> Self {
        Self {
            program: String::from("/usr/bin/cluster-register"),
        }
    }
}

impl ProcessInstaller {
    /// Creates an installer invoking the given program.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl RemoteInstaller for ProcessInstaller {
    fn install(&self, endpoint: &str, batch: &str, user: &str) -> Result<(), CollaboratorError> {
        debug!(endpoint, batch, user, "Running remote cluster registration");

        let output = Command::new(&self.program)
            .args(["--add", endpoint, batch, "--as-user", user])
            .output()
            .map_err(|e| CollaboratorError::Launch {
                program: self.program.clone(),
                message: e.to_string(),
            })?;

        if output.status.success() {
            debug!(endpoint, "Remote cluster registration succeeded");
            Ok(())
        } else {
            error!(endpoint, status = %output.status, "Remote cluster registration failed");
            Err(CollaboratorError::command_failed(
                &self.program,
                output.status.to_string(),
                String::from_utf8_lossy(&output.stdout),
                String::from_utf8_lossy(&output.stderr),
            ))
        }
    }
}
