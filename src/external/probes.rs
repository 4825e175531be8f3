//! Monitoring-probe control invocation.

use std::process::Command;

use tracing::{debug, error};

use crate::error::CollaboratorError;

/// Enables monitoring metrics for a host through the probe-control tool.
#[cfg_attr(test, mockall::automock)]
pub trait ProbeControl {
    /// Enables the given metrics for `host`, passing any extra
    /// `key=value` arguments through to the tool.
    ///
    /// Called once per logical host group; an empty metric list is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`CollaboratorError::CommandFailed`] with captured output
    /// for a non-zero exit, or [`CollaboratorError::Launch`] when the tool
    /// cannot be started.
    fn enable_metrics(
        &self,
        host: &str,
        metrics: &[String],
        args: &[(String, String)],
    ) -> Result<(), CollaboratorError>;
}

/// Process-backed probe control invoking the probe-control binary.
#[derive(Debug, Clone)]
pub struct ProcessProbeControl {
    program: String,
}

impl Default for ProcessProbeControl {
    fn default() -> Self {
        Self {
            program: String::from("/usr/bin/probe-control"),
        }
    }
}

impl ProcessProbeControl {
    /// Creates a probe control invoking the given program.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl ProbeControl for ProcessProbeControl {
    fn enable_metrics(
        &self,
        host: &str,
        metrics: &[String],
        args: &[(String, String)],
    ) -> Result<(), CollaboratorError> {
        if metrics.is_empty() {
            return Ok(());
        }

        debug!(host, metrics = metrics.len(), "Enabling monitoring metrics");

        let mut command = Command::new(&self.program);
        command.args(["-v0", "--enable", "--host", host]);
        for (key, value) in args {
            command.arg("--arg").arg(format!("{key}={value}"));
        }
        command.args(metrics);

        let output = command.output().map_err(|e| CollaboratorError::Launch {
            program: self.program.clone(),
            message: e.to_string(),
        })?;

        if output.status.success() {
            Ok(())
        } else {
            error!(host, status = %output.status, "Probe-control invocation failed");
            Err(CollaboratorError::command_failed(
                &self.program,
                output.status.to_string(),
                String::from_utf8_lossy(&output.stdout),
                String::from_utf8_lossy(&output.stderr),
            ))
        }
    }
}
