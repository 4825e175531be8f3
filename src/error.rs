//! Error types for the gridconf configuration system.
//!
//! This module provides the error hierarchy for all stages of the
//! configuration lifecycle: input parsing, option resolution, orchestration,
//! and apply-stage invocations of external tools.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for the gridconf configuration system.
#[derive(Debug, Error)]
pub enum GridConfError {
    /// Configuration parsing and option-resolution errors.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Orchestration-level errors (fatal to the whole run).
    #[error("Orchestration error: {0}")]
    Orchestration(#[from] OrchestrationError),

    /// External-collaborator errors raised during the apply stage.
    #[error("Collaborator error: {0}")]
    Collaborator(#[from] CollaboratorError),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Configuration parsing and option-resolution errors.
///
/// These are raised while parsing a single module's section and are collected
/// against that module; they never abort the run for sibling modules.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file was not found.
    #[error("Configuration file not found: {}", path.display())]
    FileNotFound {
        /// Path to the missing file.
        path: PathBuf,
    },

    /// The INI input is structurally malformed.
    #[error("Malformed configuration at line {line}: {message}")]
    Syntax {
        /// One-based line number in the input.
        line: usize,
        /// Description of the problem.
        message: String,
    },

    /// A grouped-list value could not be parsed.
    ///
    /// Carries the full original input and the unconsumed remainder so the
    /// operator can see exactly where parsing stopped.
    #[error("Syntax error in parenthesized list {input:?}: leftover input {remainder:?}")]
    ListSyntax {
        /// The full original input text.
        input: String,
        /// The unconsumed remainder at the point of failure.
        remainder: String,
    },

    /// A mandatory option was not supplied.
    #[error("Mandatory setting '{name}' is missing")]
    MissingMandatory {
        /// Name of the missing option.
        name: String,
    },

    /// A supplied value could not be converted to the declared type.
    #[error("Setting '{name}' has invalid value {raw:?}: expected {expected}")]
    TypeMismatch {
        /// Name of the option.
        name: String,
        /// The raw text that failed conversion.
        raw: String,
        /// The expected value type.
        expected: String,
    },
}

/// Orchestration-level errors.
///
/// These indicate a structural problem with the module registry itself; no
/// partial result is meaningful, so they abort the entire run and no
/// attribute file is written.
#[derive(Debug, Error)]
pub enum OrchestrationError {
    /// A module depends on another module that is not registered.
    #[error("Module '{module}' requires '{requires}', which is not in the registry")]
    MissingDependency {
        /// Section name of the dependent module.
        module: String,
        /// Section name of the missing dependency.
        requires: String,
    },

    /// Two registered modules claim the same configuration section.
    #[error("Duplicate module registered for section '{section}'")]
    DuplicateSection {
        /// The contested section name.
        section: String,
    },
}

/// Errors from external collaborators invoked during the apply stage.
///
/// Always terminal for the invoking module; the core never retries. Retry
/// policy, if any, belongs to the collaborator itself.
#[derive(Debug, Error)]
pub enum CollaboratorError {
    /// An external command ran but exited unsuccessfully.
    #[error("{program} failed with {status}\nstdout:\n{stdout}\nstderr:\n{stderr}")]
    CommandFailed {
        /// The program that was invoked.
        program: String,
        /// Exit status description.
        status: String,
        /// Captured standard output.
        stdout: String,
        /// Captured standard error.
        stderr: String,
    },

    /// An external command could not be launched at all.
    #[error("Failed to launch {program}: {message}")]
    Launch {
        /// The program that was invoked.
        program: String,
        /// Description of the launch failure.
        message: String,
    },

    /// Credential staging failed.
    #[error("Failed to stage credential {} for user '{user}': {message}", path.display())]
    Staging {
        /// Source path of the credential file.
        path: PathBuf,
        /// Target user identity.
        user: String,
        /// Description of the failure.
        message: String,
    },
}

/// Result type alias for gridconf operations.
pub type Result<T> = std::result::Result<T, GridConfError>;

impl GridConfError {
    /// Creates a new internal error with the given message.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

impl ConfigError {
    /// Creates a syntax error for the given input line.
    #[must_use]
    pub fn syntax(line: usize, message: impl Into<String>) -> Self {
        Self::Syntax {
            line,
            message: message.into(),
        }
    }

    /// Creates a missing-mandatory error for the named option.
    #[must_use]
    pub fn missing(name: impl Into<String>) -> Self {
        Self::MissingMandatory { name: name.into() }
    }

    /// Creates a type-mismatch error for the named option.
    #[must_use]
    pub fn type_mismatch(
        name: impl Into<String>,
        raw: impl Into<String>,
        expected: impl Into<String>,
    ) -> Self {
        Self::TypeMismatch {
            name: name.into(),
            raw: raw.into(),
            expected: expected.into(),
        }
    }
}

impl CollaboratorError {
    /// Creates a command-failure error with captured output.
    #[must_use]
    pub fn command_failed(
        program: impl Into<String>,
        status: impl Into<String>,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
    ) -> Self {
        Self::CommandFailed {
            program: program.into(),
            status: status.into(),
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_syntax_error_reports_remainder() {
        let err = ConfigError::ListSyntax {
            input: String::from("(a,b), c"),
            remainder: String::from(", c"),
        };
        let message = err.to_string();
        assert!(message.contains("(a,b), c"));
        assert!(message.contains(", c"));
    }

    #[test]
    fn test_type_mismatch_names_expected_type() {
        let err = ConfigError::type_mismatch("latitude", "north", "float");
        assert!(err.to_string().contains("latitude"));
        assert!(err.to_string().contains("float"));
    }
}
