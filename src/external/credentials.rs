//! Credential-file staging.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::CollaboratorError;

/// Copies and re-homes a credential file for a target user identity.
#[cfg_attr(test, mockall::automock)]
pub trait CredentialStager {
    /// Stages `source` into the user's credential directory with
    /// restrictive permissions, returning the staged path.
    ///
    /// # Errors
    ///
    /// Returns [`CollaboratorError::Staging`] when the copy or permission
    /// change fails.
    fn stage(&self, source: &Path, user: &str) -> Result<PathBuf, CollaboratorError>;
}

/// Filesystem-backed stager placing keys under a per-user directory.
#[derive(Debug, Clone)]
pub struct FileCredentialStager {
    /// Root under which per-user credential directories live.
    root: PathBuf,
}

impl Default for FileCredentialStager {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/home"),
        }
    }
}

impl FileCredentialStager {
    /// Creates a stager rooted at the given directory.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn staging_error(
        source: &Path,
        user: &str,
        message: impl Into<String>,
    ) -> CollaboratorError {
        CollaboratorError::Staging {
            path: source.to_path_buf(),
            user: user.to_string(),
            message: message.into(),
        }
    }
}

impl CredentialStager for FileCredentialStager {
    fn stage(&self, source: &Path, user: &str) -> Result<PathBuf, CollaboratorError> {
        let file_name = source
            .file_name()
            .ok_or_else(|| Self::staging_error(source, user, "Source has no file name"))?;
        let target_dir = self.root.join(user).join(".credentials");
        let target = target_dir.join(file_name);

        debug!(source = %source.display(), target = %target.display(), "Staging credential");

        std::fs::create_dir_all(&target_dir)
            .map_err(|e| Self::staging_error(source, user, e.to_string()))?;
        std::fs::copy(source, &target)
            .map_err(|e| Self::staging_error(source, user, e.to_string()))?;

        // Credential files must not be group- or world-readable.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&target, std::fs::Permissions::from_mode(0o600))
                .map_err(|e| Self::staging_error(source, user, e.to_string()))?;
        }

        Ok(target)
    }
}
