//! External collaborators invoked during the apply stage.
//!
//! The core never shells out directly: every side effect goes through one of
//! the traits defined here, so modules can be exercised against mocks and
//! the real binaries stay at the edge of the system. The core treats any
//! failure as terminal for the invoking module and never retries; retry
//! policy belongs to the collaborator.

mod credentials;
mod installer;
mod probes;

pub use credentials::{CredentialStager, FileCredentialStager};
pub use installer::{ProcessInstaller, RemoteInstaller};
pub use probes::{ProbeControl, ProcessProbeControl};

#[cfg(test)]
pub use credentials::MockCredentialStager;
#[cfg(test)]
pub use installer::MockRemoteInstaller;
#[cfg(test)]
pub use probes::MockProbeControl;
