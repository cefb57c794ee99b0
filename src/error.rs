//! Domain errors that callers need to tell apart

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by subsync operations
#[derive(Error, Debug)]
pub enum SubsyncError {
    #[error("Manifest not found at {0:?}. Run `subsync export` first")]
    MissingManifest(PathBuf),

    #[error("Repository {0} appears more than once in the manifest")]
    DuplicateRepository(String),

    #[error("Unrecognized status {status:?} for {repo}")]
    UnrecognizedStatus { repo: String, status: String },

    #[error("{user} is not a member of the {org} organization")]
    NotOrgMember { user: String, org: String },

    #[error("No organization configured. Set github.organization or pass --org")]
    OrganizationNotConfigured,

    #[error("{0} repositories failed to update")]
    UpdateFailures(usize),
}
