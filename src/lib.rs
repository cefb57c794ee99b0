//! subsync - GitHub notification subscriptions as a manifest
//!
//! subsync exports the viewer's watch state for every repository of an
//! organization into an editable JSON manifest and pushes edits back.
//!
//! ## Core Features
//!
//! - **Export**: Snapshot remote subscription state, flagging repositories new since the last export
//! - **Update**: Reconcile remote state with the manifest, one repository at a time
//! - **Unsubscribe-new**: Opt out of everything that appeared since the last export
//! - **Review**: Sorted, column-aligned listing of the manifest
//!
//! ## Modules
//!
//! - [`config`]: Configuration management and parsing
//! - [`manifest`]: The manifest file and its records
//! - [`remote`]: Platform capabilities and the paginated remote fetch
//! - [`github`]: GitHub API integration and authentication
//! - [`reconcile`]: Export, update and unsubscribe-new
//! - [`review`]: Manifest listing

pub mod config;
pub mod error;
pub mod github;
pub mod manifest;
pub mod reconcile;
pub mod remote;
pub mod review;

pub use config::{Config, FailurePolicy};
pub use error::SubsyncError;
pub use github::GitHubClient;
pub use manifest::{Manifest, Status, SubscriptionRecord};
pub use reconcile::{ExportSummary, Mutation, Progress, UpdateOptions, UpdateSummary};
pub use remote::{fetch_remote_state, RemoteState, RemoteSubscription, SubscriptionApi};
