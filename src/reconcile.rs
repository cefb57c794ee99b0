//! Reconciliation engine
//!
//! Computes the difference between the manifest (desired state) and the
//! freshly fetched remote state, and applies it one repository at a time.

use anyhow::Result;
use tracing::{debug, error, info};

use crate::config::FailurePolicy;
use crate::error::SubsyncError;
use crate::manifest::{Manifest, Status, SubscriptionRecord};
use crate::remote::{RemoteState, SubscriptionApi};

/// Outcome of an export
#[derive(Debug, Clone)]
pub struct ExportSummary {
    pub manifest: Manifest,
    /// Repositories that were not in the previous manifest
    pub added: Vec<String>,
    /// Repositories of the previous manifest no longer reported remotely
    pub dropped: Vec<String>,
}

/// Build a fresh manifest from the remote state
///
/// Remote decides which repositories exist and their status. The previous
/// manifest only contributes its key set, to mark records as new.
pub fn export(previous: &Manifest, remote: &RemoteState) -> ExportSummary {
    let known = previous.repos();

    let records: Vec<SubscriptionRecord> = remote
        .subscriptions
        .iter()
        .map(|sub| {
            SubscriptionRecord::new(
                sub.repo.clone(),
                sub.status.clone(),
                !known.contains(sub.repo.as_str()),
            )
        })
        .collect();

    let added = records
        .iter()
        .filter(|r| r.is_new)
        .map(|r| r.repo.clone())
        .collect();

    let current = remote.by_repo();
    let dropped: Vec<String> = previous
        .records
        .iter()
        .filter(|r| !current.contains_key(r.repo.as_str()))
        .map(|r| r.repo.clone())
        .collect();

    for repo in &dropped {
        info!("Dropping {} (no longer listed remotely)", repo);
    }

    ExportSummary {
        manifest: Manifest::new(records),
        added,
        dropped,
    }
}

/// Unsubscribe from repositories that were new at the last export
///
/// Returns the number of records changed.
pub fn unsubscribe_new(manifest: &mut Manifest) -> usize {
    let mut changed = 0;

    for record in manifest
        .records
        .iter_mut()
        .filter(|r| r.is_new && r.status == Status::Subscribed)
    {
        debug!("Unsubscribing new repository: {}", record.repo);
        record.status = Status::Unsubscribed;
        changed += 1;
    }

    changed
}

/// Remote call that moves a repository to a desired status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutation {
    Subscribe,
    Unsubscribe,
    Ignore,
}

impl Mutation {
    /// Mutation that reaches `status`, if `status` is a known value
    pub fn for_status(status: &Status) -> Option<Self> {
        match status {
            Status::Subscribed => Some(Mutation::Subscribe),
            Status::Unsubscribed => Some(Mutation::Unsubscribe),
            Status::Ignore => Some(Mutation::Ignore),
            Status::Unrecognized(_) => None,
        }
    }

    async fn apply(self, api: &dyn SubscriptionApi, repo: &str) -> Result<()> {
        match self {
            Mutation::Subscribe => api.set_subscribed(repo).await,
            Mutation::Unsubscribe => api.delete_subscription(repo).await,
            Mutation::Ignore => api.set_ignored(repo).await,
        }
    }
}

impl std::fmt::Display for Mutation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Mutation::Subscribe => "subscribe",
            Mutation::Unsubscribe => "unsubscribe",
            Mutation::Ignore => "ignore",
        })
    }
}

/// Per-repository progress reported while updating
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Progress<'a> {
    UpToDate { repo: &'a str },
    Updating { repo: &'a str, mutation: Mutation },
    Updated { repo: &'a str },
    WouldUpdate { repo: &'a str, mutation: Mutation },
    Failed { repo: &'a str, error: String },
}

/// Options for [`update`]
#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateOptions {
    pub on_error: FailurePolicy,
    pub dry_run: bool,
}

/// Results of an update run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateSummary {
    pub total_records: usize,
    pub unchanged: usize,
    pub updated: usize,
    /// Records that would change, in dry-run mode
    pub planned: usize,
    /// `(repo, error)` for every failed mutation
    pub failed: Vec<(String, String)>,
}

/// Push the manifest's desired state to the remote side
///
/// Records are visited in manifest order and at most one mutation is in
/// flight at a time. A repository missing from `remote` counts as `IGNORE`.
/// An unrecognized status stops the run before its record is touched. A
/// failed mutation stops the run under [`FailurePolicy::Abort`]; under
/// [`FailurePolicy::Continue`] it is recorded and the next record is tried.
pub async fn update(
    api: &dyn SubscriptionApi,
    manifest: &Manifest,
    remote: &RemoteState,
    options: UpdateOptions,
    mut progress: impl FnMut(Progress<'_>),
) -> Result<UpdateSummary> {
    let current = remote.by_repo();
    let absent = Status::Ignore;
    let mut summary = UpdateSummary {
        total_records: manifest.len(),
        ..Default::default()
    };

    for record in &manifest.records {
        let repo = record.repo.as_str();
        let status = current.get(repo).copied().unwrap_or(&absent);

        if &record.status == status {
            summary.unchanged += 1;
            progress(Progress::UpToDate { repo });
            continue;
        }

        let mutation =
            Mutation::for_status(&record.status).ok_or_else(|| SubsyncError::UnrecognizedStatus {
                repo: record.repo.clone(),
                status: record.status.to_string(),
            })?;

        if options.dry_run {
            summary.planned += 1;
            progress(Progress::WouldUpdate { repo, mutation });
            continue;
        }

        progress(Progress::Updating { repo, mutation });
        debug!("{}: {} -> {}", repo, status, record.status);

        match mutation.apply(api, repo).await {
            Ok(()) => {
                summary.updated += 1;
                progress(Progress::Updated { repo });
            }
            Err(e) if options.on_error == FailurePolicy::Continue => {
                error!("Failed to update {}: {:#}", repo, e);
                progress(Progress::Failed {
                    repo,
                    error: format!("{:#}", e),
                });
                summary.failed.push((record.repo.clone(), format!("{:#}", e)));
            }
            Err(e) => return Err(e),
        }
    }

    info!(
        "Update finished: {} records, {} up-to-date, {} updated, {} failed",
        summary.total_records,
        summary.unchanged,
        summary.updated,
        summary.failed.len()
    );

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::{MockSubscriptionApi, RemoteSubscription};

    fn remote(entries: &[(&str, Status)]) -> RemoteState {
        RemoteState::new(
            entries
                .iter()
                .map(|(repo, status)| RemoteSubscription {
                    repo: repo.to_string(),
                    status: status.clone(),
                })
                .collect(),
        )
    }

    #[test]
    fn test_export_marks_new_and_drops_missing() {
        let previous = Manifest::new(vec![
            SubscriptionRecord::new("o/kept", Status::Ignore, true),
            SubscriptionRecord::new("o/gone", Status::Subscribed, false),
        ]);
        let state = remote(&[("o/kept", Status::Subscribed), ("o/fresh", Status::Unsubscribed)]);

        let summary = export(&previous, &state);

        assert_eq!(
            summary.manifest.records,
            vec![
                SubscriptionRecord::new("o/kept", Status::Subscribed, false),
                SubscriptionRecord::new("o/fresh", Status::Unsubscribed, true),
            ]
        );
        assert_eq!(summary.added, vec!["o/fresh".to_string()]);
        assert_eq!(summary.dropped, vec!["o/gone".to_string()]);
    }

    #[test]
    fn test_export_from_empty_marks_everything_new() {
        let state = remote(&[("o/a", Status::Subscribed), ("o/b", Status::Unsubscribed)]);
        let summary = export(&Manifest::default(), &state);

        assert!(summary.manifest.records.iter().all(|r| r.is_new));
        assert!(summary.dropped.is_empty());
    }

    #[test]
    fn test_unsubscribe_new_only_touches_new_subscribed() {
        let mut manifest = Manifest::new(vec![
            SubscriptionRecord::new("o/a", Status::Subscribed, true),
            SubscriptionRecord::new("o/b", Status::Subscribed, false),
            SubscriptionRecord::new("o/c", Status::Ignore, true),
            SubscriptionRecord::new("o/d", Status::Unrecognized("WATCHING".into()), true),
        ]);

        assert_eq!(unsubscribe_new(&mut manifest), 1);
        assert_eq!(manifest.records[0].status, Status::Unsubscribed);
        assert!(manifest.records[0].is_new);
        assert_eq!(manifest.records[1].status, Status::Subscribed);
        assert_eq!(manifest.records[2].status, Status::Ignore);
        assert_eq!(
            manifest.records[3].status,
            Status::Unrecognized("WATCHING".into())
        );

        assert_eq!(unsubscribe_new(&mut manifest), 0);
    }

    #[test]
    fn test_mutation_for_status() {
        assert_eq!(Mutation::for_status(&Status::Subscribed), Some(Mutation::Subscribe));
        assert_eq!(Mutation::for_status(&Status::Unsubscribed), Some(Mutation::Unsubscribe));
        assert_eq!(Mutation::for_status(&Status::Ignore), Some(Mutation::Ignore));
        assert_eq!(Mutation::for_status(&Status::Unrecognized("X".into())), None);
    }

    #[tokio::test]
    async fn test_update_in_sync_makes_no_calls() {
        let mut api = MockSubscriptionApi::new();
        api.expect_set_subscribed().never();
        api.expect_delete_subscription().never();
        api.expect_set_ignored().never();

        let manifest = Manifest::new(vec![
            SubscriptionRecord::new("o/a", Status::Subscribed, false),
            SubscriptionRecord::new("o/b", Status::Unsubscribed, false),
            SubscriptionRecord::new("o/c", Status::Ignore, false),
        ]);
        let state = remote(&[("o/a", Status::Subscribed), ("o/b", Status::Unsubscribed)]);

        let summary = update(&api, &manifest, &state, UpdateOptions::default(), |_| {})
            .await
            .unwrap();

        assert_eq!(summary.unchanged, 3);
        assert_eq!(summary.updated, 0);
    }

    #[tokio::test]
    async fn test_dry_run_makes_no_calls() {
        let mut api = MockSubscriptionApi::new();
        api.expect_set_subscribed().never();
        api.expect_delete_subscription().never();
        api.expect_set_ignored().never();

        let manifest = Manifest::new(vec![
            SubscriptionRecord::new("o/a", Status::Subscribed, false),
            SubscriptionRecord::new("o/b", Status::Ignore, false),
        ]);
        let state = remote(&[("o/a", Status::Unsubscribed), ("o/b", Status::Subscribed)]);

        let mut seen = Vec::new();
        let options = UpdateOptions {
            dry_run: true,
            ..Default::default()
        };
        let summary = update(&api, &manifest, &state, options, |p| {
            if let Progress::WouldUpdate { repo, mutation } = p {
                seen.push((repo.to_string(), mutation));
            }
        })
        .await
        .unwrap();

        assert_eq!(summary.planned, 2);
        assert_eq!(
            seen,
            vec![
                ("o/a".to_string(), Mutation::Subscribe),
                ("o/b".to_string(), Mutation::Ignore),
            ]
        );
    }
}
