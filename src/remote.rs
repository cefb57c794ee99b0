//! Remote subscription state
//!
//! This module defines the capabilities subsync needs from the hosting
//! platform and the paginated fetch that turns organization repository
//! listings into the remote side of a reconciliation.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::manifest::Status;

/// The viewer's notification setting as reported by GitHub
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ViewerSubscription {
    Subscribed,
    Unsubscribed,
    Ignored,
}

/// One repository node from an organization listing
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteRepository {
    /// `owner/name`
    pub name_with_owner: String,
    pub viewer_subscription: Option<ViewerSubscription>,
    pub is_archived: bool,
}

/// One page of an organization listing
#[derive(Debug, Clone, Default)]
pub struct RepositoryPage {
    pub repositories: Vec<RemoteRepository>,
    pub has_next_page: bool,
    pub end_cursor: Option<String>,
}

/// Operations subsync needs from the hosting platform
///
/// Every mutation is idempotent on the platform side.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SubscriptionApi: Send + Sync {
    /// Whether the authenticated user belongs to `org`
    async fn is_org_member(&self, org: &str) -> Result<bool>;

    /// Fetch one page of the organization's repositories, ascending by name
    async fn repositories_page(
        &self,
        org: &str,
        page_size: u8,
        cursor: Option<String>,
    ) -> Result<RepositoryPage>;

    /// Watch all activity
    async fn set_subscribed(&self, repo: &str) -> Result<()>;

    /// Drop the explicit subscription, leaving participation-based notifications
    async fn delete_subscription(&self, repo: &str) -> Result<()>;

    /// Ignore all notifications
    async fn set_ignored(&self, repo: &str) -> Result<()>;
}

/// Current subscription of one repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSubscription {
    pub repo: String,
    pub status: Status,
}

/// Subscriptions of every non-archived, non-ignored repository, in fetch order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteState {
    pub subscriptions: Vec<RemoteSubscription>,
}

impl RemoteState {
    pub fn new(subscriptions: Vec<RemoteSubscription>) -> Self {
        Self { subscriptions }
    }

    /// Index by repository
    pub fn by_repo(&self) -> HashMap<&str, &Status> {
        self.subscriptions
            .iter()
            .map(|s| (s.repo.as_str(), &s.status))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }
}

impl RemoteRepository {
    /// Convert to the status vocabulary used by the manifest
    ///
    /// Archived and ignored repositories, and repositories without a viewer
    /// subscription, have no place in the manifest.
    fn into_subscription(self) -> Option<RemoteSubscription> {
        if self.is_archived {
            debug!("Skipping archived repository: {}", self.name_with_owner);
            return None;
        }

        let status = match self.viewer_subscription {
            Some(ViewerSubscription::Subscribed) => Status::Subscribed,
            Some(ViewerSubscription::Unsubscribed) => Status::Unsubscribed,
            Some(ViewerSubscription::Ignored) => {
                debug!("Skipping ignored repository: {}", self.name_with_owner);
                return None;
            }
            None => {
                warn!(
                    "No viewer subscription reported for {}, skipping",
                    self.name_with_owner
                );
                return None;
            }
        };

        Some(RemoteSubscription {
            repo: self.name_with_owner,
            status,
        })
    }
}

/// Walk every page of the organization listing
///
/// Pages are requested one after another. Any failed page aborts the fetch,
/// as does a page that promises more results without a cursor to reach them.
pub async fn fetch_remote_state(
    api: &dyn SubscriptionApi,
    org: &str,
    page_size: u8,
) -> Result<RemoteState> {
    let mut subscriptions = Vec::new();
    let mut cursor: Option<String> = None;
    let mut pages = 0usize;

    loop {
        pages += 1;
        let page = api
            .repositories_page(org, page_size, cursor.take())
            .await
            .with_context(|| format!("Failed to fetch repositories for {} (page {})", org, pages))?;

        debug!(
            "Page {} for {}: {} repositories",
            pages,
            org,
            page.repositories.len()
        );

        subscriptions.extend(
            page.repositories
                .into_iter()
                .filter_map(RemoteRepository::into_subscription),
        );

        match (page.has_next_page, page.end_cursor) {
            (true, Some(next)) => cursor = Some(next),
            (true, None) => {
                return Err(anyhow!(
                    "Listing for {} reported more pages without a cursor (page {})",
                    org,
                    pages
                ));
            }
            (false, _) => break,
        }
    }

    info!(
        "Fetched {} subscriptions for {} in {} pages",
        subscriptions.len(),
        org,
        pages
    );

    Ok(RemoteState::new(subscriptions))
}
