//! Common test utilities and helpers for subsync tests
#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Mutex;
use tempfile::TempDir;

use subsync::remote::{RemoteRepository, RepositoryPage, ViewerSubscription};
use subsync::{Manifest, RemoteState, RemoteSubscription, Status, SubscriptionApi, SubscriptionRecord};

/// A mutation observed by [`RecordingApi`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Subscribe(String),
    Unsubscribe(String),
    Ignore(String),
}

/// In-memory platform that records every mutation
pub struct RecordingApi {
    pub calls: Mutex<Vec<Call>>,
    pub pages: Vec<RepositoryPage>,
    pub failing: HashSet<String>,
    pub member: bool,
}

impl RecordingApi {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            pages: Vec::new(),
            failing: HashSet::new(),
            member: true,
        }
    }

    /// Serve `pages` in order, linked by `p1`, `p2`, ... cursors
    pub fn with_pages(mut self, pages: Vec<Vec<RemoteRepository>>) -> Self {
        let count = pages.len();
        self.pages = pages
            .into_iter()
            .enumerate()
            .map(|(i, repositories)| RepositoryPage {
                repositories,
                has_next_page: i + 1 < count,
                end_cursor: Some(format!("p{}", i + 1)),
            })
            .collect();
        self
    }

    /// Make every mutation for `repo` fail
    pub fn failing_on(mut self, repo: &str) -> Self {
        self.failing.insert(repo.to_string());
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, repo: &str, call: Call) -> Result<()> {
        self.calls.lock().unwrap().push(call);
        if self.failing.contains(repo) {
            Err(anyhow!("HTTP 502 for {}", repo))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl SubscriptionApi for RecordingApi {
    async fn is_org_member(&self, _org: &str) -> Result<bool> {
        Ok(self.member)
    }

    async fn repositories_page(
        &self,
        _org: &str,
        _page_size: u8,
        cursor: Option<String>,
    ) -> Result<RepositoryPage> {
        let index = match cursor {
            None => 0,
            Some(cursor) => cursor
                .trim_start_matches('p')
                .parse::<usize>()
                .map_err(|_| anyhow!("bad cursor {}", cursor))?,
        };
        Ok(self.pages.get(index).cloned().unwrap_or_default())
    }

    async fn set_subscribed(&self, repo: &str) -> Result<()> {
        self.record(repo, Call::Subscribe(repo.to_string()))
    }

    async fn delete_subscription(&self, repo: &str) -> Result<()> {
        self.record(repo, Call::Unsubscribe(repo.to_string()))
    }

    async fn set_ignored(&self, repo: &str) -> Result<()> {
        self.record(repo, Call::Ignore(repo.to_string()))
    }
}

pub fn node(name: &str, sub: ViewerSubscription, archived: bool) -> RemoteRepository {
    RemoteRepository {
        name_with_owner: name.to_string(),
        viewer_subscription: Some(sub),
        is_archived: archived,
    }
}

pub fn record(repo: &str, status: Status, is_new: bool) -> SubscriptionRecord {
    SubscriptionRecord::new(repo, status, is_new)
}

pub fn manifest(records: Vec<SubscriptionRecord>) -> Manifest {
    Manifest::new(records)
}

pub fn remote(entries: &[(&str, Status)]) -> RemoteState {
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

/// Temporary directory holding a config file and manifest
pub struct TestEnvironment {
    pub temp_dir: TempDir,
}

impl TestEnvironment {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("Failed to create temp dir"),
        }
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.temp_dir.path().join("subscriptions.json")
    }

    pub fn create_test_config(&self, content: &str) -> PathBuf {
        let config_path = self.temp_dir.path().join("config.yml");
        std::fs::write(&config_path, content).expect("Failed to write test config");
        config_path
    }

    /// Config pointing at this environment's manifest, for `org`
    pub fn create_minimal_config(&self, org: Option<&str>) -> PathBuf {
        let mut content = format!("manifest_path: {:?}\n", self.manifest_path());
        content.push_str("github:\n  auth_method: \"token\"\n");
        if let Some(org) = org {
            content.push_str(&format!("  organization: {:?}\n", org));
        }
        self.create_test_config(&content)
    }

    /// Config for `org` that talks to a mock API as `octocat` with an env token
    pub fn create_api_config(&self, org: &str, api_url: &str) -> PathBuf {
        let content = format!(
            "manifest_path: {:?}\n\
             github:\n  \
               auth_method: \"token\"\n  \
               username: \"octocat\"\n  \
               organization: {:?}\n  \
               api_url: {:?}\n",
            self.manifest_path(),
            org,
            api_url
        );
        self.create_test_config(&content)
    }

    pub fn read_manifest(&self) -> String {
        std::fs::read_to_string(self.manifest_path()).expect("Failed to read manifest")
    }

    pub fn write_manifest(&self, content: &str) {
        std::fs::write(self.manifest_path(), content).expect("Failed to write manifest");
    }
}
