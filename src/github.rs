use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use octocrab::Octocrab;
use serde::Deserialize;
use serde_json::json;
use std::env;
use std::process::Command;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::remote::{RemoteRepository, RepositoryPage, SubscriptionApi};

/// Organization repositories with the viewer's subscription, ascending by name
const REPOSITORIES_QUERY: &str = r#"
query($org: String!, $pageSize: Int!, $cursor: String) {
  organization(login: $org) {
    repositories(first: $pageSize, after: $cursor, orderBy: {field: NAME, direction: ASC}) {
      pageInfo {
        hasNextPage
        endCursor
      }
      nodes {
        nameWithOwner
        viewerSubscription
        isArchived
      }
    }
  }
}
"#;

/// GitHub client wrapper with authentication management
pub struct GitHubClient {
    client: Octocrab,
    username: String,
}

/// GitHub authentication strategies
#[derive(Debug, Clone)]
pub enum AuthStrategy {
    /// Use GitHub CLI authentication
    GitHubCLI,
    /// Use environment variable token
    EnvironmentToken,
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse<T> {
    data: Option<T>,
    errors: Option<Vec<GraphQlError>>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct OrganizationData {
    organization: Option<Organization>,
}

#[derive(Debug, Deserialize)]
struct Organization {
    repositories: RepositoryConnection,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RepositoryConnection {
    page_info: PageInfo,
    nodes: Vec<RemoteRepository>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    has_next_page: bool,
    end_cursor: Option<String>,
}

impl GitHubClient {
    /// Create a new GitHub client with automatic authentication
    pub async fn new(config: &Config) -> Result<Self> {
        let (auth_strategy, token) = Self::detect_authentication(config)?;

        info!("Using authentication strategy: {:?}", auth_strategy);

        Self::connect(
            token,
            config.github.api_url.as_deref(),
            config.github.username.clone(),
        )
        .await
    }

    /// Build a client from an explicit token
    ///
    /// When `username` is `None` the login is looked up from the token.
    pub async fn connect(
        token: String,
        api_url: Option<&str>,
        username: Option<String>,
    ) -> Result<Self> {
        let mut builder = Octocrab::builder().personal_token(token);

        if let Some(api_url) = api_url {
            builder = builder
                .base_uri(api_url)
                .with_context(|| format!("Invalid GitHub API URL: {}", api_url))?;
        }

        let client = builder.build().context("Failed to create GitHub client")?;

        let username = match username {
            Some(username) => username,
            None => {
                client
                    .current()
                    .user()
                    .await
                    .context("Failed to get current user information. Check your authentication.")?
                    .login
            }
        };

        info!("Authenticated as GitHub user: {}", username);

        Ok(Self { client, username })
    }

    /// Detect and obtain GitHub authentication
    fn detect_authentication(config: &Config) -> Result<(AuthStrategy, String)> {
        match config.github.auth_method.as_str() {
            "auto" => {
                // Try GitHub CLI first, then environment token
                if let Ok(token) = Self::try_github_cli() {
                    Ok((AuthStrategy::GitHubCLI, token))
                } else if let Ok(token) = Self::try_environment_token() {
                    Ok((AuthStrategy::EnvironmentToken, token))
                } else {
                    Err(anyhow!(
                        "No GitHub authentication found. Please either:\n\
                         1. Install and authenticate GitHub CLI: gh auth login\n\
                         2. Set the GITHUB_TOKEN environment variable"
                    ))
                }
            }
            "gh_cli" => {
                let token = Self::try_github_cli()
                    .context("GitHub CLI authentication failed. Run: gh auth login")?;
                Ok((AuthStrategy::GitHubCLI, token))
            }
            "token" => {
                let token = Self::try_environment_token()
                    .context("GITHUB_TOKEN environment variable not found or invalid")?;
                Ok((AuthStrategy::EnvironmentToken, token))
            }
            other => Err(anyhow!("Unknown auth method: {}", other)),
        }
    }

    /// Try to get token from GitHub CLI
    fn try_github_cli() -> Result<String> {
        debug!("Attempting GitHub CLI authentication");

        if !Self::is_command_available("gh") {
            return Err(anyhow!("GitHub CLI (gh) is not installed"));
        }

        let auth_status = Command::new("gh")
            .args(["auth", "status"])
            .output()
            .context("Failed to check GitHub CLI auth status")?;

        if !auth_status.status.success() {
            return Err(anyhow!(
                "GitHub CLI is not authenticated. Run: gh auth login"
            ));
        }

        let token_output = Command::new("gh")
            .args(["auth", "token"])
            .output()
            .context("Failed to get GitHub CLI token")?;

        if !token_output.status.success() {
            return Err(anyhow!(
                "Failed to retrieve token from GitHub CLI: {}",
                String::from_utf8_lossy(&token_output.stderr)
            ));
        }

        let token = String::from_utf8(token_output.stdout)
            .context("GitHub CLI token is not valid UTF-8")?
            .trim()
            .to_string();

        if token.is_empty() {
            return Err(anyhow!("GitHub CLI returned empty token"));
        }

        debug!("Successfully obtained token from GitHub CLI");
        Ok(token)
    }

    /// Try to get token from GITHUB_TOKEN, then GH_TOKEN
    fn try_environment_token() -> Result<String> {
        debug!("Attempting environment variable authentication");

        let token = env::var("GITHUB_TOKEN")
            .or_else(|_| env::var("GH_TOKEN"))
            .context("Neither GITHUB_TOKEN nor GH_TOKEN is set")?;

        if token.is_empty() {
            return Err(anyhow!("GitHub token environment variable is empty"));
        }

        if !["ghp_", "gho_", "ghs_", "github_pat_"]
            .iter()
            .any(|prefix| token.starts_with(prefix))
        {
            warn!("GitHub token doesn't look like a valid GitHub token (expected ghp_, gho_, ghs_ or github_pat_ prefix)");
        }

        debug!("Successfully found GitHub token in environment");
        Ok(token)
    }

    /// Check if a command is available in PATH
    fn is_command_available(command: &str) -> bool {
        Command::new("which")
            .arg(command)
            .output()
            .map(|output| output.status.success())
            .unwrap_or(false)
    }

    /// Get the authenticated username
    pub fn username(&self) -> &str {
        &self.username
    }

    fn subscription_route(repo: &str) -> Result<String> {
        match repo.split_once('/') {
            Some((owner, name)) if !owner.is_empty() && !name.is_empty() => {
                Ok(format!("/repos/{}/{}/subscription", owner, name))
            }
            _ => Err(anyhow!("Repository must be in owner/name form: {}", repo)),
        }
    }

    async fn put_subscription(&self, repo: &str, body: serde_json::Value) -> Result<()> {
        let route = Self::subscription_route(repo)?;
        debug!("PUT {} {}", route, body);

        let _: serde_json::Value = self
            .client
            .put(&route, Some(&body))
            .await
            .with_context(|| format!("Failed to update subscription for {}", repo))?;

        Ok(())
    }
}

#[async_trait]
impl SubscriptionApi for GitHubClient {
    async fn is_org_member(&self, org: &str) -> Result<bool> {
        debug!("Checking membership of {} in {}", self.username, org);

        self.client
            .orgs(org)
            .check_membership(&self.username)
            .await
            .with_context(|| format!("Failed to check membership of {} in {}", self.username, org))
    }

    async fn repositories_page(
        &self,
        org: &str,
        page_size: u8,
        cursor: Option<String>,
    ) -> Result<RepositoryPage> {
        debug!("Fetching repositories for {} after {:?}", org, cursor);

        let payload = json!({
            "query": REPOSITORIES_QUERY,
            "variables": {
                "org": org,
                "pageSize": page_size,
                "cursor": cursor,
            },
        });

        let response: GraphQlResponse<OrganizationData> = self
            .client
            .graphql(&payload)
            .await
            .with_context(|| format!("GraphQL request for {} failed", org))?;

        if let Some(errors) = response.errors.filter(|errors| !errors.is_empty()) {
            let messages: Vec<String> = errors.into_iter().map(|e| e.message).collect();
            return Err(anyhow!("GraphQL errors: {}", messages.join("; ")));
        }

        let connection = response
            .data
            .and_then(|data| data.organization)
            .map(|organization| organization.repositories)
            .ok_or_else(|| anyhow!("Organization {} not found", org))?;

        Ok(RepositoryPage {
            repositories: connection.nodes,
            has_next_page: connection.page_info.has_next_page,
            end_cursor: connection.page_info.end_cursor,
        })
    }

    async fn set_subscribed(&self, repo: &str) -> Result<()> {
        self.put_subscription(repo, json!({ "subscribed": true })).await
    }

    async fn delete_subscription(&self, repo: &str) -> Result<()> {
        let route = Self::subscription_route(repo)?;
        debug!("DELETE {}", route);

        let response = self
            .client
            ._delete(route.as_str(), None::<&()>)
            .await
            .with_context(|| format!("Failed to delete subscription for {}", repo))?;

        octocrab::map_github_error(response)
            .await
            .with_context(|| format!("Failed to delete subscription for {}", repo))?;

        Ok(())
    }

    async fn set_ignored(&self, repo: &str) -> Result<()> {
        self.put_subscription(repo, json!({ "ignored": true })).await
    }
}
