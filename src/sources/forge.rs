use reqwest::blocking::{Client, Response};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::thread;
use std::time::Duration;

use crate::error::SyncError;
use crate::sources::config::{ForgeConfig, NetworkConfig};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }

    /// Name of the single wrapper folder the forge puts at the top of a snapshot archive.
    pub fn archive_prefix(&self, revision: &str) -> String {
        format!("{}-{}", self.name, revision)
    }
}

fn valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && segment
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_' | '.'))
}

/// Parses `https://<host>/<owner>/<name>[.git][/]` or `git@<host>:<owner>/<name>[.git]`.
pub fn parse_repo_url(url: &str, host: &str) -> Result<RepoRef, SyncError> {
    let unsupported = |reason: String| SyncError::UnsupportedForge {
        url: url.to_string(),
        reason,
    };

    let trimmed = url.trim();
    let scp_prefix = format!("git@{host}:");
    let rest = if let Some(rest) = trimmed.strip_prefix(&scp_prefix) {
        rest
    } else {
        let without_scheme = trimmed
            .strip_prefix("https://")
            .or_else(|| trimmed.strip_prefix("http://"))
            .ok_or_else(|| unsupported("expected an http(s) or git@ url".to_string()))?;
        let (url_host, path) = without_scheme
            .split_once('/')
            .ok_or_else(|| unsupported("missing repository path".to_string()))?;
        let url_host = url_host.strip_prefix("www.").unwrap_or(url_host);
        if !url_host.eq_ignore_ascii_case(host) {
            return Err(unsupported(format!("host `{url_host}` is not {host}")));
        }
        path
    };

    let rest = rest.trim_end_matches('/');
    let rest = rest.strip_suffix(".git").unwrap_or(rest);
    let mut parts = rest.split('/');
    let (Some(owner), Some(name), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(unsupported("expected <owner>/<name>".to_string()));
    };
    if !valid_segment(owner) || !valid_segment(name) {
        return Err(unsupported(format!("invalid repository path `{rest}`")));
    }

    Ok(RepoRef {
        owner: owner.to_string(),
        name: name.to_string(),
    })
}

/// Read-only forge operations needed to resolve and fetch snapshots.
pub trait Forge {
    fn parse_repo(&self, url: &str) -> Result<RepoRef, SyncError>;
    fn default_branch(&self, repo: &RepoRef) -> Result<String, SyncError>;
    fn branch_tip(&self, repo: &RepoRef, branch: &str) -> Result<String, SyncError>;
    fn archive_url(&self, repo: &RepoRef, revision: &str) -> String;
}

#[derive(Debug, Deserialize)]
struct RepoResponse {
    default_branch: String,
}

#[derive(Debug, Deserialize)]
struct BranchCommit {
    sha: String,
}

#[derive(Debug, Deserialize)]
struct BranchResponse {
    commit: BranchCommit,
}

pub struct GithubForge {
    client: Client,
    config: ForgeConfig,
    retries: usize,
}

pub fn build_client(forge: &ForgeConfig, network: &NetworkConfig) -> reqwest::Result<Client> {
    Client::builder()
        .user_agent(forge.user_agent.clone())
        .connect_timeout(Duration::from_secs(network.connect_timeout_secs))
        .timeout(Duration::from_secs(network.read_timeout_secs))
        .build()
}

impl GithubForge {
    pub fn new(forge: &ForgeConfig, network: &NetworkConfig) -> Result<Self, SyncError> {
        let client = build_client(forge, network).map_err(|err| {
            SyncError::InvalidConfig(format!("failed to build http client: {err}"))
        })?;
        Ok(Self {
            client,
            config: forge.clone(),
            retries: network.retries,
        })
    }

    fn get_with_retry(&self, url: &str) -> Result<Response, SyncError> {
        let mut last_reason = String::new();
        for attempt in 0..=self.retries {
            let mut request = self
                .client
                .get(url)
                .header("Accept", "application/vnd.github+json");
            if let Some(token) = &self.config.token {
                request = request.bearer_auth(token);
            }

            match request.send() {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response) => {
                    let status = response.status();
                    last_reason = format!("HTTP {status}");
                    if status.is_client_error() {
                        break;
                    }
                }
                Err(err) => last_reason = err.to_string(),
            }
            if attempt < self.retries {
                tracing::debug!(url, attempt, reason = %last_reason, "retrying forge lookup");
                thread::sleep(Duration::from_millis(250 * (attempt as u64 + 1)));
            }
        }

        Err(SyncError::RemoteLookupFailure {
            target: url.to_string(),
            reason: last_reason,
        })
    }

    fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, SyncError> {
        let response = self.get_with_retry(url)?;
        response.json::<T>().map_err(|err| SyncError::RemoteLookupFailure {
            target: url.to_string(),
            reason: format!("unexpected response body: {err}"),
        })
    }
}

impl Forge for GithubForge {
    fn parse_repo(&self, url: &str) -> Result<RepoRef, SyncError> {
        parse_repo_url(url, &self.config.host)
    }

    fn default_branch(&self, repo: &RepoRef) -> Result<String, SyncError> {
        let url = format!(
            "{}/repos/{}/{}",
            self.config.api_base_url, repo.owner, repo.name
        );
        let body: RepoResponse = self.get_json(&url)?;
        Ok(body.default_branch)
    }

    fn branch_tip(&self, repo: &RepoRef, branch: &str) -> Result<String, SyncError> {
        let url = format!(
            "{}/repos/{}/{}/branches/{}",
            self.config.api_base_url, repo.owner, repo.name, branch
        );
        let body: BranchResponse = self.get_json(&url)?;
        Ok(body.commit.sha)
    }

    fn archive_url(&self, repo: &RepoRef, revision: &str) -> String {
        format!(
            "{}/{}/{}/tar.gz/{}",
            self.config.archive_base_url, repo.owner, repo.name, revision
        )
    }
}
