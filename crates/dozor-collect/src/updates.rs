//! GitHub-release version checker and installer (`server_updates`, §6).

use crate::error::CollectError;
use dozor_transport::Transport;
use serde::Deserialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// One entry of `DOZOR_TRACKED_BINARIES`: `owner/repo[:binary]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedBinary {
    pub owner: String,
    pub repo: String,
    pub binary: String,
}

impl TrackedBinary {
    pub fn parse(spec: &str) -> Option<Self> {
        let (repo_part, binary) = match spec.split_once(':') {
            Some((repo, bin)) => (repo, bin.to_string()),
            None => (spec, spec.rsplit_once('/').map(|(_, r)| r.to_string())?),
        };
        let (owner, repo) = repo_part.split_once('/')?;
        Some(Self { owner: owner.to_string(), repo: repo.to_string(), binary })
    }
}

#[derive(Debug, Deserialize)]
struct GithubRelease {
    tag_name: String,
    #[serde(default)]
    assets: Vec<GithubAsset>,
}

#[derive(Debug, Deserialize)]
struct GithubAsset {
    name: String,
    browser_download_url: String,
}

#[derive(Debug, Clone)]
pub struct UpdateCheckResult {
    pub binary: String,
    pub installed_version: Option<String>,
    pub latest_version: String,
    pub update_available: bool,
    pub download_url: Option<String>,
}

pub struct UpdateChecker {
    client: reqwest::Client,
    transport: Arc<dyn Transport>,
    github_token: Option<String>,
}

impl UpdateChecker {
    pub fn new(transport: Arc<dyn Transport>, github_token: Option<String>) -> Self {
        Self { client: reqwest::Client::new(), transport, github_token }
    }

    async fn fetch_latest_release(&self, tracked: &TrackedBinary) -> Result<GithubRelease, CollectError> {
        let url = format!("https://api.github.com/repos/{}/{}/releases/latest", tracked.owner, tracked.repo);
        let mut req = self.client.get(&url).header("User-Agent", "dozor");
        if let Some(token) = &self.github_token {
            req = req.bearer_auth(token);
        }
        let release: GithubRelease = req.send().await?.error_for_status()?.json().await?;
        Ok(release)
    }

    async fn installed_version(&self, cancel: &CancellationToken, binary: &str) -> Option<String> {
        let result = self.transport.execute(cancel, &format!("{binary} --version")).await.ok()?;
        if !result.success() {
            return None;
        }
        result.output().split_whitespace().find(|tok| tok.starts_with('v') || tok.chars().next().is_some_and(|c| c.is_ascii_digit())).map(str::to_string)
    }

    /// `action = check`: compares the installed version (via `<binary>
    /// --version`) against the latest GitHub release tag.
    pub async fn check(&self, cancel: &CancellationToken, tracked: &TrackedBinary) -> Result<UpdateCheckResult, CollectError> {
        let release = self.fetch_latest_release(tracked).await?;
        let installed = self.installed_version(cancel, &tracked.binary).await;
        let update_available = installed.as_deref() != Some(release.tag_name.as_str());
        let download_url = release
            .assets
            .iter()
            .find(|a| a.name.contains(&tracked.binary))
            .map(|a| a.browser_download_url.clone());

        Ok(UpdateCheckResult {
            binary: tracked.binary.clone(),
            installed_version: installed,
            latest_version: release.tag_name,
            update_available,
            download_url,
        })
    }

    /// `action = install`: downloads the matching asset and replaces the binary in place.
    pub async fn install(&self, cancel: &CancellationToken, tracked: &TrackedBinary) -> Result<String, CollectError> {
        let check = self.check(cancel, tracked).await?;
        let Some(url) = check.download_url else {
            return Ok(format!("no downloadable asset found for {} {}", tracked.binary, check.latest_version));
        };
        let cmd = format!(
            "curl -fsSL {} -o /tmp/{bin}.new && chmod +x /tmp/{bin}.new && mv /tmp/{bin}.new $(command -v {bin})",
            url,
            bin = tracked.binary,
        );
        let result = self.transport.execute(cancel, &cmd).await?;
        if result.success() {
            Ok(format!("installed {} {}", tracked.binary, check.latest_version))
        } else {
            Ok(format!("install failed: {}", result.output()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_owner_repo_with_explicit_binary() {
        let tracked = TrackedBinary::parse("docker/compose:docker-compose").unwrap();
        assert_eq!(tracked.owner, "docker");
        assert_eq!(tracked.repo, "compose");
        assert_eq!(tracked.binary, "docker-compose");
    }

    #[test]
    fn parses_owner_repo_defaulting_binary_to_repo_name() {
        let tracked = TrackedBinary::parse("caddyserver/caddy").unwrap();
        assert_eq!(tracked.binary, "caddy");
    }

    #[test]
    fn rejects_malformed_spec() {
        assert!(TrackedBinary::parse("not-a-repo-spec").is_none());
    }
}
