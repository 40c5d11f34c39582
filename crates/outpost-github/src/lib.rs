//! Thin GitHub content-download client.
//!
//! Resolves a repository page URL to its API representation, locates a
//! Dockerfile through the recursive git tree, and materializes the
//! repository contents on disk by walking the contents API. No git binary
//! involved; private repositories work with a personal access token.

use std::path::{Path, PathBuf};

use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use thiserror::Error;

const USER_AGENT: &str = concat!("outpost/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum GithubError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("repository not found: {0}")]
    RepositoryNotFound(String),

    #[error("bad credentials: the GitHub access token was rejected")]
    BadCredentials,

    #[error("repository has no branch named {0}")]
    BranchNotFound(String),

    #[error("GitHub API error {status} for {url}: {message}")]
    Api {
        status: u16,
        url: String,
        message: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Repository identity as resolved through the API.
#[derive(Debug, Clone)]
pub struct RepoMetadata {
    /// API root of the repository, e.g. `https://api.github.com/repos/o/r`.
    pub api_url: String,
    pub owner: String,
    pub name: String,
    pub full_name: String,
    pub private: bool,
    pub default_branch: String,
}

#[derive(Debug, Deserialize)]
struct RepoResponse {
    url: String,
    private: bool,
    default_branch: String,
    owner: OwnerResponse,
    name: String,
    full_name: String,
}

#[derive(Debug, Deserialize)]
struct OwnerResponse {
    login: String,
}

#[derive(Debug, Deserialize)]
struct TreeResponse {
    tree: Vec<TreeEntry>,
}

#[derive(Debug, Deserialize)]
struct TreeEntry {
    path: String,
}

#[derive(Debug, Deserialize)]
struct ContentEntry {
    name: String,
    #[serde(rename = "type")]
    entry_type: String,
    url: String,
    download_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    message: String,
}

/// GitHub API client bound to one access token.
pub struct RepoClient {
    http: Client,
}

impl RepoClient {
    /// Build a client; `token` may be empty for public repositories.
    pub fn new(token: Option<&str>) -> Result<Self, GithubError> {
        let mut headers = HeaderMap::new();
        if let Some(token) = token.filter(|t| !t.is_empty()) {
            let value = HeaderValue::from_str(&format!("token {token}"))
                .map_err(|_| GithubError::BadCredentials)?;
            headers.insert(AUTHORIZATION, value);
        }
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { http })
    }

    /// Resolve a repository page URL (`https://github.com/owner/repo`) to
    /// its metadata.
    pub async fn fetch_metadata(&self, page_url: &str) -> Result<RepoMetadata, GithubError> {
        let api_url = page_to_api_url(page_url);
        tracing::info!("checking repository {}", api_url);

        let response = self.http.get(&api_url).send().await?;
        match response.status() {
            StatusCode::NOT_FOUND => {
                return Err(GithubError::RepositoryNotFound(page_url.to_string()))
            }
            StatusCode::UNAUTHORIZED => return Err(GithubError::BadCredentials),
            _ => {}
        }
        let repo: RepoResponse = check(response).await?.json().await?;

        Ok(RepoMetadata {
            api_url: repo.url,
            owner: repo.owner.login,
            name: repo.name,
            full_name: repo.full_name,
            private: repo.private,
            default_branch: repo.default_branch,
        })
    }

    /// Map `"default"` to the repository's default branch; otherwise verify
    /// the named branch exists.
    pub async fn resolve_branch(
        &self,
        meta: &RepoMetadata,
        branch: &str,
    ) -> Result<String, GithubError> {
        if branch == "default" {
            return Ok(meta.default_branch.clone());
        }

        let url = format!("{}/branches/{}", meta.api_url, branch);
        let response = self.http.get(&url).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Err(GithubError::BranchNotFound(branch.to_string()));
        }
        check(response).await?;
        Ok(branch.to_string())
    }

    /// Path of the first Dockerfile found in the recursive git tree, or
    /// `None` when the repository has no Dockerfile.
    pub async fn find_dockerfile(
        &self,
        meta: &RepoMetadata,
        branch: &str,
    ) -> Result<Option<String>, GithubError> {
        let url = format!("{}/git/trees/{}?recursive=1", meta.api_url, branch);
        let response = check(self.http.get(&url).send().await?).await?;
        let tree: TreeResponse = response.json().await?;

        let found = tree
            .tree
            .into_iter()
            .map(|entry| entry.path)
            .find(|path| path.ends_with("Dockerfile"));
        match &found {
            Some(path) => tracing::info!("found Dockerfile at {}", path),
            None => tracing::warn!("no Dockerfile in {}", meta.full_name),
        }
        Ok(found)
    }

    /// Materialize the repository contents under `dest`, walking directories
    /// through the contents API.
    pub async fn download(
        &self,
        meta: &RepoMetadata,
        branch: &str,
        dest: &Path,
    ) -> Result<(), GithubError> {
        let root = format!("{}/contents/?ref={}", meta.api_url, branch);
        tracing::info!("downloading {} into {}", meta.full_name, dest.display());

        let mut queue: Vec<(String, PathBuf)> = vec![(root, dest.to_path_buf())];
        while let Some((url, dir)) = queue.pop() {
            tokio::fs::create_dir_all(&dir).await?;
            let entries: Vec<ContentEntry> =
                check(self.http.get(&url).send().await?).await?.json().await?;

            for entry in entries {
                match entry.entry_type.as_str() {
                    "file" => {
                        let Some(download_url) = entry.download_url else {
                            tracing::debug!("no download URL for {}, skipping", entry.name);
                            continue;
                        };
                        let bytes = check(self.http.get(&download_url).send().await?)
                            .await?
                            .bytes()
                            .await?;
                        tokio::fs::write(dir.join(&entry.name), &bytes).await?;
                    }
                    "dir" => queue.push((entry.url, dir.join(&entry.name))),
                    other => {
                        // Submodules and symlinks are not materialized.
                        tracing::debug!("skipping {} entry {}", other, entry.name);
                    }
                }
            }
        }
        Ok(())
    }
}

/// Turn a non-2xx response into a `GithubError::Api` carrying the API's own
/// message when one is present.
async fn check(response: Response) -> Result<Response, GithubError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let url = response.url().to_string();
    let message = response
        .json::<ApiMessage>()
        .await
        .map(|m| m.message)
        .unwrap_or_default();
    Err(GithubError::Api {
        status: status.as_u16(),
        url,
        message,
    })
}

/// `https://github.com/owner/repo(.git)` → `https://api.github.com/repos/owner/repo`
fn page_to_api_url(page_url: &str) -> String {
    page_url
        .replace("https://github.com/", "https://api.github.com/repos/")
        .trim_end_matches(".git")
        .to_string()
}
