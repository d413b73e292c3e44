//! GitHub REST implementation of the remote sources.
//!
//! [`GitHubClient`] implements both [`RepositorySource`] (the account's
//! repository listing) and [`TreeSource`] (the per-branch tree listing and
//! file reads) on top of the GitHub REST API, using a blocking `reqwest`
//! client. Requests are made one at a time.
//!
//! # Endpoints
//!
//! | Operation | Endpoint |
//! |-----------|----------|
//! | List repositories | `GET /users/{account}/repos?per_page=100&page=N` |
//! | List tree | `GET /repos/{account}/{repo}/git/trees/{branch}?recursive=1` |
//! | Read file | `GET /repos/{account}/{repo}/contents/{path}?ref={branch}` |
//!
//! # Authentication
//!
//! When a token is configured every request carries
//! `Authorization: Bearer <token>`. Without one the API still answers for
//! public data, at a much lower rate limit.

use std::time::Duration;

use base64::Engine;
use reqwest::blocking::{Client, Response};
use reqwest::header::ACCEPT;
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::errors::{FetchError, InventoryError, ReadError};
use crate::models::RepositoryRecord;
use crate::source::{EntryKind, RemoteEntry, RepoLocation, RepositorySource, TreeSource};

pub const DEFAULT_API_URL: &str = "https://api.github.com";

const API_VERSION: &str = "2022-11-28";
const JSON_MEDIA_TYPE: &str = "application/vnd.github+json";
const PER_PAGE: usize = 100;
const ERROR_BODY_LIMIT: usize = 500;

/// Blocking GitHub API client.
pub struct GitHubClient {
    http: Client,
    api_url: Url,
    token: Option<String>,
}

impl GitHubClient {
    /// Create a client for `api_url` (e.g. `https://api.github.com` or a
    /// GitHub Enterprise `https://host/api/v3`).
    pub fn new(
        api_url: &str,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, InventoryError> {
        let api_url = Url::parse(api_url)
            .map_err(|e| InventoryError::Config(format!("invalid API URL '{}': {}", api_url, e)))?;
        if !matches!(api_url.scheme(), "http" | "https") {
            return Err(InventoryError::Config(format!(
                "API URL must use http or https: {}",
                api_url
            )));
        }

        let http = Client::builder()
            .user_agent(concat!("repo-inventory/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| InventoryError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_url,
            token,
        })
    }

    /// API URL with `segments` appended as individually encoded path parts.
    fn endpoint<'s>(&self, segments: impl IntoIterator<Item = &'s str>) -> Url {
        let mut url = self.api_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn get(&self, url: &Url) -> Result<Response, FetchError> {
        debug!("GET {}", url);
        let mut request = self
            .http
            .get(url.clone())
            .header(ACCEPT, JSON_MEDIA_TYPE)
            .header("X-GitHub-Api-Version", API_VERSION);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().map_err(|e| FetchError::Transport {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                body: body.chars().take(ERROR_BODY_LIMIT).collect(),
            });
        }
        Ok(response)
    }

    fn get_json<T: DeserializeOwned>(&self, url: &Url) -> Result<T, FetchError> {
        let body = self.get(url)?.text().map_err(|e| FetchError::Transport {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        serde_json::from_str(&body).map_err(|e| FetchError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })
    }

    fn get_bytes(&self, url: &Url) -> Result<Vec<u8>, FetchError> {
        let bytes = self.get(url)?.bytes().map_err(|e| FetchError::Transport {
            url: url.to_string(),
            message: e.to_string(),
        })?;
        Ok(bytes.to_vec())
    }
}

// ============ Repository listing ============

#[derive(Debug, Deserialize)]
struct ApiRepository {
    name: String,
    #[serde(default)]
    default_branch: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    archived: bool,
    #[serde(default)]
    fork: bool,
    #[serde(default)]
    open_issues: i64,
    #[serde(default)]
    stargazers_count: i64,
    #[serde(default)]
    forks_count: i64,
    #[serde(default)]
    size: i64,
}

impl From<ApiRepository> for RepositoryRecord {
    fn from(repo: ApiRepository) -> Self {
        RepositoryRecord {
            name: repo.name,
            // Empty repositories have no branch; "main" is GitHub's default.
            default_branch: repo.default_branch.unwrap_or_else(|| "main".to_string()),
            description: repo.description.unwrap_or_default(),
            archived: repo.archived,
            is_fork: repo.fork,
            issues: repo.open_issues,
            stars: repo.stargazers_count,
            forks: repo.forks_count,
            size: repo.size,
        }
    }
}

impl RepositorySource for GitHubClient {
    fn list_repositories(&self, account: &str) -> Result<Vec<RepositoryRecord>, FetchError> {
        let mut records = Vec::new();
        let mut page = 1usize;

        loop {
            let mut url = self.endpoint(["users", account, "repos"]);
            url.query_pairs_mut()
                .append_pair("per_page", &PER_PAGE.to_string())
                .append_pair("page", &page.to_string());

            let batch: Vec<ApiRepository> = self.get_json(&url)?;
            let count = batch.len();
            records.extend(batch.into_iter().map(RepositoryRecord::from));

            if count < PER_PAGE {
                break;
            }
            page += 1;
        }

        debug!("Fetched {} repositories for {}", records.len(), account);
        Ok(records)
    }
}

// ============ Trees and contents ============

#[derive(Debug, Deserialize)]
struct ApiTree {
    tree: Vec<ApiTreeEntry>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Debug, Deserialize)]
struct ApiTreeEntry {
    path: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    size: Option<u64>,
}

fn tree_entries(tree: ApiTree) -> Vec<RemoteEntry> {
    tree.tree
        .into_iter()
        .filter_map(|e| {
            let kind = match e.kind.as_str() {
                "blob" => EntryKind::File,
                "tree" => EntryKind::Directory,
                "commit" => EntryKind::Submodule,
                other => {
                    debug!("Skipping tree entry {} of type {}", e.path, other);
                    return None;
                }
            };
            let size = match kind {
                EntryKind::File => e.size.unwrap_or(0),
                _ => 0,
            };
            Some(RemoteEntry {
                path: e.path,
                kind,
                size,
            })
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct ApiContent {
    #[serde(default)]
    encoding: Option<String>,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    download_url: Option<String>,
}

/// Decode a base64 `content` field (GitHub wraps it at 60 columns).
fn decode_base64_content(path: &str, content: &str) -> Result<Vec<u8>, ReadError> {
    let compact: String = content.chars().filter(|c| !c.is_whitespace()).collect();
    base64::engine::general_purpose::STANDARD
        .decode(compact)
        .map_err(|_| ReadError::Decode {
            path: path.to_string(),
        })
}

fn into_text(path: &str, bytes: Vec<u8>) -> Result<String, ReadError> {
    String::from_utf8(bytes).map_err(|_| ReadError::Decode {
        path: path.to_string(),
    })
}

impl TreeSource for GitHubClient {
    fn list_tree(&self, location: &RepoLocation) -> Result<Vec<RemoteEntry>, FetchError> {
        let mut url = self.endpoint([
            "repos",
            location.account.as_str(),
            location.repository.as_str(),
            "git",
            "trees",
            location.branch.as_str(),
        ]);
        url.query_pairs_mut().append_pair("recursive", "1");

        let tree: ApiTree = self.get_json(&url)?;
        if tree.truncated {
            warn!(
                "Tree listing for {} was truncated by the API; some entries are missing",
                location
            );
        }
        Ok(tree_entries(tree))
    }

    fn read_text(&self, location: &RepoLocation, path: &str) -> Result<String, ReadError> {
        let mut segments = vec![
            "repos",
            location.account.as_str(),
            location.repository.as_str(),
            "contents",
        ];
        segments.extend(path.split('/').filter(|s| !s.is_empty()));
        let mut url = self.endpoint(segments);
        url.query_pairs_mut().append_pair("ref", &location.branch);

        let content: ApiContent = match self.get_json(&url) {
            Ok(c) => c,
            Err(FetchError::Status { status: 404, .. }) => {
                return Err(ReadError::NotFound {
                    path: path.to_string(),
                })
            }
            Err(e) => return Err(e.into()),
        };

        match (content.encoding.as_deref(), content.content.as_deref()) {
            (Some("base64"), Some(body)) if !body.is_empty() => {
                into_text(path, decode_base64_content(path, body)?)
            }
            _ => {
                // Files over 1 MB come back without inline content.
                let download = content.download_url.ok_or_else(|| ReadError::NotFound {
                    path: path.to_string(),
                })?;
                let download_url = Url::parse(&download).map_err(|e| {
                    ReadError::Fetch(FetchError::Decode {
                        url: download.clone(),
                        message: e.to_string(),
                    })
                })?;
                into_text(path, self.get_bytes(&download_url)?)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(api_url: &str) -> GitHubClient {
        GitHubClient::new(api_url, None, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_endpoint_encodes_segments() {
        let c = client("https://api.github.com");
        let url = c.endpoint(["repos", "acme", "tools", "contents", "docs", "a b.md"]);
        assert_eq!(
            url.as_str(),
            "https://api.github.com/repos/acme/tools/contents/docs/a%20b.md"
        );
    }

    #[test]
    fn test_endpoint_keeps_enterprise_prefix() {
        let c = client("https://github.example.com/api/v3/");
        let url = c.endpoint(["users", "acme", "repos"]);
        assert_eq!(url.as_str(), "https://github.example.com/api/v3/users/acme/repos");
    }

    #[test]
    fn test_rejects_non_http_url() {
        assert!(matches!(
            GitHubClient::new("file:///tmp", None, Duration::from_secs(5)),
            Err(InventoryError::Config(_))
        ));
        assert!(GitHubClient::new("::", None, Duration::from_secs(5)).is_err());
    }

    #[test]
    fn test_repository_mapping() {
        let json = r#"[
            {"name": "tools", "default_branch": "trunk", "description": null,
             "archived": true, "fork": false, "open_issues": 4,
             "stargazers_count": 31, "forks_count": 2, "size": 1024,
             "html_url": "https://github.com/acme/tools"},
            {"name": "empty", "default_branch": null, "description": "nothing yet"}
        ]"#;
        let repos: Vec<ApiRepository> = serde_json::from_str(json).unwrap();
        let records: Vec<RepositoryRecord> = repos.into_iter().map(Into::into).collect();

        assert_eq!(
            records[0],
            RepositoryRecord {
                name: "tools".to_string(),
                default_branch: "trunk".to_string(),
                description: String::new(),
                archived: true,
                is_fork: false,
                issues: 4,
                stars: 31,
                forks: 2,
                size: 1024,
            }
        );
        assert_eq!(records[1].default_branch, "main");
        assert_eq!(records[1].description, "nothing yet");
        assert_eq!(records[1].stars, 0);
    }

    #[test]
    fn test_tree_entry_kinds() {
        let json = r#"{
            "sha": "abc",
            "tree": [
                {"path": "src", "type": "tree", "sha": "1"},
                {"path": "src/lib.rs", "type": "blob", "size": 120, "sha": "2"},
                {"path": "vendor/dep", "type": "commit", "sha": "3"},
                {"path": "odd", "type": "tag", "sha": "4"}
            ],
            "truncated": false
        }"#;
        let entries = tree_entries(serde_json::from_str(json).unwrap());
        assert_eq!(
            entries,
            vec![
                RemoteEntry {
                    path: "src".to_string(),
                    kind: EntryKind::Directory,
                    size: 0
                },
                RemoteEntry {
                    path: "src/lib.rs".to_string(),
                    kind: EntryKind::File,
                    size: 120
                },
                RemoteEntry {
                    path: "vendor/dep".to_string(),
                    kind: EntryKind::Submodule,
                    size: 0
                },
            ]
        );
    }

    #[test]
    fn test_decode_wrapped_base64() {
        // "hello, world\n" split across lines as the API does.
        let bytes = decode_base64_content("a.txt", "aGVsbG8s\nIHdvcmxk\nCg==\n").unwrap();
        assert_eq!(into_text("a.txt", bytes).unwrap(), "hello, world\n");
    }

    #[test]
    fn test_decode_errors() {
        assert!(matches!(
            decode_base64_content("a.bin", "!!!"),
            Err(ReadError::Decode { .. })
        ));
        assert!(matches!(
            into_text("a.bin", vec![0xff, 0xfe]),
            Err(ReadError::Decode { .. })
        ));
    }

    #[test]
    fn test_unreachable_host_is_transport_error() {
        let c = client("http://127.0.0.1:9");
        let err = c.list_repositories("acme").unwrap_err();
        assert!(matches!(err, FetchError::Transport { .. }));
    }
}
