//! TOML configuration and credential resolution.
//!
//! Every section is optional; a missing file section takes the defaults
//! below. CLI flags are applied on top of the loaded values in `main`.
//!
//! ```toml
//! [github]
//! api_url = "https://api.github.com"
//! token = "ghp_..."
//! timeout_secs = 30
//! auth_helper = true
//!
//! [cache]
//! enabled = true
//! dir = "/home/me/.cache/repo-inventory"
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::cache::RepositoryCache;
use crate::github::DEFAULT_API_URL;

/// Environment variable consulted when no token is configured.
pub const TOKEN_ENV_VAR: &str = "GITHUB_TOKEN";

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub github: GitHubConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GitHubConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Ask `gh auth token` for a credential when none is configured.
    #[serde(default = "default_true")]
    pub auth_helper: bool,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            token: None,
            timeout_secs: default_timeout_secs(),
            auth_helper: true,
        }
    }
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    /// When false, every run refreshes from the remote (still writing the
    /// cache and still falling back to it).
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: None,
        }
    }
}

impl CacheConfig {
    /// The configured cache directory, or the per-user default.
    pub fn resolve_dir(&self) -> Result<PathBuf> {
        match &self.dir {
            Some(dir) => Ok(dir.clone()),
            None => RepositoryCache::default_dir()
                .context("Could not determine a user cache directory; set [cache].dir"),
        }
    }
}

/// Default config location: `<user config dir>/repo-inventory/config.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(crate::APP_NAME).join("config.toml"))
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.github.timeout_secs == 0 {
        bail!("github.timeout_secs must be > 0");
    }

    let url = reqwest::Url::parse(&config.github.api_url)
        .with_context(|| format!("github.api_url is not a valid URL: {}", config.github.api_url))?;
    match url.scheme() {
        "http" | "https" => {}
        other => bail!("github.api_url must use http or https, got '{}'", other),
    }

    Ok(())
}

/// Resolve the credential once at startup.
///
/// Order: explicit value, then `GITHUB_TOKEN`, then the `gh` helper (when
/// enabled). Empty strings count as absent.
pub fn resolve_token(explicit: Option<String>, use_helper: bool) -> Option<String> {
    resolve_token_with(
        explicit,
        std::env::var(TOKEN_ENV_VAR).ok(),
        use_helper.then_some(token_from_helper as fn() -> Option<String>),
    )
}

fn resolve_token_with(
    explicit: Option<String>,
    env: Option<String>,
    helper: Option<fn() -> Option<String>>,
) -> Option<String> {
    let non_empty = |s: String| {
        let s = s.trim().to_string();
        (!s.is_empty()).then_some(s)
    };

    let token = explicit
        .and_then(non_empty)
        .or_else(|| env.and_then(non_empty))
        .or_else(|| helper.and_then(|h| h()).and_then(non_empty));

    if token.is_none() {
        tracing::warn!(
            "No GitHub token found; file listings may be unavailable and repository listings are rate limited"
        );
    }
    token
}

fn token_from_helper() -> Option<String> {
    let output = Command::new("gh").args(["auth", "token"]).output().ok()?;
    if !output.status.success() {
        tracing::debug!("`gh auth token` exited with {}", output.status);
        return None;
    }
    Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.github.api_url, DEFAULT_API_URL);
        assert_eq!(config.github.timeout_secs, 30);
        assert!(config.github.auth_helper);
        assert!(config.cache.enabled);
        assert!(config.cache.dir.is_none());
    }

    #[test]
    fn test_load_config_sections() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[github]
api_url = "https://github.example.com/api/v3"
token = "abc"
timeout_secs = 5
auth_helper = false

[cache]
enabled = false
dir = "/tmp/inventory-cache"
"#,
        )
        .unwrap();

        let config = load_config(&path).unwrap();
        assert_eq!(config.github.api_url, "https://github.example.com/api/v3");
        assert_eq!(config.github.token.as_deref(), Some("abc"));
        assert_eq!(config.github.timeout_secs, 5);
        assert!(!config.github.auth_helper);
        assert!(!config.cache.enabled);
        assert_eq!(
            config.cache.resolve_dir().unwrap(),
            PathBuf::from("/tmp/inventory-cache")
        );
    }

    #[test]
    fn test_validation_errors() {
        let mut config = Config::default();
        config.github.timeout_secs = 0;
        assert!(validate(&config).is_err());

        let mut config = Config::default();
        config.github.api_url = "ftp://example.com".to_string();
        let err = validate(&config).unwrap_err().to_string();
        assert!(err.contains("http or https"));

        let mut config = Config::default();
        config.github.api_url = "not a url".to_string();
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_missing_file_is_error() {
        let err = load_config(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn test_token_resolution_order() {
        fn helper() -> Option<String> {
            Some("from-helper\n".to_string())
        }

        assert_eq!(
            resolve_token_with(Some("flag".into()), Some("env".into()), Some(helper)),
            Some("flag".to_string())
        );
        assert_eq!(
            resolve_token_with(Some("  ".into()), Some("env".into()), Some(helper)),
            Some("env".to_string())
        );
        assert_eq!(
            resolve_token_with(None, Some(String::new()), Some(helper)),
            Some("from-helper".to_string())
        );
        assert_eq!(resolve_token_with(None, None, None), None);
    }
}
