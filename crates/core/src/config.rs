//! Configuration for the activity importer.
//!
//! Secrets and identities come from environment variables; non-secret tuning
//! knobs come from an optional TOML file. Both are resolved once into an
//! immutable [`ImporterConfig`] that is passed by reference to every
//! component, so nothing else reads the environment.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::ConfigError;

// ---------------------------------------------------------------------------
// Environment variable names
// ---------------------------------------------------------------------------

pub const ENV_GITLAB_BASE_URL: &str = "BASE_URL";
pub const ENV_GITLAB_TOKEN: &str = "GITLAB_TOKEN";
pub const ENV_GITLAB_USERNAME: &str = "GITLAB_USERNAME";
pub const ENV_COMMITTER_NAME: &str = "GH_USERNAME";
pub const ENV_COMMITTER_EMAIL: &str = "COMMITER_EMAIL";
pub const ENV_ORIGIN_REPO_URL: &str = "ORIGIN_REPO_URL";
pub const ENV_ORIGIN_TOKEN: &str = "ORIGIN_TOKEN";
pub const ENV_CODEBERG_BASE_URL: &str = "CODEBERG_BASE_URL";
pub const ENV_CODEBERG_USERNAME: &str = "CODEBERG_USERNAME";
pub const ENV_CODEBERG_TOKEN: &str = "CODEBERG_TOKEN";

/// Required variables, in the order they are reported when missing.
const REQUIRED_ENV: [&str; 7] = [
    ENV_GITLAB_BASE_URL,
    ENV_GITLAB_TOKEN,
    ENV_GITLAB_USERNAME,
    ENV_COMMITTER_NAME,
    ENV_COMMITTER_EMAIL,
    ENV_ORIGIN_REPO_URL,
    ENV_ORIGIN_TOKEN,
];

// ---------------------------------------------------------------------------
// Resolved config
// ---------------------------------------------------------------------------

/// Fully resolved, validated configuration for one run.
#[derive(Debug, Clone)]
pub struct ImporterConfig {
    /// GitLab connection settings.
    pub primary: SourceConfig,

    /// Codeberg connection settings; `None` unless all three values are set.
    pub secondary: Option<SourceConfig>,

    /// Local mirror and origin remote settings.
    pub mirror: MirrorConfig,

    /// Non-secret settings from the TOML file (or defaults).
    pub settings: ImporterSection,
}

/// Connection settings for one remote platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceConfig {
    pub base_url: String,
    pub token: String,
    pub username: String,
}

impl SourceConfig {
    /// A source is usable only when every field is non-empty.
    pub fn is_enabled(&self) -> bool {
        !self.base_url.is_empty() && !self.token.is_empty() && !self.username.is_empty()
    }
}

/// Where the local mirror lives and how its commits are signed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorConfig {
    pub repo_dir: PathBuf,
    pub branch: String,
    pub origin_url: String,
    pub origin_token: String,
    pub committer_name: String,
    pub committer_email: String,
}

// ---------------------------------------------------------------------------
// TOML file
// ---------------------------------------------------------------------------

/// Shape of the optional TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub importer: ImporterSection,
}

/// The `[importer]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImporterSection {
    /// Minimum tracing level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Path of the local mirror checkout.
    #[serde(default = "default_repo_dir")]
    pub repo_dir: PathBuf,

    /// Branch that receives mirrored commits and is pushed to origin.
    #[serde(default = "default_branch")]
    pub branch: String,

    /// Per-request HTTP timeout for the source clients.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Capacity of the queue between fetch tasks and the importer.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_log_level() -> String {
    "info".into()
}

fn default_repo_dir() -> PathBuf {
    PathBuf::from("./repo")
}

fn default_branch() -> String {
    "main".into()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_queue_capacity() -> usize {
    16
}

impl Default for ImporterSection {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            repo_dir: default_repo_dir(),
            branch: default_branch(),
            request_timeout_secs: default_request_timeout(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl ImporterSection {
    /// Load the `[importer]` table from a TOML file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading importer configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let file: FileConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        debug!("importer configuration parsed successfully");
        Ok(file.importer)
    }

    /// Load the table from `path` after tilde expansion, or fall back to
    /// the defaults when no path is given.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(p) => Self::load_from_file(expand_tilde(p)),
            None => Ok(Self::default()),
        }
    }

    /// Validate that all settings are usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.branch.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "importer.branch".into(),
                detail: "branch must not be empty".into(),
            });
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "importer.request_timeout_secs".into(),
                detail: "request timeout must be > 0".into(),
            });
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                field: "importer.queue_capacity".into(),
                detail: "queue capacity must be > 0".into(),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Loading & resolving
// ---------------------------------------------------------------------------

impl ImporterConfig {
    /// Resolve `settings` against the process environment.
    pub fn from_env(settings: ImporterSection) -> Result<Self, ConfigError> {
        Self::from_lookup(settings, |name| std::env::var(name).ok())
    }

    /// Build a config from `settings` and a variable lookup function.
    ///
    /// Empty values are treated as unset. Every missing required variable is
    /// reported in one error.
    pub fn from_lookup<F>(settings: ImporterSection, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        settings.validate()?;

        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let missing: Vec<String> = REQUIRED_ENV
            .iter()
            .filter(|name| get(name).is_none())
            .map(|name| name.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::MissingEnvVars(missing));
        }

        let require = |name: &str| get(name).unwrap_or_default();

        let primary = SourceConfig {
            base_url: require(ENV_GITLAB_BASE_URL),
            token: require(ENV_GITLAB_TOKEN),
            username: require(ENV_GITLAB_USERNAME),
        };

        let candidate = SourceConfig {
            base_url: get(ENV_CODEBERG_BASE_URL).unwrap_or_default(),
            token: get(ENV_CODEBERG_TOKEN).unwrap_or_default(),
            username: get(ENV_CODEBERG_USERNAME).unwrap_or_default(),
        };
        let secondary = if candidate.is_enabled() {
            info!(base_url = %candidate.base_url, "codeberg sync enabled");
            Some(candidate)
        } else {
            debug!("codeberg sync disabled (base URL, username and token are all required)");
            None
        };

        let mirror = MirrorConfig {
            repo_dir: expand_tilde(&settings.repo_dir),
            branch: settings.branch.clone(),
            origin_url: require(ENV_ORIGIN_REPO_URL),
            origin_token: require(ENV_ORIGIN_TOKEN),
            committer_name: require(ENV_COMMITTER_NAME),
            committer_email: require(ENV_COMMITTER_EMAIL),
        };

        Ok(Self {
            primary,
            secondary,
            mirror,
            settings,
        })
    }

    /// Whether the Codeberg source takes part in this run.
    pub fn is_secondary_enabled(&self) -> bool {
        self.secondary.is_some()
    }

    /// Generate a default TOML config template string.
    pub fn default_template() -> &'static str {
        r#"# Activity importer configuration.
# Secrets and identities are read from the environment:
#   BASE_URL, GITLAB_TOKEN, GITLAB_USERNAME, GH_USERNAME, COMMITER_EMAIL,
#   ORIGIN_REPO_URL, ORIGIN_TOKEN
# Optional Codeberg sync (all three required):
#   CODEBERG_BASE_URL, CODEBERG_USERNAME, CODEBERG_TOKEN

[importer]
log_level = "info"
repo_dir = "./repo"
branch = "main"
request_timeout_secs = 30
queue_capacity = 16
"#
    }
}

/// Expand a leading `~/` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    path.to_path_buf()
}
