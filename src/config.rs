//! Configuration management for wynbot
//!
//! A single TOML file holds the OAuth2 client credentials plus optional path
//! overrides. The file is rewritten in place (temp-file-then-rename) when a
//! refresh token is newly issued, so an interrupted write never loses the
//! previous credentials.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Name of the config file inside the config directory
pub const CONFIG_FILE: &str = "wynbot.toml";
/// Default corpus file name
pub const CORPUS_FILE: &str = "corpus.txt";
/// Default model cache file name
pub const MODEL_CACHE_FILE: &str = "markov_chain.json";

/// wynbot configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// OAuth2 client credentials
    pub auth: AuthConfig,

    /// File location overrides
    #[serde(default)]
    pub paths: PathsConfig,
}

/// OAuth2 client credentials
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    /// OAuth2 client id
    pub client_id: String,

    /// OAuth2 client secret
    pub client_secret: String,

    /// Long-lived refresh token; empty until first interactive authorization
    #[serde(default)]
    pub refresh_token: String,
}

/// File location overrides, all relative to the config directory when unset
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Training corpus file (`.txt` or `.json`)
    pub corpus: Option<PathBuf>,

    /// Serialized model cache file
    pub model_cache: Option<PathBuf>,

    /// Chat export archive to build the corpus from
    pub archive: Option<PathBuf>,
}

/// Return the default config directory, creating it if needed
///
/// Uses `~/.config/wynbot/` on Linux.
#[must_use]
pub fn default_config_dir() -> PathBuf {
    let dir = directories::ProjectDirs::from("", "", "wynbot")
        .map_or_else(|| PathBuf::from(".wynbot"), |d| d.config_dir().to_path_buf());

    if let Err(e) = fs::create_dir_all(&dir) {
        tracing::warn!(
            path = %dir.display(),
            error = %e,
            "failed to create config directory"
        );
    }

    dir
}

impl Config {
    /// Load configuration from a file
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or not valid TOML.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        let config: Self = toml::from_str(&raw)?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Write configuration back to a file, atomically
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn store(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("cannot serialize config: {e}")))?;

        let tmp = path.with_extension("toml.tmp");
        fs::write(&tmp, contents)?;
        fs::rename(&tmp, path)?;
        tracing::debug!(path = %path.display(), "configuration written");
        Ok(())
    }

    /// Resolve the corpus path against the config directory
    #[must_use]
    pub fn corpus_path(&self, config_dir: &Path) -> PathBuf {
        self.paths
            .corpus
            .clone()
            .unwrap_or_else(|| config_dir.join(CORPUS_FILE))
    }

    /// Resolve the model cache path against the config directory
    #[must_use]
    pub fn model_cache_path(&self, config_dir: &Path) -> PathBuf {
        self.paths
            .model_cache
            .clone()
            .unwrap_or_else(|| config_dir.join(MODEL_CACHE_FILE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);

        let config = Config {
            auth: AuthConfig {
                client_id: "id".into(),
                client_secret: "secret".into(),
                refresh_token: "token".into(),
            },
            paths: PathsConfig::default(),
        };
        config.store(&path).unwrap();

        let back = Config::load(&path).unwrap();
        assert_eq!(back.auth.refresh_token, "token");
        assert_eq!(back.auth.client_id, "id");
    }

    #[test]
    fn refresh_token_defaults_to_empty() {
        let config: Config =
            toml::from_str("[auth]\nclient_id = \"a\"\nclient_secret = \"b\"\n").unwrap();
        assert!(config.auth.refresh_token.is_empty());
    }

    #[test]
    fn paths_resolve_against_the_config_dir() {
        let config = Config::default();
        let dir = Path::new("/tmp/wynbot");
        assert_eq!(config.corpus_path(dir), dir.join(CORPUS_FILE));
        assert_eq!(config.model_cache_path(dir), dir.join(MODEL_CACHE_FILE));
    }

    #[test]
    fn missing_config_is_a_config_error() {
        let err = Config::load(Path::new("/nonexistent/wynbot.toml")).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
