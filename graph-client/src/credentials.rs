//! Access token and the YAML testing-data file that supplies it.

use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// Opaque access token. Never printed: `Debug` is redacted.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    /// Returns `None` for an empty or blank token
    pub fn new(token: impl Into<String>) -> Option<Self> {
        let token = token.into();
        let trimmed = token.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CredentialsError {
    #[error("cannot read testing data {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed testing data {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("no oauth_token in {path}; store a valid token there to run authenticated tests")]
    MissingToken { path: PathBuf },
}

/// Contents of the testing-data file (e.g. `graph_data.yml`)
///
/// ```yaml
/// oauth_token: "..."
/// app_id: "..."
/// secret: "..."
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TestingData {
    #[serde(default)]
    oauth_token: Option<String>,
    #[serde(default)]
    pub app_id: Option<String>,
    #[serde(default)]
    pub secret: Option<String>,
    #[serde(default)]
    pub cookie_hash: Option<serde_yaml::Mapping>,
    #[serde(skip)]
    source: PathBuf,
}

impl TestingData {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CredentialsError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| CredentialsError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&raw, path)
    }

    fn parse(raw: &str, path: &Path) -> Result<Self, CredentialsError> {
        // An empty file is valid YAML for "no keys at all"
        let mut data: TestingData = if raw.trim().is_empty() {
            TestingData::default()
        } else {
            serde_yaml::from_str(raw).map_err(|source| CredentialsError::Malformed {
                path: path.to_path_buf(),
                source,
            })?
        };
        data.source = path.to_path_buf();
        Ok(data)
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn has_access_token(&self) -> bool {
        self.oauth_token.as_deref().and_then(AccessToken::new).is_some()
    }

    pub fn access_token(&self) -> Result<AccessToken, CredentialsError> {
        self.oauth_token
            .as_deref()
            .and_then(AccessToken::new)
            .ok_or_else(|| CredentialsError::MissingToken {
                path: self.source.clone(),
            })
    }
}

/// Load the testing-data file and extract its token in one step
pub fn load_access_token(path: impl AsRef<Path>) -> Result<AccessToken, CredentialsError> {
    TestingData::load(path)?.access_token()
}
