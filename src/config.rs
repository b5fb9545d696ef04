use crate::consts::{
    DEFAULT_ENDPOINT, DEFAULT_REGION, HOME_SECRETS_FILENAME, LOCAL_SECRETS_FILENAME,
    SECRETS_PATH_ENV,
};
use serde::Deserialize;
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// API credentials and connection settings, loaded once at startup
#[derive(Clone, Eq, PartialEq)]
pub(crate) struct Credentials {
    pub(crate) secret_id: String,
    pub(crate) secret_key: String,
    pub(crate) region: String,

    /// API host, without scheme or path
    pub(crate) endpoint: String,

    /// Object storage bucket for uploading local inputs (unused by this tool,
    /// but accepted so that one secrets file serves the whole tool set)
    pub(crate) cos_bucket: Option<String>,
    pub(crate) cos_region: Option<String>,
}

impl Credentials {
    /// Load credentials from the first existing secrets file among the
    /// locations produced by `locator`.  A path given on the command line
    /// must exist; the other locations are skipped if absent.
    pub(crate) fn load(locator: &SecretsLocator) -> Result<Credentials, ConfigError> {
        let candidates = locator.candidates();
        let required = locator.explicit_path();
        for path in &candidates {
            let content = match fs_err::read_to_string(path) {
                Ok(content) => content,
                Err(source) if source.kind() == ErrorKind::NotFound => {
                    if required.as_ref() == Some(path) {
                        return Err(ConfigError::ExplicitMissing {
                            path: path.clone(),
                            source,
                        });
                    }
                    continue;
                }
                Err(source) => {
                    return Err(ConfigError::Read {
                        path: path.clone(),
                        searched: SearchedPaths(candidates.clone()),
                        source,
                    })
                }
            };
            tracing::debug!(path = %path.display(), "Reading secrets file");
            let raw = match serde_json::from_str::<RawSecrets>(&content) {
                Ok(raw) => raw,
                Err(source) => {
                    return Err(ConfigError::Parse {
                        path: path.clone(),
                        searched: SearchedPaths(candidates.clone()),
                        source,
                    })
                }
            };
            return raw.into_credentials().map_err(|field| ConfigError::MissingField {
                path: path.clone(),
                field,
                searched: SearchedPaths(candidates.clone()),
            });
        }
        Err(ConfigError::NotFound {
            searched: SearchedPaths(candidates),
        })
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("secret_id", &self.secret_id)
            .field("secret_key", &"<redacted>")
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("cos_bucket", &self.cos_bucket)
            .field("cos_region", &self.cos_region)
            .finish()
    }
}

/// The secrets file as it appears on disk.  Every key is optional here so
/// that missing required keys can be reported by name.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
struct RawSecrets {
    #[serde(default)]
    secret_id: Option<String>,
    #[serde(default)]
    secret_key: Option<String>,
    #[serde(default)]
    region: Option<String>,
    #[serde(default)]
    endpoint: Option<String>,
    #[serde(default)]
    cos_bucket: Option<String>,
    #[serde(default)]
    cos_region: Option<String>,
}

impl RawSecrets {
    fn into_credentials(self) -> Result<Credentials, &'static str> {
        let Some(secret_id) = nonblank(self.secret_id) else {
            return Err("secret_id");
        };
        let Some(secret_key) = nonblank(self.secret_key) else {
            return Err("secret_key");
        };
        Ok(Credentials {
            secret_id,
            secret_key,
            region: nonblank(self.region).unwrap_or_else(|| DEFAULT_REGION.to_owned()),
            endpoint: nonblank(self.endpoint).unwrap_or_else(|| DEFAULT_ENDPOINT.to_owned()),
            cos_bucket: nonblank(self.cos_bucket),
            cos_region: nonblank(self.cos_region),
        })
    }
}

fn nonblank(s: Option<String>) -> Option<String> {
    s.map(|s| s.trim().to_owned()).filter(|s| !s.is_empty())
}

/// Determines where to look for the secrets file
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub(crate) struct SecretsLocator {
    /// Path given on the command line; replaces the environment variable
    explicit: Option<PathBuf>,

    /// Value of `$HY3D_SECRETS_PATH`, if set and nonempty
    env_path: Option<PathBuf>,

    /// The current working directory
    cwd: Option<PathBuf>,

    /// The user's home directory
    home: Option<PathBuf>,
}

impl SecretsLocator {
    /// Build a locator from the process environment
    pub(crate) fn from_env(explicit: Option<PathBuf>) -> SecretsLocator {
        SecretsLocator {
            explicit,
            env_path: std::env::var_os(SECRETS_PATH_ENV)
                .filter(|s| !s.is_empty())
                .map(PathBuf::from),
            cwd: std::env::current_dir().ok(),
            home: dirs::home_dir(),
        }
    }

    /// The path given on the command line, with `~` expanded
    fn explicit_path(&self) -> Option<PathBuf> {
        self.explicit
            .as_deref()
            .map(|p| expand_tilde(p, self.home.as_deref()))
    }

    /// Return the candidate secrets file paths in lookup order
    pub(crate) fn candidates(&self) -> Vec<PathBuf> {
        let mut paths = Vec::new();
        if let Some(p) = self.explicit.as_ref().or(self.env_path.as_ref()) {
            paths.push(expand_tilde(p, self.home.as_deref()));
        }
        if let Some(ref cwd) = self.cwd {
            paths.push(cwd.join(LOCAL_SECRETS_FILENAME));
        }
        if let Some(ref home) = self.home {
            paths.push(home.join(HOME_SECRETS_FILENAME));
        }
        paths
    }
}

fn expand_tilde(p: &Path, home: Option<&Path>) -> PathBuf {
    match (p.strip_prefix("~"), home) {
        (Ok(rest), Some(home)) => home.join(rest),
        _ => p.to_owned(),
    }
}

/// The list of locations searched for a secrets file, displayed as an
/// indented bullet list
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct SearchedPaths(Vec<PathBuf>);

impl fmt::Display for SearchedPaths {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for p in &self.0 {
            write!(f, "\n  - {}", p.display())?;
        }
        Ok(())
    }
}

#[derive(Debug, Error)]
pub(crate) enum ConfigError {
    #[error("no secrets file found; create one of the following files:{searched}")]
    NotFound { searched: SearchedPaths },
    #[error("secrets file {} given with --secrets does not exist", .path.display())]
    ExplicitMissing {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to read secrets file {}; searched locations:{searched}", .path.display())]
    Read {
        path: PathBuf,
        searched: SearchedPaths,
        source: std::io::Error,
    },
    #[error("failed to parse secrets JSON in {}; searched locations:{searched}", .path.display())]
    Parse {
        path: PathBuf,
        searched: SearchedPaths,
        source: serde_json::Error,
    },
    #[error("missing {field} in {}; searched locations:{searched}", .path.display())]
    MissingField {
        path: PathBuf,
        field: &'static str,
        searched: SearchedPaths,
    },
}
