use std::time::Duration;

/// Default region used when the secrets file does not name one
pub(crate) static DEFAULT_REGION: &str = "ap-singapore";

/// Default API host used when the secrets file does not name one
pub(crate) static DEFAULT_ENDPOINT: &str = "hunyuan.intl.tencentcloudapi.com";

/// Name of the cloud service, as used in the credential scope
pub(crate) static SERVICE: &str = "hunyuan";

/// API version sent in the `X-TC-Version` header
pub(crate) static API_VERSION: &str = "2023-09-01";

/// Environment variable naming an explicit secrets file
pub(crate) static SECRETS_PATH_ENV: &str = "HY3D_SECRETS_PATH";

/// Name of the secrets file looked up in the current directory
pub(crate) static LOCAL_SECRETS_FILENAME: &str = "secrets.json";

/// Name of the secrets dotfile looked up in the home directory
pub(crate) static HOME_SECRETS_FILENAME: &str = ".hy-3d-secrets.json";

/// Prefix for temporary files created while downloading results
pub(crate) static DOWNLOAD_TEMP_PREFIX: &str = ".hy3d.download.";

/// Default time to wait between job status queries
pub(crate) const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);

/// Timeout for a single signed API call
pub(crate) const API_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout for downloading a single result file
pub(crate) const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);
