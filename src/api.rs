use crate::config::Credentials;
use crate::consts::API_TIMEOUT;
use crate::signer::{sign, SignError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use time::OffsetDateTime;

/// Client for making signed calls to the cloud API
#[derive(Clone, Debug)]
pub(crate) struct ApiClient {
    http: reqwest::Client,
    credentials: Credentials,

    /// URL that every call is POSTed to: `https://{endpoint}/`
    base_url: String,

    timeout: Duration,
}

impl ApiClient {
    pub(crate) fn new(credentials: Credentials) -> Result<ApiClient, ApiError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(ApiError::Build)?;
        let base_url = format!("https://{}/", credentials.endpoint);
        Ok(ApiClient::with_http(http, credentials, base_url, API_TIMEOUT))
    }

    /// Build a client around an existing HTTP client that posts to
    /// `base_url`.  The `Host` header is still signed and sent as the
    /// credentials' endpoint.
    pub(crate) fn with_http(
        http: reqwest::Client,
        credentials: Credentials,
        base_url: String,
        timeout: Duration,
    ) -> ApiClient {
        ApiClient {
            http,
            credentials,
            base_url,
            timeout,
        }
    }

    /// The underlying HTTP client, shared with result downloads
    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Call `action` with `payload` and return the contents of the response's
    /// `"Response"` object.
    ///
    /// A response whose `"Response"` object contains an `"Error"` is returned
    /// as [`ApiError::Remote`].  Nothing is retried.
    #[tracing::instrument(skip_all, fields(action = %action))]
    pub(crate) async fn call<P: Serialize + ?Sized + Sync>(
        &self,
        action: &str,
        payload: &P,
    ) -> Result<Value, ApiError> {
        let timestamp = OffsetDateTime::now_utc().unix_timestamp();
        let signed = sign(&self.credentials, action, payload, timestamp)?;
        tracing::debug!(url = %self.base_url, content_hash = %signed.content_hash, "Sending signed request");
        let mut req = self.http.post(&self.base_url).timeout(self.timeout);
        for (name, value) in &signed.headers {
            req = req.header(*name, value);
        }
        let resp = req
            .body(signed.body)
            .send()
            .await
            .map_err(|source| self.transport_error(action, source))?;
        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|source| self.transport_error(action, source))?;
        if !status.is_success() {
            return Err(ApiError::Http {
                action: action.to_owned(),
                status: status.as_u16(),
                body,
            });
        }
        parse_envelope(action, &body)
    }

    fn transport_error(&self, action: &str, source: reqwest::Error) -> ApiError {
        if source.is_timeout() {
            ApiError::Timeout {
                action: action.to_owned(),
                timeout: self.timeout,
            }
        } else {
            ApiError::Network {
                action: action.to_owned(),
                source,
            }
        }
    }
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
struct Envelope {
    #[serde(rename = "Response")]
    response: Option<Value>,
}

#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
struct RemoteError {
    #[serde(rename = "Code", default)]
    code: Option<String>,
    #[serde(rename = "Message", default)]
    message: Option<String>,
}

/// Unwrap the `{"Response": {...}}` envelope of an API reply, turning an
/// embedded `"Error"` into [`ApiError::Remote`]
pub(crate) fn parse_envelope(action: &str, body: &str) -> Result<Value, ApiError> {
    let envelope = serde_json::from_str::<Envelope>(body).map_err(|source| ApiError::Decode {
        action: action.to_owned(),
        source,
    })?;
    let Some(response) = envelope.response else {
        return Err(ApiError::MissingField {
            action: action.to_owned(),
            field: "Response",
        });
    };
    let request_id = response
        .get("RequestId")
        .and_then(Value::as_str)
        .map(ToOwned::to_owned);
    if let Some(err) = response.get("Error").filter(|e| !e.is_null()) {
        let err = RemoteError::deserialize(err).unwrap_or_else(|_| RemoteError {
            code: None,
            message: Some(err.to_string()),
        });
        return Err(ApiError::Remote {
            action: action.to_owned(),
            code: err.code.unwrap_or_else(|| String::from("Unknown")),
            message: err.message.unwrap_or_else(|| String::from("No message")),
            request_id,
        });
    }
    tracing::debug!(action, request_id, "Received API response");
    Ok(response)
}

#[derive(Debug, Error)]
pub(crate) enum ApiError {
    #[error("failed to initialize HTTP client")]
    Build(#[source] reqwest::Error),
    #[error(transparent)]
    Sign(#[from] SignError),
    #[error("network error calling {action}")]
    Network {
        action: String,
        source: reqwest::Error,
    },
    #[error("{action} request timed out after {timeout:?}")]
    Timeout { action: String, timeout: Duration },
    #[error("API request {action} failed ({status}): {body}")]
    Http {
        action: String,
        status: u16,
        body: String,
    },
    #[error("failed to decode response to {action}")]
    Decode {
        action: String,
        source: serde_json::Error,
    },
    #[error("response to {action} is missing {field}")]
    MissingField {
        action: String,
        field: &'static str,
    },
    #[error("{action} returned error {code}: {message}{}", request_id_suffix(.request_id.as_deref()))]
    Remote {
        action: String,
        code: String,
        message: String,
        request_id: Option<String>,
    },
}

fn request_id_suffix(request_id: Option<&str>) -> String {
    request_id
        .map(|r| format!(" (request ID {r})"))
        .unwrap_or_default()
}
