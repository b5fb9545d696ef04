use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier of a remote job, as returned at submission
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(transparent)]
pub(crate) struct JobId(String);

impl JobId {
    pub(crate) fn new<S: Into<String>>(s: S) -> JobId {
        JobId(s.into())
    }

    pub(crate) fn as_str(&self) -> &str {
        &self.0
    }

    /// Job IDs are normally numeric strings; anything other than
    /// alphanumerics, `-`, and `_` suggests a copy-paste mistake.
    pub(crate) fn looks_valid(&self) -> bool {
        !self.0.is_empty()
            && self
                .0
                .chars()
                .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload of every job status query
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub(crate) struct JobQuery<'a> {
    #[serde(rename = "JobId")]
    pub(crate) job_id: &'a JobId,
}

/// The statuses a job moves through.  `Done` and `Fail` are terminal.
#[derive(Clone, Copy, Debug, strum::Display, strum::EnumString, Eq, PartialEq)]
#[strum(serialize_all = "UPPERCASE")]
pub(crate) enum JobStatus {
    Wait,
    Run,
    Done,
    Fail,
}

impl JobStatus {
    pub(crate) fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Fail)
    }
}

/// One answer to a job status query
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
pub(crate) struct JobState {
    /// The status string exactly as reported
    #[serde(rename = "Status", default)]
    pub(crate) raw_status: Option<String>,

    #[serde(rename = "ErrorCode", default)]
    pub(crate) error_code: Option<String>,

    #[serde(rename = "ErrorMessage", default)]
    pub(crate) error_message: Option<String>,

    /// Output artifacts, read from the endpoint's result field
    #[serde(skip)]
    pub(crate) results: Vec<ResultDescriptor>,

    /// The complete `"Response"` object this state was decoded from
    #[serde(skip)]
    pub(crate) raw: serde_json::Value,
}

impl JobState {
    /// Decode a job state from the `"Response"` object of a status query,
    /// taking the results from `result_field` and keeping the object itself
    /// for `--json` output
    pub(crate) fn from_response(
        response: serde_json::Value,
        result_field: &str,
    ) -> Result<JobState, serde_json::Error> {
        let mut state = JobState::deserialize(&response)?;
        state.results = decode_results(response.get(result_field))?;
        state.raw = response;
        Ok(state)
    }

    /// The parsed status, or `None` if the service reported no status or one
    /// this client does not know (both are treated as still in progress)
    pub(crate) fn status(&self) -> Option<JobStatus> {
        self.raw_status.as_deref()?.parse().ok()
    }

    pub(crate) fn status_label(&self) -> &str {
        self.raw_status.as_deref().unwrap_or("<none>")
    }

    pub(crate) fn error_code(&self) -> &str {
        self.error_code
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or("Unknown")
    }

    pub(crate) fn error_message(&self) -> &str {
        self.error_message
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or("Unknown error")
    }
}

/// One output artifact of a completed job
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(from = "RawResultFile")]
pub(crate) struct ResultDescriptor {
    /// Download URL; empty if the service sent none
    pub(crate) url: String,

    /// File type tag, e.g. `"GLB"` or `"OBJ"`
    pub(crate) kind: Option<String>,

    pub(crate) preview_image_url: Option<String>,
}

impl ResultDescriptor {
    pub(crate) fn from_url<S: Into<String>>(url: S) -> ResultDescriptor {
        ResultDescriptor {
            url: url.into(),
            kind: None,
            preview_image_url: None,
        }
    }
}

/// Result entries arrive either as objects or as bare URL strings.  Objects
/// have been seen with the URL under `Url`, `FileUrl`, or `url`.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(untagged)]
enum RawResultFile {
    Bare(String),
    Object {
        #[serde(rename = "Url", default)]
        url: Option<String>,
        #[serde(rename = "FileUrl", default)]
        file_url: Option<String>,
        #[serde(rename = "url", default)]
        lower_url: Option<String>,
        #[serde(rename = "Type", default)]
        kind: Option<String>,
        #[serde(rename = "PreviewImageUrl", default)]
        preview_image_url: Option<String>,
    },
    Other(serde_json::Value),
}

impl From<RawResultFile> for ResultDescriptor {
    fn from(value: RawResultFile) -> ResultDescriptor {
        match value {
            RawResultFile::Bare(url) => ResultDescriptor::from_url(url.trim()),
            RawResultFile::Object {
                url,
                file_url,
                lower_url,
                kind,
                preview_image_url,
            } => {
                let url = [url, file_url, lower_url]
                    .into_iter()
                    .flatten()
                    .map(|u| u.trim().to_owned())
                    .find(|u| !u.is_empty())
                    .unwrap_or_default();
                ResultDescriptor {
                    url,
                    kind: kind.filter(|k| !k.is_empty()),
                    preview_image_url: preview_image_url.filter(|u| !u.is_empty()),
                }
            }
            RawResultFile::Other(_) => ResultDescriptor::default(),
        }
    }
}

/// Decode a result field, which may be absent or `null` (no results), a list
/// of entries, or a single entry
pub(crate) fn decode_results(
    value: Option<&serde_json::Value>,
) -> Result<Vec<ResultDescriptor>, serde_json::Error> {
    match value {
        None | Some(serde_json::Value::Null) => Ok(Vec::new()),
        Some(v @ serde_json::Value::Array(_)) => Vec::<ResultDescriptor>::deserialize(v),
        Some(v) => ResultDescriptor::deserialize(v).map(|r| vec![r]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case("WAIT", Some(JobStatus::Wait))]
    #[case("RUN", Some(JobStatus::Run))]
    #[case("DONE", Some(JobStatus::Done))]
    #[case("FAIL", Some(JobStatus::Fail))]
    #[case("PAUSED", None)]
    #[case("done", None)]
    fn parse_status(#[case] raw: &str, #[case] status: Option<JobStatus>) {
        let state = JobState {
            raw_status: Some(raw.into()),
            ..JobState::default()
        };
        assert_eq!(state.status(), status);
    }

    #[test]
    fn terminal_statuses() {
        assert!(JobStatus::Done.is_terminal());
        assert!(JobStatus::Fail.is_terminal());
        assert!(!JobStatus::Wait.is_terminal());
        assert!(!JobStatus::Run.is_terminal());
        assert_eq!(JobStatus::Done.to_string(), "DONE");
    }

    #[test]
    fn deserialize_done_state() {
        let state = JobState::from_response(
            json!({
                "Status": "DONE",
                "ErrorCode": "",
                "ErrorMessage": "",
                "ResultFile3Ds": [
                    {"Type": "GLB", "Url": "https://cdn.example.com/a/model.glb?sig=1", "PreviewImageUrl": "https://cdn.example.com/a/preview.png"},
                    {"Type": "OBJ", "Url": "", "FileUrl": "https://cdn.example.com/a/model.zip"},
                    "https://cdn.example.com/a/extra.fbx",
                    {"Type": "IMAGE"},
                    42
                ],
                "RequestId": "abc"
            }),
            "ResultFile3Ds",
        )
        .unwrap();
        assert_eq!(state.status(), Some(JobStatus::Done));
        assert_eq!(
            state.results,
            [
                ResultDescriptor {
                    url: "https://cdn.example.com/a/model.glb?sig=1".into(),
                    kind: Some("GLB".into()),
                    preview_image_url: Some("https://cdn.example.com/a/preview.png".into()),
                },
                ResultDescriptor {
                    url: "https://cdn.example.com/a/model.zip".into(),
                    kind: Some("OBJ".into()),
                    preview_image_url: None,
                },
                ResultDescriptor::from_url("https://cdn.example.com/a/extra.fbx"),
                ResultDescriptor {
                    url: String::new(),
                    kind: Some("IMAGE".into()),
                    preview_image_url: None,
                },
                ResultDescriptor::default(),
            ]
        );
    }

    #[test]
    fn deserialize_failed_state() {
        let state = JobState::from_response(
            json!({
                "Status": "FAIL",
                "ErrorCode": "FailedOperation.InnerError",
                "ErrorMessage": "generation failed",
                "ResultFile3Ds": null
            }),
            "ResultFile3Ds",
        )
        .unwrap();
        assert_eq!(state.status(), Some(JobStatus::Fail));
        assert_eq!(state.error_code(), "FailedOperation.InnerError");
        assert_eq!(state.error_message(), "generation failed");
        assert!(state.results.is_empty());
    }

    #[test]
    fn from_response_keeps_raw_object() {
        let response = json!({"Status": "RUN", "RequestId": "r-1"});
        let state = JobState::from_response(response.clone(), "ResultFile3Ds").unwrap();
        assert_eq!(state.status(), Some(JobStatus::Run));
        assert_eq!(state.raw, response);
    }

    #[test]
    fn missing_fields_default() {
        let state = serde_json::from_value::<JobState>(json!({})).unwrap();
        assert_eq!(state.status(), None);
        assert_eq!(state.status_label(), "<none>");
        assert_eq!(state.error_code(), "Unknown");
        assert_eq!(state.error_message(), "Unknown error");
    }

    #[test]
    fn single_result_entry() {
        let results = decode_results(Some(&json!("https://x/y.stl"))).unwrap();
        assert_eq!(results, [ResultDescriptor::from_url("https://x/y.stl")]);
        assert!(decode_results(None).unwrap().is_empty());
    }

    #[rstest]
    #[case("1375367755519696896", true)]
    #[case("job-1_a", true)]
    #[case("", false)]
    #[case("1375 3677", false)]
    #[case("https://example.com", false)]
    fn job_id_validity(#[case] s: &str, #[case] ok: bool) {
        assert_eq!(JobId::new(s).looks_valid(), ok);
    }

    #[test]
    fn query_payload() {
        let id = JobId::new("123");
        assert_eq!(
            serde_json::to_string(&JobQuery { job_id: &id }).unwrap(),
            r#"{"JobId":"123"}"#
        );
    }
}
