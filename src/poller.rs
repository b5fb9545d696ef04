use crate::api::{ApiClient, ApiError};
use crate::endpoint::JobKind;
use crate::job::{JobId, JobQuery, JobState, JobStatus};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

/// Something that can report the current state of a job
pub(crate) trait StatusSource {
    fn query(&self, job_id: &JobId) -> impl Future<Output = Result<JobState, ApiError>> + Send;
}

/// Queries job status through a signed call to the query action of a job
/// type
#[derive(Clone, Copy, Debug)]
pub(crate) struct ApiStatusSource<'a> {
    client: &'a ApiClient,
    kind: JobKind,
}

impl<'a> ApiStatusSource<'a> {
    pub(crate) fn new(client: &'a ApiClient, kind: JobKind) -> Self {
        ApiStatusSource { client, kind }
    }
}

impl StatusSource for ApiStatusSource<'_> {
    async fn query(&self, job_id: &JobId) -> Result<JobState, ApiError> {
        let action = self.kind.query_action();
        let response = self.client.call(action, &JobQuery { job_id }).await?;
        JobState::from_response(response, self.kind.result_field()).map_err(|source| {
            ApiError::Decode {
                action: action.to_owned(),
                source,
            }
        })
    }
}

/// Drives a submitted job to a terminal state by querying it at a fixed
/// interval.  There is no overall timeout; the wait ends only when the job
/// reaches `DONE` or `FAIL`, a query fails, or the future is dropped.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) struct Poller {
    interval: Duration,
}

impl Poller {
    pub(crate) fn new(interval: Duration) -> Poller {
        Poller { interval }
    }

    pub(crate) fn interval(&self) -> Duration {
        self.interval
    }

    /// Query `job_id` until it is `DONE`, returning the final state, or
    /// `FAIL`, returning the remote error.  The first query is made
    /// immediately, and the poller sleeps only between non-terminal answers.
    #[tracing::instrument(skip_all, fields(%job_id))]
    pub(crate) async fn wait<S: StatusSource + Sync>(
        &self,
        source: &S,
        job_id: &JobId,
    ) -> Result<JobState, PollError> {
        let start = Instant::now();
        let mut queries = 0usize;
        loop {
            let state = source.query(job_id).await?;
            queries += 1;
            let elapsed = start.elapsed();
            tracing::info!(
                status = state.status_label(),
                elapsed = %format_elapsed(elapsed),
                queries,
                "Polled job status"
            );
            match state.status() {
                Some(JobStatus::Done) => {
                    tracing::info!(
                        results = state.results.len(),
                        "Job completed in {}",
                        format_elapsed(elapsed)
                    );
                    return Ok(state);
                }
                Some(JobStatus::Fail) => return Err(PollError::from_failed(job_id, state)),
                Some(JobStatus::Wait | JobStatus::Run) | None => {
                    tokio::time::sleep(self.interval).await;
                }
            }
        }
    }
}

/// Format a duration as `MM:SS`, with minutes growing past two digits as
/// needed
pub(crate) fn format_elapsed(d: Duration) -> String {
    let secs = d.as_secs();
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

#[derive(Debug, Error)]
pub(crate) enum PollError {
    #[error("job {job_id} failed: {code} - {message}")]
    Failed {
        job_id: JobId,
        code: String,
        message: String,
        /// The terminal `"Response"` object reporting the failure
        response: Box<serde_json::Value>,
    },
    #[error(transparent)]
    Query(#[from] ApiError),
}

impl PollError {
    pub(crate) fn from_failed(job_id: &JobId, state: JobState) -> PollError {
        PollError::Failed {
            job_id: job_id.clone(),
            code: state.error_code().to_owned(),
            message: state.error_message().to_owned(),
            response: Box::new(state.raw),
        }
    }

    /// The terminal response of a failed job; `None` for query errors
    pub(crate) fn failed_response(&self) -> Option<&serde_json::Value> {
        match self {
            PollError::Failed { response, .. } => Some(response.as_ref()),
            PollError::Query(_) => None,
        }
    }
}
