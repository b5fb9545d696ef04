use crate::api::{ApiClient, ApiError};
use crate::download::download_results;
use crate::endpoint::{JobKind, CONVERT_ACTION, CONVERT_RESULT_FIELD};
use crate::job::{decode_results, JobId, JobStatus, ResultDescriptor};
use crate::payload::ConvertJob;
use crate::poller::{ApiStatusSource, PollError, Poller, StatusSource};
use anyhow::Context;
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};

/// What to do once a job has been submitted
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct JobOptions {
    /// Directory to download results into
    pub(crate) outdir: PathBuf,

    /// Print the job ID and return without waiting for the job
    pub(crate) no_wait: bool,

    /// Print the raw final response as JSON
    pub(crate) json: bool,
}

/// Drives every job type through the same submit, poll & download cycle
#[derive(Debug)]
pub(crate) struct Pipeline<'a> {
    client: &'a ApiClient,
    poller: Poller,
}

impl<'a> Pipeline<'a> {
    pub(crate) fn new(client: &'a ApiClient, poller: Poller) -> Pipeline<'a> {
        Pipeline { client, poller }
    }

    /// Submit a job of type `kind`, wait for it to finish, and download its
    /// results into `opts.outdir`, naming them after `base_name` if given.
    /// Downloaded paths are printed to stdout, one per line.
    pub(crate) async fn run_job<P: Serialize + Sync>(
        &self,
        kind: JobKind,
        payload: &P,
        base_name: Option<&str>,
        opts: &JobOptions,
    ) -> anyhow::Result<()> {
        let (job_id, response) = self.submit(kind, payload).await?;
        if opts.no_wait {
            if opts.json {
                print_json(&response)?;
            } else {
                println!("{job_id}");
            }
            return Ok(());
        }
        tracing::info!(%job_id, %kind, interval = ?self.poller.interval(), "Waiting for job to complete ...");
        let source = ApiStatusSource::new(self.client, kind);
        let state = match self.poller.wait(&source, &job_id).await {
            Ok(state) => state,
            Err(e) => {
                if opts.json {
                    print_failed_response(&e)?;
                }
                return Err(e.into());
            }
        };
        if opts.json {
            print_json(&state.raw)?;
        }
        save_results(self.client, &state.results, &opts.outdir, base_name).await
    }

    /// Submit a job and return its ID along with the full response
    #[tracing::instrument(skip_all, fields(%kind))]
    pub(crate) async fn submit<P: Serialize + Sync>(
        &self,
        kind: JobKind,
        payload: &P,
    ) -> Result<(JobId, Value), ApiError> {
        tracing::info!("Submitting job ...");
        let action = kind.submit_action();
        let response = self.client.call(action, payload).await?;
        let job_id = job_id_from_response(action, &response)?;
        tracing::info!(%job_id, "Job submitted");
        Ok((job_id, response))
    }

    /// Report the status of an existing job.
    ///
    /// Without `wait`, the job is queried once; a job that has not finished
    /// has its status printed.  With `wait`, the job is polled until it
    /// finishes.  Either way, a finished job has its full response printed
    /// as JSON, a failed job is then an error, and a completed job's results
    /// are downloaded into `outdir` if `download` is given.
    pub(crate) async fn query(
        &self,
        kind: JobKind,
        job_id: &JobId,
        wait: bool,
        download: Option<&Path>,
    ) -> anyhow::Result<()> {
        let source = ApiStatusSource::new(self.client, kind);
        let outcome = if wait {
            self.poller.wait(&source, job_id).await
        } else {
            let state = source.query(job_id).await?;
            tracing::info!(%job_id, status = state.status_label(), "Queried job status");
            if !state.status().is_some_and(JobStatus::is_terminal) {
                println!("{}", state.status_label());
                return Ok(());
            }
            if state.status() == Some(JobStatus::Fail) {
                Err(PollError::from_failed(job_id, state))
            } else {
                Ok(state)
            }
        };
        let state = match outcome {
            Ok(state) => state,
            Err(e) => {
                print_failed_response(&e)?;
                return Err(e.into());
            }
        };
        print_json(&state.raw)?;
        if let Some(outdir) = download {
            save_results(self.client, &state.results, outdir, None).await?;
        }
        Ok(())
    }
}

/// Convert a model to another format.  Conversion is synchronous, so the
/// converted file comes back in the one response.  Its URL is printed (or
/// the whole response, if `json` is set) and, if `outdir` is given, the file
/// is downloaded there.
pub(crate) async fn convert(
    client: &ApiClient,
    payload: &ConvertJob,
    outdir: Option<&Path>,
    json: bool,
) -> anyhow::Result<()> {
    tracing::info!(format = ?payload.format, "Converting model ...");
    let response = client.call(CONVERT_ACTION, payload).await?;
    let results = convert_results(&response)?;
    if json {
        print_json(&response)?;
    } else {
        for r in &results {
            println!("{}", r.url);
        }
    }
    if let Some(outdir) = outdir {
        save_results(client, &results, outdir, None).await?;
    }
    Ok(())
}

async fn save_results(
    client: &ApiClient,
    results: &[ResultDescriptor],
    outdir: &Path,
    base_name: Option<&str>,
) -> anyhow::Result<()> {
    if results.iter().all(|r| r.url.trim().is_empty()) {
        tracing::warn!("Job completed without any downloadable results");
        return Ok(());
    }
    let paths = download_results(client.http(), results, outdir, base_name)
        .await
        .with_context(|| format!("failed to download results into {}", outdir.display()))?;
    tracing::info!(
        count = paths.len(),
        outdir = %outdir.display(),
        "Downloaded result files"
    );
    for p in paths {
        println!("{}", p.display());
    }
    Ok(())
}

fn print_json(value: &Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print the terminal response carried by a failed job, if `e` is one
fn print_failed_response(e: &PollError) -> anyhow::Result<()> {
    if let Some(response) = e.failed_response() {
        print_json(response)?;
    }
    Ok(())
}

/// Extract the job ID from a submission response; a response without one is
/// treated as a remote error
pub(crate) fn job_id_from_response(action: &str, response: &Value) -> Result<JobId, ApiError> {
    response
        .get("JobId")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(JobId::new)
        .ok_or_else(|| ApiError::MissingField {
            action: action.to_owned(),
            field: "JobId",
        })
}

/// Extract the converted file from a format conversion response
pub(crate) fn convert_results(response: &Value) -> Result<Vec<ResultDescriptor>, ApiError> {
    let results = decode_results(response.get(CONVERT_RESULT_FIELD)).map_err(|source| {
        ApiError::Decode {
            action: CONVERT_ACTION.to_owned(),
            source,
        }
    })?;
    if results.iter().all(|r| r.url.trim().is_empty()) {
        return Err(ApiError::MissingField {
            action: CONVERT_ACTION.to_owned(),
            field: "ResultFile3D",
        });
    }
    Ok(results)
}
