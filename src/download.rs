use crate::consts::{DOWNLOAD_TEMP_PREFIX, DOWNLOAD_TIMEOUT};
use crate::job::ResultDescriptor;
use crate::util::MultiError;
use regex::Regex;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::Duration;
use thiserror::Error;

/// Longest base name (in characters) that will be used in a filename
const MAX_BASE_NAME_LEN: usize = 120;

/// Base name used when nothing usable remains after sanitizing
static FALLBACK_BASE_NAME: &str = "model";

/// Extension used when a result URL does not reveal the file type
static DEFAULT_EXTENSION: &str = ".glb";

/// Substrings searched for in a result URL's path, in priority order, and the
/// extension each one maps to
static EXTENSION_PRIORITY: &[(&str, &str)] = &[
    (".zip", ".zip"),
    (".obj", ".obj"),
    (".glb", ".glb"),
    (".gltf", ".glb"),
    (".fbx", ".fbx"),
    (".stl", ".stl"),
    (".png", ".png"),
    (".jpg", ".jpg"),
    (".jpeg", ".jpg"),
];

static UNSAFE_RUN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"[\s\\/:*?"<>|]+"#).expect("filename character regex should be valid")
});

static UNDERSCORE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new("_+").expect("underscore regex should be valid"));

/// Turn a prompt, image filename, or other free-form title into a string
/// that is safe to use as the stem of a filename.
///
/// A leading directory is only removed when the input is clearly a
/// filesystem path (absolute, or starting with `./`, `../`, or `~/`), so that
/// slashes inside a prompt are kept as separators rather than discarding
/// everything before them.
pub(crate) fn sanitize_base_name(s: &str) -> String {
    let mut s = s.trim();
    if is_path_shaped(s) {
        if let Some((_, name)) = s.rsplit_once('/') {
            s = name;
        }
    }
    let (stem, _) = split_extension(s);
    let replaced = UNSAFE_RUN.replace_all(stem, "_");
    let collapsed = UNDERSCORE_RUN.replace_all(&replaced, "_");
    let trimmed = collapsed.trim_matches('_');
    if trimmed.is_empty() {
        FALLBACK_BASE_NAME.to_owned()
    } else {
        trimmed.chars().take(MAX_BASE_NAME_LEN).collect()
    }
}

fn is_path_shaped(s: &str) -> bool {
    s.starts_with("./")
        || s.starts_with("../")
        || s.starts_with("~/")
        || s.starts_with('/')
        || Path::new(s).is_absolute()
}

/// Split `s` into a stem and a final extension (including its leading dot).
/// Only the last `/`-separated segment is considered, and dots at the start
/// of that segment do not begin an extension, so `".bashrc"` has none.
pub(crate) fn split_extension(s: &str) -> (&str, &str) {
    let seg_start = s.rfind('/').map_or(0, |i| i + 1);
    let segment = &s[seg_start..];
    let leading_dots = segment.len() - segment.trim_start_matches('.').len();
    match segment[leading_dots..].rfind('.') {
        Some(i) => s.split_at(seg_start + leading_dots + i),
        None => (s, ""),
    }
}

/// Guess the extension for a downloaded result from its URL.  The query
/// string is ignored and matching is case-insensitive.
pub(crate) fn extension_for_url(url: &str) -> &'static str {
    let path = strip_query(url).to_lowercase();
    EXTENSION_PRIORITY
        .iter()
        .find(|(needle, _)| path.contains(needle))
        .map_or(DEFAULT_EXTENSION, |&(_, ext)| ext)
}

/// Return the final path component of `url` with any query string removed.
/// The result may be empty.
pub(crate) fn url_basename(url: &str) -> &str {
    let path = strip_query(url);
    let name = path.rsplit_once('/').map_or(path, |(_, name)| name);
    if name == "." || name == ".." {
        ""
    } else {
        name
    }
}

fn strip_query(url: &str) -> &str {
    url.split_once('?').map_or(url, |(path, _)| path)
}

/// A single result file to fetch and the name to save it under
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) struct PlannedDownload<'a> {
    pub(crate) url: &'a str,
    pub(crate) filename: String,
}

/// Decide the local filename for each downloadable result.
///
/// With a base name, files are named `<base><ext>`, `<base>_2<ext>`,
/// `<base>_3<ext>`, and so on.  Without one, the URL's basename is used,
/// falling back to `model_<N><ext>` where `N` is the result's 1-based
/// position in `results`.  Results with blank URLs are skipped.
pub(crate) fn plan_downloads<'a>(
    results: &'a [ResultDescriptor],
    base_name: Option<&str>,
) -> Vec<PlannedDownload<'a>> {
    let base = base_name.map(sanitize_base_name);
    let mut used = 0usize;
    let mut plan = Vec::with_capacity(results.len());
    for (i, r) in results.iter().enumerate() {
        let url = r.url.trim();
        if url.is_empty() {
            tracing::debug!(index = i + 1, "Skipping result with no URL");
            continue;
        }
        let ext = extension_for_url(url);
        let filename = match base {
            Some(ref base) => {
                used += 1;
                if used == 1 {
                    format!("{base}{ext}")
                } else {
                    format!("{base}_{used}{ext}")
                }
            }
            None => match url_basename(url) {
                "" => format!("model_{}{ext}", i + 1),
                name => name.to_owned(),
            },
        };
        tracing::debug!(
            index = i + 1,
            url,
            kind = r.kind.as_deref(),
            preview = r.preview_image_url.as_deref(),
            %filename,
            "Planned result download"
        );
        plan.push(PlannedDownload { url, filename });
    }
    plan
}

/// Download every result with a nonblank URL into `outdir`, which is created
/// if it does not exist, and return the paths written in result order.
///
/// Downloads are attempted one after another.  A failed download is logged
/// and does not stop the remaining ones; if any failed, all of the failures
/// are returned together once the batch is done.
pub(crate) async fn download_results(
    http: &reqwest::Client,
    results: &[ResultDescriptor],
    outdir: &Path,
    base_name: Option<&str>,
) -> Result<Vec<PathBuf>, MultiError> {
    tracing::trace!(path = %outdir.display(), "Creating output directory");
    fs_err::create_dir_all(outdir).map_err(|e| MultiError(vec![e.into()]))?;
    let plan = plan_downloads(results, base_name);
    let mut downloaded = Vec::with_capacity(plan.len());
    let mut errors = Vec::new();
    for PlannedDownload { url, filename } in plan {
        let path = outdir.join(&filename);
        if path.exists() {
            tracing::warn!(path = %path.display(), "Output file already exists and will be overwritten");
        }
        tracing::info!(%filename, "Downloading result file ...");
        match download_file(http, url, outdir, &path, DOWNLOAD_TIMEOUT).await {
            Ok(size) => {
                tracing::info!(path = %path.display(), size, "Saved result file");
                downloaded.push(path);
            }
            Err(e) => {
                let e = anyhow::Error::from(e);
                tracing::error!(error = ?e, %filename, "Failed to download result file");
                errors.push(e);
            }
        }
    }
    if errors.is_empty() {
        Ok(downloaded)
    } else {
        Err(MultiError(errors))
    }
}

/// Fetch `url` into a temporary file in `outdir` and move it to `path` once
/// the whole body has been received.  Returns the number of bytes written.
#[tracing::instrument(skip_all, fields(%url))]
async fn download_file(
    http: &reqwest::Client,
    url: &str,
    outdir: &Path,
    path: &Path,
    timeout: Duration,
) -> Result<u64, DownloadError> {
    let transport = |source: reqwest::Error| {
        if source.is_timeout() {
            DownloadError::Timeout {
                url: url.to_owned(),
                timeout,
            }
        } else {
            DownloadError::Request {
                url: url.to_owned(),
                source,
            }
        }
    };
    let mut resp = http
        .get(url)
        .timeout(timeout)
        .send()
        .await
        .map_err(transport)?;
    let status = resp.status();
    if !status.is_success() {
        return Err(DownloadError::Status {
            url: url.to_owned(),
            status: status.as_u16(),
        });
    }
    tracing::trace!("Opening temporary output file");
    let mut outfile = tempfile::Builder::new()
        .prefix(DOWNLOAD_TEMP_PREFIX)
        .tempfile_in(outdir)
        .map_err(|source| DownloadError::Tempfile {
            dir: outdir.to_owned(),
            source,
        })?;
    let mut size = 0u64;
    while let Some(chunk) = resp.chunk().await.map_err(transport)? {
        outfile
            .write_all(&chunk)
            .map_err(|source| DownloadError::Write {
                url: url.to_owned(),
                source,
            })?;
        size += chunk.len() as u64;
    }
    outfile.flush().map_err(|source| DownloadError::Write {
        url: url.to_owned(),
        source,
    })?;
    tracing::trace!(dest = %path.display(), "Moving temporary output file to destination");
    outfile.persist(path).map_err(|e| DownloadError::Persist {
        path: path.to_owned(),
        source: e.error,
    })?;
    Ok(size)
}

#[derive(Debug, Error)]
pub(crate) enum DownloadError {
    #[error("failed to download {url}")]
    Request { url: String, source: reqwest::Error },
    #[error("download of {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },
    #[error("download of {url} failed with HTTP status {status}")]
    Status { url: String, status: u16 },
    #[error("failed to create temporary output file in {}", .dir.display())]
    Tempfile {
        dir: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write downloaded data from {url}")]
    Write {
        url: String,
        source: std::io::Error,
    },
    #[error("failed to persist temporary output file to {}", .path.display())]
    Persist {
        path: PathBuf,
        source: std::io::Error,
    },
}
