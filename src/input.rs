use crate::download::split_extension;
use crate::job::JobId;
use crate::payload::ModelType;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Smallest face count accepted by Pro jobs
pub(crate) const MIN_FACE_COUNT: u32 = 40_000;

/// Largest face count accepted by Pro jobs
pub(crate) const MAX_FACE_COUNT: u32 = 1_500_000;

/// Longest prompt (in UTF-8 bytes) that a Pro job takes without truncation
pub(crate) const PRO_PROMPT_LIMIT: usize = 1024;

/// Longest prompt (in UTF-8 bytes) that a Rapid job takes without truncation
pub(crate) const RAPID_PROMPT_LIMIT: usize = 200;

/// Largest recommended input image; base64 encoding adds about a third
const IMAGE_SIZE_LIMIT: u64 = 6 * 1024 * 1024;

/// Image extensions accepted for generation input
pub(crate) static GENERATION_IMAGE_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".webp"];

/// Image extensions accepted as texture references
pub(crate) static REFERENCE_IMAGE_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png"];

pub(crate) fn check_face_count(faces: u32) -> Result<u32, InputError> {
    if (MIN_FACE_COUNT..=MAX_FACE_COUNT).contains(&faces) {
        Ok(faces)
    } else {
        Err(InputError::FaceCount(faces))
    }
}

/// Trim `prompt`, reject it if empty, and warn if it is longer than the
/// service will read
pub(crate) fn check_prompt(prompt: &str, limit: usize) -> Result<String, InputError> {
    let prompt = prompt.trim();
    if prompt.is_empty() {
        return Err(InputError::Empty("prompt"));
    }
    if prompt.len() > limit {
        tracing::warn!(
            bytes = prompt.len(),
            limit,
            "Prompt is longer than the API accepts and may be truncated"
        );
    }
    Ok(prompt.to_owned())
}

pub(crate) fn is_remote_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

/// Return `input` if it is an `http(s)` URL.  Local paths are rejected, as
/// the API can only fetch models from public URLs.
pub(crate) fn require_url(input: &str, what: &'static str) -> Result<String, InputError> {
    let input = input.trim();
    if input.is_empty() {
        Err(InputError::Empty(what))
    } else if is_remote_url(input) {
        Ok(input.to_owned())
    } else {
        Err(InputError::LocalFile {
            what,
            input: input.to_owned(),
        })
    }
}

/// Read an input image and encode it as base64, warning about unexpected
/// extensions and oversized files
pub(crate) fn read_image_base64(path: &Path, allowed_exts: &[&str]) -> Result<String, InputError> {
    let ext = lowercase_extension(&path.to_string_lossy());
    if !allowed_exts.contains(&ext.as_str()) {
        tracing::warn!(
            path = %path.display(),
            allowed = allowed_exts.join(", "),
            "Image extension is not one the API accepts; the request may be rejected"
        );
    }
    let data = read_file(path)?;
    let size = data.len() as u64;
    if size > IMAGE_SIZE_LIMIT {
        tracing::warn!(
            path = %path.display(),
            size,
            limit = IMAGE_SIZE_LIMIT,
            "Image is larger than the API recommends"
        );
    }
    Ok(STANDARD.encode(data))
}

/// Read a local model file and encode it as base64
pub(crate) fn read_model_base64(path: &Path) -> Result<String, InputError> {
    read_file(path).map(|data| STANDARD.encode(data))
}

fn read_file(path: &Path) -> Result<Vec<u8>, InputError> {
    tracing::debug!(path = %path.display(), "Reading input file");
    fs_err::read(path).map_err(|source| InputError::Read {
        path: path.to_owned(),
        source,
    })
}

/// Guess a model's file type from the extension of its path or URL,
/// defaulting to GLB
pub(crate) fn detect_model_type(path_or_url: &str) -> ModelType {
    match lowercase_extension(path_or_url).as_str() {
        ".gltf" => ModelType::Gltf,
        ".obj" => ModelType::Obj,
        ".fbx" => ModelType::Fbx,
        ".stl" => ModelType::Stl,
        _ => ModelType::Glb,
    }
}

/// Use `explicit` or else detect the model type of `input`, and make sure
/// the result is one of `allowed`
pub(crate) fn resolve_model_type(
    input: &str,
    explicit: Option<ModelType>,
    allowed: &[ModelType],
    what: &'static str,
) -> Result<ModelType, InputError> {
    let model_type = explicit.unwrap_or_else(|| detect_model_type(input));
    if allowed.contains(&model_type) {
        Ok(model_type)
    } else {
        Err(InputError::ModelType { what, model_type })
    }
}

/// Warn if `input` does not end in one of `exts` (ignoring any query
/// string)
pub(crate) fn warn_unexpected_extension(input: &str, exts: &[&str], what: &str) {
    let ext = lowercase_extension(input);
    if !exts.contains(&ext.as_str()) {
        tracing::warn!(
            input,
            expected = exts.join(", "),
            "{what} does not have an expected extension; the request may be rejected"
        );
    }
}

fn lowercase_extension(s: &str) -> String {
    let path = s.split_once('?').map_or(s, |(p, _)| p);
    split_extension(path).1.to_lowercase()
}

/// Parse a job ID from the command line, warning if it does not look like
/// one
pub(crate) fn parse_job_id(s: &str) -> Result<JobId, InputError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(InputError::Empty("job ID"));
    }
    let job_id = JobId::new(s);
    if !job_id.looks_valid() {
        tracing::warn!(%job_id, "Job IDs are usually numeric strings (e.g. 1375367755519696896); check that this one is correct");
    }
    Ok(job_id)
}

/// The file stem of a local path, for use as a download base name
pub(crate) fn title_from_path(path: &Path) -> Option<String> {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
}

/// The stem of the final path component of a URL, for use as a download
/// base name
pub(crate) fn title_from_url(url: &str) -> Option<String> {
    let path = url.split_once('?').map_or(url, |(p, _)| p);
    let name = path.rsplit_once('/').map_or(path, |(_, name)| name);
    Some(split_extension(name).0)
        .filter(|s| !s.is_empty())
        .map(ToOwned::to_owned)
}

/// A model given on the command line as either a public URL or a local file
#[derive(Clone, Debug, Eq, PartialEq)]
pub(crate) enum ModelInput {
    Url(String),
    Local(PathBuf),
}

impl ModelInput {
    /// Classify `s`: `http(s)` URLs are remote, and anything else must be an
    /// existing local file
    pub(crate) fn parse(s: &str) -> Result<ModelInput, InputError> {
        let s = s.trim();
        if s.is_empty() {
            Err(InputError::Empty("model"))
        } else if is_remote_url(s) {
            Ok(ModelInput::Url(s.to_owned()))
        } else if Path::new(s).is_file() {
            Ok(ModelInput::Local(PathBuf::from(s)))
        } else {
            Err(InputError::NotFound {
                path: PathBuf::from(s),
            })
        }
    }

    pub(crate) fn as_str(&self) -> std::borrow::Cow<'_, str> {
        match self {
            ModelInput::Url(u) => u.into(),
            ModelInput::Local(p) => p.to_string_lossy(),
        }
    }

    pub(crate) fn title(&self) -> Option<String> {
        match self {
            ModelInput::Url(u) => title_from_url(u),
            ModelInput::Local(p) => title_from_path(p),
        }
    }
}

#[derive(Debug, Error)]
pub(crate) enum InputError {
    #[error(
        "face count must be between {min} and {max}; got {0}",
        min = MIN_FACE_COUNT,
        max = MAX_FACE_COUNT
    )]
    FaceCount(u32),
    #[error("{0} must not be empty")]
    Empty(&'static str),
    #[error("file not found: {}", .path.display())]
    NotFound { path: PathBuf },
    #[error("failed to read {}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{what} must be a public http(s) URL; uploading local files is not supported (got {input:?})")]
    LocalFile { what: &'static str, input: String },
    #[error("{what} does not accept {model_type} models")]
    ModelType {
        what: &'static str,
        model_type: ModelType,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rstest::rstest;
    use tempfile::tempdir;

    #[rstest]
    #[case(40_000, true)]
    #[case(400_000, true)]
    #[case(1_500_000, true)]
    #[case(39_999, false)]
    #[case(1_500_001, false)]
    fn face_count_bounds(#[case] faces: u32, #[case] ok: bool) {
        assert_eq!(check_face_count(faces).is_ok(), ok);
    }

    #[test]
    fn face_count_message() {
        let e = check_face_count(10).unwrap_err();
        assert_eq!(
            e.to_string(),
            "face count must be between 40000 and 1500000; got 10"
        );
    }

    #[test]
    fn prompt_is_trimmed_and_required() {
        assert_eq!(check_prompt("  a cat \n", PRO_PROMPT_LIMIT).unwrap(), "a cat");
        assert_matches!(
            check_prompt("   ", PRO_PROMPT_LIMIT),
            Err(InputError::Empty("prompt"))
        );
        // Overlong prompts are only warned about
        let long = "x".repeat(RAPID_PROMPT_LIMIT + 1);
        assert_eq!(check_prompt(&long, RAPID_PROMPT_LIMIT).unwrap(), long);
    }

    #[rstest]
    #[case("https://example.com/m.glb", ModelType::Glb)]
    #[case("https://example.com/m.GLTF?x=1", ModelType::Gltf)]
    #[case("./m.obj", ModelType::Obj)]
    #[case("m.FBX", ModelType::Fbx)]
    #[case("/tmp/print.stl", ModelType::Stl)]
    #[case("https://example.com/blob", ModelType::Glb)]
    #[case("https://example.com/m.usdz", ModelType::Glb)]
    fn model_type_detection(#[case] input: &str, #[case] model_type: ModelType) {
        assert_eq!(detect_model_type(input), model_type);
    }

    #[test]
    fn resolve_model_type_checks_allowed() {
        let allowed = [ModelType::Fbx, ModelType::Obj, ModelType::Glb];
        assert_eq!(
            resolve_model_type("https://x/m.obj", None, &allowed, "uv").unwrap(),
            ModelType::Obj
        );
        assert_eq!(
            resolve_model_type("https://x/m", Some(ModelType::Fbx), &allowed, "uv").unwrap(),
            ModelType::Fbx
        );
        let e = resolve_model_type("https://x/m.stl", None, &allowed, "uv").unwrap_err();
        assert_eq!(e.to_string(), "uv does not accept STL models");
    }

    #[test]
    fn require_url_rejects_local_paths() {
        assert_eq!(
            require_url(" https://x/m.fbx ", "model").unwrap(),
            "https://x/m.fbx"
        );
        assert_matches!(
            require_url("./m.fbx", "model"),
            Err(InputError::LocalFile { what: "model", .. })
        );
        assert_matches!(require_url("", "model"), Err(InputError::Empty("model")));
    }

    #[test]
    fn read_image() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("cat.png");
        fs_err::write(&path, b"hello").unwrap();
        assert_eq!(
            read_image_base64(&path, GENERATION_IMAGE_EXTENSIONS).unwrap(),
            "aGVsbG8="
        );
        assert_matches!(
            read_image_base64(&tmp.path().join("missing.png"), GENERATION_IMAGE_EXTENSIONS),
            Err(InputError::Read { .. })
        );
    }

    #[test]
    fn model_input_classification() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("chair.obj");
        fs_err::write(&path, b"o chair").unwrap();
        assert_eq!(
            ModelInput::parse(&path.to_string_lossy()).unwrap(),
            ModelInput::Local(path.clone())
        );
        assert_eq!(
            ModelInput::parse("https://x/m.glb").unwrap(),
            ModelInput::Url("https://x/m.glb".into())
        );
        assert_matches!(
            ModelInput::parse(&tmp.path().join("nope.obj").to_string_lossy()),
            Err(InputError::NotFound { .. })
        );
        assert_eq!(ModelInput::Local(path).title().as_deref(), Some("chair"));
        assert_eq!(
            read_model_base64(&tmp.path().join("chair.obj")).unwrap(),
            "byBjaGFpcg=="
        );
    }

    #[rstest]
    #[case("https://x/dir/model.fbx?sig=1", Some("model"))]
    #[case("https://x/dir/", None)]
    #[case("https://x/dir/archive.tar.gz", Some("archive.tar"))]
    fn url_titles(#[case] url: &str, #[case] title: Option<&str>) {
        assert_eq!(title_from_url(url).as_deref(), title);
    }

    #[test]
    fn job_id_parsing() {
        assert_eq!(
            parse_job_id(" 1375367755519696896 ").unwrap(),
            JobId::new("1375367755519696896")
        );
        assert_matches!(parse_job_id(""), Err(InputError::Empty("job ID")));
        // Odd-looking IDs are accepted with a warning
        assert_eq!(parse_job_id("abc def").unwrap(), JobId::new("abc def"));
    }
}
