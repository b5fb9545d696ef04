use crate::api::ApiClient;
use crate::consts::DEFAULT_POLL_INTERVAL;
use crate::endpoint::JobKind;
use crate::input::{
    check_face_count, check_prompt, parse_job_id, read_image_base64, read_model_base64,
    require_url, resolve_model_type, title_from_path, title_from_url, warn_unexpected_extension,
    ModelInput, GENERATION_IMAGE_EXTENSIONS, PRO_PROMPT_LIMIT, RAPID_PROMPT_LIMIT,
    REFERENCE_IMAGE_EXTENSIONS,
};
use crate::payload::{
    ConvertFormat, ConvertJob, FaceLevel, GenerateType, ImageSource, ModelFile, ModelJob,
    ModelSource, ModelType, PolygonType, ProJob, RapidFormat, RapidInput, RapidJob,
    SmartTopologyJob, TextureEditJob, TextureGuide, ViewImage, ViewType,
};
use crate::pipeline::{convert, JobOptions, Pipeline};
use crate::poller::Poller;
use clap::{Args, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Clone, Debug, Subcommand)]
pub(crate) enum Command {
    /// Generate a 3D model from a text prompt (Pro)
    #[command(name = "text-to-3d")]
    TextTo3D(TextTo3DArgs),

    /// Generate a 3D model from an image, optionally with extra views (Pro)
    #[command(name = "image-to-3d")]
    ImageTo3D(ImageTo3DArgs),

    /// Generate a 3D model from a prompt or an image (Rapid)
    Rapid(RapidArgs),

    /// Convert a model to another format
    Convert(ConvertArgs),

    /// Retopologize a model into a cleaner, lower-poly mesh
    SmartTopology(SmartTopologyArgs),

    /// Redraw the texture of an FBX model from a prompt or reference image
    TextureEdit(TextureEditArgs),

    /// Identify and generate the components of a model
    Part(ModelJobArgs),

    /// Unwrap the UVs of a model
    Uv(ModelJobArgs),

    /// Query (and optionally wait for and download) an existing job
    Query(QueryArgs),
}

impl Command {
    pub(crate) async fn run(self, client: &ApiClient) -> anyhow::Result<()> {
        match self {
            Command::TextTo3D(args) => args.run(client).await,
            Command::ImageTo3D(args) => args.run(client).await,
            Command::Rapid(args) => args.run(client).await,
            Command::Convert(args) => args.run(client).await,
            Command::SmartTopology(args) => args.run(client).await,
            Command::TextureEdit(args) => args.run(client).await,
            Command::Part(args) => args.run(client, JobKind::Part).await,
            Command::Uv(args) => args.run(client, JobKind::Uv).await,
            Command::Query(args) => args.run(client).await,
        }
    }
}

/// Options shared by every subcommand that submits an asynchronous job
#[derive(Args, Clone, Debug, Eq, PartialEq)]
pub(crate) struct JobArgs {
    /// Number of seconds to wait between job status queries
    #[arg(
        long,
        default_value_t = DEFAULT_POLL_INTERVAL.as_secs(),
        value_name = "SECONDS",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    poll: u64,

    /// Directory in which to save the results.  Defaults to
    /// `./hunyuan_output_<job type>`.
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Print the job ID and exit instead of waiting for the job to finish
    #[arg(long)]
    no_wait: bool,

    /// Print the raw API response as JSON
    #[arg(long)]
    json: bool,
}

impl JobArgs {
    fn pipeline<'a>(&self, client: &'a ApiClient) -> Pipeline<'a> {
        Pipeline::new(client, Poller::new(Duration::from_secs(self.poll)))
    }

    fn options(&self, default_outdir: &str) -> JobOptions {
        JobOptions {
            outdir: self
                .output
                .clone()
                .unwrap_or_else(|| PathBuf::from(default_outdir)),
            no_wait: self.no_wait,
            json: self.json,
        }
    }
}

#[derive(Args, Clone, Debug, Eq, PartialEq)]
pub(crate) struct TextTo3DArgs {
    /// Text description of the model to generate
    #[arg(short, long)]
    prompt: String,

    /// Number of faces in the generated model (40000 to 1500000)
    #[arg(short, long, default_value_t = 400_000)]
    faces: u32,

    /// Generation type
    #[arg(short = 't', long = "type", value_enum, default_value_t)]
    generate_type: GenerateType,

    #[command(flatten)]
    job: JobArgs,
}

impl TextTo3DArgs {
    async fn run(self, client: &ApiClient) -> anyhow::Result<()> {
        let prompt = check_prompt(&self.prompt, PRO_PROMPT_LIMIT)?;
        let payload = ProJob {
            prompt: Some(prompt.clone()),
            generate_type: self.generate_type,
            face_count: check_face_count(self.faces)?,
            ..ProJob::default()
        };
        self.job
            .pipeline(client)
            .run_job(
                JobKind::Pro,
                &payload,
                Some(&prompt),
                &self.job.options("./hunyuan_output_txt"),
            )
            .await
    }
}

#[derive(Args, Clone, Debug, Eq, PartialEq)]
pub(crate) struct ImageTo3DArgs {
    /// Input image (JPG, JPEG, PNG, or WEBP)
    image: PathBuf,

    /// Generation type
    #[arg(short = 't', long = "type", value_enum, default_value_t)]
    generate_type: GenerateType,

    /// Number of faces in the generated model (40000 to 1500000)
    #[arg(short, long, default_value_t = 400_000)]
    faces: u32,

    /// Generate PBR materials
    #[arg(long)]
    pbr: bool,

    /// Polygon type for `LowPoly` generation
    #[arg(short, long = "polygon", value_enum, default_value = "triangle")]
    polygon_type: PolygonType,

    /// Image of the subject seen from the left
    #[arg(long, value_name = "PATH")]
    left: Option<PathBuf>,

    /// Image of the subject seen from the right
    #[arg(long, value_name = "PATH")]
    right: Option<PathBuf>,

    /// Image of the subject seen from the back
    #[arg(long, value_name = "PATH")]
    back: Option<PathBuf>,

    #[command(flatten)]
    job: JobArgs,
}

impl ImageTo3DArgs {
    async fn run(self, client: &ApiClient) -> anyhow::Result<()> {
        let face_count = check_face_count(self.faces)?;
        let image_base64 = read_image_base64(&self.image, GENERATION_IMAGE_EXTENSIONS)?;
        let mut multi_view_images = Vec::new();
        for (view_type, path) in [
            (ViewType::Left, &self.left),
            (ViewType::Right, &self.right),
            (ViewType::Back, &self.back),
        ] {
            if let Some(path) = path {
                tracing::debug!(view = %view_type, path = %path.display(), "Adding extra view");
                multi_view_images.push(ViewImage {
                    view_type,
                    image_base64: read_image_base64(path, GENERATION_IMAGE_EXTENSIONS)?,
                });
            }
        }
        let payload = ProJob {
            image_base64: Some(image_base64),
            generate_type: self.generate_type,
            face_count,
            enable_pbr: Some(self.pbr),
            polygon_type: (self.generate_type == GenerateType::LowPoly)
                .then_some(self.polygon_type),
            multi_view_images,
            ..ProJob::default()
        };
        let title = title_from_path(&self.image);
        self.job
            .pipeline(client)
            .run_job(
                JobKind::Pro,
                &payload,
                title.as_deref(),
                &self.job.options("./hunyuan_output"),
            )
            .await
    }
}

/// A job's single guiding input: exactly one of a prompt, a local image, or
/// an image URL
#[derive(Args, Clone, Debug, Eq, PartialEq)]
#[group(required = true, multiple = false)]
pub(crate) struct GuideArgs {
    /// Text prompt
    #[arg(short, long)]
    prompt: Option<String>,

    /// Local image file
    #[arg(short, long, value_name = "PATH")]
    image: Option<PathBuf>,

    /// Public URL of an image
    #[arg(long, value_name = "URL")]
    image_url: Option<String>,
}

#[derive(Args, Clone, Debug, Eq, PartialEq)]
pub(crate) struct RapidArgs {
    #[command(flatten)]
    guide: GuideArgs,

    /// Output format
    #[arg(short, long, value_enum, ignore_case = true, default_value_t)]
    format: RapidFormat,

    /// Generate PBR materials
    #[arg(long)]
    pbr: bool,

    /// Generate an untextured model only
    #[arg(long)]
    geometry: bool,

    #[command(flatten)]
    job: JobArgs,
}

impl RapidArgs {
    async fn run(self, client: &ApiClient) -> anyhow::Result<()> {
        let (input, title) = if let Some(ref prompt) = self.guide.prompt {
            let prompt = check_prompt(prompt, RAPID_PROMPT_LIMIT)?;
            (RapidInput::Prompt(prompt.clone()), Some(prompt))
        } else if let Some(ref path) = self.guide.image {
            let data = read_image_base64(path, GENERATION_IMAGE_EXTENSIONS)?;
            (RapidInput::ImageBase64(data), title_from_path(path))
        } else {
            let url = require_url(
                self.guide.image_url.as_deref().unwrap_or_default(),
                "image URL",
            )?;
            let title = title_from_url(&url);
            (RapidInput::ImageUrl(url), title)
        };
        let payload = RapidJob {
            result_format: self.format,
            enable_pbr: self.pbr,
            enable_geometry: self.geometry,
            input,
        };
        self.job
            .pipeline(client)
            .run_job(
                JobKind::Rapid,
                &payload,
                title.as_deref(),
                &self.job.options("./hunyuan_output_rapid"),
            )
            .await
    }
}

#[derive(Args, Clone, Debug, Eq, PartialEq)]
pub(crate) struct ConvertArgs {
    /// Public URL of the model to convert (FBX, OBJ, or GLB; at most 60 MB)
    url: String,

    /// Target format
    #[arg(short, long, value_enum, ignore_case = true, default_value_t)]
    format: ConvertFormat,

    /// Directory in which to save the converted file.  If not given, only
    /// the result URL is printed.
    #[arg(short, long, value_name = "DIR")]
    output: Option<PathBuf>,

    /// Print the raw API response as JSON
    #[arg(long)]
    json: bool,
}

impl ConvertArgs {
    async fn run(self, client: &ApiClient) -> anyhow::Result<()> {
        let url = require_url(&self.url, "model to convert")?;
        warn_unexpected_extension(&url, &[".fbx", ".obj", ".glb", ".gltf"], "Model to convert");
        let payload = ConvertJob {
            file_url: url,
            format: self.format,
        };
        convert(client, &payload, self.output.as_deref(), self.json).await
    }
}

#[derive(Args, Clone, Debug, Eq, PartialEq)]
pub(crate) struct SmartTopologyArgs {
    /// The model to process: a public URL or a local file, which is sent
    /// inline
    model: String,

    /// Model file type.  Detected from the extension by default.
    #[arg(short = 't', long, value_enum, ignore_case = true)]
    file_type: Option<ModelType>,

    /// Output polygon type
    #[arg(short, long, value_enum)]
    polygon_type: Option<PolygonType>,

    /// Face reduction level
    #[arg(short, long, value_enum)]
    face_level: Option<FaceLevel>,

    #[command(flatten)]
    job: JobArgs,
}

impl SmartTopologyArgs {
    async fn run(self, client: &ApiClient) -> anyhow::Result<()> {
        let model = ModelInput::parse(&self.model)?;
        let model_type = resolve_model_type(
            &model.as_str(),
            self.file_type,
            &[
                ModelType::Glb,
                ModelType::Gltf,
                ModelType::Obj,
                ModelType::Fbx,
                ModelType::Stl,
            ],
            "smart topology",
        )?;
        let source = match model {
            ModelInput::Url(ref url) => ModelSource::Url(url.clone()),
            ModelInput::Local(ref path) => ModelSource::Content(read_model_base64(path)?),
        };
        let payload = SmartTopologyJob {
            file: ModelFile { model_type, source },
            polygon_type: self.polygon_type,
            face_level: self.face_level,
        };
        let title = model.title();
        self.job
            .pipeline(client)
            .run_job(
                JobKind::SmartTopology,
                &payload,
                title.as_deref(),
                &self.job.options("./hunyuan_output_topology"),
            )
            .await
    }
}

#[derive(Args, Clone, Debug, Eq, PartialEq)]
pub(crate) struct TextureEditArgs {
    /// Public URL of the FBX model to retexture (fewer than 100000 faces)
    model: String,

    /// The new texture's prompt or reference image (JPG or PNG)
    #[command(flatten)]
    guide: GuideArgs,

    /// Generate a PBR texture (only with `--prompt`)
    #[arg(long, requires = "prompt")]
    pbr: bool,

    #[command(flatten)]
    job: JobArgs,
}

impl TextureEditArgs {
    async fn run(self, client: &ApiClient) -> anyhow::Result<()> {
        let url = require_url(&self.model, "model")?;
        warn_unexpected_extension(&url, &[".fbx"], "Model for texture editing");
        let (guide, title) = if let Some(ref prompt) = self.guide.prompt {
            let prompt = check_prompt(prompt, PRO_PROMPT_LIMIT)?;
            let guide = TextureGuide::Prompt {
                prompt: prompt.clone(),
                enable_pbr: self.pbr,
            };
            (guide, Some(prompt))
        } else if let Some(ref path) = self.guide.image {
            let data = read_image_base64(path, REFERENCE_IMAGE_EXTENSIONS)?;
            let guide = TextureGuide::Image {
                image: ImageSource::Base64(data),
            };
            (guide, title_from_path(path))
        } else {
            let image_url = require_url(
                self.guide.image_url.as_deref().unwrap_or_default(),
                "reference image URL",
            )?;
            let guide = TextureGuide::Image {
                image: ImageSource::Url(image_url),
            };
            (guide, title_from_url(&url))
        };
        let payload = TextureEditJob {
            file: ModelFile {
                model_type: ModelType::Fbx,
                source: ModelSource::Url(url),
            },
            guide,
        };
        self.job
            .pipeline(client)
            .run_job(
                JobKind::TextureEdit,
                &payload,
                title.as_deref(),
                &self.job.options("./hunyuan_output_texture_edit"),
            )
            .await
    }
}

/// Arguments of the jobs that take nothing but a model
#[derive(Args, Clone, Debug, Eq, PartialEq)]
pub(crate) struct ModelJobArgs {
    /// Public URL of the input model
    #[arg(short, long)]
    url: String,

    /// Model file type.  Detected from the URL by default.
    #[arg(short = 't', long = "type", value_enum, ignore_case = true)]
    model_type: Option<ModelType>,

    #[command(flatten)]
    job: JobArgs,
}

impl ModelJobArgs {
    async fn run(self, client: &ApiClient, kind: JobKind) -> anyhow::Result<()> {
        let url = require_url(&self.url, "model")?;
        let (model_type, default_outdir) = match kind {
            JobKind::Part => {
                // Part extraction takes FBX only, whatever the extension says
                let model_type = resolve_model_type(
                    &url,
                    Some(self.model_type.unwrap_or(ModelType::Fbx)),
                    &[ModelType::Fbx],
                    "part extraction",
                )?;
                warn_unexpected_extension(&url, &[".fbx"], "Model for part extraction");
                (model_type, "./hunyuan_output_part")
            }
            _ => {
                let model_type = resolve_model_type(
                    &url,
                    self.model_type,
                    &[ModelType::Fbx, ModelType::Obj, ModelType::Glb],
                    "UV unwrapping",
                )?;
                (model_type, "./hunyuan_output_uv")
            }
        };
        let payload = ModelJob {
            file: ModelFile {
                model_type,
                source: ModelSource::Url(url.clone()),
            },
        };
        let title = title_from_url(&url);
        self.job
            .pipeline(client)
            .run_job(
                kind,
                &payload,
                title.as_deref(),
                &self.job.options(default_outdir),
            )
            .await
    }
}

#[derive(Args, Clone, Debug, Eq, PartialEq)]
pub(crate) struct QueryArgs {
    /// ID of the job to query
    job_id: String,

    /// Type of the job
    #[arg(short = 't', long = "type", value_enum, default_value = "hunyuan")]
    kind: JobKind,

    /// Wait until the job finishes
    #[arg(long)]
    wait: bool,

    /// Number of seconds to wait between job status queries
    #[arg(
        long,
        default_value_t = DEFAULT_POLL_INTERVAL.as_secs(),
        value_name = "SECONDS",
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    poll: u64,

    /// Download the job's results once it is done
    #[arg(long)]
    download: bool,

    /// Directory in which to save downloaded results
    #[arg(short, long, value_name = "DIR", default_value = "./hunyuan_output_query")]
    output: PathBuf,
}

impl QueryArgs {
    async fn run(self, client: &ApiClient) -> anyhow::Result<()> {
        let job_id = parse_job_id(&self.job_id)?;
        Pipeline::new(client, Poller::new(Duration::from_secs(self.poll)))
            .query(
                self.kind,
                &job_id,
                self.wait,
                self.download.then_some(self.output.as_path()),
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Debug, Parser)]
    struct Cli {
        #[command(subcommand)]
        command: Command,
    }

    fn parse(args: &[&str]) -> Result<Command, clap::Error> {
        Cli::try_parse_from(std::iter::once("hy3d").chain(args.iter().copied()))
            .map(|cli| cli.command)
    }

    #[test]
    fn text_to_3d_defaults() {
        let Ok(Command::TextTo3D(args)) = parse(&["text-to-3d", "-p", "a cat"]) else {
            panic!("text-to-3d should parse");
        };
        assert_eq!(args.prompt, "a cat");
        assert_eq!(args.faces, 400_000);
        assert_eq!(args.generate_type, GenerateType::Normal);
        assert_eq!(args.job.poll, 10);
        assert!(!args.job.no_wait);
        assert_eq!(
            args.job.options("./hunyuan_output_txt").outdir,
            PathBuf::from("./hunyuan_output_txt")
        );
    }

    #[test]
    fn image_to_3d_options() {
        let Ok(Command::ImageTo3D(args)) = parse(&[
            "image-to-3d",
            "car.jpg",
            "--type",
            "LowPoly",
            "--polygon",
            "quad",
            "--pbr",
            "-o",
            "out",
        ]) else {
            panic!("image-to-3d should parse");
        };
        assert_eq!(args.generate_type, GenerateType::LowPoly);
        assert_eq!(args.polygon_type, PolygonType::Quadrilateral);
        assert!(args.pbr);
        assert_eq!(args.job.options("unused").outdir, PathBuf::from("out"));
    }

    #[test]
    fn rapid_requires_exactly_one_input() {
        assert!(parse(&["rapid"]).is_err());
        assert!(parse(&["rapid", "-p", "cat", "--image-url", "https://x/a.png"]).is_err());
        let Ok(Command::Rapid(args)) =
            parse(&["rapid", "--image-url", "https://x/a.png", "-f", "glb", "--pbr"])
        else {
            panic!("rapid should parse");
        };
        assert_eq!(args.format, RapidFormat::Glb);
        assert_eq!(args.guide.image_url.as_deref(), Some("https://x/a.png"));
        assert_eq!(args.guide.prompt, None);
    }

    #[test]
    fn texture_edit_pbr_requires_prompt() {
        assert!(parse(&[
            "texture-edit",
            "https://x/m.fbx",
            "--image-url",
            "https://x/r.png",
            "--pbr"
        ])
        .is_err());
        assert!(parse(&["texture-edit", "https://x/m.fbx", "-p", "wood", "--pbr"]).is_ok());
    }

    #[test]
    fn query_type_names() {
        let Ok(Command::Query(args)) =
            parse(&["query", "123", "--type", "smart-topology", "--wait"])
        else {
            panic!("query should parse");
        };
        assert_eq!(args.kind, JobKind::SmartTopology);
        assert!(args.wait);
        assert!(!args.download);
        let Ok(Command::Query(args)) = parse(&["query", "123"]) else {
            panic!("query should parse");
        };
        assert_eq!(args.kind, JobKind::Pro);
    }

    #[test]
    fn poll_interval_must_be_positive() {
        assert!(parse(&["uv", "-u", "https://x/m.glb", "--poll", "0"]).is_err());
    }
}
