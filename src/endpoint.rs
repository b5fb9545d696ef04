/// The asynchronous job types offered by the API.  Each one is submitted
/// with one action and polled with another; everything else about the
/// submit, poll & download cycle is shared.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, clap::ValueEnum, strum::Display)]
pub(crate) enum JobKind {
    /// Text or image to 3D (Pro)
    #[value(name = "hunyuan", alias = "pro")]
    #[strum(serialize = "hunyuan")]
    Pro,

    /// Text or image to 3D (Rapid)
    #[strum(serialize = "rapid")]
    Rapid,

    /// Retopology into a cleaner, lower-poly mesh
    #[strum(serialize = "smart-topology")]
    SmartTopology,

    /// Texture redraw guided by a prompt or reference image
    #[strum(serialize = "texture-edit")]
    TextureEdit,

    /// Component identification and generation
    #[strum(serialize = "part")]
    Part,

    /// UV unwrapping
    #[strum(serialize = "uv")]
    Uv,
}

/// Response field holding the output files of every asynchronous job
pub(crate) static JOB_RESULT_FIELD: &str = "ResultFile3Ds";

impl JobKind {
    pub(crate) fn submit_action(self) -> &'static str {
        match self {
            JobKind::Pro => "SubmitHunyuanTo3DProJob",
            JobKind::Rapid => "SubmitHunyuanTo3DRapidJob",
            JobKind::SmartTopology => "Submit3DSmartTopologyJob",
            JobKind::TextureEdit => "SubmitHunyuanTo3DTextureEditJob",
            JobKind::Part => "SubmitHunyuan3DPartJob",
            JobKind::Uv => "SubmitHunyuanTo3DUVJob",
        }
    }

    pub(crate) fn query_action(self) -> &'static str {
        match self {
            JobKind::Pro => "QueryHunyuanTo3DProJob",
            JobKind::Rapid => "QueryHunyuanTo3DRapidJob",
            JobKind::SmartTopology => "Describe3DSmartTopologyJob",
            JobKind::TextureEdit => "QueryHunyuanTo3DTextureEditJob",
            JobKind::Part => "QueryHunyuan3DPartJob",
            JobKind::Uv => "DescribeHunyuanTo3DUVJob",
        }
    }

    pub(crate) fn result_field(self) -> &'static str {
        JOB_RESULT_FIELD
    }
}

/// Format conversion is synchronous: the converted file comes back in the
/// response to the one and only call.
pub(crate) static CONVERT_ACTION: &str = "Convert3DFormat";

/// Response field holding the converted file of a format conversion
pub(crate) static CONVERT_RESULT_FIELD: &str = "ResultFile3D";
