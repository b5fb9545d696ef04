//! Request bodies for each API action.  Field names are the API's own
//! (PascalCase), and optional fields are omitted rather than sent as `null`.
use serde::Serialize;

/// Style of model produced by a Pro job
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, clap::ValueEnum)]
#[value(rename_all = "verbatim")]
pub(crate) enum GenerateType {
    #[default]
    Normal,
    LowPoly,
    Geometry,
    Sketch,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
#[value(rename_all = "lower")]
pub(crate) enum PolygonType {
    Triangle,
    #[value(alias = "quad")]
    Quadrilateral,
}

/// How aggressively smart topology reduces the face count
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
#[value(rename_all = "lower")]
pub(crate) enum FaceLevel {
    High,
    Medium,
    Low,
}

/// Output format of a Rapid job
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "UPPERCASE")]
#[value(rename_all = "UPPER")]
pub(crate) enum RapidFormat {
    Obj,
    Glb,
    #[default]
    Stl,
    Usdz,
    Fbx,
    Mp4,
    Gif,
}

/// Target format of a format conversion
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "UPPERCASE")]
#[value(rename_all = "UPPER")]
pub(crate) enum ConvertFormat {
    #[default]
    Stl,
    Usdz,
    Fbx,
    Mp4,
    Gif,
}

/// File type tag of an input model
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, clap::ValueEnum, strum::Display)]
#[serde(rename_all = "UPPERCASE")]
#[value(rename_all = "UPPER")]
#[strum(serialize_all = "UPPERCASE")]
pub(crate) enum ModelType {
    #[default]
    Glb,
    Gltf,
    Obj,
    Fbx,
    Stl,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub(crate) enum ViewType {
    Left,
    Right,
    Back,
}

/// An extra viewpoint of the subject for image-to-3D
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub(crate) struct ViewImage {
    #[serde(rename = "ViewType")]
    pub(crate) view_type: ViewType,
    #[serde(rename = "ViewImageBase64")]
    pub(crate) image_base64: String,
}

/// Body of `SubmitHunyuanTo3DProJob`, used for both text and image input
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub(crate) struct ProJob {
    #[serde(rename = "Prompt", skip_serializing_if = "Option::is_none")]
    pub(crate) prompt: Option<String>,

    #[serde(rename = "ImageBase64", skip_serializing_if = "Option::is_none")]
    pub(crate) image_base64: Option<String>,

    #[serde(rename = "GenerateType")]
    pub(crate) generate_type: GenerateType,

    #[serde(rename = "FaceCount")]
    pub(crate) face_count: u32,

    #[serde(rename = "EnablePBR", skip_serializing_if = "Option::is_none")]
    pub(crate) enable_pbr: Option<bool>,

    /// Only meaningful with [`GenerateType::LowPoly`]
    #[serde(rename = "PolygonType", skip_serializing_if = "Option::is_none")]
    pub(crate) polygon_type: Option<PolygonType>,

    #[serde(rename = "MultiViewImages", skip_serializing_if = "Vec::is_empty")]
    pub(crate) multi_view_images: Vec<ViewImage>,
}

/// The single input of a Rapid job
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub(crate) enum RapidInput {
    Prompt(String),
    ImageBase64(String),
    ImageUrl(String),
}

/// Body of `SubmitHunyuanTo3DRapidJob`
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub(crate) struct RapidJob {
    #[serde(rename = "ResultFormat")]
    pub(crate) result_format: RapidFormat,

    #[serde(rename = "EnablePBR")]
    pub(crate) enable_pbr: bool,

    #[serde(rename = "EnableGeometry")]
    pub(crate) enable_geometry: bool,

    #[serde(flatten)]
    pub(crate) input: RapidInput,
}

/// Where the API reads an input model from
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub(crate) enum ModelSource {
    Url(String),
    /// Base64 of the file's bytes
    Content(String),
}

/// An input model reference, sent as `File3D` or `File` depending on the
/// action
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub(crate) struct ModelFile {
    #[serde(rename = "Type")]
    pub(crate) model_type: ModelType,

    #[serde(flatten)]
    pub(crate) source: ModelSource,
}

/// Body of `Convert3DFormat`
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub(crate) struct ConvertJob {
    /// URL of the model to convert
    #[serde(rename = "File3D")]
    pub(crate) file_url: String,

    #[serde(rename = "Format")]
    pub(crate) format: ConvertFormat,
}

/// Body of `Submit3DSmartTopologyJob`
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub(crate) struct SmartTopologyJob {
    #[serde(rename = "File3D")]
    pub(crate) file: ModelFile,

    #[serde(rename = "PolygonType", skip_serializing_if = "Option::is_none")]
    pub(crate) polygon_type: Option<PolygonType>,

    #[serde(rename = "FaceLevel", skip_serializing_if = "Option::is_none")]
    pub(crate) face_level: Option<FaceLevel>,
}

/// A reference image for texture editing
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub(crate) enum ImageSource {
    Base64(String),
    Url(String),
}

/// What a texture edit is guided by
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(untagged)]
pub(crate) enum TextureGuide {
    Prompt {
        #[serde(rename = "Prompt")]
        prompt: String,
        /// Sent only when enabled
        #[serde(rename = "EnablePBR", skip_serializing_if = "std::ops::Not::not")]
        enable_pbr: bool,
    },
    Image {
        #[serde(rename = "Image")]
        image: ImageSource,
    },
}

/// Body of `SubmitHunyuanTo3DTextureEditJob`; the model must be FBX
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub(crate) struct TextureEditJob {
    #[serde(rename = "File3D")]
    pub(crate) file: ModelFile,

    #[serde(flatten)]
    pub(crate) guide: TextureGuide,
}

/// Body of `SubmitHunyuan3DPartJob` and `SubmitHunyuanTo3DUVJob`
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub(crate) struct ModelJob {
    #[serde(rename = "File")]
    pub(crate) file: ModelFile,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn body<T: Serialize>(payload: &T) -> serde_json::Value {
        serde_json::to_value(payload).unwrap()
    }

    #[test]
    fn text_to_3d_body() {
        let job = ProJob {
            prompt: Some("a cute cat".into()),
            face_count: 400_000,
            ..ProJob::default()
        };
        assert_eq!(
            serde_json::to_string(&job).unwrap(),
            r#"{"Prompt":"a cute cat","GenerateType":"Normal","FaceCount":400000}"#
        );
    }

    #[test]
    fn image_to_3d_body() {
        let job = ProJob {
            image_base64: Some("aW1n".into()),
            generate_type: GenerateType::LowPoly,
            face_count: 40_000,
            enable_pbr: Some(true),
            polygon_type: Some(PolygonType::Quadrilateral),
            multi_view_images: vec![ViewImage {
                view_type: ViewType::Left,
                image_base64: "bGVmdA==".into(),
            }],
            ..ProJob::default()
        };
        assert_eq!(
            body(&job),
            json!({
                "ImageBase64": "aW1n",
                "GenerateType": "LowPoly",
                "FaceCount": 40000,
                "EnablePBR": true,
                "PolygonType": "quadrilateral",
                "MultiViewImages": [{"ViewType": "left", "ViewImageBase64": "bGVmdA=="}]
            })
        );
    }

    #[test]
    fn rapid_body() {
        let job = RapidJob {
            result_format: RapidFormat::Glb,
            enable_pbr: true,
            enable_geometry: false,
            input: RapidInput::ImageUrl("https://example.com/cat.jpg".into()),
        };
        assert_eq!(
            body(&job),
            json!({
                "ResultFormat": "GLB",
                "EnablePBR": true,
                "EnableGeometry": false,
                "ImageUrl": "https://example.com/cat.jpg"
            })
        );
    }

    #[test]
    fn convert_body() {
        let job = ConvertJob {
            file_url: "https://example.com/model.glb".into(),
            format: ConvertFormat::Usdz,
        };
        assert_eq!(
            body(&job),
            json!({"File3D": "https://example.com/model.glb", "Format": "USDZ"})
        );
    }

    #[test]
    fn smart_topology_body() {
        let job = SmartTopologyJob {
            file: ModelFile {
                model_type: ModelType::Obj,
                source: ModelSource::Content("b2Jq".into()),
            },
            polygon_type: None,
            face_level: Some(FaceLevel::Medium),
        };
        assert_eq!(
            body(&job),
            json!({"File3D": {"Type": "OBJ", "Content": "b2Jq"}, "FaceLevel": "medium"})
        );
    }

    #[test]
    fn texture_edit_bodies() {
        let file = ModelFile {
            model_type: ModelType::Fbx,
            source: ModelSource::Url("https://example.com/m.fbx".into()),
        };
        let by_prompt = TextureEditJob {
            file: file.clone(),
            guide: TextureGuide::Prompt {
                prompt: "wooden".into(),
                enable_pbr: false,
            },
        };
        assert_eq!(
            body(&by_prompt),
            json!({"File3D": {"Type": "FBX", "Url": "https://example.com/m.fbx"}, "Prompt": "wooden"})
        );
        let by_image = TextureEditJob {
            file,
            guide: TextureGuide::Image {
                image: ImageSource::Base64("cG5n".into()),
            },
        };
        assert_eq!(
            body(&by_image),
            json!({"File3D": {"Type": "FBX", "Url": "https://example.com/m.fbx"}, "Image": {"Base64": "cG5n"}})
        );
    }

    #[test]
    fn model_job_body() {
        let job = ModelJob {
            file: ModelFile {
                model_type: ModelType::Glb,
                source: ModelSource::Url("https://example.com/m.glb".into()),
            },
        };
        assert_eq!(
            body(&job),
            json!({"File": {"Type": "GLB", "Url": "https://example.com/m.glb"}})
        );
    }
}
