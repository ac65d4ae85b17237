use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Identifies which inference route a job is destined for. Each variant corresponds to
/// one `POST /api/v1/<job_type>/jobs` path segment and one pair of engine URLs in
/// `EngineRoutes`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobType {
    CameraAngle,
    QwenImageEdit,
    FaceMask,
    FullFaceSwap,
}

impl JobType {
    pub fn as_route(&self) -> &'static str {
        match self {
            JobType::CameraAngle => "camera-angle",
            JobType::QwenImageEdit => "qwen-image-edit",
            JobType::FaceMask => "face-mask",
            JobType::FullFaceSwap => "full-face-swap",
        }
    }

    /// Top-level fields that must be present (not validated further) in a submission
    /// body for this job type. The orchestrator only checks presence; it never
    /// interprets the values, since the inference engine is the only component that
    /// understands them.
    pub fn required_envelope_fields(&self) -> &'static [&'static str] {
        match self {
            JobType::CameraAngle => &["image_url", "prompt"],
            JobType::QwenImageEdit => &["image_url", "prompt"],
            JobType::FaceMask => &["image_url"],
            JobType::FullFaceSwap => &["source_image_url", "target_image_url"],
        }
    }
}

impl FromStr for JobType {
    type Err = ParseJobTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "camera-angle" => Ok(JobType::CameraAngle),
            "qwen-image-edit" => Ok(JobType::QwenImageEdit),
            "face-mask" => Ok(JobType::FaceMask),
            "full-face-swap" => Ok(JobType::FullFaceSwap),
            other => Err(ParseJobTypeError(other.to_owned())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("{0} is not a supported job type")]
pub struct ParseJobTypeError(String);
