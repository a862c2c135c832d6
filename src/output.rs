use crate::error::ErrorPayload;
use crate::pipeline::{PrerenderReport, WrittenRoute};
use serde::{Deserialize, Serialize};

/// Schema version for output payloads.
pub const PRERENDER_OUTPUT_VERSION: &str = "0.1.0";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum PrerenderOutput {
    Render(RenderOutput),
    Error(ErrorOutput),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderOutput {
    pub version: String,
    pub routes: Vec<WrittenRoute>,
    pub elapsed_ms: u64,
}

impl From<PrerenderReport> for RenderOutput {
    fn from(report: PrerenderReport) -> Self {
        Self {
            version: PRERENDER_OUTPUT_VERSION.to_string(),
            routes: report.routes,
            elapsed_ms: report.elapsed.as_millis() as u64,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorOutput {
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub error: ErrorPayload,
}
