use anyhow::{anyhow, Context, Result};
use serde_json::Value;
use std::path::Path;
use url::Url;

use super::{as_percent, build_agent, describe_request_error, encode_image, read_json};
use crate::config::DetectorSettings;
use crate::detect::backend::InferenceEndpoint;

/// Direct single-shot model inference.
///
/// Posts the base64 image to `<api_url>/<workspace>/<workflow_id>` with the
/// confidence and overlap thresholds as query parameters.
pub struct ModelEndpoint {
    agent: ureq::Agent,
    url: String,
    api_key: String,
    confidence: u32,
    overlap: u32,
}

impl ModelEndpoint {
    pub fn new(settings: &DetectorSettings) -> Result<Self> {
        if settings.api_key.trim().is_empty() {
            return Err(anyhow!("detector api key is not set (RINK_API_KEY)"));
        }
        let url = format!(
            "{}/{}",
            settings.api_url.trim_end_matches('/'),
            settings.model_id()
        );
        Url::parse(&url).with_context(|| format!("invalid model endpoint url '{}'", url))?;
        Ok(Self {
            agent: build_agent(settings.timeout),
            url,
            api_key: settings.api_key.clone(),
            confidence: as_percent(settings.confidence),
            overlap: as_percent(settings.overlap),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl InferenceEndpoint for ModelEndpoint {
    fn name(&self) -> &'static str {
        "direct-model"
    }

    fn infer(&mut self, image_path: &Path) -> Result<Value> {
        let body = encode_image(image_path)?;
        let response = self
            .agent
            .post(&self.url)
            .query("api_key", &self.api_key)
            .query("confidence", &self.confidence.to_string())
            .query("overlap", &self.overlap.to_string())
            .set("Content-Type", "application/x-www-form-urlencoded")
            .send_string(&body)
            .map_err(|err| describe_request_error(self.name(), err))?;
        read_json(response)
    }
}
