use anyhow::{anyhow, Context, Result};
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;
use url::Url;

use super::{build_agent, describe_request_error, encode_image, read_json};
use crate::config::DetectorSettings;
use crate::detect::backend::InferenceEndpoint;

/// Workflow (pipeline) execution, used when the direct model call fails.
///
/// Requests go through a long-lived session first. When that fails and
/// ephemeral sessions are allowed, a fresh session is opened, the settle time
/// elapses, and the request is issued once more on it.
pub struct WorkflowEndpoint {
    session: ureq::Agent,
    url: String,
    api_key: String,
    timeout: Duration,
    ephemeral_session: bool,
    settle: Duration,
}

impl WorkflowEndpoint {
    pub fn new(settings: &DetectorSettings) -> Result<Self> {
        if settings.api_key.trim().is_empty() {
            return Err(anyhow!("detector api key is not set (RINK_API_KEY)"));
        }
        let url = format!(
            "{}/{}/workflows/{}",
            settings.workflow_url.trim_end_matches('/'),
            settings.workspace,
            settings.workflow_id
        );
        Url::parse(&url).with_context(|| format!("invalid workflow endpoint url '{}'", url))?;
        Ok(Self {
            session: build_agent(settings.timeout),
            url,
            api_key: settings.api_key.clone(),
            timeout: settings.timeout,
            ephemeral_session: settings.fallback.ephemeral_session,
            settle: settings.fallback.settle,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn run(&self, agent: &ureq::Agent, body: &str) -> Result<Value> {
        let response = agent
            .post(&self.url)
            .set("Content-Type", "application/json")
            .send_string(body)
            .map_err(|err| describe_request_error(self.name(), err))?;
        read_json(response).map(unwrap_outputs)
    }
}

impl InferenceEndpoint for WorkflowEndpoint {
    fn name(&self) -> &'static str {
        "workflow"
    }

    fn infer(&mut self, image_path: &Path) -> Result<Value> {
        let body = json!({
            "api_key": self.api_key,
            "inputs": {
                "image": {"type": "base64", "value": encode_image(image_path)?}
            }
        })
        .to_string();

        let err = match self.run(&self.session, &body) {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        if !self.ephemeral_session {
            return Err(err);
        }

        log::warn!(
            "workflow session failed ({:#}); retrying on a short-lived session",
            err
        );
        let ephemeral = build_agent(self.timeout);
        std::thread::sleep(self.settle);
        self.run(&ephemeral, &body)
            .context("short-lived workflow session failed")
    }
}

/// Workflow responses wrap each image's result as `{"outputs": [ {...} ]}`.
fn unwrap_outputs(value: Value) -> Value {
    match value {
        Value::Object(mut obj) => match obj.remove("outputs") {
            Some(Value::Array(mut outputs)) if !outputs.is_empty() => outputs.swap_remove(0),
            Some(other) => {
                obj.insert("outputs".to_string(), other);
                Value::Object(obj)
            }
            None => Value::Object(obj),
        },
        other => other,
    }
}
