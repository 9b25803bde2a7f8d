pub mod model;
pub mod stub;
pub mod workflow;

pub use model::ModelEndpoint;
pub use stub::{StubCalls, StubEndpoint, StubReply};
pub use workflow::WorkflowEndpoint;

use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose, Engine as _};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;

/// Upload cap. Frames are JPEG-encoded, so anything larger is not a frame.
const MAX_IMAGE_BYTES: u64 = 20 * 1024 * 1024;

pub(crate) fn build_agent(timeout: Duration) -> ureq::Agent {
    ureq::AgentBuilder::new().timeout(timeout).build()
}

pub(crate) fn encode_image(path: &Path) -> Result<String> {
    let len = std::fs::metadata(path)
        .with_context(|| format!("stat image {}", path.display()))?
        .len();
    if len == 0 {
        return Err(anyhow!("image {} is empty", path.display()));
    }
    if len > MAX_IMAGE_BYTES {
        return Err(anyhow!(
            "image {} is {} bytes; upload limit is {}",
            path.display(),
            len,
            MAX_IMAGE_BYTES
        ));
    }
    let bytes =
        std::fs::read(path).with_context(|| format!("read image {}", path.display()))?;
    Ok(general_purpose::STANDARD.encode(bytes))
}

/// Parse a JSON response body.
pub(crate) fn read_json(response: ureq::Response) -> Result<Value> {
    serde_json::from_reader(response.into_reader()).context("decode detector response as json")
}

/// Describe a request failure without echoing the request URL, which carries the API key.
pub(crate) fn describe_request_error(endpoint: &str, err: ureq::Error) -> anyhow::Error {
    match err {
        ureq::Error::Status(code, response) => anyhow!(
            "{} returned status {} {}",
            endpoint,
            code,
            response.status_text()
        ),
        ureq::Error::Transport(transport) => match transport.message() {
            Some(message) => anyhow!("{} transport error ({}): {}", endpoint, transport.kind(), message),
            None => anyhow!("{} transport error ({})", endpoint, transport.kind()),
        },
    }
}

/// Thresholds are configured as fractions; the hosted API takes whole percentages.
pub(crate) fn as_percent(fraction: f32) -> u32 {
    (fraction.clamp(0.0, 1.0) * 100.0).round() as u32
}
