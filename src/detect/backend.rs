use anyhow::Result;
use serde_json::Value;
use std::path::Path;

/// A remote inference call.
///
/// Implementations receive an encoded image already on disk and return the raw
/// JSON response. Normalization happens in `PlayerDetector`, so endpoints do
/// not interpret the payload beyond unwrapping their own transport envelope.
pub trait InferenceEndpoint: Send {
    /// Endpoint identifier for logs.
    fn name(&self) -> &'static str;

    /// Run inference on the image at `image_path`.
    fn infer(&mut self, image_path: &Path) -> Result<Value>;
}
