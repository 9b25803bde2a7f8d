mod backend;
pub mod backends;
mod client;
mod response;
mod result;

pub use backend::InferenceEndpoint;
pub use backends::{ModelEndpoint, StubEndpoint, StubReply, WorkflowEndpoint};
pub use client::{Attempt, DetectionOutcome, PlayerDetector};
pub use response::{parse_response, ParsedResponse, PredictionField, ResponseError};
pub use result::{BoundingBox, Detection, Point};
