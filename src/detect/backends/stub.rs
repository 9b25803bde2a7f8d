use anyhow::{anyhow, Result};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::detect::backend::InferenceEndpoint;

/// Scripted reply for `StubEndpoint`.
#[derive(Clone, Debug)]
pub enum StubReply {
    Response(Value),
    Failure(String),
}

/// One recorded `infer` call.
#[derive(Clone, Debug)]
pub struct StubCall {
    pub path: PathBuf,
    /// Whether the image existed on disk while the call ran.
    pub image_present: bool,
}

/// Shared view of the calls a `StubEndpoint` received.
#[derive(Clone, Debug, Default)]
pub struct StubCalls(Arc<Mutex<Vec<StubCall>>>);

impl StubCalls {
    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> Vec<StubCall> {
        match self.0.lock() {
            Ok(calls) => calls.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn push(&self, call: StubCall) {
        match self.0.lock() {
            Ok(mut calls) => calls.push(call),
            Err(poisoned) => poisoned.into_inner().push(call),
        }
    }
}

/// Offline endpoint for tests. Replays scripted replies in order, then repeats
/// the default reply (an empty `predictions` list unless overridden).
pub struct StubEndpoint {
    script: VecDeque<StubReply>,
    default: StubReply,
    calls: StubCalls,
}

impl StubEndpoint {
    pub fn new() -> Self {
        Self {
            script: VecDeque::new(),
            default: StubReply::Response(json!({"predictions": []})),
            calls: StubCalls::default(),
        }
    }

    /// Queue a successful response.
    pub fn reply(mut self, value: Value) -> Self {
        self.script.push_back(StubReply::Response(value));
        self
    }

    /// Queue a failed call.
    pub fn fail(mut self, message: &str) -> Self {
        self.script.push_back(StubReply::Failure(message.to_string()));
        self
    }

    /// Reply used once the script is exhausted.
    pub fn otherwise(mut self, reply: StubReply) -> Self {
        self.default = reply;
        self
    }

    pub fn calls(&self) -> StubCalls {
        self.calls.clone()
    }
}

impl Default for StubEndpoint {
    fn default() -> Self {
        Self::new()
    }
}

impl InferenceEndpoint for StubEndpoint {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn infer(&mut self, image_path: &Path) -> Result<Value> {
        self.calls.push(StubCall {
            path: image_path.to_path_buf(),
            image_present: image_path.is_file(),
        });
        match self.script.pop_front().unwrap_or_else(|| self.default.clone()) {
            StubReply::Response(value) => Ok(value),
            StubReply::Failure(message) => Err(anyhow!(message)),
        }
    }
}
