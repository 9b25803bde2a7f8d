//! Remote detection response parsing.
//!
//! Hosted detectors do not agree on a response envelope. The detection list is
//! looked up under a small declared set of top-level keys, probed in order:
//! `predictions`, `data`, `results`, `output`. The first key present wins.
//!
//! Items use the center + size form:
//! `{"class": "player", "x": 50, "y": 60, "width": 20, "height": 40, "confidence": 0.9}`.
//! Missing numeric fields default (position/size to 0, confidence to 0.5) so a
//! single sparse item does not discard the batch.

use serde_json::{Map, Value};

use super::result::Detection;

pub const DEFAULT_CONFIDENCE: f32 = 0.5;

/// Nested envelopes (`{"predictions": {"predictions": [...]}}`) are followed this deep.
const MAX_ENVELOPE_DEPTH: usize = 3;

/// Recognized top-level keys holding the detection list.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PredictionField {
    Predictions,
    Data,
    Results,
    Output,
}

impl PredictionField {
    pub const PROBE_ORDER: [PredictionField; 4] = [
        PredictionField::Predictions,
        PredictionField::Data,
        PredictionField::Results,
        PredictionField::Output,
    ];

    pub fn key(self) -> &'static str {
        match self {
            PredictionField::Predictions => "predictions",
            PredictionField::Data => "data",
            PredictionField::Results => "results",
            PredictionField::Output => "output",
        }
    }
}

/// Why a response carried no usable detection list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResponseError {
    NotAnObject,
    NoPredictionField,
    FieldNotList(PredictionField),
}

impl std::fmt::Display for ResponseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResponseError::NotAnObject => write!(f, "response is not a JSON object"),
            ResponseError::NoPredictionField => write!(
                f,
                "response has none of the fields predictions, data, results, output"
            ),
            ResponseError::FieldNotList(field) => {
                write!(f, "response field '{}' is not a list", field.key())
            }
        }
    }
}

impl std::error::Error for ResponseError {}

/// Detections extracted from one response.
#[derive(Clone, Debug, PartialEq)]
pub struct ParsedResponse {
    pub field: PredictionField,
    pub detections: Vec<Detection>,
    /// Items dropped for a non-matching class or a non-object shape.
    pub skipped: usize,
}

/// Extract detections whose class is in `classes`.
pub fn parse_response(value: &Value, classes: &[String]) -> Result<ParsedResponse, ResponseError> {
    parse_envelope(value, classes, 0)
}

fn parse_envelope(
    value: &Value,
    classes: &[String],
    depth: usize,
) -> Result<ParsedResponse, ResponseError> {
    let obj = value.as_object().ok_or(ResponseError::NotAnObject)?;
    let (field, list) = probe(obj).ok_or(ResponseError::NoPredictionField)?;

    match list {
        Value::Null => Ok(ParsedResponse {
            field,
            detections: Vec::new(),
            skipped: 0,
        }),
        Value::Array(items) => Ok(parse_items(field, items, classes)),
        Value::Object(_) if depth + 1 < MAX_ENVELOPE_DEPTH => {
            match parse_envelope(list, classes, depth + 1) {
                Ok(inner) => Ok(inner),
                Err(ResponseError::NoPredictionField) => Err(ResponseError::FieldNotList(field)),
                Err(err) => Err(err),
            }
        }
        _ => Err(ResponseError::FieldNotList(field)),
    }
}

fn probe(obj: &Map<String, Value>) -> Option<(PredictionField, &Value)> {
    PredictionField::PROBE_ORDER
        .iter()
        .find_map(|field| obj.get(field.key()).map(|value| (*field, value)))
}

fn parse_items(field: PredictionField, items: &[Value], classes: &[String]) -> ParsedResponse {
    let mut detections = Vec::new();
    let mut skipped = 0;
    for item in items {
        match parse_item(item, classes) {
            Some(detection) => {
                log::debug!(
                    "detected player: bbox={:?}, confidence={:.2}",
                    <[i32; 4]>::from(detection.bbox()),
                    detection.confidence()
                );
                detections.push(detection);
            }
            None => skipped += 1,
        }
    }
    ParsedResponse {
        field,
        detections,
        skipped,
    }
}

fn parse_item(item: &Value, classes: &[String]) -> Option<Detection> {
    let obj = item.as_object()?;
    let class = obj.get("class").and_then(Value::as_str)?;
    if !classes.iter().any(|wanted| wanted == class) {
        return None;
    }

    let number = |key: &str, default: f64| obj.get(key).and_then(Value::as_f64).unwrap_or(default);
    Some(Detection::from_center(
        number("x", 0.0),
        number("y", 0.0),
        number("width", 0.0),
        number("height", 0.0),
        number("confidence", f64::from(DEFAULT_CONFIDENCE)) as f32,
    ))
}
