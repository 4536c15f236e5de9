// src/services/normalizer.rs

//! Turns whatever answer shapes clients send into [`CanonicalAnswer`]s.
//!
//! Two shapes are understood, tried in order:
//!
//! * current: `{questionId | qId, selectedOption | option}`
//! * legacy: `{optionKey | optionValue, questionId?, qIndex?}`, where a
//!   missing question id falls back to the item's 1-based position.
//!
//! Anything else is reported with its index and reason.

use serde_json::{Map, Value};

use crate::models::answer::{CanonicalAnswer, NormalizationIssue};

const UNRECOGNIZED_REASON: &str = "Missing questionId/selectedOption (or optionKey) fields";

/// Classification of one raw item.
#[derive(Debug, Clone, PartialEq)]
pub enum AnswerShape {
    Current { question_id: String, selected_option: String },
    Legacy { question_id: String, selected_option: String },
    Unrecognized { index: usize, reason: String },
}

impl AnswerShape {
    pub fn classify(index: usize, item: &Value) -> Self {
        let Some(fields) = item.as_object() else {
            return AnswerShape::Unrecognized {
                index,
                reason: "Answer must be an object".to_string(),
            };
        };

        if let Some(shape) = current_shape(fields) {
            return shape;
        }
        if let Some(shape) = legacy_shape(index, fields) {
            return shape;
        }

        AnswerShape::Unrecognized {
            index,
            reason: UNRECOGNIZED_REASON.to_string(),
        }
    }

    pub fn into_canonical(self) -> Result<CanonicalAnswer, NormalizationIssue> {
        match self {
            AnswerShape::Current { question_id, selected_option }
            | AnswerShape::Legacy { question_id, selected_option } => {
                Ok(CanonicalAnswer { question_id, selected_option })
            }
            AnswerShape::Unrecognized { index, reason } => Err(NormalizationIssue { index, reason }),
        }
    }
}

fn current_shape(fields: &Map<String, Value>) -> Option<AnswerShape> {
    let question = truthy(coalesce(fields, &["questionId", "qId"]))?;
    let selection = truthy(coalesce(fields, &["selectedOption", "option"]))?;
    Some(AnswerShape::Current {
        question_id: coerce_to_string(question),
        selected_option: coerce_to_string(selection),
    })
}

fn legacy_shape(index: usize, fields: &Map<String, Value>) -> Option<AnswerShape> {
    let has_pair = truthy(fields.get("optionKey")).is_some()
        || truthy(fields.get("optionValue")).is_some();
    if !has_pair {
        return None;
    }

    let question_id = match coalesce(fields, &["questionId", "qIndex"]) {
        Some(explicit) => coerce_to_string(truthy(Some(explicit))?),
        None => (index + 1).to_string(),
    };
    let selection = truthy(coalesce(fields, &["selectedOption", "optionKey", "optionValue"]))?;

    Some(AnswerShape::Legacy {
        question_id,
        selected_option: coerce_to_string(selection),
    })
}

/// First of `keys` that is present and not null.
fn coalesce<'a>(fields: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| fields.get(*k))
        .find(|v| !v.is_null())
}

/// `None` for null, false, zero, NaN and the empty string.
fn truthy(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    })
}

fn coerce_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => match n.as_f64() {
            Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", f as i64),
            _ => n.to_string(),
        },
        other => other.to_string(),
    }
}

/// Normalizes a whole batch. Any unrecognized item fails the batch, and
/// every issue is reported, not just the first.
pub fn normalize_answers(items: &[Value]) -> Result<Vec<CanonicalAnswer>, Vec<NormalizationIssue>> {
    let mut answers = Vec::with_capacity(items.len());
    let mut issues = Vec::new();

    for (index, item) in items.iter().enumerate() {
        match AnswerShape::classify(index, item).into_canonical() {
            Ok(answer) => answers.push(answer),
            Err(issue) => issues.push(issue),
        }
    }

    if issues.is_empty() { Ok(answers) } else { Err(issues) }
}
