//! Recover the JSON outline from free-form model output.
//!
//! Models wrap their answer in markdown fences or chatty prose often enough
//! that parsing the raw reply is not an option. Every balanced `[...]` or
//! `{...}` span is tried in order of its opening bracket. Spans nested in
//! an earlier candidate are never tried on their own, so a broken array
//! cannot yield a partial outline.

use crate::slide::{duplicate_id, Outline, Slide};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("no JSON found in model response")]
    NoJson,
    #[error("JSON in model response does not describe slides: {0}")]
    InvalidSlides(String),
    #[error("duplicate slide id {0} in outline")]
    DuplicateId(i64),
}

#[derive(Deserialize)]
struct Wrapped {
    slides: Vec<Slide>,
}

/// Parse the first JSON outline embedded in `text`.
pub fn extract_outline(text: &str) -> Result<Outline, ExtractionError> {
    let mut schema_error: Option<String> = None;
    let mut resume = 0;

    for (start, _) in text.match_indices(['[', '{']) {
        if start < resume {
            continue;
        }
        let Some(end) = balanced_end(&text[start..]) else {
            continue;
        };
        resume = start + end;
        let candidate = &text[start..resume];
        let Ok(value) = serde_json::from_str::<Value>(candidate) else {
            continue;
        };

        match outline_from_value(value) {
            Ok(outline) => {
                if let Some(id) = duplicate_id(&outline) {
                    return Err(ExtractionError::DuplicateId(id));
                }
                return Ok(outline);
            }
            Err(e) => {
                schema_error.get_or_insert_with(|| e.to_string());
            }
        }
    }

    Err(match schema_error {
        Some(e) => ExtractionError::InvalidSlides(e),
        None => ExtractionError::NoJson,
    })
}

fn outline_from_value(value: Value) -> Result<Outline, serde_json::Error> {
    match value {
        Value::Array(_) => serde_json::from_value(value),
        Value::Object(ref map) if map.contains_key("slides") => {
            serde_json::from_value::<Wrapped>(value).map(|w| w.slides)
        }
        other => serde_json::from_value::<Slide>(other).map(|s| vec![s]),
    }
}

/// Byte length of the bracketed span opening at `text[0]`, closing bracket
/// included. Brackets inside string literals are ignored.
fn balanced_end(text: &str) -> Option<usize> {
    let mut stack: Vec<u8> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (i, b) in text.bytes().enumerate() {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match b {
            b'"' => in_string = true,
            b'[' => stack.push(b']'),
            b'{' => stack.push(b'}'),
            b']' | b'}' => {
                if stack.pop() != Some(b) {
                    return None;
                }
                if stack.is_empty() {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }

    None
}
