//! Extraction of a single JSON object from model output.
//!
//! Models wrap their JSON in markdown fences, open with a friendly sentence or
//! append a second example object. The sanitizer strips all of that and hands
//! back the first complete object exactly as the model wrote it.

use dramaturg_error::{SanitizeError, SanitizeErrorKind};
use serde::de::IgnoredAny;
use tracing::{debug, instrument};

const FENCE: &str = "```";
const PREVIEW_CHARS: usize = 80;

/// Extract the first complete JSON object from a model response.
///
/// A leading markdown fence is honoured when it opens before the first `{`
/// and is closed. Otherwise the response is scanned once, tracking brace
/// depth and string literals, and the first object that closes at depth zero
/// and parses is returned. A balanced span that is not JSON (prose such as
/// `use {braces}`) is skipped whole and the scan resumes after it. When an
/// opening brace never closes, the complete objects nested under it are
/// tried instead.
///
/// # Errors
///
/// Returns [`SanitizeErrorKind::NoJsonObject`] when the text holds no `{`,
/// and [`SanitizeErrorKind::Unterminated`] when no object ever closes.
///
/// # Examples
///
/// ```
/// use dramaturg_pipeline::sanitize;
///
/// let raw = "Sure! Here's the JSON: {\"a\": 1} Hope that helps!";
/// assert_eq!(sanitize(raw).unwrap(), "{\"a\": 1}");
///
/// let fenced = "```json\n{\"tccs\": []}\n```";
/// assert_eq!(sanitize(fenced).unwrap(), "{\"tccs\": []}");
/// ```
#[instrument(skip_all, fields(response_len = response.len()))]
pub fn sanitize(response: &str) -> Result<String, SanitizeError> {
    if let Some(Ok(json)) = fenced_body(response).map(extract_object) {
        debug!("Extracted JSON from markdown fence");
        return Ok(json.to_string());
    }
    extract_object(response).map(str::to_string)
}

/// Content of a closed code fence that opens before the first `{`.
fn fenced_body(response: &str) -> Option<&str> {
    let fence = response.find(FENCE)?;
    if response.find('{').is_some_and(|brace| brace < fence) {
        return None;
    }
    let after = fence + FENCE.len();
    // Skip the language tag line
    let content_start = response[after..]
        .find('\n')
        .map(|n| after + n + 1)
        .unwrap_or(after);
    let end = response[content_start..].find(FENCE)?;
    Some(&response[content_start..content_start + end])
}

fn extract_object(text: &str) -> Result<&str, SanitizeError> {
    let Some(first) = text.find('{') else {
        return Err(SanitizeError::new(SanitizeErrorKind::NoJsonObject(
            text.len(),
        )));
    };

    // Quotes in prose are usually unbalanced, so they are ignored first. The
    // second pass handles prose that quotes a brace, as in `the "{" token`.
    let plain = scan(text, false);
    let span = match plain.valid {
        Some(span) => Some(span),
        None => {
            let quoted = scan(text, true);
            // Nothing parsed; fall back to the first balanced object so the
            // caller reports a parse error with the offending text.
            quoted.valid.or(plain.fallback).or(quoted.fallback)
        }
    };

    match span {
        Some((start, end)) => {
            log_discarded(text, start, end);
            Ok(&text[start..=end])
        }
        None => Err(SanitizeError::new(SanitizeErrorKind::Unterminated(first))),
    }
}

/// An object opened but not yet closed.
struct Frame {
    start: usize,
    /// Complete objects directly inside this one
    children: Vec<(usize, usize)>,
}

#[derive(Default)]
struct Scan {
    /// First span that parses as JSON
    valid: Option<(usize, usize)>,
    /// First balanced span, parseable or not
    fallback: Option<(usize, usize)>,
}

impl Scan {
    /// Checks one candidate; returns true once a valid span is found.
    fn offer(&mut self, text: &str, span: (usize, usize)) -> bool {
        if serde_json::from_str::<IgnoredAny>(&text[span.0..=span.1]).is_ok() {
            self.valid = Some(span);
            return true;
        }
        self.fallback.get_or_insert(span);
        false
    }
}

/// One left-to-right pass over `text`.
///
/// Every byte is visited once and every candidate handed to the parser is
/// disjoint from the others, so the pass is linear in the input. With
/// `prose_strings`, double quotes outside any object also open a string,
/// which ends at the closing quote or the end of the line.
fn scan(text: &str, prose_strings: bool) -> Scan {
    let mut result = Scan::default();
    let mut frames: Vec<Frame> = Vec::new();
    let mut in_string = false;
    let mut escaped = false;

    for (i, &byte) in text.as_bytes().iter().enumerate() {
        if in_string {
            match byte {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                b'\n' if frames.is_empty() => in_string = false,
                _ => {}
            }
            continue;
        }
        match byte {
            b'"' if prose_strings || !frames.is_empty() => in_string = true,
            b'{' => frames.push(Frame {
                start: i,
                children: Vec::new(),
            }),
            b'}' => {
                // A stray closing brace in prose
                let Some(frame) = frames.pop() else {
                    continue;
                };
                let span = (frame.start, i);
                match frames.last_mut() {
                    Some(parent) => parent.children.push(span),
                    None => {
                        if result.offer(text, span) {
                            return result;
                        }
                    }
                }
            }
            _ => {}
        }
    }

    // Objects left open at the end: try what closed inside them, in order.
    let mut nested: Vec<(usize, usize)> = frames
        .into_iter()
        .flat_map(|frame| frame.children)
        .collect();
    nested.sort_unstable();
    for span in nested {
        if result.offer(text, span) {
            break;
        }
    }
    result
}

fn log_discarded(text: &str, start: usize, end: usize) {
    let leading = text[..start].trim();
    if !leading.is_empty() {
        debug!(
            chars = leading.chars().count(),
            preview = %preview(leading),
            "Discarded leading text before JSON object"
        );
    }
    let trailing = text[end + 1..].trim();
    if !trailing.is_empty() {
        debug!(
            chars = trailing.chars().count(),
            preview = %preview(trailing),
            "Discarded trailing text after JSON object"
        );
    }
}

fn preview(text: &str) -> String {
    text.chars().take(PREVIEW_CHARS).collect()
}
