const FENCE: &str = "```";

/// Remove a leading and/or trailing Markdown code fence from generative output.
///
/// The opening fence's info string (`json`, `text`, ...) is dropped with it.
/// Text that is not fenced comes back trimmed and otherwise unchanged; prose
/// around a fence is left alone, so a caller parsing the result still sees it.
pub fn strip_code_fences(raw: &str) -> &str {
    let mut text = raw.trim();

    if let Some(rest) = text.strip_prefix(FENCE) {
        let body = rest.strip_prefix("json").unwrap_or(rest);
        text = match body.find('\n') {
            Some(eol) if !looks_like_payload(&body[..eol]) => &body[eol + 1..],
            _ => body,
        };
    }

    let trimmed = text.trim_end();
    if let Some(rest) = trimmed.strip_suffix(FENCE) {
        text = rest;
    }

    text.trim()
}

/// An opening line that already carries JSON is content, not an info string.
fn looks_like_payload(line: &str) -> bool {
    let line = line.trim_start();
    line.starts_with('[') || line.starts_with('{')
}
