//! Removal of the wrapper tokens models put around their payloads.
//!
//! Sentinels are removed from the edges of the text only, in this order:
//!
//! 1. leading blank lines and trailing whitespace
//! 2. a markdown code fence (opening ```` ```lang ```` line, closing ```` ``` ```` line)
//! 3. the `@Output{` or `@Output` opening tag
//! 4. one trailing `}`
//! 5. one leading `[` and one trailing `]`
//!
//! The pass is repeated until nothing changes, so `strip(strip(x)) == strip(x)`.
//! No other validation happens here.
//!
//! Normalized source code only loses steps 1 and 2 ([`strip_fence`]): a
//! trailing `}` or `]` there is program text.

const OUTPUT_TAG_WITH_BRACE: &str = "@Output{";
const OUTPUT_TAG: &str = "@Output";
const CODE_FENCE: &str = "```";

/// Strips the known envelope from a raw model response.
///
/// ```
/// use cfgflow::envelope::strip;
///
/// assert_eq!(strip("@Output{\n[dot.node('a')]\n}\n"), "dot.node('a')");
/// ```
#[must_use]
pub fn strip(raw: &str) -> String {
    let mut current = raw;
    loop {
        let next = strip_once(current);
        // every step only narrows the slice
        if next.len() == current.len() {
            return next.to_string();
        }
        current = next;
    }
}

/// Strips blank edges and a code fence, leaving brackets and braces alone.
///
/// ```
/// use cfgflow::envelope::strip_fence;
///
/// assert_eq!(strip_fence("```python\nd = {'k': [1]}\n```"), "d = {'k': [1]}");
/// ```
#[must_use]
pub fn strip_fence(raw: &str) -> String {
    let mut current = raw;
    loop {
        let next = strip_code_fence(trim_blank_lines(current));
        if next.len() == current.len() {
            return next.to_string();
        }
        current = next;
    }
}

fn strip_once(text: &str) -> &str {
    let text = trim_blank_lines(text);
    let text = strip_code_fence(text);

    let tagged = text.trim_start();
    let text = tagged
        .strip_prefix(OUTPUT_TAG_WITH_BRACE)
        .or_else(|| tagged.strip_prefix(OUTPUT_TAG))
        .unwrap_or(text);

    let text = text.strip_suffix('}').unwrap_or(text);
    let text = text.strip_prefix('[').unwrap_or(text);
    text.strip_suffix(']').unwrap_or(text)
}

/// Drops whitespace-only leading lines and all trailing whitespace, keeping
/// the indentation of the first non-blank line.
fn trim_blank_lines(text: &str) -> &str {
    let text = text.trim_end();
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        if !line.trim().is_empty() {
            break;
        }
        offset += line.len();
    }
    &text[offset..]
}

fn strip_code_fence(text: &str) -> &str {
    let text = if text.trim_start().starts_with(CODE_FENCE) {
        match text.find('\n') {
            Some(idx) => &text[idx + 1..],
            None => "",
        }
    } else {
        text
    };

    match text.rfind('\n') {
        Some(idx) if text[idx + 1..].trim() == CODE_FENCE => &text[..idx],
        None if text.trim() == CODE_FENCE => "",
        _ => text,
    }
}
