//! Lightweight markdown handling for message bodies.
//!
//! Only a handful of constructs are recognised. Each pass splits the plain
//! text left over by the previous passes, so code is never re-parsed as
//! emphasis.

use regex::Regex;
use std::sync::OnceLock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Text(String),
    Strong(String),
    Emphasis(String),
    Code(String),
    CodeBlock(String),
    LineBreak,
}

type Pass = (Regex, fn(&str) -> Segment);

fn code_block(s: &str) -> Segment {
    Segment::CodeBlock(s.trim_matches('\n').to_string())
}

fn code(s: &str) -> Segment {
    Segment::Code(s.to_string())
}

fn strong(s: &str) -> Segment {
    Segment::Strong(s.to_string())
}

fn emphasis(s: &str) -> Segment {
    Segment::Emphasis(s.to_string())
}

const PATTERNS: [(&str, fn(&str) -> Segment); 4] = [
    (r"```(?s)(.*?)```", code_block),
    (r"`([^`\n]+?)`", code),
    (r"\*\*(.+?)\*\*", strong),
    (r"\*([^*\n]+?)\*", emphasis),
];

fn compile_passes() -> Result<Vec<Pass>, regex::Error> {
    PATTERNS
        .iter()
        .map(|&(pattern, build)| Ok((Regex::new(pattern)?, build)))
        .collect()
}

fn passes() -> &'static [Pass] {
    static PASSES: OnceLock<Vec<Pass>> = OnceLock::new();
    PASSES.get_or_init(|| match compile_passes() {
        Ok(passes) => passes,
        Err(e) => panic!("invalid markdown pattern: {e}"),
    })
}

/// Split a message body into styled segments.
pub fn format_message(content: &str) -> Vec<Segment> {
    let mut segments = vec![Segment::Text(content.to_string())];

    for (re, build) in passes() {
        segments = segments
            .into_iter()
            .flat_map(|segment| match segment {
                Segment::Text(text) => split_matches(&text, re, *build),
                other => vec![other],
            })
            .collect();
    }

    segments
        .into_iter()
        .flat_map(|segment| match segment {
            Segment::Text(text) => split_lines(&text),
            other => vec![other],
        })
        .collect()
}

fn split_matches(text: &str, re: &Regex, build: fn(&str) -> Segment) -> Vec<Segment> {
    let mut out = Vec::new();
    let mut last = 0;

    for caps in re.captures_iter(text) {
        let (Some(whole), Some(inner)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if whole.start() > last {
            out.push(Segment::Text(text[last..whole.start()].to_string()));
        }
        out.push(build(inner.as_str()));
        last = whole.end();
    }

    if last < text.len() {
        out.push(Segment::Text(text[last..].to_string()));
    }
    out
}

fn split_lines(text: &str) -> Vec<Segment> {
    let mut out = Vec::new();
    for (i, line) in text.split('\n').enumerate() {
        if i > 0 {
            out.push(Segment::LineBreak);
        }
        if !line.is_empty() {
            out.push(Segment::Text(line.to_string()));
        }
    }
    out
}

/// Render segments as HTML markup, escaping text content.
pub fn to_markup(segments: &[Segment]) -> String {
    let mut out = String::new();
    for segment in segments {
        match segment {
            Segment::Text(t) => out.push_str(&escape(t)),
            Segment::Strong(t) => out.push_str(&format!("<strong>{}</strong>", escape(t))),
            Segment::Emphasis(t) => out.push_str(&format!("<em>{}</em>", escape(t))),
            Segment::Code(t) => out.push_str(&format!("<code>{}</code>", escape(t))),
            Segment::CodeBlock(t) => out.push_str(&format!("<pre><code>{}</code></pre>", escape(t))),
            Segment::LineBreak => out.push_str("<br>"),
        }
    }
    out
}

/// Shorthand for `to_markup(&format_message(content))`.
pub fn markup(content: &str) -> String {
    to_markup(&format_message(content))
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}
