//! Lexical preprocessing of raw SCSS text.
//!
//! Every line gets an embedded `N<0x00>` marker resolving to `file:lineno`
//! through the session's [`SourceIndex`]. Comments are stripped, string
//! contents are shielded with placeholder variables so later passes cannot
//! misread them, rule braces are normalized, and bare color names are
//! rewritten to hex so color arithmetic works.

use lazy_static::lazy_static;
use regex::Regex;
use scssc_shared::source_index::{SourceIndex, SEPARATOR};

use crate::colors;

/// Unsafe character sequences and the placeholder variables that stand in
/// for them inside string literals. Longest sequences first so `://` never
/// shields as a bare `:` plus a half comment.
pub const SAFE_STRINGS: &[(&str, &str)] = &[
    ("/*", "$__bigcopen"),
    ("*/", "$__bigcclose"),
    ("//", "$__doubleslash"),
    (":", "$__doubledot"),
    (";", "$__semicolon"),
    ("{", "$__curlybracketopen"),
    ("}", "$__curlybracketclosed"),
];

lazy_static! {
    static ref NL_RE: Regex = Regex::new(r"[ \t\r]*\n[ \t\r\n]*").expect("static regex");
    static ref EMPTY_LINE_RE: Regex = Regex::new(r"\n[0-9]+\u{0}[ \t\r]*\n").expect("static regex");
    static ref STRING_RE: Regex = Regex::new(r#"'[^'\n]*'|"[^"\n]*""#).expect("static regex");
    static ref ML_COMMENT_RE: Regex = Regex::new(r"(?s)/\*.*?\*/").expect("static regex");
    static ref EXPAND_RULES_RE: Regex = Regex::new(r"\s*\{").expect("static regex");
    static ref COLLAPSE_PROPS_RE: Regex = Regex::new(r"([:#])\s*\{").expect("static regex");
    static ref WORD_RE: Regex = Regex::new(r"[A-Za-z][A-Za-z]*").expect("static regex");
}

/// Preprocesses one source file into instrumented, comment-free text.
#[must_use]
pub fn load_string(codestr: &str, filename: &str, index: &mut SourceIndex) -> String {
    let mut codestr = format!("{codestr}\n");

    // instrument every line with its index marker
    let mut lineno = 1;
    let first = index.push(filename, lineno);
    let instrumented = {
        let body = NL_RE.replace_all(&codestr, |_: &regex::Captures| {
            lineno += 1;
            let marker = index.push(filename, lineno);
            format!("\n{marker}{SEPARATOR}")
        });
        format!("{first}{SEPARATOR}{body}")
    };
    codestr = instrumented;

    // drop lines that became empty
    codestr = EMPTY_LINE_RE.replace_all(&codestr, "\n").to_string();

    // shield string contents so comment stripping and block location
    // cannot misread them; the emitter reverses the placeholders
    codestr = STRING_RE
        .replace_all(&codestr, |caps: &regex::Captures| {
            let mut inner = caps[0].to_string();
            for (raw, placeholder) in SAFE_STRINGS {
                inner = inner.replace(raw, placeholder);
            }
            inner
        })
        .to_string();

    codestr = ML_COMMENT_RE.replace_all(&codestr, "").to_string();
    codestr = strip_line_comments(&codestr);

    // normalize whitespace before an opening brace, then re-collapse the
    // interpolation and nested-property forms
    codestr = EXPAND_RULES_RE.replace_all(&codestr, " {").to_string();
    codestr = COLLAPSE_PROPS_RE.replace_all(&codestr, "${1}{").to_string();

    hexize_color_names(&codestr)
}

/// Reverses the string-shielding placeholders; applied to emitted output
/// and logged messages.
#[must_use]
pub fn reverse_placeholders(text: &str) -> String {
    if !text.contains("$__") {
        return text.to_string();
    }
    let mut out = text.to_string();
    for (raw, placeholder) in SAFE_STRINGS {
        out = out.replace(placeholder, raw);
    }
    out
}

/// Removes `//` comments, leaving `://` (protocol URLs) alone.
fn strip_line_comments(codestr: &str) -> String {
    let bytes = codestr.as_bytes();
    let mut out: Vec<u8> = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'/' && i + 1 < bytes.len() && bytes[i + 1] == b'/' && !is_protocol(bytes, i)
        {
            while i < bytes.len() && bytes[i] != b'\n' {
                i += 1;
            }
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// True when the `//` at `pos` follows a `xx:` protocol prefix.
fn is_protocol(bytes: &[u8], pos: usize) -> bool {
    pos >= 3
        && bytes[pos - 1] == b':'
        && bytes[pos - 2].is_ascii_alphanumeric()
        && bytes[pos - 3].is_ascii_alphanumeric()
}

/// Rewrites bare color names to their hex values, honoring the same token
/// boundaries as the original: not part of a longer word, not preceded by
/// `-`, `.`, `#` or `$`.
fn hexize_color_names(codestr: &str) -> String {
    let bytes = codestr.as_bytes();
    let mut out = String::with_capacity(codestr.len());
    let mut last = 0;
    for m in WORD_RE.find_iter(codestr) {
        let before_ok = m.start() == 0 || {
            let c = bytes[m.start() - 1] as char;
            !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '#' | '$'))
        };
        let after_ok = m.end() >= bytes.len() || {
            let c = bytes[m.end()] as char;
            !(c.is_ascii_alphanumeric() || c == '-' || c == '_')
        };
        if before_ok && after_ok {
            if let Some(hex) = colors::hex_for_name(m.as_str()) {
                out.push_str(&codestr[last..m.start()]);
                out.push_str(hex);
                last = m.end();
            }
        }
    }
    out.push_str(&codestr[last..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(src: &str) -> (String, SourceIndex) {
        let mut index = SourceIndex::new();
        let out = load_string(src, "test.scss", &mut index);
        (out, index)
    }

    #[test]
    fn instruments_lines() {
        let (out, index) = load("a {\n  color: #f00;\n}");
        assert!(out.starts_with(&format!("1{SEPARATOR}")));
        assert!(out.contains(&format!("2{SEPARATOR}")));
        assert_eq!(index.resolve(1), "test.scss:1");
        assert_eq!(index.resolve(2), "test.scss:2");
    }

    #[test]
    fn strips_comments() {
        let (out, _) = load("a { /* gone\n  across lines */ color: #f00; // tail\n}");
        assert!(!out.contains("gone"));
        assert!(!out.contains("tail"));
        assert!(out.contains("color"));
    }

    #[test]
    fn keeps_protocol_urls() {
        let (out, _) = load("a { background: url(http://host/x.png); }");
        assert!(out.contains("http://host/x.png"));
    }

    #[test]
    fn shields_strings() {
        let (out, _) = load("a { content: \"a: b; // keep\"; }");
        assert!(out.contains("$__doubledot"));
        assert!(out.contains("$__doubleslash"));
        assert!(out.contains("keep"));
        assert_eq!(
            reverse_placeholders("\"a$__doubledot b$__semicolon $__doubleslash keep\""),
            "\"a: b; // keep\""
        );
    }

    #[test]
    fn hexizes_color_names() {
        let (out, _) = load("a { color: red; }");
        assert!(out.contains("#ff0000"));
        // not inside words or after the chars the boundary protects
        let (out, _) = load("a.red { color-red: bordered; }");
        assert!(!out.contains("#ff0000"));
    }

    #[test]
    fn collapses_brace_space() {
        let (out, _) = load("a\n{ color: #f00; }");
        assert!(out.contains(" {"));
        let (out, _) = load("a { font: { family: serif; } }");
        assert!(out.contains("font:{"));
    }
}
