//! Rule ordering, CSS printing and the output post-processor.

use std::collections::HashSet;

use lazy_static::lazy_static;
use regex::Regex;

use crate::colors;
use crate::engine::Compiler;
use crate::preprocess;
use crate::rule::Opt;

lazy_static! {
    static ref ZERO_UNITS_RE: Regex =
        Regex::new(r"(?i)\b0(?:em|ex|px|cm|mm|in|pt|pc)\b").expect("static regex");
    static ref ZERO_DOT_RE: Regex = Regex::new(r"\b0\.([0-9])").expect("static regex");
    static ref HEX6_RE: Regex = Regex::new(r"#[0-9a-fA-F]{6}\b").expect("static regex");
}

impl Compiler {
    /// Rewrites every position to `min(DEPS ∪ {pos+1})` so extended rules
    /// float to just above their earliest dependency, then sorts stably.
    pub(crate) fn manage_order(&mut self) {
        for rule in &mut self.rules {
            if let Some(pos) = rule.position {
                rule.deps.insert(pos + 1);
                rule.position = rule.deps.iter().next().copied();
            }
        }
        self.rules.sort_by_key(|r| r.position);
    }

    /// Groups printable rules by file, keeping the file order of first
    /// appearance.
    pub(crate) fn group_by_file(&mut self) {
        self.css_files.clear();
        self.file_rules.clear();
        let mut seen: HashSet<String> = HashSet::new();
        for (i, rule) in self.rules.iter().enumerate() {
            if rule.position.is_none() || rule.properties.is_empty() {
                continue;
            }
            self.file_rules
                .entry(rule.fileid.clone())
                .or_default()
                .push(i);
            if seen.insert(rule.fileid.clone()) {
                self.css_files.push(rule.fileid.clone());
            }
        }
    }

    fn option_flag(&self, key: &str) -> bool {
        self.options.get(key).map_or(false, Opt::as_flag)
    }

    /// Prints one file's rules.
    pub(crate) fn create_css(&mut self, fileid: &str) -> String {
        let indices = self.file_rules.get(fileid).cloned().unwrap_or_default();
        let compress = self.option_flag("compress");
        let debug_info = !compress && self.option_flag("debug_info");
        let (sp, tb, nl) = if compress {
            ("", "", "")
        } else {
            (" ", "  ", "\n")
        };
        self.render_rules(&indices, compress, sp, tb, nl, debug_info)
    }

    #[allow(clippy::too_many_lines)]
    fn render_rules(
        &self,
        indices: &[usize],
        compress: bool,
        sp: &str,
        tb: &str,
        nl: &str,
        debug_info: bool,
    ) -> String {
        let mut result = String::new();
        let mut open_selectors = false;
        let mut skip_selectors = false;
        let mut old_selectors: Option<String> = None;
        let mut open_media = false;
        let mut old_media: Option<Vec<String>> = None;
        let mut old_property: Option<String> = None;
        let mut scope: HashSet<String> = HashSet::new();

        let close_block = |result: &mut String, compress: bool, tb: &str, nl: &str| {
            if compress && result.ends_with(';') {
                result.pop();
            }
            result.push_str(tb);
            result.push('}');
            result.push_str(nl);
        };

        for &i in indices {
            let rule = &self.rules[i];
            let selectors = &rule.selectors;
            let media = rule.media.clone().filter(|m| !m.is_empty());

            if old_media != media {
                if open_selectors {
                    if !skip_selectors {
                        let inner_tb = if open_media { tb } else { "" };
                        close_block(&mut result, compress, inner_tb, nl);
                    }
                    open_selectors = false;
                    skip_selectors = false;
                }
                if open_media {
                    close_block(&mut result, compress, "", nl);
                    open_media = false;
                }
                if let Some(media) = &media {
                    let mut parts: Vec<&str> = Vec::new();
                    for m in media {
                        if !parts.contains(&m.as_str()) {
                            parts.push(m);
                        }
                    }
                    result.push_str(&format!("@media {}{sp}{{{nl}", parts.join(" and ")));
                    open_media = true;
                }
                old_media = media.clone();
                old_selectors = None;
            }

            let base_tb = if media.is_some() { tb } else { "" };
            if old_selectors.as_deref() != Some(selectors.as_str()) {
                if open_selectors {
                    if !skip_selectors {
                        close_block(&mut result, compress, base_tb, nl);
                    }
                    open_selectors = false;
                    skip_selectors = false;
                }
                if !selectors.is_empty() {
                    if debug_info {
                        let position = self.index.resolve(rule.lineno);
                        let (filename, lineno) =
                            position.rsplit_once(':').unwrap_or((position, "0"));
                        result.push_str(&format!(
                            "@media -sass-debug-info{{filename{{font-family:file\\:\\/\\/{}}}line{{font-family:\\00003{lineno}}}}}{nl}",
                            escape_debug(filename)
                        ));
                    }
                    let printable: Vec<&str> = selectors
                        .split(',')
                        .filter(|s| !s.contains('%'))
                        .collect();
                    if printable.is_empty() {
                        skip_selectors = true;
                    } else {
                        result.push_str(&format!(
                            "{base_tb}{}{sp}{{{nl}",
                            printable.join(&format!(",{sp}"))
                        ));
                    }
                    open_selectors = true;
                }
                old_selectors = Some(selectors.clone());
                scope = HashSet::new();
                old_property = None;
            }

            let mut inner_tb = base_tb.to_string();
            if !selectors.is_empty() {
                inner_tb.push_str(tb);
            }

            if rule
                .options
                .get("verbosity")
                .map_or(0, Opt::as_number)
                > 1
            {
                result.push_str(&format!("{inner_tb}/* file: {} */{nl}", rule.fileid));
                if !rule.context.is_empty() {
                    result.push_str(&format!("{inner_tb}/* vars:{nl}"));
                    let mut names: Vec<&String> = rule.context.keys().collect();
                    names.sort();
                    for name in names {
                        result.push_str(&format!(
                            "{inner_tb}{inner_tb}{name} = {};{nl}",
                            rule.context[name].to_css()
                        ));
                    }
                    result.push_str(&format!("{inner_tb}*/{nl}"));
                }
            }

            if !skip_selectors {
                result.push_str(&self.print_properties(
                    rule,
                    &mut scope,
                    &mut old_property,
                    sp,
                    &inner_tb,
                    nl,
                ));
            }
        }

        if open_selectors && !skip_selectors {
            let inner_tb = if open_media { tb } else { "" };
            close_block(&mut result, compress, inner_tb, nl);
        }
        if open_media {
            close_block(&mut result, compress, "", nl);
        }
        result
    }

    fn print_properties(
        &self,
        rule: &crate::rule::Rule,
        scope: &mut HashSet<String>,
        old_property: &mut Option<String>,
        sp: &str,
        tb: &str,
        nl: &str,
    ) -> String {
        let mut result = String::new();
        for prop in &rule.properties {
            let mut line = match &prop.value {
                Some(value) => format!("{}:{sp}{value}", prop.name),
                None => prop.name.clone(),
            };
            if line.contains("!default") {
                line = line
                    .replace("!default", "")
                    .replace("  ", " ")
                    .trim()
                    .to_string();
                if scope.contains(&prop.name) {
                    continue;
                }
            }
            if old_property.as_deref() != Some(line.as_str()) {
                *old_property = Some(line.clone());
                scope.insert(prop.name.clone());
                result.push_str(&format!("{tb}{line};{nl}"));
            }
        }
        result
    }

    /// Final text passes: placeholder reversal, color shortening, zero
    /// collapsing.
    pub(crate) fn post_process(&self, cont: &str) -> String {
        let compress = self.option_flag("compress");
        let prefix = if compress { "compress_" } else { "" };
        let mut cont = preprocess::reverse_placeholders(cont);

        if self.option_flag(&format!("{prefix}short_colors")) {
            cont = shorten_hex_colors(&cont);
        }
        if self.option_flag(&format!("{prefix}reverse_colors")) {
            cont = reverse_hex_colors(&cont);
        }
        if compress {
            // only length-class zero units collapse; 0% and 0s keep theirs
            cont = ZERO_UNITS_RE.replace_all(&cont, "0").to_string();
            cont = ZERO_DOT_RE.replace_all(&cont, ".$1").to_string();
        }
        cont
    }
}

fn escape_debug(filename: &str) -> String {
    let mut out = String::new();
    for c in filename.chars() {
        if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
            out.push(c);
        } else {
            out.push('\\');
            out.push(c);
        }
    }
    out
}

/// `#rrggbb` → `#rgb` when each channel has equal nibbles.
fn shorten_hex_colors(cont: &str) -> String {
    let bytes = cont.as_bytes();
    let mut out = String::with_capacity(cont.len());
    let mut last = 0;
    for m in HEX6_RE.find_iter(cont) {
        let boundary_ok = m.start() == 0 || {
            let c = bytes[m.start() - 1] as char;
            !(c.is_ascii_alphanumeric() || matches!(c, '_' | '#'))
        };
        let hex = &m.as_str()[1..];
        let h = hex.as_bytes();
        if boundary_ok && h[0] == h[1] && h[2] == h[3] && h[4] == h[5] {
            out.push_str(&cont[last..m.start()]);
            out.push('#');
            out.push(h[0] as char);
            out.push(h[2] as char);
            out.push(h[4] as char);
            last = m.end();
        }
    }
    out.push_str(&cont[last..]);
    out
}

/// Replaces a hex literal by its color name when the name is no longer.
fn reverse_hex_colors(cont: &str) -> String {
    let bytes = cont.as_bytes();
    let mut out = String::with_capacity(cont.len());
    let mut last = 0;
    for m in HEX6_RE.find_iter(cont) {
        let boundary_ok = m.start() == 0 || {
            let c = bytes[m.start() - 1] as char;
            !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '#' | '$'))
        };
        if !boundary_ok {
            continue;
        }
        if let Some(name) = colors::name_for_hex(&m.as_str().to_ascii_lowercase()) {
            if name.len() <= m.as_str().len() {
                out.push_str(&cont[last..m.start()]);
                out.push_str(name);
                last = m.end();
            }
        }
    }
    out.push_str(&cont[last..]);
    out
}

#[cfg(test)]
mod tests {
    use super::{reverse_hex_colors, shorten_hex_colors};

    #[test]
    fn shorten_safe_hexes_only() {
        assert_eq!(shorten_hex_colors("color:#ff0000;"), "color:#f00;");
        assert_eq!(shorten_hex_colors("color:#ff0001;"), "color:#ff0001;");
        assert_eq!(shorten_hex_colors("url(a#ff0000)"), "url(a#ff0000)");
    }

    #[test]
    fn reverse_to_shorter_names() {
        assert_eq!(reverse_hex_colors("color:#ff0000;"), "color:red;");
        // aliceblue is longer than the hex form, keep the hex
        assert_eq!(reverse_hex_colors("color:#f0f8ff;"), "color:#f0f8ff;");
    }
}
