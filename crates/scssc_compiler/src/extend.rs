//! `@extend` resolution: rewrites the parent/child selector graph.
//!
//! Every ` extends ` clause is broken into mono-parent entries, then up to
//! ten passes substitute the parent token inside every selector that
//! carries it, merge inherited context/options onto the extending rules,
//! and record ordering edges so extended rules stay behind what they
//! extend.

use std::collections::{BTreeSet, HashMap};

use log::warn;

use crate::engine::Compiler;
use crate::rule::Opt;
use crate::value::Value;

const MAX_PASSES: usize = 10;

impl Compiler {
    pub(crate) fn parse_extends(&mut self) {
        // one entry per parent; the first keeps the rules, the rest start
        // empty and fill up during linking
        let keys: Vec<String> = self.parts.keys().cloned().collect();
        for key in keys {
            let Some((selectors, parents)) = key.split_once(" extends ") else {
                continue;
            };
            let parents: Vec<String> = parents.split('&').map(String::from).collect();
            if parents.len() <= 1 {
                continue;
            }
            let mut rules = self.parts.remove(&key).unwrap_or_default();
            for parent in parents {
                let new_key = format!("{selectors} extends {parent}");
                self.parts.entry(new_key).or_default().append(&mut rules);
            }
        }

        let mut passes = 0;
        let mut parents_left = true;
        while parents_left && passes < MAX_PASSES {
            passes += 1;
            parents_left = false;
            let keys: Vec<String> = self.parts.keys().cloned().collect();
            for key in keys {
                let Some((selectors, parent)) = key
                    .split_once(" extends ")
                    .map(|(s, p)| (s.to_string(), p.to_string()))
                else {
                    continue;
                };
                parents_left = true;
                // entries can be renamed while linking earlier keys
                let Some(rules) = self.parts.remove(&key) else {
                    continue;
                };
                self.parts
                    .entry(selectors.clone())
                    .or_default()
                    .extend(rules.iter().copied());

                match self.link_with_parents(&parent, &selectors, &rules) {
                    None => {
                        warn!("Parent rule not found: {parent}");
                        // the extend is a no-op; drop the clause from the
                        // printed selectors
                        for &ri in &rules {
                            self.rules[ri].selectors.clone_from(&selectors);
                        }
                    }
                    Some(parent_rules) => {
                        // the extending rules inherit the parents' context
                        // and options underneath their own
                        let mut inherited_context: HashMap<String, Value> = HashMap::new();
                        let mut inherited_options: HashMap<String, Opt> = HashMap::new();
                        for &pi in &parent_rules {
                            inherited_context.extend(self.rules[pi].context.clone());
                            inherited_options.extend(self.rules[pi].options.clone());
                        }
                        for &ri in &rules {
                            let mut context = inherited_context.clone();
                            context.extend(self.rules[ri].context.drain());
                            self.rules[ri].context = context;
                            let mut options = inherited_options.clone();
                            options.extend(self.rules[ri].options.drain());
                            self.rules[ri].options = options;
                        }
                    }
                }
            }
        }
    }

    /// Finds every selector carrying `parent` as a token, derives the
    /// extended selector for each child selector, renames the affected
    /// entries and records the dependency edges. Returns the rules the
    /// parent was found on, or `None` when nothing matched.
    fn link_with_parents(
        &mut self,
        parent: &str,
        c_selectors: &str,
        c_rules: &[usize],
    ) -> Option<Vec<usize>> {
        let mut parent_found: Option<Vec<usize>> = None;
        let keys: Vec<String> = self.parts.keys().cloned().collect();

        for p_key in keys {
            let p_sel_part = p_key
                .split_once(" extends ")
                .map_or(p_key.as_str(), |(s, _)| s);

            let mut new_selectors: Vec<String> = Vec::new();
            let mut found = false;
            for p_selector in p_sel_part.split(',') {
                if !p_selector.contains(parent) {
                    continue;
                }
                for c_selector in c_selectors.split(',') {
                    // strip what the two selectors share, then substitute
                    // the remaining parent token
                    let lcp = longest_common_prefix(c_selector, parent);
                    let c_trim = &c_selector[lcp..];
                    let parent_trim = &parent[lcp..];
                    let lcs = longest_common_suffix(c_trim, parent_trim);
                    let c_trim = &c_trim[..c_trim.len() - lcs];
                    let parent_trim = &parent_trim[..parent_trim.len() - lcs];
                    if c_trim.is_empty() || parent_trim.is_empty() {
                        continue;
                    }
                    let new_parent = substitute_token(p_selector, parent_trim, c_trim);
                    if new_parent != p_selector {
                        new_selectors.push(new_parent);
                        found = true;
                    }
                }
            }

            let p_rules: Vec<usize> = self.parts.get(&p_key).cloned().unwrap_or_default();
            if found {
                parent_found
                    .get_or_insert_with(Vec::new)
                    .extend(p_rules.iter().copied());
            }

            if !new_selectors.is_empty() {
                let merged = self.normalize_selectors(&p_key, &new_selectors, &[]);
                if merged != p_key {
                    let moved = self.parts.remove(&p_key).unwrap_or_default();
                    self.parts.entry(merged.clone()).or_default().extend(moved);
                }

                let mut deps: BTreeSet<usize> = BTreeSet::new();
                for &ci in c_rules {
                    self.rules[ci].selectors = c_selectors.to_string();
                    if let Some(pos) = self.rules[ci].position {
                        deps.insert(pos);
                    }
                }
                for &pi in &p_rules {
                    self.rules[pi].selectors = merged.clone();
                    self.rules[pi].deps.extend(deps.iter().copied());
                }
            }
        }

        parent_found
    }
}

/// Length of the shared prefix, cut back to the last separator-ish
/// boundary (space, or just before `#`/`:`/`.`).
fn longest_common_prefix(a: &str, b: &str) -> usize {
    let a = a.as_bytes();
    let b = b.as_bytes();
    let mut common = 0;
    let mut i = 0;
    while i < a.len().min(b.len()) {
        if a[i] != b[i] {
            break;
        }
        if a[i] == b' ' {
            common = i + 1;
        } else if matches!(a[i], b'#' | b':' | b'.') {
            common = i;
        }
        i += 1;
    }
    common
}

fn longest_common_suffix(a: &str, b: &str) -> usize {
    let a = a.as_bytes();
    let b = b.as_bytes();
    let mut common = 0;
    let mut i = 0;
    while i < a.len().min(b.len()) {
        let (ca, cb) = (a[a.len() - 1 - i], b[b.len() - 1 - i]);
        if ca != cb {
            break;
        }
        if ca == b' ' || matches!(ca, b'#' | b':' | b'.') {
            common = i + 1;
        }
        i += 1;
    }
    common
}

/// Replaces `needle` with `replacement` wherever it occurs as a selector
/// token: not glued to a preceding name character, not followed by one.
/// The boundary relaxes when the needle brings its own leading symbol.
fn substitute_token(haystack: &str, needle: &str, replacement: &str) -> String {
    let needle_symbolic = matches!(
        needle.as_bytes().first(),
        Some(b'%' | b'#' | b'.' | b':')
    );
    let bytes = haystack.as_bytes();
    let mut out = String::with_capacity(haystack.len());
    let mut i = 0;
    while i < haystack.len() {
        if let Some(pos) = haystack[i..].find(needle) {
            let abs = i + pos;
            let end = abs + needle.len();
            let prev_ok = abs == 0 || {
                let c = bytes[abs - 1] as char;
                if needle_symbolic {
                    !matches!(c, '%' | '#' | '.' | ':')
                } else {
                    !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '%' | '#' | '.' | ':'))
                }
            };
            let next_ok = end >= haystack.len() || {
                let c = bytes[end] as char;
                !(c.is_ascii_alphanumeric() || c == '-' || c == '_')
            };
            out.push_str(&haystack[i..abs]);
            if prev_ok && next_ok {
                out.push_str(replacement);
                i = end;
            } else {
                let step = haystack[abs..].chars().next().map_or(1, char::len_utf8);
                out.push_str(&haystack[abs..abs + step]);
                i = abs + step;
            }
        } else {
            out.push_str(&haystack[i..]);
            break;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{longest_common_prefix, longest_common_suffix, substitute_token};

    #[test]
    fn token_substitution() {
        assert_eq!(substitute_token(".base", ".base", ".sp"), ".sp");
        assert_eq!(substitute_token(".base a", ".base", ".sp"), ".sp a");
        // not inside a longer token
        assert_eq!(substitute_token(".basement", ".base", ".sp"), ".basement");
        // class glued onto an element still counts as a token
        assert_eq!(substitute_token("div.base", ".base", ".sp"), "div.sp");
        // multiple occurrences all substitute
        assert_eq!(
            substitute_token(".base .base", ".base", ".sp"),
            ".sp .sp"
        );
    }

    #[test]
    fn common_prefix_suffix() {
        assert_eq!(longest_common_prefix(".sp", ".base"), 0);
        assert_eq!(longest_common_prefix("a .sp", "a .base"), 2);
        assert_eq!(longest_common_suffix(".sp a", ".base a"), 2);
    }
}
