//! The compiler session and the recursive block walk.
//!
//! A [`Compiler`] owns the source files, the session caches and the
//! configuration, drives preprocessing and the `manage_children` recursion,
//! and hands the collected rules to the extend resolver and the emitter.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use itertools::Itertools;
use lazy_static::lazy_static;
use log::{error, info, warn};
use regex::Regex;
use scssc_config::Config;
use scssc_shared::errors::ScssResult;
use scssc_shared::source_index::SourceIndex;

use crate::blocks::{locate_blocks, Block};
use crate::functions::assets::{AssetBackend, NoAssets};
use crate::functions::CallArgs;
use crate::preprocess;
use crate::rule::{MixinDef, Opt, Property, Rule};
use crate::scanner::Token;
use crate::value::{dequote, Number, Value};

/// Selector token a nested `@media` body re-enters the block walk under.
const CONSTRUCT: &str = "self";

lazy_static! {
    static ref SPACES_RE: Regex = Regex::new(r"\s+").expect("static regex");
    static ref INTERP_BRACED_RE: Regex =
        Regex::new(r"#\{\s*(\$[-a-zA-Z0-9_]+)\s*\}").expect("static regex");
    static ref INTERP_BARE_RE: Regex = Regex::new(r"\$[-a-zA-Z0-9_]+").expect("static regex");
    static ref EXPR_GLOB_RE: Regex = Regex::new(r"#\{(.*?)\}").expect("static regex");
    static ref SKIP_WORD_RE: Regex =
        Regex::new(r"^-?[_a-zA-Z0-9\s.,:%]*$").expect("static regex");
}

pub struct Compiler {
    pub config: Config,
    pub(crate) debug: bool,
    /// Output options; also the seed for every root rule's OPTIONS.
    pub(crate) options: HashMap<String, Opt>,
    files_order: Vec<String>,
    files: HashMap<String, String>,
    /// Preprocessed sources of resolved imports, keyed by import name.
    import_cache: HashMap<String, String>,
    pub(crate) index: SourceIndex,
    children: VecDeque<Rule>,
    pub(crate) rules: Vec<Rule>,
    pub(crate) parts: BTreeMap<String, Vec<usize>>,
    pub(crate) css_files: Vec<String>,
    pub(crate) file_rules: HashMap<String, Vec<usize>>,
    pub(crate) expr_cache: HashMap<String, Value>,
    replaces: HashMap<String, Value>,
    pub(crate) token_cache: HashMap<String, Rc<Vec<Token>>>,
    pub(crate) backend: Box<dyn AssetBackend>,
    pub(crate) eval_depth: usize,
    default_context: HashMap<String, Value>,
}

impl Compiler {
    #[must_use]
    pub fn new(config: Config) -> Self {
        Compiler::with_backend(config, Box::new(NoAssets))
    }

    #[must_use]
    pub fn with_backend(config: Config, backend: Box<dyn AssetBackend>) -> Self {
        let debug = config.debug;
        let mut options = HashMap::new();
        options.insert("verbosity".to_string(), Opt::Number(config.verbosity));
        options.insert("compress".to_string(), Opt::Number(1));
        options.insert("compress_short_colors".to_string(), Opt::Number(1));
        options.insert("compress_reverse_colors".to_string(), Opt::Number(1));
        options.insert("short_colors".to_string(), Opt::Number(0));
        options.insert("reverse_colors".to_string(), Opt::Number(0));
        options.insert("debug_info".to_string(), Opt::Number(0));

        let mut default_context = HashMap::new();
        // build facts, mirroring the seeded project variables
        default_context.insert(
            "$PROJECT".to_string(),
            Value::Str(env!("CARGO_PKG_NAME").to_string()),
        );
        default_context.insert(
            "$VERSION".to_string(),
            Value::Str(env!("CARGO_PKG_VERSION").to_string()),
        );
        // the string-shielding placeholders double as hidden variables
        for (raw, placeholder) in preprocess::SAFE_STRINGS {
            default_context.insert((*placeholder).to_string(), Value::Str((*raw).to_string()));
        }

        Compiler {
            config,
            debug,
            options,
            files_order: Vec::new(),
            files: HashMap::new(),
            import_cache: HashMap::new(),
            index: SourceIndex::new(),
            children: VecDeque::new(),
            rules: Vec::new(),
            parts: BTreeMap::new(),
            css_files: Vec::new(),
            file_rules: HashMap::new(),
            expr_cache: HashMap::new(),
            replaces: HashMap::new(),
            token_cache: HashMap::new(),
            backend,
            eval_depth: 0,
            default_context,
        }
    }

    /// Registers an input file. Files compile in registration order; the
    /// store is also probed first by `@import`.
    pub fn add_file(&mut self, fileid: &str, content: &str) {
        if !self.files.contains_key(fileid) {
            self.files_order.push(fileid.to_string());
        }
        self.files.insert(fileid.to_string(), content.to_string());
    }

    /// Sets a per-compilation option (`compress`, `debug_info`, …).
    pub fn set_option(&mut self, key: &str, value: i64) {
        self.options.insert(key.to_string(), Opt::Number(value));
    }

    /// Seeds a variable available to every input file.
    pub fn set_variable(&mut self, name: &str, value: Value) {
        self.default_context.insert(name.to_string(), value);
    }

    /// Compiles a single source string.
    pub fn compile_string(&mut self, input: &str) -> ScssResult<String> {
        self.files_order.retain(|f| f != "<string>");
        self.add_file("<string>", input);
        self.compile()
    }

    /// Runs the whole pipeline over the registered files.
    pub fn compile(&mut self) -> ScssResult<String> {
        self.reset();

        for fileid in self.files_order.clone() {
            let raw = self.files.get(&fileid).cloned().unwrap_or_default();
            let codestr = preprocess::load_string(&raw, &fileid, &mut self.index);
            let rule = Rule::root(
                &fileid,
                codestr,
                self.default_context.clone(),
                self.options.clone(),
            );
            self.children.push_back(rule);
        }

        self.parse_children()?;
        self.parse_extends();
        self.manage_order();
        self.group_by_file();

        let mut out = String::new();
        for fileid in self.css_files.clone() {
            if fileid != "<string>" {
                out.push_str(&format!("/* Generated from: {fileid} */\n"));
            }
            out.push_str(&self.create_css(&fileid));
        }
        Ok(self.post_process(&out))
    }

    fn reset(&mut self) {
        self.index = SourceIndex::new();
        self.children.clear();
        self.rules.clear();
        self.parts.clear();
        self.css_files.clear();
        self.file_rules.clear();
        self.import_cache.clear();
        self.eval_depth = 0;
    }

    /// Drains the work queue: every rule gets its block walk, a position,
    /// and a slot in the selector map.
    fn parse_children(&mut self) -> ScssResult<()> {
        let mut pos = 0;
        while let Some(mut rule) = self.children.pop_front() {
            let (selectors, parents) = split_extends(&rule.selectors);
            let p_selectors: Vec<String> = selectors.split(',').map(String::from).collect();
            let mut p_parents: BTreeSet<String> = parents;

            let mut scratch: VecDeque<Rule> = VecDeque::new();
            let media = rule.media.clone();
            self.manage_children(
                &mut rule,
                &p_selectors,
                &mut p_parents,
                &mut scratch,
                None,
                media,
                false,
            )?;
            for child in scratch.drain(..) {
                self.children.push_front(child);
            }

            if !p_parents.is_empty() {
                rule.selectors = format!(
                    "{} extends {}",
                    p_selectors.join(","),
                    p_parents.iter().join("&")
                );
            }
            rule.position = Some(pos);
            self.parts
                .entry(rule.selectors.clone())
                .or_default()
                .push(pos);
            self.rules.push(rule);
            pos += 1;
        }
        Ok(())
    }

    /// The block walk over one rule's remaining code.
    #[allow(clippy::too_many_lines)]
    pub(crate) fn manage_children(
        &mut self,
        rule: &mut Rule,
        p_selectors: &[String],
        p_parents: &mut BTreeSet<String>,
        p_children: &mut VecDeque<Rule>,
        scope: Option<&str>,
        media: Option<Vec<String>>,
        vars_mode: bool,
    ) -> ScssResult<()> {
        let blocks = locate_blocks(&rule.codestr);
        for mut block in blocks {
            if rule.options.contains_key("@return") {
                return Ok(());
            }
            rule.lineno = block.lineno;

            // shortcut rewrites
            if let Some(rest) = block.header.strip_prefix('+') {
                let mut header = format!("@include {rest}");
                let paren = header.find('(');
                let colon = header.find(':');
                if let Some(c) = colon {
                    if paren.map_or(true, |p| c < p) {
                        header.replace_range(c..=c, "(");
                        header.push(')');
                    }
                }
                block.header = header;
            } else if let Some(rest) = block.header.strip_prefix('=') {
                block.header = format!("@mixin {}", rest.trim_start());
            } else if let Some(rest) = block.header.strip_prefix("@prototype ") {
                block.header = rest.to_string();
            }

            if block.header.starts_with('@') {
                let (code, name) = split_directive(&block.header);
                match code.as_str() {
                    "@warn" => {
                        let v = self.calculate(&name, rule)?;
                        warn!("{}", preprocess::reverse_placeholders(&dequote(&v.to_css())));
                    }
                    "@print" => {
                        let v = self.calculate(&name, rule)?;
                        info!("{}", preprocess::reverse_placeholders(&dequote(&v.to_css())));
                    }
                    "@raw" => {
                        let v = self.calculate(&name, rule)?;
                        info!("{v:?}");
                    }
                    "@debug" => {
                        let flag = parse_bool_word(name.trim());
                        self.debug = flag.unwrap_or_else(|| !name.trim().is_empty());
                        info!("Debug mode is {}", if self.debug { "On" } else { "Off" });
                    }
                    "@option" => self.settle_options(rule, &name),
                    "@content" => {
                        if let Some(Opt::Text(content)) = rule.options.remove("@content") {
                            let saved = std::mem::replace(&mut rule.codestr, content);
                            self.manage_children(
                                rule,
                                p_selectors,
                                p_parents,
                                p_children,
                                scope,
                                media.clone(),
                                vars_mode,
                            )?;
                            rule.codestr = saved;
                        } else {
                            error!(
                                "Content string not found for @content ({})",
                                self.index.resolve(rule.lineno)
                            );
                        }
                    }
                    "@import" => {
                        self.do_import(rule, &block, &name, p_selectors, p_parents, p_children, scope, media.clone())?;
                    }
                    "@extend" => {
                        let name = self.apply_vars(&name, rule, false, true)?;
                        for p in name.replace(',', "&").split('&') {
                            let p = p.trim();
                            if !p.is_empty() {
                                p_parents.insert(p.to_string());
                            }
                        }
                    }
                    "@mixin" | "@function" if block.body.is_some() => {
                        self.do_definition(rule, &block, &code, &name)?;
                    }
                    "@return" => {
                        let v = self.calculate(&name, rule)?;
                        rule.options.insert("@return".to_string(), Opt::Val(v));
                    }
                    "@include" => {
                        self.do_include(
                            rule,
                            &block,
                            &name,
                            p_selectors,
                            p_parents,
                            p_children,
                            scope,
                            media.clone(),
                        )?;
                    }
                    "@if" if block.body.is_some() => {
                        self.do_if(rule, &block, false, p_selectors, p_parents, p_children, scope, media.clone(), vars_mode)?;
                    }
                    "@else" if block.header.starts_with("@else if ") && block.body.is_some() => {
                        self.do_if(rule, &block, true, p_selectors, p_parents, p_children, scope, media.clone(), vars_mode)?;
                    }
                    "@else" if block.body.is_some() => {
                        self.do_else(rule, &block, p_selectors, p_parents, p_children, scope, media.clone(), vars_mode)?;
                    }
                    "@for" if block.body.is_some() => {
                        self.do_for(rule, &block, &name, p_selectors, p_parents, p_children, scope, media.clone(), vars_mode)?;
                    }
                    "@each" if block.body.is_some() => {
                        self.do_each(rule, &block, &name, p_selectors, p_parents, p_children, scope, media.clone(), vars_mode)?;
                    }
                    "@variables" | "@vars" if block.body.is_some() => {
                        let body = block.body.clone().unwrap_or_default();
                        let saved = std::mem::replace(&mut rule.codestr, body);
                        self.manage_children(
                            rule,
                            p_selectors,
                            p_parents,
                            p_children,
                            scope,
                            media.clone(),
                            true,
                        )?;
                        rule.codestr = saved;
                    }
                    "@media" if block.body.is_some() => {
                        let mut stack = media.clone().unwrap_or_default();
                        stack.push(name.clone());
                        let body = block.body.clone().unwrap_or_default();
                        let saved = std::mem::replace(
                            &mut rule.codestr,
                            format!("{CONSTRUCT} {{{body}}}"),
                        );
                        self.manage_children(
                            rule,
                            p_selectors,
                            p_parents,
                            p_children,
                            scope,
                            Some(stack),
                            vars_mode,
                        )?;
                        rule.codestr = saved;
                    }
                    _ if block.body.is_none() => {
                        rule.properties.push(Property {
                            lineno: block.lineno,
                            name: block.header.clone(),
                            value: None,
                        });
                    }
                    _ if scope.is_none() => {
                        self.nest_rules(rule, &block, p_selectors, p_parents, p_children, media.clone())?;
                    }
                    _ => {}
                }
            } else if block.body.is_none() {
                self.get_properties(rule, &block, scope, vars_mode)?;
            } else if block.header.ends_with(':') {
                // nested-property block: recurse with an extended scope
                let prefix = format!(
                    "{}{}-",
                    scope.unwrap_or(""),
                    &block.header[..block.header.len() - 1]
                );
                let body = block.body.clone().unwrap_or_default();
                let saved = std::mem::replace(&mut rule.codestr, body);
                self.manage_children(
                    rule,
                    p_selectors,
                    p_parents,
                    p_children,
                    Some(&prefix),
                    media.clone(),
                    vars_mode,
                )?;
                rule.codestr = saved;
            } else if scope.is_none() {
                self.nest_rules(rule, &block, p_selectors, p_parents, p_children, media.clone())?;
            }
        }
        Ok(())
    }

    /// `@option key:value, …`
    fn settle_options(&mut self, rule: &mut Rule, name: &str) {
        for option in name.split(',') {
            let (key, value) = match option.split_once(':') {
                Some((k, v)) => (k.trim().to_ascii_lowercase(), v.trim().to_string()),
                None => (option.trim().to_ascii_lowercase(), String::new()),
            };
            if key.is_empty() {
                continue;
            }
            let opt = match parse_bool_word(&value) {
                Some(b) => Opt::Number(i64::from(b)),
                None => Opt::Text(value),
            };
            rule.options.insert(key.clone(), opt.clone());
            self.options.insert(key, opt);
        }
    }

    /// `@mixin` / `@function` definitions.
    fn do_definition(&mut self, rule: &mut Rule, block: &Block, code: &str, name: &str) -> ScssResult<()> {
        if name.is_empty() {
            return Ok(());
        }
        let (funct, param_text) = match name.split_once('(') {
            Some((f, rest)) => (f.trim().to_string(), depar(&format!("({rest}"))),
            None => (name.trim().to_string(), String::new()),
        };
        let mut params = Vec::new();
        let mut defaults = HashMap::new();
        for param in split_params(&param_text) {
            let (pname, default) = match param.split_once(':') {
                Some((p, d)) => (p.trim().to_string(), d.trim().to_string()),
                None => (param.trim().to_string(), String::new()),
            };
            if pname.is_empty() {
                continue;
            }
            if !default.is_empty() {
                let default = self.apply_vars(&default, rule, false, false)?;
                defaults.insert(pname.clone(), default);
            }
            params.push(pname);
        }

        // capture the body with definition-scope variables substituted,
        // leaving the parameters free
        let mut def_rule = rule.clone();
        for p in &params {
            def_rule.context.remove(p);
        }
        let body = self.apply_vars(block.body.as_deref().unwrap_or(""), &def_rule, false, false)?;

        let def = Rc::new(MixinDef {
            params: params.clone(),
            defaults,
            body,
        });

        // register the definition for every arity its defaults allow
        let mut n = params.len();
        if n == 0 {
            rule.options
                .insert(format!("{code} {funct}:0"), Opt::Mixin(Rc::clone(&def)));
        } else {
            loop {
                rule.options
                    .insert(format!("{code} {funct}:{n}"), Opt::Mixin(Rc::clone(&def)));
                let has_default = def.defaults.contains_key(&params[n - 1]);
                n -= 1;
                if !has_default {
                    break;
                }
                if n == 0 {
                    rule.options
                        .insert(format!("{code} {funct}:0"), Opt::Mixin(Rc::clone(&def)));
                    break;
                }
            }
        }
        Ok(())
    }

    /// `@include name(args)`.
    #[allow(clippy::too_many_arguments)]
    fn do_include(
        &mut self,
        rule: &mut Rule,
        block: &Block,
        name: &str,
        p_selectors: &[String],
        p_parents: &mut BTreeSet<String>,
        p_children: &mut VecDeque<Rule>,
        scope: Option<&str>,
        media: Option<Vec<String>>,
    ) -> ScssResult<()> {
        let (funct, param_text) = match name.split_once('(') {
            Some((f, rest)) => (f.trim().to_string(), depar(&format!("({rest}"))),
            None => (name.trim().to_string(), String::new()),
        };
        let funct = self.do_glob_math(&funct, rule, true)?;

        let mut positional: Vec<String> = Vec::new();
        let mut named: Vec<(String, String)> = Vec::new();
        for param in split_params(&param_text) {
            match param.split_once(':') {
                Some((var, value)) if !value.trim().is_empty() => {
                    named.push((var.trim().to_string(), value.trim().to_string()));
                }
                _ => {
                    let value = param.trim();
                    if !value.is_empty() {
                        positional.push(value.to_string());
                    }
                }
            }
        }
        let num_args = positional.len();

        let mut mixin = rule.mixin(&format!("@mixin {funct}:{num_args}"));
        if mixin.is_none() && named.is_empty() {
            // single concatenated argument fallback
            mixin = rule.mixin(&format!("@mixin {funct}:1"));
            if mixin.is_some() {
                positional = vec![positional.join(", ")];
            }
        }
        let Some(def) = mixin else {
            error!(
                "Required mixin not found: {funct}:{num_args} ({})",
                self.index.resolve(rule.lineno)
            );
            return Ok(());
        };

        // bind call arguments in the caller's context
        let mut bound: HashMap<String, Value> = HashMap::new();
        for (i, text) in positional.iter().enumerate() {
            let value = self.calculate(text, rule)?;
            let param = def.params.get(i).cloned().unwrap_or_else(|| i.to_string());
            bound.insert(param, value);
        }
        for (var, text) in &named {
            let value = self.calculate(text, rule)?;
            bound.insert(var.clone(), value);
        }
        // evaluate defaults for parameters the call left unbound
        for param in &def.params {
            if !bound.contains_key(param) {
                if let Some(default) = def.defaults.get(param) {
                    let mut scratch = rule.clone();
                    scratch.context.extend(bound.clone());
                    let value = self.calculate(default, &scratch)?;
                    bound.insert(param.clone(), value);
                }
            }
        }

        let mut child = rule.spawn(def.body.clone(), block.lineno);
        child.context.extend(bound);
        if let Some(content) = &block.body {
            child
                .options
                .insert("@content".to_string(), Opt::Text(content.clone()));
        }
        self.manage_children(&mut child, p_selectors, p_parents, p_children, scope, media, false)?;
        // the callee's declarations belong to the caller's rule
        rule.properties.append(&mut child.properties);
        Ok(())
    }

    /// `@import name[, name…]`.
    #[allow(clippy::too_many_arguments)]
    fn do_import(
        &mut self,
        rule: &mut Rule,
        block: &Block,
        name: &str,
        p_selectors: &[String],
        p_parents: &mut BTreeSet<String>,
        p_children: &mut VecDeque<Rule>,
        scope: Option<&str>,
        media: Option<Vec<String>>,
    ) -> ScssResult<()> {
        if name.contains("..") || name.contains("://") || name.contains("url(") {
            rule.properties.push(Property {
                lineno: block.lineno,
                name: block.header.clone(),
                value: None,
            });
            return Ok(());
        }

        for import_name in name.split(',') {
            let import_name = dequote(import_name.trim());
            if import_name.is_empty()
                || rule.options.contains_key(&format!("@import {import_name}"))
            {
                continue;
            }

            let mut load_paths: Vec<String> = Vec::new();
            let mut unsupported: Vec<String> = Vec::new();
            let resolved = self.resolve_import(rule, &import_name, &mut load_paths, &mut unsupported);

            let (codestr, path) = match resolved {
                Some(found) => found,
                None => match self.do_magic_import(rule, &import_name)? {
                    Some(stub) => {
                        let path = rule.path.clone();
                        (preprocess::load_string(&stub, &import_name, &mut self.index), path)
                    }
                    None => {
                        let mut msg = format!(
                            "File to import not found or unreadable: '{import_name}' ({})",
                            self.index.resolve(rule.lineno)
                        );
                        if !load_paths.is_empty() {
                            msg.push_str(&format!("\nLoad paths:\n\t{}", load_paths.join("\n\t")));
                        }
                        if !unsupported.is_empty() {
                            msg.push_str(&format!(
                                "\nPossible matches (for unsupported file format SASS):\n\t{}",
                                unsupported.join("\n\t")
                            ));
                        }
                        warn!("{msg}");
                        continue;
                    }
                },
            };

            // the imported code runs against this very rule, so variables,
            // mixins and rules land in the importing scope; the guard goes in
            // first so a file importing itself terminates
            rule.options
                .insert(format!("@import {import_name}"), Opt::Flag(true));
            let saved_codestr = std::mem::replace(&mut rule.codestr, codestr);
            let saved_path = std::mem::replace(&mut rule.path, path);
            let saved_lineno = rule.lineno;
            rule.lineno = block.lineno;
            self.manage_children(rule, p_selectors, p_parents, p_children, scope, media.clone(), false)?;
            rule.codestr = saved_codestr;
            rule.path = saved_path;
            rule.lineno = saved_lineno;
        }
        Ok(())
    }

    /// Probes the file store, then the load paths, for an import target.
    /// Returns the preprocessed source and the path it was found under.
    fn resolve_import(
        &mut self,
        rule: &Rule,
        name: &str,
        load_paths: &mut Vec<String>,
        unsupported: &mut Vec<String>,
    ) -> Option<(String, String)> {
        if let Some(cached) = self.import_cache.get(name) {
            return Some((cached.clone(), name.to_string()));
        }
        if let Some(content) = self.files.get(name).cloned() {
            let codestr = preprocess::load_string(&content, name, &mut self.index);
            self.import_cache.insert(name.to_string(), codestr.clone());
            return Some((codestr, name.to_string()));
        }

        let filename = Path::new(name)
            .file_name()
            .map(|f| f.to_string_lossy().to_string())
            .unwrap_or_else(|| name.to_string());
        let dirname = Path::new(name)
            .parent()
            .map(|d| d.to_string_lossy().to_string())
            .unwrap_or_default();
        let rule_dir = Path::new(&rule.path)
            .parent()
            .map(|d| d.to_string_lossy().to_string())
            .unwrap_or_default();

        let mut roots: Vec<String> = vec!["./".to_string()];
        roots.extend(self.config.load_paths.directories());

        for root in &roots {
            for base in ["./", rule_dir.as_str()] {
                let full_path: PathBuf = Path::new(root).join(base).join(&dirname);
                let full_path_str = full_path.to_string_lossy().to_string();
                if load_paths.contains(&full_path_str) {
                    continue;
                }
                let candidates = [
                    format!("_{filename}.scss"),
                    format!("{filename}.scss"),
                    format!("_{filename}"),
                    filename.clone(),
                ];
                for (i, candidate) in candidates.iter().enumerate() {
                    let target = full_path.join(candidate);
                    if let Ok(content) = std::fs::read_to_string(&target) {
                        let path = target.to_string_lossy().to_string();
                        let codestr = preprocess::load_string(&content, &path, &mut self.index);
                        self.import_cache.insert(name.to_string(), codestr.clone());
                        return Some((codestr, path));
                    }
                    if i < 2 {
                        let sass_twin = full_path.join(candidate.replace(".scss", ".sass"));
                        if sass_twin.exists() {
                            unsupported.push(sass_twin.to_string_lossy().to_string());
                        }
                    }
                }
                load_paths.push(full_path_str);
            }
        }
        None
    }

    /// `@import "dir/*.png"`: synthesizes the sprite-map stub when the glob
    /// matches files under the static root.
    fn do_magic_import(&mut self, rule: &mut Rule, name: &str) -> ScssResult<Option<String>> {
        if !name.contains('*') {
            return Ok(None);
        }
        let mut files = self.backend.glob_static(name);
        if files.is_empty() {
            return Ok(None);
        }
        files.sort();

        let map_name = Path::new(name)
            .parent()
            .map(|d| d.to_string_lossy().replace(['/', '\\'], "_"))
            .unwrap_or_default();

        let mut kwargs: Vec<(String, Value)> = Vec::new();
        let mut setdefault = |rule: &mut Rule, var: &str, value: Value| -> Value {
            let key = format!("${map_name}-{var}");
            let v = rule.context.entry(key).or_insert(value).clone();
            kwargs.push((var.to_string(), v.clone()));
            v
        };

        setdefault(
            rule,
            "sprite-base-class",
            Value::Str(format!(".{map_name}-sprite")),
        );
        setdefault(rule, "sprite-dimensions", Value::Bool(false));
        let position = setdefault(rule, "position", Value::Number(Number::with_unit(0.0, "%")));
        let spacing = setdefault(rule, "spacing", Value::Number(Number::new(0.0)));
        let repeat = setdefault(rule, "repeat", Value::Str("no-repeat".to_string()));

        let names: Vec<String> = files
            .iter()
            .map(|f| {
                Path::new(f)
                    .file_stem()
                    .map(|s| s.to_string_lossy().to_string())
                    .unwrap_or_default()
            })
            .collect();
        for n in &names {
            setdefault(rule, &format!("{n}-position"), position.clone());
            setdefault(rule, &format!("{n}-spacing"), spacing.clone());
            setdefault(rule, &format!("{n}-repeat"), repeat.clone());
        }

        let call_args = CallArgs {
            positional: vec![Value::Str(name.to_string())],
            named: kwargs
                .into_iter()
                .map(|(k, v)| (crate::functions::normalize_key(&k), v))
                .collect(),
            separator: Some(','),
        };
        let sprite_map = self.backend.call("sprite-map", &call_args)?;
        rule.context
            .insert(format!("${map_name}-sprites"), sprite_map);

        let stub = format!(
            r#"
            @import "compass/utilities/sprites/base";

            #{{${map_name}-sprite-base-class}} {{
                background: ${map_name}-sprites;
            }}

            @mixin {map_name}-sprite-dimensions($name) {{
                @include sprite-dimensions(${map_name}-sprites, $name);
            }}

            @mixin {map_name}-sprite-position($name, $offset-x: 0, $offset-y: 0) {{
                @include sprite-position(${map_name}-sprites, $name, $offset-x, $offset-y);
            }}

            @mixin {map_name}-sprite($name, $dimensions: ${map_name}-sprite-dimensions, $offset-x: 0, $offset-y: 0) {{
                @extend #{{${map_name}-sprite-base-class}};
                @include sprite(${map_name}-sprites, $name, $dimensions, $offset-x, $offset-y);
            }}

            @mixin {map_name}-sprites($sprite-names, $dimensions: ${map_name}-sprite-dimensions) {{
                @include sprites(${map_name}-sprites, $sprite-names, ${map_name}-sprite-base-class, $dimensions);
            }}

            @mixin all-{map_name}-sprites($dimensions: ${map_name}-sprite-dimensions) {{
                @include {map_name}-sprites({sprite_names}, $dimensions);
            }}
            "#,
            sprite_names = names.join(" ")
        );
        Ok(Some(stub))
    }

    /// `@if` / `@else if`.
    #[allow(clippy::too_many_arguments)]
    fn do_if(
        &mut self,
        rule: &mut Rule,
        block: &Block,
        is_else_if: bool,
        p_selectors: &[String],
        p_parents: &mut BTreeSet<String>,
        p_children: &mut VecDeque<Rule>,
        scope: Option<&str>,
        media: Option<Vec<String>>,
        vars_mode: bool,
    ) -> ScssResult<()> {
        let (active, condition_text) = if is_else_if {
            if !rule.options.contains_key("@if") {
                error!("@else with no @if ({})", self.index.resolve(rule.lineno));
            }
            let prior = rule.option_flag("@if").unwrap_or(true);
            (!prior, block.header["@else if ".len()..].trim().to_string())
        } else {
            let (_, name) = split_directive(&block.header);
            (true, name)
        };

        if active {
            let value = self.calculate(&condition_text, rule)?;
            let truthy = value.is_condition_true();
            if truthy {
                let body = block.body.clone().unwrap_or_default();
                let saved = std::mem::replace(&mut rule.codestr, body);
                self.manage_children(rule, p_selectors, p_parents, p_children, scope, media, vars_mode)?;
                rule.codestr = saved;
            }
            rule.options.insert("@if".to_string(), Opt::Flag(truthy));
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn do_else(
        &mut self,
        rule: &mut Rule,
        block: &Block,
        p_selectors: &[String],
        p_parents: &mut BTreeSet<String>,
        p_children: &mut VecDeque<Rule>,
        scope: Option<&str>,
        media: Option<Vec<String>>,
        vars_mode: bool,
    ) -> ScssResult<()> {
        if !rule.options.contains_key("@if") {
            error!("@else with no @if ({})", self.index.resolve(rule.lineno));
        }
        let prior = match rule.options.remove("@if") {
            Some(opt) => opt.as_flag(),
            None => true,
        };
        if !prior {
            let body = block.body.clone().unwrap_or_default();
            let saved = std::mem::replace(&mut rule.codestr, body);
            self.manage_children(rule, p_selectors, p_parents, p_children, scope, media, vars_mode)?;
            rule.codestr = saved;
        }
        Ok(())
    }

    /// `@for $v from A through|to B`: inclusive with `through`, exclusive
    /// with `to`; descending when A > B.
    #[allow(clippy::too_many_arguments)]
    fn do_for(
        &mut self,
        rule: &mut Rule,
        block: &Block,
        name: &str,
        p_selectors: &[String],
        p_parents: &mut BTreeSet<String>,
        p_children: &mut VecDeque<Rule>,
        scope: Option<&str>,
        media: Option<Vec<String>>,
        vars_mode: bool,
    ) -> ScssResult<()> {
        let Some((var, bounds)) = name.split_once("from") else {
            return Ok(());
        };
        let (frm_text, through_text, exclusive) = match bounds.split_once("through") {
            Some((f, t)) => (f, t, false),
            None => match bounds.split_once("to") {
                Some((f, t)) => (f, t, true),
                None => return Ok(()),
            },
        };

        let frm = self.calculate(frm_text.trim(), rule)?;
        let through = self.calculate(through_text.trim(), rule)?;
        let (Some(frm), Some(through)) = (as_int(&frm), as_int(&through)) else {
            return Ok(());
        };
        let mut frm = frm;
        let mut through = through;
        if exclusive {
            // exclusive upper bound, from whichever side the loop runs
            through += if frm <= through { -1 } else { 1 };
        }

        let reversed = frm > through;
        if reversed {
            std::mem::swap(&mut frm, &mut through);
        }
        let var = self.do_glob_math(var.trim(), rule, true)?;

        let body = block.body.clone().unwrap_or_default();
        let range: Vec<i64> = if reversed {
            (frm..=through).rev().collect()
        } else {
            (frm..=through).collect()
        };
        for i in range {
            rule.codestr.clone_from(&body);
            rule.context.insert(var.clone(), Value::Str(i.to_string()));
            self.manage_children(rule, p_selectors, p_parents, p_children, scope, media.clone(), vars_mode)?;
        }
        Ok(())
    }

    /// `@each $v in list`.
    #[allow(clippy::too_many_arguments)]
    fn do_each(
        &mut self,
        rule: &mut Rule,
        block: &Block,
        name: &str,
        p_selectors: &[String],
        p_parents: &mut BTreeSet<String>,
        p_children: &mut VecDeque<Rule>,
        scope: Option<&str>,
        media: Option<Vec<String>>,
        vars_mode: bool,
    ) -> ScssResult<()> {
        let Some((var, list_text)) = name.split_once("in") else {
            return Ok(());
        };
        let value = self.calculate(list_text.trim(), rule)?;
        if !value.is_truthy() {
            return Ok(());
        }
        let var = self.do_glob_math(var.trim(), rule, true)?;
        let list = value.to_list();
        let body = block.body.clone().unwrap_or_default();

        let mut bindings: Vec<(Option<String>, Value)> = Vec::new();
        for item in &list.items {
            bindings.push((None, item.clone()));
        }
        for (key, item) in &list.named {
            bindings.push((Some(key.clone()), item.clone()));
        }
        for (key, item) in bindings {
            let text = Value::Str(item.to_css());
            rule.codestr.clone_from(&body);
            rule.context.insert(var.clone(), text.clone());
            if let Some(key) = key {
                rule.context.insert(key, text);
            }
            self.manage_children(rule, p_selectors, p_parents, p_children, scope, media.clone(), vars_mode)?;
        }
        Ok(())
    }

    /// Property or variable assignment.
    fn get_properties(
        &mut self,
        rule: &mut Rule,
        block: &Block,
        scope: Option<&str>,
        vars_mode: bool,
    ) -> ScssResult<()> {
        let header = &block.header;
        let split = header.find(|c| c == ':' || c == '=');
        let (prop_raw, value_raw, is_var) = match split {
            Some(i) => (
                &header[..i],
                Some(header[i + 1..].trim().to_string()),
                header.as_bytes()[i] == b'=',
            ),
            None => (header.as_str(), None, false),
        };
        let prop = prop_raw.trim().to_string();
        let prop = self.do_glob_math(&prop, rule, true)?;
        if prop.is_empty() {
            return Ok(());
        }

        let value = match &value_raw {
            Some(text) if !text.is_empty() => Some(self.calculate(text, rule)?),
            _ => None,
        };

        let scoped_prop = format!("{}{prop}", scope.unwrap_or(""));
        if vars_mode || is_var || (prop.starts_with('$') && value.is_some()) {
            let Some(value) = value else {
                return Ok(());
            };
            // `!default` only binds when the variable is still unbound
            let value = match value {
                Value::Str(s) if s.contains("!default") => {
                    if rule.context.contains_key(&scoped_prop) {
                        None
                    } else {
                        Some(Value::Str(
                            s.replace("!default", "").replace("  ", " ").trim().to_string(),
                        ))
                    }
                }
                Value::List(mut l) => {
                    let marker = l
                        .items
                        .iter()
                        .position(|v| v.to_css() == "!default" || v.to_css().contains("!default"));
                    match marker {
                        Some(i) => {
                            if rule.context.contains_key(&scoped_prop) {
                                None
                            } else {
                                l.items.remove(i);
                                if l.len() == 1 {
                                    Some(l.first())
                                } else {
                                    Some(Value::List(l))
                                }
                            }
                        }
                        None => Some(Value::List(l)),
                    }
                }
                other => Some(other),
            };
            if let Some(value) = value {
                rule.context.insert(scoped_prop, value);
            }
        } else {
            let scoped_prop = self.apply_vars(&scoped_prop, rule, true, true)?;
            rule.properties.push(Property {
                lineno: block.lineno,
                name: scoped_prop,
                value: value.map(|v| v.to_css()),
            });
        }
        Ok(())
    }

    /// Nested rule: compose the child selector with every parent selector
    /// and queue a child rule.
    fn nest_rules(
        &mut self,
        rule: &mut Rule,
        block: &Block,
        p_selectors: &[String],
        _p_parents: &mut BTreeSet<String>,
        p_children: &mut VecDeque<Rule>,
        media: Option<Vec<String>>,
    ) -> ScssResult<()> {
        if block.header == CONSTRUCT && rule.media == media {
            let body = block.body.clone().unwrap_or_default();
            let saved = std::mem::replace(&mut rule.codestr, body);
            let mut parents = BTreeSet::new();
            self.manage_children(rule, p_selectors, &mut parents, p_children, None, media, false)?;
            rule.codestr = saved;
            return Ok(());
        }

        let header = self.apply_vars(&block.header, rule, true, true)?;
        let normalized = self.normalize_selectors(&header, &[], &[]);
        let (selectors, parents) = split_extends(&normalized);

        let mut composed: BTreeSet<String> = BTreeSet::new();
        for c_selector in selectors.split(',') {
            let c_selector = c_selector.trim();
            for p_selector in p_selectors {
                if c_selector == CONSTRUCT {
                    composed.insert(p_selector.clone());
                } else if c_selector.contains('&') {
                    composed.insert(c_selector.replace('&', p_selector));
                } else if !p_selector.is_empty() {
                    composed.insert(format!("{p_selector} {c_selector}"));
                } else {
                    composed.insert(c_selector.to_string());
                }
            }
        }
        let mut better_selectors = composed.iter().join(",");
        if !parents.is_empty() {
            better_selectors.push_str(" extends ");
            better_selectors.push_str(&parents.iter().join("&"));
        }

        let mut child = rule.spawn(block.body.clone().unwrap_or_default(), block.lineno);
        child.selectors = better_selectors;
        child.media = media;
        p_children.push_front(child);
        Ok(())
    }

    /// Splits, trims, dedupes and sorts a selector group, folding the
    /// ` extends ` clause back on canonically.
    pub(crate) fn normalize_selectors(
        &self,
        selectors: &str,
        extra_selectors: &[String],
        extra_parents: &[String],
    ) -> String {
        let selectors = SPACES_RE.replace_all(selectors, " ").to_string();

        let mut parents: BTreeSet<String> = BTreeSet::new();
        let mut set: BTreeSet<String> = BTreeSet::new();
        if selectors.contains(" extends ") {
            for part in selectors.split(',') {
                let (child, parent) = match part.split_once(" extends ") {
                    Some((c, p)) => (c, p),
                    None => (part, ""),
                };
                let child = child.trim();
                if !child.is_empty() {
                    set.insert(child.to_string());
                }
                for p in parent.split('&') {
                    let p = p.trim();
                    if !p.is_empty() {
                        parents.insert(p.to_string());
                    }
                }
            }
        } else {
            for s in selectors.split(',') {
                let s = s.trim();
                if !s.is_empty() {
                    set.insert(s.to_string());
                }
            }
        }
        for s in extra_selectors {
            let s = s.trim();
            if !s.is_empty() {
                set.insert(s.to_string());
            }
        }
        if set.is_empty() {
            return String::new();
        }
        for p in extra_parents {
            let p = p.trim();
            if !p.is_empty() {
                parents.insert(p.to_string());
            }
        }
        let joined = set.iter().join(",");
        if parents.is_empty() {
            joined
        } else {
            format!("{joined} extends {}", parents.iter().join("&"))
        }
    }

    /// Evaluates a directive argument or property value. The result is the
    /// evaluated [`Value`], with the literal text as fallback.
    pub(crate) fn calculate(&mut self, text: &str, rule: &Rule) -> ScssResult<Value> {
        if let Some(cached) = self.replaces.get(text) {
            return Ok(cached.clone());
        }
        if SKIP_WORD_RE.is_match(text)
            && !text.contains("- ")
            && !text.contains(" and ")
            && !text.contains(" or ")
            && !text.contains("not ")
        {
            let v = Value::Str(text.to_string());
            self.replaces.insert(text.to_string(), v.clone());
            return Ok(v);
        }

        let globbed = self.do_glob_math(text, rule, false)?;
        let result = match self.eval_expr(&globbed, rule)? {
            Some(v) => v,
            None => Value::Str(self.apply_vars(text, rule, false, true)?),
        };
        if !text.contains('$') {
            self.replaces.insert(text.to_string(), result.clone());
        }
        Ok(result)
    }

    /// Substitutes `$var` and `#{$var}` references from the (flattened)
    /// context, then optionally runs glob math over the result.
    pub(crate) fn apply_vars(
        &mut self,
        cont: &str,
        rule: &Rule,
        dequote_vars: bool,
        with_glob: bool,
    ) -> ScssResult<String> {
        let mut cont = cont.to_string();
        if cont.contains('$') {
            if rule.context.contains_key(&cont) {
                // the whole text is a variable: flatten the aliasing
                let mut seen: HashSet<String> = HashSet::new();
                while let Some(v) = rule.context.get(&cont) {
                    if !seen.insert(cont.clone()) {
                        break;
                    }
                    match v {
                        Value::Str(s) if *s != cont && rule.context.contains_key(s) => {
                            cont = s.clone();
                        }
                        other => {
                            cont = other.to_css();
                            break;
                        }
                    }
                }
            } else {
                let braced = INTERP_BRACED_RE
                    .replace_all(&cont, |caps: &regex::Captures| {
                        resolve_interpolation(rule, &caps[1], dequote_vars)
                            .unwrap_or_else(|| caps[0].to_string())
                    })
                    .to_string();
                cont = INTERP_BARE_RE
                    .replace_all(&braced, |caps: &regex::Captures| {
                        resolve_interpolation(rule, &caps[0], false)
                            .unwrap_or_else(|| caps[0].to_string())
                    })
                    .to_string();
            }
        }
        if with_glob {
            cont = self.do_glob_math(&cont, rule, dequote_vars)?;
        }
        Ok(cont)
    }

    /// Expands `#{expr}` interpolations by evaluating the inner expression.
    pub(crate) fn do_glob_math(
        &mut self,
        cont: &str,
        rule: &Rule,
        dequote_result: bool,
    ) -> ScssResult<String> {
        if !cont.contains("#{") {
            return Ok(cont.to_string());
        }
        let matches: Vec<(usize, usize, String)> = EXPR_GLOB_RE
            .captures_iter(cont)
            .map(|caps| {
                let m = caps.get(0).map_or((0, 0), |m| (m.start(), m.end()));
                (m.0, m.1, caps[1].to_string())
            })
            .collect();

        let mut out = String::with_capacity(cont.len());
        let mut last = 0;
        for (start, end, inner) in matches {
            out.push_str(&cont[last..start]);
            let replacement = if let Some(cached) = self.replaces.get(&inner) {
                cached.to_css()
            } else if SKIP_WORD_RE.is_match(&inner) && !inner.contains("- ") {
                self.replaces
                    .insert(inner.clone(), Value::Str(inner.clone()));
                inner.clone()
            } else {
                match self.eval_expr(&inner, rule)? {
                    Some(v) => {
                        if !inner.contains('$') {
                            self.replaces.insert(inner.clone(), v.clone());
                        }
                        let s = v.to_css();
                        if dequote_result {
                            dequote(&s)
                        } else {
                            s
                        }
                    }
                    None => inner.clone(),
                }
            };
            out.push_str(&replacement);
            last = end;
        }
        out.push_str(&cont[last..]);
        Ok(out)
    }
}

/// Resolves one `$var` interpolation against the flattened context.
fn resolve_interpolation(rule: &Rule, var: &str, dequote_value: bool) -> Option<String> {
    let mut key = var.to_string();
    let mut seen: HashSet<String> = HashSet::new();
    loop {
        match rule.context.get(&key) {
            None => return None,
            Some(Value::Str(s)) if *s != key && rule.context.contains_key(s) => {
                if !seen.insert(key.clone()) {
                    return None;
                }
                key = s.clone();
            }
            Some(v) => {
                let rendered = v.to_css();
                return Some(if dequote_value {
                    dequote(&rendered)
                } else {
                    rendered
                });
            }
        }
    }
}

/// Splits `"a,b extends p&q"` into the selector part and the parent set.
pub(crate) fn split_extends(selectors: &str) -> (String, BTreeSet<String>) {
    match selectors.split_once(" extends ") {
        Some((sels, parents)) => {
            let set = parents
                .split('&')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(String::from)
                .collect();
            (sels.to_string(), set)
        }
        None => (selectors.to_string(), BTreeSet::new()),
    }
}

fn split_directive(header: &str) -> (String, String) {
    match header.split_once(char::is_whitespace) {
        Some((code, name)) => (code.to_ascii_lowercase(), name.trim().to_string()),
        None => (header.to_ascii_lowercase(), String::new()),
    }
}

/// `1/true/t/yes/y/on` and `0/false/f/no/n/off/undefined` option words.
fn parse_bool_word(word: &str) -> Option<bool> {
    match word.to_ascii_lowercase().as_str() {
        "1" | "true" | "t" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "f" | "no" | "n" | "off" | "undefined" => Some(false),
        _ => None,
    }
}

fn as_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => Some(n.value as i64),
        Value::Str(s) | Value::Quoted(s) => s.trim().parse::<f64>().ok().map(|f| f as i64),
        _ => None,
    }
}

/// Strips one level of surrounding parentheses.
fn depar(s: &str) -> String {
    let mut s = s.trim();
    while s.starts_with('(') && s.ends_with(')') && s.len() >= 2 {
        s = s[1..s.len() - 1].trim();
    }
    s.to_string()
}

/// Splits a parameter list on commas at paren depth zero.
fn split_params(params: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut depth = 0;
    let mut current = String::new();
    for c in params.chars() {
        match c {
            '(' | '[' => {
                depth += 1;
                current.push(c);
            }
            ')' | ']' => {
                depth -= 1;
                current.push(c);
            }
            ',' if depth == 0 => {
                out.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    if !current.trim().is_empty() {
        out.push(current.trim().to_string());
    }
    out.retain(|p| !p.is_empty());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_params_respects_parens() {
        assert_eq!(
            split_params("$a: 1, $b: rgb(1, 2, 3), $c"),
            vec!["$a: 1", "$b: rgb(1, 2, 3)", "$c"]
        );
    }

    #[test]
    fn depar_strips_outer_parens() {
        assert_eq!(depar("($x: 1, $y)"), "$x: 1, $y");
        assert_eq!(depar("plain"), "plain");
    }

    #[test]
    fn directive_split() {
        assert_eq!(
            split_directive("@include m(3)"),
            ("@include".to_string(), "m(3)".to_string())
        );
        assert_eq!(split_directive("@content"), ("@content".to_string(), String::new()));
    }

    #[test]
    fn extends_split() {
        let (sels, parents) = split_extends(".a,.b extends .c&.d");
        assert_eq!(sels, ".a,.b");
        assert!(parents.contains(".c"));
        assert!(parents.contains(".d"));
    }

    #[test]
    fn bool_words() {
        assert_eq!(parse_bool_word("yes"), Some(true));
        assert_eq!(parse_bool_word("off"), Some(false));
        assert_eq!(parse_bool_word("undefined"), Some(false));
        assert_eq!(parse_bool_word("maybe"), None);
    }
}
