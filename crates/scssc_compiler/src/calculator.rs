//! The expression grammar and its evaluation.
//!
//! Parsing and evaluation happen in one pass: each production returns the
//! value of what it parsed, with the rule supplying variable bindings and
//! the compiler supplying function dispatch and caches. The unresolved
//! sentinel (`undefined`, or a leftover `$var`) short-circuits through every
//! operator.

use std::collections::HashSet;
use std::rc::Rc;

use log::{debug, error};
use scssc_shared::errors::{ScssError, ScssResult};

use crate::engine::Compiler;
use crate::functions::{self, CallArgs, FuncEnv};
use crate::rule::{Opt, Rule};
use crate::scanner::{tokenize, Token, TokenKind};
use crate::value::{self, Color, List, Number, Value};

const MAX_EVAL_DEPTH: usize = 64;

impl Compiler {
    /// Evaluates an expression string against a rule's bindings. `Ok(None)`
    /// is a recoverable parse failure (the caller falls back to the literal
    /// text); `Err` escapes only in debug mode or for fatal helper errors.
    pub(crate) fn eval_expr(&mut self, expr: &str, rule: &Rule) -> ScssResult<Option<Value>> {
        if self.eval_depth >= MAX_EVAL_DEPTH {
            // mutual variable references bottom out as unresolved
            return Ok(Some(Value::undefined()));
        }

        // chase variable aliases through the context, breaking on
        // self-reference
        let mut expr = expr.to_string();
        if rule.context.contains_key(&expr) {
            let mut seen: HashSet<String> = HashSet::new();
            while rule.context.contains_key(&expr) && seen.insert(expr.clone()) {
                match rule.context.get(&expr) {
                    Some(Value::Str(s)) => {
                        if *s == expr {
                            break;
                        }
                        expr = s.clone();
                    }
                    Some(other) => return Ok(Some(other.clone())),
                    None => break,
                }
            }
        }

        if let Some(cached) = self.expr_cache.get(&expr) {
            return Ok(Some(cached.clone()));
        }

        self.eval_depth += 1;
        let parsed = self.parse_expression(&expr, rule);
        self.eval_depth -= 1;

        match parsed {
            Ok(v) => {
                if !expr.contains('$') {
                    self.expr_cache.insert(expr, v.clone());
                }
                Ok(Some(v))
            }
            Err(ScssError::Syntax(msg)) => {
                if self.debug {
                    return Err(ScssError::parse(&msg, self.index.resolve(rule.lineno)));
                }
                debug!(
                    "Syntax error: {msg} in `{expr}` ({})",
                    self.index.resolve(rule.lineno)
                );
                Ok(None)
            }
            Err(fatal) => Err(fatal),
        }
    }

    fn parse_expression(&mut self, expr: &str, rule: &Rule) -> ScssResult<Value> {
        let tokens = self.tokens_for(expr)?;
        let mut calculator = Calculator { tokens, pos: 0 };
        calculator.goal(self, rule)
    }

    /// Tokenizes through the per-session token cache.
    pub(crate) fn tokens_for(&mut self, input: &str) -> ScssResult<Rc<Vec<Token>>> {
        if let Some(tokens) = self.token_cache.get(input) {
            return Ok(Rc::clone(tokens));
        }
        let tokens = Rc::new(tokenize(input)?);
        self.token_cache
            .insert(input.to_string(), Rc::clone(&tokens));
        Ok(tokens)
    }

    /// Resolves a `$var` atom: context value, with string values evaluated
    /// in turn. Unbound variables keep their `$name` (the sentinel).
    pub(crate) fn interpolate_var(&mut self, name: &str, rule: &Rule) -> ScssResult<Value> {
        match rule.context.get(name) {
            None => Ok(Value::Str(name.to_string())),
            Some(Value::Str(s)) if s != name => {
                let s = s.clone();
                Ok(self
                    .eval_expr(&s, rule)?
                    .unwrap_or_else(|| Value::Str(s.clone())))
            }
            Some(v) => Ok(v.clone()),
        }
    }

    /// Dispatches a call: user `@function` first, then the builtin table,
    /// then CSS passthrough (with an error logged for unknown non-CSS
    /// names). `is_function` is false for the postfix-units production.
    pub(crate) fn call_function(
        &mut self,
        name: &str,
        args: Option<List>,
        rule: &Rule,
        is_function: bool,
    ) -> ScssResult<Value> {
        let name = name.replace('_', "-");
        let list = args.unwrap_or_default();
        let call_args = CallArgs {
            positional: list.items.clone(),
            named: list
                .named
                .iter()
                .map(|(n, v)| (functions::normalize_key(n), v.clone()))
                .collect(),
            separator: list.separator,
        };
        let arity = call_args.arity();

        if let Some(def) = rule.mixin(&format!("@function {name}:{arity}")) {
            return self.execute_function(&def, &call_args, rule);
        }
        if let Some(builtin) = functions::lookup(&name, arity) {
            let mut env = FuncEnv {
                backend: self.backend.as_mut(),
            };
            return builtin(&mut env, &call_args);
        }

        let sp = list.separator.map_or(String::new(), String::from);
        if is_function {
            if !functions::is_css_function(&name) {
                error!(
                    "Required function not found: {name}:{arity} ({})",
                    self.index.resolve(rule.lineno)
                );
            }
            let mut rendered: Vec<String> =
                list.items.iter().map(Value::to_css).collect();
            rendered.extend(list.named.iter().map(|(n, v)| format!("{n}: {}", v.to_css())));
            Ok(Value::Str(format!(
                "{name}({})",
                rendered.join(&format!("{sp} "))
            )))
        } else {
            let rendered: Vec<String> = list.values().iter().map(Value::to_css).collect();
            Ok(Value::Str(rendered.join(&format!("{sp} "))))
        }
    }

    /// Runs a user `@function` body against a scratch child rule and
    /// returns its `@return` slot.
    fn execute_function(
        &mut self,
        def: &crate::rule::MixinDef,
        args: &CallArgs,
        rule: &Rule,
    ) -> ScssResult<Value> {
        let mut bound = rule.context.clone();
        for (i, value) in args.positional.iter().enumerate() {
            if let Some(param) = def.params.get(i) {
                bound.insert(param.clone(), value.clone());
            }
        }
        for (key, value) in &args.named {
            if let Some(param) = def
                .params
                .iter()
                .find(|p| functions::normalize_key(p) == *key)
            {
                bound.insert(param.clone(), value.clone());
            }
        }
        for param in &def.params {
            if !bound.contains_key(param) {
                if let Some(default) = def.defaults.get(param) {
                    let mut scratch = rule.spawn(String::new(), rule.lineno);
                    scratch.context = bound.clone();
                    let v = self.calculate(default, &scratch)?;
                    bound.insert(param.clone(), v);
                }
            }
        }

        let mut child = rule.spawn(def.body.clone(), rule.lineno);
        child.context = bound;
        let selectors = vec![String::new()];
        let mut parents = std::collections::BTreeSet::new();
        let mut children = std::collections::VecDeque::new();
        let media = rule.media.clone();
        self.manage_children(&mut child, &selectors, &mut parents, &mut children, None, media, false)?;
        match child.options.remove("@return") {
            Some(Opt::Val(v)) => Ok(v),
            _ => Ok(Value::Str(String::new())),
        }
    }
}

/// Cursor over a cached token stream; one method per grammar production.
struct Calculator {
    tokens: Rc<Vec<Token>>,
    pos: usize,
}

impl Calculator {
    fn peek(&self) -> TokenKind {
        self.tokens
            .get(self.pos)
            .map_or(TokenKind::End, |t| t.kind)
    }

    fn peek_text(&self) -> &str {
        self.tokens.get(self.pos).map_or("", |t| t.text.as_str())
    }

    fn advance(&mut self) -> Token {
        let token = self
            .tokens
            .get(self.pos)
            .cloned()
            .unwrap_or(Token {
                kind: TokenKind::End,
                text: String::new(),
            });
        self.pos += 1;
        token
    }

    fn expect(&mut self, kind: TokenKind) -> ScssResult<Token> {
        let token = self.advance();
        if token.kind == kind {
            Ok(token)
        } else {
            Err(ScssError::Syntax(format!(
                "expected {kind:?}, found {:?} `{}`",
                token.kind, token.text
            )))
        }
    }

    fn goal(&mut self, cp: &mut Compiler, rule: &Rule) -> ScssResult<Value> {
        let list = self.expr_lst(cp, rule)?;
        let v = if list.len() == 1 {
            list.first()
        } else {
            Value::List(list)
        };
        self.expect(TokenKind::End)?;
        Ok(v)
    }

    /// Comma list with optional `$name: expr` named members.
    fn expr_lst(&mut self, cp: &mut Compiler, rule: &Rule) -> ScssResult<List> {
        let mut list = List::default();
        loop {
            let mut name = None;
            if self.peek() == TokenKind::Var {
                let mark = self.pos;
                let var = self.advance();
                if self.peek() == TokenKind::Colon {
                    self.advance();
                    name = Some(var.text);
                } else {
                    self.pos = mark;
                }
            }
            let item = self.expr_slst(cp, rule)?;
            match name {
                Some(n) => list.named.push((n, item)),
                None => list.items.push(item),
            }
            if self.peek() == TokenKind::Comma {
                self.advance();
                list.separator = Some(',');
            } else {
                break;
            }
        }
        Ok(list)
    }

    /// Space-delimited run; a single expression stays scalar.
    fn expr_slst(&mut self, cp: &mut Compiler, rule: &Rule) -> ScssResult<Value> {
        let first = self.expr(cp, rule)?;
        let mut items = vec![first];
        while !matches!(
            self.peek(),
            TokenKind::End | TokenKind::Comma | TokenKind::RPar
        ) {
            items.push(self.expr(cp, rule)?);
        }
        if items.len() == 1 {
            Ok(items.remove(0))
        } else {
            Ok(Value::List(List::from_items(items, None)))
        }
    }

    fn expr(&mut self, cp: &mut Compiler, rule: &Rule) -> ScssResult<Value> {
        let mut v = self.and_test(cp, rule)?;
        while self.peek() == TokenKind::Or {
            self.advance();
            let rhs = self.and_test(cp, rule)?;
            // `or` keeps the first truthy side; an unresolved left side
            // yields the right
            v = if v.is_undefined() || !v.is_truthy() {
                rhs
            } else {
                v
            };
        }
        Ok(v)
    }

    fn and_test(&mut self, cp: &mut Compiler, rule: &Rule) -> ScssResult<Value> {
        let mut v = self.not_test(cp, rule)?;
        while self.peek() == TokenKind::And {
            self.advance();
            let rhs = self.not_test(cp, rule)?;
            v = if v.is_undefined() {
                Value::undefined()
            } else if v.is_truthy() {
                rhs
            } else {
                v
            };
        }
        Ok(v)
    }

    fn not_test(&mut self, cp: &mut Compiler, rule: &Rule) -> ScssResult<Value> {
        match self.peek() {
            TokenKind::Not => {
                self.advance();
                let v = self.not_test(cp, rule)?;
                if v.is_undefined() {
                    Ok(Value::undefined())
                } else {
                    Ok(Value::Bool(!v.is_truthy()))
                }
            }
            TokenKind::Inv => {
                self.advance();
                let v = self.not_test(cp, rule)?;
                if v.is_undefined() {
                    Ok(Value::undefined())
                } else {
                    Ok(value::invert('!', &v))
                }
            }
            _ => self.comparison(cp, rule),
        }
    }

    fn comparison(&mut self, cp: &mut Compiler, rule: &Rule) -> ScssResult<Value> {
        let mut v = self.a_expr(cp, rule)?;
        loop {
            let op = self.peek();
            match op {
                TokenKind::Lt | TokenKind::Gt | TokenKind::Le | TokenKind::Ge => {
                    self.advance();
                    let rhs = self.a_expr(cp, rule)?;
                    v = if v.is_undefined() || rhs.is_undefined() {
                        Value::undefined()
                    } else {
                        let ord = v.loose_cmp(&rhs);
                        let truth = match (op, ord) {
                            (TokenKind::Lt, Some(std::cmp::Ordering::Less))
                            | (TokenKind::Gt, Some(std::cmp::Ordering::Greater)) => true,
                            (TokenKind::Le, Some(ord)) => ord != std::cmp::Ordering::Greater,
                            (TokenKind::Ge, Some(ord)) => ord != std::cmp::Ordering::Less,
                            _ => false,
                        };
                        Value::Bool(truth)
                    };
                }
                TokenKind::Eq | TokenKind::Ne => {
                    self.advance();
                    let rhs = self.a_expr(cp, rule)?;
                    // unresolved sides compare as null
                    let l = if v.is_undefined() { Value::Null } else { v.clone() };
                    let r = if rhs.is_undefined() { Value::Null } else { rhs };
                    let eq = l.loose_eq(&r);
                    v = Value::Bool(if op == TokenKind::Eq { eq } else { !eq });
                }
                _ => break,
            }
        }
        Ok(v)
    }

    fn a_expr(&mut self, cp: &mut Compiler, rule: &Rule) -> ScssResult<Value> {
        let mut v = self.m_expr(cp, rule)?;
        loop {
            let op = self.peek();
            if op != TokenKind::Add && op != TokenKind::Sub {
                break;
            }
            self.advance();
            let rhs = self.m_expr(cp, rule)?;
            v = if v.is_undefined() || rhs.is_undefined() {
                Value::undefined()
            } else if op == TokenKind::Add {
                value::add(&v, &rhs)
            } else {
                value::sub(&v, &rhs)
            };
        }
        Ok(v)
    }

    fn m_expr(&mut self, cp: &mut Compiler, rule: &Rule) -> ScssResult<Value> {
        let mut v = self.u_expr(cp, rule)?;
        loop {
            let op = self.peek();
            if op != TokenKind::Mul && op != TokenKind::Div {
                break;
            }
            self.advance();
            let rhs = self.u_expr(cp, rule)?;
            v = if v.is_undefined() || rhs.is_undefined() {
                Value::undefined()
            } else if op == TokenKind::Mul {
                value::mul(&v, &rhs)
            } else {
                value::div(&v, &rhs)
            };
        }
        Ok(v)
    }

    fn u_expr(&mut self, cp: &mut Compiler, rule: &Rule) -> ScssResult<Value> {
        match self.peek() {
            TokenKind::Sign => {
                self.advance();
                let v = self.u_expr(cp, rule)?;
                if v.is_undefined() {
                    Ok(Value::undefined())
                } else {
                    Ok(value::invert('-', &v))
                }
            }
            TokenKind::Add => {
                self.advance();
                let v = self.u_expr(cp, rule)?;
                if v.is_undefined() {
                    Ok(Value::undefined())
                } else {
                    Ok(v)
                }
            }
            _ => {
                let v = self.atom(cp, rule)?;
                if self.peek() == TokenKind::Units {
                    let unit = self.advance().text;
                    let args = List::from_items(vec![v, Value::Str(unit.clone())], None);
                    return cp.call_function(&unit, Some(args), rule, false);
                }
                Ok(v)
            }
        }
    }

    fn atom(&mut self, cp: &mut Compiler, rule: &Rule) -> ScssResult<Value> {
        match self.peek() {
            TokenKind::LPar => {
                self.advance();
                let list = self.expr_lst(cp, rule)?;
                self.expect(TokenKind::RPar)?;
                if list.len() == 1 {
                    Ok(list.first())
                } else {
                    Ok(Value::List(list))
                }
            }
            TokenKind::Id => {
                let token = self.advance();
                Ok(Value::Str(token.text))
            }
            TokenKind::Fnct => {
                let name = self.advance().text;
                self.expect(TokenKind::LPar)?;
                let args = if self.peek() == TokenKind::RPar {
                    None
                } else {
                    Some(self.expr_lst(cp, rule)?)
                };
                self.expect(TokenKind::RPar)?;
                cp.call_function(&name, args, rule, true)
            }
            TokenKind::Num => {
                let text = self.advance().text;
                let n = text
                    .parse::<f64>()
                    .map_err(|_| ScssError::Syntax(format!("bad number `{text}`")))?;
                Ok(Value::Number(Number::new(n)))
            }
            TokenKind::Str => Ok(Value::Str(self.advance().text)),
            TokenKind::QStr => Ok(Value::Quoted(self.advance().text)),
            TokenKind::Bool => {
                let token = self.advance();
                Ok(Value::Bool(token.text == "true"))
            }
            TokenKind::Color => {
                let text = self.advance().text;
                Color::from_hex(&text)
                    .map(Value::Color)
                    .ok_or_else(|| ScssError::Syntax(format!("bad color `{text}`")))
            }
            TokenKind::Var => {
                let name = self.advance().text;
                cp.interpolate_var(&name, rule)
            }
            other => Err(ScssError::Syntax(format!(
                "unexpected token {other:?} `{}`",
                self.peek_text()
            ))),
        }
    }
}
