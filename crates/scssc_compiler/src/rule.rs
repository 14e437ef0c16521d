//! The unit of compilation.
//!
//! A [`Rule`] carries a selector group, a body of not-yet-parsed SCSS, the
//! variable context and the mixin/option table. Children are spawned by
//! copying a parent and overriding slots; context and options are snapshot
//! copies, so a parent never observes child mutations. Communication back
//! up happens only through the `@return` and `@content` option slots.

use std::collections::{BTreeSet, HashMap};
use std::rc::Rc;

use crate::value::Value;

/// A captured `@mixin` or `@function` definition: parameter names in order,
/// default expressions (still textual, evaluated at call time) and the body
/// with definition-scope variables already substituted.
#[derive(Debug, Clone, PartialEq)]
pub struct MixinDef {
    pub params: Vec<String>,
    pub defaults: HashMap<String, String>,
    pub body: String,
}

/// Values living in a rule's OPTIONS table.
#[derive(Debug, Clone)]
pub enum Opt {
    /// Boolean state: `@if` chain results, `@import` guards.
    Flag(bool),
    /// Numeric `@option` values (`0`/`1` words parse to these).
    Number(i64),
    /// Textual values: raw `@option` strings and the `@content` body slot.
    Text(String),
    /// A mixin or function definition, keyed by `"@mixin name:arity"`.
    Mixin(Rc<MixinDef>),
    /// The `@return` slot of a function body.
    Val(Value),
}

impl Opt {
    #[must_use]
    pub fn as_flag(&self) -> bool {
        match self {
            Opt::Flag(b) => *b,
            Opt::Number(n) => *n != 0,
            Opt::Text(t) => !t.is_empty(),
            Opt::Mixin(_) => true,
            Opt::Val(v) => v.is_truthy(),
        }
    }

    #[must_use]
    pub fn as_number(&self) -> i64 {
        match self {
            Opt::Number(n) => *n,
            Opt::Flag(b) => i64::from(*b),
            Opt::Text(t) => t.parse().unwrap_or(0),
            _ => 0,
        }
    }
}

/// One collected declaration: source line, property name, optional value.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    pub lineno: usize,
    pub name: String,
    pub value: Option<String>,
}

/// The central compilation record.
#[derive(Debug, Clone)]
pub struct Rule {
    /// Which input file this rule came from.
    pub fileid: String,
    /// Sequence number; doubles as identifier and ordering key.
    pub position: Option<usize>,
    /// Remaining unparsed SCSS.
    pub codestr: String,
    /// Positions this rule must come after (filled by `@extend` linking).
    pub deps: BTreeSet<usize>,
    /// Variable scope.
    pub context: HashMap<String, Value>,
    /// Mixin/function table and directive flags.
    pub options: HashMap<String, Opt>,
    /// Comma-separated selectors, optionally with an ` extends ` clause.
    pub selectors: String,
    pub properties: Vec<Property>,
    /// Path the rule's source was loaded from; `@import` resolves relative
    /// to its directory.
    pub path: String,
    pub lineno: usize,
    /// Read but otherwise unused; kept for parity with the rule record.
    pub is_final: bool,
    /// Stack of enclosing `@media` queries.
    pub media: Option<Vec<String>>,
}

impl Rule {
    /// A root rule for one input file.
    #[must_use]
    pub fn root(
        fileid: &str,
        codestr: String,
        context: HashMap<String, Value>,
        options: HashMap<String, Opt>,
    ) -> Self {
        Rule {
            fileid: fileid.to_string(),
            position: None,
            codestr,
            deps: BTreeSet::new(),
            context,
            options,
            selectors: String::new(),
            properties: Vec::new(),
            path: fileid.to_string(),
            lineno: 0,
            is_final: false,
            media: None,
        }
    }

    /// Spawns a child with fresh body/selectors and snapshot-copied context
    /// and options. The remaining slots are inherited.
    #[must_use]
    pub fn spawn(&self, codestr: String, lineno: usize) -> Rule {
        Rule {
            fileid: self.fileid.clone(),
            position: None,
            codestr,
            deps: BTreeSet::new(),
            context: self.context.clone(),
            options: self.options.clone(),
            selectors: self.selectors.clone(),
            properties: Vec::new(),
            path: self.path.clone(),
            lineno,
            is_final: false,
            media: self.media.clone(),
        }
    }

    #[must_use]
    pub fn option_flag(&self, key: &str) -> Option<bool> {
        self.options.get(key).map(Opt::as_flag)
    }

    #[must_use]
    pub fn mixin(&self, key: &str) -> Option<Rc<MixinDef>> {
        match self.options.get(key) {
            Some(Opt::Mixin(def)) => Some(Rc::clone(def)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Opt, Rule};
    use crate::value::Value;
    use std::collections::HashMap;

    #[test]
    fn spawn_snapshots_context() {
        let mut context = HashMap::new();
        context.insert("$a".to_string(), Value::Str("1".to_string()));
        let parent = Rule::root("a.scss", String::new(), context, HashMap::new());

        let mut child = parent.spawn("x: $a;".to_string(), 3);
        child
            .context
            .insert("$a".to_string(), Value::Str("2".to_string()));

        assert_eq!(parent.context.get("$a"), Some(&Value::Str("1".to_string())));
        assert_eq!(child.lineno, 3);
        assert!(child.properties.is_empty());
    }

    #[test]
    fn option_coercions() {
        assert!(Opt::Number(1).as_flag());
        assert!(!Opt::Number(0).as_flag());
        assert_eq!(Opt::Text("2".to_string()).as_number(), 2);
        assert!(Opt::Flag(true).as_flag());
    }
}
