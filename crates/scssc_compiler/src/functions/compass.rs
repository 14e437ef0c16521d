//! Compass-style helpers: list utilities, selector generators and the
//! vendor-prefix machinery.

use std::collections::{BTreeSet, HashMap};

use scssc_shared::errors::{ScssError, ScssResult};

use super::{Builtin, CallArgs, FuncEnv};
use crate::value::{List, Number, Value};

/// Interprets a value as a list of selector strings: lists contribute their
/// items, strings split on commas.
fn selector_items(value: &Value) -> Vec<String> {
    let items: Vec<String> = match value {
        Value::List(l) => l.values().iter().map(Value::content).collect(),
        other => other.content().split(',').map(String::from).collect(),
    };
    items
        .iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn comma_list(items: Vec<Value>) -> Value {
    Value::List(List::from_items(items, Some(',')))
}

pub fn compass_list(_: &mut FuncEnv<'_>, args: &CallArgs) -> ScssResult<Value> {
    if args.positional.len() == 1 {
        if let Some(Value::List(l)) = args.pos(0) {
            return Ok(Value::List(l.clone()));
        }
    }
    Ok(comma_list(args.all()))
}

pub fn compass_space_list(env: &mut FuncEnv<'_>, args: &CallArgs) -> ScssResult<Value> {
    let mut list = match compass_list(env, args)? {
        Value::List(l) => l,
        other => other.to_list(),
    };
    list.separator = None;
    Ok(Value::List(list))
}

pub fn blank(_: &mut FuncEnv<'_>, args: &CallArgs) -> ScssResult<Value> {
    Ok(Value::Bool(!args.all().iter().any(Value::is_truthy)))
}

pub fn compact(_: &mut FuncEnv<'_>, args: &CallArgs) -> ScssResult<Value> {
    let (values, separator) = if args.positional.len() == 1 {
        let list = args.pos(0).map(Value::to_list).unwrap_or_default();
        (list.values(), list.separator)
    } else {
        (args.all(), Some(','))
    };
    let kept: Vec<Value> = values.into_iter().filter(Value::is_truthy).collect();
    Ok(Value::List(List::from_items(kept, separator)))
}

pub fn reject(_: &mut FuncEnv<'_>, args: &CallArgs) -> ScssResult<Value> {
    let list = args.pos(0).map(Value::to_list).unwrap_or_default();
    let mut rejected: Vec<Value> = args.positional.iter().skip(1).cloned().collect();
    if rejected.len() == 1 {
        if let Value::List(l) = &rejected[0] {
            rejected = l.values();
        }
    }
    let kept: Vec<Value> = list
        .values()
        .into_iter()
        .filter(|v| !rejected.iter().any(|r| r.loose_eq(v)))
        .collect();
    Ok(Value::List(List::from_items(kept, list.separator)))
}

/// Start-exclusive, end-inclusive slice over the positional items.
pub fn compass_slice(_: &mut FuncEnv<'_>, args: &CallArgs) -> ScssResult<Value> {
    let list = args.pos(0).map(Value::to_list).unwrap_or_default();
    let start = args.get(1, "start-index").map(|v| v.to_number().value).unwrap_or(0.0);
    let end = args.get(2, "end-index").map(|v| v.to_number().value);
    let kept: Vec<Value> = list
        .values()
        .into_iter()
        .enumerate()
        .filter(|(i, _)| {
            let i = *i as f64;
            i > start && end.map_or(true, |e| i <= e)
        })
        .map(|(_, v)| v)
        .collect();
    Ok(Value::List(List::from_items(kept, list.separator)))
}

pub fn first_value_of(_: &mut FuncEnv<'_>, args: &CallArgs) -> ScssResult<Value> {
    if args.positional.len() == 1 {
        if let Some(Value::List(l)) = args.pos(0) {
            return Ok(l.first());
        }
    }
    Ok(args.pos(0).cloned().unwrap_or(Value::Null))
}

// Selector helpers

pub fn nest(_: &mut FuncEnv<'_>, args: &CallArgs) -> ScssResult<Value> {
    let mut ret: Vec<String> = args
        .pos(0)
        .map(selector_items)
        .unwrap_or_default();
    for arg in args.positional.iter().skip(1) {
        let mut next = Vec::new();
        for s in selector_items(arg) {
            for r in &ret {
                next.push(format!("{r} {s}"));
            }
        }
        ret = next;
    }
    let sorted: BTreeSet<String> = ret.into_iter().collect();
    Ok(comma_list(sorted.into_iter().map(Value::Str).collect()))
}

pub fn append_selector(_: &mut FuncEnv<'_>, args: &CallArgs) -> ScssResult<Value> {
    let selectors = args.pos(0).map(selector_items).unwrap_or_default();
    let suffix = args
        .get(1, "to-append")
        .map(|v| v.content().trim().to_string())
        .unwrap_or_default();
    let sorted: BTreeSet<String> = selectors
        .into_iter()
        .map(|s| format!("{s}{suffix}"))
        .collect();
    Ok(comma_list(sorted.into_iter().map(Value::Str).collect()))
}

pub fn headers(_: &mut FuncEnv<'_>, args: &CallArgs) -> ScssResult<Value> {
    let first = args.get(0, "from");
    let second = args.get(1, "to");
    let (frm, to) = match (first, second) {
        (Some(f), None) => {
            if f.content().eq_ignore_ascii_case("all") {
                (1, 6)
            } else {
                (1, f.to_number().value as i64)
            }
        }
        (f, t) => (
            f.map_or(1, |v| v.to_number().value as i64).max(1),
            t.map_or(6, |v| v.to_number().value as i64),
        ),
    };
    let items = (frm..=to).map(|i| Value::Str(format!("h{i}"))).collect();
    Ok(comma_list(items))
}

pub fn enumerate(_: &mut FuncEnv<'_>, args: &CallArgs) -> ScssResult<Value> {
    let prefix = args.get(0, "prefix").map(Value::content).unwrap_or_default();
    let mut frm = args.get(1, "frm").map_or(1, |v| v.to_number().value as i64);
    let mut through = args.get(2, "through").map_or(frm, |v| v.to_number().value as i64);
    let separator = args
        .get(3, "separator")
        .map(Value::content)
        .unwrap_or_else(|| "-".to_string());

    let reversed = frm > through;
    if reversed {
        std::mem::swap(&mut frm, &mut through);
    }
    let mut items: Vec<Value> = (frm..=through)
        .map(|i| {
            if prefix.is_empty() {
                Value::Number(Number::new(i as f64))
            } else {
                Value::Str(format!("{prefix}{separator}{i}"))
            }
        })
        .collect();
    if reversed {
        items.reverse();
    }
    Ok(comma_list(items))
}

pub fn range(env: &mut FuncEnv<'_>, args: &CallArgs) -> ScssResult<Value> {
    let (frm, through) = match (args.pos(0), args.pos(1)) {
        (Some(f), Some(t)) => (f.to_number().value as i64, t.to_number().value as i64),
        (Some(t), None) => (1, t.to_number().value as i64),
        _ => (1, 1),
    };
    let shifted = CallArgs {
        positional: vec![
            Value::Str(String::new()),
            Value::Number(Number::new(frm as f64)),
            Value::Number(Number::new(through as f64)),
        ],
        named: Vec::new(),
        separator: Some(','),
    };
    enumerate(env, &shifted)
}

const ELEMENTS_OF_TYPE: &[(&str, &str)] = &[
    (
        "block",
        "address, article, aside, blockquote, center, dd, details, dir, div, dl, dt, fieldset, \
         figcaption, figure, footer, form, frameset, h1, h2, h3, h4, h5, h6, header, hgroup, hr, \
         isindex, menu, nav, noframes, noscript, ol, p, pre, section, summary, ul",
    ),
    (
        "inline",
        "a, abbr, acronym, audio, b, basefont, bdo, big, br, canvas, cite, code, command, \
         datalist, dfn, em, embed, font, i, img, input, kbd, keygen, label, mark, meter, output, \
         progress, q, rp, rt, ruby, s, samp, select, small, span, strike, strong, sub, sup, \
         textarea, time, tt, u, var, video, wbr",
    ),
    ("table", "table"),
    ("list-item", "li"),
    ("table-row-group", "tbody"),
    ("table-header-group", "thead"),
    ("table-footer-group", "tfoot"),
    ("table-row", "tr"),
    ("table-cell", "td, th"),
    (
        "html5-block",
        "article, aside, details, figcaption, figure, footer, header, hgroup, menu, nav, \
         section, summary",
    ),
    (
        "html5-inline",
        "audio, canvas, command, datalist, embed, keygen, mark, meter, output, progress, rp, rt, \
         ruby, time, video, wbr",
    ),
    (
        "html5",
        "article, aside, audio, canvas, command, datalist, details, embed, figcaption, figure, \
         footer, header, hgroup, keygen, mark, menu, meter, nav, output, progress, rp, rt, ruby, \
         section, summary, time, video, wbr",
    ),
];

pub fn elements_of_type(_: &mut FuncEnv<'_>, args: &CallArgs) -> ScssResult<Value> {
    let display = args.get(0, "display").map(Value::content).unwrap_or_default();
    let entry = ELEMENTS_OF_TYPE
        .iter()
        .find(|(name, _)| *name == display)
        .ok_or_else(|| ScssError::Syntax(format!("Elements of type '{display}' not found")))?;
    let mut items: Vec<String> = entry.1.split(',').map(|s| s.trim().to_string()).collect();
    items.sort();
    Ok(comma_list(items.into_iter().map(Value::Str).collect()))
}

// Vendor prefixing

fn has_render(value: &Value, prefix: &str) -> bool {
    match value {
        Value::Prefixed(p) => p.render_for(prefix).is_some(),
        Value::List(l) => l.values().iter().any(|v| has_render(v, prefix)),
        _ => false,
    }
}

fn apply_render(value: &Value, prefix: &str) -> Value {
    match value {
        Value::Prefixed(p) => match p.render_for(prefix) {
            Some(rendered) => Value::Str(rendered.to_string()),
            None => value.clone(),
        },
        Value::List(l) => {
            let mut out = l.clone();
            out.items = l.items.iter().map(|v| apply_render(v, prefix)).collect();
            out.named = l
                .named
                .iter()
                .map(|(n, v)| (n.clone(), apply_render(v, prefix)))
                .collect();
            Value::List(out)
        }
        _ => value.clone(),
    }
}

pub fn prefixed(_: &mut FuncEnv<'_>, args: &CallArgs) -> ScssResult<Value> {
    let prefix = args.pos(0).map(Value::content).unwrap_or_default();
    let any = args
        .positional
        .iter()
        .skip(1)
        .any(|v| has_render(v, &prefix));
    Ok(Value::Bool(any))
}

/// Rewrites every argument through its renderer for the given prefix.
pub fn apply_prefix(prefix: &str, values: &[Value]) -> Value {
    let rewritten: Vec<Value> = values.iter().map(|v| apply_render(v, prefix)).collect();
    if rewritten.len() == 1 {
        rewritten.into_iter().next().unwrap_or(Value::Null)
    } else {
        comma_list(rewritten)
    }
}

pub fn prefix(_: &mut FuncEnv<'_>, args: &CallArgs) -> ScssResult<Value> {
    let name = args.pos(0).map(Value::content).unwrap_or_default();
    Ok(apply_prefix(&name, &args.positional[1.min(args.positional.len())..]))
}

macro_rules! prefix_shortcut {
    ($($fn_name:ident => $prefix:literal),+ $(,)?) => {
        $(
            pub fn $fn_name(_: &mut FuncEnv<'_>, args: &CallArgs) -> ScssResult<Value> {
                Ok(apply_prefix($prefix, &args.positional))
            }
        )+
    };
}

prefix_shortcut! {
    moz => "moz",
    svg => "svg",
    css2 => "css2",
    pie => "pie",
    webkit => "webkit",
    owg => "owg",
    ms => "ms",
    o => "o",
    khtml => "khtml",
}

pub(super) fn register(map: &mut HashMap<&'static str, Builtin>) {
    map.insert("-compass-list:n", compass_list);
    map.insert("-compass-space-list:n", compass_space_list);
    map.insert("blank:n", blank);
    map.insert("compact:n", compact);
    map.insert("reject:n", reject);
    map.insert("-compass-slice:3", compass_slice);
    map.insert("first-value-of:n", first_value_of);
    map.insert("-compass-list-size:n", super::sass::length);

    map.insert("nest:n", nest);
    map.insert("append-selector:2", append_selector);
    map.insert("headers:0", headers);
    map.insert("headers:1", headers);
    map.insert("headers:2", headers);
    map.insert("headings:0", headers);
    map.insert("headings:1", headers);
    map.insert("headings:2", headers);
    map.insert("enumerate:3", enumerate);
    map.insert("enumerate:4", enumerate);
    map.insert("range:1", range);
    map.insert("range:2", range);
    map.insert("elements-of-type:1", elements_of_type);

    map.insert("prefixed:n", prefixed);
    map.insert("prefix:n", prefix);
    map.insert("-moz:n", moz);
    map.insert("-svg:n", svg);
    map.insert("-css2:n", css2);
    map.insert("-pie:n", pie);
    map.insert("-webkit:n", webkit);
    map.insert("-owg:n", owg);
    map.insert("-ms:n", ms);
    map.insert("-o:n", o);
    map.insert("-khtml:n", khtml);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::assets::NoAssets;
    use crate::value::PrefixedValue;

    fn call(f: Builtin, positional: Vec<Value>) -> Value {
        let mut backend = NoAssets;
        let mut env = FuncEnv {
            backend: &mut backend,
        };
        let args = CallArgs {
            positional,
            named: Vec::new(),
            separator: Some(','),
        };
        f(&mut env, &args).unwrap()
    }

    #[test]
    fn nest_is_cartesian_and_sorted() {
        let v = call(
            nest,
            vec![Value::Str("a, b".into()), Value::Str("x, y".into())],
        );
        assert_eq!(v.to_css(), "a x, a y, b x, b y");
    }

    #[test]
    fn append_selector_pairs() {
        let v = call(
            append_selector,
            vec![Value::Str("a, b".into()), Value::Str(":hover".into())],
        );
        assert_eq!(v.to_css(), "a:hover, b:hover");
    }

    #[test]
    fn headers_ranges() {
        assert_eq!(call(headers, vec![]).to_css(), "h1, h2, h3, h4, h5, h6");
        assert_eq!(
            call(headers, vec![Value::Str("all".into())]).to_css(),
            "h1, h2, h3, h4, h5, h6"
        );
        assert_eq!(
            call(
                headers,
                vec![
                    Value::Number(Number::new(2.0)),
                    Value::Number(Number::new(4.0))
                ]
            )
            .to_css(),
            "h2, h3, h4"
        );
    }

    #[test]
    fn enumerate_and_range() {
        let v = call(
            enumerate,
            vec![
                Value::Str("col".into()),
                Value::Number(Number::new(1.0)),
                Value::Number(Number::new(3.0)),
            ],
        );
        assert_eq!(v.to_css(), "col-1, col-2, col-3");
        let v = call(range, vec![Value::Number(Number::new(3.0))]);
        assert_eq!(v.to_css(), "1, 2, 3");
    }

    #[test]
    fn compact_filters_falsy() {
        let v = call(
            compact,
            vec![
                Value::Str("a".into()),
                Value::Bool(false),
                Value::Str("b".into()),
            ],
        );
        assert_eq!(v.to_css(), "a, b");
    }

    #[test]
    fn prefix_machinery() {
        let gradient = Value::Prefixed(PrefixedValue {
            plain: "linear-gradient(top, red, blue)".to_string(),
            renders: vec![(
                "moz".to_string(),
                "-moz-linear-gradient(top, red, blue)".to_string(),
            )],
        });
        let v = call(
            prefixed,
            vec![Value::Str("-moz".into()), gradient.clone()],
        );
        assert_eq!(v, Value::Bool(true));
        let v = call(
            prefixed,
            vec![Value::Str("-webkit".into()), gradient.clone()],
        );
        assert_eq!(v, Value::Bool(false));
        let v = call(moz, vec![gradient]);
        assert_eq!(v.to_css(), "-moz-linear-gradient(top, red, blue)");
    }
}
