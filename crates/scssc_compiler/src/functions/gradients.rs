//! Gradient builders and their position/color-stop helpers.
//!
//! A gradient result renders plainly, but also carries the vendor-prefixed
//! alternates (`-moz-…`, the old `-webkit-gradient(…)` form, an inline SVG
//! data URL) that `prefixed()`/`prefix()` and the `-moz`/`-webkit`/… helper
//! functions consult.

use std::collections::HashMap;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use log::warn;
use scssc_shared::errors::ScssResult;

use super::{Builtin, CallArgs, FuncEnv};
use crate::value::{escape, List, Number, PrefixedValue, Value};

/// A resolved color stop: position (percentage or magnitude) and color.
type Stop = (Number, crate::value::Color);

fn flatten(values: &[Value]) -> Vec<Value> {
    if values.len() == 1 {
        if let Value::List(l) = &values[0] {
            return l.values();
        }
    }
    values.to_vec()
}

/// Is this argument a position/angle rather than a color stop?
fn is_stringish(value: &Value) -> bool {
    matches!(value, Value::Str(_) | Value::Quoted(_) | Value::Number(_))
}

/// Resolves an argument run into evenly-interpolated color stops, following
/// the original algorithm: missing positions spread linearly between their
/// neighbors, the first stop pins to zero, and magnitudes normalize against
/// the largest non-percentage stop.
fn resolve_stops(percentages: bool, args: &[Value]) -> Vec<Stop> {
    let mut colors = Vec::new();
    let mut stops: Vec<Option<Number>> = Vec::new();
    let mut prev_color = false;

    let mut walk = |v: &Value, colors: &mut Vec<crate::value::Color>, stops: &mut Vec<Option<Number>>| {
        if let Some(color) = v.to_color() {
            if prev_color {
                stops.push(None);
            }
            colors.push(color);
            prev_color = true;
        } else if let Value::Number(n) = v {
            stops.push(Some(n.clone()));
            prev_color = false;
        }
    };
    for v in args {
        if let Value::List(l) = v {
            for item in l.values() {
                walk(&item, &mut colors, &mut stops);
            }
        } else {
            walk(v, &mut colors, &mut stops);
        }
    }
    if prev_color {
        stops.push(None);
    }
    if colors.is_empty() {
        return Vec::new();
    }
    stops.truncate(colors.len());
    while stops.len() < colors.len() {
        stops.push(None);
    }

    let max_stops = stops
        .iter()
        .filter_map(|s| s.as_ref().and_then(|n| (n.unit() != "%").then_some(n.value)))
        .fold(None::<f64>, |acc, v| Some(acc.map_or(v, |a| a.max(v))));

    let mut fractions: Vec<Option<f64>> = stops
        .iter()
        .map(|s| {
            s.as_ref().map(|n| {
                if n.unit() == "%" {
                    n.value
                } else {
                    n.value / max_stops.unwrap_or(1.0)
                }
            })
        })
        .collect();
    fractions[0] = Some(0.0);

    // spread unspecified stops evenly towards the next known one
    let len = fractions.len();
    let mut init = 0.0;
    let mut start: Option<usize> = None;
    let mut end = 0;
    for i in 0..=len {
        let s = if i < len { fractions[i] } else { Some(1.0) };
        match s {
            None => {
                if start.is_none() {
                    start = Some(i);
                }
                end = i;
            }
            Some(fin) => {
                if let Some(st) = start.take() {
                    let extra = usize::from(i < len);
                    let stride = (fin - init) / (end - st + 1 + extra) as f64;
                    for (k, frac) in fractions[st..=end].iter_mut().enumerate() {
                        *frac = Some(init + stride * (k + 1) as f64);
                    }
                }
                init = fin;
            }
        }
    }

    fractions
        .into_iter()
        .zip(colors)
        .map(|(f, c)| {
            let f = f.unwrap_or(0.0);
            let stop = if max_stops.is_none() || percentages {
                Number::with_unit(f, "%")
            } else {
                Number::new(f * max_stops.unwrap_or(1.0))
            };
            (stop, c)
        })
        .collect()
}

/// Maps position keywords onto their axis words, optionally mirrored.
fn position_words(opposite: bool, args: &[Value]) -> String {
    let mut words = Vec::new();
    for v in args {
        for w in v.content().split_whitespace() {
            words.push(w.to_string());
        }
    }
    let has = |w: &str| words.iter().any(|x| x == w);
    let hrz = if has("left") {
        if opposite { "right" } else { "left" }
    } else if has("right") {
        if opposite { "left" } else { "right" }
    } else {
        "center"
    };
    let vrt = if has("top") {
        if opposite { "bottom" } else { "top" }
    } else if has("bottom") {
        if opposite { "top" } else { "bottom" }
    } else {
        "center"
    };
    if hrz == vrt {
        hrz.to_string()
    } else {
        format!("{hrz} {vrt}")
    }
}

pub fn opposite_position(_: &mut FuncEnv<'_>, args: &CallArgs) -> ScssResult<Value> {
    Ok(Value::Str(position_words(true, &args.positional)))
}

/// Position keywords as percentage coordinates.
fn grad_point_of(args: &[Value]) -> List {
    let mut words = Vec::new();
    for v in args {
        for w in v.content().split_whitespace() {
            words.push(w.to_string());
        }
    }
    let has = |w: &str| words.iter().any(|x| x == w);
    let hrz = if has("left") {
        Number::with_unit(0.0, "%")
    } else if has("right") {
        Number::with_unit(1.0, "%")
    } else {
        Number::with_unit(0.5, "%")
    };
    let vrt = if has("top") {
        Number::with_unit(0.0, "%")
    } else if has("bottom") {
        Number::with_unit(1.0, "%")
    } else {
        Number::with_unit(0.5, "%")
    };
    List::from_items(vec![Value::Number(hrz), Value::Number(vrt)], None)
}

pub fn grad_point(_: &mut FuncEnv<'_>, args: &CallArgs) -> ScssResult<Value> {
    Ok(Value::List(grad_point_of(&args.positional)))
}

fn end_position(stops: &[Stop]) -> Number {
    stops
        .last()
        .map_or_else(|| Number::new(100.0), |(n, _)| n.clone())
}

pub fn grad_end_position(_: &mut FuncEnv<'_>, args: &CallArgs) -> ScssResult<Value> {
    let stops = resolve_stops(false, &flatten(&args.positional));
    Ok(Value::Number(end_position(&stops)))
}

fn render_stops(stops: &[Stop]) -> String {
    stops
        .iter()
        .map(|(s, c)| format!("{} {}", c.render(), Value::Number(s.clone()).to_css()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn render_color_stop_calls(stops: &[Stop]) -> String {
    stops
        .iter()
        .map(|(s, c)| format!("color-stop({}, {})", Value::Number(s.clone()).to_css(), c.render()))
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn color_stops(_: &mut FuncEnv<'_>, args: &CallArgs) -> ScssResult<Value> {
    let stops = resolve_stops(false, &flatten(&args.positional));
    Ok(Value::Str(render_stops(&stops)))
}

pub fn color_stops_in_percentages(_: &mut FuncEnv<'_>, args: &CallArgs) -> ScssResult<Value> {
    let stops = resolve_stops(true, &flatten(&args.positional));
    Ok(Value::Str(render_stops(&stops)))
}

pub fn grad_color_stops(_: &mut FuncEnv<'_>, args: &CallArgs) -> ScssResult<Value> {
    let stops = resolve_stops(true, &flatten(&args.positional));
    Ok(Value::Str(render_color_stop_calls(&stops)))
}

pub fn linear_gradient(_: &mut FuncEnv<'_>, args: &CallArgs) -> ScssResult<Value> {
    let values = flatten(&args.positional);
    let (pos, stop_args) = match values.split_first() {
        Some((first, rest)) if is_stringish(first) => (Some(first.clone()), rest.to_vec()),
        _ => (None, values.clone()),
    };
    let stops = resolve_stops(false, &stop_args);

    let mut parts = Vec::new();
    if let Some(p) = &pos {
        parts.push(position_words(false, std::slice::from_ref(p)));
    }
    parts.push(render_stops(&stops));
    let plain = format!("linear-gradient({})", parts.join(", "));

    let owg = {
        let from = pos.clone().unwrap_or_else(|| Value::Str("center top".to_string()));
        format!(
            "-webkit-gradient(linear, {}, {}, {})",
            position_words(false, std::slice::from_ref(&from)),
            position_words(true, std::slice::from_ref(&from)),
            render_color_stop_calls(&stops)
        )
    };
    let svg = {
        let start = pos.clone().unwrap_or_else(|| Value::Str("top".to_string()));
        let p1 = grad_point_of(std::slice::from_ref(&start));
        let opposite = Value::Str(position_words(true, std::slice::from_ref(&start)));
        let p2 = grad_point_of(std::slice::from_ref(&opposite));
        linear_svg_url(&stops, &p1, &p2)
    };

    Ok(Value::Prefixed(PrefixedValue {
        renders: vec![
            ("moz".to_string(), format!("-moz-{plain}")),
            ("pie".to_string(), format!("-pie-{plain}")),
            ("ms".to_string(), format!("-ms-{plain}")),
            ("o".to_string(), format!("-o-{plain}")),
            ("css2".to_string(), String::new()),
            ("webkit".to_string(), format!("-webkit-{plain}")),
            ("owg".to_string(), owg),
            ("svg".to_string(), svg),
        ],
        plain,
    }))
}

pub fn radial_gradient(_: &mut FuncEnv<'_>, args: &CallArgs) -> ScssResult<Value> {
    let values = flatten(&args.positional);
    let mut pos: Option<Value> = None;
    let mut shape: Option<Value> = None;
    let mut rest: &[Value] = &values;
    if let Some((first, tail)) = values.split_first() {
        if is_stringish(first) {
            pos = Some(first.clone());
            rest = tail;
            if let Some((second, tail2)) = tail.split_first() {
                if is_stringish(second) {
                    shape = Some(second.clone());
                    rest = tail2;
                }
            }
        }
    }
    let stops = resolve_stops(false, rest);

    let mut parts = Vec::new();
    if let Some(p) = &pos {
        parts.push(p.content());
    }
    if let Some(s) = &shape {
        parts.push(s.content());
    }
    parts.push(render_stops(&stops));
    let plain = format!("radial-gradient({})", parts.join(", "));

    let owg = {
        let point = pos.as_ref().map_or_else(
            || "center".to_string(),
            |p| Value::List(grad_point_of(std::slice::from_ref(p))).to_css(),
        );
        format!(
            "-webkit-gradient(radial, {point}, 0, {point}, {}, {})",
            Value::Number(end_position(&stops)).to_css(),
            render_color_stop_calls(&stops)
        )
    };
    let svg = {
        let center = grad_point_of(
            &pos.clone().map_or_else(Vec::new, |p| vec![p]),
        );
        radial_svg_url(&stops, &center)
    };

    Ok(Value::Prefixed(PrefixedValue {
        renders: vec![
            ("moz".to_string(), format!("-moz-{plain}")),
            ("pie".to_string(), {
                warn!("PIE does not support radial-gradient.");
                "-pie-radial-gradient(unsupported)".to_string()
            }),
            ("css2".to_string(), String::new()),
            ("webkit".to_string(), format!("-webkit-{plain}")),
            ("owg".to_string(), owg),
            ("svg".to_string(), svg),
        ],
        plain,
    }))
}

fn svg_stops(stops: &[Stop]) -> String {
    stops
        .iter()
        .map(|(s, c)| {
            format!(
                "<stop offset=\"{}\" stop-color=\"{}\"/>",
                Value::Number(s.clone()).to_css(),
                c.render()
            )
        })
        .collect()
}

fn svg_template(gradient: &str) -> String {
    format!(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\
         <svg version=\"1.1\" xmlns=\"http://www.w3.org/2000/svg\">\
         <defs>{gradient}</defs>\
         <rect x=\"0\" y=\"0\" width=\"100%\" height=\"100%\" fill=\"url(#grad)\" />\
         </svg>"
    )
}

fn data_url(svg: &str) -> String {
    let url = format!("data:image/svg+xml;base64,{}", BASE64.encode(svg.as_bytes()));
    format!("url(\"{}\")", escape(&url))
}

fn point_coords(point: &List) -> (String, String) {
    let values = point.values();
    let coord = |v: Option<&Value>| v.map_or_else(|| "50%".to_string(), Value::to_css);
    (coord(values.first()), coord(values.get(1)))
}

fn linear_svg_url(stops: &[Stop], p1: &List, p2: &List) -> String {
    let (x1, y1) = point_coords(p1);
    let (x2, y2) = point_coords(p2);
    let gradient = format!(
        "<linearGradient id=\"grad\" x1=\"{x1}\" y1=\"{y1}\" x2=\"{x2}\" y2=\"{y2}\">{}</linearGradient>",
        svg_stops(stops)
    );
    data_url(&svg_template(&gradient))
}

fn radial_svg_url(stops: &[Stop], center: &List) -> String {
    let (cx, cy) = point_coords(center);
    let r = Value::Number(end_position(stops)).to_css();
    let gradient = format!(
        "<radialGradient id=\"grad\" gradientUnits=\"userSpaceOnUse\" cx=\"{cx}\" cy=\"{cy}\" r=\"{r}\">{}</radialGradient>",
        svg_stops(stops)
    );
    data_url(&svg_template(&gradient))
}

pub fn linear_svg_gradient(_: &mut FuncEnv<'_>, args: &CallArgs) -> ScssResult<Value> {
    let values = flatten(&args.positional);
    let (start, stop_args) = match values.split_last() {
        Some((last, rest)) if is_stringish(last) => (Some(last.clone()), rest.to_vec()),
        _ => (None, values.clone()),
    };
    let stops = resolve_stops(false, &stop_args);
    let start = start.unwrap_or_else(|| Value::Str("top".to_string()));
    let p1 = grad_point_of(std::slice::from_ref(&start));
    let opposite = Value::Str(position_words(true, std::slice::from_ref(&start)));
    let p2 = grad_point_of(std::slice::from_ref(&opposite));
    Ok(Value::Str(linear_svg_url(&stops, &p1, &p2)))
}

pub fn radial_svg_gradient(_: &mut FuncEnv<'_>, args: &CallArgs) -> ScssResult<Value> {
    let values = flatten(&args.positional);
    let (center, stop_args) = match values.split_last() {
        Some((last, rest)) if is_stringish(last) => (Some(last.clone()), rest.to_vec()),
        _ => (None, values.clone()),
    };
    let stops = resolve_stops(false, &stop_args);
    let center = grad_point_of(&center.map_or_else(Vec::new, |c| vec![c]));
    Ok(Value::Str(radial_svg_url(&stops, &center)))
}

pub(super) fn register(map: &mut HashMap<&'static str, Builtin>) {
    map.insert("opposite-position:n", opposite_position);
    map.insert("grad-point:n", grad_point);
    map.insert("grad-end-position:n", grad_end_position);
    map.insert("color-stops:n", color_stops);
    map.insert("color-stops-in-percentages:n", color_stops_in_percentages);
    map.insert("grad-color-stops:n", grad_color_stops);
    map.insert("linear-gradient:n", linear_gradient);
    map.insert("radial-gradient:n", radial_gradient);
    map.insert("linear-svg-gradient:n", linear_svg_gradient);
    map.insert("radial-svg-gradient:n", radial_svg_gradient);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::assets::NoAssets;
    use crate::value::Color;

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

    fn color(hex: &str) -> Value {
        Value::Color(Color::from_hex(hex).unwrap())
    }

    #[test]
    fn stops_spread_evenly() {
        let v = call(color_stops, vec![color("#f00"), color("#0f0"), color("#00f")]);
        assert_eq!(v.to_css(), "red 0%, lime 50%, blue 100%");
    }

    #[test]
    fn linear_gradient_renders_plain_and_prefixed() {
        let v = call(
            linear_gradient,
            vec![Value::Str("top".into()), color("#f00"), color("#00f")],
        );
        assert_eq!(
            v.to_css(),
            "linear-gradient(center top, red 0%, blue 100%)"
        );
        match v {
            Value::Prefixed(p) => {
                assert_eq!(
                    p.render_for("moz"),
                    Some("-moz-linear-gradient(center top, red 0%, blue 100%)")
                );
                assert!(p.render_for("owg").unwrap().starts_with("-webkit-gradient(linear"));
                assert!(p.render_for("svg").unwrap().starts_with("url(\"data:image/svg+xml;base64,"));
                assert_eq!(p.render_for("css2"), Some(""));
            }
            other => panic!("expected prefixed value, got {other:?}"),
        }
    }

    #[test]
    fn radial_gradient_warns_off_pie() {
        let v = call(radial_gradient, vec![color("#f00"), color("#00f")]);
        match v {
            Value::Prefixed(p) => {
                assert_eq!(
                    p.render_for("pie"),
                    Some("-pie-radial-gradient(unsupported)")
                );
                assert!(p.plain.starts_with("radial-gradient("));
            }
            other => panic!("expected prefixed value, got {other:?}"),
        }
    }

    #[test]
    fn explicit_magnitude_stops() {
        let v = call(
            color_stops,
            vec![
                color("#f00"),
                Value::Number(Number::new(20.0)),
                color("#00f"),
                Value::Number(Number::new(40.0)),
            ],
        );
        assert_eq!(v.to_css(), "red 0, blue 40");
    }
}
