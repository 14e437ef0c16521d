//! The Sass core function library: colors, numbers, strings, lists and
//! introspection. Every function takes already-evaluated values and returns
//! a value; arity registration happens in the parent module.

use std::collections::HashMap;

use scssc_shared::errors::ScssResult;

use super::{Builtin, CallArgs, FuncEnv};
use crate::value::{Color, ColorForm, Number, Units, Value};
use crate::units;

type HslOp = fn(f64, f64) -> f64;

fn color_arg(args: &CallArgs, i: usize, name: &str) -> Color {
    args.get(i, name)
        .and_then(Value::to_color)
        .unwrap_or_else(|| Color::new(0.0, 0.0, 0.0, 1.0, ColorForm::Hex))
}

fn number_arg(args: &CallArgs, i: usize, name: &str) -> Number {
    args.get(i, name).map(Value::to_number).unwrap_or_else(|| Number::new(0.0))
}

/// One `rgb()`/`rgba()` channel: percentages and fractions scale to 255.
fn rgb_channel(n: &Number) -> f64 {
    if n.unit() == "%" || (n.value > 0.0 && n.value <= 1.0) {
        n.value * 255.0
    } else {
        n.value.clamp(0.0, 255.0)
    }
}

fn build_rgba(args: &CallArgs, alpha: Option<f64>, form: ColorForm) -> Value {
    let r = rgb_channel(&number_arg(args, 0, "red"));
    let g = rgb_channel(&number_arg(args, 1, "green"));
    let b = rgb_channel(&number_arg(args, 2, "blue"));
    let a = alpha.unwrap_or_else(|| number_arg(args, 3, "alpha").value);
    Value::Color(Color::new(r, g, b, a, form))
}

pub fn rgb(_: &mut FuncEnv<'_>, args: &CallArgs) -> ScssResult<Value> {
    Ok(build_rgba(args, Some(1.0), ColorForm::Rgb))
}

pub fn rgba(_: &mut FuncEnv<'_>, args: &CallArgs) -> ScssResult<Value> {
    Ok(build_rgba(args, None, ColorForm::Rgba))
}

/// Re-tags an existing color, optionally overriding its alpha.
fn color_type(args: &CallArgs, form: ColorForm) -> Value {
    let color = color_arg(args, 0, "color");
    let alpha = args
        .get(1, "alpha")
        .map(|v| v.to_number().value)
        .unwrap_or_else(|| color.alpha());
    Value::Color(color.with_alpha(alpha, form))
}

pub fn rgb1(_: &mut FuncEnv<'_>, args: &CallArgs) -> ScssResult<Value> {
    Ok(color_type(args, ColorForm::Rgb))
}

pub fn rgba2(_: &mut FuncEnv<'_>, args: &CallArgs) -> ScssResult<Value> {
    Ok(color_type(args, ColorForm::Rgba))
}

pub fn hsl1(_: &mut FuncEnv<'_>, args: &CallArgs) -> ScssResult<Value> {
    Ok(color_type(args, ColorForm::Hsl))
}

pub fn hsla2(_: &mut FuncEnv<'_>, args: &CallArgs) -> ScssResult<Value> {
    Ok(color_type(args, ColorForm::Hsla))
}

pub fn red(_: &mut FuncEnv<'_>, args: &CallArgs) -> ScssResult<Value> {
    Ok(Value::Number(Number::new(color_arg(args, 0, "color").channels[0])))
}

pub fn green(_: &mut FuncEnv<'_>, args: &CallArgs) -> ScssResult<Value> {
    Ok(Value::Number(Number::new(color_arg(args, 0, "color").channels[1])))
}

pub fn blue(_: &mut FuncEnv<'_>, args: &CallArgs) -> ScssResult<Value> {
    Ok(Value::Number(Number::new(color_arg(args, 0, "color").channels[2])))
}

pub fn alpha(_: &mut FuncEnv<'_>, args: &CallArgs) -> ScssResult<Value> {
    Ok(Value::Number(Number::new(color_arg(args, 0, "color").channels[3])))
}

pub fn mix(_: &mut FuncEnv<'_>, args: &CallArgs) -> ScssResult<Value> {
    let c1 = color_arg(args, 0, "color1");
    let c2 = color_arg(args, 1, "color2");
    let p = args
        .get(2, "weight")
        .map(|v| v.to_number().value)
        .unwrap_or(0.5)
        .clamp(0.0, 1.0);

    let w = p * 2.0 - 1.0;
    let a = c1.channels[3] - c2.channels[3];
    let combined = if (w * a + 1.0).abs() < f64::EPSILON {
        w
    } else {
        (w + a) / (1.0 + w * a)
    };
    let w1 = (combined + 1.0) / 2.0;
    let w2 = 1.0 - w1;

    let q = [w1, w1, w1, p];
    let r = [w2, w2, w2, 1.0 - p];
    let mut channels = [0.0; 4];
    for i in 0..4 {
        channels[i] = c1.channels[i] * q[i] + c2.channels[i] * r[i];
    }
    Ok(Value::Color(Color::new(
        channels[0], channels[1], channels[2], channels[3], c1.form,
    )))
}

fn hsl_fraction(n: &Number) -> f64 {
    if n.unit() == "%" || (n.value > 0.0 && n.value <= 1.0) {
        n.value
    } else {
        n.value / 100.0
    }
}

fn build_hsla(args: &CallArgs, alpha: Option<f64>, form: ColorForm) -> Value {
    let h = number_arg(args, 0, "hue");
    let h = if h.unit() == "%" && h.value > 0.0 && h.value <= 1.0 {
        h.value
    } else {
        h.value.rem_euclid(360.0) / 360.0
    };
    let s = hsl_fraction(&number_arg(args, 1, "saturation")).clamp(0.0, 1.0);
    let l = hsl_fraction(&number_arg(args, 2, "lightness")).clamp(0.0, 1.0);
    let a = alpha
        .unwrap_or_else(|| hsl_fraction(&number_arg(args, 3, "alpha")))
        .clamp(0.0, 1.0);
    Value::Color(Color::from_hls(h, l, s, a, form))
}

pub fn hsl(_: &mut FuncEnv<'_>, args: &CallArgs) -> ScssResult<Value> {
    Ok(build_hsla(args, Some(1.0), ColorForm::Hsl))
}

pub fn hsla(_: &mut FuncEnv<'_>, args: &CallArgs) -> ScssResult<Value> {
    Ok(build_hsla(args, None, ColorForm::Hsla))
}

pub fn hue(_: &mut FuncEnv<'_>, args: &CallArgs) -> ScssResult<Value> {
    let (h, _, _) = color_arg(args, 0, "color").to_hls();
    Ok(Value::Number(Number::with_unit(h * 360.0, "deg")))
}

pub fn saturation(_: &mut FuncEnv<'_>, args: &CallArgs) -> ScssResult<Value> {
    let (_, _, s) = color_arg(args, 0, "color").to_hls();
    Ok(Value::Number(Number::with_unit(s, "%")))
}

pub fn lightness(_: &mut FuncEnv<'_>, args: &CallArgs) -> ScssResult<Value> {
    let (_, l, _) = color_arg(args, 0, "color").to_hls();
    Ok(Value::Number(Number::with_unit(l, "%")))
}

/// The shared HSL adjustment: convert to HLS, apply `op` (or replace) per
/// coordinate, clamp, convert back with the singular-point guard.
fn hsl_op(
    op: Option<HslOp>,
    color: &Color,
    h: Option<f64>,
    s: Option<f64>,
    l: Option<f64>,
) -> Value {
    let (h0, l0, s0) = color.to_hls();
    let mut c = [h0, s0, l0];
    let adjust = [h.map(|v| v / 360.0), s, l];
    for i in 0..3 {
        c[i] = match (op, adjust[i]) {
            (Some(op), Some(a)) => op(c[i], a),
            (None, Some(a)) => a,
            _ => c[i],
        };
    }
    c[0] = (c[0] * 360.0).rem_euclid(360.0).clamp(0.0, 360.0);
    c[1] = c[1].clamp(0.0, 1.0);
    c[2] = c[2].clamp(0.0, 1.0);
    Value::Color(Color::from_hls(
        c[0] / 360.0,
        c[2],
        c[1],
        color.channels[3],
        color.form,
    ))
}

/// Scales a saturation/lightness amount: plain numbers of 1 or more read as
/// percentages.
fn amount_fraction(v: &Value) -> f64 {
    let n = v.to_number();
    if n.unit() != "%" && n.value.abs() >= 1.0 {
        n.value / 100.0
    } else {
        n.value
    }
}

fn degrees(v: &Value) -> f64 {
    v.to_number().value
}

pub fn adjust_hue(_: &mut FuncEnv<'_>, args: &CallArgs) -> ScssResult<Value> {
    let color = color_arg(args, 0, "color");
    let deg = args.get(1, "degrees").map(degrees).unwrap_or(0.0);
    Ok(hsl_op(Some(|a, b| a + b), &color, Some(deg), Some(0.0), Some(0.0)))
}

pub fn lighten(_: &mut FuncEnv<'_>, args: &CallArgs) -> ScssResult<Value> {
    let color = color_arg(args, 0, "color");
    let amount = args.get(1, "amount").map(amount_fraction).unwrap_or(0.0);
    Ok(hsl_op(Some(|a, b| a + b), &color, Some(0.0), Some(0.0), Some(amount)))
}

pub fn darken(_: &mut FuncEnv<'_>, args: &CallArgs) -> ScssResult<Value> {
    let color = color_arg(args, 0, "color");
    let amount = args.get(1, "amount").map(amount_fraction).unwrap_or(0.0);
    Ok(hsl_op(Some(|a, b| a - b), &color, Some(0.0), Some(0.0), Some(amount)))
}

pub fn saturate(_: &mut FuncEnv<'_>, args: &CallArgs) -> ScssResult<Value> {
    let color = color_arg(args, 0, "color");
    let amount = args.get(1, "amount").map(amount_fraction).unwrap_or(0.0);
    Ok(hsl_op(Some(|a, b| a + b), &color, Some(0.0), Some(amount), Some(0.0)))
}

pub fn desaturate(_: &mut FuncEnv<'_>, args: &CallArgs) -> ScssResult<Value> {
    let color = color_arg(args, 0, "color");
    let amount = args.get(1, "amount").map(amount_fraction).unwrap_or(0.0);
    Ok(hsl_op(Some(|a, b| a - b), &color, Some(0.0), Some(amount), Some(0.0)))
}

pub fn grayscale(_: &mut FuncEnv<'_>, args: &CallArgs) -> ScssResult<Value> {
    let color = color_arg(args, 0, "color");
    Ok(hsl_op(Some(|a, b| a - b), &color, Some(0.0), Some(1.0), Some(0.0)))
}

pub fn complement(_: &mut FuncEnv<'_>, args: &CallArgs) -> ScssResult<Value> {
    let color = color_arg(args, 0, "color");
    Ok(hsl_op(Some(|a, b| a + b), &color, Some(180.0), Some(0.0), Some(0.0)))
}

pub fn invert(_: &mut FuncEnv<'_>, args: &CallArgs) -> ScssResult<Value> {
    let c = color_arg(args, 0, "color");
    Ok(Value::Color(Color::new(
        255.0 - c.channels[0],
        255.0 - c.channels[1],
        255.0 - c.channels[2],
        c.channels[3],
        c.form,
    )))
}

/// The shared RGBA adjustment, mirroring [`hsl_op`] on raw channels.
fn rgba_op(
    op: Option<HslOp>,
    color: &Color,
    adjust: [Option<f64>; 4],
) -> Value {
    let mut c = color.channels;
    for i in 0..4 {
        c[i] = match (op, adjust[i]) {
            (Some(op), Some(a)) => op(c[i], a),
            (None, Some(a)) => a,
            _ => c[i],
        };
    }
    Value::Color(Color::new(c[0], c[1], c[2], c[3], color.form))
}

pub fn opacify(_: &mut FuncEnv<'_>, args: &CallArgs) -> ScssResult<Value> {
    let color = color_arg(args, 0, "color");
    let amount = args.get(1, "amount").map(|v| v.to_number().value).unwrap_or(0.0);
    Ok(rgba_op(Some(|a, b| a + b), &color, [Some(0.0), Some(0.0), Some(0.0), Some(amount)]))
}

pub fn transparentize(_: &mut FuncEnv<'_>, args: &CallArgs) -> ScssResult<Value> {
    let color = color_arg(args, 0, "color");
    let amount = args.get(1, "amount").map(|v| v.to_number().value).unwrap_or(0.0);
    Ok(rgba_op(Some(|a, b| a - b), &color, [Some(0.0), Some(0.0), Some(0.0), Some(amount)]))
}

/// `adjust-color` / `scale-color` / `change-color` share one shape: an HSL
/// pass when saturation/lightness are given, then an RGBA pass.
fn asc_color(op: Option<HslOp>, args: &CallArgs) -> Value {
    let mut color = color_arg(args, 0, "color");
    let saturation = args.get(1, "saturation").map(amount_fraction);
    let lightness = args.get(2, "lightness").map(amount_fraction);
    let red = args.get(3, "red").map(|v| v.to_number().value);
    let green = args.get(4, "green").map(|v| v.to_number().value);
    let blue = args.get(5, "blue").map(|v| v.to_number().value);
    let alpha = args.get(6, "alpha").map(|v| v.to_number().value);

    if saturation.is_some() || lightness.is_some() {
        if let Value::Color(c) = hsl_op(op, &color, Some(0.0), saturation, lightness) {
            color = c;
        }
    }
    if red.is_some() || green.is_some() || blue.is_some() || alpha.is_some() {
        return rgba_op(op, &color, [red, green, blue, alpha]);
    }
    Value::Color(color)
}

pub fn adjust_color(_: &mut FuncEnv<'_>, args: &CallArgs) -> ScssResult<Value> {
    Ok(asc_color(Some(|a, b| a + b), args))
}

pub fn scale_color(_: &mut FuncEnv<'_>, args: &CallArgs) -> ScssResult<Value> {
    Ok(asc_color(Some(|a, b| a * b), args))
}

pub fn change_color(_: &mut FuncEnv<'_>, args: &CallArgs) -> ScssResult<Value> {
    Ok(asc_color(None, args))
}

pub fn adjust_lightness(_: &mut FuncEnv<'_>, args: &CallArgs) -> ScssResult<Value> {
    let color = color_arg(args, 0, "color");
    let amount = args.get(1, "amount").map(amount_fraction).unwrap_or(0.0);
    Ok(hsl_op(Some(|a, b| a + b), &color, Some(0.0), Some(0.0), Some(amount)))
}

pub fn adjust_saturation(_: &mut FuncEnv<'_>, args: &CallArgs) -> ScssResult<Value> {
    let color = color_arg(args, 0, "color");
    let amount = args.get(1, "amount").map(amount_fraction).unwrap_or(0.0);
    Ok(hsl_op(Some(|a, b| a + b), &color, Some(0.0), Some(amount), Some(0.0)))
}

pub fn scale_lightness(_: &mut FuncEnv<'_>, args: &CallArgs) -> ScssResult<Value> {
    let color = color_arg(args, 0, "color");
    let amount = args.get(1, "amount").map(amount_fraction).unwrap_or(1.0);
    Ok(hsl_op(Some(|a, b| a * b), &color, Some(0.0), Some(0.0), Some(amount)))
}

pub fn scale_saturation(_: &mut FuncEnv<'_>, args: &CallArgs) -> ScssResult<Value> {
    let color = color_arg(args, 0, "color");
    let amount = args.get(1, "amount").map(amount_fraction).unwrap_or(1.0);
    Ok(hsl_op(Some(|a, b| a * b), &color, Some(0.0), Some(amount), Some(0.0)))
}

pub fn ie_hex_str(_: &mut FuncEnv<'_>, args: &CallArgs) -> ScssResult<Value> {
    let c = color_arg(args, 0, "color");
    Ok(Value::Str(format!(
        "#{:02X}{:02X}{:02X}{:02X}",
        (c.channels[3] * 255.0).round() as u8,
        c.channels[0].round() as u8,
        c.channels[1].round() as u8,
        c.channels[2].round() as u8
    )))
}

// Number functions

pub fn percentage(_: &mut FuncEnv<'_>, args: &CallArgs) -> ScssResult<Value> {
    let n = number_arg(args, 0, "value");
    Ok(Value::Number(Number {
        value: n.value,
        units: Units::single("%"),
    }))
}

fn map_number(args: &CallArgs, f: fn(f64) -> f64) -> Value {
    let n = number_arg(args, 0, "value");
    Value::Number(Number {
        value: f(n.value),
        units: n.units,
    })
}

pub fn round(_: &mut FuncEnv<'_>, args: &CallArgs) -> ScssResult<Value> {
    Ok(map_number(args, f64::round))
}

pub fn ceil(_: &mut FuncEnv<'_>, args: &CallArgs) -> ScssResult<Value> {
    Ok(map_number(args, f64::ceil))
}

pub fn floor(_: &mut FuncEnv<'_>, args: &CallArgs) -> ScssResult<Value> {
    Ok(map_number(args, f64::floor))
}

pub fn abs(_: &mut FuncEnv<'_>, args: &CallArgs) -> ScssResult<Value> {
    Ok(map_number(args, f64::abs))
}

pub fn sin(_: &mut FuncEnv<'_>, args: &CallArgs) -> ScssResult<Value> {
    Ok(map_number(args, f64::sin))
}

pub fn cos(_: &mut FuncEnv<'_>, args: &CallArgs) -> ScssResult<Value> {
    Ok(map_number(args, f64::cos))
}

pub fn tan(_: &mut FuncEnv<'_>, args: &CallArgs) -> ScssResult<Value> {
    Ok(map_number(args, f64::tan))
}

pub fn pi(_: &mut FuncEnv<'_>, _: &CallArgs) -> ScssResult<Value> {
    Ok(Value::Number(Number::new(std::f64::consts::PI)))
}

/// The per-unit 2-arity converters the postfix-units production dispatches
/// through (`3 px`, `(1 + 2) em`, …).
pub fn convert_to(_: &mut FuncEnv<'_>, args: &CallArgs) -> ScssResult<Value> {
    let unit = args.get(1, "unit").map(Value::content).unwrap_or_default();
    match args.pos(0) {
        Some(Value::Number(n)) => Ok(Value::Number(convert_number(n, &unit))),
        Some(other) => Ok(Value::Str(format!("{} {unit}", other.to_css()))),
        None => Ok(Value::Null),
    }
}

/// Unit application: within a class the magnitude converts; `%` scales a
/// bare number down; anything else just tags.
#[must_use]
pub fn convert_number(n: &Number, unit: &str) -> Number {
    if unit == "%" && n.unit() != "%" {
        return Number {
            value: n.value / 100.0,
            units: Units::single("%"),
        };
    }
    n.convert_to(unit)
}

// String functions

pub fn unquote(_: &mut FuncEnv<'_>, args: &CallArgs) -> ScssResult<Value> {
    let joined = args
        .all()
        .iter()
        .map(Value::content)
        .collect::<Vec<_>>()
        .join(" ");
    Ok(Value::Str(joined))
}

pub fn quote(_: &mut FuncEnv<'_>, args: &CallArgs) -> ScssResult<Value> {
    let joined = args
        .all()
        .iter()
        .map(Value::content)
        .collect::<Vec<_>>()
        .join(" ");
    Ok(Value::Quoted(joined))
}

// List functions

pub fn length(_: &mut FuncEnv<'_>, args: &CallArgs) -> ScssResult<Value> {
    let count = if args.positional.len() == 1 {
        match args.pos(0) {
            Some(Value::List(l)) => l.len(),
            _ => 1,
        }
    } else {
        args.all().len()
    };
    Ok(Value::Number(Number::new(count as f64)))
}

pub fn nth(_: &mut FuncEnv<'_>, args: &CallArgs) -> ScssResult<Value> {
    let lst = args.pos(0).map(Value::to_list).unwrap_or_default();
    let values = lst.values();
    if values.is_empty() {
        return Ok(Value::Str(String::new()));
    }
    let n = args
        .get(1, "n")
        .map(Value::content)
        .unwrap_or_else(|| "1".to_string());
    let index = if let Ok(num) = n.trim().parse::<f64>() {
        // 1-based with modulo wraparound; negatives wrap too
        (num as i64 - 1).rem_euclid(values.len() as i64) as usize
    } else {
        match n.to_ascii_lowercase().as_str() {
            "first" => 0,
            "last" => values.len() - 1,
            _ => return Ok(Value::Str(String::new())),
        }
    };
    Ok(values[index].clone())
}

fn separator_char(value: &Value) -> Option<char> {
    match value.content().as_str() {
        "comma" | "," => Some(','),
        "space" | " " | "" => None,
        other => other.chars().next(),
    }
}

pub fn join(_: &mut FuncEnv<'_>, args: &CallArgs) -> ScssResult<Value> {
    let mut out = args.pos(0).map(Value::to_list).unwrap_or_default();
    let other = args.pos(1).map(Value::to_list).unwrap_or_default();
    out.items.extend(other.items);
    out.named.extend(other.named);
    if let Some(sep) = args.get(2, "separator") {
        out.separator = separator_char(sep);
    }
    Ok(Value::List(out))
}

pub fn append(_: &mut FuncEnv<'_>, args: &CallArgs) -> ScssResult<Value> {
    let mut out = args.pos(0).map(Value::to_list).unwrap_or_default();
    if let Some(sep) = args.get(2, "separator") {
        out.separator = separator_char(sep);
    }
    let val = args.pos(1).map(Value::to_list).unwrap_or_default();
    out.items.extend(val.values());
    Ok(Value::List(out))
}

fn fold_extremum(args: &CallArgs, want_greater: bool) -> Value {
    let values = if args.positional.len() == 1 {
        args.pos(0).map(Value::to_list).unwrap_or_default().values()
    } else {
        args.all()
    };
    let mut best: Option<Value> = None;
    for v in values {
        best = match best {
            None => Some(v),
            Some(b) => {
                let take = match v.loose_cmp(&b) {
                    Some(std::cmp::Ordering::Greater) => want_greater,
                    Some(std::cmp::Ordering::Less) => !want_greater,
                    _ => false,
                };
                Some(if take { v } else { b })
            }
        };
    }
    best.unwrap_or(Value::Null)
}

pub fn max(_: &mut FuncEnv<'_>, args: &CallArgs) -> ScssResult<Value> {
    Ok(fold_extremum(args, true))
}

pub fn min(_: &mut FuncEnv<'_>, args: &CallArgs) -> ScssResult<Value> {
    Ok(fold_extremum(args, false))
}

// Introspection

pub fn type_of(_: &mut FuncEnv<'_>, args: &CallArgs) -> ScssResult<Value> {
    let name = args.pos(0).map_or("string", Value::type_name);
    Ok(Value::Str(name.to_string()))
}

pub fn unit(_: &mut FuncEnv<'_>, args: &CallArgs) -> ScssResult<Value> {
    Ok(Value::Str(number_arg(args, 0, "number").unit().to_string()))
}

pub fn unitless(_: &mut FuncEnv<'_>, args: &CallArgs) -> ScssResult<Value> {
    Ok(Value::Bool(number_arg(args, 0, "number").is_unitless()))
}

pub fn comparable(_: &mut FuncEnv<'_>, args: &CallArgs) -> ScssResult<Value> {
    let a = number_arg(args, 0, "number1");
    let b = number_arg(args, 1, "number2");
    Ok(Value::Bool(units::comparable(a.unit(), b.unit())))
}

// Miscellaneous

pub fn if_fn(_: &mut FuncEnv<'_>, args: &CallArgs) -> ScssResult<Value> {
    let cond = args
        .get(0, "condition")
        .map(Value::is_condition_true)
        .unwrap_or(false);
    if cond {
        Ok(args.get(1, "if-true").cloned().unwrap_or(Value::Null))
    } else {
        Ok(args
            .get(2, "if-false")
            .cloned()
            .unwrap_or_else(|| Value::Str(String::new())))
    }
}

pub(super) fn register(map: &mut HashMap<&'static str, Builtin>) {
    map.insert("rgb:3", rgb);
    map.insert("rgb:1", rgb1);
    map.insert("rgba:4", rgba);
    map.insert("rgba:2", rgba2);
    map.insert("rgba:1", rgba2);
    map.insert("red:1", red);
    map.insert("green:1", green);
    map.insert("blue:1", blue);
    map.insert("mix:2", mix);
    map.insert("mix:3", mix);

    map.insert("hsl:3", hsl);
    map.insert("hsl:1", hsl1);
    map.insert("hsla:4", hsla);
    map.insert("hsla:1", hsla2);
    map.insert("hsla:2", hsla2);
    map.insert("hue:1", hue);
    map.insert("saturation:1", saturation);
    map.insert("lightness:1", lightness);
    map.insert("adjust-hue:2", adjust_hue);
    map.insert("spin:2", adjust_hue);
    map.insert("lighten:2", lighten);
    map.insert("darken:2", darken);
    map.insert("saturate:2", saturate);
    map.insert("desaturate:2", desaturate);
    map.insert("grayscale:1", grayscale);
    map.insert("greyscale:1", grayscale);
    map.insert("complement:1", complement);
    map.insert("invert:1", invert);

    map.insert("alpha:1", alpha);
    map.insert("opacity:1", alpha);
    map.insert("opacify:2", opacify);
    map.insert("fade-in:2", opacify);
    map.insert("fadein:2", opacify);
    map.insert("transparentize:2", transparentize);
    map.insert("fade-out:2", transparentize);
    map.insert("fadeout:2", transparentize);

    map.insert("adjust-color:n", adjust_color);
    map.insert("scale-color:n", scale_color);
    map.insert("change-color:n", change_color);
    map.insert("adjust-lightness:2", adjust_lightness);
    map.insert("adjust-saturation:2", adjust_saturation);
    map.insert("scale-lightness:2", scale_lightness);
    map.insert("scale-saturation:2", scale_saturation);
    map.insert("ie-hex-str:1", ie_hex_str);

    map.insert("percentage:1", percentage);
    map.insert("round:1", round);
    map.insert("ceil:1", ceil);
    map.insert("floor:1", floor);
    map.insert("abs:1", abs);
    map.insert("sin:1", sin);
    map.insert("cos:1", cos);
    map.insert("tan:1", tan);
    map.insert("pi:0", pi);

    map.insert("unquote:n", unquote);
    map.insert("quote:n", quote);
    map.insert("escape:1", unquote);
    map.insert("e:1", unquote);

    map.insert("length:n", length);
    map.insert("nth:2", nth);
    map.insert("-compass-nth:2", nth);
    map.insert("join:2", join);
    map.insert("join:3", join);
    map.insert("append:2", append);
    map.insert("append:3", append);
    map.insert("max:n", max);
    map.insert("min:n", min);

    map.insert("type-of:1", type_of);
    map.insert("unit:1", unit);
    map.insert("unitless:1", unitless);
    map.insert("comparable:2", comparable);

    map.insert("if:2", if_fn);
    map.insert("if:3", if_fn);

    for u in units::UNITS {
        let key: &'static str = Box::leak(format!("{u}:2").into_boxed_str());
        map.insert(key, convert_to);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::assets::NoAssets;
    use crate::value::{List, UNDEFINED};

    fn env_call(f: Builtin, positional: Vec<Value>) -> Value {
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

    fn num(v: f64) -> Value {
        Value::Number(Number::new(v))
    }

    fn pct(v: f64) -> Value {
        Value::Number(Number::with_unit(v, "%"))
    }

    #[test]
    fn mix_midpoint() {
        let v = env_call(mix, vec![color("#f00"), color("#00f")]);
        assert_eq!(v.to_css(), "#7f007f");
    }

    #[test]
    fn mix_weighted() {
        let v = env_call(mix, vec![color("#f00"), color("#00f"), pct(0.25)]);
        assert_eq!(v.to_css(), "#3f00bf");
    }

    #[test]
    fn rgb_round_trip() {
        let v = env_call(rgb, vec![num(255.0), num(0.0), num(0.0)]);
        match &v {
            Value::Color(c) => {
                assert_eq!(c.channels[0], 255.0);
                assert_eq!(c.form, ColorForm::Rgb);
            }
            other => panic!("not a color: {other:?}"),
        }
    }

    #[test]
    fn hsl_red() {
        let v = env_call(hsl, vec![num(0.0), pct(1.0), pct(0.5)]);
        let c = v.to_color().unwrap();
        assert!((c.channels[0] - 255.0).abs() < 1.0);
        assert!(c.channels[1] < 1.0);
    }

    #[test]
    fn hsl_components_round_trip() {
        let c = color("#1e90ff");
        let h = env_call(hue, vec![c.clone()]).to_number().value;
        let s = env_call(saturation, vec![c.clone()]).to_number();
        let l = env_call(lightness, vec![c.clone()]).to_number();
        let back = env_call(
            hsl,
            vec![
                num(h),
                Value::Number(s),
                Value::Number(l),
            ],
        );
        assert_eq!(back.to_color().unwrap(), c.to_color().unwrap());
    }

    #[test]
    fn lighten_darken() {
        let v = env_call(lighten, vec![color("#800000"), pct(0.2)]);
        let c = v.to_color().unwrap();
        assert!(c.channels[0] > 128.0);
        let v = env_call(darken, vec![color("#800000"), pct(0.2)]);
        let c = v.to_color().unwrap();
        assert!(c.channels[0] < 128.0);
    }

    #[test]
    fn grayscale_removes_saturation() {
        let v = env_call(grayscale, vec![color("#ff0000")]);
        let c = v.to_color().unwrap();
        assert!((c.channels[0] - c.channels[1]).abs() < 1.0);
        assert!((c.channels[1] - c.channels[2]).abs() < 1.0);
    }

    #[test]
    fn opacity_ops() {
        let v = env_call(
            transparentize,
            vec![color("#ff0000"), num(0.25)],
        );
        assert!((v.to_color().unwrap().alpha() - 0.75).abs() < 1e-9);
        let v = env_call(opacify, vec![v, num(0.25)]);
        assert!((v.to_color().unwrap().alpha() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn ie_hex() {
        let v = env_call(ie_hex_str, vec![color("#ff0000")]);
        assert_eq!(v.to_css(), "#FFFF0000");
    }

    #[test]
    fn percentage_renders() {
        let v = env_call(percentage, vec![num(0.65)]);
        assert_eq!(v.to_css(), "65%");
    }

    #[test]
    fn nth_indexing() {
        let lst = Value::List(List::from_items(
            vec![num(1.0), num(2.0), num(3.0)],
            Some(','),
        ));
        assert_eq!(env_call(nth, vec![lst.clone(), num(2.0)]).to_css(), "2");
        // modulo wraparound
        assert_eq!(env_call(nth, vec![lst.clone(), num(4.0)]).to_css(), "1");
        assert_eq!(
            env_call(nth, vec![lst.clone(), Value::Str("first".into())]).to_css(),
            "1"
        );
        assert_eq!(
            env_call(nth, vec![lst.clone(), Value::Str("last".into())]).to_css(),
            "3"
        );
        assert_eq!(
            env_call(nth, vec![lst, Value::Str("middle".into())]).to_css(),
            ""
        );
    }

    #[test]
    fn join_and_append() {
        let a = Value::List(List::from_items(vec![num(1.0)], None));
        let b = Value::List(List::from_items(vec![num(2.0), num(3.0)], None));
        assert_eq!(env_call(join, vec![a.clone(), b]).to_css(), "1 2 3");
        assert_eq!(env_call(append, vec![a, num(4.0)]).to_css(), "1 4");
    }

    #[test]
    fn introspection() {
        assert_eq!(env_call(type_of, vec![num(1.0)]).to_css(), "number");
        assert_eq!(env_call(type_of, vec![color("#f00")]).to_css(), "color");
        assert_eq!(
            env_call(type_of, vec![Value::Str("$x".into())]).to_css(),
            UNDEFINED
        );
        assert_eq!(
            env_call(unit, vec![Value::Number(Number::with_unit(1.0, "px"))]).to_css(),
            "px"
        );
        assert_eq!(env_call(unitless, vec![num(3.0)]).to_css(), "true");
        assert_eq!(
            env_call(
                comparable,
                vec![
                    Value::Number(Number::with_unit(1.0, "px")),
                    Value::Number(Number::with_unit(1.0, "em"))
                ]
            )
            .to_css(),
            "true"
        );
    }

    #[test]
    fn conditional() {
        assert_eq!(
            env_call(if_fn, vec![Value::Bool(true), num(1.0), num(2.0)]).to_css(),
            "1"
        );
        assert_eq!(
            env_call(
                if_fn,
                vec![Value::Str(UNDEFINED.into()), num(1.0), num(2.0)]
            )
            .to_css(),
            "2"
        );
    }
}
