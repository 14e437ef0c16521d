//! The dynamically-typed value system of the expression language.
//!
//! Values are a tagged sum: booleans, unit-carrying numbers, colors,
//! unquoted and quoted strings, lists and null. Arithmetic, comparison and
//! stringification all live here; the grammar in `calculator.rs` only
//! decides which operation to apply.

use std::collections::BTreeMap;

use crate::colors;
use crate::units;

/// Sentinel content for unresolved variables. A plain string equal to this,
/// or still carrying a `$` prefix, propagates through every operation.
pub const UNDEFINED: &str = "undefined";

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Number(Number),
    Color(Color),
    /// Unquoted string, also the carrier for raw CSS passthrough.
    Str(String),
    Quoted(String),
    List(List),
    /// A string result (gradients) carrying vendor-prefix renderings for
    /// `prefixed()`/`prefix()` and friends to consult.
    Prefixed(PrefixedValue),
    Null,
}

/// Plain rendering plus the per-prefix alternates of a gradient-like value.
#[derive(Debug, Clone, PartialEq)]
pub struct PrefixedValue {
    pub plain: String,
    /// `(prefix-without-dash, rendering)` pairs, e.g. `("moz", "-moz-…")`.
    pub renders: Vec<(String, String)>,
}

impl PrefixedValue {
    #[must_use]
    pub fn render_for(&self, prefix: &str) -> Option<&str> {
        let key = prefix.trim_start_matches('-');
        self.renders
            .iter()
            .find(|(p, _)| p == key)
            .map(|(_, r)| r.as_str())
    }
}

/// Unit bookkeeping of a [`Number`]: every unit seen so far with its merge
/// weight, plus the primary unit used for rendering and conversion.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Units {
    pub weights: BTreeMap<String, i32>,
    pub primary: Option<String>,
}

impl Units {
    #[must_use]
    pub fn single(unit: &str) -> Self {
        let mut weights = BTreeMap::new();
        weights.insert(unit.to_string(), units::unit_weight(unit));
        Units {
            weights,
            primary: Some(unit.to_string()),
        }
    }

    /// Merges the other side's weights in, keeping our primary unit.
    fn merge(&mut self, other: &Units) {
        for (unit, weight) in &other.weights {
            *self.weights.entry(unit.clone()).or_insert(0) += weight;
        }
        if self.primary.is_none() {
            self.primary.clone_from(&other.primary);
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Number {
    pub value: f64,
    pub units: Units,
}

impl Number {
    #[must_use]
    pub fn new(value: f64) -> Self {
        Number {
            value,
            units: Units::default(),
        }
    }

    #[must_use]
    pub fn with_unit(value: f64, unit: &str) -> Self {
        Number {
            value,
            units: Units::single(unit),
        }
    }

    #[must_use]
    pub fn unit(&self) -> &str {
        self.units.primary.as_deref().unwrap_or("")
    }

    #[must_use]
    pub fn is_unitless(&self) -> bool {
        self.units.primary.is_none()
    }

    /// Magnitude of `other` expressed in our unit, when both units belong to
    /// the same class. Otherwise the raw magnitude.
    fn converted_rhs(&self, other: &Number) -> f64 {
        match (&self.units.primary, &other.units.primary) {
            (Some(left), Some(right)) if units::comparable(left, right) => {
                let lf = units::conv_factor(left).unwrap_or(1.0);
                let rf = units::conv_factor(right).unwrap_or(1.0);
                other.value * rf / lf
            }
            _ => other.value,
        }
    }

    /// Applies a binary operation, keeping the left primary unit. A unitless
    /// left side adopts the right side's units.
    #[must_use]
    pub fn binop(&self, op: fn(f64, f64) -> f64, other: &Number) -> Number {
        let rhs = self.converted_rhs(other);
        let mut units = self.units.clone();
        units.merge(&other.units);
        Number {
            value: op(self.value, rhs),
            units,
        }
    }

    /// Converts (or tags) this number into the given unit. Within a shared
    /// class the magnitude converts; otherwise the unit is just applied.
    #[must_use]
    pub fn convert_to(&self, unit: &str) -> Number {
        let value = match &self.units.primary {
            Some(current) if units::comparable(current, unit) => {
                let cf = units::conv_factor(current).unwrap_or(1.0);
                let tf = units::conv_factor(unit).unwrap_or(1.0);
                self.value * cf / tf
            }
            _ => self.value,
        };
        Number {
            value,
            units: Units::single(unit),
        }
    }

    fn compare(&self, other: &Number) -> Option<std::cmp::Ordering> {
        self.value.partial_cmp(&self.converted_rhs(other))
    }
}

/// How a color prefers to stringify, independent of its stored channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorForm {
    Rgb,
    Rgba,
    Hsl,
    Hsla,
    Hex,
}

/// An RGBA color. RGB channels live in `[0, 255]`, alpha in `[0, 1]`;
/// every operation clamps back into range.
#[derive(Debug, Clone)]
pub struct Color {
    pub channels: [f64; 4],
    pub form: ColorForm,
}

impl PartialEq for Color {
    fn eq(&self, other: &Self) -> bool {
        self.channels
            .iter()
            .zip(other.channels.iter())
            .all(|(a, b)| (a - b).abs() < 1.0 / 255.0)
    }
}

impl Color {
    #[must_use]
    pub fn new(r: f64, g: f64, b: f64, a: f64, form: ColorForm) -> Self {
        let mut color = Color {
            channels: [r, g, b, a],
            form,
        };
        color.clamp();
        color
    }

    #[must_use]
    pub fn from_hex(literal: &str) -> Option<Self> {
        let channels = colors::parse_hex(literal)?;
        Some(Color {
            channels,
            form: ColorForm::Hex,
        })
    }

    pub fn clamp(&mut self) {
        for channel in &mut self.channels[..3] {
            *channel = channel.clamp(0.0, 255.0);
        }
        self.channels[3] = self.channels[3].clamp(0.0, 1.0);
    }

    #[must_use]
    pub fn alpha(&self) -> f64 {
        self.channels[3]
    }

    #[must_use]
    pub fn with_alpha(&self, alpha: f64, form: ColorForm) -> Self {
        Color::new(self.channels[0], self.channels[1], self.channels[2], alpha, form)
    }

    /// The HLS coordinates of this color, each in `[0, 1]`.
    #[must_use]
    pub fn to_hls(&self) -> (f64, f64, f64) {
        rgb_to_hls(
            self.channels[0] / 255.0,
            self.channels[1] / 255.0,
            self.channels[2] / 255.0,
        )
    }

    /// Rebuilds RGB channels from HLS coordinates, preserving alpha and
    /// form. Saturation or lightness of exactly 1.0 is nudged below the
    /// singular point before conversion.
    #[must_use]
    pub fn from_hls(h: f64, l: f64, s: f64, alpha: f64, form: ColorForm) -> Self {
        let l = if l == 1.0 { 0.999_999 } else { l };
        let s = if s == 1.0 { 0.999_999 } else { s };
        let (r, g, b) = hls_to_rgb(h, l, s);
        Color::new(r * 255.0, g * 255.0, b * 255.0, alpha, form)
    }

    // Channels truncate when printing; mix(#f00, #00f) lands on #7f007f,
    // not #80007f.
    fn hex(&self) -> String {
        format!(
            "#{:02x}{:02x}{:02x}",
            self.channels[0] as u8, self.channels[1] as u8, self.channels[2] as u8
        )
    }

    #[must_use]
    pub fn render(&self) -> String {
        let opaque = self.channels[3] >= 1.0 - 1e-9;
        match (self.form, opaque) {
            (ColorForm::Hsl | ColorForm::Hsla, _) => {
                let (h, l, s) = self.to_hls();
                let h = format_number(h * 360.0);
                let s = format_number(s * 100.0);
                let l = format_number(l * 100.0);
                if opaque {
                    format!("hsl({h}, {s}%, {l}%)")
                } else {
                    format!("hsla({h}, {s}%, {l}%, {})", format_number(self.channels[3]))
                }
            }
            (_, false) => format!(
                "rgba({}, {}, {}, {})",
                self.channels[0] as u32,
                self.channels[1] as u32,
                self.channels[2] as u32,
                format_number(self.channels[3])
            ),
            (_, true) => {
                let hex = self.hex();
                match colors::name_for_hex(&hex) {
                    Some(name) if name.len() <= hex.len() => name.to_string(),
                    _ => hex,
                }
            }
        }
    }
}

/// Ordered list of values. Positional slots are dense; trailing named slots
/// carry `$name: value` call arguments; the separator slot holds `,` when
/// the list was comma-delimited.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct List {
    pub items: Vec<Value>,
    pub named: Vec<(String, Value)>,
    pub separator: Option<char>,
}

impl List {
    #[must_use]
    pub fn from_items(items: Vec<Value>, separator: Option<char>) -> Self {
        List {
            items,
            named: Vec::new(),
            separator,
        }
    }

    /// Number of value slots, named slots included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len() + self.named.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn first(&self) -> Value {
        if let Some(v) = self.items.first() {
            v.clone()
        } else if let Some((_, v)) = self.named.first() {
            v.clone()
        } else {
            Value::Str(String::new())
        }
    }

    /// All value slots in order, positional first.
    #[must_use]
    pub fn values(&self) -> Vec<Value> {
        let mut out = self.items.clone();
        out.extend(self.named.iter().map(|(_, v)| v.clone()));
        out
    }

    #[must_use]
    pub fn named_value(&self, name: &str) -> Option<&Value> {
        self.named.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    fn render(&self) -> String {
        let joiner = match self.separator {
            Some(sep) => format!("{sep} "),
            None => " ".to_string(),
        };
        self.values()
            .iter()
            .map(Value::to_css)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(&joiner)
    }
}

impl Value {
    #[must_use]
    pub fn undefined() -> Value {
        Value::Str(UNDEFINED.to_string())
    }

    /// True for the unresolved-variable sentinel: the literal `undefined`
    /// string, or a string still carrying its `$` reference.
    #[must_use]
    pub fn is_undefined(&self) -> bool {
        match self {
            Value::Str(s) => s == UNDEFINED || s.starts_with('$'),
            _ => false,
        }
    }

    /// Plain truthiness: empty-ish values are false, everything else true.
    #[must_use]
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            Value::Number(n) => n.value != 0.0,
            Value::Color(_) => true,
            Value::Str(s) | Value::Quoted(s) => !s.is_empty(),
            Value::List(l) => !l.is_empty(),
            Value::Prefixed(p) => !p.plain.is_empty(),
            Value::Null => false,
        }
    }

    /// Truthiness of an `@if`/`if()` condition: like [`is_truthy`], except
    /// the strings `"0"`, `"false"`, `"undefined"` and unresolved `$vars`
    /// are false.
    #[must_use]
    pub fn is_condition_true(&self) -> bool {
        match self {
            Value::Str(s) | Value::Quoted(s) => {
                !s.is_empty() && s != "0" && s != "false" && s != UNDEFINED && !is_variable_name(s)
            }
            _ => self.is_truthy(),
        }
    }

    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Number(_) => "number",
            Value::Color(_) => "color",
            Value::List(_) => "list",
            Value::Str(s) if s == UNDEFINED || is_variable_name(s) => UNDEFINED,
            Value::Str(_) | Value::Quoted(_) | Value::Prefixed(_) => "string",
            Value::Null => "string",
        }
    }

    /// Renders the value the way it appears in CSS output. Quoted strings
    /// keep their quotes; `Null` renders empty.
    #[must_use]
    pub fn to_css(&self) -> String {
        match self {
            Value::Bool(b) => if *b { "true" } else { "false" }.to_string(),
            // percentages store fractions and render scaled up
            Value::Number(n) if n.unit() == "%" => {
                format!("{}%", format_number(n.value * 100.0))
            }
            Value::Number(n) => format!("{}{}", format_number(n.value), n.unit()),
            Value::Color(c) => c.render(),
            Value::Str(s) => s.clone(),
            Value::Quoted(s) => format!("\"{}\"", escape(s)),
            Value::List(l) => l.render(),
            Value::Prefixed(p) => p.plain.clone(),
            Value::Null => String::new(),
        }
    }

    /// The bare textual content: like [`to_css`] but without quotes.
    #[must_use]
    pub fn content(&self) -> String {
        match self {
            Value::Quoted(s) => s.clone(),
            other => other.to_css(),
        }
    }

    /// Coerces to a number the way the builtin library does: strings parse
    /// their leading magnitude (`50%` becomes `0.5`), booleans count 1/0.
    #[must_use]
    pub fn to_number(&self) -> Number {
        match self {
            Value::Number(n) => n.clone(),
            Value::Bool(b) => Number::new(f64::from(*b)),
            Value::Str(s) | Value::Quoted(s) => parse_number_str(s),
            _ => Number::new(0.0),
        }
    }

    /// Coerces to a color: colors pass through, strings are tried as hex
    /// literals or color names.
    #[must_use]
    pub fn to_color(&self) -> Option<Color> {
        match self {
            Value::Color(c) => Some(c.clone()),
            Value::Str(s) | Value::Quoted(s) => {
                if let Some(c) = Color::from_hex(s) {
                    Some(c)
                } else {
                    colors::hex_for_name(s).and_then(Color::from_hex)
                }
            }
            _ => None,
        }
    }

    /// Coerces to a list; non-lists become a single-element list.
    #[must_use]
    pub fn to_list(&self) -> List {
        match self {
            Value::List(l) => l.clone(),
            Value::Null => List::default(),
            other => List::from_items(vec![other.clone()], None),
        }
    }

    /// Loose equality as used by the `==` operator: numbers compare by
    /// converted magnitude, strings by content, anything else by rendering.
    #[must_use]
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => {
                a.compare(b) == Some(std::cmp::Ordering::Equal)
            }
            (Value::Color(a), Value::Color(b)) => a == b,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (
                Value::Str(a) | Value::Quoted(a),
                Value::Str(b) | Value::Quoted(b),
            ) => a == b,
            (a, b) => a.to_css() == b.to_css(),
        }
    }

    /// Ordering as used by `<`, `<=`, `>`, `>=`.
    #[must_use]
    pub fn loose_cmp(&self, other: &Value) -> Option<std::cmp::Ordering> {
        match (self, other) {
            (Value::Number(a), Value::Number(b)) => a.compare(b),
            (a, b) => a.to_css().partial_cmp(&b.to_css()),
        }
    }
}

/// Whether a string is exactly a `$name` variable reference.
#[must_use]
pub fn is_variable_name(s: &str) -> bool {
    let mut chars = s.chars();
    chars.next() == Some('$')
        && s.len() > 1
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Renders a magnitude: rounded to three decimals, trailing zeros and a
/// trailing decimal point stripped.
#[must_use]
pub fn format_number(value: f64) -> String {
    let mut s = format!("{:.3}", (value * 1000.0).round() / 1000.0);
    while s.ends_with('0') {
        s.pop();
    }
    if s.ends_with('.') {
        s.pop();
    }
    if s == "-0" {
        s = "0".to_string();
    }
    s
}

fn parse_number_str(s: &str) -> Number {
    let trimmed = s.trim();
    if let Some(pct) = trimmed.strip_suffix('%') {
        return Number::new(pct.trim().parse::<f64>().unwrap_or(0.0) / 100.0);
    }
    // a leading magnitude with an optional trailing unit, e.g. "12px"
    let digits: String = trimmed
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.' || *c == '-' || *c == '+')
        .collect();
    let rest = trimmed[digits.len()..].trim();
    let value = digits.parse::<f64>().unwrap_or(0.0);
    if units::is_unit(rest) {
        Number::with_unit(value, rest)
    } else {
        Number::new(value)
    }
}

/// Escapes embedded quotes when rendering a quoted string.
#[must_use]
pub fn escape(s: &str) -> String {
    s.replace('"', "\\\"")
}

/// Strips one level of surrounding quotes and unescapes the content.
#[must_use]
pub fn dequote(s: &str) -> String {
    let bytes = s.as_bytes();
    if bytes.len() >= 2 && (bytes[0] == b'"' || bytes[0] == b'\'') && bytes[bytes.len() - 1] == bytes[0]
    {
        s[1..s.len() - 1].replace("\\\"", "\"").replace("\\'", "'")
    } else {
        s.to_string()
    }
}

// Binary operators over values. The grammar maps `+ - * /` here; the
// undefined sentinel has already been filtered out by the caller.

pub fn add(left: &Value, right: &Value) -> Value {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Value::Number(a.binop(|x, y| x + y, b)),
        (Value::Color(a), Value::Color(b)) => color_color_op(a, b, |x, y| x + y),
        (Value::Color(a), Value::Number(b)) => color_scalar_op(a, b.value, |x, y| x + y),
        (Value::Number(a), Value::Color(b)) => color_scalar_op(b, a.value, |x, y| y + x),
        (Value::Quoted(a), b) => Value::Quoted(format!("{a}{}", b.content())),
        (a, Value::Quoted(b)) => Value::Quoted(format!("{}{b}", a.content())),
        (a, b) => Value::Str(format!("{}{}", a.to_css(), b.to_css())),
    }
}

pub fn sub(left: &Value, right: &Value) -> Value {
    numeric_op(left, right, |x, y| x - y)
}

pub fn mul(left: &Value, right: &Value) -> Value {
    numeric_op(left, right, |x, y| x * y)
}

pub fn div(left: &Value, right: &Value) -> Value {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => {
            let incompatible = !a.is_unitless()
                && !b.is_unitless()
                && !units::comparable(a.unit(), b.unit());
            if incompatible || b.value == 0.0 {
                // division that cannot be performed falls back to the
                // literal CSS slash form
                Value::Str(format!("{}/{}", left.to_css(), right.to_css()))
            } else {
                Value::Number(a.binop(|x, y| x / y, b))
            }
        }
        _ => numeric_op(left, right, |x, y| if y == 0.0 { 0.0 } else { x / y }),
    }
}

fn numeric_op(left: &Value, right: &Value, op: fn(f64, f64) -> f64) -> Value {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => Value::Number(a.binop(op, b)),
        (Value::Color(a), Value::Color(b)) => color_color_op(a, b, op),
        (Value::Color(a), Value::Number(b)) => color_scalar_op(a, b.value, op),
        (Value::Number(a), Value::Color(b)) => color_scalar_op(b, a.value, |x, y| op(y, x)),
        _ => Value::undefined(),
    }
}

fn color_color_op(a: &Color, b: &Color, op: fn(f64, f64) -> f64) -> Value {
    Value::Color(Color::new(
        op(a.channels[0], b.channels[0]),
        op(a.channels[1], b.channels[1]),
        op(a.channels[2], b.channels[2]),
        a.channels[3],
        a.form,
    ))
}

fn color_scalar_op(color: &Color, scalar: f64, op: impl Fn(f64, f64) -> f64) -> Value {
    Value::Color(Color::new(
        op(color.channels[0], scalar),
        op(color.channels[1], scalar),
        op(color.channels[2], scalar),
        color.channels[3],
        color.form,
    ))
}

/// Unary minus / `!`: numbers negate, booleans flip, anything else gets the
/// sign glued onto its text.
pub fn invert(sign: char, value: &Value) -> Value {
    match value {
        Value::Number(n) => {
            let mut out = n.clone();
            out.value = -out.value;
            Value::Number(out)
        }
        Value::Bool(b) => Value::Bool(!b),
        other => Value::Str(format!("{sign}{}", other.to_css())),
    }
}

fn rgb_to_hls(r: f64, g: f64, b: f64) -> (f64, f64, f64) {
    let maxc = r.max(g).max(b);
    let minc = r.min(g).min(b);
    let l = (minc + maxc) / 2.0;
    if (maxc - minc).abs() < f64::EPSILON {
        return (0.0, l, 0.0);
    }
    let s = if l <= 0.5 {
        (maxc - minc) / (maxc + minc)
    } else {
        (maxc - minc) / (2.0 - maxc - minc)
    };
    let rc = (maxc - r) / (maxc - minc);
    let gc = (maxc - g) / (maxc - minc);
    let bc = (maxc - b) / (maxc - minc);
    let h = if (r - maxc).abs() < f64::EPSILON {
        bc - gc
    } else if (g - maxc).abs() < f64::EPSILON {
        2.0 + rc - bc
    } else {
        4.0 + gc - rc
    };
    ((h / 6.0).rem_euclid(1.0), l, s)
}

fn hls_to_rgb(h: f64, l: f64, s: f64) -> (f64, f64, f64) {
    if s == 0.0 {
        return (l, l, l);
    }
    let m2 = if l <= 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let m1 = 2.0 * l - m2;
    (
        hls_component(m1, m2, h + 1.0 / 3.0),
        hls_component(m1, m2, h),
        hls_component(m1, m2, h - 1.0 / 3.0),
    )
}

fn hls_component(m1: f64, m2: f64, hue: f64) -> f64 {
    let hue = hue.rem_euclid(1.0);
    if hue < 1.0 / 6.0 {
        m1 + (m2 - m1) * hue * 6.0
    } else if hue < 0.5 {
        m2
    } else if hue < 2.0 / 3.0 {
        m1 + (m2 - m1) * (2.0 / 3.0 - hue) * 6.0
    } else {
        m1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn px(v: f64) -> Value {
        Value::Number(Number::with_unit(v, "px"))
    }

    #[test]
    fn number_formatting() {
        assert_eq!(format_number(6.0), "6");
        assert_eq!(format_number(0.5), "0.5");
        assert_eq!(format_number(1.0 / 3.0), "0.333");
        assert_eq!(format_number(-0.0001), "0");
    }

    #[test]
    fn unit_addition_keeps_left_unit() {
        let a = Number::with_unit(1.0, "px");
        let b = Number::with_unit(2.0, "em");
        let sum = a.binop(|x, y| x + y, &b);
        assert_eq!(sum.unit(), "px");
        assert!((sum.value - 27.0).abs() < 1e-6);
    }

    #[test]
    fn unit_closure() {
        let a = Number::with_unit(3.0, "px");
        let b = Number::with_unit(2.0, "em");
        let sum = a.binop(|x, y| x + y, &b);
        let back = sum.binop(|x, y| x - y, &b);
        assert!((back.value - a.value).abs() < 1e-6);
        assert_eq!(back.unit(), "px");
    }

    #[test]
    fn unitless_preserves_units() {
        let a = Number::new(2.0);
        let b = Number::with_unit(3.0, "px");
        assert_eq!(a.binop(|x, y| x * y, &b).unit(), "px");
        assert_eq!(b.binop(|x, y| x * y, &a).unit(), "px");
    }

    #[test]
    fn incompatible_division_is_literal() {
        let v = div(&px(3.0), &Value::Number(Number::with_unit(1.0, "s")));
        assert_eq!(v, Value::Str("3px/1s".to_string()));
    }

    #[test]
    fn plain_division() {
        let v = div(&px(6.0), &Value::Number(Number::new(2.0)));
        assert_eq!(v.to_css(), "3px");
    }

    #[test]
    fn string_ops_yield_undefined() {
        let v = mul(&Value::Str("a".into()), &Value::Str("b".into()));
        assert!(v.is_undefined());
    }

    #[test]
    fn quoted_concat_stays_quoted() {
        let v = add(&Value::Quoted("a".into()), &Value::Str("b".into()));
        assert_eq!(v, Value::Quoted("ab".into()));
    }

    #[test]
    fn color_renders_named_when_shorter() {
        let c = Color::from_hex("#ff0000").unwrap();
        assert_eq!(c.render(), "red");
        let c = Color::from_hex("#7f007f").unwrap();
        assert_eq!(c.render(), "#7f007f");
    }

    #[test]
    fn translucent_renders_rgba() {
        let c = Color::new(255.0, 0.0, 0.0, 0.5, ColorForm::Rgba);
        assert_eq!(c.render(), "rgba(255, 0, 0, 0.5)");
    }

    #[test]
    fn channel_clamping() {
        let c = Color::new(300.0, -5.0, 12.0, 2.0, ColorForm::Hex);
        assert_eq!(c.channels[0], 255.0);
        assert_eq!(c.channels[1], 0.0);
        assert_eq!(c.channels[3], 1.0);
    }

    #[test]
    fn hls_round_trip() {
        let c = Color::from_hex("#1e90ff").unwrap();
        let (h, l, s) = c.to_hls();
        let back = Color::from_hls(h, l, s, c.alpha(), c.form);
        for i in 0..3 {
            assert!((c.channels[i] - back.channels[i]).abs() < 1.0);
        }
    }

    #[test]
    fn condition_truthiness() {
        assert!(!Value::Str("false".into()).is_condition_true());
        assert!(!Value::Str("0".into()).is_condition_true());
        assert!(!Value::Str("$missing".into()).is_condition_true());
        assert!(Value::Str("yes".into()).is_condition_true());
        assert!(!Value::Null.is_condition_true());
    }

    #[test]
    fn undefined_detection() {
        assert!(Value::undefined().is_undefined());
        assert!(Value::Str("$x".into()).is_undefined());
        assert!(!Value::Quoted("undefined".into()).is_undefined());
    }

    #[test]
    fn list_rendering() {
        let l = List::from_items(vec![px(1.0), px(2.0)], Some(','));
        assert_eq!(Value::List(l).to_css(), "1px, 2px");
        let l = List::from_items(vec![px(1.0), px(2.0)], None);
        assert_eq!(Value::List(l).to_css(), "1px 2px");
    }

    #[test]
    fn percent_string_to_number() {
        assert!((Value::Str("50%".into()).to_number().value - 0.5).abs() < 1e-9);
        assert_eq!(Value::Str("12px".into()).to_number().unit(), "px");
    }
}
