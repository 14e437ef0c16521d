//! The built-in function library: an arity-indexed dispatch table.
//!
//! Lookup goes by `"name:arity"` first, then the variadic `"name:n"` entry.
//! Functions receive already-evaluated values; asset helpers forward to the
//! session's [`assets::AssetBackend`].

pub mod assets;
pub mod compass;
pub mod gradients;
pub mod sass;

use std::collections::HashMap;

use lazy_static::lazy_static;
use scssc_shared::errors::ScssResult;

use crate::value::Value;
use assets::AssetBackend;

/// Evaluated arguments of one function call: dense positional values,
/// trailing `$name: value` entries, and the list separator they arrived
/// with.
#[derive(Debug, Clone, Default)]
pub struct CallArgs {
    pub positional: Vec<Value>,
    /// Named arguments; keys are stored without the `$` and with `-`
    /// normalized to `_`.
    pub named: Vec<(String, Value)>,
    pub separator: Option<char>,
}

impl CallArgs {
    #[must_use]
    pub fn arity(&self) -> usize {
        self.positional.len()
    }

    #[must_use]
    pub fn pos(&self, i: usize) -> Option<&Value> {
        self.positional.get(i)
    }

    #[must_use]
    pub fn named(&self, name: &str) -> Option<&Value> {
        let key = normalize_key(name);
        self.named.iter().find(|(n, _)| *n == key).map(|(_, v)| v)
    }

    /// Positional argument `i`, or the named argument `name`.
    #[must_use]
    pub fn get(&self, i: usize, name: &str) -> Option<&Value> {
        self.pos(i).or_else(|| self.named(name))
    }

    /// All argument values, positional first.
    #[must_use]
    pub fn all(&self) -> Vec<Value> {
        let mut out = self.positional.clone();
        out.extend(self.named.iter().map(|(_, v)| v.clone()));
        out
    }
}

/// Normalizes a `$arg-name` into its lookup key.
#[must_use]
pub fn normalize_key(name: &str) -> String {
    name.trim_start_matches('$').replace('-', "_")
}

/// Call environment handed to every builtin.
pub struct FuncEnv<'a> {
    pub backend: &'a mut dyn AssetBackend,
}

pub type Builtin = fn(&mut FuncEnv<'_>, &CallArgs) -> ScssResult<Value>;

lazy_static! {
    static ref REGISTRY: HashMap<&'static str, Builtin> = {
        let mut map: HashMap<&'static str, Builtin> = HashMap::new();
        sass::register(&mut map);
        compass::register(&mut map);
        gradients::register(&mut map);
        register_assets(&mut map);
        map
    };
}

fn register_assets(map: &mut HashMap<&'static str, Builtin>) {
    map.insert("sprite-map:1", assets::sprite_map);
    map.insert("sprite:2", assets::sprite);
    map.insert("sprite:3", assets::sprite);
    map.insert("sprite:4", assets::sprite);
    map.insert("sprite-url:1", assets::sprite_url);
    map.insert("sprite-file:2", assets::sprite_file);
    map.insert("sprite-position:2", assets::sprite_position);
    map.insert("sprite-position:3", assets::sprite_position);
    map.insert("sprite-position:4", assets::sprite_position);
    map.insert("sprite-map-name:1", assets::sprite_map_name);
    map.insert("sprites:1", assets::sprites);
    map.insert("sprite-names:1", assets::sprites);
    map.insert("grid-image:4", assets::grid_image);
    map.insert("grid-image:5", assets::grid_image);
    map.insert("image-color:1", assets::image_color);
    map.insert("image-color:2", assets::image_color);
    map.insert("image-color:3", assets::image_color);
    map.insert("image-url:1", assets::image_url);
    map.insert("image-url:2", assets::image_url);
    map.insert("image-url:3", assets::image_url);
    map.insert("image-url:4", assets::image_url);
    map.insert("image-url:5", assets::image_url);
    map.insert("inline-image:1", assets::inline_image);
    map.insert("inline-image:2", assets::inline_image);
    map.insert("image-width:1", assets::image_width);
    map.insert("image-height:1", assets::image_height);
    map.insert("background-noise:0", assets::background_noise);
    map.insert("background-noise:1", assets::background_noise);
    map.insert("background-noise:2", assets::background_noise);
    map.insert("background-noise:3", assets::background_noise);
    map.insert("background-noise:4", assets::background_noise);
    map.insert("stylesheet-url:1", assets::stylesheet_url);
    map.insert("stylesheet-url:2", assets::stylesheet_url);
    map.insert("font-url:1", assets::font_url);
    map.insert("font-url:2", assets::font_url);
    map.insert("font-files:n", assets::font_files);
    map.insert("inline-font-files:n", assets::inline_font_files);
}

/// Finds the builtin for a call: exact arity first, then variadic.
#[must_use]
pub fn lookup(name: &str, arity: usize) -> Option<Builtin> {
    REGISTRY
        .get(format!("{name}:{arity}").as_str())
        .or_else(|| REGISTRY.get(format!("{name}:n").as_str()))
        .copied()
}

/// CSS functions reproduced literally when no builtin or user function
/// matches a call.
const CSS_FUNCTIONS: &[&str] = &[
    "attr", "counter", "counters", "url", "rgb", "rect",
    "calc", "min", "max", "cycle",
    "rgba", "hsl", "hsla",
    "local", "format",
    "image", "element", "linear-gradient", "radial-gradient",
    "repeating-linear-gradient", "repeating-radial-gradient",
    "matrix", "translate", "translateX", "translateY", "scale",
    "scaleX", "scaleY", "rotate", "skewX", "skewY",
    "matrix3d", "translate3d", "translateZ", "scale3d", "scaleZ", "rotate3d",
    "rotateX", "rotateY", "rotateZ", "perspective",
    "cubic-bezier",
];

/// Whether an unknown function name should pass through as literal CSS.
/// Vendor-prefixed names (`-moz-anything`) always do.
#[must_use]
pub fn is_css_function(name: &str) -> bool {
    if CSS_FUNCTIONS.contains(&name) {
        return true;
    }
    // -<vendor>-<anything>
    if let Some(rest) = name.strip_prefix('-') {
        if let Some(dash) = rest.find('-') {
            return dash > 0 && rest.len() > dash + 1;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_by_arity_then_variadic() {
        assert!(lookup("mix", 2).is_some());
        assert!(lookup("mix", 7).is_none());
        assert!(lookup("unquote", 3).is_some());
        assert!(lookup("nope", 1).is_none());
    }

    #[test]
    fn css_passthrough_list() {
        assert!(is_css_function("url"));
        assert!(is_css_function("translateX"));
        assert!(is_css_function("-webkit-anything"));
        assert!(!is_css_function("-moz"));
        assert!(!is_css_function("lighten"));
    }

    #[test]
    fn named_argument_normalization() {
        let args = CallArgs {
            positional: Vec::new(),
            named: vec![("offset_x".to_string(), Value::Bool(true))],
            separator: None,
        };
        assert!(args.named("$offset-x").is_some());
        assert!(args.get(0, "offset-x").is_some());
        assert!(args.named("offset-y").is_none());
    }
}
