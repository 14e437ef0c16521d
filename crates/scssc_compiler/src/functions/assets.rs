//! Interface to the asset pipeline.
//!
//! The sprite and image helpers are declared here by name and arity only;
//! their implementations live behind [`AssetBackend`]. The default backend
//! has no imaging support: globs match nothing and helper calls fail fatally
//! (the compiler does not catch those failures).

use std::collections::HashMap;

use scssc_shared::errors::{ScssError, ScssResult};

use super::{CallArgs, FuncEnv};
use crate::value::Value;

/// External collaborator executing sprite/image/font helpers.
pub trait AssetBackend {
    /// Files under the static root matching a glob pattern such as
    /// `icons/*.png`, relative to the static root.
    fn glob_static(&self, _pattern: &str) -> Vec<String> {
        Vec::new()
    }

    /// Executes an asset helper by its function name.
    fn call(&mut self, name: &str, _args: &CallArgs) -> ScssResult<Value> {
        Err(ScssError::unsupported(&format!(
            "asset helper `{name}` requires an asset backend"
        )))
    }
}

/// The backend used when none is configured.
#[derive(Debug, Default)]
pub struct NoAssets;

impl AssetBackend for NoAssets {}

/// Fingerprint-keyed cache with access stamps, trimmed from 1000 entries
/// down to 500. Backends use this for sprite maps and image metadata.
#[derive(Debug, Default)]
pub struct SpriteCache<V> {
    entries: HashMap<String, (u64, V)>,
    tick: u64,
}

const CACHE_HIGH_WATER: usize = 1000;
const CACHE_LOW_WATER: usize = 500;

impl<V> SpriteCache<V> {
    #[must_use]
    pub fn new() -> Self {
        SpriteCache {
            entries: HashMap::new(),
            tick: 0,
        }
    }

    pub fn get(&mut self, key: &str) -> Option<&V> {
        self.tick += 1;
        let tick = self.tick;
        self.entries.get_mut(key).map(|(stamp, v)| {
            *stamp = tick;
            &*v
        })
    }

    pub fn insert(&mut self, key: &str, value: V) {
        self.tick += 1;
        self.entries.insert(key.to_string(), (self.tick, value));
        if self.entries.len() > CACHE_HIGH_WATER {
            self.trim();
        }
    }

    fn trim(&mut self) {
        let mut stamps: Vec<u64> = self.entries.values().map(|(stamp, _)| *stamp).collect();
        stamps.sort_unstable();
        let cutoff = stamps[stamps.len() - CACHE_LOW_WATER];
        self.entries.retain(|_, (stamp, _)| *stamp >= cutoff);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

macro_rules! forward_to_backend {
    ($($fn_name:ident => $helper:literal),+ $(,)?) => {
        $(
            pub fn $fn_name(env: &mut FuncEnv<'_>, args: &CallArgs) -> ScssResult<Value> {
                env.backend.call($helper, args)
            }
        )+
    };
}

forward_to_backend! {
    sprite_map => "sprite-map",
    sprite => "sprite",
    sprite_url => "sprite-url",
    sprite_file => "sprite-file",
    sprite_position => "sprite-position",
    sprite_map_name => "sprite-map-name",
    sprites => "sprites",
    grid_image => "grid-image",
    image_color => "image-color",
    image_url => "image-url",
    inline_image => "inline-image",
    image_width => "image-width",
    image_height => "image-height",
    background_noise => "background-noise",
    stylesheet_url => "stylesheet-url",
    font_url => "font-url",
    font_files => "font-files",
    inline_font_files => "inline-font-files",
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_backend_is_fatal() {
        let mut backend = NoAssets;
        let args = CallArgs::default();
        assert!(matches!(
            backend.call("sprite-map", &args),
            Err(ScssError::Unsupported(_))
        ));
        assert!(backend.glob_static("icons/*.png").is_empty());
    }

    #[test]
    fn cache_trims_to_low_water() {
        let mut cache = SpriteCache::new();
        for i in 0..1001 {
            cache.insert(&format!("k{i}"), i);
        }
        assert_eq!(cache.len(), 500);
        // the most recently inserted key survives
        assert_eq!(cache.get("k1000"), Some(&1000));
    }

    #[test]
    fn access_refreshes_stamp() {
        let mut cache = SpriteCache::new();
        for i in 0..1000 {
            cache.insert(&format!("k{i}"), i);
        }
        // touch the oldest entry, then overflow
        assert!(cache.get("k0").is_some());
        cache.insert("overflow", 9999);
        assert!(cache.get("k0").is_some());
        assert!(cache.get("k1").is_none());
    }
}
