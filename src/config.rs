// ABOUTME: Configuration module for revelation presentations
// ABOUTME: Layers an operator's TOML override file over the compiled-in defaults

use crate::errors::{RevelationError, Result};
use log::{debug, info};
use serde_json::{json, Map, Value};
use std::fs;
use std::path::Path;

pub const REVEAL_META: &str = "REVEAL_META";
pub const REVEAL_SLIDE_SEPARATOR: &str = "REVEAL_SLIDE_SEPARATOR";
pub const REVEAL_VERTICAL_SLIDE_SEPARATOR: &str = "REVEAL_VERTICAL_SLIDE_SEPARATOR";
pub const REVEAL_THEME: &str = "REVEAL_THEME";
pub const REVEAL_CONFIG: &str = "REVEAL_CONFIG";
pub const REVEAL_PLUGINS: &str = "REVEAL_PLUGINS";

/// Commented configuration file written into new presentations.
/// Holds the same values as [`Config::default`].
pub const DEFAULT_CONFIG_TEMPLATE: &str = include_str!("default_config.toml");

/// Resolved presentation settings: an ordered, immutable key/value mapping
/// that always holds every default key.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    values: Map<String, Value>,
}

impl Default for Config {
    fn default() -> Self {
        let mut values = Map::new();

        values.insert(
            REVEAL_META.to_string(),
            json!({
                "title": "The title",
                "author": "Some Author",
                "description": "Some description",
            }),
        );
        values.insert(REVEAL_SLIDE_SEPARATOR.to_string(), json!("---"));
        values.insert(REVEAL_VERTICAL_SLIDE_SEPARATOR.to_string(), json!("---~"));
        values.insert(REVEAL_THEME.to_string(), json!("black"));
        values.insert(REVEAL_CONFIG.to_string(), default_reveal_config());
        values.insert(
            REVEAL_PLUGINS.to_string(),
            json!(["RevealMarkdown", "RevealHighlight", "RevealNotes", "RevealMath"]),
        );

        Self { values }
    }
}

/// reveal.js initialization options. Options whose reveal.js default is
/// `null` are left out, reveal.js falls back to them when a key is missing.
fn default_reveal_config() -> Value {
    json!({
        "controls": true,
        "controlsTutorial": true,
        "controlsLayout": "bottom-right",
        "controlsBackArrows": "faded",
        "progress": true,
        "slideNumber": false,
        "showSlideNumber": "all",
        "hashOneBasedIndex": false,
        "hash": true,
        "respondToHashChanges": true,
        "history": true,
        "keyboard": true,
        "disableLayout": false,
        "overview": true,
        "center": true,
        "touch": true,
        "loop": false,
        "rtl": false,
        "navigationMode": "default",
        "shuffle": false,
        "fragments": true,
        "fragmentInURL": true,
        "embedded": false,
        "help": true,
        "pause": true,
        "showNotes": false,
        "autoAnimate": true,
        "autoAnimateEasing": "ease",
        "autoAnimateDuration": 1.0,
        "autoAnimateUnmatched": true,
        "autoAnimateStyles": [
            "opacity",
            "color",
            "background-color",
            "padding",
            "font-size",
            "line-height",
            "letter-spacing",
            "border-width",
            "border-color",
            "border-radius",
            "outline",
            "outline-offset"
        ],
        "autoSlide": 0,
        "autoSlideStoppable": true,
        "mouseWheel": false,
        "previewLinks": false,
        "postMessage": true,
        "postMessageEvents": false,
        "focusBodyOnPageVisibilityChange": true,
        "transition": "slide",
        "transitionSpeed": "default",
        "backgroundTransition": "fade",
        "pdfSeparateFragments": true,
        "pdfPageHeightOffset": -1,
        "viewDistance": 3,
        "mobileViewDistance": 2,
        "display": "block",
        "hideInactiveCursor": true,
        "hideCursorTime": 5000
    })
}

impl Config {
    /// Create a configuration holding only the defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the configuration from the defaults, then replace every key the
    /// override file declares.
    ///
    /// A missing `override_path`, or one that is not an existing file, is not
    /// an error. A file that exists but cannot be read or parsed fails with
    /// [`RevelationError::ConfigLoad`].
    pub fn resolve(override_path: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();

        match override_path {
            Some(path) if path.is_file() => {
                info!("Loading configuration overrides from {:?}", path);
                let overrides = load_overrides(path)?;
                config.apply(overrides);
            }
            Some(path) => debug!("Configuration file {:?} not found, using defaults", path),
            None => debug!("No configuration file given, using defaults"),
        }

        Ok(config)
    }

    /// Import every top-level upper-case key, replacing the previous value
    /// wholesale (no deep merge).
    fn apply(&mut self, overrides: Map<String, Value>) {
        for (key, value) in overrides {
            if is_upper_key(&key) {
                debug!("Overriding configuration key {}", key);
                self.values.insert(key, value);
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.values
    }

    pub fn meta(&self) -> &Value {
        self.values.get(REVEAL_META).unwrap_or(&Value::Null)
    }

    /// Look up a string field of `REVEAL_META`
    pub fn meta_field(&self, field: &str) -> &str {
        self.meta().get(field).and_then(Value::as_str).unwrap_or("")
    }

    pub fn slide_separator(&self) -> &str {
        self.str_value(REVEAL_SLIDE_SEPARATOR, "---")
    }

    pub fn vertical_slide_separator(&self) -> &str {
        self.str_value(REVEAL_VERTICAL_SLIDE_SEPARATOR, "---~")
    }

    pub fn theme(&self) -> &str {
        self.str_value(REVEAL_THEME, "black")
    }

    pub fn reveal_config(&self) -> &Value {
        self.values.get(REVEAL_CONFIG).unwrap_or(&Value::Null)
    }

    /// Plugin names, non-string entries are skipped
    pub fn plugins(&self) -> Vec<&str> {
        self.values
            .get(REVEAL_PLUGINS)
            .and_then(Value::as_array)
            .map(|list| list.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default()
    }

    fn str_value<'a>(&'a self, key: &str, fallback: &'a str) -> &'a str {
        self.values
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or(fallback)
    }
}

fn load_overrides(path: &Path) -> Result<Map<String, Value>> {
    let content = fs::read_to_string(path).map_err(|e| RevelationError::ConfigLoad {
        path: path.to_path_buf(),
        source: Box::new(e),
    })?;

    toml::from_str::<Map<String, Value>>(&content).map_err(|e| RevelationError::ConfigLoad {
        path: path.to_path_buf(),
        source: Box::new(e),
    })
}

/// True when the key has at least one cased character and none in lower case
fn is_upper_key(key: &str) -> bool {
    key.chars().any(char::is_uppercase) && !key.chars().any(char::is_lowercase)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn override_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("Failed to create temp file");
        file.write_all(content.as_bytes())
            .expect("Failed to write to temp file");
        file
    }

    #[test]
    fn test_defaults_contain_every_key() {
        let config = Config::resolve(None).unwrap();
        for key in [
            REVEAL_META,
            REVEAL_SLIDE_SEPARATOR,
            REVEAL_VERTICAL_SLIDE_SEPARATOR,
            REVEAL_THEME,
            REVEAL_CONFIG,
            REVEAL_PLUGINS,
        ] {
            assert!(config.contains_key(key), "missing default key {}", key);
        }
        assert_eq!(config.slide_separator(), "---");
        assert_eq!(config.vertical_slide_separator(), "---~");
        assert_eq!(config.theme(), "black");
    }

    #[test]
    fn test_missing_override_file_uses_defaults() {
        let config = Config::resolve(Some(Path::new("/definitely/not/here.toml"))).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_override_replaces_whole_value() {
        let file = override_file(
            r#"
REVEAL_THEME = "sky"

[REVEAL_META]
title = "T"
author = "A"
description = "D"

[REVEAL_CONFIG]
controls = false
"#,
        );

        let config = Config::resolve(Some(file.path())).unwrap();

        assert_eq!(
            config.meta(),
            &json!({"title": "T", "author": "A", "description": "D"})
        );
        assert_eq!(config.theme(), "sky");
        // Replaced, not merged: the other reveal.js defaults are gone
        assert_eq!(config.reveal_config(), &json!({"controls": false}));
        assert_eq!(config.slide_separator(), "---");
    }

    #[test]
    fn test_lowercase_keys_are_ignored() {
        let file = override_file("reveal_theme = \"sky\"\nMixed_Case = 1\nEXTRA_KEY = 3\n");
        let config = Config::resolve(Some(file.path())).unwrap();

        assert_eq!(config.theme(), "black");
        assert!(!config.contains_key("reveal_theme"));
        assert!(!config.contains_key("Mixed_Case"));
        assert_eq!(config.get("EXTRA_KEY"), Some(&json!(3)));
    }

    #[test]
    fn test_malformed_override_fails() {
        let file = override_file("REVEAL_THEME = \n[[[");
        let result = Config::resolve(Some(file.path()));
        assert!(matches!(result, Err(RevelationError::ConfigLoad { .. })));
    }

    #[test]
    fn test_template_matches_defaults() {
        let file = override_file(DEFAULT_CONFIG_TEMPLATE);
        let config = Config::resolve(Some(file.path())).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_is_upper_key() {
        assert!(is_upper_key("REVEAL_META"));
        assert!(is_upper_key("A1"));
        assert!(!is_upper_key("_"));
        assert!(!is_upper_key("Reveal"));
    }
}
