// ABOUTME: Static resource handling for the revelation application
// ABOUTME: Locates the installed reveal.js and MathJax bundles and installs them on demand

use crate::archive;
use crate::errors::Result;
use log::info;
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const REVEAL_URL: &str = "https://github.com/hakimel/reveal.js/archive/master.zip";
pub const MATHJAX_URL: &str = "https://github.com/mathjax/MathJax/archive/2.7.9.zip";

const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 60;

/// Process-wide settings: where bundles live and how long downloads may take
#[derive(Debug, Clone)]
pub struct Settings {
    pub static_root: PathBuf,
    pub download_timeout: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            static_root: default_static_root(),
            download_timeout: Duration::from_secs(DEFAULT_DOWNLOAD_TIMEOUT_SECS),
        }
    }
}

fn default_static_root() -> PathBuf {
    dirs::data_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".local").join("share")))
        .unwrap_or_else(|| PathBuf::from("."))
        .join("revelation")
        .join("static")
}

impl Settings {
    /// Settings rooted at `static_root`, with the default timeout
    pub fn with_static_root(static_root: impl Into<PathBuf>) -> Self {
        Self {
            static_root: static_root.into(),
            ..Self::default()
        }
    }

    /// Load settings from environment variables
    pub fn from_env() -> Self {
        let static_root = env::var("REVELATION_STATIC_ROOT")
            .ok()
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(default_static_root);
        let download_timeout = env::var("REVELATION_DOWNLOAD_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(DEFAULT_DOWNLOAD_TIMEOUT_SECS));

        Self {
            static_root,
            download_timeout,
        }
    }

    pub fn revealjs_dir(&self) -> PathBuf {
        self.static_root.join("revealjs")
    }

    pub fn mathjax_dir(&self) -> PathBuf {
        self.static_root.join("mathjax")
    }

    pub fn is_reveal_installed(&self) -> bool {
        self.revealjs_dir().is_dir()
    }

    /// Theme href for the page. Built-in reveal.js themes resolve to their
    /// installed stylesheet, anything else is used as given.
    pub fn theme_href(&self, theme: &str) -> String {
        let builtin = format!("revealjs/dist/theme/{}.css", theme);
        if self.static_root.join(&builtin).is_file() {
            format!("static/{}", builtin)
        } else {
            theme.to_string()
        }
    }
}

/// Install reveal.js from `reveal_url`, then MathJax, replacing older copies
pub fn install_reveal(settings: &Settings, reveal_url: &str) -> Result<()> {
    println!("Downloading reveal.js...");
    archive::install_bundle(reveal_url, &settings.revealjs_dir(), settings.download_timeout)?;

    println!("Downloading MathJax...");
    archive::install_bundle(MATHJAX_URL, &settings.mathjax_dir(), settings.download_timeout)?;

    info!("Static assets installed in {:?}", settings.static_root);
    println!("Installation completed!");
    Ok(())
}

/// Install reveal.js with the default URL unless it is already there
pub fn ensure_reveal(settings: &Settings) -> Result<()> {
    if settings.is_reveal_installed() {
        return Ok(());
    }

    println!("Reveal.js not found, running installation...");
    install_reveal(settings, REVEAL_URL)
}

/// Content type for a served file, by extension
pub fn content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css",
        "js" | "mjs" => "application/javascript",
        "json" | "map" => "application/json",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "ico" => "image/x-icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "eot" => "application/vnd.ms-fontobject",
        "mp4" => "video/mp4",
        "webm" => "video/webm",
        "mp3" => "audio/mpeg",
        "md" | "txt" => "text/plain; charset=utf-8",
        _ => "application/octet-stream",
    }
}
