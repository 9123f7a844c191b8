// ABOUTME: Library module for the revelation program.
// ABOUTME: Turns plain-text slide decks into reveal.js presentations, installs assets and live reloads.
#![recursion_limit = "256"]

// Reexport modules
pub mod archive;
pub mod config;
pub mod errors;
pub mod html;
pub mod presentation;
pub mod resources;
pub mod server;
pub mod slides;
pub mod utils;
pub mod watch;

// Reexport common types and functions
pub use archive::{
    detect_format, download, install, install_bundle, safe_extract, ArchiveFormat, AssetBundle,
};
pub use config::Config;
pub use errors::{Result, RevelationError};
pub use html::{render_page, PageContext};
pub use presentation::{make_presentation, make_static, Presentation};
pub use resources::{ensure_reveal, install_reveal, Settings, MATHJAX_URL, REVEAL_URL};
pub use server::PresentationServer;
pub use slides::{load_slides, normalize, segment, Fragment, Section, SlideDocument};
pub use watch::{Channel, ReloadMessage, WatchSession};

#[cfg(test)]
mod tests;
