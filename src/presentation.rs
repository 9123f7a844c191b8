// ABOUTME: Presentation module for the revelation application
// ABOUTME: Resolves a deck's companion files, renders it, scaffolds new decks and builds static sites

use crate::config::{Config, DEFAULT_CONFIG_TEMPLATE};
use crate::errors::{RevelationError, Result};
use crate::html::{self, PageContext};
use crate::resources::Settings;
use crate::slides;
use crate::utils;
use log::info;
use std::fs;
use std::path::{Path, PathBuf};

/// A slide deck and the optional files served alongside it
#[derive(Debug, Clone)]
pub struct Presentation {
    pub path: PathBuf,
    pub config: Option<PathBuf>,
    pub media: Option<PathBuf>,
    pub theme: Option<PathBuf>,
    pub style: Option<PathBuf>,
}

impl Presentation {
    /// Validate the deck and locate its companions. Config, media and theme
    /// default to `config.toml`, `media/` and `theme/` next to the deck and
    /// are left out when missing.
    pub fn new(
        path: &Path,
        config: Option<PathBuf>,
        media: Option<PathBuf>,
        theme: Option<PathBuf>,
        style: Option<PathBuf>,
    ) -> Result<Self> {
        utils::validate_presentation(path)?;
        if let Some(style) = &style {
            utils::validate_style(style)?;
        }

        let base = path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or(Path::new("."));

        let config = config.unwrap_or_else(|| base.join("config.toml"));
        let config = if config.is_file() {
            Some(config)
        } else {
            println!("Configuration file not detected, running with defaults.");
            None
        };

        let media = utils::existing_dir(media.unwrap_or_else(|| base.join("media")));
        if media.is_none() {
            println!("Media folder not detected, running without media.");
        }

        let theme = utils::existing_dir(theme.unwrap_or_else(|| base.join("theme")));
        if theme.is_none() {
            info!("Theme not detected, running without custom theme");
        }

        Ok(Self {
            path: path.to_path_buf(),
            config,
            media,
            theme,
            style,
        })
    }

    /// Directory holding the deck
    pub fn root(&self) -> &Path {
        self.path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or(Path::new("."))
    }

    /// File name the style override is served and copied under
    pub fn style_name(&self) -> Option<String> {
        self.style.as_deref().map(utils::file_name)
    }

    /// Render the page from what is on disk right now. Nothing is cached, so
    /// every call picks up edits to the deck and its configuration.
    pub fn render(&self, settings: &Settings, reload_port: Option<u16>) -> Result<String> {
        let config = Config::resolve(self.config.as_deref())?;
        let slides = slides::load_slides(
            &self.path,
            config.slide_separator(),
            config.vertical_slide_separator(),
        )?;

        Ok(html::render_page(&PageContext {
            config: &config,
            slides: &slides,
            theme: settings.theme_href(config.theme()),
            style: self.style_name(),
            reload_port,
        }))
    }
}

/// Create a new presentation skeleton in `dir`
pub fn make_presentation(dir: &Path) -> Result<()> {
    if dir.exists() {
        return Err(RevelationError::OutputConflict(dir.to_path_buf()));
    }

    fs::create_dir_all(dir.join("media"))?;
    fs::write(dir.join("config.toml"), DEFAULT_CONFIG_TEMPLATE)?;

    let title = title_from_name(&utils::file_name(dir));
    fs::write(
        dir.join("slides.md"),
        format!("# {}\n\nStart from here!", title),
    )?;

    info!("Presentation created in {:?}", dir);
    Ok(())
}

/// `my_new-talk` becomes `My New Talk`
fn title_from_name(name: &str) -> String {
    name.split(['_', '-', ' '])
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Where and how to write a static build
pub struct StaticOutput<'a> {
    pub folder: &'a Path,
    pub file: &'a str,
    /// Replace an existing output folder
    pub force: bool,
}

/// Write a self-contained copy of the presentation: page, reveal.js,
/// media, theme and style override. Returns the written page.
pub fn make_static(
    presentation: &Presentation,
    settings: &Settings,
    output: &StaticOutput,
) -> Result<PathBuf> {
    let folder = output.folder;

    if folder.is_file() {
        return Err(RevelationError::OutputConflict(folder.to_path_buf()));
    }
    if folder.is_dir() {
        if !output.force {
            return Err(RevelationError::OutputConflict(folder.to_path_buf()));
        }
        info!("Removing existing output folder {:?}", folder);
        fs::remove_dir_all(folder)?;
    }

    fs::create_dir_all(folder)?;

    if let (Some(style), Some(name)) = (&presentation.style, presentation.style_name()) {
        fs::copy(style, folder.join(name))?;
    }

    utils::copy_dir_all(
        &settings.revealjs_dir(),
        &folder.join("static").join("revealjs"),
    )?;

    if let Some(media) = &presentation.media {
        utils::copy_dir_all(media, &folder.join("media"))?;
    }
    if let Some(theme) = &presentation.theme {
        utils::copy_dir_all(theme, &folder.join("theme"))?;
    }

    println!("Generating static presentation...");
    let page = presentation.render(settings, None)?;
    let page_path = folder.join(output.file);
    utils::ensure_directory_exists(page_path.parent().unwrap_or(folder))?;
    fs::write(&page_path, page)?;

    info!("Static presentation generated in {:?}", folder);
    Ok(page_path)
}
