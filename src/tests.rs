use super::*;
use std::fs;
use std::io::Write;
use tempfile::{NamedTempFile, TempDir};

fn create_temp_markdown_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    file.write_all(content.as_bytes())
        .expect("Failed to write to temp file");
    file
}

fn create_deck(dir: &TempDir, slides: &str, config: Option<&str>) -> std::path::PathBuf {
    let deck = dir.path().join("deck");
    fs::create_dir_all(&deck).expect("Failed to create deck dir");
    fs::write(deck.join("slides.md"), slides).expect("Failed to write slides");
    if let Some(config) = config {
        fs::write(deck.join("config.toml"), config).expect("Failed to write config");
    }
    deck.join("slides.md")
}

#[test]
fn test_load_slides_normalizes_line_endings() {
    let file = create_temp_markdown_file("# Pag1\r---\r\n# Pag2.1\r\n---~\r# Page2.2");

    let document = load_slides(file.path(), "---", "---~").unwrap();

    assert_eq!(
        document.sections,
        vec![
            vec!["# Pag1\n".to_string()],
            vec!["\n# Pag2.1\n".to_string(), "\n# Page2.2".to_string()],
        ]
    );
}

#[test]
fn test_load_slides_accepts_invalid_utf8() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(b"# Caf\xe9\n---\n# Two").unwrap();

    let document = load_slides(file.path(), "---", "---~").unwrap();

    assert_eq!(document.len(), 2);
    assert!(document.sections[0][0].starts_with("# Caf"));
}

#[test]
fn test_load_slides_missing_file() {
    let dir = TempDir::new().unwrap();
    let result = load_slides(&dir.path().join("missing.md"), "---", "---~");
    assert!(matches!(result, Err(RevelationError::PresentationNotFound(_))));
}

#[test]
fn test_render_uses_config_separators_and_meta() {
    let dir = TempDir::new().unwrap();
    let slides = create_deck(
        &dir,
        "# A\n===\n# B\n***\n# C",
        Some(
            r#"
REVEAL_SLIDE_SEPARATOR = "==="
REVEAL_VERTICAL_SLIDE_SEPARATOR = "***"

[REVEAL_META]
title = "Deck <1>"
author = "Someone"
description = "Testing"
"#,
        ),
    );

    let presentation = Presentation::new(&slides, None, None, None, None).unwrap();
    let settings = Settings::with_static_root(dir.path().join("static"));
    let page = presentation.render(&settings, None).unwrap();

    assert!(page.contains("<title>Deck &lt;1&gt;</title>"));
    assert!(page.contains("<meta name=\"author\" content=\"Someone\">"));
    assert_eq!(page.matches("<section data-markdown>").count(), 3);
}

#[test]
fn test_render_rereads_deck_every_time() {
    let dir = TempDir::new().unwrap();
    let slides = create_deck(&dir, "# One", None);
    let presentation = Presentation::new(&slides, None, None, None, None).unwrap();
    let settings = Settings::with_static_root(dir.path().join("static"));

    let before = presentation.render(&settings, None).unwrap();
    fs::write(&slides, "# One\n---\n# Two").unwrap();
    let after = presentation.render(&settings, None).unwrap();

    assert_eq!(before.matches("<section data-markdown>").count(), 1);
    assert_eq!(after.matches("<section data-markdown>").count(), 2);
}

#[test]
fn test_invalid_style_is_rejected() {
    let dir = TempDir::new().unwrap();
    let slides = create_deck(&dir, "# One", None);
    let not_css = dir.path().join("style.txt");
    fs::write(&not_css, "body {}").unwrap();

    let result = Presentation::new(&slides, None, None, None, Some(not_css));
    assert!(matches!(result, Err(RevelationError::StyleInvalid(_))));
}

#[test]
fn test_make_static_writes_site() {
    let dir = TempDir::new().unwrap();
    let slides = create_deck(&dir, "# One\n---\n# Two", None);
    let deck = slides.parent().unwrap().to_path_buf();
    fs::create_dir_all(deck.join("media")).unwrap();
    fs::write(deck.join("media/logo.svg"), "<svg/>").unwrap();
    fs::write(deck.join("custom.css"), "h1 {}").unwrap();

    let settings = Settings::with_static_root(dir.path().join("static"));
    fs::create_dir_all(settings.revealjs_dir().join("dist")).unwrap();
    fs::write(settings.revealjs_dir().join("dist/reveal.js"), "// reveal").unwrap();

    let presentation =
        Presentation::new(&slides, None, None, None, Some(deck.join("custom.css"))).unwrap();
    let output = dir.path().join("output");
    let page = make_static(
        &presentation,
        &settings,
        &presentation::StaticOutput {
            folder: &output,
            file: "index.html",
            force: false,
        },
    )
    .unwrap();

    assert_eq!(page, output.join("index.html"));
    assert!(fs::read_to_string(&page).unwrap().contains("custom.css"));
    assert!(output.join("static/revealjs/dist/reveal.js").is_file());
    assert!(output.join("media/logo.svg").is_file());
    assert!(output.join("custom.css").is_file());
    assert!(!output.join("theme").exists());
}

#[test]
fn test_make_static_output_conflicts() {
    let dir = TempDir::new().unwrap();
    let slides = create_deck(&dir, "# One", None);
    let settings = Settings::with_static_root(dir.path().join("static"));
    fs::create_dir_all(settings.revealjs_dir()).unwrap();
    let presentation = Presentation::new(&slides, None, None, None, None).unwrap();

    let output = dir.path().join("output");
    fs::create_dir_all(&output).unwrap();
    fs::write(output.join("stale.html"), "old").unwrap();

    let mut target = presentation::StaticOutput {
        folder: &output,
        file: "index.html",
        force: false,
    };
    assert!(matches!(
        make_static(&presentation, &settings, &target),
        Err(RevelationError::OutputConflict(_))
    ));

    target.force = true;
    make_static(&presentation, &settings, &target).unwrap();
    assert!(!output.join("stale.html").exists());
    assert!(output.join("index.html").is_file());

    let file_output = dir.path().join("taken");
    fs::write(&file_output, "").unwrap();
    let target = presentation::StaticOutput {
        folder: &file_output,
        file: "index.html",
        force: true,
    };
    assert!(matches!(
        make_static(&presentation, &settings, &target),
        Err(RevelationError::OutputConflict(_))
    ));
}
