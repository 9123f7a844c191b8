// ABOUTME: HTML generation module for the revelation application
// ABOUTME: Builds the reveal.js page from the resolved configuration and segmented slides

use crate::config::Config;
use crate::slides::SlideDocument;
use log::warn;
use serde_json::Value;

/// Everything the page needs, already resolved
pub struct PageContext<'a> {
    pub config: &'a Config,
    pub slides: &'a SlideDocument,
    /// Theme stylesheet href
    pub theme: String,
    /// Style override href
    pub style: Option<String>,
    /// Port of the reload WebSocket, when live reload is on
    pub reload_port: Option<u16>,
}

/// Script of each plugin we know how to load
fn plugin_script(name: &str) -> Option<&'static str> {
    match name {
        "RevealMarkdown" => Some("static/revealjs/plugin/markdown/markdown.js"),
        "RevealHighlight" => Some("static/revealjs/plugin/highlight/highlight.js"),
        "RevealNotes" => Some("static/revealjs/plugin/notes/notes.js"),
        "RevealMath" => Some("static/revealjs/plugin/math/math.js"),
        "RevealSearch" => Some("static/revealjs/plugin/search/search.js"),
        "RevealZoom" => Some("static/revealjs/plugin/zoom/zoom.js"),
        _ => None,
    }
}

/// Render the presentation page
pub fn render_page(ctx: &PageContext) -> String {
    let config = ctx.config;
    let plugins: Vec<(&str, &str)> = config
        .plugins()
        .into_iter()
        .filter_map(|name| match plugin_script(name) {
            Some(script) => Some((name, script)),
            None => {
                warn!("Unknown reveal.js plugin {}, skipping", name);
                None
            }
        })
        .collect();

    let mut html = String::from("<!doctype html>\n<html lang=\"en\">\n<head>\n");
    html.push_str("<meta charset=\"utf-8\">\n");
    html.push_str(
        "<meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0, maximum-scale=1.0, user-scalable=no\">\n",
    );
    html.push_str(&format!(
        "<title>{}</title>\n",
        escape_html(config.meta_field("title"))
    ));
    html.push_str(&format!(
        "<meta name=\"author\" content=\"{}\">\n",
        escape_html(config.meta_field("author"))
    ));
    html.push_str(&format!(
        "<meta name=\"description\" content=\"{}\">\n",
        escape_html(config.meta_field("description"))
    ));

    html.push_str(&stylesheet("static/revealjs/dist/reset.css"));
    html.push_str(&stylesheet("static/revealjs/dist/reveal.css"));
    html.push_str(&format!(
        "<link rel=\"stylesheet\" href=\"{}\" id=\"theme\">\n",
        escape_html(&ctx.theme)
    ));
    if plugins.iter().any(|(name, _)| *name == "RevealHighlight") {
        html.push_str(&stylesheet("static/revealjs/plugin/highlight/monokai.css"));
    }
    if let Some(style) = &ctx.style {
        html.push_str(&stylesheet(style));
    }

    html.push_str("</head>\n<body>\n<div class=\"reveal\">\n<div class=\"slides\">\n");
    html.push_str(&render_slides(ctx.slides));
    html.push_str("</div>\n</div>\n");

    html.push_str("<script src=\"static/revealjs/dist/reveal.js\"></script>\n");
    for (_, script) in &plugins {
        html.push_str(&format!("<script src=\"{}\"></script>\n", script));
    }

    let names: Vec<&str> = plugins.iter().map(|(name, _)| *name).collect();
    html.push_str(&format!(
        "<script>\nReveal.initialize(Object.assign({}, {{ plugins: [{}] }}));\n</script>\n",
        initialize_options(config, &names),
        names.join(", ")
    ));

    if let Some(port) = ctx.reload_port {
        html.push_str(&reload_script(port));
    }

    html.push_str("</body>\n</html>\n");
    html
}

/// One `<section>` per section, nesting one markdown `<section>` per fragment
fn render_slides(slides: &SlideDocument) -> String {
    let mut out = String::new();

    for section in slides.iter() {
        out.push_str("<section>\n");
        for fragment in section {
            out.push_str("<section data-markdown>\n<textarea data-template>\n");
            out.push_str(&escape_html(fragment));
            out.push_str("\n</textarea>\n</section>\n");
        }
        out.push_str("</section>\n");
    }

    out
}

/// `REVEAL_CONFIG` as a JSON object. MathJax is pointed at the local copy
/// unless the configuration says otherwise.
fn initialize_options(config: &Config, plugins: &[&str]) -> String {
    let mut options = match config.reveal_config() {
        Value::Object(map) => map.clone(),
        _ => serde_json::Map::new(),
    };

    if plugins.contains(&"RevealMath") && !options.contains_key("math") {
        options.insert(
            "math".to_string(),
            serde_json::json!({
                "mathjax": "static/mathjax/MathJax.js",
                "config": "TeX-AMS_HTML-full",
            }),
        );
    }

    // `</` cannot appear inside an inline script
    serde_json::to_string(&options)
        .unwrap_or_else(|_| "{}".to_string())
        .replace("</", "<\\/")
}

fn reload_script(port: u16) -> String {
    format!(
        r#"<script>
(function () {{
  var socket = new WebSocket("ws://" + window.location.hostname + ":{port}/");
  socket.onmessage = function (event) {{
    var data = JSON.parse(event.data);
    if (data.msg_type === "message" && data.message === "reload") {{
      window.location.reload();
    }}
  }};
}})();
</script>
"#
    )
}

fn stylesheet(href: &str) -> String {
    format!("<link rel=\"stylesheet\" href=\"{}\">\n", escape_html(href))
}

/// Escape text for HTML content and attribute values
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&#34;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
