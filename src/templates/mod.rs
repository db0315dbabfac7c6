//! Template engine
//!
//! Pages are rendered with Tera. The templates shipped in `templates/` are
//! embedded into the binary; a directory given in the configuration can
//! override any of them by file name (for example `polls/detail.html`).
//!
//! HTML autoescaping is on for every `.html` template.

mod error;


pub use error::TemplateError;

use anyhow::Result;
use rust_embed::RustEmbed;
use std::collections::BTreeMap;
use std::error::Error as StdError;
use std::path::Path;
use tera::{Context as TeraContext, Tera};

#[derive(RustEmbed)]
#[folder = "templates/"]
#[include = "*.html"]
struct EmbeddedTemplates;

/// Template used for the 500 page
pub const SERVER_ERROR_TEMPLATE: &str = "500.html";

/// Tera wrapper holding the page templates
pub struct TemplateEngine {
    tera: Tera,
}

impl TemplateEngine {
    /// Load the embedded templates, then apply overrides from `override_dir`
    ///
    /// A missing override directory is an error; pass `None` to use the
    /// embedded set only.
    pub fn new(override_dir: Option<&Path>) -> Result<Self> {
        let mut sources = Self::embedded_sources()?;

        if let Some(dir) = override_dir {
            let mut overrides = BTreeMap::new();
            Self::collect_dir(dir, dir, &mut overrides)?;
            tracing::info!(
                "Loaded {} template override(s) from {:?}",
                overrides.len(),
                dir
            );
            sources.extend(overrides);
        }

        let mut tera = Tera::default();
        tera.add_raw_templates(sources.iter().map(|(n, s)| (n.as_str(), s.as_str())))
            .map_err(|e| TemplateError::Invalid {
                name: "templates".to_string(),
                message: error_chain(&e),
            })?;

        tracing::debug!("Template engine ready with {} templates", sources.len());
        Ok(Self { tera })
    }

    fn embedded_sources() -> Result<BTreeMap<String, String>> {
        let mut sources = BTreeMap::new();
        for name in EmbeddedTemplates::iter() {
            let Some(file) = EmbeddedTemplates::get(&name) else {
                continue;
            };
            let content = String::from_utf8(file.data.into_owned())
                .map_err(|_| TemplateError::Encoding(name.to_string()))?;
            sources.insert(name.to_string(), content);
        }
        Ok(sources)
    }

    /// Recursively read `*.html` files under `dir`, keyed by path relative to `root`
    fn collect_dir(root: &Path, dir: &Path, out: &mut BTreeMap<String, String>) -> Result<()> {
        for entry in std::fs::read_dir(dir).map_err(TemplateError::from)? {
            let path = entry.map_err(TemplateError::from)?.path();
            if path.is_dir() {
                Self::collect_dir(root, &path, out)?;
                continue;
            }
            if path.extension().and_then(|e| e.to_str()) != Some("html") {
                continue;
            }
            let Ok(relative) = path.strip_prefix(root) else {
                continue;
            };
            let name = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            let content = std::fs::read_to_string(&path).map_err(TemplateError::from)?;
            out.insert(name, content);
        }
        Ok(())
    }

    /// Render `template`, reporting the full Tera cause chain on failure
    pub fn render(&self, template: &str, context: &TeraContext) -> Result<String> {
        self.tera
            .render(template, context)
            .map_err(|e| TemplateError::Render(error_chain(&e)).into())
    }

    /// Render `template`, falling back to the 500 page and then to a static page
    ///
    /// Never fails. The error itself is only logged, never shown to the client.
    pub fn render_with_fallback(&self, template: &str, context: &TeraContext) -> String {
        match self.render(template, context) {
            Ok(html) => html,
            Err(e) => {
                tracing::error!("Failed to render template '{}': {}", template, e);
                self.server_error_page(context)
            }
        }
    }

    /// The 500 page, or a static HTML page if even that cannot be rendered
    pub fn server_error_page(&self, context: &TeraContext) -> String {
        match self.render(SERVER_ERROR_TEMPLATE, context) {
            Ok(html) => html,
            Err(e) => {
                tracing::warn!("Failed to render error template: {}", e);
                simple_error_page()
            }
        }
    }

    /// Whether a template with this name is registered
    pub fn has_template(&self, name: &str) -> bool {
        self.tera.get_template_names().any(|n| n == name)
    }
}

fn error_chain(e: &tera::Error) -> String {
    let mut error_msg = e.to_string();
    let mut source = e.source();
    while let Some(s) = source {
        error_msg.push_str(&format!("\n  Caused by: {}", s));
        source = s.source();
    }
    error_msg
}

fn simple_error_page() -> String {
    r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <title>Server Error</title>
</head>
<body>
    <h1>Server Error (500)</h1>
</body>
</html>"#
        .to_string()
}
