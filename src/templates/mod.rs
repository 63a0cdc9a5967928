//! Page templates
//!
//! Tera templates embedded in the binary from `templates/`. Files in the
//! configured templates directory with the same relative name replace the
//! embedded ones, and new names are added alongside them.

use chrono::Datelike;
use rust_embed::RustEmbed;
use serde::Serialize;
use std::error::Error as StdError;
use std::fs;
use std::path::Path;
use tera::{Context as TeraContext, Tera};

mod error;

pub use error::TemplateError;

#[derive(RustEmbed)]
#[folder = "templates/"]
#[include = "*.html"]
struct EmbeddedTemplates;

/// Template engine for rendering pages
pub struct TemplateEngine {
    tera: Tera,
}

impl TemplateEngine {
    /// Engine with the embedded templates plus any overrides under `override_path`.
    ///
    /// A missing override directory is not an error.
    pub fn new(override_path: &Path) -> Result<Self, TemplateError> {
        let mut templates = embedded_templates()?;

        if override_path.is_dir() {
            let mut overrides = Vec::new();
            collect_templates_from_dir(override_path, override_path, &mut overrides)?;
            tracing::info!(
                "Loaded {} template override(s) from {:?}",
                overrides.len(),
                override_path
            );
            for (name, content) in overrides {
                templates.retain(|(existing, _)| existing != &name);
                templates.push((name, content));
            }
        }

        Ok(Self {
            tera: build_tera(templates)?,
        })
    }

    /// Engine with the embedded templates only
    pub fn embedded() -> Result<Self, TemplateError> {
        Ok(Self {
            tera: build_tera(embedded_templates()?)?,
        })
    }

    pub fn has_template(&self, name: &str) -> bool {
        self.tera.get_template_names().any(|t| t == name)
    }

    /// First of `candidates` that is loaded
    pub fn select_template<'a>(&self, candidates: &[&'a str]) -> Option<&'a str> {
        candidates.iter().copied().find(|name| self.has_template(name))
    }

    /// Render a template with context
    pub fn render(&self, template: &str, context: &TeraContext) -> Result<String, TemplateError> {
        if !self.has_template(template) {
            return Err(TemplateError::NotFound(template.to_string()));
        }

        self.tera.render(template, context).map_err(|e| {
            let mut error_msg = format!("Failed to render '{}': {}", template, e);
            let mut source = e.source();
            while let Some(s) = source {
                error_msg.push_str(&format!("\n  Caused by: {}", s));
                source = s.source();
            }
            TemplateError::Render(error_msg)
        })
    }

    /// Render with the standard page variables merged into `context`
    pub fn render_with_standard_vars(
        &self,
        template: &str,
        context: &TeraContext,
        standard_vars: &StandardTemplateVars,
    ) -> Result<String, TemplateError> {
        let mut full_context = context.clone();
        full_context.insert("site_name", &standard_vars.site_name);
        full_context.insert("request_path", &standard_vars.request_path);
        full_context.insert("year", &standard_vars.year);
        if let Some(ref user) = standard_vars.current_user {
            full_context.insert("current_user", user);
        }

        self.render(template, &full_context)
    }

    /// Render a page, never failing.
    ///
    /// On error, `error.html` is rendered instead, and if that fails too a
    /// built-in page is returned.
    pub fn render_page(
        &self,
        template: &str,
        context: &TeraContext,
        standard_vars: &StandardTemplateVars,
    ) -> String {
        match self.render_with_standard_vars(template, context, standard_vars) {
            Ok(html) => html,
            Err(e) => {
                tracing::warn!("Failed to render template '{}': {}, trying error template", template, e);

                let mut error_context = TeraContext::new();
                error_context.insert("error_message", &e.to_string());
                error_context.insert("requested_template", template);

                match self.render_with_standard_vars("error.html", &error_context, standard_vars) {
                    Ok(html) => html,
                    Err(error_template_err) => {
                        tracing::warn!(
                            "Failed to render error template: {}, returning simple HTML error page",
                            error_template_err
                        );
                        simple_error_page(template, &e.to_string())
                    }
                }
            }
        }
    }

    /// Names of all loaded templates, sorted
    pub fn template_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tera.get_template_names().map(str::to_string).collect();
        names.sort();
        names
    }
}

fn embedded_templates() -> Result<Vec<(String, String)>, TemplateError> {
    let mut templates = Vec::new();
    for name in EmbeddedTemplates::iter() {
        let Some(file) = EmbeddedTemplates::get(&name) else {
            continue;
        };
        let content = String::from_utf8(file.data.into_owned())
            .map_err(|e| TemplateError::Render(format!("Template {} is not UTF-8: {}", name, e)))?;
        templates.push((name.into_owned(), content));
    }
    Ok(templates)
}

fn collect_templates_from_dir(
    base_path: &Path,
    current_path: &Path,
    templates: &mut Vec<(String, String)>,
) -> Result<(), TemplateError> {
    for entry in fs::read_dir(current_path)? {
        let path = entry?.path();

        if path.is_dir() {
            collect_templates_from_dir(base_path, &path, templates)?;
        } else if path.extension().is_some_and(|ext| ext == "html") {
            let relative_path = path
                .strip_prefix(base_path)
                .map_err(|_| TemplateError::Render("Failed to get relative path".to_string()))?;
            let template_name = relative_path.to_string_lossy().replace('\\', "/");
            let content = fs::read_to_string(&path)?;
            templates.push((template_name, content));
        }
    }

    Ok(())
}

fn build_tera(templates: Vec<(String, String)>) -> Result<Tera, TemplateError> {
    let mut tera = Tera::default();
    tera.add_raw_templates(templates)
        .map_err(|e| TemplateError::Render(format!("Failed to load templates: {}", describe(&e))))?;
    Ok(tera)
}

fn describe(e: &tera::Error) -> String {
    let mut message = e.to_string();
    let mut source = e.source();
    while let Some(s) = source {
        message.push_str(&format!(": {}", s));
        source = s.source();
    }
    message
}

/// Last-resort page when neither the requested template nor `error.html`
/// could be rendered
fn simple_error_page(template: &str, error: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Page Error</title>
    <style>
        body {{ font-family: system-ui, sans-serif; max-width: 600px; margin: 50px auto; padding: 20px; }}
        .error-box {{ border-left: 4px solid #c0392b; padding: 20px; background: #fafafa; }}
        code {{ background: #eee; padding: 2px 6px; border-radius: 3px; }}
    </style>
</head>
<body>
    <div class="error-box">
        <h1>Something went wrong</h1>
        <p>The page <code>{}</code> could not be displayed.</p>
        <p>{}</p>
    </div>
</body>
</html>"#,
        tera::escape_html(template),
        tera::escape_html(error)
    )
}

/// Variables every page receives
#[derive(Debug, Clone, Serialize)]
pub struct StandardTemplateVars {
    pub site_name: String,
    /// Username of the logged-in account
    pub current_user: Option<String>,
    pub request_path: String,
    /// Current year (for the footer)
    pub year: i32,
}

impl StandardTemplateVars {
    pub fn new(site_name: impl Into<String>, request_path: impl Into<String>) -> Self {
        Self {
            site_name: site_name.into(),
            current_user: None,
            request_path: request_path.into(),
            year: chrono::Utc::now().year(),
        }
    }

    pub fn with_user(mut self, username: Option<String>) -> Self {
        self.current_user = username;
        self
    }
}

#[cfg(test)]
mod tests;
